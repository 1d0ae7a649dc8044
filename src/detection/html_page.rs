// src/detection/html_page.rs
//! Static HTML page driver
//!
//! Parses markup with `scraper` and simulates the browser actions the
//! heuristics perform: values typed into controls show up in later
//! snapshots, links and form submissions navigate between registered pages,
//! `target="_blank"` links open a new window, and every action is recorded.
//! There is no layout, so element rects are always `None`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::page::{ElementSnapshot, PageAction, PageDriver, PageSnapshot};
use crate::utils::clean_text;

const BLANK_URL: &str = "about:blank";
const NON_RENDERED_TAGS: &[&str] = &[
    "head", "script", "style", "noscript", "template", "meta", "link", "title",
];

#[derive(Debug)]
struct Window {
    handle: String,
    url: String,
    html: String,
    /// Values typed or selected since the page was loaded
    values: HashMap<usize, String>,
}

impl Window {
    fn new(handle: String, url: &str, html: String) -> Self {
        Self {
            handle,
            url: url.to_string(),
            html,
            values: HashMap::new(),
        }
    }
}

/// Open windows; `active` always points into `windows`
#[derive(Debug)]
struct PageState {
    windows: Vec<Window>,
    active: usize,
    actions: Vec<PageAction>,
}

impl PageState {
    fn window(&self) -> &Window {
        &self.windows[self.active]
    }

    fn window_mut(&mut self) -> &mut Window {
        &mut self.windows[self.active]
    }
}

/// Where a click leads
#[derive(Debug, PartialEq)]
struct Navigation {
    url: String,
    new_window: bool,
}

pub struct HtmlPage {
    state: Mutex<PageState>,
    pages: HashMap<String, String>,
    client: Option<Client>,
}

impl HtmlPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(PageState {
                windows: vec![Window::new(window_handle(0), BLANK_URL, html.into())],
                active: 0,
                actions: Vec::new(),
            }),
            pages: HashMap::new(),
            client: None,
        }
    }

    /// Start on a registered page
    pub fn at(url: &str, html: impl Into<String>) -> Self {
        let html = html.into();
        let page = Self::new(html.clone()).with_page(url, html);
        if let Ok(mut state) = page.state.lock() {
            state.window_mut().url = url.to_string();
        }
        page
    }

    /// Serve `html` whenever `url` is visited
    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }

    /// Fetch unregistered URLs over HTTP, for `goto` and followed links.
    /// Form submissions only ever reach registered pages.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Download a page and start on it
    pub async fn fetch(client: Client, url: &str) -> Result<Self> {
        let page = Self::new(String::new()).with_client(client);
        page.goto(url).await?;
        Ok(page)
    }

    pub fn actions(&self) -> Vec<PageAction> {
        self.lock()
            .map(|state| state.actions.clone())
            .unwrap_or_default()
    }

    /// Value typed or selected into `index` on the active window
    pub fn value_of(&self, index: usize) -> Option<String> {
        self.lock().ok()?.window().values.get(&index).cloned()
    }

    fn lock(&self) -> Result<MutexGuard<'_, PageState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("HTML page state lock poisoned"))
    }

    fn load(&self, url: &str, html: String) -> Result<()> {
        let mut state = self.lock()?;
        let window = state.window_mut();
        window.url = url.to_string();
        window.html = html;
        window.values.clear();
        debug!("Loaded static page {}", url);
        Ok(())
    }

    fn open_window(&self, url: &str, html: String) -> Result<()> {
        let mut state = self.lock()?;
        let handle = window_handle(state.windows.len());
        debug!("Opened {} in new window {}", url, handle);
        state.windows.push(Window::new(handle, url, html));
        state.actions.push(PageAction::OpenWindow {
            url: url.to_string(),
        });
        Ok(())
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        if let Some(html) = self.pages.get(url) {
            return Ok(html.clone());
        }

        let Some(client) = &self.client else {
            anyhow::bail!("No page registered for {}", url);
        };

        let response = client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP error: {}", response.status());
        }
        response
            .text()
            .await
            .context("Failed to read response body")
    }

    fn resolve(&self, base: &str, href: &str) -> String {
        Url::parse(base)
            .and_then(|base| base.join(href))
            .map(String::from)
            .unwrap_or_else(|_| href.to_string())
    }

    fn can_fetch(&self, url: &str) -> bool {
        self.client.is_some()
            && Url::parse(url).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
    }

    /// Page a click on `index` leads to, if the driver can load it
    fn navigation_target(&self, snapshot: &PageSnapshot, index: usize) -> Option<Navigation> {
        let element = snapshot.get(index)?;

        let link = std::iter::once(element)
            .chain(snapshot.ancestors(index))
            .find(|el| el.tag == "a");
        if let Some(anchor) = link {
            let href = anchor.attr("href")?;
            if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:") {
                return None;
            }
            let url = self.resolve(&snapshot.url, href);
            if !self.pages.contains_key(&url) && !self.can_fetch(&url) {
                return None;
            }
            return Some(Navigation {
                url,
                new_window: anchor.attr("target") == Some("_blank"),
            });
        }

        let is_submit = match element.tag.as_str() {
            // `type` defaults to submit on buttons
            "button" => element
                .attr("type")
                .map_or(true, |t| t.eq_ignore_ascii_case("submit")),
            "input" => matches!(element.input_type().as_str(), "submit" | "image"),
            _ => false,
        };
        if !is_submit {
            return None;
        }

        let action = snapshot
            .ancestors(index)
            .find(|el| el.tag == "form")?
            .attr("action")?;
        let url = self.resolve(&snapshot.url, action);
        self.pages.contains_key(&url).then_some(Navigation {
            url,
            new_window: false,
        })
    }

    fn element(&self, index: usize) -> Result<ElementSnapshot> {
        let snapshot = self.current_snapshot()?;
        snapshot
            .elements
            .into_iter()
            .nth(index)
            .with_context(|| format!("No element at index {}", index))
    }

    fn current_snapshot(&self) -> Result<PageSnapshot> {
        let state = self.lock()?;
        let window = state.window();
        let mut elements = build_snapshot(&window.html);
        for (index, value) in &window.values {
            if let Some(el) = elements.get_mut(*index) {
                el.value = value.clone();
            }
        }
        Ok(PageSnapshot {
            url: window.url.clone(),
            elements,
        })
    }

    fn record(&self, action: PageAction) -> Result<()> {
        self.lock()?.actions.push(action);
        Ok(())
    }

    fn store_value(&self, index: usize, value: String, action: PageAction) -> Result<()> {
        let mut state = self.lock()?;
        state.window_mut().values.insert(index, value);
        state.actions.push(action);
        Ok(())
    }
}

fn window_handle(position: usize) -> String {
    format!("window-{}", position)
}

#[async_trait]
impl PageDriver for HtmlPage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.record(PageAction::Goto {
            url: url.to_string(),
        })?;

        let html = self.fetch_html(url).await?;
        self.load(url, html)
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.lock()?.window().url.clone())
    }

    async fn page_text(&self) -> Result<String> {
        let state = self.lock()?;
        Ok(document_text(&state.window().html))
    }

    async fn snapshot(&self) -> Result<PageSnapshot> {
        self.current_snapshot()
    }

    async fn query(&self, selector: &str) -> Result<Vec<usize>> {
        let state = self.lock()?;
        select_indices(&state.window().html, selector)
    }

    async fn click(&self, index: usize) -> Result<()> {
        let snapshot = self.current_snapshot()?;
        let element = snapshot
            .get(index)
            .with_context(|| format!("No element at index {}", index))?;
        if !element.is_interactable() {
            anyhow::bail!("Element {} <{}> is not clickable", index, element.tag);
        }

        self.record(PageAction::Click { index })?;

        match self.navigation_target(&snapshot, index) {
            Some(Navigation {
                url,
                new_window: true,
            }) => {
                let html = self.fetch_html(&url).await?;
                self.open_window(&url, html)
            }
            Some(Navigation { url, .. }) => self.goto(&url).await,
            None => Ok(()),
        }
    }

    async fn fill(&self, index: usize, value: &str) -> Result<()> {
        let element = self.element(index)?;
        if !element.is_text_input() {
            anyhow::bail!("Element {} <{}> does not accept text", index, element.tag);
        }
        if !element.is_interactable() {
            anyhow::bail!("Element {} is hidden or disabled", index);
        }

        self.store_value(
            index,
            value.to_string(),
            PageAction::Fill {
                index,
                value: value.to_string(),
            },
        )
    }

    async fn select_option(&self, index: usize, label: &str) -> Result<()> {
        let element = self.element(index)?;
        if element.tag != "select" {
            anyhow::bail!("Element {} <{}> is not a select", index, element.tag);
        }
        if !element.options.iter().any(|o| o == label) {
            anyhow::bail!("Select {} has no option '{}'", index, label);
        }

        self.store_value(
            index,
            label.to_string(),
            PageAction::Select {
                index,
                label: label.to_string(),
            },
        )
    }

    async fn upload(&self, index: usize, path: &Path) -> Result<()> {
        let element = self.element(index)?;
        if element.tag != "input" || element.input_type() != "file" {
            anyhow::bail!("Element {} is not a file input", index);
        }

        self.store_value(
            index,
            path.display().to_string(),
            PageAction::Upload {
                index,
                path: path.to_path_buf(),
            },
        )
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.record(PageAction::Screenshot)?;
        Ok(Vec::new())
    }

    async fn window_handles(&self) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .windows
            .iter()
            .map(|w| w.handle.clone())
            .collect())
    }

    async fn switch_to_window(&self, handle: &str) -> Result<()> {
        let mut state = self.lock()?;
        state.active = state
            .windows
            .iter()
            .position(|w| w.handle == handle)
            .with_context(|| format!("No window with handle {}", handle))?;
        state.actions.push(PageAction::SwitchWindow {
            handle: handle.to_string(),
        });
        Ok(())
    }
}

// ===== Markup Analysis =====

/// Tree node id, used to line selector matches up with snapshot indices
fn node_id<'a>(element: &ElementRef<'a>) -> impl std::hash::Hash + Eq + Copy + 'a {
    std::ops::Deref::deref(element).id()
}

fn document_elements(document: &Html) -> Vec<ElementRef<'_>> {
    let root = document.root_element();
    root.descendants().filter_map(ElementRef::wrap).collect()
}

pub fn build_snapshot(html: &str) -> Vec<ElementSnapshot> {
    let document = Html::parse_document(html);
    let elements = document_elements(&document);
    let positions: HashMap<_, usize> = elements
        .iter()
        .enumerate()
        .map(|(i, el)| (node_id(el), i))
        .collect();

    let mut snapshots: Vec<ElementSnapshot> = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        let parent = element
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(|p| positions.get(&node_id(&p)).copied());
        let parent_displayed = parent
            .and_then(|p| snapshots.get(p))
            .map(|p| p.displayed)
            .unwrap_or(true);

        snapshots.push(describe(*element, index, parent, parent_displayed));
    }
    snapshots
}

fn describe(
    element: ElementRef<'_>,
    index: usize,
    parent: Option<usize>,
    parent_displayed: bool,
) -> ElementSnapshot {
    let node = element.value();
    let tag = node.name().to_lowercase();
    let attributes: BTreeMap<String, String> = node
        .attrs()
        .map(|(name, value)| (name.to_lowercase(), value.to_string()))
        .collect();
    let style = attributes
        .get("style")
        .map(|s| s.to_lowercase().replace(' ', ""))
        .unwrap_or_default();
    let input_type = attributes
        .get("type")
        .map(|t| t.to_lowercase())
        .unwrap_or_default();

    let hidden = NON_RENDERED_TAGS.contains(&tag.as_str())
        || attributes.contains_key("hidden")
        || attributes.get("aria-hidden").map(String::as_str) == Some("true")
        || (tag == "input" && input_type == "hidden")
        || style.contains("display:none")
        || style.contains("visibility:hidden");

    let options = if tag == "select" {
        option_labels(element)
    } else {
        Vec::new()
    };

    let value = match tag.as_str() {
        "textarea" => rendered_text(element),
        "select" => selected_option(element).unwrap_or_default(),
        "input" if !matches!(input_type.as_str(), "button" | "submit") => {
            attributes.get("value").cloned().unwrap_or_default()
        }
        _ => String::new(),
    };

    let text = if tag == "input" && matches!(input_type.as_str(), "button" | "submit") {
        attributes.get("value").cloned().unwrap_or_default()
    } else {
        rendered_text(element)
    };

    let font_weight = style
        .split(';')
        .find_map(|decl| decl.strip_prefix("font-weight:"))
        .map(str::to_string)
        .or_else(|| matches!(tag.as_str(), "b" | "strong").then(|| "bold".to_string()));

    ElementSnapshot {
        index,
        parent,
        own_text: own_text(element),
        text,
        rect: None,
        displayed: parent_displayed && !hidden,
        enabled: !attributes.contains_key("disabled"),
        font_weight,
        has_click_handler: attributes.contains_key("onclick"),
        value,
        options,
        attributes,
        tag,
    }
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if !matches!(name, "script" | "style" | "noscript" | "template") {
                collect_text(child_element, out);
            }
        }
    }
}

fn rendered_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    clean_text(&out)
}

fn own_text(element: ElementRef<'_>) -> String {
    let text: Vec<&str> = element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| &**t))
        .collect();
    clean_text(&text.join(" "))
}

fn option_labels(select: ElementRef<'_>) -> Vec<String> {
    let Ok(selector) = Selector::parse("option") else {
        return Vec::new();
    };
    select.select(&selector).map(rendered_text).collect()
}

fn selected_option(select: ElementRef<'_>) -> Option<String> {
    let selector = Selector::parse("option[selected]").ok()?;
    select.select(&selector).next().map(rendered_text)
}

pub fn document_text(html: &str) -> String {
    let document = Html::parse_document(html);
    rendered_text(document.root_element())
}

/// Snapshot indices of the elements matching `selector`
pub fn select_indices(html: &str, selector: &str) -> Result<Vec<usize>> {
    let parsed =
        Selector::parse(selector).map_err(|e| anyhow!("Invalid selector '{}': {:?}", selector, e))?;

    let document = Html::parse_document(html);
    let positions: HashMap<_, usize> = document_elements(&document)
        .iter()
        .enumerate()
        .map(|(i, el)| (node_id(el), i))
        .collect();

    Ok(document
        .select(&parsed)
        .filter_map(|el| positions.get(&node_id(&el)).copied())
        .collect())
}
