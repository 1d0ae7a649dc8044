// src/detection/webdriver.rs
//! Live browser driver over the WebDriver protocol

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::wd::WindowHandle;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{debug, info, warn};

use super::page::{ElementSnapshot, PageDriver, PageSnapshot};

const INDEX_ATTRIBUTE: &str = "data-jobpilot-idx";

/// Tags every element with its document-order index and describes it
const SNAPSHOT_SCRIPT: &str = r#"
const attr = arguments[0];
const all = Array.from(document.querySelectorAll('*'));
const positions = new Map();
all.forEach((el, i) => { el.setAttribute(attr, String(i)); positions.set(el, i); });
const clean = (s) => (s || '').replace(/\s+/g, ' ').trim();
return all.map((el, i) => {
  const tag = el.tagName.toLowerCase();
  const style = window.getComputedStyle(el);
  const r = el.getBoundingClientRect();
  const attributes = {};
  for (const a of Array.from(el.attributes)) {
    if (a.name !== attr) { attributes[a.name] = a.value; }
  }
  let own = '';
  for (const n of Array.from(el.childNodes)) {
    if (n.nodeType === 3) { own += n.textContent + ' '; }
  }
  const type = (el.getAttribute('type') || '').toLowerCase();
  const isButtonInput = tag === 'input' && (type === 'button' || type === 'submit');
  const text = isButtonInput ? el.value : (el.innerText || el.textContent);
  return {
    index: i,
    parent: el.parentElement && positions.has(el.parentElement) ? positions.get(el.parentElement) : null,
    tag: tag,
    text: clean(text).slice(0, 1000),
    own_text: clean(own),
    attributes: attributes,
    rect: { x: r.left + window.scrollX, y: r.top + window.scrollY, width: r.width, height: r.height },
    displayed: style.display !== 'none' && style.visibility !== 'hidden' && (r.width > 0 || r.height > 0),
    enabled: !el.disabled,
    font_weight: style.fontWeight || null,
    has_click_handler: typeof el.onclick === 'function',
    value: (!isButtonInput && typeof el.value === 'string') ? el.value : '',
    options: tag === 'select' ? Array.from(el.options).map((o) => clean(o.text)) : [],
  };
});
"#;

const QUERY_SCRIPT: &str = r#"
return Array.from(document.querySelectorAll(arguments[0]))
  .map((el) => el.getAttribute(arguments[1]))
  .filter((v) => v !== null)
  .map(Number);
"#;

const SCROLL_SCRIPT: &str = r#"
const el = document.querySelector(arguments[0]);
if (el) { el.scrollIntoView({ block: 'center' }); }
"#;

const JS_CLICK_SCRIPT: &str = r#"
const el = document.querySelector(arguments[0]);
if (!el) { return false; }
el.click();
return true;
"#;

pub struct WebDriverPage {
    client: Client,
}

impl WebDriverPage {
    /// Open a new browser session on the WebDriver server at `webdriver_url`
    pub async fn connect(webdriver_url: &str, headless: bool) -> Result<Self> {
        let client = ClientBuilder::native()
            .capabilities(Self::capabilities(headless))
            .connect(webdriver_url)
            .await
            .with_context(|| format!("Failed to connect to WebDriver at {}", webdriver_url))?;

        info!(
            "WebDriver session started at {} (headless: {})",
            webdriver_url, headless
        );
        Ok(Self { client })
    }

    fn capabilities(headless: bool) -> Map<String, Value> {
        let mut chrome_args = vec![
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--disable-blink-features=AutomationControlled",
            "--window-size=1920,1080",
        ];
        let mut firefox_args = Vec::new();
        if headless {
            chrome_args.push("--headless=new");
            firefox_args.push("-headless");
        }

        let mut caps = Map::new();
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": chrome_args }));
        caps.insert("moz:firefoxOptions".to_string(), json!({ "args": firefox_args }));
        caps
    }

    pub async fn close(self) -> Result<()> {
        self.client
            .close()
            .await
            .context("Failed to close WebDriver session")
    }

    fn locator(index: usize) -> String {
        format!("[{}='{}']", INDEX_ATTRIBUTE, index)
    }

    async fn element(&self, index: usize) -> Result<Element> {
        self.client
            .find(Locator::Css(&Self::locator(index)))
            .await
            .with_context(|| format!("Element {} is no longer on the page", index))
    }
}

#[async_trait]
impl PageDriver for WebDriverPage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.client
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {}", url))
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn page_text(&self) -> Result<String> {
        let value = self
            .client
            .execute("return document.body ? document.body.innerText : '';", Vec::new())
            .await
            .context("Failed to read page text")?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn snapshot(&self) -> Result<PageSnapshot> {
        let value = self
            .client
            .execute(SNAPSHOT_SCRIPT, vec![json!(INDEX_ATTRIBUTE)])
            .await
            .context("Failed to snapshot page")?;
        let elements: Vec<ElementSnapshot> =
            serde_json::from_value(value).context("Unexpected snapshot payload")?;

        debug!("Snapshot with {} elements", elements.len());
        Ok(PageSnapshot {
            url: self.current_url().await?,
            elements,
        })
    }

    async fn query(&self, selector: &str) -> Result<Vec<usize>> {
        let value = self
            .client
            .execute(QUERY_SCRIPT, vec![json!(selector), json!(INDEX_ATTRIBUTE)])
            .await
            .with_context(|| format!("Selector query failed: {}", selector))?;
        serde_json::from_value(value).context("Unexpected query payload")
    }

    async fn click(&self, index: usize) -> Result<()> {
        let locator = Self::locator(index);
        self.client
            .execute(SCROLL_SCRIPT, vec![json!(locator)])
            .await
            .context("Failed to scroll element into view")?;

        let element = self.element(index).await?;
        match element.click().await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Native click on element {} failed ({}), using script click", index, e);
                let clicked = self
                    .client
                    .execute(JS_CLICK_SCRIPT, vec![json!(locator)])
                    .await
                    .context("Script click failed")?;
                if clicked.as_bool() == Some(true) {
                    Ok(())
                } else {
                    anyhow::bail!("Element {} disappeared before click", index)
                }
            }
        }
    }

    async fn fill(&self, index: usize, value: &str) -> Result<()> {
        let element = self.element(index).await?;
        element.clear().await.context("Failed to clear field")?;
        element
            .send_keys(value)
            .await
            .with_context(|| format!("Failed to type into element {}", index))
    }

    async fn select_option(&self, index: usize, label: &str) -> Result<()> {
        let element = self.element(index).await?;
        element
            .select_by_label(label)
            .await
            .with_context(|| format!("Failed to select '{}' in element {}", label, index))
    }

    async fn upload(&self, index: usize, path: &Path) -> Result<()> {
        let absolute = std::fs::canonicalize(path)
            .with_context(|| format!("Resume not found: {}", path.display()))?;
        let element = self.element(index).await?;
        element
            .send_keys(&absolute.to_string_lossy())
            .await
            .context("Failed to attach file")
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.client
            .screenshot()
            .await
            .context("Failed to take screenshot")
    }

    async fn window_handles(&self) -> Result<Vec<String>> {
        let handles = self
            .client
            .windows()
            .await
            .context("Failed to list browser windows")?;
        Ok(handles.into_iter().map(String::from).collect())
    }

    async fn switch_to_window(&self, handle: &str) -> Result<()> {
        let window = WindowHandle::try_from(handle.to_string())
            .map_err(|_| anyhow!("Invalid window handle {}", handle))?;
        self.client
            .switch_to_window(window)
            .await
            .with_context(|| format!("Failed to switch to window {}", handle))
    }
}
