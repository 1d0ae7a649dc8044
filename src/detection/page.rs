// src/detection/page.rs
//! Browser abstraction shared by the apply-button detector and the form filler

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One element of the page, as seen at snapshot time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementSnapshot {
    /// Position in document order; stable for the lifetime of the snapshot
    pub index: usize,
    pub parent: Option<usize>,
    pub tag: String,
    /// Whitespace-normalized text of the element and its descendants
    pub text: String,
    /// Text of the element's own text nodes only
    pub own_text: String,
    pub attributes: BTreeMap<String, String>,
    /// `None` when the driver has no layout information
    pub rect: Option<Rect>,
    pub displayed: bool,
    pub enabled: bool,
    pub font_weight: Option<String>,
    pub has_click_handler: bool,
    /// Current value of form controls
    pub value: String,
    /// Option labels of a `<select>`
    pub options: Vec<String>,
}

impl ElementSnapshot {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn input_type(&self) -> String {
        self.attr("type").unwrap_or("text").to_lowercase()
    }

    /// Visible text, falling back to accessible labels for icon-only controls
    pub fn label(&self) -> &str {
        if !self.text.is_empty() {
            return &self.text;
        }
        ["aria-label", "title", "alt", "value"]
            .iter()
            .find_map(|name| self.attr(name))
            .unwrap_or("")
    }

    pub fn is_interactable(&self) -> bool {
        self.displayed && self.enabled
    }

    /// Natively clickable or wired up for clicks
    pub fn is_clickable(&self) -> bool {
        matches!(self.tag.as_str(), "button" | "a")
            || (self.tag == "input"
                && matches!(self.input_type().as_str(), "button" | "submit" | "image"))
            || self.attr("role") == Some("button")
            || self.has_click_handler
            || self.has_attr("onclick")
            || self.has_attr("data-action")
            || self.has_attr("data-click")
    }

    /// Text-entry control that can receive typed input
    pub fn is_text_input(&self) -> bool {
        match self.tag.as_str() {
            "textarea" => true,
            "input" => !matches!(
                self.input_type().as_str(),
                "hidden"
                    | "file"
                    | "checkbox"
                    | "radio"
                    | "submit"
                    | "button"
                    | "image"
                    | "reset"
            ),
            _ => false,
        }
    }

    pub fn is_required(&self) -> bool {
        self.has_attr("required") || self.attr("aria-required") == Some("true")
    }
}

/// Flat, document-ordered view of a page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub elements: Vec<ElementSnapshot>,
}

impl PageSnapshot {
    pub fn get(&self, index: usize) -> Option<&ElementSnapshot> {
        self.elements.get(index)
    }

    pub fn ancestors(&self, index: usize) -> impl Iterator<Item = &ElementSnapshot> + '_ {
        std::iter::successors(
            self.get(index).and_then(|el| el.parent).and_then(|p| self.get(p)),
            move |el| el.parent.and_then(|p| self.get(p)),
        )
    }

    pub fn children(&self, index: usize) -> impl Iterator<Item = &ElementSnapshot> + '_ {
        self.elements
            .iter()
            .filter(move |el| el.parent == Some(index))
    }

    pub fn is_descendant_of(&self, index: usize, ancestor: usize) -> bool {
        self.ancestors(index).any(|el| el.index == ancestor)
    }

    pub fn descendants(&self, index: usize) -> impl Iterator<Item = &ElementSnapshot> + '_ {
        self.elements
            .iter()
            .skip(index + 1)
            .filter(move |el| self.is_descendant_of(el.index, index))
    }

    /// 1-based position of the element among its parent's element children
    pub fn sibling_position(&self, index: usize) -> usize {
        let Some(parent) = self.get(index).and_then(|el| el.parent) else {
            return 1;
        };
        self.children(parent)
            .position(|el| el.index == index)
            .map(|p| p + 1)
            .unwrap_or(1)
    }

    pub fn has_layout(&self) -> bool {
        self.elements.iter().any(|el| el.rect.is_some())
    }
}

/// Every browser interaction the heuristics need
///
/// Element arguments are snapshot indices. A fresh snapshot must be taken
/// after navigation since indices are only valid for the page they came from.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Rendered text of the whole page
    async fn page_text(&self) -> Result<String>;

    async fn snapshot(&self) -> Result<PageSnapshot>;

    /// Indices of the elements matching a CSS selector
    async fn query(&self, selector: &str) -> Result<Vec<usize>>;

    async fn click(&self, index: usize) -> Result<()>;

    /// Clear the control and type `value`
    async fn fill(&self, index: usize, value: &str) -> Result<()>;

    async fn select_option(&self, index: usize, label: &str) -> Result<()>;

    async fn upload(&self, index: usize, path: &Path) -> Result<()>;

    /// PNG bytes of the current viewport
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Handles of the open top-level windows and tabs
    async fn window_handles(&self) -> Result<Vec<String>>;

    async fn switch_to_window(&self, handle: &str) -> Result<()>;

    async fn wait(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Interaction log kept by drivers that do not touch a real browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PageAction {
    Goto { url: String },
    Click { index: usize },
    Fill { index: usize, value: String },
    Select { index: usize, label: String },
    Upload { index: usize, path: PathBuf },
    Screenshot,
    OpenWindow { url: String },
    SwitchWindow { handle: String },
}
