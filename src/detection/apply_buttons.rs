// src/detection/apply_buttons.rs
//! Heuristic apply-button detection
//!
//! Five independent strategies nominate candidates from a page snapshot. The
//! candidates are validated, deduplicated by text and position, and returned
//! top-to-bottom. Strategies never fail the search: a selector the driver
//! rejects is skipped, and a page that cannot be snapshotted yields nothing.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

use super::page::{ElementSnapshot, PageDriver, PageSnapshot, Rect};
use crate::utils::truncate_chars;

pub const APPLY_TEXT_PATTERNS: &[&str] = &[
    "apply now",
    "apply with autofill",
    "quick apply",
    "easy apply",
    "apply",
    "apply for",
    "apply to",
    "submit application",
    "apply for this job",
    "apply for position",
    "one-click apply",
    "instant apply",
    "autofill",
    "auto-fill",
    "auto apply",
    "apply today",
    "apply here",
    "submit resume",
    "send application",
    "postuler",
    "candidater",
    "bewerben",
    "solicitar",
    "申请",
];

const ATTRIBUTE_PATTERNS: &[(&str, &[&str])] = &[
    (
        "class",
        &[
            "apply",
            "autofill",
            "quick",
            "easy",
            "submit",
            "application",
            "job-apply",
            "apply-btn",
            "apply-button",
            "btn-apply",
            "quick-apply",
            "easy-apply",
            "one-click",
            "instant-apply",
        ],
    ),
    ("data-action", &["apply", "submit", "quick-apply", "autofill"]),
    ("data-track", &["apply", "job-apply", "application"]),
    ("data-event", &["apply", "submit-application"]),
];

const VISUAL_WORDS: &[&str] = &["apply", "submit", "send", "quick", "easy", "autofill"];
const BOLD_WEIGHTS: &[&str] = &["bold", "bolder", "700", "600", "800", "900"];
const VISUAL_THRESHOLD: u32 = 3;

const CARD_SELECTORS: &[&str] = &[
    "[class*='job']",
    "[class*='card']",
    "[class*='listing']",
    "[class*='position']",
    "[class*='role']",
    "[data-job]",
];
const CARD_WORDS: &[&str] = &["apply", "submit", "quick", "easy"];
const EVENT_WORDS: &[&str] = &["apply", "submit", "quick", "autofill"];

const FINAL_KEYWORDS: &[&str] = &[
    "apply",
    "submit",
    "send",
    "quick",
    "easy",
    "autofill",
    "auto-fill",
    "instant",
    "one-click",
    "postuler",
    "bewerben",
];

const DEDUP_TEXT_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Text,
    Attribute,
    Visual,
    DomStructure,
    EventHandler,
}

impl DetectionMethod {
    pub const ALL: [DetectionMethod; 5] = [
        Self::Text,
        Self::Attribute,
        Self::Visual,
        Self::DomStructure,
        Self::EventHandler,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Attribute => "attribute",
            Self::Visual => "visual",
            Self::DomStructure => "dom_structure",
            Self::EventHandler => "event_handler",
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyButton {
    pub index: usize,
    pub text: String,
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub href: Option<String>,
    pub method: DetectionMethod,
    /// Pattern or selector that nominated the element
    pub matched: String,
    pub rect: Option<Rect>,
    pub selectors: Vec<String>,
}

impl ApplyButton {
    fn from_element(
        snapshot: &PageSnapshot,
        element: &ElementSnapshot,
        method: DetectionMethod,
        matched: &str,
    ) -> Self {
        Self {
            index: element.index,
            text: element.label().to_string(),
            tag: element.tag.clone(),
            id: element.id().map(String::from),
            classes: element.classes().into_iter().map(String::from).collect(),
            href: element.attr("href").map(String::from),
            method,
            matched: matched.to_string(),
            rect: element.rect,
            selectors: generate_selectors(snapshot, element),
        }
    }

    /// Text prefix plus position, identical for the same control found twice
    pub fn dedup_key(&self) -> String {
        let prefix = truncate_chars(&self.text, DEDUP_TEXT_CHARS);
        match self.rect {
            Some(rect) => format!("{}_{}_{}", prefix, rect.x.round(), rect.y.round()),
            None => format!("{}_#{}", prefix, self.index),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApplyButtonDetector {
    strategies: Vec<DetectionMethod>,
}

impl Default for ApplyButtonDetector {
    fn default() -> Self {
        Self {
            strategies: DetectionMethod::ALL.to_vec(),
        }
    }
}

impl ApplyButtonDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategies(mut self, strategies: &[DetectionMethod]) -> Self {
        self.strategies = strategies.to_vec();
        self
    }

    /// Validated, deduplicated apply controls ordered top to bottom
    ///
    /// An empty list means nothing was found.
    pub async fn find_apply_buttons(&self, page: &dyn PageDriver) -> Vec<ApplyButton> {
        let snapshot = match page.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Could not snapshot page for apply buttons: {:#}", e);
                return Vec::new();
            }
        };

        let mut candidates = Vec::new();
        for method in &self.strategies {
            let found = match method {
                DetectionMethod::Text => by_text(&snapshot),
                DetectionMethod::Attribute => by_attributes(page, &snapshot).await,
                DetectionMethod::Visual => by_visual(&snapshot),
                DetectionMethod::DomStructure => by_dom_structure(page, &snapshot).await,
                DetectionMethod::EventHandler => by_event_handlers(&snapshot),
            };
            debug!("Found {} candidates by {}", found.len(), method);
            candidates.extend(found);
        }

        let buttons = dedup_and_rank(candidates);
        info!(
            "Apply button search on {}: {} unique buttons",
            snapshot.url,
            buttons.len()
        );
        buttons
    }
}

// ===== Strategies =====

fn contains_any<'p>(haystack: &str, patterns: &[&'p str]) -> Option<&'p str> {
    patterns.iter().copied().find(|p| haystack.contains(p))
}

/// Element the user would actually click for a nominated element
fn resolve_clickable<'s>(snapshot: &'s PageSnapshot, element: &'s ElementSnapshot) -> &'s ElementSnapshot {
    if element.is_clickable() {
        return element;
    }

    if let Some(ancestor) = snapshot.ancestors(element.index).take(3).find(|a| a.is_clickable()) {
        return ancestor;
    }

    snapshot
        .descendants(element.index)
        .find(|d| d.is_clickable() && d.label() == element.label())
        .unwrap_or(element)
}

fn nominate(
    snapshot: &PageSnapshot,
    element: &ElementSnapshot,
    method: DetectionMethod,
    matched: &str,
) -> Option<ApplyButton> {
    let target = resolve_clickable(snapshot, element);
    is_valid_candidate(target).then(|| ApplyButton::from_element(snapshot, target, method, matched))
}

fn by_text(snapshot: &PageSnapshot) -> Vec<ApplyButton> {
    snapshot
        .elements
        .iter()
        .filter_map(|element| {
            let sources = [
                Some(element.own_text.as_str()),
                element.attr("aria-label"),
                element.attr("title"),
                element.attr("alt"),
            ];
            let pattern = sources
                .into_iter()
                .flatten()
                .find_map(|source| contains_any(&source.to_lowercase(), APPLY_TEXT_PATTERNS))?;
            nominate(snapshot, element, DetectionMethod::Text, pattern)
        })
        .collect()
}

async fn by_attributes(page: &dyn PageDriver, snapshot: &PageSnapshot) -> Vec<ApplyButton> {
    let mut found = Vec::new();

    for (attr, patterns) in ATTRIBUTE_PATTERNS {
        for pattern in *patterns {
            let selector = [
                format!("[{}*='{}']", attr, pattern),
                format!("button[{}*='{}']", attr, pattern),
                format!("a[{}*='{}']", attr, pattern),
                format!("div[{}*='{}'][onclick]", attr, pattern),
                format!("span[{}*='{}'][onclick]", attr, pattern),
            ]
            .join(", ");

            let indices = match page.query(&selector).await {
                Ok(indices) => indices,
                Err(e) => {
                    debug!("Skipping selector {}: {:#}", selector, e);
                    continue;
                }
            };

            let matched = format!("{}_{}", attr, pattern);
            found.extend(
                indices
                    .into_iter()
                    .filter_map(|i| snapshot.get(i))
                    .filter_map(|el| nominate(snapshot, el, DetectionMethod::Attribute, &matched)),
            );
        }
    }

    found
}

/// Size, wording and weight score of a clickable element
pub fn visual_score(element: &ElementSnapshot) -> u32 {
    let mut score = 0;

    if let Some(rect) = element.rect {
        if (80.0..=300.0).contains(&rect.width) && (25.0..=60.0).contains(&rect.height) {
            score += 2;
        }
    }

    let text = element.label().to_lowercase();
    score += VISUAL_WORDS.iter().filter(|w| text.contains(*w)).count() as u32 * 3;

    if element
        .font_weight
        .as_deref()
        .is_some_and(|w| BOLD_WEIGHTS.contains(&w.trim()))
    {
        score += 1;
    }

    score
}

fn by_visual(snapshot: &PageSnapshot) -> Vec<ApplyButton> {
    snapshot
        .elements
        .iter()
        .filter(|el| el.is_clickable())
        .filter(|el| visual_score(el) >= VISUAL_THRESHOLD)
        .filter_map(|el| nominate(snapshot, el, DetectionMethod::Visual, "visual_pattern"))
        .collect()
}

async fn by_dom_structure(page: &dyn PageDriver, snapshot: &PageSnapshot) -> Vec<ApplyButton> {
    let mut found = Vec::new();

    for selector in CARD_SELECTORS {
        let cards = match page.query(selector).await {
            Ok(cards) => cards,
            Err(e) => {
                debug!("Skipping card selector {}: {:#}", selector, e);
                continue;
            }
        };
        if cards.is_empty() {
            continue;
        }
        let cards: HashSet<usize> = cards.into_iter().collect();

        let matched = format!("dom_{}", selector);
        found.extend(
            snapshot
                .elements
                .iter()
                .filter(|el| el.is_clickable())
                .filter(|el| snapshot.ancestors(el.index).any(|a| cards.contains(&a.index)))
                .filter(|el| contains_any(&el.label().to_lowercase(), CARD_WORDS).is_some())
                .filter_map(|el| nominate(snapshot, el, DetectionMethod::DomStructure, &matched)),
        );
    }

    found
}

fn by_event_handlers(snapshot: &PageSnapshot) -> Vec<ApplyButton> {
    snapshot
        .elements
        .iter()
        .filter(|el| {
            el.has_click_handler
                || el.has_attr("onclick")
                || el.has_attr("data-action")
                || el.has_attr("data-click")
        })
        .filter(|el| contains_any(&el.text.to_lowercase(), EVENT_WORDS).is_some())
        .filter_map(|el| nominate(snapshot, el, DetectionMethod::EventHandler, "event_handler"))
        .collect()
}

// ===== Validation, Dedup and Ranking =====

/// Visible, enabled, big enough, and either clickable or short enough to be a label
pub fn is_valid_candidate(element: &ElementSnapshot) -> bool {
    if !element.is_interactable() {
        return false;
    }

    if let Some(rect) = element.rect {
        if rect.width < 20.0 || rect.height < 10.0 {
            return false;
        }
    }

    if matches!(element.tag.as_str(), "button" | "a" | "input") || element.is_clickable() {
        return true;
    }

    let length = element.label().chars().count();
    (1..=200).contains(&length)
}

/// Final acceptance: apply wording, button-sized, short label
pub fn validate_button(button: &ApplyButton) -> bool {
    let text = button.text.to_lowercase();

    if contains_any(&text, FINAL_KEYWORDS).is_none() {
        return false;
    }

    if let Some(rect) = button.rect {
        if rect.width < 50.0 || rect.height < 20.0 {
            return false;
        }
    }

    let length = text.chars().count();
    (3..=100).contains(&length)
}

/// First nomination of each control wins; rejected keys stay rejected
pub fn dedup_and_rank(candidates: Vec<ApplyButton>) -> Vec<ApplyButton> {
    let mut seen = HashSet::new();
    let mut buttons: Vec<ApplyButton> = candidates
        .into_iter()
        .filter(|button| seen.insert(button.dedup_key()))
        .filter(validate_button)
        .collect();

    if buttons.iter().all(|b| b.rect.is_some()) {
        buttons.sort_by(|a, b| {
            let (ra, rb) = (a.rect.unwrap_or_default(), b.rect.unwrap_or_default());
            ra.y.total_cmp(&rb.y)
                .then(ra.x.total_cmp(&rb.x))
                .then(a.index.cmp(&b.index))
        });
    } else {
        buttons.sort_by_key(|b| b.index);
    }

    buttons
}

/// CSS selectors that can relocate the element, most specific first
pub fn generate_selectors(snapshot: &PageSnapshot, element: &ElementSnapshot) -> Vec<String> {
    let mut selectors = Vec::new();

    if let Some(id) = element.id() {
        selectors.push(format!("#{}", id));
    }

    let classes = element.classes();
    if let Some(first) = classes.first() {
        selectors.push(format!(
            "{}.{}",
            element.tag,
            classes.iter().take(3).copied().collect::<Vec<_>>().join(".")
        ));
        selectors.push(format!(".{}", first));
    }

    for attr in ["data-action", "onclick", "href"] {
        if let Some(value) = element.attr(attr) {
            selectors.push(format!(
                "[{}='{}']",
                attr,
                truncate_chars(value, 50).replace('\'', "\\'")
            ));
        }
    }

    selectors.push(format!(
        "{}:nth-child({})",
        element.tag,
        snapshot.sibling_position(element.index)
    ));

    selectors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::HtmlPage;

    const JOB_LIST: &str = r#"
        <html><body>
          <nav><a href="/about">About us</a><a href="/login">Sign in</a></nav>
          <div class="job-card">
            <h3>Backend Engineer</h3>
            <button class="btn apply-btn primary" id="apply-1"><span>Apply Now</span></button>
          </div>
          <div class="job-card">
            <h3>Data Engineer</h3>
            <a href="/jobs/2/apply" class="link">Quick Apply</a>
          </div>
          <button style="display:none">Apply hidden</button>
          <button disabled>Apply disabled</button>
          <div onclick="openApply()" data-action="apply">Easy Apply</div>
          <button aria-label="Apply with autofill"><i class="icon"></i></button>
          <p>Applications close soon, apply before Friday and tell your friends about this great opportunity we have.</p>
        </body></html>
    "#;

    fn element(index: usize, tag: &str, text: &str, rect: Option<Rect>) -> ElementSnapshot {
        ElementSnapshot {
            index,
            tag: tag.to_string(),
            text: text.to_string(),
            own_text: text.to_string(),
            rect,
            displayed: true,
            enabled: true,
            ..ElementSnapshot::default()
        }
    }

    fn rect(x: f64, y: f64, width: f64, height: f64) -> Option<Rect> {
        Some(Rect {
            x,
            y,
            width,
            height,
        })
    }

    #[tokio::test]
    async fn test_finds_visible_apply_controls_in_document_order() {
        let page = HtmlPage::new(JOB_LIST);
        let buttons = ApplyButtonDetector::new().find_apply_buttons(&page).await;

        let texts: Vec<&str> = buttons.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Apply Now", "Quick Apply", "Easy Apply", "Apply with autofill"]
        );

        let first = &buttons[0];
        assert_eq!(first.tag, "button");
        assert_eq!(first.id.as_deref(), Some("apply-1"));
        assert_eq!(first.method, DetectionMethod::Text);
        assert_eq!(first.selectors[0], "#apply-1");
        assert_eq!(first.selectors[1], "button.btn.apply-btn.primary");

        assert_eq!(buttons[1].href.as_deref(), Some("/jobs/2/apply"));
    }

    #[tokio::test]
    async fn test_no_apply_controls_yields_empty() {
        let page = HtmlPage::new("<html><body><a href='/'>Home</a><button>Search</button></body></html>");
        assert!(ApplyButtonDetector::new().find_apply_buttons(&page).await.is_empty());
    }

    #[tokio::test]
    async fn test_single_strategy() {
        let page = HtmlPage::new(JOB_LIST);
        let buttons = ApplyButtonDetector::new()
            .with_strategies(&[DetectionMethod::EventHandler])
            .find_apply_buttons(&page)
            .await;

        assert_eq!(buttons.len(), 1);
        assert_eq!(buttons[0].text, "Easy Apply");
        assert_eq!(buttons[0].method, DetectionMethod::EventHandler);
    }

    #[tokio::test]
    async fn test_dom_structure_only_inside_cards() {
        let page = HtmlPage::new(JOB_LIST);
        let buttons = ApplyButtonDetector::new()
            .with_strategies(&[DetectionMethod::DomStructure])
            .find_apply_buttons(&page)
            .await;

        let texts: Vec<&str> = buttons.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["Apply Now", "Quick Apply"]);
    }

    #[test]
    fn test_visual_score() {
        let mut el = element(0, "button", "Apply now", rect(0.0, 0.0, 120.0, 40.0));
        assert_eq!(visual_score(&el), 5);

        el.font_weight = Some("700".to_string());
        assert_eq!(visual_score(&el), 6);

        let plain = element(1, "a", "Learn more", rect(0.0, 0.0, 120.0, 40.0));
        assert_eq!(visual_score(&plain), 2);
    }

    #[test]
    fn test_candidate_validation() {
        assert!(is_valid_candidate(&element(0, "button", "Apply", rect(0.0, 0.0, 60.0, 30.0))));
        assert!(!is_valid_candidate(&element(0, "button", "Apply", rect(0.0, 0.0, 10.0, 30.0))));

        let mut hidden = element(0, "button", "Apply", None);
        hidden.displayed = false;
        assert!(!is_valid_candidate(&hidden));

        assert!(!is_valid_candidate(&element(0, "span", "", None)));
        assert!(!is_valid_candidate(&element(0, "div", &"x".repeat(201), None)));
    }

    #[test]
    fn test_dedup_and_rank_by_position() {
        let snapshot = PageSnapshot::default();
        let make = |index: usize, text: &str, r: Option<Rect>, method: DetectionMethod| {
            ApplyButton::from_element(&snapshot, &element(index, "button", text, r), method, "")
        };

        let candidates = vec![
            make(3, "Apply now", rect(300.0, 500.0, 120.0, 40.0), DetectionMethod::Text),
            make(1, "Quick apply", rect(40.0, 100.0, 120.0, 40.0), DetectionMethod::Text),
            make(3, "Apply now", rect(300.0, 500.0, 120.0, 40.0), DetectionMethod::Visual),
            make(2, "Easy apply", rect(10.0, 100.0, 120.0, 40.0), DetectionMethod::Attribute),
            make(4, "Apply", rect(10.0, 700.0, 30.0, 40.0), DetectionMethod::Text),
            make(5, "Learn more", rect(10.0, 800.0, 120.0, 40.0), DetectionMethod::Visual),
        ];

        let ranked = dedup_and_rank(candidates);
        let summary: Vec<(&str, DetectionMethod)> =
            ranked.iter().map(|b| (b.text.as_str(), b.method)).collect();

        assert_eq!(
            summary,
            vec![
                ("Easy apply", DetectionMethod::Attribute),
                ("Quick apply", DetectionMethod::Text),
                ("Apply now", DetectionMethod::Text),
            ]
        );
    }

    #[test]
    fn test_final_validation_text_length() {
        let snapshot = PageSnapshot::default();
        let long = ApplyButton::from_element(
            &snapshot,
            &element(0, "a", &format!("apply {}", "x".repeat(120)), None),
            DetectionMethod::Text,
            "apply",
        );
        assert!(!validate_button(&long));

        let short = ApplyButton::from_element(
            &snapshot,
            &element(0, "a", "Go", None),
            DetectionMethod::Text,
            "apply",
        );
        assert!(!validate_button(&short));
    }
}
