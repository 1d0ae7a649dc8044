// src/detection/mod.rs
//! Page heuristics: locating apply controls and completing application forms

pub mod apply_buttons;
pub mod form_filler;
pub mod html_page;
pub mod page;
pub mod webdriver;

pub use apply_buttons::{ApplyButton, ApplyButtonDetector, DetectionMethod};
pub use form_filler::{FieldKind, FillReport, FormFiller, LoginGate, SubmitOutcome};
pub use html_page::HtmlPage;
pub use page::{ElementSnapshot, PageAction, PageDriver, PageSnapshot, Rect};
pub use webdriver::WebDriverPage;
