// src/lib.rs
//! Job search automation: scrape boards, rank postings, find apply buttons
//! and fill application forms from a static profile.

pub mod automation;
pub mod cli;
pub mod core;
pub mod cover_letter;
pub mod detection;
pub mod job_scraper;
pub mod proof;
pub mod scoring;
pub mod types;
pub mod utils;

pub use automation::{ApplicationRunner, RunnerSettings, SessionSummary};
pub use core::{ConfigManager, Database};
pub use detection::{ApplyButton, ApplyButtonDetector, FormFiller, PageDriver};
pub use job_scraper::{JobScraper, SearchCriteria};
pub use types::{ApplicationStatus, Job, Profile};
