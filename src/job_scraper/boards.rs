// src/job_scraper/boards.rs
//! Job board definitions and listing-card parsing

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::SearchCriteria;
use crate::types::Job;
use crate::utils::clean_text;

const UNKNOWN_COMPANY: &str = "Unknown Company";
const UNKNOWN_LOCATION: &str = "Unknown Location";

/// A search results page and the selectors needed to read its cards
#[derive(Debug, Clone)]
pub struct JobBoard {
    pub name: &'static str,
    pub search_url: &'static str,
    pub base_url: &'static str,
    pub query_params: fn(&SearchCriteria) -> Vec<(&'static str, String)>,
    /// Tried in order; the first selector matching any card wins
    pub card_selectors: &'static [&'static str],
    pub title_selectors: &'static [&'static str],
    pub company_selectors: &'static [&'static str],
    pub location_selectors: &'static [&'static str],
    pub salary_selectors: &'static [&'static str],
    pub snippet_selectors: &'static [&'static str],
    pub link_selectors: &'static [&'static str],
    pub max_cards: usize,
}

impl JobBoard {
    pub fn indeed() -> Self {
        Self {
            name: "indeed",
            search_url: "https://www.indeed.com/jobs",
            base_url: "https://www.indeed.com",
            query_params: |criteria| {
                let mut params = vec![
                    ("q", criteria.query()),
                    ("l", criteria.location.clone()),
                    ("sort", "date".to_string()),
                ];
                if criteria.remote {
                    params.push(("remotejob", "032b3046-06a3-4876-8dfd-474eb5e7ed11".to_string()));
                }
                params
            },
            card_selectors: &[".job_seen_beacon", ".jobsearch-SerpJobCard", "div.result"],
            title_selectors: &["h2.jobTitle span[title]", "h2.jobTitle", "h2 a", "h2"],
            company_selectors: &["[data-testid='company-name']", ".companyName", "span.company"],
            location_selectors: &[
                "[data-testid='text-location']",
                ".companyLocation",
                ".location",
            ],
            salary_selectors: &[
                ".salary-snippet-container",
                "[data-testid='attribute_snippet_testid']",
                ".salaryText",
            ],
            snippet_selectors: &[".job-snippet", ".summary"],
            link_selectors: &["h2 a[href]", "a.jcs-JobTitle[href]", "a[href]"],
            max_cards: 15,
        }
    }

    pub fn simplyhired() -> Self {
        Self {
            name: "simplyhired",
            search_url: "https://www.simplyhired.com/search",
            base_url: "https://www.simplyhired.com",
            query_params: |criteria| {
                let mut params = vec![("q", criteria.query()), ("l", criteria.location.clone())];
                if criteria.remote {
                    params.push(("sr", "remote".to_string()));
                }
                params
            },
            card_selectors: &[
                "[data-testid='searchSerpJob']",
                "article.SerpJob",
                "article[class*='job']",
            ],
            title_selectors: &["[data-testid='searchSerpJobTitle']", "h2 a", "h3 a", "h2", "h3"],
            company_selectors: &["[data-testid='companyName']", "span[class*='company']"],
            location_selectors: &["[data-testid='searchSerpJobLocation']", "span[class*='location']"],
            salary_selectors: &["[data-testid='searchSerpJobSalaryEst']", "[class*='salary']"],
            snippet_selectors: &["[data-testid='searchSerpJobSnippet']", "p[class*='snippet']"],
            link_selectors: &["h2 a[href]", "h3 a[href]", "a[href]"],
            max_cards: 10,
        }
    }

    /// LinkedIn guest search API, which answers with bare `<li>` cards
    pub fn linkedin() -> Self {
        Self {
            name: "linkedin",
            search_url: "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search",
            base_url: "https://www.linkedin.com",
            query_params: |criteria| {
                let mut params = vec![
                    ("keywords", criteria.query()),
                    ("location", criteria.location.clone()),
                    ("sortBy", "DD".to_string()),
                ];
                if criteria.remote {
                    params.push(("f_WT", "2".to_string()));
                }
                params
            },
            card_selectors: &[".base-card", ".job-search-card", ".result-card", "li"],
            title_selectors: &[".base-search-card__title", "h3"],
            company_selectors: &[".base-search-card__subtitle", "h4"],
            location_selectors: &[".job-search-card__location"],
            salary_selectors: &[".job-search-card__salary-info"],
            snippet_selectors: &[".job-search-card__snippet"],
            link_selectors: &["a.base-card__full-link[href]", "a[href]"],
            max_cards: 20,
        }
    }

    pub fn all() -> Vec<Self> {
        vec![Self::indeed(), Self::simplyhired(), Self::linkedin()]
    }

    /// Case-insensitive lookup of a built-in board
    pub fn by_name(name: &str) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|board| board.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn search_url(&self, criteria: &SearchCriteria) -> Result<Url> {
        Url::parse_with_params(self.search_url, (self.query_params)(criteria))
            .with_context(|| format!("Invalid search URL for {}", self.name))
    }

    /// Parse up to `limit` (capped by the board's own limit) cards from a results page
    pub fn parse_listings(&self, html: &str, limit: usize) -> Vec<Job> {
        let document = Html::parse_document(html);
        let limit = limit.min(self.max_cards);

        let Some(cards) = self.select_cards(&document) else {
            debug!("{}: no job cards found", self.name);
            return Vec::new();
        };

        cards
            .into_iter()
            .filter_map(|card| self.parse_card(card))
            .take(limit)
            .collect()
    }

    fn select_cards<'a>(&self, document: &'a Html) -> Option<Vec<ElementRef<'a>>> {
        self.card_selectors.iter().find_map(|selector_str| {
            let selector = Selector::parse(selector_str).ok()?;
            let cards: Vec<_> = document.select(&selector).collect();
            if cards.is_empty() {
                None
            } else {
                debug!("{}: {} cards with selector {}", self.name, cards.len(), selector_str);
                Some(cards)
            }
        })
    }

    fn parse_card(&self, card: ElementRef<'_>) -> Option<Job> {
        let title = find_text_by_selectors(card, self.title_selectors)?;
        let company = find_text_by_selectors(card, self.company_selectors)
            .unwrap_or_else(|| UNKNOWN_COMPANY.to_string());
        let location = find_text_by_selectors(card, self.location_selectors)
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());
        let salary = find_text_by_selectors(card, self.salary_selectors);
        let description = find_text_by_selectors(card, self.snippet_selectors).unwrap_or_default();
        let url = self.find_link(card).unwrap_or_default();

        let mut job = Job::new(&title, &company, &location, self.name)
            .with_salary(salary)
            .with_description(description)
            .with_url(url);

        if let Some(posted_at) = find_posted_at(card) {
            job = job.with_posted_at(posted_at);
        }

        Some(job)
    }

    fn find_link(&self, card: ElementRef<'_>) -> Option<String> {
        let base = Url::parse(self.base_url).ok()?;

        self.link_selectors.iter().find_map(|selector_str| {
            let selector = Selector::parse(selector_str).ok()?;
            let href = card.select(&selector).next()?.value().attr("href")?;
            base.join(href.trim()).ok().map(String::from)
        })
    }
}

/// Text of the first descendant matching one of `selectors`, skipping empty hits
pub fn find_text_by_selectors(scope: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    for selector_str in selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = scope.select(&selector).next() {
                let text = element_text(element);
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

pub fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

fn find_posted_at(card: ElementRef<'_>) -> Option<DateTime<Utc>> {
    let selector = Selector::parse("time[datetime]").ok()?;
    let raw = card.select(&selector).next()?.value().attr("datetime")?;

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()?
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc())
        })
}
