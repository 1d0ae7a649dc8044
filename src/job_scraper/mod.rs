// src/job_scraper/mod.rs
//! Multi-board job search: fetch result pages, parse cards, merge, dedup and rank

pub mod boards;
pub mod mock;

pub use boards::JobBoard;

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::scoring::rank_jobs;
use crate::types::{Job, Profile};
use crate::utils::dedup_jobs;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct SearchCriteria {
    pub keywords: Vec<String>,
    pub location: String,
    pub remote: bool,
    pub limit_per_source: usize,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            keywords: vec!["software engineer".to_string()],
            location: "San Jose, CA".to_string(),
            remote: false,
            limit_per_source: 15,
        }
    }
}

impl SearchCriteria {
    pub fn query(&self) -> String {
        self.keywords.join(" ")
    }
}

pub struct JobScraper {
    client: Client,
    boards: Vec<JobBoard>,
    request_delay: Duration,
    mock_fallback: bool,
}

impl JobScraper {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            boards: JobBoard::all(),
            request_delay: Duration::ZERO,
            mock_fallback: true,
        })
    }

    pub fn with_boards(mut self, boards: Vec<JobBoard>) -> Self {
        self.boards = boards;
        self
    }

    /// Spacing between board requests
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_mock_fallback(mut self, enabled: bool) -> Self {
        self.mock_fallback = enabled;
        self
    }

    pub fn boards(&self) -> &[JobBoard] {
        &self.boards
    }

    /// Search every board concurrently, then merge, dedup and rank for `profile`
    ///
    /// A failing board is logged and contributes nothing. When no board
    /// returns anything the canned mock postings are used instead.
    pub async fn search(&self, criteria: &SearchCriteria, profile: &Profile) -> Result<Vec<Job>> {
        info!(
            "Searching {} boards for '{}' in {}",
            self.boards.len(),
            criteria.query(),
            criteria.location
        );

        let mut tasks = JoinSet::new();
        for (position, board) in self.boards.iter().cloned().enumerate() {
            let client = self.client.clone();
            let criteria = criteria.clone();
            let delay = self.request_delay * position as u32;

            tasks.spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let result = fetch_board(&client, &board, &criteria).await;
                (position, board.name, result)
            });
        }

        let mut per_board: Vec<(usize, Vec<Job>)> = Vec::with_capacity(self.boards.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, name, Ok(jobs))) => {
                    info!("{}: {} jobs", name, jobs.len());
                    per_board.push((position, jobs));
                }
                Ok((_, name, Err(e))) => {
                    error!("{} search failed: {:#}", name, e);
                }
                Err(e) => {
                    error!("Board task panicked or was cancelled: {}", e);
                }
            }
        }

        per_board.sort_by_key(|(position, _)| *position);
        let mut jobs: Vec<Job> = per_board.into_iter().flat_map(|(_, jobs)| jobs).collect();

        if jobs.is_empty() && self.mock_fallback {
            warn!("No jobs scraped from any board, using mock postings");
            jobs = mock::mock_jobs(criteria, criteria.limit_per_source);
        }

        let mut unique = dedup_jobs(jobs);
        rank_jobs(&mut unique, profile);

        info!("Total unique jobs: {}", unique.len());
        Ok(unique)
    }
}

/// HTTP client with a desktop browser user agent
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

pub async fn fetch_board(
    client: &Client,
    board: &JobBoard,
    criteria: &SearchCriteria,
) -> Result<Vec<Job>> {
    let url = board.search_url(criteria)?;
    debug!("{} URL: {}", board.name, url);

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {} results", board.name))?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP error from {}: {}", board.name, response.status());
    }

    let html = response
        .text()
        .await
        .context("Failed to read response body")?;

    Ok(board.parse_listings(&html, criteria.limit_per_source))
}
