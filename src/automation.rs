// src/automation.rs
//! Application sessions: walk pending jobs through the browser and record the outcome

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::core::{AppConfig, AutomationLogEntry, Database};
use crate::cover_letter::render_cover_letter;
use crate::detection::{
    ApplyButton, ApplyButtonDetector, ElementSnapshot, FillReport, FormFiller, LoginGate,
    PageDriver, PageSnapshot,
};
use crate::proof::ProofStore;
use crate::types::{ApplicationStatus, Job, Profile};

/// A form with fewer text fields is more likely a search box than an application
const MIN_APPLICATION_FIELDS: usize = 2;

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub max_applications: usize,
    pub page_load_delay: Duration,
    pub application_delay: Duration,
    /// Fill forms but never click submit or touch job statuses
    pub dry_run: bool,
    pub custom_message: String,
}

impl RunnerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_applications: config.max_applications_per_session,
            page_load_delay: config.page_load_delay(),
            application_delay: config.application_delay(),
            dry_run: false,
            custom_message: String::new(),
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub title: String,
    pub company: String,
    pub url: String,
    pub status: ApplicationStatus,
    pub note: String,
    pub apply_button: Option<String>,
    pub fill: Option<FillReport>,
    pub screenshot: Option<PathBuf>,
    pub elapsed_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub attempted: usize,
    pub applied: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub outcomes: Vec<JobOutcome>,
}

impl SessionSummary {
    fn new(session_id: String, started_at: DateTime<Utc>, dry_run: bool, outcomes: Vec<JobOutcome>) -> Self {
        let count = |status: ApplicationStatus| outcomes.iter().filter(|o| o.status == status).count();
        let applied = count(ApplicationStatus::Applied);
        let failed = count(ApplicationStatus::Failed);
        let attempted = outcomes.len();
        let success_rate = if attempted == 0 {
            0.0
        } else {
            applied as f64 / attempted as f64 * 100.0
        };

        Self {
            session_id,
            started_at,
            finished_at: Utc::now(),
            dry_run,
            attempted,
            applied,
            failed,
            success_rate,
            outcomes,
        }
    }
}

/// Where a single attempt ended, before it is written back
struct Attempt {
    status: ApplicationStatus,
    note: String,
    apply_button: Option<String>,
    fill: Option<FillReport>,
}

impl Attempt {
    fn failed(note: impl Into<String>) -> Self {
        Self {
            status: ApplicationStatus::Failed,
            note: note.into(),
            apply_button: None,
            fill: None,
        }
    }
}

pub struct ApplicationRunner<'a> {
    db: &'a Database,
    profile: &'a Profile,
    proof: ProofStore,
    detector: ApplyButtonDetector,
    settings: RunnerSettings,
}

impl<'a> ApplicationRunner<'a> {
    pub fn new(db: &'a Database, profile: &'a Profile, proof: ProofStore) -> Self {
        Self {
            db,
            profile,
            proof,
            detector: ApplyButtonDetector::default(),
            settings: RunnerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RunnerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Apply to the highest-priority pending jobs, one at a time
    pub async fn run_session(&self, page: &dyn PageDriver) -> Result<SessionSummary> {
        let session_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();

        let jobs = self
            .db
            .jobs()
            .list(
                Some(ApplicationStatus::Pending),
                Some(self.settings.max_applications),
            )
            .await
            .context("Failed to load pending jobs")?;

        info!(
            "Session {} starting with {} pending jobs (dry run: {})",
            session_id,
            jobs.len(),
            self.settings.dry_run
        );

        let mut outcomes = Vec::with_capacity(jobs.len());
        for (position, job) in jobs.iter().enumerate() {
            if position > 0 {
                page.wait(self.settings.application_delay).await;
            }
            info!(
                "[{}/{}] Applying to {} at {}",
                position + 1,
                jobs.len(),
                job.title,
                job.company
            );
            outcomes.push(self.apply_to_job(page, job, &session_id).await);
        }

        let summary = SessionSummary::new(session_id, started_at, self.settings.dry_run, outcomes);
        if let Err(e) = self.proof.save_session(&summary.session_id, &summary).await {
            error!("Failed to save session results: {:#}", e);
        }

        info!(
            "Session {} finished: {} attempted, {} applied, {} failed ({:.1}% success)",
            summary.session_id,
            summary.attempted,
            summary.applied,
            summary.failed,
            summary.success_rate
        );
        Ok(summary)
    }

    /// Run one application attempt; failures end up in the outcome, never as errors
    pub async fn apply_to_job(&self, page: &dyn PageDriver, job: &Job, session_id: &str) -> JobOutcome {
        let started = Instant::now();
        let target = job.apply_target().to_string();

        let attempt = match self.attempt(page, job, &target).await {
            Ok(attempt) => attempt,
            Err(e) => Attempt::failed(format!("{:#}", e)),
        };

        let screenshot = match page.screenshot().await {
            Ok(png) => self
                .proof
                .save_screenshot(&job.id, &png)
                .await
                .unwrap_or_else(|e| {
                    warn!("Could not store screenshot for {}: {:#}", job.id, e);
                    None
                }),
            Err(e) => {
                warn!("Screenshot failed for {}: {:#}", job.id, e);
                None
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as i64;

        match attempt.status {
            ApplicationStatus::Applied => info!("Applied to {} at {}", job.title, job.company),
            ApplicationStatus::Failed => warn!(
                "Application to {} at {} failed: {}",
                job.title, job.company, attempt.note
            ),
            ApplicationStatus::Pending => info!("Dry run for {}: {}", job.title, attempt.note),
        }

        self.record(job, session_id, &attempt, screenshot.as_ref(), elapsed_ms)
            .await;

        JobOutcome {
            job_id: job.id.clone(),
            title: job.title.clone(),
            company: job.company.clone(),
            url: target,
            status: attempt.status,
            note: attempt.note,
            apply_button: attempt.apply_button,
            fill: attempt.fill,
            screenshot,
            elapsed_ms,
        }
    }

    async fn attempt(&self, page: &dyn PageDriver, job: &Job, target: &str) -> Result<Attempt> {
        page.goto(target)
            .await
            .with_context(|| format!("Navigation failed for {}", target))?;
        page.wait(self.settings.page_load_delay).await;

        let cover_letter = render_cover_letter(self.profile, job, &self.settings.custom_message);
        let filler = FormFiller::new(self.profile)
            .with_cover_letter(cover_letter)
            .with_settle_delay(self.settings.page_load_delay);

        filler.dismiss_popups(page).await;

        let snapshot = page.snapshot().await?;
        let buttons: Vec<ApplyButton> = self
            .detector
            .find_apply_buttons(page)
            .await
            .into_iter()
            .filter(|b| !submits_application_form(&snapshot, b.index))
            .collect();
        let apply_button = if buttons.is_empty() {
            if !has_form_fields(&snapshot) {
                return Ok(Attempt::failed("No apply button found"));
            }
            info!("No apply button found, assuming already on application form");
            None
        } else {
            let windows = page.window_handles().await?;
            let clicked = click_first(page, &buttons)
                .await
                .context("Could not click any apply button")?;
            page.wait(self.settings.page_load_delay).await;
            follow_new_window(page, &windows)
                .await
                .context("Could not switch to the application window")?;
            Some(clicked.text.clone())
        };

        if filler.handle_login_gate(page).await? == LoginGate::Blocked {
            return Ok(Attempt {
                apply_button,
                ..Attempt::failed("Login required and no guest option")
            });
        }

        let mut fill = filler.fill_form(page).await?;
        fill.resume_uploaded = filler.upload_resume(page).await?;

        if self.settings.dry_run {
            return Ok(Attempt {
                status: ApplicationStatus::Pending,
                note: format!("Dry run: {} form actions, not submitted", fill.total_actions()),
                apply_button,
                fill: Some(fill),
            });
        }

        let outcome = filler.submit(page).await?;
        let (status, note) = match (&outcome.clicked, outcome.confirmed) {
            (Some(via), true) => (
                ApplicationStatus::Applied,
                format!("Submitted via {}, confirmation shown", via),
            ),
            (Some(via), false) => (
                ApplicationStatus::Failed,
                format!("Submitted via {} but no confirmation shown", via),
            ),
            (None, _) => (
                ApplicationStatus::Failed,
                "No submit control found".to_string(),
            ),
        };

        Ok(Attempt {
            status,
            note,
            apply_button,
            fill: Some(fill),
        })
    }

    async fn record(
        &self,
        job: &Job,
        session_id: &str,
        attempt: &Attempt,
        screenshot: Option<&PathBuf>,
        elapsed_ms: i64,
    ) {
        let repo = self.db.jobs();

        if !self.settings.dry_run {
            let screenshot = screenshot.map(|p| p.display().to_string());
            let result = async {
                repo.update_status(&job.id, attempt.status, None).await?;
                repo.record_application(
                    &job.id,
                    attempt.status,
                    Some(attempt.note.as_str()),
                    screenshot.as_deref(),
                )
                .await
            }
            .await;
            if let Err(e) = result {
                error!("Failed to record outcome for job {}: {:#}", job.id, e);
            }
        }

        let entry = AutomationLogEntry {
            session_id,
            action: "apply",
            job_id: Some(job.id.as_str()),
            status: attempt.status.as_str(),
            details: Some(attempt.note.as_str()),
            elapsed_ms: Some(elapsed_ms),
        };
        if let Err(e) = repo.log_action(entry).await {
            error!("Failed to log action for job {}: {:#}", job.id, e);
        }
    }
}

/// Click the best-ranked button, moving down the list when a click fails
async fn click_first<'b>(page: &dyn PageDriver, buttons: &'b [ApplyButton]) -> Result<&'b ApplyButton> {
    let mut last_error = None;
    for button in buttons {
        match page.click(button.index).await {
            Ok(()) => {
                info!("Clicked apply button '{}' ({})", button.text, button.method);
                return Ok(button);
            }
            Err(e) => {
                warn!("Click on '{}' failed: {:#}", button.text, e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("No apply buttons to click")))
}

/// Switch to a window or tab that was not open before the click
async fn follow_new_window(page: &dyn PageDriver, before: &[String]) -> Result<Option<String>> {
    let opened = page
        .window_handles()
        .await?
        .into_iter()
        .find(|handle| !before.contains(handle));
    if let Some(handle) = &opened {
        page.switch_to_window(handle).await?;
        info!("Apply button opened a new window, switched to {}", handle);
    }
    Ok(opened)
}

fn is_fillable(el: &ElementSnapshot) -> bool {
    el.is_text_input() && el.is_interactable()
}

fn has_form_fields(snapshot: &PageSnapshot) -> bool {
    snapshot.elements.iter().any(is_fillable)
}

/// Submit control of a form that already asks for applicant details
fn submits_application_form(snapshot: &PageSnapshot, index: usize) -> bool {
    snapshot
        .ancestors(index)
        .find(|el| el.tag == "form")
        .is_some_and(|form| {
            snapshot
                .descendants(form.index)
                .filter(|el| is_fillable(el))
                .count()
                >= MIN_APPLICATION_FIELDS
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{HtmlPage, PageAction};

    const LISTING: &str = r#"
        <html><body>
          <h1>Backend Engineer</h1>
          <p>Join our platform team.</p>
          <a id="apply" class="apply-button" href="/jobs/1/apply">Apply Now</a>
        </body></html>
    "#;

    const FORM: &str = r#"
        <html><body>
          <h2>Backend Engineer application</h2>
          <form action="/thanks">
            <input name="firstName"><input name="lastName">
            <input type="email" name="email">
            <textarea name="coverLetter"></textarea>
            <button type="submit">Submit application</button>
          </form>
        </body></html>
    "#;

    fn site() -> HtmlPage {
        HtmlPage::new("")
            .with_page("https://careers.example.com/jobs/1", LISTING)
            .with_page("https://careers.example.com/jobs/1/apply", FORM)
            .with_page(
                "https://careers.example.com/thanks",
                "<h1>Thank you for applying!</h1>",
            )
    }

    fn job(title: &str, url: &str, priority: f64) -> Job {
        let mut job = Job::new(title, "Example Co", "Remote", "mock").with_url(url.to_string());
        job.priority_score = priority;
        job
    }

    fn settings(max: usize, dry_run: bool) -> RunnerSettings {
        RunnerSettings {
            max_applications: max,
            page_load_delay: Duration::ZERO,
            application_delay: Duration::ZERO,
            dry_run,
            custom_message: String::new(),
        }
    }

    #[tokio::test]
    async fn test_session_applies_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::in_memory().await.unwrap();
        let profile = Profile::default();

        let good = job("Backend Engineer", "https://careers.example.com/jobs/1", 90.0);
        let broken = job("Data Engineer", "https://gone.example.com/jobs/2", 80.0);
        let later = job("QA Engineer", "https://careers.example.com/jobs/3", 10.0);
        db.jobs()
            .save_all(&[good.clone(), broken.clone(), later.clone()])
            .await
            .unwrap();

        let runner = ApplicationRunner::new(&db, &profile, ProofStore::new(dir.path()))
            .with_settings(settings(2, false));
        let page = site();
        let summary = runner.run_session(&page).await.unwrap();

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.success_rate, 50.0);

        let first = &summary.outcomes[0];
        assert_eq!(first.job_id, good.id);
        assert_eq!(first.status, ApplicationStatus::Applied);
        assert_eq!(first.apply_button.as_deref(), Some("Apply Now"));
        let fill = first.fill.as_ref().unwrap();
        assert_eq!(fill.filled.len(), 4);
        assert!(!fill.resume_uploaded);

        assert!(summary.outcomes[1].note.contains("Navigation failed"));

        let repo = db.jobs();
        let stored = repo.get(&good.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Applied);
        assert!(stored.applied_at.is_some());
        assert_eq!(
            repo.get(&broken.id).await.unwrap().unwrap().status,
            ApplicationStatus::Failed
        );
        assert_eq!(
            repo.get(&later.id).await.unwrap().unwrap().status,
            ApplicationStatus::Pending
        );
        assert_eq!(repo.applications_for(&good.id).await.unwrap().len(), 1);
        assert_eq!(repo.count_actions(&summary.session_id).await.unwrap(), 2);

        let dump = dir
            .path()
            .join("results")
            .join(format!("session_{}.json", summary.session_id));
        assert!(dump.exists());
    }

    #[tokio::test]
    async fn test_dry_run_leaves_status_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::in_memory().await.unwrap();
        let profile = Profile::default();
        let good = job("Backend Engineer", "https://careers.example.com/jobs/1", 90.0);
        db.jobs().save(&good).await.unwrap();

        let page = site();
        let summary = ApplicationRunner::new(&db, &profile, ProofStore::new(dir.path()))
            .with_settings(settings(5, true))
            .run_session(&page)
            .await
            .unwrap();

        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.applied, 0);
        assert_eq!(summary.outcomes[0].status, ApplicationStatus::Pending);
        assert!(summary.outcomes[0].note.starts_with("Dry run"));
        assert_eq!(
            db.jobs().get(&good.id).await.unwrap().unwrap().status,
            ApplicationStatus::Pending
        );
        assert!(!page.actions().iter().any(|a| matches!(
            a,
            PageAction::Goto { url } if url.ends_with("/thanks")
        )));
    }

    #[tokio::test]
    async fn test_apply_link_opening_new_tab_is_followed() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::in_memory().await.unwrap();
        let profile = Profile::default();
        let listing = LISTING.replace("<a id=\"apply\"", "<a target=\"_blank\" id=\"apply\"");
        let posting = job("Backend Engineer", "https://careers.example.com/jobs/1", 90.0);
        db.jobs().save(&posting).await.unwrap();

        let page = site().with_page("https://careers.example.com/jobs/1", listing);
        let outcome = ApplicationRunner::new(&db, &profile, ProofStore::new(dir.path()))
            .with_settings(settings(1, false))
            .apply_to_job(&page, &posting, "session-tab")
            .await;

        assert_eq!(outcome.status, ApplicationStatus::Applied);
        assert_eq!(page.window_handles().await.unwrap().len(), 2);
        assert!(page.actions().contains(&PageAction::SwitchWindow {
            handle: "window-1".to_string()
        }));
        assert!(page.page_text().await.unwrap().contains("Thank you"));
    }

    #[tokio::test]
    async fn test_page_without_button_or_form_fails() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::in_memory().await.unwrap();
        let profile = Profile::default();
        let closed = job("Closed Role", "https://careers.example.com/closed", 50.0);
        db.jobs().save(&closed).await.unwrap();

        let page = HtmlPage::new("")
            .with_page("https://careers.example.com/closed", "<p>This position has been filled.</p>");
        let runner = ApplicationRunner::new(&db, &profile, ProofStore::new(dir.path()))
            .with_settings(settings(1, false));
        let outcome = runner.apply_to_job(&page, &closed, "session-x").await;

        assert_eq!(outcome.status, ApplicationStatus::Failed);
        assert_eq!(outcome.note, "No apply button found");
    }

    #[tokio::test]
    async fn test_form_page_without_button_is_filled_directly() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::in_memory().await.unwrap();
        let profile = Profile::default();
        let direct = job("Backend Engineer", "https://careers.example.com/jobs/1/apply", 70.0);
        db.jobs().save(&direct).await.unwrap();

        let runner = ApplicationRunner::new(&db, &profile, ProofStore::new(dir.path()))
            .with_settings(settings(1, false));
        let outcome = runner.apply_to_job(&site(), &direct, "session-y").await;

        assert_eq!(outcome.status, ApplicationStatus::Applied);
        assert!(outcome.apply_button.is_none());
    }
}
