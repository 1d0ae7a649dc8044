// src/proof.rs
//! Proof artifacts: screenshots, session dumps and CSV job exports

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::FsOps;
use crate::types::{ApplicationStatus, ExperienceLevel, Job};

const SKILL_SEPARATOR: &str = "; ";

pub struct ProofStore {
    output_dir: PathBuf,
}

impl ProofStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.output_dir.join("screenshots")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.output_dir.join("results")
    }

    /// Store a PNG as `screenshots/<job_id>_<timestamp>.png`
    ///
    /// Drivers without a renderer hand back no bytes; nothing is written then.
    pub async fn save_screenshot(&self, job_id: &str, png: &[u8]) -> Result<Option<PathBuf>> {
        if png.is_empty() {
            debug!("No screenshot data for job {}", job_id);
            return Ok(None);
        }

        let path = FsOps::timestamped_path(&self.screenshots_dir(), job_id, "png");
        FsOps::write_bytes_safe(&path, png).await?;
        info!("Screenshot saved: {}", path.display());
        Ok(Some(path))
    }

    /// Dump a session summary as `results/session_<id>.json`
    pub async fn save_session<T: Serialize>(&self, session_id: &str, summary: &T) -> Result<PathBuf> {
        let path = self
            .results_dir()
            .join(format!("session_{}.json", session_id));
        let json =
            serde_json::to_string_pretty(summary).context("Failed to serialize session summary")?;

        FsOps::write_file_safe(&path, &json).await?;
        info!("Session results saved: {}", path.display());
        Ok(path)
    }
}

// ===== CSV =====

/// Flat CSV row; skills are joined into one column
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct CsvJob {
    id: String,
    title: String,
    company: String,
    location: String,
    salary: Option<String>,
    description: String,
    url: String,
    apply_url: Option<String>,
    posted_at: Option<DateTime<Utc>>,
    status: ApplicationStatus,
    source: String,
    job_type: String,
    experience_level: ExperienceLevel,
    skills: String,
    priority_score: f64,
    applied_at: Option<DateTime<Utc>>,
}

impl From<&Job> for CsvJob {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            title: job.title.clone(),
            company: job.company.clone(),
            location: job.location.clone(),
            salary: job.salary.clone(),
            description: job.description.clone(),
            url: job.url.clone(),
            apply_url: job.apply_url.clone(),
            posted_at: Some(job.posted_at),
            status: job.status,
            source: job.source.clone(),
            job_type: job.job_type.clone(),
            experience_level: job.experience_level,
            skills: job.skills.join(SKILL_SEPARATOR),
            priority_score: job.priority_score,
            applied_at: job.applied_at,
        }
    }
}

impl From<CsvJob> for Job {
    fn from(row: CsvJob) -> Self {
        let id = if row.id.trim().is_empty() {
            Job::generate_id(&row.title, &row.company, &row.location)
        } else {
            row.id
        };
        let skills = row
            .skills
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Job {
            id,
            title: row.title,
            company: row.company,
            location: row.location,
            salary: row.salary.filter(|s| !s.trim().is_empty()),
            description: row.description,
            url: row.url,
            apply_url: row.apply_url.filter(|s| !s.trim().is_empty()),
            posted_at: row.posted_at.unwrap_or_else(Utc::now),
            status: row.status,
            source: row.source,
            job_type: row.job_type,
            experience_level: row.experience_level,
            skills,
            priority_score: row.priority_score,
            applied_at: row.applied_at,
        }
    }
}

pub fn jobs_to_csv(jobs: &[Job]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for job in jobs {
        writer
            .serialize(CsvJob::from(job))
            .with_context(|| format!("Failed to write CSV row for job {}", job.id))?;
    }
    let bytes = writer.into_inner().context("Failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Parse jobs from CSV text; rows without a title are skipped
pub fn jobs_from_csv(content: &str) -> Result<Vec<Job>> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let mut jobs = Vec::new();

    for (line, result) in reader.deserialize::<CsvJob>().enumerate() {
        match result {
            Ok(row) if row.title.trim().is_empty() => {
                warn!("Skipping CSV row {} without a title", line + 1);
            }
            Ok(row) => jobs.push(Job::from(row)),
            Err(e) => warn!("CSV parsing error on row {}: {}", line + 1, e),
        }
    }

    Ok(jobs)
}

pub async fn export_jobs_csv(path: &Path, jobs: &[Job]) -> Result<usize> {
    let content = jobs_to_csv(jobs)?;
    FsOps::write_file_safe(path, &content).await?;
    info!("Exported {} jobs to {}", jobs.len(), path.display());
    Ok(jobs.len())
}

pub async fn import_jobs_csv(path: &Path) -> Result<Vec<Job>> {
    let content = FsOps::read_file_safe(path).await?;
    let jobs = jobs_from_csv(&content)?;
    info!("Read {} jobs from {}", jobs.len(), path.display());
    Ok(jobs)
}
