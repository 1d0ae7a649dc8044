// src/core/database.rs
//! SQLite job store - jobs, application log and automation log

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Executor, Sqlite, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

use crate::core::FsOps;
use crate::types::{ApplicationStatus, Job};

// ===== Core Database Connection Management =====

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file and run migrations
    pub async fn new(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            FsOps::ensure_dir_exists(parent).await?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path.display());
        let pool = SqlitePool::connect(&database_url).await.with_context(|| {
            format!("Failed to connect to database: {}", database_path.display())
        })?;

        info!(
            "Database connection established: {}",
            database_path.display()
        );

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Private in-memory database; a single pooled connection keeps it alive
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn jobs(&self) -> JobRepository<'_> {
        JobRepository::new(&self.pool)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT NOT NULL,
                salary TEXT,
                description TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL DEFAULT '',
                apply_url TEXT,
                posted_at TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                source TEXT NOT NULL,
                job_type TEXT NOT NULL DEFAULT 'full-time',
                experience_level TEXT NOT NULL DEFAULT 'mid',
                skills TEXT NOT NULL DEFAULT '[]',
                priority_score REAL NOT NULL DEFAULT 0.0,
                applied_at TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                CONSTRAINT status_check CHECK (status IN ('pending', 'applied', 'failed'))
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL REFERENCES jobs(id),
                status TEXT NOT NULL,
                notes TEXT,
                screenshot_path TEXT,
                applied_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS automation_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                action TEXT NOT NULL,
                job_id TEXT,
                status TEXT NOT NULL,
                details TEXT,
                elapsed_ms INTEGER,
                timestamp TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_priority ON jobs(priority_score DESC);")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_applications_job ON applications(job_id);")
            .execute(&self.pool)
            .await?;

        debug!("Database migrations completed");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }
}

// ===== Row Models =====

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    title: String,
    company: String,
    location: String,
    salary: Option<String>,
    description: String,
    url: String,
    apply_url: Option<String>,
    posted_at: DateTime<Utc>,
    status: String,
    source: String,
    job_type: String,
    experience_level: String,
    skills: String,
    priority_score: f64,
    applied_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = anyhow::Error;

    fn try_from(row: JobRow) -> Result<Self> {
        Ok(Job {
            status: row.status.parse()?,
            experience_level: row.experience_level.parse()?,
            skills: serde_json::from_str(&row.skills)
                .with_context(|| format!("Invalid skills column for job {}", row.id))?,
            id: row.id,
            title: row.title,
            company: row.company,
            location: row.location,
            salary: row.salary,
            description: row.description,
            url: row.url,
            apply_url: row.apply_url,
            posted_at: row.posted_at,
            source: row.source,
            job_type: row.job_type,
            priority_score: row.priority_score,
            applied_at: row.applied_at,
        })
    }
}

const JOB_COLUMNS: &str = "id, title, company, location, salary, description, url, apply_url, \
     posted_at, status, source, job_type, experience_level, skills, priority_score, applied_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApplicationRecord {
    pub id: i64,
    pub job_id: String,
    pub status: String,
    pub notes: Option<String>,
    pub screenshot_path: Option<String>,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatistics {
    pub total: i64,
    pub pending: i64,
    pub applied: i64,
    pub failed: i64,
    /// Applied share of finished attempts, in percent
    pub success_rate: f64,
}

/// One line of the automation audit trail
#[derive(Debug, Clone)]
pub struct AutomationLogEntry<'a> {
    pub session_id: &'a str,
    pub action: &'a str,
    pub job_id: Option<&'a str>,
    pub status: &'a str,
    pub details: Option<&'a str>,
    pub elapsed_ms: Option<i64>,
}

// ===== Job Repository =====

pub struct JobRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> JobRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    async fn upsert<'e, E>(executor: E, job: &Job) -> Result<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let skills = serde_json::to_string(&job.skills).context("Failed to encode skills")?;

        sqlx::query(
            r#"
            INSERT INTO jobs (id, title, company, location, salary, description, url, apply_url,
                              posted_at, status, source, job_type, experience_level, skills,
                              priority_score, applied_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                company = excluded.company,
                location = excluded.location,
                salary = excluded.salary,
                description = excluded.description,
                url = excluded.url,
                apply_url = excluded.apply_url,
                posted_at = excluded.posted_at,
                status = excluded.status,
                source = excluded.source,
                job_type = excluded.job_type,
                experience_level = excluded.experience_level,
                skills = excluded.skills,
                priority_score = excluded.priority_score,
                applied_at = excluded.applied_at
            "#,
        )
        .bind(&job.id)
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.salary)
        .bind(&job.description)
        .bind(&job.url)
        .bind(&job.apply_url)
        .bind(job.posted_at)
        .bind(job.status.as_str())
        .bind(&job.source)
        .bind(&job.job_type)
        .bind(job.experience_level.as_str())
        .bind(skills)
        .bind(job.priority_score)
        .bind(job.applied_at)
        .execute(executor)
        .await
        .with_context(|| format!("Failed to save job {}", job.id))?;

        Ok(())
    }

    /// Insert or replace a job by id
    pub async fn save(&self, job: &Job) -> Result<()> {
        Self::upsert(self.pool, job).await
    }

    /// Save a batch in one transaction
    pub async fn save_all(&self, jobs: &[Job]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for job in jobs {
            Self::upsert(&mut *tx, job).await?;
        }
        tx.commit().await?;

        info!("Saved {} jobs", jobs.len());
        Ok(jobs.len())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs WHERE id = ?",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    /// Jobs ordered by priority, optionally filtered by status
    pub async fn list(
        &self,
        status: Option<ApplicationStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Job>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let rows = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            SELECT {}
            FROM jobs
            WHERE (?1 IS NULL OR status = ?1)
            ORDER BY priority_score DESC, posted_at DESC
            LIMIT ?2
            "#,
            JOB_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    pub async fn by_status(&self, status: ApplicationStatus) -> Result<Vec<Job>> {
        self.list(Some(status), None).await
    }

    /// Stored job with the same lower-cased (title, company), if any
    pub async fn find_by_key(&self, title: &str, company: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            SELECT {}
            FROM jobs
            WHERE LOWER(TRIM(title)) = ? AND LOWER(TRIM(company)) = ?
            ORDER BY created_at ASC
            LIMIT 1
            "#,
            JOB_COLUMNS
        ))
        .bind(title.trim().to_lowercase())
        .bind(company.trim().to_lowercase())
        .fetch_optional(self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    /// Set a job's status; `applied_at` is stamped once on the first `applied`
    ///
    /// Returns false when no job has that id. With `notes`, an application
    /// log row is recorded as well.
    pub async fn update_status(
        &self,
        id: &str,
        status: ApplicationStatus,
        notes: Option<&str>,
    ) -> Result<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?1,
                applied_at = CASE WHEN ?1 = 'applied' THEN COALESCE(applied_at, ?2) ELSE applied_at END
            WHERE id = ?3
            "#,
        )
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .execute(self.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            debug!("Job {} marked {}", id, status);
            if let Some(notes) = notes {
                self.record_application(id, status, Some(notes), None).await?;
            }
        }

        Ok(updated)
    }

    pub async fn record_application(
        &self,
        job_id: &str,
        status: ApplicationStatus,
        notes: Option<&str>,
        screenshot_path: Option<&str>,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO applications (job_id, status, notes, screenshot_path, applied_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(notes)
        .bind(screenshot_path)
        .bind(Utc::now())
        .execute(self.pool)
        .await
        .with_context(|| format!("Failed to record application for job {}", job_id))?;

        Ok(result.last_insert_rowid())
    }

    pub async fn applications_for(&self, job_id: &str) -> Result<Vec<ApplicationRecord>> {
        let records = sqlx::query_as::<_, ApplicationRecord>(
            r#"
            SELECT id, job_id, status, notes, screenshot_path, applied_at
            FROM applications
            WHERE job_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    pub async fn log_action(&self, entry: AutomationLogEntry<'_>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO automation_logs (session_id, action, job_id, status, details, elapsed_ms)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.session_id)
        .bind(entry.action)
        .bind(entry.job_id)
        .bind(entry.status)
        .bind(entry.details)
        .bind(entry.elapsed_ms)
        .execute(self.pool)
        .await
        .context("Failed to write automation log")?;

        Ok(())
    }

    pub async fn count_actions(&self, session_id: &str) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM automation_logs WHERE session_id = ?")
                .bind(session_id)
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }

    pub async fn statistics(&self) -> Result<JobStatistics> {
        let counts: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM jobs GROUP BY status")
                .fetch_all(self.pool)
                .await?;

        let mut stats = JobStatistics::default();
        for (status, count) in counts {
            stats.total += count;
            match status.parse::<ApplicationStatus>() {
                Ok(ApplicationStatus::Pending) => stats.pending = count,
                Ok(ApplicationStatus::Applied) => stats.applied = count,
                Ok(ApplicationStatus::Failed) => stats.failed = count,
                Err(_) => {}
            }
        }

        let finished = stats.applied + stats.failed;
        if finished > 0 {
            stats.success_rate = stats.applied as f64 / finished as f64 * 100.0;
        }

        Ok(stats)
    }
}
