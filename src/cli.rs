// src/cli.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::automation::{ApplicationRunner, RunnerSettings, SessionSummary};
use crate::core::{ConfigManager, Database, FsOps};
use crate::cover_letter::render_cover_letter;
use crate::detection::{ApplyButtonDetector, HtmlPage, PageDriver, WebDriverPage};
use crate::job_scraper::{build_client, JobBoard, JobScraper, SearchCriteria};
use crate::proof::{export_jobs_csv, import_jobs_csv, ProofStore};
use crate::types::{ApplicationStatus, Job, Profile};
use crate::utils::{dedup_jobs, truncate_chars};

#[derive(Parser)]
#[command(name = "jobpilot")]
#[command(about = "Scrape job boards, rank postings and automate applications")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Overrides the database path from config.yaml
    #[arg(long, global = true)]
    pub database_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the output directories and the job database
    Init {
        /// Also write the default profile as TOML to this path
        #[arg(long)]
        profile_template: Option<PathBuf>,
    },
    /// Search job boards and store new postings
    Scrape {
        /// Search keywords
        #[arg(default_value = "software engineer")]
        keywords: Vec<String>,
        #[arg(long, default_value = "San Jose, CA")]
        location: String,
        #[arg(long)]
        remote: bool,
        /// Maximum postings per board (defaults to max_jobs_per_source)
        #[arg(long)]
        limit: Option<usize>,
        /// Comma-separated board names (indeed, simplyhired, linkedin)
        #[arg(long, value_delimiter = ',')]
        boards: Vec<String>,
        /// Do not fall back to mock postings when every board comes back empty
        #[arg(long)]
        no_mock: bool,
    },
    /// List stored jobs by priority
    List {
        #[arg(long)]
        status: Option<ApplicationStatus>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show the apply buttons found on a page
    Detect {
        url: String,
        /// Fetch the page over HTTP instead of driving a browser
        #[arg(long = "static")]
        static_page: bool,
    },
    /// Run an application session over pending jobs
    Apply {
        /// Maximum applications (defaults to max_applications_per_session)
        #[arg(long)]
        max: Option<usize>,
        /// Fill forms without submitting or updating job statuses
        #[arg(long)]
        dry_run: bool,
        /// Fetch pages over HTTP instead of driving a browser
        #[arg(long = "static")]
        static_page: bool,
        /// Extra paragraph for the cover letter
        #[arg(long, default_value = "")]
        message: String,
    },
    /// Set the status of a job
    Status {
        job_id: String,
        status: ApplicationStatus,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Show application statistics
    Stats,
    /// Export jobs to CSV
    Export {
        csv_file: PathBuf,
        #[arg(long)]
        status: Option<ApplicationStatus>,
    },
    /// Import jobs from a CSV file
    Import { csv_file: PathBuf },
    /// Render the cover letter for a stored job
    CoverLetter {
        job_id: String,
        #[arg(long, default_value = "")]
        message: String,
    },
}

pub async fn handle_command(cli: Cli, manager: ConfigManager) -> Result<()> {
    let mut config = manager.config.clone();
    if let Some(path) = cli.database_path {
        config.database_path = path;
    }

    manager.ensure_directories().await?;
    let db = Database::new(&config.database_path).await?;
    let profile = Profile::load(manager.profile_path()).await?;
    let repo = db.jobs();

    match cli.command {
        Command::Init { profile_template } => {
            db.health_check().await?;
            info!("✅ Database ready: {}", config.database_path.display());
            info!("✅ Output directory: {}", config.output_path.display());

            if let Some(path) = profile_template {
                match write_profile_template(&path).await {
                    Ok(true) => info!("✅ Profile template written: {}", path.display()),
                    Ok(false) => info!("⚠️  Profile already exists: {}", path.display()),
                    Err(e) => {
                        error!("Failed to write profile template: {:#}", e);
                        info!("❌ Error: {}", e);
                    }
                }
            }
        }

        Command::Scrape {
            keywords,
            location,
            remote,
            limit,
            boards,
            no_mock,
        } => {
            let criteria = SearchCriteria {
                keywords,
                location,
                remote,
                limit_per_source: limit.unwrap_or(config.max_jobs_per_source),
            };

            let mut scraper = JobScraper::new(config.request_timeout())?
                .with_request_delay(config.scraping_delay())
                .with_mock_fallback(!no_mock);
            if !boards.is_empty() {
                scraper = scraper.with_boards(select_boards(&boards));
            }
            if scraper.boards().is_empty() {
                info!("❌ Error: none of {:?} is a known board", boards);
                return Ok(());
            }

            match scraper.search(&criteria, &profile).await {
                Ok(jobs) => match store_new_jobs(&db, jobs).await {
                    Ok((saved, skipped)) => {
                        info!("✅ Saved {} new jobs ({} already stored)", saved, skipped);
                    }
                    Err(e) => {
                        error!("Failed to store jobs: {:#}", e);
                        info!("❌ Error: {}", e);
                    }
                },
                Err(e) => {
                    error!("Scrape failed: {:#}", e);
                    info!("❌ Error: {}", e);
                }
            }
        }

        Command::List { status, limit } => match repo.list(status, Some(limit)).await {
            Ok(jobs) if jobs.is_empty() => info!("No jobs found."),
            Ok(jobs) => {
                info!(
                    "{:<17} {:<6} {:<8} {:<35} {:<20}",
                    "ID", "Score", "Status", "Title", "Company"
                );
                info!("{}", "-".repeat(90));
                for job in jobs {
                    info!(
                        "{:<17} {:<6.1} {:<8} {:<35} {:<20}",
                        job.id,
                        job.priority_score,
                        job.status.as_str(),
                        truncate_chars(&job.title, 35),
                        truncate_chars(&job.company, 20)
                    );
                }
            }
            Err(e) => {
                error!("Failed to list jobs: {:#}", e);
                info!("❌ Error: {}", e);
            }
        },

        Command::Detect { url, static_page } => {
            let detector = ApplyButtonDetector::new();
            let result = if static_page {
                detect_static(&detector, &url, &config).await
            } else {
                detect_live(&detector, &url, &config).await
            };
            if let Err(e) = result {
                error!("Detection failed: {:#}", e);
                info!("❌ Error: {}", e);
            }
        }

        Command::Apply {
            max,
            dry_run,
            static_page,
            message,
        } => {
            let mut settings = RunnerSettings::from_config(&config);
            settings.max_applications = max.unwrap_or(settings.max_applications);
            settings.dry_run = dry_run;
            settings.custom_message = message;

            let runner = ApplicationRunner::new(&db, &profile, ProofStore::new(&config.output_path))
                .with_settings(settings);

            let result = if static_page {
                let page = HtmlPage::new(String::new())
                    .with_client(build_client(config.request_timeout())?);
                runner.run_session(&page).await
            } else {
                match WebDriverPage::connect(&config.webdriver_url, config.headless).await {
                    Ok(page) => {
                        let summary = runner.run_session(&page).await;
                        if let Err(e) = page.close().await {
                            warn!("Failed to close browser session: {:#}", e);
                        }
                        summary
                    }
                    Err(e) => Err(e),
                }
            };

            match result {
                Ok(summary) => log_summary(&summary),
                Err(e) => {
                    error!("Application session failed: {:#}", e);
                    info!("❌ Error: {}", e);
                }
            }
        }

        Command::Status {
            job_id,
            status,
            notes,
        } => match repo.update_status(&job_id, status, notes.as_deref()).await {
            Ok(true) => info!("✅ Job {} marked {}", job_id, status),
            Ok(false) => info!("❌ No job found with id: {}", job_id),
            Err(e) => {
                error!("Failed to update job status: {:#}", e);
                info!("❌ Error: {}", e);
            }
        },

        Command::Stats => match repo.statistics().await {
            Ok(stats) => {
                info!("Total jobs:   {}", stats.total);
                info!("Pending:      {}", stats.pending);
                info!("Applied:      {}", stats.applied);
                info!("Failed:       {}", stats.failed);
                info!("Success rate: {:.1}%", stats.success_rate);
            }
            Err(e) => {
                error!("Failed to compute statistics: {:#}", e);
                info!("❌ Error: {}", e);
            }
        },

        Command::Export { csv_file, status } => {
            let result = async {
                let jobs = repo.list(status, None).await?;
                export_jobs_csv(&csv_file, &jobs).await
            }
            .await;
            match result {
                Ok(count) => info!("✅ Exported {} jobs to {}", count, csv_file.display()),
                Err(e) => {
                    error!("Export failed: {:#}", e);
                    info!("❌ Error: {}", e);
                }
            }
        }

        Command::Import { csv_file } => {
            if !csv_file.exists() {
                info!("❌ CSV file not found: {}", csv_file.display());
                return Ok(());
            }

            let result = async {
                let jobs = import_jobs_csv(&csv_file).await?;
                store_new_jobs(&db, jobs).await
            }
            .await;
            match result {
                Ok((saved, skipped)) => {
                    info!("Import completed:");
                    info!("  ✅ Imported: {}", saved);
                    info!("  ⚠️  Skipped (already stored): {}", skipped);
                }
                Err(e) => {
                    error!("Import failed: {:#}", e);
                    info!("❌ Error: {}", e);
                }
            }
        }

        Command::CoverLetter { job_id, message } => match repo.get(&job_id).await {
            Ok(Some(job)) => println!("{}", render_cover_letter(&profile, &job, &message)),
            Ok(None) => info!("❌ No job found with id: {}", job_id),
            Err(e) => {
                error!("Failed to load job: {:#}", e);
                info!("❌ Error: {}", e);
            }
        },
    }

    Ok(())
}

/// Boards named on the command line, skipping unknown names
fn select_boards(names: &[String]) -> Vec<JobBoard> {
    names
        .iter()
        .filter_map(|name| {
            let board = JobBoard::by_name(name);
            if board.is_none() {
                warn!("Unknown board '{}' ignored", name);
            }
            board
        })
        .collect()
}

/// Save jobs whose (title, company) is not stored yet; returns (saved, skipped)
async fn store_new_jobs(db: &Database, jobs: Vec<Job>) -> Result<(usize, usize)> {
    let repo = db.jobs();
    let total = jobs.len();
    let unique = dedup_jobs(jobs);
    let mut fresh = Vec::with_capacity(unique.len());
    let mut skipped = total - unique.len();

    for job in unique {
        if repo.find_by_key(&job.title, &job.company).await?.is_some() {
            skipped += 1;
        } else {
            fresh.push(job);
        }
    }

    let saved = repo.save_all(&fresh).await?;
    Ok((saved, skipped))
}

async fn write_profile_template(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let content =
        toml::to_string_pretty(&Profile::default()).context("Failed to serialize profile")?;
    FsOps::write_file_safe(path, &content).await?;
    Ok(true)
}

async fn detect_static(
    detector: &ApplyButtonDetector,
    url: &str,
    config: &crate::core::AppConfig,
) -> Result<()> {
    let page = HtmlPage::fetch(build_client(config.request_timeout())?, url).await?;
    report_buttons(detector, &page, url).await;
    Ok(())
}

async fn detect_live(
    detector: &ApplyButtonDetector,
    url: &str,
    config: &crate::core::AppConfig,
) -> Result<()> {
    let page = WebDriverPage::connect(&config.webdriver_url, config.headless).await?;
    let result = async {
        page.goto(url).await?;
        page.wait(config.page_load_delay()).await;
        report_buttons(detector, &page, url).await;
        Ok::<(), anyhow::Error>(())
    }
    .await;
    page.close().await?;
    result
}

async fn report_buttons(detector: &ApplyButtonDetector, page: &dyn PageDriver, url: &str) {
    let buttons = detector.find_apply_buttons(page).await;
    if buttons.is_empty() {
        info!("❌ No apply buttons found on {}", url);
        return;
    }

    info!("✅ {} apply buttons on {}", buttons.len(), url);
    for (rank, button) in buttons.iter().enumerate() {
        info!(
            "  {}. '{}' <{}> via {} ({})",
            rank + 1,
            button.text,
            button.tag,
            button.method,
            button.selectors.first().map(String::as_str).unwrap_or("-")
        );
    }
}

fn log_summary(summary: &SessionSummary) {
    info!("Session {} completed:", summary.session_id);
    info!("  Attempted: {}", summary.attempted);
    info!("  ✅ Applied: {}", summary.applied);
    info!("  ❌ Failed: {}", summary.failed);
    info!("  Success rate: {:.1}%", summary.success_rate);
    for outcome in &summary.outcomes {
        info!(
            "  [{}] {} at {}: {}",
            outcome.status, outcome.title, outcome.company, outcome.note
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scrape_arguments() {
        let cli = Cli::parse_from([
            "jobpilot",
            "scrape",
            "rust",
            "backend",
            "--remote",
            "--boards",
            "indeed,linkedin",
            "--limit",
            "5",
        ]);
        match cli.command {
            Command::Scrape {
                keywords,
                remote,
                boards,
                limit,
                no_mock,
                ..
            } => {
                assert_eq!(keywords, vec!["rust", "backend"]);
                assert!(remote);
                assert_eq!(boards, vec!["indeed", "linkedin"]);
                assert_eq!(limit, Some(5));
                assert!(!no_mock);
            }
            _ => panic!("expected scrape"),
        }
    }

    #[test]
    fn test_parse_status_value() {
        let cli = Cli::parse_from(["jobpilot", "status", "abc123", "applied", "--notes", "Phone screen"]);
        match cli.command {
            Command::Status { job_id, status, notes } => {
                assert_eq!(job_id, "abc123");
                assert_eq!(status, ApplicationStatus::Applied);
                assert_eq!(notes.as_deref(), Some("Phone screen"));
            }
            _ => panic!("expected status"),
        }
        assert!(Cli::try_parse_from(["jobpilot", "status", "abc123", "interview"]).is_err());
    }

    #[test]
    fn test_board_selection() {
        let names = vec!["LinkedIn".to_string(), "monster".to_string(), "indeed".to_string()];
        let scraper = JobScraper::new(std::time::Duration::from_secs(1))
            .unwrap()
            .with_boards(select_boards(&names));
        let selected: Vec<_> = scraper.boards().iter().map(|b| b.name).collect();
        assert_eq!(selected, vec!["linkedin", "indeed"]);

        assert!(select_boards(&["monster".to_string()]).is_empty());
    }

    #[tokio::test]
    async fn test_store_new_jobs_skips_known_postings() {
        let db = Database::in_memory().await.unwrap();
        let first = Job::new("Backend Engineer", "Stripe", "Remote", "indeed");
        db.jobs().save(&first).await.unwrap();

        let jobs = vec![
            Job::new("backend engineer", "STRIPE", "San Francisco, CA", "linkedin"),
            Job::new("Data Engineer", "Snowflake", "Remote", "linkedin"),
        ];
        assert_eq!(store_new_jobs(&db, jobs).await.unwrap(), (1, 1));
        assert_eq!(db.jobs().statistics().await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_store_new_jobs_skips_duplicates_within_batch() {
        let db = Database::in_memory().await.unwrap();
        let jobs = vec![
            Job::new("Data Engineer", "Snowflake", "Remote", "indeed"),
            Job::new("data engineer", "snowflake", "Denver, CO", "linkedin"),
            Job::new("ML Engineer", "Snowflake", "Remote", "linkedin"),
        ];

        assert_eq!(store_new_jobs(&db, jobs).await.unwrap(), (2, 1));
        let stored = db.jobs().find_by_key("Data Engineer", "Snowflake").await.unwrap().unwrap();
        assert_eq!(stored.source, "indeed");
        assert_eq!(db.jobs().statistics().await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_profile_template_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.toml");

        assert!(write_profile_template(&path).await.unwrap());
        assert!(!write_profile_template(&path).await.unwrap());

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(Profile::from_toml(&written).unwrap().first_name, "John");
    }
}
