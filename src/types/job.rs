// src/types/job.rs
//! Job postings as scraped from boards and tracked through an application attempt

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ===== Status Enums =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Applied,
    Failed,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Applied => "applied",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "applied" => Ok(Self::Applied),
            "failed" => Ok(Self::Failed),
            other => anyhow::bail!(
                "Unknown application status: {}. Use pending, applied or failed",
                other
            ),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Entry,
    #[default]
    Mid,
    Senior,
    Executive,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Mid => "mid",
            Self::Senior => "senior",
            Self::Executive => "executive",
        }
    }

    /// Guess the level from a posting title, defaulting to mid
    ///
    /// Keywords match whole words, so "Internal Tools" is not an internship.
    pub fn from_title(title: &str) -> Self {
        let lower = title.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has_any = |phrases: &[&str]| phrases.iter().any(|p| contains_phrase(&words, p));

        if has_any(&["director", "vp", "vice president", "head of", "chief"]) {
            Self::Executive
        } else if has_any(&["senior", "sr", "staff", "principal", "lead"]) {
            Self::Senior
        } else if has_any(&[
            "junior", "jr", "intern", "internship", "entry", "graduate", "new grad",
        ]) {
            Self::Entry
        } else {
            Self::Mid
        }
    }
}

/// Whether the words of `phrase` appear consecutively in `words`
fn contains_phrase(words: &[&str], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    !needle.is_empty() && words.windows(needle.len()).any(|window| window == needle.as_slice())
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperienceLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "entry" | "junior" | "intern" => Ok(Self::Entry),
            "mid" | "intermediate" => Ok(Self::Mid),
            "senior" => Ok(Self::Senior),
            "executive" | "director" => Ok(Self::Executive),
            other => anyhow::bail!("Unknown experience level: {}", other),
        }
    }
}

// ===== Job Record =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub salary: Option<String>,
    pub description: String,
    pub url: String,
    pub apply_url: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub status: ApplicationStatus,
    pub source: String,
    pub job_type: String,
    pub experience_level: ExperienceLevel,
    pub skills: Vec<String>,
    pub priority_score: f64,
    pub applied_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(title: &str, company: &str, location: &str, source: &str) -> Self {
        Self {
            id: Self::generate_id(title, company, location),
            title: title.to_string(),
            company: company.to_string(),
            location: location.to_string(),
            salary: None,
            description: String::new(),
            url: String::new(),
            apply_url: None,
            posted_at: Utc::now(),
            status: ApplicationStatus::Pending,
            source: source.to_string(),
            job_type: "full-time".to_string(),
            experience_level: ExperienceLevel::from_title(title),
            skills: Vec::new(),
            priority_score: 0.0,
            applied_at: None,
        }
    }

    pub fn with_salary(mut self, salary: Option<String>) -> Self {
        self.salary = salary.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }

    pub fn with_url(mut self, url: String) -> Self {
        self.url = url;
        self
    }

    pub fn with_apply_url(mut self, apply_url: Option<String>) -> Self {
        self.apply_url = apply_url;
        self
    }

    pub fn with_skills(mut self, skills: Vec<String>) -> Self {
        self.skills = skills;
        self
    }

    pub fn with_experience_level(mut self, level: ExperienceLevel) -> Self {
        self.experience_level = level;
        self
    }

    pub fn with_job_type(mut self, job_type: &str) -> Self {
        self.job_type = job_type.to_string();
        self
    }

    pub fn with_posted_at(mut self, posted_at: DateTime<Utc>) -> Self {
        self.posted_at = posted_at;
        self
    }

    /// Stable 16 hex char id derived from title, company and location
    pub fn generate_id(title: &str, company: &str, location: &str) -> String {
        let key = format!("{}_{}_{}", title.trim(), company.trim(), location.trim())
            .to_lowercase()
            .replace(' ', "_");
        let digest = Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes())
            .simple()
            .to_string();
        digest[..16].to_string()
    }

    /// Lower-cased (title, company) pair used to spot duplicate postings
    pub fn dedup_key(&self) -> (String, String) {
        (
            self.title.trim().to_lowercase(),
            self.company.trim().to_lowercase(),
        )
    }

    /// URL the browser should open to apply
    pub fn apply_target(&self) -> &str {
        match self.apply_url.as_deref() {
            Some(url) if !url.trim().is_empty() => url,
            _ => &self.url,
        }
    }

    /// Flatten into a string-keyed JSON object
    pub fn to_dict(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self).context("Failed to serialize job")? {
            Value::Object(map) => Ok(map),
            other => anyhow::bail!("Job serialized to a non-object value: {}", other),
        }
    }

    pub fn from_dict(dict: Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(dict)).context("Failed to parse job from dictionary")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_job() -> Job {
        Job::new("Software Engineer", "Tech Corp", "San Jose, CA", "indeed")
            .with_salary(Some("$120,000 - $150,000".to_string()))
            .with_description("Build services in Rust and Python".to_string())
            .with_url("https://indeed.com/job123".to_string())
            .with_apply_url(Some("https://techcorp.com/careers/123/apply".to_string()))
            .with_skills(vec!["Rust".to_string(), "Python".to_string()])
            .with_posted_at(Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap())
    }

    #[test]
    fn test_dict_round_trip_preserves_fields() {
        let mut job = sample_job();
        job.priority_score = 85.5;
        job.status = ApplicationStatus::Applied;
        job.applied_at = Some(Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap());

        let dict = job.to_dict().unwrap();
        assert_eq!(dict["status"], "applied");
        assert_eq!(dict["experience_level"], "mid");
        assert_eq!(dict["skills"], serde_json::json!(["Rust", "Python"]));

        let parsed = Job::from_dict(dict).unwrap();
        assert_eq!(parsed, job);
    }

    #[test]
    fn test_dict_with_missing_optionals() {
        let job = Job::new("QA Engineer", "Startup", "Remote", "mock");
        let dict = job.to_dict().unwrap();

        assert!(dict["salary"].is_null());
        assert!(dict["apply_url"].is_null());
        assert!(dict["applied_at"].is_null());
        assert_eq!(Job::from_dict(dict).unwrap(), job);
    }

    #[test]
    fn test_generate_id_is_stable_and_case_insensitive() {
        let a = Job::generate_id("Software Engineer", "Tech Corp", "San Jose, CA");
        let b = Job::generate_id("software engineer", "TECH CORP", "san jose, ca");
        let c = Job::generate_id("Data Engineer", "Tech Corp", "San Jose, CA");

        assert_eq!(a.len(), 16);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("Applied".parse::<ApplicationStatus>().unwrap(), ApplicationStatus::Applied);
        assert_eq!(" pending ".parse::<ApplicationStatus>().unwrap(), ApplicationStatus::Pending);
        assert!("interview".parse::<ApplicationStatus>().is_err());
        assert_eq!(ApplicationStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_experience_level_from_title() {
        assert_eq!(ExperienceLevel::from_title("Senior Backend Engineer"), ExperienceLevel::Senior);
        assert_eq!(ExperienceLevel::from_title("Director of Engineering"), ExperienceLevel::Executive);
        assert_eq!(ExperienceLevel::from_title("Software Engineering Intern"), ExperienceLevel::Entry);
        assert_eq!(ExperienceLevel::from_title("Software Engineer"), ExperienceLevel::Mid);
        assert_eq!(ExperienceLevel::from_title("Internal Tools Engineer"), ExperienceLevel::Mid);
        assert_eq!(ExperienceLevel::from_title("Leadership Development Analyst"), ExperienceLevel::Mid);
        assert_eq!(ExperienceLevel::from_title("Sr. Data Engineer"), ExperienceLevel::Senior);
        assert_eq!(ExperienceLevel::from_title("VP, Engineering"), ExperienceLevel::Executive);
        assert_eq!(ExperienceLevel::from_title("Entry-Level QA (New Grad)"), ExperienceLevel::Entry);
    }

    #[test]
    fn test_apply_target_falls_back_to_listing_url() {
        let job = sample_job();
        assert_eq!(job.apply_target(), "https://techcorp.com/careers/123/apply");

        let job = job.with_apply_url(Some("  ".to_string()));
        assert_eq!(job.apply_target(), "https://indeed.com/job123");
    }
}
