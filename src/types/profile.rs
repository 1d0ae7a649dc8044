// src/types/profile.rs
//! Static applicant profile used to pre-fill application forms

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::FsOps;

const DEFAULT_COVER_LETTER: &str = "Dear Hiring Manager,

I am excited to apply for the {{job_title}} position at {{company}}. With my background in {{relevant_skills}}, I believe I would be a valuable addition to your team.

{{custom_message}}

I look forward to discussing how my experience can contribute to {{company}}'s success.

Best regards,
{{first_name}} {{last_name}}";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: Address,
    pub linkedin_url: String,
    pub github_url: String,
    pub website: String,
    pub resume_path: PathBuf,
    pub cover_letter_template: String,
    pub skills: Vec<String>,
    pub experience: Vec<ExperienceEntry>,
    pub years_of_experience: u32,
    pub education: Education,
    pub work_authorization: WorkAuthorization,
    pub salary_expectation: String,
    /// Free-form start date; 30 days out when unset
    pub available_start: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceEntry {
    pub company: String,
    pub title: String,
    pub start: String,
    pub end: Option<String>,
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Education {
    pub degree: String,
    pub field_of_study: String,
    pub university: String,
    pub graduation_year: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkAuthorization {
    pub status: String,
    pub requires_sponsorship: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            email: "john.doe@email.com".to_string(),
            phone: "(555) 123-4567".to_string(),
            address: Address::default(),
            linkedin_url: "https://linkedin.com/in/johndoe".to_string(),
            github_url: "https://github.com/johndoe".to_string(),
            website: "https://johndoe.com".to_string(),
            resume_path: PathBuf::from("data/resume.pdf"),
            cover_letter_template: DEFAULT_COVER_LETTER.to_string(),
            skills: [
                "Python", "JavaScript", "React", "Node.js", "SQL", "Git", "AWS", "Docker",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            experience: vec![ExperienceEntry {
                company: "Acme Software".to_string(),
                title: "Software Engineer".to_string(),
                start: "2019".to_string(),
                end: None,
                highlights: vec![
                    "Built and operated customer-facing web services".to_string(),
                    "Automated deployment pipelines on AWS".to_string(),
                ],
            }],
            years_of_experience: 5,
            education: Education::default(),
            work_authorization: WorkAuthorization::default(),
            salary_expectation: "120000".to_string(),
            available_start: None,
        }
    }
}

impl Default for Address {
    fn default() -> Self {
        Self {
            street: "123 Main Street".to_string(),
            city: "San Francisco".to_string(),
            state: "CA".to_string(),
            zip_code: "94105".to_string(),
            country: "United States".to_string(),
        }
    }
}

impl Default for Education {
    fn default() -> Self {
        Self {
            degree: "Bachelor of Science".to_string(),
            field_of_study: "Computer Science".to_string(),
            university: "State University".to_string(),
            graduation_year: "2018".to_string(),
        }
    }
}

impl Default for WorkAuthorization {
    fn default() -> Self {
        Self {
            status: "US Citizen".to_string(),
            requires_sponsorship: false,
        }
    }
}

impl Profile {
    /// Built-in profile, or the TOML file at `path` when given
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = FsOps::read_file_safe(path).await?;
        let profile = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse profile: {}", path.display()))?;

        info!("Loaded profile for {} from {}", profile.full_name(), path.display());
        Ok(profile)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid profile TOML")
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn has_skill(&self, skill: &str) -> bool {
        let skill = skill.trim().to_lowercase();
        self.skills.iter().any(|s| s.to_lowercase() == skill)
    }

    pub fn start_date(&self) -> String {
        self.available_start.clone().unwrap_or_else(|| {
            (Utc::now() + Duration::days(30))
                .format("%m/%d/%Y")
                .to_string()
        })
    }
}
