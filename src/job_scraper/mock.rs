// src/job_scraper/mock.rs
//! Canned postings used when every board comes back empty

use chrono::{Duration, Utc};

use super::SearchCriteria;
use crate::types::{ExperienceLevel, Job};

struct MockPosting {
    title: &'static str,
    company: &'static str,
    salary: &'static str,
    skills: &'static [&'static str],
    level: ExperienceLevel,
    job_type: &'static str,
}

const MOCK_POSTINGS: &[MockPosting] = &[
    MockPosting {
        title: "Software Engineer",
        company: "Tech Corp",
        salary: "$120,000 - $150,000",
        skills: &["Python", "JavaScript", "React"],
        level: ExperienceLevel::Mid,
        job_type: "full-time",
    },
    MockPosting {
        title: "Senior Software Engineer",
        company: "Google",
        salary: "$180k - $250k",
        skills: &["Go", "Docker", "Kubernetes"],
        level: ExperienceLevel::Senior,
        job_type: "full-time",
    },
    MockPosting {
        title: "Full Stack Developer",
        company: "Stripe",
        salary: "$140k - $200k",
        skills: &["JavaScript", "React", "Node.js"],
        level: ExperienceLevel::Mid,
        job_type: "full-time",
    },
    MockPosting {
        title: "Backend Developer",
        company: "Databricks",
        salary: "$150k - $210k",
        skills: &["Scala", "Spark", "Kafka"],
        level: ExperienceLevel::Mid,
        job_type: "full-time",
    },
    MockPosting {
        title: "DevOps Engineer",
        company: "Snowflake",
        salary: "$130k - $190k",
        skills: &["AWS", "Docker", "Python"],
        level: ExperienceLevel::Mid,
        job_type: "contract",
    },
    MockPosting {
        title: "Machine Learning Engineer",
        company: "Netflix",
        salary: "$200k - $300k",
        skills: &["Python", "TensorFlow", "AWS"],
        level: ExperienceLevel::Senior,
        job_type: "full-time",
    },
    MockPosting {
        title: "Junior Frontend Developer",
        company: "Zoom",
        salary: "",
        skills: &["TypeScript", "Angular"],
        level: ExperienceLevel::Entry,
        job_type: "full-time",
    },
    MockPosting {
        title: "Data Engineer",
        company: "Salesforce",
        salary: "$125,000 - $160,000",
        skills: &["SQL", "Python", "Airflow"],
        level: ExperienceLevel::Mid,
        job_type: "full-time",
    },
];

/// Deterministic sample postings located at the searched location
pub fn mock_jobs(criteria: &SearchCriteria, count: usize) -> Vec<Job> {
    let location = if criteria.location.trim().is_empty() {
        "San Jose, CA"
    } else {
        criteria.location.trim()
    };
    let now = Utc::now();

    MOCK_POSTINGS
        .iter()
        .take(count)
        .enumerate()
        .map(|(i, posting)| {
            let job = Job::new(posting.title, posting.company, location, "mock");
            let url = format!(
                "https://jobs.{}.com/job-{}",
                posting.company.to_lowercase().replace(' ', ""),
                job.id
            );

            job.with_salary(Some(posting.salary.to_string()))
                .with_description(format!(
                    "Exciting {} role at {}. Join our innovative team working with {}.",
                    posting.title.to_lowercase(),
                    posting.company,
                    posting.skills.join(", ")
                ))
                .with_url(url)
                .with_skills(posting.skills.iter().map(|s| s.to_string()).collect())
                .with_experience_level(posting.level)
                .with_job_type(posting.job_type)
                .with_posted_at(now - Duration::days(i as i64))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::dedup_jobs;

    #[test]
    fn test_mock_jobs_are_unique_and_located() {
        let criteria = SearchCriteria {
            location: "Austin, TX".to_string(),
            ..SearchCriteria::default()
        };
        let jobs = mock_jobs(&criteria, 100);

        assert_eq!(jobs.len(), MOCK_POSTINGS.len());
        assert_eq!(dedup_jobs(jobs.clone()).len(), jobs.len());
        assert!(jobs.iter().all(|j| j.location == "Austin, TX" && j.source == "mock"));
        assert!(jobs.iter().all(|j| j.url.starts_with("https://jobs.")));
    }

    #[test]
    fn test_blank_salary_is_none() {
        let jobs = mock_jobs(&SearchCriteria::default(), 100);
        let junior = jobs.iter().find(|j| j.company == "Zoom").unwrap();
        assert!(junior.salary.is_none());
    }
}
