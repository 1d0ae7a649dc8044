// src/scoring.rs
//! Priority ranking of scraped postings

use std::collections::HashSet;

use crate::types::{ExperienceLevel, Job, Profile};
use crate::utils::parse_salary_max;

const BASE_SCORE: f64 = 50.0;
const SKILL_MATCH_POINTS: f64 = 5.0;
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Heuristic 0-100 score from salary, skill overlap and experience level
pub fn priority_score(job: &Job, profile: &Profile) -> f64 {
    let score = BASE_SCORE
        + salary_bonus(job.salary.as_deref())
        + skill_overlap(job, profile) as f64 * SKILL_MATCH_POINTS
        + experience_bonus(job.experience_level);

    score.clamp(MIN_SCORE, MAX_SCORE)
}

pub fn salary_bonus(salary: Option<&str>) -> f64 {
    let Some(text) = salary.map(str::trim).filter(|s| !s.is_empty()) else {
        return 0.0;
    };

    match parse_salary_max(text) {
        Some(max) if max >= 120_000 => 20.0,
        Some(max) if max >= 100_000 => 15.0,
        _ => 5.0,
    }
}

/// Number of profile skills the posting asks for.
///
/// Uses the posting's skill list when present, otherwise looks for the
/// profile's skills in the title and description.
pub fn skill_overlap(job: &Job, profile: &Profile) -> usize {
    if !job.skills.is_empty() {
        let wanted: HashSet<String> = job.skills.iter().map(|s| s.trim().to_lowercase()).collect();
        return wanted.iter().filter(|skill| profile.has_skill(skill)).count();
    }

    let haystack = format!("{} {}", job.title, job.description).to_lowercase();
    profile
        .skills
        .iter()
        .map(|s| s.to_lowercase())
        .collect::<HashSet<_>>()
        .iter()
        .filter(|skill| haystack.contains(skill.as_str()))
        .count()
}

pub fn experience_bonus(level: ExperienceLevel) -> f64 {
    match level {
        ExperienceLevel::Entry => 0.0,
        ExperienceLevel::Mid => 10.0,
        ExperienceLevel::Senior | ExperienceLevel::Executive => 15.0,
    }
}

/// Score every job in place and order them best first
pub fn rank_jobs(jobs: &mut [Job], profile: &Profile) {
    for job in jobs.iter_mut() {
        job.priority_score = priority_score(job, profile);
    }
    jobs.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            skills: vec!["Python".into(), "JavaScript".into(), "React".into(), "AWS".into()],
            ..Profile::default()
        }
    }

    fn job(salary: Option<&str>, skills: &[&str], level: ExperienceLevel) -> Job {
        Job::new("Engineer", "Tech Corp", "Remote", "test")
            .with_salary(salary.map(String::from))
            .with_skills(skills.iter().map(|s| s.to_string()).collect())
            .with_experience_level(level)
    }

    #[test]
    fn test_base_score() {
        let score = priority_score(&job(None, &[], ExperienceLevel::Entry), &profile());
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_full_match_is_clamped() {
        let j = job(
            Some("$140,000 - $160,000"),
            &["python", "JavaScript", "react", "aws"],
            ExperienceLevel::Senior,
        );
        // 50 + 20 + 4 * 5 + 15 = 105
        assert_eq!(priority_score(&j, &profile()), MAX_SCORE);
    }

    #[test]
    fn test_monotonic_in_salary() {
        let p = profile();
        let scores: Vec<f64> = [None, Some("$60,000"), Some("$105,000"), Some("$130k")]
            .iter()
            .map(|s| priority_score(&job(*s, &["Go"], ExperienceLevel::Mid), &p))
            .collect();

        assert_eq!(scores, vec![60.0, 65.0, 75.0, 80.0]);
        assert!(scores.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_monotonic_in_skill_overlap() {
        let p = profile();
        let skill_sets: [&[&str]; 4] = [
            &["Go"],
            &["Go", "Python"],
            &["Go", "Python", "React"],
            &["Go", "Python", "React", "AWS"],
        ];
        let scores: Vec<f64> = skill_sets
            .iter()
            .map(|skills| priority_score(&job(None, skills, ExperienceLevel::Entry), &p))
            .collect();

        assert!(scores.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_monotonic_in_experience_level() {
        let p = profile();
        let levels = [
            ExperienceLevel::Entry,
            ExperienceLevel::Mid,
            ExperienceLevel::Senior,
            ExperienceLevel::Executive,
        ];
        let scores: Vec<f64> = levels
            .iter()
            .map(|level| priority_score(&job(Some("$90,000"), &["React"], *level), &p))
            .collect();

        assert!(scores.windows(2).all(|w| w[0] <= w[1]));
        assert!(scores.iter().all(|s| (MIN_SCORE..=MAX_SCORE).contains(s)));
    }

    #[test]
    fn test_skills_from_description_when_list_empty() {
        let j = Job::new("Backend Developer", "Startup", "Remote", "test")
            .with_description("We use Python and AWS every day.".to_string());
        assert_eq!(skill_overlap(&j, &profile()), 2);
    }

    #[test]
    fn test_duplicate_job_skills_counted_once() {
        let j = job(None, &["Python", "python ", "PYTHON"], ExperienceLevel::Entry);
        assert_eq!(skill_overlap(&j, &profile()), 1);
    }

    #[test]
    fn test_rank_jobs_orders_best_first() {
        let p = profile();
        let mut jobs = vec![
            job(None, &[], ExperienceLevel::Entry),
            job(Some("$150k"), &["Python"], ExperienceLevel::Senior),
            job(Some("$80k"), &[], ExperienceLevel::Mid),
        ];
        rank_jobs(&mut jobs, &p);

        let scores: Vec<f64> = jobs.iter().map(|j| j.priority_score).collect();
        assert_eq!(scores, vec![90.0, 65.0, 50.0]);
    }
}
