// src/cover_letter.rs
//! Cover letter rendering from the profile template

use std::collections::HashMap;

use crate::types::{Job, Profile};

const FALLBACK_SKILL_COUNT: usize = 3;

/// Render the profile's cover letter template for `job`
pub fn render_cover_letter(profile: &Profile, job: &Job, custom_message: &str) -> String {
    let skills = relevant_skills(profile, job);
    let variables: HashMap<&str, String> = HashMap::from([
        ("job_title", job.title.clone()),
        ("company", job.company.clone()),
        ("relevant_skills", skills.join(", ")),
        ("custom_message", custom_message.trim().to_string()),
        ("first_name", profile.first_name.clone()),
        ("last_name", profile.last_name.clone()),
    ]);

    process_variables(&profile.cover_letter_template, &variables)
}

/// Substitute `{{var}}` and `${var}` placeholders in one left-to-right pass
///
/// Substituted values are never scanned again, so placeholders inside a value
/// (say a custom message mentioning `{{company}}`) come out verbatim. Unknown
/// placeholders are left as they are.
pub fn process_variables(content: &str, variables: &HashMap<&str, String>) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find(['{', '$']) {
        result.push_str(&rest[..start]);
        let tail = &rest[start..];

        let (open, close) = if tail.starts_with("{{") {
            ("{{", "}}")
        } else if tail.starts_with("${") {
            ("${", "}")
        } else {
            result.push_str(&tail[..1]);
            rest = &tail[1..];
            continue;
        };

        let Some(end) = tail[open.len()..].find(close) else {
            result.push_str(tail);
            rest = "";
            break;
        };
        let placeholder = &tail[..open.len() + end + close.len()];
        let name = tail[open.len()..open.len() + end].trim();
        match variables.get(name) {
            Some(value) => result.push_str(value),
            None => result.push_str(placeholder),
        }
        rest = &tail[placeholder.len()..];
    }

    result.push_str(rest);
    result
}

/// Profile skills the posting mentions, else the first few profile skills
pub fn relevant_skills(profile: &Profile, job: &Job) -> Vec<String> {
    let haystack = format!(
        "{} {} {}",
        job.title,
        job.description,
        job.skills.join(" ")
    )
    .to_lowercase();

    let mentioned: Vec<String> = profile
        .skills
        .iter()
        .filter(|skill| haystack.contains(&skill.to_lowercase()))
        .cloned()
        .collect();

    if mentioned.is_empty() {
        profile
            .skills
            .iter()
            .take(FALLBACK_SKILL_COUNT)
            .cloned()
            .collect()
    } else {
        mentioned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(description: &str) -> Job {
        Job::new("Backend Engineer", "Stripe", "Remote", "mock")
            .with_description(description.to_string())
    }

    #[test]
    fn test_render_default_template() {
        let profile = Profile::default();
        let letter = render_cover_letter(
            &profile,
            &job("We use Python, SQL and Docker daily"),
            "I have followed Stripe's engineering blog for years.",
        );

        assert!(letter.contains("the Backend Engineer position at Stripe"));
        assert!(letter.contains("background in Python, SQL, Docker"));
        assert!(letter.contains("engineering blog for years."));
        assert!(letter.contains("contribute to Stripe's success"));
        assert!(letter.ends_with("John Doe"));
        assert!(!letter.contains("{{"));
    }

    #[test]
    fn test_relevant_skills_fallback() {
        let profile = Profile::default();
        assert_eq!(
            relevant_skills(&profile, &job("Fortran and COBOL maintenance")),
            vec!["Python", "JavaScript", "React"]
        );
    }

    #[test]
    fn test_job_skill_list_counts_as_mention() {
        let profile = Profile::default();
        let job = job("").with_skills(vec!["AWS".to_string()]);
        assert_eq!(relevant_skills(&profile, &job), vec!["AWS"]);
    }

    #[test]
    fn test_shell_style_placeholders() {
        let profile = Profile {
            cover_letter_template: "Hi ${company}, {{first_name}} here about ${job_title}.".to_string(),
            ..Profile::default()
        };
        assert_eq!(
            render_cover_letter(&profile, &job(""), ""),
            "Hi Stripe, John here about Backend Engineer."
        );
    }

    #[test]
    fn test_custom_message_is_not_expanded() {
        let profile = Profile {
            cover_letter_template: "{{custom_message}} ({{company}})".to_string(),
            ..Profile::default()
        };
        let posting = job("");

        let rendered: Vec<String> = (0..50)
            .map(|_| render_cover_letter(&profile, &posting, "I admire {{company}}"))
            .collect();
        assert!(rendered.iter().all(|r| r == "I admire {{company}} (Stripe)"));
    }

    #[test]
    fn test_process_variables_leaves_unknown_and_unclosed() {
        let variables = HashMap::from([("name", "Ada".to_string())]);
        assert_eq!(
            process_variables("{{ name }} costs $5, {{other}} and ${name", &variables),
            "Ada costs $5, {{other}} and ${name"
        );
        assert_eq!(process_variables("${name}{", &variables), "Ada{");
    }
}
