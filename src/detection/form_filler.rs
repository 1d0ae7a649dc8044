// src/detection/form_filler.rs
//! Application form filling from the static profile

use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::page::{ElementSnapshot, PageDriver, PageSnapshot};
use crate::types::Profile;

const UPLOAD_SELECTORS: &[&str] = &[
    "input[type='file'][accept*='pdf']",
    "input[type='file']",
    "[data-automation-id='fileUpload']",
    ".file-upload input",
    "#resumeUpload",
    "[name='resume']",
];

const POPUP_SELECTORS: &[&str] = &[
    "#onetrust-accept-btn-handler",
    ".cookie-accept-button",
    "[data-automation-id='acceptCookies']",
    ".accept-cookies",
    "#acceptAllCookies",
    ".cookie-banner button",
];

const LOGIN_INDICATORS: &[&str] = &["login", "sign in", "create account", "register"];

const GUEST_SELECTORS: &[&str] = &[
    "[data-automation-id='externalCandidate']",
    ".external-candidate",
    "[title*='External']",
    ".guest-application",
];
const GUEST_WORDS: &[&str] = &["external", "guest"];

const SUBMIT_SELECTORS: &[&str] = &[
    "button[type='submit']",
    "input[type='submit']",
    "[data-automation-id='submitApplication']",
    "#submitApplication",
    ".submit-button",
];
const SUBMIT_WORDS: &[&str] = &["submit", "apply"];

pub const SUCCESS_INDICATORS: &[&str] = &[
    "application submitted",
    "thank you",
    "application received",
    "successfully applied",
    "your application has been sent",
];

const WORK_AUTH_FIELDS: &[&str] = &["workAuth", "authorization", "workAuthorization"];
const SPONSORSHIP_FIELDS: &[&str] = &["sponsorship", "requiresSponsorship"];
const DEGREE_FIELDS: &[&str] = &["education", "degree"];

const REQUIRED_TEXT_DEFAULT: &str = "Not specified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    FirstName,
    LastName,
    FullName,
    Email,
    Phone,
    LinkedIn,
    GitHub,
    Website,
    Street,
    City,
    State,
    ZipCode,
    Country,
    YearsOfExperience,
    University,
    GraduationYear,
    Salary,
    StartDate,
    CoverLetter,
}

impl FieldKind {
    /// Fill order; specific name parts come before the full name
    pub const ALL: [FieldKind; 19] = [
        Self::FirstName,
        Self::LastName,
        Self::FullName,
        Self::Email,
        Self::Phone,
        Self::LinkedIn,
        Self::GitHub,
        Self::Website,
        Self::Street,
        Self::City,
        Self::State,
        Self::ZipCode,
        Self::Country,
        Self::YearsOfExperience,
        Self::University,
        Self::GraduationYear,
        Self::Salary,
        Self::StartDate,
        Self::CoverLetter,
    ];

    /// Field names, ids and automation ids the control commonly goes by
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::FirstName => &["firstName", "first_name", "fname", "first-name"],
            Self::LastName => &["lastName", "last_name", "lname", "last-name"],
            Self::FullName => &["fullName", "full_name", "name"],
            Self::Email => &["email", "emailAddress", "email_address"],
            Self::Phone => &["phone", "phoneNumber", "mobile", "telephone"],
            Self::LinkedIn => &["linkedin", "linkedIn", "linkedinUrl", "linkedin_url"],
            Self::GitHub => &["github", "githubUrl", "github_url"],
            Self::Website => &["website", "portfolio", "personalWebsite"],
            Self::Street => &["address", "street", "address1"],
            Self::City => &["city"],
            Self::State => &["state", "province"],
            Self::ZipCode => &["zip", "zipCode", "postalCode"],
            Self::Country => &["country"],
            Self::YearsOfExperience => &["experience", "yearsExperience"],
            Self::University => &["university", "school"],
            Self::GraduationYear => &["graduationYear"],
            Self::Salary => &["salary", "expectedSalary"],
            Self::StartDate => &["startDate", "availableDate"],
            Self::CoverLetter => &["coverLetter", "cover_letter", "cover-letter"],
        }
    }

    fn extra_selectors(&self) -> &'static [&'static str] {
        match self {
            Self::Email => &["input[type='email']"],
            Self::Phone => &["input[type='tel']"],
            Self::LinkedIn => &["input[placeholder*='LinkedIn']"],
            Self::CoverLetter => &["textarea[name*='cover']", "textarea[id*='cover']"],
            _ => &[],
        }
    }

    /// Candidate selectors in priority order
    pub fn selectors(&self) -> Vec<String> {
        self.keywords()
            .iter()
            .flat_map(|k| {
                [
                    format!("[name='{}']", k),
                    format!("[id='{}']", k),
                    format!("[data-automation-id='{}']", k),
                    format!("input[placeholder*='{}']", k),
                    format!("#{}", k),
                    format!(".{}", k),
                ]
            })
            .chain(self.extra_selectors().iter().map(|s| s.to_string()))
            .collect()
    }

    pub fn value_for(&self, profile: &Profile, cover_letter: &str) -> String {
        match self {
            Self::FirstName => profile.first_name.clone(),
            Self::LastName => profile.last_name.clone(),
            Self::FullName => profile.full_name(),
            Self::Email => profile.email.clone(),
            Self::Phone => profile.phone.clone(),
            Self::LinkedIn => profile.linkedin_url.clone(),
            Self::GitHub => profile.github_url.clone(),
            Self::Website => profile.website.clone(),
            Self::Street => profile.address.street.clone(),
            Self::City => profile.address.city.clone(),
            Self::State => profile.address.state.clone(),
            Self::ZipCode => profile.address.zip_code.clone(),
            Self::Country => profile.address.country.clone(),
            Self::YearsOfExperience => profile.years_of_experience.to_string(),
            Self::University => profile.education.university.clone(),
            Self::GraduationYear => profile.education.graduation_year.clone(),
            Self::Salary => profile.salary_expectation.clone(),
            Self::StartDate => profile.start_date(),
            Self::CoverLetter => cover_letter.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilledField {
    pub kind: FieldKind,
    pub selector: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DropdownChoice {
    pub field: String,
    pub option: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FillReport {
    pub filled: Vec<FilledField>,
    pub resume_uploaded: bool,
    pub dropdowns: Vec<DropdownChoice>,
    pub required_defaulted: usize,
}

impl FillReport {
    pub fn filled_kinds(&self) -> Vec<FieldKind> {
        self.filled.iter().map(|f| f.kind).collect()
    }

    pub fn total_actions(&self) -> usize {
        self.filled.len()
            + self.dropdowns.len()
            + self.required_defaulted
            + usize::from(self.resume_uploaded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "via", rename_all = "snake_case")]
pub enum LoginGate {
    NotRequired,
    /// A guest or external-candidate option was clicked
    GuestSelected(String),
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitOutcome {
    /// Selector or label of the control that was clicked
    pub clicked: Option<String>,
    /// Confirmation text appeared afterwards
    pub confirmed: bool,
}

pub struct FormFiller<'a> {
    profile: &'a Profile,
    cover_letter: String,
    settle_delay: Duration,
}

impl<'a> FormFiller<'a> {
    pub fn new(profile: &'a Profile) -> Self {
        Self {
            profile,
            cover_letter: String::new(),
            settle_delay: Duration::from_secs(3),
        }
    }

    pub fn with_cover_letter(mut self, cover_letter: String) -> Self {
        self.cover_letter = cover_letter;
        self
    }

    /// Pause after clicks that change the page
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Fill profile fields, dropdowns and leftover required fields
    pub async fn fill_form(&self, page: &dyn PageDriver) -> Result<FillReport> {
        let snapshot = page.snapshot().await?;
        let mut report = FillReport::default();
        let mut used: HashSet<usize> = HashSet::new();

        for kind in FieldKind::ALL {
            let value = kind.value_for(self.profile, &self.cover_letter);
            if value.trim().is_empty() {
                continue;
            }
            if let Some(filled) = self.fill_field(page, &snapshot, kind, &value, &used).await {
                used.insert(filled.index);
                report.filled.push(filled);
            }
        }

        let sponsorship = if self.profile.work_authorization.requires_sponsorship {
            "Yes"
        } else {
            "No"
        };
        let dropdowns = [
            (WORK_AUTH_FIELDS, self.profile.work_authorization.status.as_str()),
            (SPONSORSHIP_FIELDS, sponsorship),
            (DEGREE_FIELDS, self.profile.education.degree.as_str()),
        ];
        for (names, wanted) in dropdowns {
            if let Some(choice) = self
                .select_dropdown(page, &snapshot, names, wanted, &used)
                .await
            {
                report.dropdowns.push(choice.0);
                used.insert(choice.1);
            }
        }

        report.required_defaulted = self.fill_required_fields(page, &used).await?;

        info!(
            "Filled {} fields, {} dropdowns, {} required defaults",
            report.filled.len(),
            report.dropdowns.len(),
            report.required_defaulted
        );
        Ok(report)
    }

    async fn fill_field(
        &self,
        page: &dyn PageDriver,
        snapshot: &PageSnapshot,
        kind: FieldKind,
        value: &str,
        used: &HashSet<usize>,
    ) -> Option<FilledField> {
        for selector in kind.selectors() {
            let indices = match page.query(&selector).await {
                Ok(indices) => indices,
                Err(e) => {
                    debug!("Skipping selector {}: {:#}", selector, e);
                    continue;
                }
            };

            let target = indices
                .into_iter()
                .filter(|i| !used.contains(i))
                .filter_map(|i| snapshot.get(i))
                .find(|el| el.is_interactable() && (el.is_text_input() || el.tag == "select"));
            let Some(target) = target else {
                continue;
            };

            let result = if target.tag == "select" {
                match best_option(target, value) {
                    Some(option) => page.select_option(target.index, &option).await,
                    None => continue,
                }
            } else {
                page.fill(target.index, value).await
            };

            match result {
                Ok(()) => {
                    debug!("Filled {:?} via {}", kind, selector);
                    return Some(FilledField {
                        kind,
                        selector,
                        index: target.index,
                    });
                }
                Err(e) => warn!("Could not fill {:?} via {}: {:#}", kind, selector, e),
            }
        }
        None
    }

    async fn select_dropdown(
        &self,
        page: &dyn PageDriver,
        snapshot: &PageSnapshot,
        names: &[&str],
        wanted: &str,
        used: &HashSet<usize>,
    ) -> Option<(DropdownChoice, usize)> {
        if wanted.trim().is_empty() {
            return None;
        }

        for name in names {
            let selectors = [
                format!("select[name='{}']", name),
                format!("select[id='{}']", name),
                format!("#{}", name),
                format!(".{} select", name),
            ];
            for selector in selectors {
                let Ok(indices) = page.query(&selector).await else {
                    continue;
                };
                let dropdown = indices
                    .into_iter()
                    .filter(|i| !used.contains(i))
                    .filter_map(|i| snapshot.get(i))
                    .find(|el| el.tag == "select" && el.is_interactable());
                let Some(dropdown) = dropdown else {
                    continue;
                };
                let Some(option) = best_option(dropdown, wanted) else {
                    continue;
                };

                match page.select_option(dropdown.index, &option).await {
                    Ok(()) => {
                        info!("Selected {}: {}", name, option);
                        return Some((
                            DropdownChoice {
                                field: name.to_string(),
                                option,
                            },
                            dropdown.index,
                        ));
                    }
                    Err(e) => warn!("Could not select {} in {}: {:#}", option, name, e),
                }
            }
        }
        None
    }

    /// Default every visible required control still empty; returns how many
    pub async fn fill_required_fields(
        &self,
        page: &dyn PageDriver,
        used: &HashSet<usize>,
    ) -> Result<usize> {
        let snapshot = page.snapshot().await?;
        let mut defaulted = 0;

        for element in &snapshot.elements {
            if used.contains(&element.index)
                || !element.is_interactable()
                || !element.value.trim().is_empty()
            {
                continue;
            }
            let required = element.is_required()
                || snapshot
                    .ancestors(element.index)
                    .any(|a| a.classes().contains(&"required"));
            if !required {
                continue;
            }

            let result = match element.tag.as_str() {
                "select" => match first_real_option(element) {
                    Some(option) => page.select_option(element.index, &option).await,
                    None => continue,
                },
                "textarea" => page.fill(element.index, REQUIRED_TEXT_DEFAULT).await,
                "input" => match element.input_type().as_str() {
                    "text" => page.fill(element.index, REQUIRED_TEXT_DEFAULT).await,
                    "email" => page.fill(element.index, &self.profile.email).await,
                    "tel" => page.fill(element.index, &self.profile.phone).await,
                    _ => continue,
                },
                _ => continue,
            };

            match result {
                Ok(()) => {
                    defaulted += 1;
                    debug!(
                        "Defaulted required field {}",
                        element.attr("name").or(element.id()).unwrap_or(&element.tag)
                    );
                }
                Err(e) => warn!("Could not default required field {}: {:#}", element.index, e),
            }
        }

        Ok(defaulted)
    }

    /// Attach the resume to the first file input found; false when none is
    pub async fn upload_resume(&self, page: &dyn PageDriver) -> Result<bool> {
        let resume: &PathBuf = &self.profile.resume_path;
        if !resume.exists() {
            warn!("Resume file not found: {}", resume.display());
            return Ok(false);
        }

        let snapshot = page.snapshot().await?;
        for selector in UPLOAD_SELECTORS {
            let Ok(indices) = page.query(selector).await else {
                continue;
            };
            for index in indices {
                let Some(input) = file_input(&snapshot, index) else {
                    continue;
                };
                match page.upload(input.index, resume).await {
                    Ok(()) => {
                        info!("Uploaded resume via {}", selector);
                        return Ok(true);
                    }
                    Err(e) => warn!("Resume upload via {} failed: {:#}", selector, e),
                }
            }
        }

        warn!("Could not find resume upload field");
        Ok(false)
    }

    /// Click the first visible cookie or consent accept control
    pub async fn dismiss_popups(&self, page: &dyn PageDriver) -> Option<String> {
        let snapshot = page.snapshot().await.ok()?;

        for selector in POPUP_SELECTORS {
            let Ok(indices) = page.query(selector).await else {
                continue;
            };
            let Some(index) = first_interactable(&snapshot, &indices) else {
                continue;
            };
            if page.click(index).await.is_ok() {
                info!("Closed popup using selector: {}", selector);
                page.wait(Duration::from_secs(1).min(self.settle_delay)).await;
                return Some(selector.to_string());
            }
        }
        None
    }

    /// Pick a guest path when the page asks to sign in
    pub async fn handle_login_gate(&self, page: &dyn PageDriver) -> Result<LoginGate> {
        let text = page.page_text().await?.to_lowercase();
        if !LOGIN_INDICATORS.iter().any(|i| text.contains(i)) {
            return Ok(LoginGate::NotRequired);
        }

        info!("Login required, checking for guest application option");
        let snapshot = page.snapshot().await?;

        for selector in GUEST_SELECTORS {
            let Ok(indices) = page.query(selector).await else {
                continue;
            };
            if let Some(index) = first_interactable(&snapshot, &indices) {
                if page.click(index).await.is_ok() {
                    info!("Selected external candidate option via {}", selector);
                    page.wait(self.settle_delay).await;
                    return Ok(LoginGate::GuestSelected(selector.to_string()));
                }
            }
        }

        let by_text = snapshot.elements.iter().find(|el| {
            el.is_clickable()
                && el.is_interactable()
                && GUEST_WORDS
                    .iter()
                    .any(|w| el.label().to_lowercase().contains(w))
        });
        if let Some(element) = by_text {
            if page.click(element.index).await.is_ok() {
                info!("Selected guest option '{}'", element.label());
                page.wait(self.settle_delay).await;
                return Ok(LoginGate::GuestSelected(element.label().to_string()));
            }
        }

        warn!("Could not find guest application option");
        Ok(LoginGate::Blocked)
    }

    /// Click the submit control and look for a confirmation message
    pub async fn submit(&self, page: &dyn PageDriver) -> Result<SubmitOutcome> {
        let snapshot = page.snapshot().await?;

        let mut targets: Vec<(usize, String)> = Vec::new();
        for selector in SUBMIT_SELECTORS {
            if let Ok(indices) = page.query(selector).await {
                if let Some(index) = first_interactable(&snapshot, &indices) {
                    targets.push((index, selector.to_string()));
                }
            }
        }
        targets.extend(
            snapshot
                .elements
                .iter()
                .filter(|el| matches!(el.tag.as_str(), "button" | "input") && el.is_clickable())
                .filter(|el| el.is_interactable())
                .filter(|el| {
                    let label = el.label().to_lowercase();
                    SUBMIT_WORDS.iter().any(|w| label.contains(w))
                })
                .map(|el| (el.index, el.label().to_string())),
        );

        for (index, via) in targets {
            match page.click(index).await {
                Ok(()) => {
                    info!("Clicked submit control {}", via);
                    page.wait(self.settle_delay).await;
                    let confirmed = is_confirmation(&page.page_text().await?);
                    if confirmed {
                        info!("Application submitted successfully");
                    } else {
                        warn!("No confirmation message after submit");
                    }
                    return Ok(SubmitOutcome {
                        clicked: Some(via),
                        confirmed,
                    });
                }
                Err(e) => warn!("Failed to submit with {}: {:#}", via, e),
            }
        }

        warn!("Could not find or click submit button");
        Ok(SubmitOutcome {
            clicked: None,
            confirmed: false,
        })
    }
}

pub fn is_confirmation(page_text: &str) -> bool {
    let text = page_text.to_lowercase();
    SUCCESS_INDICATORS.iter().any(|i| text.contains(i))
}

fn first_interactable(snapshot: &PageSnapshot, indices: &[usize]) -> Option<usize> {
    indices
        .iter()
        .copied()
        .find(|i| snapshot.get(*i).is_some_and(|el| el.is_interactable()))
}

/// Exact option label, else the first one containing `wanted`
fn best_option(select: &ElementSnapshot, wanted: &str) -> Option<String> {
    let wanted = wanted.trim().to_lowercase();
    select
        .options
        .iter()
        .find(|o| o.trim().to_lowercase() == wanted)
        .or_else(|| {
            select
                .options
                .iter()
                .find(|o| o.to_lowercase().contains(&wanted))
        })
        .cloned()
}

/// First option after the placeholder with a non-empty label
fn first_real_option(select: &ElementSnapshot) -> Option<String> {
    select
        .options
        .iter()
        .skip(1)
        .find(|o| !o.trim().is_empty())
        .cloned()
}

/// The file input itself, or the first enabled one inside a wrapper
fn file_input(snapshot: &PageSnapshot, index: usize) -> Option<&ElementSnapshot> {
    let is_file = |el: &ElementSnapshot| el.tag == "input" && el.input_type() == "file" && el.enabled;
    let element = snapshot.get(index)?;
    if is_file(element) {
        return Some(element);
    }
    snapshot.descendants(index).find(|el| is_file(*el))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{HtmlPage, PageAction};

    const APPLICATION_FORM: &str = r#"
        <html><body>
          <div class="cookie-banner"><button>Accept all</button></div>
          <form action="/thanks">
            <input name="firstName" type="text">
            <input id="lastName" type="text">
            <input type="email" name="contact">
            <input data-automation-id="phone" type="tel">
            <input placeholder="Your linkedin profile" name="li">
            <input name="city">
            <input name="hiddenCity" style="display:none" class="city">
            <select name="sponsorship"><option>Select</option><option>Yes</option><option>No</option></select>
            <select name="degree"><option></option><option>Bachelor of Science</option><option>Master of Science</option></select>
            <input name="referral" type="text" required>
            <select name="heardFrom" required><option>Choose</option><option>Job board</option></select>
            <input name="backupEmail" type="email" aria-required="true">
            <input type="checkbox" name="terms" required>
            <textarea name="coverLetter"></textarea>
            <input type="file" name="resume" accept=".pdf">
            <button type="submit">Submit Application</button>
          </form>
        </body></html>
    "#;

    fn fills(actions: &[PageAction]) -> Vec<String> {
        actions
            .iter()
            .filter_map(|a| match a {
                PageAction::Fill { value, .. } => Some(value.clone()),
                PageAction::Select { label, .. } => Some(label.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_fill_form_fills_each_field_once() {
        let profile = Profile::default();
        let page = HtmlPage::new(APPLICATION_FORM);
        let filler = FormFiller::new(&profile)
            .with_cover_letter("Dear team".to_string())
            .with_settle_delay(Duration::ZERO);

        let report = filler.fill_form(&page).await.unwrap();
        let kinds = report.filled_kinds();

        assert_eq!(
            kinds,
            vec![
                FieldKind::FirstName,
                FieldKind::LastName,
                FieldKind::Email,
                FieldKind::Phone,
                FieldKind::LinkedIn,
                FieldKind::City,
                FieldKind::CoverLetter,
            ]
        );
        assert_eq!(report.filled[0].selector, "[name='firstName']");
        assert_eq!(report.filled[2].selector, "input[type='email']");

        assert_eq!(
            report.dropdowns,
            vec![
                DropdownChoice {
                    field: "sponsorship".to_string(),
                    option: "No".to_string()
                },
                DropdownChoice {
                    field: "degree".to_string(),
                    option: "Bachelor of Science".to_string()
                },
            ]
        );
        assert_eq!(report.required_defaulted, 3);

        let values = fills(&page.actions());
        assert!(values.contains(&"John".to_string()));
        assert!(values.contains(&"https://linkedin.com/in/johndoe".to_string()));
        assert!(values.contains(&"Dear team".to_string()));
        assert!(values.contains(&"Not specified".to_string()));
        assert!(values.contains(&"Job board".to_string()));
        assert_eq!(values.iter().filter(|v| *v == "john.doe@email.com").count(), 2);
        assert_eq!(values.iter().filter(|v| *v == "San Francisco").count(), 1);
    }

    #[tokio::test]
    async fn test_full_name_used_when_no_split_fields() {
        let profile = Profile::default();
        let page = HtmlPage::new(r#"<form><input name="name"><input name="email"></form>"#);
        let report = FormFiller::new(&profile).fill_form(&page).await.unwrap();

        assert_eq!(report.filled_kinds(), vec![FieldKind::FullName, FieldKind::Email]);
        assert!(fills(&page.actions()).contains(&"John Doe".to_string()));
    }

    #[tokio::test]
    async fn test_upload_resume() {
        let dir = tempfile::tempdir().unwrap();
        let resume = dir.path().join("resume.pdf");
        std::fs::write(&resume, b"%PDF-1.4").unwrap();
        let profile = Profile {
            resume_path: resume.clone(),
            ..Profile::default()
        };

        let page = HtmlPage::new(r#"<div class="file-upload"><input type="file" name="cv"></div>"#);
        assert!(FormFiller::new(&profile).upload_resume(&page).await.unwrap());
        assert!(page
            .actions()
            .iter()
            .any(|a| matches!(a, PageAction::Upload { path, .. } if *path == resume)));
    }

    #[tokio::test]
    async fn test_upload_skipped_without_resume_file() {
        let profile = Profile {
            resume_path: PathBuf::from("/definitely/missing/resume.pdf"),
            ..Profile::default()
        };
        let page = HtmlPage::new(r#"<input type="file">"#);
        assert!(!FormFiller::new(&profile).upload_resume(&page).await.unwrap());
        assert!(page.actions().is_empty());
    }

    #[tokio::test]
    async fn test_dismiss_popup() {
        let profile = Profile::default();
        let page = HtmlPage::new(APPLICATION_FORM);
        let filler = FormFiller::new(&profile).with_settle_delay(Duration::ZERO);

        assert_eq!(
            filler.dismiss_popups(&page).await.as_deref(),
            Some(".cookie-banner button")
        );
        assert!(FormFiller::new(&profile)
            .dismiss_popups(&HtmlPage::new("<p>No banner</p>"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_login_gate() {
        let profile = Profile::default();
        let filler = FormFiller::new(&profile).with_settle_delay(Duration::ZERO);

        let open = HtmlPage::new("<p>Tell us about yourself</p>");
        assert_eq!(filler.handle_login_gate(&open).await.unwrap(), LoginGate::NotRequired);

        let guest = HtmlPage::new(
            r##"<p>Sign in to continue</p><a href="#" class="guest-application">Apply as guest</a>"##,
        );
        assert_eq!(
            filler.handle_login_gate(&guest).await.unwrap(),
            LoginGate::GuestSelected(".guest-application".to_string())
        );

        let by_text = HtmlPage::new(r#"<p>Login</p><button>Continue as External Candidate</button>"#);
        assert_eq!(
            filler.handle_login_gate(&by_text).await.unwrap(),
            LoginGate::GuestSelected("Continue as External Candidate".to_string())
        );

        let blocked = HtmlPage::new("<p>Create account to apply</p><input type='password'>");
        assert_eq!(filler.handle_login_gate(&blocked).await.unwrap(), LoginGate::Blocked);
    }

    #[tokio::test]
    async fn test_submit_detects_confirmation() {
        let profile = Profile::default();
        let filler = FormFiller::new(&profile).with_settle_delay(Duration::ZERO);

        let page = HtmlPage::at("https://careers.example.com/apply", APPLICATION_FORM)
            .with_page(
                "https://careers.example.com/thanks",
                "<h1>Thank you!</h1><p>Your application has been sent.</p>",
            );
        let outcome = filler.submit(&page).await.unwrap();
        assert_eq!(outcome.clicked.as_deref(), Some("button[type='submit']"));
        assert!(outcome.confirmed);

        let no_form = HtmlPage::new("<p>Nothing to submit</p>");
        let outcome = filler.submit(&no_form).await.unwrap();
        assert_eq!(outcome, SubmitOutcome { clicked: None, confirmed: false });
    }

    #[test]
    fn test_selector_order() {
        let selectors = FieldKind::Email.selectors();
        assert_eq!(
            &selectors[..6],
            &[
                "[name='email']",
                "[id='email']",
                "[data-automation-id='email']",
                "input[placeholder*='email']",
                "#email",
                ".email",
            ]
        );
        assert_eq!(selectors.last().map(String::as_str), Some("input[type='email']"));
    }

    #[test]
    fn test_best_option() {
        let select = ElementSnapshot {
            tag: "select".to_string(),
            options: vec!["Select".into(), "Master of Science".into(), "Bachelor".into()],
            ..ElementSnapshot::default()
        };
        assert_eq!(best_option(&select, "bachelor").as_deref(), Some("Bachelor"));
        assert_eq!(best_option(&select, "master").as_deref(), Some("Master of Science"));
        assert_eq!(best_option(&select, "PhD"), None);
        assert_eq!(first_real_option(&select).as_deref(), Some("Master of Science"));
    }

    #[test]
    fn test_confirmation_text() {
        assert!(is_confirmation("THANK YOU for applying"));
        assert!(!is_confirmation("Please complete all fields"));
    }
}
