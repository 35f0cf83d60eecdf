/// Plain-text email templates
///
/// Templates are data: each variant carries what it needs to render, so a
/// queued `send_email` job can be rendered later by the worker without
/// further lookups. Only `app_url` is supplied at render time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Days after signup on which nurture emails go out
pub const NURTURE_DAYS: [u8; 3] = [1, 3, 7];

/// Trial-ending reminder lead time
pub const TRIAL_ENDING_LEAD_DAYS: i64 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum EmailTemplate {
    Welcome {
        name: Option<String>,
        trial_ends_at: DateTime<Utc>,
    },
    PasswordReset {
        token: String,
        expires_minutes: i64,
    },
    TrialNurture {
        day: u8,
        name: Option<String>,
    },
    TrialEnding {
        name: Option<String>,
        trial_ends_at: DateTime<Utc>,
    },
    ReportReady {
        report_id: Uuid,
        title: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
}

fn greeting(name: &Option<String>) -> String {
    match name.as_deref().map(str::trim) {
        Some(n) if !n.is_empty() => format!("Hi {n},"),
        _ => "Hi there,".to_string(),
    }
}

impl EmailTemplate {
    /// Stable identifier, also used in dedupe keys
    pub fn key(&self) -> String {
        match self {
            EmailTemplate::Welcome { .. } => "welcome".to_string(),
            EmailTemplate::PasswordReset { .. } => "password_reset".to_string(),
            EmailTemplate::TrialNurture { day, .. } => format!("trial_nurture_day{day}"),
            EmailTemplate::TrialEnding { .. } => "trial_ending".to_string(),
            EmailTemplate::ReportReady { .. } => "report_ready".to_string(),
        }
    }

    pub fn render(&self, app_url: &str) -> RenderedEmail {
        let app_url = app_url.trim_end_matches('/');

        match self {
            EmailTemplate::Welcome { name, trial_ends_at } => RenderedEmail {
                subject: "Welcome to A³E by MapMyStandards".to_string(),
                text: format!(
                    "{}\n\n\
                     Your 14-day trial is live and runs until {}.\n\n\
                     Start by uploading a self-study narrative, policy or assessment report:\n\
                     {app_url}/dashboard\n\n\
                     A³E maps each document to your accreditor's standards and shows where\n\
                     the evidence is thin.\n\n\
                     The MapMyStandards team\n",
                    greeting(name),
                    trial_ends_at.format("%B %-d, %Y"),
                ),
            },
            EmailTemplate::PasswordReset { token, expires_minutes } => RenderedEmail {
                subject: "Reset your A³E password".to_string(),
                text: format!(
                    "Someone asked to reset the password for this account.\n\n\
                     Use this link within {expires_minutes} minutes:\n\
                     {app_url}/reset-password?token={token}\n\n\
                     If it wasn't you, ignore this email; your password stays the same.\n"
                ),
            },
            EmailTemplate::TrialNurture { day, name } => {
                let (subject, body) = match day {
                    1 => (
                        "Your first standards map",
                        "Upload one document today and A³E will show which standards it\n\
                         supports and how strongly.",
                    ),
                    3 => (
                        "Find the gaps before your reviewers do",
                        "The compliance summary rolls every analyzed document into one view.\n\
                         Standards below the evidence threshold are listed as gaps.",
                    ),
                    _ => (
                        "One week in: generate a report",
                        "A gap analysis report is a snapshot you can share with your\n\
                         accreditation committee.",
                    ),
                };
                RenderedEmail {
                    subject: subject.to_string(),
                    text: format!("{}\n\n{body}\n\n{app_url}/dashboard\n\nThe MapMyStandards team\n", greeting(name)),
                }
            }
            EmailTemplate::TrialEnding { name, trial_ends_at } => RenderedEmail {
                subject: "Your A³E trial ends soon".to_string(),
                text: format!(
                    "{}\n\n\
                     Your trial ends on {}. Choose a plan to keep your documents,\n\
                     analyses and reports available:\n\
                     {app_url}/billing\n\n\
                     The MapMyStandards team\n",
                    greeting(name),
                    trial_ends_at.format("%B %-d, %Y"),
                ),
            },
            EmailTemplate::ReportReady { report_id, title } => RenderedEmail {
                subject: format!("Report ready: {title}"),
                text: format!(
                    "Your report \"{title}\" has been generated.\n\n\
                     View it here: {app_url}/reports/{report_id}\n"
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_keys() {
        assert_eq!(
            EmailTemplate::TrialNurture { day: 3, name: None }.key(),
            "trial_nurture_day3"
        );
        assert_eq!(
            EmailTemplate::PasswordReset { token: "t".into(), expires_minutes: 60 }.key(),
            "password_reset"
        );
    }

    #[test]
    fn test_reset_link_contains_token() {
        let email = EmailTemplate::PasswordReset {
            token: "abc123".into(),
            expires_minutes: 60,
        }
        .render("https://app.mapmystandards.ai/");

        assert!(email
            .text
            .contains("https://app.mapmystandards.ai/reset-password?token=abc123"));
        assert!(email.text.contains("60 minutes"));
    }

    #[test]
    fn test_welcome_mentions_trial_end() {
        let ends = Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap();
        let email = EmailTemplate::Welcome {
            name: Some("Dana".into()),
            trial_ends_at: ends,
        }
        .render("https://app.example");

        assert!(email.text.starts_with("Hi Dana,"));
        assert!(email.text.contains("March 15, 2025"));
    }

    #[test]
    fn test_blank_name_falls_back() {
        let email = EmailTemplate::TrialNurture { day: 1, name: Some("  ".into()) }.render("x");
        assert!(email.text.starts_with("Hi there,"));
    }

    #[test]
    fn test_serialized_tag() {
        let json = serde_json::to_value(EmailTemplate::ReportReady {
            report_id: Uuid::nil(),
            title: "Gap Analysis".into(),
        })
        .unwrap();
        assert_eq!(json["template"], "report_ready");
    }
}
