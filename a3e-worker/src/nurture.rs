/// Trial nurture scheduler
///
/// Each pass scans users still on an unpaid trial and queues the emails
/// that have come due:
///
/// - the latest nurture email (day 1, 3 or 7 after signup) the user has
///   reached; earlier ones missed while the worker was down are not sent
/// - the trial-ending reminder once two days or fewer remain
///
/// Every email is keyed `{user}:{template}` in `email_deliveries`. The key
/// is claimed and the job queued in one transaction, so a user gets each
/// email at most once no matter how many workers run the scan, and a failed
/// enqueue leaves the key free for the next pass.

use a3e_shared::email::templates::{EmailTemplate, NURTURE_DAYS, TRIAL_ENDING_LEAD_DAYS};
use a3e_shared::models::{
    email_delivery::{dedupe_key, EmailDelivery},
    job::{Job, JobPayload},
    user::User,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NurtureStats {
    pub users_scanned: usize,
    pub emails_queued: usize,
}

/// Emails due for `user` at `now`, before deduplication
pub fn due_templates(user: &User, now: DateTime<Utc>) -> Vec<EmailTemplate> {
    let trial = user.trial_window();
    if trial.is_expired(now) {
        return Vec::new();
    }

    let mut due = Vec::new();

    let elapsed = trial.days_elapsed(now);
    if let Some(day) = NURTURE_DAYS.iter().rev().find(|day| i64::from(**day) <= elapsed) {
        due.push(EmailTemplate::TrialNurture {
            day: *day,
            name: user.name.clone(),
        });
    }

    if trial.days_remaining(now) <= TRIAL_ENDING_LEAD_DAYS {
        due.push(EmailTemplate::TrialEnding {
            name: user.name.clone(),
            trial_ends_at: trial.ends_at(),
        });
    }

    due
}

#[derive(Clone)]
pub struct NurtureScheduler {
    db: PgPool,
}

impl NurtureScheduler {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// One scan over all trialing users
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<NurtureStats, sqlx::Error> {
        let users = User::list_trialing(&self.db, now).await?;
        let mut stats = NurtureStats {
            users_scanned: users.len(),
            ..NurtureStats::default()
        };

        for user in &users {
            for template in due_templates(user, now) {
                let key = dedupe_key(user.id, &template.key());
                let mut tx = self.db.begin().await?;

                if EmailDelivery::claim(&mut *tx, Some(user.id), &template.key(), &key)
                    .await?
                    .is_none()
                {
                    continue;
                }

                let payload = JobPayload::SendEmail {
                    to: user.email.clone(),
                    user_id: Some(user.id),
                    template,
                    dedupe_key: Some(key),
                };
                Job::enqueue(&mut *tx, &payload).await?;
                tx.commit().await?;
                stats.emails_queued += 1;
            }
        }

        if stats.emails_queued > 0 {
            tracing::info!(
                users_scanned = stats.users_scanned,
                emails_queued = stats.emails_queued,
                "Nurture emails queued"
            );
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn trial_user(started: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            email: "dean@college.edu".to_string(),
            password_hash: String::new(),
            name: Some("Dean".to_string()),
            institution_name: None,
            role: "user".to_string(),
            email_verified: false,
            plan: "trial".to_string(),
            subscription_status: "trialing".to_string(),
            stripe_customer_id: None,
            stripe_subscription_id: None,
            trial_started_at: started,
            trial_ends_at: started + Duration::days(14),
            documents_uploaded: 0,
            analyses_run: 0,
            reports_generated: 0,
            created_at: started,
            updated_at: started,
            last_login_at: None,
        }
    }

    fn keys(templates: &[EmailTemplate]) -> Vec<String> {
        templates.iter().map(EmailTemplate::key).collect()
    }

    #[test]
    fn test_nothing_due_on_signup_day() {
        let now = Utc::now();
        let user = trial_user(now - Duration::hours(5));
        assert!(due_templates(&user, now).is_empty());
    }

    #[test]
    fn test_latest_nurture_day_only() {
        let now = Utc::now();

        let user = trial_user(now - Duration::days(1) - Duration::hours(1));
        assert_eq!(keys(&due_templates(&user, now)), vec!["trial_nurture_day1"]);

        let user = trial_user(now - Duration::days(5));
        assert_eq!(keys(&due_templates(&user, now)), vec!["trial_nurture_day3"]);

        let user = trial_user(now - Duration::days(8));
        assert_eq!(keys(&due_templates(&user, now)), vec!["trial_nurture_day7"]);
    }

    #[test]
    fn test_trial_ending_reminder() {
        let now = Utc::now();

        // 11.5 days in, 2.5 days left rounds up to 3
        let user = trial_user(now - Duration::days(11) - Duration::hours(12));
        assert_eq!(keys(&due_templates(&user, now)), vec!["trial_nurture_day7"]);

        let user = trial_user(now - Duration::days(12) - Duration::hours(1));
        assert_eq!(
            keys(&due_templates(&user, now)),
            vec!["trial_nurture_day7", "trial_ending"]
        );
    }

    #[test]
    fn test_expired_trial_gets_nothing() {
        let now = Utc::now();
        let user = trial_user(now - Duration::days(20));
        assert!(due_templates(&user, now).is_empty());
    }
}
