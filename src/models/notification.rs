//! Notification jobs and in-app notification rows.

use serde::Serialize;
use uuid::Uuid;

/// Work item for the notification worker.
///
/// Serialized as the body POSTed to the relay:
///
/// ```json
/// { "channel": "push", "user_id": "…", "title": "Contribution Received", "body": "…", "data": {} }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum NotificationJob {
    Email {
        to: String,
        subject: String,
        body: String,
    },
    Push {
        user_id: Uuid,
        title: String,
        body: String,
        data: serde_json::Value,
    },
}

impl NotificationJob {
    pub fn email(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        NotificationJob::Email {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn push(
        user_id: Uuid,
        title: impl Into<String>,
        body: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        NotificationJob::Push {
            user_id,
            title: title.into(),
            body: body.into(),
            data,
        }
    }

    /// Short label for logs.
    pub fn channel(&self) -> &'static str {
        match self {
            NotificationJob::Email { .. } => "email",
            NotificationJob::Push { .. } => "push",
        }
    }
}

/// In-app notification written alongside a ledger change.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub summary: String,
    pub notification_text: String,
    pub actor_name: Option<String>,
}

/// Render a minor-unit amount the way messages show it, e.g. `NGN12,500.00`.
pub fn format_amount(currency: &str, minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let minor = minor.unsigned_abs();
    let whole = (minor / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{currency}{grouped}.{:02}", minor % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_amounts_with_thousand_separators() {
        assert_eq!(format_amount("NGN", 1_250_000), "NGN12,500.00");
        assert_eq!(format_amount("USD", 5), "USD0.05");
        assert_eq!(format_amount("NGN", 123_456_789), "NGN1,234,567.89");
    }

    #[test]
    fn push_job_serializes_with_channel_tag() {
        let job = NotificationJob::push(Uuid::nil(), "Hi", "There", serde_json::json!({}));
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["channel"], "push");
        assert_eq!(job.channel(), "push");
    }
}
