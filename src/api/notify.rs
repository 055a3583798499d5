//! Author change notifications.
//!
//! Handlers report events here only after their write has been stored. Delivery
//! goes through the email outbox, so a failure is logged and never reaches the
//! caller.
use super::email::{EmailMessage, enqueue_email};
use sqlx::PgPool;
use tracing::{error, info};

pub const NOTIFICATION_SUBJECT: &str = "email notification";
pub const NOTIFICATION_BODY: &str = "Author information updated";

#[derive(Clone, Debug)]
pub struct NotifyConfig {
    recipient: String,
}

impl NotifyConfig {
    #[must_use]
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorEmailChanged {
    pub author_id: i64,
    pub old_email: String,
    pub new_email: String,
}

#[derive(Clone, Debug)]
pub struct Notifier {
    config: NotifyConfig,
}

impl Notifier {
    #[must_use]
    pub fn new(config: NotifyConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn recipient(&self) -> &str {
        &self.config.recipient
    }

    fn message_for(&self, event: &AuthorEmailChanged) -> EmailMessage {
        EmailMessage {
            to_email: self.config.recipient.clone(),
            subject: NOTIFICATION_SUBJECT.to_string(),
            body: format!(
                "{NOTIFICATION_BODY}\n\nAuthor {}: {} -> {}",
                event.author_id, event.old_email, event.new_email
            ),
        }
    }

    /// Queue the notification for an author whose email changed.
    pub async fn author_email_changed(&self, pool: &PgPool, event: AuthorEmailChanged) {
        let message = self.message_for(&event);
        match enqueue_email(pool, &message).await {
            Ok(id) => info!(
                author_id = event.author_id,
                outbox_id = %id,
                "author email change notification queued"
            ),
            Err(err) => error!(
                author_id = event.author_id,
                "failed to queue author email change notification: {err:#}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_goes_to_configured_recipient() {
        let notifier = Notifier::new(NotifyConfig::new("librarian@example.com"));
        let message = notifier.message_for(&AuthorEmailChanged {
            author_id: 7,
            old_email: "old@example.com".to_string(),
            new_email: "new@example.com".to_string(),
        });

        assert_eq!(notifier.recipient(), "librarian@example.com");
        assert_eq!(message.to_email, "librarian@example.com");
        assert_eq!(message.subject, NOTIFICATION_SUBJECT);
        assert!(message.body.starts_with(NOTIFICATION_BODY));
        assert!(message.body.contains("old@example.com -> new@example.com"));
    }
}
