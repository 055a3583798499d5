//! Notification email outbox and delivery.
//!
//! Author updates enqueue rows in `email_outbox` with status `pending` once the
//! change is stored. A background task polls that table, locks a batch via
//! `FOR UPDATE SKIP LOCKED`, and hands each row to an [`EmailSender`]. The row is
//! then marked `sent`, rescheduled with exponential backoff and jitter, or marked
//! `failed` after the configured number of attempts.
//!
//! Without SMTP settings the server uses [`LogEmailSender`], which only logs.
use anyhow::{Context, Result};
use lettre::{
    Message, SmtpTransport, Transport, message::header::ContentType,
    transport::smtp::authentication::Credentials,
};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction used by the outbox worker.
///
/// `send` may block; the worker always calls it on the blocking thread pool.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error to schedule a retry.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Sender that logs the message instead of delivering it.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            body = %message.body,
            "notification email (log only)"
        );
        Ok(())
    }
}

#[derive(Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub from: String,
}

pub struct SmtpEmailSender {
    from: lettre::message::Mailbox,
    transport: SmtpTransport,
}

impl SmtpEmailSender {
    /// Build the SMTP transport. Credentials switch the transport to a TLS relay.
    ///
    /// # Errors
    /// Returns an error if the sender address or relay host is invalid.
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let from = config
            .from
            .parse()
            .with_context(|| format!("invalid sender address: {}", config.from))?;

        let transport = match (config.username, config.password) {
            (Some(username), Some(password)) => {
                let credentials =
                    Credentials::new(username, password.expose_secret().to_string());
                SmtpTransport::relay(&config.host)
                    .with_context(|| format!("invalid SMTP relay: {}", config.host))?
                    .credentials(credentials)
                    .port(config.port)
                    .build()
            }
            _ => SmtpTransport::builder_dangerous(&config.host)
                .port(config.port)
                .build(),
        };

        Ok(Self { from, transport })
    }
}

impl EmailSender for SmtpEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(message
                .to_email
                .parse()
                .with_context(|| format!("invalid recipient: {}", message.to_email))?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .context("failed to build email")?;

        self.transport
            .send(&email)
            .context("failed to send email")?;

        debug!(to_email = %message.to_email, "notification email sent");
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EmailWorkerConfig {
    poll_interval: Duration,
    batch_size: usize,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl EmailWorkerConfig {
    /// 5s poll interval, 10 messages per batch, 5 attempts, 5s->5m backoff.
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 10,
            max_attempts: 5,
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
        }
    }

    #[must_use]
    pub fn with_poll_interval_seconds(mut self, seconds: u64) -> Self {
        self.poll_interval = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_backoff_base_seconds(mut self, seconds: u64) -> Self {
        self.backoff_base = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_backoff_max_seconds(mut self, seconds: u64) -> Self {
        self.backoff_max = Duration::from_secs(seconds);
        self
    }

    /// Replace zero values with the smallest usable ones.
    #[must_use]
    pub fn normalize(self) -> Self {
        let poll_interval = if self.poll_interval.is_zero() {
            Duration::from_secs(1)
        } else {
            self.poll_interval
        };
        let backoff_base = if self.backoff_base.is_zero() {
            Duration::from_secs(1)
        } else {
            self.backoff_base
        };
        Self {
            poll_interval,
            batch_size: self.batch_size.max(1),
            max_attempts: self.max_attempts.max(1),
            backoff_base,
            backoff_max: self.backoff_max.max(backoff_base),
        }
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for EmailWorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert a `pending` row for the outbox worker.
///
/// # Errors
/// Returns an error if the insert fails.
pub async fn enqueue_email(pool: &PgPool, message: &EmailMessage) -> Result<Uuid> {
    let query = r"
        INSERT INTO email_outbox (to_email, subject, body)
        VALUES ($1, $2, $3)
        RETURNING id
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(&message.to_email)
        .bind(&message.subject)
        .bind(&message.body)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to enqueue notification email")?;

    Ok(row.get("id"))
}

/// Spawn a background task that polls and processes the email outbox.
pub fn spawn_outbox_worker(
    pool: PgPool,
    sender: Arc<dyn EmailSender>,
    config: EmailWorkerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let config = config.normalize();
        let poll_interval = config.poll_interval();

        loop {
            if let Err(err) = process_outbox_batch(&pool, &sender, &config).await {
                error!("email outbox batch failed: {err:#}");
            }

            sleep(poll_interval).await;
        }
    })
}

/// Deliver one batch of due messages. Returns how many rows were processed.
///
/// # Errors
/// Returns an error if the outbox cannot be read or updated.
pub async fn process_outbox_batch(
    pool: &PgPool,
    sender: &Arc<dyn EmailSender>,
    config: &EmailWorkerConfig,
) -> Result<usize> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to start email outbox transaction")?;

    let query = r"
        SELECT id, to_email, subject, body, attempts
        FROM email_outbox
        WHERE status = 'pending'
          AND next_attempt_at <= NOW()
        ORDER BY next_attempt_at ASC, created_at ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(i64::try_from(config.batch_size()).unwrap_or(i64::MAX))
        .fetch_all(&mut *tx)
        .instrument(span)
        .await
        .context("failed to load email outbox batch")?;

    if rows.is_empty() {
        tx.commit()
            .await
            .context("failed to commit empty outbox batch")?;
        return Ok(0);
    }

    let row_count = rows.len();
    for row in rows {
        let id: Uuid = row.get("id");
        let attempts: i32 = row.get("attempts");
        let message = EmailMessage {
            to_email: row.get("to_email"),
            subject: row.get("subject"),
            body: row.get("body"),
        };

        let send_result = deliver(sender, message).await;
        if let Err(err) = &send_result {
            error!(outbox_id = %id, "notification email delivery failed: {err:#}");
        }
        update_outbox_status(
            &mut tx,
            id,
            u32::try_from(attempts).unwrap_or(0),
            send_result,
            config,
        )
        .await?;
    }

    tx.commit()
        .await
        .context("failed to commit email outbox batch")?;

    Ok(row_count)
}

/// Runs the sender off the async workers so SMTP round-trips do not stall them.
async fn deliver(sender: &Arc<dyn EmailSender>, message: EmailMessage) -> Result<()> {
    let sender = Arc::clone(sender);
    tokio::task::spawn_blocking(move || sender.send(&message))
        .await
        .context("email sender task panicked")?
}

async fn update_outbox_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    attempts: u32,
    send_result: Result<()>,
    config: &EmailWorkerConfig,
) -> Result<()> {
    let next_attempt = attempts.saturating_add(1);
    let attempts_i32 = i32::try_from(next_attempt).unwrap_or(i32::MAX);

    let (query, last_error, delay_ms) = match send_result {
        Ok(()) => (
            r"
            UPDATE email_outbox
            SET status = 'sent',
                attempts = $2,
                last_error = $3,
                sent_at = NOW(),
                next_attempt_at = NOW() + ($4 * INTERVAL '1 millisecond')
            WHERE id = $1
            ",
            None,
            0,
        ),
        Err(err) if next_attempt >= config.max_attempts() => (
            r"
            UPDATE email_outbox
            SET status = 'failed',
                attempts = $2,
                last_error = $3,
                next_attempt_at = NOW() + ($4 * INTERVAL '1 millisecond')
            WHERE id = $1
            ",
            Some(format!("{err:#}")),
            0,
        ),
        Err(err) => {
            let delay = backoff_delay(next_attempt, config.backoff_base, config.backoff_max);
            (
                r"
                UPDATE email_outbox
                SET status = 'pending',
                    attempts = $2,
                    last_error = $3,
                    next_attempt_at = NOW() + ($4 * INTERVAL '1 millisecond')
                WHERE id = $1
                ",
                Some(format!("{err:#}")),
                i64::try_from(delay.as_millis()).unwrap_or(i64::MAX),
            )
        }
    };

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .bind(attempts_i32)
        .bind(last_error)
        .bind(delay_ms)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to update email outbox status")?;

    Ok(())
}

fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    let delay = base.checked_mul(1u32 << shift).unwrap_or(max);
    jitter_delay(delay.min(max))
}

// Full delay halved, plus a random share of the other half.
fn jitter_delay(delay: Duration) -> Duration {
    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if delay_ms < 2 {
        return delay;
    }
    let half = delay_ms / 2;
    let jitter = rand::thread_rng().gen_range(0..=half);
    Duration::from_millis(half + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_replaces_zero_values() {
        let config = EmailWorkerConfig::new()
            .with_poll_interval_seconds(0)
            .with_batch_size(0)
            .with_max_attempts(0)
            .with_backoff_base_seconds(0)
            .with_backoff_max_seconds(0)
            .normalize();

        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.batch_size(), 1);
        assert_eq!(config.max_attempts(), 1);
        assert_eq!(config.backoff_base, Duration::from_secs(1));
        assert_eq!(config.backoff_max, Duration::from_secs(1));
    }

    #[test]
    fn normalize_keeps_valid_values() {
        let config = EmailWorkerConfig::default().normalize();
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.batch_size(), 10);
        assert_eq!(config.max_attempts(), 5);
        assert_eq!(config.backoff_max, Duration::from_secs(300));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let base = Duration::from_secs(5);
        let max = Duration::from_secs(60);

        let first = backoff_delay(1, base, max);
        assert!(first >= Duration::from_millis(2500) && first <= base);

        let third = backoff_delay(3, base, max);
        assert!(third >= Duration::from_secs(10) && third <= Duration::from_secs(20));

        let capped = backoff_delay(30, base, max);
        assert!(capped >= Duration::from_secs(30) && capped <= max);
    }

    #[test]
    fn jitter_keeps_tiny_delays() {
        assert_eq!(
            jitter_delay(Duration::from_millis(1)),
            Duration::from_millis(1)
        );
    }

    #[test]
    fn log_sender_always_succeeds() {
        let message = EmailMessage {
            to_email: "librarian@example.com".to_string(),
            subject: "email notification".to_string(),
            body: "Author information updated".to_string(),
        };
        assert!(LogEmailSender.send(&message).is_ok());
    }

    /// Succeeds only if another task on the runtime can run while it blocks.
    struct WaitingSender {
        released: Arc<std::sync::atomic::AtomicBool>,
    }

    impl EmailSender for WaitingSender {
        fn send(&self, _message: &EmailMessage) -> Result<()> {
            for _ in 0..200 {
                if self.released.load(std::sync::atomic::Ordering::SeqCst) {
                    return Ok(());
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            anyhow::bail!("runtime was blocked during delivery")
        }
    }

    #[tokio::test]
    async fn delivery_runs_off_the_async_runtime() {
        let released = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let sender: Arc<dyn EmailSender> = Arc::new(WaitingSender {
            released: Arc::clone(&released),
        });

        let flag = Arc::clone(&released);
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        let message = EmailMessage {
            to_email: "librarian@example.com".to_string(),
            subject: "email notification".to_string(),
            body: "Author information updated".to_string(),
        };
        assert!(deliver(&sender, message).await.is_ok());
    }

    #[test]
    fn smtp_sender_rejects_bad_from() {
        let result = SmtpEmailSender::new(SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            username: None,
            password: None,
            from: "not an address".to_string(),
        });
        assert!(result.is_err());
    }
}
