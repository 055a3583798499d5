use crate::{
    api::{
        self, DatabaseOptions,
        email::{EmailSender, EmailWorkerConfig, LogEmailSender, SmtpConfig, SmtpEmailSender},
        notify::NotifyConfig,
    },
    cli::commands::email::SmtpOptions,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub db_max_connections: u32,
    pub apply_schema: bool,
    pub notify_email: String,
    pub email_from: String,
    pub smtp: Option<SmtpOptions>,
    pub email_outbox_poll_seconds: u64,
    pub email_outbox_batch_size: usize,
    pub email_outbox_max_attempts: u32,
    pub email_outbox_backoff_base_seconds: u64,
    pub email_outbox_backoff_max_seconds: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the email sender cannot be built, the database is unreachable,
/// or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let sender: Arc<dyn EmailSender> = match args.smtp {
        Some(smtp) => {
            let config = SmtpConfig {
                host: smtp.host,
                port: smtp.port,
                username: smtp.username,
                password: smtp.password,
                from: args.email_from,
            };
            Arc::new(SmtpEmailSender::new(config).context("Failed to configure SMTP sender")?)
        }
        None => Arc::new(LogEmailSender),
    };

    let email_config = EmailWorkerConfig::new()
        .with_poll_interval_seconds(args.email_outbox_poll_seconds)
        .with_batch_size(args.email_outbox_batch_size)
        .with_max_attempts(args.email_outbox_max_attempts)
        .with_backoff_base_seconds(args.email_outbox_backoff_base_seconds)
        .with_backoff_max_seconds(args.email_outbox_backoff_max_seconds);

    let database = DatabaseOptions {
        dsn: args.dsn,
        max_connections: args.db_max_connections,
        apply_schema: args.apply_schema,
    };

    api::new(
        args.port,
        database,
        NotifyConfig::new(args.notify_email),
        sender,
        email_config,
    )
    .await
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("db_max_connections", args.db_max_connections.to_string()),
        ("apply_schema", args.apply_schema.to_string()),
        ("notify_email", args.notify_email.clone()),
        (
            "smtp",
            args.smtp
                .as_ref()
                .map_or_else(|| "disabled (log only)".to_string(), |smtp| {
                    format!("{}:{}", smtp.host, smtp.port)
                }),
        ),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}
