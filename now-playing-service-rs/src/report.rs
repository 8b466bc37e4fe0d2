//! Per-cycle failure report: written to the error log every cycle and handed
//! to a [`Notifier`] when it holds something worth a human's attention.

use std::{fmt::Write as _, io, path::Path, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::{
    adapters::{AdapterError, ErrorClass},
    config::SmtpConfig,
    logging::{error_chain, logger},
};

const SUBJECT: &str = "New error(s) polling stations";
const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid mailbox `{address}`")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },
    #[error("failed to build notification e-mail")]
    Message(#[from] lettre::error::Error),
    #[error("smtp delivery failed")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("failed to write error log {path}")]
    ErrorLog {
        path: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationFailure {
    pub station: String,
    pub class: ErrorClass,
    pub occurred_at: DateTime<Utc>,
    /// The error and each of its sources, outermost first.
    pub chain: Vec<String>,
}

impl StationFailure {
    pub fn new(station: &str, error: &AdapterError, occurred_at: DateTime<Utc>) -> Self {
        Self {
            station: station.to_string(),
            class: error.class(),
            occurred_at,
            chain: error_chain(error),
        }
    }

    fn describe(&self) -> String {
        self.chain.join(": ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    failures: Vec<StationFailure>,
}

impl ErrorReport {
    pub fn push(&mut self, failure: StationFailure) {
        self.failures.push(failure);
    }

    pub fn failures(&self) -> &[StationFailure] {
        &self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn in_class(&self, class: ErrorClass) -> impl Iterator<Item = &StationFailure> {
        self.failures
            .iter()
            .filter(move |failure| failure.class == class)
    }

    pub fn count(&self, class: ErrorClass) -> usize {
        self.in_class(class).count()
    }

    /// Timeouts and decode failures clear up on their own; only the rest is
    /// sent out.
    pub fn needs_notification(&self) -> bool {
        self.count(ErrorClass::Other) > 0
    }

    /// One entry per failure, as written to the error log.
    pub fn log_text(&self) -> String {
        let mut text = String::new();
        for failure in &self.failures {
            let _ = writeln!(
                text,
                "[{}] Error updating {} ({}):",
                failure
                    .occurred_at
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
                failure.station,
                class_label(failure.class),
            );
            for (depth, cause) in failure.chain.iter().enumerate() {
                let _ = writeln!(text, "{}{cause}", "  ".repeat(depth + 1));
            }
        }
        text
    }

    /// Notification body: full detail for other-class failures, names only
    /// for the transient buckets.
    pub fn summary(&self) -> String {
        let mut body = String::from("Errors:\n");
        for failure in self.in_class(ErrorClass::Other) {
            let _ = write!(body, "\n{}:\n  {}\n", failure.station, failure.describe());
        }
        for (heading, class) in [
            ("Decode Errors", ErrorClass::Decode),
            ("Timeout Errors", ErrorClass::Timeout),
        ] {
            let _ = write!(body, "\n{heading}:\n");
            for failure in self.in_class(class) {
                let _ = writeln!(body, "{}", failure.station);
            }
        }
        body
    }
}

fn class_label(class: ErrorClass) -> &'static str {
    match class {
        ErrorClass::Timeout => "timeout",
        ErrorClass::Decode => "decode",
        ErrorClass::Other => "other",
    }
}

/// Replaces the error log with this cycle's failures.
pub async fn write_error_log(path: &Path, report: &ErrorReport) -> Result<(), NotifyError> {
    tokio::fs::write(path, report.log_text())
        .await
        .map_err(|source| NotifyError::ErrorLog {
            path: path.display().to_string(),
            source,
        })
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, report: &ErrorReport) -> Result<(), NotifyError>;
}

/// Used when no SMTP relay is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, report: &ErrorReport) -> Result<(), NotifyError> {
        logger().warn(
            "notifier.report",
            json!({
                "other": report.count(ErrorClass::Other),
                "decode": report.count(ErrorClass::Decode),
                "timeout": report.count(ErrorClass::Timeout),
                "failures": report.in_class(ErrorClass::Other).collect::<Vec<_>>(),
            }),
        );
        Ok(())
    }
}

pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let from = parse_mailbox(&config.from_address)?;
        let to = parse_mailbox(&config.to_address)?;
        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };
        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse().map_err(|source| NotifyError::Address {
        address: address.to_string(),
        source,
    })
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, report: &ErrorReport) -> Result<(), NotifyError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(report.summary())?;
        self.transport.send(email).await?;
        logger().info(
            "notifier.sent",
            json!({
                "to": self.to.to_string(),
                "failures": report.count(ErrorClass::Other),
            }),
        );
        Ok(())
    }
}

pub fn build_notifier(config: Option<&SmtpConfig>) -> Result<Arc<dyn Notifier>, NotifyError> {
    match config {
        Some(smtp) => Ok(Arc::new(EmailNotifier::new(smtp)?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn report() -> ErrorReport {
        let mut report = ErrorReport::default();
        report.push(StationFailure::new(
            "KEXP",
            &AdapterError::Timeout(Duration::from_secs(30)),
            at(),
        ));
        let decode = serde_json::from_str::<serde_json::Value>("<html>").unwrap_err();
        report.push(StationFailure::new("Dublab", &AdapterError::from(decode), at()));
        report
    }

    #[test]
    fn transient_failures_are_not_notified() {
        let report = report();
        assert_eq!(report.count(ErrorClass::Timeout), 1);
        assert_eq!(report.count(ErrorClass::Decode), 1);
        assert!(!report.needs_notification());
    }

    #[test]
    fn other_failures_are_notified() {
        let mut report = report();
        report.push(StationFailure::new(
            "NTS 2",
            &AdapterError::shape("no live entry for channel 2"),
            at(),
        ));
        assert!(report.needs_notification());

        let summary = report.summary();
        assert!(summary.starts_with(
            "Errors:\n\nNTS 2:\n  unexpected payload shape: no live entry for channel 2\n"
        ));
        assert!(summary.contains("\nDecode Errors:\nDublab\n"));
        assert!(summary.ends_with("\nTimeout Errors:\nKEXP\n"));
    }

    #[test]
    fn log_text_has_timestamp_and_chain() {
        let text = report().log_text();
        let first = text.lines().next().unwrap();
        assert_eq!(
            first,
            "[2024-06-15T12:00:00.000Z] Error updating KEXP (timeout):"
        );
        assert!(text.contains("Error updating Dublab (decode):\n  upstream payload is not valid JSON\n    "));
    }

    #[tokio::test]
    async fn error_log_is_replaced_each_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errorlog.txt");
        write_error_log(&path, &report()).await.unwrap();
        write_error_log(&path, &ErrorReport::default()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn email_notifier_rejects_bad_addresses() {
        let config = SmtpConfig {
            host: "smtp.example.com".into(),
            port: 465,
            username: "bot@example.com".into(),
            password: "secret".into(),
            from_address: "not an address".into(),
            to_address: "ops@example.com".into(),
        };
        assert!(matches!(
            EmailNotifier::new(&config),
            Err(NotifyError::Address { .. })
        ));
    }
}
