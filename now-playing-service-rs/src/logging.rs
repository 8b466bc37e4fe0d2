use std::{
    env,
    error::Error as StdError,
    io::{self, Write},
};

use chrono::{SecondsFormat, Utc};
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::{Map, Value};

const DEFAULT_SERVICE: &str = "now-playing-service-rs";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Debug => "debug",
        }
    }

    /// Unknown names fall back to `info`.
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => Level::Error,
            "warn" | "warning" => Level::Warn,
            "debug" | "trace" => Level::Debug,
            _ => Level::Info,
        }
    }
}

/// One JSON object per line. Warnings and errors go to stderr.
pub struct Logger {
    /// `service`, `env` and `host`, fixed for the process.
    base: Map<String, Value>,
    threshold: Level,
}

static LOGGER: OnceCell<Logger> = OnceCell::new();

pub fn init_logger(service: &str) -> &'static Logger {
    LOGGER.get_or_init(|| Logger::from_env(service))
}

/// Global logger. Falls back to the default service name when `init_logger`
/// has not run yet (unit and integration tests).
pub fn logger() -> &'static Logger {
    LOGGER.get_or_init(|| Logger::from_env(DEFAULT_SERVICE))
}

impl Logger {
    fn from_env(service: &str) -> Self {
        let environment = env::var("APP_ENV")
            .or_else(|_| env::var("RUST_ENV"))
            .unwrap_or_else(|_| "development".to_string());
        let host = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .or_else(|| env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "unknown".to_string());
        let threshold = env::var("LOG_LEVEL")
            .map(|value| Level::parse(&value))
            .unwrap_or(Level::Info);
        Self::new(service, &environment, &host, threshold)
    }

    fn new(service: &str, environment: &str, host: &str, threshold: Level) -> Self {
        let mut base = Map::new();
        base.insert("service".into(), service.into());
        base.insert("env".into(), environment.into());
        base.insert("host".into(), host.into());
        Self { base, threshold }
    }

    fn record<T: Serialize>(&self, level: Level, event: &str, context: T) -> Value {
        let mut line = Map::new();
        line.insert(
            "timestamp".into(),
            Utc::now()
                .to_rfc3339_opts(SecondsFormat::Millis, true)
                .into(),
        );
        line.extend(self.base.clone());
        line.insert("level".into(), level.label().into());
        line.insert("event".into(), event.into());

        match serde_json::to_value(context).unwrap_or(Value::Null) {
            Value::Object(fields) => line.extend(fields),
            Value::Null => {}
            other => {
                line.insert("context".into(), other);
            }
        }
        Value::Object(line)
    }

    fn emit<T: Serialize>(&self, level: Level, event: &str, context: T) {
        if level > self.threshold {
            return;
        }
        let line = self.record(level, event, context);
        // Adapters log concurrently; one locked write per line keeps lines whole.
        let _ = match level {
            Level::Error | Level::Warn => writeln!(io::stderr().lock(), "{line}"),
            Level::Info | Level::Debug => writeln!(io::stdout().lock(), "{line}"),
        };
    }

    pub fn debug<T: Serialize>(&self, event: &str, context: T) {
        self.emit(Level::Debug, event, context);
    }

    pub fn info<T: Serialize>(&self, event: &str, context: T) {
        self.emit(Level::Info, event, context);
    }

    pub fn warn<T: Serialize>(&self, event: &str, context: T) {
        self.emit(Level::Warn, event, context);
    }

    pub fn error<T: Serialize>(&self, event: &str, context: T) {
        self.emit(Level::Error, event, context);
    }
}

/// Flattens an error and its `source()` chain into one list, outermost first.
pub fn error_chain(error: &(dyn StdError + 'static)) -> Vec<String> {
    let mut chain = vec![error.to_string()];
    let mut current = error.source();
    while let Some(source) = current {
        chain.push(source.to_string());
        current = source.source();
    }
    chain
}
