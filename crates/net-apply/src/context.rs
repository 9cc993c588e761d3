//! Logging and message formatting handed to the engines
//!
//! The engines never touch process wide logging state. Everything they want
//! to say goes through an [`EngineContext`], which pairs a logger with a
//! formatter for the configured locale.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use log::Level;

use ncif_core::TransactionState;

/// Something the engines report while running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineMessage {
    StateChanged {
        transaction_id: String,
        host: String,
        from: TransactionState,
        to: TransactionState,
    },
    ChangeRejected {
        transaction_id: String,
        host: String,
        operation: String,
        errors: Vec<String>,
    },
    CleanupFailed {
        transaction_id: String,
        host: String,
        operation: String,
        error: String,
    },
    InterfaceRead {
        host: String,
        key: String,
        description: Option<String>,
        address: Option<String>,
    },
    ReadCompleted {
        host: String,
        count: usize,
    },
    AuditWritten {
        host: String,
        path: PathBuf,
    },
    AuditFailed {
        host: String,
        error: String,
    },
    UnsupportedLocale {
        locale: String,
    },
}

/// Renders [`EngineMessage`] values for humans
pub trait MessageFormatter: Send + Sync {
    fn format(&self, message: &EngineMessage) -> String;
}

/// Receives formatted engine messages
pub trait EngineLogger: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Default English messages
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishMessages;

impl MessageFormatter for EnglishMessages {
    fn format(&self, message: &EngineMessage) -> String {
        match message {
            EngineMessage::StateChanged {
                transaction_id,
                host,
                from,
                to,
            } => format!("Transaction {} on {}: {} -> {}", transaction_id, host, from, to),
            EngineMessage::ChangeRejected {
                transaction_id,
                host,
                operation,
                errors,
            } => {
                if errors.is_empty() {
                    format!(
                        "Transaction {} on {}: {} was rejected",
                        transaction_id, host, operation
                    )
                } else {
                    format!(
                        "Transaction {} on {}: {} was rejected: {}",
                        transaction_id,
                        host,
                        operation,
                        errors.join("; ")
                    )
                }
            }
            EngineMessage::CleanupFailed {
                transaction_id,
                host,
                operation,
                error,
            } => format!(
                "Transaction {} on {}: {} failed during cleanup: {}",
                transaction_id, host, operation, error
            ),
            EngineMessage::InterfaceRead {
                host,
                key,
                description,
                address,
            } => format!(
                "{}: interface {} description={} ipv4={}",
                host,
                key,
                description.as_deref().unwrap_or("-"),
                address.as_deref().unwrap_or("-")
            ),
            EngineMessage::ReadCompleted { host, count } => {
                format!("Read {} interfaces from {}", count, host)
            }
            EngineMessage::AuditWritten { host, path } => {
                format!("Stored raw reply from {} in {}", host, path.display())
            }
            EngineMessage::AuditFailed { host, error } => {
                format!("Could not store raw reply from {}: {}", host, error)
            }
            EngineMessage::UnsupportedLocale { locale } => {
                format!("No messages for locale {}, using English", locale)
            }
        }
    }
}

/// Forwards to the `log` facade under the `ncif` target
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFacade;

impl EngineLogger for LogFacade {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: "ncif", level, "{}", message);
    }
}

/// Drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl EngineLogger for NullLogger {
    fn log(&self, _level: Level, _message: &str) {}
}

/// Logger and formatter capabilities used by the engines
#[derive(Clone)]
pub struct EngineContext {
    logger: Arc<dyn EngineLogger>,
    formatter: Arc<dyn MessageFormatter>,
}

impl EngineContext {
    pub fn new(logger: Arc<dyn EngineLogger>, formatter: Arc<dyn MessageFormatter>) -> Self {
        Self { logger, formatter }
    }

    /// Context for `locale`, falling back to English.
    pub fn for_locale(logger: Arc<dyn EngineLogger>, locale: &str) -> Self {
        let context = Self::new(logger, Arc::new(EnglishMessages));
        let language = locale.split(['_', '-', '.']).next().unwrap_or_default();
        if !language.eq_ignore_ascii_case("en") && !language.eq_ignore_ascii_case("c") {
            context.report(
                Level::Warn,
                EngineMessage::UnsupportedLocale {
                    locale: locale.to_string(),
                },
            );
        }
        context
    }

    pub fn silent() -> Self {
        Self::new(Arc::new(NullLogger), Arc::new(EnglishMessages))
    }

    pub fn report(&self, level: Level, message: EngineMessage) {
        let text = self.formatter.format(&message);
        self.logger.log(level, &text);
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(Arc::new(LogFacade), Arc::new(EnglishMessages))
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext").finish_non_exhaustive()
    }
}
