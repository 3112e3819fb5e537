use std::fmt;
use std::io;

/// Result alias used throughout the crate.
pub type AppenderResult<T> = Result<T, AppenderError>;

/// Errors surfaced at the boundary of an [`Appender`](crate::Appender).
#[derive(Debug)]
pub enum AppenderError {
    /// [`TcpAppender`](crate::tcp::TcpAppender) could not deliver a payload
    /// within its configured `write_timeout`.
    WriteTimeout,
    /// A write was attempted on an [`AsyncAppender`](crate::async_appender::AsyncAppender)
    /// after `shutdown` completed.
    Closed,
    /// Raised by the test-only chaos appenders (`testkit` feature) when
    /// switched into a failing state.
    FailEnabled,
    /// A constructor rejected an invalid configuration value.
    InvalidConfiguration {
        /// Human-readable reason the configuration was rejected.
        reason: String,
    },
    /// Propagated I/O failure from a [`ByteSink`](crate::sink::ByteSink) or
    /// [`Connection`](crate::tcp::Connection).
    Io(io::Error),
    /// An [`Enveloping`](crate::enveloping::Enveloping) envelope function
    /// failed.
    EnvelopeFailed(String),
    /// Both branches of a composite (e.g. [`Fallback`](crate::fallback::Fallback))
    /// failed; carries every underlying cause in order.
    Aggregate(Vec<AppenderError>),
}

impl AppenderError {
    /// Build an [`AppenderError::Aggregate`], flattening any nested
    /// aggregates so errors never nest more than one level deep.
    pub fn aggregate(errors: Vec<AppenderError>) -> AppenderError {
        let mut flat = Vec::with_capacity(errors.len());
        for e in errors {
            match e {
                AppenderError::Aggregate(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        AppenderError::Aggregate(flat)
    }
}

impl fmt::Display for AppenderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppenderError::WriteTimeout => write!(f, "write timed out"),
            AppenderError::Closed => write!(f, "appender is closed"),
            AppenderError::FailEnabled => write!(f, "chaos appender is failing"),
            AppenderError::InvalidConfiguration { reason } => {
                write!(f, "invalid configuration: {}", reason)
            }
            AppenderError::Io(e) => write!(f, "{}", e),
            AppenderError::EnvelopeFailed(msg) => write!(f, "envelope function failed: {}", msg),
            AppenderError::Aggregate(errors) => {
                write!(f, "{} errors occurred:", errors.len())?;
                for e in errors {
                    write!(f, "\n  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for AppenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppenderError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for AppenderError {
    fn from(e: io::Error) -> Self {
        AppenderError::Io(e)
    }
}
