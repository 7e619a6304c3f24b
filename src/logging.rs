//! Logging Setup
//!
//! Installs the global tracing subscriber, and the per-datasource span that
//! every datasource logs under.

use tracing::Span;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;
use crate::constants::LOG_FILE_PREFIX;
use crate::error::{Error, Result};

/// Initialize tracing for the process.
///
/// `RUST_LOG` wins over `config.level`. When a log directory is configured the
/// returned guard must be held for the lifetime of the process, otherwise
/// buffered lines are lost.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .try_init()
                .map_err(|e| Error::invalid_state(format!("tracing already initialized: {e}")))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init()
                .map_err(|e| Error::invalid_state(format!("tracing already initialized: {e}")))?;
            Ok(None)
        }
    }
}

/// Logging scope owned by one datasource instance.
///
/// Events are emitted with this span as their explicit parent, so two
/// datasources bound to different grids never interleave anonymously.
#[derive(Clone, Debug)]
pub struct LogContext {
    id: uuid::Uuid,
    span: Span,
}

impl LogContext {
    /// Create a context for a datasource of the given kind
    pub fn new(kind: &'static str) -> Self {
        let id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("datasource", %id, kind);
        Self { id, span }
    }

    /// Create a child context that stays under this context's span
    pub fn child(&self, kind: &'static str) -> Self {
        let id = uuid::Uuid::new_v4();
        let span = tracing::info_span!(parent: &self.span, "datasource", %id, kind);
        Self { id, span }
    }

    /// Unique id of the owning datasource
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    /// Span to use as the parent of emitted events
    pub fn span(&self) -> &Span {
        &self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_get_distinct_ids() {
        let parent = LogContext::new("composite");
        let child = parent.child("table");
        assert_ne!(parent.id(), child.id());
    }
}
