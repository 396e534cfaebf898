//! Trellis Runtime
//!
//! Entry point for applications built on Trellis workflows. Re-exports the
//! execution core and, with the `recorder` feature, the recording crate, and
//! provides the logging bootstrap.

pub use trellis_core;

#[cfg(feature = "recorder")]
pub use trellis_recorder;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Commonly used types
pub mod prelude {
    pub use trellis_core::{
        AnyWorkflowAction, HostConfig, RenderContext, Sink, Workflow, WorkflowAction,
        WorkflowHierarchyDebugSnapshot, WorkflowHost, WorkflowObserver, WorkflowUpdateDebugInfo,
    };

    #[cfg(feature = "recorder")]
    pub use trellis_recorder::{attach, RecordingConfig, SharedRecordingSession, WorkflowRecorder};
}

/// Errors surfaced at the application boundary.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("failed to initialize logging: {0}")]
    Logging(String),

    #[error(transparent)]
    Workflow(#[from] trellis_core::WorkflowError),

    #[cfg(feature = "recorder")]
    #[error(transparent)]
    Recorder(#[from] trellis_recorder::RecorderError),
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Install a `tracing` subscriber that honors `RUST_LOG`, defaulting to
/// `default_level` for everything `RUST_LOG` does not mention.
pub fn init_logging(default_level: tracing::Level) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_level.into()))
        .try_init()
        .map_err(|err| RuntimeError::Logging(err.to_string()))
}

/// Initialize the Trellis runtime with `INFO` logging.
pub fn init() -> anyhow::Result<()> {
    init_logging(tracing::Level::INFO)?;
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "trellis runtime initialized");
    Ok(())
}
