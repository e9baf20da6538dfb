pub mod api;
pub mod config;
pub mod pipeline;
pub mod pipeline_config;

pub use api::Envelope;
pub use pipeline::extraction::{
    EncryptedDocument, EngineError, ExtractionError, ExtractionWarning, IdentityExtractor, Stage,
};
pub use pipeline::structuring::{ExtractionResult, FieldMatch, FieldName, FieldValue};
pub use pipeline_config::PipelineConfig;

use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber. `RUST_LOG` wins over the default filter.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
