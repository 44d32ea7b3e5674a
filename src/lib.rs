pub mod backend; // Gallery server contract: HTTP + in-memory mock
pub mod cache;
pub mod config;
pub mod error;
pub mod events; // Progress, notifications and rendered views for the host
pub mod gallery; // Client façade + confirmation gate
pub mod models;
pub mod pipeline;
pub mod render; // Pure, HTML-safe display model

use tracing_subscriber::EnvFilter;

pub use gallery::{ConfirmRequest, ConfirmationGate, GalleryClient};

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();

    tracing::debug!("{} v{} tracing initialised", config::APP_NAME, config::APP_VERSION);
}
