//! Process-wide logging, installed once at startup
//!
//! Events go to stderr so scripts printed on stdout can be piped.

use std::time::Instant;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Keeps the subscriber's lifetime tied to `main`
pub struct Telemetry {
    started: Instant,
}

impl Telemetry {
    pub fn init(verbose: u8) -> Self {
        let filter = Self::default_filter(verbose);

        let installed = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
            .try_init();

        if let Err(e) = installed {
            eprintln!("warning: logging already initialized: {}", e);
        }
        Self { started: Instant::now() }
    }

    /// `RUST_LOG` wins over this when set
    fn default_filter(verbose: u8) -> &'static str {
        match verbose {
            0 => "warn,sqlforge=info,sqlforge_core=info",
            1 => "info,sqlforge=debug,sqlforge_core=debug",
            _ => "trace",
        }
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        tracing::debug!("sqlforge finished in {:?}", self.started.elapsed());
    }
}
