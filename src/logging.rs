//! Tracing setup for the `harvest` binary.
//!
//! Events go to stderr so stdout stays reserved for command output. The
//! filter comes from `RUST_LOG` when set, otherwise [`DEFAULT_FILTER`].

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "warn,channel_harvester=info";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => {
            let _ = registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_writer(std::io::stderr),
                )
                .try_init();
        }
        LogFormat::Text => {
            let _ = registry
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(atty::is(atty::Stream::Stderr))
                        .with_writer(std::io::stderr),
                )
                .try_init();
        }
    }
}
