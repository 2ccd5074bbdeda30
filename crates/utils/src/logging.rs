//! Tracing subscriber setup shared by the binaries.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks between `debug` and
/// `info` for the workspace crates. Output goes to stderr so progress bars
/// and command output on stdout stay readable.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,storybook={lvl},services={lvl},db={lvl},utils={lvl}",
            lvl = default_level
        ))
    });

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}
