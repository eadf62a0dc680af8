// Tracing setup: progress from the asset engines goes to stderr, data to stdout.
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub fn init_tracing(verbosity: u8) {
    // Prefer RUST_LOG from env, otherwise derive the filter from -v flags.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity > 1)
                .without_time(),
        )
        .try_init();
}

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn,aapctl_core=info",
        1 => "info,aapctl_core=debug",
        _ => "debug",
    }
}
