//! Diagnostic logging setup.
//!
//! Events go to stderr so command output on stdout stays clean. The filter is
//! chosen from `RUST_LOG` first, then the `-v` count, then `[log].filter`.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing(verbose: u8, configured: &str) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(env.as_deref(), verbose, configured);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be installed when embedded in tests.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn filter_directive(env: Option<&str>, verbose: u8, configured: &str) -> String {
    if let Some(env) = env.filter(|e| !e.trim().is_empty()) {
        return env.to_string();
    }
    match verbose {
        0 => configured.to_string(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}
