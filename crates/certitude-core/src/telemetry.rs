//! Diagnostic log setup for the `certitude` binary and embedding hosts.
//!
//! Diagnostics go to stderr so outcome JSON on stdout stays machine
//! readable. Audit echo lines (target `certitude::audit`) are kept at
//! `info` even when the general level is quieter, unless `RUST_LOG`
//! says otherwise.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Target used when mirroring audit records into tracing.
pub const AUDIT_TARGET: &str = "certitude::audit";

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let base = level.as_str().to_lowercase();
    // WARN and ERROR order below INFO.
    if level < Level::INFO {
        format!("{base},{AUDIT_TARGET}=info")
    } else {
        base
    }
}

/// Install the process-wide subscriber; `json` switches to one JSON object
/// per line. Only the first call in a process has any effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_levels_keep_audit_echo() {
        assert_eq!(default_directives(Level::WARN), "warn,certitude::audit=info");
        assert_eq!(default_directives(Level::DEBUG), "debug");
        assert_eq!(default_directives(Level::INFO), "info");
    }

    #[test]
    fn repeated_init_is_ignored() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
    }
}
