//! Diagnostic log lines, plain or JSON (one object per line). Logs go to
//! stderr; stdout is reserved for scan output.

use serde::Serialize;
use std::io::Write;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install global subscriber: lines to stderr, level from RUST_LOG or default.
    pub fn init(json: bool, default_level: &str) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt)
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    /// Emit one value as a single JSON line (e.g. scan records to stdout)
    /// without going through tracing
    pub fn emit_json(event: &impl Serialize, w: &mut impl Write) {
        if let Ok(line) = serde_json::to_string(event) {
            let _ = writeln!(w, "{}", line);
        }
    }
}
