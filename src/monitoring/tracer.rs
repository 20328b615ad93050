/*!
 * Tracing Setup
 * Structured logging for the map, queue and worker pool
 *
 * Environment variables:
 * - RUST_LOG: log filter (default: info)
 * - STRIPED_TRACE_JSON: JSON output when `1` or `true`
 */

use std::time::Instant;
use tracing::{debug, info, span, warn, Level, Span};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Phases slower than this are logged at `warn`
const SLOW_PHASE_MS: u64 = 1_000;

/// Install the global subscriber
///
/// Returns false if one was already installed (tests, embedding binaries).
pub fn init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("STRIPED_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "Tracing initialized");
    }
    installed
}

/// Timed span around one phase of work
pub struct PhaseSpan {
    span: Span,
    start: Instant,
    name: &'static str,
}

impl PhaseSpan {
    pub fn new(name: &'static str) -> Self {
        let span = span!(
            Level::INFO,
            "phase",
            phase = name,
            items = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );
        debug!(parent: &span, phase = name, "phase started");

        Self {
            span,
            start: Instant::now(),
            name,
        }
    }

    /// Record how many items the phase handled
    pub fn record_items(&self, count: usize) {
        self.span.record("items", count);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for PhaseSpan {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_millis() as u64;
        self.span.record("duration_ms", elapsed);

        if elapsed > SLOW_PHASE_MS {
            warn!(parent: &self.span, phase = self.name, duration_ms = elapsed, "slow phase");
        } else {
            debug!(parent: &self.span, phase = self.name, duration_ms = elapsed, "phase completed");
        }
    }
}

/// Start a timed phase span
pub fn span_phase(name: &'static str) -> PhaseSpan {
    PhaseSpan::new(name)
}
