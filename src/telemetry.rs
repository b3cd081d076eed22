//! Structured logging for the export pipeline.

use crate::report::ReportOutcome;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FORMAT_VAR: &str = "STAGEPLOT_LOG_FORMAT";

/// Reports slower than this are logged at warn level.
pub const SLOW_REPORT_MS: u64 = 2000;

/// Installs the global subscriber.
///
/// Reads `RUST_LOG` for filtering (default `info`). Setting
/// `STAGEPLOT_LOG_FORMAT=json` switches to one JSON object per line.
/// Logs go to stderr so stdout stays free for command output.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var(LOG_FORMAT_VAR)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if result.is_ok() {
        info!(json = json, "Tracing initialized");
    }
}

/// Emits one summary record for a finished report.
pub fn record_report_telemetry(outcome: &ReportOutcome, duration_ms: u64) {
    info!(
        plot_id = outcome.plot_id,
        filename = %outcome.document.filename,
        pages = outcome.document.page_count,
        bytes = outcome.document.bytes.len(),
        elements = outcome.element_count,
        inputs = outcome.input_count,
        cover = %outcome.cover,
        new_snapshot = outcome.new_snapshot_filename().unwrap_or(""),
        duration_ms = duration_ms,
        "Stage plot report generated"
    );

    if duration_ms > SLOW_REPORT_MS {
        warn!(
            plot_id = outcome.plot_id,
            duration_ms = duration_ms,
            threshold_ms = SLOW_REPORT_MS,
            "Report generation exceeded performance threshold"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Plot;
    use crate::report::ReportAssembler;
    use crate::repository::InMemoryRepository;
    use crate::store::SnapshotStore;

    #[test]
    fn test_record_report_telemetry() {
        init_tracing();
        init_tracing();

        let dir = tempfile::tempdir().unwrap();
        let assembler = ReportAssembler::new(InMemoryRepository::new(), SnapshotStore::new(dir.path()));
        let outcome = assembler.assemble(&Plot::new(1, "Telemetry"), &[], &[], None);

        // Should not panic on either side of the threshold
        record_report_telemetry(&outcome, 12);
        record_report_telemetry(&outcome, SLOW_REPORT_MS + 1);
    }
}
