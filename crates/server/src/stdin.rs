//! Line-oriented text source
//!
//! Reads one JSON object per line: `{"region": "...", "text": "..."}` for
//! an observation or `{"visible": bool}` for a visibility change. Bad lines
//! are logged and skipped. End of input ends the source.

use serde::Deserialize;
use speech_relay_core::RegionId;
use speech_relay_pipeline::Notifier;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::state::DocumentState;
use crate::ServerError;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SourceLine {
    Observe { region: String, text: String },
    Visibility { visible: bool },
}

/// Counters for one stdin run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LineStats {
    pub applied: usize,
    pub skipped: usize,
}

/// Feed `document` from `reader` until end of input.
///
/// The notifier is dropped on return, which lets the session drain.
pub async fn run_stdin_source<R>(
    reader: R,
    document: &DocumentState,
    notifier: Notifier,
) -> Result<LineStats, ServerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = LineStats::default();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<SourceLine>(line) {
            Ok(SourceLine::Observe { region, text }) if !region.trim().is_empty() => {
                debug!(line = line_no, region = %region, "Observation line");
                document.update(RegionId::new(region.trim()), text);
            }
            Ok(SourceLine::Observe { .. }) => {
                warn!(line = line_no, "Observation without region skipped");
                stats.skipped += 1;
                continue;
            }
            Ok(SourceLine::Visibility { visible }) => {
                document.set_visible(visible);
            }
            Err(e) => {
                warn!(line = line_no, error = %e, "Malformed input line skipped");
                stats.skipped += 1;
                continue;
            }
        }

        stats.applied += 1;
        if !notifier.notify() {
            return Err(ServerError::SessionStopped);
        }
    }

    info!(applied = stats.applied, skipped = stats.skipped, "Input closed");
    Ok(stats)
}
