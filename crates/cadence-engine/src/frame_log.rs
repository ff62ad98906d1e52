//! Frame callback that appends every frame to a JSON-lines file.
//!
//! Write failures are logged and counted, never fatal: the run keeps its
//! in-memory frame log either way.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use cadence_core::{FrameCallback, StepOutcome};
use cadence_types::TickFrame;
use tracing::{debug, warn};

use crate::error::EngineError;

/// Writes one JSON object per line.
pub struct FrameLogCallback<W: Write + Send> {
    writer: W,
    written: u64,
    failed: u64,
}

impl FrameLogCallback<BufWriter<File>> {
    /// Create (or truncate) the log file at `path`.
    pub fn create(path: &Path) -> Result<Self, EngineError> {
        let file = File::create(path).map_err(|source| EngineError::FrameLog {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> FrameLogCallback<W> {
    /// Wrap an arbitrary writer.
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
            failed: 0,
        }
    }

    /// Frames written so far.
    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Frames that could not be written.
    pub const fn failed(&self) -> u64 {
        self.failed
    }

    /// Flush buffered lines.
    pub fn flush(&mut self) {
        if let Err(err) = self.writer.flush() {
            warn!(error = %err, "failed to flush frame log");
        }
    }

    /// The wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_frame(&mut self, frame: &TickFrame) -> Result<(), std::io::Error> {
        serde_json::to_writer(&mut self.writer, frame)?;
        self.writer.write_all(b"\n")
    }
}

impl<W: Write + Send> FrameCallback for FrameLogCallback<W> {
    fn on_step(&mut self, outcome: &StepOutcome, frame: &TickFrame) {
        match self.write_frame(frame) {
            Ok(()) => {
                self.written = self.written.saturating_add(1);
                debug!(
                    tick = outcome.tick,
                    phase = %outcome.phase,
                    sequence = frame.meta.sequence,
                    "frame written"
                );
            }
            Err(err) => {
                self.failed = self.failed.saturating_add(1);
                warn!(
                    tick = outcome.tick,
                    phase = %outcome.phase,
                    error = %err,
                    "failed to write frame"
                );
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;

    use cadence_core::{
        Adapters, CadenceConfig, FixedClock, InMemoryKernel, TickOrchestrator, run_ticks,
    };
    use cadence_types::RunId;

    use super::*;

    #[tokio::test]
    async fn writes_one_line_per_frame() {
        let config = CadenceConfig::default();
        let mut orchestrator = TickOrchestrator::new(
            RunId::fixed(1),
            Arc::new(FixedClock::epoch()),
            config.orchestrator_config(),
            config.budget_gate().unwrap(),
            Box::new(InMemoryKernel::new()),
            Adapters::none(),
        );
        cadence_personas::register_all(&mut orchestrator, &config).unwrap();

        let mut callback = FrameLogCallback::new(Vec::new());
        let payload = serde_json::to_value(&config).unwrap();
        run_ticks(&mut orchestrator, payload, 2, &mut callback)
            .await
            .unwrap();

        assert_eq!(callback.written(), 11);
        assert_eq!(callback.failed(), 0);
        let bytes = callback.into_inner();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0]["phase"], "init");
        assert_eq!(lines[10]["phase"], "summarize");
        assert_eq!(lines[10]["tick"], 1);
    }
}
