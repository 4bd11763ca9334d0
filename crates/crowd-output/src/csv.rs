//! CSV snapshot recorder.
//!
//! Creates `agent_snapshots.csv` in the configured directory and appends one
//! row per agent per frame.
//!
//! # Threading
//!
//! ```text
//! deliver(frame) ──► bounded queue (QUEUE_FRAMES) ──► "csv-recorder" thread
//!                                                        write rows, flush
//! ```
//!
//! Delivery only enqueues, so a slow disk never holds up the broadcast task.
//! A queue that stays full past the publisher's timeout drops the recorder
//! like any other slow subscriber.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use csv::Writer;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crowd_agent::{EventPhase, KindTag};

use crate::{Frame, OutputError, OutputResult, Subscriber};

pub const SNAPSHOT_FILE: &str = "agent_snapshots.csv";

/// Frames buffered ahead of the writer thread.
pub const QUEUE_FRAMES: usize = 8;

const HEADER: [&str; 8] = ["frame", "id", "lat", "lon", "type", "phase", "speed", "stop"];

/// Records every frame it receives.
pub struct CsvRecorder {
    queue: Option<mpsc::Sender<Frame>>,
    done:  Option<oneshot::Receiver<OutputResult<()>>>,
    rows:  Arc<AtomicU64>,
}

impl CsvRecorder {
    /// Create (or truncate) the CSV file in `dir` and write the header row.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        Self::from_writer(File::create(dir.join(SNAPSHOT_FILE))?)
    }

    /// Record into any byte sink.  The header is written before returning.
    pub fn from_writer<W: Write + Send + 'static>(sink: W) -> OutputResult<Self> {
        let mut out = Writer::from_writer(sink);
        out.write_record(HEADER)?;
        out.flush()?;

        let (queue, frames) = mpsc::channel(QUEUE_FRAMES);
        let (report, done) = oneshot::channel();
        let rows = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&rows);
        std::thread::Builder::new()
            .name("csv-recorder".into())
            .spawn(move || {
                let result = write_frames(out, frames, &counter);
                if let Err(e) = &result {
                    warn!(error = %e, "csv recorder stopped");
                }
                // Nobody may be waiting for the result.
                let _ = report.send(result);
            })?;

        Ok(Self { queue: Some(queue), done: Some(done), rows })
    }

    /// Rows written to the sink so far.
    pub fn rows(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }

    /// Stop accepting frames, wait for queued ones to be written, and flush.
    /// Idempotent.
    pub async fn finish(&mut self) -> OutputResult<()> {
        self.queue = None;
        let Some(done) = self.done.take() else { return Ok(()) };
        done.await.unwrap_or(Err(OutputError::Closed))
    }
}

/// The writer thread's loop: runs until every sender is gone.
fn write_frames<W: Write>(
    mut out: Writer<W>,
    mut frames: mpsc::Receiver<Frame>,
    rows: &AtomicU64,
) -> OutputResult<()> {
    while let Some(frame) = frames.blocking_recv() {
        for a in frame.agents.iter() {
            out.write_record(&[
                frame.seq.to_string(),
                a.id.0.to_string(),
                a.lat.to_string(),
                a.lon.to_string(),
                kind_label(a.kind).to_owned(),
                phase_label(a.phase).to_owned(),
                a.speed.to_string(),
                (a.stop as u8).to_string(),
            ])?;
            rows.fetch_add(1, Ordering::Relaxed);
        }
        out.flush()?;
    }
    out.flush()?;
    Ok(())
}

fn kind_label(kind: KindTag) -> &'static str {
    match kind {
        KindTag::Generic => "generic",
        KindTag::Random  => "random",
        KindTag::Routed  => "routed",
        KindTag::Event   => "event",
    }
}

/// Empty for non-event agents.
fn phase_label(phase: Option<EventPhase>) -> &'static str {
    match phase {
        None                       => "",
        Some(EventPhase::ToDest)   => "to_dest",
        Some(EventPhase::Dwelling) => "dwelling",
        Some(EventPhase::Exiting)  => "exiting",
        Some(EventPhase::Settled)  => "settled",
    }
}

#[async_trait]
impl Subscriber for CsvRecorder {
    /// Waits only for queue space.  Fails once the writer thread has stopped.
    async fn deliver(&mut self, frame: &Frame) -> OutputResult<()> {
        let queue = self.queue.as_ref().ok_or(OutputError::Closed)?;
        queue.send(frame.clone()).await.map_err(|_| OutputError::Closed)
    }

    async fn close(&mut self) -> OutputResult<()> {
        self.finish().await
    }
}
