use analytics_types::Frame;

use crate::error::SourceError;

/// What `next()` produced for one poll of a source.
#[derive(Debug)]
pub enum FrameEvent {
    Frame(Frame),
    EndOfStream,
    /// A transient read failure the source is already retrying internally;
    /// surfaced so the pipeline can record a Degraded metric.
    Transient(String),
}

/// Opens a video source, produces timestamped frames at a target rate,
/// and handles reconnect. One instance owns exactly one source; dropped
/// (via `close`) when the owning stream stops.
pub trait FrameSource: Send {
    fn next(&mut self) -> Result<FrameEvent, SourceError>;
    fn close(&mut self);
}
