mod error;
mod pipeline;
mod speed;
mod track;
mod tracker;

pub use error::CoreError;
pub use pipeline::FramePipeline;
pub use tracker::{Tracker, TrackerConfig};
