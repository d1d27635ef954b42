mod detector;
mod error;
mod pose;

pub use detector::{DetectorAdapter, MotionBlobDetector, PERSON_CLASS_ID};
pub use error::{AdapterError, Result};
pub use pose::{PoseAdapter, TemplatePoseAdapter};
