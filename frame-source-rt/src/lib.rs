mod device_source;
mod error;
mod file_source;
mod network_source;
mod quality;
mod rate_limit;
mod reconnect;
mod source;

pub use device_source::{DeviceReader, DeviceSource};
pub use error::SourceError;
pub use file_source::FileSource;
pub use network_source::{ByteReader, NetworkFrameSource, Protocol};
pub use quality::downscale_to_tier;
pub use rate_limit::RateLimiter;
pub use reconnect::ReconnectPolicy;
pub use source::{FrameEvent, FrameSource};
