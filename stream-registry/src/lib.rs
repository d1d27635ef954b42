mod error;
mod registry;
mod transition;

pub use error::RegistryError;
pub use registry::{StreamEntry, StreamRegistry};
pub use transition::is_allowed;
