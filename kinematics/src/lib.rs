pub mod center_of_mass;
pub mod engine;
pub mod grf;
pub mod joint_angle;
pub mod stride;
pub mod velocity;

pub use engine::{KinematicsConfig, KinematicsEngine, StrideAndGrf, DEFAULT_HISTORY_FRAMES};
pub use grf::GroundReactionForce;
pub use stride::StrideMetrics;
