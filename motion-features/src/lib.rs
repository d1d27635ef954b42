pub mod connected_components;
pub mod motion_energy;
pub mod optical_flow;

pub use connected_components::{connected_components as compute_connected_components, Region};
pub use motion_energy::compute_motion_energy;
pub use optical_flow::SparseOpticalFlowTracker;
