extern crate adskalman;
extern crate nalgebra as na;
extern crate num_traits;

pub mod assignment;
pub mod iou;
pub mod motion_model_bbox;
pub mod observation_model_bbox;

pub use assignment::hungarian_assignment;
pub use iou::iou;
pub use motion_model_bbox::{BboxMotionModel, BboxMotionModelFixedDt};
pub use observation_model_bbox::BboxObservationModel;
