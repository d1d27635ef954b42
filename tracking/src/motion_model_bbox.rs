use num_traits::{One, Zero};

use nalgebra::allocator::Allocator;
use nalgebra::core::dimension::U7;
use nalgebra::{DefaultAllocator, OMatrix, RealField};

use adskalman::TransitionModelLinearNoControl;

/// Constant-velocity, constant-scale-rate motion model for a tracked bounding
/// box, parameterized by `dt`.
///
/// The important method is `calc_for_dt()`. Calling this returns a motion
/// model for a specific `dt`.
///
/// The state vector is `[cx, cy, w, h, vx, vy, vs]`: box center, box size,
/// center velocity, and a single scale-rate shared between width and height
/// (both grow or shrink together, matching how a person's apparent box size
/// changes as they approach or recede from the camera).
#[derive(Debug, Clone)]
pub struct BboxMotionModel<R: RealField + Copy>
where
    DefaultAllocator: Allocator<U7, U7>,
    DefaultAllocator: Allocator<U7>,
{
    motion_noise_scale: R,
}

impl<R: RealField + Copy> BboxMotionModel<R>
where
    DefaultAllocator: Allocator<U7, U7>,
    DefaultAllocator: Allocator<U7>,
{
    pub fn new(motion_noise_scale: R) -> Self {
        Self { motion_noise_scale }
    }

    /// For a given `dt`, create a new instance of the motion model.
    pub fn calc_for_dt(&self, dt: R) -> BboxMotionModelFixedDt<R> {
        let zero: R = Zero::zero();
        let one: R = One::one();
        let two: R = one + one;
        let three: R = two + one;

        // state order: cx, cy, w, h, vx, vy, vs
        #[rustfmt::skip]
        let transition_model = OMatrix::<R, U7, U7>::from_row_slice(&[
            one, zero, zero, zero,   dt, zero, zero,
            zero, one, zero, zero, zero,   dt, zero,
            zero, zero, one, zero, zero, zero,   dt,
            zero, zero, zero, one, zero, zero,   dt,
            zero, zero, zero, zero, one, zero, zero,
            zero, zero, zero, zero, zero, one, zero,
            zero, zero, zero, zero, zero, zero, one,
        ]);
        let transition_model_transpose = transition_model.transpose();

        let t33 = (dt * dt * dt) / three;
        let t22 = (dt * dt) / two;
        let q = self.motion_noise_scale;

        // Position/velocity pairs (cx,vx) and (cy,vy) get the standard
        // constant-velocity noise block. The (w,h,vs) triple shares one
        // velocity term, so w and h inherit the same block against vs and
        // are fully correlated with each other through it.
        #[rustfmt::skip]
        let transition_noise_covariance = OMatrix::<R, U7, U7>::from_row_slice(&[
            t33,  zero, zero, zero, t22,  zero, zero,
            zero,  t33, zero, zero, zero, t22,  zero,
            zero, zero,  t33,  t33, zero, zero, t22,
            zero, zero,  t33,  t33, zero, zero, t22,
            t22,  zero, zero, zero,   dt, zero, zero,
            zero, t22,  zero, zero, zero,   dt, zero,
            zero, zero,  t22,  t22, zero, zero,   dt,
        ]) * q;

        BboxMotionModelFixedDt {
            transition_model,
            transition_model_transpose,
            transition_noise_covariance,
        }
    }
}

/// Constant-velocity, constant-scale-rate motion model for a fixed `dt`.
#[derive(Debug)]
pub struct BboxMotionModelFixedDt<R: RealField + Copy>
where
    DefaultAllocator: Allocator<U7, U7>,
    DefaultAllocator: Allocator<U7>,
{
    transition_model: OMatrix<R, U7, U7>,
    transition_model_transpose: OMatrix<R, U7, U7>,
    transition_noise_covariance: OMatrix<R, U7, U7>,
}

impl<R: RealField + Copy> TransitionModelLinearNoControl<R, U7> for BboxMotionModelFixedDt<R>
where
    DefaultAllocator: Allocator<U7, U7>,
    DefaultAllocator: Allocator<U7>,
{
    fn F(&self) -> &OMatrix<R, U7, U7> {
        &self.transition_model
    }
    fn FT(&self) -> &OMatrix<R, U7, U7> {
        &self.transition_model_transpose
    }
    fn Q(&self) -> &OMatrix<R, U7, U7> {
        &self.transition_noise_covariance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adskalman::StateAndCovariance;
    use nalgebra::{Matrix7, Vector7};

    /// Doing two predicts of duration `dt` should equal one predict of `2*dt`
    /// when there are no intervening observations, since the transition is
    /// linear and time-homogeneous.
    #[test]
    fn test_missing_frames_via_large_dt() {
        let model = BboxMotionModel::new(1.234_f64);

        let dt1 = 1.0 / 30.0;
        let state0 = Vector7::new(100.0, 100.0, 80.0, 160.0, 1.0, 0.0, 0.0);
        let covar0 = 10.0 * Matrix7::<f64>::identity();
        let est0 = StateAndCovariance::new(state0, covar0);

        let mm1 = model.calc_for_dt(dt1);
        let est1_1 = mm1.predict(&est0);
        let est1_2 = mm1.predict(&est1_1);

        let mm2 = model.calc_for_dt(2.0 * dt1);
        let est2_2 = mm2.predict(&est0);

        approx::assert_relative_eq!(est1_2.state(), est2_2.state(), max_relative = 1e-9);
        approx::assert_relative_eq!(
            est1_2.covariance(),
            est2_2.covariance(),
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_constant_velocity_prediction() {
        let model = BboxMotionModel::new(0.1_f64);
        let dt = 1.0 / 30.0;
        let mm = model.calc_for_dt(dt);

        let state0 = Vector7::new(0.0, 0.0, 80.0, 160.0, 30.0, 0.0, 0.0);
        let covar0 = Matrix7::<f64>::identity();
        let est0 = StateAndCovariance::new(state0, covar0);

        let est1 = mm.predict(&est0);
        approx::assert_relative_eq!(est1.state()[0], 30.0 * dt, max_relative = 1e-9);
        approx::assert_relative_eq!(est1.state()[2], 80.0, max_relative = 1e-9);
    }
}
