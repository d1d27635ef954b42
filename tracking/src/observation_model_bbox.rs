use num_traits::{One, Zero};

use nalgebra::allocator::Allocator;
use nalgebra::core::dimension::{DimMin, U4, U7};
use nalgebra::{DefaultAllocator, OMatrix, OVector, RealField};

use adskalman::ObservationModel;

/// Observes `[cx, cy, w, h]` out of the 7-dimensional tracker state
/// `[cx, cy, w, h, vx, vy, vs]`.
#[derive(Debug)]
pub struct BboxObservationModel<R: RealField> {
    observation_matrix: OMatrix<R, U4, U7>,
    observation_matrix_transpose: OMatrix<R, U7, U4>,
    observation_noise_covariance: OMatrix<R, U4, U4>,
}

impl<R: RealField> BboxObservationModel<R> {
    pub fn new(observation_noise_covariance: OMatrix<R, U4, U4>) -> Self {
        let zero: R = Zero::zero();
        let one: R = One::one();

        #[rustfmt::skip]
        let observation_matrix = OMatrix::<R, U4, U7>::from_row_slice(&[
            one, zero, zero, zero, zero, zero, zero,
            zero, one, zero, zero, zero, zero, zero,
            zero, zero, one, zero, zero, zero, zero,
            zero, zero, zero, one, zero, zero, zero,
        ]);
        let observation_matrix_transpose = observation_matrix.transpose();
        Self {
            observation_matrix,
            observation_matrix_transpose,
            observation_noise_covariance,
        }
    }
}

impl<R: RealField> ObservationModel<R, U7, U4> for BboxObservationModel<R>
where
    DefaultAllocator: Allocator<U7, U7>,
    DefaultAllocator: Allocator<U7>,
    DefaultAllocator: Allocator<U4, U7>,
    DefaultAllocator: Allocator<U7, U4>,
    DefaultAllocator: Allocator<U4, U4>,
    DefaultAllocator: Allocator<U4>,
    DefaultAllocator: Allocator<(usize, usize), U4>,
    U4: DimMin<U4, Output = U4>,
{
    fn H(&self) -> &OMatrix<R, U4, U7> {
        &self.observation_matrix
    }
    fn HT(&self) -> &OMatrix<R, U7, U4> {
        &self.observation_matrix_transpose
    }
    fn R(&self) -> &OMatrix<R, U4, U4> {
        &self.observation_noise_covariance
    }
    fn predict_observation(&self, state: &OVector<R, U7>) -> OVector<R, U4> {
        &self.observation_matrix * state
    }
}
