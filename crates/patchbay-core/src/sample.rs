//! Numeric sample types and processing precision.
//!
//! The executor is generic over [`Sample`] so that the same compiled schedule
//! can be instantiated once for `f32` and once for `f64`. Conversions go
//! through `f64`, which is exact for both implementations.

use core::fmt::Debug;
use core::ops::{Add, AddAssign};

/// Numeric precision a graph (or a single node) processes audio in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Precision {
    /// 32-bit floating point.
    #[default]
    Single,
    /// 64-bit floating point.
    Double,
}

/// A floating-point audio sample.
pub trait Sample:
    Copy + Default + Debug + PartialEq + Add<Output = Self> + AddAssign + Send + Sync + 'static
{
    /// Additive identity.
    const ZERO: Self;

    /// Precision this type represents.
    const PRECISION: Precision;

    /// Converts from `f64`, rounding if needed.
    fn from_f64(value: f64) -> Self;

    /// Widens to `f64`.
    fn to_f64(self) -> f64;
}

impl Sample for f32 {
    const ZERO: Self = 0.0;
    const PRECISION: Precision = Precision::Single;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Sample for f64 {
    const ZERO: Self = 0.0;
    const PRECISION: Precision = Precision::Double;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

/// Copies `src` into `dst`, converting between sample types.
///
/// Copies `min(src.len(), dst.len())` samples.
#[inline]
pub fn convert_into<A: Sample, B: Sample>(src: &[A], dst: &mut [B]) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d = B::from_f64(s.to_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_round_trips_through_f64() {
        let values = [0.0f32, 1.0, -0.5, 1.0e-7, f32::MAX];
        for v in values {
            assert_eq!(f32::from_f64(v.to_f64()), v);
        }
    }

    #[test]
    fn test_convert_into_widens_and_narrows() {
        let src = [0.25f32, -0.75, 1.0];
        let mut wide = [0.0f64; 3];
        convert_into(&src, &mut wide);
        assert_eq!(wide, [0.25, -0.75, 1.0]);

        let mut narrow = [0.0f32; 3];
        convert_into(&wide, &mut narrow);
        assert_eq!(narrow, src);
    }

    #[test]
    fn test_convert_into_stops_at_shorter_slice() {
        let src = [1.0f64; 8];
        let mut dst = [0.0f32; 3];
        convert_into(&src, &mut dst);
        assert_eq!(dst, [1.0; 3]);
    }

    #[test]
    fn test_precision_constants() {
        assert_eq!(<f32 as Sample>::PRECISION, Precision::Single);
        assert_eq!(<f64 as Sample>::PRECISION, Precision::Double);
        assert_eq!(Precision::default(), Precision::Single);
    }
}
