use nalgebra::RealField;
use num_traits::ToPrimitive;

/// Trait for floating point types (f32, f64)
/// Mainly used to identify the type of the field in nalgebra
pub trait FloatingPoint: RealField + ToPrimitive + Copy {}

impl FloatingPoint for f32 {}
impl FloatingPoint for f64 {}

/// Convert an index or count into the scalar field.
pub(crate) fn from_usize<T: FloatingPoint>(v: usize) -> T {
    nalgebra::convert(v as f64)
}
