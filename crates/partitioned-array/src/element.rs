//! Element types that can be stored in partitioned arrays.

use num_traits::{Float, NumCast};
use std::fmt::Debug;
use std::hash::Hash;

/// A value that can live in an array partition.
pub trait Element:
    Copy + Debug + Default + PartialEq + PartialOrd + NumCast + Send + Sync + 'static
{
    /// Name used in log fields and error messages.
    const TYPE_NAME: &'static str;

    /// Sentinel used by the value policies to represent missing data.
    fn no_data_value() -> Self;

    /// Equality that considers NaN equal to NaN.
    fn same_value(&self, other: &Self) -> bool;

    /// Whether the value is unordered (NaN).
    fn is_unordered(&self) -> bool {
        false
    }

    /// Lossy conversion for arithmetic in double precision.
    fn as_f64(&self) -> f64 {
        num_traits::cast(*self).unwrap_or(f64::NAN)
    }

    /// Conversion back from double precision, `None` if out of range.
    fn try_from_f64(value: f64) -> Option<Self> {
        num_traits::cast(value)
    }

    /// Addition in the element type, `None` if an integer sum overflows.
    fn checked_sum(self, other: Self) -> Option<Self>;
}

/// Integral elements usable as zone identifiers and class values.
pub trait ZoneElement: Element + Eq + Ord + Hash {}

/// Floating point elements, required by the routing solvers.
pub trait FloatElement: Element + Float {}

macro_rules! impl_integer_element {
    ($($t:ty => $nd:expr),* $(,)?) => {
        $(
            impl Element for $t {
                const TYPE_NAME: &'static str = stringify!($t);

                fn no_data_value() -> Self {
                    $nd
                }

                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }

                fn checked_sum(self, other: Self) -> Option<Self> {
                    self.checked_add(other)
                }
            }

            impl ZoneElement for $t {}
        )*
    };
}

macro_rules! impl_float_element {
    ($($t:ty),* $(,)?) => {
        $(
            impl Element for $t {
                const TYPE_NAME: &'static str = stringify!($t);

                fn no_data_value() -> Self {
                    <$t>::NAN
                }

                fn same_value(&self, other: &Self) -> bool {
                    (self.is_nan() && other.is_nan()) || self == other
                }

                fn is_unordered(&self) -> bool {
                    <$t>::is_nan(*self)
                }

                fn checked_sum(self, other: Self) -> Option<Self> {
                    Some(self + other)
                }
            }

            impl FloatElement for $t {}
        )*
    };
}

impl_integer_element!(
    u8 => u8::MAX,
    u16 => u16::MAX,
    u32 => u32::MAX,
    u64 => u64::MAX,
    i8 => i8::MIN,
    i16 => i16::MIN,
    i32 => i32::MIN,
    i64 => i64::MIN,
);

impl_float_element!(f32, f64);
