//! Values for cells outside the array.

use partitioned_array::Element;

use crate::flow_direction::SINK;

/// Supplies values for halo cells that have no owning partition, or
/// whose owner is unavailable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HaloFillPolicy<T> {
    /// Use a fixed value.
    Constant(T),
    /// Use the sink direction, so cells outside the array never drain into
    /// the array.
    FlowDirectionSink,
}

impl<T: Element> HaloFillPolicy<T> {
    #[inline]
    pub fn fill_value(&self) -> T {
        match self {
            Self::Constant(value) => *value,
            Self::FlowDirectionSink => T::try_from_f64(f64::from(SINK)).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_values() {
        assert_eq!(HaloFillPolicy::Constant(7_u16).fill_value(), 7);
        assert_eq!(HaloFillPolicy::<u8>::FlowDirectionSink.fill_value(), SINK);
    }
}
