//! Policies controlling domain validation, no-data handling and halo
//! filling of every algorithm.
//!
//! Algorithms are written once against [`Policies`] and behave differently
//! depending on the policy values passed in. Two standard sets exist:
//!
//! - *default* policies assume inputs never contain no-data, never mark
//!   outputs and accept every value,
//! - *value* policies detect and mark no-data using the element type's
//!   sentinel (see [`Element::no_data_value`]) and validate inputs against
//!   the algorithm's domain.

mod domain;
mod halo;
mod no_data;

pub use domain::{
    AllValuesWithinDomain, DomainFn, DomainPolicy, FractionDomain, KinematicWaveDomain,
    NonNegativeFlux, OnViolation, Rejecting,
};
pub(crate) use domain::check_domain;
pub use halo::HaloFillPolicy;
pub use no_data::{InputNoDataPolicy, OutputNoDataPolicy};

use partitioned_array::Element;

/// Policies for one input argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputPolicies<T> {
    pub no_data: InputNoDataPolicy<T>,
    pub halo: HaloFillPolicy<T>,
}

impl<T: Element> InputPolicies<T> {
    pub fn new(no_data: InputNoDataPolicy<T>, halo: HaloFillPolicy<T>) -> Self {
        Self { no_data, halo }
    }

    /// Never detect no-data; halo cells hold `T::default()`.
    pub fn default_policy() -> Self {
        Self::new(
            InputNoDataPolicy::SkipNoData,
            HaloFillPolicy::Constant(T::default()),
        )
    }

    /// Detect the type's sentinel; halo cells hold the sentinel.
    pub fn value_policy() -> Self {
        let no_data = T::no_data_value();
        Self::new(
            InputNoDataPolicy::DetectNoDataByValue(no_data),
            HaloFillPolicy::Constant(no_data),
        )
    }

    /// Default policy for a flow direction input.
    pub fn flow_direction_default() -> Self {
        Self::new(InputNoDataPolicy::SkipNoData, HaloFillPolicy::FlowDirectionSink)
    }

    /// Value policy for a flow direction input.
    pub fn flow_direction_value() -> Self {
        Self::new(
            InputNoDataPolicy::DetectNoDataByValue(T::no_data_value()),
            HaloFillPolicy::FlowDirectionSink,
        )
    }

    pub fn with_halo(mut self, halo: HaloFillPolicy<T>) -> Self {
        self.halo = halo;
        self
    }

    #[inline]
    pub fn is_no_data(&self, value: &T) -> bool {
        self.no_data.is_no_data(value)
    }

    #[inline]
    pub fn halo_fill_value(&self) -> T {
        self.halo.fill_value()
    }
}

/// Policies for one output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputPolicies<T> {
    pub no_data: OutputNoDataPolicy<T>,
}

impl<T: Element> OutputPolicies<T> {
    pub fn new(no_data: OutputNoDataPolicy<T>) -> Self {
        Self { no_data }
    }

    pub fn default_policy() -> Self {
        Self::new(OutputNoDataPolicy::DontMarkNoData)
    }

    pub fn value_policy() -> Self {
        Self::new(OutputNoDataPolicy::MarkNoDataByValue(T::no_data_value()))
    }

    #[inline]
    pub fn mark_no_data(&self, value: &mut T) {
        self.no_data.mark_no_data(value)
    }

    /// The value a no-data cell holds after marking a default-initialised
    /// cell.
    #[inline]
    pub fn no_data_value(&self) -> T {
        let mut value = T::default();
        self.mark_no_data(&mut value);
        value
    }

    #[inline]
    pub fn is_no_data(&self, value: &T) -> bool {
        self.no_data.is_no_data(value)
    }
}

/// Domain, output and input policies of one operation.
///
/// `O` and `I` are usually tuples of [`OutputPolicies`] and
/// [`InputPolicies`], one per output and input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Policies<D, O, I> {
    pub domain_policy: D,
    pub output_policies: O,
    pub input_policies: I,
}

impl<D, O, I> Policies<D, O, I> {
    pub fn new(domain_policy: D, output_policies: O, input_policies: I) -> Self {
        Self {
            domain_policy,
            output_policies,
            input_policies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_input_policy() {
        let policy = InputPolicies::<i32>::default_policy();
        assert!(!policy.is_no_data(&i32::MIN));
        assert_eq!(policy.halo_fill_value(), 0);
    }

    #[test]
    fn test_value_input_policy() {
        let policy = InputPolicies::<u8>::value_policy();
        assert!(policy.is_no_data(&255));
        assert_eq!(policy.halo_fill_value(), 255);

        let policy = InputPolicies::<u8>::flow_direction_value();
        assert!(policy.is_no_data(&255));
        assert_eq!(policy.halo_fill_value(), 5);
    }

    #[test]
    fn test_output_no_data_value() {
        assert_eq!(OutputPolicies::<f32>::default_policy().no_data_value(), 0.0);
        assert!(OutputPolicies::<f32>::value_policy().no_data_value().is_nan());
    }
}
