//! Domain validation of algorithm inputs.

use std::fmt::Debug;

use partitioned_array::{ArrayError, Element, Result};

/// What happens to a cell whose inputs fall outside the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnViolation {
    /// The output cell becomes no-data.
    #[default]
    MarkNoData,
    /// The whole operation fails with a domain error.
    Reject,
}

/// Decides whether a cell's inputs are valid for an operation.
///
/// `Args` is the tuple of input values the operation checks per cell.
pub trait DomainPolicy<Args>: Clone + Send + Sync + 'static {
    fn within_domain(&self, args: Args) -> bool;

    fn on_violation(&self) -> OnViolation {
        OnViolation::MarkNoData
    }
}

/// Accepts every input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllValuesWithinDomain;

impl<Args> DomainPolicy<Args> for AllValuesWithinDomain {
    #[inline]
    fn within_domain(&self, _args: Args) -> bool {
        true
    }
}

/// Domain given by a predicate.
#[derive(Clone)]
pub struct DomainFn<F> {
    predicate: F,
    on_violation: OnViolation,
}

impl<F> DomainFn<F> {
    /// Cells failing `predicate` become no-data.
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            on_violation: OnViolation::MarkNoData,
        }
    }

    /// Cells failing `predicate` make the operation fail.
    pub fn rejecting(predicate: F) -> Self {
        Self {
            predicate,
            on_violation: OnViolation::Reject,
        }
    }
}

impl<Args, F> DomainPolicy<Args> for DomainFn<F>
where
    F: Fn(Args) -> bool + Clone + Send + Sync + 'static,
{
    fn within_domain(&self, args: Args) -> bool {
        (self.predicate)(args)
    }

    fn on_violation(&self) -> OnViolation {
        self.on_violation
    }
}

/// Turns any domain policy into one that rejects violations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rejecting<D>(pub D);

impl<Args, D: DomainPolicy<Args>> DomainPolicy<Args> for Rejecting<D> {
    fn within_domain(&self, args: Args) -> bool {
        self.0.within_domain(args)
    }

    fn on_violation(&self) -> OnViolation {
        OnViolation::Reject
    }
}

/// Accumulation domain: inflow and rule parameter must be non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NonNegativeFlux;

impl<F: Element> DomainPolicy<(F, F)> for NonNegativeFlux {
    #[inline]
    fn within_domain(&self, (inflow, parameter): (F, F)) -> bool {
        inflow.as_f64() >= 0.0 && parameter.as_f64() >= 0.0
    }
}

impl<F: Element> DomainPolicy<(F,)> for NonNegativeFlux {
    #[inline]
    fn within_domain(&self, (inflow,): (F,)) -> bool {
        inflow.as_f64() >= 0.0
    }
}

/// Fraction domain: non-negative inflow, fraction within [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FractionDomain;

impl<F: Element> DomainPolicy<(F, F)> for FractionDomain {
    #[inline]
    fn within_domain(&self, (inflow, fraction): (F, F)) -> bool {
        let fraction = fraction.as_f64();
        inflow.as_f64() >= 0.0 && (0.0..=1.0).contains(&fraction)
    }
}

/// Kinematic wave domain over (current outflow, lateral inflow, channel
/// length): outflow must be non-negative and the channel must have a
/// positive length. Lateral inflow may be negative (extraction).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KinematicWaveDomain;

impl<F: Element> DomainPolicy<(F, F, F)> for KinematicWaveDomain {
    #[inline]
    fn within_domain(&self, (current_outflow, _inflow, channel_length): (F, F, F)) -> bool {
        current_outflow.as_f64() >= 0.0 && channel_length.as_f64() > 0.0
    }
}

/// Check a cell against `domain`.
///
/// Returns `Ok(false)` when the cell must be marked no-data and an error
/// when the policy rejects violations.
#[inline]
pub(crate) fn check_domain<D, Args>(domain: &D, args: Args, operation: &str) -> Result<bool>
where
    D: DomainPolicy<Args>,
    Args: Copy + Debug,
{
    if domain.within_domain(args) {
        return Ok(true);
    }

    match domain.on_violation() {
        OnViolation::MarkNoData => Ok(false),
        OnViolation::Reject => Err(ArrayError::domain(format!(
            "{}: inputs {:?} outside valid domain",
            operation, args
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_values_within_domain() {
        assert!(DomainPolicy::<(f32, f32)>::within_domain(
            &AllValuesWithinDomain,
            (-1.0, f32::NAN)
        ));
    }

    #[test]
    fn test_accu_domains() {
        assert!(NonNegativeFlux.within_domain((1.0_f32, 0.0_f32)));
        assert!(!NonNegativeFlux.within_domain((-1.0_f32, 0.0_f32)));
        assert!(FractionDomain.within_domain((1.0_f64, 0.25_f64)));
        assert!(!FractionDomain.within_domain((1.0_f64, 1.25_f64)));
        assert!(!KinematicWaveDomain.within_domain((1.0_f64, -3.0_f64, 0.0_f64)));
        assert!(KinematicWaveDomain.within_domain((1.0_f64, -3.0_f64, 10.0_f64)));
    }

    #[test]
    fn test_check_domain_violation_handling() {
        let marking = DomainFn::new(|(v,): (i32,)| v > 0);
        assert_eq!(check_domain(&marking, (1,), "op"), Ok(true));
        assert_eq!(check_domain(&marking, (0,), "op"), Ok(false));

        let rejecting = Rejecting(marking);
        assert!(matches!(
            check_domain(&rejecting, (0,), "op"),
            Err(ArrayError::Domain(_))
        ));
    }
}
