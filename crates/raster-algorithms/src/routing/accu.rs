//! Plain flux accumulation.

use partitioned_array::{FloatElement, PartitionedRaster, Result, ZoneElement};

use super::accu_rule::Accumulation;
use crate::argument::Argument;
use crate::policy::{
    check_domain, AllValuesWithinDomain, DomainPolicy, InputPolicies, NonNegativeFlux,
    OutputPolicies, Policies,
};

/// Policies of [`accu`]: flow direction and inflow in, flux out.
pub type AccuPolicies<FD, F, D = AllValuesWithinDomain> =
    Policies<D, (OutputPolicies<F>,), (InputPolicies<FD>, InputPolicies<F>)>;

pub fn default_policies<FD: ZoneElement, F: FloatElement>() -> AccuPolicies<FD, F> {
    Policies::new(
        AllValuesWithinDomain,
        (OutputPolicies::default_policy(),),
        (
            InputPolicies::flow_direction_default(),
            InputPolicies::default_policy(),
        ),
    )
}

pub fn value_policies<FD: ZoneElement, F: FloatElement>() -> AccuPolicies<FD, F, NonNegativeFlux>
{
    Policies::new(
        NonNegativeFlux,
        (OutputPolicies::value_policy(),),
        (
            InputPolicies::flow_direction_value(),
            InputPolicies::value_policy(),
        ),
    )
}

/// Accumulate `inflow` along the flow directions.
///
/// The flux leaving a cell is its own inflow plus the flux of every
/// upstream cell.
pub fn accu<FD, F, D>(
    policies: &AccuPolicies<FD, F, D>,
    flow_direction: &PartitionedRaster<FD>,
    inflow: &PartitionedRaster<F>,
) -> Result<PartitionedRaster<F>>
where
    FD: ZoneElement,
    F: FloatElement,
    D: DomainPolicy<(F,)>,
{
    let (flux_policies,) = policies.output_policies;
    let (fd_policies, inflow_policies) = policies.input_policies;
    let domain = policies.domain_policy.clone();

    let mut outputs = Accumulation {
        operation: "accu",
        flow_direction,
        flow_direction_policies: fd_policies,
        inflow,
        inflow_policies,
        parameter: Argument::Scalar(F::zero()),
        parameter_policies: InputPolicies::default_policy(),
        flux_policies,
        state_policies: None,
    }
    .run(
        move |inflow, _| check_domain(&domain, (inflow,), "accu"),
        |total, _| (total, total - total),
    )?;

    Ok(outputs.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use partitioned_array::Context;
    use test_utils::{network_flow_direction, network_material, NETWORK_SHAPE};

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_accu_of_reference_network() {
        let ctx = Context::with_localities(2).unwrap();
        let fd = PartitionedRaster::from_vec(&ctx, NETWORK_SHAPE, [1, 5], network_flow_direction())
            .unwrap();
        let material =
            PartitionedRaster::from_vec(&ctx, NETWORK_SHAPE, [1, 5], network_material()).unwrap();

        let flux = accu(&value_policies(), &fd, &material)
            .unwrap()
            .to_vec()
            .await
            .unwrap();

        let injected: f32 = network_material().iter().sum();
        assert!((flux[21] - injected).abs() < 1e-4);
        assert_eq!(flux[0], 6.0);
        assert_eq!(flux[5], 6.5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_no_data_propagates_downstream() {
        let ctx = Context::default();
        // Three cells draining east into a sink
        let fd = PartitionedRaster::from_vec(&ctx, [1, 4], [1, 2], vec![6_u8, 6, 6, 5]).unwrap();
        let inflow = PartitionedRaster::from_vec(&ctx, [1, 4], [1, 2], vec![1.0, f64::NAN, 1.0, 1.0])
            .unwrap();

        let flux = accu(&value_policies(), &fd, &inflow)
            .unwrap()
            .to_vec()
            .await
            .unwrap();
        assert_eq!(flux[0], 1.0);
        assert!(flux[1..].iter().all(|v| v.is_nan()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_negative_inflow_outside_domain() {
        let ctx = Context::default();
        let fd = PartitionedRaster::from_vec(&ctx, [1, 2], [1, 2], vec![6_u8, 5]).unwrap();
        let inflow = PartitionedRaster::from_vec(&ctx, [1, 2], [1, 2], vec![-1.0_f32, 1.0]).unwrap();

        let flux = accu(&value_policies(), &fd, &inflow)
            .unwrap()
            .to_vec()
            .await
            .unwrap();
        assert!(flux[0].is_nan() && flux[1].is_nan());

        let flux = accu(&default_policies(), &fd, &inflow)
            .unwrap()
            .to_vec()
            .await
            .unwrap();
        assert_eq!(flux, vec![-1.0, 0.0]);
    }
}
