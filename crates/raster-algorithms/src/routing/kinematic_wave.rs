//! One time step of the kinematic wave, routed along flow directions.

use futures::future::try_join_all;
use futures::FutureExt;
use partitioned_array::{ArrayError, Buffer, FloatElement, PartitionedRaster, Result, ZoneElement};

use super::engine::{route, CellRule};
use crate::argument::{Argument, ArgumentValues};
use crate::policy::{
    check_domain, AllValuesWithinDomain, DomainPolicy, InputPolicies, KinematicWaveDomain,
    OutputPolicies, Policies,
};

/// Policies of [`kinematic_wave`]. Inputs are flow direction, current
/// outflow, lateral inflow, alpha, beta, time step duration and channel
/// length, in that order. The domain is checked on (current outflow,
/// lateral inflow, channel length).
pub type KinematicWavePolicies<FD, F, D = AllValuesWithinDomain> = Policies<
    D,
    (OutputPolicies<F>,),
    (
        InputPolicies<FD>,
        InputPolicies<F>,
        InputPolicies<F>,
        InputPolicies<F>,
        InputPolicies<F>,
        InputPolicies<F>,
        InputPolicies<F>,
    ),
>;

pub fn default_policies<FD: ZoneElement, F: FloatElement>() -> KinematicWavePolicies<FD, F> {
    let input = InputPolicies::default_policy();
    Policies::new(
        AllValuesWithinDomain,
        (OutputPolicies::default_policy(),),
        (
            InputPolicies::flow_direction_default(),
            input,
            input,
            input,
            input,
            input,
            input,
        ),
    )
}

pub fn value_policies<FD: ZoneElement, F: FloatElement>(
) -> KinematicWavePolicies<FD, F, KinematicWaveDomain> {
    let input = InputPolicies::value_policy();
    Policies::new(
        KinematicWaveDomain,
        (OutputPolicies::value_policy(),),
        (
            InputPolicies::flow_direction_value(),
            input,
            input,
            input,
            input,
            input,
            input,
        ),
    )
}

const MAX_ITERATIONS: usize = 50;
const TOLERANCE: f64 = 1e-10;

/// Channel parameters of one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelParameters {
    pub alpha: f64,
    pub beta: f64,
    pub time_step_duration: f64,
    pub channel_length: f64,
}

/// New outflow of a single cell.
///
/// Solves `(dt/dx)·Q + α·Q^β = (dt/dx)·upstream + α·current^β + dt·inflow`
/// for Q ≥ 0 with Newton-Raphson, starting from the linearised scheme.
/// Negative lateral inflow is extracted from the solution afterwards.
pub fn kinematic_wave_cell(
    upstream: f64,
    current_outflow: f64,
    lateral_inflow: f64,
    parameters: &ChannelParameters,
) -> f64 {
    let ChannelParameters {
        alpha,
        beta,
        time_step_duration: dt,
        channel_length: dx,
    } = *parameters;

    if upstream + current_outflow <= 0.0 && lateral_inflow <= 0.0 {
        return 0.0;
    }

    let inflow = lateral_inflow.max(0.0);
    let dt_dx = dt / dx;
    let known = dt_dx * upstream + alpha * current_outflow.powf(beta) + dt * inflow;

    let mean = (current_outflow + upstream) / 2.0;
    let linear_coefficient = if mean > 0.0 {
        alpha * beta * mean.powf(beta - 1.0)
    } else {
        0.0
    };
    let guess = (dt_dx * upstream + linear_coefficient * current_outflow + dt * inflow) / (dt_dx + linear_coefficient);
    let mut q = guess.max(f64::MIN_POSITIVE);

    for _ in 0..MAX_ITERATIONS {
        let f = dt_dx * q + alpha * q.powf(beta) - known;
        let df = dt_dx + alpha * beta * q.powf(beta - 1.0);
        let mut next = q - f / df;
        if next <= 0.0 {
            next = q / 2.0;
        }
        let converged = (next - q).abs() <= TOLERANCE * next.abs();
        q = next;
        if converged {
            break;
        }
    }

    if lateral_inflow < 0.0 {
        q -= (dx * -lateral_inflow).min(q);
    }

    q
}

struct KinematicWaveRule<F> {
    current_outflow: Buffer<F>,
    lateral_inflow: Buffer<F>,
    parameters: [ArgumentValues<F>; 4],
    input_policies: [InputPolicies<F>; 6],
    output_policies: OutputPolicies<F>,
    within_domain: Box<dyn Fn(F, F, F) -> Result<bool> + Send + Sync>,
    outflow: Vec<F>,
}

impl<F: FloatElement> KinematicWaveRule<F> {
    fn cell_inputs(&self, idx: usize) -> Option<(F, F, [F; 4])> {
        let current = self.current_outflow[idx];
        let lateral = self.lateral_inflow[idx];
        let parameters = [
            self.parameters[0].get(idx),
            self.parameters[1].get(idx),
            self.parameters[2].get(idx),
            self.parameters[3].get(idx),
        ];

        let values = [current, lateral].into_iter().chain(parameters);
        let no_data = values
            .zip(self.input_policies.iter())
            .any(|(value, policies)| policies.is_no_data(&value));
        (!no_data).then_some((current, lateral, parameters))
    }
}

impl<F: FloatElement> CellRule<F> for KinematicWaveRule<F> {
    fn solve(&mut self, idx: usize, upstream: Option<F>) -> Result<Option<F>> {
        let inputs = upstream.zip(self.cell_inputs(idx));
        let Some((upstream, (current, lateral, [alpha, beta, dt, dx]))) = inputs else {
            self.mark_no_data(idx);
            return Ok(None);
        };
        if !(self.within_domain)(current, lateral, dx)? {
            self.mark_no_data(idx);
            return Ok(None);
        }

        let parameters = ChannelParameters {
            alpha: alpha.as_f64(),
            beta: beta.as_f64(),
            time_step_duration: dt.as_f64(),
            channel_length: dx.as_f64(),
        };
        let outflow = kinematic_wave_cell(
            upstream.as_f64(),
            current.as_f64(),
            lateral.as_f64(),
            &parameters,
        );

        match F::try_from_f64(outflow) {
            Some(outflow) => {
                self.outflow[idx] = outflow;
                Ok(Some(outflow))
            }
            None => {
                self.mark_no_data(idx);
                Ok(None)
            }
        }
    }

    fn mark_no_data(&mut self, idx: usize) {
        self.output_policies.mark_no_data(&mut self.outflow[idx]);
    }

    fn into_outputs(self) -> Vec<Vec<F>> {
        vec![self.outflow]
    }
}

/// Compute the outflow of every cell at the end of one time step.
///
/// A cell is solved only after the new outflow of all its upstream cells
/// is known; their sum is the cell's upstream inflow.
#[allow(clippy::too_many_arguments)]
pub fn kinematic_wave<FD, F, D>(
    policies: &KinematicWavePolicies<FD, F, D>,
    flow_direction: &PartitionedRaster<FD>,
    current_outflow: &PartitionedRaster<F>,
    lateral_inflow: &PartitionedRaster<F>,
    alpha: impl Into<Argument<F>>,
    beta: impl Into<Argument<F>>,
    time_step_duration: impl Into<Argument<F>>,
    channel_length: impl Into<Argument<F>>,
) -> Result<PartitionedRaster<F>>
where
    FD: ZoneElement,
    F: FloatElement,
    D: DomainPolicy<(F, F, F)>,
{
    const OPERATION: &str = "kinematic_wave";

    flow_direction.check_aligned(current_outflow, "current outflow")?;
    flow_direction.check_aligned(lateral_inflow, "lateral inflow")?;
    let parameters = [
        alpha.into(),
        beta.into(),
        time_step_duration.into(),
        channel_length.into(),
    ];
    for (parameter, what) in parameters
        .iter()
        .zip(["alpha", "beta", "time step duration", "channel length"])
    {
        parameter.check_aligned(flow_direction, what)?;
    }

    let (fd_policies, current_in, lateral_in, alpha_in, beta_in, dt_in, dx_in) =
        policies.input_policies;
    let input_policies = [current_in, lateral_in, alpha_in, beta_in, dt_in, dx_in];
    let (output_policies,) = policies.output_policies;
    let domain = policies.domain_policy.clone();
    let current_outflow = current_outflow.clone();
    let lateral_inflow = lateral_inflow.clone();

    let mut outputs = route(OPERATION, flow_direction, fd_policies, 1, move |p, region| {
        let current = current_outflow.partition_data_task(p);
        let lateral = lateral_inflow.partition_data_task(p);
        let parameters = try_join_all(parameters.iter().map(|parameter| parameter.partition_values(p)));
        let domain = domain.clone();
        let nr_cells = region.nr_elements();

        async move {
            let (current, lateral, parameters) =
                futures::try_join!(current, lateral, parameters)?;
            let parameters: [ArgumentValues<F>; 4] = parameters
                .try_into()
                .map_err(|_| ArrayError::task("kinematic_wave: missing channel parameters"))?;

            Ok(KinematicWaveRule {
                current_outflow: current,
                lateral_inflow: lateral,
                parameters,
                input_policies,
                output_policies,
                within_domain: Box::new(move |current, lateral, dx| {
                    check_domain(&domain, (current, lateral, dx), OPERATION)
                }),
                outflow: vec![F::zero(); nr_cells],
            })
        }
        .boxed()
    })?;

    outputs
        .pop()
        .ok_or_else(|| ArrayError::task("kinematic_wave produced no output"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use partitioned_array::Context;
    use test_utils::kinematic_wave::*;
    use test_utils::{assert_approx_eq, network_flow_direction, NETWORK_SHAPE};

    fn parameters() -> ChannelParameters {
        ChannelParameters {
            alpha: ALPHA,
            beta: BETA,
            time_step_duration: TIME_STEP_DURATION,
            channel_length: CHANNEL_LENGTH,
        }
    }

    #[test]
    fn test_headwater_cell() {
        let q = kinematic_wave_cell(0.0, 10.0, 0.0, &parameters());
        assert_approx_eq!(q, 2.32293, 1e-5);
    }

    #[test]
    fn test_dry_cell() {
        assert_eq!(kinematic_wave_cell(0.0, 0.0, 0.0, &parameters()), 0.0);
        assert_eq!(kinematic_wave_cell(0.0, 0.0, -1.0, &parameters()), 0.0);
    }

    #[test]
    fn test_lateral_inflow() {
        let without = kinematic_wave_cell(0.0, 10.0, 0.0, &parameters());
        let with = kinematic_wave_cell(0.0, 10.0, 0.1, &parameters());
        assert!(with > without);

        // Only lateral inflow into an empty channel
        assert!(kinematic_wave_cell(0.0, 0.0, 0.1, &parameters()) > 0.0);

        // Extraction never drives the outflow negative
        assert_eq!(kinematic_wave_cell(0.0, 10.0, -100.0, &parameters()), 0.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reference_network() {
        let ctx = Context::with_localities(2).unwrap();
        let fd = PartitionedRaster::from_vec(&ctx, NETWORK_SHAPE, [1, 5], network_flow_direction())
            .unwrap();
        let current =
            PartitionedRaster::from_vec(&ctx, NETWORK_SHAPE, [1, 5], current_outflow()).unwrap();
        let lateral = PartitionedRaster::filled(&ctx, NETWORK_SHAPE, [1, 5], 0.0).unwrap();

        let outflow = kinematic_wave(
            &value_policies(),
            &fd,
            &current,
            &lateral,
            ALPHA,
            BETA,
            TIME_STEP_DURATION,
            CHANNEL_LENGTH,
        )
        .unwrap()
        .to_vec()
        .await
        .unwrap();

        for (actual, expected) in outflow.iter().zip(NEW_OUTFLOW) {
            assert_approx_eq!(*actual, expected, 1e-3);
        }
    }

    #[tokio::test]
    async fn test_invalid_channel_length() {
        let ctx = Context::default();
        let fd = PartitionedRaster::from_vec(&ctx, [1, 2], [1, 2], vec![6_u8, 5]).unwrap();
        let current = PartitionedRaster::filled(&ctx, [1, 2], [1, 2], 1.0).unwrap();
        let lateral = PartitionedRaster::filled(&ctx, [1, 2], [1, 2], 0.0).unwrap();

        let outflow = kinematic_wave(
            &value_policies(),
            &fd,
            &current,
            &lateral,
            ALPHA,
            BETA,
            TIME_STEP_DURATION,
            0.0,
        )
        .unwrap()
        .to_vec()
        .await
        .unwrap();
        assert!(outflow.iter().all(|q: &f64| q.is_nan()));
    }
}
