//! Shared solver of the accumulation family.

use std::sync::Arc;

use futures::future::try_join;
use futures::FutureExt;
use partitioned_array::{ArrayError, Buffer, FloatElement, PartitionedRaster, Result, ZoneElement};

use super::engine::{route, CellRule};
use crate::argument::{Argument, ArgumentValues};
use crate::policy::{
    check_domain, AllValuesWithinDomain, DomainPolicy, InputPolicies, NonNegativeFlux,
    OutputPolicies, Policies,
};

/// Policies of the rule-based accumulation operations: flow direction,
/// inflow and rule parameter in, flux and state out.
pub type AccuRulePolicies<FD, F, D = AllValuesWithinDomain> = Policies<
    D,
    (OutputPolicies<F>, OutputPolicies<F>),
    (InputPolicies<FD>, InputPolicies<F>, InputPolicies<F>),
>;

pub(crate) fn rule_default_policies<FD, F>() -> AccuRulePolicies<FD, F>
where
    FD: ZoneElement,
    F: FloatElement,
{
    Policies::new(
        AllValuesWithinDomain,
        (OutputPolicies::default_policy(), OutputPolicies::default_policy()),
        (
            InputPolicies::flow_direction_default(),
            InputPolicies::default_policy(),
            InputPolicies::default_policy(),
        ),
    )
}

pub(crate) fn rule_value_policies<FD, F, D>(domain: D) -> AccuRulePolicies<FD, F, D>
where
    FD: ZoneElement,
    F: FloatElement,
{
    Policies::new(
        domain,
        (OutputPolicies::value_policy(), OutputPolicies::value_policy()),
        (
            InputPolicies::flow_direction_value(),
            InputPolicies::value_policy(),
            InputPolicies::value_policy(),
        ),
    )
}

/// Policies of the non-negative accumulation rules.
pub(crate) fn non_negative_value_policies<FD, F>() -> AccuRulePolicies<FD, F, NonNegativeFlux>
where
    FD: ZoneElement,
    F: FloatElement,
{
    rule_value_policies(NonNegativeFlux)
}

/// Splits the total arriving in a cell, given the rule parameter, into
/// (flux, state).
pub(crate) type Split<F> = fn(F, F) -> (F, F);

type DomainCheck<F> = Arc<dyn Fn(F, F) -> Result<bool> + Send + Sync>;

/// Solver applying a [`Split`] to every cell.
pub(crate) struct AccuRule<F> {
    inflow: Buffer<F>,
    parameter: ArgumentValues<F>,
    inflow_policies: InputPolicies<F>,
    parameter_policies: InputPolicies<F>,
    flux_policies: OutputPolicies<F>,
    state_policies: Option<OutputPolicies<F>>,
    within_domain: DomainCheck<F>,
    split: Split<F>,
    flux: Vec<F>,
    state: Vec<F>,
}

impl<F: FloatElement> CellRule<F> for AccuRule<F> {
    fn solve(&mut self, idx: usize, upstream: Option<F>) -> Result<Option<F>> {
        let inflow = self.inflow[idx];
        let parameter = self.parameter.get(idx);

        let valid = match upstream {
            Some(_) => {
                !self.inflow_policies.is_no_data(&inflow)
                    && !self.parameter_policies.is_no_data(&parameter)
                    && (self.within_domain)(inflow, parameter)?
            }
            None => false,
        };
        let Some(upstream) = upstream.filter(|_| valid) else {
            self.mark_no_data(idx);
            return Ok(None);
        };

        let (flux, state) = (self.split)(upstream + inflow, parameter);
        self.flux[idx] = flux;
        if self.state_policies.is_some() {
            self.state[idx] = state;
        }
        Ok(Some(flux))
    }

    fn mark_no_data(&mut self, idx: usize) {
        self.flux_policies.mark_no_data(&mut self.flux[idx]);
        if let Some(policies) = &self.state_policies {
            policies.mark_no_data(&mut self.state[idx]);
        }
    }

    fn into_outputs(self) -> Vec<Vec<F>> {
        if self.state_policies.is_some() {
            vec![self.flux, self.state]
        } else {
            vec![self.flux]
        }
    }
}

/// Inputs and policies of one accumulation.
pub(crate) struct Accumulation<'a, FD, F> {
    pub operation: &'static str,
    pub flow_direction: &'a PartitionedRaster<FD>,
    pub flow_direction_policies: InputPolicies<FD>,
    pub inflow: &'a PartitionedRaster<F>,
    pub inflow_policies: InputPolicies<F>,
    pub parameter: Argument<F>,
    pub parameter_policies: InputPolicies<F>,
    pub flux_policies: OutputPolicies<F>,
    pub state_policies: Option<OutputPolicies<F>>,
}

impl<FD: ZoneElement, F: FloatElement> Accumulation<'_, FD, F> {
    /// Route inflow through the network, splitting each cell's total with
    /// `split`. Returns the flux array and, if state policies were given,
    /// the state array.
    pub fn run(
        self,
        within_domain: impl Fn(F, F) -> Result<bool> + Send + Sync + 'static,
        split: Split<F>,
    ) -> Result<Vec<PartitionedRaster<F>>> {
        self.flow_direction.check_aligned(self.inflow, "inflow")?;
        self.parameter
            .check_aligned(self.flow_direction, "accumulation parameter")?;

        let within_domain: DomainCheck<F> = Arc::new(within_domain);
        let inflow = self.inflow.clone();
        let parameter = self.parameter;
        let inflow_policies = self.inflow_policies;
        let parameter_policies = self.parameter_policies;
        let flux_policies = self.flux_policies;
        let state_policies = self.state_policies;
        let nr_outputs = if state_policies.is_some() { 2 } else { 1 };

        route(
            self.operation,
            self.flow_direction,
            self.flow_direction_policies,
            nr_outputs,
            move |p, region| {
                let inflow = inflow.partition_data_task(p);
                let parameter = parameter.partition_values(p);
                let within_domain = Arc::clone(&within_domain);
                let nr_cells = region.nr_elements();

                async move {
                    let (inflow, parameter) = try_join(inflow, parameter).await?;
                    Ok(AccuRule {
                        inflow,
                        parameter,
                        inflow_policies,
                        parameter_policies,
                        flux_policies,
                        state_policies,
                        within_domain,
                        split,
                        flux: vec![F::zero(); nr_cells],
                        state: if state_policies.is_some() {
                            vec![F::zero(); nr_cells]
                        } else {
                            Vec::new()
                        },
                    })
                }
                .boxed()
            },
        )
    }
}

/// Domain check of a two-argument accumulation under `domain`.
pub(crate) fn domain_check<F, D>(
    domain: &D,
    operation: &'static str,
) -> impl Fn(F, F) -> Result<bool> + Send + Sync + 'static
where
    F: FloatElement,
    D: DomainPolicy<(F, F)>,
{
    let domain = domain.clone();
    move |inflow, parameter| check_domain(&domain, (inflow, parameter), operation)
}

/// Run one of the rule-based accumulations.
pub(crate) fn accumulate_with_rule<FD, F, D>(
    operation: &'static str,
    policies: &AccuRulePolicies<FD, F, D>,
    flow_direction: &PartitionedRaster<FD>,
    inflow: &PartitionedRaster<F>,
    parameter: Argument<F>,
    split: Split<F>,
) -> Result<(PartitionedRaster<F>, PartitionedRaster<F>)>
where
    FD: ZoneElement,
    F: FloatElement,
    D: DomainPolicy<(F, F)>,
{
    let (flux_policies, state_policies) = policies.output_policies;
    let (fd_policies, inflow_policies, parameter_policies) = policies.input_policies;

    let mut outputs = Accumulation {
        operation,
        flow_direction,
        flow_direction_policies: fd_policies,
        inflow,
        inflow_policies,
        parameter,
        parameter_policies,
        flux_policies,
        state_policies: Some(state_policies),
    }
    .run(domain_check(&policies.domain_policy, operation), split)?
    .into_iter();

    match (outputs.next(), outputs.next()) {
        (Some(flux), Some(state)) => Ok((flux, state)),
        _ => Err(ArrayError::task(format!(
            "{} produced too few outputs",
            operation
        ))),
    }
}
