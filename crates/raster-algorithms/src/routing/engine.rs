//! Message-driven routing of flux along flow directions.
//!
//! Every partition runs one routing task. A task solves its cells in
//! upstream-before-downstream order: a cell becomes ready once all cells
//! draining into it are solved. Flux leaving the partition is sent to the
//! owner of the receiving cell over an unbounded channel, so the order
//! across partitions emerges from the messages and never needs a global
//! sort. A cyclic network never becomes ready and never terminates.

use std::sync::Arc;

use futures::future::{try_join, BoxFuture};
use futures::FutureExt;
use partitioned_array::{
    linear_index, spawn_compute, ArrayError, Element, FloatElement, PartitionedRaster, Region,
    Result, Shape, ZoneElement,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::flow_direction::inflow_count::count_inflow;
use crate::flow_direction::{direction_code, downstream_offset};
use crate::halo::{fetch_halo, Halo};
use crate::policy::InputPolicies;

/// Per-partition solver of one routing operation.
pub(crate) trait CellRule<F>: Send + 'static {
    /// Solve local cell `idx` given the flux arriving from upstream, or
    /// `None` when some upstream flux is no-data. Returns the flux leaving
    /// the cell, `None` for no-data.
    fn solve(&mut self, idx: usize, upstream: Option<F>) -> Result<Option<F>>;

    /// Mark every output of cell `idx` as no-data.
    fn mark_no_data(&mut self, idx: usize);

    /// Output buffers, one per output array.
    fn into_outputs(self) -> Vec<Vec<F>>;
}

/// Message between routing tasks.
#[derive(Debug)]
enum RoutingMessage<F> {
    /// Flux for cell `cell` of the receiving partition.
    Flux { cell: usize, value: Option<F> },
    /// The sending partition failed; the operation cannot complete.
    Failed(ArrayError),
}

type Outbox<F> = Arc<Vec<mpsc::UnboundedSender<RoutingMessage<F>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    None,
    Local(usize),
    Remote { partition: usize, cell: usize },
}

/// Route flux over `flow_direction`, producing `nr_outputs` arrays.
///
/// `make_rule` creates the solver of a partition; it typically fetches
/// the partition's inputs.
pub(crate) fn route<FD, F, Rule, MakeRule>(
    operation: &'static str,
    flow_direction: &PartitionedRaster<FD>,
    flow_direction_policies: InputPolicies<FD>,
    nr_outputs: usize,
    mut make_rule: MakeRule,
) -> Result<Vec<PartitionedRaster<F>>>
where
    FD: ZoneElement,
    F: FloatElement,
    Rule: CellRule<F>,
    MakeRule: FnMut(usize, Region<2>) -> BoxFuture<'static, Result<Rule>>,
{
    let nr_partitions = flow_direction.nr_partitions();
    let (senders, receivers): (Vec<_>, Vec<_>) =
        (0..nr_partitions).map(|_| mpsc::unbounded_channel()).unzip();
    let outbox: Outbox<F> = Arc::new(senders);

    let mut results = Vec::with_capacity(nr_partitions);
    let mut output_receivers: Vec<Vec<Option<oneshot::Receiver<Result<Vec<F>>>>>> =
        (0..nr_outputs).map(|_| Vec::with_capacity(nr_partitions)).collect();
    for _ in 0..nr_partitions {
        let mut partition_senders = Vec::with_capacity(nr_outputs);
        for receivers in output_receivers.iter_mut() {
            let (tx, rx) = oneshot::channel();
            partition_senders.push(tx);
            receivers.push(Some(rx));
        }
        results.push(partition_senders);
    }

    debug!(
        operation,
        array = %flow_direction.id(),
        partitions = nr_partitions,
        "Scheduling routing operation"
    );

    for (p, (inbox, reply)) in receivers.into_iter().zip(results).enumerate() {
        let region = flow_direction.partition_region(p);
        let rule = make_rule(p, region);
        let fd = flow_direction.clone();
        let outbox = Arc::clone(&outbox);

        tokio::spawn(async move {
            let result = route_partition(
                operation,
                &fd,
                p,
                flow_direction_policies,
                rule,
                Arc::clone(&outbox),
                inbox,
            )
            .await;

            match result {
                Ok(outputs) => {
                    for (tx, output) in reply.into_iter().zip(outputs) {
                        let _ = tx.send(Ok(output));
                    }
                }
                Err(err) => {
                    warn!(operation, partition = p, error = %err, "Routing task failed");
                    for (q, sender) in outbox.iter().enumerate() {
                        if q != p {
                            let _ = sender.send(RoutingMessage::Failed(err.clone()));
                        }
                    }
                    for tx in reply {
                        let _ = tx.send(Err(err.clone()));
                    }
                }
            }
        });
    }

    output_receivers
        .into_iter()
        .map(|mut receivers| {
            flow_direction.from_tasks_like(move |p, _| {
                let receiver = receivers[p].take();
                async move {
                    match receiver {
                        Some(receiver) => receiver.await?,
                        None => Err(ArrayError::task("routing output requested twice")),
                    }
                }
                .boxed()
            })
        })
        .collect()
}

async fn route_partition<FD, F, Rule>(
    operation: &'static str,
    flow_direction: &PartitionedRaster<FD>,
    p: usize,
    fd_policies: InputPolicies<FD>,
    rule: BoxFuture<'static, Result<Rule>>,
    outbox: Outbox<F>,
    mut inbox: mpsc::UnboundedReceiver<RoutingMessage<F>>,
) -> Result<Vec<Vec<F>>>
where
    FD: ZoneElement,
    F: FloatElement,
    Rule: CellRule<F>,
{
    let (halo, rule) = try_join(
        fetch_halo(flow_direction, p, 1, fd_policies.halo_fill_value()),
        rule,
    )
    .await?;

    let region = flow_direction.partition_region(p);
    let shape = flow_direction.shape();
    let partition_shape = flow_direction.partition_shape();
    let grid_shape = flow_direction.partition_grid_shape();

    let mut state = spawn_compute(move || {
        let mut state = PartitionRouting::new(
            region,
            shape,
            partition_shape,
            grid_shape,
            &halo,
            &fd_policies,
            rule,
            outbox,
        );
        state.solve_ready()?;
        Ok(state)
    })
    .await?;

    while !state.is_done() {
        let message = inbox.recv().await;
        let mut received = 0;
        let mut next = message;
        loop {
            match next {
                Some(RoutingMessage::Flux { cell, value }) => {
                    state.receive(cell, value);
                    received += 1;
                }
                Some(RoutingMessage::Failed(err)) => return Err(err),
                None => {
                    return Err(ArrayError::task(format!(
                        "{}: partition {} stopped receiving flux with {} cells unsolved",
                        operation,
                        p,
                        state.nr_unsolved()
                    )))
                }
            }
            match inbox.try_recv() {
                Ok(message) => next = Some(message),
                Err(_) => break,
            }
        }

        trace!(operation, partition = p, messages = received, "Routing messages received");
        state = spawn_compute(move || {
            state.solve_ready()?;
            Ok(state)
        })
        .await?;
    }

    debug!(operation, partition = p, "Partition routed");
    Ok(state.rule.into_outputs())
}

/// Routing state of one partition.
struct PartitionRouting<F, Rule> {
    targets: Vec<Target>,
    inflow: Vec<u8>,
    upstream: Vec<F>,
    upstream_no_data: Vec<bool>,
    ready: Vec<usize>,
    nr_unsolved: usize,
    rule: Rule,
    outbox: Outbox<F>,
}

impl<F: FloatElement, Rule: CellRule<F>> PartitionRouting<F, Rule> {
    #[allow(clippy::too_many_arguments)]
    fn new<FD: Element>(
        region: Region<2>,
        shape: Shape<2>,
        partition_shape: Shape<2>,
        grid_shape: Shape<2>,
        halo: &Halo<FD, 2>,
        fd_policies: &InputPolicies<FD>,
        mut rule: Rule,
        outbox: Outbox<F>,
    ) -> Self {
        let nr_cells = region.nr_elements();
        let [rows, cols] = region.shape;
        let mut targets = vec![Target::None; nr_cells];
        let mut inflow = vec![0u8; nr_cells];
        let mut ready = Vec::new();
        let mut nr_unsolved = 0;

        for row in 0..rows {
            for col in 0..cols {
                let idx = row * cols + col;
                let Some(count) = count_inflow(halo, fd_policies, row, col) else {
                    rule.mark_no_data(idx);
                    continue;
                };
                nr_unsolved += 1;
                inflow[idx] = count as u8;
                if count == 0 {
                    ready.push(idx);
                }

                let code = direction_code(halo.neighbour(row, col, 0, 0));
                let Some((dr, dc)) = code.and_then(downstream_offset) else {
                    continue;
                };
                let global = [
                    (region.offset[0] + row).checked_add_signed(dr),
                    (region.offset[1] + col).checked_add_signed(dc),
                ];
                let [Some(target_row), Some(target_col)] = global else {
                    continue;
                };
                if target_row >= shape[0] || target_col >= shape[1] {
                    continue;
                }
                let receiver = halo.neighbour(row, col, dr, dc);
                if fd_policies.is_no_data(&receiver) || direction_code(receiver).is_none() {
                    continue;
                }

                let target = [target_row, target_col];
                targets[idx] = if region.contains(&target) {
                    Target::Local(region.local_linear_index(&target))
                } else {
                    let grid_idx = [
                        target_row / partition_shape[0],
                        target_col / partition_shape[1],
                    ];
                    let partition = linear_index(&grid_shape, &grid_idx);
                    let cell = (target_row % partition_shape[0]) * partition_shape[1]
                        + target_col % partition_shape[1];
                    Target::Remote { partition, cell }
                };
            }
        }

        Self {
            targets,
            inflow,
            upstream: vec![F::zero(); nr_cells],
            upstream_no_data: vec![false; nr_cells],
            ready,
            nr_unsolved,
            rule,
            outbox,
        }
    }

    fn is_done(&self) -> bool {
        self.nr_unsolved == 0
    }

    fn nr_unsolved(&self) -> usize {
        self.nr_unsolved
    }

    fn receive(&mut self, cell: usize, value: Option<F>) {
        if self.inflow[cell] == 0 {
            warn!(cell, "Flux received for a cell without pending inflow");
            return;
        }

        match value {
            Some(value) => self.upstream[cell] = self.upstream[cell] + value,
            None => self.upstream_no_data[cell] = true,
        }
        self.inflow[cell] -= 1;
        if self.inflow[cell] == 0 {
            self.ready.push(cell);
        }
    }

    fn solve_ready(&mut self) -> Result<()> {
        while let Some(idx) = self.ready.pop() {
            let upstream = (!self.upstream_no_data[idx]).then_some(self.upstream[idx]);
            let flux = self.rule.solve(idx, upstream)?;
            self.nr_unsolved -= 1;

            match self.targets[idx] {
                Target::None => {}
                Target::Local(cell) => self.receive(cell, flux),
                Target::Remote { partition, cell } => {
                    // A closed inbox means the receiver already failed
                    let _ = self.outbox[partition].send(RoutingMessage::Flux { cell, value: flux });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partitioned_array::Context;
    use test_utils::{network_flow_direction, NETWORK_SHAPE};

    /// Counts the cells upstream of each cell, including itself.
    struct CountCells {
        counts: Vec<f64>,
    }

    impl CellRule<f64> for CountCells {
        fn solve(&mut self, idx: usize, upstream: Option<f64>) -> Result<Option<f64>> {
            let count = upstream.map(|u| u + 1.0);
            self.counts[idx] = count.unwrap_or(f64::NAN);
            Ok(count)
        }

        fn mark_no_data(&mut self, idx: usize) {
            self.counts[idx] = f64::NAN;
        }

        fn into_outputs(self) -> Vec<Vec<f64>> {
            vec![self.counts]
        }
    }

    struct Failing;

    impl CellRule<f64> for Failing {
        fn solve(&mut self, _: usize, _: Option<f64>) -> Result<Option<f64>> {
            Err(ArrayError::domain("failing rule"))
        }

        fn mark_no_data(&mut self, _: usize) {}

        fn into_outputs(self) -> Vec<Vec<f64>> {
            vec![Vec::new()]
        }
    }

    async fn count_cells(partition_shape: [usize; 2]) -> Vec<f64> {
        let ctx = Context::with_localities(2).unwrap();
        let fd = PartitionedRaster::from_vec(
            &ctx,
            NETWORK_SHAPE,
            partition_shape,
            network_flow_direction(),
        )
        .unwrap();

        let mut outputs = route(
            "count_cells",
            &fd,
            InputPolicies::flow_direction_value(),
            1,
            |_, region| {
                let counts = vec![0.0; region.nr_elements()];
                async move { Ok(CountCells { counts }) }.boxed()
            },
        )
        .unwrap();
        outputs.remove(0).to_vec().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_result_independent_of_partitioning() {
        let whole = count_cells([5, 5]).await;
        // Every cell of the network drains into the sink
        assert_eq!(whole[21], 25.0);
        assert_eq!(whole[0], 1.0);

        for partition_shape in [[1, 1], [1, 5], [5, 1]] {
            assert_eq!(count_cells(partition_shape).await, whole);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failure_reaches_every_output() {
        let ctx = Context::default();
        let fd = PartitionedRaster::from_vec(&ctx, NETWORK_SHAPE, [1, 5], network_flow_direction())
            .unwrap();

        let outputs: Vec<PartitionedRaster<f64>> = route(
            "failing",
            &fd,
            InputPolicies::flow_direction_value(),
            1,
            |_, _| async { Ok(Failing) }.boxed(),
        )
        .unwrap();
        assert!(matches!(outputs[0].to_vec().await, Err(ArrayError::Domain(_))));
    }
}
