//! Integration tests of flow routing on the reference network and on
//! generated networks spanning many partitions.

use partitioned_array::{Context, PartitionedRaster};
use proptest::prelude::*;
use raster_algorithms::routing::{
    accu, accu_capacity, accu_fraction, accu_threshold, accu_trigger, kinematic_wave,
};
use raster_algorithms::flow_direction::downstream_cell;
use raster_algorithms::Argument;
use test_utils::expected::*;
use test_utils::{
    assert_approx_eq, assert_slice_approx_eq, create_constant_grid, create_grid_with_nans,
    create_material_grid, kinematic_wave as kw, network_flow_direction, network_material,
    NETWORK_SHAPE,
};

fn network(
    ctx: &Context,
    partition_shape: [usize; 2],
) -> (PartitionedRaster<u8>, PartitionedRaster<f32>) {
    let fd = PartitionedRaster::from_vec(ctx, NETWORK_SHAPE, partition_shape, network_flow_direction())
        .unwrap();
    let material =
        PartitionedRaster::from_vec(ctx, NETWORK_SHAPE, partition_shape, network_material())
            .unwrap();
    (fd, material)
}

async fn collect(
    (flux, state): (PartitionedRaster<f32>, PartitionedRaster<f32>),
) -> (Vec<f32>, Vec<f32>) {
    (flux.to_vec().await.unwrap(), state.to_vec().await.unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_accu_threshold_reference_network() {
    for partition_shape in [[5, 5], [1, 5], [5, 1], [1, 1]] {
        let ctx = Context::with_localities(2).unwrap();
        let (fd, material) = network(&ctx, partition_shape);
        let policies = accu_threshold::value_policies();

        let (flux, state) = collect(accu_threshold(&policies, &fd, &material, 1.5).unwrap()).await;
        assert_slice_approx_eq!(flux, THRESHOLD_FLUX, 1e-5);
        assert_slice_approx_eq!(state, THRESHOLD_STATE, 1e-5);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_accu_capacity_reference_network() {
    let ctx = Context::with_localities(3).unwrap();
    let (fd, material) = network(&ctx, [1, 5]);

    let (flux, state) =
        collect(accu_capacity(&accu_capacity::value_policies(), &fd, &material, 1.5).unwrap())
            .await;
    assert_slice_approx_eq!(flux, CAPACITY_FLUX, 1e-5);
    assert_slice_approx_eq!(state, CAPACITY_STATE, 1e-5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_accu_trigger_reference_network() {
    let ctx = Context::with_localities(2).unwrap();
    let (fd, material) = network(&ctx, [5, 1]);

    let (flux, state) =
        collect(accu_trigger(&accu_trigger::value_policies(), &fd, &material, 1.5).unwrap()).await;
    assert_slice_approx_eq!(flux, TRIGGER_FLUX, 1e-5);
    assert_slice_approx_eq!(state, TRIGGER_STATE, 1e-5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_accu_fraction_with_raster_parameter() {
    let ctx = Context::default();
    let (fd, material) = network(&ctx, [1, 5]);
    let fraction = PartitionedRaster::filled(&ctx, NETWORK_SHAPE, [1, 5], 1.0_f32).unwrap();

    let (flux, state) = collect(
        accu_fraction(&accu_fraction::value_policies(), &fd, &material, &fraction).unwrap(),
    )
    .await;
    let total = accu(&accu::value_policies(), &fd, &material)
        .unwrap()
        .to_vec()
        .await
        .unwrap();
    assert_slice_approx_eq!(flux, total, 1e-5);
    assert!(state.iter().all(|s| *s == 0.0));

    // A fraction above one is outside the domain
    let (flux, _) = collect(
        accu_fraction(&accu_fraction::value_policies(), &fd, &material, Argument::Scalar(1.5))
            .unwrap(),
    )
    .await;
    assert!(flux.iter().all(|f| f.is_nan()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_kinematic_wave_reference_network() {
    let ctx = Context::with_localities(2).unwrap();
    let fd = PartitionedRaster::from_vec(&ctx, NETWORK_SHAPE, [5, 1], network_flow_direction())
        .unwrap();
    let current = PartitionedRaster::from_vec(&ctx, NETWORK_SHAPE, [5, 1], kw::current_outflow())
        .unwrap();
    let lateral = PartitionedRaster::filled(&ctx, NETWORK_SHAPE, [5, 1], 0.0).unwrap();
    let channel_length = PartitionedRaster::filled(&ctx, NETWORK_SHAPE, [5, 1], kw::CHANNEL_LENGTH)
        .unwrap();

    let outflow = kinematic_wave(
        &kinematic_wave::value_policies(),
        &fd,
        &current,
        &lateral,
        kw::ALPHA,
        kw::BETA,
        kw::TIME_STEP_DURATION,
        &channel_length,
    )
    .unwrap()
    .to_vec()
    .await
    .unwrap();
    assert_slice_approx_eq!(outflow, kw::NEW_OUTFLOW, 1e-3);
}

/// Accumulate `inflow` over a network where every cell drains south.
async fn accu_south(inflow: Vec<f32>, shape: [usize; 2], partition_shape: [usize; 2]) -> Vec<f32> {
    let ctx = Context::with_localities(2).unwrap();
    let directions = vec![2u8; shape[0] * shape[1]];
    let fd = PartitionedRaster::from_vec(&ctx, shape, partition_shape, directions).unwrap();
    let inflow = PartitionedRaster::from_vec(&ctx, shape, partition_shape, inflow).unwrap();
    accu(&accu::value_policies(), &fd, &inflow).unwrap().to_vec().await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_accu_columns_of_constant_inflow() {
    let flux = accu_south(create_constant_grid(4, 4, 1.0), [4, 4], [2, 2]).await;
    for row in 0..4 {
        for col in 0..4 {
            assert_eq!(flux[row * 4 + col], (row + 1) as f32);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_accu_columns_of_material() {
    let material = create_material_grid(8, 8, 11);
    let flux = accu_south(material.clone(), [8, 8], [4, 4]).await;
    for col in 0..8 {
        let column: f32 = (0..8).map(|row| material[row * 8 + col]).sum();
        assert_approx_eq!(flux[56 + col], column, 1e-3);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_accu_no_data_flows_downstream() {
    let flux = accu_south(create_grid_with_nans(4, 4, &[(1, 1)]), [4, 4], [2, 2]).await;
    assert_eq!(flux[1], 0.0);
    for row in 1..4 {
        assert!(flux[row * 4 + 1].is_nan());
        assert_eq!(flux[row * 4 + 2], 0.0);
    }
}

/// Directions that always lead one row down, so every network is acyclic.
/// Edge columns may point out of the array, which makes them outlets.
fn downward_network(directions: &[u8]) -> Vec<u8> {
    directions.iter().map(|d| [1, 2, 3][*d as usize % 3]).collect()
}

/// Total flux of the cells without a downstream cell, i.e. sinks and cells
/// draining out of the array.
fn outflow_at_outlets(directions: &[u8], shape: [usize; 2], flux: &[f64]) -> f64 {
    (0..shape[0] * shape[1])
        .filter(|&i| downstream_cell(directions[i], [i / shape[1], i % shape[1]], shape).is_none())
        .map(|i| flux[i])
        .sum()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_accu_edge_outlets_conserve_material() {
    let ctx = Context::with_localities(2).unwrap();
    let shape = [2, 3];
    // Corner cells of the top row drain out of the array sideways
    let directions = vec![1u8, 2, 3, 2, 2, 2];
    let fd = PartitionedRaster::from_vec(&ctx, shape, [1, 3], directions.clone()).unwrap();
    let inflow = PartitionedRaster::filled(&ctx, shape, [1, 3], 1.0_f64).unwrap();

    let flux = accu(&accu::value_policies(), &fd, &inflow).unwrap().to_vec().await.unwrap();
    assert_eq!(flux, vec![1.0, 1.0, 1.0, 1.0, 2.0, 1.0]);
    assert_eq!(outflow_at_outlets(&directions, shape, &flux), 6.0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_accu_conserves_material(
        grid in proptest::collection::vec(1usize..4, 2),
        partition in proptest::collection::vec(1usize..4, 2),
        seed in proptest::collection::vec(0u8..3, 144),
        inflow in proptest::collection::vec(0.0f64..10.0, 144),
    ) {
        let shape = [grid[0] * partition[0], grid[1] * partition[1]];
        let nr_cells = shape[0] * shape[1];
        let directions = downward_network(&seed[..nr_cells]);
        let inflow = inflow[..nr_cells].to_vec();
        let injected: f64 = inflow.iter().sum();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let flux = runtime.block_on(async {
            let ctx = Context::with_localities(2).unwrap();
            let partition_shape = [partition[0], partition[1]];
            let fd = PartitionedRaster::from_vec(&ctx, shape, partition_shape, directions.clone())
                .unwrap();
            let inflow = PartitionedRaster::from_vec(&ctx, shape, partition_shape, inflow).unwrap();
            accu(&accu::value_policies(), &fd, &inflow).unwrap().to_vec().await.unwrap()
        });

        let leaving = outflow_at_outlets(&directions, shape, &flux);
        prop_assert!((leaving - injected).abs() < 1e-6 * injected.max(1.0));
    }
}
