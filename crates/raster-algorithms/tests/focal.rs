//! Integration tests of focal operations across partition boundaries.

use partitioned_array::{Context, PartitionedRaster};
use raster_algorithms::focal::{
    self, convolve, focal_majority, focal_maximum, focal_mean, focal_minimum, focal_sum,
};
use raster_algorithms::{box_kernel, circle_kernel, Kernel};
use test_utils::{assert_approx_eq, create_elevation_grid, create_sequence_grid};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mean_of_uniform_array() {
    let ctx = Context::with_localities(2).unwrap();
    let array = PartitionedRaster::filled(&ctx, [6, 6], [2, 3], 3.5_f64).unwrap();
    let kernel = Kernel::from_rows(vec![
        vec![0.5, 1.0, 0.5],
        vec![1.0, 2.0, 1.0],
        vec![0.5, 1.0, 0.5],
    ])
    .unwrap();

    // Sentinel halos are skipped, so edges keep the uniform value
    let mean = focal_mean(&focal::value_policies(), &array, &kernel)
        .unwrap()
        .to_vec()
        .await
        .unwrap();
    for value in mean {
        assert_approx_eq!(value, 3.5, 1e-12);
    }

    // Zero-filled halos only affect cells whose neighbourhood leaves the array
    let mean = focal_mean(&focal::default_policies(), &array, &kernel)
        .unwrap()
        .to_vec()
        .await
        .unwrap();
    for row in 1..5 {
        for col in 1..5 {
            assert_approx_eq!(mean[row * 6 + col], 3.5, 1e-12);
        }
    }
    assert!(mean[0] < 3.5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_kernel_wider_than_partitions() {
    let ctx = Context::with_localities(3).unwrap();
    let data: Vec<f32> = create_sequence_grid(6, 6).into_iter().map(|v| v as f32).collect();
    let array = PartitionedRaster::from_vec(&ctx, [6, 6], [1, 1], data).unwrap();

    let sum = focal_sum(&focal::value_policies(), &array, &box_kernel(2))
        .unwrap()
        .to_vec()
        .await
        .unwrap();
    // Rows 0..=4 and columns 0..=4 around cell (2, 2)
    let expected: f32 = (0..5)
        .flat_map(|r| (0..5).map(move |c| (r * 6 + c) as f32))
        .sum();
    assert_eq!(sum[2 * 6 + 2], expected);

    let maximum = focal_maximum(&focal::value_policies(), &array, &box_kernel(2))
        .unwrap()
        .to_vec()
        .await
        .unwrap();
    assert_eq!(maximum[0], 14.0);
    assert_eq!(maximum[35], 35.0);

    let minimum = focal_minimum(&focal::value_policies(), &array, &circle_kernel(2))
        .unwrap()
        .to_vec()
        .await
        .unwrap();
    // Only the centre of row 1 lies within two cells of (3, 3)
    assert_eq!(minimum[3 * 6 + 3], 9.0);
}

#[tokio::test]
async fn test_zero_kernel_yields_no_data() {
    let ctx = Context::default();
    let array = PartitionedRaster::from_vec(&ctx, [4, 4], [2, 2], create_elevation_grid(4, 4, 1))
        .unwrap();
    let kernel = Kernel::filled(1, 0.0_f64);
    assert!(kernel.is_empty());

    let mean = focal_mean(&focal::value_policies(), &array, &kernel)
        .unwrap()
        .to_vec()
        .await
        .unwrap();
    assert!(mean.iter().all(|v| v.is_nan()));

    let weighted = convolve(&focal::value_policies(), &array, &kernel)
        .unwrap()
        .to_vec()
        .await
        .unwrap();
    assert!(weighted.iter().all(|v| v.is_nan()));
}

#[tokio::test]
async fn test_majority_of_classes() {
    let ctx = Context::default();
    #[rustfmt::skip]
    let classes = vec![
        1, 1, 2, 2,
        1, 3, 2, 2,
        4, 4, 2, 2,
        4, 4, 4, 2,
    ];
    let array = PartitionedRaster::from_vec(&ctx, [4, 4], [2, 2], classes).unwrap();

    let majority = focal_majority(&focal::value_policies(), &array, &box_kernel(1))
        .unwrap()
        .to_vec()
        .await
        .unwrap();
    assert_eq!(majority[0], 1);
    assert_eq!(majority[3], 2);
    assert_eq!(majority[12], 4);
}
