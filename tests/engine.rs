use std::num::NonZeroU32;

use rand::Rng;
use rand::SeedableRng;
use sat_convolve::convolve::{Generations, advance_scalar, apply};
use sat_convolve::{ConvolveConfig, ConvolveEngine, Grid, Kernel, KernelBackend, Scaling};

fn passes(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap()
}

fn grid(rows: &[&[i32]]) -> Grid {
    Grid::from_rows(rows.iter().map(|r| r.to_vec()).collect()).unwrap()
}

fn kernel(rows: &[&[i32]]) -> Kernel {
    Kernel::from_rows(rows.iter().map(|r| r.to_vec()).collect()).unwrap()
}

fn engine(backend: KernelBackend) -> ConvolveEngine {
    ConvolveEngine::with_config(ConvolveConfig::default().thread_count(2).kernel(backend)).unwrap()
}

fn random_grid(dim: usize, lo: i32, hi: i32, seed: u64) -> Grid {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut out = Grid::new(dim);
    for row in 0..dim {
        for col in 0..dim {
            out.set(row, col, rng.gen_range(lo..=hi));
        }
    }
    out
}

#[test]
fn output_keeps_input_shape() {
    let k = kernel(&[&[1, 1, 1], &[1, 1, 1], &[1, 1, 1]]);
    for dim in [3usize, 4, 7, 16] {
        let out = apply(random_grid(dim, -50, 50, dim as u64), &k, passes(3));
        assert_eq!(out.dim(), dim);
        assert_eq!(out.as_slice().len(), dim * dim);
    }
}

#[test]
fn every_pass_stays_within_saturation_bound() {
    let k = kernel(&[
        &[3, -7, 9, 1, 0],
        &[12, 40, -33, 8, 2],
        &[-5, 17, 64, -21, 6],
        &[9, 0, 11, 30, -4],
        &[1, 2, -9, 5, 7],
    ]);
    let engine = engine(KernelBackend::Scalar);
    let mut gens = Generations::new(random_grid(12, -1000, 1000, 0xA1));
    for _ in 0..5 {
        engine.step(&mut gens, &k);
        assert!(
            gens.current().as_slice().iter().all(|v| (-16..=16).contains(v)),
            "generation {} left the saturation range",
            gens.generation()
        );
    }
}

#[test]
fn custom_bound_is_respected() {
    let k = kernel(&[&[0, 0, 0], &[0, 1, 0], &[0, 0, 0]]);
    let config = ConvolveConfig::default()
        .thread_count(1)
        .scaling(Scaling::new(1, 100).unwrap());
    let engine = ConvolveEngine::with_config(config).unwrap();
    let out = engine.apply(grid(&[&[500, -500, 3], &[0, 99, -101], &[7, 8, 9]]), &k, passes(1));
    assert_eq!(out, grid(&[&[100, -100, 3], &[0, 99, -100], &[7, 8, 9]]));
}

#[test]
fn centered_kernel_is_identity() {
    let k = Kernel::centered(5, 16).unwrap();
    let input = random_grid(9, -16, 16, 0xB2);
    let out = apply(input.clone(), &k, passes(4));
    assert_eq!(out, input);
}

#[test]
fn corner_cell_excludes_taps_outside_the_grid() {
    // At (0,0) only kernel entries with row and column <= H overlap the grid.
    let mut rows = vec![vec![0; 5]; 5];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, w) in row.iter_mut().enumerate() {
            if r > 2 || c > 2 {
                *w = 100;
            }
        }
    }
    let k = Kernel::from_rows(rows).unwrap();
    let out = apply(Grid::filled(6, 16), &k, passes(1));
    assert_eq!(out.get(0, 0), 0);
    // The opposite corner sees those taps.
    assert_eq!(out.get(5, 5), 16);
}

#[test]
fn asymmetric_kernel_uses_reversed_position() {
    // Weight at kernel (0,1) applies to source offset (+1, 0) after the flip.
    let k = kernel(&[&[0, 16, 0], &[0, 0, 0], &[0, 0, 0]]);
    let input = grid(&[
        &[1, 2, 3, 4],
        &[5, 6, 7, 8],
        &[9, 10, 11, 12],
        &[13, 14, 15, 16],
    ]);
    let out = apply(input, &k, passes(1));
    assert_eq!(out.get(1, 2), 11);
    assert_eq!(
        out,
        grid(&[
            &[5, 6, 7, 8],
            &[9, 10, 11, 12],
            &[13, 14, 15, 16],
            &[0, 0, 0, 0],
        ])
    );
}

#[test]
fn asymmetric_weighted_sum_matches_hand_computation() {
    let k = kernel(&[&[1, 2, 0], &[0, 0, 3], &[0, 0, 0]]);
    let input = grid(&[
        &[1, 2, 3, 4],
        &[5, 6, 7, 8],
        &[9, 10, 11, 12],
        &[13, 14, 15, 16],
    ]);
    let unscaled = ConvolveEngine::with_config(
        ConvolveConfig::default()
            .thread_count(1)
            .scaling(Scaling::new(1, 10_000).unwrap()),
    )
    .unwrap();
    let out = unscaled.apply(input.clone(), &k, passes(1));
    // (1,1): reversed taps (+1,+1)*1 + (+1,0)*2 + (0,-1)*3 = 11 + 20 + 15.
    // A correlation would give 1 + 4 + 21 = 26.
    assert_eq!(out.get(1, 1), 46);
    // (0,0): (0,-1) is outside the grid.
    assert_eq!(out.get(0, 0), 6 + 10);
    // (3,3): both +1 row taps are outside the grid.
    assert_eq!(out.get(3, 3), 45);

    // Reference scaling: 46 / 16 truncates to 2.
    assert_eq!(apply(input, &k, passes(1)).get(1, 1), 2);
}

#[test]
fn second_pass_reads_complete_first_generation() {
    let k = kernel(&[&[1, 2, 1], &[2, 8, 2], &[1, 2, 1]]);
    let input = grid(&[
        &[16, -16, 8, 0],
        &[4, 12, -9, 16],
        &[-3, 0, 15, -16],
        &[7, 7, -7, 2],
    ]);

    let mut first = Grid::new(4);
    advance_scalar(&input, &mut first, &k, Scaling::default());
    let mut second = Grid::new(4);
    advance_scalar(&first, &mut second, &k, Scaling::default());

    for backend in [KernelBackend::Scalar, KernelBackend::Parallel] {
        assert_eq!(engine(backend).apply(input.clone(), &k, passes(2)), second);
    }
}

#[test]
fn negative_sum_truncates_toward_zero() {
    let k = Kernel::centered(3, 1).unwrap();
    let out = apply(grid(&[&[0, 0, 0], &[0, -17, 0], &[0, 0, 0]]), &k, passes(1));
    assert_eq!(out.get(1, 1), -1);

    let out = apply(grid(&[&[0, 0, 0], &[0, 17, 0], &[0, 0, 0]]), &k, passes(1));
    assert_eq!(out.get(1, 1), 1);
}

#[test]
fn uniform_grid_is_a_fixed_point() {
    let k = Kernel::centered(5, 16).unwrap();
    for n in [1, 2, 7] {
        let out = apply(Grid::filled(4, 5), &k, passes(n));
        assert_eq!(out, Grid::filled(4, 5), "{n} passes");
    }
}

#[test]
fn derived_scaling_reproduces_reference_for_sixteen_weight_kernel() {
    let k = kernel(&[
        &[0, 0, 1, 0, 0],
        &[0, 1, 2, 1, 0],
        &[1, 2, 0, 2, 1],
        &[0, 1, 2, 1, 0],
        &[0, 0, 1, 0, 0],
    ]);
    assert_eq!(Scaling::derived_from(&k), Scaling::default());
}
