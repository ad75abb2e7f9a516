use plotkit_core::geometry::{LineChunk, Plottable, Point};
use plotkit_toolpath::optimizer::{optimize, OptimizerConfig};
use proptest::prelude::*;

fn chunk(points: &[(f64, f64)]) -> LineChunk {
    LineChunk::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
}

/// Direction-independent identity of a chunk: its point list or the
/// reverse, whichever is lexicographically smaller on raw bits.
fn signature(c: &LineChunk) -> Vec<(u64, u64)> {
    let fwd: Vec<(u64, u64)> = c
        .points()
        .iter()
        .map(|p| (p.x.to_bits(), p.y.to_bits()))
        .collect();
    let mut rev = fwd.clone();
    rev.reverse();
    fwd.min(rev)
}

fn signatures(p: &Plottable) -> Vec<Vec<(u64, u64)>> {
    let mut sigs: Vec<_> = p.chunks().iter().map(signature).collect();
    sigs.sort();
    sigs
}

fn arb_chunk() -> impl Strategy<Value = LineChunk> {
    // 1-point chunks included on purpose: degenerates must survive the
    // ordering pass untouched.
    prop::collection::vec((0.0..200.0f64, 0.0..200.0f64), 1..6).prop_map(|pts| {
        LineChunk::new(pts.into_iter().map(|(x, y)| Point::new(x, y)).collect())
    })
}

fn arb_plottable() -> impl Strategy<Value = Plottable> {
    prop::collection::vec(arb_chunk(), 1..20).prop_map(Plottable::new)
}

proptest! {
    #[test]
    fn output_is_a_permutation_of_input(input in arb_plottable()) {
        let before = signatures(&input);
        let total_points = input.total_points();
        let out = optimize(input, &OptimizerConfig::default(), None);
        prop_assert_eq!(signatures(&out), before);
        prop_assert_eq!(out.total_points(), total_points);
    }

    #[test]
    fn ordering_is_deterministic(input in arb_plottable()) {
        let a = optimize(input.clone(), &OptimizerConfig::default(), None);
        let b = optimize(input, &OptimizerConfig::default(), None);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn lookahead_one_still_permutes(input in arb_plottable()) {
        let before = signatures(&input);
        let out = optimize(input, &OptimizerConfig { lookahead: 1 }, None);
        prop_assert_eq!(signatures(&out), before);
    }
}

// Travel reduction is checked on directed workloads rather than as a
// universal property: greedy nearest-neighbor is a heuristic, and an
// input whose order already encodes a near-optimal tour can beat it.
// Segments near x = 0, 1, -2, 3 drawn in the order 0, -2, 1, 3 cost 7
// units of pen-up travel, while the greedy pass seeded at 0 walks
// 0, 1, 3, -2 for 8. The cases below pin the behavior on the inputs
// the ordering pass exists for: shuffled and clustered drawings.

#[test]
fn shuffled_collinear_segments_beat_input_order() {
    // Segments along a line, deliberately shuffled: [3, 0, 2, 1].
    let input = Plottable::new(vec![
        chunk(&[(30.0, 0.0), (35.0, 0.0)]),
        chunk(&[(0.0, 0.0), (5.0, 0.0)]),
        chunk(&[(20.0, 0.0), (25.0, 0.0)]),
        chunk(&[(10.0, 0.0), (15.0, 0.0)]),
    ]);
    let naive = input.pen_up_travel();
    let out = optimize(input, &OptimizerConfig::default(), None);
    assert!(out.pen_up_travel() < naive);
    assert_eq!(out.pen_up_travel(), 20.0);
}

#[test]
fn already_ordered_input_is_not_made_worse() {
    let input = Plottable::new(
        (0..6)
            .map(|i| chunk(&[(i as f64 * 10.0, 0.0), (i as f64 * 10.0 + 5.0, 0.0)]))
            .collect(),
    );
    let naive = input.pen_up_travel();
    let out = optimize(input, &OptimizerConfig::default(), None);
    assert!(out.pen_up_travel() <= naive);
}

#[test]
fn grid_of_rows_beats_snake_shuffle() {
    // Horizontal rows given in out-and-back row order; greedy should
    // find the boustrophedon path (or better).
    let input = Plottable::new(vec![
        chunk(&[(0.0, 0.0), (100.0, 0.0)]),
        chunk(&[(0.0, 30.0), (100.0, 30.0)]),
        chunk(&[(0.0, 10.0), (100.0, 10.0)]),
        chunk(&[(0.0, 40.0), (100.0, 40.0)]),
        chunk(&[(0.0, 20.0), (100.0, 20.0)]),
    ]);
    let naive = input.pen_up_travel();
    let out = optimize(input, &OptimizerConfig::default(), None);
    assert!(out.pen_up_travel() < naive);
}

#[test]
fn nan_points_never_win_the_scan() {
    let input = Plottable::new(vec![
        chunk(&[(0.0, 0.0), (1.0, 0.0)]),
        chunk(&[(f64::NAN, 0.0), (2.0, 0.0)]),
        chunk(&[(1.5, 0.0), (3.0, 0.0)]),
    ]);
    let out = optimize(input, &OptimizerConfig::default(), None);
    // The finite chunk is selected before the NaN one.
    assert_eq!(out.chunks()[1].first(), Some(&Point::new(1.5, 0.0)));
    assert_eq!(out.len(), 3);
}
