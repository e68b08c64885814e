// Piecewise-linear resampling used when merging captures

/// Anchors closer than this are treated as coincident.
const MIN_ANCHOR_SPAN: f64 = 1e-7;

/// Index of the first element of the ascending slice `xs` that is not less
/// than `x`.
pub fn lower_bound(xs: &[f64], x: f64) -> usize {
    xs.partition_point(|&v| v < x)
}

/// Evaluate the piecewise-linear function through `(xp, fp)` at `x`.
///
/// Outside `xp` the two nearest edge points are extrapolated. When the two
/// anchors are closer than 1e-7 their average is returned instead of
/// dividing by the span.
pub fn linear_interpolate(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    debug_assert_eq!(xp.len(), fp.len());
    match xp.len() {
        0 => return 0.0,
        1 => return fp[0],
        _ => {}
    }

    let last = xp.len() - 1;
    let i = if x <= xp[0] {
        1
    } else if x >= xp[last] {
        last
    } else {
        lower_bound(xp, x).max(1)
    };

    let (x0, x1) = (xp[i - 1], xp[i]);
    let (f0, f1) = (fp[i - 1], fp[i]);
    if (x1 - x0).abs() > MIN_ANCHOR_SPAN {
        // lerp form keeps anchors exact
        let t = (x - x0) / (x1 - x0);
        f0 * (1.0 - t) + f1 * t
    } else {
        0.5 * (f0 + f1)
    }
}

/// Resample `(xp, fp)` onto the grid `xs`.
pub fn resample(xs: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    xs.iter().map(|&x| linear_interpolate(x, xp, fp)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_bound_finds_first_not_less() {
        let xs = [1.0, 2.0, 2.0, 4.0];
        assert_eq!(lower_bound(&xs, 0.5), 0);
        assert_eq!(lower_bound(&xs, 2.0), 1);
        assert_eq!(lower_bound(&xs, 3.0), 3);
        assert_eq!(lower_bound(&xs, 9.0), 4);
    }

    #[test]
    fn exact_at_interior_anchors() {
        let xp = [0.0, 1.5, 3.0, 4.5, 6.0];
        let fp = [3.0, -1.0, 7.25, 2.0, 0.5];
        for i in 1..xp.len() - 1 {
            assert_eq!(linear_interpolate(xp[i], &xp, &fp), fp[i]);
        }
    }

    #[test]
    fn interpolates_between_anchors() {
        let xp = [0.0, 2.0, 4.0];
        let fp = [0.0, 4.0, 0.0];
        assert_eq!(linear_interpolate(1.0, &xp, &fp), 2.0);
        assert_eq!(linear_interpolate(3.0, &xp, &fp), 2.0);
    }

    #[test]
    fn extrapolates_from_edge_pairs() {
        let xp = [1.0, 2.0, 3.0];
        let fp = [10.0, 20.0, 40.0];
        assert_eq!(linear_interpolate(0.0, &xp, &fp), 0.0);
        assert_eq!(linear_interpolate(4.0, &xp, &fp), 60.0);
    }

    #[test]
    fn coincident_anchors_average() {
        let xp = [1.0, 1.0 + 1e-9, 2.0];
        let fp = [2.0, 4.0, 8.0];
        assert_eq!(linear_interpolate(0.5, &xp, &fp), 3.0);
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(linear_interpolate(1.0, &[], &[]), 0.0);
        assert_eq!(linear_interpolate(5.0, &[2.0], &[7.0]), 7.0);
    }

    #[test]
    fn resample_onto_grid() {
        let xp = [0.0, 10.0];
        let fp = [0.0, 100.0];
        assert_eq!(resample(&[2.5, 5.0], &xp, &fp), vec![25.0, 50.0]);
    }
}
