use crate::CoreError;

/// Floating point type used throughout the workspace.
pub type Real = f64;

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Linearly spaced grid over [0, t_max] with n points.
pub fn linspace(t_max: Real, n: usize) -> Vec<Real> {
    if n < 2 {
        return vec![0.0; n.min(1)];
    }
    let dt = t_max / (n - 1) as Real;
    let mut out: Vec<Real> = (0..n).map(|i| i as Real * dt).collect();
    // avoid accumulated round-off on the final point
    out[n - 1] = t_max;
    out
}

/// Piecewise-linear interpolation over sorted knots, clamped at the ends.
pub fn interp1(x: Real, xp: &[Real], yp: &[Real]) -> Real {
    debug_assert_eq!(xp.len(), yp.len());
    if xp.is_empty() {
        return 0.0;
    }
    if x <= xp[0] {
        return yp[0];
    }
    if x >= xp[xp.len() - 1] {
        return yp[yp.len() - 1];
    }
    let i = xp.partition_point(|&v| v <= x);
    let (x0, x1) = (xp[i - 1], xp[i]);
    let (y0, y1) = (yp[i - 1], yp[i]);
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn linspace_endpoints() {
        let grid = linspace(3600.0, 7);
        assert_eq!(grid.len(), 7);
        assert_eq!(grid[0], 0.0);
        assert_eq!(grid[6], 3600.0);
        assert!(grid.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn interp1_midpoint_and_clamp() {
        let xp = [0.0, 1.0, 2.0];
        let yp = [0.0, 10.0, 0.0];
        assert_eq!(interp1(0.5, &xp, &yp), 5.0);
        assert_eq!(interp1(-1.0, &xp, &yp), 0.0);
        assert_eq!(interp1(5.0, &xp, &yp), 0.0);
    }

    proptest! {
        #[test]
        fn linspace_is_monotone(t_max in 1e-6f64..1e6, n in 2usize..200) {
            let grid = linspace(t_max, n);
            prop_assert_eq!(grid.len(), n);
            prop_assert!(grid.windows(2).all(|w| w[1] > w[0]));
        }
    }
}
