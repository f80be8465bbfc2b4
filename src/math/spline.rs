//! Natural cubic spline.
//!
//! Used by the `cubic` interpolation method to fill the months between quarterly
//! anchors. Given knots `(x_i, y_i)` we solve for the second derivatives `M_i`:
//!
//! ```text
//! h_{i-1} M_{i-1} + 2 (h_{i-1} + h_i) M_i + h_i M_{i+1}
//!     = 6 ((y_{i+1} - y_i) / h_i - (y_i - y_{i-1}) / h_{i-1})
//! ```
//!
//! with the natural boundary `M_0 = M_{n-1} = 0`. The system is tiny (one row per
//! quarter), so a dense LU solve is fine.

use nalgebra::{DMatrix, DVector};

/// A fitted natural cubic spline.
#[derive(Debug, Clone)]
pub struct NaturalSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    m: Vec<f64>,
}

impl NaturalSpline {
    /// Fit a spline through strictly increasing knots.
    ///
    /// Returns `None` with fewer than three knots, unsorted knots, or a singular system.
    pub fn fit(xs: &[f64], ys: &[f64]) -> Option<Self> {
        let n = xs.len();
        if n < 3 || ys.len() != n {
            return None;
        }
        if xs.windows(2).any(|w| w[1] <= w[0]) {
            return None;
        }

        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();

        let mut a = DMatrix::<f64>::zeros(n, n);
        let mut rhs = DVector::<f64>::zeros(n);
        a[(0, 0)] = 1.0;
        a[(n - 1, n - 1)] = 1.0;
        for i in 1..n - 1 {
            a[(i, i - 1)] = h[i - 1];
            a[(i, i)] = 2.0 * (h[i - 1] + h[i]);
            a[(i, i + 1)] = h[i];
            rhs[i] = 6.0 * ((ys[i + 1] - ys[i]) / h[i] - (ys[i] - ys[i - 1]) / h[i - 1]);
        }

        let m = a.lu().solve(&rhs)?;
        if !m.iter().all(|v| v.is_finite()) {
            return None;
        }

        Some(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            m: m.iter().copied().collect(),
        })
    }

    /// Evaluate inside the knot range; `None` outside it (no extrapolation).
    pub fn eval(&self, x: f64) -> Option<f64> {
        let n = self.xs.len();
        if x < self.xs[0] || x > self.xs[n - 1] {
            return None;
        }
        // Segment i covers [x_i, x_{i+1}].
        let i = self.xs.partition_point(|&k| k <= x).saturating_sub(1).min(n - 2);

        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        let (m0, m1) = (self.m[i], self.m[i + 1]);
        let h = x1 - x0;
        let a = x1 - x;
        let b = x - x0;

        Some(
            m0 * a.powi(3) / (6.0 * h)
                + m1 * b.powi(3) / (6.0 * h)
                + (y0 / h - m0 * h / 6.0) * a
                + (y1 / h - m1 * h / 6.0) * b,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spline_passes_through_knots() {
        let xs = [0.0, 3.0, 6.0, 9.0];
        let ys = [1.0, 4.0, 2.0, 5.0];
        let s = NaturalSpline::fit(&xs, &ys).unwrap();
        for (x, y) in xs.iter().zip(ys) {
            assert!((s.eval(*x).unwrap() - y).abs() < 1e-10);
        }
    }

    #[test]
    fn spline_reproduces_a_line() {
        // Second derivatives are zero for linear data, so the spline is the line.
        let xs = [0.0, 3.0, 6.0];
        let ys = [2.0, 8.0, 14.0];
        let s = NaturalSpline::fit(&xs, &ys).unwrap();
        assert!((s.eval(1.0).unwrap() - 4.0).abs() < 1e-10);
        assert!((s.eval(4.5).unwrap() - 11.0).abs() < 1e-10);
    }

    #[test]
    fn spline_refuses_extrapolation_and_short_input() {
        let s = NaturalSpline::fit(&[0.0, 1.0, 2.0], &[0.0, 1.0, 0.0]).unwrap();
        assert!(s.eval(-0.1).is_none());
        assert!(s.eval(2.1).is_none());
        assert!(NaturalSpline::fit(&[0.0, 1.0], &[0.0, 1.0]).is_none());
    }
}
