//! Gap filling between monthly anchors.
//!
//! Anchors are `(month_index, value)` pairs sorted by month. Every method only
//! produces values between the first and last anchor; months outside that span
//! stay `None`.

use crate::domain::InterpolationMethod;
use crate::math::NaturalSpline;

/// Fill `months` from `anchors` using `method`.
pub fn fill(anchors: &[(i32, f64)], months: &[i32], method: InterpolationMethod) -> Vec<Option<f64>> {
    match method {
        InterpolationMethod::Linear => months.iter().map(|&m| linear_at(anchors, m)).collect(),
        InterpolationMethod::Step => months.iter().map(|&m| step_at(anchors, m)).collect(),
        InterpolationMethod::Cubic => {
            let xs: Vec<f64> = anchors.iter().map(|(m, _)| *m as f64).collect();
            let ys: Vec<f64> = anchors.iter().map(|(_, v)| *v).collect();
            match NaturalSpline::fit(&xs, &ys) {
                Some(spline) => months.iter().map(|&m| spline.eval(m as f64)).collect(),
                // Too few anchors for a spline.
                None => months.iter().map(|&m| linear_at(anchors, m)).collect(),
            }
        }
    }
}

fn linear_at(anchors: &[(i32, f64)], month: i32) -> Option<f64> {
    let (first, last) = (anchors.first()?, anchors.last()?);
    if month < first.0 || month > last.0 {
        return None;
    }
    let hi = anchors.partition_point(|(m, _)| *m < month);
    let (m1, v1) = anchors[hi];
    if m1 == month {
        return Some(v1);
    }
    let (m0, v0) = anchors[hi - 1];
    let t = (month - m0) as f64 / (m1 - m0) as f64;
    Some(v0 + t * (v1 - v0))
}

fn step_at(anchors: &[(i32, f64)], month: i32) -> Option<f64> {
    let last = anchors.last()?;
    if month > last.0 {
        return None;
    }
    let idx = anchors.partition_point(|(m, _)| *m <= month);
    idx.checked_sub(1).map(|i| anchors[i].1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_fills_between_anchors_only() {
        let anchors = [(2, 3.0), (5, 6.0)];
        let months: Vec<i32> = (0..8).collect();
        let out = fill(&anchors, &months, InterpolationMethod::Linear);
        assert_eq!(
            out,
            vec![None, None, Some(3.0), Some(4.0), Some(5.0), Some(6.0), None, None]
        );
    }

    #[test]
    fn step_holds_previous_anchor() {
        let anchors = [(0, 1.0), (3, 2.0)];
        let out = fill(&anchors, &[0, 1, 2, 3, 4], InterpolationMethod::Step);
        assert_eq!(out, vec![Some(1.0), Some(1.0), Some(1.0), Some(2.0), None]);
    }

    #[test]
    fn cubic_with_two_anchors_falls_back_to_linear() {
        let anchors = [(0, 0.0), (3, 3.0)];
        let out = fill(&anchors, &[0, 1, 2, 3], InterpolationMethod::Cubic);
        assert_eq!(out, vec![Some(0.0), Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn empty_anchors_give_all_missing() {
        let out = fill(&[], &[0, 1], InterpolationMethod::Linear);
        assert_eq!(out, vec![None, None]);
    }
}
