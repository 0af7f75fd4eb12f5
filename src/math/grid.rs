//! Evenly spaced position grids.

/// Bin-centre positions `shift + i·step` for `i in 0..bins`.
pub fn gen_lin(bins: usize, shift: f64, step: f64) -> Vec<f64> {
    (0..bins).map(|i| i as f64 * step + shift).collect()
}

/// `n` evenly spaced points over `[start, stop]`, both ends included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n as f64 - 1.0);
            let mut out: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            // Avoid accumulated rounding on the last point.
            out[n - 1] = stop;
            out
        }
    }
}

/// Index of the first maximum; `None` for an empty slice or all-NaN data.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Index of the first minimum; `None` for an empty slice or all-NaN data.
pub fn argmin(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v >= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen_lin_uses_bin_centres() {
        let g = gen_lin(4, 1.25, 2.5);
        assert_eq!(g, vec![1.25, 3.75, 6.25, 8.75]);
        assert!(gen_lin(0, 1.25, 2.5).is_empty());
    }

    #[test]
    fn linspace_includes_endpoints() {
        let v = linspace(10.0, 20.0, 5);
        assert_eq!(v.len(), 5);
        assert_eq!(v[0], 10.0);
        assert_eq!(v[4], 20.0);
        assert!((v[1] - 12.5).abs() < 1e-12);
        assert_eq!(linspace(3.0, 9.0, 1), vec![3.0]);
    }

    #[test]
    fn arg_extrema_take_the_first_tie() {
        let v = [1.0, 5.0, 2.0, 5.0, f64::NAN, -1.0, -1.0];
        assert_eq!(argmax(&v), Some(1));
        assert_eq!(argmin(&v), Some(5));
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmin(&[f64::NAN]), None);
    }
}
