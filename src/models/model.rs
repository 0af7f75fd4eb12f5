//! Model evaluation for the sigmoid family.
//!
//! The fitter relies on two primitive operations:
//! - the default (initial) parameter vector of a model
//! - predict `y(x)` given the parameter vector
//!
//! Parameter order always follows `ModelKind::param_names`.

use crate::domain::ModelKind;

/// Author-tuned starting values, in `param_names` order.
pub fn defaults(model: ModelKind) -> &'static [f64] {
    match model {
        ModelKind::Sigmoid => &[-0.56, 90.0, -3.5, 0.5],
        ModelKind::DoseResponse => &[1.0, 1.0, 90.0, 1.0],
        ModelKind::Hill => &[0.7, 0.01, 90.0, 15.0],
        ModelKind::LogDoseResponse => &[1.0, 1.0, 90.0, 1.0],
        ModelKind::Logistic5 => &[1.0, 1.0, 90.0, 1.0, 1.0],
        ModelKind::Arctan => &[20.0, 5.0, 1.0],
        ModelKind::Tanh => &[10.0, 90.0, 0.5],
    }
}

/// Predict `y(x)` for the given model kind.
///
/// # Panics
/// Panics if `p` is shorter than `model.param_count()`.
pub fn predict(model: ModelKind, x: f64, p: &[f64]) -> f64 {
    match model {
        ModelKind::Sigmoid => sigmoid(x, p[0], p[1], p[2], p[3]),
        ModelKind::DoseResponse => dose_response(x, p[0], p[1], p[2], p[3]),
        ModelKind::Hill => hill(x, p[0], p[1], p[2], p[3]),
        ModelKind::LogDoseResponse => log_dose_response(x, p[0], p[1], p[2], p[3]),
        ModelKind::Logistic5 => logistic5(x, p[0], p[1], p[2], p[3], p[4]),
        ModelKind::Arctan => arctan(x, p[0], p[1], p[2]),
        ModelKind::Tanh => tanh(x, p[0], p[1], p[2]),
    }
}

/// Evaluate the model on every position.
pub fn predict_all(model: ModelKind, xs: &[f64], p: &[f64]) -> Vec<f64> {
    xs.iter().map(|&x| predict(model, x, p)).collect()
}

pub fn sigmoid(x: f64, a: f64, z: f64, c: f64, d: f64) -> f64 {
    a / (1.0 + ((x - z) / c).exp()) + d
}

pub fn dose_response(x: f64, a: f64, b: f64, z: f64, d: f64) -> f64 {
    a + (b - a) / (1.0 + 10f64.powf((z - x) * d))
}

pub fn hill(x: f64, a: f64, b: f64, z: f64, d: f64) -> f64 {
    let xd = x.powf(d);
    a + (b - a) * xd / (z.powf(d) + xd)
}

pub fn log_dose_response(x: f64, a: f64, b: f64, z: f64, d: f64) -> f64 {
    b + (a - b) / (1.0 + (x / z).powf(d))
}

pub fn logistic5(x: f64, a: f64, b: f64, z: f64, d: f64, e: f64) -> f64 {
    a + (b - a) / (1.0 + (z / x).powf(d)).powf(e)
}

pub fn arctan(x: f64, a: f64, z: f64, c: f64) -> f64 {
    -(x / a - z).atan() + c
}

pub fn tanh(x: f64, a: f64, z: f64, c: f64) -> f64 {
    -(x / a - z).tanh() + c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_param_names() {
        for model in ModelKind::ALL {
            assert_eq!(defaults(model).len(), model.param_count(), "{model:?}");
        }
    }

    #[test]
    fn every_model_is_finite_at_defaults() {
        for model in ModelKind::ALL {
            for x in [1.25, 50.0, 90.0, 148.75] {
                let y = predict(model, x, defaults(model));
                assert!(y.is_finite(), "{model:?} at x={x} gave {y}");
            }
        }
    }

    #[test]
    fn midpoint_sits_at_z() {
        // sigmoid: halfway between d and a + d at x = z
        let y = sigmoid(90.0, -0.56, 90.0, -3.5, 0.5);
        assert!((y - (0.5 - 0.28)).abs() < 1e-12);

        // dose-response, hill, log dose-response: halfway between a and b at x = z
        assert!((dose_response(40.0, 0.0, 1.0, 40.0, 0.3) - 0.5).abs() < 1e-12);
        assert!((hill(40.0, 0.0, 1.0, 40.0, 7.0) - 0.5).abs() < 1e-12);
        assert!((log_dose_response(40.0, 1.0, 0.0, 40.0, 3.0) - 0.5).abs() < 1e-12);

        // 5PL with e = 1 reduces to the 4-parameter form
        assert!((logistic5(40.0, 0.0, 1.0, 40.0, 2.0, 1.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn trigonometric_variants_cross_c_at_a_times_z() {
        assert!((arctan(100.0, 20.0, 5.0, 1.0) - 1.0).abs() < 1e-12);
        assert!((tanh(900.0, 10.0, 90.0, 0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn negative_c_makes_sigmoid_fall() {
        let p = defaults(ModelKind::Sigmoid);
        let before = predict(ModelKind::Sigmoid, 60.0, p);
        let after = predict(ModelKind::Sigmoid, 120.0, p);
        assert!(before > after);
        assert!((before - 0.5).abs() < 1e-3);
        assert!((after - (-0.06)).abs() < 1e-3);
    }
}
