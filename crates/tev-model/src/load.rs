//! Load demands and time-varying profile helpers.
//!
//! A [`Load`] gives the demanded value (current, voltage, or power,
//! depending on the controlling [`ControlMode`]) at a step-relative time.
//! The profile constructors smooth transitions between operating points;
//! hard jumps from rest into a high-rate load can destabilize the
//! integrator, and a short ramp avoids that.

use std::sync::Arc;

use tev_core::interp1;

use crate::error::{ModelError, ModelResult};

/// Which quantity a step's load demand controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlMode {
    /// Applied current [A]
    CurrentA,
    /// Applied current as a C-rate [1/h]
    CurrentC,
    /// Held terminal voltage [V]
    VoltageV,
    /// Applied power [W]
    PowerW,
}

impl ControlMode {
    pub fn units(&self) -> &'static str {
        match self {
            ControlMode::CurrentA => "A",
            ControlMode::CurrentC => "C",
            ControlMode::VoltageV => "V",
            ControlMode::PowerW => "W",
        }
    }
}

/// Demanded load value over step-relative time.
#[derive(Clone)]
pub enum Load {
    Constant(f64),
    Profile(Arc<dyn Fn(f64) -> f64 + Send + Sync>),
}

impl std::fmt::Debug for Load {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Load::Constant(v) => write!(f, "Load::Constant({v})"),
            Load::Profile(_) => write!(f, "Load::Profile(..)"),
        }
    }
}

impl Load {
    pub fn value(&self, t: f64) -> f64 {
        match self {
            Load::Constant(v) => *v,
            Load::Profile(f) => f(t),
        }
    }

    pub fn from_fn(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Load::Profile(Arc::new(f))
    }

    /// Linear ramp `m*t + b`.
    pub fn ramp(m: f64, b: f64) -> Self {
        Load::from_fn(move |t| m * t + b)
    }

    /// Ramp with slope `m` from intercept `b` until the constant `step`
    /// value is reached, with a sigmoid smoothing the transition. Larger
    /// `sharpness` makes the transition crisper.
    pub fn ramp_to_constant(m: f64, step: f64, b: f64, sharpness: f64) -> ModelResult<Self> {
        if m == 0.0 || !m.is_finite() {
            return Err(ModelError::Config {
                what: format!("ramp slope must be finite and nonzero, got {m}"),
            });
        }
        if (m > 0.0 && b >= step) || (m < 0.0 && b <= step) {
            return Err(ModelError::Config {
                what: format!("ramp from b = {b} with slope {m} never reaches step = {step}"),
            });
        }
        if sharpness <= 0.0 {
            return Err(ModelError::Config {
                what: format!("sharpness must be strictly positive, got {sharpness}"),
            });
        }

        let k = m.signum() * sharpness;
        Ok(Load::from_fn(move |t| {
            let linear = m * t + b;
            let sigmoid = 1.0 / (1.0 + (-k * (linear - step)).exp());
            (1.0 - sigmoid) * linear + sigmoid * step
        }))
    }

    /// Piecewise-constant profile: `y0` before `tp[0]`, then `yp[i]` on
    /// `[tp[i], tp[i+1])`, holding `yp` last value afterward.
    pub fn stepped(tp: Vec<f64>, yp: Vec<f64>, y0: f64) -> ModelResult<Self> {
        check_switch_times(&tp, &yp)?;
        Ok(Load::from_fn(move |t| {
            if t < tp[0] {
                return y0;
            }
            let i = tp.partition_point(|&v| v <= t);
            yp[i - 1]
        }))
    }

    /// Like [`Load::stepped`], but each transition ramps linearly over
    /// `t_ramp` seconds instead of jumping. Generally more stable to
    /// integrate than hard steps.
    pub fn ramped_steps(tp: Vec<f64>, yp: Vec<f64>, t_ramp: f64, y0: f64) -> ModelResult<Self> {
        check_switch_times(&tp, &yp)?;
        if !(t_ramp > 0.0 && t_ramp.is_finite()) {
            return Err(ModelError::Config {
                what: format!("t_ramp must be positive, got {t_ramp}"),
            });
        }
        if tp.windows(2).any(|w| w[1] - w[0] < t_ramp) {
            return Err(ModelError::Config {
                what: "switch times must be spaced at least t_ramp apart".to_string(),
            });
        }

        // Knots at each switch: previous level at tp[i], new level at
        // tp[i] + t_ramp; interp1 holds the ends.
        let mut xs = Vec::with_capacity(2 * tp.len());
        let mut ys = Vec::with_capacity(2 * tp.len());
        let mut level = y0;
        for (&t_switch, &y_next) in tp.iter().zip(&yp) {
            xs.push(t_switch);
            ys.push(level);
            xs.push(t_switch + t_ramp);
            ys.push(y_next);
            level = y_next;
        }
        Ok(Load::from_fn(move |t| interp1(t, &xs, &ys)))
    }
}

fn check_switch_times(tp: &[f64], yp: &[f64]) -> ModelResult<()> {
    if tp.is_empty() || tp.len() != yp.len() {
        return Err(ModelError::Config {
            what: format!(
                "switch times and values must be non-empty and the same length, got {} and {}",
                tp.len(),
                yp.len()
            ),
        });
    }
    if tp.windows(2).any(|w| w[1] <= w[0]) {
        return Err(ModelError::Config {
            what: "switch times must be strictly increasing".to_string(),
        });
    }
    Ok(())
}
