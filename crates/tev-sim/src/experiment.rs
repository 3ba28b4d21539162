//! Experimental protocols: controlled steps, time grids, and stop limits.

use tev_core::linspace;
use tev_model::{ControlMode, Load};
use tev_solver::SolverOptions;

use crate::error::{SimError, SimResult};

/// Recording grid for one step, in step-relative seconds.
#[derive(Clone, Debug)]
pub enum TimeSpan {
    /// `n` evenly spaced points over [0, t_max]
    Linspace { t_max: f64, n: usize },
    /// Points every `dt` seconds; `t_max` is appended when not evenly
    /// divisible, so the final interval may be shorter than `dt`
    FixedStep { t_max: f64, dt: f64 },
    /// Explicit times; must start at zero and strictly increase
    Explicit(Vec<f64>),
}

impl TimeSpan {
    /// Materialize and validate the grid.
    pub fn build(&self) -> SimResult<Vec<f64>> {
        let config = |what: String| Err(SimError::Config { what });

        let times = match self {
            TimeSpan::Linspace { t_max, n } => {
                if !(*t_max > 0.0 && t_max.is_finite()) {
                    return config(format!("t_max must be positive, got {t_max}"));
                }
                if *n < 2 {
                    return config(format!("time grid needs at least two points, got {n}"));
                }
                linspace(*t_max, *n)
            }
            TimeSpan::FixedStep { t_max, dt } => {
                if !(*t_max > 0.0 && t_max.is_finite()) {
                    return config(format!("t_max must be positive, got {t_max}"));
                }
                if !(*dt > 0.0 && dt.is_finite()) {
                    return config(format!("dt must be positive, got {dt}"));
                }
                let mut times = Vec::new();
                let mut k = 0usize;
                loop {
                    let t = k as f64 * dt;
                    if t >= *t_max {
                        break;
                    }
                    times.push(t);
                    k += 1;
                }
                times.push(*t_max);
                times
            }
            TimeSpan::Explicit(times) => times.clone(),
        };

        if times.len() < 2 {
            return config(format!(
                "time grid needs at least two points, got {}",
                times.len()
            ));
        }
        if times[0] != 0.0 {
            return config(format!("time grid must start at zero, got {}", times[0]));
        }
        if times.iter().any(|t| !t.is_finite()) {
            return config("time grid entries must be finite".to_string());
        }
        if times.windows(2).any(|w| w[1] <= w[0]) {
            return config("time grid must be strictly increasing".to_string());
        }
        Ok(times)
    }
}

/// Quantity a stop limit watches during a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitQuantity {
    Soc,
    TemperatureK,
    CurrentA,
    CurrentC,
    VoltageV,
    PowerW,
    CapacityAh,
    /// Total experiment time [s], not step-relative
    TimeS,
    /// Total experiment time [min]
    TimeMin,
    /// Total experiment time [h]
    TimeH,
}

impl LimitQuantity {
    pub fn name(&self) -> &'static str {
        match self {
            LimitQuantity::Soc => "soc",
            LimitQuantity::TemperatureK => "temperature_K",
            LimitQuantity::CurrentA => "current_A",
            LimitQuantity::CurrentC => "current_C",
            LimitQuantity::VoltageV => "voltage_V",
            LimitQuantity::PowerW => "power_W",
            LimitQuantity::CapacityAh => "capacity_Ah",
            LimitQuantity::TimeS => "time_s",
            LimitQuantity::TimeMin => "time_min",
            LimitQuantity::TimeH => "time_h",
        }
    }
}

/// One stop criterion: integration ends when the watched quantity crosses
/// the threshold.
#[derive(Clone, Copy, Debug)]
pub struct Limit {
    pub quantity: LimitQuantity,
    pub threshold: f64,
}

impl Limit {
    pub fn new(quantity: LimitQuantity, threshold: f64) -> SimResult<Self> {
        if !threshold.is_finite() {
            return Err(SimError::Config {
                what: format!(
                    "limit threshold for {} must be finite, got {threshold}",
                    quantity.name()
                ),
            });
        }
        Ok(Self {
            quantity,
            threshold,
        })
    }
}

/// Per-step overrides merged over the experiment-wide solver options.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepOverrides {
    pub rtol: Option<f64>,
    pub atol: Option<f64>,
    pub max_dt: Option<f64>,
    pub tstop: Option<f64>,
}

impl StepOverrides {
    pub(crate) fn apply(&self, base: &SolverOptions) -> SolverOptions {
        let mut options = base.clone();
        if let Some(rtol) = self.rtol {
            options.rtol = rtol;
        }
        if let Some(atol) = self.atol {
            options.atol = atol;
        }
        if let Some(max_dt) = self.max_dt {
            options.max_dt = max_dt;
        }
        if let Some(tstop) = self.tstop {
            options.tstop = Some(tstop);
        }
        options
    }
}

/// Immutable record of one controlled step.
#[derive(Clone, Debug)]
pub struct ExperimentStep {
    mode: ControlMode,
    load: Load,
    tspan: Vec<f64>,
    limits: Vec<Limit>,
    overrides: StepOverrides,
}

impl ExperimentStep {
    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn load(&self) -> &Load {
        &self.load
    }

    pub fn tspan(&self) -> &[f64] {
        &self.tspan
    }

    pub fn limits(&self) -> &[Limit] {
        &self.limits
    }

    pub fn overrides(&self) -> &StepOverrides {
        &self.overrides
    }
}

/// Ordered list of steps plus the experiment-wide solver options.
#[derive(Clone, Debug, Default)]
pub struct Experiment {
    steps: Vec<ExperimentStep>,
    options: SolverOptions,
}

impl Experiment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Experiment with non-default solver options applied to every step.
    pub fn with_options(options: SolverOptions) -> Self {
        Self {
            steps: Vec::new(),
            options,
        }
    }

    pub fn add_step(
        &mut self,
        mode: ControlMode,
        load: Load,
        tspan: TimeSpan,
        limits: Vec<Limit>,
    ) -> SimResult<()> {
        self.add_step_with(mode, load, tspan, limits, StepOverrides::default())
    }

    /// Like [`Experiment::add_step`], with solver-option overrides that
    /// apply to this step only.
    pub fn add_step_with(
        &mut self,
        mode: ControlMode,
        load: Load,
        tspan: TimeSpan,
        limits: Vec<Limit>,
        overrides: StepOverrides,
    ) -> SimResult<()> {
        let tspan = tspan.build()?;
        self.steps.push(ExperimentStep {
            mode,
            load,
            tspan,
            limits,
            overrides,
        });
        Ok(())
    }

    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> &[ExperimentStep] {
        &self.steps
    }

    pub fn step(&self, idx: usize) -> Option<&ExperimentStep> {
        self.steps.get(idx)
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }
}
