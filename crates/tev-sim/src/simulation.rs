//! Simulation session: preprocessing, per-step solves, and full runs.

use nalgebra::DVector;
use tracing::debug;

use tev_core::Timer;
use tev_model::{
    CellParams, ControlMode, Formulation, Load, StateLayout, quantities, rhs_dae,
};
use tev_solver::{DaeSolver, DaeSystem, InitCond, SolverError, SolverResult};

use crate::error::{SimError, SimResult};
use crate::experiment::{Experiment, Limit, LimitQuantity};
use crate::solution::{CycleSolution, DEFAULT_T_SHIFT, StepSolution};

/// Where preprocessing takes the internal state from.
pub enum InitialState<'a> {
    /// Rested cell: initial soc, ambient temperature, relaxed branches
    Rested,
    /// Keep the carried state; only re-validate it against the layout
    Keep,
    /// Continue from a stored solution's final state
    FromSolution {
        sv: &'a DVector<f64>,
        svdot: &'a DVector<f64>,
    },
}

/// Knobs for [`Simulation::run_with`].
#[derive(Clone, Copy, Debug)]
pub struct RunOptions {
    /// Reset to a rested state after the run (a fresh run starts clean)
    pub reset_state: bool,
    /// Seconds inserted between stitched steps
    pub t_shift: f64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            reset_state: true,
            t_shift: DEFAULT_T_SHIFT,
        }
    }
}

/// A cell simulation session.
///
/// Owns the parameter set and the carried state between steps. Steps must
/// run in order; the state at the end of each step seeds the next. Use
/// [`Simulation::pre`] to reset or redirect the hidden state.
pub struct Simulation {
    params: CellParams,
    layout: StateLayout,
    sv0: DVector<f64>,
    svdot0: DVector<f64>,
    t0: f64,
}

impl Simulation {
    pub fn new(params: CellParams) -> SimResult<Self> {
        params.validate()?;
        let layout = StateLayout::new(Formulation::Simulation, params.num_rc_pairs);
        let sv0 = layout.rested_state(&params);
        let svdot0 = DVector::zeros(layout.size());
        Ok(Self {
            params,
            layout,
            sv0,
            svdot0,
            t0: 0.0,
        })
    }

    pub fn params(&self) -> &CellParams {
        &self.params
    }

    /// Mutable access for between-run parameter edits; call
    /// [`Simulation::pre`] afterward to re-validate and rebuild state.
    pub fn params_mut(&mut self) -> &mut CellParams {
        &mut self.params
    }

    pub fn layout(&self) -> StateLayout {
        self.layout
    }

    /// Re-run preprocessing. Resets the experiment-time origin to zero and
    /// sets the carried state per `init`.
    pub fn pre(&mut self, init: InitialState<'_>) -> SimResult<()> {
        self.params.validate()?;
        let layout = StateLayout::new(Formulation::Simulation, self.params.num_rc_pairs);

        match init {
            InitialState::Rested => {
                self.sv0 = layout.rested_state(&self.params);
                self.svdot0 = DVector::zeros(layout.size());
            }
            InitialState::Keep => {
                layout.check_size(self.sv0.len())?;
            }
            InitialState::FromSolution { sv, svdot } => {
                layout.check_size(sv.len())?;
                layout.check_size(svdot.len())?;
                self.sv0 = sv.clone();
                self.svdot0 = svdot.clone();
            }
        }

        self.layout = layout;
        self.t0 = 0.0;
        Ok(())
    }

    /// Run one experimental step from the carried state.
    ///
    /// Steps must run in order starting from index 0. Solver failures are
    /// reported on the returned solution, not as errors; the carried state
    /// still advances to whatever partial trajectory was produced.
    pub fn run_step(&mut self, exp: &Experiment, stepidx: usize) -> SimResult<StepSolution> {
        let step = exp.step(stepidx).ok_or_else(|| SimError::Config {
            what: format!(
                "step index {stepidx} out of range for {} steps",
                exp.num_steps()
            ),
        })?;

        let mut options = step.overrides().apply(exp.options());
        options.algebraic_idx = self.layout.algebraic_idx();
        options.initcond = InitCond::Yp0;

        let system = StepSystem {
            params: self.params.clone(),
            layout: self.layout,
            mode: step.mode(),
            load: step.load().clone(),
            limits: step.limits().to_vec(),
            mass: self.layout.mass_diagonal(),
            t0: self.t0,
        };

        debug!(step = stepidx, mode = ?step.mode(), "running experiment step");

        let mut solver = DaeSolver::new(system, options)?;
        let timer = Timer::start();
        let outcome = solver.solve(step.tspan(), &self.sv0, &self.svdot0)?;
        let solve_time_s = timer.elapsed_seconds();

        debug!(
            step = stepidx,
            success = outcome.success,
            status = ?outcome.status,
            solve_time_s,
            "experiment step finished"
        );

        if let (Some(y), Some(yp)) = (outcome.y.last(), outcome.yp.last()) {
            self.sv0 = y.clone();
            self.svdot0 = yp.clone();
        }
        self.t0 += outcome.t.last().copied().unwrap_or(0.0);

        StepSolution::from_outcome(self.params.clone(), self.layout, outcome, solve_time_s)
    }

    /// Run all steps in order and stitch the results. Resets the session
    /// to a rested state afterward; see [`Simulation::run_with`] to keep
    /// the final state instead.
    pub fn run(&mut self, exp: &Experiment) -> SimResult<CycleSolution> {
        self.run_with(exp, RunOptions::default())
    }

    pub fn run_with(&mut self, exp: &Experiment, options: RunOptions) -> SimResult<CycleSolution> {
        if exp.num_steps() == 0 {
            return Err(SimError::Config {
                what: "experiment has no steps".to_string(),
            });
        }

        let mut solns = Vec::with_capacity(exp.num_steps());
        for stepidx in 0..exp.num_steps() {
            solns.push(self.run_step(exp, stepidx)?);
        }
        let cycle = CycleSolution::stitch(solns, options.t_shift)?;

        self.t0 = 0.0;
        if options.reset_state {
            self.pre(InitialState::Rested)?;
        }
        Ok(cycle)
    }
}

/// One experimental step posed as a residual system with limit events.
struct StepSystem {
    params: CellParams,
    layout: StateLayout,
    mode: ControlMode,
    load: Load,
    limits: Vec<Limit>,
    mass: DVector<f64>,
    t0: f64,
}

impl DaeSystem for StepSystem {
    fn residual(
        &self,
        t: f64,
        y: &DVector<f64>,
        yp: &DVector<f64>,
        res: &mut DVector<f64>,
    ) -> SolverResult<()> {
        let rhs = rhs_dae(&self.params, self.layout, t, y, self.mode, &self.load)
            .map_err(|e| SolverError::Numeric {
                what: e.to_string(),
            })?;
        for i in 0..y.len() {
            res[i] = self.mass[i] * yp[i] - rhs[i];
        }
        Ok(())
    }

    fn num_events(&self) -> usize {
        self.limits.len()
    }

    fn events(
        &self,
        t: f64,
        y: &DVector<f64>,
        _yp: &DVector<f64>,
        out: &mut DVector<f64>,
    ) -> SolverResult<()> {
        let q = quantities(&self.params, self.layout, y).map_err(|e| SolverError::Numeric {
            what: e.to_string(),
        })?;
        let total_time = self.t0 + t;

        for (i, limit) in self.limits.iter().enumerate() {
            let observed = match limit.quantity {
                LimitQuantity::Soc => q.soc,
                LimitQuantity::TemperatureK => q.temperature_k,
                LimitQuantity::CurrentA => q.current_a,
                LimitQuantity::CurrentC => q.current_c,
                LimitQuantity::VoltageV => q.voltage_v,
                LimitQuantity::PowerW => q.power_w,
                LimitQuantity::CapacityAh => q.capacity_ah,
                LimitQuantity::TimeS => total_time,
                LimitQuantity::TimeMin => total_time / 60.0,
                LimitQuantity::TimeH => total_time / 3600.0,
            };
            out[i] = observed - limit.threshold;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::TimeSpan;
    use approx::assert_relative_eq;

    fn one_step_experiment(current_a: f64, t_max: f64) -> Experiment {
        let mut exp = Experiment::new();
        exp.add_step(
            ControlMode::CurrentA,
            Load::Constant(current_a),
            TimeSpan::Linspace { t_max, n: 11 },
            vec![],
        )
        .unwrap();
        exp
    }

    #[test]
    fn rested_session_reproduces_open_circuit() {
        let mut sim = Simulation::new(CellParams::default()).unwrap();
        let soln = sim.run_step(&one_step_experiment(0.0, 10.0), 0).unwrap();
        assert!(soln.success);
        for &v in &soln.vars["voltage_V"] {
            assert_relative_eq!(v, 3.7, max_relative = 1e-9);
        }
    }

    #[test]
    fn carried_state_advances_between_steps() {
        let mut sim = Simulation::new(CellParams::default()).unwrap();
        let exp = one_step_experiment(75.0, 360.0); // 1C for 0.1 h

        let first = sim.run_step(&exp, 0).unwrap();
        let soc_end = *first.vars["soc"].last().unwrap();
        assert_relative_eq!(soc_end, 0.9, max_relative = 1e-4);

        // without pre(), the next step starts where the last one ended
        let second = sim.run_step(&exp, 0).unwrap();
        assert_relative_eq!(
            *second.vars["soc"].first().unwrap(),
            soc_end,
            max_relative = 1e-9
        );

        sim.pre(InitialState::Rested).unwrap();
        let fresh = sim.run_step(&exp, 0).unwrap();
        assert_relative_eq!(*fresh.vars["soc"].first().unwrap(), 1.0);
    }

    #[test]
    fn pre_rejects_stale_state_sizes() {
        let mut sim = Simulation::new(CellParams::default()).unwrap();
        sim.params_mut().num_rc_pairs = 1;
        sim.params_mut()
            .branches
            .push(tev_model::RcBranch::new(|_, _| 0.01, |_, _| 1e3));
        // carried state still has the old size
        assert!(sim.pre(InitialState::Keep).is_err());
        // a rested reset rebuilds it
        assert!(sim.pre(InitialState::Rested).is_ok());
        assert_eq!(sim.layout().size(), 5);
    }

    #[test]
    fn run_requires_steps() {
        let mut sim = Simulation::new(CellParams::default()).unwrap();
        assert!(sim.run(&Experiment::new()).is_err());
    }

    #[test]
    fn missing_step_index_is_an_error() {
        let mut sim = Simulation::new(CellParams::default()).unwrap();
        let exp = one_step_experiment(1.0, 10.0);
        assert!(sim.run_step(&exp, 3).is_err());
    }
}
