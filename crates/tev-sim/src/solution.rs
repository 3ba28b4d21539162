//! Solution containers for single steps and stitched cycles.
//!
//! Users should generally read results through the named `vars` table
//! rather than indexing raw state vectors. Solutions are snapshots: each
//! one carries a deep copy of the parameter set it was produced with, so
//! later edits to the live simulation never corrupt stored results.

use std::collections::BTreeMap;
use std::ops::Index;

use nalgebra::DVector;
use serde::Serialize;

use tev_model::{CellParams, StateLayout, quantities};
use tev_solver::{EventRecord, SolverOutcome, SolverStatus};

use crate::error::{SimError, SimResult};

/// Default seconds inserted between stitched steps so adjacent step
/// boundaries stay strictly ordered.
pub const DEFAULT_T_SHIFT: f64 = 1e-3;

/// Named output variables, one series per key.
///
/// Keys: `time_s`, `time_min`, `time_h`, `soc`, `temperature_K`,
/// `voltage_V`, `hysteresis_V`, `current_A`, `power_W`, `capacity_Ah`,
/// `eta0_V`, and `eta{j}_V` for each RC branch (1-based).
#[derive(Clone, Debug, Default, Serialize)]
pub struct Vars(BTreeMap<String, Vec<f64>>);

impl Vars {
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    fn insert(&mut self, name: impl Into<String>, series: Vec<f64>) {
        self.0.insert(name.into(), series);
    }
}

impl Index<&str> for Vars {
    type Output = [f64];

    fn index(&self, name: &str) -> &[f64] {
        self.get(name)
            .unwrap_or_else(|| panic!("no output variable named {name:?}"))
    }
}

/// Recompute the named variables from a raw trajectory.
fn fill_vars(
    params: &CellParams,
    layout: StateLayout,
    t: &[f64],
    y: &[DVector<f64>],
) -> SimResult<Vars> {
    let n_pts = t.len();
    let n_rc = layout.num_rc_pairs();

    let mut soc = Vec::with_capacity(n_pts);
    let mut temperature = Vec::with_capacity(n_pts);
    let mut voltage = Vec::with_capacity(n_pts);
    let mut hysteresis = Vec::with_capacity(n_pts);
    let mut current = Vec::with_capacity(n_pts);
    let mut power = Vec::with_capacity(n_pts);
    let mut capacity = Vec::with_capacity(n_pts);
    let mut eta0 = Vec::with_capacity(n_pts);
    let mut eta_j: Vec<Vec<f64>> = vec![Vec::with_capacity(n_pts); n_rc];

    for sv in y {
        let q = quantities(params, layout, sv)?;
        soc.push(q.soc);
        temperature.push(q.temperature_k);
        voltage.push(q.voltage_v);
        hysteresis.push(q.hysteresis_v);
        current.push(q.current_a);
        power.push(q.power_w);
        capacity.push(q.capacity_ah);
        eta0.push(q.eta0_v);
        for (j, series) in eta_j.iter_mut().enumerate() {
            series.push(sv[layout.eta(j)]);
        }
    }

    let mut vars = Vars::default();
    vars.insert("time_s", t.to_vec());
    vars.insert("time_min", t.iter().map(|v| v / 60.0).collect());
    vars.insert("time_h", t.iter().map(|v| v / 3600.0).collect());
    vars.insert("soc", soc);
    vars.insert("temperature_K", temperature);
    vars.insert("voltage_V", voltage);
    vars.insert("hysteresis_V", hysteresis);
    vars.insert("current_A", current);
    vars.insert("power_W", power);
    vars.insert("capacity_Ah", capacity);
    vars.insert("eta0_V", eta0);
    for (j, series) in eta_j.into_iter().enumerate() {
        vars.insert(format!("eta{}_V", j + 1), series);
    }
    Ok(vars)
}

/// Serializable run summary for one step.
#[derive(Clone, Debug, Serialize)]
pub struct StepSummary {
    pub success: bool,
    pub status: String,
    pub message: String,
    pub solve_time_s: f64,
}

/// Solution of a single experimental step, on the step-relative time axis.
#[derive(Clone, Debug)]
pub struct StepSolution {
    pub success: bool,
    pub status: SolverStatus,
    pub message: String,
    /// Step-relative times [s]
    pub t: Vec<f64>,
    pub y: Vec<DVector<f64>>,
    pub yp: Vec<DVector<f64>>,
    /// The limit crossing that stopped the step, if any
    pub event: Option<EventRecord>,
    pub vars: Vars,
    solve_time_s: f64,
    params: CellParams,
    layout: StateLayout,
}

impl StepSolution {
    pub(crate) fn from_outcome(
        params: CellParams,
        layout: StateLayout,
        outcome: SolverOutcome,
        solve_time_s: f64,
    ) -> SimResult<Self> {
        let vars = fill_vars(&params, layout, &outcome.t, &outcome.y)?;
        Ok(Self {
            success: outcome.success,
            status: outcome.status,
            message: outcome.message,
            t: outcome.t,
            y: outcome.y,
            yp: outcome.yp,
            event: outcome.event,
            vars,
            solve_time_s,
            params,
            layout,
        })
    }

    pub fn num_rc_pairs(&self) -> usize {
        self.layout.num_rc_pairs()
    }

    /// Parameter snapshot taken when the step finished.
    pub fn params(&self) -> &CellParams {
        &self.params
    }

    pub fn layout(&self) -> StateLayout {
        self.layout
    }

    /// Final state and derivative, the hand-off point for the next step.
    pub fn final_state(&self) -> (&DVector<f64>, &DVector<f64>) {
        (
            self.y.last().expect("solutions hold at least one point"),
            self.yp.last().expect("solutions hold at least one point"),
        )
    }

    pub fn solve_time_s(&self) -> f64 {
        self.solve_time_s
    }

    /// Wall-clock integration time, formatted for display.
    pub fn solvetime(&self) -> String {
        format!("{:.3} s", self.solve_time_s)
    }

    pub fn summary(&self) -> StepSummary {
        StepSummary {
            success: self.success,
            status: format!("{:?}", self.status),
            message: self.message.clone(),
            solve_time_s: self.solve_time_s,
        }
    }
}

/// Either kind of solution, for appending onto a cycle.
pub enum AnySolution {
    Step(StepSolution),
    Cycle(CycleSolution),
}

impl From<StepSolution> for AnySolution {
    fn from(soln: StepSolution) -> Self {
        AnySolution::Step(soln)
    }
}

impl From<CycleSolution> for AnySolution {
    fn from(soln: CycleSolution) -> Self {
        AnySolution::Cycle(soln)
    }
}

/// All experiment steps stitched onto one global time axis.
///
/// Per-step diagnostics stay addressable by index; events carry
/// global-axis times.
#[derive(Clone, Debug)]
pub struct CycleSolution {
    pub success: Vec<bool>,
    pub status: Vec<SolverStatus>,
    pub message: Vec<String>,
    /// Global times [s]
    pub t: Vec<f64>,
    pub y: Vec<DVector<f64>>,
    pub yp: Vec<DVector<f64>>,
    /// Limit crossings across all steps, times on the global axis
    pub events: Vec<EventRecord>,
    pub vars: Vars,
    solns: Vec<StepSolution>,
}

impl CycleSolution {
    /// Stitch step solutions in run order. Each subsequent step's times are
    /// shifted by the accumulated end time plus `t_shift`; a zero shift
    /// makes step boundaries overlap exactly.
    pub fn stitch(solns: Vec<StepSolution>, t_shift: f64) -> SimResult<Self> {
        let first = solns.first().ok_or_else(|| SimError::Config {
            what: "cannot stitch an empty list of step solutions".to_string(),
        })?;
        let params = first.params.clone();
        let layout = first.layout;

        let mut cycle = Self {
            success: Vec::new(),
            status: Vec::new(),
            message: Vec::new(),
            t: Vec::new(),
            y: Vec::new(),
            yp: Vec::new(),
            events: Vec::new(),
            vars: Vars::default(),
            solns: Vec::new(),
        };

        for soln in solns {
            cycle.push_step(soln, t_shift)?;
        }
        cycle.vars = fill_vars(&params, layout, &cycle.t, &cycle.y)?;
        Ok(cycle)
    }

    fn push_step(&mut self, soln: StepSolution, t_shift: f64) -> SimResult<()> {
        if let Some(first) = self.solns.first() {
            if first.num_rc_pairs() != soln.num_rc_pairs() {
                return Err(SimError::Config {
                    what: format!(
                        "cannot combine solutions with {} and {} RC pairs",
                        first.num_rc_pairs(),
                        soln.num_rc_pairs()
                    ),
                });
            }
        }

        let base = match self.t.last() {
            Some(&t_end) => t_end + t_shift,
            None => 0.0,
        };

        self.t.extend(soln.t.iter().map(|t| base + t));
        self.y.extend(soln.y.iter().cloned());
        self.yp.extend(soln.yp.iter().cloned());

        if let Some(event) = &soln.event {
            let mut shifted = event.clone();
            shifted.t += base;
            self.events.push(shifted);
        }

        self.success.push(soln.success);
        self.status.push(soln.status);
        self.message.push(soln.message.clone());
        self.solns.push(soln);
        Ok(())
    }

    pub fn num_steps(&self) -> usize {
        self.solns.len()
    }

    pub fn num_rc_pairs(&self) -> usize {
        self.solns[0].num_rc_pairs()
    }

    /// Deep copy of one step on its original step-relative axis.
    pub fn get_step(&self, idx: usize) -> SimResult<StepSolution> {
        self.solns.get(idx).cloned().ok_or_else(|| SimError::Config {
            what: format!("step index {idx} out of range for {} steps", self.num_steps()),
        })
    }

    /// Re-stitch an inclusive range of steps onto a fresh time origin.
    pub fn get_steps(&self, first: usize, last: usize) -> SimResult<CycleSolution> {
        if first > last || last >= self.num_steps() {
            return Err(SimError::Config {
                what: format!(
                    "step range ({first}, {last}) out of range for {} steps",
                    self.num_steps()
                ),
            });
        }
        CycleSolution::stitch(self.solns[first..=last].to_vec(), DEFAULT_T_SHIFT)
    }

    /// Append another solution after the current end time. The input is
    /// deep-copied; appending a clone of the cycle itself models repeated
    /// cycling.
    pub fn append(&mut self, soln: impl Into<AnySolution>, t_shift: f64) -> SimResult<()> {
        let params = self.solns[0].params.clone();
        let layout = self.solns[0].layout;

        match soln.into() {
            AnySolution::Step(step) => self.push_step(step, t_shift)?,
            AnySolution::Cycle(cycle) => {
                if cycle.num_rc_pairs() != self.num_rc_pairs() {
                    return Err(SimError::Config {
                        what: format!(
                            "cannot combine solutions with {} and {} RC pairs",
                            self.num_rc_pairs(),
                            cycle.num_rc_pairs()
                        ),
                    });
                }
                // Keep the cycle's internal shifts; t_shift only separates
                // the junction between the two solutions.
                let base = self.t.last().copied().unwrap_or(0.0) + t_shift;
                self.t.extend(cycle.t.iter().map(|t| base + t));
                self.y.extend(cycle.y.iter().cloned());
                self.yp.extend(cycle.yp.iter().cloned());
                self.events.extend(cycle.events.iter().map(|event| {
                    let mut shifted = event.clone();
                    shifted.t += base;
                    shifted
                }));
                self.success.extend(cycle.success.iter().copied());
                self.status.extend(cycle.status.iter().copied());
                self.message.extend(cycle.message.iter().cloned());
                self.solns.extend(cycle.solns.iter().cloned());
            }
        }

        self.vars = fill_vars(&params, layout, &self.t, &self.y)?;
        Ok(())
    }

    pub fn final_state(&self) -> (&DVector<f64>, &DVector<f64>) {
        let last = self.solns.last().expect("cycles hold at least one step");
        last.final_state()
    }

    pub fn solve_time_s(&self) -> f64 {
        self.solns.iter().map(StepSolution::solve_time_s).sum()
    }

    /// Total wall-clock integration time, formatted for display.
    pub fn solvetime(&self) -> String {
        format!("{:.3} s", self.solve_time_s())
    }

    pub fn summaries(&self) -> Vec<StepSummary> {
        self.solns.iter().map(StepSolution::summary).collect()
    }
}
