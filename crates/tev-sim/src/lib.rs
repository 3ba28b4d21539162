//! tev-sim: experiments, orchestration, and solutions.
//!
//! Contains:
//! - experiment (protocol definition: steps, grids, limits, overrides)
//! - simulation (session state, per-step solves, full runs)
//! - solution (step/cycle containers with named output variables)
//! - prediction (single-step predictor for estimation loops)

pub mod error;
pub mod experiment;
pub mod prediction;
pub mod simulation;
pub mod solution;

pub use error::{SimError, SimResult};
pub use experiment::{
    Experiment, ExperimentStep, Limit, LimitQuantity, StepOverrides, TimeSpan,
};
pub use prediction::{Prediction, TransientState};
pub use simulation::{InitialState, RunOptions, Simulation};
pub use solution::{AnySolution, CycleSolution, DEFAULT_T_SHIFT, StepSolution, StepSummary, Vars};

pub use tev_model::{CellParams, ControlMode, Load, RcBranch};
pub use tev_solver::{EventRecord, SolverOptions, SolverStatus};
