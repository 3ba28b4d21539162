//! Implicit ODE/DAE integration for the thevenin workspace.
//!
//! Provides:
//! - `DaeSystem` residual/event callback trait
//! - `DaeSolver` with full-grid `solve` and single-step `init_step`/`step`
//! - Damped Newton iteration with finite-difference Jacobian
//! - Adaptive backward-Euler stepping with LTE-based step control
//! - Event localization by bisection on the interpolated solution
//!
//! The rest of the workspace treats this crate as a black box: it consumes
//! a residual callback plus tolerances/options and returns trajectories,
//! step results, and event crossings.

pub mod dae;
pub mod error;
pub mod jacobian;
pub mod newton;

pub use dae::{
    DaeSolver, DaeSystem, EventRecord, InitCond, SolverOptions, SolverOutcome, SolverStatus,
};
pub use error::{SolverError, SolverResult};
pub use jacobian::finite_difference_jacobian;
pub use newton::{NewtonConfig, NewtonResult, newton_solve};
