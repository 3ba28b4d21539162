//! tev-model: equivalent-circuit cell model.
//!
//! Contains:
//! - params (cell parameter set with closure-valued properties)
//! - layout (state-vector index maps for the DAE and ODE formulations)
//! - physics (shared right-hand-side and derived-quantity engine)
//! - load (control modes and time-varying load profiles)

pub mod error;
pub mod layout;
pub mod load;
pub mod params;
pub mod physics;

pub use error::{ModelError, ModelResult};
pub use layout::{Formulation, StateLayout};
pub use load::{ControlMode, Load};
pub use params::{CellParams, RcBranch, SocFn, SocTempFn};
pub use physics::{
    StepQuantities, calculated_current, calculated_voltage, quantities, rhs_dae, rhs_ode,
};
