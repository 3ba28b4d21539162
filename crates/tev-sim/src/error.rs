//! Error types for experiment setup and orchestration.

use thiserror::Error;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Configuration error: {what}")]
    Config { what: String },

    #[error(transparent)]
    Model(#[from] tev_model::ModelError),

    #[error(transparent)]
    Solver(#[from] tev_solver::SolverError),
}
