//! tev-core: stable foundation for the thevenin workspace.
//!
//! Contains:
//! - numeric (Real + float helpers)
//! - timing (wall-clock timer for solve-time reporting)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod timing;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use numeric::*;
pub use timing::Timer;
