//! dc-core: shared vocabulary for demandcast.
//!
//! Contains:
//! - ids (scenario, sector and model identifiers)
//! - range (forecast years and clamped time ranges)
//! - units (energy display units backed by uom)
//! - selection (active chart selection and demand type)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod range;
pub mod selection;
pub mod units;

pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use range::*;
pub use selection::*;
pub use units::*;
