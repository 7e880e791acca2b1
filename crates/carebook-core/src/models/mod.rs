//! Domain models for the CareBook core.

mod actor;
mod booking;
mod escrow;
mod link;
mod party;
mod settings;

pub use actor::*;
pub use booking::*;
pub use escrow::*;
pub use link::*;
pub use party::*;
pub use settings::*;
