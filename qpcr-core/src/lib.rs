//! qPCR Core - Entity Types
//!
//! Pure data structures for the serial-dilution transfer planner. All other
//! crates depend on this. Behaviour is limited to validation and formatting;
//! planning lives in `qpcr-layout` and `qpcr-planner`.

pub mod config;
pub mod enums;
pub mod error;
pub mod identity;
pub mod labware;
pub mod step;
pub mod units;

pub use config::*;
pub use enums::*;
pub use error::*;
pub use identity::*;
pub use labware::*;
pub use step::*;
pub use units::*;
