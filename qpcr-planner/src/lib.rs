//! qPCR Planner - Transfer Plan Generation
//!
//! Builds the ordered transfer plan for a two-phase qPCR library
//! quantification run: buffer fills, a three-step serial dilution, then
//! master mix, diluted samples and standards into a 384-well assay plate.
//!
//! ```text
//! RunParameters ──validate──▶ StageConfiguration
//!                                   │
//!           GeometryResolver ◀──────┤
//!                 │                 │
//!     ┌───────────┼────────────┐    │
//!     ▼           ▼            ▼    ▼
//!   tips      reagents    QuadrantMapper
//!                               │
//!        HeightLedger ──▶ TransferSequencer ◀── VolumeCorrector
//!                               │
//!                         TransferPlan ──verify──▶ ProtocolRunner ──▶ LiquidHandler
//! ```

pub mod height;
pub mod plan;
pub mod reagents;
pub mod runner;
pub mod sequencer;
pub mod stages;
pub mod tips;
pub mod volume;

pub use height::{HeightLedger, HeightProfile};
pub use plan::{fingerprint, TipUsage, TransferPlan};
pub use reagents::{check_capacity, reagent_requirements, ReagentRequirement};
pub use runner::{LiquidHandler, ProtocolRunner, RunOutcome, RunReport};
pub use sequencer::{boundary_events, check_ledgers, TransferSequencer};
pub use stages::{recipe, StageRecipe};
pub use tips::{plan_tips, racks_required, tips_required, TipBudget, TipRule, TIP_RULES, TIPS_PER_RACK};
pub use volume::{CorrectedVolume, VolumeCorrector};
