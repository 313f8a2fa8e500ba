//! Transfer steps and plan events handed to the liquid-handling driver

use crate::{Microlitres, Millimetres, MixLocation, Pipette, Stage, WellRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Post-dispense settle delay applied to every transfer.
pub const SETTLE_DELAY_SECONDS: u32 = 3;

/// Touch-tip offset below the well top applied to every transfer.
pub const TOUCH_TIP_OFFSET: Millimetres = Millimetres::from_whole(-5);

/// Plunger flow rates in microlitres per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowRates {
    pub aspirate: Microlitres,
    pub dispense: Microlitres,
    pub blow_out: Microlitres,
}

impl FlowRates {
    pub const fn new(aspirate: Microlitres, dispense: Microlitres, blow_out: Microlitres) -> Self {
        Self {
            aspirate,
            dispense,
            blow_out,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MixSpec {
    pub repetitions: u32,
    pub volume: Microlitres,
    pub location: MixLocation,
    pub height: Millimetres,
}

/// Tip lifecycle around a step. A tip picked up by one step is carried by the
/// following steps until a step drops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TipHandling {
    pub pick_up_new: bool,
    pub drop_after: bool,
}

impl TipHandling {
    /// Fresh tip, discarded after the step.
    pub const SINGLE_USE: TipHandling = TipHandling {
        pick_up_new: true,
        drop_after: true,
    };
}

/// One atomic multichannel transfer. Source and destination name the head
/// well of the 8-channel column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferStep {
    /// Position in the plan, counting transfers only
    pub index: usize,
    pub stage: Stage,
    pub pipette: Pipette,
    pub source: WellRef,
    pub destination: WellRef,
    /// Commanded volume after correction
    pub volume: Microlitres,
    pub nominal_volume: Microlitres,
    pub aspirate_height: Millimetres,
    pub dispense_height: Millimetres,
    pub flow_rates: FlowRates,
    pub mix: Option<MixSpec>,
    pub blow_out_height: Millimetres,
    pub settle_delay_seconds: u32,
    pub touch_tip_offset: Millimetres,
    pub tip: TipHandling,
}

impl fmt::Display for TransferStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} {} -> {} @ {}/{}",
            self.index,
            self.stage,
            self.volume,
            self.source,
            self.destination,
            self.aspirate_height,
            self.dispense_height
        )
    }
}

/// Blocking operator prompt emitted at a stage boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatorPrompt {
    /// Last stage completed before the prompt
    pub after_stage: Stage,
    pub message: String,
}

impl OperatorPrompt {
    pub fn new(after_stage: Stage, message: impl Into<String>) -> Self {
        Self {
            after_stage,
            message: message.into(),
        }
    }
}

/// One entry of an ordered plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlanEvent {
    Transfer(TransferStep),
    Pause(OperatorPrompt),
    SetTemperature { celsius: f64 },
    DeactivateTemperature,
}

impl PlanEvent {
    pub fn as_transfer(&self) -> Option<&TransferStep> {
        match self {
            PlanEvent::Transfer(step) => Some(step),
            _ => None,
        }
    }

    pub fn is_pause(&self) -> bool {
        matches!(self, PlanEvent::Pause(_))
    }
}

// =============================================================================
// TESTS
// =============================================================================
