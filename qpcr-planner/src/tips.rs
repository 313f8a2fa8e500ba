//! Tip Resource Planner
//!
//! Tip counts are closed-form in the column count. Racks go into the
//! driver-reported slots in order, and a shortfall is raised before any
//! liquid moves.

use qpcr_core::{DeckLayout, DeckSlot, Phase, Pipette, ResourceExhaustedError};
use serde::{Deserialize, Serialize};

pub const TIPS_PER_RACK: i64 = 96;

/// Tip consumption of one pipette within one phase:
/// `column_count * 8 * tips_per_column + fixed_tips`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipRule {
    pub phase: Phase,
    pub pipette: Pipette,
    /// New-tip pickups per sample column, each consuming 8 tips
    pub tips_per_column: i64,
    /// Tips used independently of the column count
    pub fixed_tips: i64,
}

/// Buffer fills and the 1:10k to 1:20k transfer use the p300; the first two
/// serial transfers use the p20; assay setup is all p20, including three
/// master-mix and three standards pickups for the standards block.
pub const TIP_RULES: [TipRule; 3] = [
    TipRule {
        phase: Phase::Dilution,
        pipette: Pipette::P300Multi,
        tips_per_column: 4,
        fixed_tips: 0,
    },
    TipRule {
        phase: Phase::Dilution,
        pipette: Pipette::P20Multi,
        tips_per_column: 2,
        fixed_tips: 0,
    },
    TipRule {
        phase: Phase::AssaySetup,
        pipette: Pipette::P20Multi,
        tips_per_column: 12,
        fixed_tips: 48,
    },
];

pub fn tips_required(column_count: usize, rule: &TipRule) -> i64 {
    column_count as i64 * Pipette::CHANNELS * rule.tips_per_column + rule.fixed_tips
}

/// `ceil(tips / 96)`; at least one rack whenever any tip is used.
pub fn racks_required(tips: i64) -> usize {
    if tips <= 0 {
        return 0;
    }
    ((tips + TIPS_PER_RACK - 1) / TIPS_PER_RACK) as usize
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipBudget {
    pub phase: Phase,
    pub pipette: Pipette,
    pub tips_required: i64,
    pub racks_required: usize,
    /// Slots the racks occupy, in loading order
    pub rack_slots: Vec<DeckSlot>,
}

/// Budget every tip rule against the deck's tip-rack slots.
pub fn plan_tips(
    column_count: usize,
    layout: &DeckLayout,
) -> Result<Vec<TipBudget>, ResourceExhaustedError> {
    TIP_RULES
        .iter()
        .map(|rule| {
            let tips = tips_required(column_count, rule);
            let racks = racks_required(tips);
            let available = layout.tip_rack_slots(rule.phase, rule.pipette);
            if racks > available.len() {
                tracing::warn!(
                    phase = %rule.phase,
                    pipette = %rule.pipette,
                    tips_required = tips,
                    racks_required = racks,
                    slots_available = available.len(),
                    "Not enough tip-rack slots"
                );
                return Err(ResourceExhaustedError::TipRacks {
                    phase: rule.phase,
                    pipette: rule.pipette,
                    tips_required: tips,
                    racks_required: racks,
                    slots_available: available.len(),
                });
            }
            Ok(TipBudget {
                phase: rule.phase,
                pipette: rule.pipette,
                tips_required: tips,
                racks_required: racks,
                rack_slots: available[..racks].to_vec(),
            })
        })
        .collect()
}

pub fn budget_for(budgets: &[TipBudget], phase: Phase, pipette: Pipette) -> Option<&TipBudget> {
    budgets
        .iter()
        .find(|b| b.phase == phase && b.pipette == pipette)
}

// =============================================================================
// TESTS
// =============================================================================
