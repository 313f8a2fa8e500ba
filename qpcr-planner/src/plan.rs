//! Transfer plans: generation, verification and fingerprinting

use crate::reagents::{check_capacity, reagent_requirements, ReagentRequirement};
use crate::sequencer::{check_ledgers, TransferSequencer};
use crate::tips::{budget_for, plan_tips, TipBudget, TIP_RULES};
use qpcr_core::{
    compute_content_hash, content_hash_hex, ConfigurationError, DeckLayout, MappingConflictError,
    Phase, Pipette, PlanEvent, QpcrResult, ResourceExhaustedError, Stage, StageConfiguration,
    StageGroup, TransferStep, WellRef,
};
use qpcr_layout::GeometryResolver;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// New-tip pickups the plan actually performs for one (phase, pipette).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipUsage {
    pub phase: Phase,
    pub pipette: Pipette,
    pub pickups: i64,
    /// Physical tips consumed: pickups times channels
    pub tips: i64,
}

/// Everything needed to run, or review, one protocol execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferPlan {
    pub sample_count: usize,
    pub column_count: usize,
    pub tip_budgets: Vec<TipBudget>,
    pub reagents: Vec<ReagentRequirement>,
    pub events: Vec<PlanEvent>,
    /// SHA-256 over the canonical JSON of `events`
    pub fingerprint: String,
}

impl TransferPlan {
    /// Resolve geometry, budget tips and reagents, then sequence every stage.
    /// Resource shortfalls are raised here, before any event exists.
    pub fn generate(config: &StageConfiguration, layout: &DeckLayout) -> QpcrResult<Self> {
        let resolver = GeometryResolver::from_config(config);
        resolver.validate_deck(layout)?;

        let column_count = resolver.column_count();
        let tip_budgets = plan_tips(column_count, layout)?;
        let reagents = reagent_requirements(config, column_count, layout);
        check_capacity(&reagents)?;
        check_ledgers(config, column_count)?;

        let events = TransferSequencer::new(config, resolver)?.sequence()?;
        let fingerprint = fingerprint(&events)?;

        let plan = Self {
            sample_count: resolver.sample_count(),
            column_count,
            tip_budgets,
            reagents,
            events,
            fingerprint,
        };
        tracing::info!(
            sample_count = plan.sample_count,
            column_count = plan.column_count,
            transfers = plan.transfer_count(),
            fingerprint = %plan.fingerprint,
            "Transfer plan generated"
        );
        Ok(plan)
    }

    pub fn transfers(&self) -> impl Iterator<Item = &TransferStep> {
        self.events.iter().filter_map(PlanEvent::as_transfer)
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers().count()
    }

    pub fn stage_steps(&self, stage: Stage) -> Vec<&TransferStep> {
        self.transfers().filter(|s| s.stage == stage).collect()
    }

    pub fn tip_usage(&self) -> Vec<TipUsage> {
        TIP_RULES
            .iter()
            .map(|rule| {
                let pickups = self
                    .transfers()
                    .filter(|s| {
                        s.tip.pick_up_new && s.stage.phase() == rule.phase && s.pipette == rule.pipette
                    })
                    .count() as i64;
                TipUsage {
                    phase: rule.phase,
                    pipette: rule.pipette,
                    pickups,
                    tips: pickups * Pipette::CHANNELS,
                }
            })
            .collect()
    }

    /// Check every well against the deck, every assay destination for reuse,
    /// and that tip usage equals the budget exactly.
    pub fn verify(&self, layout: &DeckLayout) -> QpcrResult<()> {
        let mut claimed: HashMap<WellRef, String> = HashMap::new();
        for step in self.transfers() {
            let phase = step.stage.phase();
            check_in_bounds(layout, phase, step.source)?;
            let destinations = check_in_bounds(layout, phase, step.destination)?;

            if matches!(
                step.stage.group(),
                StageGroup::SampleDistribution | StageGroup::StandardsDistribution
            ) {
                for well in destinations {
                    if let Some(first) = claimed.insert(well, step.to_string()) {
                        return Err(MappingConflictError::DuplicateDestination {
                            well,
                            first,
                            second: step.to_string(),
                        }
                        .into());
                    }
                }
            }
        }

        for usage in self.tip_usage() {
            let budgeted = budget_for(&self.tip_budgets, usage.phase, usage.pipette)
                .map(|b| b.tips_required)
                .unwrap_or(0);
            if usage.tips > budgeted {
                tracing::error!(
                    phase = %usage.phase,
                    pipette = %usage.pipette,
                    used = usage.tips,
                    budgeted,
                    "Tip usage exceeds budget"
                );
                return Err(ResourceExhaustedError::TipOverrun {
                    phase: usage.phase,
                    pipette: usage.pipette,
                    used: usage.tips,
                    budgeted,
                }
                .into());
            }
            if usage.tips < budgeted {
                tracing::error!(
                    phase = %usage.phase,
                    pipette = %usage.pipette,
                    used = usage.tips,
                    budgeted,
                    "Tip usage below budget"
                );
                return Err(MappingConflictError::TipReuse {
                    phase: usage.phase,
                    pipette: usage.pipette,
                    used: usage.tips,
                    budgeted,
                }
                .into());
            }
        }

        tracing::debug!(fingerprint = %self.fingerprint, "Transfer plan verified");
        Ok(())
    }
}

/// Physical wells an 8-channel head touches at `head`, if all are on the plate.
fn check_in_bounds(layout: &DeckLayout, phase: Phase, head: WellRef) -> QpcrResult<Vec<WellRef>> {
    let geometry = layout
        .geometry(phase, head.plate)
        .ok_or(ConfigurationError::MissingPlate {
            phase,
            role: head.plate,
        })?;
    head.channel_wells(&geometry).ok_or_else(|| {
        MappingConflictError::OutOfBounds {
            well: head,
            geometry,
        }
        .into()
    })
}

/// Hex SHA-256 of the canonical JSON encoding of `events`.
pub fn fingerprint(events: &[PlanEvent]) -> Result<String, ConfigurationError> {
    let bytes = serde_json::to_vec(events).map_err(|e| ConfigurationError::Encode {
        format: "JSON".to_string(),
        reason: e.to_string(),
    })?;
    Ok(content_hash_hex(&compute_content_hash(&bytes)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use qpcr_core::{PlateRole, QpcrError};

    fn reference_plan() -> TransferPlan {
        let config = StageConfiguration::for_samples(9).unwrap();
        TransferPlan::generate(&config, &DeckLayout::standard()).unwrap()
    }

    #[test]
    fn test_reference_plan_verifies() {
        let plan = reference_plan();
        assert_eq!(plan.column_count, 2);
        assert!(plan.verify(&DeckLayout::standard()).is_ok());
        assert_eq!(plan.fingerprint.len(), 64);
    }

    #[test]
    fn test_tip_usage_matches_budget() {
        let plan = reference_plan();
        for usage in plan.tip_usage() {
            let budget = budget_for(&plan.tip_budgets, usage.phase, usage.pipette).unwrap();
            assert_eq!(usage.tips, budget.tips_required, "{:?}", usage);
        }
    }

    #[test]
    fn test_duplicate_assay_destination_detected() {
        let mut plan = reference_plan();
        let target = plan.stage_steps(Stage::SampleToAssay)[0].destination;
        for event in plan.events.iter_mut() {
            if let PlanEvent::Transfer(step) = event {
                if step.stage == Stage::StandardsToAssay {
                    step.destination = target;
                    break;
                }
            }
        }
        assert!(matches!(
            plan.verify(&DeckLayout::standard()),
            Err(QpcrError::MappingConflict(
                MappingConflictError::DuplicateDestination { .. }
            ))
        ));
    }

    #[test]
    fn test_out_of_bounds_step_detected() {
        let mut plan = reference_plan();
        if let Some(PlanEvent::Transfer(step)) = plan.events.first_mut() {
            step.destination = WellRef::column_head(PlateRole::Dilution1, 12);
        }
        assert!(matches!(
            plan.verify(&DeckLayout::standard()),
            Err(QpcrError::MappingConflict(MappingConflictError::OutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_tip_overrun_detected() {
        let mut plan = reference_plan();
        for event in plan.events.iter_mut() {
            if let PlanEvent::Transfer(step) = event {
                step.tip.pick_up_new = true;
            }
        }
        assert!(matches!(
            plan.verify(&DeckLayout::standard()),
            Err(QpcrError::ResourceExhausted(ResourceExhaustedError::TipOverrun {
                phase: Phase::Dilution,
                pipette: Pipette::P300Multi,
                ..
            }))
        ));
    }

    #[test]
    fn test_tip_reuse_detected() {
        let mut plan = reference_plan();
        let reused = plan
            .events
            .iter_mut()
            .filter_map(|e| match e {
                PlanEvent::Transfer(step) if step.stage == Stage::SampleToAssay => Some(step),
                _ => None,
            })
            .nth(1);
        if let Some(step) = reused {
            step.tip.pick_up_new = false;
        }
        assert!(matches!(
            plan.verify(&DeckLayout::standard()),
            Err(QpcrError::MappingConflict(MappingConflictError::TipReuse {
                phase: Phase::AssaySetup,
                pipette: Pipette::P20Multi,
                used: 232,
                budgeted: 240,
            }))
        ));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let plan = reference_plan();
        assert_eq!(fingerprint(&plan.events).unwrap(), plan.fingerprint);
        let other = TransferPlan::generate(
            &StageConfiguration::for_samples(17).unwrap(),
            &DeckLayout::standard(),
        )
        .unwrap();
        assert_ne!(other.fingerprint, plan.fingerprint);
    }
}
