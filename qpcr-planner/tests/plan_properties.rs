//! Property tests over arbitrary plannable runs

use proptest::prelude::*;
use qpcr_core::{DeckLayout, Phase, Pipette, PlateGeometry, QpcrError, StageGroup};
use qpcr_layout::{column_count, QuadrantMapper};
use qpcr_planner::{tips, TransferPlan};
use qpcr_test_utils::generators::{
    arb_dilution_series, arb_plannable_parameters, arb_plannable_sample_count, arb_replicate,
    arb_sample_count, arb_stage,
};
use qpcr_test_utils::fixtures::{config_for, reference_plan, standard_layout};
use std::collections::HashSet;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_generation_is_deterministic(params in arb_plannable_parameters()) {
        let config = params.validate().unwrap();
        let layout = DeckLayout::standard();
        let first = TransferPlan::generate(&config, &layout).unwrap();
        let second = TransferPlan::generate(&config, &layout).unwrap();
        prop_assert_eq!(
            serde_json::to_vec(&first.events).unwrap(),
            serde_json::to_vec(&second.events).unwrap()
        );
        prop_assert_eq!(&first.fingerprint, &second.fingerprint);
    }

    #[test]
    fn prop_plans_verify_and_conserve_tips(params in arb_plannable_parameters()) {
        let config = params.validate().unwrap();
        let layout = standard_layout();
        let plan = TransferPlan::generate(&config, &layout).unwrap();
        prop_assert!(plan.verify(&layout).is_ok());
        for usage in plan.tip_usage() {
            let budget = tips::budget_for(&plan.tip_budgets, usage.phase, usage.pipette).unwrap();
            prop_assert_eq!(usage.tips, budget.tips_required);
        }
    }

    #[test]
    fn prop_steps_are_physically_sane(params in arb_plannable_parameters()) {
        let config = params.validate().unwrap();
        let plan = TransferPlan::generate(&config, &standard_layout()).unwrap();
        for step in plan.transfers() {
            prop_assert!(step.volume.is_positive());
            prop_assert!(step.volume <= step.pipette.max_volume());
            prop_assert!(step.aspirate_height.is_positive());
            prop_assert!(step.dispense_height.is_positive());
            prop_assert!(step.blow_out_height.is_positive());
        }
    }

    #[test]
    fn prop_assay_destinations_never_repeat(samples in arb_plannable_sample_count()) {
        let plan = TransferPlan::generate(&config_for(samples), &standard_layout()).unwrap();
        let mut seen = HashSet::new();
        for step in plan.transfers() {
            if matches!(
                step.stage.group(),
                StageGroup::SampleDistribution | StageGroup::StandardsDistribution
            ) {
                prop_assert!(seen.insert(step.destination), "{} reused", step.destination);
            }
        }
        prop_assert_eq!(seen.len(), 6 * plan.column_count + 3);
    }

    #[test]
    fn prop_every_sample_count_plans_or_fails_up_front(samples in arb_sample_count()) {
        let columns = column_count(samples as usize);
        match TransferPlan::generate(&config_for(samples), &standard_layout()) {
            Ok(plan) => {
                prop_assert!(columns <= 6);
                prop_assert_eq!(plan.column_count, columns);
                let p300 = tips::budget_for(&plan.tip_budgets, Phase::Dilution, Pipette::P300Multi)
                    .unwrap();
                prop_assert_eq!(p300.tips_required, columns as i64 * 8 * 4);
            }
            Err(err) => {
                prop_assert!(columns > 6);
                prop_assert!(matches!(err, QpcrError::ResourceExhausted(_)), "{:?}", err);
            }
        }
    }

    #[test]
    fn prop_stage_steps_use_their_stage_pipette(stage in arb_stage()) {
        let plan = reference_plan();
        let steps = plan.stage_steps(stage);
        prop_assert!(!steps.is_empty());
        for step in steps {
            prop_assert_eq!(step.pipette, stage.pipette());
            prop_assert_eq!(step.stage.phase(), stage.phase());
        }
    }

    #[test]
    fn prop_mapped_wells_match_placements(
        c in 1usize..=6,
        column_seed in 0usize..6,
        replicate in arb_replicate(),
        series in arb_dilution_series(),
    ) {
        let column = column_seed % c;
        let mapper = QuadrantMapper::new(c).unwrap();
        let well = mapper.well_for(column, replicate, series).unwrap();
        prop_assert!(PlateGeometry::WELLS_384.contains(well.row, well.column));
        let placement = mapper
            .placements()
            .into_iter()
            .find(|p| p.column == column && p.replicate == replicate && p.series == series)
            .unwrap();
        prop_assert_eq!(placement.well, well);
    }
}
