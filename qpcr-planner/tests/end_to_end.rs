//! Reference run and driver interaction

use qpcr_core::{
    DeckLayout, DeckSlot, Millimetres, Phase, Pipette, PlanEvent, PlateRole, QpcrError, Stage,
};
use qpcr_planner::{tips, ProtocolRunner, RunOutcome, TransferPlan};
use qpcr_test_utils::assertions::{
    assert_configuration_error, assert_driver_error, assert_mapping_conflict,
    assert_resource_exhausted, assert_underflow,
};
use qpcr_test_utils::fixtures::{config_for, reference_config, reference_plan};
use qpcr_test_utils::{DriverCall, RecordingDriver};

#[test]
fn test_nine_samples_reference_scenario() {
    let plan = reference_plan();
    assert_eq!(plan.column_count, 2);

    let p300 = tips::budget_for(&plan.tip_budgets, Phase::Dilution, Pipette::P300Multi).unwrap();
    assert_eq!(p300.tips_required, 64);
    assert_eq!(p300.racks_required, 1);

    let fill = plan.stage_steps(Stage::BufferToDilution1);
    for column in 0..2 {
        let heights: Vec<Millimetres> = fill
            .iter()
            .filter(|s| s.destination.column == column)
            .map(|s| s.aspirate_height)
            .collect();
        assert_eq!(heights.len(), 4);
        assert!(heights.windows(2).all(|w| w[0] > w[1]));
    }

    let first_replicate: Vec<String> = plan
        .stage_steps(Stage::SampleToAssay)
        .iter()
        .filter(|s| s.source.plate == PlateRole::Dilution2)
        .take(2)
        .map(|s| s.destination.label())
        .collect();
    assert_eq!(first_replicate, vec!["A1", "A3"]);
}

#[test]
fn test_stage_order_is_fixed() {
    let plan = reference_plan();
    let mut seen: Vec<Stage> = Vec::new();
    for step in plan.transfers() {
        if seen.last() != Some(&step.stage) {
            seen.push(step.stage);
        }
    }
    assert_eq!(seen, Stage::ALL.to_vec());
}

#[test]
fn test_tip_conservation() {
    for samples in [1, 8, 9, 24, 41, 48] {
        let plan = qpcr_test_utils::fixtures::plan_for(samples);
        for usage in plan.tip_usage() {
            let budget = tips::budget_for(&plan.tip_budgets, usage.phase, usage.pipette).unwrap();
            assert_eq!(usage.tips, budget.tips_required, "{} samples, {:?}", samples, usage);
        }
    }
}

#[test]
fn test_full_run_records_every_event() {
    let runner = ProtocolRunner::new(reference_config());
    let mut driver = RecordingDriver::new();
    let report = runner.run(&mut driver).unwrap();

    let plan = reference_plan();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.transfers_executed, plan.transfer_count());
    assert_eq!(report.pauses_acknowledged, 5);
    assert_eq!(report.fingerprint, plan.fingerprint);
    assert!(report.finished_at >= report.started_at);
    assert_eq!(driver.calls().len(), plan.events.len());
    assert!(driver.notifications().is_empty());
    assert_eq!(driver.calls().last(), Some(&DriverCall::DeactivateTemperature));

    let executed: Vec<usize> = driver.executed_steps().iter().map(|s| s.index).collect();
    assert_eq!(executed, (0..plan.transfer_count()).collect::<Vec<_>>());
}

#[test]
fn test_cancellation_only_at_stage_boundary() {
    let runner = ProtocolRunner::new(reference_config());
    // Cancel is requested mid-stage 1; the stage still finishes.
    let mut driver = RecordingDriver::new().cancelling_after(3);
    let report = runner.run(&mut driver).unwrap();

    assert_eq!(
        report.outcome,
        RunOutcome::Cancelled {
            before_stage: Stage::BufferToDilution2
        }
    );
    assert_eq!(report.transfers_executed, 8);
    assert!(driver
        .executed_steps()
        .iter()
        .all(|s| s.stage == Stage::BufferToDilution1));
}

#[test]
fn test_cancel_at_phase_change_skips_boundary_events() {
    let runner = ProtocolRunner::new(reference_config());
    // 18 transfers is the whole dilution phase for nine samples.
    let mut driver = RecordingDriver::new().cancelling_after(18);
    let report = runner.run(&mut driver).unwrap();

    assert_eq!(
        report.outcome,
        RunOutcome::Cancelled {
            before_stage: Stage::MasterMixToAssay
        }
    );
    assert_eq!(report.transfers_executed, 18);
    assert_eq!(report.pauses_acknowledged, 2);
    match driver.calls().last() {
        Some(DriverCall::Execute(step)) => assert_eq!(step.stage, Stage::Dilution2ToDilution3),
        other => panic!("expected the last stage-6 transfer, got {:?}", other),
    }
    let temperature_changes = driver
        .calls()
        .iter()
        .filter(|c| matches!(c, DriverCall::SetTemperature(_)))
        .count();
    assert_eq!(temperature_changes, 1);
}

#[test]
fn test_driver_failure_halts_and_notifies() {
    let runner = ProtocolRunner::new(reference_config());
    let mut driver = RecordingDriver::new().failing_on_step(5);
    let result = runner.run(&mut driver);

    assert_driver_error(&result);
    assert_eq!(driver.executed_steps().len(), 5);
    let notes = driver.notifications();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].starts_with("Run halted by the robot"));
    assert!(notes[0].contains("step 5"));
}

#[test]
fn test_tip_shortfall_raised_before_any_movement() {
    let runner = ProtocolRunner::new(config_for(56));
    let mut driver = RecordingDriver::new();
    let result = runner.run(&mut driver);

    assert_resource_exhausted(&result);
    assert!(driver.executed_steps().is_empty());
    assert_eq!(driver.notifications().len(), 1);
}

#[test]
fn test_driver_deck_mismatch_is_configuration_error() {
    let mut layout = DeckLayout::standard();
    layout.phases[1]
        .labware
        .retain(|l| l.role != PlateRole::ReagentPlate);
    let runner = ProtocolRunner::new(reference_config());
    let mut driver = RecordingDriver::new().with_layout(layout);
    let result = runner.run(&mut driver);

    assert_configuration_error(&result);
    assert!(driver.notifications()[0].starts_with("Run halted before any liquid was moved"));
}

#[test]
fn test_master_mix_underflow_halts_before_any_movement() {
    // Enough tip slots for seven columns, so the master-mix well is the
    // first resource to run short.
    let mut layout = DeckLayout::standard();
    for deck in &mut layout.phases {
        for racks in &mut deck.tip_racks {
            racks.slots = (1..=11).map(|n| DeckSlot::new(n).unwrap()).collect();
        }
    }
    let runner = ProtocolRunner::new(config_for(56));
    let mut driver = RecordingDriver::new().with_layout(layout);
    let result = runner.run(&mut driver);

    assert_underflow(&result);
    assert!(driver.executed_steps().is_empty());
    let notes = driver.notifications();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].contains("master_mix_to_assay"));
}

#[test]
fn test_tip_reuse_is_a_plan_defect() {
    let mut plan = reference_plan();
    if let Some(PlanEvent::Transfer(step)) = plan
        .events
        .iter_mut()
        .find(|e| matches!(e, PlanEvent::Transfer(s) if s.stage == Stage::BufferToDilution2))
    {
        step.tip.pick_up_new = false;
    }
    assert_mapping_conflict(&plan.verify(&DeckLayout::standard()));
}

#[test]
fn test_reduced_tip_slots_exhaust() {
    let mut layout = DeckLayout::standard();
    for deck in &mut layout.phases {
        for racks in &mut deck.tip_racks {
            racks.slots.truncate(1);
        }
    }
    let result = TransferPlan::generate(&config_for(24), &layout);
    assert!(matches!(result, Err(QpcrError::ResourceExhausted(_))));
}

#[test]
fn test_pause_prompts_follow_their_stage() {
    let plan = reference_plan();
    let mut last_stage = None;
    for event in &plan.events {
        match event {
            PlanEvent::Transfer(step) => last_stage = Some(step.stage),
            PlanEvent::Pause(prompt) => assert_eq!(Some(prompt.after_stage), last_stage),
            _ => {}
        }
    }
}
