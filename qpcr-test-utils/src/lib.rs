//! qPCR Test Utilities
//!
//! Shared test infrastructure for the planner workspace:
//! - A recording mock of the liquid-handling driver
//! - Proptest generators for run parameters and layout enums
//! - Fixtures for the reference run
//! - Assertions on the error taxonomy

pub use qpcr_core::{
    DeckLayout, DilutionSeries, DriverError, Microlitres, OperatorPrompt, PlanEvent, QpcrError,
    QpcrResult, Replicate, RunParameters, Stage, StageConfiguration, TransferStep,
};
pub use qpcr_planner::{LiquidHandler, TransferPlan};

// ============================================================================
// MOCK DRIVER
// ============================================================================

/// One call the runner made into the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Execute(TransferStep),
    Pause(OperatorPrompt),
    SetTemperature(f64),
    DeactivateTemperature,
    Notify(String),
}

/// Driver that performs nothing and records every call in order.
#[derive(Debug, Clone)]
pub struct RecordingDriver {
    layout: DeckLayout,
    calls: Vec<DriverCall>,
    transfers: usize,
    fail_on_step: Option<usize>,
    cancel_after_transfers: Option<usize>,
}

impl Default for RecordingDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self {
            layout: DeckLayout::standard(),
            calls: Vec::new(),
            transfers: 0,
            fail_on_step: None,
            cancel_after_transfers: None,
        }
    }

    pub fn with_layout(mut self, layout: DeckLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Fail the transfer whose plan index is `index`.
    pub fn failing_on_step(mut self, index: usize) -> Self {
        self.fail_on_step = Some(index);
        self
    }

    /// Report a cancel request once `transfers` steps have run.
    pub fn cancelling_after(mut self, transfers: usize) -> Self {
        self.cancel_after_transfers = Some(transfers);
        self
    }

    pub fn calls(&self) -> &[DriverCall] {
        &self.calls
    }

    pub fn executed_steps(&self) -> Vec<&TransferStep> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DriverCall::Execute(step) => Some(step),
                _ => None,
            })
            .collect()
    }

    pub fn notifications(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DriverCall::Notify(message) => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl LiquidHandler for RecordingDriver {
    fn deck_layout(&self) -> DeckLayout {
        self.layout.clone()
    }

    fn execute(&mut self, step: &TransferStep) -> Result<(), DriverError> {
        if self.fail_on_step == Some(step.index) {
            return Err(DriverError::new(format!("tip not detected on step {}", step.index)));
        }
        self.calls.push(DriverCall::Execute(step.clone()));
        self.transfers += 1;
        Ok(())
    }

    fn pause(&mut self, prompt: &OperatorPrompt) -> Result<(), DriverError> {
        self.calls.push(DriverCall::Pause(prompt.clone()));
        Ok(())
    }

    fn set_temperature(&mut self, celsius: f64) -> Result<(), DriverError> {
        self.calls.push(DriverCall::SetTemperature(celsius));
        Ok(())
    }

    fn deactivate_temperature(&mut self) -> Result<(), DriverError> {
        self.calls.push(DriverCall::DeactivateTemperature);
        Ok(())
    }

    fn notify_operator(&mut self, message: &str) {
        self.calls.push(DriverCall::Notify(message.to_string()));
    }

    fn cancel_requested(&self) -> bool {
        self.cancel_after_transfers
            .is_some_and(|limit| self.transfers >= limit)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for run parameters and layout enums.

    use super::*;
    use proptest::prelude::*;

    /// Any sample count the configuration accepts.
    pub fn arb_sample_count() -> impl Strategy<Value = i64> {
        1i64..=96
    }

    /// Sample counts that fit the assay-plate layout (at most six columns).
    pub fn arb_plannable_sample_count() -> impl Strategy<Value = i64> {
        1i64..=48
    }

    pub fn arb_dilution_series() -> impl Strategy<Value = DilutionSeries> {
        prop_oneof![
            Just(DilutionSeries::TenThousand),
            Just(DilutionSeries::TwentyThousand),
        ]
    }

    pub fn arb_replicate() -> impl Strategy<Value = Replicate> {
        prop_oneof![
            Just(Replicate::First),
            Just(Replicate::Second),
            Just(Replicate::Third),
        ]
    }

    pub fn arb_stage() -> impl Strategy<Value = Stage> {
        prop::sample::select(Stage::ALL.to_vec())
    }

    fn arb_volume(min_hundredths: i64, max_hundredths: i64) -> impl Strategy<Value = Microlitres> {
        (min_hundredths..=max_hundredths).prop_map(Microlitres::from_hundredths)
    }

    /// Parameters that validate and plan: volumes stay within tip, well and
    /// trough capacity at six columns, and above every correction offset.
    pub fn arb_plannable_parameters() -> impl Strategy<Value = RunParameters> {
        (
            arb_plannable_sample_count(),
            arb_volume(100_00, 1000_00),
            arb_volume(10_00, 200_00),
            arb_volume(10_00, 200_00),
            arb_volume(1_00, 20_00),
            arb_volume(1_00, 20_00),
            arb_volume(10_00, 300_00),
            arb_volume(1_00, 8_00),
            arb_volume(1_00, 10_00),
            4i64..=95,
        )
            .prop_map(
                |(
                    sample_number,
                    dilution_volume_1,
                    dilution_volume_2,
                    dilution_volume_3,
                    sample_volume_1,
                    sample_volume_2,
                    sample_volume_3,
                    master_mix_volume,
                    assay_sample_volume,
                    temperature,
                )| RunParameters {
                    sample_number,
                    dilution_volume_1,
                    dilution_volume_2,
                    dilution_volume_3,
                    sample_volume_1,
                    sample_volume_2,
                    sample_volume_3,
                    master_mix_volume,
                    assay_sample_volume,
                    set_temperature: temperature as f64,
                    ..RunParameters::default()
                },
            )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! The reference run: nine samples, default volumes, standard deck.

    use super::*;

    pub fn reference_parameters() -> RunParameters {
        RunParameters::default()
    }

    pub fn reference_config() -> StageConfiguration {
        config_for(9)
    }

    /// Reference volumes with a different sample count.
    pub fn config_for(samples: i64) -> StageConfiguration {
        StageConfiguration::for_samples(samples).expect("sample count in range")
    }

    pub fn standard_layout() -> DeckLayout {
        DeckLayout::standard()
    }

    pub fn plan_for(samples: i64) -> TransferPlan {
        TransferPlan::generate(&config_for(samples), &standard_layout()).expect("plannable run")
    }

    pub fn reference_plan() -> TransferPlan {
        plan_for(9)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on the error taxonomy.

    use super::*;

    #[track_caller]
    pub fn assert_configuration_error<T: std::fmt::Debug>(result: &QpcrResult<T>) {
        match result {
            Err(QpcrError::Configuration(_)) => {}
            other => panic!("Expected Configuration error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_resource_exhausted<T: std::fmt::Debug>(result: &QpcrResult<T>) {
        match result {
            Err(QpcrError::ResourceExhausted(_)) => {}
            other => panic!("Expected ResourceExhausted error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_underflow<T: std::fmt::Debug>(result: &QpcrResult<T>) {
        match result {
            Err(QpcrError::LiquidLevelUnderflow(_)) => {}
            other => panic!("Expected LiquidLevelUnderflow error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_mapping_conflict<T: std::fmt::Debug>(result: &QpcrResult<T>) {
        match result {
            Err(QpcrError::MappingConflict(_)) => {}
            other => panic!("Expected MappingConflict error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_driver_error<T: std::fmt::Debug>(result: &QpcrResult<T>) {
        match result {
            Err(QpcrError::Driver(_)) => {}
            other => panic!("Expected Driver error, got: {:?}", other),
        }
    }
}
