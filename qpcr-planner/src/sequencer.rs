//! Transfer Sequencer
//!
//! Walks the stages in run order and turns each into transfer steps,
//! drawing clearances from per-well ledgers and volumes from the corrector.
//! Pauses and temperature changes are inserted at stage boundaries. Nothing
//! here moves liquid.

use crate::height::{HeightLedger, HeightProfile};
use crate::reagents::{buffer_well, master_mix_well, standards_well};
use crate::stages::{self, recipe};
use crate::volume::{CorrectedVolume, VolumeCorrector};
use qpcr_core::{
    ConfigurationError, DilutionSeries, LiquidLevelUnderflowError, Millimetres, OperatorPrompt,
    PlanEvent, PlateRole, QpcrResult, Replicate, Stage, StageConfiguration, TipHandling,
    TransferStep, WellRef, SETTLE_DELAY_SECONDS, TOUCH_TIP_OFFSET,
};
use qpcr_layout::{GeometryResolver, QuadrantMapper};

/// One source-to-destination move before stage parameters are applied.
#[derive(Debug, Clone, Copy)]
struct Leg {
    source: WellRef,
    destination: WellRef,
    volume: CorrectedVolume,
    aspirate_height: Millimetres,
    /// Sub-transfer index within a split fill
    split: usize,
    tip: TipHandling,
}

impl Leg {
    fn single(
        source: WellRef,
        destination: WellRef,
        volume: CorrectedVolume,
        aspirate_height: Millimetres,
    ) -> Self {
        Self {
            source,
            destination,
            volume,
            aspirate_height,
            split: 0,
            tip: TipHandling::SINGLE_USE,
        }
    }
}

/// Events emitted after `stage` completes.
pub fn boundary_events(stage: Stage, set_temperature: f64) -> Vec<PlanEvent> {
    let pause = |message: &str| PlanEvent::Pause(OperatorPrompt::new(stage, message));
    match stage {
        Stage::SampleToDilution1 => vec![
            PlanEvent::SetTemperature {
                celsius: set_temperature,
            },
            pause("Seal, vortex and centrifuge the 1:500 dilution plate, return it to the deck and resume."),
        ],
        Stage::Dilution1ToDilution2 => vec![pause(
            "Seal, vortex and centrifuge the 1:10k dilution plate, return it to the deck and resume.",
        )],
        Stage::Dilution2ToDilution3 => vec![
            pause("Seal and vortex the 1:20k dilution plate, then store all dilution plates on ice."),
            pause(
                "Load the assay deck: 384-well plate, 1:10k and 1:20k plates, reagent plate on the \
                 temperature module and 20 uL tips. Resume when ready.",
            ),
            PlanEvent::SetTemperature {
                celsius: set_temperature,
            },
        ],
        Stage::MasterMixToStandards => vec![pause(
            "Seal and centrifuge the assay plate, return it to the deck and resume.",
        )],
        Stage::StandardsToAssay => vec![PlanEvent::DeactivateTemperature],
        _ => Vec::new(),
    }
}

/// Replay every draining well's draws against its profile before anything
/// is sequenced, so an underflow halts planning with no events built.
pub fn check_ledgers(
    config: &StageConfiguration,
    column_count: usize,
) -> Result<(), LiquidLevelUnderflowError> {
    let splits = stages::buffer_splits(config.dilution_volumes()[0]);
    let mut ledgers: Vec<(Stage, WellRef, HeightProfile, usize)> = vec![
        (
            Stage::BufferToDilution1,
            buffer_well(),
            stages::reservoir_dilution_1(column_count),
            column_count * splits,
        ),
        (
            Stage::BufferToDilution2,
            buffer_well(),
            stages::reservoir_dilution_2(column_count),
            column_count,
        ),
    ];
    for series in DilutionSeries::ALL {
        ledgers.push((
            Stage::MasterMixToAssay,
            master_mix_well(series),
            stages::master_mix(series, column_count),
            Replicate::ALL.len() * column_count,
        ));
        // Every diluted-sample well shares one profile.
        ledgers.push((
            Stage::SampleToAssay,
            WellRef::column_head(series.source_plate(), 0),
            stages::diluted_sample(series),
            Replicate::ALL.len(),
        ));
    }

    for (stage, well, profile, draws) in ledgers {
        HeightLedger::open(stage, well, profile).draw_many(draws)?;
    }
    Ok(())
}

pub struct TransferSequencer<'a> {
    config: &'a StageConfiguration,
    resolver: GeometryResolver,
    mapper: QuadrantMapper,
    corrector: VolumeCorrector,
    events: Vec<PlanEvent>,
    transfers: usize,
}

impl<'a> TransferSequencer<'a> {
    pub fn new(
        config: &'a StageConfiguration,
        resolver: GeometryResolver,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            config,
            resolver,
            mapper: QuadrantMapper::new(resolver.column_count())?,
            corrector: VolumeCorrector::new(*config.corrections()),
            events: Vec::new(),
            transfers: 0,
        })
    }

    /// Ordered plan for the whole run.
    pub fn sequence(mut self) -> QpcrResult<Vec<PlanEvent>> {
        for stage in Stage::ALL {
            let before = self.transfers;
            match stage {
                Stage::BufferToDilution1 => self.buffer_to_dilution_1()?,
                Stage::BufferToDilution2 => self.buffer_to_dilution_2()?,
                Stage::BufferToDilution3 => self.buffer_to_dilution_3()?,
                Stage::SampleToDilution1 => self.sample_to_dilution_1()?,
                Stage::Dilution1ToDilution2 => self.serial_transfer(
                    stage,
                    PlateRole::Dilution1,
                    PlateRole::Dilution2,
                    stages::DILUTION_1_ASPIRATE_HEIGHT,
                    1,
                )?,
                Stage::Dilution2ToDilution3 => self.serial_transfer(
                    stage,
                    PlateRole::Dilution2,
                    PlateRole::Dilution3,
                    stages::DILUTION_2_ASPIRATE_HEIGHT,
                    2,
                )?,
                Stage::MasterMixToAssay => self.master_mix_to_assay()?,
                Stage::MasterMixToStandards => self.master_mix_to_standards()?,
                Stage::SampleToAssay => self.sample_to_assay()?,
                Stage::StandardsToAssay => self.standards_to_assay()?,
            }
            tracing::debug!(
                stage = %stage,
                transfers = self.transfers - before,
                "Stage sequenced"
            );
            self.events
                .extend(boundary_events(stage, self.config.set_temperature()));
        }
        Ok(self.events)
    }

    fn push(&mut self, stage: Stage, leg: Leg) {
        let recipe = recipe(stage);
        let step = TransferStep {
            index: self.transfers,
            stage,
            pipette: stage.pipette(),
            source: leg.source,
            destination: leg.destination,
            volume: leg.volume.commanded,
            nominal_volume: leg.volume.nominal,
            aspirate_height: leg.aspirate_height,
            dispense_height: recipe.dispense_height(leg.split),
            flow_rates: recipe.flow_rates,
            mix: recipe.mix_spec(leg.volume.commanded, leg.aspirate_height),
            blow_out_height: recipe.blow_out_height(leg.split),
            settle_delay_seconds: SETTLE_DELAY_SECONDS,
            touch_tip_offset: TOUCH_TIP_OFFSET,
            tip: leg.tip,
        };
        self.transfers += 1;
        self.events.push(PlanEvent::Transfer(step));
    }

    // ========================================================================
    // BUFFER DILUTION
    // ========================================================================

    /// The 1:500 fill exceeds one p300 tip, so each column takes several
    /// sub-transfers with one tip, dispensing higher as the well fills.
    fn buffer_to_dilution_1(&mut self) -> QpcrResult<()> {
        let stage = Stage::BufferToDilution1;
        let total = self.config.dilution_volumes()[0];
        let splits = stages::buffer_splits(total);
        let volume = self
            .corrector
            .correct(stage, total.divided_by(splits as i64))?;
        let mut ledger = HeightLedger::open(
            stage,
            buffer_well(),
            stages::reservoir_dilution_1(self.resolver.column_count()),
        );
        for column in self.resolver.columns() {
            for split in 0..splits {
                let aspirate_height = ledger.draw()?;
                self.push(
                    stage,
                    Leg {
                        source: buffer_well(),
                        destination: WellRef::column_head(PlateRole::Dilution1, column),
                        volume,
                        aspirate_height,
                        split,
                        tip: TipHandling {
                            pick_up_new: split == 0,
                            drop_after: split + 1 == splits,
                        },
                    },
                );
            }
        }
        Ok(())
    }

    fn buffer_to_dilution_2(&mut self) -> QpcrResult<()> {
        let stage = Stage::BufferToDilution2;
        let volume = self
            .corrector
            .correct(stage, self.config.dilution_volumes()[1])?;
        let mut ledger = HeightLedger::open(
            stage,
            buffer_well(),
            stages::reservoir_dilution_2(self.resolver.column_count()),
        );
        for column in self.resolver.columns() {
            let aspirate_height = ledger.draw()?;
            let destination = WellRef::column_head(PlateRole::Dilution2, column);
            self.push(
                stage,
                Leg::single(buffer_well(), destination, volume, aspirate_height),
            );
        }
        Ok(())
    }

    fn buffer_to_dilution_3(&mut self) -> QpcrResult<()> {
        let stage = Stage::BufferToDilution3;
        let volume = self
            .corrector
            .correct(stage, self.config.dilution_volumes()[2])?;
        for column in self.resolver.columns() {
            let destination = WellRef::column_head(PlateRole::Dilution3, column);
            self.push(
                stage,
                Leg::single(
                    buffer_well(),
                    destination,
                    volume,
                    stages::RESERVOIR_DILUTION_3_HEIGHT,
                ),
            );
        }
        Ok(())
    }

    // ========================================================================
    // SERIAL TRANSFER
    // ========================================================================

    fn sample_to_dilution_1(&mut self) -> QpcrResult<()> {
        let stage = Stage::SampleToDilution1;
        let aspirate_height =
            stages::starting_aspirate_height(self.config.starting_sample_volume())?;
        let volume = self
            .corrector
            .correct(stage, self.config.transfer_volumes()[0])?;
        for column in self.resolver.columns() {
            self.push(
                stage,
                Leg::single(
                    WellRef::column_head(PlateRole::SamplePlate, column),
                    WellRef::column_head(PlateRole::Dilution1, column),
                    volume,
                    aspirate_height,
                ),
            );
        }
        Ok(())
    }

    fn serial_transfer(
        &mut self,
        stage: Stage,
        from: PlateRole,
        to: PlateRole,
        aspirate_height: Millimetres,
        transfer: usize,
    ) -> QpcrResult<()> {
        let volume = self
            .corrector
            .correct(stage, self.config.transfer_volumes()[transfer])?;
        for column in self.resolver.columns() {
            self.push(
                stage,
                Leg::single(
                    WellRef::column_head(from, column),
                    WellRef::column_head(to, column),
                    volume,
                    aspirate_height,
                ),
            );
        }
        Ok(())
    }

    // ========================================================================
    // ASSAY SETUP
    // ========================================================================

    /// Each series' master-mix column drains across all three replicates.
    fn master_mix_to_assay(&mut self) -> QpcrResult<()> {
        let stage = Stage::MasterMixToAssay;
        let volume = self
            .corrector
            .correct(stage, self.config.master_mix_volume())?;
        for series in DilutionSeries::ALL {
            let source = master_mix_well(series);
            let mut ledger = HeightLedger::open(
                stage,
                source,
                stages::master_mix(series, self.resolver.column_count()),
            );
            for replicate in Replicate::ALL {
                for column in self.resolver.columns() {
                    let aspirate_height = ledger.draw()?;
                    let destination = self.mapper.well_for(column, replicate, series)?;
                    self.push(
                        stage,
                        Leg::single(source, destination, volume, aspirate_height),
                    );
                }
            }
        }
        Ok(())
    }

    fn master_mix_to_standards(&mut self) -> QpcrResult<()> {
        let stage = Stage::MasterMixToStandards;
        let volume = self
            .corrector
            .correct(stage, self.config.master_mix_volume())?;
        let source = master_mix_well(DilutionSeries::TwentyThousand);
        for destination in self.mapper.standards_wells() {
            self.push(
                stage,
                Leg::single(
                    source,
                    destination,
                    volume,
                    stages::MASTER_MIX_FOR_STANDARDS_HEIGHT,
                ),
            );
        }
        Ok(())
    }

    /// Every diluted-sample well is drawn once per replicate from its own
    /// ledger.
    fn sample_to_assay(&mut self) -> QpcrResult<()> {
        let stage = Stage::SampleToAssay;
        let volume = self
            .corrector
            .correct(stage, self.config.assay_sample_volume())?;
        for series in DilutionSeries::ALL {
            let mut ledgers: Vec<HeightLedger> = self
                .resolver
                .columns()
                .map(|column| {
                    HeightLedger::open(
                        stage,
                        WellRef::column_head(series.source_plate(), column),
                        stages::diluted_sample(series),
                    )
                })
                .collect();
            for replicate in Replicate::ALL {
                for (column, ledger) in ledgers.iter_mut().enumerate() {
                    let aspirate_height = ledger.draw()?;
                    let source = ledger.well();
                    let destination = self.mapper.well_for(column, replicate, series)?;
                    self.push(
                        stage,
                        Leg::single(source, destination, volume, aspirate_height),
                    );
                }
            }
        }
        Ok(())
    }

    fn standards_to_assay(&mut self) -> QpcrResult<()> {
        let stage = Stage::StandardsToAssay;
        let volume = self
            .corrector
            .correct(stage, self.config.assay_sample_volume())?;
        for destination in self.mapper.standards_wells() {
            self.push(
                stage,
                Leg::single(
                    standards_well(),
                    destination,
                    volume,
                    stages::STANDARDS_ASPIRATE_HEIGHT,
                ),
            );
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use qpcr_core::{Microlitres, MixLocation, Pipette};

    fn plan(samples: i64) -> Vec<PlanEvent> {
        let config = StageConfiguration::for_samples(samples).unwrap();
        let resolver = GeometryResolver::from_config(&config);
        TransferSequencer::new(&config, resolver)
            .unwrap()
            .sequence()
            .unwrap()
    }

    fn steps(events: &[PlanEvent], stage: Stage) -> Vec<TransferStep> {
        events
            .iter()
            .filter_map(PlanEvent::as_transfer)
            .filter(|s| s.stage == stage)
            .cloned()
            .collect()
    }

    fn mm(hundredths: i64) -> Millimetres {
        Millimetres::from_hundredths(hundredths)
    }

    #[test]
    fn test_buffer_fill_heights_for_two_columns() {
        let events = plan(9);
        let fill = steps(&events, Stage::BufferToDilution1);
        assert_eq!(fill.len(), 8);
        let heights: Vec<Millimetres> = fill.iter().map(|s| s.aspirate_height).collect();
        let expected: Vec<Millimetres> = (2..=9).rev().map(|h| mm(h * 100)).collect();
        assert_eq!(heights, expected);
        for column in fill.chunks(4) {
            assert!(column.windows(2).all(|w| w[0].aspirate_height > w[1].aspirate_height));
            let dispense: Vec<Millimetres> = column.iter().map(|s| s.dispense_height).collect();
            assert_eq!(dispense, vec![mm(4_00), mm(8_00), mm(12_00), mm(16_00)]);
            assert!(column[0].tip.pick_up_new && !column[0].tip.drop_after);
            assert!(!column[3].tip.pick_up_new && column[3].tip.drop_after);
        }
        assert!(fill.iter().all(|s| s.volume == Microlitres::from_hundredths(248_70)));
        assert!(fill.iter().all(|s| s.pipette == Pipette::P300Multi));
    }

    #[test]
    fn test_source_mix_uses_aspirate_height() {
        let events = plan(9);
        for step in steps(&events, Stage::BufferToDilution2) {
            let mix = step.mix.unwrap();
            assert_eq!(mix.location, MixLocation::Source);
            assert_eq!(mix.height, step.aspirate_height);
            assert_eq!(mix.volume, step.volume);
        }
    }

    #[test]
    fn test_master_mix_ledger_spans_replicates() {
        let events = plan(9);
        let mm_steps = steps(&events, Stage::MasterMixToAssay);
        assert_eq!(mm_steps.len(), 12);
        let ten_k: Vec<Millimetres> = mm_steps[..6].iter().map(|s| s.aspirate_height).collect();
        assert_eq!(
            ten_k,
            vec![mm(4_60), mm(4_20), mm(3_80), mm(3_40), mm(3_00), mm(2_60)]
        );
        assert_eq!(mm_steps[6].aspirate_height, mm(5_00));
        assert_eq!(mm_steps[6].source.label(), "A2");
    }

    #[test]
    fn test_sample_to_assay_per_well_ledgers() {
        let events = plan(9);
        let sample_steps = steps(&events, Stage::SampleToAssay);
        assert_eq!(sample_steps.len(), 12);
        let first_well: Vec<Millimetres> = sample_steps
            .iter()
            .filter(|s| s.source == WellRef::column_head(PlateRole::Dilution2, 0))
            .map(|s| s.aspirate_height)
            .collect();
        assert_eq!(first_well, vec![mm(5_00), mm(4_60), mm(4_20)]);
        let twenty_k = sample_steps
            .iter()
            .find(|s| s.source.plate == PlateRole::Dilution3)
            .unwrap();
        assert_eq!(twenty_k.aspirate_height, mm(7_00));
        assert_eq!(twenty_k.destination.label(), "A13");
    }

    #[test]
    fn test_indices_are_sequential() {
        let events = plan(17);
        let indices: Vec<usize> = events
            .iter()
            .filter_map(PlanEvent::as_transfer)
            .map(|s| s.index)
            .collect();
        assert_eq!(indices, (0..indices.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_boundary_events_in_order() {
        let events = plan(9);
        let markers: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                PlanEvent::Transfer(_) => None,
                PlanEvent::Pause(_) => Some("pause"),
                PlanEvent::SetTemperature { .. } => Some("set"),
                PlanEvent::DeactivateTemperature => Some("off"),
            })
            .collect();
        assert_eq!(
            markers,
            vec!["set", "pause", "pause", "pause", "pause", "set", "pause", "off"]
        );
        assert!(matches!(events.last(), Some(PlanEvent::DeactivateTemperature)));
    }

    #[test]
    fn test_ledgers_fit_every_plannable_column_count() {
        for samples in [1, 8, 9, 24, 48] {
            let config = StageConfiguration::for_samples(samples).unwrap();
            let columns = GeometryResolver::from_config(&config).column_count();
            assert!(check_ledgers(&config, columns).is_ok(), "{} samples", samples);
        }
    }

    #[test]
    fn test_master_mix_ledger_underflows_at_seven_columns() {
        let config = StageConfiguration::for_samples(56).unwrap();
        let err = check_ledgers(&config, 7).unwrap_err();
        assert_eq!(err.stage, Stage::MasterMixToAssay);
        assert_eq!(err.well.label(), "A1");
        assert_eq!(err.draws_issued, 19);
    }

    #[test]
    fn test_seven_columns_exceed_layout() {
        let config = StageConfiguration::for_samples(56).unwrap();
        let resolver = GeometryResolver::from_config(&config);
        assert!(matches!(
            TransferSequencer::new(&config, resolver),
            Err(ConfigurationError::LayoutCapacityExceeded { .. })
        ));
    }
}
