//! Per-stage liquid-handling parameters
//!
//! Flow rates, dispense and blow-out clearances, mixing, and the clearance
//! profiles of every draining source well. Values are those tuned on the
//! reference deck and are carried into steps unchanged.

use crate::height::HeightProfile;
use qpcr_core::{
    ConfigurationError, DilutionSeries, FlowRates, Microlitres, Millimetres, MixLocation, MixSpec,
    Stage, SUPPORTED_STARTING_SAMPLE_VOLUME,
};

const fn ul(hundredths: i64) -> Microlitres {
    Microlitres::from_hundredths(hundredths)
}

const fn mm(hundredths: i64) -> Millimetres {
    Millimetres::from_hundredths(hundredths)
}

// ============================================================================
// STAGE RECIPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispenseHeight {
    Fixed(Millimetres),
    /// Sub-transfer `k` (0-based) dispenses at `(k + 1) * step`, following
    /// the rising fill of a deep well.
    Tiered(Millimetres),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlowOutHeight {
    Fixed(Millimetres),
    AboveDispense(Millimetres),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixHeight {
    /// Mix at the clearance the step aspirates from
    Aspirate,
    Fixed(Millimetres),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixRecipe {
    pub repetitions: u32,
    pub location: MixLocation,
    pub height: MixHeight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRecipe {
    pub stage: Stage,
    pub flow_rates: FlowRates,
    pub dispense: DispenseHeight,
    pub blow_out: BlowOutHeight,
    pub mix: Option<MixRecipe>,
}

impl StageRecipe {
    pub fn dispense_height(&self, split: usize) -> Millimetres {
        match self.dispense {
            DispenseHeight::Fixed(h) => h,
            DispenseHeight::Tiered(step) => step.times(split as i64 + 1),
        }
    }

    pub fn blow_out_height(&self, split: usize) -> Millimetres {
        match self.blow_out {
            BlowOutHeight::Fixed(h) => h,
            BlowOutHeight::AboveDispense(offset) => self.dispense_height(split) + offset,
        }
    }

    /// Mix of the commanded volume, if this stage mixes at all.
    pub fn mix_spec(&self, volume: Microlitres, aspirate_height: Millimetres) -> Option<MixSpec> {
        self.mix.map(|m| MixSpec {
            repetitions: m.repetitions,
            volume,
            location: m.location,
            height: match m.height {
                MixHeight::Aspirate => aspirate_height,
                MixHeight::Fixed(h) => h,
            },
        })
    }
}

const fn mix(repetitions: u32, location: MixLocation, height: MixHeight) -> Option<MixRecipe> {
    Some(MixRecipe {
        repetitions,
        location,
        height,
    })
}

pub fn recipe(stage: Stage) -> StageRecipe {
    let (flow_rates, dispense, blow_out, mix) = match stage {
        Stage::BufferToDilution1 => (
            FlowRates::new(ul(94_00), ul(22_50), ul(299_00)),
            DispenseHeight::Tiered(mm(4_00)),
            BlowOutHeight::AboveDispense(mm(50)),
            mix(1, MixLocation::Source, MixHeight::Aspirate),
        ),
        Stage::BufferToDilution2 => (
            FlowRates::new(ul(35_00), ul(95_00), ul(299_00)),
            DispenseHeight::Fixed(mm(10_00)),
            BlowOutHeight::Fixed(mm(9_50)),
            mix(1, MixLocation::Source, MixHeight::Aspirate),
        ),
        Stage::BufferToDilution3 => (
            FlowRates::new(ul(35_00), ul(95_00), ul(299_00)),
            DispenseHeight::Fixed(mm(8_00)),
            BlowOutHeight::Fixed(mm(4_00)),
            mix(1, MixLocation::Source, MixHeight::Aspirate),
        ),
        Stage::SampleToDilution1 => (
            FlowRates::new(ul(2_00), ul(2_00), ul(20_00)),
            DispenseHeight::Fixed(mm(16_50)),
            BlowOutHeight::Fixed(mm(17_00)),
            mix(1, MixLocation::Destination, MixHeight::Fixed(mm(16_50))),
        ),
        Stage::Dilution1ToDilution2 => (
            FlowRates::new(ul(5_00), ul(5_00), ul(20_00)),
            DispenseHeight::Fixed(mm(8_00)),
            BlowOutHeight::Fixed(mm(9_00)),
            mix(1, MixLocation::Destination, MixHeight::Fixed(mm(8_00))),
        ),
        Stage::Dilution2ToDilution3 => (
            FlowRates::new(ul(40_00), ul(22_50), ul(299_00)),
            DispenseHeight::Fixed(mm(5_00)),
            BlowOutHeight::Fixed(mm(5_50)),
            mix(1, MixLocation::Destination, MixHeight::Fixed(mm(5_00))),
        ),
        Stage::MasterMixToAssay | Stage::MasterMixToStandards => (
            FlowRates::new(ul(6_20), ul(6_20), ul(20_00)),
            DispenseHeight::Fixed(mm(2_00)),
            BlowOutHeight::Fixed(mm(2_50)),
            None,
        ),
        Stage::SampleToAssay | Stage::StandardsToAssay => (
            FlowRates::new(ul(4_00), ul(4_00), ul(20_00)),
            DispenseHeight::Fixed(mm(2_00)),
            BlowOutHeight::Fixed(mm(3_50)),
            mix(3, MixLocation::Destination, MixHeight::Fixed(mm(2_00))),
        ),
    };
    StageRecipe {
        stage,
        flow_rates,
        dispense,
        blow_out,
        mix,
    }
}

// ============================================================================
// SOURCE CLEARANCES
// ============================================================================

/// Largest volume the p300 moves in one 1:500 buffer sub-transfer.
pub const BUFFER_SPLIT_LIMIT: Microlitres = Microlitres::from_whole(300);

/// Number of equal sub-transfers a 1:500 buffer fill is split into.
pub fn buffer_splits(volume: Microlitres) -> usize {
    let limit = BUFFER_SPLIT_LIMIT.hundredths();
    ((volume.hundredths() + limit - 1) / limit).max(1) as usize
}

/// Reservoir to 1:20k plate; the trough is nearly empty by then.
pub const RESERVOIR_DILUTION_3_HEIGHT: Millimetres = mm(1_00);
pub const DILUTION_1_ASPIRATE_HEIGHT: Millimetres = mm(15_00);
pub const DILUTION_2_ASPIRATE_HEIGHT: Millimetres = mm(5_00);
pub const MASTER_MIX_FOR_STANDARDS_HEIGHT: Millimetres = mm(1_00);
pub const STANDARDS_ASPIRATE_HEIGHT: Millimetres = mm(2_10);

/// Sample-plate clearance for the starting volume. Only one starting
/// volume has a characterised clearance.
pub fn starting_aspirate_height(volume: Microlitres) -> Result<Millimetres, ConfigurationError> {
    if volume == SUPPORTED_STARTING_SAMPLE_VOLUME {
        Ok(mm(20))
    } else {
        Err(ConfigurationError::UnsupportedValue {
            field: "starting_sample_volume".to_string(),
            value: volume.to_string(),
            reason: format!(
                "Starting sample volume is out of range, use {} only",
                SUPPORTED_STARTING_SAMPLE_VOLUME
            ),
        })
    }
}

/// Reservoir during the 1:500 fill: four draws per column.
pub const fn reservoir_dilution_1(column_count: usize) -> HeightProfile {
    HeightProfile::affine(mm(4_00), mm(1_00), column_count, mm(1_00), mm(1_00))
}

/// Reservoir during the 1:10k fill: one draw per column.
pub const fn reservoir_dilution_2(column_count: usize) -> HeightProfile {
    HeightProfile::affine(mm(60), mm(40), column_count, mm(60), mm(50))
}

/// Master-mix column for a series, drained across all three replicates.
pub const fn master_mix(series: DilutionSeries, column_count: usize) -> HeightProfile {
    let offset = match series {
        DilutionSeries::TenThousand => mm(3_40),
        DilutionSeries::TwentyThousand => mm(3_80),
    };
    HeightProfile::affine(mm(60), offset, column_count, mm(40), mm(10))
}

/// One diluted-sample well, drawn once per replicate.
pub const fn diluted_sample(series: DilutionSeries) -> HeightProfile {
    let start = match series {
        DilutionSeries::TenThousand => mm(5_00),
        DilutionSeries::TwentyThousand => mm(7_00),
    };
    HeightProfile::new(start, mm(40), mm(1_00))
}

// =============================================================================
// TESTS
// =============================================================================
