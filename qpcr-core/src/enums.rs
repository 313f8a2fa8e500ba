//! Enum types for pipettes, stages and reagents

use crate::{ConfigurationError, Microlitres, PlateRole};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// PIPETTES
// ============================================================================

/// Multichannel pipette models the planner knows how to budget for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Pipette {
    /// 8-channel, 20-300 uL
    #[serde(rename = "p300_multi_gen2")]
    P300Multi,
    /// 8-channel, 1-20 uL
    #[serde(rename = "p20_multi_gen2")]
    P20Multi,
}

impl Pipette {
    pub const ALL: [Pipette; 2] = [Pipette::P300Multi, Pipette::P20Multi];

    /// Every model here is an 8-channel head.
    pub const CHANNELS: i64 = 8;

    pub fn load_name(&self) -> &'static str {
        match self {
            Pipette::P300Multi => "p300_multi_gen2",
            Pipette::P20Multi => "p20_multi_gen2",
        }
    }

    /// Largest volume a single tip can hold.
    pub fn max_volume(&self) -> Microlitres {
        match self {
            Pipette::P300Multi => Microlitres::from_whole(300),
            Pipette::P20Multi => Microlitres::from_whole(20),
        }
    }
}

impl fmt::Display for Pipette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.load_name())
    }
}

impl FromStr for Pipette {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p300_multi_gen2" => Ok(Pipette::P300Multi),
            "p20_multi_gen2" => Ok(Pipette::P20Multi),
            other => Err(ConfigurationError::UnknownPipette {
                name: other.to_string(),
            }),
        }
    }
}

/// Pipette mount on the gantry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mount {
    Left,
    Right,
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mount::Left => f.write_str("left"),
            Mount::Right => f.write_str("right"),
        }
    }
}

impl FromStr for Mount {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Mount::Left),
            "right" => Ok(Mount::Right),
            other => Err(ConfigurationError::UnknownMount {
                name: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// PHASES AND STAGES
// ============================================================================

/// A deck session. Each phase has its own deck layout and tip racks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Buffer fill and 1:500 -> 1:10k -> 1:20k serial dilution
    Dilution,
    /// Master mix, diluted samples and standards into the 384-well assay plate
    AssaySetup,
}

impl Phase {
    pub const ALL: [Phase; 2] = [Phase::Dilution, Phase::AssaySetup];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Dilution => f.write_str("dilution"),
            Phase::AssaySetup => f.write_str("assay_setup"),
        }
    }
}

/// Coarse grouping of stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageGroup {
    BufferDilution,
    SerialTransfer,
    ReagentDistribution,
    SampleDistribution,
    StandardsDistribution,
}

/// One block of identical transfers. Variants are declared in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    BufferToDilution1,
    BufferToDilution2,
    BufferToDilution3,
    SampleToDilution1,
    Dilution1ToDilution2,
    Dilution2ToDilution3,
    MasterMixToAssay,
    MasterMixToStandards,
    SampleToAssay,
    StandardsToAssay,
}

impl Stage {
    pub const ALL: [Stage; 10] = [
        Stage::BufferToDilution1,
        Stage::BufferToDilution2,
        Stage::BufferToDilution3,
        Stage::SampleToDilution1,
        Stage::Dilution1ToDilution2,
        Stage::Dilution2ToDilution3,
        Stage::MasterMixToAssay,
        Stage::MasterMixToStandards,
        Stage::SampleToAssay,
        Stage::StandardsToAssay,
    ];

    pub fn phase(&self) -> Phase {
        match self {
            Stage::BufferToDilution1
            | Stage::BufferToDilution2
            | Stage::BufferToDilution3
            | Stage::SampleToDilution1
            | Stage::Dilution1ToDilution2
            | Stage::Dilution2ToDilution3 => Phase::Dilution,
            Stage::MasterMixToAssay
            | Stage::MasterMixToStandards
            | Stage::SampleToAssay
            | Stage::StandardsToAssay => Phase::AssaySetup,
        }
    }

    pub fn group(&self) -> StageGroup {
        match self {
            Stage::BufferToDilution1 | Stage::BufferToDilution2 | Stage::BufferToDilution3 => {
                StageGroup::BufferDilution
            }
            Stage::SampleToDilution1 | Stage::Dilution1ToDilution2 | Stage::Dilution2ToDilution3 => {
                StageGroup::SerialTransfer
            }
            Stage::MasterMixToAssay | Stage::MasterMixToStandards => {
                StageGroup::ReagentDistribution
            }
            Stage::SampleToAssay => StageGroup::SampleDistribution,
            Stage::StandardsToAssay => StageGroup::StandardsDistribution,
        }
    }

    /// Pipette that performs every transfer in this stage.
    pub fn pipette(&self) -> Pipette {
        match self {
            Stage::BufferToDilution1
            | Stage::BufferToDilution2
            | Stage::BufferToDilution3
            | Stage::Dilution2ToDilution3 => Pipette::P300Multi,
            _ => Pipette::P20Multi,
        }
    }

    /// Liquid being moved.
    pub fn reagent(&self) -> Reagent {
        match self {
            Stage::BufferToDilution1 | Stage::BufferToDilution2 | Stage::BufferToDilution3 => {
                Reagent::DilutionBuffer
            }
            Stage::SampleToDilution1 => Reagent::Sample,
            Stage::Dilution1ToDilution2 | Stage::Dilution2ToDilution3 | Stage::SampleToAssay => {
                Reagent::DilutedSample
            }
            Stage::MasterMixToAssay | Stage::MasterMixToStandards => Reagent::MasterMix,
            Stage::StandardsToAssay => Reagent::Standards,
        }
    }

    /// True when this stage is the last one of its phase.
    pub fn ends_phase(&self) -> bool {
        matches!(self, Stage::Dilution2ToDilution3 | Stage::StandardsToAssay)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::BufferToDilution1 => "buffer_to_dilution_1",
            Stage::BufferToDilution2 => "buffer_to_dilution_2",
            Stage::BufferToDilution3 => "buffer_to_dilution_3",
            Stage::SampleToDilution1 => "sample_to_dilution_1",
            Stage::Dilution1ToDilution2 => "dilution_1_to_dilution_2",
            Stage::Dilution2ToDilution3 => "dilution_2_to_dilution_3",
            Stage::MasterMixToAssay => "master_mix_to_assay",
            Stage::MasterMixToStandards => "master_mix_to_standards",
            Stage::SampleToAssay => "sample_to_assay",
            Stage::StandardsToAssay => "standards_to_assay",
        };
        f.write_str(name)
    }
}

// ============================================================================
// REAGENTS AND ASSAY LAYOUT
// ============================================================================

/// Liquids handled by the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reagent {
    DilutionBuffer,
    Sample,
    DilutedSample,
    MasterMix,
    Standards,
}

impl fmt::Display for Reagent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reagent::DilutionBuffer => "dilution_buffer",
            Reagent::Sample => "sample",
            Reagent::DilutedSample => "diluted_sample",
            Reagent::MasterMix => "master_mix",
            Reagent::Standards => "standards",
        };
        f.write_str(name)
    }
}

/// Dilution series loaded onto the assay plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DilutionSeries {
    /// 1:10,000 plate, left half of the assay plate
    TenThousand,
    /// 1:20,000 plate, right half of the assay plate
    TwentyThousand,
}

impl DilutionSeries {
    pub const ALL: [DilutionSeries; 2] = [DilutionSeries::TenThousand, DilutionSeries::TwentyThousand];

    pub const fn index(&self) -> usize {
        match self {
            DilutionSeries::TenThousand => 0,
            DilutionSeries::TwentyThousand => 1,
        }
    }

    /// Dilution plate holding this series.
    pub const fn source_plate(&self) -> PlateRole {
        match self {
            DilutionSeries::TenThousand => PlateRole::Dilution2,
            DilutionSeries::TwentyThousand => PlateRole::Dilution3,
        }
    }
}

impl fmt::Display for DilutionSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DilutionSeries::TenThousand => f.write_str("1:10k"),
            DilutionSeries::TwentyThousand => f.write_str("1:20k"),
        }
    }
}

/// Technical replicate number on the assay plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Replicate {
    First,
    Second,
    Third,
}

impl Replicate {
    pub const ALL: [Replicate; 3] = [Replicate::First, Replicate::Second, Replicate::Third];

    /// 1-based replicate number.
    pub const fn number(&self) -> usize {
        match self {
            Replicate::First => 1,
            Replicate::Second => 2,
            Replicate::Third => 3,
        }
    }
}

/// Where a post-transfer or pre-aspirate mix happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixLocation {
    /// Mix in the source well before aspirating
    Source,
    /// Mix in the destination well after dispensing
    Destination,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_matches_declaration() {
        let mut sorted = Stage::ALL;
        sorted.sort();
        assert_eq!(sorted, Stage::ALL);
    }

    #[test]
    fn test_stage_groups_are_monotonic() {
        let groups: Vec<StageGroup> = Stage::ALL.iter().map(|s| s.group()).collect();
        assert!(groups.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(groups.first(), Some(&StageGroup::BufferDilution));
        assert_eq!(groups.last(), Some(&StageGroup::StandardsDistribution));
    }

    #[test]
    fn test_phase_boundaries() {
        let ends: Vec<Stage> = Stage::ALL.iter().copied().filter(|s| s.ends_phase()).collect();
        assert_eq!(ends, vec![Stage::Dilution2ToDilution3, Stage::StandardsToAssay]);
        assert!(Stage::ALL
            .iter()
            .filter(|s| s.phase() == Phase::AssaySetup)
            .all(|s| s.pipette() == Pipette::P20Multi));
    }

    #[test]
    fn test_pipette_from_str() {
        assert_eq!("p300_multi_gen2".parse::<Pipette>().unwrap(), Pipette::P300Multi);
        assert_eq!(" P20_MULTI_GEN2 ".parse::<Pipette>().unwrap(), Pipette::P20Multi);
        assert!("p1000_single".parse::<Pipette>().is_err());
    }

    #[test]
    fn test_mount_from_str() {
        assert_eq!("Left".parse::<Mount>().unwrap(), Mount::Left);
        assert!("center".parse::<Mount>().is_err());
    }

    #[test]
    fn test_pipette_serde_uses_load_name() {
        let json = serde_json::to_string(&Pipette::P20Multi).unwrap();
        assert_eq!(json, "\"p20_multi_gen2\"");
    }
}
