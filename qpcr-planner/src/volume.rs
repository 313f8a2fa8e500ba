//! Volume Corrector

use qpcr_core::{ConfigurationError, Microlitres, Reagent, Stage, VolumeCorrections};
use serde::{Deserialize, Serialize};

/// A nominal volume and the volume actually commanded for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectedVolume {
    pub nominal: Microlitres,
    pub commanded: Microlitres,
}

/// Looks up the signed offset for a (stage, reagent) pair and applies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeCorrector {
    corrections: VolumeCorrections,
}

impl VolumeCorrector {
    pub fn new(corrections: VolumeCorrections) -> Self {
        Self { corrections }
    }

    /// Pairs with no observed offset are commanded as nominal.
    pub fn offset(&self, stage: Stage, reagent: Reagent) -> Microlitres {
        let c = &self.corrections;
        match (stage, reagent) {
            (Stage::BufferToDilution1, Reagent::DilutionBuffer) => c.buffer_dilution_1,
            (Stage::BufferToDilution2, Reagent::DilutionBuffer) => c.buffer_dilution_2,
            (Stage::BufferToDilution3, Reagent::DilutionBuffer) => c.buffer_dilution_3,
            (Stage::SampleToDilution1, Reagent::Sample) => c.sample_to_dilution_1,
            (Stage::Dilution1ToDilution2, Reagent::DilutedSample) => c.dilution_1_to_2,
            (Stage::Dilution2ToDilution3, Reagent::DilutedSample) => c.dilution_2_to_3,
            (Stage::MasterMixToAssay | Stage::MasterMixToStandards, Reagent::MasterMix) => {
                c.master_mix
            }
            (Stage::SampleToAssay, Reagent::DilutedSample) => c.assay_sample,
            (Stage::StandardsToAssay, Reagent::Standards) => {
                c.standards_underdelivery + c.standards_cold
            }
            _ => Microlitres::ZERO,
        }
    }

    /// Corrected volume for a stage's own reagent. Fails if the result is not
    /// positive or no longer fits the stage's tip.
    pub fn correct(
        &self,
        stage: Stage,
        nominal: Microlitres,
    ) -> Result<CorrectedVolume, ConfigurationError> {
        let offset = self.offset(stage, stage.reagent());
        let commanded = nominal + offset;
        if !commanded.is_positive() {
            return Err(ConfigurationError::NonPositiveVolume {
                stage,
                nominal,
                offset,
            });
        }
        let max = stage.pipette().max_volume();
        if commanded > max {
            return Err(ConfigurationError::InvalidValue {
                field: stage.to_string(),
                value: commanded.to_string(),
                reason: format!("corrected volume exceeds the {} tip capacity of {}", stage.pipette(), max),
            });
        }
        Ok(CorrectedVolume { nominal, commanded })
    }
}

// =============================================================================
// TESTS
// =============================================================================
