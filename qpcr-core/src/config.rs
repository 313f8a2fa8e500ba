//! Run parameters and the validated stage configuration
//!
//! Parameters arrive as a flat mapping (TOML or JSON). They are validated once
//! into a [`StageConfiguration`], which is immutable for the rest of the run.

use crate::{ConfigurationError, Microlitres, Mount, Pipette};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// VOLUME CORRECTIONS
// ============================================================================

/// Empirical offsets observed on one deck's pipettes and reagents. They are
/// not a calibration model; override them per instrument.
pub mod corrections {
    use crate::Microlitres;

    /// p300 over-delivers about 0.8 uL per 1:500 buffer sub-transfer.
    pub const BUFFER_DILUTION_1: Microlitres = Microlitres::from_hundredths(-80);
    /// Commanding 95 uL of buffer yields 96 uL.
    pub const BUFFER_DILUTION_2: Microlitres = Microlitres::from_hundredths(-1_00);
    /// Commanding 40 uL of buffer yields 44 uL.
    pub const BUFFER_DILUTION_3: Microlitres = Microlitres::from_hundredths(-4_00);
    pub const SAMPLE_TO_DILUTION_1: Microlitres = Microlitres::ZERO;
    pub const DILUTION_1_TO_2: Microlitres = Microlitres::ZERO;
    pub const DILUTION_2_TO_3: Microlitres = Microlitres::ZERO;
    /// p20 over-delivers about 0.35 uL of master mix.
    pub const MASTER_MIX: Microlitres = Microlitres::from_hundredths(-30);
    /// p20 under-delivers about 0.125 uL of diluted library.
    pub const ASSAY_SAMPLE: Microlitres = Microlitres::from_hundredths(10);
    /// Same under-delivery applies to standards.
    pub const STANDARDS_UNDERDELIVERY: Microlitres = Microlitres::from_hundredths(10);
    /// Standards held at 4 C over-dispense about 0.2 uL.
    pub const STANDARDS_COLD: Microlitres = Microlitres::from_hundredths(-20);
}

/// Signed offsets added to nominal volumes before they are commanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VolumeCorrections {
    pub buffer_dilution_1: Microlitres,
    pub buffer_dilution_2: Microlitres,
    pub buffer_dilution_3: Microlitres,
    pub sample_to_dilution_1: Microlitres,
    pub dilution_1_to_2: Microlitres,
    pub dilution_2_to_3: Microlitres,
    pub master_mix: Microlitres,
    pub assay_sample: Microlitres,
    pub standards_underdelivery: Microlitres,
    pub standards_cold: Microlitres,
}

impl Default for VolumeCorrections {
    fn default() -> Self {
        Self {
            buffer_dilution_1: corrections::BUFFER_DILUTION_1,
            buffer_dilution_2: corrections::BUFFER_DILUTION_2,
            buffer_dilution_3: corrections::BUFFER_DILUTION_3,
            sample_to_dilution_1: corrections::SAMPLE_TO_DILUTION_1,
            dilution_1_to_2: corrections::DILUTION_1_TO_2,
            dilution_2_to_3: corrections::DILUTION_2_TO_3,
            master_mix: corrections::MASTER_MIX,
            assay_sample: corrections::ASSAY_SAMPLE,
            standards_underdelivery: corrections::STANDARDS_UNDERDELIVERY,
            standards_cold: corrections::STANDARDS_COLD,
        }
    }
}

// ============================================================================
// RUN PARAMETERS (inbound, unvalidated)
// ============================================================================

/// The only starting sample volume the sample-plate aspirate height is
/// characterised for.
pub const SUPPORTED_STARTING_SAMPLE_VOLUME: Microlitres = Microlitres::from_whole(12);

/// Largest 1:500 buffer fill: four 300 uL sub-transfers per column, which is
/// all the reservoir clearance allows.
pub const MAX_DILUTION_VOLUME_1: Microlitres = Microlitres::from_whole(1200);

/// Supported sample count range.
pub const MIN_SAMPLES: i64 = 1;
pub const MAX_SAMPLES: i64 = 96;

/// Temperature module set-point range in Celsius.
pub const MIN_TEMPERATURE_C: f64 = 4.0;
pub const MAX_TEMPERATURE_C: f64 = 95.0;

/// Flat parameter mapping as supplied by the operator.
/// Missing keys take the values of the reference run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunParameters {
    pub sample_number: i64,
    pub starting_sample_volume: Microlitres,
    pub dilution_volume_1: Microlitres,
    pub sample_volume_1: Microlitres,
    pub dilution_volume_2: Microlitres,
    pub sample_volume_2: Microlitres,
    pub dilution_volume_3: Microlitres,
    pub sample_volume_3: Microlitres,
    pub master_mix_volume: Microlitres,
    pub assay_sample_volume: Microlitres,
    pub set_temperature: f64,
    pub pipette_type: String,
    pub pipette_mount: String,
    pub pipette_type_2: String,
    pub pipette_mount_2: String,
    pub corrections: VolumeCorrections,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            sample_number: 9,
            starting_sample_volume: SUPPORTED_STARTING_SAMPLE_VOLUME,
            dilution_volume_1: Microlitres::from_whole(998),
            sample_volume_1: Microlitres::from_whole(2),
            dilution_volume_2: Microlitres::from_whole(95),
            sample_volume_2: Microlitres::from_whole(5),
            dilution_volume_3: Microlitres::from_whole(40),
            sample_volume_3: Microlitres::from_whole(40),
            master_mix_volume: Microlitres::from_hundredths(6_20),
            assay_sample_volume: Microlitres::from_whole(4),
            set_temperature: 4.0,
            pipette_type: Pipette::P300Multi.load_name().to_string(),
            pipette_mount: Mount::Left.to_string(),
            pipette_type_2: Pipette::P20Multi.load_name().to_string(),
            pipette_mount_2: Mount::Right.to_string(),
            corrections: VolumeCorrections::default(),
        }
    }
}

impl RunParameters {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigurationError> {
        toml_from_str(contents)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(contents).map_err(|e| ConfigurationError::Parse {
            format: "JSON".to_string(),
            reason: e.to_string(),
        })
    }

    /// Load from a `.json` file, or TOML for any other extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigurationError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Io {
            reason: format!("{}: {}", path.display(), e),
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&contents),
            _ => Self::from_toml_str(&contents),
        }
    }

    /// Validate every parameter and freeze the result.
    pub fn validate(&self) -> Result<StageConfiguration, ConfigurationError> {
        if !(MIN_SAMPLES..=MAX_SAMPLES).contains(&self.sample_number) {
            return Err(ConfigurationError::SampleCountOutOfRange {
                count: self.sample_number,
            });
        }

        if self.starting_sample_volume != SUPPORTED_STARTING_SAMPLE_VOLUME {
            return Err(ConfigurationError::UnsupportedValue {
                field: "starting_sample_volume".to_string(),
                value: self.starting_sample_volume.to_string(),
                reason: format!(
                    "Starting sample volume is out of range, use {} only",
                    SUPPORTED_STARTING_SAMPLE_VOLUME
                ),
            });
        }

        let volumes = [
            ("dilution_volume_1", self.dilution_volume_1),
            ("sample_volume_1", self.sample_volume_1),
            ("dilution_volume_2", self.dilution_volume_2),
            ("sample_volume_2", self.sample_volume_2),
            ("dilution_volume_3", self.dilution_volume_3),
            ("sample_volume_3", self.sample_volume_3),
            ("master_mix_volume", self.master_mix_volume),
            ("assay_sample_volume", self.assay_sample_volume),
        ];
        for (field, volume) in volumes {
            if !volume.is_positive() {
                return Err(ConfigurationError::InvalidValue {
                    field: field.to_string(),
                    value: volume.to_string(),
                    reason: "volume must be greater than 0".to_string(),
                });
            }
        }

        if self.dilution_volume_1 > MAX_DILUTION_VOLUME_1 {
            return Err(ConfigurationError::InvalidValue {
                field: "dilution_volume_1".to_string(),
                value: self.dilution_volume_1.to_string(),
                reason: format!("the 1:500 buffer fill is limited to {}", MAX_DILUTION_VOLUME_1),
            });
        }

        // Single-draw transfers must fit one tip. The 1:500 buffer fill is
        // split into sub-transfers and is exempt.
        let single_draws = [
            ("sample_volume_1", self.sample_volume_1, Pipette::P20Multi),
            ("sample_volume_2", self.sample_volume_2, Pipette::P20Multi),
            ("sample_volume_3", self.sample_volume_3, Pipette::P300Multi),
            ("dilution_volume_2", self.dilution_volume_2, Pipette::P300Multi),
            ("dilution_volume_3", self.dilution_volume_3, Pipette::P300Multi),
            ("master_mix_volume", self.master_mix_volume, Pipette::P20Multi),
            ("assay_sample_volume", self.assay_sample_volume, Pipette::P20Multi),
        ];
        for (field, volume, pipette) in single_draws {
            if volume > pipette.max_volume() {
                return Err(ConfigurationError::InvalidValue {
                    field: field.to_string(),
                    value: volume.to_string(),
                    reason: format!("exceeds the {} tip capacity of {}", pipette, pipette.max_volume()),
                });
            }
        }

        if !self.set_temperature.is_finite()
            || self.set_temperature < MIN_TEMPERATURE_C
            || self.set_temperature > MAX_TEMPERATURE_C
        {
            return Err(ConfigurationError::InvalidValue {
                field: "set_temperature".to_string(),
                value: self.set_temperature.to_string(),
                reason: format!(
                    "must be between {} and {} C",
                    MIN_TEMPERATURE_C, MAX_TEMPERATURE_C
                ),
            });
        }

        let pipettes = self.pipette_assignments()?;

        Ok(StageConfiguration {
            sample_count: self.sample_number as usize,
            starting_sample_volume: self.starting_sample_volume,
            dilution_volumes: [
                self.dilution_volume_1,
                self.dilution_volume_2,
                self.dilution_volume_3,
            ],
            transfer_volumes: [self.sample_volume_1, self.sample_volume_2, self.sample_volume_3],
            master_mix_volume: self.master_mix_volume,
            assay_sample_volume: self.assay_sample_volume,
            set_temperature: self.set_temperature,
            pipettes,
            corrections: self.corrections,
        })
    }

    fn pipette_assignments(&self) -> Result<Vec<PipetteAssignment>, ConfigurationError> {
        let first = PipetteAssignment {
            pipette: self.pipette_type.parse()?,
            mount: self.pipette_mount.parse()?,
        };
        let second = PipetteAssignment {
            pipette: self.pipette_type_2.parse()?,
            mount: self.pipette_mount_2.parse()?,
        };
        if first.mount == second.mount {
            return Err(ConfigurationError::DuplicateMount { mount: first.mount });
        }
        let assignments = vec![first, second];
        for required in Pipette::ALL {
            if !assignments.iter().any(|a| a.pipette == required) {
                return Err(ConfigurationError::MissingPipette { pipette: required });
            }
        }
        Ok(assignments)
    }
}

fn toml_from_str(contents: &str) -> Result<RunParameters, ConfigurationError> {
    toml::from_str(contents).map_err(|e| ConfigurationError::Parse {
        format: "TOML".to_string(),
        reason: e.to_string(),
    })
}

// ============================================================================
// STAGE CONFIGURATION (validated, immutable)
// ============================================================================

/// A pipette model bound to a gantry mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipetteAssignment {
    pub pipette: Pipette,
    pub mount: Mount,
}

/// Validated run configuration. Only obtainable through
/// [`RunParameters::validate`]; never changes during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageConfiguration {
    sample_count: usize,
    starting_sample_volume: Microlitres,
    dilution_volumes: [Microlitres; 3],
    transfer_volumes: [Microlitres; 3],
    master_mix_volume: Microlitres,
    assay_sample_volume: Microlitres,
    set_temperature: f64,
    pipettes: Vec<PipetteAssignment>,
    corrections: VolumeCorrections,
}

impl StageConfiguration {
    /// Reference run parameters with a different sample count.
    pub fn for_samples(sample_count: i64) -> Result<Self, ConfigurationError> {
        RunParameters {
            sample_number: sample_count,
            ..RunParameters::default()
        }
        .validate()
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn starting_sample_volume(&self) -> Microlitres {
        self.starting_sample_volume
    }

    /// Buffer volume per well for dilution plate `n` (1-based).
    pub fn dilution_volume(&self, plate: usize) -> Option<Microlitres> {
        plate.checked_sub(1).and_then(|i| self.dilution_volumes.get(i)).copied()
    }

    /// Buffer volumes for the 1:500, 1:10k and 1:20k plates.
    pub fn dilution_volumes(&self) -> [Microlitres; 3] {
        self.dilution_volumes
    }

    /// Sample volumes moved into the 1:500, 1:10k and 1:20k plates.
    pub fn transfer_volumes(&self) -> [Microlitres; 3] {
        self.transfer_volumes
    }

    /// Sample volume moved into dilution plate `n` (1-based).
    pub fn transfer_volume(&self, plate: usize) -> Option<Microlitres> {
        plate.checked_sub(1).and_then(|i| self.transfer_volumes.get(i)).copied()
    }

    pub fn master_mix_volume(&self) -> Microlitres {
        self.master_mix_volume
    }

    pub fn assay_sample_volume(&self) -> Microlitres {
        self.assay_sample_volume
    }

    pub fn set_temperature(&self) -> f64 {
        self.set_temperature
    }

    pub fn pipettes(&self) -> &[PipetteAssignment] {
        &self.pipettes
    }

    pub fn mount_of(&self, pipette: Pipette) -> Option<Mount> {
        self.pipettes
            .iter()
            .find(|a| a.pipette == pipette)
            .map(|a| a.mount)
    }

    pub fn corrections(&self) -> &VolumeCorrections {
        &self.corrections
    }
}

// =============================================================================
// TESTS
// =============================================================================
