//! Error types for planning and execution
//!
//! Every error is fail-fast. Nothing here is retried: a partially completed
//! transfer cannot be rolled back, so the only recovery is an operator reading
//! [`QpcrError::operator_message`] and re-running with corrected parameters.

use crate::{Microlitres, Millimetres, Mount, Phase, Pipette, PlateGeometry, PlateRole, Reagent, Stage, WellRef};
use thiserror::Error;

/// Invalid or unsupported parameter values. Raised before any physical action.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Sample count {count} is outside the supported range 1..=96")]
    SampleCountOutOfRange { count: i64 },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported value for {field}: {value} - {reason}")]
    UnsupportedValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Column {column} requested but only {column_count} sample columns are in use")]
    ColumnOutOfRange { column: usize, column_count: usize },

    #[error("{column_count} sample columns exceed the assay layout capacity of {capacity}")]
    LayoutCapacityExceeded { column_count: usize, capacity: usize },

    #[error("Plate {role} in the {phase} deck reports {actual}, expected {expected}")]
    PlateGeometryMismatch {
        phase: Phase,
        role: PlateRole,
        expected: PlateGeometry,
        actual: PlateGeometry,
    },

    #[error("Plate {role} is missing from the {phase} deck")]
    MissingPlate { phase: Phase, role: PlateRole },

    #[error("{column_count} sample columns do not fit on {role} with {available} columns")]
    PlateTooSmall {
        role: PlateRole,
        column_count: usize,
        available: usize,
    },

    #[error("Unknown pipette model: {name}")]
    UnknownPipette { name: String },

    #[error("Unknown pipette mount: {name}")]
    UnknownMount { name: String },

    #[error("Both pipettes are assigned to the {mount} mount")]
    DuplicateMount { mount: Mount },

    #[error("Pipette {pipette} is required but not assigned to a mount")]
    MissingPipette { pipette: Pipette },

    #[error("Invalid well label: {label}")]
    InvalidWellLabel { label: String },

    #[error("Invalid deck slot: {slot}")]
    InvalidDeckSlot { slot: u8 },

    #[error("Corrected volume for {stage} is not positive: nominal {nominal}, offset {offset}")]
    NonPositiveVolume {
        stage: Stage,
        nominal: Microlitres,
        offset: Microlitres,
    },

    #[error("Failed to read configuration: {reason}")]
    Io { reason: String },

    #[error("Failed to parse {format} configuration: {reason}")]
    Parse { format: String, reason: String },

    #[error("Failed to encode {format}: {reason}")]
    Encode { format: String, reason: String },
}

/// Not enough tips or reagent capacity for the requested sample count.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceExhaustedError {
    #[error("{phase} phase needs {racks_required} {pipette} tip racks ({tips_required} tips) but only {slots_available} slots are available")]
    TipRacks {
        phase: Phase,
        pipette: Pipette,
        tips_required: i64,
        racks_required: usize,
        slots_available: usize,
    },

    #[error("Plan picks up {used} {pipette} tips in the {phase} phase but only {budgeted} were budgeted")]
    TipOverrun {
        phase: Phase,
        pipette: Pipette,
        used: i64,
        budgeted: i64,
    },

    #[error("{reagent} needs {required} in {well} but the well holds {capacity}")]
    ReagentCapacity {
        reagent: Reagent,
        well: WellRef,
        required: Microlitres,
        capacity: Microlitres,
    },
}

/// A draining well's clearance reached its floor before the stage finished.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Liquid level in {well} during {stage} would reach {attempted}, at or below the {floor} floor, after {draws_issued} draws")]
pub struct LiquidLevelUnderflowError {
    pub stage: Stage,
    pub well: WellRef,
    pub floor: Millimetres,
    pub attempted: Millimetres,
    pub draws_issued: usize,
}

/// The generated plan is internally inconsistent. Always a defect.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingConflictError {
    #[error("{first} and {second} both map to {well}")]
    DuplicateDestination {
        well: WellRef,
        first: String,
        second: String,
    },

    #[error("{well} lies outside the {geometry} plate")]
    OutOfBounds { well: WellRef, geometry: PlateGeometry },

    #[error("Plan picks up only {used} {pipette} tips in the {phase} phase against a budget of {budgeted}, so tips would be reused across samples")]
    TipReuse {
        phase: Phase,
        pipette: Pipette,
        used: i64,
        budgeted: i64,
    },
}

/// Failure reported by the liquid-handling driver while executing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Driver failure: {reason}")]
pub struct DriverError {
    pub reason: String,
}

impl DriverError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Master error type for planning and execution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QpcrError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(#[from] ResourceExhaustedError),

    #[error("Liquid level underflow: {0}")]
    LiquidLevelUnderflow(#[from] LiquidLevelUnderflowError),

    #[error("Mapping conflict: {0}")]
    MappingConflict(#[from] MappingConflictError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}

impl QpcrError {
    /// Blocking message shown to the operator when a run halts.
    pub fn operator_message(&self) -> String {
        match self {
            QpcrError::Configuration(err) => format!(
                "Run halted before any liquid was moved. {}. Correct the run parameters and restart the protocol.",
                err
            ),
            QpcrError::ResourceExhausted(err) => format!(
                "Run halted before the affected stage. {}. Reduce the sample count or add capacity, then restart.",
                err
            ),
            QpcrError::LiquidLevelUnderflow(err) => format!(
                "Run halted. {}. The source well cannot supply every draw at a safe clearance for this sample count.",
                err
            ),
            QpcrError::MappingConflict(err) => format!(
                "Run halted. Plan defect: {}. Do not proceed; report this plan.",
                err
            ),
            QpcrError::Driver(err) => format!(
                "Run halted by the robot. {}. Inspect the deck before discarding or reusing any plate.",
                err
            ),
        }
    }
}

/// Result type alias for planning and execution.
pub type QpcrResult<T> = Result<T, QpcrError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_count_display() {
        let err = ConfigurationError::SampleCountOutOfRange { count: 97 };
        let msg = format!("{}", err);
        assert!(msg.contains("97"));
        assert!(msg.contains("1..=96"));
    }

    #[test]
    fn test_tip_racks_display() {
        let err = ResourceExhaustedError::TipRacks {
            phase: Phase::AssaySetup,
            pipette: Pipette::P20Multi,
            tips_required: 720,
            racks_required: 8,
            slots_available: 7,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("assay_setup"));
        assert!(msg.contains("p20_multi_gen2"));
        assert!(msg.contains("720"));
        assert!(msg.contains("8"));
    }

    #[test]
    fn test_underflow_display() {
        let err = LiquidLevelUnderflowError {
            stage: Stage::BufferToDilution1,
            well: WellRef::column_head(PlateRole::Reservoir, 0),
            floor: Millimetres::from_whole(1),
            attempted: Millimetres::from_whole(1),
            draws_issued: 6,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("reservoir:A1"));
        assert!(msg.contains("1.00 mm"));
        assert!(msg.contains("6 draws"));
    }

    #[test]
    fn test_mapping_conflict_display() {
        let err = MappingConflictError::DuplicateDestination {
            well: WellRef::new(PlateRole::AssayPlate, 0, 0),
            first: "column 0 replicate 1".to_string(),
            second: "column 1 replicate 2".to_string(),
        };
        assert!(format!("{}", err).contains("assay_plate:A1"));
    }

    #[test]
    fn test_qpcr_error_from_variants() {
        let config = QpcrError::from(ConfigurationError::UnknownMount {
            name: "center".to_string(),
        });
        assert!(matches!(config, QpcrError::Configuration(_)));

        let driver = QpcrError::from(DriverError::new("tip not detected"));
        assert!(matches!(driver, QpcrError::Driver(_)));

        let mapping = QpcrError::from(MappingConflictError::OutOfBounds {
            well: WellRef::new(PlateRole::AssayPlate, 16, 0),
            geometry: PlateGeometry::WELLS_384,
        });
        assert!(matches!(mapping, QpcrError::MappingConflict(_)));
    }

    #[test]
    fn test_operator_message_is_blocking_text() {
        let err = QpcrError::from(ConfigurationError::UnsupportedValue {
            field: "starting_sample_volume".to_string(),
            value: "10".to_string(),
            reason: "use 12 uL only".to_string(),
        });
        let msg = err.operator_message();
        assert!(msg.starts_with("Run halted before any liquid was moved"));
        assert!(msg.contains("use 12 uL only"));
    }
}
