//! Geometry Resolver
//!
//! Turns a sample count into the number of 8-sample columns every stage
//! works through, and checks that count against the plate dimensions the
//! driver reports.

use crate::quadrant::assay_column;
use qpcr_core::{
    ConfigurationError, DeckLayout, DilutionSeries, Phase, PlateGeometry, PlateRole, Replicate,
    StageConfiguration, MAX_SAMPLES, MIN_SAMPLES,
};
use std::ops::Range;

/// Samples handled by one pass of an 8-channel head.
pub const SAMPLES_PER_COLUMN: usize = 8;

/// Plates each phase needs, with the dimensions the planner assumes.
pub const EXPECTED_PLATES: [(Phase, PlateRole, PlateGeometry); 9] = [
    (Phase::Dilution, PlateRole::SamplePlate, PlateGeometry::WELLS_96),
    (Phase::Dilution, PlateRole::Dilution1, PlateGeometry::WELLS_96),
    (Phase::Dilution, PlateRole::Dilution2, PlateGeometry::WELLS_96),
    (Phase::Dilution, PlateRole::Dilution3, PlateGeometry::WELLS_96),
    (Phase::Dilution, PlateRole::Reservoir, PlateGeometry::RESERVOIR_4),
    (Phase::AssaySetup, PlateRole::AssayPlate, PlateGeometry::WELLS_384),
    (Phase::AssaySetup, PlateRole::Dilution2, PlateGeometry::WELLS_96),
    (Phase::AssaySetup, PlateRole::Dilution3, PlateGeometry::WELLS_96),
    (Phase::AssaySetup, PlateRole::ReagentPlate, PlateGeometry::WELLS_96),
];

/// `ceil(n / 8)`.
pub const fn column_count(sample_count: usize) -> usize {
    sample_count.div_ceil(SAMPLES_PER_COLUMN)
}

/// Column arithmetic for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryResolver {
    sample_count: usize,
    column_count: usize,
}

impl GeometryResolver {
    pub fn new(sample_count: i64) -> Result<Self, ConfigurationError> {
        if !(MIN_SAMPLES..=MAX_SAMPLES).contains(&sample_count) {
            return Err(ConfigurationError::SampleCountOutOfRange {
                count: sample_count,
            });
        }
        let sample_count = sample_count as usize;
        Ok(Self {
            sample_count,
            column_count: column_count(sample_count),
        })
    }

    /// A validated configuration always carries an in-range sample count.
    pub fn from_config(config: &StageConfiguration) -> Self {
        let sample_count = config.sample_count();
        Self {
            sample_count,
            column_count: column_count(sample_count),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Source columns every per-column stage iterates, in order.
    pub fn columns(&self) -> Range<usize> {
        0..self.column_count
    }

    pub fn check_column(&self, column: usize) -> Result<usize, ConfigurationError> {
        if column < self.column_count {
            Ok(column)
        } else {
            Err(ConfigurationError::ColumnOutOfRange {
                column,
                column_count: self.column_count,
            })
        }
    }

    /// Assay-plate columns one replicate quadrant of one series occupies.
    pub fn quadrant_columns(&self, series: DilutionSeries, replicate: Replicate) -> Vec<usize> {
        self.columns()
            .map(|column| assay_column(column, replicate, series))
            .collect()
    }

    /// Check the driver-reported deck against the plates this run needs.
    pub fn validate_deck(&self, layout: &DeckLayout) -> Result<(), ConfigurationError> {
        for (phase, role, expected) in EXPECTED_PLATES {
            let actual = layout
                .geometry(phase, role)
                .ok_or(ConfigurationError::MissingPlate { phase, role })?;
            if actual != expected {
                return Err(ConfigurationError::PlateGeometryMismatch {
                    phase,
                    role,
                    expected,
                    actual,
                });
            }
            if role != PlateRole::Reservoir
                && role != PlateRole::AssayPlate
                && self.column_count > actual.columns
            {
                return Err(ConfigurationError::PlateTooSmall {
                    role,
                    column_count: self.column_count,
                    available: actual.columns,
                });
            }
        }
        tracing::debug!(
            sample_count = self.sample_count,
            column_count = self.column_count,
            "Deck geometry validated"
        );
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
