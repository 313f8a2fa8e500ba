//! Plate Quadrant Mapper
//!
//! The 384-well assay plate is split into a left half (1:10k series) and a
//! right half (1:20k series) of 12 columns each. An 8-channel head on a
//! 384-well plate touches every other row, so one head position covers one
//! of four interleaved quadrants:
//!
//! | head row | column parity | contents            |
//! |----------|---------------|---------------------|
//! | A        | even          | replicate 1         |
//! | A        | odd           | replicate 2         |
//! | B        | even          | replicate 3         |
//! | B        | odd           | standards and NTCs  |
//!
//! Source column `c` lands on assay column `12 * series + 2 * c + parity`.

use qpcr_core::{
    ConfigurationError, DilutionSeries, MappingConflictError, PlateGeometry, PlateRole, Replicate,
    WellRef,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Assay-plate columns given to each dilution series.
pub const SERIES_BLOCK_COLUMNS: usize = 12;

/// Source columns one series block can hold.
pub const QUADRANT_CAPACITY: usize = SERIES_BLOCK_COLUMNS / 2;

/// Head row and columns of the standards block: B2, B4, B6.
pub const STANDARDS_ROW: usize = 1;
pub const STANDARDS_COLUMNS: [usize; 3] = [1, 3, 5];

const fn head_row(replicate: Replicate) -> usize {
    match replicate {
        Replicate::Third => 1,
        Replicate::First | Replicate::Second => 0,
    }
}

const fn column_parity(replicate: Replicate) -> usize {
    match replicate {
        Replicate::Second => 1,
        Replicate::First | Replicate::Third => 0,
    }
}

/// Assay-plate column for one (source column, replicate, series) triple.
pub const fn assay_column(column: usize, replicate: Replicate, series: DilutionSeries) -> usize {
    SERIES_BLOCK_COLUMNS * series.index() + 2 * column + column_parity(replicate)
}

/// Where one replicate of one diluted sample column goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub column: usize,
    pub replicate: Replicate,
    pub series: DilutionSeries,
    pub well: WellRef,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} column {} replicate {}",
            self.series,
            self.column,
            self.replicate.number()
        )
    }
}

/// Maps source columns onto assay-plate wells for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuadrantMapper {
    column_count: usize,
    geometry: PlateGeometry,
}

impl QuadrantMapper {
    pub fn new(column_count: usize) -> Result<Self, ConfigurationError> {
        Self::with_geometry(column_count, PlateGeometry::WELLS_384)
    }

    pub fn with_geometry(
        column_count: usize,
        geometry: PlateGeometry,
    ) -> Result<Self, ConfigurationError> {
        if column_count > QUADRANT_CAPACITY {
            return Err(ConfigurationError::LayoutCapacityExceeded {
                column_count,
                capacity: QUADRANT_CAPACITY,
            });
        }
        Ok(Self {
            column_count,
            geometry,
        })
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Destination head well for a triple.
    pub fn well_for(
        &self,
        column: usize,
        replicate: Replicate,
        series: DilutionSeries,
    ) -> Result<WellRef, ConfigurationError> {
        if column >= self.column_count {
            return Err(ConfigurationError::ColumnOutOfRange {
                column,
                column_count: self.column_count,
            });
        }
        Ok(WellRef::new(
            PlateRole::AssayPlate,
            head_row(replicate),
            assay_column(column, replicate, series),
        ))
    }

    /// Head wells of the standards block, independent of the column count.
    pub fn standards_wells(&self) -> Vec<WellRef> {
        STANDARDS_COLUMNS
            .iter()
            .map(|&column| WellRef::new(PlateRole::AssayPlate, STANDARDS_ROW, column))
            .collect()
    }

    /// Every sample placement, ordered series, then replicate, then column.
    pub fn placements(&self) -> Vec<Placement> {
        let mut placements = Vec::with_capacity(self.column_count * 6);
        for series in DilutionSeries::ALL {
            for replicate in Replicate::ALL {
                for column in 0..self.column_count {
                    placements.push(Placement {
                        column,
                        replicate,
                        series,
                        well: WellRef::new(
                            PlateRole::AssayPlate,
                            head_row(replicate),
                            assay_column(column, replicate, series),
                        ),
                    });
                }
            }
        }
        placements
    }

    /// Expand every placement and the standards block to physical wells and
    /// check that each lies on the plate and is claimed exactly once.
    pub fn verify(&self) -> Result<(), MappingConflictError> {
        let mut owners: HashMap<WellRef, String> = HashMap::new();
        let labelled = self
            .placements()
            .into_iter()
            .map(|p| (p.well, p.to_string()))
            .chain(
                self.standards_wells()
                    .into_iter()
                    .enumerate()
                    .map(|(i, well)| (well, format!("standards {}", i + 1))),
            );

        for (head, owner) in labelled {
            let wells = head
                .channel_wells(&self.geometry)
                .ok_or(MappingConflictError::OutOfBounds {
                    well: head,
                    geometry: self.geometry,
                })?;
            for well in wells {
                if let Some(first) = owners.insert(well, owner.clone()) {
                    return Err(MappingConflictError::DuplicateDestination {
                        well,
                        first,
                        second: owner,
                    });
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_mapping_is_injective(c in 1usize..=QUADRANT_CAPACITY) {
            let mapper = QuadrantMapper::new(c).unwrap();
            let placements = mapper.placements();
            prop_assert_eq!(placements.len(), 6 * c);
            let heads: HashSet<WellRef> = placements.iter().map(|p| p.well).collect();
            prop_assert_eq!(heads.len(), placements.len());
            prop_assert!(mapper.verify().is_ok());
        }

        #[test]
        fn prop_active_range_is_covered(c in 1usize..=QUADRANT_CAPACITY) {
            // Every head well in the active quadrant columns belongs to some triple.
            let mapper = QuadrantMapper::new(c).unwrap();
            let heads: HashSet<WellRef> = mapper.placements().iter().map(|p| p.well).collect();
            for series in DilutionSeries::ALL {
                let base = SERIES_BLOCK_COLUMNS * series.index();
                for column in base..base + 2 * c {
                    prop_assert!(heads.contains(&WellRef::new(PlateRole::AssayPlate, 0, column)));
                    if column % 2 == 0 {
                        prop_assert!(heads.contains(&WellRef::new(PlateRole::AssayPlate, 1, column)));
                    }
                }
            }
        }

        #[test]
        fn prop_well_for_agrees_with_placements(c in 1usize..=QUADRANT_CAPACITY) {
            let mapper = QuadrantMapper::new(c).unwrap();
            for p in mapper.placements() {
                prop_assert_eq!(mapper.well_for(p.column, p.replicate, p.series).unwrap(), p.well);
            }
        }
    }
}
