//! Reagent loading requirements
//!
//! Quantities the operator must load before each phase, checked against the
//! usable volume of the well that holds them.

use qpcr_core::{
    DeckLayout, DilutionSeries, Microlitres, PlateRole, Reagent, ResourceExhaustedError,
    StageConfiguration, WellRef,
};
use serde::{Deserialize, Serialize};

/// Dead volume left in the buffer trough.
pub const BUFFER_DEAD_VOLUME: Microlitres = Microlitres::from_whole(5_000);

/// Dead volume left in each reagent-plate well.
pub const REAGENT_DEAD_VOLUME: Microlitres = Microlitres::from_whole(20);

/// Every reagent-plate draw is done in triplicate.
pub const REPLICATES: i64 = 3;

const MICROLITRES_PER_MILLILITRE: i64 = 1_000;

/// Reagent-plate column holding the standards and NTCs.
pub const STANDARDS_COLUMN: usize = 4;

/// Trough holding the dilution buffer.
pub const fn buffer_well() -> WellRef {
    WellRef::column_head(PlateRole::Reservoir, 0)
}

/// Master-mix column feeding one dilution series. The 1:20k column also
/// feeds the standards block.
pub const fn master_mix_well(series: DilutionSeries) -> WellRef {
    WellRef::column_head(PlateRole::ReagentPlate, series.index())
}

pub const fn standards_well() -> WellRef {
    WellRef::column_head(PlateRole::ReagentPlate, STANDARDS_COLUMN)
}

/// Volume to load into each well of a source column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReagentRequirement {
    pub reagent: Reagent,
    pub well: WellRef,
    pub required: Microlitres,
    pub capacity: Microlitres,
}

fn ceil_to(volume: Microlitres, unit: i64) -> Microlitres {
    let whole = volume.ceil_whole();
    Microlitres::from_whole((whole + unit - 1).div_euclid(unit) * unit)
}

pub fn reagent_requirements(
    config: &StageConfiguration,
    column_count: usize,
    layout: &DeckLayout,
) -> Vec<ReagentRequirement> {
    let c = column_count as i64;
    let dilution_total = (1..=3)
        .filter_map(|plate| config.dilution_volume(plate))
        .fold(Microlitres::ZERO, |acc, v| acc + v);
    let buffer = ceil_to(
        dilution_total.times(c * 8) + BUFFER_DEAD_VOLUME,
        MICROLITRES_PER_MILLILITRE,
    );

    let mm = config.master_mix_volume();
    let mm_ten_k = ceil_to(mm.times(c * REPLICATES) + REAGENT_DEAD_VOLUME, 1);
    let mm_twenty_k = ceil_to(mm.times(c * REPLICATES + REPLICATES) + REAGENT_DEAD_VOLUME, 1);
    let standards = ceil_to(
        config.assay_sample_volume().times(REPLICATES) + REAGENT_DEAD_VOLUME,
        1,
    );

    let reagent_capacity = layout.reagent_well_capacity;
    vec![
        ReagentRequirement {
            reagent: Reagent::DilutionBuffer,
            well: buffer_well(),
            required: buffer,
            capacity: layout.reservoir_well_capacity,
        },
        ReagentRequirement {
            reagent: Reagent::MasterMix,
            well: master_mix_well(DilutionSeries::TenThousand),
            required: mm_ten_k,
            capacity: reagent_capacity,
        },
        ReagentRequirement {
            reagent: Reagent::MasterMix,
            well: master_mix_well(DilutionSeries::TwentyThousand),
            required: mm_twenty_k,
            capacity: reagent_capacity,
        },
        ReagentRequirement {
            reagent: Reagent::Standards,
            well: standards_well(),
            required: standards,
            capacity: reagent_capacity,
        },
    ]
}

/// First requirement that does not fit its well.
pub fn check_capacity(requirements: &[ReagentRequirement]) -> Result<(), ResourceExhaustedError> {
    match requirements.iter().find(|r| r.required > r.capacity) {
        Some(r) => Err(ResourceExhaustedError::ReagentCapacity {
            reagent: r.reagent,
            well: r.well,
            required: r.required,
            capacity: r.capacity,
        }),
        None => Ok(()),
    }
}

// =============================================================================
// TESTS
// =============================================================================
