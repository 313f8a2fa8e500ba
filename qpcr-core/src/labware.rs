//! Labware, wells and deck layout
//!
//! The planner never touches real labware definitions. It holds opaque
//! catalog names, plate dimensions as reported by the driver, and
//! `(plate, row, column)` well references.

use crate::{ConfigurationError, Microlitres, Phase, Pipette};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// PLATES
// ============================================================================

/// Role a plate plays in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlateRole {
    /// Starting library samples
    SamplePlate,
    /// 1:500 deep-well plate
    Dilution1,
    /// 1:10,000 plate
    Dilution2,
    /// 1:20,000 plate
    Dilution3,
    /// Four-trough buffer reservoir
    Reservoir,
    /// Master mix and standards, on the temperature module
    ReagentPlate,
    /// 384-well qPCR plate
    AssayPlate,
}

impl fmt::Display for PlateRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlateRole::SamplePlate => "sample_plate",
            PlateRole::Dilution1 => "dilution_plate_1",
            PlateRole::Dilution2 => "dilution_plate_2",
            PlateRole::Dilution3 => "dilution_plate_3",
            PlateRole::Reservoir => "reservoir",
            PlateRole::ReagentPlate => "reagent_plate",
            PlateRole::AssayPlate => "assay_plate",
        };
        f.write_str(name)
    }
}

/// Addressable grid dimensions of a plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlateGeometry {
    pub rows: usize,
    pub columns: usize,
}

impl PlateGeometry {
    pub const WELLS_96: PlateGeometry = PlateGeometry { rows: 8, columns: 12 };
    pub const WELLS_384: PlateGeometry = PlateGeometry { rows: 16, columns: 24 };
    pub const RESERVOIR_4: PlateGeometry = PlateGeometry { rows: 1, columns: 4 };

    pub fn contains(&self, row: usize, column: usize) -> bool {
        row < self.rows && column < self.columns
    }

    /// Row spacing between adjacent channels of an 8-channel head, or `None`
    /// for trough labware where every channel lands in the same well.
    pub fn channel_row_stride(&self) -> Option<usize> {
        let channels = Pipette::CHANNELS as usize;
        if self.rows >= channels && self.rows % channels == 0 {
            Some(self.rows / channels)
        } else {
            None
        }
    }
}

impl fmt::Display for PlateGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.columns)
    }
}

// ============================================================================
// WELLS
// ============================================================================

static WELL_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Pa-p])([1-9][0-9]?)$").expect("Invalid well label regex"));

/// Reference to a single well: plate role plus 0-based row and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WellRef {
    pub plate: PlateRole,
    pub row: usize,
    pub column: usize,
}

impl WellRef {
    pub const fn new(plate: PlateRole, row: usize, column: usize) -> Self {
        Self { plate, row, column }
    }

    /// Head well of the given column (row A).
    pub const fn column_head(plate: PlateRole, column: usize) -> Self {
        Self::new(plate, 0, column)
    }

    /// Parse an `A1`-style label.
    pub fn parse(plate: PlateRole, label: &str) -> Result<Self, ConfigurationError> {
        let invalid = || ConfigurationError::InvalidWellLabel {
            label: label.to_string(),
        };
        let caps = WELL_LABEL.captures(label.trim()).ok_or_else(invalid)?;
        let row_char = caps
            .get(1)
            .and_then(|m| m.as_str().chars().next())
            .ok_or_else(invalid)?
            .to_ascii_uppercase();
        let column: usize = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(invalid)?;
        Ok(Self::new(plate, (row_char as u8 - b'A') as usize, column - 1))
    }

    /// `A1`-style label.
    pub fn label(&self) -> String {
        let row = (b'A' + (self.row % 26) as u8) as char;
        format!("{}{}", row, self.column + 1)
    }

    /// The eight physical wells an 8-channel head touches when its first
    /// channel is placed on this well. Returns `None` if any channel would
    /// land outside the plate.
    pub fn channel_wells(&self, geometry: &PlateGeometry) -> Option<Vec<WellRef>> {
        if !geometry.contains(self.row, self.column) {
            return None;
        }
        match geometry.channel_row_stride() {
            Some(stride) => {
                if self.row >= stride {
                    return None;
                }
                Some(
                    (0..Pipette::CHANNELS as usize)
                        .map(|k| WellRef::new(self.plate, self.row + k * stride, self.column))
                        .collect(),
                )
            }
            None => Some(vec![*self]),
        }
    }
}

impl fmt::Display for WellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.plate, self.label())
    }
}

// ============================================================================
// DECK
// ============================================================================

/// Numbered deck position, 1 through 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DeckSlot(u8);

impl DeckSlot {
    pub const MAX: u8 = 12;

    pub fn new(slot: u8) -> Result<Self, ConfigurationError> {
        if (1..=Self::MAX).contains(&slot) {
            Ok(Self(slot))
        } else {
            Err(ConfigurationError::InvalidDeckSlot { slot })
        }
    }

    pub const fn number(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for DeckSlot {
    type Error = ConfigurationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        DeckSlot::new(value)
    }
}

impl From<DeckSlot> for u8 {
    fn from(slot: DeckSlot) -> Self {
        slot.0
    }
}

impl fmt::Display for DeckSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A plate placed on the deck for one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedLabware {
    pub role: PlateRole,
    /// Opaque catalog name; resolved by the driver.
    pub load_name: String,
    pub slot: DeckSlot,
    pub geometry: PlateGeometry,
    pub on_temperature_module: bool,
}

/// Slots the driver makes available for one pipette's tip racks, in fill order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipRackSlots {
    pub pipette: Pipette,
    pub slots: Vec<DeckSlot>,
}

/// Deck contents for one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseDeck {
    pub phase: Phase,
    pub labware: Vec<PlacedLabware>,
    pub tip_racks: Vec<TipRackSlots>,
}

/// Driver-reported deck layout and well capacities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckLayout {
    pub phases: Vec<PhaseDeck>,
    /// Usable volume of one reservoir trough
    pub reservoir_well_capacity: Microlitres,
    /// Usable volume of one reagent-plate well
    pub reagent_well_capacity: Microlitres,
}

impl DeckLayout {
    /// Layout of the reference deck: Agilent 4-trough reservoir, Bio-Rad
    /// hard-shell plates, a PerkinElmer 2 mL deep-well plate and a Bio-Rad
    /// 384-well assay plate.
    pub fn standard() -> Self {
        let slot = |n: u8| DeckSlot(n);
        let plate = |role, load_name: &str, n: u8, geometry, on_temperature_module| PlacedLabware {
            role,
            load_name: load_name.to_string(),
            slot: slot(n),
            geometry,
            on_temperature_module,
        };
        let biorad_96 = "biorad_96_wellplate_200ul_pcr";

        Self {
            phases: vec![
                PhaseDeck {
                    phase: Phase::Dilution,
                    labware: vec![
                        plate(PlateRole::SamplePlate, biorad_96, 1, PlateGeometry::WELLS_96, false),
                        plate(
                            PlateRole::Dilution1,
                            "perkinelmer_96_wellplate_2000ul",
                            2,
                            PlateGeometry::WELLS_96,
                            false,
                        ),
                        plate(PlateRole::Dilution2, biorad_96, 3, PlateGeometry::WELLS_96, false),
                        plate(
                            PlateRole::Reservoir,
                            "agilent_4_well_73_ml_reagent_reservoir",
                            4,
                            PlateGeometry::RESERVOIR_4,
                            false,
                        ),
                        plate(PlateRole::Dilution3, biorad_96, 10, PlateGeometry::WELLS_96, true),
                    ],
                    tip_racks: vec![
                        TipRackSlots {
                            pipette: Pipette::P300Multi,
                            slots: vec![slot(5), slot(6), slot(7), slot(8)],
                        },
                        TipRackSlots {
                            pipette: Pipette::P20Multi,
                            slots: vec![slot(9)],
                        },
                    ],
                },
                PhaseDeck {
                    phase: Phase::AssaySetup,
                    labware: vec![
                        plate(
                            PlateRole::AssayPlate,
                            "biorad_384_wellplate_50ul",
                            1,
                            PlateGeometry::WELLS_384,
                            false,
                        ),
                        plate(PlateRole::Dilution2, biorad_96, 2, PlateGeometry::WELLS_96, false),
                        plate(PlateRole::Dilution3, biorad_96, 3, PlateGeometry::WELLS_96, false),
                        plate(PlateRole::ReagentPlate, biorad_96, 10, PlateGeometry::WELLS_96, true),
                    ],
                    tip_racks: vec![TipRackSlots {
                        pipette: Pipette::P20Multi,
                        slots: [4, 5, 6, 7, 8, 9, 11].into_iter().map(slot).collect(),
                    }],
                },
            ],
            reservoir_well_capacity: Microlitres::from_whole(73_000),
            reagent_well_capacity: Microlitres::from_whole(200),
        }
    }

    pub fn deck(&self, phase: Phase) -> Option<&PhaseDeck> {
        self.phases.iter().find(|d| d.phase == phase)
    }

    /// Geometry of a plate role within a phase.
    pub fn geometry(&self, phase: Phase, role: PlateRole) -> Option<PlateGeometry> {
        self.deck(phase)?
            .labware
            .iter()
            .find(|l| l.role == role)
            .map(|l| l.geometry)
    }

    /// Tip-rack slots available to `pipette` in `phase`; empty if none.
    pub fn tip_rack_slots(&self, phase: Phase, pipette: Pipette) -> &[DeckSlot] {
        self.deck(phase)
            .and_then(|d| d.tip_racks.iter().find(|t| t.pipette == pipette))
            .map(|t| t.slots.as_slice())
            .unwrap_or(&[])
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_label_round_trip() {
        let well = WellRef::parse(PlateRole::AssayPlate, "B13").unwrap();
        assert_eq!(well, WellRef::new(PlateRole::AssayPlate, 1, 12));
        assert_eq!(well.label(), "B13");
        assert_eq!(WellRef::parse(PlateRole::AssayPlate, "p24").unwrap().label(), "P24");
    }

    #[test]
    fn test_well_label_rejects_garbage() {
        assert!(WellRef::parse(PlateRole::SamplePlate, "Z1").is_err());
        assert!(WellRef::parse(PlateRole::SamplePlate, "A0").is_err());
        assert!(WellRef::parse(PlateRole::SamplePlate, "A").is_err());
        assert!(WellRef::parse(PlateRole::SamplePlate, "").is_err());
    }

    #[test]
    fn test_channel_wells_on_96() {
        let wells = WellRef::column_head(PlateRole::Dilution2, 3)
            .channel_wells(&PlateGeometry::WELLS_96)
            .unwrap();
        assert_eq!(wells.len(), 8);
        assert_eq!(wells[0].label(), "A4");
        assert_eq!(wells[7].label(), "H4");
    }

    #[test]
    fn test_channel_wells_on_384_interleave() {
        let a = WellRef::new(PlateRole::AssayPlate, 0, 0)
            .channel_wells(&PlateGeometry::WELLS_384)
            .unwrap();
        let b = WellRef::new(PlateRole::AssayPlate, 1, 0)
            .channel_wells(&PlateGeometry::WELLS_384)
            .unwrap();
        let a_labels: Vec<String> = a.iter().map(|w| w.label()).collect();
        assert_eq!(a_labels, vec!["A1", "C1", "E1", "G1", "I1", "K1", "M1", "O1"]);
        assert_eq!(b[7].label(), "P1");
        assert!(a.iter().all(|w| !b.contains(w)));
    }

    #[test]
    fn test_channel_wells_rejects_low_head_row() {
        assert!(WellRef::new(PlateRole::AssayPlate, 2, 0)
            .channel_wells(&PlateGeometry::WELLS_384)
            .is_none());
        assert!(WellRef::new(PlateRole::SamplePlate, 0, 12)
            .channel_wells(&PlateGeometry::WELLS_96)
            .is_none());
    }

    #[test]
    fn test_reservoir_is_single_well() {
        let wells = WellRef::column_head(PlateRole::Reservoir, 0)
            .channel_wells(&PlateGeometry::RESERVOIR_4)
            .unwrap();
        assert_eq!(wells.len(), 1);
    }

    #[test]
    fn test_deck_slot_bounds() {
        assert!(DeckSlot::new(0).is_err());
        assert!(DeckSlot::new(13).is_err());
        assert_eq!(DeckSlot::new(11).unwrap().number(), 11);
        let parsed: Result<DeckSlot, _> = serde_json::from_str("14");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_standard_layout_tip_slots() {
        let deck = DeckLayout::standard();
        let p300: Vec<u8> = deck
            .tip_rack_slots(Phase::Dilution, Pipette::P300Multi)
            .iter()
            .map(|s| s.number())
            .collect();
        assert_eq!(p300, vec![5, 6, 7, 8]);
        assert_eq!(deck.tip_rack_slots(Phase::AssaySetup, Pipette::P20Multi).len(), 7);
        assert!(deck.tip_rack_slots(Phase::AssaySetup, Pipette::P300Multi).is_empty());
    }

    #[test]
    fn test_standard_layout_geometries() {
        let deck = DeckLayout::standard();
        assert_eq!(
            deck.geometry(Phase::AssaySetup, PlateRole::AssayPlate),
            Some(PlateGeometry::WELLS_384)
        );
        assert_eq!(
            deck.geometry(Phase::Dilution, PlateRole::Reservoir),
            Some(PlateGeometry::RESERVOIR_4)
        );
        assert_eq!(deck.geometry(Phase::Dilution, PlateRole::AssayPlate), None);
    }
}
