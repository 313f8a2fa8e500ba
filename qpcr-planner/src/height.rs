//! Height Tracker
//!
//! Each draining source well gets its own [`HeightLedger`]. A draw returns
//! the current clearance and lowers it by a fixed step; once the clearance
//! is no longer above the floor the ledger refuses further draws.

use qpcr_core::{LiquidLevelUnderflowError, Millimetres, Stage, WellRef};
use serde::{Deserialize, Serialize};

/// Start clearance, per-draw drop and floor for one draining well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightProfile {
    pub start: Millimetres,
    pub decrement: Millimetres,
    pub floor: Millimetres,
}

impl HeightProfile {
    pub const fn new(start: Millimetres, decrement: Millimetres, floor: Millimetres) -> Self {
        Self {
            start,
            decrement,
            floor,
        }
    }

    /// Profile whose start clearance grows linearly with the column count:
    /// `per_column * column_count + offset`.
    pub const fn affine(
        per_column: Millimetres,
        offset: Millimetres,
        column_count: usize,
        decrement: Millimetres,
        floor: Millimetres,
    ) -> Self {
        Self::new(
            Millimetres::from_hundredths(per_column.hundredths() * column_count as i64 + offset.hundredths()),
            decrement,
            floor,
        )
    }

    /// Draws this profile allows before reaching its floor.
    pub fn capacity(&self) -> usize {
        let headroom = self.start.hundredths() - self.floor.hundredths();
        if headroom <= 0 {
            return 0;
        }
        let step = self.decrement.hundredths();
        if step <= 0 {
            return usize::MAX;
        }
        ((headroom + step - 1) / step) as usize
    }
}

/// Running clearance of one source well within one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeightLedger {
    stage: Stage,
    well: WellRef,
    profile: HeightProfile,
    current: Millimetres,
    draws_issued: usize,
}

impl HeightLedger {
    pub fn open(stage: Stage, well: WellRef, profile: HeightProfile) -> Self {
        Self {
            stage,
            well,
            profile,
            current: profile.start,
            draws_issued: 0,
        }
    }

    /// Clearance for the next draw.
    pub fn draw(&mut self) -> Result<Millimetres, LiquidLevelUnderflowError> {
        if self.current <= self.profile.floor {
            tracing::error!(
                stage = %self.stage,
                well = %self.well,
                height = %self.current,
                floor = %self.profile.floor,
                draws_issued = self.draws_issued,
                "Liquid level underflow"
            );
            return Err(LiquidLevelUnderflowError {
                stage: self.stage,
                well: self.well,
                floor: self.profile.floor,
                attempted: self.current,
                draws_issued: self.draws_issued,
            });
        }
        let height = self.current;
        self.current -= self.profile.decrement;
        self.draws_issued += 1;
        Ok(height)
    }

    /// Issue `count` draws at once.
    pub fn draw_many(&mut self, count: usize) -> Result<Vec<Millimetres>, LiquidLevelUnderflowError> {
        (0..count).map(|_| self.draw()).collect()
    }

    pub fn well(&self) -> WellRef {
        self.well
    }

    pub fn current(&self) -> Millimetres {
        self.current
    }

    pub fn draws_issued(&self) -> usize {
        self.draws_issued
    }

    pub fn remaining_draws(&self) -> usize {
        HeightProfile {
            start: self.current,
            ..self.profile
        }
        .capacity()
    }
}

// =============================================================================
// TESTS
// =============================================================================
