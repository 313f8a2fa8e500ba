//! qPCR Layout - Column Geometry and Quadrant Mapping
//!
//! Pure arithmetic over plate grids. Nothing here knows about volumes,
//! heights or tips.

pub mod geometry;
pub mod quadrant;

pub use geometry::{column_count, GeometryResolver, EXPECTED_PLATES, SAMPLES_PER_COLUMN};
pub use quadrant::{
    assay_column, Placement, QuadrantMapper, QUADRANT_CAPACITY, SERIES_BLOCK_COLUMNS,
    STANDARDS_COLUMNS, STANDARDS_ROW,
};
