//! Relational-style joins between feature sets.
//!
//! - [`spatial_join`]: inner join of point subjects against region polygons
//!   by geometric containment.
//! - [`left_join`]: attribute table join by key, preserving every base row.

mod spatial;
mod table;

pub use spatial::{PreparedSpatialJoin, spatial_join};
pub use table::{ensure_unique_key, left_join};
