//! Reading and timeline types consumed by every other component.

pub mod numeric;
/// Single device reading and the day/night rule.
pub mod reading;
pub mod timeline;

pub use reading::{DaytimeBand, Reading, WATT_MINUTES_PER_KWH, derive_energy_kwh};
pub use timeline::{Timeline, distinct_days};
