//! Zone assignment
//!
//! Only the property named by the active criterion is consulted. An object
//! that is red, large and type_a goes to the "large" zone under `BySize` even
//! if a "red" zone exists.

use super::registry::ObjectRegistry;
use super::state::{Object, SortingCriteria, TargetZone};
use crate::error::RoutingError;

/// First zone (in configuration order) accepting `value`
pub fn zone_for_value<'a>(zones: &'a [TargetZone], value: &str) -> Option<&'a TargetZone> {
    zones.iter().find(|z| z.criteria_value == value)
}

impl ObjectRegistry {
    /// Destination zone for `object` under `criteria`
    pub fn target_zone(&self, object: &Object, criteria: SortingCriteria) -> Result<&TargetZone, RoutingError> {
        let value = object.criteria_value(criteria);
        zone_for_value(self.zones(), value).ok_or_else(|| RoutingError::NoZoneForValue {
            criteria,
            value: value.to_string(),
        })
    }
}
