//! Workcell state and core simulation types
//!
//! Everything the registry, arm and run loop share lives here.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geometry::BoundingBox;
use crate::consts::*;
use crate::error::OperationError;

/// Stable object identity, assigned in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj_{}", self.0)
    }
}

/// Object color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Red,
    Blue,
    Green,
    Yellow,
}

impl Color {
    pub const ALL: [Color; 4] = [Color::Red, Color::Blue, Color::Green, Color::Yellow];

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Blue => "blue",
            Color::Green => "green",
            Color::Yellow => "yellow",
        }
    }
}

/// Object size class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Size {
    Small,
    Medium,
    Large,
}

impl Size {
    pub const ALL: [Size; 3] = [Size::Small, Size::Medium, Size::Large];

    pub fn as_str(&self) -> &'static str {
        match self {
            Size::Small => "small",
            Size::Medium => "medium",
            Size::Large => "large",
        }
    }

    /// Half the side length of the object's footprint
    pub fn half_extent(&self) -> f32 {
        match self {
            Size::Small => SMALL_HALF_EXTENT,
            Size::Medium => MEDIUM_HALF_EXTENT,
            Size::Large => LARGE_HALF_EXTENT,
        }
    }
}

/// Object type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    TypeA,
    TypeB,
    TypeC,
}

impl ObjectType {
    pub const ALL: [ObjectType; 3] = [ObjectType::TypeA, ObjectType::TypeB, ObjectType::TypeC];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::TypeA => "type_a",
            ObjectType::TypeB => "type_b",
            ObjectType::TypeC => "type_c",
        }
    }
}

/// Which object property drives zone assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortingCriteria {
    #[default]
    ByColor,
    BySize,
    ByType,
}

impl SortingCriteria {
    /// Every value the criterion's property can take
    pub fn domain(&self) -> Vec<&'static str> {
        match self {
            SortingCriteria::ByColor => Color::ALL.iter().map(Color::as_str).collect(),
            SortingCriteria::BySize => Size::ALL.iter().map(Size::as_str).collect(),
            SortingCriteria::ByType => ObjectType::ALL.iter().map(ObjectType::as_str).collect(),
        }
    }

    /// Whether `value` is one of the criterion's property values
    pub fn accepts(&self, value: &str) -> bool {
        self.domain().contains(&value)
    }
}

/// Which container currently claims an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectState {
    InSource,
    Held,
    InZone,
}

/// Properties (and optional fixed position) of an object to create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub color: Color,
    pub size: Size,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    /// Explicit home position; grid slot in the source area when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec2>,
}

impl ObjectSpec {
    pub fn new(color: Color, size: Size, object_type: ObjectType) -> Self {
        Self {
            color,
            size,
            object_type,
            position: None,
        }
    }

    pub fn at(mut self, position: Vec2) -> Self {
        self.position = Some(position);
        self
    }
}

/// A sortable object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub id: ObjectId,
    pub color: Color,
    pub size: Size,
    pub object_type: ObjectType,
    /// Current position (follows the arm while held)
    pub position: Vec2,
    /// Slot in the source area the object returns to
    pub home: Vec2,
    pub state: ObjectState,
    /// Occupied zone, set only while `InZone`
    pub zone: Option<String>,
}

impl Object {
    /// Footprint at the current position
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::around(self.position, self.size.half_extent())
    }

    /// The property value the criterion routes on
    pub fn criteria_value(&self, criteria: SortingCriteria) -> &'static str {
        match criteria {
            SortingCriteria::ByColor => self.color.as_str(),
            SortingCriteria::BySize => self.size.as_str(),
            SortingCriteria::ByType => self.object_type.as_str(),
        }
    }
}

/// Where unsorted objects wait
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceArea {
    pub bounds: BoundingBox,
    pub capacity: u32,
}

/// A capacity-limited destination keyed to one property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetZone {
    pub id: String,
    pub bounds: BoundingBox,
    pub capacity: u32,
    /// Accepted property value, e.g. "red", "large", "type_a"
    pub criteria_value: String,
    /// Live occupant count, mutated only by the registry
    pub(crate) current_count: u32,
}

impl TargetZone {
    pub fn new(id: impl Into<String>, bounds: BoundingBox, capacity: u32, criteria_value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bounds,
            capacity,
            criteria_value: criteria_value.into(),
            current_count: 0,
        }
    }

    pub fn current_count(&self) -> u32 {
        self.current_count
    }

    pub fn is_full(&self) -> bool {
        self.current_count >= self.capacity
    }

    /// Where the next occupant is set down
    pub fn drop_point(&self) -> Vec2 {
        if self.is_full() {
            return self.bounds.center();
        }
        self.bounds
            .grid_cell_center(self.current_count as usize, self.capacity as usize)
    }
}

/// Current state of the arm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmState {
    #[default]
    Idle,
    Moving,
    Picking,
    Holding,
    Placing,
}

/// Kind of arm operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Pick,
    Place,
}

/// Terminal outcome of one pick or place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub kind: OperationKind,
    pub object_id: Option<ObjectId>,
    pub error: Option<OperationError>,
    /// Retries consumed (attempts beyond the first)
    pub retry_count: u32,
    /// Simulated seconds since cycle start
    pub timestamp: f64,
}

impl OperationResult {
    pub fn succeeded(kind: OperationKind, object_id: ObjectId, retry_count: u32, timestamp: f64) -> Self {
        Self {
            success: true,
            kind,
            object_id: Some(object_id),
            error: None,
            retry_count,
            timestamp,
        }
    }

    pub fn failed(
        kind: OperationKind,
        object_id: Option<ObjectId>,
        error: OperationError,
        retry_count: u32,
        timestamp: f64,
    ) -> Self {
        Self {
            success: false,
            kind,
            object_id,
            error: Some(error),
            retry_count,
            timestamp,
        }
    }
}

/// Logical simulation clock (seconds)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimClock {
    now: f64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn advance(&mut self, seconds: f64) {
        if seconds > 0.0 {
            self.now += seconds;
        }
    }

    pub fn reset(&mut self) {
        self.now = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_string_values() {
        assert_eq!(Color::Red.as_str(), "red");
        assert_eq!(Size::Large.as_str(), "large");
        assert_eq!(ObjectType::TypeA.as_str(), "type_a");
        assert_eq!(serde_json::to_string(&ObjectType::TypeB).unwrap(), "\"type_b\"");
        assert_eq!(
            serde_json::to_string(&SortingCriteria::BySize).unwrap(),
            "\"by_size\""
        );
    }

    #[test]
    fn test_criteria_domains() {
        assert!(SortingCriteria::ByColor.accepts("yellow"));
        assert!(!SortingCriteria::ByColor.accepts("large"));
        assert_eq!(SortingCriteria::BySize.domain().len(), 3);
        assert!(SortingCriteria::ByType.accepts("type_c"));
    }

    #[test]
    fn test_zone_fullness_and_drop_points() {
        let bounds = BoundingBox::new(Vec2::new(20.0, 0.0), Vec2::new(24.0, 4.0));
        let mut zone = TargetZone::new("red", bounds, 4, "red");
        assert!(!zone.is_full());
        let first = zone.drop_point();
        zone.current_count = 1;
        let second = zone.drop_point();
        assert_ne!(first, second);
        assert!(bounds.contains(first) && bounds.contains(second));
        zone.current_count = 4;
        assert!(zone.is_full());
        assert_eq!(zone.drop_point(), bounds.center());

        let closed = TargetZone::new("none", bounds, 0, "red");
        assert!(closed.is_full());
    }

    #[test]
    fn test_object_routes_on_selected_property() {
        let obj = Object {
            id: ObjectId(0),
            color: Color::Blue,
            size: Size::Small,
            object_type: ObjectType::TypeC,
            position: Vec2::ZERO,
            home: Vec2::ZERO,
            state: ObjectState::InSource,
            zone: None,
        };
        assert_eq!(obj.criteria_value(SortingCriteria::ByColor), "blue");
        assert_eq!(obj.criteria_value(SortingCriteria::BySize), "small");
        assert_eq!(obj.criteria_value(SortingCriteria::ByType), "type_c");
        assert_eq!(obj.bounds().size(), Vec2::splat(Size::Small.half_extent() * 2.0));
    }

    #[test]
    fn test_clock_only_moves_forward() {
        let mut clock = SimClock::new();
        clock.advance(1.5);
        clock.advance(-3.0);
        assert_eq!(clock.now(), 1.5);
        clock.reset();
        assert_eq!(clock.now(), 0.0);
    }
}
