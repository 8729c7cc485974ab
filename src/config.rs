//! Simulation configuration
//!
//! One serde bundle holding everything a cycle needs. Every field has a
//! default, so a partial JSON file only overrides what it names.

use std::collections::HashSet;
use std::path::Path;

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigError;
use crate::sim::geometry::BoundingBox;
use crate::sim::state::{Color, ObjectSpec, ObjectType, Size, SortingCriteria, SourceArea, TargetZone};

/// Source area layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub bounds: BoundingBox,
    pub capacity: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            bounds: BoundingBox::new(Vec2::ZERO, Vec2::new(10.0, 10.0)),
            capacity: 20,
        }
    }
}

/// Objects to create at initialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectsConfig {
    pub count: u32,
    /// Cycled when shorter than `count`; empty means random properties
    pub specs: Vec<ObjectSpec>,
}

impl Default for ObjectsConfig {
    fn default() -> Self {
        Self {
            count: 10,
            specs: Vec::new(),
        }
    }
}

/// One target zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub id: String,
    pub bounds: BoundingBox,
    pub capacity: u32,
    pub criteria_value: String,
}

impl ZoneConfig {
    fn to_zone(&self) -> TargetZone {
        TargetZone::new(self.id.clone(), self.bounds, self.capacity, self.criteria_value.clone())
    }
}

/// Failure probabilities, each in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureConfig {
    pub missed_pick_probability: f64,
    /// Spurious collisions; rerouted once without a new draw, so they only
    /// fail a move that has no clear detour
    pub collision_probability: f64,
    pub place_failure_probability: f64,
}

impl Default for FailureConfig {
    fn default() -> Self {
        Self {
            missed_pick_probability: 0.1,
            collision_probability: 0.05,
            place_failure_probability: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_pick_retries: u32,
    pub max_place_retries: u32,
    /// Base logical backoff (seconds), doubled per retry
    pub backoff: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_pick_retries: DEFAULT_MAX_RETRIES,
            max_place_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Arm motion and timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub arm_speed: f64,
    pub grasp_duration: f64,
    pub release_duration: f64,
    pub settle_duration: f64,
    pub path_clearance: f32,
    /// Where the arm starts each cycle
    pub home: Vec2,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            arm_speed: DEFAULT_ARM_SPEED,
            grasp_duration: DEFAULT_GRASP_DURATION,
            release_duration: DEFAULT_RELEASE_DURATION,
            settle_duration: DEFAULT_SETTLE_DURATION,
            path_clearance: DEFAULT_PATH_CLEARANCE,
            home: Vec2::new(5.0, 15.0),
        }
    }
}

/// Complete simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed seed for reproducible runs; random (and logged) when absent
    pub seed: Option<u64>,
    pub sorting_criteria: SortingCriteria,
    pub source_area: SourceConfig,
    pub objects: ObjectsConfig,
    pub zones: Vec<ZoneConfig>,
    pub failures: FailureConfig,
    pub retries: RetryConfig,
    pub motion: MotionConfig,
    /// Simulated seconds before a cycle is cut short
    pub max_cycle_time: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        // One zone per color in a row above the source area
        let zones = Color::ALL
            .iter()
            .enumerate()
            .map(|(i, color)| {
                let x = i as f32 * 6.0 - 4.0;
                ZoneConfig {
                    id: format!("zone_{}", color.as_str()),
                    bounds: BoundingBox::new(Vec2::new(x, 20.0), Vec2::new(x + 5.0, 25.0)),
                    capacity: 10,
                    criteria_value: color.as_str().to_string(),
                }
            })
            .collect();

        Self {
            seed: None,
            sorting_criteria: SortingCriteria::ByColor,
            source_area: SourceConfig::default(),
            objects: ObjectsConfig::default(),
            zones,
            failures: FailureConfig::default(),
            retries: RetryConfig::default(),
            motion: MotionConfig::default(),
            max_cycle_time: DEFAULT_MAX_CYCLE_TIME,
        }
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ProbabilityOutOfRange { name, value })
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidDuration { name, value })
    }
}

fn check_non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NegativeValue { name, value })
    }
}

fn check_bounds(name: impl Into<String>, bounds: &BoundingBox) -> Result<(), ConfigError> {
    if bounds.is_valid() {
        Ok(())
    } else {
        Err(ConfigError::InvertedBounds { name: name.into() })
    }
}

impl SimConfig {
    /// Reject bundles a cycle cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("missed_pick_probability", self.failures.missed_pick_probability)?;
        check_probability("collision_probability", self.failures.collision_probability)?;
        check_probability("place_failure_probability", self.failures.place_failure_probability)?;

        if self.retries.max_pick_retries == 0 {
            return Err(ConfigError::InvalidRetryLimit { name: "max_pick_retries" });
        }
        if self.retries.max_place_retries == 0 {
            return Err(ConfigError::InvalidRetryLimit { name: "max_place_retries" });
        }
        check_non_negative("backoff", self.retries.backoff)?;

        check_positive("arm_speed", self.motion.arm_speed)?;
        check_positive("grasp_duration", self.motion.grasp_duration)?;
        check_positive("release_duration", self.motion.release_duration)?;
        check_positive("settle_duration", self.motion.settle_duration)?;
        check_positive("max_cycle_time", self.max_cycle_time)?;
        check_non_negative("path_clearance", f64::from(self.motion.path_clearance))?;

        check_bounds("source_area", &self.source_area.bounds)?;

        let criteria = self.sorting_criteria;
        let mut seen = HashSet::new();
        for zone in &self.zones {
            if zone.id.is_empty() {
                return Err(ConfigError::EmptyZoneId);
            }
            if !seen.insert(zone.id.as_str()) {
                return Err(ConfigError::DuplicateZone(zone.id.clone()));
            }
            check_bounds(format!("zone {}", zone.id), &zone.bounds)?;
            if !criteria.accepts(&zone.criteria_value) {
                return Err(ConfigError::ZoneCriterionMismatch {
                    zone: zone.id.clone(),
                    value: zone.criteria_value.clone(),
                    criteria,
                });
            }
        }

        // Every value an object can route on needs a zone
        let required: Vec<&str> = if self.objects.specs.is_empty() {
            criteria.domain()
        } else {
            self.objects
                .specs
                .iter()
                .map(|spec| spec_value(spec, criteria))
                .collect()
        };
        for value in required {
            if !self.zones.iter().any(|z| z.criteria_value == value) {
                return Err(ConfigError::MissingZone {
                    criteria,
                    value: value.to_string(),
                });
            }
        }

        if self.objects.count > self.source_area.capacity {
            return Err(ConfigError::SourceOverCapacity {
                count: self.objects.count,
                capacity: self.source_area.capacity,
            });
        }

        Ok(())
    }

    pub fn source(&self) -> SourceArea {
        SourceArea {
            bounds: self.source_area.bounds,
            capacity: self.source_area.capacity,
        }
    }

    pub fn target_zones(&self) -> Vec<TargetZone> {
        self.zones.iter().map(ZoneConfig::to_zone).collect()
    }

    /// The `count` objects to create, cycling configured specs or drawing
    /// random properties from the layout stream
    pub fn object_specs(&self, layout: &mut Pcg32) -> Vec<ObjectSpec> {
        let count = self.objects.count as usize;
        if self.objects.specs.is_empty() {
            return (0..count)
                .map(|_| {
                    ObjectSpec::new(
                        Color::ALL[layout.random_range(0..Color::ALL.len())],
                        Size::ALL[layout.random_range(0..Size::ALL.len())],
                        ObjectType::ALL[layout.random_range(0..ObjectType::ALL.len())],
                    )
                })
                .collect();
        }
        self.objects.specs.iter().cycle().take(count).cloned().collect()
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read, parse and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        config.validate()?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;
        log::info!("Config saved to {}", path.display());
        Ok(())
    }
}

fn spec_value(spec: &ObjectSpec, criteria: SortingCriteria) -> &'static str {
    match criteria {
        SortingCriteria::ByColor => spec.color.as_str(),
        SortingCriteria::BySize => spec.size.as_str(),
        SortingCriteria::ByType => spec.object_type.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::rng::FailureSource;

    #[test]
    fn test_default_is_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn test_default_zones_do_not_overlap_source() {
        let config = SimConfig::default();
        for zone in &config.zones {
            assert!(!zone.bounds.intersects(&config.source_area.bounds));
        }
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let mut config = SimConfig::default();
        config.seed = Some(7);
        config.objects.specs = vec![ObjectSpec::new(Color::Red, Size::Large, ObjectType::TypeB).at(Vec2::new(1.0, 2.0))];
        let path = std::env::temp_dir().join(format!("robo_sort_config_{}.json", std::process::id()));
        config.save(&path).unwrap();
        let loaded = SimConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SimConfig::from_json(r#"{ "seed": 5, "retries": { "max_pick_retries": 1 } }"#).unwrap();
        assert_eq!(config.seed, Some(5));
        assert_eq!(config.retries.max_pick_retries, 1);
        assert_eq!(config.retries.max_place_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.zones.len(), 4);
    }

    #[test]
    fn test_negative_count_fails_to_parse() {
        let err = SimConfig::from_json(r#"{ "objects": { "count": -1 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_rejects_bad_probabilities() {
        let mut config = SimConfig::default();
        config.failures.missed_pick_probability = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ProbabilityOutOfRange { name: "missed_pick_probability", .. })
        ));

        let mut config = SimConfig::default();
        config.failures.collision_probability = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ProbabilityOutOfRange { name: "collision_probability", .. })
        ));
    }

    #[test]
    fn test_rejects_zero_retry_limit() {
        let mut config = SimConfig::default();
        config.retries.max_place_retries = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRetryLimit { name: "max_place_retries" })
        ));
    }

    #[test]
    fn test_rejects_non_positive_timing() {
        let mut config = SimConfig::default();
        config.motion.arm_speed = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDuration { name: "arm_speed", .. })));

        let mut config = SimConfig::default();
        config.max_cycle_time = f64::INFINITY;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDuration { .. })));

        let mut config = SimConfig::default();
        config.retries.backoff = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::NegativeValue { name: "backoff", .. })));
    }

    #[test]
    fn test_rejects_inverted_zone_bounds() {
        let mut config = SimConfig::default();
        config.zones[0].bounds = BoundingBox {
            min: Vec2::new(5.0, 5.0),
            max: Vec2::new(0.0, 0.0),
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvertedBounds { .. })));
    }

    #[test]
    fn test_rejects_zone_ids() {
        let mut config = SimConfig::default();
        config.zones[1].id = config.zones[0].id.clone();
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateZone(_))));

        let mut config = SimConfig::default();
        config.zones[0].id.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyZoneId)));
    }

    #[test]
    fn test_rejects_zone_outside_criterion() {
        let mut config = SimConfig::default();
        config.zones[0].criteria_value = "large".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZoneCriterionMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_missing_zone() {
        // Generated objects can be any color
        let mut config = SimConfig::default();
        config.zones.pop();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingZone { value, .. }) if value == "yellow"
        ));

        // Explicit specs only need their own values covered
        config.objects.specs = vec![ObjectSpec::new(Color::Red, Size::Small, ObjectType::TypeA)];
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_too_many_objects() {
        let mut config = SimConfig::default();
        config.objects.count = config.source_area.capacity + 1;
        assert!(matches!(config.validate(), Err(ConfigError::SourceOverCapacity { .. })));
    }

    #[test]
    fn test_object_specs_cycle() {
        let mut config = SimConfig::default();
        config.objects.count = 5;
        config.objects.specs = vec![
            ObjectSpec::new(Color::Red, Size::Small, ObjectType::TypeA),
            ObjectSpec::new(Color::Blue, Size::Large, ObjectType::TypeC),
        ];
        let specs = config.object_specs(&mut FailureSource::layout_rng(1));
        let colors: Vec<Color> = specs.iter().map(|s| s.color).collect();
        assert_eq!(colors, vec![Color::Red, Color::Blue, Color::Red, Color::Blue, Color::Red]);
    }

    #[test]
    fn test_generated_specs_are_seeded() {
        let config = SimConfig::default();
        let a = config.object_specs(&mut FailureSource::layout_rng(3));
        let b = config.object_specs(&mut FailureSource::layout_rng(3));
        assert_eq!(a.len(), 10);
        assert_eq!(a, b);
    }
}
