//! Deterministic sorting cell simulation
//!
//! Everything that moves objects lives here. This module must stay
//! deterministic:
//! - Logical clock only, never wall time
//! - One seeded failure source per cycle, drawn in a fixed order
//! - Stable iteration order (by object id, zones in configuration order)

pub mod arm;
pub mod collision;
pub mod geometry;
pub mod registry;
pub mod rng;
pub mod routing;
pub mod state;
pub mod tick;

pub use arm::{Arm, ArmEvent, ArmParams, MovementResult, Workcell, transition};
pub use collision::{DetourPlanner, NoReroute, ReroutePlanner, first_collision, path_collides, swept_footprints};
pub use geometry::{BoundingBox, Path};
pub use registry::ObjectRegistry;
pub use rng::{Draw, FailureSource};
pub use routing::zone_for_value;
pub use state::{
    ArmState, Color, Object, ObjectId, ObjectSpec, ObjectState, ObjectType, OperationKind, OperationResult,
    SimClock, Size, SortingCriteria, SourceArea, TargetZone,
};
pub use tick::{CycleSummary, CycleTermination, Simulation, StepReport};
