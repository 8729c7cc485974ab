//! Robo Sort - A pick-and-place sorting cell simulation
//!
//! Core modules:
//! - `sim`: Deterministic simulation (arm state machine, registry, routing, run loop)
//! - `metrics`: Operation counters, cycle reports and report history
//! - `config`: Data-driven cell layout, failure rates and timing
//! - `error`: Typed errors for operations, configuration and cycles

pub mod config;
pub mod error;
pub mod metrics;
pub mod sim;

pub use config::SimConfig;
pub use error::{ConfigError, OperationError, SimError};
pub use metrics::{MetricsCollector, MetricsReport, MetricsSink};
pub use sim::{CycleSummary, CycleTermination, Simulation};

/// Cell configuration constants
pub mod consts {
    /// Object footprint half-extents by size
    pub const SMALL_HALF_EXTENT: f32 = 0.25;
    pub const MEDIUM_HALF_EXTENT: f32 = 0.35;
    pub const LARGE_HALF_EXTENT: f32 = 0.5;

    /// Retries allowed after the first attempt
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    /// Base retry backoff (simulated seconds, doubled per retry)
    pub const DEFAULT_RETRY_BACKOFF: f64 = 0.5;

    /// Arm travel speed (units per simulated second)
    pub const DEFAULT_ARM_SPEED: f64 = 5.0;
    pub const DEFAULT_GRASP_DURATION: f64 = 0.5;
    pub const DEFAULT_RELEASE_DURATION: f64 = 0.5;
    /// Time lost halting after a collision
    pub const DEFAULT_SETTLE_DURATION: f64 = 1.0;
    /// Half-width swept around the arm's path
    pub const DEFAULT_PATH_CLEARANCE: f32 = 0.25;

    /// Simulated seconds per cycle
    pub const DEFAULT_MAX_CYCLE_TIME: f64 = 600.0;
}
