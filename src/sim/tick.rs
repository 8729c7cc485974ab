//! Cycle run loop
//!
//! [`Simulation`] is the whole context of a sorting cycle: registry, arm,
//! failure source, clock, metrics sink and configuration. A step takes the
//! next object in the source area through pick and place; a cycle repeats
//! steps until the source is empty or the time budget runs out.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::arm::{Arm, ArmParams, Workcell};
use super::collision::{DetourPlanner, ReroutePlanner};
use super::registry::ObjectRegistry;
use super::rng::FailureSource;
use super::state::{ObjectId, OperationResult, SimClock, SortingCriteria};
use crate::config::SimConfig;
use crate::error::{OperationError, RegistryError, SimError};
use crate::metrics::{MetricsCollector, MetricsReport, MetricsSink};

/// Why a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleTermination {
    /// Source area is empty
    Completed,
    /// Clock reached `max_cycle_time` with objects left
    TimeBudgetExhausted,
}

/// Outcome of a full cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub termination: CycleTermination,
    /// Simulated seconds
    pub elapsed: f64,
    pub steps: u32,
    /// Objects still in the source area
    pub remaining: usize,
}

/// What one step did
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub object_id: ObjectId,
    pub zone_id: String,
    pub pick: OperationResult,
    /// Present only when the pick succeeded
    pub place: Option<OperationResult>,
}

/// Simulation context for one sorting cell
#[derive(Debug)]
pub struct Simulation<M: MetricsSink = MetricsCollector> {
    config: SimConfig,
    seed: u64,
    registry: ObjectRegistry,
    arm: Arm,
    failures: FailureSource,
    clock: SimClock,
    metrics: M,
    /// Last object selected; the next step starts after it
    cursor: Option<ObjectId>,
}

impl<M: MetricsSink> Simulation<M> {
    /// Validate `config`, lay out the cell and put the arm at home
    pub fn initialize(config: SimConfig, metrics: M) -> Result<Self, SimError> {
        Self::with_planner(config, metrics, Box::new(DetourPlanner::default()))
    }

    /// As [`Simulation::initialize`], with a custom reroute strategy
    pub fn with_planner(config: SimConfig, metrics: M, planner: Box<dyn ReroutePlanner>) -> Result<Self, SimError> {
        config.validate()?;

        let seed = match config.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::rng().random();
                log::info!("No seed configured, using random seed {seed}");
                seed
            }
        };

        let mut registry = ObjectRegistry::new(config.source(), config.target_zones());
        let specs = config.object_specs(&mut FailureSource::layout_rng(seed));
        registry.create_objects(&specs)?;

        let arm = Arm::new(config.motion.home, ArmParams::from_config(&config), planner);

        log::info!(
            "Initialized cell: {} objects, {} zones, sorting {:?}, seed {}",
            registry.objects().len(),
            registry.zones().len(),
            config.sorting_criteria,
            seed
        );

        Ok(Self {
            config,
            seed,
            registry,
            arm,
            failures: FailureSource::new(seed),
            clock: SimClock::new(),
            metrics,
            cursor: None,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Seed in effect (configured or drawn at initialization)
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn arm(&self) -> &Arm {
        &self.arm
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut M {
        &mut self.metrics
    }

    pub fn into_metrics(self) -> M {
        self.metrics
    }

    /// Next source object in creation order after the cursor, wrapping
    fn next_object(&self) -> Option<ObjectId> {
        let available = self.registry.available_objects();
        let cursor = self.cursor;
        available
            .iter()
            .find(|o| cursor.is_none_or(|c| o.id > c))
            .or_else(|| available.first())
            .map(|o| o.id)
    }

    /// Take one object through pick and, if that worked, place.
    ///
    /// `Ok(None)` when the source area is empty. Operation failures are
    /// reported to metrics and returned in the report; only registry or
    /// routing defects abort.
    pub fn step(&mut self) -> Result<Option<StepReport>, SimError> {
        let Some(id) = self.next_object() else {
            return Ok(None);
        };
        let criteria = self.config.sorting_criteria;
        let zone_id = {
            let object = self
                .registry
                .get_object(id)
                .ok_or(RegistryError::ObjectNotFound(id))?;
            self.registry.target_zone(object, criteria)?.id.clone()
        };
        self.cursor = Some(id);

        let mut cell = Workcell {
            registry: &mut self.registry,
            failures: &mut self.failures,
            clock: &mut self.clock,
            metrics: &mut self.metrics,
        };

        let pick = self.arm.pick(id, &mut cell);
        let missed = pick.error == Some(OperationError::MaxRetriesExceeded);
        cell.metrics.record_pick(pick.success, missed);
        cell.metrics.record_operation(&pick);

        let place = if pick.success {
            let place = self.arm.place(&zone_id, &mut cell);
            let correct = place.success && placed_correctly(cell.registry, id, criteria);
            cell.metrics.record_place(place.success, correct);
            cell.metrics.record_operation(&place);
            Some(place)
        } else {
            None
        };

        Ok(Some(StepReport {
            object_id: id,
            zone_id,
            pick,
            place,
        }))
    }

    /// Step until the source is empty or the time budget is spent
    pub fn run_cycle(&mut self) -> Result<CycleSummary, SimError> {
        log::info!(
            "Cycle start: {} objects in source, budget {}s",
            self.registry.available_count(),
            self.config.max_cycle_time
        );

        let mut steps = 0;
        let termination = loop {
            if self.registry.available_count() == 0 {
                break CycleTermination::Completed;
            }
            if self.clock.now() >= self.config.max_cycle_time {
                break CycleTermination::TimeBudgetExhausted;
            }
            if let Err(err) = self.step() {
                log::warn!("Cycle aborted after {steps} steps: {err}");
                return Err(err);
            }
            steps += 1;
        };

        let summary = CycleSummary {
            termination,
            elapsed: self.clock.now(),
            steps,
            remaining: self.registry.available_count(),
        };
        log::info!(
            "Cycle end: {:?} after {} steps, {:.1}s simulated, {} left",
            summary.termination,
            summary.steps,
            summary.elapsed,
            summary.remaining
        );
        Ok(summary)
    }

    /// Back to the initial layout with the same seed
    pub fn reset(&mut self) {
        self.registry.reset();
        self.arm.reset();
        self.clock.reset();
        self.failures.reseed();
        self.metrics.reset();
        self.cursor = None;
        log::debug!("Simulation reset (seed {})", self.seed);
    }
}

impl Simulation<MetricsCollector> {
    /// Report for a finished cycle
    pub fn report(&self, summary: &CycleSummary) -> MetricsReport {
        self.metrics.report(self.registry.objects().len(), summary)
    }
}

/// Did `id` land in a zone accepting its value under `criteria`?
fn placed_correctly(registry: &ObjectRegistry, id: ObjectId, criteria: SortingCriteria) -> bool {
    let Some(object) = registry.get_object(id) else {
        return false;
    };
    object
        .zone
        .as_deref()
        .and_then(|zone_id| registry.zone(zone_id))
        .is_some_and(|zone| zone.criteria_value == object.criteria_value(criteria))
}
