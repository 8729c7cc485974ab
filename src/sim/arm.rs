//! Arm state machine
//!
//! The arm owns its state, position, held object and retry counter. Every
//! state change goes through [`transition`], one exhaustive match over
//! `(state, event)` pairs; anything not listed there is refused.
//!
//! Pick: Idle -> Moving -> Picking -> (Picking)* -> Holding | Idle
//! Place: Holding -> Moving -> Placing -> (Holding -> Moving -> Placing)* -> Idle,
//! or Placing -> Moving -> Idle when the object has to go back to the source.

use glam::Vec2;

use super::collision::{ReroutePlanner, first_collision, path_collides, swept_footprints};
use super::geometry::{BoundingBox, Path};
use super::registry::ObjectRegistry;
use super::rng::{Draw, FailureSource};
use super::state::{ArmState, ObjectId, ObjectState, OperationKind, OperationResult, SimClock};
use crate::config::SimConfig;
use crate::consts::*;
use crate::error::{OperationError, RegistryError};
use crate::metrics::MetricsSink;

/// Inputs that drive the arm between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmEvent {
    /// Start travelling (pick requested from Idle, or heading for a zone from Holding)
    Dispatch,
    ArriveAtObject,
    ArriveAtZone,
    /// Collision with no alternate path
    Blocked,
    /// Object is back in the source area
    Returned,
    GraspSucceeded,
    /// Grasp missed, retries remain
    GraspMissed,
    /// Grasp missed, retries exhausted
    GraspExhausted,
    ReleaseSucceeded,
    /// Release failed, retries remain
    ReleaseFailed,
    /// Zone full or retries exhausted: carry the object back
    ReleaseRejected,
}

/// The arm's transition table
pub fn transition(state: ArmState, event: ArmEvent) -> Option<ArmState> {
    use ArmEvent::*;
    use ArmState::*;

    match (state, event) {
        (Idle, Dispatch) => Some(Moving),
        (Holding, Dispatch) => Some(Moving),
        (Moving, ArriveAtObject) => Some(Picking),
        (Moving, ArriveAtZone) => Some(Placing),
        (Moving, Blocked) => Some(Idle),
        (Moving, Returned) => Some(Idle),
        (Picking, GraspSucceeded) => Some(Holding),
        (Picking, GraspMissed) => Some(Picking),
        (Picking, GraspExhausted) => Some(Idle),
        (Placing, ReleaseSucceeded) => Some(Idle),
        (Placing, ReleaseFailed) => Some(Holding),
        (Placing, ReleaseRejected) => Some(Moving),
        (Idle, _) | (Moving, _) | (Picking, _) | (Holding, _) | (Placing, _) => None,
    }
}

/// Retry limits, failure probabilities and timing for one arm
#[derive(Debug, Clone, PartialEq)]
pub struct ArmParams {
    pub max_pick_retries: u32,
    pub max_place_retries: u32,
    pub missed_pick_probability: f64,
    /// Chance that a move reports a collision even on a clear path.
    ///
    /// Handled like a real collision: recorded, settled, then one alternate
    /// path is taken without a new draw. It only fails an operation when no
    /// clear alternate exists.
    pub collision_probability: f64,
    pub place_failure_probability: f64,
    /// Base backoff; retry k waits `retry_backoff * 2^(k-1)` simulated seconds
    pub retry_backoff: f64,
    /// Travel speed (units per second)
    pub arm_speed: f64,
    pub grasp_duration: f64,
    pub release_duration: f64,
    /// Time lost halting after a collision
    pub settle_duration: f64,
    /// Half-width swept by the arm along a path
    pub path_clearance: f32,
}

impl Default for ArmParams {
    fn default() -> Self {
        Self {
            max_pick_retries: DEFAULT_MAX_RETRIES,
            max_place_retries: DEFAULT_MAX_RETRIES,
            missed_pick_probability: 0.0,
            collision_probability: 0.0,
            place_failure_probability: 0.0,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            arm_speed: DEFAULT_ARM_SPEED,
            grasp_duration: DEFAULT_GRASP_DURATION,
            release_duration: DEFAULT_RELEASE_DURATION,
            settle_duration: DEFAULT_SETTLE_DURATION,
            path_clearance: DEFAULT_PATH_CLEARANCE,
        }
    }
}

impl ArmParams {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            max_pick_retries: config.retries.max_pick_retries,
            max_place_retries: config.retries.max_place_retries,
            missed_pick_probability: config.failures.missed_pick_probability,
            collision_probability: config.failures.collision_probability,
            place_failure_probability: config.failures.place_failure_probability,
            retry_backoff: config.retries.backoff,
            arm_speed: config.motion.arm_speed,
            grasp_duration: config.motion.grasp_duration,
            release_duration: config.motion.release_duration,
            settle_duration: config.motion.settle_duration,
            path_clearance: config.motion.path_clearance,
        }
    }

    /// Logical delay before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> f64 {
        self.retry_backoff * 2f64.powi(retry.saturating_sub(1).min(16) as i32)
    }
}

/// Mutable collaborators the arm works against during one step
pub struct Workcell<'a> {
    pub registry: &'a mut ObjectRegistry,
    pub failures: &'a mut FailureSource,
    pub clock: &'a mut SimClock,
    pub metrics: &'a mut dyn MetricsSink,
}

/// Outcome of a single movement
#[derive(Debug, Clone, PartialEq)]
pub struct MovementResult {
    pub success: bool,
    pub error: Option<OperationError>,
    pub final_position: Vec2,
    /// An alternate path was used after a collision
    pub rerouted: bool,
    /// Distance actually travelled
    pub distance: f32,
}

impl MovementResult {
    fn arrived(final_position: Vec2, rerouted: bool, distance: f32) -> Self {
        Self {
            success: true,
            error: None,
            final_position,
            rerouted,
            distance,
        }
    }

    fn halted(error: OperationError, final_position: Vec2) -> Self {
        Self {
            success: false,
            error: Some(error),
            final_position,
            rerouted: false,
            distance: 0.0,
        }
    }
}

/// The robotic arm
#[derive(Debug)]
pub struct Arm {
    state: ArmState,
    position: Vec2,
    home: Vec2,
    held: Option<ObjectId>,
    retry_count: u32,
    params: ArmParams,
    planner: Box<dyn ReroutePlanner>,
}

impl Arm {
    pub fn new(home: Vec2, params: ArmParams, planner: Box<dyn ReroutePlanner>) -> Self {
        Self {
            state: ArmState::Idle,
            position: home,
            home,
            held: None,
            retry_count: 0,
            params,
            planner,
        }
    }

    pub fn state(&self) -> ArmState {
        self.state
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn home(&self) -> Vec2 {
        self.home
    }

    pub fn held_object(&self) -> Option<ObjectId> {
        self.held
    }

    /// Retries consumed by the operation in progress
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn params(&self) -> &ArmParams {
        &self.params
    }

    /// Back to Idle at home, empty-handed.
    ///
    /// Does not touch the registry; reset that alongside.
    pub fn reset(&mut self) {
        self.state = ArmState::Idle;
        self.position = self.home;
        self.held = None;
        self.retry_count = 0;
    }

    fn apply(&mut self, event: ArmEvent) -> Result<(), OperationError> {
        match transition(self.state, event) {
            Some(next) => {
                log::trace!("arm {:?} --{:?}--> {:?}", self.state, event, next);
                self.state = next;
                Ok(())
            }
            None => {
                log::error!("arm refused {:?} while {:?}", event, self.state);
                Err(OperationError::InvalidState)
            }
        }
    }

    /// Would travelling `path` run into an object the arm is not holding?
    pub fn check_collision(&self, path: &Path, registry: &ObjectRegistry, ignore: Option<ObjectId>) -> bool {
        path_collides(path, registry, ignore, self.params.path_clearance)
    }

    /// Travel to `target`, rerouting once around a collision.
    ///
    /// Does not change the arm state; pick and place drive the transitions.
    /// Refused while picking or placing.
    pub fn move_to(&mut self, target: Vec2, ignore: Option<ObjectId>, cell: &mut Workcell<'_>) -> MovementResult {
        if matches!(self.state, ArmState::Picking | ArmState::Placing) {
            return MovementResult::halted(OperationError::InvalidState, self.position);
        }

        let direct = Path::direct(self.position, target);
        if direct.is_trivial() {
            self.position = target;
            return MovementResult::arrived(target, false, 0.0);
        }

        let injected = cell
            .failures
            .roll(Draw::Collision, self.params.collision_probability);
        let clearance = self.params.path_clearance;
        let blocker = first_collision(&direct, cell.registry, ignore, clearance);

        if !injected && blocker.is_none() {
            return self.travel(&direct, false, cell);
        }

        // Halt in place, report, then get one alternate
        cell.metrics.record_collision();
        cell.clock.advance(self.params.settle_duration);
        log::debug!(
            "collision on path {:?} -> {:?} (obstacle: {:?}, injected: {})",
            direct.start(),
            direct.end(),
            blocker,
            injected
        );

        let alternative = {
            let registry: &ObjectRegistry = cell.registry;
            let footprints: Vec<BoundingBox> = swept_footprints(direct.start(), registry, ignore, clearance)
                .map(|(_, footprint)| footprint)
                .collect();
            let is_clear = |p: &Path| !path_collides(p, registry, ignore, clearance);
            self.planner.alternative(&direct, &footprints, &is_clear)
        };

        match alternative {
            Some(path) => {
                log::debug!("rerouted via {} waypoint(s)", path.waypoints().len());
                self.travel(&path, true, cell)
            }
            None => {
                log::warn!("no alternate path to {:?}, halting at {:?}", target, self.position);
                MovementResult::halted(OperationError::Collision, self.position)
            }
        }
    }

    fn travel(&mut self, path: &Path, rerouted: bool, cell: &mut Workcell<'_>) -> MovementResult {
        let distance = path.length();
        cell.clock.advance(f64::from(distance) / self.params.arm_speed);
        self.position = path.end();
        if let Some(id) = self.held {
            if let Err(err) = cell.registry.carry(id, self.position) {
                log::warn!("held object lost track of the arm: {err}");
            }
        }
        MovementResult::arrived(self.position, rerouted, distance)
    }

    /// Pick `id` out of the source area
    pub fn pick(&mut self, id: ObjectId, cell: &mut Workcell<'_>) -> OperationResult {
        let now = cell.clock.now();
        if self.state != ArmState::Idle {
            return OperationResult::failed(OperationKind::Pick, Some(id), OperationError::InvalidState, 0, now);
        }
        let target = match cell.registry.get_object(id) {
            None => {
                return OperationResult::failed(OperationKind::Pick, Some(id), OperationError::ObjectNotFound, 0, now);
            }
            Some(obj) if obj.state != ObjectState::InSource => {
                return OperationResult::failed(OperationKind::Pick, Some(id), OperationError::InvalidState, 0, now);
            }
            Some(obj) => obj.position,
        };

        self.retry_count = 0;
        let result = match self.run_pick(id, target, cell) {
            Ok(result) => result,
            Err(error) => {
                let result =
                    OperationResult::failed(OperationKind::Pick, Some(id), error, self.retry_count, cell.clock.now());
                self.recover(cell);
                result
            }
        };
        self.retry_count = 0;

        log::debug!(
            "pick {} -> {} (retries: {}, error: {:?})",
            id,
            if result.success { "ok" } else { "failed" },
            result.retry_count,
            result.error
        );
        result
    }

    fn run_pick(&mut self, id: ObjectId, target: Vec2, cell: &mut Workcell<'_>) -> Result<OperationResult, OperationError> {
        self.apply(ArmEvent::Dispatch)?;
        let movement = self.move_to(target, Some(id), cell);
        if !movement.success {
            self.apply(ArmEvent::Blocked)?;
            let error = movement.error.unwrap_or(OperationError::Collision);
            return Ok(OperationResult::failed(OperationKind::Pick, Some(id), error, 0, cell.clock.now()));
        }
        self.apply(ArmEvent::ArriveAtObject)?;

        loop {
            cell.clock.advance(self.params.grasp_duration);
            let missed = cell
                .failures
                .roll(Draw::Grasp, self.params.missed_pick_probability);

            if !missed {
                cell.registry.remove_from_source(id)?;
                cell.registry.carry(id, self.position)?;
                self.held = Some(id);
                self.apply(ArmEvent::GraspSucceeded)?;
                return Ok(OperationResult::succeeded(
                    OperationKind::Pick,
                    id,
                    self.retry_count,
                    cell.clock.now(),
                ));
            }

            if self.retry_count < self.params.max_pick_retries {
                self.retry_count += 1;
                cell.clock.advance(self.params.backoff(self.retry_count));
                self.apply(ArmEvent::GraspMissed)?;
                continue;
            }

            self.apply(ArmEvent::GraspExhausted)?;
            return Ok(OperationResult::failed(
                OperationKind::Pick,
                Some(id),
                OperationError::MaxRetriesExceeded,
                self.retry_count,
                cell.clock.now(),
            ));
        }
    }

    /// Place the held object in `zone_id`
    pub fn place(&mut self, zone_id: &str, cell: &mut Workcell<'_>) -> OperationResult {
        let now = cell.clock.now();
        let (ArmState::Holding, Some(id)) = (self.state, self.held) else {
            return OperationResult::failed(OperationKind::Place, self.held, OperationError::InvalidState, 0, now);
        };
        if cell.registry.zone(zone_id).is_none() {
            return OperationResult::failed(OperationKind::Place, Some(id), OperationError::ZoneNotFound, 0, now);
        }

        self.retry_count = 0;
        let result = match self.run_place(id, zone_id, cell) {
            Ok(result) => result,
            Err(error) => {
                let result =
                    OperationResult::failed(OperationKind::Place, Some(id), error, self.retry_count, cell.clock.now());
                self.recover(cell);
                result
            }
        };
        self.retry_count = 0;

        log::debug!(
            "place {} in {} -> {} (retries: {}, error: {:?})",
            id,
            zone_id,
            if result.success { "ok" } else { "failed" },
            result.retry_count,
            result.error
        );
        result
    }

    fn run_place(&mut self, id: ObjectId, zone_id: &str, cell: &mut Workcell<'_>) -> Result<OperationResult, OperationError> {
        loop {
            self.apply(ArmEvent::Dispatch)?;
            let drop_point = cell
                .registry
                .zone(zone_id)
                .ok_or(OperationError::ZoneNotFound)?
                .drop_point();

            let movement = self.move_to(drop_point, None, cell);
            if !movement.success {
                self.discard_held(cell)?;
                self.apply(ArmEvent::Blocked)?;
                let error = movement.error.unwrap_or(OperationError::Collision);
                return Ok(OperationResult::failed(
                    OperationKind::Place,
                    Some(id),
                    error,
                    self.retry_count,
                    cell.clock.now(),
                ));
            }
            self.apply(ArmEvent::ArriveAtZone)?;

            if cell.registry.is_zone_full(zone_id) {
                return self.reject(id, OperationError::ZoneFull, cell);
            }

            cell.clock.advance(self.params.release_duration);
            let failed = cell
                .failures
                .roll(Draw::Release, self.params.place_failure_probability);

            if !failed {
                match cell.registry.place_in_zone(id, zone_id) {
                    Ok(_) => {
                        self.held = None;
                        self.apply(ArmEvent::ReleaseSucceeded)?;
                        return Ok(OperationResult::succeeded(
                            OperationKind::Place,
                            id,
                            self.retry_count,
                            cell.clock.now(),
                        ));
                    }
                    Err(RegistryError::ZoneFull(_)) => {
                        return self.reject(id, OperationError::ZoneFull, cell);
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            if self.retry_count < self.params.max_place_retries {
                self.retry_count += 1;
                cell.clock.advance(self.params.backoff(self.retry_count));
                self.apply(ArmEvent::ReleaseFailed)?;
                continue;
            }

            return self.reject(id, OperationError::MaxRetriesExceeded, cell);
        }
    }

    /// Placing -> Moving back to the object's home slot -> Idle
    fn reject(&mut self, id: ObjectId, error: OperationError, cell: &mut Workcell<'_>) -> Result<OperationResult, OperationError> {
        self.apply(ArmEvent::ReleaseRejected)?;
        if let Some(held) = self.held.take() {
            let home = cell.registry.return_to_source(held)?;
            cell.clock
                .advance(f64::from(self.position.distance(home)) / self.params.arm_speed);
            self.position = home;
        }
        self.apply(ArmEvent::Returned)?;
        Ok(OperationResult::failed(
            OperationKind::Place,
            Some(id),
            error,
            self.retry_count,
            cell.clock.now(),
        ))
    }

    /// Drop the held object back into the source without travelling
    fn discard_held(&mut self, cell: &mut Workcell<'_>) -> Result<(), OperationError> {
        if let Some(held) = self.held.take() {
            cell.registry.return_to_source(held)?;
        }
        Ok(())
    }

    /// Last-resort cleanup after a refused transition or registry error
    fn recover(&mut self, cell: &mut Workcell<'_>) {
        if let Some(held) = self.held.take() {
            if let Err(err) = cell.registry.return_to_source(held) {
                log::error!("could not return {held} to source: {err}");
            }
        }
        self.state = ArmState::Idle;
        self.retry_count = 0;
    }
}
