//! Object registry
//!
//! Single source of truth for where every object is. An object is claimed by
//! exactly one of: the source area, the arm's held slot, or one zone. Zone
//! counts are only changed here.

use glam::Vec2;

use super::geometry::BoundingBox;
use super::state::{Object, ObjectId, ObjectSpec, ObjectState, SourceArea, TargetZone};
use crate::error::RegistryError;

/// Tracks objects, the source area and the target zones
#[derive(Debug, Clone)]
pub struct ObjectRegistry {
    source: SourceArea,
    zones: Vec<TargetZone>,
    /// Indexed by `ObjectId`, creation order
    objects: Vec<Object>,
}

impl ObjectRegistry {
    pub fn new(source: SourceArea, zones: Vec<TargetZone>) -> Self {
        Self {
            source,
            zones,
            objects: Vec::new(),
        }
    }

    pub fn source(&self) -> &SourceArea {
        &self.source
    }

    /// Create objects in the source area, returning their ids in order.
    ///
    /// Objects without an explicit position get a grid slot sized for the
    /// whole batch. Nothing is created if the batch would overflow the source.
    pub fn create_objects(&mut self, specs: &[ObjectSpec]) -> Result<Vec<ObjectId>, RegistryError> {
        let total = self.objects.len() + specs.len();
        if total > self.source.capacity as usize {
            return Err(RegistryError::SourceOverCapacity {
                capacity: self.source.capacity,
                requested: total,
            });
        }

        let mut ids = Vec::with_capacity(specs.len());
        for (slot, spec) in specs.iter().enumerate() {
            let id = ObjectId(self.objects.len() as u32);
            let home = spec
                .position
                .unwrap_or_else(|| self.source.bounds.grid_cell_center(slot, specs.len()));
            self.objects.push(Object {
                id,
                color: spec.color,
                size: spec.size,
                object_type: spec.object_type,
                position: home,
                home,
                state: ObjectState::InSource,
                zone: None,
            });
            ids.push(id);
        }

        log::debug!("created {} objects ({} total)", ids.len(), self.objects.len());
        Ok(ids)
    }

    pub fn get_object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.0 as usize)
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut Object, RegistryError> {
        self.objects
            .get_mut(id.0 as usize)
            .ok_or(RegistryError::ObjectNotFound(id))
    }

    /// All objects in creation order
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    /// Objects currently in the source area, in creation order
    pub fn available_objects(&self) -> Vec<&Object> {
        self.objects
            .iter()
            .filter(|o| o.state == ObjectState::InSource)
            .collect()
    }

    pub fn available_count(&self) -> usize {
        self.objects
            .iter()
            .filter(|o| o.state == ObjectState::InSource)
            .count()
    }

    /// Picked: InSource -> Held
    pub fn remove_from_source(&mut self, id: ObjectId) -> Result<(), RegistryError> {
        let obj = self.object_mut(id)?;
        if obj.state != ObjectState::InSource {
            return Err(RegistryError::NotInSource(id));
        }
        obj.state = ObjectState::Held;
        Ok(())
    }

    /// Keep a held object under the arm
    pub fn carry(&mut self, id: ObjectId, position: Vec2) -> Result<(), RegistryError> {
        let obj = self.object_mut(id)?;
        if obj.state != ObjectState::Held {
            return Err(RegistryError::NotHeld(id));
        }
        obj.position = position;
        Ok(())
    }

    /// Placed: Held -> InZone at the zone's drop point.
    ///
    /// Re-checks fullness even if the caller already did.
    pub fn place_in_zone(&mut self, id: ObjectId, zone_id: &str) -> Result<Vec2, RegistryError> {
        let zone_idx = self.zone_index(zone_id)?;
        match self.get_object(id) {
            None => return Err(RegistryError::ObjectNotFound(id)),
            Some(obj) if obj.state != ObjectState::Held => return Err(RegistryError::NotHeld(id)),
            Some(_) => {}
        }

        let zone = &mut self.zones[zone_idx];
        if zone.is_full() {
            return Err(RegistryError::ZoneFull(zone.id.clone()));
        }
        let drop_point = zone.drop_point();
        zone.current_count += 1;
        let zone_name = zone.id.clone();

        let obj = self.object_mut(id)?;
        obj.state = ObjectState::InZone;
        obj.position = drop_point;
        obj.zone = Some(zone_name);
        Ok(drop_point)
    }

    /// Failed placement: Held -> InSource at the object's home slot
    pub fn return_to_source(&mut self, id: ObjectId) -> Result<Vec2, RegistryError> {
        let obj = self.object_mut(id)?;
        if obj.state != ObjectState::Held {
            return Err(RegistryError::NotHeld(id));
        }
        obj.state = ObjectState::InSource;
        obj.position = obj.home;
        Ok(obj.home)
    }

    pub fn zones(&self) -> &[TargetZone] {
        &self.zones
    }

    pub fn zone(&self, zone_id: &str) -> Option<&TargetZone> {
        self.zones.iter().find(|z| z.id == zone_id)
    }

    fn zone_index(&self, zone_id: &str) -> Result<usize, RegistryError> {
        self.zones
            .iter()
            .position(|z| z.id == zone_id)
            .ok_or_else(|| RegistryError::ZoneNotFound(zone_id.to_string()))
    }

    /// `current_count >= capacity`; unknown zones report full
    pub fn is_zone_full(&self, zone_id: &str) -> bool {
        self.zone(zone_id).is_none_or(TargetZone::is_full)
    }

    /// Objects whose state is InZone and whose zone is `zone_id`
    pub fn zone_occupants(&self, zone_id: &str) -> usize {
        self.objects
            .iter()
            .filter(|o| o.state == ObjectState::InZone && o.zone.as_deref() == Some(zone_id))
            .count()
    }

    /// Footprints of every object that can block the arm: anything not held,
    /// whether still in the source or already sorted into a zone
    pub fn obstacles(&self, ignore: Option<ObjectId>) -> impl Iterator<Item = (ObjectId, BoundingBox)> + '_ {
        self.objects
            .iter()
            .filter(move |o| o.state != ObjectState::Held && Some(o.id) != ignore)
            .map(|o| (o.id, o.bounds()))
    }

    /// Every object back home, every zone empty
    pub fn reset(&mut self) {
        for obj in &mut self.objects {
            obj.state = ObjectState::InSource;
            obj.position = obj.home;
            obj.zone = None;
        }
        for zone in &mut self.zones {
            zone.current_count = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::{Color, ObjectType, Size};
    use proptest::prelude::*;

    fn registry(zone_capacity: u32) -> ObjectRegistry {
        let source = SourceArea {
            bounds: BoundingBox::new(Vec2::ZERO, Vec2::new(10.0, 10.0)),
            capacity: 20,
        };
        let zones = vec![
            TargetZone::new(
                "red",
                BoundingBox::new(Vec2::new(20.0, 0.0), Vec2::new(25.0, 5.0)),
                zone_capacity,
                "red",
            ),
            TargetZone::new(
                "blue",
                BoundingBox::new(Vec2::new(20.0, 10.0), Vec2::new(25.0, 15.0)),
                zone_capacity,
                "blue",
            ),
        ];
        ObjectRegistry::new(source, zones)
    }

    fn red() -> ObjectSpec {
        ObjectSpec::new(Color::Red, Size::Small, ObjectType::TypeA)
    }

    #[test]
    fn test_create_objects_unique_ids_in_source() {
        let mut reg = registry(5);
        let ids = reg.create_objects(&[red(), red(), red()]).unwrap();
        assert_eq!(ids, vec![ObjectId(0), ObjectId(1), ObjectId(2)]);
        assert_eq!(reg.available_count(), 3);
        for id in ids {
            let obj = reg.get_object(id).unwrap();
            assert_eq!(obj.state, ObjectState::InSource);
            assert!(reg.source().bounds.contains(obj.position));
        }
    }

    #[test]
    fn test_create_objects_spreads_grid_slots() {
        let mut reg = registry(5);
        reg.create_objects(&[red(), red(), red(), red()]).unwrap();
        let positions: Vec<Vec2> = reg.objects().iter().map(|o| o.home).collect();
        for (i, a) in positions.iter().enumerate() {
            for b in &positions[i + 1..] {
                assert!(a.distance(*b) > 1.0);
            }
        }
    }

    #[test]
    fn test_create_objects_with_custom_position() {
        let mut reg = registry(5);
        let ids = reg.create_objects(&[red().at(Vec2::new(2.0, 3.0))]).unwrap();
        assert_eq!(reg.get_object(ids[0]).unwrap().position, Vec2::new(2.0, 3.0));
    }

    #[test]
    fn test_create_objects_respects_source_capacity() {
        let mut reg = registry(5);
        let specs = vec![red(); 21];
        assert!(matches!(
            reg.create_objects(&specs),
            Err(RegistryError::SourceOverCapacity { capacity: 20, requested: 21 })
        ));
        assert!(reg.objects().is_empty());
    }

    #[test]
    fn test_remove_from_source() {
        let mut reg = registry(5);
        let ids = reg.create_objects(&[red(), red()]).unwrap();
        reg.remove_from_source(ids[0]).unwrap();
        assert_eq!(reg.get_object(ids[0]).unwrap().state, ObjectState::Held);
        assert_eq!(reg.available_count(), 1);
        assert_eq!(
            reg.remove_from_source(ids[0]),
            Err(RegistryError::NotInSource(ids[0]))
        );
        assert_eq!(
            reg.remove_from_source(ObjectId(99)),
            Err(RegistryError::ObjectNotFound(ObjectId(99)))
        );
    }

    #[test]
    fn test_place_in_zone() {
        let mut reg = registry(5);
        let ids = reg.create_objects(&[red()]).unwrap();
        reg.remove_from_source(ids[0]).unwrap();
        let at = reg.place_in_zone(ids[0], "red").unwrap();

        let obj = reg.get_object(ids[0]).unwrap();
        assert_eq!(obj.state, ObjectState::InZone);
        assert_eq!(obj.zone.as_deref(), Some("red"));
        assert_eq!(obj.position, at);
        assert!(reg.zone("red").unwrap().bounds.contains(at));
        assert_eq!(reg.zone("red").unwrap().current_count(), 1);
        assert_eq!(reg.zone_occupants("red"), 1);
    }

    #[test]
    fn test_place_in_zone_requires_held() {
        let mut reg = registry(5);
        let ids = reg.create_objects(&[red()]).unwrap();
        assert_eq!(
            reg.place_in_zone(ids[0], "red"),
            Err(RegistryError::NotHeld(ids[0]))
        );
        assert_eq!(reg.zone("red").unwrap().current_count(), 0);
    }

    #[test]
    fn test_place_in_zone_rechecks_fullness() {
        let mut reg = registry(1);
        let ids = reg.create_objects(&[red(), red()]).unwrap();
        reg.remove_from_source(ids[0]).unwrap();
        reg.place_in_zone(ids[0], "red").unwrap();
        assert!(reg.is_zone_full("red"));

        reg.remove_from_source(ids[1]).unwrap();
        assert_eq!(
            reg.place_in_zone(ids[1], "red"),
            Err(RegistryError::ZoneFull("red".into()))
        );
        assert_eq!(reg.get_object(ids[1]).unwrap().state, ObjectState::Held);
        assert_eq!(reg.zone("red").unwrap().current_count(), 1);
    }

    #[test]
    fn test_place_in_unknown_zone() {
        let mut reg = registry(1);
        let ids = reg.create_objects(&[red()]).unwrap();
        reg.remove_from_source(ids[0]).unwrap();
        assert_eq!(
            reg.place_in_zone(ids[0], "purple"),
            Err(RegistryError::ZoneNotFound("purple".into()))
        );
        assert!(reg.is_zone_full("purple"));
    }

    #[test]
    fn test_return_to_source_restores_home() {
        let mut reg = registry(5);
        let ids = reg.create_objects(&[red()]).unwrap();
        let home = reg.get_object(ids[0]).unwrap().home;
        reg.remove_from_source(ids[0]).unwrap();
        reg.carry(ids[0], Vec2::new(50.0, 50.0)).unwrap();
        assert_eq!(reg.return_to_source(ids[0]), Ok(home));
        assert_eq!(reg.get_object(ids[0]).unwrap().state, ObjectState::InSource);
        assert_eq!(reg.available_count(), 1);
        assert_eq!(
            reg.return_to_source(ids[0]),
            Err(RegistryError::NotHeld(ids[0]))
        );
    }

    #[test]
    fn test_obstacles_skip_ignored_and_held() {
        let mut reg = registry(5);
        let ids = reg.create_objects(&[red(), red(), red(), red()]).unwrap();
        reg.remove_from_source(ids[1]).unwrap();
        reg.remove_from_source(ids[2]).unwrap();
        let at = reg.place_in_zone(ids[2], "red").unwrap();

        let blocking: Vec<(ObjectId, BoundingBox)> = reg.obstacles(Some(ids[3])).collect();
        let blocking_ids: Vec<ObjectId> = blocking.iter().map(|(id, _)| *id).collect();
        assert_eq!(blocking_ids, vec![ids[0], ids[2]]);
        // Placed objects block where they were dropped
        assert!(blocking[1].1.contains(at));
    }

    #[test]
    fn test_reset_empties_zones() {
        let mut reg = registry(5);
        let ids = reg.create_objects(&[red(), red()]).unwrap();
        reg.remove_from_source(ids[0]).unwrap();
        reg.place_in_zone(ids[0], "red").unwrap();
        reg.reset();
        assert_eq!(reg.available_count(), 2);
        assert_eq!(reg.zone("red").unwrap().current_count(), 0);
        assert_eq!(reg.get_object(ids[0]).unwrap().zone, None);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Pick(u32),
        Place(u32, bool),
        Return(u32),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u32..6).prop_map(Op::Pick),
            (0u32..6, any::<bool>()).prop_map(|(i, red)| Op::Place(i, red)),
            (0u32..6).prop_map(Op::Return),
        ]
    }

    proptest! {
        /// Whatever sequence of calls is made, counts match occupants, never
        /// exceed capacity, and every object is claimed exactly once.
        #[test]
        fn prop_zone_counts_match_occupants(ops in prop::collection::vec(arb_op(), 0..60)) {
            let mut reg = registry(2);
            reg.create_objects(&vec![red(); 6]).unwrap();
            for op in ops {
                let _ = match op {
                    Op::Pick(i) => reg.remove_from_source(ObjectId(i)).map(|_| ()),
                    Op::Place(i, red) => reg
                        .place_in_zone(ObjectId(i), if red { "red" } else { "blue" })
                        .map(|_| ()),
                    Op::Return(i) => reg.return_to_source(ObjectId(i)).map(|_| ()),
                };
                for zone in reg.zones() {
                    prop_assert!(zone.current_count() <= zone.capacity);
                    prop_assert_eq!(zone.current_count() as usize, reg.zone_occupants(&zone.id));
                }
                let placed: usize = reg.zones().iter().map(|z| z.current_count() as usize).sum();
                let held = reg.objects().iter().filter(|o| o.state == ObjectState::Held).count();
                prop_assert_eq!(reg.available_count() + held + placed, 6);
            }
        }
    }
}
