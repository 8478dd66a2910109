//! Shipment route realization.
//!
//! Turns a shipment descriptor into the ordered legs a robot will walk:
//! place names resolve to ids, the deduplicated-and-sorted via ids form
//! the route-plan lookup key, and every place referenced by the matching
//! plan is fetched with a single bulk list call.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::config::{Config, VIA_SEPARATOR};
use crate::error::ControlError;
use crate::types::{Leg, Order, PlanRoute, Pose, ShipmentRequest, WaypointPoint};
use crate::world_model::{attr_value, EntityStore};

/// A realized shipment: the raw plan routes (informational), the legs to
/// dispatch, and the order context stored on the robot.
#[derive(Debug, Clone)]
pub struct EstimatedRoutes {
    pub routes: Value,
    pub legs: Vec<Leg>,
    pub order: Order,
}

#[derive(Clone)]
pub struct WaypointResolver {
    store: Arc<dyn EntityStore>,
    config: Arc<Config>,
}

impl WaypointResolver {
    pub fn new(store: Arc<dyn EntityStore>, config: Arc<Config>) -> Self {
        Self { store, config }
    }

    /// Resolve a shipment into legs for the given robot.
    pub async fn estimate_routes(
        &self,
        shipment: &ShipmentRequest,
        robot_id: &str,
    ) -> Result<EstimatedRoutes, ControlError> {
        debug!("estimate routes, destination={}", shipment.destination.name);

        let destination_id = self.resolve_place_id(&shipment.destination.name).await?;

        // Dedup and sort the via names so identical shipments always
        // produce the same lookup key.
        let mut via_names: Vec<String> = shipment
            .updated
            .iter()
            .map(|u| u.place.clone())
            .collect();
        via_names.sort();
        via_names.dedup();

        let mut via_ids = Vec::with_capacity(via_names.len());
        for name in &via_names {
            via_ids.push(self.resolve_place_id(name).await?);
        }
        let mut key_ids = via_ids.clone();
        key_ids.sort();
        let via_key = key_ids.join(VIA_SEPARATOR);

        let plan = self
            .store
            .query_entity(
                &self.config.fiware_service,
                &self.config.robot_servicepath,
                &self.config.route_plan_type,
                &format!("destination=={destination_id};via=={via_key};robot_id=={robot_id}"),
            )
            .await?;

        let routes_value = attr_value(&plan, "routes").cloned().unwrap_or(Value::Null);
        let routes: Vec<PlanRoute> = serde_json::from_value(routes_value.clone())
            .map_err(|e| {
                ControlError::upstream(
                    format!("can not parse route_plan routes, robot_id={robot_id}"),
                    e.to_string(),
                )
            })?;
        let source = attr_value(&plan, "source")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        // One bulk fetch covers every place any route references.
        let mut referenced: HashSet<String> = HashSet::new();
        for route in &routes {
            referenced.insert(route.from.clone());
            referenced.extend(route.via.iter().cloned());
            referenced.insert(route.to.clone());
            referenced.insert(route.destination.clone());
        }
        let places = self.load_places(&referenced).await?;

        let mut legs = Vec::with_capacity(routes.len());
        for route in &routes {
            let via_poses = route
                .via
                .iter()
                .map(|id| Self::pose(&places, id))
                .collect::<Result<Vec<_>, _>>()?;
            let to_pose = Self::pose(&places, &route.to)?;
            legs.push(Leg {
                to: route.to.clone(),
                destination: route.destination.clone(),
                action: route.action.clone(),
                waypoints: Self::build_waypoints(&via_poses, &to_pose),
            });
        }

        Ok(EstimatedRoutes {
            routes: routes_value,
            legs,
            order: Order {
                source,
                via: via_ids,
                destination: destination_id,
            },
        })
    }

    /// Resolve a place name to its entity id.
    async fn resolve_place_id(&self, name: &str) -> Result<String, ControlError> {
        let place = self
            .store
            .query_entity(
                &self.config.fiware_service,
                &self.config.robot_servicepath,
                &self.config.place_type,
                &format!("name=={name}"),
            )
            .await?;
        place
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ControlError::upstream(
                    format!("can not resolve a place, name={name}"),
                    place.to_string(),
                )
            })
    }

    /// Bulk-fetch poses for a set of place ids with one list call.
    pub async fn load_places(
        &self,
        place_ids: &HashSet<String>,
    ) -> Result<HashMap<String, Pose>, ControlError> {
        let entities = self
            .store
            .get_entities(
                &self.config.fiware_service,
                &self.config.robot_servicepath,
                &self.config.place_type,
            )
            .await?;

        let mut places = HashMap::new();
        for entity in &entities {
            let Some(id) = entity.get("id").and_then(Value::as_str) else {
                continue;
            };
            if !place_ids.contains(id) {
                continue;
            }
            let pose = attr_value(entity, "pose")
                .and_then(|v| serde_json::from_value::<Pose>(v.clone()).ok())
                .ok_or_else(|| {
                    ControlError::upstream(
                        format!("can not parse a place pose, place_id={id}"),
                        entity.to_string(),
                    )
                })?;
            places.insert(id.to_string(), pose);
        }

        if let Some(missing) = place_ids.iter().find(|id| !places.contains_key(*id)) {
            return Err(ControlError::upstream(
                format!("place not found, place_id={missing}"),
                "",
            ));
        }
        Ok(places)
    }

    fn pose<'a>(
        places: &'a HashMap<String, Pose>,
        place_id: &str,
    ) -> Result<&'a Pose, ControlError> {
        places.get(place_id).ok_or_else(|| {
            ControlError::upstream(format!("place not found, place_id={place_id}"), "")
        })
    }

    /// Waypoints for one leg: intermediate vias travel without an approach
    /// angle, the terminal carries the place's own angle.
    pub fn build_waypoints(via_poses: &[&Pose], to_pose: &Pose) -> Vec<WaypointPoint> {
        let mut waypoints: Vec<WaypointPoint> = via_poses
            .iter()
            .map(|p| WaypointPoint {
                point: p.point.clone(),
                angle: Value::Null,
            })
            .collect();
        waypoints.push(WaypointPoint {
            point: to_pose.point.clone(),
            angle: to_pose.angle.clone(),
        });
        waypoints
    }
}
