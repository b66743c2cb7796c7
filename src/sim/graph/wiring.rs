//! Turns a plant description into entity records and signal connections.
//!
//! The relation rules mirror how a ventilation plant is physically wired:
//! sensors read their zone, controllers read a sensor (or their system's
//! supervisor), dampers follow the controller of their zone, zones receive
//! damper flows and occupancy, and fans collect the flows of their air path.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Connection, EntityKind};
use crate::EntityId;
use crate::sim::components::{ControlLawConfig, FanCurve, OccupancyConfig, OperationMode};
use crate::sim::config::MpcWeights;
use crate::sim::mpc::supervisor::{co2_property, occupancy_property, signal_property};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSpec {
    pub id: EntityId,
    /// Present if the system is supervised by an MPC.
    #[serde(default)]
    pub mpc: Option<MpcSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MpcSpec {
    /// Supervisor id, defaults to `"<system> MPC"`.
    #[serde(default)]
    pub id: Option<EntityId>,
    /// Overrides the run-wide objective weights.
    #[serde(default)]
    pub weights: Option<MpcWeights>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSpec {
    pub id: EntityId,
    /// Air volume [m³].
    pub volume: f64,
    #[serde(default)]
    pub system: Option<EntityId>,
    #[serde(default)]
    pub occupancy: OccupancyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamperSpec {
    pub id: EntityId,
    pub zone: EntityId,
    pub system: EntityId,
    pub operation_mode: OperationMode,
    pub flow_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanSpec {
    pub id: EntityId,
    pub system: EntityId,
    pub operation_mode: OperationMode,
    #[serde(flatten)]
    pub curve: FanCurve,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSpec {
    pub id: EntityId,
    pub zone: EntityId,
    /// Defaults to the system of `zone`.
    #[serde(default)]
    pub system: Option<EntityId>,
    /// Defaults to the run-wide control law.
    #[serde(default)]
    pub law: Option<ControlLawConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeasuredProperty {
    #[default]
    Co2,
    /// Any other quantity; such sensors are skipped.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    pub id: EntityId,
    pub zone: EntityId,
    #[serde(default)]
    pub measures: MeasuredProperty,
}

/// Normalized plant configuration rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantDescription {
    pub systems: Vec<SystemSpec>,
    pub zones: Vec<ZoneSpec>,
    pub dampers: Vec<DamperSpec>,
    pub fans: Vec<FanSpec>,
    pub controllers: Vec<ControllerSpec>,
    pub sensors: Vec<SensorSpec>,
}

/// Zone data a supervisor needs to predict CO2.
#[derive(Debug, Clone, PartialEq)]
pub struct MpcZone {
    pub zone: EntityId,
    pub volume: f64,
    /// Sum of the nominal flows of the zone's supply dampers [m³/s].
    pub supply_flow_max: f64,
}

/// Kind-specific parameters of an entity record.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityParams {
    OutdoorEnvironment,
    Occupancy(OccupancyConfig),
    Sensor,
    Controller(ControlLawConfig),
    Damper {
        operation_mode: OperationMode,
        flow_max: f64,
    },
    Fan {
        operation_mode: OperationMode,
        curve: FanCurve,
    },
    BuildingSpace {
        volume: f64,
    },
    System,
    SystemMpc {
        zones: Vec<MpcZone>,
        supply_fan: Option<FanCurve>,
        exhaust_fan: Option<FanCurve>,
        weights: Option<MpcWeights>,
    },
}

/// An entity record before its component is constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySpec {
    pub id: EntityId,
    pub kind: EntityKind,
    pub contained_in: Option<EntityId>,
    pub super_system: Option<EntityId>,
    pub params: EntityParams,
}

impl EntitySpec {
    fn new(id: EntityId, kind: EntityKind, params: EntityParams) -> Self {
        Self {
            id,
            kind,
            contained_in: None,
            super_system: None,
            params,
        }
    }

    fn within(mut self, zone: Option<&EntityId>, system: Option<&EntityId>) -> Self {
        self.contained_in = zone.cloned();
        self.super_system = system.cloned();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub entities: Vec<EntitySpec>,
    pub connections: Vec<Connection>,
}

pub const OUTDOOR_ID: &str = "outdoor";

pub fn occupancy_id(zone: &EntityId) -> EntityId {
    zone.derived("occupancy")
}

pub fn supervisor_id(system: &SystemSpec) -> EntityId {
    system
        .mpc
        .as_ref()
        .and_then(|m| m.id.clone())
        .unwrap_or_else(|| system.id.derived("MPC"))
}

impl PlantDescription {
    fn zone(&self, id: &EntityId) -> Option<&ZoneSpec> {
        self.zones.iter().find(|z| &z.id == id)
    }

    fn zone_system(&self, zone: &EntityId) -> Option<&EntityId> {
        self.zone(zone).and_then(|z| z.system.as_ref())
    }

    fn controller_system<'a>(&'a self, c: &'a ControllerSpec) -> Option<&'a EntityId> {
        c.system.as_ref().or_else(|| self.zone_system(&c.zone))
    }

    fn co2_sensor(&self, zone: &EntityId) -> Option<&SensorSpec> {
        self.sensors
            .iter()
            .find(|s| &s.zone == zone && s.measures == MeasuredProperty::Co2)
    }

    fn fan_curve(&self, system: &EntityId, mode: OperationMode) -> Option<FanCurve> {
        self.fans
            .iter()
            .find(|f| &f.system == system && f.operation_mode == mode)
            .map(|f| f.curve)
    }
}

/// Builds entity records and connections from `plant`.
///
/// Missing partners are only warned about here; the resolver turns a
/// resulting unbound required input into a fatal error.
pub fn normalize(plant: &PlantDescription, default_law: &ControlLawConfig) -> Normalized {
    let mut entities = Vec::new();
    let mut connections = Vec::new();
    let outdoor = EntityId::from(OUTDOOR_ID);

    entities.push(EntitySpec::new(
        outdoor.clone(),
        EntityKind::OutdoorEnvironment,
        EntityParams::OutdoorEnvironment,
    ));

    for zone in &plant.zones {
        entities.push(
            EntitySpec::new(
                occupancy_id(&zone.id),
                EntityKind::Occupancy,
                EntityParams::Occupancy(zone.occupancy.clone()),
            )
            .within(Some(&zone.id), zone.system.as_ref()),
        );
    }

    for sensor in &plant.sensors {
        if sensor.measures != MeasuredProperty::Co2 {
            debug!(sensor = %sensor.id, "skipping sensor of an unsupported quantity");
            continue;
        }
        entities.push(
            EntitySpec::new(sensor.id.clone(), EntityKind::Sensor, EntityParams::Sensor)
                .within(Some(&sensor.zone), plant.zone_system(&sensor.zone)),
        );
        if plant.zone(&sensor.zone).is_some() {
            connections.push(Connection::new(
                sensor.id.clone(),
                "value",
                sensor.zone.clone(),
                "ppmCO2",
            ));
        } else {
            warn!(sensor = %sensor.id, zone = %sensor.zone, "sensor placed in unknown zone");
        }
    }

    for system in &plant.systems {
        entities.push(EntitySpec::new(system.id.clone(), EntityKind::System, EntityParams::System));
        let Some(mpc) = &system.mpc else {
            continue;
        };
        let sup = supervisor_id(system);
        let mut zones = Vec::new();
        for zone in plant.zones.iter().filter(|z| z.system.as_ref() == Some(&system.id)) {
            let supply_flow_max = plant
                .dampers
                .iter()
                .filter(|d| d.zone == zone.id && d.operation_mode == OperationMode::Supply)
                .map(|d| d.flow_max)
                .sum();
            zones.push(MpcZone {
                zone: zone.id.clone(),
                volume: zone.volume,
                supply_flow_max,
            });

            match plant.co2_sensor(&zone.id) {
                Some(sensor) => connections.push(Connection::new(
                    sup.clone(),
                    co2_property(&zone.id),
                    sensor.id.clone(),
                    "value",
                )),
                None => {
                    warn!(supervisor = %sup, zone = %zone.id, "no CO2 sensor for supervised zone")
                }
            }
            connections.push(Connection::new(
                sup.clone(),
                occupancy_property(&zone.id),
                occupancy_id(&zone.id),
                "occupants",
            ));
        }
        entities.push(
            EntitySpec::new(
                sup,
                EntityKind::SystemMpc,
                EntityParams::SystemMpc {
                    zones,
                    supply_fan: plant.fan_curve(&system.id, OperationMode::Supply),
                    exhaust_fan: plant.fan_curve(&system.id, OperationMode::Exhaust),
                    weights: mpc.weights,
                },
            )
            .within(None, Some(&system.id)),
        );
    }

    for controller in &plant.controllers {
        let law = controller.law.as_ref().unwrap_or(default_law);
        let system = plant.controller_system(controller);
        entities.push(
            EntitySpec::new(
                controller.id.clone(),
                EntityKind::Controller,
                EntityParams::Controller(law.clone()),
            )
            .within(Some(&controller.zone), system),
        );

        if law.is_mpc() {
            let supervisor = plant
                .systems
                .iter()
                .find(|s| Some(&s.id) == system && s.mpc.is_some());
            match supervisor {
                Some(s) => connections.push(Connection::new(
                    controller.id.clone(),
                    "inputValue",
                    supervisor_id(s),
                    signal_property(&controller.zone),
                )),
                None => warn!(controller = %controller.id, "no MPC found for controller"),
            }
        } else {
            match plant.co2_sensor(&controller.zone) {
                Some(sensor) => connections.push(Connection::new(
                    controller.id.clone(),
                    "inputValue",
                    sensor.id.clone(),
                    "value",
                )),
                None if law.reads_input() => {
                    warn!(controller = %controller.id, "no sensor found for controller")
                }
                None => {}
            }
        }
    }

    for damper in &plant.dampers {
        entities.push(
            EntitySpec::new(
                damper.id.clone(),
                EntityKind::Damper,
                EntityParams::Damper {
                    operation_mode: damper.operation_mode,
                    flow_max: damper.flow_max,
                },
            )
            .within(Some(&damper.zone), Some(&damper.system)),
        );
        match plant.controllers.iter().find(|c| c.zone == damper.zone) {
            Some(controller) => connections.push(Connection::new(
                damper.id.clone(),
                "posSignal",
                controller.id.clone(),
                "outputSignal",
            )),
            None => warn!(damper = %damper.id, "no controller found for damper"),
        }
    }

    for zone in &plant.zones {
        entities.push(
            EntitySpec::new(
                zone.id.clone(),
                EntityKind::BuildingSpace,
                EntityParams::BuildingSpace {
                    volume: zone.volume,
                },
            )
            .within(None, zone.system.as_ref()),
        );
        for damper in plant.dampers.iter().filter(|d| d.zone == zone.id) {
            let property = match damper.operation_mode {
                OperationMode::Supply => "flowVenIn",
                OperationMode::Exhaust => "flowVenOut",
            };
            connections.push(Connection::new(
                zone.id.clone(),
                property,
                damper.id.clone(),
                "flow",
            ));
        }
        connections.push(Connection::new(
            zone.id.clone(),
            "occupants",
            occupancy_id(&zone.id),
            "occupants",
        ));
        connections.push(Connection::new(
            zone.id.clone(),
            "ppmCO2Out",
            outdoor.clone(),
            "ppmCO2",
        ));
    }

    for fan in &plant.fans {
        entities.push(
            EntitySpec::new(
                fan.id.clone(),
                EntityKind::Fan,
                EntityParams::Fan {
                    operation_mode: fan.operation_mode,
                    curve: fan.curve,
                },
            )
            .within(None, Some(&fan.system)),
        );
        for damper in plant
            .dampers
            .iter()
            .filter(|d| d.system == fan.system && d.operation_mode == fan.operation_mode)
        {
            connections.push(Connection::new(
                fan.id.clone(),
                "partialFlow",
                damper.id.clone(),
                "flow",
            ));
        }
    }

    Normalized {
        entities,
        connections,
    }
}
