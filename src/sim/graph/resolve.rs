//! Setup-time binding of entity inputs to sender outputs.

use std::collections::HashMap;

use tracing::debug;

use super::{Connection, Entity};
use crate::EntityId;
use crate::error::SetupError;
use crate::sim::framework::{Arity, Lag, OutputSource, lag_between};

/// One resolved input: `receiver_property ← entities[sender].sender_property`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub receiver_property: String,
    /// Index of the sender in [`BoundGraph::entities`].
    pub sender: usize,
    pub sender_property: String,
    pub lag: Lag,
}

/// Entities with every input bound to a sender.
#[derive(Debug)]
pub struct BoundGraph {
    pub entities: Vec<Entity>,
    /// Bindings per entity, parallel to `entities`.
    pub bindings: Vec<Vec<Binding>>,
}

impl BoundGraph {
    pub fn index_of(&self, id: &EntityId) -> Option<usize> {
        self.entities.iter().position(|e| &e.id == id)
    }
}

/// Initializes every entity, then binds each declared input property.
///
/// A single-sender input binds the first matching connection; a multi-sender
/// input binds all of them in connection order. Fails if a required input has
/// no sender, if a sender lacks the referenced output, or if sender and
/// receiver run in the same phase.
pub fn resolve(
    mut entities: Vec<Entity>,
    connections: &[Connection],
) -> anyhow::Result<BoundGraph> {
    let mut index: HashMap<EntityId, usize> = HashMap::with_capacity(entities.len());
    for (i, entity) in entities.iter().enumerate() {
        if index.insert(entity.id.clone(), i).is_some() {
            return Err(SetupError::DuplicateEntity(entity.id.clone()).into());
        }
    }
    for c in connections {
        for id in [&c.receiver, &c.sender] {
            if !index.contains_key(id) {
                return Err(SetupError::UnknownEntity(id.clone()).into());
            }
        }
    }

    for entity in entities.iter_mut() {
        entity.init()?;
    }

    let mut bindings = Vec::with_capacity(entities.len());
    for receiver in &entities {
        let mut bound = Vec::new();
        let (Some(component), Some(receiver_phase)) = (receiver.component(), receiver.phase())
        else {
            bindings.push(bound);
            continue;
        };

        for spec in component.inputs() {
            let mut matches = connections
                .iter()
                .filter(|c| c.receiver == receiver.id && c.receiver_property == spec.property)
                .peekable();
            if matches.peek().is_none() {
                if spec.required {
                    return Err(SetupError::ConfigResolution {
                        entity: receiver.id.clone(),
                        property: spec.property.clone(),
                    }
                    .into());
                }
                debug!(
                    entity = %receiver.id,
                    property = %spec.property,
                    "optional input left unbound"
                );
                continue;
            }
            let take = match spec.arity {
                Arity::One => 1,
                Arity::Many => usize::MAX,
            };

            for c in matches.take(take) {
                let sender_idx = index[&c.sender];
                let sender = &entities[sender_idx];
                let Some(sender_phase) = sender.phase() else {
                    return Err(SetupError::InvalidConfiguration(format!(
                        "`{}` has no step logic and cannot feed `{}.{}`",
                        sender.id, receiver.id, spec.property
                    ))
                    .into());
                };
                let Some(lag) = lag_between(receiver_phase, sender_phase) else {
                    return Err(SetupError::SamePhaseBinding {
                        receiver: receiver.id.clone(),
                        sender: sender.id.clone(),
                        property: spec.property.clone(),
                    }
                    .into());
                };
                if sender.get_output(&c.sender_property).is_none() {
                    return Err(SetupError::InvalidConfiguration(format!(
                        "`{}` has no output `{}` (read by `{}.{}`)",
                        sender.id, c.sender_property, receiver.id, spec.property
                    ))
                    .into());
                }
                bound.push(Binding {
                    receiver_property: spec.property.clone(),
                    sender: sender_idx,
                    sender_property: c.sender_property.clone(),
                    lag,
                });
            }
        }
        bindings.push(bound);
    }

    Ok(BoundGraph { entities, bindings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::components::{BuildingSpace, Damper, Occupancy, OutdoorEnvironment, Sensor};
    use crate::sim::graph::EntityKind;

    fn plant() -> Vec<Entity> {
        vec![
            Entity::new("S1", EntityKind::Sensor, Sensor::new()),
            Entity::new("Z1", EntityKind::BuildingSpace, BuildingSpace::new(100.0)),
            Entity::new("Out", EntityKind::OutdoorEnvironment, OutdoorEnvironment),
        ]
    }

    #[test]
    fn test_missing_required_input_is_fatal() {
        let connections = vec![Connection::new("S1", "value", "Z1", "ppmCO2")];
        let err = resolve(plant(), &connections).unwrap_err();
        // The zone's occupancy input has no sender.
        assert_eq!(
            err.downcast_ref::<SetupError>(),
            Some(&SetupError::ConfigResolution {
                entity: EntityId::from("Z1"),
                property: "occupants".into(),
            })
        );
    }

    #[test]
    fn test_lag_follows_phase_order() {
        let mut entities = plant();
        let occupancy = Occupancy::new(Default::default());
        entities.push(Entity::new("Occ", EntityKind::Occupancy, occupancy));
        entities.push(Entity::new("D1", EntityKind::Damper, Damper::new(1.0)));
        entities.push(Entity::new("D2", EntityKind::Damper, Damper::new(1.0)));
        let connections = vec![
            Connection::new("S1", "value", "Z1", "ppmCO2"),
            Connection::new("Z1", "occupants", "Occ", "occupants"),
            Connection::new("Z1", "flowVenIn", "D1", "flow"),
            Connection::new("Z1", "flowVenIn", "D2", "flow"),
            Connection::new("Z1", "ppmCO2Out", "Out", "ppmCO2"),
            Connection::new("D1", "posSignal", "S1", "value"),
            Connection::new("D2", "posSignal", "S1", "value"),
        ];
        let graph = resolve(entities, &connections).unwrap();
        let sensor = &graph.bindings[0];
        assert_eq!(sensor.len(), 1);
        assert_eq!(sensor[0].lag, Lag::PreviousStep);

        let zone = &graph.bindings[1];
        let flows: Vec<&Binding> = zone
            .iter()
            .filter(|b| b.receiver_property == "flowVenIn")
            .collect();
        assert_eq!(flows.len(), 2);
        assert!(zone.iter().all(|b| b.lag == Lag::SameStep));
    }

    #[test]
    fn test_same_phase_binding_is_rejected() {
        let entities = vec![
            Entity::new("D1", EntityKind::Damper, Damper::new(1.0)),
            Entity::new("D2", EntityKind::Damper, Damper::new(1.0)),
        ];
        let connections = vec![
            Connection::new("D1", "posSignal", "D2", "flow"),
            Connection::new("D2", "posSignal", "D1", "flow"),
        ];
        let err = resolve(entities, &connections).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SetupError>(),
            Some(SetupError::SamePhaseBinding { .. })
        ));
    }

    #[test]
    fn test_duplicate_and_unknown_ids() {
        let entities = vec![
            Entity::new("S1", EntityKind::Sensor, Sensor::new()),
            Entity::new("S1", EntityKind::Sensor, Sensor::new()),
        ];
        let err = resolve(entities, &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SetupError>(),
            Some(SetupError::DuplicateEntity(_))
        ));

        let connections = vec![Connection::new("S1", "value", "Nope", "ppmCO2")];
        let entities = vec![Entity::new("S1", EntityKind::Sensor, Sensor::new())];
        let err = resolve(entities, &connections).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SetupError>(),
            Some(&SetupError::UnknownEntity(EntityId::from("Nope")))
        );
    }
}
