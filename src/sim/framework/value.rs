use serde::{Deserialize, Serialize};

/// A signal value exchanged between entities.
///
/// `Uninitialized` marks an output that has not been produced yet (e.g. a
/// controller with an unknown control law on its first step). Readers treat it
/// explicitly instead of silently substituting a number.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Uninitialized,
    Number(f64),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Uninitialized => None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self, Value::Number(_))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<Option<f64>> for Value {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Value::Uninitialized, Value::Number)
    }
}

/// Named output values of one entity, in insertion order.
///
/// Insertion order is kept so that result columns come out in the order the
/// component declares its outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyMap {
    entries: Vec<(String, Value)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `property` as uninitialized if it does not exist yet.
    pub fn declare(&mut self, property: &str) {
        if self.position(property).is_none() {
            self.entries.push((property.to_string(), Value::Uninitialized));
        }
    }

    pub fn set(&mut self, property: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.position(property) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((property.to_string(), value)),
        }
    }

    pub fn get(&self, property: &str) -> Option<Value> {
        self.position(property).map(|i| self.entries[i].1)
    }

    /// Numeric value of `property`, `None` if missing or uninitialized.
    pub fn number(&self, property: &str) -> Option<f64> {
        self.get(property).and_then(|v| v.as_f64())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, property: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == property)
    }
}

/// Values gathered for one entity's input properties before it steps.
///
/// A property bound to several senders (e.g. a fan's `partialFlow`) carries
/// one value per sender, in connection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs {
    entries: Vec<(String, Vec<Value>)>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, property: &str, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| k == property) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((property.to_string(), vec![value])),
        }
    }

    /// Builder used in tests and by components that synthesize inputs.
    pub fn with(mut self, property: &str, value: impl Into<Value>) -> Self {
        self.push(property, value.into());
        self
    }

    /// First value bound to `property`.
    pub fn value(&self, property: &str) -> Value {
        self.all(property).first().copied().unwrap_or_default()
    }

    /// First value bound to `property` as a number.
    pub fn scalar(&self, property: &str) -> Option<f64> {
        self.value(property).as_f64()
    }

    pub fn all(&self, property: &str) -> &[Value] {
        self.entries
            .iter()
            .find(|(k, _)| k == property)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }
}

/// Capability of reading a named output, implemented by every entity.
pub trait OutputSource {
    fn get_output(&self, property: &str) -> Option<Value>;
}

impl OutputSource for PropertyMap {
    fn get_output(&self, property: &str) -> Option<Value> {
        self.get(property)
    }
}
