use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::sim::graph::Entity;
use crate::sim::time::SimTime;

/// Per-step outputs of every entity.
///
/// Columns are named `"<entityId>: <propertyName>"`; `None` marks an
/// uninitialized value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsTable {
    pub columns: Vec<String>,
    /// Local wall-clock label of each row.
    pub times: Vec<NaiveDateTime>,
    /// Standard-time instant of each row.
    pub standard_times: Vec<NaiveDateTime>,
    pub rows: Vec<Vec<Option<f64>>>,
}

impl ResultsTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let c = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[c]).collect())
    }

    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        let c = self.column_index(name)?;
        self.rows.get(row)?.get(c).copied().flatten()
    }

    /// Drops the first `steps` rows (warm-up window).
    pub fn discard_warmup(&mut self, steps: usize) {
        let n = steps.min(self.rows.len());
        self.rows.drain(..n);
        self.times.drain(..n);
        self.standard_times.drain(..n);
    }
}

pub fn column_name(entity: &str, property: &str) -> String {
    format!("{entity}: {property}")
}

/// Records one row per step from the entities' output maps.
///
/// The intended workflow is:
/// 1) create the recorder once entities are initialized (fixes the columns),
/// 2) push one row after every step,
/// 3) finalize into a [`ResultsTable`].
#[derive(Debug, Default)]
pub struct Recorder {
    sources: Vec<(usize, String)>,
    table: ResultsTable,
}

impl Recorder {
    pub fn new(entities: &[Entity]) -> Self {
        let mut sources = Vec::new();
        let mut columns = Vec::new();
        for (i, entity) in entities.iter().enumerate() {
            for (property, _) in entity.output.iter() {
                sources.push((i, property.to_string()));
                columns.push(column_name(entity.id.as_str(), property));
            }
        }
        Self {
            sources,
            table: ResultsTable {
                columns,
                ..ResultsTable::default()
            },
        }
    }

    pub fn push_step(&mut self, time: &SimTime, entities: &[Entity]) -> anyhow::Result<()> {
        let row = self
            .sources
            .iter()
            .map(|(i, property)| {
                let entity = entities.get(*i).ok_or_else(|| {
                    anyhow::anyhow!("Recorder::push_step: entity {i} out of range")
                })?;
                Ok(entity.output.number(property))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        self.table.rows.push(row);
        self.table.times.push(time.local);
        self.table.standard_times.push(time.standard);
        Ok(())
    }

    pub fn finalize(self) -> ResultsTable {
        self.table
    }
}
