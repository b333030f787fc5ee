//! Field-level change detection and replication.
//!
//! Every synchronized type registers its fields once, in declaration order,
//! as (name, getter, setter) entries. The authority diffs its state against
//! the last value it sent to produce `FieldUpdate`s; every participant diffs
//! its (possibly mirrored) state against the last value it rendered to learn
//! which fields changed. Only the net change between two observations is
//! reported, however many ticks happened in between.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::player::RacerID;
use crate::tick::Tick;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Bool(bool),
    Float(f64),
    Ticks(Vec<Tick>),
}

impl FieldValue {
    pub fn as_int(&self) -> i64 {
        match self {
            FieldValue::Int(value) => *value,
            other => {
                warn!("expected an integer field, got {:?}", other);
                0
            }
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            FieldValue::Bool(value) => *value,
            other => {
                warn!("expected a boolean field, got {:?}", other);
                false
            }
        }
    }

    pub fn as_float(&self) -> f64 {
        match self {
            FieldValue::Float(value) => *value,
            other => {
                warn!("expected a float field, got {:?}", other);
                0.0
            }
        }
    }

    pub fn as_ticks(&self) -> &[Tick] {
        match self {
            FieldValue::Ticks(ticks) => ticks,
            other => {
                warn!("expected a tick array field, got {:?}", other);
                &[]
            }
        }
    }
}

pub type FieldIndex = u8;

// which replicated record a batch of field updates belongs to
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReplicatedEntity {
    ModeClock,
    Progress(RacerID),
    Items(RacerID),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FieldUpdate {
    pub field: FieldIndex,
    pub value: FieldValue,
}

struct Field<T> {
    name: &'static str,
    get: fn(&T) -> FieldValue,
    set: fn(&mut T, &FieldValue),
}

pub struct FieldTable<T> {
    fields: Vec<Field<T>>,
}

pub trait Synchronized: Sized {
    fn register_fields(table: &mut FieldTable<Self>);
}

impl<T: Synchronized> FieldTable<T> {
    pub fn for_type() -> Self {
        let mut table = FieldTable { fields: Vec::new() };
        T::register_fields(&mut table);
        table
    }
}

impl<T> FieldTable<T> {
    pub fn register(
        &mut self,
        name: &'static str,
        get: fn(&T) -> FieldValue,
        set: fn(&mut T, &FieldValue),
    ) -> &mut Self {
        debug_assert!(
            self.fields.iter().all(|field| field.name != name),
            "field {} registered twice",
            name
        );
        self.fields.push(Field { name, get, set });
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn name(&self, field: FieldIndex) -> Option<&'static str> {
        self.fields.get(field as usize).map(|field| field.name)
    }

    pub fn read_all(&self, state: &T) -> Vec<FieldValue> {
        self.fields.iter().map(|field| (field.get)(state)).collect()
    }

    // every field, for participants that have nothing mirrored yet
    pub fn full_snapshot(&self, state: &T) -> Vec<FieldUpdate> {
        self.fields
            .iter()
            .enumerate()
            .map(|(index, field)| FieldUpdate {
                field: index as FieldIndex,
                value: (field.get)(state),
            })
            .collect()
    }

    pub fn apply(&self, state: &mut T, updates: &[FieldUpdate]) {
        for update in updates {
            match self.fields.get(update.field as usize) {
                Some(field) => (field.set)(state, &update.value),
                None => warn!("dropping update for unknown field {}", update.field),
            }
        }
    }
}

pub struct ChangeDetector<T> {
    table: FieldTable<T>,
    last_observed: Vec<FieldValue>,
}

impl<T: Synchronized> ChangeDetector<T> {
    // the initial state counts as observed, so nothing is reported for it
    pub fn new(initial: &T) -> Self {
        let table = FieldTable::for_type();
        let last_observed = table.read_all(initial);
        Self {
            table,
            last_observed,
        }
    }
}

impl<T> ChangeDetector<T> {
    pub fn table(&self) -> &FieldTable<T> {
        &self.table
    }

    fn diff(&mut self, state: &T) -> Vec<(FieldIndex, FieldValue)> {
        let mut changed = Vec::new();
        for (index, field) in self.table.fields.iter().enumerate() {
            let current = (field.get)(state);
            if self.last_observed[index] != current {
                self.last_observed[index] = current.clone();
                changed.push((index as FieldIndex, current));
            }
        }
        changed
    }

    /// Names of the fields that differ from the last observation, in
    /// registration order. Calling it again without a change yields nothing.
    pub fn detect_changes(&mut self, state: &T) -> Vec<&'static str> {
        let changed = self.diff(state);
        changed
            .into_iter()
            .filter_map(|(index, _)| self.table.name(index))
            .collect()
    }

    pub fn collect_updates(&mut self, state: &T) -> Vec<FieldUpdate> {
        self.diff(state)
            .into_iter()
            .map(|(field, value)| FieldUpdate { field, value })
            .collect()
    }
}

/// A read-only copy of authoritative state, written only through replicated
/// field updates.
pub struct Mirror<T> {
    state: T,
    table: FieldTable<T>,
}

impl<T: Synchronized> Mirror<T> {
    pub fn new(state: T) -> Self {
        Self {
            state,
            table: FieldTable::for_type(),
        }
    }
}

impl<T> Mirror<T> {
    pub fn get(&self) -> &T {
        &self.state
    }

    pub fn apply(&mut self, updates: &[FieldUpdate]) {
        self.table.apply(&mut self.state, updates);
    }
}
