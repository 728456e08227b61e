//! Filter criteria for change and mutation streams.

use crate::types::{ChangeRecord, Value};

/// Set of accepted labels. An empty set accepts every label.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabelFilter {
    labels: Vec<Value>,
}

impl LabelFilter {
    /// Accept any label.
    pub fn any() -> Self {
        Self::default()
    }

    /// Accept only the given labels.
    pub fn of<I, L>(labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Value>,
    {
        let mut filter = Self::default();
        for label in labels {
            let label = label.into();
            if !filter.labels.contains(&label) {
                filter.labels.push(label);
            }
        }
        filter
    }

    pub fn is_any(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[Value] {
        &self.labels
    }

    pub fn matches(&self, label: &Value) -> bool {
        self.labels.is_empty() || self.labels.contains(label)
    }
}

/// Which item ids a change stream follows.
#[derive(Clone, Debug, PartialEq)]
pub enum ItemScope {
    /// Changes to any item.
    All,
    /// Changes to one item id only.
    Item(String),
}

/// Filter applied to every change record before it reaches a stream.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeFilter {
    pub scope: ItemScope,
    pub states: LabelFilter,
}

impl ChangeFilter {
    /// Follow one item, restricted to `states`.
    pub fn item(id: impl Into<String>, states: LabelFilter) -> Self {
        Self {
            scope: ItemScope::Item(id.into()),
            states,
        }
    }

    /// Follow every item, restricted to `states`.
    pub fn all_items(states: LabelFilter) -> Self {
        Self {
            scope: ItemScope::All,
            states,
        }
    }

    pub fn matches(&self, record: &ChangeRecord) -> bool {
        if let ItemScope::Item(ref id) = self.scope {
            if *id != record.id {
                return false;
            }
        }
        self.states.matches(&record.state)
    }
}
