use serde::Serialize;

use crate::value::Value;

/// Keys affected by one upsert call, split by insert vs. update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpsertOutcome {
    pub inserted_keys: Vec<Vec<Value>>,
    pub updated_keys: Vec<Vec<Value>>,
}

impl UpsertOutcome {
    pub fn inserted_count(&self) -> usize {
        self.inserted_keys.len()
    }

    pub fn updated_count(&self) -> usize {
        self.updated_keys.len()
    }

    pub fn affected_count(&self) -> usize {
        self.inserted_count() + self.updated_count()
    }

    pub fn merge(&mut self, other: Self) {
        self.inserted_keys.extend(other.inserted_keys);
        self.updated_keys.extend(other.updated_keys);
    }
}
