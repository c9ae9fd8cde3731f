use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A product page under watch. Read from the config file at startup and
/// immutable for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackedItem {
    pub url: String,
    pub name: String,
}

/// One cycle's extracted reading for one tracked page.
///
/// `price` of 0.0 means the page carried no readable price this cycle;
/// stock alone is still worth tracking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub url: String,
    pub name: String,
    pub stock: u32,
    pub price: f64,
    pub fetched_at_ms: i64,
}

impl Observation {
    pub fn new(item: &TrackedItem, stock: u32, price: f64) -> Self {
        Self {
            url: item.url.clone(),
            name: item.name.clone(),
            stock,
            price,
            fetched_at_ms: Utc::now().timestamp_millis(),
        }
    }

    pub fn price_known(&self) -> bool {
        self.price > 0.0
    }
}

/// Last committed (stock, price) for one url.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StateEntry {
    pub stock: u32,
    pub price: f64,
}

/// Last-committed state per url, the baseline every diff runs against.
///
/// Owned by the monitor loop; mutated only after a cycle's fetch barrier,
/// so no locking. Entries are never removed during a run.
#[derive(Debug, Default)]
pub struct StateStore {
    entries: HashMap<String, StateEntry>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, url: &str) -> Option<&StateEntry> {
        self.entries.get(url)
    }

    /// Overwrite the entry for every given observation. Urls absent from
    /// `observations` keep their last committed value.
    pub fn commit(&mut self, observations: &[Observation]) {
        for obs in observations {
            self.entries.insert(
                obs.url.clone(),
                StateEntry {
                    stock: obs.stock,
                    price: obs.price,
                },
            );
        }
    }
}
