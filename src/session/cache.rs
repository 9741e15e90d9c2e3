//! Per-session cache of materialized query results.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::warehouse::Table;

/// Successful results keyed by exact SQL text, oldest evicted first.
#[derive(Debug)]
pub struct QueryCache {
    capacity: usize,
    entries: HashMap<String, Arc<Table>>,
    order: VecDeque<String>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, sql: &str) -> Option<Arc<Table>> {
        self.entries.get(sql).cloned()
    }

    pub fn insert(&mut self, sql: &str, table: Arc<Table>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(sql.to_string(), table).is_none() {
            self.order.push_back(sql.to_string());
        }
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
