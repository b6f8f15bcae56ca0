//! Free list for `@Reusable` components.

use super::value::Value;
use log::debug;
use std::collections::HashMap;

/// A component instance that can be parked and brought back with new params.
pub trait Recyclable {
    /// Pool key: the `reuseId` when one is given, else the component name.
    fn reuse_id(&self) -> String;

    /// Re-seeds the instance from fresh construction params
    /// (`aboutToReuse`).
    fn reset(&mut self, params: &Value);

    /// Called when the instance is parked (`aboutToRecycle`).
    fn recycle(&mut self) {}
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub hits: usize,
    pub misses: usize,
    pub parked: usize,
}

#[derive(Debug)]
pub struct RecyclePool<T> {
    free: HashMap<String, Vec<T>>,
    stats: PoolStats,
}

impl<T> Default for RecyclePool<T> {
    fn default() -> Self {
        Self {
            free: HashMap::new(),
            stats: PoolStats::default(),
        }
    }
}

impl<T: Recyclable> RecyclePool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks an instance under its reuse id.
    pub fn park(&mut self, mut item: T) {
        item.recycle();
        let key = item.reuse_id();
        debug!("parking reusable '{}'", key);
        self.free.entry(key).or_default().push(item);
        self.stats.parked += 1;
    }

    /// Takes a parked instance for `reuse_id` and resets it with `params`.
    pub fn acquire(&mut self, reuse_id: &str, params: &Value) -> Option<T> {
        let item = self.free.get_mut(reuse_id).and_then(Vec::pop).map(|mut item| {
            item.reset(params);
            item
        });
        if item.is_some() {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        item
    }

    /// Reuses a parked instance when one exists, otherwise builds a new one.
    pub fn acquire_or_create(&mut self, reuse_id: &str, params: &Value, create: impl FnOnce(&Value) -> T) -> T {
        match self.acquire(reuse_id, params) {
            Some(item) => item,
            None => create(params),
        }
    }

    pub fn available(&self, reuse_id: &str) -> usize {
        self.free.get(reuse_id).map_or(0, Vec::len)
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Row {
        reuse: Option<&'static str>,
        label: Value,
        recycled: usize,
    }

    impl Row {
        fn new(params: &Value) -> Self {
            Row {
                reuse: None,
                label: params.field("label").cloned().unwrap_or_default(),
                recycled: 0,
            }
        }
    }

    impl Recyclable for Row {
        fn reuse_id(&self) -> String {
            self.reuse.unwrap_or("Row").to_string()
        }

        fn reset(&mut self, params: &Value) {
            self.label = params.field("label").cloned().unwrap_or_default();
        }

        fn recycle(&mut self) {
            self.recycled += 1;
        }
    }

    fn params(label: &str) -> Value {
        Value::object(None, [("label".to_string(), Value::from(label))])
    }

    #[test]
    fn test_reuse_resets_params() {
        let mut pool = RecyclePool::new();
        pool.park(Row::new(&params("a")));
        let row = pool.acquire("Row", &params("b")).unwrap();
        assert_eq!(row.label, Value::from("b"));
        assert_eq!(row.recycled, 1);
        assert_eq!(pool.available("Row"), 0);
    }

    #[test]
    fn test_keyed_by_reuse_id() {
        let mut pool = RecyclePool::new();
        let mut row = Row::new(&params("a"));
        row.reuse = Some("wide");
        pool.park(row);
        assert!(pool.acquire("Row", &params("b")).is_none());
        assert!(pool.acquire("wide", &params("b")).is_some());
        assert_eq!(pool.stats(), PoolStats { hits: 1, misses: 1, parked: 1 });
    }

    #[test]
    fn test_acquire_or_create() {
        let mut pool: RecyclePool<Row> = RecyclePool::new();
        let row = pool.acquire_or_create("Row", &params("fresh"), Row::new);
        assert_eq!(row.label, Value::from("fresh"));
        assert_eq!(row.recycled, 0);
    }
}
