//! Dependency graph between reactive sources and rendered elements.
//!
//! Rendering an element runs inside [`ReactiveGraph::observe`]; every
//! [`ReactiveGraph::get`] made during that closure records an edge from the
//! element to the source. A later [`ReactiveGraph::set`] marks only the
//! recorded dependents dirty.

use super::value::Value;
use log::trace;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(usize);

/// Element id as assigned by `observeComponentCreation2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u32);

#[derive(Debug)]
struct Source {
    label: String,
    value: Value,
    dependents: BTreeSet<ElementId>,
    /// One-way copies refreshed whenever this source changes.
    synced: Vec<SourceId>,
    watches: Vec<String>,
    assignments: u64,
}

#[derive(Debug, Default)]
pub struct ReactiveGraph {
    sources: Vec<Source>,
    recording: Option<ElementId>,
    dirty: BTreeSet<ElementId>,
    fired: Vec<String>,
}

impl ReactiveGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, label: impl Into<String>, value: Value) -> SourceId {
        let id = SourceId(self.sources.len());
        let label = label.into();
        trace!("source {:?} '{}' created", id, label);
        self.sources.push(Source {
            label,
            value,
            dependents: BTreeSet::new(),
            synced: Vec::new(),
            watches: Vec::new(),
            assignments: 0,
        });
        id
    }

    /// Creates a source holding a deep copy of `parent` that is refreshed on
    /// every parent change. Writes to the copy never reach the parent.
    pub fn add_one_way(&mut self, label: impl Into<String>, parent: SourceId) -> SourceId {
        let value = self.sources[parent.0].value.deep_copy();
        let id = self.add_source(label, value);
        self.sources[parent.0].synced.push(id);
        id
    }

    pub fn add_watch(&mut self, id: SourceId, handler: impl Into<String>) {
        self.sources[id.0].watches.push(handler.into());
    }

    /// Runs `render` as the (re)creation of `element`, replacing its edges.
    pub fn observe<R>(&mut self, element: ElementId, render: impl FnOnce(&mut Self) -> R) -> R {
        for source in &mut self.sources {
            source.dependents.remove(&element);
        }
        self.dirty.remove(&element);
        let previous = self.recording.replace(element);
        let result = render(self);
        self.recording = previous;
        result
    }

    /// Reads a source, recording a dependency when inside [`Self::observe`].
    pub fn get(&mut self, id: SourceId) -> &Value {
        let source = &mut self.sources[id.0];
        if let Some(element) = self.recording {
            source.dependents.insert(element);
        }
        &source.value
    }

    /// Reads a source without recording.
    pub fn peek(&self, id: SourceId) -> &Value {
        &self.sources[id.0].value
    }

    /// Whole-value assignment. Assigning an equal primitive is a no-op.
    pub fn set(&mut self, id: SourceId, value: Value) {
        let source = &mut self.sources[id.0];
        if value.is_primitive() && source.value == value {
            return;
        }
        source.value = value;
        source.assignments += 1;
        trace!("source '{}' assigned", source.label);
        self.invalidate(id);
    }

    /// In-place change of the held value (`set.add`, `obj.field = v`).
    /// Dependents are invalidated but the assignment count is untouched.
    pub fn mutate<R>(&mut self, id: SourceId, change: impl FnOnce(&mut Value) -> R) -> R {
        let result = change(&mut self.sources[id.0].value);
        self.invalidate(id);
        result
    }

    fn invalidate(&mut self, id: SourceId) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let source = &self.sources[current.0];
            self.dirty.extend(source.dependents.iter().copied());
            self.fired.extend(source.watches.iter().cloned());
            let value = source.value.clone();
            let synced = source.synced.clone();
            for child in synced {
                self.sources[child.0].value = value.deep_copy();
                pending.push(child);
            }
        }
    }

    pub fn dependents(&self, id: SourceId) -> Vec<ElementId> {
        self.sources[id.0].dependents.iter().copied().collect()
    }

    /// Number of whole-value assignments a source has seen.
    pub fn assignments(&self, id: SourceId) -> u64 {
        self.sources[id.0].assignments
    }

    pub fn label(&self, id: SourceId) -> &str {
        &self.sources[id.0].label
    }

    /// Elements awaiting re-render, in id order.
    pub fn take_dirty(&mut self) -> Vec<ElementId> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }

    /// `@Watch` handlers fired since the last call, in firing order.
    pub fn take_fired(&mut self) -> Vec<String> {
        std::mem::take(&mut self.fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_invalidates_only_dependents() {
        let mut graph = ReactiveGraph::new();
        let count = graph.add_source("count", Value::from(0));
        let title = graph.add_source("title", Value::from("hi"));
        graph.observe(ElementId(1), |g| {
            g.get(count);
        });
        graph.observe(ElementId(2), |g| {
            g.get(title);
        });

        graph.set(count, Value::from(1));
        assert_eq!(graph.take_dirty(), vec![ElementId(1)]);
        assert!(graph.take_dirty().is_empty());
    }

    #[test]
    fn test_observe_replaces_edges() {
        let mut graph = ReactiveGraph::new();
        let a = graph.add_source("a", Value::from(true));
        let b = graph.add_source("b", Value::from(1));
        graph.observe(ElementId(3), |g| {
            g.get(a);
            g.get(b);
        });
        graph.observe(ElementId(3), |g| {
            g.get(a);
        });
        assert!(graph.dependents(b).is_empty());
        assert_eq!(graph.dependents(a), vec![ElementId(3)]);
    }

    #[test]
    fn test_peek_does_not_record() {
        let mut graph = ReactiveGraph::new();
        let a = graph.add_source("a", Value::from(1));
        graph.observe(ElementId(1), |g| {
            let _ = g.peek(a);
        });
        assert!(graph.dependents(a).is_empty());
    }

    #[test]
    fn test_equal_primitive_is_noop() {
        let mut graph = ReactiveGraph::new();
        let a = graph.add_source("a", Value::from(1));
        graph.observe(ElementId(1), |g| {
            g.get(a);
        });
        graph.set(a, Value::from(1));
        assert!(graph.take_dirty().is_empty());
        assert_eq!(graph.assignments(a), 0);
    }

    #[test]
    fn test_watch_fires_on_change() {
        let mut graph = ReactiveGraph::new();
        let a = graph.add_source("a", Value::from(1));
        graph.add_watch(a, "onA");
        graph.set(a, Value::from(2));
        graph.mutate(a, |_| ());
        assert_eq!(graph.take_fired(), vec!["onA".to_string(), "onA".to_string()]);
    }

    #[test]
    fn test_one_way_refreshes_from_parent() {
        let mut graph = ReactiveGraph::new();
        let parent = graph.add_source("x", Value::from(1));
        let child = graph.add_one_way("y", parent);
        graph.observe(ElementId(7), |g| {
            g.get(child);
        });
        graph.set(parent, Value::from(4));
        assert_eq!(graph.peek(child), &Value::from(4));
        assert_eq!(graph.take_dirty(), vec![ElementId(7)]);
    }
}
