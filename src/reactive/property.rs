//! Runtime property wrappers, one per field ownership category.

use super::graph::{ReactiveGraph, SourceId};
use super::value::Value;
use super::ReactiveError;
use crate::decorator::WrapperKind;

/// How a wrapper relates to the source it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Owns its source (`@State`, `@Local`, `@Provide`).
    Owned,
    /// Deep copy refreshed from the parent (`@Prop`, `@StorageProp`).
    OneWay,
    /// Deep copy refreshed from the parent that the child cannot assign
    /// (V2 `@Param`). Changes flow back only through an `@Event` callback.
    ReadOnly,
    /// Seeded from the parent on creation, then independent (`@Param @Once`).
    Once,
    /// Shares the parent's source (`@Link`, `@ObjectLink`, `@Consume`).
    TwoWay,
}

#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    source: SourceId,
    sync: SyncMode,
}

impl Property {
    /// Creates the wrapper for a field of the given kind.
    ///
    /// `parent` is the source the parent component passes for the field;
    /// `init` is the field's own initializer.
    pub fn create(
        graph: &mut ReactiveGraph,
        kind: &WrapperKind,
        name: &str,
        init: Option<Value>,
        parent: Option<SourceId>,
    ) -> Result<Self, ReactiveError> {
        let sync = match kind {
            WrapperKind::State
            | WrapperKind::Local
            | WrapperKind::Provide { .. }
            | WrapperKind::Provider { .. }
            | WrapperKind::Plain => SyncMode::Owned,
            WrapperKind::Prop
            | WrapperKind::StorageProp(_)
            | WrapperKind::LocalStorageProp(_) => SyncMode::OneWay,
            WrapperKind::Param { once: false } => SyncMode::ReadOnly,
            WrapperKind::Param { once: true } => SyncMode::Once,
            WrapperKind::Link
            | WrapperKind::ObjectLink
            | WrapperKind::Consume { .. }
            | WrapperKind::Consumer { .. }
            | WrapperKind::StorageLink(_)
            | WrapperKind::LocalStorageLink(_) => SyncMode::TwoWay,
            WrapperKind::BuilderParam | WrapperKind::Event => {
                return Err(ReactiveError::NotReactive {
                    field: name.to_string(),
                    kind: kind.label(),
                })
            }
        };

        let source = match (sync, parent) {
            (SyncMode::Owned, Some(parent)) if kind.seeds_when_supplied() => {
                let seeded = graph.peek(parent).clone();
                graph.add_source(name, seeded)
            }
            (SyncMode::Owned, _) => graph.add_source(name, init.unwrap_or_default()),
            (SyncMode::OneWay | SyncMode::ReadOnly, Some(parent)) => graph.add_one_way(name, parent),
            (SyncMode::Once, Some(parent)) => {
                let seeded = graph.peek(parent).deep_copy();
                graph.add_source(name, seeded)
            }
            (SyncMode::OneWay | SyncMode::ReadOnly | SyncMode::Once, None) => match init {
                Some(value) => graph.add_source(name, value),
                None => {
                    return Err(ReactiveError::MissingParent {
                        field: name.to_string(),
                        kind: kind.label(),
                    })
                }
            },
            (SyncMode::TwoWay, Some(parent)) => parent,
            (SyncMode::TwoWay, None) => {
                return Err(ReactiveError::MissingParent {
                    field: name.to_string(),
                    kind: kind.label(),
                })
            }
        };
        Ok(Self {
            name: name.to_string(),
            source,
            sync,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn sync(&self) -> SyncMode {
        self.sync
    }

    pub fn get<'g>(&self, graph: &'g mut ReactiveGraph) -> &'g Value {
        graph.get(self.source)
    }

    /// Assigns a new value. A `@Param` can only be changed by its parent.
    pub fn set(&self, graph: &mut ReactiveGraph, value: Value) -> Result<(), ReactiveError> {
        if self.sync == SyncMode::ReadOnly {
            return Err(ReactiveError::ReadOnly {
                field: self.name.clone(),
            });
        }
        graph.set(self.source, value);
        Ok(())
    }

    /// In-place change such as `this.m.add(1)`.
    pub fn mutate<R>(&self, graph: &mut ReactiveGraph, change: impl FnOnce(&mut Value) -> R) -> R {
        graph.mutate(self.source, change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::graph::ElementId;

    #[test]
    fn test_state_round_trip() {
        let mut graph = ReactiveGraph::new();
        let count =
            Property::create(&mut graph, &WrapperKind::State, "count", Some(Value::from(0)), None).unwrap();
        count.set(&mut graph, Value::from(3)).unwrap();
        assert_eq!(count.get(&mut graph), &Value::from(3));
    }

    #[test]
    fn test_prop_isolation() {
        let mut graph = ReactiveGraph::new();
        let x = Property::create(&mut graph, &WrapperKind::State, "x", Some(Value::from(1)), None).unwrap();
        let y = Property::create(&mut graph, &WrapperKind::Prop, "y", None, Some(x.source())).unwrap();
        y.set(&mut graph, Value::from(2)).unwrap();
        assert_eq!(x.get(&mut graph), &Value::from(1));
        assert_eq!(y.get(&mut graph), &Value::from(2));

        x.set(&mut graph, Value::from(5)).unwrap();
        assert_eq!(y.get(&mut graph), &Value::from(5));
    }

    #[test]
    fn test_link_propagation() {
        let mut graph = ReactiveGraph::new();
        let x = Property::create(&mut graph, &WrapperKind::State, "x", Some(Value::from(0)), None).unwrap();
        let y = Property::create(&mut graph, &WrapperKind::Link, "y", None, Some(x.source())).unwrap();
        graph.observe(ElementId(4), |g| {
            y.get(g);
        });
        x.set(&mut graph, Value::from(5)).unwrap();
        assert_eq!(y.get(&mut graph), &Value::from(5));
        assert_eq!(graph.take_dirty(), vec![ElementId(4)]);

        y.set(&mut graph, Value::from(6)).unwrap();
        assert_eq!(x.get(&mut graph), &Value::from(6));
    }

    #[test]
    fn test_param_follows_parent_but_is_read_only() {
        let mut graph = ReactiveGraph::new();
        let x = Property::create(&mut graph, &WrapperKind::Local, "x", Some(Value::from(1)), None).unwrap();
        let y = Property::create(&mut graph, &WrapperKind::Param { once: false }, "y", None, Some(x.source()))
            .unwrap();
        assert_eq!(y.sync(), SyncMode::ReadOnly);
        x.set(&mut graph, Value::from(2)).unwrap();
        assert_eq!(y.get(&mut graph), &Value::from(2));

        let err = y.set(&mut graph, Value::from(99)).unwrap_err();
        assert_eq!(err, ReactiveError::ReadOnly { field: "y".to_string() });
        assert_eq!(x.get(&mut graph), &Value::from(2));
        assert_eq!(y.get(&mut graph), &Value::from(2));
    }

    #[test]
    fn test_param_once_ignores_later_parent_changes() {
        let mut graph = ReactiveGraph::new();
        let x = Property::create(&mut graph, &WrapperKind::Local, "x", Some(Value::from(1)), None).unwrap();
        let y = Property::create(&mut graph, &WrapperKind::Param { once: true }, "y", None, Some(x.source()))
            .unwrap();
        graph.observe(ElementId(5), |g| {
            y.get(g);
        });
        x.set(&mut graph, Value::from(2)).unwrap();
        assert_eq!(y.get(&mut graph), &Value::from(1));
        assert!(graph.take_dirty().is_empty());

        y.set(&mut graph, Value::from(7)).unwrap();
        assert_eq!(x.get(&mut graph), &Value::from(2));
        assert_eq!(y.get(&mut graph), &Value::from(7));
    }

    #[test]
    fn test_link_set_mutation_is_not_a_reset() {
        let mut graph = ReactiveGraph::new();
        let message = Property::create(
            &mut graph,
            &WrapperKind::State,
            "message",
            Some(Value::set_of([Value::from(0), Value::from(1)])),
            None,
        )
        .unwrap();
        let m = Property::create(&mut graph, &WrapperKind::Link, "m", None, Some(message.source())).unwrap();
        graph.observe(ElementId(2), |g| {
            m.get(g);
        });

        m.mutate(&mut graph, |set| set.set_add(Value::from(2)));
        m.mutate(&mut graph, |set| set.set_delete(&Value::from(0)));
        assert_eq!(graph.assignments(message.source()), 0);
        assert_eq!(message.get(&mut graph), &Value::set_of([Value::from(1), Value::from(2)]));
        assert_eq!(graph.take_dirty(), vec![ElementId(2)]);

        m.set(&mut graph, Value::Set(Vec::new())).unwrap();
        assert_eq!(graph.assignments(message.source()), 1);
    }

    #[test]
    fn test_link_requires_parent() {
        let mut graph = ReactiveGraph::new();
        let err = Property::create(&mut graph, &WrapperKind::Link, "m", None, None).unwrap_err();
        assert!(matches!(err, ReactiveError::MissingParent { .. }));
        let err = Property::create(&mut graph, &WrapperKind::Event, "e", None, None).unwrap_err();
        assert!(matches!(err, ReactiveError::NotReactive { .. }));
    }

    #[test]
    fn test_state_seeded_by_parent() {
        let mut graph = ReactiveGraph::new();
        let supplied = graph.add_source("arg", Value::from(9));
        let s = Property::create(&mut graph, &WrapperKind::State, "s", Some(Value::from(0)), Some(supplied))
            .unwrap();
        assert_eq!(s.get(&mut graph), &Value::from(9));
        graph.set(supplied, Value::from(10));
        assert_eq!(s.get(&mut graph), &Value::from(9));
    }
}
