//! `$$` two-way binding proxies.

use super::graph::{ReactiveGraph, SourceId};
use super::value::Value;

/// Accessor pair handed to a built-in component for a `$$` argument.
/// `path` selects a nested field of an object source.
#[derive(Debug, Clone)]
pub struct Binding {
    source: SourceId,
    path: Vec<String>,
}

impl Binding {
    pub fn new(source: SourceId) -> Self {
        Self { source, path: Vec::new() }
    }

    /// Binding to `source.field`.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.path.push(name.into());
        self
    }

    pub fn get(&self, graph: &mut ReactiveGraph) -> Value {
        let mut value = graph.get(self.source);
        for key in &self.path {
            match value.field(key) {
                Some(next) => value = next,
                None => return Value::Undefined,
            }
        }
        value.clone()
    }

    /// Writes back through the proxy. A whole-value binding assigns; a
    /// field binding mutates the object in place.
    pub fn set(&self, graph: &mut ReactiveGraph, value: Value) {
        if self.path.is_empty() {
            graph.set(self.source, value);
            return;
        }
        let path = self.path.clone();
        graph.mutate(self.source, move |root| {
            let mut target = root;
            for key in &path {
                match { target }.field_mut(key) {
                    Some(next) => target = next,
                    None => return,
                }
            }
            *target = value;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_value_binding() {
        let mut graph = ReactiveGraph::new();
        let text = graph.add_source("text", Value::from("a"));
        let binding = Binding::new(text);
        binding.set(&mut graph, Value::from("b"));
        assert_eq!(binding.get(&mut graph), Value::from("b"));
        assert_eq!(graph.assignments(text), 1);
    }

    #[test]
    fn test_field_binding() {
        let mut graph = ReactiveGraph::new();
        let form = graph.add_source(
            "form",
            Value::object(Some("Form"), [("checked".to_string(), Value::from(false))]),
        );
        let binding = Binding::new(form).field("checked");
        binding.set(&mut graph, Value::from(true));
        assert_eq!(binding.get(&mut graph), Value::from(true));
        assert_eq!(graph.assignments(form), 0);
        assert_eq!(Binding::new(form).field("missing").get(&mut graph), Value::Undefined);
    }
}
