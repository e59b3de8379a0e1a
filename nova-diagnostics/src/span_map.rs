/// Span tracking for AST nodes that don't carry a `Span` of their own (teacher's design;
/// here retained mainly for codegen-synthesized nodes).
///
/// Uses stable string IDs rather than the node itself, so the compiler can look a span up
/// without the AST and diagnostics crates depending on each other.
use crate::Span;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct SpanMap {
    spans: HashMap<String, Span>,
    next_id: usize,
}

impl SpanMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate_id(&mut self) -> String {
        let id = format!("span_{}", self.next_id);
        self.next_id += 1;
        id
    }

    pub fn record(&mut self, id: String, span: Span) {
        self.spans.insert(id, span);
    }

    pub fn get(&self, id: &str) -> Option<&Span> {
        self.spans.get(id)
    }

    pub fn get_or_unknown(&self, id: &str) -> Span {
        self.get(id).cloned().unwrap_or_else(Span::unknown)
    }

    pub fn clear(&mut self) {
        self.spans.clear();
        self.next_id = 0;
    }

    pub fn stats(&self) -> usize {
        self.spans.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_looks_up_spans() {
        let mut map = SpanMap::new();
        let span = Span::new("test.nova".to_string(), 10, 5, 2);

        let id = map.generate_id();
        map.record(id.clone(), span.clone());
        assert_eq!(map.get(&id), Some(&span));
    }
}
