//! Secondary span lookup for nodes synthesized after parsing (monomorphized clones,
//! desugared `for` loops, compiler-inserted drop calls) that need a span to blame in
//! diagnostics but have no natural one of their own.
use std::collections::HashMap;

use crate::Span;

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
        let id = format!("synspan_{}", self.next_id);
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
        self.get(id).copied().unwrap_or_else(Span::unknown)
    }

    pub fn clear(&mut self) {
        self.spans.clear();
        self.next_id = 0;
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_recalls_synthetic_spans() {
        let mut map = SpanMap::new();
        let span = Span {
            start: (10, 1),
            end: (10, 5),
            file_id: 2,
        };

        let id = map.generate_id();
        map.record(id.clone(), span);
        assert_eq!(map.get(&id), Some(&span));
        assert_eq!(map.get_or_unknown("missing"), Span::unknown());
    }
}
