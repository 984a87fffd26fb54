//! Handler registry mapping type strings to priority-ordered handlers.
//!
//! The same registry type backs both pipeline phases: the parser keeps one
//! of decomposition handlers, the formatter one of renderers. Lookup goes
//! exact type first, then the `major/*` bucket, then the global `*` bucket.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Default handler priority. Lower values are tried first.
pub const DEFAULT_PRIORITY: i32 = 0;

/// What every handler declares about itself.
pub trait Extension: Send + Sync {
    /// Type strings served, e.g. `"text/plain"`, `"text/*"` or `"*"`.
    fn mime_types(&self) -> &[&str];

    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Short name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

struct Entry<H: ?Sized> {
    priority: i32,
    sequence: usize,
    handler: Arc<H>,
}

/// Registry of handlers of one kind.
pub struct HandlerRegistry<H: ?Sized> {
    buckets: HashMap<String, Vec<Entry<H>>>,
    next_sequence: usize,
}

impl<H: ?Sized + Extension> HandlerRegistry<H> {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            next_sequence: 0,
        }
    }

    /// Register a handler under every type it declares.
    pub fn register(&mut self, handler: Arc<H>) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let priority = handler.priority();

        for mime_type in handler.mime_types() {
            let bucket = self
                .buckets
                .entry(mime_type.to_ascii_lowercase())
                .or_default();
            bucket.push(Entry {
                priority,
                sequence,
                handler: handler.clone(),
            });
            bucket.sort_by_key(|e| (e.priority, e.sequence));
        }
    }

    /// Candidate handlers for a concrete type, in the order to try them.
    pub fn handlers_for(&self, mime_type: &str) -> Vec<Arc<H>> {
        self.bucket_for(mime_type)
            .map(|bucket| bucket.iter().map(|e| e.handler.clone()).collect())
            .unwrap_or_default()
    }

    /// Whether any handler (exact, wildcard or global) serves the type.
    #[must_use]
    pub fn has_handlers(&self, mime_type: &str) -> bool {
        self.bucket_for(mime_type).is_some()
    }

    /// Whether a handler is registered under exactly this key.
    #[must_use]
    pub fn has_exact(&self, mime_type: &str) -> bool {
        self.buckets
            .get(&mime_type.to_ascii_lowercase())
            .is_some_and(|b| !b.is_empty())
    }

    /// Return set of all registration keys.
    #[must_use]
    pub fn registered_types(&self) -> HashSet<&str> {
        self.buckets.keys().map(|s| s.as_str()).collect()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.next_sequence
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.next_sequence == 0
    }

    fn bucket_for(&self, mime_type: &str) -> Option<&Vec<Entry<H>>> {
        let mime_type = mime_type.trim().to_ascii_lowercase();
        let non_empty = |key: &str| self.buckets.get(key).filter(|b| !b.is_empty());

        non_empty(&mime_type)
            .or_else(|| {
                let major = mime_type.split('/').next()?;
                non_empty(&format!("{major}/*"))
            })
            .or_else(|| non_empty("*"))
    }
}

impl<H: ?Sized + Extension> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Extension {
        fn label(&self) -> &str;
    }

    struct TestHandler {
        label: &'static str,
        types: &'static [&'static str],
        priority: i32,
    }

    impl Extension for TestHandler {
        fn mime_types(&self) -> &[&str] {
            self.types
        }

        fn priority(&self) -> i32 {
            self.priority
        }
    }

    impl Named for TestHandler {
        fn label(&self) -> &str {
            self.label
        }
    }

    fn handler(
        label: &'static str,
        types: &'static [&'static str],
        priority: i32,
    ) -> Arc<dyn Named> {
        Arc::new(TestHandler {
            label,
            types,
            priority,
        })
    }

    fn labels(registry: &HandlerRegistry<dyn Named>, mime_type: &str) -> Vec<String> {
        registry
            .handlers_for(mime_type)
            .iter()
            .map(|h| h.label().to_string())
            .collect()
    }

    #[test]
    fn test_priority_then_registration_order() {
        let mut registry: HandlerRegistry<dyn Named> = HandlerRegistry::new();
        registry.register(handler("late", &["text/plain"], 10));
        registry.register(handler("first", &["text/plain"], 0));
        registry.register(handler("second", &["text/plain"], 0));
        registry.register(handler("urgent", &["text/plain"], -5));

        assert_eq!(
            labels(&registry, "text/plain"),
            vec!["urgent", "first", "second", "late"]
        );
    }

    #[test]
    fn test_wildcard_and_global_fallback() {
        let mut registry: HandlerRegistry<dyn Named> = HandlerRegistry::new();
        registry.register(handler("plain", &["text/plain"], 0));
        registry.register(handler("any-text", &["text/*"], 0));
        registry.register(handler("anything", &["*"], 0));

        assert_eq!(labels(&registry, "TEXT/PLAIN"), vec!["plain"]);
        assert_eq!(labels(&registry, "text/enriched"), vec!["any-text"]);
        assert_eq!(labels(&registry, "image/png"), vec!["anything"]);
    }

    #[test]
    fn test_type_gate_without_global_bucket() {
        let mut registry: HandlerRegistry<dyn Named> = HandlerRegistry::new();
        registry.register(handler("plain", &["text/plain"], 0));

        assert!(registry.handlers_for("image/png").is_empty());
        assert!(!registry.has_handlers("application/pdf"));
        assert!(registry.has_exact("text/plain"));
    }

    #[test]
    fn test_multi_type_handler_counts_once() {
        let mut registry: HandlerRegistry<dyn Named> = HandlerRegistry::new();
        registry.register(handler("msg", &["message/rfc822", "message/news"], 0));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.registered_types().len(), 2);
        assert_eq!(labels(&registry, "message/news"), vec!["msg"]);
    }
}
