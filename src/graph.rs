//! Bidirectional multi-map used to track which files a build consulted.
//!
//! An edge `a -> b` means "building `a` read `b`". Forward lookups answer what
//! a file depends on; reverse lookups answer which builds must be redone when
//! `b` changes. Every operation keeps both directions in sync.

use std::collections::HashMap;
use std::hash::Hash;
use std::path::PathBuf;

/// File dependency graph keyed by resolved path.
pub type DependencyGraph = TwoWayMap<PathBuf, PathBuf>;

/// A many-to-many map that can be queried from either side.
///
/// Values are kept in insertion order and deduplicated. Lookups return owned
/// snapshots, so later mutation never changes a previously returned list.
#[derive(Debug, Clone)]
pub struct TwoWayMap<A, B> {
    forward: HashMap<A, Vec<B>>,
    reverse: HashMap<B, Vec<A>>,
}

impl<A, B> Default for TwoWayMap<A, B> {
    fn default() -> Self {
        Self { forward: HashMap::new(), reverse: HashMap::new() }
    }
}

impl<A, B> TwoWayMap<A, B>
where
    A: Eq + Hash + Clone,
    B: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything `a` maps to.
    pub fn get(&self, a: &A) -> Vec<B> {
        self.forward.get(a).cloned().unwrap_or_default()
    }

    /// Everything that maps to `b`.
    pub fn get_reverse(&self, b: &B) -> Vec<A> {
        self.reverse.get(b).cloned().unwrap_or_default()
    }

    /// Add the edge `a -> b`. Adding an existing edge is a no-op.
    pub fn set(&mut self, a: A, b: B) {
        let targets = self.forward.entry(a.clone()).or_default();
        if !targets.contains(&b) {
            targets.push(b.clone());
        }

        let sources = self.reverse.entry(b).or_default();
        if !sources.contains(&a) {
            sources.push(a);
        }
    }

    /// Add the edge `a -> b`, named from the reverse side.
    pub fn set_reverse(&mut self, b: B, a: A) {
        self.set(a, b);
    }

    /// Remove `a` and every edge leaving it.
    pub fn delete(&mut self, a: &A) {
        let Some(targets) = self.forward.remove(a) else {
            return;
        };

        for b in targets {
            if let Some(sources) = self.reverse.get_mut(&b) {
                sources.retain(|x| x != a);
                if sources.is_empty() {
                    self.reverse.remove(&b);
                }
            }
        }
    }

    /// Remove `b` and every edge arriving at it.
    pub fn delete_reverse(&mut self, b: &B) {
        let Some(sources) = self.reverse.remove(b) else {
            return;
        };

        for a in sources {
            if let Some(targets) = self.forward.get_mut(&a) {
                targets.retain(|x| x != b);
                if targets.is_empty() {
                    self.forward.remove(&a);
                }
            }
        }
    }

    /// Whether the edge `a -> b` exists.
    pub fn contains(&self, a: &A, b: &B) -> bool {
        self.forward.get(a).is_some_and(|targets| targets.contains(b))
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.forward.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> TwoWayMap<&'static str, &'static str> {
        TwoWayMap::new()
    }

    #[test]
    fn test_empty() {
        let map = map();
        assert!(map.get(&"1").is_empty());
        assert!(map.get_reverse(&"1").is_empty());
        assert!(map.is_empty());
    }

    #[test]
    fn test_single_entry() {
        let mut map = map();
        map.set("1", "2");

        assert_eq!(map.get(&"1"), vec!["2"]);
        assert_eq!(map.get_reverse(&"2"), vec!["1"]);
        assert!(map.contains(&"1", &"2"));
    }

    #[test]
    fn test_set_reverse() {
        let mut map = map();
        map.set_reverse("2", "1");

        assert_eq!(map.get(&"1"), vec!["2"]);
        assert_eq!(map.get_reverse(&"2"), vec!["1"]);
    }

    #[test]
    fn test_multiple_entries() {
        let mut map = map();
        map.set("1", "2");
        map.set("1", "3");

        assert_eq!(map.get(&"1"), vec!["2", "3"]);
        assert_eq!(map.get_reverse(&"2"), vec!["1"]);
        assert_eq!(map.get_reverse(&"3"), vec!["1"]);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_set_is_idempotent() {
        let mut once = map();
        once.set("a", "b");

        let mut twice = map();
        twice.set("a", "b");
        twice.set("a", "b");

        assert_eq!(once.get(&"a"), twice.get(&"a"));
        assert_eq!(once.get_reverse(&"b"), twice.get_reverse(&"b"));
        assert_eq!(twice.len(), 1);
    }

    #[test]
    fn test_delete_not_found() {
        let mut map = map();
        map.set("1", "2");
        map.delete(&"3");

        assert_eq!(map.get(&"1"), vec!["2"]);
        assert_eq!(map.get_reverse(&"2"), vec!["1"]);
    }

    #[test]
    fn test_delete_entry() {
        let mut map = map();
        map.set("1", "2");
        map.set("1", "3");
        map.set("4", "2");
        map.delete(&"1");

        assert!(map.get(&"1").is_empty());
        assert_eq!(map.get_reverse(&"2"), vec!["4"]);
        assert!(map.get_reverse(&"3").is_empty());
    }

    #[test]
    fn test_delete_reverse() {
        let mut map = map();
        map.set("1", "2");
        map.delete_reverse(&"2");

        assert!(map.get(&"1").is_empty());
        assert!(map.get_reverse(&"2").is_empty());
        assert!(map.is_empty());
    }

    #[test]
    fn test_snapshots_are_detached() {
        let mut map = map();
        map.set("a", "b");
        let forward = map.get(&"a");
        let reverse = map.get_reverse(&"b");

        map.set("a", "c");
        map.delete(&"a");

        assert_eq!(forward, vec!["b"]);
        assert_eq!(reverse, vec!["a"]);
    }

    #[test]
    fn test_dependency_graph_paths() {
        let mut graph = DependencyGraph::new();
        graph.set(PathBuf::from("/site/index.html"), PathBuf::from("/site/nav.ejs"));

        assert_eq!(
            graph.get_reverse(&PathBuf::from("/site/nav.ejs")),
            vec![PathBuf::from("/site/index.html")]
        );
    }
}
