//! Scope chain and dotted-path resolution.
//!
//! A [`Scope`] is one context frame: local bindings, an optional wrapped
//! host value, and a borrowed parent. Child frames borrow their parent, so
//! the chain always points toward the session root and is never mutated
//! while it is being read.
//!
//! Resolution of `a.b.c`:
//!
//! 1. The first component is looked up in the frame's locals, then in its
//!    host value (by kind). If neither has it, the parent frame resolves
//!    the whole path, still on behalf of the original requesting frame.
//! 2. Each later component is looked up in the value the previous one
//!    produced. There is no parent fallback past the first component.
//! 3. A component yielding [`Resolved::Absent`] or [`Resolved::Empty`]
//!    stops resolution; the rest of the path is never looked at.

use std::collections::BTreeMap;

use crate::object::AccessorCache;
use crate::value::Value;

/// Outcome of resolving a path.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Value(Value),
    /// A list-typed member that holds nothing.
    Empty,
    Absent,
}

impl Resolved {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Resolved::Value(value) => Some(value),
            Resolved::Empty | Resolved::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Resolved::Absent)
    }

    fn settled(value: Value) -> Resolved {
        value.settle().map_or(Resolved::Absent, Resolved::Value)
    }
}

/// Result of looking one name up in a single frame.
enum Step {
    Found(Value),
    Absent,
    Empty,
    /// Not here; the parent may have it.
    Missing,
}

/// One context frame.
#[derive(Debug)]
pub struct Scope<'a> {
    locals: BTreeMap<String, Value>,
    host: Option<Value>,
    parent: Option<&'a Scope<'a>>,
    accessors: &'a AccessorCache,
}

impl<'a> Scope<'a> {
    /// Session root wrapping `host`.
    pub fn root(host: impl Into<Value>, accessors: &'a AccessorCache) -> Self {
        Scope {
            locals: BTreeMap::new(),
            host: Some(host.into()),
            parent: None,
            accessors,
        }
    }

    /// Session root with no host value.
    pub fn empty(accessors: &'a AccessorCache) -> Self {
        Scope {
            locals: BTreeMap::new(),
            host: None,
            parent: None,
            accessors,
        }
    }

    /// A frame whose parent is `self`.
    pub fn child(&self, host: Option<Value>) -> Scope<'_> {
        Scope {
            locals: BTreeMap::new(),
            host,
            parent: Some(self),
            accessors: self.accessors,
        }
    }

    /// Add a local binding. Locals shadow the host value.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.locals.insert(name.into(), value.into());
        self
    }

    pub fn parent(&self) -> Option<&Scope<'a>> {
        self.parent
    }

    pub fn host(&self) -> Option<&Value> {
        self.host.as_ref()
    }

    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    pub fn accessors(&self) -> &'a AccessorCache {
        self.accessors
    }

    /// Number of frames from here to the root, inclusive.
    pub fn depth(&self) -> usize {
        1 + self.parent.map_or(0, |parent| parent.depth())
    }

    /// Resolve a dotted path. `.` is the innermost host value.
    pub fn resolve(&self, path: &str) -> Resolved {
        if path == "." {
            return self.implicit();
        }
        let components: Vec<&str> = path.split('.').collect();
        self.resolve_from(&components, self)
    }

    fn resolve_from(&self, components: &[&str], origin: &Scope<'_>) -> Resolved {
        let Some((first, rest)) = components.split_first() else {
            return Resolved::Absent;
        };
        match self.step(first, origin) {
            Step::Found(value) => descend(value, rest, origin),
            Step::Absent => Resolved::Absent,
            Step::Empty => Resolved::Empty,
            Step::Missing => match self.parent {
                Some(parent) => parent.resolve_from(components, origin),
                None => Resolved::Absent,
            },
        }
    }

    fn step(&self, name: &str, origin: &Scope<'_>) -> Step {
        if let Some(value) = self.locals.get(name) {
            return Step::Found(value.clone());
        }
        match &self.host {
            Some(host) => lookup(host, name, origin),
            None => Step::Missing,
        }
    }

    fn implicit(&self) -> Resolved {
        let mut current = Some(self);
        while let Some(scope) = current {
            if let Some(host) = &scope.host {
                return Resolved::settled(host.clone());
            }
            current = scope.parent;
        }
        Resolved::Absent
    }
}

/// Walk the remaining components through transient frames that wrap each
/// intermediate value and have no parent.
fn descend(mut value: Value, rest: &[&str], origin: &Scope<'_>) -> Resolved {
    for component in rest {
        value = match lookup(&value, component, origin) {
            Step::Found(next) => next,
            Step::Empty => return Resolved::Empty,
            Step::Absent | Step::Missing => return Resolved::Absent,
        };
    }
    Resolved::settled(value)
}

/// Look `name` up in a host value, by kind.
fn lookup(host: &Value, name: &str, origin: &Scope<'_>) -> Step {
    match host {
        Value::Deferred(deferred) => match deferred.wait() {
            Some(value) => lookup(&value, name, origin),
            None => Step::Missing,
        },
        Value::Map(map) => map.get(name).cloned().map_or(Step::Missing, Step::Found),
        Value::List(items) => index(name)
            .and_then(|i| items.get(i))
            .cloned()
            .map_or(Step::Missing, Step::Found),
        Value::Node(node) => {
            let child = match node {
                serde_json::Value::Object(members) => members.get(name),
                serde_json::Value::Array(items) => index(name).and_then(|i| items.get(i)),
                _ => None,
            };
            match child {
                None | Some(serde_json::Value::Null) => Step::Missing,
                Some(child) => Step::Found(Value::from_node(child.clone())),
            }
        }
        Value::Object(object) => {
            let Some(accessor) = origin.accessors.resolve(object.as_ref(), name) else {
                tracing::trace!(member = name, host = object.type_name(), "no such member");
                return Step::Missing;
            };
            match accessor.read(object.as_ref(), origin) {
                Some(Value::List(items)) if items.is_empty() && accessor.is_iterable() => {
                    Step::Empty
                }
                Some(value) => Step::Found(value),
                None if accessor.is_iterable() => Step::Empty,
                None => Step::Absent,
            }
        }
        Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => Step::Missing,
    }
}

fn index(component: &str) -> Option<usize> {
    component.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::Deferred;
    use crate::object::{Lookup, MemberTable};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn map(entries: &[(&str, Value)]) -> Value {
        Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn locals_shadow_host() {
        let accessors = AccessorCache::new();
        let scope = Scope::root(map(&[("x", Value::from("host"))]), &accessors).bind("x", "local");
        assert_eq!(scope.resolve("x"), Resolved::Value(Value::from("local")));
    }

    #[test]
    fn missing_names_fall_back_to_parent() {
        let accessors = AccessorCache::new();
        let root = Scope::root(map(&[("title", Value::from("Home"))]), &accessors);
        let child = root.child(Some(Value::from("item")));
        assert_eq!(child.resolve("title"), Resolved::Value(Value::from("Home")));
        assert_eq!(child.depth(), 2);
    }

    #[test]
    fn unresolved_path_is_absent() {
        let accessors = AccessorCache::new();
        let scope = Scope::root(map(&[]), &accessors);
        assert!(scope.resolve("missing").is_absent());
        assert!(scope.resolve("missing.deeper").is_absent());
    }

    #[test]
    fn dotted_paths_descend_without_parent_fallback() {
        let accessors = AccessorCache::new();
        let root = Scope::root(map(&[("b", Value::from("from root"))]), &accessors);
        let child = root.child(Some(map(&[("a", map(&[]))])));
        // `a` is found on the child, so `b` is looked up on `a` only.
        assert!(child.resolve("a.b").is_absent());
    }

    #[test]
    fn document_nodes_unwrap_leaves_and_skip_nulls() {
        let accessors = AccessorCache::new();
        let root = Scope::root(map(&[("name", Value::from("outer"))]), &accessors);
        let doc = json!({"user": {"name": "Ada", "admin": true}, "name": null, "tags": ["x", "y"]});
        let child = root.child(Some(Value::Node(doc)));

        assert_eq!(child.resolve("user.name"), Resolved::Value(Value::from("Ada")));
        assert_eq!(child.resolve("user.admin"), Resolved::Value(Value::Bool(true)));
        assert_eq!(child.resolve("tags.1"), Resolved::Value(Value::from("y")));
        // Null children fall through to the parent frame.
        assert_eq!(child.resolve("name"), Resolved::Value(Value::from("outer")));
    }

    #[test]
    fn list_components_index() {
        let accessors = AccessorCache::new();
        let scope = Scope::root(map(&[("items", Value::from(vec!["a", "b"]))]), &accessors);
        assert_eq!(scope.resolve("items.0"), Resolved::Value(Value::from("a")));
        assert!(scope.resolve("items.9").is_absent());
        assert!(scope.resolve("items.first").is_absent());
    }

    #[test]
    fn implicit_path_is_innermost_host() {
        let accessors = AccessorCache::new();
        let root = Scope::root("outer", &accessors);
        let bare = root.child(None);
        assert_eq!(bare.resolve("."), Resolved::Value(Value::from("outer")));
        let item = bare.child(Some(Value::from(3)));
        assert_eq!(item.resolve("."), Resolved::Value(Value::Int(3)));
        assert!(Scope::empty(&accessors).resolve(".").is_absent());
    }

    #[test]
    fn deferred_hosts_and_values_are_awaited() {
        let accessors = AccessorCache::new();
        let host = Deferred::spawn(|| map(&[("status", Value::from(Deferred::ready("ok")))]));
        let scope = Scope::root(host, &accessors);
        assert_eq!(scope.resolve("status"), Resolved::Value(Value::from("ok")));
    }

    #[test]
    fn dropped_deferred_resolves_absent() {
        let accessors = AccessorCache::new();
        let (completer, deferred) = Deferred::channel();
        drop(completer);
        let scope = Scope::root(map(&[("later", Value::from(deferred))]), &accessors);
        assert!(scope.resolve("later").is_absent());
    }

    static INNER_READS: AtomicUsize = AtomicUsize::new(0);

    struct Inner;

    impl Lookup for Inner {
        fn members(table: MemberTable<Self>) -> MemberTable<Self> {
            table.method("c", |_| {
                INNER_READS.fetch_add(1, Ordering::SeqCst);
                "deep"
            })
        }
    }

    struct Outer {
        present: Option<Arc<Inner>>,
        absent: Option<Arc<Inner>>,
        history: Option<Vec<String>>,
        greeting: &'static str,
    }

    impl Lookup for Outer {
        fn members(table: MemberTable<Self>) -> MemberTable<Self> {
            table
                .field("present", |o| o.present.clone())
                .field("absent", |o| o.absent.clone())
                .field("history", |o| o.history.clone())
                .context_method("greet", |o, scope| {
                    let who = scope
                        .local("who")
                        .map(|v| v.to_text().into_owned())
                        .unwrap_or_default();
                    format!("{} {}", o.greeting, who)
                })
        }
    }

    fn outer() -> Value {
        Value::object(Outer {
            present: Some(Arc::new(Inner)),
            absent: None,
            history: None,
            greeting: "hello",
        })
    }

    #[test]
    fn absent_member_short_circuits_the_path() {
        let accessors = AccessorCache::new();
        let scope = Scope::root(map(&[("a", outer())]), &accessors);

        let before = INNER_READS.load(Ordering::SeqCst);
        assert!(scope.resolve("a.absent.c").is_absent());
        assert_eq!(INNER_READS.load(Ordering::SeqCst), before);

        assert_eq!(scope.resolve("a.present.c"), Resolved::Value(Value::from("deep")));
        assert_eq!(INNER_READS.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn empty_list_member_is_the_empty_marker() {
        let accessors = AccessorCache::new();
        let scope = Scope::root(outer(), &accessors);
        assert_eq!(scope.resolve("history"), Resolved::Empty);
        assert_eq!(scope.resolve("history.0"), Resolved::Empty);
    }

    #[test]
    fn context_methods_see_the_requesting_frame() {
        let accessors = AccessorCache::new();
        let root = Scope::root(outer(), &accessors);
        let child = root.child(Some(map(&[]))).bind("who", "world");
        assert_eq!(child.resolve("greet"), Resolved::Value(Value::from("hello world")));
    }

    #[test]
    fn unknown_member_falls_back_to_parent() {
        let accessors = AccessorCache::new();
        let root = Scope::root(map(&[("title", Value::from("T"))]), &accessors);
        let child = root.child(Some(outer()));
        assert_eq!(child.resolve("title"), Resolved::Value(Value::from("T")));
    }

    #[test]
    fn resolution_never_mutates_ancestors() {
        let accessors = AccessorCache::new();
        let root = Scope::root(map(&[("x", Value::from(1))]), &accessors);
        {
            let child = root.child(None).bind("x", 2);
            assert_eq!(child.resolve("x"), Resolved::Value(Value::Int(2)));
        }
        assert_eq!(root.resolve("x"), Resolved::Value(Value::Int(1)));
        assert!(root.local("x").is_none());
    }
}
