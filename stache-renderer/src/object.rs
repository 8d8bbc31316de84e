//! Member lookup on host objects.
//!
//! A host type opts in by implementing [`Lookup`], declaring its members in
//! a [`MemberTable`]: fields, zero-argument methods, and methods that also
//! receive the requesting [`Scope`]. Embedded "base" types are declared with
//! [`MemberTable::inherit`] and searched after the type's own members.
//!
//! Resolved accessors are memoized per `(type, member name)` in an
//! [`AccessorCache`] shared by every scope wrapping that type.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::deferred::Deferred;
use crate::scope::Scope;
use crate::value::Value;

/// A host type whose members templates can read by name.
///
/// ```rust
/// use stache_renderer::{Lookup, MemberTable};
///
/// struct User {
///     first: String,
///     last: String,
///     roles: Option<Vec<String>>,
/// }
///
/// impl Lookup for User {
///     fn members(table: MemberTable<Self>) -> MemberTable<Self> {
///         table
///             .field("first", |u| u.first.clone())
///             .field("roles", |u| u.roles.clone())
///             .method("full_name", |u| format!("{} {}", u.first, u.last))
///     }
/// }
/// ```
pub trait Lookup: Send + Sync + Sized + 'static {
    fn members(table: MemberTable<Self>) -> MemberTable<Self>;

    /// Text written when the object itself is emitted by a variable tag.
    fn text(&self) -> Option<String> {
        None
    }
}

/// Object-safe view of a [`Lookup`] type.
pub trait Object: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
    /// Search the declared members. Uncached; see [`AccessorCache::resolve`].
    fn find_member(&self, name: &str) -> Option<Accessor>;
    fn text(&self) -> Option<String>;
}

impl<T: Lookup> Object for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn find_member(&self, name: &str) -> Option<Accessor> {
        T::members(MemberTable::new()).find(name)
    }

    fn text(&self) -> Option<String> {
        <T as Lookup>::text(self)
    }
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

type Getter = Arc<dyn Fn(&dyn Any, &Scope<'_>) -> Option<Value> + Send + Sync>;

fn getter<F>(get: F) -> Getter
where
    F: Fn(&dyn Any, &Scope<'_>) -> Option<Value> + Send + Sync + 'static,
{
    Arc::new(get)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Method,
    /// A method that receives the requesting scope.
    ContextMethod,
}

/// A resolved member: how to read it, and whether it is list-typed.
#[derive(Clone)]
pub struct Accessor {
    kind: MemberKind,
    iterable: bool,
    getter: Getter,
}

impl Accessor {
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Whether the member is list-typed; a missing list reads as Empty.
    pub fn is_iterable(&self) -> bool {
        self.iterable
    }

    pub fn read(&self, object: &dyn Object, scope: &Scope<'_>) -> Option<Value> {
        (self.getter)(object.as_any(), scope)
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("kind", &self.kind)
            .field("iterable", &self.iterable)
            .finish_non_exhaustive()
    }
}

/// Values a member may return. `None` means the member is present but
/// holds nothing.
pub trait IntoMember {
    /// List-typed members report Empty rather than Absent when they hold nothing.
    const ITERABLE: bool = false;

    fn into_member(self) -> Option<Value>;
}

macro_rules! scalar_members {
    ($($t:ty),*) => {
        $(impl IntoMember for $t {
            fn into_member(self) -> Option<Value> {
                Some(Value::from(self))
            }
        })*
    };
}

scalar_members!(Value, String, &'static str, bool, i32, i64, u32, u64, usize, f64, serde_json::Value, Deferred);

impl<V: Into<Value>> IntoMember for Vec<V> {
    const ITERABLE: bool = true;

    fn into_member(self) -> Option<Value> {
        Some(Value::from(self))
    }
}

impl<M: IntoMember> IntoMember for Option<M> {
    const ITERABLE: bool = M::ITERABLE;

    fn into_member(self) -> Option<Value> {
        self.and_then(IntoMember::into_member)
    }
}

impl<O: Lookup> IntoMember for Arc<O> {
    fn into_member(self) -> Option<Value> {
        Some(Value::Object(self))
    }
}

// ---------------------------------------------------------------------------
// MemberTable
// ---------------------------------------------------------------------------

/// Declared members of `T`, searched fields first, then methods, then
/// context methods. Inherited members follow the type's own in each group.
pub struct MemberTable<T> {
    fields: Vec<(String, Accessor)>,
    methods: Vec<(String, Accessor)>,
    context_methods: Vec<(String, Accessor)>,
    _owner: PhantomData<fn(&T)>,
}

impl<T: 'static> Default for MemberTable<T> {
    fn default() -> Self {
        MemberTable {
            fields: Vec::new(),
            methods: Vec::new(),
            context_methods: Vec::new(),
            _owner: PhantomData,
        }
    }
}

impl<T: 'static> MemberTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<R, F>(mut self, name: &str, get: F) -> Self
    where
        R: IntoMember,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        let accessor = Accessor {
            kind: MemberKind::Field,
            iterable: R::ITERABLE,
            getter: getter(move |host, _| host.downcast_ref::<T>().and_then(|t| get(t).into_member())),
        };
        self.fields.push((name.to_string(), accessor));
        self
    }

    pub fn method<R, F>(mut self, name: &str, call: F) -> Self
    where
        R: IntoMember,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        let accessor = Accessor {
            kind: MemberKind::Method,
            iterable: R::ITERABLE,
            getter: getter(move |host, _| host.downcast_ref::<T>().and_then(|t| call(t).into_member())),
        };
        self.methods.push((name.to_string(), accessor));
        self
    }

    pub fn context_method<R, F>(mut self, name: &str, call: F) -> Self
    where
        R: IntoMember,
        F: Fn(&T, &Scope<'_>) -> R + Send + Sync + 'static,
    {
        let accessor = Accessor {
            kind: MemberKind::ContextMethod,
            iterable: R::ITERABLE,
            getter: getter(move |host, scope| {
                host.downcast_ref::<T>()
                    .and_then(|t| call(t, scope).into_member())
            }),
        };
        self.context_methods.push((name.to_string(), accessor));
        self
    }

    /// Expose the members of an embedded `B`, reached through `project`.
    pub fn inherit<B, P>(mut self, project: P) -> Self
    where
        B: Lookup,
        P: Fn(&T) -> &B + Send + Sync + 'static,
    {
        let project = Arc::new(project);
        let base = B::members(MemberTable::new());
        self.fields.extend(lift::<T, B, P>(base.fields, &project));
        self.methods.extend(lift::<T, B, P>(base.methods, &project));
        self.context_methods
            .extend(lift::<T, B, P>(base.context_methods, &project));
        self
    }

    fn find(&self, name: &str) -> Option<Accessor> {
        self.fields
            .iter()
            .chain(&self.methods)
            .chain(&self.context_methods)
            .find(|(member, _)| member == name)
            .map(|(_, accessor)| accessor.clone())
    }
}

fn lift<T, B, P>(members: Vec<(String, Accessor)>, project: &Arc<P>) -> Vec<(String, Accessor)>
where
    T: 'static,
    B: Lookup,
    P: Fn(&T) -> &B + Send + Sync + 'static,
{
    members
        .into_iter()
        .map(|(name, accessor)| {
            let project = Arc::clone(project);
            let inner = accessor.getter;
            let lifted = Accessor {
                kind: accessor.kind,
                iterable: accessor.iterable,
                getter: getter(move |host, scope| {
                    let t = host.downcast_ref::<T>()?;
                    let base: &dyn Any = project(t);
                    inner(base, scope)
                }),
            };
            (name, lifted)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// AccessorCache
// ---------------------------------------------------------------------------

/// Process-lifetime memo of `(type, member name) -> accessor`.
///
/// Entries live in a sharded map: a first-time resolution locks only the
/// shard its key hashes to, and lookups on other shards proceed unblocked.
#[derive(Default)]
pub struct AccessorCache {
    members: DashMap<(TypeId, String), Accessor>,
}

static GLOBAL: OnceLock<Arc<AccessorCache>> = OnceLock::new();

impl AccessorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache, created on first use and never dropped.
    pub fn global() -> Arc<AccessorCache> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(AccessorCache::new())))
    }

    /// Find `name` on `object`, consulting the cache first.
    pub fn resolve(&self, object: &dyn Object, name: &str) -> Option<Accessor> {
        let key = (object.as_any().type_id(), name.to_string());
        if let Some(accessor) = self.members.get(&key) {
            return Some(accessor.clone());
        }

        // Search outside any shard lock; a racing resolver may insert first.
        let accessor = object.find_member(name)?;
        Some(self.members.entry(key).or_insert(accessor).clone())
    }

    /// Number of cached accessors across all types.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl fmt::Debug for AccessorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorCache")
            .field("accessors", &self.len())
            .finish()
    }
}
