//! TypeRegistry - per-type ownership policies and conversions.
//!
//! This module provides [`TypeRegistry`], the record of which ownership policy
//! each native type uses and how erased handles are converted back into typed
//! holders.
//!
//! # Storage Model
//!
//! - **Types**: one [`TypeEntry`] per registered name, keyed by [`TypeHash`],
//!   with a reverse index from the bound Rust `TypeId`.
//! - **Inheritance**: a `petgraph::DiGraph` with one node per type and an edge
//!   from each derived type to each of its bases.
//! - **Casters**: type-erased functions keyed by `(concrete TypeId, target
//!   TypeId)`. Handle casters turn a [`Handle`] into a typed holder; reference
//!   casters view a `&dyn Native` as a base trait object.
//! - **Lifts**: one per holder-level base edge (`dyn Polygon` extending
//!   `dyn Shape`). A lift turns a caster to the derived holder into a caster
//!   to the base holder. After every registration the casters are closed
//!   under the lifts, so a concrete type reaches every base it derives from,
//!   however many levels up.
//!
//! # Thread Safety
//!
//! `TypeRegistry` is **not internally synchronized**. It is filled during a
//! single-threaded registration phase and then [sealed](TypeRegistry::seal);
//! after that it is only read, and can be shared freely.
//!
//! # Example
//!
//! ```
//! use refbridge_core::OwnershipPolicy;
//! use refbridge_registry::TypeRegistry;
//!
//! let mut registry = TypeRegistry::new();
//! registry.register_policy("MyObject", OwnershipPolicy::Intrusive).unwrap();
//!
//! // Same policy again is a no-op
//! registry.register_policy("MyObject", OwnershipPolicy::Intrusive).unwrap();
//!
//! // A different policy is rejected
//! assert!(registry.register_policy("MyObject", OwnershipPolicy::External).is_err());
//! ```

use std::any::{Any, TypeId};
use std::sync::Arc;

use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};

use refbridge_core::{
    BridgeError, ConstructHolder, ConversionError, Dynamic, Handle, HandleError, Holder, Native,
    OwnershipPolicy, Primitive, RegistrationError, TypeHash, Upcast,
};

use crate::entry::{ConvertFn, ImplicitConversion, TypeEntry};

/// Converts a handle whose concrete type is known into holder `H`.
struct HandleCaster<H>(Arc<dyn Fn(&Handle) -> Option<H> + Send + Sync>);

/// Views an object whose concrete type is known as `U`.
struct RefCaster<U: ?Sized + 'static>(
    Arc<dyn for<'a> Fn(&'a dyn Native) -> Option<&'a U> + Send + Sync>,
);

fn ref_caster<U, F>(view: F) -> RefCaster<U>
where
    U: ?Sized + 'static,
    F: for<'a> Fn(&'a dyn Native) -> Option<&'a U> + Send + Sync + 'static,
{
    RefCaster(Arc::new(view))
}

fn view_as<C, U>(object: &dyn Native) -> Option<&U>
where
    C: Native + Upcast<U>,
    U: ?Sized,
{
    object
        .downcast_ref::<C>()
        .map(<C as Upcast<U>>::upcast_ref)
}

type CasterKey = (TypeId, TypeId);

type Caster = Box<dyn Any + Send + Sync>;

/// Builds a caster to the base from a caster to the derived side.
type LiftFn = fn(&(dyn Any + Send + Sync)) -> Option<Caster>;

struct Lift {
    from: TypeId,
    to: TypeId,
    apply: LiftFn,
}

fn lift_handle<D, B>(caster: &(dyn Any + Send + Sync)) -> Option<Caster>
where
    D: Holder,
    B: Holder,
    D::Target: Upcast<B::Target>,
{
    let inner = caster.downcast_ref::<HandleCaster<D>>()?.0.clone();
    let lifted: HandleCaster<B> = HandleCaster(Arc::new(move |handle: &Handle| {
        let derived = inner(handle)?;
        let ptr = <D::Target as Upcast<B::Target>>::upcast_ptr(D::as_ptr(&derived));
        // SAFETY: `ptr` addresses the object `handle` owns.
        unsafe { B::share_from(handle, ptr) }
    }));
    Some(Box::new(lifted))
}

fn lift_ref<T, U>(caster: &(dyn Any + Send + Sync)) -> Option<Caster>
where
    T: ?Sized + Upcast<U> + 'static,
    U: ?Sized + 'static,
{
    let inner = caster.downcast_ref::<RefCaster<T>>()?.0.clone();
    let lifted = ref_caster(move |object: &dyn Native| {
        inner(object).map(<T as Upcast<U>>::upcast_ref)
    });
    Some(Box::new(lifted))
}

/// Add every caster reachable through `lifts` until nothing changes.
fn close_casters(casters: &mut FxHashMap<CasterKey, Caster>, lifts: &[Lift]) {
    loop {
        let mut added: Vec<(CasterKey, Caster)> = Vec::new();
        for (&(concrete, from), caster) in casters.iter() {
            for lift in lifts.iter().filter(|lift| lift.from == from) {
                let key = (concrete, lift.to);
                if casters.contains_key(&key) || added.iter().any(|(k, _)| *k == key) {
                    continue;
                }
                if let Some(lifted) = (lift.apply)(&**caster) {
                    added.push((key, lifted));
                }
            }
        }
        if added.is_empty() {
            return;
        }
        casters.extend(added);
    }
}

/// Registry state captured by [`TypeRegistry::checkpoint`].
///
/// Restoring it with [`TypeRegistry::rollback`] undoes every registration
/// made since.
pub struct Checkpoint {
    types: FxHashMap<TypeHash, TypeEntry>,
    by_type_id: FxHashMap<TypeId, TypeHash>,
    graph: DiGraph<TypeHash, ()>,
    nodes: FxHashMap<TypeHash, NodeIndex>,
    handle_casters: FxHashSet<CasterKey>,
    ref_casters: FxHashSet<CasterKey>,
    handle_lifts: usize,
    ref_lifts: usize,
}

/// Registry of ownership policies, inheritance and conversions.
#[derive(Default)]
pub struct TypeRegistry {
    /// Types by hash (primary storage).
    types: FxHashMap<TypeHash, TypeEntry>,

    /// Reverse index: bound Rust type -> hash.
    by_type_id: FxHashMap<TypeId, TypeHash>,

    /// Inheritance graph, edges point from derived to base.
    graph: DiGraph<TypeHash, ()>,

    /// Graph node per type.
    nodes: FxHashMap<TypeHash, NodeIndex>,

    /// `(concrete, holder)` -> `HandleCaster<holder>`.
    handle_casters: FxHashMap<CasterKey, Caster>,

    /// `(concrete, target)` -> `RefCaster<target>`.
    ref_casters: FxHashMap<CasterKey, Caster>,

    /// Holder -> base holder.
    handle_lifts: Vec<Lift>,

    /// Target -> base target.
    ref_lifts: Vec<Lift>,

    sealed: bool,
}

impl TypeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Record the ownership policy of a type.
    ///
    /// Registering the same policy again is a no-op. Policies never change once
    /// recorded.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::PolicyConflict`] if the type already has a
    ///   different policy.
    /// - [`RegistrationError::Sealed`] after [`seal`](Self::seal).
    pub fn register_policy(
        &mut self,
        name: &str,
        policy: OwnershipPolicy,
    ) -> Result<TypeHash, RegistrationError> {
        self.ensure_open(name)?;
        let hash = TypeHash::from_name(name);

        if let Some(existing) = self.types.get(&hash) {
            if existing.policy() == policy {
                log::debug!("type '{name}' already registered as {policy}");
                return Ok(hash);
            }
            log::warn!(
                "rejected policy change for '{name}': {} -> {policy}",
                existing.policy()
            );
            return Err(RegistrationError::PolicyConflict {
                type_name: name.to_string(),
                existing: existing.policy(),
                requested: policy,
            });
        }

        self.types.insert(hash, TypeEntry::new(name, policy));
        self.nodes.insert(hash, self.graph.add_node(hash));
        log::debug!("registered type '{name}' as {policy}");
        Ok(hash)
    }

    /// Register a concrete type exposed through holder `H`.
    ///
    /// The name comes from the value's [`NativeType`](refbridge_core::NativeType)
    /// implementation and the policy from the holder.
    ///
    /// # Errors
    ///
    /// As [`register_policy`](Self::register_policy), plus
    /// [`RegistrationError::DuplicateType`] if the name is bound to another
    /// Rust type.
    pub fn register_type<H: ConstructHolder>(&mut self) -> Result<TypeHash, RegistrationError> {
        let name = <H::Value as refbridge_core::NativeType>::type_name();
        let hash = self.register_policy(name, H::POLICY)?;
        self.bind(hash, TypeId::of::<H::Value>())?;
        if let Some(entry) = self.types.get_mut(&hash) {
            entry.bind_concrete(TypeId::of::<H::Value>(), H::wrap_raw);
        }

        let value = TypeId::of::<H::Value>();
        let caster: HandleCaster<H> = HandleCaster(Arc::new(H::from_handle));
        self.handle_casters
            .insert((value, TypeId::of::<H>()), Box::new(caster));
        let caster = ref_caster(view_as::<H::Value, H::Value>);
        self.ref_casters.insert((value, value), Box::new(caster));
        self.close();
        Ok(hash)
    }

    /// Register an abstract base exposed through holder `H`, usually a
    /// trait-object holder such as `Ref<dyn Object>`.
    ///
    /// # Errors
    ///
    /// As [`register_type`](Self::register_type).
    pub fn register_abstract<H: Holder>(&mut self, name: &str) -> Result<TypeHash, RegistrationError> {
        let hash = self.register_policy(name, H::POLICY)?;
        self.bind(hash, TypeId::of::<H::Target>())?;
        if let Some(entry) = self.types.get_mut(&hash) {
            entry.bind_abstract(TypeId::of::<H::Target>());
        }
        Ok(hash)
    }

    fn bind(&mut self, hash: TypeHash, type_id: TypeId) -> Result<(), RegistrationError> {
        let entry = self
            .types
            .get(&hash)
            .ok_or_else(|| RegistrationError::UnknownType(hash.to_string()))?;
        if entry.rust_type_id().is_some_and(|bound| bound != type_id) {
            return Err(RegistrationError::DuplicateType(entry.name().to_string()));
        }
        self.by_type_id.insert(type_id, hash);
        Ok(())
    }

    /// Declare that concrete type `C` (registered under `derived`) can be used
    /// wherever holder `B` is expected.
    ///
    /// Adds the inheritance edge and the casters that make [`extract`] and
    /// [`cast_ref`] work through the base.
    ///
    /// [`extract`]: Self::extract
    /// [`cast_ref`]: Self::cast_ref
    ///
    /// # Errors
    ///
    /// See [`add_base_edge`](Self::add_base_edge).
    pub fn add_base<C, B>(&mut self, derived: TypeHash) -> Result<(), RegistrationError>
    where
        C: Native + Upcast<B::Target>,
        B: Holder,
    {
        self.ensure_open(&self.name_of(derived))?;
        let base = self.hash_of_base::<B>(derived)?;
        self.add_base_edge(derived, base)?;

        let caster: HandleCaster<B> = HandleCaster(Arc::new(B::from_concrete::<C>));
        self.handle_casters
            .insert((TypeId::of::<C>(), TypeId::of::<B>()), Box::new(caster));
        let caster = ref_caster(view_as::<C, B::Target>);
        self.ref_casters
            .insert((TypeId::of::<C>(), TypeId::of::<B::Target>()), Box::new(caster));
        self.close();
        Ok(())
    }

    /// Declare that whatever is usable as holder `D` (registered under
    /// `derived`) is also usable as holder `B`.
    ///
    /// This is how one trait-object base extends another: after
    /// `add_holder_base::<Ref<dyn Polygon>, Ref<dyn Shape>>`, every concrete
    /// type with `Ref<dyn Polygon>` as a base, now or registered later, can be
    /// extracted as `Ref<dyn Shape>` and viewed as `&dyn Shape`.
    ///
    /// # Errors
    ///
    /// See [`add_base_edge`](Self::add_base_edge).
    pub fn add_holder_base<D, B>(&mut self, derived: TypeHash) -> Result<(), RegistrationError>
    where
        D: Holder,
        B: Holder,
        D::Target: Upcast<B::Target>,
    {
        self.ensure_open(&self.name_of(derived))?;
        let base = self.hash_of_base::<B>(derived)?;
        self.add_base_edge(derived, base)?;

        self.handle_lifts.push(Lift {
            from: TypeId::of::<D>(),
            to: TypeId::of::<B>(),
            apply: lift_handle::<D, B>,
        });
        self.ref_lifts.push(Lift {
            from: TypeId::of::<D::Target>(),
            to: TypeId::of::<B::Target>(),
            apply: lift_ref::<D::Target, B::Target>,
        });
        self.close();
        Ok(())
    }

    /// Close the caster tables under the registered lifts.
    fn close(&mut self) {
        close_casters(&mut self.handle_casters, &self.handle_lifts);
        close_casters(&mut self.ref_casters, &self.ref_lifts);
    }

    fn hash_of_base<B: Holder>(&self, derived: TypeHash) -> Result<TypeHash, RegistrationError> {
        self.type_hash_of::<B::Target>()
            .ok_or_else(|| RegistrationError::UnknownBase {
                derived: self.name_of(derived),
                base: std::any::type_name::<B::Target>().to_string(),
            })
    }

    /// Add an inheritance edge between two registered types.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::UnknownType`] / [`RegistrationError::UnknownBase`]
    ///   if either side is not registered.
    /// - [`RegistrationError::PolicyMismatch`] if the policies differ.
    /// - [`RegistrationError::CyclicInheritance`] if `base` already derives
    ///   from `derived`.
    /// - [`RegistrationError::Sealed`] after [`seal`](Self::seal).
    pub fn add_base_edge(&mut self, derived: TypeHash, base: TypeHash) -> Result<(), RegistrationError> {
        let derived_name = self.name_of(derived);
        self.ensure_open(&derived_name)?;

        let derived_entry = self
            .types
            .get(&derived)
            .ok_or_else(|| RegistrationError::UnknownType(derived_name.clone()))?;
        let base_entry = self
            .types
            .get(&base)
            .ok_or_else(|| RegistrationError::UnknownBase {
                derived: derived_name.clone(),
                base: base.to_string(),
            })?;

        if derived_entry.policy() != base_entry.policy() {
            return Err(RegistrationError::PolicyMismatch {
                derived: derived_name,
                derived_policy: derived_entry.policy(),
                base: base_entry.name().to_string(),
                base_policy: base_entry.policy(),
            });
        }

        let (from, to) = (self.nodes[&derived], self.nodes[&base]);
        if from == to || has_path_connecting(&self.graph, to, from, None) {
            return Err(RegistrationError::CyclicInheritance {
                derived: derived_name,
                base: base_entry.name().to_string(),
            });
        }

        log::debug!("'{}' derives from '{}'", derived_name, base_entry.name());
        self.graph.update_edge(from, to, ());
        Ok(())
    }

    /// Register an implicit constructor building `H::Value` from primitive `P`.
    ///
    /// A later constructor for the same primitive kind replaces the earlier
    /// one.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::UnknownType`] if `H::Value` is not registered.
    /// - [`RegistrationError::Sealed`] after [`seal`](Self::seal).
    pub fn add_implicit_conversion<P, H, F>(&mut self, ctor: F) -> Result<(), RegistrationError>
    where
        P: Primitive,
        H: ConstructHolder,
        F: Fn(P) -> Result<H::Value, String> + Send + Sync + 'static,
    {
        let name = <H::Value as refbridge_core::NativeType>::type_name();
        self.ensure_open(name)?;
        let hash = TypeHash::from_name(name);
        let entry = self
            .types
            .get_mut(&hash)
            .ok_or_else(|| RegistrationError::UnknownType(name.to_string()))?;

        let convert: Arc<ConvertFn> = Arc::new(move |value: &Dynamic| -> Result<Handle, ConversionError> {
            let input = P::from_primitive(value)?;
            let object = ctor(input).map_err(|reason| ConversionError::Rejected {
                target: name.to_string(),
                reason,
            })?;
            Ok(H::construct(object).into_handle())
        });
        if entry.set_conversion(ImplicitConversion::new(P::KIND, convert)) {
            log::warn!("replaced implicit {} conversion for '{name}'", P::KIND);
        } else {
            log::debug!("'{name}' is implicitly constructible from {}", P::KIND);
        }
        Ok(())
    }

    /// Capture the current registrations so a failed batch can be undone.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            types: self.types.clone(),
            by_type_id: self.by_type_id.clone(),
            graph: self.graph.clone(),
            nodes: self.nodes.clone(),
            handle_casters: self.handle_casters.keys().copied().collect(),
            ref_casters: self.ref_casters.keys().copied().collect(),
            handle_lifts: self.handle_lifts.len(),
            ref_lifts: self.ref_lifts.len(),
        }
    }

    /// Restore the registrations captured by `checkpoint`.
    ///
    /// Casters are a pure function of their key; those present at the
    /// checkpoint stay.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        let dropped = self.types.len().saturating_sub(checkpoint.types.len());
        self.types = checkpoint.types;
        self.by_type_id = checkpoint.by_type_id;
        self.graph = checkpoint.graph;
        self.nodes = checkpoint.nodes;
        self.handle_casters
            .retain(|key, _| checkpoint.handle_casters.contains(key));
        self.ref_casters
            .retain(|key, _| checkpoint.ref_casters.contains(key));
        self.handle_lifts.truncate(checkpoint.handle_lifts);
        self.ref_lifts.truncate(checkpoint.ref_lifts);
        log::debug!("rolled back registrations ({dropped} types dropped)");
    }

    /// Stop accepting registrations.
    pub fn seal(&mut self) {
        if !self.sealed {
            log::debug!("sealing type registry with {} types", self.types.len());
        }
        self.sealed = true;
    }

    /// Whether [`seal`](Self::seal) was called.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn ensure_open(&self, name: &str) -> Result<(), RegistrationError> {
        if self.sealed {
            log::warn!("registration of '{name}' after seal");
            return Err(RegistrationError::Sealed(name.to_string()));
        }
        Ok(())
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    /// Get a type by hash.
    pub fn get(&self, hash: TypeHash) -> Option<&TypeEntry> {
        self.types.get(&hash)
    }

    /// Get a type by name.
    pub fn get_by_name(&self, name: &str) -> Option<&TypeEntry> {
        self.types.get(&TypeHash::from_name(name))
    }

    /// The registered policy of a type.
    pub fn policy_of(&self, hash: TypeHash) -> Option<OwnershipPolicy> {
        self.types.get(&hash).map(TypeEntry::policy)
    }

    /// Hash of the type bound to Rust type `T`.
    pub fn type_hash_of<T: ?Sized + 'static>(&self) -> Option<TypeHash> {
        self.type_hash_of_id(TypeId::of::<T>())
    }

    /// Hash of the type bound to a Rust `TypeId`.
    pub fn type_hash_of_id(&self, type_id: TypeId) -> Option<TypeHash> {
        self.by_type_id.get(&type_id).copied()
    }

    /// Number of registered types.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Iterate over all registered types.
    pub fn types(&self) -> impl Iterator<Item = &TypeEntry> {
        self.types.values()
    }

    /// Direct bases of a type.
    pub fn bases_of(&self, hash: TypeHash) -> Vec<TypeHash> {
        let Some(&node) = self.nodes.get(&hash) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(node, Direction::Outgoing)
            .map(|base| self.graph[base])
            .collect()
    }

    /// Whether `derived` is `base` or inherits from it, directly or not.
    pub fn is_derived_from(&self, derived: TypeHash, base: TypeHash) -> bool {
        if derived == base {
            return self.types.contains_key(&derived);
        }
        match (self.nodes.get(&derived), self.nodes.get(&base)) {
            (Some(&from), Some(&to)) => has_path_connecting(&self.graph, from, to, None),
            _ => false,
        }
    }

    fn name_of(&self, hash: TypeHash) -> String {
        self.types
            .get(&hash)
            .map(|entry| entry.name().to_string())
            .unwrap_or_else(|| hash.to_string())
    }

    fn name_of_rust<T: ?Sized + 'static>(&self) -> String {
        self.type_hash_of::<T>()
            .map(|hash| self.name_of(hash))
            .unwrap_or_else(|| std::any::type_name::<T>().to_string())
    }

    // ==========================================================================
    // Conversions
    // ==========================================================================

    /// Take a new owner of the handle's object as holder `H`.
    ///
    /// Works when the object's concrete type is `H`'s own type or derives
    /// from `H`, directly or through other bases.
    ///
    /// # Errors
    ///
    /// - [`HandleError::Empty`] if the handle is empty.
    /// - [`HandleError::TypeMismatch`] if no conversion is registered.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn extract<H: Holder>(&self, handle: &Handle) -> Result<H, HandleError> {
        let object = handle.get()?;
        let key = (object.native_type_id(), TypeId::of::<H>());
        self.handle_casters
            .get(&key)
            .and_then(|caster| caster.downcast_ref::<HandleCaster<H>>())
            .and_then(|caster| (caster.0)(handle))
            .ok_or_else(|| HandleError::TypeMismatch {
                expected: self.name_of_rust::<H::Target>(),
                actual: object.native_type_name().to_string(),
            })
    }

    /// View an object as `U`, which may be a base trait object.
    ///
    /// # Errors
    ///
    /// [`HandleError::TypeMismatch`] if the object is neither a `U` nor
    /// registered with `U` as a base.
    pub fn cast_ref<'a, U: ?Sized + 'static>(
        &self,
        object: &'a dyn Native,
    ) -> Result<&'a U, HandleError> {
        let key = (object.native_type_id(), TypeId::of::<U>());
        self.ref_casters
            .get(&key)
            .and_then(|caster| caster.downcast_ref::<RefCaster<U>>())
            .and_then(|caster| (caster.0)(object))
            .ok_or_else(|| HandleError::TypeMismatch {
                expected: self.name_of_rust::<U>(),
                actual: object.native_type_name().to_string(),
            })
    }

    /// Build a new object of type `target` from a primitive value, using the
    /// type's registered implicit constructor.
    ///
    /// # Errors
    ///
    /// - [`ConversionError::NotImplicitlyConstructible`] if the type has no
    ///   constructor for the value's kind (or the value is not a primitive).
    /// - Whatever the constructor or argument extraction reports. Nothing is
    ///   left allocated on failure.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn convert_from_primitive(
        &self,
        target: TypeHash,
        value: &Dynamic,
    ) -> Result<Handle, ConversionError> {
        let not_constructible = || ConversionError::NotImplicitlyConstructible {
            target: self.name_of(target),
            source_kind: value.type_name(),
        };
        let entry = self.types.get(&target).ok_or_else(not_constructible)?;
        let kind = value.primitive_kind().ok_or_else(not_constructible)?;
        let conversion = entry.conversion_for(kind).ok_or_else(not_constructible)?;
        let handle = conversion.convert(value)?;
        log::trace!("implicitly constructed '{}' from {kind}", entry.name());
        Ok(handle)
    }

    /// Wrap a raw pointer to an object of type `hash` under its registered
    /// policy.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::UnknownType`] if the type is not registered.
    /// - [`RegistrationError::Abstract`] if it has no concrete binding.
    /// - Any [`HandleError`] from the policy's wrap.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must point to a live, `Box`-allocated object of the
    /// Rust type bound to `hash`, satisfying the policy's
    /// [`Holder::from_raw`] contract.
    pub unsafe fn wrap(&self, hash: TypeHash, ptr: *mut ()) -> Result<Handle, BridgeError> {
        let entry = self
            .types
            .get(&hash)
            .ok_or_else(|| RegistrationError::UnknownType(hash.to_string()))?;
        let wrap = entry
            .wrap_fn()
            .ok_or_else(|| RegistrationError::Abstract(entry.name().to_string()))?;
        // SAFETY: forwarded to the caller.
        Ok(unsafe { wrap(ptr) }?)
    }
}
