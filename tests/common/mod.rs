//! Shared fixtures for integration tests.
//!
//! `Object` is an intrusively counted abstract base, `MyObject` derives from
//! it and is implicitly constructible from an int, `MyObject2` is externally
//! counted. A [`Tracker`] records constructor and destructor calls so tests
//! can check that each object is destroyed exactly once.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use refbridge::prelude::*;
use refbridge::{RegistrationError, TypeHash};

// =============================================================================
// Lifecycle tracking
// =============================================================================

/// Records lifecycle events, shared by every object built from it.
#[derive(Clone, Default)]
pub struct Tracker {
    events: Arc<Mutex<Vec<String>>>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: String) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// How many times `event` was recorded.
    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn destructions(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| e.ends_with(" destructor"))
            .count()
    }
}

// =============================================================================
// Native types
// =============================================================================

pub trait Object: RefCounted {
    fn describe(&self) -> String;
}

#[derive(Native)]
#[refbridge(name = "MyObject", upcast(dyn Object))]
pub struct MyObject {
    value: i32,
    tracker: Tracker,
    #[refbridge(ref_count)]
    refs: RefCount,
}

impl MyObject {
    pub fn new(value: i32, tracker: &Tracker) -> Self {
        let obj = Self {
            value,
            tracker: tracker.clone(),
            refs: RefCount::new(),
        };
        tracker.record(format!("{} constructor", obj.describe()));
        obj
    }

    pub fn value(&self) -> i32 {
        self.value
    }
}

impl Object for MyObject {
    fn describe(&self) -> String {
        format!("MyObject[{}]", self.value)
    }
}

impl Drop for MyObject {
    fn drop(&mut self) {
        self.tracker
            .record(format!("{} destructor", self.describe()));
    }
}

impl_upcast!(dyn Object => dyn RefCounted, dyn Native);

#[derive(Native)]
#[refbridge(name = "MyObject2", external)]
pub struct MyObject2 {
    value: i32,
    tracker: Tracker,
}

impl MyObject2 {
    pub fn new(value: i32, tracker: &Tracker) -> Self {
        let obj = Self {
            value,
            tracker: tracker.clone(),
        };
        tracker.record(format!("{} constructor", obj.describe()));
        obj
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn describe(&self) -> String {
        format!("MyObject2[{}]", self.value)
    }
}

impl Drop for MyObject2 {
    fn drop(&mut self) {
        self.tracker
            .record(format!("{} destructor", self.describe()));
    }
}

// =============================================================================
// Module
// =============================================================================

fn with_refs(description: String, refs: usize) -> String {
    format!("{description} refs={refs}")
}

fn by_value(obj: Ref<dyn Object>) -> String {
    with_refs(obj.describe(), Ref::count(&obj) as usize)
}

fn by_ref(obj: &Ref<dyn Object>) -> String {
    with_refs(obj.describe(), Ref::count(obj) as usize)
}

fn by_ptr(obj: Option<&Ref<dyn Object>>) -> String {
    obj.map_or_else(|| "null".to_string(), by_ref)
}

fn my_by_value(obj: Ref<MyObject>) -> String {
    with_refs(obj.describe(), Ref::count(&obj) as usize)
}

fn my_by_ref(obj: &Ref<MyObject>) -> String {
    with_refs(obj.describe(), Ref::count(obj) as usize)
}

fn my_by_ptr(obj: Option<&Ref<MyObject>>) -> String {
    obj.map_or_else(|| "null".to_string(), my_by_ref)
}

fn shared_by_value(obj: Shared<MyObject2>) -> String {
    with_refs(obj.describe(), Shared::use_count(&obj))
}

fn shared_by_ref(obj: &Shared<MyObject2>) -> String {
    with_refs(obj.describe(), Shared::use_count(obj))
}

fn shared_by_ptr(obj: Option<&Shared<MyObject2>>) -> String {
    obj.map_or_else(|| "null".to_string(), shared_by_ref)
}

/// The full example surface: types, constructors, `make_*` and `print_*`.
pub fn example_module(tracker: &Tracker) -> Result<Module, RegistrationError> {
    let mut module = Module::new();

    module.register_base::<Ref<dyn Object>>("Object").build()?;

    let t = tracker.clone();
    let c = tracker.clone();
    module
        .register_type::<Ref<MyObject>>()
        .base::<Ref<dyn Object>>()
        .constructor(move |ctx| Ok(MyObject::new(ctx.arg(0)?, &t)))
        .implicitly_convertible::<i32>(move |value| Ok(MyObject::new(value, &c)))
        .build()?;

    let t = tracker.clone();
    module
        .register_type::<Shared<MyObject2>>()
        .constructor(move |ctx| Ok(MyObject2::new(ctx.arg(0)?, &t)))
        .build()?;

    // Factories, under each return convention
    let t = tracker.clone();
    module.function("make_object_1", move |ctx: &mut CallContext| {
        let ptr: *mut dyn Object = Box::into_raw(Box::new(MyObject::new(1, &t)));
        // SAFETY: freshly boxed, ownership moves to the returned handle.
        unsafe { ctx.set_return_raw::<Ref<dyn Object>>(ptr) }
    })?;
    let t = tracker.clone();
    module.function("make_object_2", move |ctx: &mut CallContext| {
        let obj: Ref<dyn Object> = Ref::upcast(Ref::new(MyObject::new(2, &t)));
        ctx.set_return_holder(obj);
        Ok(())
    })?;
    let t = tracker.clone();
    module.function("make_myobject_4", move |ctx: &mut CallContext| {
        let ptr = Box::into_raw(Box::new(MyObject::new(4, &t)));
        // SAFETY: freshly boxed, ownership moves to the returned handle.
        unsafe { ctx.set_return_raw::<Ref<MyObject>>(ptr) }
    })?;
    let t = tracker.clone();
    module.function("make_myobject_5", move |ctx: &mut CallContext| {
        ctx.set_return_holder(Ref::new(MyObject::new(5, &t)));
        Ok(())
    })?;
    let t = tracker.clone();
    module.function("make_myobject2_1", move |ctx: &mut CallContext| {
        let ptr = Box::into_raw(Box::new(MyObject2::new(1, &t)));
        // SAFETY: freshly boxed, ownership moves to the returned handle.
        unsafe { ctx.set_return_raw::<Shared<MyObject2>>(ptr) }
    })?;
    let t = tracker.clone();
    module.function("make_myobject2_2", move |ctx: &mut CallContext| {
        ctx.set_return_holder(Shared::new(MyObject2::new(2, &t)));
        Ok(())
    })?;

    // Consumers, under each argument convention
    module.function("print_object_1", |ctx: &mut CallContext| {
        let obj = ctx.arg_object::<dyn Object>(0)?;
        let out = with_refs(obj.describe(), obj.ref_count().get() as usize);
        ctx.set_return(out);
        Ok(())
    })?;
    module.function("print_object_2", |ctx: &mut CallContext| {
        let out = by_value(ctx.arg_holder(0)?);
        ctx.set_return(out);
        Ok(())
    })?;
    module.function("print_object_3", |ctx: &mut CallContext| {
        let out = by_ref(&ctx.arg_holder(0)?);
        ctx.set_return(out);
        Ok(())
    })?;
    module.function("print_object_4", |ctx: &mut CallContext| {
        let obj = ctx.arg_holder_opt::<Ref<dyn Object>>(0)?;
        let out = by_ptr(obj.as_ref());
        ctx.set_return(out);
        Ok(())
    })?;
    module.function("print_myobject_1", |ctx: &mut CallContext| {
        let obj = ctx.arg_object::<MyObject>(0)?;
        let out = with_refs(obj.describe(), obj.ref_count().get() as usize);
        ctx.set_return(out);
        Ok(())
    })?;
    module.function("print_myobject_2", |ctx: &mut CallContext| {
        let out = my_by_value(ctx.arg_holder(0)?);
        ctx.set_return(out);
        Ok(())
    })?;
    module.function("print_myobject_3", |ctx: &mut CallContext| {
        let out = my_by_ref(&ctx.arg_holder(0)?);
        ctx.set_return(out);
        Ok(())
    })?;
    module.function("print_myobject_4", |ctx: &mut CallContext| {
        let obj = ctx.arg_holder_opt::<Ref<MyObject>>(0)?;
        let out = my_by_ptr(obj.as_ref());
        ctx.set_return(out);
        Ok(())
    })?;
    module.function("print_myobject2_1", |ctx: &mut CallContext| {
        let out = ctx.arg_object::<MyObject2>(0)?.describe();
        ctx.set_return(out);
        Ok(())
    })?;
    module.function("print_myobject2_2", |ctx: &mut CallContext| {
        let out = shared_by_value(ctx.arg_holder(0)?);
        ctx.set_return(out);
        Ok(())
    })?;
    module.function("print_myobject2_3", |ctx: &mut CallContext| {
        let out = shared_by_ref(&ctx.arg_holder(0)?);
        ctx.set_return(out);
        Ok(())
    })?;
    module.function("print_myobject2_4", |ctx: &mut CallContext| {
        let obj = ctx.arg_holder_opt::<Shared<MyObject2>>(0)?;
        let out = shared_by_ptr(obj.as_ref());
        ctx.set_return(out);
        Ok(())
    })?;

    module.function("get_ref_count", |ctx: &mut CallContext| {
        let count = ctx.arg_object::<dyn Object>(0)?.ref_count().get();
        ctx.set_return(count);
        Ok(())
    })?;

    Ok(module)
}

/// A sealed context with [`example_module`] installed.
pub fn example_context(tracker: &Tracker) -> Context {
    let mut ctx = Context::new();
    ctx.install(example_module(tracker).unwrap()).unwrap();
    ctx.seal();
    ctx
}

pub fn type_hash(name: &str) -> TypeHash {
    TypeHash::from_name(name)
}

/// Call a function and unwrap its string result.
pub fn call_str(ctx: &Context, name: &str, args: Vec<Dynamic>) -> String {
    match ctx.call(name, args).unwrap() {
        Dynamic::String(s) => s,
        other => panic!("{name} returned {other:?}"),
    }
}
