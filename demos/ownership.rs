//! Walk objects of both ownership policies through a host context.
//!
//! Run with `RUST_LOG=debug cargo run --example ownership` to also see the
//! registration and promotion logs.

use anyhow::Result;
use refbridge::prelude::*;

trait Object: RefCounted {
    fn label(&self) -> String;
}

impl_upcast!(dyn Object => dyn RefCounted, dyn Native);

/// Intrusively counted object.
#[derive(Native)]
#[refbridge(name = "MyObject", upcast(dyn Object))]
struct MyObject {
    value: i32,
    #[refbridge(ref_count)]
    refs: RefCount,
}

impl MyObject {
    fn new(value: i32) -> Self {
        let obj = Self {
            value,
            refs: RefCount::new(),
        };
        log::info!("MyObject[{value}] constructor");
        obj
    }
}

impl Object for MyObject {
    fn label(&self) -> String {
        format!("MyObject[{}]", self.value)
    }
}

impl Drop for MyObject {
    fn drop(&mut self) {
        log::info!("MyObject[{}] destructor", self.value);
    }
}

/// Object without an embedded count.
#[derive(Native)]
#[refbridge(name = "MyObject2", external)]
struct MyObject2 {
    value: i32,
}

impl MyObject2 {
    fn new(value: i32) -> Self {
        log::info!("MyObject2[{value}] constructor");
        Self { value }
    }
}

impl Drop for MyObject2 {
    fn drop(&mut self) {
        log::info!("MyObject2[{}] destructor", self.value);
    }
}

fn describe(name: &str, refs: usize) -> String {
    format!("{name} (refs: {refs})")
}

fn module() -> Result<Module> {
    let mut module = Module::new();

    module.register_base::<Ref<dyn Object>>("Object").build()?;
    module
        .register_type::<Ref<MyObject>>()
        .base::<Ref<dyn Object>>()
        .constructor(|ctx| Ok(MyObject::new(ctx.arg(0)?)))
        .implicitly_convertible::<i32>(|value| Ok(MyObject::new(value)))
        .build()?;
    module
        .register_type::<Shared<MyObject2>>()
        .constructor(|ctx| Ok(MyObject2::new(ctx.arg(0)?)))
        .build()?;

    module.function("make_object", |ctx: &mut CallContext| {
        let value: i32 = ctx.arg(0)?;
        let ptr: *mut dyn Object = Box::into_raw(Box::new(MyObject::new(value)));
        // SAFETY: freshly boxed, ownership moves to the returned handle.
        unsafe { ctx.set_return_raw::<Ref<dyn Object>>(ptr) }
    })?;
    module.function("make_myobject2", |ctx: &mut CallContext| {
        let value: i32 = ctx.arg(0)?;
        ctx.set_return_holder(Shared::new(MyObject2::new(value)));
        Ok(())
    })?;

    module.function("print_object", |ctx: &mut CallContext| {
        let obj = ctx.arg_object::<dyn Object>(0)?;
        let out = describe(&obj.label(), obj.ref_count().get() as usize);
        ctx.set_return(out);
        Ok(())
    })?;
    module.function("print_myobject", |ctx: &mut CallContext| {
        let obj: Ref<MyObject> = ctx.arg_holder(0)?;
        let out = describe(&obj.label(), Ref::count(&obj) as usize);
        ctx.set_return(out);
        Ok(())
    })?;
    module.function("print_myobject2", |ctx: &mut CallContext| {
        let obj: Shared<MyObject2> = ctx.arg_holder(0)?;
        let out = describe(&format!("MyObject2[{}]", obj.value), Shared::use_count(&obj));
        ctx.set_return(out);
        Ok(())
    })?;

    Ok(module)
}

fn print(ctx: &Context, function: &str, arg: Dynamic) -> Result<()> {
    let out = ctx.call(function, vec![arg])?;
    println!("{function}: {out:?}");
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut ctx = Context::new();
    ctx.install(module()?)?;
    ctx.seal();

    // Intrusive: the count lives in the object
    let obj = ctx.call("make_object", vec![Dynamic::Int(1)])?;
    print(&ctx, "print_object", obj.clone())?;
    print(&ctx, "print_myobject", obj.clone())?;
    drop(obj);

    // Implicit promotion: a temporary lives for one call
    print(&ctx, "print_myobject", Dynamic::Int(7))?;

    // External: the count lives in a control block
    let obj2 = ctx.call("make_myobject2", vec![Dynamic::Int(2)])?;
    print(&ctx, "print_myobject2", obj2.clone())?;
    drop(obj2);

    let obj3 = ctx.construct("MyObject2", vec![Dynamic::Int(3)])?;
    print(&ctx, "print_myobject2", Dynamic::from(obj3))?;

    match ctx.call("print_myobject2", vec![Dynamic::Int(4)]) {
        Ok(out) => println!("unexpected: {out:?}"),
        Err(e) => println!("print_myobject2(4) rejected: {e}"),
    }

    Ok(())
}
