//! Integration tests for native calls: argument conventions, return
//! conventions and implicit promotion.
//!
//! Arguments are passed as copies of handles the test keeps, so a function
//! sees one owner for the test's handle plus one for its argument slot.

mod common;

use common::{Tracker, call_str, example_context};
use refbridge::prelude::*;
use refbridge::{ConversionError, HandleError};

fn make(ctx: &Context, name: &str) -> Dynamic {
    let obj = ctx.call(name, vec![]).unwrap();
    assert_eq!(obj.as_handle().map(Handle::use_count), Some(1));
    obj
}

fn use_count(obj: &Dynamic) -> usize {
    obj.as_handle().map_or(0, Handle::use_count)
}

// =============================================================================
// Return conventions
// =============================================================================

#[test]
fn test_make_functions_return_single_owner() {
    let tracker = Tracker::new();
    let ctx = example_context(&tracker);

    for (name, type_name) in [
        ("make_object_1", "MyObject"),
        ("make_object_2", "MyObject"),
        ("make_myobject_4", "MyObject"),
        ("make_myobject_5", "MyObject"),
        ("make_myobject2_1", "MyObject2"),
        ("make_myobject2_2", "MyObject2"),
    ] {
        let obj = make(&ctx, name);
        assert_eq!(obj.as_handle().and_then(Handle::type_name), Some(type_name));
    }

    assert_eq!(tracker.destructions(), 6);
}

#[test]
fn test_constructor_returns_policy_handle() {
    let tracker = Tracker::new();
    let ctx = example_context(&tracker);

    let obj = ctx.construct("MyObject", vec![Dynamic::Int(3)]).unwrap();
    assert_eq!(obj.policy(), Some(OwnershipPolicy::Intrusive));
    let obj2 = ctx.construct("MyObject2", vec![Dynamic::Int(3)]).unwrap();
    assert_eq!(obj2.policy(), Some(OwnershipPolicy::External));

    assert_eq!(
        ctx.construct("Object", vec![]).unwrap_err(),
        NativeError::NoConstructor("Object".into())
    );
}

// =============================================================================
// Argument conventions, intrusive
// =============================================================================

#[test]
fn test_object_conventions() {
    let tracker = Tracker::new();
    let ctx = example_context(&tracker);
    let obj = make(&ctx, "make_object_1");

    assert_eq!(
        call_str(&ctx, "print_object_1", vec![obj.clone()]),
        "MyObject[1] refs=2"
    );
    for name in ["print_object_2", "print_object_3", "print_object_4"] {
        assert_eq!(call_str(&ctx, name, vec![obj.clone()]), "MyObject[1] refs=3");
        assert_eq!(use_count(&obj), 1);
    }
    assert_eq!(tracker.destructions(), 0);

    drop(obj);
    assert_eq!(tracker.count("MyObject[1] destructor"), 1);
}

#[test]
fn test_myobject_conventions() {
    let tracker = Tracker::new();
    let ctx = example_context(&tracker);
    let obj = make(&ctx, "make_myobject_5");

    assert_eq!(
        call_str(&ctx, "print_myobject_1", vec![obj.clone()]),
        "MyObject[5] refs=2"
    );
    for name in ["print_myobject_2", "print_myobject_3", "print_myobject_4"] {
        assert_eq!(call_str(&ctx, name, vec![obj.clone()]), "MyObject[5] refs=3");
        assert_eq!(use_count(&obj), 1);
    }

    drop(obj);
    assert_eq!(tracker.destructions(), 1);
}

#[test]
fn test_derived_passed_as_base() {
    let tracker = Tracker::new();
    let ctx = example_context(&tracker);
    let obj = make(&ctx, "make_myobject_4");

    assert_eq!(
        call_str(&ctx, "print_object_2", vec![obj.clone()]),
        "MyObject[4] refs=3"
    );
    assert_eq!(
        ctx.call("get_ref_count", vec![obj.clone()]).unwrap(),
        Dynamic::Int(2)
    );
    assert_eq!(use_count(&obj), 1);
}

#[test]
fn test_null_argument() {
    let tracker = Tracker::new();
    let ctx = example_context(&tracker);

    assert_eq!(call_str(&ctx, "print_myobject_4", vec![Dynamic::Null]), "null");
    assert_eq!(
        ctx.call("print_myobject_2", vec![Dynamic::Null]),
        Err(NativeError::Handle(HandleError::Empty))
    );
}

// =============================================================================
// Argument conventions, external
// =============================================================================

#[test]
fn test_myobject2_conventions() {
    let tracker = Tracker::new();
    let ctx = example_context(&tracker);
    let obj = make(&ctx, "make_myobject2_1");

    assert_eq!(
        call_str(&ctx, "print_myobject2_1", vec![obj.clone()]),
        "MyObject2[1]"
    );
    for name in ["print_myobject2_2", "print_myobject2_3", "print_myobject2_4"] {
        assert_eq!(call_str(&ctx, name, vec![obj.clone()]), "MyObject2[1] refs=3");
        assert_eq!(use_count(&obj), 1);
    }

    drop(obj);
    assert_eq!(tracker.count("MyObject2[1] destructor"), 1);
}

#[test]
fn test_wrong_type_argument() {
    let tracker = Tracker::new();
    let ctx = example_context(&tracker);
    let obj2 = make(&ctx, "make_myobject2_2");

    assert_eq!(
        ctx.call("print_myobject_1", vec![obj2.clone()]),
        Err(NativeError::Handle(HandleError::TypeMismatch {
            expected: "MyObject".into(),
            actual: "MyObject2".into(),
        }))
    );
    assert!(ctx.call("print_object_2", vec![obj2.clone()]).is_err());
    assert_eq!(use_count(&obj2), 1);
}

// =============================================================================
// Implicit promotion
// =============================================================================

#[test]
fn test_int_promoted_for_each_convention() {
    let tracker = Tracker::new();
    let ctx = example_context(&tracker);

    assert_eq!(
        call_str(&ctx, "print_myobject_1", vec![Dynamic::Int(7)]),
        "MyObject[7] refs=1"
    );
    for name in ["print_myobject_2", "print_myobject_3", "print_myobject_4"] {
        assert_eq!(call_str(&ctx, name, vec![Dynamic::Int(7)]), "MyObject[7] refs=2");
    }

    // Each promotion builds a temporary that dies with the call
    assert_eq!(tracker.count("MyObject[7] constructor"), 4);
    assert_eq!(tracker.count("MyObject[7] destructor"), 4);
}

#[test]
fn test_promotion_needs_registered_conversion() {
    let tracker = Tracker::new();
    let ctx = example_context(&tracker);

    assert_eq!(
        ctx.call("print_myobject2_2", vec![Dynamic::Int(7)]),
        Err(NativeError::Conversion(
            ConversionError::NotImplicitlyConstructible {
                target: "MyObject2".into(),
                source_kind: "int",
            }
        ))
    );
    // The conversion belongs to MyObject, not to its base
    assert!(matches!(
        ctx.call("print_object_2", vec![Dynamic::Int(7)]),
        Err(NativeError::Conversion(
            ConversionError::NotImplicitlyConstructible { .. }
        ))
    ));
    // Strings have no conversion at all
    assert!(
        ctx.call("print_myobject_2", vec![Dynamic::String("7".into())])
            .is_err()
    );
    assert!(tracker.events().is_empty());
}

#[test]
fn test_missing_argument() {
    let tracker = Tracker::new();
    let ctx = example_context(&tracker);

    assert_eq!(
        ctx.call("print_myobject_1", vec![]),
        Err(NativeError::ArgumentIndexOutOfBounds { index: 0, count: 0 })
    );
}
