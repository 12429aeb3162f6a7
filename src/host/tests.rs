//! Tests for the reference runtime, driven through the raw boundary primitives

use super::*;
use crate::binding::{signature, ArgList, BindingType};
use crate::wire::{SingleSlot, TextWire, WireBuffer};
use crate::Val;

fn key(rt: &HostRuntime, name: &str) -> RawRef {
    rt.new_string(name)
}

#[test]
fn test_reserved_handles_are_immortal() {
    let rt = HostRuntime::new();
    let undefined = rt.undefined();
    rt.decref(undefined);
    rt.decref(undefined);
    assert_eq!(rt.refcount(undefined), IMMORTAL);
    assert!(matches!(rt.value_of(rt.null()), Some(Value::Null)));
    assert_eq!(rt.live_handles(), 0);
}

#[test]
fn test_refcount_lifecycle() {
    let rt = HostRuntime::new();
    let object = rt.new_object();
    assert_eq!(rt.refcount(object), 1);
    assert_eq!(rt.live_handles(), 1);

    rt.incref(object);
    assert_eq!(rt.refcount(object), 2);
    rt.decref(object);
    rt.decref(object);

    assert_eq!(rt.refcount(object), 0);
    assert_eq!(rt.live_handles(), 0);
    assert!(rt.value_of(object).is_none());
}

#[test]
fn test_freed_ids_are_reused() {
    let rt = HostRuntime::new();
    let first = rt.new_object();
    rt.decref(first);
    let second = rt.new_array();
    assert_eq!(first, second);
}

#[test]
fn test_property_round_trip() {
    let rt = HostRuntime::new();
    let object = rt.new_object();
    let value = rt.new_string("v");
    let name = key(&rt, "k");

    rt.set_property(object, name, value).unwrap();
    let read = rt.get_property(object, name).unwrap();
    assert!(rt.same_value(read, value));

    let missing = rt.get_property(object, key(&rt, "missing")).unwrap();
    assert!(matches!(rt.value_of(missing), Some(Value::Undefined)));
}

#[test]
fn test_property_access_on_undefined_fails() {
    let rt = HostRuntime::new();
    let err = rt.get_property(rt.undefined(), key(&rt, "x")).unwrap_err();
    assert_eq!(
        err,
        BoundaryError::PropertyAccess {
            key: "x".to_string(),
            type_tag: "undefined".to_string(),
        }
    );
}

#[test]
fn test_array_length_and_growth() {
    let rt = HostRuntime::new();
    let array = rt.new_array();
    let index = rt.adopt(Value::from(3));
    let item = rt.new_string("x");
    rt.set_property(array, index, item).unwrap();

    let length = rt.get_property(array, key(&rt, "length")).unwrap();
    assert_eq!(rt.value_of(length).unwrap().as_number(), Some(4.0));
}

#[test]
fn test_invalid_handle() {
    let rt = HostRuntime::new();
    let err = rt.get_property(RawRef::from_bits(999), key(&rt, "x")).unwrap_err();
    assert_eq!(err, BoundaryError::InvalidHandle { raw: 999 });
}

#[test]
fn test_globals_and_module_properties() {
    let rt = HostRuntime::new();
    rt.define_module_property("answer", Value::from(42));

    let math = rt.get_global("Math").unwrap();
    assert_eq!(rt.value_of(math).unwrap().type_tag(), "object");

    let answer = rt.get_module_property("answer").unwrap();
    assert_eq!(rt.value_of(answer).unwrap().as_number(), Some(42.0));

    let absent = rt.get_global("NoSuchThing").unwrap();
    assert_eq!(absent, rt.undefined());
}

#[test]
fn test_type_of_tags() {
    let rt = HostRuntime::new();
    let cases = [
        (rt.undefined(), "undefined"),
        (rt.null(), "object"),
        (rt.new_string("s"), "string"),
        (rt.new_array(), "object"),
        (rt.get_global("String").unwrap(), "function"),
        (rt.adopt(Value::BigInt(1)), "bigint"),
    ];
    for (raw, expected) in cases {
        let tag = rt.type_of(raw);
        assert_eq!(rt.value_of(tag).unwrap().to_string(), expected);
    }
}

#[test]
fn test_call_consumes_handle_arguments() {
    let rt = HostRuntime::new();
    let identity = rt.adopt(rt.function("identity", |_, args| {
        Ok(args.first().cloned().unwrap_or(Value::Undefined))
    }));
    let text = rt.new_string("hi");
    let before = rt.live_handles();

    let types = <(&str,) as ArgList>::descriptors();
    let result = rt
        .call(identity, &types, &[WireSlot::from_u32(text.bits())])
        .unwrap();

    // The argument handle was released and the result took its place; a
    // freed id may be handed out again, so count handles instead of ids
    assert_eq!(rt.live_handles(), before);
    assert_eq!(rt.refcount(result), 1);
    assert_eq!(rt.value_of(result).unwrap().to_string(), "hi");
}

#[test]
fn test_call_non_function() {
    let rt = HostRuntime::new();
    let object = rt.new_object();
    let err = rt.call(object, &[], &[]).unwrap_err();
    assert_eq!(
        err,
        BoundaryError::NotCallable {
            type_tag: "object".to_string(),
        }
    );
}

#[test]
fn test_failed_call_still_consumes_arguments() {
    let rt = HostRuntime::new();
    let object = rt.new_object();
    let argument = rt.new_object();

    let types = <(Val,) as ArgList>::descriptors();
    assert!(rt
        .call(object, &types, &[WireSlot::from_u32(argument.bits())])
        .is_err());
    assert_eq!(rt.refcount(argument), 0);
}

#[test]
fn test_thrown_error() {
    let rt = HostRuntime::new();
    let thrower = rt.adopt(rt.function("thrower", |_, _| Err("boom".to_string())));
    assert_eq!(rt.call(thrower, &[], &[]).unwrap_err(), BoundaryError::thrown("boom"));
}

#[test]
fn test_construct_uses_prototype() {
    let rt = HostRuntime::new();
    let point = rt.constructor("Point", |this, args| {
        this.set_property("x", args.first().cloned().unwrap_or(Value::Undefined))
            .map_err(|e| e.to_string())?;
        Ok(Value::Undefined)
    });
    if let Some(prototype) = point.get_property("prototype").unwrap().as_object() {
        prototype.set("kind", Value::from("point")).unwrap();
    }
    let point = rt.adopt(point);

    let types = <(f64,) as ArgList>::descriptors();
    let instance = rt
        .construct(point, &types, &[WireSlot::from_f64(1.5)])
        .unwrap();
    let instance = rt.value_of(instance).unwrap();

    assert_eq!(instance.get_property("x").unwrap().as_number(), Some(1.5));
    assert_eq!(instance.get_property("kind").unwrap().to_string(), "point");
}

#[test]
fn test_construct_plain_function_fails() {
    let rt = HostRuntime::new();
    let string = rt.get_global("String").unwrap();
    assert_eq!(
        rt.construct(string, &[], &[]).unwrap_err(),
        BoundaryError::NotConstructible {
            type_tag: "function".to_string(),
        }
    );
}

#[test]
fn test_array_constructor() {
    let rt = HostRuntime::new();
    let array = rt.get_global("Array").unwrap();
    let types = <(i32, i32) as ArgList>::descriptors();
    let created = rt
        .construct(array, &types, &[WireSlot::from_u32(7), WireSlot::from_u32(8)])
        .unwrap();
    assert_eq!(rt.value_of(created).unwrap().to_string(), "7,8");
}

#[test]
fn test_stub_creation_is_counted() {
    let rt = HostRuntime::new();
    let sig = signature::<i32, (i32,)>();
    let first = rt.create_method_stub(&sig);
    let second = rt.create_method_stub(&sig);

    assert_ne!(first, second);
    assert_eq!(rt.stub_creations(), 2);
    assert_eq!(rt.duplicate_stubs(), 1);
}

#[test]
fn test_invoke_stub_coerces_result() {
    let rt = HostRuntime::new();
    let math = rt.get_global("Math").unwrap();
    let stub = rt.create_method_stub(&signature::<i32, (i32, i32)>());

    let (result, token) = rt.invoke_stub(
        stub,
        math,
        "max",
        &[WireSlot::from_u32(-3i32 as u32), WireSlot::from_u32(9)],
    );
    assert_eq!(result.unwrap().as_u32(), 9);
    assert_eq!(rt.pending_cleanups(), 1);
    rt.run_cleanup(token);
    assert_eq!(rt.pending_cleanups(), 0);
}

#[test]
fn test_invoke_stub_missing_method() {
    let rt = HostRuntime::new();
    let object = rt.new_object();
    let stub = rt.create_method_stub(&signature::<(), ()>());

    let (result, token) = rt.invoke_stub(stub, object, "frob", &[]);
    assert_eq!(
        result.unwrap_err(),
        BoundaryError::MethodNotFound {
            name: "frob".to_string(),
        }
    );
    rt.run_cleanup(token);
}

#[test]
fn test_text_result_lives_until_cleanup() {
    let rt = HostRuntime::new();
    let text = rt.new_string("caf\u{e9}");

    let (result, token) = rt.value_as(text, String::descriptor());
    let slot = result.unwrap();
    match TextWire::read(slot) {
        TextWire::Buffer(buffer) => {
            let bytes = unsafe { (*buffer).as_bytes() };
            assert_eq!(bytes, "caf\u{e9}".as_bytes());
        }
        other => panic!("unexpected {:?}", other),
    }
    rt.run_cleanup(token);
    assert_eq!(rt.pending_cleanups(), 0);
}

#[test]
fn test_value_as_rejects_mismatches() {
    let rt = HostRuntime::new();
    let text = rt.new_string("abc");
    let fraction = rt.adopt(Value::from(1.5));
    let big = rt.adopt(Value::from(300));

    for (raw, descriptor) in [
        (text, i32::descriptor()),
        (fraction, i32::descriptor()),
        (big, u8::descriptor()),
        (text, bool::descriptor()),
    ] {
        let (result, token) = rt.value_as(raw, descriptor);
        assert!(matches!(result, Err(BoundaryError::Coercion { .. })));
        rt.run_cleanup(token);
    }
    assert_eq!(rt.pending_cleanups(), 0);
}

#[test]
fn test_coercion_error_names_types() {
    let rt = HostRuntime::new();
    let text = rt.new_string("abc");
    let (result, token) = rt.value_as(text, i32::descriptor());
    rt.run_cleanup(token);
    assert_eq!(result.unwrap_err(), BoundaryError::coercion("i32", "string \"abc\""));
}

#[test]
fn test_memory_view_argument_is_copied() {
    let rt = HostRuntime::new();
    let data = [1.5f32, -2.0];
    let view = crate::binding::MemoryView::new(&data);
    let descriptor = <crate::binding::MemoryView<'static, f32>>::descriptor();

    let pack = (view,).encode(&rt);
    let array = rt.take_value(descriptor, pack.as_slice()).unwrap();
    assert_eq!(rt.value_of(array).unwrap().to_string(), "1.5,-2");
}

#[test]
fn test_has_function_respects_interface_defaults() {
    trait Shape {}

    let rt = HostRuntime::new();
    let defaults = rt.object();
    if let Some(object) = defaults.as_object() {
        object
            .set("area", rt.function("area", |_, _| Ok(Value::from(0))))
            .unwrap();
    }
    rt.register_interface::<dyn Shape>(&defaults);
    let filter = interface_descriptor::<dyn Shape>();

    let inherited = rt.adopt(rt.object_with_prototype(&defaults));
    assert!(!rt.has_function(inherited, "area", filter));
    assert!(!rt.has_function(inherited, "perimeter", filter));

    let own = rt.object_with_prototype(&defaults);
    if let Some(object) = own.as_object() {
        object
            .set("area", rt.function("area", |_, _| Ok(Value::from(1))))
            .unwrap();
    }
    let own = rt.adopt(own);
    assert!(rt.has_function(own, "area", filter));
}

#[test]
fn test_symbols_are_interned_once() {
    let rt = HostRuntime::new();
    rt.register_symbol("length");
    rt.register_symbol("push");
    rt.register_symbol("length");
    assert_eq!(rt.symbols(), vec!["length".to_string(), "push".to_string()]);
}

#[test]
fn test_unknown_cleanup_token_is_ignored() {
    let rt = HostRuntime::new();
    rt.run_cleanup(CleanupToken::from_raw(12345));
    assert_eq!(rt.pending_cleanups(), 0);
}

#[test]
fn test_wire_buffer_describes_owned_bytes() {
    let buffer = WireBuffer::describe(b"abc");
    assert_eq!(buffer.len(), 3);
}
