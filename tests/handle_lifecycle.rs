use valref::host::Value;
use valref::{install_with_config, Boundary, BoundaryError, BridgeConfig, ContextGuard, HostRuntime, Val};

fn setup() -> (HostRuntime, ContextGuard) {
    let rt = HostRuntime::new();
    let guard = install_with_config(rt.clone(), &BridgeConfig::default());
    (rt, guard)
}

#[test]
fn test_clone_and_drop_balance() {
    let (rt, _guard) = setup();

    let object = Val::object();
    let raw = object.as_raw();
    assert_eq!(rt.refcount(raw), 1);

    {
        let copies: Vec<Val> = (0..5).map(|_| object.clone()).collect();
        assert_eq!(rt.refcount(raw), 6);
        assert!(copies.iter().all(|copy| copy.as_raw() == raw));
    }
    assert_eq!(rt.refcount(raw), 1);

    drop(object);
    assert_eq!(rt.refcount(raw), 0);
    assert_eq!(rt.live_handles(), 0);
}

#[test]
fn test_move_keeps_count() {
    let (rt, _guard) = setup();

    let first = Val::array();
    let raw = first.as_raw();
    let moved = first;
    assert_eq!(rt.refcount(raw), 1);

    let boxed = Box::new(moved);
    assert_eq!(rt.refcount(raw), 1);
    drop(boxed);
    assert_eq!(rt.refcount(raw), 0);
}

#[test]
fn test_take_leaves_empty_handle() {
    let (rt, _guard) = setup();

    let mut source = Val::object();
    let raw = source.as_raw();
    let stolen = source.take();

    assert!(source.is_empty());
    assert_eq!(stolen.as_raw(), raw);
    drop(source);
    assert_eq!(rt.refcount(raw), 1);

    assert_eq!(Val::take_ownership(valref::RawRef::EMPTY).type_of().unwrap_err(), BoundaryError::EmptyHandle);
}

#[test]
fn test_clone_from_same_value() {
    let (rt, _guard) = setup();

    let object = Val::object();
    let raw = object.as_raw();
    let mut alias = object.clone();
    alias.clone_from(&object);

    assert_eq!(rt.refcount(raw), 2);
    assert_eq!(alias.as_raw(), raw);
}

#[test]
fn test_clone_from_releases_previous() {
    let (rt, _guard) = setup();

    let first = Val::object();
    let mut target = Val::array();
    let previous = target.as_raw();

    target.clone_from(&first);
    assert_eq!(rt.refcount(previous), 0);
    assert_eq!(rt.refcount(first.as_raw()), 2);
}

#[test]
fn test_set_then_get_returns_same_value() {
    let (rt, _guard) = setup();

    let object = Val::object();
    let value = Val::object();
    object.set("child", &value).unwrap();

    let read = object.get("child").unwrap();
    assert!(rt.same_value(read.as_raw(), value.as_raw()));
    assert_eq!(rt.refcount(value.as_raw()), 1);
}

#[test]
fn test_set_by_value_transfers_reference() {
    let (rt, _guard) = setup();

    let object = Val::object();
    object.set("name", Val::from("widget")).unwrap();
    object.set(0u32, 42i32).unwrap();

    assert_eq!(object.get("name").unwrap().to::<String>().unwrap(), "widget");
    assert_eq!(object.get("0").unwrap().to::<i32>().unwrap(), 42);

    drop(object);
    assert_eq!(rt.live_handles(), 0);
}

#[test]
fn test_new_array_is_empty() {
    let (_rt, _guard) = setup();

    let array = Val::array();
    assert_eq!(array.get("length").unwrap().to::<u32>().unwrap(), 0);
    assert!(valref::vec_from_array::<i32>(&array).unwrap().is_empty());
}

#[test]
fn test_undefined_and_null() {
    let (rt, _guard) = setup();

    let undefined = Val::undefined();
    let null = Val::null();
    assert_eq!(undefined.type_of().unwrap().to::<String>().unwrap(), "undefined");
    assert_eq!(null.type_of().unwrap().to::<String>().unwrap(), "object");

    drop(undefined.clone());
    assert_eq!(rt.refcount(null.as_raw()), valref::host::IMMORTAL);

    let err = undefined.get("x").unwrap_err();
    assert!(matches!(err, BoundaryError::PropertyAccess { .. }));
}

#[test]
fn test_has_own_property() {
    let (_rt, _guard) = setup();

    let object = Val::object();
    object.set("own", 1i32).unwrap();

    assert!(object.has_own_property("own").unwrap());
    assert!(!object.has_own_property("missing").unwrap());
    assert!(!object.has_own_property("hasOwnProperty").unwrap());
}

#[test]
fn test_globals_and_module_properties() {
    let (rt, _guard) = setup();
    rt.define_module_property("settings", rt.object());
    rt.define_global("version", Value::from(3));

    let pi = Val::global("Math").unwrap().get("PI").unwrap().to::<f64>().unwrap();
    assert_eq!(pi, std::f64::consts::PI);

    let settings = Val::module_property("settings").unwrap();
    assert_eq!(settings.type_of().unwrap().to::<String>().unwrap(), "object");
    assert_eq!(Val::global("version").unwrap().to::<u8>().unwrap(), 3);

    let missing = Val::module_property("nothing").unwrap();
    assert_eq!(missing.type_of().unwrap().to::<String>().unwrap(), "undefined");
}

#[test]
fn test_nested_contexts() {
    let (outer, _outer_guard) = setup();
    let outer_object = Val::object();

    let inner = HostRuntime::new();
    {
        let _inner_guard = install_with_config(inner.clone(), &BridgeConfig::default());
        let inner_object = Val::object();
        assert_eq!(inner.live_handles(), 1);
        assert_eq!(outer.live_handles(), 1);
        drop(inner_object);
        assert_eq!(inner.live_handles(), 0);
    }

    let another = Val::object();
    assert_eq!(outer.live_handles(), 2);
    drop(another);
    drop(outer_object);
    assert_eq!(outer.live_handles(), 0);
}

#[test]
fn test_outer_handle_dropped_under_inner_runtime() {
    let (outer, _outer_guard) = setup();
    let outer_object = Val::object();
    let raw = outer_object.as_raw();

    let inner = HostRuntime::new();
    let _inner_guard = install_with_config(inner.clone(), &BridgeConfig::default());
    let inner_object = Val::object();

    drop(outer_object);
    assert_eq!(outer.refcount(raw), 0);
    assert_eq!(outer.live_handles(), 0);
    // Fresh runtimes hand out the same ids; the inner value is untouched
    assert_eq!(inner.refcount(inner_object.as_raw()), 1);
    assert_eq!(inner.live_handles(), 1);
}

#[test]
fn test_outer_handle_operations_under_inner_runtime() {
    let (outer, _outer_guard) = setup();
    let settings = Val::object();
    settings.set("mode", "fast").unwrap();

    let inner = HostRuntime::new();
    let _inner_guard = install_with_config(inner.clone(), &BridgeConfig::default());

    let mode = settings.get("mode").unwrap();
    assert_eq!(mode.owner(), settings.owner());
    assert_eq!(mode.to::<String>().unwrap(), "fast");
    assert!(settings.has_own_property("mode").unwrap());

    let copy = settings.clone();
    assert_eq!(outer.refcount(settings.as_raw()), 2);
    drop(copy);
    drop(mode);
    assert_eq!(inner.live_handles(), 0);

    // New handles still belong to the innermost runtime
    let fresh = Val::object();
    assert_eq!(fresh.owner(), inner.state().id());
    assert_eq!(inner.live_handles(), 1);
    assert_eq!(outer.live_handles(), 1);
}

#[test]
fn test_handle_of_uninstalled_runtime() {
    let outer = HostRuntime::new();
    let outer_guard = install_with_config(outer.clone(), &BridgeConfig::default());
    let object = Val::object();
    let raw = object.as_raw();
    drop(outer_guard);

    let other = HostRuntime::new();
    let _guard = install_with_config(other.clone(), &BridgeConfig::default());
    assert_eq!(object.get("x").unwrap_err(), BoundaryError::NoRuntime);
    assert!(!object.has_function::<()>("toString"));

    drop(object);
    assert_eq!(outer.refcount(raw), 1);
    assert_eq!(other.live_handles(), 0);
}

#[test]
fn test_handle_survives_reinstall_of_its_runtime() {
    let rt = HostRuntime::new();
    let object = {
        let _guard = install_with_config(rt.clone(), &BridgeConfig::default());
        Val::object()
    };

    let _guard = install_with_config(rt.clone(), &BridgeConfig::default());
    object.set("k", 1i32).unwrap();
    assert_eq!(object.get("k").unwrap().to::<i32>().unwrap(), 1);

    drop(object);
    assert_eq!(rt.live_handles(), 0);
}

#[test]
fn test_drop_after_uninstall_leaks() {
    let rt = HostRuntime::new();
    let guard = install_with_config(rt.clone(), &BridgeConfig::default());
    let object = Val::object();
    let raw = object.as_raw();

    drop(guard);
    assert!(!valref::is_installed());
    drop(object);
    assert_eq!(rt.refcount(raw), 1);
}

#[test]
fn test_fallible_operations_without_runtime() {
    assert!(!valref::is_installed());
    assert_eq!(Val::global("Math").unwrap_err(), BoundaryError::NoRuntime);
    assert_eq!(Val::module_property("x").unwrap_err(), BoundaryError::NoRuntime);
    assert!(valref::stats().is_none());
}

#[test]
fn test_stats_count_boundary_work() {
    let (_rt, _guard) = setup();

    let before = valref::stats().unwrap();
    let object = Val::object();
    let _ = object.get("x").unwrap().to::<String>();
    let after = valref::stats().unwrap();

    assert!(after.boundary_calls > before.boundary_calls);
    assert_eq!(after.cleanups_run, before.cleanups_run + 1);
    assert_eq!(after.coercion_failures, before.coercion_failures + 1);
}

#[test]
fn test_symbols_pass_through() {
    let (rt, _guard) = setup();

    valref::register_symbol("length").unwrap();
    valref::register_symbol("length").unwrap();
    assert_eq!(rt.symbols(), vec!["length".to_string()]);
}
