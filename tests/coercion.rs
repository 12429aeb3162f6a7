use proptest::prelude::*;
use valref::host::Value;
use valref::{install_with_config, BoundaryError, BridgeConfig, HostRuntime, Val};

fn with_runtime<T>(body: impl FnOnce(&HostRuntime) -> T) -> T {
    let rt = HostRuntime::new();
    let _guard = install_with_config(rt.clone(), &BridgeConfig::default());
    body(&rt)
}

fn coercion_error<T: std::fmt::Debug>(result: valref::Result<T>) -> bool {
    matches!(result, Err(BoundaryError::Coercion { .. }))
}

proptest! {
    #[test]
    fn prop_i32_round_trip(n in any::<i32>()) {
        let back = with_runtime(|_| Val::from_value(n).unwrap().to::<i32>().unwrap());
        prop_assert_eq!(back, n);
    }

    #[test]
    fn prop_u16_round_trip(n in any::<u16>()) {
        let back = with_runtime(|_| Val::from_value(n).unwrap().to::<u16>().unwrap());
        prop_assert_eq!(back, n);
    }

    #[test]
    fn prop_i64_round_trip(n in any::<i64>()) {
        let back = with_runtime(|_| Val::from_value(n).unwrap().to::<i64>().unwrap());
        prop_assert_eq!(back, n);
    }

    #[test]
    fn prop_u64_round_trip(n in any::<u64>()) {
        let back = with_runtime(|_| Val::from_value(n).unwrap().to::<u64>().unwrap());
        prop_assert_eq!(back, n);
    }

    #[test]
    fn prop_f64_round_trip(x in any::<f64>().prop_filter("finite", |x| x.is_finite())) {
        let back = with_runtime(|_| Val::from_value(x).unwrap().to::<f64>().unwrap());
        prop_assert_eq!(back.to_bits(), x.to_bits());
    }

    #[test]
    fn prop_f32_round_trip(x in any::<f32>().prop_filter("finite", |x| x.is_finite())) {
        let back = with_runtime(|_| Val::from_value(x).unwrap().to::<f32>().unwrap());
        prop_assert_eq!(back.to_bits(), x.to_bits());
    }

    #[test]
    fn prop_string_round_trip(text in "\\PC{0,32}") {
        let back = with_runtime(|rt| {
            let back = Val::from_value(text.as_str()).unwrap().to::<String>().unwrap();
            assert_eq!(rt.pending_cleanups(), 0);
            back
        });
        prop_assert_eq!(back, text);
    }

    #[test]
    fn prop_narrowing_checks_range(n in any::<i32>()) {
        let narrowed = with_runtime(|_| Val::from_value(n).unwrap().to::<i8>());
        match i8::try_from(n) {
            Ok(expected) => prop_assert_eq!(narrowed, Ok(expected)),
            Err(_) => prop_assert!(coercion_error(narrowed)),
        }
    }
}

#[test]
fn test_integer_boundaries() {
    with_runtime(|_| {
        assert_eq!(Val::from_value(i32::MIN).unwrap().to::<i32>().unwrap(), i32::MIN);
        assert_eq!(Val::from_value(u32::MAX).unwrap().to::<u32>().unwrap(), u32::MAX);
        assert_eq!(Val::from_value(i8::MIN).unwrap().to::<i8>().unwrap(), i8::MIN);
        assert_eq!(Val::from_value(u64::MAX).unwrap().to::<u64>().unwrap(), u64::MAX);

        assert!(coercion_error(Val::from_value(256u32).unwrap().to::<u8>()));
        assert!(coercion_error(Val::from_value(-1i32).unwrap().to::<u32>()));
        assert!(coercion_error(Val::from_value(u64::MAX).unwrap().to::<i64>()));
    });
}

#[test]
fn test_number_to_integer_requires_whole_values() {
    with_runtime(|_| {
        assert_eq!(Val::from_value(12.0f64).unwrap().to::<i32>().unwrap(), 12);
        assert!(coercion_error(Val::from_value(12.5f64).unwrap().to::<i32>()));
        assert!(coercion_error(Val::from_value(f64::NAN).unwrap().to::<i32>()));
        assert!(coercion_error(Val::from_value(f64::INFINITY).unwrap().to::<u64>()));
    });
}

#[test]
fn test_big_integers_widen_to_floats() {
    with_runtime(|_| {
        let big = Val::from_value(1i64 << 40).unwrap();
        assert_eq!(big.type_of().unwrap().to::<String>().unwrap(), "bigint");
        assert_eq!(big.to::<f64>().unwrap(), (1u64 << 40) as f64);
        assert_eq!(big.to::<i32>().unwrap_err(), BoundaryError::coercion("i32", "bigint 1099511627776"));
    });
}

#[test]
fn test_non_finite_floats_survive() {
    with_runtime(|_| {
        assert!(Val::from_value(f64::NAN).unwrap().to::<f64>().unwrap().is_nan());
        assert_eq!(
            Val::from_value(f32::NEG_INFINITY).unwrap().to::<f32>().unwrap(),
            f32::NEG_INFINITY
        );
    });
}

#[test]
fn test_bool_and_type_mismatches() {
    with_runtime(|_| {
        assert!(Val::from_value(true).unwrap().to::<bool>().unwrap());
        assert!(!Val::from_value(false).unwrap().to::<bool>().unwrap());

        assert!(coercion_error(Val::from_value(1i32).unwrap().to::<bool>()));
        assert!(coercion_error(Val::from("12").to::<i32>()));
        assert!(coercion_error(Val::from_value(1i32).unwrap().to::<String>()));
        assert!(coercion_error(Val::null().to::<f64>()));
    });
}

#[test]
fn test_coercion_failures_are_counted() {
    with_runtime(|rt| {
        let text = Val::from("abc");
        let _ = text.to::<i32>();
        let _ = text.to::<bool>();

        let stats = valref::stats().unwrap();
        assert_eq!(stats.coercion_failures, 2);
        assert_eq!(stats.cleanups_run, 2);
        assert_eq!(rt.pending_cleanups(), 0);
    });
}

#[test]
fn test_vec_from_array() {
    with_runtime(|rt| {
        rt.define_global(
            "numbers",
            rt.array(vec![Value::from(1), Value::from(2), Value::from(3)]),
        );
        let numbers = Val::global("numbers").unwrap();

        assert_eq!(valref::vec_from_array::<i32>(&numbers).unwrap(), vec![1, 2, 3]);
        assert_eq!(valref::vec_from_array::<f64>(&numbers).unwrap(), vec![1.0, 2.0, 3.0]);
        assert!(coercion_error(valref::vec_from_array::<bool>(&numbers)));
    });
}

#[test]
fn test_read_array_into_keeps_converted_prefix() {
    with_runtime(|rt| {
        rt.define_global(
            "mixed",
            rt.array(vec![Value::from(1), Value::from(2), Value::from("three"), Value::from(4)]),
        );
        let mixed = Val::global("mixed").unwrap();

        let mut out = vec![0];
        let err = mixed.read_array_into::<i32>(&mut out).unwrap_err();
        assert!(matches!(err, BoundaryError::Coercion { .. }));
        assert_eq!(out, vec![0, 1, 2]);
    });
}

#[test]
fn test_strings_from_arrays() {
    with_runtime(|rt| {
        rt.define_global(
            "names",
            rt.array(vec![Value::from("ada"), Value::from("grace")]),
        );
        let names = Val::global("names").unwrap();

        assert_eq!(
            valref::vec_from_array::<String>(&names).unwrap(),
            vec!["ada".to_string(), "grace".to_string()]
        );
        assert_eq!(rt.pending_cleanups(), 0);
    });
}
