//! Built-in objects - the minimal global environment of the reference runtime
//!
//! Provides `Object` (with `Object.prototype.hasOwnProperty`),
//! `Function.prototype.call`, `Array` (with `push`), `Math` and `String`.

use super::value::{NativeFn, NativeFunction, ObjectKind, ObjectRef, Value};
use crate::logging::debug;
use std::collections::HashMap;
use std::rc::Rc;

/// Wrap a closure as a native function
pub fn native(call: impl Fn(&Value, &[Value]) -> Result<Value, String> + 'static) -> NativeFn {
    Rc::new(call)
}

/// `Math.max`/`Math.min`: fold over numeric arguments, `NaN` if any is `NaN`
fn fold(init: f64, pick: fn(f64, f64) -> f64) -> NativeFn {
    native(move |_, args| {
        Ok(Value::Number(args.iter().map(Value::to_number).fold(init, |acc, n| {
            if acc.is_nan() || n.is_nan() {
                f64::NAN
            } else {
                pick(acc, n)
            }
        })))
    })
}

/// Intrinsic prototypes shared by every value the runtime creates
pub struct Realm {
    pub object_prototype: ObjectRef,
    pub function_prototype: ObjectRef,
    pub array_prototype: ObjectRef,
}

impl Realm {
    pub fn new() -> Self {
        let object_prototype = ObjectRef::new(ObjectKind::Plain, None);
        let function_prototype = ObjectRef::new(ObjectKind::Plain, Some(object_prototype.clone()));
        let array_prototype = ObjectRef::new(ObjectKind::Plain, Some(object_prototype.clone()));

        Self {
            object_prototype,
            function_prototype,
            array_prototype,
        }
    }

    pub fn object(&self) -> Value {
        Value::Object(ObjectRef::new(ObjectKind::Plain, Some(self.object_prototype.clone())))
    }

    pub fn array(&self, items: Vec<Value>) -> Value {
        Value::Object(ObjectRef::new(
            ObjectKind::Array(items),
            Some(self.array_prototype.clone()),
        ))
    }

    /// Function object; constructors also get a `prototype` object
    pub fn function(&self, name: &str, constructible: bool, call: NativeFn) -> Value {
        let function = ObjectRef::new(
            ObjectKind::Function(NativeFunction {
                name: Rc::from(name),
                call,
                constructible,
            }),
            Some(self.function_prototype.clone()),
        );

        if constructible {
            // A fresh plain object never rejects a write
            let _ = function.set("prototype", self.object());
        }
        Value::Object(function)
    }

    fn method(&self, target: &ObjectRef, name: &str, call: NativeFn) {
        let _ = target.set(name, self.function(name, false, call));
    }

    /// Populate prototypes and build the global table
    pub fn install_globals(&self) -> HashMap<String, Value> {
        let mut globals = HashMap::new();

        self.method(
            &self.object_prototype,
            "hasOwnProperty",
            native(|this, args| {
                let key = args.first().unwrap_or(&Value::Undefined).to_property_key();
                Ok(Value::Bool(match this {
                    Value::Object(object) => object.has_own(&key),
                    Value::String(_) => !matches!(
                        this.get_property(&key),
                        Ok(Value::Undefined) | Err(_)
                    ),
                    _ => false,
                }))
            }),
        );

        self.method(
            &self.function_prototype,
            "call",
            native(|this, args| {
                let receiver = args.first().cloned().unwrap_or(Value::Undefined);
                let rest = args.get(1..).unwrap_or(&[]);
                match this.as_object().and_then(ObjectRef::function) {
                    Some(function) => (function.call)(&receiver, rest),
                    None => Err(format!("{} is not a function", this.describe())),
                }
            }),
        );

        self.method(
            &self.array_prototype,
            "push",
            native(|this, args| {
                let object = this
                    .as_object()
                    .filter(|object| object.is_array())
                    .ok_or_else(|| "push called on non-array".to_string())?;
                let mut object = object.borrow_mut();
                match &mut object.kind {
                    ObjectKind::Array(items) => {
                        items.extend(args.iter().cloned());
                        Ok(Value::Number(items.len() as f64))
                    }
                    _ => Err("push called on non-array".to_string()),
                }
            }),
        );

        let object_ctor = self.function("Object", true, native(|_, _| Ok(Value::Undefined)));
        if let Value::Object(ctor) = &object_ctor {
            let _ = ctor.set("prototype", Value::Object(self.object_prototype.clone()));
        }
        globals.insert("Object".to_string(), object_ctor);

        let function_ctor = self.function(
            "Function",
            false,
            native(|_, _| Err("dynamic function creation is not supported".to_string())),
        );
        if let Value::Object(ctor) = &function_ctor {
            let _ = ctor.set("prototype", Value::Object(self.function_prototype.clone()));
        }
        globals.insert("Function".to_string(), function_ctor);

        // Only usable with `new`: the receiver already carries Array.prototype
        let array_ctor = self.function(
            "Array",
            true,
            native(|this, args| {
                let object = this
                    .as_object()
                    .ok_or_else(|| "Array must be called with new".to_string())?;
                let items = match args {
                    [Value::Number(n)] => {
                        if *n < 0.0 || n.fract() != 0.0 || *n > u32::MAX as f64 {
                            return Err("Invalid array length".to_string());
                        }
                        vec![Value::Undefined; *n as usize]
                    }
                    _ => args.to_vec(),
                };
                object.borrow_mut().kind = ObjectKind::Array(items);
                Ok(Value::Undefined)
            }),
        );
        if let Value::Object(ctor) = &array_ctor {
            let _ = ctor.set("prototype", Value::Object(self.array_prototype.clone()));
        }
        globals.insert("Array".to_string(), array_ctor);

        let math = self.object();
        if let Value::Object(math_object) = &math {
            self.method(math_object, "max", fold(f64::NEG_INFINITY, f64::max));
            self.method(math_object, "min", fold(f64::INFINITY, f64::min));
            self.method(
                math_object,
                "abs",
                native(|_, args| {
                    Ok(Value::Number(args.first().map_or(f64::NAN, Value::to_number).abs()))
                }),
            );
            self.method(
                math_object,
                "floor",
                native(|_, args| {
                    Ok(Value::Number(args.first().map_or(f64::NAN, Value::to_number).floor()))
                }),
            );
            let _ = math_object.set("PI", Value::Number(std::f64::consts::PI));
        }
        globals.insert("Math".to_string(), math);

        globals.insert(
            "String".to_string(),
            self.function(
                "String",
                false,
                native(|_, args| {
                    Ok(Value::from(args.first().map_or_else(String::new, |v| v.to_string())))
                }),
            ),
        );

        debug!(event = "globals_installed", count = globals.len(), "Builtins installed");
        globals
    }
}
