//! Object model - dynamically typed values of the reference runtime
//!
//! Design: primitives are stored inline, everything else is a shared
//! `ObjectRef` with a prototype link. Identity of objects is pointer
//! identity of the shared cell.

use crate::error::BoundaryError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Native implementation of a function: `(this, args) -> result`
///
/// An `Err` is raised as a foreign exception.
pub type NativeFn = Rc<dyn Fn(&Value, &[Value]) -> Result<Value, String>>;

/// A value owned by the reference runtime
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    BigInt(i128),
    String(Rc<str>),
    Object(ObjectRef),
}

/// Shared, mutable object
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<Object>>);

pub struct Object {
    pub kind: ObjectKind,
    properties: HashMap<Rc<str>, Value>,
    prototype: Option<ObjectRef>,
}

pub enum ObjectKind {
    Plain,
    Array(Vec<Value>),
    Function(NativeFunction),
}

#[derive(Clone)]
pub struct NativeFunction {
    pub name: Rc<str>,
    pub call: NativeFn,
    pub constructible: bool,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        Self(Rc::new(RefCell::new(Object {
            kind,
            properties: HashMap::new(),
            prototype,
        })))
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn borrow(&self) -> std::cell::Ref<'_, Object> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> std::cell::RefMut<'_, Object> {
        self.0.borrow_mut()
    }

    pub fn prototype(&self) -> Option<ObjectRef> {
        self.0.borrow().prototype.clone()
    }

    /// Own property lookup, including array indices and `length`
    pub fn get_own(&self, key: &str) -> Option<Value> {
        let object = self.0.borrow();
        match &object.kind {
            ObjectKind::Array(items) => {
                if key == "length" {
                    return Some(Value::Number(items.len() as f64));
                }
                if let Some(index) = array_index(key) {
                    return items.get(index).cloned();
                }
            }
            ObjectKind::Function(function) => {
                if key == "name" {
                    return Some(Value::String(function.name.clone()));
                }
            }
            ObjectKind::Plain => {}
        }
        object.properties.get(key).cloned()
    }

    /// Lookup along the prototype chain; `Undefined` when absent
    pub fn get(&self, key: &str) -> Value {
        let mut current = Some(self.clone());
        while let Some(object) = current {
            if let Some(value) = object.get_own(key) {
                return value;
            }
            current = object.prototype();
        }
        Value::Undefined
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.get_own(key).is_some()
    }

    /// Write an own property; arrays grow to fit indices
    pub fn set(&self, key: &str, value: Value) -> Result<(), String> {
        let mut object = self.0.borrow_mut();
        if let ObjectKind::Array(items) = &mut object.kind {
            if key == "length" {
                let length = value
                    .as_number()
                    .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64)
                    .ok_or_else(|| "Invalid array length".to_string())?;
                items.resize(length as usize, Value::Undefined);
                return Ok(());
            }
            if let Some(index) = array_index(key) {
                if index >= items.len() {
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
                return Ok(());
            }
        }
        object.properties.insert(Rc::from(key), value);
        Ok(())
    }

    /// The native function, cloned out so no borrow is held while it runs
    pub fn function(&self) -> Option<NativeFunction> {
        match &self.0.borrow().kind {
            ObjectKind::Function(function) => Some(function.clone()),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.0.borrow().kind, ObjectKind::Array(_))
    }
}

fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse::<u32>().ok().map(|index| index as usize)
}

impl Value {
    /// `typeof` tag
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::BigInt(_) => "bigint",
            Self::String(_) => "string",
            Self::Object(object) if object.function().is_some() => "function",
            Self::Object(_) => "object",
        }
    }

    /// Short description for error messages, e.g. `string "abc"`
    pub fn describe(&self) -> String {
        match self {
            Self::String(s) => format!("string {:?}", s),
            Self::Undefined | Self::Null => self.to_string(),
            Self::Object(object) if object.is_array() => "array".to_string(),
            other => format!("{} {}", other.type_tag(), other),
        }
    }

    /// String form used when the value is a property key
    pub fn to_property_key(&self) -> Rc<str> {
        match self {
            Self::String(s) => s.clone(),
            other => Rc::from(other.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_function(&self) -> bool {
        self.as_object().and_then(ObjectRef::function).is_some()
    }

    /// Numeric conversion used by the math builtins
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::BigInt(i) => *i as f64,
            Self::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Self::Object(_) => f64::NAN,
        }
    }

    /// Property read with primitive semantics: strings expose `length` and
    /// indices, other primitives have no properties
    pub fn get_property(&self, key: &str) -> Result<Value, BoundaryError> {
        match self {
            Self::Undefined | Self::Null => Err(BoundaryError::PropertyAccess {
                key: key.to_string(),
                type_tag: self.to_string(),
            }),
            Self::Object(object) => Ok(object.get(key)),
            Self::String(s) => {
                if key == "length" {
                    return Ok(Value::Number(s.chars().count() as f64));
                }
                Ok(array_index(key)
                    .and_then(|index| s.chars().nth(index))
                    .map(|c| Value::String(Rc::from(c.to_string())))
                    .unwrap_or(Value::Undefined))
            }
            _ => Ok(Value::Undefined),
        }
    }

    /// Property write; ignored on primitives other than `undefined`/`null`
    pub fn set_property(&self, key: &str, value: Value) -> Result<(), BoundaryError> {
        match self {
            Self::Undefined | Self::Null => Err(BoundaryError::PropertyAccess {
                key: key.to_string(),
                type_tag: self.to_string(),
            }),
            Self::Object(object) => object.set(key, value).map_err(BoundaryError::thrown),
            _ => Ok(()),
        }
    }
}

/// Identity comparison: objects by reference, primitives by value, and
/// `NaN` equal to itself
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::BigInt(x), Value::BigInt(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => x.ptr_eq(y),
        _ => false,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) if n.is_infinite() => {
                write!(f, "{}", if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Self::Number(n) => write!(f, "{}", n),
            Self::BigInt(i) => write!(f, "{}", i),
            Self::String(s) => write!(f, "{}", s),
            Self::Object(object) => {
                let object = object.borrow();
                match &object.kind {
                    ObjectKind::Array(items) => {
                        for (i, item) in items.iter().enumerate() {
                            if i > 0 {
                                write!(f, ",")?;
                            }
                            if !matches!(item, Value::Undefined | Value::Null) {
                                write!(f, "{}", item)?;
                            }
                        }
                        Ok(())
                    }
                    ObjectKind::Function(function) => {
                        write!(f, "function {}() {{ [native code] }}", function.name)
                    }
                    ObjectKind::Plain => write!(f, "[object Object]"),
                }
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{:?}", s),
            Self::BigInt(i) => write!(f, "{}n", i),
            other => write!(f, "{}", other),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(Rc::from(value))
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Self::Object(value)
    }
}
