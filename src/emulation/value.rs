//! Runtime values of the interpreter.

use std::{cell::RefCell, fmt, rc::Rc};

use crate::{
    emulation::EmulationError,
    metadata::typesystem::{TypeRef, SYSTEM_BOOLEAN, SYSTEM_DOUBLE, SYSTEM_INT32, SYSTEM_INT64},
};

/// Shared, mutable array storage; arrays are reference types
pub type ArrayRef = Rc<RefCell<Vec<EmValue>>>;

/// A value on the evaluation stack, in an argument slot, a local slot or an array element.
///
/// # CIL Type Mapping
///
/// | CIL Type | EmValue Variant |
/// |----------|-----------------|
/// | `int32` and narrower | [`EmValue::I32`] |
/// | `int64` | [`EmValue::I64`] |
/// | `float64` | [`EmValue::F64`] |
/// | `bool` returned by natives | [`EmValue::Bool`] |
/// | `string` | [`EmValue::Str`] |
/// | boxed value type | [`EmValue::Boxed`] |
/// | `T[]` | [`EmValue::Array`] |
/// | any other object | [`EmValue::Object`] |
///
/// Comparison instructions push [`EmValue::I32`] `0` or `1`, as the CLI does.
#[derive(Clone, Debug, PartialEq)]
pub enum EmValue {
    /// No value, returned by `void` methods
    Void,
    /// 32-bit signed integer
    I32(i32),
    /// 64-bit signed integer
    I64(i64),
    /// 64-bit floating point
    F64(f64),
    /// Boolean
    Bool(bool),
    /// String
    Str(String),
    /// Null reference
    Null,
    /// A boxed value type
    Boxed(Box<EmValue>),
    /// Zero-based, single-dimensional array
    Array(ArrayRef),
    /// Instance of a type without emulated state, named by its full name
    Object(String),
}

impl EmValue {
    /// A new array holding `elements`
    #[must_use]
    pub fn array(elements: Vec<EmValue>) -> Self {
        EmValue::Array(Rc::new(RefCell::new(elements)))
    }

    /// A boxed copy of `value`
    #[must_use]
    pub fn boxed(value: impl Into<EmValue>) -> Self {
        EmValue::Boxed(Box::new(value.into()))
    }

    /// The zero value a slot of type `ty` starts with
    #[must_use]
    pub fn default_for(ty: &TypeRef) -> Self {
        if !ty.is_value_type() {
            return EmValue::Null;
        }
        match ty.full_name() {
            SYSTEM_INT64 => EmValue::I64(0),
            SYSTEM_DOUBLE => EmValue::F64(0.0),
            SYSTEM_INT32 | SYSTEM_BOOLEAN => EmValue::I32(0),
            name => EmValue::Object(name.to_string()),
        }
    }

    /// Short name of the variant, for error messages
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            EmValue::Void => "void",
            EmValue::I32(_) => "int32",
            EmValue::I64(_) => "int64",
            EmValue::F64(_) => "float64",
            EmValue::Bool(_) => "bool",
            EmValue::Str(_) => "string",
            EmValue::Null => "null",
            EmValue::Boxed(_) => "boxed",
            EmValue::Array(_) => "array",
            EmValue::Object(_) => "object",
        }
    }

    /// Returns true for null references
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, EmValue::Null)
    }

    /// The truth value used by `brtrue` and `brfalse`
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            EmValue::Void | EmValue::Null => false,
            EmValue::I32(v) => *v != 0,
            EmValue::I64(v) => *v != 0,
            EmValue::F64(v) => *v != 0.0,
            EmValue::Bool(v) => *v,
            _ => true,
        }
    }

    /// The value as an `int32`, accepting booleans
    pub fn as_i32(&self) -> Result<i32, EmulationError> {
        match self {
            EmValue::I32(v) => Ok(*v),
            EmValue::Bool(v) => Ok(i32::from(*v)),
            other => Err(other.mismatch("int32")),
        }
    }

    /// The array storage
    pub fn as_array(&self) -> Result<&ArrayRef, EmulationError> {
        match self {
            EmValue::Array(array) => Ok(array),
            EmValue::Null => Err(EmulationError::NullReference),
            other => Err(other.mismatch("array")),
        }
    }

    /// The text `Object.ToString()` would produce, with null as the empty string
    #[must_use]
    pub fn to_clr_string(&self) -> String {
        match self {
            EmValue::Void | EmValue::Null => String::new(),
            EmValue::I32(v) => v.to_string(),
            EmValue::I64(v) => v.to_string(),
            EmValue::F64(v) => v.to_string(),
            EmValue::Bool(true) => "True".to_string(),
            EmValue::Bool(false) => "False".to_string(),
            EmValue::Str(s) => s.clone(),
            EmValue::Boxed(inner) => inner.to_clr_string(),
            EmValue::Array(_) => "System.Object[]".to_string(),
            EmValue::Object(name) => name.clone(),
        }
    }

    /// Returns true if the value may be viewed as an instance of `ty`
    #[must_use]
    pub fn is_instance_of(&self, ty: &TypeRef) -> bool {
        let name = ty.full_name();
        if name == crate::metadata::typesystem::SYSTEM_OBJECT {
            return !matches!(self, EmValue::Void);
        }
        match self {
            EmValue::Null => !ty.is_value_type(),
            EmValue::Str(_) => ty.is_string(),
            EmValue::Array(_) => ty.is_array(),
            EmValue::Object(type_name) => type_name == name,
            EmValue::Boxed(inner) => inner.is_instance_of(ty),
            EmValue::I32(_) => name == SYSTEM_INT32 || name == SYSTEM_BOOLEAN,
            EmValue::Bool(_) => name == SYSTEM_BOOLEAN,
            EmValue::I64(_) => name == SYSTEM_INT64,
            EmValue::F64(_) => name == SYSTEM_DOUBLE,
            EmValue::Void => false,
        }
    }

    pub(crate) fn mismatch(&self, expected: &'static str) -> EmulationError {
        EmulationError::TypeMismatch {
            expected,
            found: self.kind().to_string(),
        }
    }
}

impl fmt::Display for EmValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmValue::Void => write!(f, "void"),
            EmValue::I32(v) => write!(f, "{v}"),
            EmValue::I64(v) => write!(f, "{v}L"),
            EmValue::F64(v) => write!(f, "{v}"),
            EmValue::Bool(v) => write!(f, "{v}"),
            EmValue::Str(s) => write!(f, "{s:?}"),
            EmValue::Null => write!(f, "null"),
            EmValue::Boxed(inner) => write!(f, "box({inner})"),
            EmValue::Array(array) => {
                let elements: Vec<String> =
                    array.borrow().iter().map(ToString::to_string).collect();
                write!(f, "[{}]", elements.join(", "))
            }
            EmValue::Object(name) => write!(f, "object({name})"),
        }
    }
}

impl From<i32> for EmValue {
    fn from(value: i32) -> Self {
        EmValue::I32(value)
    }
}

impl From<i64> for EmValue {
    fn from(value: i64) -> Self {
        EmValue::I64(value)
    }
}

impl From<f64> for EmValue {
    fn from(value: f64) -> Self {
        EmValue::F64(value)
    }
}

impl From<bool> for EmValue {
    fn from(value: bool) -> Self {
        EmValue::Bool(value)
    }
}

impl From<&str> for EmValue {
    fn from(value: &str) -> Self {
        EmValue::Str(value.to_string())
    }
}

impl From<String> for EmValue {
    fn from(value: String) -> Self {
        EmValue::Str(value)
    }
}
