//! Host implementations of methods the module only references.
//!
//! A woven body routinely calls into the core library (string concatenation and formatting,
//! the `System.Object` constructor). Those methods have no body in the module, so the
//! interpreter looks them up here by their qualified name and parameter type names.

use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    emulation::{EmValue, EmulationError},
    metadata::{
        method::MethodRef,
        typesystem::{SYSTEM_OBJECT, SYSTEM_STRING},
    },
};

/// A host implementation; receives the receiver first for instance methods
pub type NativeFn = Arc<dyn Fn(&[EmValue]) -> Result<EmValue, EmulationError> + Send + Sync>;

/// Host implementations keyed by method signature.
#[derive(Clone)]
pub struct NativeRegistry {
    natives: HashMap<String, NativeFn>,
}

impl Default for NativeRegistry {
    /// A registry with the core library methods woven code commonly calls
    fn default() -> Self {
        let mut registry = NativeRegistry::empty();

        let concat = native(|args| {
            Ok(EmValue::Str(
                args.iter().map(EmValue::to_clr_string).collect(),
            ))
        });
        for params in [
            &[SYSTEM_STRING, SYSTEM_STRING][..],
            &[SYSTEM_STRING, SYSTEM_STRING, SYSTEM_STRING],
            &[SYSTEM_STRING, SYSTEM_STRING, SYSTEM_STRING, SYSTEM_STRING],
            &[SYSTEM_OBJECT, SYSTEM_OBJECT],
            &[SYSTEM_OBJECT, SYSTEM_OBJECT, SYSTEM_OBJECT],
        ] {
            registry.register(SYSTEM_STRING, "Concat", params, concat.clone());
        }
        let concat_array = native(|args| {
            let elements = single(args, "System.String::Concat")?.as_array()?.borrow().clone();
            Ok(EmValue::Str(
                elements.iter().map(EmValue::to_clr_string).collect(),
            ))
        });
        registry.register(SYSTEM_STRING, "Concat", &["System.String[]"], concat_array.clone());
        registry.register(SYSTEM_STRING, "Concat", &["System.Object[]"], concat_array);

        let format_items = native(|args| match args.split_first() {
            Some((template, values)) => format(&template.to_clr_string(), values),
            None => Err(native_error("System.String::Format", "missing format string")),
        });
        for params in [
            &[SYSTEM_STRING, SYSTEM_OBJECT][..],
            &[SYSTEM_STRING, SYSTEM_OBJECT, SYSTEM_OBJECT],
            &[SYSTEM_STRING, SYSTEM_OBJECT, SYSTEM_OBJECT, SYSTEM_OBJECT],
        ] {
            registry.register(SYSTEM_STRING, "Format", params, format_items.clone());
        }
        registry.register(
            SYSTEM_STRING,
            "Format",
            &[SYSTEM_STRING, "System.Object[]"],
            native(|args| match args {
                [template, values] => {
                    let values = values.as_array()?.borrow().clone();
                    format(&template.to_clr_string(), &values)
                }
                _ => Err(native_error("System.String::Format", "expected two arguments")),
            }),
        );

        registry.register(SYSTEM_STRING, "get_Length", &[], native(|args| {
            match single(args, "System.String::get_Length")? {
                EmValue::Str(s) => Ok(EmValue::I32(
                    i32::try_from(s.encode_utf16().count()).unwrap_or(i32::MAX),
                )),
                EmValue::Null => Err(EmulationError::NullReference),
                other => Err(other.mismatch("string")),
            }
        }));
        registry.register(SYSTEM_OBJECT, ".ctor", &[], native(|_| Ok(EmValue::Void)));
        registry.register(SYSTEM_OBJECT, "ToString", &[], native(|args| {
            match single(args, "System.Object::ToString")? {
                EmValue::Null => Err(EmulationError::NullReference),
                value => Ok(EmValue::Str(value.to_clr_string())),
            }
        }));

        registry
    }
}

impl NativeRegistry {
    /// A registry without any natives
    #[must_use]
    pub fn empty() -> Self {
        NativeRegistry {
            natives: HashMap::new(),
        }
    }

    /// Registers `native` for `declaring_type::name(params)`, replacing any previous one
    pub fn register(&mut self, declaring_type: &str, name: &str, params: &[&str], native: NativeFn) {
        self.natives
            .insert(key(declaring_type, name, params.iter().copied()), native);
    }

    /// The native implementing `method`, if registered
    #[must_use]
    pub fn get(&self, method: &MethodRef) -> Option<&NativeFn> {
        self.natives.get(&key(
            method.declaring_type.full_name(),
            &method.name,
            method.parameters.iter().map(|param| param.full_name()),
        ))
    }

    /// Number of registered natives
    #[must_use]
    pub fn len(&self) -> usize {
        self.natives.len()
    }

    /// Returns true if nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.natives.is_empty()
    }
}

impl fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.natives.keys().collect();
        keys.sort();
        f.debug_struct("NativeRegistry").field("natives", &keys).finish()
    }
}

/// Wraps a closure into a [`NativeFn`]
pub fn native<F>(f: F) -> NativeFn
where
    F: Fn(&[EmValue]) -> Result<EmValue, EmulationError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn key<'a>(declaring_type: &str, name: &str, params: impl Iterator<Item = &'a str>) -> String {
    let params: Vec<&str> = params.collect();
    format!("{}::{}({})", declaring_type, name, params.join(","))
}

fn native_error(method: &str, message: &str) -> EmulationError {
    EmulationError::Native {
        method: method.to_string(),
        message: message.to_string(),
    }
}

fn single<'a>(args: &'a [EmValue], method: &str) -> Result<&'a EmValue, EmulationError> {
    match args {
        [value] => Ok(value),
        _ => Err(native_error(method, "expected one argument")),
    }
}

/// Composite formatting with `{index}` placeholders and `{{` / `}}` escapes.
///
/// Alignment and format specifiers after the index are accepted and ignored.
fn format(template: &str, values: &[EmValue]) -> Result<EmValue, EmulationError> {
    const METHOD: &str = "System.String::Format";

    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut item = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => item.push(c),
                        None => return Err(native_error(METHOD, "unterminated format item")),
                    }
                }
                let index = item
                    .split([',', ':'])
                    .next()
                    .and_then(|index| index.trim().parse::<usize>().ok())
                    .ok_or_else(|| native_error(METHOD, &format!("invalid format item {{{item}}}")))?;
                let value = values.get(index).ok_or_else(|| {
                    native_error(METHOD, &format!("format item {{{index}}} has no argument"))
                })?;
                out.push_str(&value.to_clr_string());
            }
            '}' => return Err(native_error(METHOD, "unbalanced '}'")),
            c => out.push(c),
        }
    }
    Ok(EmValue::Str(out))
}
