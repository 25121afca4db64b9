//! The set of host capabilities scripts may call.
//!
//! A host fills a [`RegistryBuilder`] with types and functions and freezes it into a
//! [`Registry`]. The compiler resolves calls against the registry, and the VM binds a
//! unit's imports to the registry's implementations before it runs.
//!
//! Names are either plain (`sqrt`) for free functions, or qualified (`System.Argc`) for
//! the functions of a host type. A host type is only a namespace, scripts cannot create
//! values of it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::core::{Intrinsic, Signature, TypeId, Value};

pub mod system;

/// the native side of a host function. Arguments have already been checked against the
/// signature, an `Err` becomes a runtime fault of the script
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync;

#[derive(Clone)]
pub struct HostFunction {
    signature: Signature,
    implementation: Arc<NativeFn>,
}

impl HostFunction {
    pub fn new<F>(signature: Signature, implementation: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            signature,
            implementation: Arc::new(implementation),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, String> {
        (self.implementation)(args)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// what a name is registered as
#[derive(Debug, Clone)]
pub enum Capability {
    Type,
    Function(HostFunction),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("'{0}' is already registered")]
    DuplicateName(String),

    #[error("'{0}' is built into the language and cannot be registered")]
    ReservedName(String),

    #[error("'{0}' is not a valid binding name")]
    InvalidName(String),

    #[error("'{name}' belongs to type '{type_name}', which is not registered")]
    UnknownType { type_name: String, name: String },

    #[error("invalid signature for '{name}': {reason}")]
    InvalidSignature { name: String, reason: String },
}

#[derive(Debug, Clone, Default)]
struct HostType {
    functions: BTreeMap<String, HostFunction>,
}

#[derive(Debug, Clone, Default)]
struct Bindings {
    types: BTreeMap<String, HostType>,
    functions: BTreeMap<String, HostFunction>,
}

/// collects the bindings of a registry. It's consumed by [`RegistryBuilder::build`], so
/// a registry never changes once a script was compiled against it
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    bindings: Bindings,
}

/// the frozen set of host bindings
#[derive(Debug, Clone, Default)]
pub struct Registry {
    bindings: Bindings,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn is_builtin_type(name: &str) -> bool {
    TypeId::from_simple_name(name).is_some() || matches!(name, "Array" | "State" | "Void")
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// registers a capability under a plain or qualified name
    pub fn register(
        &mut self,
        name: &str,
        capability: Capability,
    ) -> Result<&mut Self, RegistryError> {
        let qualified = match name.split_once('.') {
            None if is_identifier(name) => None,
            Some((type_name, function)) if is_identifier(type_name) && is_identifier(function) => {
                Some((type_name, function))
            }
            _ => return Err(RegistryError::InvalidName(name.into())),
        };

        match (qualified, capability) {
            (None, Capability::Type) => {
                self.check_free_name(name)?;
                self.bindings.types.insert(name.into(), HostType::default());
                debug!(name, "registered host type");
            }
            (None, Capability::Function(function)) => {
                self.check_free_name(name)?;
                check_signature(name, function.signature())?;
                self.bindings.functions.insert(name.into(), function);
                debug!(name, "registered host function");
            }
            (Some(_), Capability::Type) => return Err(RegistryError::InvalidName(name.into())),
            (Some((type_name, function_name)), Capability::Function(function)) => {
                check_signature(name, function.signature())?;
                let host_type = self.bindings.types.get_mut(type_name).ok_or_else(|| {
                    RegistryError::UnknownType {
                        type_name: type_name.into(),
                        name: name.into(),
                    }
                })?;
                if host_type.functions.contains_key(function_name) {
                    return Err(RegistryError::DuplicateName(name.into()));
                }
                host_type.functions.insert(function_name.into(), function);
                debug!(name, "registered host type function");
            }
        }
        Ok(self)
    }

    /// shorthand for registering [`Capability::Type`]
    pub fn register_type(&mut self, name: &str) -> Result<&mut Self, RegistryError> {
        self.register(name, Capability::Type)
    }

    /// shorthand for registering a function from a closure
    pub fn register_function<F>(
        &mut self,
        name: &str,
        params: Vec<TypeId>,
        result: TypeId,
        implementation: F,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.register(
            name,
            Capability::Function(HostFunction::new(
                Signature::new(params, result),
                implementation,
            )),
        )
    }

    /// registers `type_name.function`, the type must have been registered before
    pub fn register_type_function<F>(
        &mut self,
        type_name: &str,
        function: &str,
        params: Vec<TypeId>,
        result: TypeId,
        implementation: F,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.register_function(&format!("{type_name}.{function}"), params, result, implementation)
    }

    pub fn build(self) -> Registry {
        Registry {
            bindings: self.bindings,
        }
    }

    fn check_free_name(&self, name: &str) -> Result<(), RegistryError> {
        if Intrinsic::from_function_name(name).is_some() || is_builtin_type(name) {
            return Err(RegistryError::ReservedName(name.into()));
        }
        if self.bindings.types.contains_key(name) || self.bindings.functions.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.into()));
        }
        Ok(())
    }
}

fn check_signature(name: &str, signature: &Signature) -> Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidSignature {
        name: name.into(),
        reason: reason.into(),
    };
    if signature.params.iter().any(|p| *p == TypeId::Void) {
        return Err(invalid("parameters cannot be Void"));
    }
    if signature.arity() > usize::from(u8::MAX) {
        return Err(invalid("too many parameters"));
    }
    for ty in signature.params.iter().chain([&signature.result]) {
        if let TypeId::State(inner) = ty {
            if !inner.is_storable() {
                return Err(invalid("State can only hold Bool, integers, Float64 and String"));
            }
        }
    }
    Ok(())
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.bindings.types.contains_key(name)
    }

    /// looks up a free function
    pub fn function(&self, name: &str) -> Option<&HostFunction> {
        self.bindings.functions.get(name)
    }

    /// looks up a function of a host type
    pub fn type_function(&self, type_name: &str, name: &str) -> Option<&HostFunction> {
        self.bindings.types.get(type_name)?.functions.get(name)
    }

    /// looks up a function by plain or qualified name
    pub fn resolve(&self, name: &str) -> Option<&HostFunction> {
        match name.split_once('.') {
            Some((type_name, function)) => self.type_function(type_name, function),
            None => self.function(name),
        }
    }

    /// all registered names, types first, each in lexical order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = vec![];
        for (type_name, host_type) in &self.bindings.types {
            names.push(type_name.clone());
            names.extend(
                host_type
                    .functions
                    .keys()
                    .map(|f| format!("{type_name}.{f}")),
            );
        }
        names.extend(self.bindings.functions.keys().cloned());
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &[Value]) -> Result<Value, String> {
        Ok(Value::Void)
    }

    #[test]
    fn test_register_and_resolve() {
        let mut builder = Registry::builder();
        builder
            .register_type("Math")
            .unwrap()
            .register_function("Math.abs", vec![TypeId::Int32], TypeId::Int32, |args| {
                match args {
                    [Value::Int32(i)] => Ok(Value::Int32(i.abs())),
                    _ => Err("bad arguments".into()),
                }
            })
            .unwrap()
            .register_function("beep", vec![], TypeId::Void, noop)
            .unwrap();
        let registry = builder.build();

        assert!(registry.has_type("Math"));
        let abs = registry.resolve("Math.abs").unwrap();
        assert_eq!(abs.call(&[Value::Int32(-4)]), Ok(Value::Int32(4)));
        assert!(registry.resolve("beep").is_some());
        assert!(registry.resolve("Math.floor").is_none());
        assert_eq!(registry.names(), vec!["Math", "Math.abs", "beep"]);
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut builder = Registry::builder();
        builder.register_type("System").unwrap();
        assert_eq!(
            builder.register_type("System").unwrap_err(),
            RegistryError::DuplicateName("System".into())
        );
        assert_eq!(
            builder
                .register_function("System", vec![], TypeId::Void, noop)
                .unwrap_err(),
            RegistryError::DuplicateName("System".into())
        );
    }

    #[test]
    fn test_reserved_and_invalid_names() {
        let mut builder = Registry::builder();
        assert_eq!(
            builder
                .register_function("printLn", vec![], TypeId::Void, noop)
                .unwrap_err(),
            RegistryError::ReservedName("printLn".into())
        );
        assert!(matches!(
            builder.register_type("Int32"),
            Err(RegistryError::ReservedName(_))
        ));
        for name in ["", "1abc", "a.b.c", "a-b", "Sys."] {
            assert!(
                matches!(builder.register_type(name), Err(RegistryError::InvalidName(_))),
                "{name} should be invalid"
            );
        }
        assert!(matches!(
            builder.register_function("Nope.f", vec![], TypeId::Void, noop),
            Err(RegistryError::UnknownType { .. })
        ));
    }

    #[test]
    fn test_void_parameter_rejected() {
        let mut builder = Registry::builder();
        assert!(matches!(
            builder.register_function("f", vec![TypeId::Void], TypeId::Void, noop),
            Err(RegistryError::InvalidSignature { .. })
        ));
    }
}
