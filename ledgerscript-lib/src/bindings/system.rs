//! The `System` host type, which gives scripts access to their command line arguments.
//!
//! `System.Argc()` returns the number of arguments, `System.Argv(i)` the argument at
//! index `i`. The host decides what the list contains, the `ledger` binary passes the
//! script path followed by everything after `--`.

use std::sync::Arc;

use super::{RegistryBuilder, RegistryError};
use crate::core::{TypeId, Value};

pub const TYPE_NAME: &str = "System";

pub fn register(builder: &mut RegistryBuilder, args: Vec<String>) -> Result<(), RegistryError> {
    let args: Arc<[String]> = Arc::from(args);
    let argc_args = Arc::clone(&args);

    builder.register_type(TYPE_NAME)?;
    builder.register_type_function(TYPE_NAME, "Argc", vec![], TypeId::Int32, move |_| {
        i32::try_from(argc_args.len())
            .map(Value::Int32)
            .map_err(|_| "too many arguments".to_owned())
    })?;
    builder.register_type_function(
        TYPE_NAME,
        "Argv",
        vec![TypeId::Int32],
        TypeId::String,
        move |params| {
            let index = match params {
                [Value::Int32(index)] => *index,
                _ => return Err("System.Argv expects one Int32".to_owned()),
            };
            usize::try_from(index)
                .ok()
                .and_then(|i| args.get(i))
                .map(|arg| Value::from(arg.as_str()))
                .ok_or_else(|| {
                    format!(
                        "argument index {index} is out of range, there are {} arguments",
                        args.len()
                    )
                })
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::Registry;

    fn registry(args: &[&str]) -> Registry {
        let mut builder = Registry::builder();
        register(&mut builder, args.iter().map(|a| a.to_string()).collect()).unwrap();
        builder.build()
    }

    #[test]
    fn test_argc_and_argv() {
        let registry = registry(&["script.lgs", "a", "b"]);
        let argc = registry.resolve("System.Argc").unwrap();
        assert_eq!(argc.call(&[]), Ok(Value::Int32(3)));
        let argv = registry.resolve("System.Argv").unwrap();
        assert_eq!(argv.call(&[Value::Int32(2)]), Ok(Value::from("b")));
    }

    #[test]
    fn test_argv_out_of_range() {
        let registry = registry(&["script.lgs"]);
        let argv = registry.resolve("System.Argv").unwrap();
        assert!(argv.call(&[Value::Int32(1)]).is_err());
        assert!(argv.call(&[Value::Int32(-1)]).is_err());
    }

    #[test]
    fn test_registering_twice_fails() {
        let mut builder = Registry::builder();
        register(&mut builder, vec![]).unwrap();
        assert_eq!(
            register(&mut builder, vec![]).unwrap_err(),
            RegistryError::DuplicateName(TYPE_NAME.into())
        );
    }
}
