//! Executes compiled units.
//!
//! A [`Vm`] borrows the registry a unit was compiled against. Each call of
//! [`Vm::execute`] binds the unit's imports, runs one function to completion and reports
//! the outcome as an [`ExecutionResult`]. Faults never escape as panics or errors, they
//! end up in the result.

use std::result::Result as StdResult;
use thiserror::Error;
use tracing::{debug, trace};

use crate::bindings::{HostFunction, Registry};
use crate::core::*;
use crate::state::StateObserver;

pub mod built_ins;
pub mod stack;

use stack::{Frame, Stack};

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Runtime(String),

    #[error("integer overflow in '{0}'")]
    Overflow(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("index {index} is out of bounds for an array of length {len}")]
    IndexOutOfBounds { index: i32, len: usize },

    #[error("array length must not be negative, got {0}")]
    NegativeLength(i32),

    #[error("array length {len} exceeds the limit of {limit}")]
    ArrayTooLong { len: usize, limit: usize },

    #[error("type confusion, expected {expected} but found {found}")]
    TypeConfusion {
        expected: &'static str,
        found: &'static str,
    },

    #[error("the operand stack was empty unexpectedly")]
    StackEmpty,

    #[error("maximum call depth of {0} exceeded")]
    CallDepthExceeded(usize),

    #[error("cannot convert '{value}' to {target}")]
    Conversion { value: String, target: &'static str },

    #[error("panic: {0}")]
    Panic(String),

    #[error("assertion failed{}", message_suffix(.0))]
    AssertionFailed(Option<String>),

    #[error("host function '{name}' failed: {message}")]
    HostFunction { name: String, message: String },

    #[error("host function '{name}' returned {found}, but is declared to return {expected}")]
    HostReturnType {
        name: String,
        expected: TypeId,
        found: &'static str,
    },

    #[error("state '{0}' has no value")]
    MissingState(String),

    #[error("state '{key}' could not be read")]
    StateRead { key: String },

    #[error("state '{key}' could not be written")]
    StateWrite { key: String },

    #[error("state '{key}': {source}")]
    StateCodec {
        key: String,
        #[source]
        source: StateCodecError,
    },

    #[error("the step of a for loop must not be zero")]
    ZeroStep,
}

pub type Result<T> = StdResult<T, Error>;

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_ref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

macro_rules! rt_err{
    ($msg:literal $(, $args:expr)*) => { Error::Runtime(format!($msg $(, $args)*)) };
}
pub(crate) use rt_err;

macro_rules! rt_assert{
    ($cond:expr, $msg:literal $(, $args:expr)*) => {
        if ! $cond { return Err(rt_err!($msg $(, $args)*)); }
    };
}

macro_rules! bail{
    ($($err:tt)*) => {
        return Err(Error::$($err)*)
    };
}

/// unwraps a value of the given variant or fails with a type confusion
macro_rules! expect_value {
    ($value:expr, $variant:ident) => {
        match $value {
            Value::$variant(inner) => Ok(inner),
            other => Err(Error::TypeConfusion {
                expected: stringify!($variant),
                found: other.type_name(),
            }),
        }
    };
}
pub(crate) use expect_value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// the maximum number of nested script function calls, the entry function included
    pub max_call_depth: usize,
    /// the maximum number of elements of an array created or grown by a script
    pub max_array_len: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
            max_array_len: 1 << 20,
        }
    }
}

/// the outcome of one [`Vm::execute`] call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionResult {
    pub success: bool,
    /// empty on success, otherwise `line L: message` for runtime faults
    pub error: String,
    /// everything the script printed, also when it failed
    pub console: String,
    /// the return value of the entry function, `Absent` if it has none or the call failed
    pub output: OutputValue,
}

impl ExecutionResult {
    fn failure(error: impl Into<String>, console: String) -> Self {
        Self {
            success: false,
            error: error.into(),
            console,
            output: OutputValue::Absent,
        }
    }
}

pub struct Vm<'r> {
    registry: &'r Registry,
    config: VmConfig,
}

/// a runtime fault together with the line of the opcode that raised it
struct Fault {
    line: u32,
    error: Error,
}

enum Flow {
    Continue,
    Finished(Value),
}

/// the state of a single execution
struct Machine<'u, 'r, 'o> {
    unit: &'u CompiledUnit,
    imports: Vec<&'r HostFunction>,
    observer: &'o mut dyn StateObserver,
    config: &'u VmConfig,
    stack: Stack,
    frames: Vec<Frame>,
    console: String,
}

impl<'r> Vm<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self::with_config(registry, VmConfig::default())
    }

    pub fn with_config(registry: &'r Registry, config: VmConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Runs the function `function` of the unit. It must not take parameters.
    ///
    /// State writes the script made before a fault stay in the observer.
    pub fn execute(
        &self,
        unit: &CompiledUnit,
        function: &str,
        observer: &mut dyn StateObserver,
    ) -> ExecutionResult {
        let Some((index, code)) = unit.function(function) else {
            return ExecutionResult::failure(format!("function '{function}' not found"), String::new());
        };
        if code.signature.arity() != 0 {
            return ExecutionResult::failure(
                format!(
                    "function '{function}' takes {} parameter(s) and cannot be used as an entry point",
                    code.signature.arity()
                ),
                String::new(),
            );
        }
        let imports = match self.bind_imports(unit) {
            Ok(imports) => imports,
            Err(message) => return ExecutionResult::failure(message, String::new()),
        };

        debug!(function, "executing");
        let mut machine = Machine {
            unit,
            imports,
            observer,
            config: &self.config,
            stack: Stack::default(),
            frames: vec![],
            console: String::new(),
        };
        let outcome = machine.run(index);
        let console = machine.console;
        match outcome {
            Ok(value) => ExecutionResult {
                success: true,
                error: String::new(),
                console,
                output: value.to_output(),
            },
            Err(Fault { line, error }) => {
                debug!(function, line, %error, "execution failed");
                ExecutionResult::failure(format!("line {line}: {error}"), console)
            }
        }
    }

    /// looks up every import of the unit in the registry
    fn bind_imports(&self, unit: &CompiledUnit) -> StdResult<Vec<&'r HostFunction>, String> {
        unit.imports
            .iter()
            .map(|import| {
                let function = self
                    .registry
                    .resolve(&import.name)
                    .ok_or_else(|| format!("host function '{}' is not registered", import.name))?;
                if *function.signature() != import.signature {
                    return Err(format!(
                        "host function '{}' is registered as {}, but the unit expects {}",
                        import.name,
                        function.signature(),
                        import.signature
                    ));
                }
                Ok(function)
            })
            .collect()
    }
}

impl<'u, 'r, 'o> Machine<'u, 'r, 'o> {
    fn run(&mut self, entry: usize) -> StdResult<Value, Fault> {
        self.enter(entry, 0).map_err(|error| Fault { line: 0, error })?;
        let unit = self.unit;
        loop {
            let Some(&frame) = self.frames.last() else {
                return Err(Fault {
                    line: 0,
                    error: rt_err!("no active frame"),
                });
            };
            let function = &unit.functions[frame.function];
            let pc = frame.pc;
            let line = function.line_of(pc);
            let Some(op) = function.code.get(pc) else {
                return Err(Fault {
                    line,
                    error: rt_err!("execution ran past the end of '{}'", function.name),
                });
            };
            match self.step(op, frame.base) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Finished(value)) => return Ok(value),
                Err(error) => return Err(Fault { line, error }),
            }
        }
    }

    /// pushes a frame for the function. Its arguments are the topmost `argc` values
    fn enter(&mut self, function: usize, argc: usize) -> Result<()> {
        if self.frames.len() >= self.config.max_call_depth {
            bail!(CallDepthExceeded(self.config.max_call_depth));
        }
        let code = self
            .unit
            .functions
            .get(function)
            .ok_or_else(|| rt_err!("there is no function {}", function))?;
        let base = self
            .stack
            .len()
            .checked_sub(argc)
            .ok_or(Error::StackEmpty)?;
        rt_assert!(
            usize::from(code.locals) >= argc,
            "'{}' has fewer locals than arguments",
            code.name
        );
        self.stack.resize(base + usize::from(code.locals), Value::Void);
        self.frames.push(Frame {
            function,
            pc: 0,
            base,
        });
        Ok(())
    }

    fn frame_mut(&mut self) -> Result<&mut Frame> {
        self.frames.last_mut().ok_or_else(|| rt_err!("no active frame"))
    }

    fn jump(&mut self, target: u32) -> Result<()> {
        self.frame_mut()?.pc = target as usize;
        Ok(())
    }

    /// leaves the current frame. Returns the value if it was the outermost one
    fn leave(&mut self, value: Value) -> Result<Flow> {
        let frame = self.frames.pop().ok_or_else(|| rt_err!("no active frame"))?;
        self.stack.truncate(frame.base);
        if self.frames.is_empty() {
            return Ok(Flow::Finished(value));
        }
        if !matches!(value, Value::Void) {
            self.stack.push(value);
        }
        Ok(Flow::Continue)
    }

    fn local_int(&self, base: usize, slot: u16) -> Result<i64> {
        match self.stack.local(base + usize::from(slot))? {
            Value::Int32(i) => Ok(i64::from(*i)),
            Value::Int64(i) => Ok(*i),
            other => Err(Error::TypeConfusion {
                expected: "an integer",
                found: other.type_name(),
            }),
        }
    }

    fn call_host(&mut self, index: u16) -> Result<()> {
        let import = self
            .unit
            .imports
            .get(usize::from(index))
            .ok_or_else(|| rt_err!("there is no import {}", index))?;
        let function = self
            .imports
            .get(usize::from(index))
            .copied()
            .ok_or_else(|| rt_err!("import {} is not bound", index))?;
        let args = self.stack.pop_n(import.signature.arity())?;
        trace!(name = %import.name, ?args, "calling host function");
        let value = function.call(&args).map_err(|message| Error::HostFunction {
            name: import.name.clone(),
            message,
        })?;
        if !value.matches(&import.signature.result) {
            bail!(HostReturnType {
                name: import.name.clone(),
                expected: import.signature.result.clone(),
                found: value.type_name(),
            });
        }
        if !matches!(value, Value::Void) {
            self.stack.push(value);
        }
        Ok(())
    }

    fn step(&mut self, op: &OpCode, base: usize) -> Result<Flow> {
        self.frame_mut()?.pc += 1;
        match op {
            OpCode::PushConst(index) => {
                let value = match self.unit.constants.get(*index as usize) {
                    Some(Constant::Bool(b)) => Value::Bool(*b),
                    Some(Constant::Int32(i)) => Value::Int32(*i),
                    Some(Constant::Int64(i)) => Value::Int64(*i),
                    Some(Constant::Float64(f)) => Value::Float64(*f),
                    Some(Constant::String(s)) => Value::from(s.as_str()),
                    None => bail!(Runtime(format!("there is no constant {index}"))),
                };
                self.stack.push(value);
            }
            OpCode::LoadLocal(slot) => {
                let value = self.stack.local(base + usize::from(*slot))?.clone();
                self.stack.push(value);
            }
            OpCode::StoreLocal(slot) => {
                let value = self.stack.pop_value()?;
                self.stack.set_local(base + usize::from(*slot), value)?;
            }
            OpCode::Pop => {
                self.stack.pop_value()?;
            }
            OpCode::Dup2 => {
                rt_assert!(self.stack.len() >= 2, "Dup2 needs two values");
                let len = self.stack.len();
                let (a, b) = (self.stack[len - 2].clone(), self.stack[len - 1].clone());
                self.stack.push(a);
                self.stack.push(b);
            }
            OpCode::MakeArray(count) => {
                let values = self.stack.pop_n(*count as usize)?;
                self.stack.push(Value::array(values));
            }
            OpCode::NewArray(element) => {
                let len = self.stack.pop_int32()?;
                let len = usize::try_from(len).map_err(|_| Error::NegativeLength(len))?;
                if len > self.config.max_array_len {
                    bail!(ArrayTooLong {
                        len,
                        limit: self.config.max_array_len,
                    });
                }
                let values = (0..len)
                    .map(|_| Value::default_for(element))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| rt_err!("{} has no default value", element))?;
                self.stack.push(Value::array(values));
            }
            OpCode::NewState(ty) => {
                let key = self.stack.pop_string()?;
                self.stack.push(Value::state(&*key, ty.clone()));
            }
            OpCode::LoadIndex => {
                let index = self.stack.pop_int32()?;
                let array = self.stack.pop_array()?;
                let array = array.borrow();
                let value = usize::try_from(index)
                    .ok()
                    .and_then(|i| array.get(i))
                    .cloned()
                    .ok_or(Error::IndexOutOfBounds {
                        index,
                        len: array.len(),
                    })?;
                drop(array);
                self.stack.push(value);
            }
            OpCode::StoreIndex => {
                let value = self.stack.pop_value()?;
                let index = self.stack.pop_int32()?;
                let array = self.stack.pop_array()?;
                let mut array = array.borrow_mut();
                let len = array.len();
                let slot = usize::try_from(index)
                    .ok()
                    .and_then(|i| array.get_mut(i))
                    .ok_or(Error::IndexOutOfBounds { index, len })?;
                *slot = value;
            }
            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Rem
            | OpCode::Eq
            | OpCode::Ne
            | OpCode::Lt
            | OpCode::Le
            | OpCode::Gt
            | OpCode::Ge => {
                let rhs = self.stack.pop_value()?;
                let lhs = self.stack.pop_value()?;
                self.stack.push(built_ins::binary(op, lhs, rhs)?);
            }
            OpCode::Neg => {
                let value = self.stack.pop_value()?;
                self.stack.push(built_ins::negate(value)?);
            }
            OpCode::Not => {
                let value = self.stack.pop_bool()?;
                self.stack.push(Value::Bool(!value));
            }
            OpCode::Jump(target) => self.jump(*target)?,
            OpCode::JumpIfFalse(target) => {
                if !self.stack.pop_bool()? {
                    self.jump(*target)?;
                }
            }
            OpCode::RangeTest { var, limit, step } => {
                let (var, limit, step) = (
                    self.local_int(base, *var)?,
                    self.local_int(base, *limit)?,
                    self.local_int(base, *step)?,
                );
                let inside = match step {
                    0 => bail!(ZeroStep),
                    s if s > 0 => var < limit,
                    _ => var > limit,
                };
                self.stack.push(Value::Bool(inside));
            }
            OpCode::Call(function) => {
                let function = usize::from(*function);
                let argc = self
                    .unit
                    .functions
                    .get(function)
                    .map(|f| f.signature.arity())
                    .ok_or_else(|| rt_err!("there is no function {}", function))?;
                self.enter(function, argc)?;
            }
            OpCode::CallHost(index) => self.call_host(*index)?,
            OpCode::CallIntrinsic { intrinsic, argc } => {
                let args = self.stack.pop_n(usize::from(*argc))?;
                let result = built_ins::call_intrinsic(
                    *intrinsic,
                    args,
                    &mut self.console,
                    &mut *self.observer,
                    self.config,
                )?;
                if let Some(value) = result {
                    self.stack.push(value);
                }
            }
            OpCode::Return => {
                let value = self.stack.pop_value()?;
                return self.leave(value);
            }
            OpCode::ReturnVoid => return self.leave(Value::Void),
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::system;
    use crate::compiler;
    use crate::state::MemoryStateStore;
    use indoc::indoc;

    fn registry() -> Registry {
        let mut builder = Registry::builder();
        system::register(&mut builder, vec!["a".into(), "b".into()]).unwrap();
        builder.build()
    }

    fn run(src: &str) -> ExecutionResult {
        let registry = registry();
        let unit = compiler::compile(&registry, src).unwrap();
        Vm::new(&registry).execute(&unit, "main", &mut MemoryStateStore::new())
    }

    #[test]
    fn test_return_value_becomes_output() {
        let result = run("function main() : Int32 return System.Argc(); endfunction");
        assert!(result.success, "{}", result.error);
        assert_eq!(result.output, OutputValue::Integer(2));
        assert_eq!(result.error, "");
    }

    #[test]
    fn test_unknown_function() {
        let registry = registry();
        let unit = compiler::compile(&registry, "function main() endfunction").unwrap();
        let mut store = MemoryStateStore::new();
        let result = Vm::new(&registry).execute(&unit, "nope", &mut store);
        assert!(!result.success);
        assert_eq!(result.error, "function 'nope' not found");
        assert!(store.is_empty());
    }

    #[test]
    fn test_entry_with_parameters_rejected() {
        let registry = registry();
        let unit = compiler::compile(&registry, "function f(x : Int32) endfunction").unwrap();
        let result = Vm::new(&registry).execute(&unit, "f", &mut MemoryStateStore::new());
        assert!(!result.success);
    }

    #[test]
    fn test_control_flow_and_recursion() {
        let result = run(indoc! {"
            function fib(n : Int32) : Int32
              if (n < 2)
                return n;
              endif
              return fib(n - 1) + fib(n - 2);
            endfunction

            function main() : Int64
              var total : Int64 = 0;
              for (i in 0 : 10)
                if (i == 3)
                  continue;
                elseif (i == 8)
                  break;
                endif
                total += toInt64(fib(i));
              endfor
              var n = 0;
              while (n < 5)
                n += 1;
              endwhile
              return total + toInt64(n);
            endfunction
        "});
        assert!(result.success, "{}", result.error);
        // fib(0) to fib(7) without fib(3): 0+1+1+3+5+8+13 = 31
        assert_eq!(result.output, OutputValue::Integer(36));
    }

    #[test]
    fn test_negative_step() {
        let result = run(indoc! {"
            function main() : String
              var s = \"\";
              for (i in 5 : 0 : -2)
                s += toString(i);
              endfor
              return s;
            endfunction
        "});
        assert_eq!(result.output, OutputValue::Text("531".into()));
    }

    #[test]
    fn test_short_circuit() {
        let result = run(indoc! {"
            function boom() : Bool
              panic(\"evaluated\");
              return true;
            endfunction
            function main() : Bool
              return false && boom() || true || boom();
            endfunction
        "});
        assert!(result.success, "{}", result.error);
        assert_eq!(result.output, OutputValue::Bool(true));
    }

    #[test]
    fn test_arrays_are_shared() {
        let result = run(indoc! {"
            function fill(values : Array<Int32>)
              values.append(3);
              values[0] += 10;
            endfunction
            function main() : Array<Int32>
              var a = [1, 2];
              fill(a);
              var grid = Array<Array<Int32>>(2);
              grid[0].append(1);
              printLn(grid);
              return a;
            endfunction
        "});
        assert!(result.success, "{}", result.error);
        assert_eq!(result.console, "[[1], []]\n");
        assert_eq!(
            result.output,
            OutputValue::Aggregate(vec![
                OutputValue::Integer(11),
                OutputValue::Integer(2),
                OutputValue::Integer(3)
            ])
        );
    }

    #[test]
    fn test_faults_carry_the_line() {
        let result = run(indoc! {"
            function main() : Int32
              printLn(\"before\");
              var a = [1];
              return a[5];
            endfunction
        "});
        assert!(!result.success);
        assert_eq!(
            result.error,
            "line 4: index 5 is out of bounds for an array of length 1"
        );
        assert_eq!(result.console, "before\n");
        assert_eq!(result.output, OutputValue::Absent);
    }

    #[test]
    fn test_arithmetic_faults() {
        for (src, message) in [
            ("return 2147483647 + 1;", "integer overflow in '+'"),
            ("var z = 0; return 1 / z;", "division by zero"),
            ("return toInt32(\"x\");", "cannot convert 'x' to Int32"),
        ] {
            let result = run(&format!("function main() : Int32\n{src}\nendfunction"));
            assert_eq!(result.error, format!("line 2: {message}"));
        }
    }

    #[test]
    fn test_zero_step() {
        let result = run(indoc! {"
            function main()
              for (i in 0 : 3 : 0)
              endfor
            endfunction
        "});
        assert_eq!(result.error, "line 2: the step of a for loop must not be zero");
    }

    #[test]
    fn test_assert_and_panic() {
        let result = run("function main() assert(1 > 2, \"math\"); endfunction");
        assert_eq!(result.error, "line 1: assertion failed: math");
        let result = run("function main() panic(\"stop\"); endfunction");
        assert_eq!(result.error, "line 1: panic: stop");
    }

    #[test]
    fn test_call_depth() {
        let registry = registry();
        let unit = compiler::compile(
            &registry,
            "function main() : Int32 return main(); endfunction",
        )
        .unwrap();
        let config = VmConfig {
            max_call_depth: 16,
            ..VmConfig::default()
        };
        let vm = Vm::with_config(&registry, config);
        let result = vm.execute(&unit, "main", &mut MemoryStateStore::new());
        assert_eq!(result.error, "line 1: maximum call depth of 16 exceeded");
    }

    #[test]
    fn test_array_length_limit() {
        let result = run(indoc! {"
            function main() : Int32
              var huge = Array<Int32>(2147483647);
              return huge.count();
            endfunction
        "});
        assert!(!result.success);
        assert_eq!(
            result.error,
            "line 2: array length 2147483647 exceeds the limit of 1048576"
        );

        let registry = registry();
        let unit = compiler::compile(
            &registry,
            indoc! {"
                function main()
                  var values = Array<Int32>(3);
                  while (true)
                    values.append(0);
                  endwhile
                endfunction
            "},
        )
        .unwrap();
        let config = VmConfig {
            max_array_len: 5,
            ..VmConfig::default()
        };
        let result = Vm::with_config(&registry, config).execute(&unit, "main", &mut MemoryStateStore::new());
        assert_eq!(result.error, "line 4: array length 6 exceeds the limit of 5");
    }

    #[test]
    fn test_smallest_int32_literal() {
        let result = run("function main() : Int32 return -2147483648; endfunction");
        assert!(result.success, "{}", result.error);
        assert_eq!(result.output, OutputValue::Integer(i64::from(i32::MIN)));
    }

    #[test]
    fn test_host_failure() {
        let result = run("function main() : String return System.Argv(7); endfunction");
        assert!(!result.success);
        assert!(result.error.starts_with("line 1: host function 'System.Argv' failed"));
    }

    #[test]
    fn test_host_return_type_checked() {
        let mut builder = Registry::builder();
        builder
            .register_function("liar", vec![], TypeId::Int32, |_| Ok(Value::from("no")))
            .unwrap();
        let registry = builder.build();
        let unit =
            compiler::compile(&registry, "function main() : Int32 return liar(); endfunction").unwrap();
        let result = Vm::new(&registry).execute(&unit, "main", &mut MemoryStateStore::new());
        assert_eq!(
            result.error,
            "line 1: host function 'liar' returned String, but is declared to return Int32"
        );
    }

    #[test]
    fn test_imports_are_bound_before_running() {
        let unit = compiler::compile(
            &registry(),
            "function main() printLn(\"ran\"); System.Argc(); endfunction",
        )
        .unwrap();
        let empty = Registry::builder().build();
        let result = Vm::new(&empty).execute(&unit, "main", &mut MemoryStateStore::new());
        assert!(!result.success);
        assert_eq!(result.console, "");
        assert_eq!(result.error, "host function 'System.Argc' is not registered");
    }

    #[test]
    fn test_state_access() {
        let registry = registry();
        let unit = compiler::compile(
            &registry,
            indoc! {r#"
                function main() : Int32
                  var runs = State<Int32>("runs");
                  var before = runs.existed();
                  runs.set(runs.get(0) + 1);
                  var name = State<String>("name");
                  name.set("ledger");
                  if (before)
                    return runs.get() * 10;
                  endif
                  return runs.get();
                endfunction
            "#},
        )
        .unwrap();
        let vm = Vm::new(&registry);
        let mut store = MemoryStateStore::new();
        assert_eq!(vm.execute(&unit, "main", &mut store).output, OutputValue::Integer(1));
        assert_eq!(vm.execute(&unit, "main", &mut store).output, OutputValue::Integer(20));
        assert_eq!(store.get("runs"), Some(&[4u8][..]));
    }

    #[test]
    fn test_writes_before_a_fault_stay() {
        let registry = registry();
        let unit = compiler::compile(
            &registry,
            indoc! {r#"
                function main()
                  State<Bool>("written").set(true);
                  var missing = State<Int32>("missing").get();
                endfunction
            "#},
        )
        .unwrap();
        let mut store = MemoryStateStore::new();
        let result = Vm::new(&registry).execute(&unit, "main", &mut store);
        assert_eq!(result.error, "line 3: state 'missing' has no value");
        assert_eq!(store.get("written"), Some(&[1u8][..]));
    }
}
