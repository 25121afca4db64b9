//! The operators and intrinsics the VM implements itself

use tracing::trace;

use crate::state::{StateObserver, Status};
use crate::vm::*;

macro_rules! integer_op {
    ($op:expr, $a:expr, $b:expr, $variant:ident) => {
        match $op {
            OpCode::Add => $a.checked_add($b).map(Value::$variant).ok_or(Error::Overflow("+")),
            OpCode::Sub => $a.checked_sub($b).map(Value::$variant).ok_or(Error::Overflow("-")),
            OpCode::Mul => $a.checked_mul($b).map(Value::$variant).ok_or(Error::Overflow("*")),
            OpCode::Div | OpCode::Rem if $b == 0 => Err(Error::DivisionByZero),
            OpCode::Div => $a.checked_div($b).map(Value::$variant).ok_or(Error::Overflow("/")),
            OpCode::Rem => $a.checked_rem($b).map(Value::$variant).ok_or(Error::Overflow("%")),
            other => compare(other, &$a, &$b).map(Value::Bool),
        }
    };
}

fn compare<T: PartialOrd + ?Sized>(op: &OpCode, a: &T, b: &T) -> Result<bool> {
    Ok(match op {
        OpCode::Eq => a == b,
        OpCode::Ne => a != b,
        OpCode::Lt => a < b,
        OpCode::Le => a <= b,
        OpCode::Gt => a > b,
        OpCode::Ge => a >= b,
        other => return Err(rt_err!("{} is not defined for these operands", other.mnemonic())),
    })
}

/// evaluates a binary operator. Both operands have the same type, the analysis made
/// sure of that
pub fn binary(op: &OpCode, lhs: Value, rhs: Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Int32(a), Value::Int32(b)) => integer_op!(op, a, b, Int32),
        (Value::Int64(a), Value::Int64(b)) => integer_op!(op, a, b, Int64),
        (Value::Float64(a), Value::Float64(b)) => match op {
            OpCode::Add => Ok(Value::Float64(a + b)),
            OpCode::Sub => Ok(Value::Float64(a - b)),
            OpCode::Mul => Ok(Value::Float64(a * b)),
            OpCode::Div => Ok(Value::Float64(a / b)),
            OpCode::Rem => Ok(Value::Float64(a % b)),
            other => compare(other, &a, &b).map(Value::Bool),
        },
        (Value::String(a), Value::String(b)) => match op {
            OpCode::Add => Ok(Value::from(format!("{a}{b}"))),
            other => compare(other, &*a, &*b).map(Value::Bool),
        },
        (Value::Bool(a), Value::Bool(b)) => match op {
            OpCode::Eq | OpCode::Ne => compare(op, &a, &b).map(Value::Bool),
            other => Err(rt_err!("{} is not defined for Bool", other.mnemonic())),
        },
        (a, b) => Err(Error::TypeConfusion {
            expected: a.type_name(),
            found: b.type_name(),
        }),
    }
}

pub fn negate(value: Value) -> Result<Value> {
    match value {
        Value::Int32(i) => i.checked_neg().map(Value::Int32).ok_or(Error::Overflow("-")),
        Value::Int64(i) => i.checked_neg().map(Value::Int64).ok_or(Error::Overflow("-")),
        Value::Float64(f) => Ok(Value::Float64(-f)),
        other => Err(Error::TypeConfusion {
            expected: "a number",
            found: other.type_name(),
        }),
    }
}

fn take_args<const N: usize>(args: Vec<Value>) -> Result<[Value; N]> {
    args.try_into()
        .map_err(|args: Vec<Value>| rt_err!("expected {} arguments, got {}", N, args.len()))
}

fn conversion_error(value: &Value, target: &'static str) -> Error {
    Error::Conversion {
        value: value.to_string(),
        target,
    }
}

fn to_int64(value: &Value) -> Result<i64> {
    match value {
        Value::Int32(i) => Ok(i64::from(*i)),
        Value::Int64(i) => Ok(*i),
        // truncates towards zero, the range check excludes NaN
        Value::Float64(f) if *f > -9.3e18 && *f < 9.3e18 => Ok(*f as i64),
        Value::String(s) => s.trim().parse().map_err(|_| conversion_error(value, "Int64")),
        other => Err(conversion_error(other, "Int64")),
    }
}

fn to_float64(value: &Value) -> Result<f64> {
    match value {
        Value::Int32(i) => Ok(f64::from(*i)),
        Value::Int64(i) => Ok(*i as f64),
        Value::Float64(f) => Ok(*f),
        Value::String(s) => s.trim().parse().map_err(|_| conversion_error(value, "Float64")),
        other => Err(conversion_error(other, "Float64")),
    }
}

/// Reads the value of a state handle. `None` means the key is absent.
///
/// The size of the entry is unknown up front, so the first read has no capacity and
/// only reports the size.
pub fn read_state(observer: &mut dyn StateObserver, handle: &StateRef) -> Result<Option<Value>> {
    let key = handle.key.as_str();
    let mut size = 0;
    let bytes = match observer.read(key, &mut [], &mut size) {
        Status::Ok => vec![],
        Status::BufferTooSmall => {
            let len = usize::try_from(size)
                .map_err(|_| Error::StateRead { key: key.into() })?;
            let mut buffer = vec![0; len];
            let mut capacity = size;
            match observer.read(key, &mut buffer, &mut capacity) {
                Status::Ok if capacity <= size => {
                    buffer.truncate(len.min(capacity as usize));
                    buffer
                }
                _ => return Err(Error::StateRead { key: key.into() }),
            }
        }
        Status::Error if observer.exists(key) == Status::Ok => {
            return Err(Error::StateRead { key: key.into() })
        }
        Status::Error => return Ok(None),
    };
    trace!(key, len = bytes.len(), "read state");
    Value::decode_state(&handle.ty, &bytes)
        .map(Some)
        .map_err(|source| Error::StateCodec {
            key: key.into(),
            source,
        })
}

pub fn write_state(observer: &mut dyn StateObserver, handle: &StateRef, value: &Value) -> Result<()> {
    let bytes = value.encode_state().map_err(|source| Error::StateCodec {
        key: handle.key.clone(),
        source,
    })?;
    trace!(key = %handle.key, len = bytes.len(), "write state");
    match observer.write(&handle.key, &bytes) {
        Status::Ok => Ok(()),
        _ => Err(Error::StateWrite {
            key: handle.key.clone(),
        }),
    }
}

/// executes an intrinsic, returns its result or `None` for intrinsics without one
pub fn call_intrinsic(
    intrinsic: Intrinsic,
    args: Vec<Value>,
    console: &mut String,
    observer: &mut dyn StateObserver,
    config: &VmConfig,
) -> Result<Option<Value>> {
    Ok(match intrinsic {
        Intrinsic::Print | Intrinsic::PrintLn => {
            let [value] = take_args(args)?;
            console.push_str(&value.to_string());
            if intrinsic == Intrinsic::PrintLn {
                console.push('\n');
            }
            None
        }
        Intrinsic::ToString => {
            let [value] = take_args(args)?;
            Some(Value::from(value.to_string()))
        }
        Intrinsic::ToInt32 => {
            let [value] = take_args(args)?;
            let narrow = to_int64(&value)
                .ok()
                .and_then(|wide| i32::try_from(wide).ok())
                .ok_or_else(|| conversion_error(&value, "Int32"))?;
            Some(Value::Int32(narrow))
        }
        Intrinsic::ToInt64 => {
            let [value] = take_args(args)?;
            Some(Value::Int64(to_int64(&value)?))
        }
        Intrinsic::ToFloat64 => {
            let [value] = take_args(args)?;
            Some(Value::Float64(to_float64(&value)?))
        }
        Intrinsic::Panic => {
            let [message] = take_args(args)?;
            return Err(Error::Panic(message.to_string()));
        }
        Intrinsic::Assert => {
            let mut args = args.into_iter();
            let condition = expect_value!(args.next().ok_or(Error::StackEmpty)?, Bool)?;
            if !condition {
                return Err(Error::AssertionFailed(args.next().map(|m| m.to_string())));
            }
            None
        }
        Intrinsic::ArrayCount => {
            let [array] = take_args(args)?;
            let len = expect_value!(array, Array)?.borrow().len();
            Some(Value::Int32(
                i32::try_from(len).map_err(|_| Error::Overflow("count"))?,
            ))
        }
        Intrinsic::ArrayAppend => {
            let [array, value] = take_args(args)?;
            let array = expect_value!(array, Array)?;
            let mut values = array.borrow_mut();
            if values.len() >= config.max_array_len {
                return Err(Error::ArrayTooLong {
                    len: values.len() + 1,
                    limit: config.max_array_len,
                });
            }
            values.push(value);
            None
        }
        Intrinsic::StringLength => {
            let [string] = take_args(args)?;
            let len = expect_value!(string, String)?.chars().count();
            Some(Value::Int32(
                i32::try_from(len).map_err(|_| Error::Overflow("length"))?,
            ))
        }
        Intrinsic::StateGet => {
            let [handle] = take_args(args)?;
            let handle = expect_value!(handle, State)?;
            match read_state(observer, &handle)? {
                Some(value) => Some(value),
                None => return Err(Error::MissingState(handle.key.clone())),
            }
        }
        Intrinsic::StateGetOr => {
            let [handle, default] = take_args(args)?;
            let handle = expect_value!(handle, State)?;
            Some(read_state(observer, &handle)?.unwrap_or(default))
        }
        Intrinsic::StateSet => {
            let [handle, value] = take_args(args)?;
            let handle = expect_value!(handle, State)?;
            write_state(observer, &handle, &value)?;
            None
        }
        Intrinsic::StateExisted => {
            let [handle] = take_args(args)?;
            let handle = expect_value!(handle, State)?;
            Some(Value::Bool(observer.exists(&handle.key) == Status::Ok))
        }
    })
}
