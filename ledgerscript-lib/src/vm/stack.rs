use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use crate::vm::*;

/// type that is used at runtime to represent the operand stack. The locals of each
/// frame live at the bottom of the frame's part of the stack
#[derive(Debug, Default)]
pub struct Stack(Vec<Value>);

impl Stack {
    pub fn pop_value(&mut self) -> Result<Value> {
        self.0.pop().ok_or(Error::StackEmpty)
    }

    pub fn pop_bool(&mut self) -> Result<bool> {
        expect_value!(self.pop_value()?, Bool)
    }

    pub fn pop_int32(&mut self) -> Result<i32> {
        expect_value!(self.pop_value()?, Int32)
    }

    pub fn pop_string(&mut self) -> Result<Rc<str>> {
        expect_value!(self.pop_value()?, String)
    }

    pub fn pop_array(&mut self) -> Result<Rc<RefCell<Vec<Value>>>> {
        expect_value!(self.pop_value()?, Array)
    }

    /// pops the topmost n values, in the order they were pushed
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>> {
        let at = self.0.len().checked_sub(n).ok_or(Error::StackEmpty)?;
        Ok(self.0.split_off(at))
    }

    pub fn local(&self, index: usize) -> Result<&Value> {
        self.0
            .get(index)
            .ok_or_else(|| rt_err!("local slot {} is outside of the stack", index))
    }

    pub fn set_local(&mut self, index: usize, value: Value) -> Result<()> {
        let slot = self
            .0
            .get_mut(index)
            .ok_or_else(|| rt_err!("local slot {} is outside of the stack", index))?;
        *slot = value;
        Ok(())
    }
}

impl Deref for Stack {
    type Target = Vec<Value>;
    fn deref(&self) -> &Vec<Value> {
        &self.0
    }
}

impl DerefMut for Stack {
    fn deref_mut(&mut self) -> &mut Vec<Value> {
        &mut self.0
    }
}

/// the activation record of a script function
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    /// index into the unit's function table
    pub function: usize,
    /// index of the next opcode
    pub pc: usize,
    /// stack index of the first local
    pub base: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_pops() {
        let mut stack = Stack::default();
        stack.push(Value::Int32(1));
        stack.push(Value::Bool(true));
        assert!(matches!(
            stack.pop_int32(),
            Err(Error::TypeConfusion {
                expected: "Int32",
                found: "Bool"
            })
        ));
        assert_eq!(stack.pop_int32().unwrap(), 1);
        assert!(matches!(stack.pop_value(), Err(Error::StackEmpty)));
    }

    #[test]
    fn test_pop_n_keeps_order() {
        let mut stack = Stack::default();
        for i in 0..4 {
            stack.push(Value::Int32(i));
        }
        assert_eq!(stack.pop_n(2).unwrap(), vec![Value::Int32(2), Value::Int32(3)]);
        assert_eq!(stack.len(), 2);
        assert!(stack.pop_n(3).is_err());
    }
}
