use crate::compiler::{CompilationError, Result};
use crate::core::*;

/// represents byte code while it's being built
///
/// The constant pool is shared by all functions of a unit, the text and the line table
/// belong to the function that is currently compiled and are taken out with
/// [`ByteCodeBuilder::finish_function`].
#[derive(Debug)]
pub struct ByteCodeBuilder<'a> {
    /// node locations produced by the parser, indexed by node id
    locations: &'a [Location],
    constants: Vec<Constant>,
    /// Basically the program
    text: Vec<OpCode>,
    /// source line of each opcode in text
    lines: Vec<u32>,
    /// pending jumps of the loops that are currently open, innermost last
    loops: Vec<LoopLabels>,
}

#[derive(Debug, Default)]
struct LoopLabels {
    breaks: Vec<usize>,
    continues: Vec<usize>,
}

impl<'a> ByteCodeBuilder<'a> {
    pub fn new(locations: &'a [Location]) -> Self {
        Self {
            locations,
            constants: Vec::new(),
            text: Vec::new(),
            lines: Vec::new(),
            loops: Vec::new(),
        }
    }

    /// converts an index into the width an opcode stores
    pub fn operand<T: TryFrom<usize>>(value: usize, what: &'static str, node: NodeId) -> Result<T> {
        T::try_from(value).map_err(|_| CompilationError::LimitExceeded { ast_id: node, what })
    }

    /// appends an opcode and returns its index
    pub fn push(&mut self, op: OpCode, node: NodeId) -> usize {
        let line = self.locations.get(node).map(|l| l.line).unwrap_or(0);
        self.text.push(op);
        self.lines.push(line);
        self.text.len() - 1
    }

    /// the index the next opcode will get
    pub fn offset(&self) -> usize {
        self.text.len()
    }

    /// adds the constant to the pool, unless it is already in there, and pushes an
    /// instruction to load it
    pub fn push_constant(&mut self, constant: Constant, node: NodeId) -> Result<()> {
        let idx = match self.constants.iter().position(|c| c.same_as(&constant)) {
            Some(idx) => idx,
            None => {
                self.constants.push(constant);
                self.constants.len() - 1
            }
        };
        let idx = Self::operand(idx, "constants", node)?;
        self.push(OpCode::PushConst(idx), node);
        Ok(())
    }

    /// pushes a jump whose target is patched later
    pub fn push_jump(&mut self, node: NodeId) -> usize {
        self.push(OpCode::Jump(0), node)
    }

    pub fn push_jump_if_false(&mut self, node: NodeId) -> usize {
        self.push(OpCode::JumpIfFalse(0), node)
    }

    /// pushes a jump to an already known target
    pub fn push_jump_to(&mut self, target: usize, node: NodeId) -> Result<()> {
        let target = Self::operand(target, "code size", node)?;
        self.push(OpCode::Jump(target), node);
        Ok(())
    }

    /// sets the target of the jump at index `at`
    pub fn patch_jump(&mut self, at: usize, target: usize, node: NodeId) -> Result<()> {
        let target: u32 = Self::operand(target, "code size", node)?;
        match self.text.get_mut(at) {
            Some(OpCode::Jump(t)) | Some(OpCode::JumpIfFalse(t)) => {
                *t = target;
                Ok(())
            }
            other => Err(CompilationError::CompilerBug {
                ast_id: node,
                msg: format!("tried to patch {other:?} at {at}, which is not a jump"),
            }),
        }
    }

    /// patches the jump at index `at` to point at the next opcode
    pub fn patch_jump_here(&mut self, at: usize, node: NodeId) -> Result<()> {
        self.patch_jump(at, self.offset(), node)
    }

    pub fn open_loop(&mut self) {
        self.loops.push(LoopLabels::default());
    }

    /// pushes a jump that leaves the innermost loop
    pub fn push_break(&mut self, node: NodeId) -> Result<()> {
        let at = self.push_jump(node);
        self.innermost_loop(node)?.breaks.push(at);
        Ok(())
    }

    /// pushes a jump to the next iteration of the innermost loop
    pub fn push_continue(&mut self, node: NodeId) -> Result<()> {
        let at = self.push_jump(node);
        self.innermost_loop(node)?.continues.push(at);
        Ok(())
    }

    /// closes the innermost loop and patches its break and continue jumps
    pub fn close_loop(&mut self, continue_target: usize, end: usize, node: NodeId) -> Result<()> {
        let labels = self.loops.pop().ok_or_else(|| CompilationError::CompilerBug {
            ast_id: node,
            msg: "closed a loop that was never opened".into(),
        })?;
        for at in labels.continues {
            self.patch_jump(at, continue_target, node)?;
        }
        for at in labels.breaks {
            self.patch_jump(at, end, node)?;
        }
        Ok(())
    }

    fn innermost_loop(&mut self, node: NodeId) -> Result<&mut LoopLabels> {
        self.loops
            .last_mut()
            .ok_or_else(|| CompilationError::CompilerBug {
                ast_id: node,
                msg: "loop control outside of a loop survived the analysis".into(),
            })
    }

    /// takes the text and line table of the function that was just compiled
    pub fn finish_function(&mut self) -> (Vec<OpCode>, Vec<u32>) {
        self.loops.clear();
        (std::mem::take(&mut self.text), std::mem::take(&mut self.lines))
    }

    pub fn into_constants(self) -> Vec<Constant> {
        self.constants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_deduplicated() {
        let locations = [Location::new(1, 1)];
        let mut builder = ByteCodeBuilder::new(&locations);
        builder.push_constant(Constant::Int32(7), 0).unwrap();
        builder.push_constant(Constant::Int32(7), 0).unwrap();
        builder.push_constant(Constant::Int64(7), 0).unwrap();
        let (text, lines) = builder.finish_function();
        assert_eq!(
            text,
            vec![OpCode::PushConst(0), OpCode::PushConst(0), OpCode::PushConst(1)]
        );
        assert_eq!(lines, vec![1, 1, 1]);
        assert_eq!(builder.into_constants().len(), 2);
    }

    #[test]
    fn test_loop_patching() {
        let locations = [Location::new(3, 1)];
        let mut builder = ByteCodeBuilder::new(&locations);
        builder.open_loop();
        builder.push_break(0).unwrap();
        builder.push_continue(0).unwrap();
        builder.push(OpCode::Pop, 0);
        builder.close_loop(0, 3, 0).unwrap();
        let (text, _) = builder.finish_function();
        assert_eq!(text[0], OpCode::Jump(3));
        assert_eq!(text[1], OpCode::Jump(0));
    }

    #[test]
    fn test_break_outside_loop_is_a_bug() {
        let locations = [Location::new(1, 1)];
        let mut builder = ByteCodeBuilder::new(&locations);
        assert!(matches!(
            builder.push_break(0),
            Err(CompilationError::CompilerBug { .. })
        ));
    }
}
