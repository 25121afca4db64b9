//! Turns the analysed AST into a [`CompiledUnit`].
//!
//! Code generation only runs after the analysis succeeded, so every error that is
//! raised here is either a limit of the bytecode format or a bug of the compiler.

use thiserror::Error;
use tracing::debug;

use crate::analysis::{self, Analysis, CallTarget, Resolution};
use crate::bindings::Registry;
use crate::core::*;
use crate::parser;
use crate::utils;

pub trait Compilable {
    fn compile(&self, builder: &mut ByteCodeBuilder<'_>, analysis: &Analysis) -> Result<()>;
}

pub type Result<T> = std::result::Result<T, CompilationError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompilationError {
    #[error("the program has too many {what} for the bytecode format")]
    LimitExceeded { ast_id: NodeId, what: &'static str },

    #[error("A compiler bug was detected: {msg}")]
    CompilerBug { ast_id: NodeId, msg: String },
}

impl CompilationError {
    pub fn get_ast_id(&self) -> NodeId {
        match self {
            Self::LimitExceeded { ast_id, .. } | Self::CompilerBug { ast_id, .. } => *ast_id,
        }
    }

    pub fn to_diagnostic(&self, locations: &[Location]) -> Diagnostic {
        let location = locations
            .get(self.get_ast_id())
            .copied()
            .unwrap_or_default();
        Diagnostic::new(location, self.to_string())
    }
}

macro_rules! compiler_bug {
    ($ast_id: expr, $msg:literal $(, $args: expr)*) => {
        return Err(CompilationError::CompilerBug{
            ast_id: $ast_id,
            msg: format!($msg $(, $args)*)})
    };
}

macro_rules! impl_compilable {
    ($t:ty: $self:ident, $builder:ident, $analysis:ident => $code:tt) => {
        impl Compilable for $t {
            fn compile(&$self, $builder: &mut ByteCodeBuilder<'_>, $analysis: &Analysis) -> Result<()> {
                $code
            }
        }
    };
}

/// compiles source text against a registry. All errors, syntax errors included, are
/// reported as diagnostics
pub fn compile(registry: &Registry, source: &str) -> std::result::Result<CompiledUnit, Diagnostics> {
    let (program, locations) =
        parser::parse(source).map_err(|e| Diagnostics::from(e.to_diagnostic()))?;
    compile_program(registry, &program, &locations)
}

/// compiles an already parsed program
pub fn compile_program(
    registry: &Registry,
    program: &Program,
    locations: &[Location],
) -> std::result::Result<CompiledUnit, Diagnostics> {
    let analysis = analysis::analyse(program, registry).map_err(|errors| {
        errors
            .iter()
            .map(|e| e.to_diagnostic(locations))
            .collect::<Diagnostics>()
    })?;
    generate(program, &analysis, locations)
        .map_err(|e| Diagnostics::from(e.to_diagnostic(locations)))
}

fn generate(program: &Program, analysis: &Analysis, locations: &[Location]) -> Result<CompiledUnit> {
    let mut builder = ByteCodeBuilder::new(locations);
    let mut functions = Vec::with_capacity(program.functions.len());
    let mut function_index = std::collections::BTreeMap::new();

    for (index, (function, info)) in program
        .functions
        .iter()
        .zip(&analysis.functions)
        .enumerate()
    {
        let Some(signature) = info.signature() else {
            compiler_bug!(function.id, "function '{}' has an unresolved signature", function.name);
        };
        function.body.compile(&mut builder, analysis)?;
        if signature.result == TypeId::Void {
            builder.push(OpCode::ReturnVoid, function.id);
        }
        let (code, lines) = builder.finish_function();
        debug!(name = %function.name, ops = code.len(), "generated function");
        functions.push(FunctionCode {
            name: function.name.clone(),
            signature,
            locals: ByteCodeBuilder::operand(info.locals, "local variables", function.id)?,
            code,
            lines,
        });
        function_index.insert(
            function.name.clone(),
            ByteCodeBuilder::operand(index, "functions", function.id)?,
        );
    }

    Ok(CompiledUnit {
        version: utils::get_version(),
        functions,
        constants: builder.into_constants(),
        imports: analysis.imports.clone(),
        function_index,
    })
}

fn resolution_of(analysis: &Analysis, id: NodeId) -> Result<Resolution> {
    match analysis.resolution(id) {
        Some(resolution) => Ok(resolution),
        None => compiler_bug!(id, "node {} was not resolved", id),
    }
}

fn type_of(analysis: &Analysis, id: NodeId) -> Result<&TypeId> {
    match analysis.type_of(id) {
        Some(ty) => Ok(ty),
        None => compiler_bug!(id, "node {} has no type", id),
    }
}

fn local_slot(analysis: &Analysis, id: NodeId) -> Result<u16> {
    match resolution_of(analysis, id)? {
        Resolution::Local(slot) => ByteCodeBuilder::operand(slot, "local variables", id),
        other => compiler_bug!(id, "expected a local variable, found {:?}", other),
    }
}

/// pushes the value a variable of type `ty` holds before its first assignment
fn push_default(builder: &mut ByteCodeBuilder<'_>, ty: &TypeId, id: NodeId) -> Result<()> {
    let constant = match ty {
        TypeId::Bool => Constant::Bool(false),
        TypeId::Int32 => Constant::Int32(0),
        TypeId::Int64 => Constant::Int64(0),
        TypeId::Float64 => Constant::Float64(0.0),
        TypeId::String => Constant::String(String::new()),
        TypeId::Array(element) => {
            builder.push_constant(Constant::Int32(0), id)?;
            builder.push(OpCode::NewArray((**element).clone()), id);
            return Ok(());
        }
        TypeId::Void | TypeId::State(_) => compiler_bug!(id, "{} has no default value", ty),
    };
    builder.push_constant(constant, id)
}

fn binary_opcode(op: BinaryOp) -> Option<OpCode> {
    use BinaryOp::*;
    Some(match op {
        Or | And => return None,
        Eq => OpCode::Eq,
        Ne => OpCode::Ne,
        Lt => OpCode::Lt,
        Le => OpCode::Le,
        Gt => OpCode::Gt,
        Ge => OpCode::Ge,
        Add => OpCode::Add,
        Sub => OpCode::Sub,
        Mul => OpCode::Mul,
        Div => OpCode::Div,
        Rem => OpCode::Rem,
    })
}

fn compile_args(args: &[Expr], builder: &mut ByteCodeBuilder<'_>, analysis: &Analysis) -> Result<()> {
    for arg in args {
        arg.compile(builder, analysis)?;
    }
    Ok(())
}

fn push_call(
    builder: &mut ByteCodeBuilder<'_>,
    target: CallTarget,
    argc: usize,
    id: NodeId,
) -> Result<()> {
    let op = match target {
        CallTarget::Script(index) => OpCode::Call(ByteCodeBuilder::operand(index, "functions", id)?),
        CallTarget::Host(index) => {
            OpCode::CallHost(ByteCodeBuilder::operand(index, "host imports", id)?)
        }
        CallTarget::Intrinsic(intrinsic) => OpCode::CallIntrinsic {
            intrinsic,
            argc: ByteCodeBuilder::operand(argc, "arguments", id)?,
        },
    };
    builder.push(op, id);
    Ok(())
}

impl_compilable! { Block: self, builder, analysis => {
    for stmt in &self.stmts {
        stmt.compile(builder, analysis)?;
    }
    Ok(())
}}

impl_compilable! { Stmt: self, builder, analysis => {
    match self {
        Stmt::VarDecl(s) => s.compile(builder, analysis),
        Stmt::Assign(s) => s.compile(builder, analysis),
        Stmt::If(s) => s.compile(builder, analysis),
        Stmt::While(s) => s.compile(builder, analysis),
        Stmt::For(s) => s.compile(builder, analysis),
        Stmt::Return(s) => s.compile(builder, analysis),
        Stmt::Break(Break { id }) => builder.push_break(*id),
        Stmt::Continue(Continue { id }) => builder.push_continue(*id),
        Stmt::Expr(s) => s.compile(builder, analysis),
    }
}}

impl_compilable! { VarDecl: self, builder, analysis => {
    match &self.init {
        Some(init) => init.compile(builder, analysis)?,
        None => push_default(builder, type_of(analysis, self.id)?, self.id)?,
    }
    let slot = local_slot(analysis, self.id)?;
    builder.push(OpCode::StoreLocal(slot), self.id);
    Ok(())
}}

impl_compilable! { Assign: self, builder, analysis => {
    let op = self.op.binary_op().and_then(binary_opcode);
    match &self.target {
        Expr::Ident(ident) => {
            let slot = local_slot(analysis, ident.id)?;
            if let Some(op) = op {
                builder.push(OpCode::LoadLocal(slot), self.id);
                self.value.compile(builder, analysis)?;
                builder.push(op, self.id);
            } else {
                self.value.compile(builder, analysis)?;
            }
            builder.push(OpCode::StoreLocal(slot), self.id);
        }
        Expr::Index(index) => {
            index.target.compile(builder, analysis)?;
            index.index.compile(builder, analysis)?;
            if let Some(op) = op {
                builder.push(OpCode::Dup2, self.id);
                builder.push(OpCode::LoadIndex, index.id);
                self.value.compile(builder, analysis)?;
                builder.push(op, self.id);
            } else {
                self.value.compile(builder, analysis)?;
            }
            builder.push(OpCode::StoreIndex, self.id);
        }
        other => compiler_bug!(self.id, "cannot assign to {:?}", other),
    }
    Ok(())
}}

impl_compilable! { If: self, builder, analysis => {
    let mut to_end = vec![];
    for branch in &self.branches {
        branch.condition.compile(builder, analysis)?;
        let to_next = builder.push_jump_if_false(branch.id);
        branch.body.compile(builder, analysis)?;
        to_end.push(builder.push_jump(branch.id));
        builder.patch_jump_here(to_next, branch.id)?;
    }
    if let Some(body) = &self.else_body {
        body.compile(builder, analysis)?;
    }
    for at in to_end {
        builder.patch_jump_here(at, self.id)?;
    }
    Ok(())
}}

impl_compilable! { While: self, builder, analysis => {
    let start = builder.offset();
    self.condition.compile(builder, analysis)?;
    let to_exit = builder.push_jump_if_false(self.id);
    builder.open_loop();
    self.body.compile(builder, analysis)?;
    builder.push_jump_to(start, self.id)?;
    let exit = builder.offset();
    builder.patch_jump(to_exit, exit, self.id)?;
    builder.close_loop(start, exit, self.id)
}}

impl_compilable! { For: self, builder, analysis => {
    let Resolution::ForLoop { var, limit, step } = resolution_of(analysis, self.id)? else {
        compiler_bug!(self.id, "for loop without loop slots");
    };
    let var: u16 = ByteCodeBuilder::operand(var, "local variables", self.id)?;
    let limit: u16 = ByteCodeBuilder::operand(limit, "local variables", self.id)?;
    let step: u16 = ByteCodeBuilder::operand(step, "local variables", self.id)?;

    self.from.compile(builder, analysis)?;
    builder.push(OpCode::StoreLocal(var), self.id);
    self.to.compile(builder, analysis)?;
    builder.push(OpCode::StoreLocal(limit), self.id);
    match &self.step {
        Some(expr) => expr.compile(builder, analysis)?,
        None => {
            let one = match type_of(analysis, self.id)? {
                TypeId::Int64 => Constant::Int64(1),
                _ => Constant::Int32(1),
            };
            builder.push_constant(one, self.id)?;
        }
    }
    builder.push(OpCode::StoreLocal(step), self.id);

    let start = builder.push(OpCode::RangeTest { var, limit, step }, self.id);
    let to_exit = builder.push_jump_if_false(self.id);
    builder.open_loop();
    self.body.compile(builder, analysis)?;
    let increment = builder.push(OpCode::LoadLocal(var), self.id);
    builder.push(OpCode::LoadLocal(step), self.id);
    builder.push(OpCode::Add, self.id);
    builder.push(OpCode::StoreLocal(var), self.id);
    builder.push_jump_to(start, self.id)?;
    let exit = builder.offset();
    builder.patch_jump(to_exit, exit, self.id)?;
    builder.close_loop(increment, exit, self.id)
}}

impl_compilable! { Return: self, builder, analysis => {
    match &self.value {
        Some(value) => {
            value.compile(builder, analysis)?;
            builder.push(OpCode::Return, self.id);
        }
        None => {
            builder.push(OpCode::ReturnVoid, self.id);
        }
    }
    Ok(())
}}

impl_compilable! { ExprStmt: self, builder, analysis => {
    self.expr.compile(builder, analysis)?;
    if *type_of(analysis, self.expr.id())? != TypeId::Void {
        builder.push(OpCode::Pop, self.id);
    }
    Ok(())
}}

impl_compilable! { IntLit: self, builder, analysis => {
    let constant = match type_of(analysis, self.id)? {
        TypeId::Int64 => Constant::Int64(self.value),
        _ => match i32::try_from(self.value) {
            Ok(value) => Constant::Int32(value),
            Err(_) => compiler_bug!(self.id, "{} does not fit into Int32", self.value),
        },
    };
    builder.push_constant(constant, self.id)
}}

impl_compilable! { FloatLit: self, builder, _analysis => {
    builder.push_constant(Constant::Float64(self.value), self.id)
}}

impl_compilable! { StrLit: self, builder, _analysis => {
    builder.push_constant(Constant::String(self.value.clone()), self.id)
}}

impl_compilable! { BoolLit: self, builder, _analysis => {
    builder.push_constant(Constant::Bool(self.value), self.id)
}}

impl_compilable! { ArrayLit: self, builder, analysis => {
    compile_args(&self.elements, builder, analysis)?;
    let count = ByteCodeBuilder::operand(self.elements.len(), "array elements", self.id)?;
    builder.push(OpCode::MakeArray(count), self.id);
    Ok(())
}}

impl_compilable! { Ident: self, builder, analysis => {
    let slot = local_slot(analysis, self.id)?;
    builder.push(OpCode::LoadLocal(slot), self.id);
    Ok(())
}}

impl_compilable! { Binary: self, builder, analysis => {
    self.lhs.compile(builder, analysis)?;
    match (self.op, binary_opcode(self.op)) {
        (BinaryOp::And, _) => {
            let to_false = builder.push_jump_if_false(self.id);
            self.rhs.compile(builder, analysis)?;
            let to_end = builder.push_jump(self.id);
            builder.patch_jump_here(to_false, self.id)?;
            builder.push_constant(Constant::Bool(false), self.id)?;
            builder.patch_jump_here(to_end, self.id)?;
        }
        (BinaryOp::Or, _) => {
            let to_rhs = builder.push_jump_if_false(self.id);
            builder.push_constant(Constant::Bool(true), self.id)?;
            let to_end = builder.push_jump(self.id);
            builder.patch_jump_here(to_rhs, self.id)?;
            self.rhs.compile(builder, analysis)?;
            builder.patch_jump_here(to_end, self.id)?;
        }
        (_, Some(op)) => {
            self.rhs.compile(builder, analysis)?;
            builder.push(op, self.id);
        }
        (op, None) => compiler_bug!(self.id, "no opcode for operator {}", op.symbol()),
    }
    Ok(())
}}

impl_compilable! { Unary: self, builder, analysis => {
    self.operand.compile(builder, analysis)?;
    let op = match self.op {
        UnaryOp::Neg => OpCode::Neg,
        UnaryOp::Not => OpCode::Not,
    };
    builder.push(op, self.id);
    Ok(())
}}

impl_compilable! { Call: self, builder, analysis => {
    let Resolution::Call(target) = resolution_of(analysis, self.id)? else {
        compiler_bug!(self.id, "call of '{}' was not resolved to a function", self.name);
    };
    compile_args(&self.args, builder, analysis)?;
    push_call(builder, target, self.args.len(), self.id)
}}

impl_compilable! { MemberCall: self, builder, analysis => {
    let Resolution::Call(target) = resolution_of(analysis, self.id)? else {
        compiler_bug!(self.id, "call of '{}' was not resolved to a function", self.method);
    };
    // type functions have no receiver value, methods take it as first argument
    let argc = match target {
        CallTarget::Host(_) => self.args.len(),
        _ => {
            self.receiver.compile(builder, analysis)?;
            self.args.len() + 1
        }
    };
    compile_args(&self.args, builder, analysis)?;
    push_call(builder, target, argc, self.id)
}}

impl_compilable! { Index: self, builder, analysis => {
    self.target.compile(builder, analysis)?;
    self.index.compile(builder, analysis)?;
    builder.push(OpCode::LoadIndex, self.id);
    Ok(())
}}

impl_compilable! { Construct: self, builder, analysis => {
    match type_of(analysis, self.id)? {
        TypeId::Array(element) => {
            match self.args.first() {
                Some(length) => length.compile(builder, analysis)?,
                None => builder.push_constant(Constant::Int32(0), self.id)?,
            }
            builder.push(OpCode::NewArray((**element).clone()), self.id);
        }
        TypeId::State(inner) => {
            compile_args(&self.args, builder, analysis)?;
            builder.push(OpCode::NewState((**inner).clone()), self.id);
        }
        other => compiler_bug!(self.id, "cannot construct {}", other),
    }
    Ok(())
}}
