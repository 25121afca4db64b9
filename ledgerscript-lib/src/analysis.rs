//! Name resolution and type checking.
//!
//! The analysis runs in two passes. The first one collects the signatures of all script
//! functions, so functions can be called before they are defined. The second pass walks
//! each body, assigns local slots, resolves every call to a script function, an
//! intrinsic or a host binding, and infers the type of every expression.
//!
//! Errors are collected instead of returned early, so a single compilation reports as
//! many problems as possible.

use im::HashMap;
use std::collections::HashMap as StdHashMap;
use thiserror::Error;
use tracing::trace;

use crate::bindings::{HostFunction, Registry};
use crate::core::*;

/// The type information for each expression, associated via its id
pub type TypeIndex = HashMap<NodeId, TypeId>;

/// what a call refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget {
    /// index into the unit's function table
    Script(usize),
    /// index into the unit's import table
    Host(usize),
    Intrinsic(Intrinsic),
}

/// what a node refers to, keyed by the node's id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// a local slot of the current function. Used for identifiers, parameters and
    /// declarations
    Local(usize),
    Call(CallTarget),
    /// the slots of a for loop: the loop variable and two hidden slots that hold the
    /// evaluated limit and step
    ForLoop { var: usize, limit: usize, step: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    pub name: String,
    pub node: NodeId,
    /// `None` marks a parameter whose type could not be resolved
    pub params: Vec<Option<TypeId>>,
    pub result: Option<TypeId>,
    /// number of local slots the function needs, parameters included
    pub locals: usize,
}

impl FunctionInfo {
    pub fn signature(&self) -> Option<Signature> {
        let params = self.params.iter().cloned().collect::<Option<Vec<_>>>()?;
        Some(Signature::new(params, self.result.clone()?))
    }
}

/// The result of a successful analysis, which is everything the code generator needs
/// besides the AST
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub types: TypeIndex,
    pub resolutions: HashMap<NodeId, Resolution>,
    pub functions: Vec<FunctionInfo>,
    pub imports: Vec<HostImport>,
}

impl Analysis {
    pub fn type_of(&self, id: NodeId) -> Option<&TypeId> {
        self.types.get(&id)
    }

    pub fn resolution(&self, id: NodeId) -> Option<Resolution> {
        self.resolutions.get(&id).copied()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("unknown identifier '{name}'")]
    UnknownIdentifier { id: NodeId, name: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { id: NodeId, name: String },

    #[error("unknown type '{name}'")]
    UnknownType { id: NodeId, name: String },

    #[error("type '{type_name}' has no function '{name}'")]
    UnknownTypeFunction {
        id: NodeId,
        type_name: String,
        name: String,
    },

    #[error("type {ty} has no method '{name}'")]
    UnknownMethod { id: NodeId, ty: TypeId, name: String },

    #[error("'{callee}' expects {expected} argument(s), but {found} were given")]
    ArityMismatch {
        id: NodeId,
        callee: String,
        expected: String,
        found: usize,
    },

    #[error("{context}: expected {expected}, found {found}")]
    TypeMismatch {
        id: NodeId,
        context: String,
        expected: TypeId,
        found: TypeId,
    },

    #[error("'{callee}' cannot take a value of type {found}")]
    InvalidArgument {
        id: NodeId,
        callee: String,
        found: TypeId,
    },

    #[error("operator '{op}' cannot be applied to {lhs} and {rhs}")]
    InvalidOperands {
        id: NodeId,
        op: String,
        lhs: TypeId,
        rhs: TypeId,
    },

    #[error("operator '{op}' cannot be applied to {operand}")]
    InvalidOperand {
        id: NodeId,
        op: &'static str,
        operand: TypeId,
    },

    #[error("variable '{name}' is already declared in this scope")]
    DuplicateVariable { id: NodeId, name: String },

    #[error("function '{name}' is already defined")]
    DuplicateFunction { id: NodeId, name: String },

    #[error("'{name}' is built into the language and cannot be redefined")]
    ReservedName { id: NodeId, name: String },

    #[error("'{name}' is already provided by the host")]
    HostNameCollision { id: NodeId, name: String },

    #[error("function '{name}' does not return a value on every path")]
    MissingReturn { id: NodeId, name: String },

    #[error("function '{name}' does not return a value, but a value is returned")]
    UnexpectedReturnValue { id: NodeId, name: String },

    #[error("function '{name}' must return a value of type {expected}")]
    MissingReturnValue {
        id: NodeId,
        name: String,
        expected: TypeId,
    },

    #[error("the expression does not produce a value")]
    VoidValue { id: NodeId },

    #[error("cannot infer the type of '{name}', add a type annotation")]
    CannotInfer { id: NodeId, name: String },

    #[error("cannot infer the element type of an empty array literal")]
    EmptyArrayLiteral { id: NodeId },

    #[error("only variables and array elements can be assigned to")]
    InvalidAssignmentTarget { id: NodeId },

    #[error("'{keyword}' outside of a loop")]
    LoopControlOutsideLoop { id: NodeId, keyword: &'static str },

    #[error("State cannot hold values of type {ty}")]
    UnsupportedStateType { id: NodeId, ty: TypeId },

    #[error("arrays cannot hold State handles")]
    StateInArray { id: NodeId },

    #[error("variable '{name}' of type {ty} must be initialised")]
    MissingInitialiser { id: NodeId, name: String, ty: TypeId },

    #[error("integer literal {value} does not fit into Int32, use the i64 suffix")]
    IntLiteralOutOfRange { id: NodeId, value: i64 },

    #[error("type '{name}' expects {expected} type argument(s)")]
    TypeArgumentCount {
        id: NodeId,
        name: String,
        expected: usize,
    },

    #[error("values of type {ty} cannot be constructed")]
    NotConstructible { id: NodeId, ty: TypeId },

    #[error("values of type {ty} cannot be indexed")]
    NotIndexable { id: NodeId, ty: TypeId },

    #[error("host type '{name}' cannot be used as a value")]
    TypeAsValue { id: NodeId, name: String },
}

impl Error {
    pub fn node_id(&self) -> NodeId {
        use Error::*;
        match self {
            UnknownIdentifier { id, .. }
            | UnknownFunction { id, .. }
            | UnknownType { id, .. }
            | UnknownTypeFunction { id, .. }
            | UnknownMethod { id, .. }
            | ArityMismatch { id, .. }
            | TypeMismatch { id, .. }
            | InvalidArgument { id, .. }
            | InvalidOperands { id, .. }
            | InvalidOperand { id, .. }
            | DuplicateVariable { id, .. }
            | DuplicateFunction { id, .. }
            | ReservedName { id, .. }
            | HostNameCollision { id, .. }
            | MissingReturn { id, .. }
            | UnexpectedReturnValue { id, .. }
            | MissingReturnValue { id, .. }
            | VoidValue { id }
            | CannotInfer { id, .. }
            | EmptyArrayLiteral { id }
            | InvalidAssignmentTarget { id }
            | LoopControlOutsideLoop { id, .. }
            | UnsupportedStateType { id, .. }
            | StateInArray { id }
            | MissingInitialiser { id, .. }
            | IntLiteralOutOfRange { id, .. }
            | TypeArgumentCount { id, .. }
            | NotConstructible { id, .. }
            | NotIndexable { id, .. }
            | TypeAsValue { id, .. } => *id,
        }
    }

    pub fn to_diagnostic(&self, locations: &[Location]) -> Diagnostic {
        let location = locations
            .get(self.node_id())
            .copied()
            .unwrap_or_default();
        Diagnostic::new(location, self.to_string())
    }
}

/// implemented by all expression nodes. Records what the node refers to in the
/// analyser and returns the type of the node, or `None` if it could not be determined.
/// In that case an error has been reported already
pub trait TypeInferable {
    fn infer_types(
        &self,
        analyser: &mut Analyser<'_>,
        expected: Option<&TypeId>,
    ) -> Option<TypeId>;
}

#[derive(Debug, Clone)]
struct Variable {
    slot: usize,
    ty: Option<TypeId>,
}

/// holds the state of the analysis while it walks the program
pub struct Analyser<'r> {
    registry: &'r Registry,
    analysis: Analysis,
    function_index: StdHashMap<String, usize>,
    import_index: StdHashMap<String, usize>,
    scopes: Scopes<String, Variable>,
    next_slot: usize,
    current_function: usize,
    loop_depth: usize,
    errors: Vec<Error>,
}

/// analyses a whole program against the host bindings of the registry
pub fn analyse(program: &Program, registry: &Registry) -> Result<Analysis, Vec<Error>> {
    let mut analyser = Analyser {
        registry,
        analysis: Analysis::default(),
        function_index: StdHashMap::new(),
        import_index: StdHashMap::new(),
        scopes: Scopes::default(),
        next_slot: 0,
        current_function: 0,
        loop_depth: 0,
        errors: vec![],
    };
    analyser.declare_functions(program);
    for (index, function) in program.functions.iter().enumerate() {
        analyser.function(index, function);
    }
    if analyser.errors.is_empty() {
        Ok(analyser.analysis)
    } else {
        Err(analyser.errors)
    }
}

/// the type of `lhs op rhs`, if the operator is defined for the operands
pub fn binary_result(op: BinaryOp, lhs: &TypeId, rhs: &TypeId) -> Option<TypeId> {
    use BinaryOp::*;
    if lhs != rhs {
        return None;
    }
    let ok = match op {
        Or | And => *lhs == TypeId::Bool,
        Eq | Ne => lhs.is_primitive(),
        Lt | Le | Gt | Ge => lhs.is_numeric() || *lhs == TypeId::String,
        Add => lhs.is_numeric() || *lhs == TypeId::String,
        Sub | Mul | Div | Rem => lhs.is_numeric(),
    };
    if !ok {
        None
    } else if matches!(op, Or | And | Eq | Ne | Lt | Le | Gt | Ge) {
        Some(TypeId::Bool)
    } else {
        Some(lhs.clone())
    }
}

fn is_plain_int_literal(expr: &Expr) -> bool {
    matches!(expr, Expr::IntLit(IntLit { wide: false, .. }))
}

impl<'r> Analyser<'r> {
    fn error(&mut self, error: Error) {
        trace!(%error, "analysis error");
        self.errors.push(error);
    }

    fn resolve(&mut self, id: NodeId, resolution: Resolution) {
        self.analysis.resolutions.insert(id, resolution);
    }

    /// infers the type of an expression and records it in the type index
    pub fn expr(&mut self, expr: &Expr, expected: Option<&TypeId>) -> Option<TypeId> {
        let ty = expr.infer_types(self, expected);
        if let Some(ty) = &ty {
            self.analysis.types.insert(expr.id(), ty.clone());
        }
        ty
    }

    /// like `expr`, but reports an error if the expression does not produce a value
    pub fn value(&mut self, expr: &Expr, expected: Option<&TypeId>) -> Option<TypeId> {
        match self.expr(expr, expected) {
            Some(TypeId::Void) => {
                self.error(Error::VoidValue { id: expr.id() });
                None
            }
            other => other,
        }
    }

    /// analyses a value and reports a mismatch if it doesn't have the expected type
    fn expect_type(&mut self, expr: &Expr, expected: &TypeId, context: &str) -> Option<TypeId> {
        let found = self.value(expr, Some(expected))?;
        if found != *expected {
            self.error(Error::TypeMismatch {
                id: expr.id(),
                context: context.into(),
                expected: expected.clone(),
                found: found.clone(),
            });
        }
        Some(found)
    }

    fn check_arity(&mut self, callee: &str, id: NodeId, found: usize, min: usize, max: usize) {
        if found < min || found > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{min} to {max}")
            };
            self.error(Error::ArityMismatch {
                id,
                callee: callee.into(),
                expected,
                found,
            });
        }
    }

    /// checks the arguments of a call against the parameter types
    fn check_args(&mut self, callee: &str, id: NodeId, args: &[Expr], params: &[Option<TypeId>]) {
        self.check_arity(callee, id, args.len(), params.len(), params.len());
        for (i, arg) in args.iter().enumerate() {
            match params.get(i).cloned().flatten() {
                Some(param) => {
                    self.expect_type(arg, &param, &format!("argument {} of '{callee}'", i + 1));
                }
                None => {
                    self.value(arg, None);
                }
            }
        }
    }

    fn import(&mut self, name: &str, function: &HostFunction) -> usize {
        if let Some(index) = self.import_index.get(name) {
            return *index;
        }
        self.analysis.imports.push(HostImport {
            name: name.into(),
            signature: function.signature().clone(),
        });
        let index = self.analysis.imports.len() - 1;
        self.import_index.insert(name.into(), index);
        index
    }

    /// a call of a host function. Its signature is checked like a script function's
    fn host_call(&mut self, name: &str, id: NodeId, args: &[Expr], function: &HostFunction) -> Option<TypeId> {
        let import = self.import(name, function);
        self.resolve(id, Resolution::Call(CallTarget::Host(import)));
        let params: Vec<_> = function.signature().params.iter().cloned().map(Some).collect();
        self.check_args(name, id, args, &params);
        Some(function.signature().result.clone())
    }

    fn resolve_type(&mut self, ty: &TypeExpr) -> Option<TypeId> {
        let wrong_arg_count = |expected| Error::TypeArgumentCount {
            id: ty.id,
            name: ty.name.clone(),
            expected,
        };
        match (ty.name.as_str(), &ty.arg) {
            ("Array", Some(arg)) => {
                let inner = self.resolve_type(arg)?;
                if let TypeId::State(_) = inner {
                    self.error(Error::StateInArray { id: ty.id });
                    return None;
                }
                Some(inner.array())
            }
            ("State", Some(arg)) => {
                let inner = self.resolve_type(arg)?;
                if !inner.is_storable() {
                    self.error(Error::UnsupportedStateType { id: ty.id, ty: inner });
                    return None;
                }
                Some(inner.state())
            }
            ("Array" | "State", None) => {
                self.error(wrong_arg_count(1));
                None
            }
            (name, arg) => match TypeId::from_simple_name(name) {
                Some(simple) if arg.is_none() => Some(simple),
                Some(_) => {
                    self.error(wrong_arg_count(0));
                    None
                }
                None => {
                    self.error(Error::UnknownType {
                        id: ty.id,
                        name: ty.name.clone(),
                    });
                    None
                }
            },
        }
    }

    fn allocate_slot(&mut self) -> usize {
        self.next_slot += 1;
        self.next_slot - 1
    }

    fn declare_slot(&mut self, name: &str, id: NodeId, ty: Option<TypeId>) -> usize {
        if self.scopes.in_innermost(name) {
            self.error(Error::DuplicateVariable {
                id,
                name: name.into(),
            });
        }
        let slot = self.allocate_slot();
        self.scopes.add_entry(name.into(), Variable { slot, ty });
        slot
    }

    /// declares a variable in the innermost scope and records its slot at the node
    fn declare(&mut self, name: &str, id: NodeId, ty: Option<TypeId>) -> usize {
        let slot = self.declare_slot(name, id, ty);
        self.resolve(id, Resolution::Local(slot));
        slot
    }

    fn declare_functions(&mut self, program: &Program) {
        for function in &program.functions {
            let name = &function.name;
            let collision = if Intrinsic::from_function_name(name).is_some() {
                Some(Error::ReservedName {
                    id: function.id,
                    name: name.clone(),
                })
            } else if self.registry.function(name).is_some() || self.registry.has_type(name) {
                Some(Error::HostNameCollision {
                    id: function.id,
                    name: name.clone(),
                })
            } else if self.function_index.contains_key(name) {
                Some(Error::DuplicateFunction {
                    id: function.id,
                    name: name.clone(),
                })
            } else {
                None
            };

            let params: Vec<_> = function
                .params
                .iter()
                .map(|p| self.resolve_type(&p.ty))
                .collect();
            let result = match &function.return_type {
                Some(ty) => self.resolve_type(ty),
                None => Some(TypeId::Void),
            };
            let index = self.analysis.functions.len();
            self.analysis.functions.push(FunctionInfo {
                name: name.clone(),
                node: function.id,
                params,
                result,
                locals: 0,
            });
            match collision {
                Some(error) => self.error(error),
                None => {
                    self.function_index.insert(name.clone(), index);
                }
            }
        }
    }

    fn function(&mut self, index: usize, function: &FunctionDef) {
        self.scopes = Scopes::default();
        self.next_slot = 0;
        self.loop_depth = 0;
        self.current_function = index;

        let params = self.analysis.functions[index].params.clone();
        for (param, ty) in function.params.iter().zip(params) {
            self.declare(&param.name, param.id, ty);
        }
        let returns = self.block(&function.body);
        if let Some(result) = self.analysis.functions[index].result.clone() {
            if result != TypeId::Void && !returns {
                self.error(Error::MissingReturn {
                    id: function.id,
                    name: function.name.clone(),
                });
            }
        }
        self.analysis.functions[index].locals = self.next_slot;
        trace!(name = %function.name, locals = self.next_slot, "analysed function");
    }

    /// analyses a block and returns whether it returns on every path
    fn block(&mut self, block: &Block) -> bool {
        self.scopes.open_new();
        let mut returns = false;
        for stmt in &block.stmts {
            returns |= self.stmt(stmt);
        }
        self.scopes.collapse_innermost();
        returns
    }

    fn stmt(&mut self, stmt: &Stmt) -> bool {
        match stmt {
            Stmt::VarDecl(decl) => {
                self.var_decl(decl);
                false
            }
            Stmt::Assign(assign) => {
                self.assign(assign);
                false
            }
            Stmt::If(if_stmt) => {
                let mut all_return = true;
                for branch in &if_stmt.branches {
                    self.expect_type(&branch.condition, &TypeId::Bool, "condition");
                    all_return &= self.block(&branch.body);
                }
                match &if_stmt.else_body {
                    Some(body) => all_return &= self.block(body),
                    None => all_return = false,
                }
                all_return
            }
            Stmt::While(while_loop) => {
                self.expect_type(&while_loop.condition, &TypeId::Bool, "condition");
                self.loop_depth += 1;
                self.block(&while_loop.body);
                self.loop_depth -= 1;
                false
            }
            Stmt::For(for_loop) => {
                self.for_loop(for_loop);
                false
            }
            Stmt::Return(ret) => {
                self.return_stmt(ret);
                true
            }
            Stmt::Break(Break { id }) => {
                self.loop_control(*id, "break");
                false
            }
            Stmt::Continue(Continue { id }) => {
                self.loop_control(*id, "continue");
                false
            }
            Stmt::Expr(ExprStmt { expr, .. }) => {
                self.expr(expr, None);
                false
            }
        }
    }

    fn var_decl(&mut self, decl: &VarDecl) {
        let declared = decl.ty.as_ref().and_then(|t| self.resolve_type(t));
        let annotated = decl.ty.is_some();
        let ty = match &decl.init {
            Some(init) => {
                let found = self.value(init, declared.as_ref());
                match (&declared, found) {
                    (Some(expected), Some(found)) if *expected != found => {
                        self.error(Error::TypeMismatch {
                            id: init.id(),
                            context: format!("initialiser of '{}'", decl.name),
                            expected: expected.clone(),
                            found,
                        });
                        declared.clone()
                    }
                    (Some(_), _) => declared.clone(),
                    (None, found) if !annotated => found,
                    (None, _) => None,
                }
            }
            None => {
                match &declared {
                    Some(ty @ TypeId::State(_)) => self.error(Error::MissingInitialiser {
                        id: decl.id,
                        name: decl.name.clone(),
                        ty: ty.clone(),
                    }),
                    None if !annotated => self.error(Error::CannotInfer {
                        id: decl.id,
                        name: decl.name.clone(),
                    }),
                    _ => {}
                }
                declared.clone()
            }
        };
        if let Some(ty) = &ty {
            self.analysis.types.insert(decl.id, ty.clone());
        }
        self.declare(&decl.name, decl.id, ty);
    }

    fn assign(&mut self, assign: &Assign) {
        if !matches!(assign.target, Expr::Ident(_) | Expr::Index(_)) {
            self.error(Error::InvalidAssignmentTarget {
                id: assign.target.id(),
            });
            self.expr(&assign.value, None);
            return;
        }
        let Some(target) = self.value(&assign.target, None) else {
            self.value(&assign.value, None);
            return;
        };
        match assign.op.binary_op() {
            None => {
                self.expect_type(&assign.value, &target, "assigned value");
            }
            Some(op) => {
                let Some(value) = self.value(&assign.value, Some(&target)) else {
                    return;
                };
                if binary_result(op, &target, &value).as_ref() != Some(&target) {
                    self.error(Error::InvalidOperands {
                        id: assign.id,
                        op: format!("{}=", op.symbol()),
                        lhs: target,
                        rhs: value,
                    });
                }
            }
        }
    }

    fn for_loop(&mut self, for_loop: &For) {
        // an unsuffixed literal start adopts the type of the end
        let (from, to) = if is_plain_int_literal(&for_loop.from) {
            let to = self.value(&for_loop.to, None);
            (self.value(&for_loop.from, to.as_ref()), to)
        } else {
            let from = self.value(&for_loop.from, None);
            (from.clone(), self.value(&for_loop.to, from.as_ref()))
        };
        let ty = match (from, to) {
            (Some(from), Some(to)) if from.is_integer() && from == to => Some(from),
            (Some(from), Some(to)) if from.is_integer() => {
                self.error(Error::TypeMismatch {
                    id: for_loop.to.id(),
                    context: "end of range".into(),
                    expected: from,
                    found: to,
                });
                None
            }
            (Some(from), _) if !from.is_integer() => {
                self.error(Error::TypeMismatch {
                    id: for_loop.from.id(),
                    context: "start of range".into(),
                    expected: TypeId::Int32,
                    found: from,
                });
                None
            }
            _ => None,
        };
        if let Some(step) = &for_loop.step {
            match &ty {
                Some(ty) => {
                    self.expect_type(step, ty, "step of range");
                }
                None => {
                    self.value(step, None);
                }
            }
        }

        self.scopes.open_new();
        let var = self.declare_slot(&for_loop.var, for_loop.id, ty.clone());
        let limit = self.allocate_slot();
        let step = self.allocate_slot();
        self.resolve(for_loop.id, Resolution::ForLoop { var, limit, step });
        if let Some(ty) = ty {
            self.analysis.types.insert(for_loop.id, ty);
        }
        self.loop_depth += 1;
        self.block(&for_loop.body);
        self.loop_depth -= 1;
        self.scopes.collapse_innermost();
    }

    fn return_stmt(&mut self, ret: &Return) {
        let function = &self.analysis.functions[self.current_function];
        let name = function.name.clone();
        let expected = function.result.clone();
        match (&ret.value, expected) {
            (Some(value), Some(TypeId::Void)) => {
                self.error(Error::UnexpectedReturnValue { id: ret.id, name });
                self.expr(value, None);
            }
            (Some(value), Some(expected)) => {
                self.expect_type(value, &expected, "return value");
            }
            (Some(value), None) => {
                self.value(value, None);
            }
            (None, Some(expected)) if expected != TypeId::Void => {
                self.error(Error::MissingReturnValue {
                    id: ret.id,
                    name,
                    expected,
                });
            }
            (None, _) => {}
        }
    }

    fn loop_control(&mut self, id: NodeId, keyword: &'static str) {
        if self.loop_depth == 0 {
            self.error(Error::LoopControlOutsideLoop { id, keyword });
        }
    }

    /// checks a call of a free intrinsic function
    fn intrinsic_call(&mut self, intrinsic: Intrinsic, call: &Call) -> Option<TypeId> {
        use Intrinsic::*;
        let (name, id, args) = (call.name.as_str(), call.id, call.args.as_slice());
        match intrinsic {
            Print | PrintLn | ToString => {
                self.check_arity(name, id, args.len(), 1, 1);
                for arg in args {
                    self.value(arg, None);
                }
                Some(if intrinsic == ToString {
                    TypeId::String
                } else {
                    TypeId::Void
                })
            }
            ToInt32 | ToInt64 | ToFloat64 => {
                self.check_arity(name, id, args.len(), 1, 1);
                for arg in args {
                    if let Some(found) = self.value(arg, None) {
                        if !found.is_numeric() && found != TypeId::String {
                            self.error(Error::InvalidArgument {
                                id: arg.id(),
                                callee: name.into(),
                                found,
                            });
                        }
                    }
                }
                Some(match intrinsic {
                    ToInt32 => TypeId::Int32,
                    ToInt64 => TypeId::Int64,
                    _ => TypeId::Float64,
                })
            }
            Panic => {
                self.check_args(name, id, args, &[Some(TypeId::String)]);
                Some(TypeId::Void)
            }
            Assert => {
                self.check_arity(name, id, args.len(), 1, 2);
                let params = [TypeId::Bool, TypeId::String];
                for (i, arg) in args.iter().enumerate() {
                    match params.get(i) {
                        Some(param) => {
                            self.expect_type(arg, param, &format!("argument {} of 'assert'", i + 1));
                        }
                        None => {
                            self.value(arg, None);
                        }
                    }
                }
                Some(TypeId::Void)
            }
            ArrayCount | ArrayAppend | StringLength | StateGet | StateGetOr | StateSet
            | StateExisted => {
                self.error(Error::UnknownFunction {
                    id,
                    name: name.into(),
                });
                None
            }
        }
    }

    /// a call like `System.Argc()`, where the receiver names a host type
    fn type_function_call(&mut self, type_name: &str, call: &MemberCall) -> Option<TypeId> {
        let registry = self.registry;
        match registry.type_function(type_name, &call.method) {
            Some(function) => {
                let qualified = format!("{type_name}.{}", call.method);
                self.host_call(&qualified, call.id, &call.args, function)
            }
            None => {
                self.error(Error::UnknownTypeFunction {
                    id: call.id,
                    type_name: type_name.into(),
                    name: call.method.clone(),
                });
                for arg in &call.args {
                    self.expr(arg, None);
                }
                None
            }
        }
    }
}

impl TypeInferable for IntLit {
    fn infer_types(&self, analyser: &mut Analyser<'_>, expected: Option<&TypeId>) -> Option<TypeId> {
        if self.wide || expected == Some(&TypeId::Int64) {
            return Some(TypeId::Int64);
        }
        if i32::try_from(self.value).is_err() {
            analyser.error(Error::IntLiteralOutOfRange {
                id: self.id,
                value: self.value,
            });
            return None;
        }
        Some(TypeId::Int32)
    }
}

impl TypeInferable for FloatLit {
    fn infer_types(&self, _: &mut Analyser<'_>, _: Option<&TypeId>) -> Option<TypeId> {
        Some(TypeId::Float64)
    }
}

impl TypeInferable for StrLit {
    fn infer_types(&self, _: &mut Analyser<'_>, _: Option<&TypeId>) -> Option<TypeId> {
        Some(TypeId::String)
    }
}

impl TypeInferable for BoolLit {
    fn infer_types(&self, _: &mut Analyser<'_>, _: Option<&TypeId>) -> Option<TypeId> {
        Some(TypeId::Bool)
    }
}

impl TypeInferable for ArrayLit {
    fn infer_types(&self, analyser: &mut Analyser<'_>, expected: Option<&TypeId>) -> Option<TypeId> {
        let mut element = match expected {
            Some(TypeId::Array(element)) => Some((**element).clone()),
            _ => None,
        };
        if self.elements.is_empty() && element.is_none() {
            analyser.error(Error::EmptyArrayLiteral { id: self.id });
            return None;
        }
        let mut complete = true;
        for expr in &self.elements {
            match &element {
                Some(ty) => {
                    let ty = ty.clone();
                    complete &= analyser
                        .expect_type(expr, &ty, "array element")
                        .map(|found| found == ty)
                        .unwrap_or(false);
                }
                None => {
                    element = analyser.value(expr, None);
                    complete &= element.is_some();
                }
            }
        }
        let element = element?;
        if let TypeId::State(_) = element {
            analyser.error(Error::StateInArray { id: self.id });
            return None;
        }
        complete.then(|| element.array())
    }
}

impl TypeInferable for Ident {
    fn infer_types(&self, analyser: &mut Analyser<'_>, _: Option<&TypeId>) -> Option<TypeId> {
        match analyser.scopes.find_entry(self.name.as_str()).cloned() {
            Some(variable) => {
                analyser.resolve(self.id, Resolution::Local(variable.slot));
                variable.ty
            }
            None => {
                let error = if analyser.registry.has_type(&self.name) {
                    Error::TypeAsValue {
                        id: self.id,
                        name: self.name.clone(),
                    }
                } else {
                    Error::UnknownIdentifier {
                        id: self.id,
                        name: self.name.clone(),
                    }
                };
                analyser.error(error);
                None
            }
        }
    }
}

impl TypeInferable for Binary {
    fn infer_types(&self, analyser: &mut Analyser<'_>, _: Option<&TypeId>) -> Option<TypeId> {
        let (lhs, rhs) = if matches!(self.op, BinaryOp::And | BinaryOp::Or) {
            (
                analyser.value(&self.lhs, Some(&TypeId::Bool)),
                analyser.value(&self.rhs, Some(&TypeId::Bool)),
            )
        } else if is_plain_int_literal(&self.lhs) && !is_plain_int_literal(&self.rhs) {
            // a literal on the left adopts the type of the right operand
            let rhs = analyser.value(&self.rhs, None);
            (analyser.value(&self.lhs, rhs.as_ref()), rhs)
        } else {
            let lhs = analyser.value(&self.lhs, None);
            let rhs = analyser.value(&self.rhs, lhs.as_ref());
            (lhs, rhs)
        };
        let (lhs, rhs) = (lhs?, rhs?);
        let result = binary_result(self.op, &lhs, &rhs);
        if result.is_none() {
            analyser.error(Error::InvalidOperands {
                id: self.id,
                op: self.op.symbol().into(),
                lhs,
                rhs,
            });
        }
        result
    }
}

impl TypeInferable for Unary {
    fn infer_types(&self, analyser: &mut Analyser<'_>, expected: Option<&TypeId>) -> Option<TypeId> {
        let operand = analyser.value(&self.operand, expected)?;
        let (valid, op) = match self.op {
            UnaryOp::Neg => (operand.is_numeric(), "-"),
            UnaryOp::Not => (operand == TypeId::Bool, "!"),
        };
        if valid {
            Some(operand)
        } else {
            analyser.error(Error::InvalidOperand {
                id: self.id,
                op,
                operand,
            });
            None
        }
    }
}

impl TypeInferable for Call {
    fn infer_types(&self, analyser: &mut Analyser<'_>, _: Option<&TypeId>) -> Option<TypeId> {
        if let Some(intrinsic) = Intrinsic::from_function_name(&self.name) {
            analyser.resolve(self.id, Resolution::Call(CallTarget::Intrinsic(intrinsic)));
            return analyser.intrinsic_call(intrinsic, self);
        }
        if let Some(&index) = analyser.function_index.get(&self.name) {
            let info = analyser.analysis.functions[index].clone();
            analyser.resolve(self.id, Resolution::Call(CallTarget::Script(index)));
            analyser.check_args(&self.name, self.id, &self.args, &info.params);
            return info.result;
        }
        let registry = analyser.registry;
        if let Some(function) = registry.function(&self.name) {
            return analyser.host_call(&self.name, self.id, &self.args, function);
        }
        analyser.error(Error::UnknownFunction {
            id: self.id,
            name: self.name.clone(),
        });
        for arg in &self.args {
            analyser.expr(arg, None);
        }
        None
    }
}

impl TypeInferable for MemberCall {
    fn infer_types(&self, analyser: &mut Analyser<'_>, _: Option<&TypeId>) -> Option<TypeId> {
        if let Expr::Ident(receiver) = &*self.receiver {
            let is_variable = analyser.scopes.find_entry(receiver.name.as_str()).is_some();
            if !is_variable && analyser.registry.has_type(&receiver.name) {
                return analyser.type_function_call(&receiver.name, self);
            }
        }

        let Some(receiver) = analyser.value(&self.receiver, None) else {
            for arg in &self.args {
                analyser.expr(arg, None);
            }
            return None;
        };
        use Intrinsic::*;
        let (intrinsic, params, result) = match (&receiver, self.method.as_str()) {
            (TypeId::Array(_), "count") => (ArrayCount, vec![], TypeId::Int32),
            (TypeId::Array(element), "append") => (ArrayAppend, vec![(**element).clone()], TypeId::Void),
            (TypeId::String, "length") => (StringLength, vec![], TypeId::Int32),
            (TypeId::State(inner), "get") if self.args.is_empty() => (StateGet, vec![], (**inner).clone()),
            (TypeId::State(inner), "get") => (StateGetOr, vec![(**inner).clone()], (**inner).clone()),
            (TypeId::State(inner), "set") => (StateSet, vec![(**inner).clone()], TypeId::Void),
            (TypeId::State(_), "existed") => (StateExisted, vec![], TypeId::Bool),
            _ => {
                analyser.error(Error::UnknownMethod {
                    id: self.id,
                    ty: receiver,
                    name: self.method.clone(),
                });
                for arg in &self.args {
                    analyser.expr(arg, None);
                }
                return None;
            }
        };
        analyser.resolve(self.id, Resolution::Call(CallTarget::Intrinsic(intrinsic)));
        let params: Vec<_> = params.into_iter().map(Some).collect();
        let callee = format!("{receiver}.{}", self.method);
        analyser.check_args(&callee, self.id, &self.args, &params);
        Some(result)
    }
}

impl TypeInferable for Index {
    fn infer_types(&self, analyser: &mut Analyser<'_>, _: Option<&TypeId>) -> Option<TypeId> {
        let target = analyser.value(&self.target, None);
        analyser.expect_type(&self.index, &TypeId::Int32, "array index");
        match target? {
            TypeId::Array(element) => Some(*element),
            other => {
                analyser.error(Error::NotIndexable {
                    id: self.id,
                    ty: other,
                });
                None
            }
        }
    }
}

impl TypeInferable for Construct {
    fn infer_types(&self, analyser: &mut Analyser<'_>, _: Option<&TypeId>) -> Option<TypeId> {
        let Some(ty) = analyser.resolve_type(&self.ty) else {
            for arg in &self.args {
                analyser.expr(arg, None);
            }
            return None;
        };
        let callee = ty.to_string();
        match &ty {
            TypeId::Array(_) => {
                analyser.check_arity(&callee, self.id, self.args.len(), 0, 1);
                for arg in &self.args {
                    analyser.expect_type(arg, &TypeId::Int32, "array length");
                }
                Some(ty)
            }
            TypeId::State(_) => {
                analyser.check_args(&callee, self.id, &self.args, &[Some(TypeId::String)]);
                Some(ty)
            }
            _ => {
                analyser.error(Error::NotConstructible { id: self.id, ty });
                None
            }
        }
    }
}
