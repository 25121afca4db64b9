//! Contains the AST types. Every node has an `id` field. The id is the index into the
//! location vec that the parser returns together with the tree.

use derive_more::From;
use proc_macros::AstNode;

use super::ast_macros::mk_enum_node;

pub type NodeId = usize;

/// implemented by every node, usually via `#[derive(AstNode)]`
pub trait AstNode {
    fn id(&self) -> NodeId;
}

/// where a node starts in the source text. Both values are 1 based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            line: u32::try_from(line).unwrap_or(u32::MAX),
            column: u32::try_from(column).unwrap_or(u32::MAX),
        }
    }
}

/// a whole script: a list of function definitions
#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct Program {
    pub id: NodeId,
    pub functions: Vec<FunctionDef>,
}

#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct FunctionDef {
    pub id: NodeId,
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct Param {
    pub id: NodeId,
    pub name: String,
    pub ty: TypeExpr,
}

/// a type as written in the source, e.g. `Array<Int32>`
#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct TypeExpr {
    pub id: NodeId,
    pub name: String,
    pub arg: Option<Box<TypeExpr>>,
}

impl std::fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.arg {
            Some(arg) => write!(f, "{}<{}>", self.name, arg),
            None => write!(f, "{}", self.name),
        }
    }
}

/// represents multiple statements that are executed one after another
#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct Block {
    pub id: NodeId,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, From, AstNode)]
pub enum Stmt {
    VarDecl(VarDecl),
    Assign(Assign),
    If(If),
    While(While),
    For(For),
    Return(Return),
    Break(Break),
    Continue(Continue),
    Expr(ExprStmt),
}

/// `var name [: type] [= init];`
#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct VarDecl {
    pub id: NodeId,
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    /// the arithmetic a compound assignment performs
    pub fn binary_op(&self) -> Option<BinaryOp> {
        match self {
            Self::Set => None,
            Self::Add => Some(BinaryOp::Add),
            Self::Sub => Some(BinaryOp::Sub),
            Self::Mul => Some(BinaryOp::Mul),
            Self::Div => Some(BinaryOp::Div),
        }
    }
}

/// `target op value;` where target is a variable or an index expression
#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct Assign {
    pub id: NodeId,
    pub target: Expr,
    pub op: AssignOp,
    pub value: Expr,
}

/// one `if` or `elseif` arm
#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct CondBranch {
    pub id: NodeId,
    pub condition: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct If {
    pub id: NodeId,
    pub branches: Vec<CondBranch>,
    pub else_body: Option<Block>,
}

#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct While {
    pub id: NodeId,
    pub condition: Expr,
    pub body: Block,
}

/// `for (var in from : to [: step]) ... endfor`, the range is half open
#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct For {
    pub id: NodeId,
    pub var: String,
    pub from: Expr,
    pub to: Expr,
    pub step: Option<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct Return {
    pub id: NodeId,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct Break {
    pub id: NodeId,
}

#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct Continue {
    pub id: NodeId,
}

#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct ExprStmt {
    pub id: NodeId,
    pub expr: Expr,
}

mk_enum_node!(
    /// represents an expression
    Expr,
    IntLit,
    FloatLit,
    StrLit,
    BoolLit,
    ArrayLit,
    Ident,
    Binary,
    Unary,
    Call,
    MemberCall,
    Index,
    Construct
);

/// an integer literal. `wide` is set for literals with the `i64` suffix
#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct IntLit {
    pub id: NodeId,
    pub value: i64,
    pub wide: bool,
}

#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct FloatLit {
    pub id: NodeId,
    pub value: f64,
}

/// a string literal with its escapes already resolved
#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct StrLit {
    pub id: NodeId,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct BoolLit {
    pub id: NodeId,
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct ArrayLit {
    pub id: NodeId,
    pub elements: Vec<Expr>,
}

/// represents a variable, respectively its value
#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct Ident {
    pub id: NodeId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "||" => Self::Or,
            "&&" => Self::And,
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Rem,
            _ => return None,
        })
    }
}

/// the id of a binary node locates its operator
#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct Binary {
    pub id: NodeId,
    pub op: BinaryOp,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct Unary {
    pub id: NodeId,
    pub op: UnaryOp,
    pub operand: Box<Expr>,
}

/// `name(args)`: a script function, an intrinsic or a free host function
#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct Call {
    pub id: NodeId,
    pub name: String,
    pub args: Vec<Expr>,
}

/// `receiver.method(args)`. If the receiver names a registered host type, this is a
/// call of one of the type's functions instead
#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct MemberCall {
    pub id: NodeId,
    pub receiver: Box<Expr>,
    pub method: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct Index {
    pub id: NodeId,
    pub target: Box<Expr>,
    pub index: Box<Expr>,
}

/// `Array<T>(len)` or `State<T>(key)`
#[derive(Debug, Clone, PartialEq, AstNode)]
pub struct Construct {
    pub id: NodeId,
    pub ty: TypeExpr,
    pub args: Vec<Expr>,
}
