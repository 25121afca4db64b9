//! Turns source text into the AST.
//!
//! Every node that is created gets the next free id, and its location is pushed to the
//! location vec at that index.

use pest::error::{ErrorVariant, LineColLocation};
use pest::{Parser, Token};
use pest_derive::Parser;
use thiserror::Error;

use crate::core::*;
use crate::utils;

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct LedgerParser;

pub type LocationVec = Vec<Location>;
pub type ParseResult<T> = Result<T, ParseError>;

pub type Pair<'a> = pest::iterators::Pair<'a, Rule>;
pub type Pairs<'a> = pest::iterators::Pairs<'a, Rule>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("syntax error, {message}")]
    Syntax { location: Location, message: String },

    #[error("integer literal {text} is too large")]
    IntLiteral { location: Location, text: String },

    #[error("invalid escape sequence \\{escape} in string literal")]
    InvalidEscape { location: Location, escape: char },

    #[error("unexpected {rule} while building the syntax tree")]
    UnexpectedRule { location: Location, rule: String },

    #[error("statement is too complex, it may contain at most {limit} operations")]
    TooComplex { location: Location, limit: usize },
}

impl ParseError {
    pub fn location(&self) -> Location {
        match self {
            Self::Syntax { location, .. }
            | Self::IntLiteral { location, .. }
            | Self::InvalidEscape { location, .. }
            | Self::UnexpectedRule { location, .. }
            | Self::TooComplex { location, .. } => *location,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.location(), self.to_string())
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(e: pest::error::Error<Rule>) -> Self {
        let (line, column) = match &e.line_col {
            LineColLocation::Pos(pos) => *pos,
            LineColLocation::Span(start, _) => *start,
        };
        #[allow(unreachable_patterns)]
        let message = match &e.variant {
            ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
                let expected: Vec<_> = positives.iter().map(describe_rule).collect();
                format!("expected {}", expected.join(" or "))
            }
            ErrorVariant::ParsingError { .. } => "unexpected input".to_owned(),
            ErrorVariant::CustomError { message } => message.clone(),
            _ => "unexpected input".to_owned(),
        };
        Self::Syntax {
            location: Location::new(line, column),
            message,
        }
    }
}

fn describe_rule(rule: &Rule) -> String {
    match rule {
        Rule::EOI => "end of input".into(),
        Rule::ident => "identifier".into(),
        Rule::expr | Rule::or_expr => "expression".into(),
        Rule::type_expr => "type".into(),
        Rule::function_def => "function definition".into(),
        Rule::assign_op => "assignment".into(),
        other => format!("{other:?}").replace('_', " "),
    }
}

/// the most operators, calls, constructors and indexing operations a single statement
/// may contain. Bounds the depth of the tree built from it
pub const MAX_STATEMENT_OPERATIONS: usize = 512;

fn is_statement(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::var_decl
            | Rule::assign_stmt
            | Rule::expr_stmt
            | Rule::if_stmt
            | Rule::while_stmt
            | Rule::for_stmt
            | Rule::return_stmt
    )
}

fn is_operation(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::unary_op
            | Rule::or_op
            | Rule::and_op
            | Rule::cmp_op
            | Rule::add_op
            | Rule::mul_op
            | Rule::member_call
            | Rule::index
            | Rule::call
            | Rule::generic_ctor
            | Rule::array_lit
    )
}

/// counts the operations of each statement on the flat token stream, before any tree
/// is built. Nested statements are counted on their own
fn check_complexity(pairs: &Pairs) -> ParseResult<()> {
    let mut statements: Vec<(usize, Location)> = vec![];
    for token in pairs.clone().tokens() {
        match token {
            Token::Start { rule, pos } if is_statement(rule) => {
                let (line, column) = pos.line_col();
                statements.push((0, Location::new(line, column)));
            }
            Token::End { rule, .. } if is_statement(rule) => {
                statements.pop();
            }
            Token::Start { rule, .. } if is_operation(rule) => {
                if let Some((count, location)) = statements.last_mut() {
                    *count += 1;
                    if *count > MAX_STATEMENT_OPERATIONS {
                        return Err(ParseError::TooComplex {
                            location: *location,
                            limit: MAX_STATEMENT_OPERATIONS,
                        });
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// parses a whole script
pub fn parse(src: &str) -> ParseResult<(Program, LocationVec)> {
    let mut pairs = LedgerParser::parse(Rule::file, src)?;
    check_complexity(&pairs)?;
    let mut locations = vec![];
    let file = pairs.next().ok_or_else(|| ParseError::UnexpectedRule {
        location: Location::new(1, 1),
        rule: "empty parse tree".into(),
    })?;
    let program = parse_program(file, &mut locations)?;
    Ok((program, locations))
}

fn new_id(pair: &Pair, locations: &mut LocationVec) -> NodeId {
    let (line, column) = pair.as_span().start_pos().line_col();
    locations.push(Location::new(line, column));
    locations.len() - 1
}

fn location_of(pair: &Pair) -> Location {
    let (line, column) = pair.as_span().start_pos().line_col();
    Location::new(line, column)
}

fn unexpected(pair: &Pair) -> ParseError {
    ParseError::UnexpectedRule {
        location: location_of(pair),
        rule: format!("{:?}", pair.as_rule()),
    }
}

fn next_child<'a>(parent: &Pair<'a>, children: &mut Pairs<'a>) -> ParseResult<Pair<'a>> {
    children.next().ok_or_else(|| unexpected(parent))
}

fn parse_program(pair: Pair, locations: &mut LocationVec) -> ParseResult<Program> {
    let id = new_id(&pair, locations);
    let functions = utils::sequence_result(
        pair.into_inner()
            .filter(|p| p.as_rule() != Rule::EOI)
            .map(|p| parse_function(p, locations)),
    )?;
    Ok(Program { id, functions })
}

fn parse_function(pair: Pair, locations: &mut LocationVec) -> ParseResult<FunctionDef> {
    let id = new_id(&pair, locations);
    let parent = pair.clone();
    let mut name = None;
    let mut params = vec![];
    let mut return_type = None;
    let mut body = None;
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::ident => name = Some(child.as_str().to_owned()),
            Rule::param => params.push(parse_param(child, locations)?),
            Rule::type_expr => return_type = Some(parse_type(child, locations)?),
            Rule::block => body = Some(parse_block(child, locations)?),
            _ => return Err(unexpected(&child)),
        }
    }
    match (name, body) {
        (Some(name), Some(body)) => Ok(FunctionDef {
            id,
            name,
            params,
            return_type,
            body,
        }),
        _ => Err(unexpected(&parent)),
    }
}

fn parse_param(pair: Pair, locations: &mut LocationVec) -> ParseResult<Param> {
    let id = new_id(&pair, locations);
    let mut children = pair.clone().into_inner();
    let name = next_child(&pair, &mut children)?.as_str().to_owned();
    let ty = parse_type(next_child(&pair, &mut children)?, locations)?;
    Ok(Param { id, name, ty })
}

fn parse_type(pair: Pair, locations: &mut LocationVec) -> ParseResult<TypeExpr> {
    let id = new_id(&pair, locations);
    let mut children = pair.clone().into_inner();
    let name = next_child(&pair, &mut children)?.as_str().to_owned();
    let arg = match children.next() {
        Some(arg) => Some(Box::new(parse_type(arg, locations)?)),
        None => None,
    };
    Ok(TypeExpr { id, name, arg })
}

fn parse_block(pair: Pair, locations: &mut LocationVec) -> ParseResult<Block> {
    let id = new_id(&pair, locations);
    let stmts =
        utils::sequence_result(pair.into_inner().map(|p| parse_statement(p, locations)))?;
    Ok(Block { id, stmts })
}

fn parse_statement(pair: Pair, locations: &mut LocationVec) -> ParseResult<Stmt> {
    let id = new_id(&pair, locations);
    let parent = pair.clone();
    let mut children = pair.clone().into_inner();
    Ok(match pair.as_rule() {
        Rule::var_decl => {
            let name = next_child(&parent, &mut children)?.as_str().to_owned();
            let mut ty = None;
            let mut init = None;
            for child in children {
                match child.as_rule() {
                    Rule::type_expr => ty = Some(parse_type(child, locations)?),
                    Rule::expr => init = Some(parse_expr(child, locations)?),
                    _ => return Err(unexpected(&child)),
                }
            }
            VarDecl { id, name, ty, init }.into()
        }
        Rule::assign_stmt => {
            let target = parse_expr(next_child(&parent, &mut children)?, locations)?;
            let op_pair = next_child(&parent, &mut children)?;
            let op = match op_pair.as_str() {
                "=" => AssignOp::Set,
                "+=" => AssignOp::Add,
                "-=" => AssignOp::Sub,
                "*=" => AssignOp::Mul,
                "/=" => AssignOp::Div,
                _ => return Err(unexpected(&op_pair)),
            };
            let value = parse_expr(next_child(&parent, &mut children)?, locations)?;
            Assign {
                id,
                target,
                op,
                value,
            }
            .into()
        }
        Rule::expr_stmt => {
            let expr = parse_expr(next_child(&parent, &mut children)?, locations)?;
            ExprStmt { id, expr }.into()
        }
        Rule::if_stmt => {
            let condition = parse_expr(next_child(&parent, &mut children)?, locations)?;
            let body = parse_block(next_child(&parent, &mut children)?, locations)?;
            let mut branches = vec![CondBranch {
                id,
                condition,
                body,
            }];
            let mut else_body = None;
            for child in children {
                match child.as_rule() {
                    Rule::elseif_clause => {
                        let branch_id = new_id(&child, locations);
                        let mut inner = child.clone().into_inner();
                        let condition = parse_expr(next_child(&child, &mut inner)?, locations)?;
                        let body = parse_block(next_child(&child, &mut inner)?, locations)?;
                        branches.push(CondBranch {
                            id: branch_id,
                            condition,
                            body,
                        });
                    }
                    Rule::else_clause => {
                        let mut inner = child.clone().into_inner();
                        else_body = Some(parse_block(next_child(&child, &mut inner)?, locations)?);
                    }
                    _ => return Err(unexpected(&child)),
                }
            }
            If {
                id,
                branches,
                else_body,
            }
            .into()
        }
        Rule::while_stmt => {
            let condition = parse_expr(next_child(&parent, &mut children)?, locations)?;
            let body = parse_block(next_child(&parent, &mut children)?, locations)?;
            While {
                id,
                condition,
                body,
            }
            .into()
        }
        Rule::for_stmt => {
            let var = next_child(&parent, &mut children)?.as_str().to_owned();
            let from = parse_expr(next_child(&parent, &mut children)?, locations)?;
            let to = parse_expr(next_child(&parent, &mut children)?, locations)?;
            let mut step = None;
            let mut body = None;
            for child in children {
                match child.as_rule() {
                    Rule::expr => step = Some(parse_expr(child, locations)?),
                    Rule::block => body = Some(parse_block(child, locations)?),
                    _ => return Err(unexpected(&child)),
                }
            }
            let body = body.ok_or_else(|| unexpected(&parent))?;
            For {
                id,
                var,
                from,
                to,
                step,
                body,
            }
            .into()
        }
        Rule::return_stmt => {
            let value = match children.next() {
                Some(child) => Some(parse_expr(child, locations)?),
                None => None,
            };
            Return { id, value }.into()
        }
        Rule::break_stmt => Break { id }.into(),
        Rule::continue_stmt => Continue { id }.into(),
        _ => return Err(unexpected(&pair)),
    })
}

fn parse_expr(pair: Pair, locations: &mut LocationVec) -> ParseResult<Expr> {
    match pair.as_rule() {
        Rule::expr => {
            let mut children = pair.clone().into_inner();
            parse_expr(next_child(&pair, &mut children)?, locations)
        }
        Rule::or_expr | Rule::and_expr | Rule::cmp_expr | Rule::add_expr | Rule::mul_expr => {
            parse_binary_chain(pair, locations)
        }
        Rule::unary_expr => parse_unary(pair, locations),
        Rule::postfix_expr => parse_postfix(pair, locations),
        Rule::int_lit => parse_int(pair, locations),
        Rule::float_lit => {
            let value = pair.as_str().parse::<f64>().map_err(|_| unexpected(&pair))?;
            let id = new_id(&pair, locations);
            Ok(FloatLit { id, value }.into())
        }
        Rule::bool_lit => {
            let id = new_id(&pair, locations);
            Ok(BoolLit {
                id,
                value: pair.as_str() == "true",
            }
            .into())
        }
        Rule::string_lit => parse_string(pair, locations),
        Rule::array_lit => {
            let id = new_id(&pair, locations);
            let elements =
                utils::sequence_result(pair.into_inner().map(|p| parse_expr(p, locations)))?;
            Ok(ArrayLit { id, elements }.into())
        }
        Rule::ident => {
            let id = new_id(&pair, locations);
            Ok(Ident {
                id,
                name: pair.as_str().to_owned(),
            }
            .into())
        }
        Rule::call => {
            let id = new_id(&pair, locations);
            let mut children = pair.clone().into_inner();
            let name = next_child(&pair, &mut children)?.as_str().to_owned();
            let args = parse_args(next_child(&pair, &mut children)?, locations)?;
            Ok(Call { id, name, args }.into())
        }
        Rule::generic_ctor => {
            let id = new_id(&pair, locations);
            let mut children = pair.clone().into_inner();
            let name_pair = next_child(&pair, &mut children)?;
            let type_id = new_id(&name_pair, locations);
            let arg = parse_type(next_child(&pair, &mut children)?, locations)?;
            let args = parse_args(next_child(&pair, &mut children)?, locations)?;
            Ok(Construct {
                id,
                ty: TypeExpr {
                    id: type_id,
                    name: name_pair.as_str().to_owned(),
                    arg: Some(Box::new(arg)),
                },
                args,
            }
            .into())
        }
        _ => Err(unexpected(&pair)),
    }
}

fn parse_args(pair: Pair, locations: &mut LocationVec) -> ParseResult<Vec<Expr>> {
    utils::sequence_result(pair.into_inner().map(|p| parse_expr(p, locations)))
}

/// folds `a op b op c` to the left
fn parse_binary_chain(pair: Pair, locations: &mut LocationVec) -> ParseResult<Expr> {
    let mut children = pair.clone().into_inner();
    let mut lhs = parse_expr(next_child(&pair, &mut children)?, locations)?;
    while let Some(op_pair) = children.next() {
        let op = BinaryOp::from_symbol(op_pair.as_str()).ok_or_else(|| unexpected(&op_pair))?;
        let id = new_id(&op_pair, locations);
        let rhs = parse_expr(next_child(&pair, &mut children)?, locations)?;
        lhs = Binary {
            id,
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
        .into();
    }
    Ok(lhs)
}

fn parse_unary(pair: Pair, locations: &mut LocationVec) -> ParseResult<Expr> {
    let mut ops = vec![];
    let mut operand = None;
    for child in pair.clone().into_inner() {
        match child.as_rule() {
            Rule::unary_op => {
                let op = if child.as_str() == "-" {
                    UnaryOp::Neg
                } else {
                    UnaryOp::Not
                };
                ops.push((op, new_id(&child, locations)));
            }
            _ => operand = Some(parse_expr(child, locations)?),
        }
    }
    let mut expr = operand.ok_or_else(|| unexpected(&pair))?;
    // `-2147483648` is a literal, not the negation of one that is out of range
    if let Expr::IntLit(lit) = &mut expr {
        if matches!(ops.last(), Some((UnaryOp::Neg, _))) {
            lit.value = -lit.value;
            ops.pop();
        }
    }
    for (op, id) in ops.into_iter().rev() {
        expr = Unary {
            id,
            op,
            operand: Box::new(expr),
        }
        .into();
    }
    Ok(expr)
}

fn parse_postfix(pair: Pair, locations: &mut LocationVec) -> ParseResult<Expr> {
    let mut children = pair.clone().into_inner();
    let mut expr = parse_expr(next_child(&pair, &mut children)?, locations)?;
    for post in children {
        let id = new_id(&post, locations);
        let mut inner = post.clone().into_inner();
        expr = match post.as_rule() {
            Rule::member_call => {
                let method = next_child(&post, &mut inner)?.as_str().to_owned();
                let args = parse_args(next_child(&post, &mut inner)?, locations)?;
                MemberCall {
                    id,
                    receiver: Box::new(expr),
                    method,
                    args,
                }
                .into()
            }
            Rule::index => {
                let index = parse_expr(next_child(&post, &mut inner)?, locations)?;
                Index {
                    id,
                    target: Box::new(expr),
                    index: Box::new(index),
                }
                .into()
            }
            _ => return Err(unexpected(&post)),
        };
    }
    Ok(expr)
}

fn parse_int(pair: Pair, locations: &mut LocationVec) -> ParseResult<Expr> {
    let text = pair.as_str();
    let (digits, wide) = if let Some(digits) = text.strip_suffix("i64") {
        (digits, true)
    } else if let Some(digits) = text.strip_suffix("i32") {
        (digits, false)
    } else {
        (text, false)
    };
    let value = digits.parse::<i64>().map_err(|_| ParseError::IntLiteral {
        location: location_of(&pair),
        text: text.to_owned(),
    })?;
    let id = new_id(&pair, locations);
    Ok(IntLit { id, value, wide }.into())
}

fn parse_string(pair: Pair, locations: &mut LocationVec) -> ParseResult<Expr> {
    let id = new_id(&pair, locations);
    let raw = pair
        .clone()
        .into_inner()
        .next()
        .map(|p| p.as_str())
        .unwrap_or("");
    let mut value = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => value.push('\n'),
            Some('t') => value.push('\t'),
            Some('r') => value.push('\r'),
            Some('0') => value.push('\0'),
            Some('"') => value.push('"'),
            Some('\\') => value.push('\\'),
            Some(other) => {
                return Err(ParseError::InvalidEscape {
                    location: location_of(&pair),
                    escape: other,
                })
            }
            None => return Err(unexpected(&pair)),
        }
    }
    Ok(StrLit { id, value }.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn parse_main_body(body: &str) -> Vec<Stmt> {
        let src = format!("function main()\n{body}\nendfunction");
        let (program, _) = parse(&src).unwrap();
        program.functions[0].body.stmts.clone()
    }

    #[test]
    fn test_function_header() {
        let (program, locations) = parse(indoc! {"
            function add(a : Int32, b : Int32) : Int32
              return a + b;
            endfunction
        "})
        .unwrap();
        let f = &program.functions[0];
        assert_eq!(f.name, "add");
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.return_type.as_ref().map(|t| t.name.as_str()), Some("Int32"));
        let Stmt::Return(ret) = &f.body.stmts[0] else {
            panic!("expected a return statement");
        };
        assert_eq!(locations[ret.id].line, 2);
    }

    #[test]
    fn test_precedence() {
        let stmts = parse_main_body("var x = 1 + 2 * 3;");
        let Stmt::VarDecl(decl) = &stmts[0] else {
            panic!("expected a declaration");
        };
        let Some(Expr::Binary(add)) = &decl.init else {
            panic!("expected a binary expression");
        };
        assert_eq!(add.op, BinaryOp::Add);
        assert!(matches!(&*add.rhs, Expr::Binary(Binary { op: BinaryOp::Mul, .. })));
    }

    #[test]
    fn test_left_associativity() {
        let stmts = parse_main_body("var x = 10 - 3 - 2;");
        let Stmt::VarDecl(VarDecl { init: Some(Expr::Binary(outer)), .. }) = &stmts[0] else {
            panic!("expected a binary expression");
        };
        assert!(matches!(&*outer.lhs, Expr::Binary(Binary { op: BinaryOp::Sub, .. })));
        assert!(matches!(&*outer.rhs, Expr::IntLit(IntLit { value: 2, .. })));
    }

    #[test]
    fn test_keyword_prefixed_identifiers() {
        let stmts = parse_main_body("variable = 3; iffy(format);");
        assert!(matches!(&stmts[0], Stmt::Assign(_)));
        let Stmt::Expr(ExprStmt { expr: Expr::Call(call), .. }) = &stmts[1] else {
            panic!("expected a call");
        };
        assert_eq!(call.name, "iffy");
    }

    #[test]
    fn test_member_calls_and_constructors() {
        let stmts = parse_main_body(indoc! {r#"
            var s = State<Int32>("counter");
            s.set(s.get(0) + 1);
            var n = System.Argc();
        "#});
        let Stmt::VarDecl(VarDecl { init: Some(Expr::Construct(ctor)), .. }) = &stmts[0] else {
            panic!("expected a constructor");
        };
        assert_eq!(ctor.ty.to_string(), "State<Int32>");
        assert!(matches!(&stmts[1], Stmt::Expr(ExprStmt { expr: Expr::MemberCall(_), .. })));
    }

    #[test]
    fn test_control_flow() {
        let stmts = parse_main_body(indoc! {"
            for (i in 0 : 10 : 2)
              if (i == 4)
                continue;
              elseif (i > 6)
                break;
              else
                printLn(i);
              endif
            endfor
            while (false)
            endwhile
        "});
        let Stmt::For(for_loop) = &stmts[0] else {
            panic!("expected a for loop");
        };
        assert!(for_loop.step.is_some());
        let Stmt::If(if_stmt) = &for_loop.body.stmts[0] else {
            panic!("expected an if statement");
        };
        assert_eq!(if_stmt.branches.len(), 2);
        assert!(if_stmt.else_body.is_some());
        assert!(matches!(&stmts[1], Stmt::While(_)));
    }

    #[test]
    fn test_literals() {
        let stmts = parse_main_body(r#"var a = [1, 2i64, 1.5, "x\ty\"", true];"#);
        let Stmt::VarDecl(VarDecl { init: Some(Expr::ArrayLit(arr)), .. }) = &stmts[0] else {
            panic!("expected an array literal");
        };
        assert!(matches!(&arr.elements[1], Expr::IntLit(IntLit { value: 2, wide: true, .. })));
        assert!(matches!(&arr.elements[3], Expr::StrLit(StrLit { value, .. }) if value == "x\ty\""));
    }

    #[test]
    fn test_syntax_error_location() {
        let err = parse("function main()\n  var x = ;\nendfunction").unwrap_err();
        assert_eq!(err.location().line, 2);
        assert!(err.to_diagnostic().to_string().starts_with("line 2: syntax error"));
    }

    #[test]
    fn test_comparison_is_not_associative() {
        assert!(parse("function main()\n var b = 1 < 2 < 3;\nendfunction").is_err());
    }

    #[test]
    fn test_comments() {
        let stmts = parse_main_body("// a comment\n/* block\ncomment */ printLn(1); // trailing");
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn test_minus_is_folded_into_literals() {
        let stmts = parse_main_body("var a = -2147483648; var b = - -3; var c = -x;");
        let Stmt::VarDecl(VarDecl { init: Some(a), .. }) = &stmts[0] else {
            panic!("expected a declaration");
        };
        assert!(matches!(a, Expr::IntLit(IntLit { value: -2147483648, .. })));
        let Stmt::VarDecl(VarDecl { init: Some(Expr::Unary(b)), .. }) = &stmts[1] else {
            panic!("expected a negation");
        };
        assert!(matches!(&*b.operand, Expr::IntLit(IntLit { value: -3, .. })));
        let Stmt::VarDecl(VarDecl { init: Some(c), .. }) = &stmts[2] else {
            panic!("expected a declaration");
        };
        assert!(matches!(c, Expr::Unary(Unary { op: UnaryOp::Neg, .. })));
    }

    #[test]
    fn test_statement_complexity_is_limited() {
        let within = format!("var a = {}1;", "-".repeat(MAX_STATEMENT_OPERATIONS));
        assert_eq!(parse_main_body(&within).len(), 1);

        let deep = format!(
            "function main() : Int32\n  return {}1;\nendfunction",
            "-".repeat(10_000)
        );
        let err = parse(&deep).unwrap_err();
        assert!(matches!(err, ParseError::TooComplex { .. }));
        assert_eq!(err.location().line, 2);

        let long = format!("var a = 1{};", " + 1".repeat(MAX_STATEMENT_OPERATIONS + 1));
        let err = parse(&format!("function main()\n{long}\nendfunction")).unwrap_err();
        assert!(matches!(err, ParseError::TooComplex { .. }));

        // every statement has its own budget
        let many = format!("var a = 1{};\n", " + 1".repeat(400)).repeat(3);
        assert_eq!(parse_main_body(&many).len(), 3);
    }
}
