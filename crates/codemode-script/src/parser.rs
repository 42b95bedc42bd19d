//! Script parser
//!
//! The grammar lives in `script.pest`; this module folds pest pairs into the
//! [`crate::ast`] tree. Binary operator precedence is resolved with a
//! [`PrattParser`], lowest first:
//!
//! ```text
//! ??  ||  &&  == != === !==  < <= > >=  + -  * / %  ** (right)
//! ```

use crate::ast::{
    AssignOp, BinaryOp, DeclKind, Element, Expr, FunctionBody, FunctionDef, LogicalOp, ObjectMember,
    Param, Pattern, PatternElem, PatternProp, Program, PropKey, Stmt, TemplatePart, UnaryOp,
};
use crate::error::ParseError;
use crate::value::number_to_string;
use once_cell::sync::Lazy;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use std::sync::Arc;

#[derive(pest_derive::Parser)]
#[grammar = "script.pest"]
pub(crate) struct ScriptParser;

static PRATT: Lazy<PrattParser<Rule>> = Lazy::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::nullish, Assoc::Left))
        .op(Op::infix(Rule::or, Assoc::Left))
        .op(Op::infix(Rule::and, Assoc::Left))
        .op(Op::infix(Rule::strict_eq, Assoc::Left)
            | Op::infix(Rule::strict_ne, Assoc::Left)
            | Op::infix(Rule::eq, Assoc::Left)
            | Op::infix(Rule::ne, Assoc::Left))
        .op(Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::rem, Assoc::Left))
        .op(Op::infix(Rule::pow, Assoc::Right))
});

type Result<T> = std::result::Result<T, ParseError>;

/// Parse script text into a [`Program`]
///
/// # Errors
/// Returns [`ParseError`] when the text is not a valid script.
pub fn parse(source: &str) -> Result<Program> {
    let mut pairs = ScriptParser::parse(Rule::program, source).map_err(ParseError::from_pest)?;
    let Some(program) = pairs.next() else {
        return Ok(Program {
            body: Arc::new(Vec::new()),
        });
    };

    let body = program
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(build_stmt)
        .collect::<Result<Vec<_>>>()?;

    Ok(Program { body: Arc::new(body) })
}

// Keyword tokens carry no information once the enclosing rule matched.
fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_if
            | Rule::kw_else
            | Rule::kw_while
            | Rule::kw_do
            | Rule::kw_for
            | Rule::kw_break
            | Rule::kw_continue
            | Rule::kw_return
            | Rule::kw_throw
            | Rule::kw_try
            | Rule::kw_catch
            | Rule::kw_finally
            | Rule::kw_function
            | Rule::kw_new
    )
}

fn significant(pair: Pair<'_, Rule>) -> impl Iterator<Item = Pair<'_, Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule()))
}

fn required<'i>(
    next: Option<Pair<'i, Rule>>,
    span: pest::Span<'i>,
    what: &str,
) -> Result<Pair<'i, Rule>> {
    next.ok_or_else(|| ParseError::invalid(span, format!("expected {what}")))
}

fn unexpected(pair: &Pair<'_, Rule>) -> ParseError {
    ParseError::invalid(pair.as_span(), format!("unexpected {:?}", pair.as_rule()))
}

// ---------------------------------------------------------------------------
// Statements

fn build_stmt(pair: Pair<'_, Rule>) -> Result<Stmt> {
    let span = pair.as_span();
    match pair.as_rule() {
        Rule::block => Ok(Stmt::Block(build_stmts(pair)?)),
        Rule::empty_stmt => Ok(Stmt::Empty),
        Rule::expr_stmt => {
            let expr = required(pair.into_inner().next(), span, "expression")?;
            Ok(Stmt::Expr(build_expr(expr)?))
        }
        Rule::var_decl => build_var_decl(pair),
        Rule::function_decl => Ok(Stmt::Function(Arc::new(build_function(pair)?))),
        Rule::if_stmt => {
            let mut inner = significant(pair);
            let test = build_expr(required(inner.next(), span, "condition")?)?;
            let then = build_stmt(required(inner.next(), span, "statement")?)?;
            let otherwise = inner.next().map(build_stmt).transpose()?;
            Ok(Stmt::If {
                test,
                then: Box::new(then),
                otherwise: otherwise.map(Box::new),
            })
        }
        Rule::while_stmt => {
            let mut inner = significant(pair);
            let test = build_expr(required(inner.next(), span, "condition")?)?;
            let body = build_stmt(required(inner.next(), span, "loop body")?)?;
            Ok(Stmt::While {
                test,
                body: Box::new(body),
            })
        }
        Rule::do_while_stmt => {
            let mut inner = significant(pair);
            let body = build_stmt(required(inner.next(), span, "loop body")?)?;
            let test = build_expr(required(inner.next(), span, "condition")?)?;
            Ok(Stmt::DoWhile {
                body: Box::new(body),
                test,
            })
        }
        Rule::for_stmt => build_for(pair),
        Rule::for_each_stmt => build_for_each(pair),
        Rule::return_stmt => {
            let value = significant(pair).next().map(build_expr).transpose()?;
            Ok(Stmt::Return(value))
        }
        Rule::throw_stmt => {
            let value = required(significant(pair).next(), span, "expression")?;
            Ok(Stmt::Throw(build_expr(value)?))
        }
        Rule::break_stmt => Ok(Stmt::Break),
        Rule::continue_stmt => Ok(Stmt::Continue),
        Rule::try_stmt => build_try(pair),
        _ => Err(unexpected(&pair)),
    }
}

fn build_stmts(pair: Pair<'_, Rule>) -> Result<Vec<Stmt>> {
    significant(pair).map(build_stmt).collect()
}

fn build_decl_kind(pair: &Pair<'_, Rule>) -> DeclKind {
    match pair.as_str() {
        "const" => DeclKind::Const,
        "let" => DeclKind::Let,
        _ => DeclKind::Var,
    }
}

fn build_var_decl(pair: Pair<'_, Rule>) -> Result<Stmt> {
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let kind = build_decl_kind(&required(inner.next(), span, "declaration keyword")?);

    let mut declarators = Vec::new();
    for declarator in inner {
        let span = declarator.as_span();
        let mut parts = declarator.into_inner();
        let pattern = build_pattern(required(parts.next(), span, "binding")?)?;
        let init = parts.next().map(build_expr).transpose()?;
        if init.is_none() && kind == DeclKind::Const {
            return Err(ParseError::invalid(span, "missing initializer in const declaration"));
        }
        if init.is_none() && !matches!(pattern, Pattern::Ident(_)) {
            return Err(ParseError::invalid(
                span,
                "missing initializer in destructuring declaration",
            ));
        }
        declarators.push((pattern, init));
    }

    Ok(Stmt::Declare { kind, declarators })
}

fn build_for(pair: Pair<'_, Rule>) -> Result<Stmt> {
    let span = pair.as_span();
    let mut inner = significant(pair);

    let init = required(inner.next(), span, "loop initializer")?;
    let init = match init.into_inner().next() {
        Some(p) if p.as_rule() == Rule::var_decl => Some(Box::new(build_var_decl(p)?)),
        Some(p) => Some(Box::new(Stmt::Expr(build_expr(p)?))),
        None => None,
    };
    let test = required(inner.next(), span, "loop condition")?
        .into_inner()
        .next()
        .map(build_expr)
        .transpose()?;
    let update = required(inner.next(), span, "loop update")?
        .into_inner()
        .next()
        .map(build_expr)
        .transpose()?;
    let body = build_stmt(required(inner.next(), span, "loop body")?)?;

    Ok(Stmt::For {
        init,
        test,
        update,
        body: Box::new(body),
    })
}

fn build_for_each(pair: Pair<'_, Rule>) -> Result<Stmt> {
    let span = pair.as_span();
    let mut inner = significant(pair);

    let kind = build_decl_kind(&required(inner.next(), span, "declaration keyword")?);
    let pattern = build_pattern(required(inner.next(), span, "loop binding")?)?;
    let keys = required(inner.next(), span, "`of` or `in`")?.as_rule() == Rule::kw_in;
    let iterable = build_expr(required(inner.next(), span, "iterable")?)?;
    let body = build_stmt(required(inner.next(), span, "loop body")?)?;

    Ok(Stmt::ForEach {
        kind,
        pattern,
        iterable,
        keys,
        body: Box::new(body),
    })
}

fn build_try(pair: Pair<'_, Rule>) -> Result<Stmt> {
    let span = pair.as_span();
    let mut block = Vec::new();
    let mut handler = None;
    let mut finalizer = None;

    for part in significant(pair) {
        match part.as_rule() {
            Rule::block => block = build_stmts(part)?,
            Rule::catch_clause => {
                let mut binding = None;
                let mut body = Vec::new();
                for child in significant(part) {
                    if child.as_rule() == Rule::block {
                        body = build_stmts(child)?;
                    } else {
                        binding = Some(build_pattern(child)?);
                    }
                }
                handler = Some((binding, body));
            }
            Rule::finally_clause => {
                let body = required(significant(part).next(), span, "finally block")?;
                finalizer = Some(build_stmts(body)?);
            }
            _ => return Err(unexpected(&part)),
        }
    }

    if handler.is_none() && finalizer.is_none() {
        return Err(ParseError::invalid(span, "missing catch or finally after try"));
    }

    Ok(Stmt::Try {
        block,
        handler,
        finalizer,
    })
}

// ---------------------------------------------------------------------------
// Functions and patterns

fn build_function(pair: Pair<'_, Rule>) -> Result<FunctionDef> {
    let mut def = FunctionDef {
        name: None,
        params: Vec::new(),
        body: FunctionBody::Block(Vec::new()),
        is_async: false,
    };

    for part in significant(pair) {
        match part.as_rule() {
            Rule::kw_async => def.is_async = true,
            Rule::ident | Rule::ident_name | Rule::string | Rule::number | Rule::computed_key => {
                if let PropKey::Static(name) = build_prop_key(part)? {
                    def.name = Some(name);
                }
            }
            Rule::params => def.params = build_params(part)?,
            Rule::function_body => def.body = FunctionBody::Block(build_stmts(part)?),
            _ => return Err(unexpected(&part)),
        }
    }

    Ok(def)
}

fn build_arrow(pair: Pair<'_, Rule>) -> Result<FunctionDef> {
    let span = pair.as_span();
    let mut is_async = false;
    let mut params = Vec::new();
    let mut body = None;

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::kw_async => is_async = true,
            Rule::ident => {
                params = vec![Param::Positional(PatternElem {
                    target: Pattern::Ident(part.as_str().to_string()),
                    default: None,
                })];
            }
            Rule::params => params = build_params(part)?,
            Rule::function_body => body = Some(FunctionBody::Block(build_stmts(part)?)),
            _ => body = Some(FunctionBody::Expr(Box::new(build_expr(part)?))),
        }
    }

    Ok(FunctionDef {
        name: None,
        params,
        body: required_body(body, span)?,
        is_async,
    })
}

fn required_body(body: Option<FunctionBody>, span: pest::Span<'_>) -> Result<FunctionBody> {
    body.ok_or_else(|| ParseError::invalid(span, "expected function body"))
}

fn build_params(pair: Pair<'_, Rule>) -> Result<Vec<Param>> {
    pair.into_inner()
        .map(|param| match param.as_rule() {
            Rule::rest_element => Ok(Param::Rest(rest_name(param)?)),
            _ => Ok(Param::Positional(build_binding_element(param)?)),
        })
        .collect()
}

fn rest_name(pair: Pair<'_, Rule>) -> Result<String> {
    let span = pair.as_span();
    Ok(required(pair.into_inner().next(), span, "identifier")?.as_str().to_string())
}

fn build_binding_element(pair: Pair<'_, Rule>) -> Result<PatternElem> {
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let target = build_pattern(required(inner.next(), span, "binding")?)?;
    let default = inner.next().map(build_expr).transpose()?;
    Ok(PatternElem { target, default })
}

fn build_pattern(pair: Pair<'_, Rule>) -> Result<Pattern> {
    match pair.as_rule() {
        Rule::ident => Ok(Pattern::Ident(pair.as_str().to_string())),
        Rule::object_pattern => {
            let mut props = Vec::new();
            let mut rest = None;
            for prop in pair.into_inner() {
                let span = prop.as_span();
                match prop.as_rule() {
                    Rule::rest_element => rest = Some(rest_name(prop)?),
                    Rule::pattern_keyed => {
                        let mut inner = prop.into_inner();
                        let key = build_prop_key(required(inner.next(), span, "property name")?)?;
                        let PatternElem { target, default } =
                            build_binding_element(required(inner.next(), span, "binding")?)?;
                        props.push(PatternProp { key, target, default });
                    }
                    Rule::pattern_shorthand => {
                        let mut inner = prop.into_inner();
                        let name = required(inner.next(), span, "identifier")?.as_str().to_string();
                        let default = inner.next().map(build_expr).transpose()?;
                        props.push(PatternProp {
                            key: PropKey::Static(name.clone()),
                            target: Pattern::Ident(name),
                            default,
                        });
                    }
                    _ => return Err(unexpected(&prop)),
                }
            }
            Ok(Pattern::Object { props, rest })
        }
        Rule::array_pattern => {
            let mut items = Vec::new();
            let mut rest = None;
            for item in pair.into_inner() {
                match item.as_rule() {
                    Rule::rest_element => rest = Some(rest_name(item)?),
                    Rule::hole => items.push(None),
                    _ => items.push(Some(build_binding_element(item)?)),
                }
            }
            Ok(Pattern::Array { items, rest })
        }
        _ => Err(unexpected(&pair)),
    }
}

fn build_prop_key(pair: Pair<'_, Rule>) -> Result<PropKey> {
    let span = pair.as_span();
    match pair.as_rule() {
        Rule::ident | Rule::ident_name => Ok(PropKey::Static(pair.as_str().to_string())),
        Rule::string => Ok(PropKey::Static(build_string(&pair)?)),
        Rule::number => Ok(PropKey::Static(number_to_string(build_number(&pair)?))),
        Rule::computed_key => {
            let expr = required(pair.into_inner().next(), span, "expression")?;
            Ok(PropKey::Computed(Box::new(build_expr(expr)?)))
        }
        _ => Err(unexpected(&pair)),
    }
}

// ---------------------------------------------------------------------------
// Expressions

fn build_expr(pair: Pair<'_, Rule>) -> Result<Expr> {
    let span = pair.as_span();
    match pair.as_rule() {
        Rule::arrow_fn => Ok(Expr::Function(Arc::new(build_arrow(pair)?))),
        Rule::assign_expr => {
            let mut inner = pair.into_inner();
            let target = build_conditional(required(inner.next(), span, "expression")?)?;
            let Some(op) = inner.next() else {
                return Ok(target);
            };
            if !target.is_assignable() {
                return Err(ParseError::invalid(span, "invalid left-hand side in assignment"));
            }
            let op = match op.as_rule() {
                Rule::assign_plain => AssignOp::Assign,
                Rule::assign_add => AssignOp::Compound(BinaryOp::Add),
                Rule::assign_sub => AssignOp::Compound(BinaryOp::Sub),
                Rule::assign_mul => AssignOp::Compound(BinaryOp::Mul),
                Rule::assign_div => AssignOp::Compound(BinaryOp::Div),
                Rule::assign_rem => AssignOp::Compound(BinaryOp::Rem),
                Rule::assign_nullish => AssignOp::Logical(LogicalOp::Nullish),
                Rule::assign_or => AssignOp::Logical(LogicalOp::Or),
                Rule::assign_and => AssignOp::Logical(LogicalOp::And),
                _ => return Err(unexpected(&op)),
            };
            let value = build_expr(required(inner.next(), span, "assigned value")?)?;
            Ok(Expr::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            })
        }
        _ => Err(unexpected(&pair)),
    }
}

fn build_conditional(pair: Pair<'_, Rule>) -> Result<Expr> {
    let span = pair.as_span();
    let mut inner = pair.into_inner().filter(|p| p.as_rule() != Rule::question);
    let test = build_binary(required(inner.next(), span, "expression")?)?;
    let Some(then) = inner.next() else {
        return Ok(test);
    };
    let then = build_expr(then)?;
    let otherwise = build_expr(required(inner.next(), span, "`:` branch")?)?;
    Ok(Expr::Conditional {
        test: Box::new(test),
        then: Box::new(then),
        otherwise: Box::new(otherwise),
    })
}

fn build_binary(pair: Pair<'_, Rule>) -> Result<Expr> {
    PRATT
        .map_primary(build_operand)
        .map_infix(|lhs, op, rhs| {
            let (left, right) = (Box::new(lhs?), Box::new(rhs?));
            let logical = match op.as_rule() {
                Rule::nullish => Some(LogicalOp::Nullish),
                Rule::or => Some(LogicalOp::Or),
                Rule::and => Some(LogicalOp::And),
                _ => None,
            };
            if let Some(op) = logical {
                return Ok(Expr::Logical { op, left, right });
            }
            let op = match op.as_rule() {
                Rule::strict_eq => BinaryOp::StrictEq,
                Rule::strict_ne => BinaryOp::StrictNe,
                Rule::eq => BinaryOp::LooseEq,
                Rule::ne => BinaryOp::LooseNe,
                Rule::lt => BinaryOp::Lt,
                Rule::le => BinaryOp::Le,
                Rule::gt => BinaryOp::Gt,
                Rule::ge => BinaryOp::Ge,
                Rule::add => BinaryOp::Add,
                Rule::sub => BinaryOp::Sub,
                Rule::mul => BinaryOp::Mul,
                Rule::div => BinaryOp::Div,
                Rule::rem => BinaryOp::Rem,
                Rule::pow => BinaryOp::Pow,
                _ => return Err(unexpected(&op)),
            };
            Ok(Expr::Binary { op, left, right })
        })
        .parse(pair.into_inner())
}

fn build_operand(pair: Pair<'_, Rule>) -> Result<Expr> {
    let span = pair.as_span();
    let mut prefixes = Vec::new();
    let mut expr = None;

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::call_expr => expr = Some(build_call_expr(part)?),
            Rule::post_inc | Rule::post_dec => {
                let target = required_expr(expr.take(), span)?;
                expr = Some(update(target, part.as_rule() == Rule::post_inc, false, span)?);
            }
            _ => prefixes.push(part),
        }
    }

    let mut expr = required_expr(expr, span)?;
    for op in prefixes.into_iter().rev() {
        expr = match op.as_rule() {
            Rule::not => unary(UnaryOp::Not, expr),
            Rule::neg => unary(UnaryOp::Neg, expr),
            Rule::plus => unary(UnaryOp::Plus, expr),
            Rule::typeof_op => unary(UnaryOp::TypeOf, expr),
            Rule::await_op => Expr::Await(Box::new(expr)),
            Rule::pre_inc => update(expr, true, true, span)?,
            Rule::pre_dec => update(expr, false, true, span)?,
            _ => return Err(unexpected(&op)),
        };
    }

    Ok(expr)
}

fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::Unary {
        op,
        operand: Box::new(operand),
    }
}

fn required_expr(expr: Option<Expr>, span: pest::Span<'_>) -> Result<Expr> {
    expr.ok_or_else(|| ParseError::invalid(span, "expected expression"))
}

fn update(target: Expr, increment: bool, prefix: bool, span: pest::Span<'_>) -> Result<Expr> {
    if !target.is_assignable() {
        return Err(ParseError::invalid(
            span,
            "invalid left-hand side expression in update operation",
        ));
    }
    Ok(Expr::Update {
        increment,
        prefix,
        target: Box::new(target),
    })
}

fn build_call_expr(pair: Pair<'_, Rule>) -> Result<Expr> {
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let head = required(inner.next(), span, "expression")?;
    let mut expr = match head.as_rule() {
        Rule::new_expr => build_new(head)?,
        _ => build_primary(head)?,
    };

    for accessor in inner {
        let span = accessor.as_span();
        let rule = accessor.as_rule();
        let optional = matches!(rule, Rule::opt_member | Rule::opt_index | Rule::opt_call);
        let part = required(accessor.into_inner().next(), span, "accessor")?;
        expr = match rule {
            Rule::member | Rule::opt_member => Expr::Member {
                object: Box::new(expr),
                property: part.as_str().to_string(),
                optional,
            },
            Rule::index | Rule::opt_index => Expr::Index {
                object: Box::new(expr),
                index: Box::new(build_expr(part)?),
                optional,
            },
            Rule::call | Rule::opt_call => Expr::Call {
                callee: Box::new(expr),
                args: build_elements(part)?,
                optional,
            },
            _ => return Err(unexpected(&part)),
        };
    }

    Ok(expr)
}

fn build_new(pair: Pair<'_, Rule>) -> Result<Expr> {
    let mut path = Vec::new();
    let mut args = Vec::new();
    for part in significant(pair) {
        match part.as_rule() {
            Rule::ident | Rule::ident_name => path.push(part.as_str().to_string()),
            Rule::args => args = build_elements(part)?,
            _ => return Err(unexpected(&part)),
        }
    }
    Ok(Expr::New { path, args })
}

/// Arguments of a call or elements of an array literal
fn build_elements(pair: Pair<'_, Rule>) -> Result<Vec<Element>> {
    pair.into_inner()
        .map(|element| {
            let span = element.as_span();
            match element.as_rule() {
                Rule::spread => Ok(Element::Spread(build_expr(required(
                    element.into_inner().next(),
                    span,
                    "spread expression",
                )?)?)),
                _ => Ok(Element::Item(build_expr(element)?)),
            }
        })
        .collect()
}

fn build_primary(pair: Pair<'_, Rule>) -> Result<Expr> {
    let span = pair.as_span();
    match pair.as_rule() {
        Rule::number => Ok(Expr::Number(build_number(&pair)?)),
        Rule::string => Ok(Expr::Str(build_string(&pair)?)),
        Rule::template => pair
            .into_inner()
            .map(|part| {
                let span = part.as_span();
                match part.as_rule() {
                    Rule::template_chars => Ok(TemplatePart::Text(unescape(part.as_str(), span)?)),
                    _ => Ok(TemplatePart::Expr(build_expr(required(
                        part.into_inner().next(),
                        span,
                        "expression",
                    )?)?)),
                }
            })
            .collect::<Result<Vec<_>>>()
            .map(Expr::Template),
        Rule::bool_lit => Ok(Expr::Bool(pair.as_str() == "true")),
        Rule::null_lit => Ok(Expr::Null),
        Rule::undefined_lit => Ok(Expr::Undefined),
        Rule::ident => Ok(Expr::Ident(pair.as_str().to_string())),
        Rule::array_lit => Ok(Expr::Array(build_elements(pair)?)),
        Rule::object_lit => build_object(pair),
        Rule::function_expr => Ok(Expr::Function(Arc::new(build_function(pair)?))),
        Rule::paren_expr => build_expr(required(pair.into_inner().next(), span, "expression")?),
        _ => Err(unexpected(&pair)),
    }
}

fn build_object(pair: Pair<'_, Rule>) -> Result<Expr> {
    let mut members = Vec::new();
    for member in pair.into_inner() {
        let span = member.as_span();
        match member.as_rule() {
            Rule::spread => {
                let expr = required(member.into_inner().next(), span, "spread expression")?;
                members.push(ObjectMember::Spread(build_expr(expr)?));
            }
            Rule::keyed_prop => {
                let mut inner = member.into_inner();
                let key = build_prop_key(required(inner.next(), span, "property name")?)?;
                let value = build_expr(required(inner.next(), span, "property value")?)?;
                members.push(ObjectMember::Prop(key, value));
            }
            Rule::method_prop => {
                let def = build_function(member.clone())?;
                let key = member
                    .into_inner()
                    .find(|p| {
                        !matches!(p.as_rule(), Rule::kw_async | Rule::params | Rule::function_body)
                    })
                    .map(build_prop_key)
                    .transpose()?;
                let key = key.ok_or_else(|| ParseError::invalid(span, "expected method name"))?;
                members.push(ObjectMember::Prop(key, Expr::Function(Arc::new(def))));
            }
            Rule::shorthand_prop => {
                let name = member.as_str().trim().to_string();
                members.push(ObjectMember::Prop(PropKey::Static(name.clone()), Expr::Ident(name)));
            }
            _ => return Err(unexpected(&member)),
        }
    }
    Ok(Expr::Object(members))
}

// ---------------------------------------------------------------------------
// Literals

fn build_number(pair: &Pair<'_, Rule>) -> Result<f64> {
    let text = pair.as_str();
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok().map(|n| n as f64)
    } else {
        text.parse::<f64>().ok()
    };
    parsed.ok_or_else(|| {
        ParseError::invalid(pair.as_span(), format!("invalid number literal {text}"))
    })
}

fn build_string(pair: &Pair<'_, Rule>) -> Result<String> {
    let text = pair.as_str();
    let body = text.get(1..text.len().saturating_sub(1)).unwrap_or_default();
    unescape(body, pair.as_span())
}

fn unescape(text: &str, span: pest::Span<'_>) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escaped) = chars.next() else {
            return Err(ParseError::invalid(span, "unterminated escape sequence"));
        };
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            '\n' => {}
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                out.push(code_point(&hex, span)?);
            }
            'u' => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|c| *c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                let unit = u32::from_str_radix(&hex, 16).map_err(|_| {
                    ParseError::invalid(span, format!("invalid unicode escape \\u{hex}"))
                })?;
                if (0xD800..0xDC00).contains(&unit) {
                    let low = low_surrogate(&mut chars);
                    let combined =
                        low.map_or(unit, |low| 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00));
                    out.push(char::from_u32(combined).unwrap_or('\u{FFFD}'));
                } else {
                    out.push(char::from_u32(unit).unwrap_or('\u{FFFD}'));
                }
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

fn code_point(hex: &str, span: pest::Span<'_>) -> Result<char> {
    u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| ParseError::invalid(span, format!("invalid escape \\x{hex}")))
}

fn low_surrogate(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<u32> {
    let lookahead: String = chars.clone().take(6).collect();
    let hex = lookahead.strip_prefix("\\u")?;
    let unit = u32::from_str_radix(hex, 16).ok()?;
    if (0xDC00..0xE000).contains(&unit) {
        for _ in 0..6 {
            chars.next();
        }
        Some(unit)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_expr(source: &str) -> Expr {
        let program = parse(source).unwrap();
        match &program.body[0] {
            Stmt::Expr(expr) => expr.clone(),
            Stmt::Return(Some(expr)) => expr.clone(),
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_await_call() {
        let expr = single_expr("return await mathAdd(2, 3)");
        let Expr::Await(inner) = expr else {
            panic!("expected await");
        };
        let Expr::Call { callee, args, optional } = *inner else {
            panic!("expected call");
        };
        assert!(matches!(*callee, Expr::Ident(ref name) if name == "mathAdd"));
        assert_eq!(args.len(), 2);
        assert!(!optional);
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = single_expr("1 + 2 * 3");
        let Expr::Binary { op, right, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn keywords_are_not_identifier_prefixes() {
        let program = parse("const returnValue = 1; return returnValue").unwrap();
        assert_eq!(program.len(), 2);
        assert!(matches!(
            &program.body[1],
            Stmt::Return(Some(Expr::Ident(name))) if name == "returnValue"
        ));
    }

    #[test]
    fn semicolons_are_optional() {
        let program = parse("let a = 1\nlet b = 2\nreturn a + b").unwrap();
        assert_eq!(program.len(), 3);
    }

    #[test]
    fn parses_arrow_functions() {
        let expr = single_expr("xs.map(async (x, i = 0) => ({ x, i }))");
        let Expr::Call { args, .. } = expr else {
            panic!("expected call");
        };
        let Element::Item(Expr::Function(def)) = &args[0] else {
            panic!("expected arrow");
        };
        assert!(def.is_async);
        assert_eq!(def.params.len(), 2);
        assert!(matches!(def.body, FunctionBody::Expr(_)));
    }

    #[test]
    fn parses_destructuring_and_for_of() {
        let program = parse(
            "const { items, meta: { total = 0 } } = data\n\
             for (const [k, v] of Object.entries(items)) { total += v }",
        )
        .unwrap();
        assert!(matches!(&program.body[0], Stmt::Declare { kind: DeclKind::Const, .. }));
        assert!(matches!(&program.body[1], Stmt::ForEach { keys: false, .. }));
    }

    #[test]
    fn parses_try_catch_finally() {
        let program =
            parse("try { await f() } catch (e) { log(e.message) } finally { done() }").unwrap();
        let Stmt::Try { handler, finalizer, .. } = &program.body[0] else {
            panic!("expected try");
        };
        assert!(matches!(handler, Some((Some(Pattern::Ident(name)), _)) if name == "e"));
        assert!(finalizer.is_some());
    }

    #[test]
    fn template_literal_with_substitution() {
        let expr = single_expr("`total: ${a + 1}\\n`");
        let Expr::Template(parts) = expr else {
            panic!("expected template");
        };
        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[0], TemplatePart::Text(t) if t == "total: "));
        assert!(matches!(&parts[2], TemplatePart::Text(t) if t == "\n"));
    }

    #[test]
    fn optional_chaining_and_nullish() {
        let expr = single_expr("a?.b?.[0] ?? 'none'");
        assert!(matches!(expr, Expr::Logical { op: LogicalOp::Nullish, .. }));
    }

    #[test]
    fn string_escapes() {
        let expr = single_expr(r#""tab\tquote\"A\u{1F600}""#);
        assert!(matches!(expr, Expr::Str(ref s) if s == "tab\tquote\"A\u{1F600}"));
    }

    #[test]
    fn rejects_invalid_assignment_target() {
        assert!(matches!(parse("f() = 1"), Err(ParseError::Invalid { .. })));
    }

    #[test]
    fn rejects_const_without_initializer() {
        assert!(parse("const x;").is_err());
    }

    #[test]
    fn rejects_unbalanced_braces() {
        assert!(matches!(parse("if (x) { return 1"), Err(ParseError::Syntax { .. })));
    }

    #[test]
    fn comments_are_ignored() {
        let source = "// leading\nconst a = 1 /* inline */ + 2\nreturn a // trailing";
        let program = parse(source).unwrap();
        assert_eq!(program.len(), 2);
    }
}
