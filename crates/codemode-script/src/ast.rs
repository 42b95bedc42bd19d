//! Abstract syntax tree for orchestration scripts
//!
//! Produced by [`crate::parser`], consumed by [`crate::interpreter`]. Function
//! definitions are reference counted so closures can share them with the
//! tree they were parsed from.

use std::sync::Arc;

/// Parsed script: the body of an implicit async function
#[derive(Debug, Clone)]
pub struct Program {
    /// Top-level statements
    pub body: Arc<Vec<Stmt>>,
}

impl Program {
    /// Number of top-level statements
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Check if the program has no statements
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Variable declaration keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    /// `const`
    Const,
    /// `let`
    Let,
    /// `var`
    Var,
}

impl DeclKind {
    /// Whether bindings may be reassigned
    #[inline]
    #[must_use]
    pub fn is_mutable(self) -> bool {
        !matches!(self, Self::Const)
    }
}

/// Statement
#[derive(Debug, Clone)]
pub enum Stmt {
    /// Expression evaluated for effect
    Expr(Expr),
    /// `let`/`const`/`var` declaration
    Declare {
        /// Declaration keyword
        kind: DeclKind,
        /// Targets and optional initialisers
        declarators: Vec<(Pattern, Option<Expr>)>,
    },
    /// Named function declaration (hoisted)
    Function(Arc<FunctionDef>),
    /// `if (test) then else otherwise`
    If {
        /// Condition
        test: Expr,
        /// Taken branch
        then: Box<Stmt>,
        /// Optional else branch
        otherwise: Option<Box<Stmt>>,
    },
    /// `while (test) body`
    While {
        /// Condition
        test: Expr,
        /// Loop body
        body: Box<Stmt>,
    },
    /// `do body while (test)`
    DoWhile {
        /// Loop body
        body: Box<Stmt>,
        /// Condition
        test: Expr,
    },
    /// `for (init; test; update) body`
    For {
        /// Initialiser
        init: Option<Box<Stmt>>,
        /// Condition, `true` when absent
        test: Option<Expr>,
        /// Update expression
        update: Option<Expr>,
        /// Loop body
        body: Box<Stmt>,
    },
    /// `for (const x of xs)` or `for (const k in obj)`
    ForEach {
        /// Declaration keyword
        kind: DeclKind,
        /// Loop variable pattern
        pattern: Pattern,
        /// Iterated expression
        iterable: Expr,
        /// `in` iterates keys, `of` iterates values
        keys: bool,
        /// Loop body
        body: Box<Stmt>,
    },
    /// `{ ... }`
    Block(Vec<Stmt>),
    /// `return expr?`
    Return(Option<Expr>),
    /// `throw expr`
    Throw(Expr),
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `try { } catch (e) { } finally { }`
    Try {
        /// Protected block
        block: Vec<Stmt>,
        /// Catch binding and handler
        handler: Option<(Option<Pattern>, Vec<Stmt>)>,
        /// Finaliser
        finalizer: Option<Vec<Stmt>>,
    },
    /// `;`
    Empty,
}

/// Binding target of declarations, parameters and `catch`
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Plain identifier
    Ident(String),
    /// `{ a, b: c = 1, ...rest }`
    Object {
        /// Destructured properties
        props: Vec<PatternProp>,
        /// Remaining properties
        rest: Option<String>,
    },
    /// `[a, , b = 2, ...rest]`
    Array {
        /// Elements; `None` is a hole
        items: Vec<Option<PatternElem>>,
        /// Remaining elements
        rest: Option<String>,
    },
}

/// Array pattern element or parameter
#[derive(Debug, Clone)]
pub struct PatternElem {
    /// Target
    pub target: Pattern,
    /// Default when the source is `undefined`
    pub default: Option<Expr>,
}

/// Object pattern property
#[derive(Debug, Clone)]
pub struct PatternProp {
    /// Source property
    pub key: PropKey,
    /// Target
    pub target: Pattern,
    /// Default when the property is `undefined`
    pub default: Option<Expr>,
}

/// Property name in literals and patterns
#[derive(Debug, Clone)]
pub enum PropKey {
    /// Identifier, string or number key
    Static(String),
    /// `[expr]`
    Computed(Box<Expr>),
}

/// Function parameter
#[derive(Debug, Clone)]
pub enum Param {
    /// Positional parameter with optional default
    Positional(PatternElem),
    /// `...rest`
    Rest(String),
}

/// Function or arrow body
#[derive(Debug, Clone)]
pub enum FunctionBody {
    /// `{ statements }`
    Block(Vec<Stmt>),
    /// Arrow expression body
    Expr(Box<Expr>),
}

/// Function, arrow or method definition
#[derive(Debug, Clone)]
pub struct FunctionDef {
    /// Declared name
    pub name: Option<String>,
    /// Parameters
    pub params: Vec<Param>,
    /// Body
    pub body: FunctionBody,
    /// `async` functions return promises
    pub is_async: bool,
}

/// Array literal element or call argument
#[derive(Debug, Clone)]
pub enum Element {
    /// Plain expression
    Item(Expr),
    /// `...expr`
    Spread(Expr),
}

/// Object literal member
#[derive(Debug, Clone)]
pub enum ObjectMember {
    /// `key: value`, shorthand or method
    Prop(PropKey, Expr),
    /// `...expr`
    Spread(Expr),
}

/// Template literal segment
#[derive(Debug, Clone)]
pub enum TemplatePart {
    /// Literal text, escapes resolved
    Text(String),
    /// `${expr}`
    Expr(Expr),
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `-`
    Neg,
    /// `+`
    Plus,
    /// `typeof`
    TypeOf,
}

/// Binary arithmetic or comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    StrictEq,
    StrictNe,
    LooseEq,
    LooseNe,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Short-circuiting operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `&&`
    And,
    /// `||`
    Or,
    /// `??`
    Nullish,
}

/// Assignment operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Assign,
    /// `+=`, `-=` and friends
    Compound(BinaryOp),
    /// `&&=`, `||=`, `??=`
    Logical(LogicalOp),
}

/// Expression
#[derive(Debug, Clone)]
pub enum Expr {
    /// Number literal
    Number(f64),
    /// String literal
    Str(String),
    /// `true` / `false`
    Bool(bool),
    /// `null`
    Null,
    /// `undefined`
    Undefined,
    /// Template literal
    Template(Vec<TemplatePart>),
    /// Identifier reference
    Ident(String),
    /// Array literal
    Array(Vec<Element>),
    /// Object literal
    Object(Vec<ObjectMember>),
    /// Function or arrow expression
    Function(Arc<FunctionDef>),
    /// `object.property` / `object?.property`
    Member {
        /// Receiver
        object: Box<Expr>,
        /// Property name
        property: String,
        /// `?.`
        optional: bool,
    },
    /// `object[index]` / `object?.[index]`
    Index {
        /// Receiver
        object: Box<Expr>,
        /// Key expression
        index: Box<Expr>,
        /// `?.`
        optional: bool,
    },
    /// `callee(args)` / `callee?.(args)`
    Call {
        /// Called expression
        callee: Box<Expr>,
        /// Arguments
        args: Vec<Element>,
        /// `?.`
        optional: bool,
    },
    /// `new Path(args)`
    New {
        /// Constructor name path
        path: Vec<String>,
        /// Arguments
        args: Vec<Element>,
    },
    /// Prefix operator
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// `++`/`--`
    Update {
        /// `true` for increment
        increment: bool,
        /// `++x` rather than `x++`
        prefix: bool,
        /// Assigned target
        target: Box<Expr>,
    },
    /// Arithmetic or comparison
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// `&&`, `||`, `??`
    Logical {
        /// Operator
        op: LogicalOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand, evaluated on demand
        right: Box<Expr>,
    },
    /// `test ? then : otherwise`
    Conditional {
        /// Condition
        test: Box<Expr>,
        /// Value when truthy
        then: Box<Expr>,
        /// Value when falsy
        otherwise: Box<Expr>,
    },
    /// Assignment
    Assign {
        /// Operator
        op: AssignOp,
        /// Identifier, member or index target
        target: Box<Expr>,
        /// Assigned value
        value: Box<Expr>,
    },
    /// `await expr`
    Await(Box<Expr>),
}

impl Expr {
    /// Whether the expression may appear on the left of `=`
    #[must_use]
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Self::Ident(_)
                | Self::Member { optional: false, .. }
                | Self::Index { optional: false, .. }
        )
    }
}
