//! Abstract Syntax Tree for generator scripts.
//!
//! The expression vocabulary is closed: every construct the grammar accepts maps
//! to exactly one [`Expr`] variant. `Display` renders an expression back to
//! Python-like source, which is what textual fallbacks in the IR are made of.

use std::borrow::Cow;
use std::fmt;

/// A parsed script: its top-level statements in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
}

/// A statement and the physical line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    AnnAssign {
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
    },
    Return(Option<Expr>),
    Expr(Expr),
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        is_async: bool,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<Stmt>,
        is_async: bool,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
    },
    Match {
        subject: Expr,
        cases: Vec<MatchCase>,
    },
    Import(Vec<Alias>),
    ImportFrom {
        module: String,
        names: Vec<Alias>,
    },
    Global(Vec<String>),
    Nonlocal(Vec<String>),
    Delete(Expr),
    Raise {
        exc: Option<Expr>,
        cause: Option<Expr>,
    },
    Assert {
        test: Expr,
        msg: Option<Expr>,
    },
    Pass,
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub returns: Option<Expr>,
    pub body: Vec<Stmt>,
    pub decorators: Vec<Expr>,
    pub is_async: bool,
}

impl FunctionDef {
    /// Value of the first top-level `return <expr>` in the body.
    pub fn returned_expr(&self) -> Option<&Expr> {
        self.body.iter().find_map(|stmt| match &stmt.kind {
            StmtKind::Return(Some(value)) => Some(value),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<Expr>,
    pub keywords: Vec<Keyword>,
    pub body: Vec<Stmt>,
    pub decorators: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub annotation: Option<Expr>,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Regular,
    VarPositional,
    VarKeyword,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithItem {
    pub context: Expr,
    pub target: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    pub kind: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
}

/// One `case` clause. The pattern is kept in expression form.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCase {
    pub pattern: Expr,
    pub binding: Option<String>,
    pub guard: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

impl Stmt {
    /// Expressions owned directly by this statement, in source order.
    pub fn exprs(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        match &self.kind {
            StmtKind::FunctionDef(def) => {
                out.extend(def.decorators.iter());
                for param in &def.params {
                    out.extend(param.annotation.iter());
                    out.extend(param.default.iter());
                }
                out.extend(def.returns.iter());
            }
            StmtKind::ClassDef(class) => {
                out.extend(class.bases.iter());
                out.extend(class.keywords.iter().map(|k| &k.value));
                out.extend(class.decorators.iter());
            }
            StmtKind::Assign { targets, value } => {
                out.extend(targets.iter());
                out.push(value);
            }
            StmtKind::AugAssign { target, value, .. } => {
                out.push(target);
                out.push(value);
            }
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                out.push(target);
                out.push(annotation);
                out.extend(value.iter());
            }
            StmtKind::Return(value) => out.extend(value.iter()),
            StmtKind::Expr(value) => out.push(value),
            StmtKind::If { test, .. } | StmtKind::While { test, .. } => out.push(test),
            StmtKind::For { target, iter, .. } => {
                out.push(target);
                out.push(iter);
            }
            StmtKind::With { items, .. } => {
                for item in items {
                    out.push(&item.context);
                    out.extend(item.target.iter());
                }
            }
            StmtKind::Try { handlers, .. } => {
                out.extend(handlers.iter().filter_map(|h| h.kind.as_ref()));
            }
            StmtKind::Match { subject, cases } => {
                out.push(subject);
                out.extend(cases.iter().filter_map(|c| c.guard.as_ref()));
            }
            StmtKind::Delete(target) => out.push(target),
            StmtKind::Raise { exc, cause } => {
                out.extend(exc.iter());
                out.extend(cause.iter());
            }
            StmtKind::Assert { test, msg } => {
                out.push(test);
                out.extend(msg.iter());
            }
            StmtKind::Import(_)
            | StmtKind::ImportFrom { .. }
            | StmtKind::Global(_)
            | StmtKind::Nonlocal(_)
            | StmtKind::Pass
            | StmtKind::Break
            | StmtKind::Continue => {}
        }
        out
    }

    /// Nested statement blocks, in source order.
    pub fn blocks(&self) -> Vec<&[Stmt]> {
        match &self.kind {
            StmtKind::FunctionDef(def) => vec![&def.body],
            StmtKind::ClassDef(class) => vec![&class.body],
            StmtKind::If { body, orelse, .. }
            | StmtKind::For { body, orelse, .. }
            | StmtKind::While { body, orelse, .. } => vec![body, orelse],
            StmtKind::With { body, .. } => vec![body],
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                let mut out: Vec<&[Stmt]> = vec![body];
                out.extend(handlers.iter().map(|h| h.body.as_slice()));
                out.push(orelse);
                out.push(finalbody);
                out
            }
            StmtKind::Match { cases, .. } => cases.iter().map(|c| c.body.as_slice()).collect(),
            _ => Vec::new(),
        }
    }
}

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(Constant),
    /// f-string, kept as its source text.
    FormattedString(String),
    Name(String),
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
    Set(Vec<Expr>),
    Dict(Vec<DictEntry>),
    Starred(Box<Expr>),
    BinOp {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Lambda {
        params: Vec<Param>,
        body: Box<Expr>,
    },
    Call(Call),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Comprehension {
        kind: ComprehensionKind,
        element: Box<Expr>,
        /// Value expression of a dict comprehension.
        value: Option<Box<Expr>>,
        generators: Vec<Generator>,
    },
    Yield {
        value: Option<Box<Expr>>,
        delegate: bool,
    },
    /// `target := value`
    NamedExpr {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Await(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i128),
    Float(f64),
    Imaginary(f64),
    Str(String),
    Bytes(Vec<u8>),
    Ellipsis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub func: Box<Expr>,
    pub args: Vec<Expr>,
    pub keywords: Vec<Keyword>,
}

impl Call {
    /// Bare callee name: `f` for `f(...)`, `g` for `a.b.g(...)`.
    pub fn name(&self) -> Option<&str> {
        match self.func.as_ref() {
            Expr::Name(name) => Some(name),
            Expr::Attribute { attr, .. } => Some(attr),
            _ => None,
        }
    }

    pub fn keyword(&self, name: &str) -> Option<&Expr> {
        self.keywords
            .iter()
            .rev()
            .find(|k| k.arg.as_deref() == Some(name))
            .map(|k| &k.value)
    }
}

/// Keyword argument; `arg` is `None` for `**mapping`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Expr,
}

/// Dict display entry; `key` is `None` for `**mapping`.
#[derive(Debug, Clone, PartialEq)]
pub struct DictEntry {
    pub key: Option<Expr>,
    pub value: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComprehensionKind {
    List,
    Set,
    Dict,
    Generator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
    pub is_async: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
    BitOr,
    BitXor,
    BitAnd,
    LShift,
    RShift,
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => "or",
            BinOp::And => "and",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::LtE => "<=",
            BinOp::Gt => ">",
            BinOp::GtE => ">=",
            BinOp::In => "in",
            BinOp::NotIn => "not in",
            BinOp::Is => "is",
            BinOp::IsNot => "is not",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::BitAnd => "&",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mult => "*",
            BinOp::MatMult => "@",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinOp::Or => prec::OR,
            BinOp::And => prec::AND,
            BinOp::Eq
            | BinOp::NotEq
            | BinOp::Lt
            | BinOp::LtE
            | BinOp::Gt
            | BinOp::GtE
            | BinOp::In
            | BinOp::NotIn
            | BinOp::Is
            | BinOp::IsNot => prec::CMP,
            BinOp::BitOr => prec::BOR,
            BinOp::BitXor => prec::BXOR,
            BinOp::BitAnd => prec::BAND,
            BinOp::LShift | BinOp::RShift => prec::SHIFT,
            BinOp::Add | BinOp::Sub => prec::ARITH,
            BinOp::Mult | BinOp::MatMult | BinOp::Div | BinOp::FloorDiv | BinOp::Mod => {
                prec::TERM
            }
            BinOp::Pow => prec::POWER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
    Invert,
}

impl Expr {
    pub fn name(name: impl Into<String>) -> Self {
        Expr::Name(name.into())
    }

    pub fn str(value: impl Into<String>) -> Self {
        Expr::Constant(Constant::Str(value.into()))
    }

    /// Direct sub-expressions, in source order. Lambda bodies are included.
    pub fn children(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        match self {
            Expr::Constant(_) | Expr::FormattedString(_) | Expr::Name(_) => {}
            Expr::Tuple(items) | Expr::List(items) | Expr::Set(items) => out.extend(items.iter()),
            Expr::Dict(entries) => {
                for entry in entries {
                    out.extend(entry.key.iter());
                    out.push(&entry.value);
                }
            }
            Expr::Starred(inner) => out.push(inner),
            Expr::BinOp { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            Expr::UnaryOp { operand, .. } => out.push(operand),
            Expr::IfExp { test, body, orelse } => {
                out.push(test);
                out.push(body);
                out.push(orelse);
            }
            Expr::Lambda { params, body } => {
                out.extend(params.iter().filter_map(|p| p.default.as_ref()));
                out.push(body);
            }
            Expr::Call(call) => {
                out.push(&call.func);
                out.extend(call.args.iter());
                out.extend(call.keywords.iter().map(|k| &k.value));
            }
            Expr::Attribute { value, .. } => out.push(value),
            Expr::Subscript { value, index } => {
                out.push(value);
                out.push(index);
            }
            Expr::Slice { lower, upper, step } => {
                out.extend(lower.iter().map(|e| e.as_ref()));
                out.extend(upper.iter().map(|e| e.as_ref()));
                out.extend(step.iter().map(|e| e.as_ref()));
            }
            Expr::Comprehension {
                element,
                value,
                generators,
                ..
            } => {
                out.push(element);
                out.extend(value.iter().map(|e| e.as_ref()));
                for generator in generators {
                    out.push(&generator.target);
                    out.push(&generator.iter);
                    out.extend(generator.ifs.iter());
                }
            }
            Expr::Yield { value, .. } => out.extend(value.iter().map(|e| e.as_ref())),
            Expr::NamedExpr { target, value } => {
                out.push(target);
                out.push(value);
            }
            Expr::Await(inner) => out.push(inner),
        }
        out
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Lambda { .. } => prec::LAMBDA,
            Expr::IfExp { .. } => prec::TEST,
            Expr::BinOp { op, .. } => op.precedence(),
            Expr::UnaryOp { op: UnaryOp::Not, .. } => prec::NOT,
            Expr::UnaryOp { .. } => prec::FACTOR,
            Expr::Await(_) => prec::AWAIT,
            Expr::Starred(_) | Expr::Yield { .. } | Expr::Slice { .. } => prec::TUPLE,
            _ => prec::ATOM,
        }
    }
}

mod prec {
    pub const TUPLE: u8 = 0;
    pub const LAMBDA: u8 = 1;
    pub const TEST: u8 = 2;
    pub const OR: u8 = 3;
    pub const AND: u8 = 4;
    pub const NOT: u8 = 5;
    pub const CMP: u8 = 6;
    pub const BOR: u8 = 7;
    pub const BXOR: u8 = 8;
    pub const BAND: u8 = 9;
    pub const SHIFT: u8 = 10;
    pub const ARITH: u8 = 11;
    pub const TERM: u8 = 12;
    pub const FACTOR: u8 = 13;
    pub const POWER: u8 = 14;
    pub const AWAIT: u8 = 15;
    pub const ATOM: u8 = 16;
}

/// Write `expr`, parenthesized when it binds looser than `min`.
fn operand(f: &mut fmt::Formatter<'_>, expr: &Expr, min: u8) -> fmt::Result {
    if expr.precedence() < min {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

fn comma_separated<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(c) => write!(f, "{}", c),
            Expr::FormattedString(src) => f.write_str(&formatted_repr(src)),
            Expr::Name(name) => f.write_str(name),
            Expr::Tuple(items) => {
                f.write_str("(")?;
                comma_separated(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Expr::List(items) => {
                f.write_str("[")?;
                comma_separated(f, items)?;
                f.write_str("]")
            }
            Expr::Set(items) => {
                f.write_str("{")?;
                comma_separated(f, items)?;
                f.write_str("}")
            }
            Expr::Dict(entries) => {
                f.write_str("{")?;
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match &entry.key {
                        Some(key) => write!(f, "{}: {}", key, entry.value)?,
                        None => {
                            f.write_str("**")?;
                            operand(f, &entry.value, prec::BOR)?;
                        }
                    }
                }
                f.write_str("}")
            }
            Expr::Starred(inner) => {
                f.write_str("*")?;
                operand(f, inner, prec::BOR)
            }
            Expr::BinOp { left, op, right } => {
                let p = op.precedence();
                let (left_min, right_min) = if *op == BinOp::Pow {
                    (p + 1, p)
                } else {
                    (p, p + 1)
                };
                operand(f, left, left_min)?;
                write!(f, " {} ", op.symbol())?;
                operand(f, right, right_min)
            }
            Expr::UnaryOp { op, operand: inner } => match op {
                UnaryOp::Not => {
                    f.write_str("not ")?;
                    operand(f, inner, prec::NOT)
                }
                UnaryOp::Neg => {
                    f.write_str("-")?;
                    operand(f, inner, prec::FACTOR)
                }
                UnaryOp::Pos => {
                    f.write_str("+")?;
                    operand(f, inner, prec::FACTOR)
                }
                UnaryOp::Invert => {
                    f.write_str("~")?;
                    operand(f, inner, prec::FACTOR)
                }
            },
            Expr::IfExp { test, body, orelse } => {
                operand(f, body, prec::OR)?;
                f.write_str(" if ")?;
                operand(f, test, prec::OR)?;
                f.write_str(" else ")?;
                operand(f, orelse, prec::TEST)
            }
            Expr::Lambda { params, body } => {
                f.write_str("lambda")?;
                if !params.is_empty() {
                    f.write_str(" ")?;
                    comma_separated(f, params)?;
                }
                f.write_str(": ")?;
                operand(f, body, prec::LAMBDA)
            }
            Expr::Call(call) => {
                operand(f, &call.func, prec::ATOM)?;
                f.write_str("(")?;
                let mut first = true;
                for arg in &call.args {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    write!(f, "{}", arg)?;
                }
                for keyword in &call.keywords {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    match &keyword.arg {
                        Some(name) => write!(f, "{}={}", name, keyword.value)?,
                        None => write!(f, "**{}", keyword.value)?,
                    }
                }
                f.write_str(")")
            }
            Expr::Attribute { value, attr } => {
                operand(f, value, prec::ATOM)?;
                write!(f, ".{}", attr)
            }
            Expr::Subscript { value, index } => {
                operand(f, value, prec::ATOM)?;
                f.write_str("[")?;
                match index.as_ref() {
                    Expr::Tuple(items) if !items.is_empty() => {
                        comma_separated(f, items)?;
                        if items.len() == 1 {
                            f.write_str(",")?;
                        }
                    }
                    other => write!(f, "{}", other)?,
                }
                f.write_str("]")
            }
            Expr::Slice { lower, upper, step } => {
                if let Some(lower) = lower {
                    write!(f, "{}", lower)?;
                }
                f.write_str(":")?;
                if let Some(upper) = upper {
                    write!(f, "{}", upper)?;
                }
                if let Some(step) = step {
                    write!(f, ":{}", step)?;
                }
                Ok(())
            }
            Expr::Comprehension {
                kind,
                element,
                value,
                generators,
            } => {
                let (open, close) = match kind {
                    ComprehensionKind::List => ("[", "]"),
                    ComprehensionKind::Set | ComprehensionKind::Dict => ("{", "}"),
                    ComprehensionKind::Generator => ("(", ")"),
                };
                f.write_str(open)?;
                write!(f, "{}", element)?;
                if let Some(value) = value {
                    write!(f, ": {}", value)?;
                }
                for generator in generators {
                    write!(f, " {}", generator)?;
                }
                f.write_str(close)
            }
            Expr::Yield { value, delegate } => {
                f.write_str("(yield")?;
                if *delegate {
                    f.write_str(" from")?;
                }
                if let Some(value) = value {
                    write!(f, " {}", value)?;
                }
                f.write_str(")")
            }
            Expr::NamedExpr { target, value } => write!(f, "({} := {})", target, value),
            Expr::Await(inner) => {
                f.write_str("await ")?;
                operand(f, inner, prec::ATOM)
            }
        }
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_async {
            f.write_str("async ")?;
        }
        match &self.target {
            Expr::Tuple(items) if !items.is_empty() => {
                f.write_str("for ")?;
                comma_separated(f, items)?;
            }
            target => write!(f, "for {}", target)?,
        }
        f.write_str(" in ")?;
        operand(f, &self.iter, prec::OR)?;
        for cond in &self.ifs {
            f.write_str(" if ")?;
            operand(f, cond, prec::OR)?;
        }
        Ok(())
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ParamKind::Regular => {}
            ParamKind::VarPositional => f.write_str("*")?,
            ParamKind::VarKeyword => f.write_str("**")?,
        }
        f.write_str(&self.name)?;
        if let Some(annotation) = &self.annotation {
            write!(f, ": {}", annotation)?;
        }
        if let Some(default) = &self.default {
            write!(f, "={}", default)?;
        }
        Ok(())
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::None => f.write_str("None"),
            Constant::Bool(true) => f.write_str("True"),
            Constant::Bool(false) => f.write_str("False"),
            Constant::Int(i) => write!(f, "{}", i),
            Constant::Float(x) => f.write_str(&float_repr(*x)),
            Constant::Imaginary(x) => write!(f, "{}j", float_repr(*x).trim_end_matches(".0")),
            Constant::Str(s) => f.write_str(&str_repr(s)),
            Constant::Bytes(b) => f.write_str(&bytes_repr(b)),
            Constant::Ellipsis => f.write_str("..."),
        }
    }
}

/// Python `repr()` of a float.
pub fn float_repr(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let abs = x.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let s = format!("{:e}", x);
        let (mantissa, exp) = s.split_once('e').unwrap_or((&s, "0"));
        let (sign, digits) = match exp.strip_prefix('-') {
            Some(d) => ('-', d),
            None => ('+', exp),
        };
        return format!("{}e{}{:0>2}", mantissa, sign, digits);
    }
    if x.fract() == 0.0 {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

/// Python `repr()` of a str.
pub fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Source of a plain f-string in single-quoted form, as Python's own
/// unparser writes it. Anything else is returned as written.
fn formatted_repr(src: &str) -> Cow<'_, str> {
    let body = src
        .strip_prefix(&['f', 'F'][..])
        .and_then(|rest| rest.strip_prefix('"'))
        .and_then(|rest| rest.strip_suffix('"'));
    match body {
        Some(body) if !body.contains(&['"', '\'', '\\'][..]) => {
            Cow::Owned(format!("f'{}'", body))
        }
        _ => Cow::Borrowed(src),
    }
}

/// Python `repr()` of a bytes object.
pub fn bytes_repr(b: &[u8]) -> String {
    let quote = if b.contains(&b'\'') && !b.contains(&b'"') {
        b'"'
    } else {
        b'\''
    };
    let mut out = String::with_capacity(b.len() + 3);
    out.push('b');
    out.push(quote as char);
    for &byte in b {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            q if q == quote => {
                out.push('\\');
                out.push(q as char);
            }
            0x20..=0x7e => out.push(byte as char),
            _ => out.push_str(&format!("\\x{:02x}", byte)),
        }
    }
    out.push(quote as char);
    out
}
