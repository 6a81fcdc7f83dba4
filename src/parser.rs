//! Parse generator scripts into an AST using PEST.
//!
//! Source is first split into logical lines by [`crate::layout`]; each line is
//! parsed with the `line` rule and the block structure is rebuilt from the
//! indentation widths.

use std::iter::Peekable;
use std::sync::LazyLock;
use std::vec::IntoIter;

use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser as PestParser;

use crate::ast::*;
use crate::error::ParseError;
use crate::layout::{logical_lines, LogicalLine};

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct ScriptParser;

/// Deepest block nesting accepted.
const MAX_BLOCK_DEPTH: usize = 100;

/// Most operators in one operator chain, and most trailers after one atom.
/// Longer chains would build trees too deep to walk.
const MAX_CHAIN_LEN: usize = 256;

static PRATT: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::op_or, Assoc::Left))
        .op(Op::infix(Rule::op_and, Assoc::Left))
        .op(Op::prefix(Rule::op_not))
        .op(Op::infix(Rule::op_in, Assoc::Left)
            | Op::infix(Rule::op_not_in, Assoc::Left)
            | Op::infix(Rule::op_is, Assoc::Left)
            | Op::infix(Rule::op_is_not, Assoc::Left)
            | Op::infix(Rule::op_eq, Assoc::Left)
            | Op::infix(Rule::op_ne, Assoc::Left)
            | Op::infix(Rule::op_lt, Assoc::Left)
            | Op::infix(Rule::op_le, Assoc::Left)
            | Op::infix(Rule::op_gt, Assoc::Left)
            | Op::infix(Rule::op_ge, Assoc::Left))
        .op(Op::infix(Rule::op_bitor, Assoc::Left))
        .op(Op::infix(Rule::op_bitxor, Assoc::Left))
        .op(Op::infix(Rule::op_bitand, Assoc::Left))
        .op(Op::infix(Rule::op_lshift, Assoc::Left) | Op::infix(Rule::op_rshift, Assoc::Left))
        .op(Op::infix(Rule::op_add, Assoc::Left) | Op::infix(Rule::op_sub, Assoc::Left))
        .op(Op::infix(Rule::op_mul, Assoc::Left)
            | Op::infix(Rule::op_div, Assoc::Left)
            | Op::infix(Rule::op_floordiv, Assoc::Left)
            | Op::infix(Rule::op_mod, Assoc::Left)
            | Op::infix(Rule::op_matmul, Assoc::Left))
        .op(Op::prefix(Rule::op_neg) | Op::prefix(Rule::op_pos) | Op::prefix(Rule::op_invert))
        .op(Op::infix(Rule::op_pow, Assoc::Right))
});

/// Parse script source into a [`Module`].
pub fn parse(source: &str) -> Result<Module, ParseError> {
    let mut parsed = Vec::new();
    for line in logical_lines(source)? {
        let header = parse_line(&line)?;
        parsed.push(ParsedLine {
            number: line.number,
            indent: line.indent,
            column: line.column,
            header,
        });
    }
    let mut builder = BlockBuilder {
        lines: parsed.into_iter().peekable(),
        depth: 0,
    };
    let body = builder.block(0)?;
    if let Some(extra) = builder.lines.next() {
        return Err(ParseError::new(extra.number, extra.column, "unindent does not match any outer indentation level"));
    }
    Ok(Module { body })
}

/// Parse a single expression (used by tests and tooling).
pub fn parse_expr(source: &str) -> Result<Expr, ParseError> {
    let module = parse(source)?;
    match module.body.as_slice() {
        [Stmt {
            kind: StmtKind::Expr(expr),
            ..
        }] => Ok(expr.clone()),
        _ => Err(ParseError::new(1, 1, "expected a single expression")),
    }
}

fn parse_line(line: &LogicalLine) -> Result<Header, ParseError> {
    let mut pairs = ScriptParser::parse(Rule::line, &line.text).map_err(|e| {
        let (l, c) = match e.line_col {
            pest::error::LineColLocation::Pos(pos) => pos,
            pest::error::LineColLocation::Span(start, _) => start,
        };
        let column = if l == 1 { line.column + c - 1 } else { c };
        ParseError::new(line.number + l - 1, column, format!("invalid syntax ({})", e.variant.message()))
    })?;
    let content = pairs
        .next()
        .and_then(|line_pair| line_pair.into_inner().next())
        .ok_or_else(|| ParseError::new(line.number, line.column, "empty line"))?;
    build_header(content).map_err(|message| ParseError::new(line.number, line.column, message))
}

// ==================== Block structure ====================

/// A parsed logical line before block assembly.
struct ParsedLine {
    number: usize,
    indent: usize,
    column: usize,
    header: Header,
}

enum Header {
    Simple(Vec<StmtKind>),
    Decorator(Expr),
    Def(FunctionDef, Option<Vec<StmtKind>>),
    Class(ClassDef, Option<Vec<StmtKind>>),
    If(Expr, Option<Vec<StmtKind>>),
    Elif(Expr, Option<Vec<StmtKind>>),
    Else(Option<Vec<StmtKind>>),
    For {
        target: Expr,
        iter: Expr,
        is_async: bool,
        inline: Option<Vec<StmtKind>>,
    },
    While(Expr, Option<Vec<StmtKind>>),
    With {
        items: Vec<WithItem>,
        is_async: bool,
        inline: Option<Vec<StmtKind>>,
    },
    Try(Option<Vec<StmtKind>>),
    Except {
        kind: Option<Expr>,
        name: Option<String>,
        inline: Option<Vec<StmtKind>>,
    },
    Finally(Option<Vec<StmtKind>>),
    Match(Expr),
    Case {
        pattern: Expr,
        binding: Option<String>,
        guard: Option<Expr>,
        inline: Option<Vec<StmtKind>>,
    },
}

impl Header {
    fn clause_name(&self) -> Option<&'static str> {
        match self {
            Header::Elif(..) => Some("elif"),
            Header::Else(_) => Some("else"),
            Header::Except { .. } => Some("except"),
            Header::Finally(_) => Some("finally"),
            Header::Case { .. } => Some("case"),
            _ => None,
        }
    }
}

struct BlockBuilder {
    lines: Peekable<IntoIter<ParsedLine>>,
    depth: usize,
}

impl BlockBuilder {
    fn block(&mut self, indent: usize) -> Result<Vec<Stmt>, ParseError> {
        let mut body = Vec::new();
        let mut decorators: Vec<Expr> = Vec::new();
        let mut decorator_line = None;
        while let Some(next) = self.lines.peek() {
            if next.indent < indent {
                break;
            }
            if next.indent > indent {
                return Err(ParseError::new(next.number, next.column, "unexpected indent"));
            }
            let Some(line) = self.lines.next() else { break };
            let ParsedLine {
                number,
                column,
                header,
                ..
            } = line;
            if let Some(name) = header.clause_name() {
                return Err(ParseError::new(number, column, format!("'{}' without a matching statement", name)));
            }
            if !decorators.is_empty()
                && !matches!(header, Header::Decorator(_) | Header::Def(..) | Header::Class(..))
            {
                return Err(ParseError::new(number, column, "decorator must be followed by a function or class definition"));
            }
            match header {
                Header::Decorator(expr) => {
                    decorator_line.get_or_insert(number);
                    decorators.push(expr);
                }
                Header::Simple(kinds) => {
                    body.extend(kinds.into_iter().map(|kind| Stmt { kind, line: number }));
                }
                Header::Def(mut def, inline) => {
                    def.body = self.suite(indent, inline, number, column)?;
                    def.decorators = std::mem::take(&mut decorators);
                    decorator_line = None;
                    body.push(Stmt {
                        kind: StmtKind::FunctionDef(def),
                        line: number,
                    });
                }
                Header::Class(mut class, inline) => {
                    class.body = self.suite(indent, inline, number, column)?;
                    class.decorators = std::mem::take(&mut decorators);
                    decorator_line = None;
                    body.push(Stmt {
                        kind: StmtKind::ClassDef(class),
                        line: number,
                    });
                }
                Header::If(test, inline) => {
                    let kind = self.if_chain(indent, test, inline, number, column)?;
                    body.push(Stmt { kind, line: number });
                }
                Header::For {
                    target,
                    iter,
                    is_async,
                    inline,
                } => {
                    let loop_body = self.suite(indent, inline, number, column)?;
                    let orelse = self.else_clause(indent)?;
                    body.push(Stmt {
                        kind: StmtKind::For {
                            target,
                            iter,
                            body: loop_body,
                            orelse,
                            is_async,
                        },
                        line: number,
                    });
                }
                Header::While(test, inline) => {
                    let loop_body = self.suite(indent, inline, number, column)?;
                    let orelse = self.else_clause(indent)?;
                    body.push(Stmt {
                        kind: StmtKind::While {
                            test,
                            body: loop_body,
                            orelse,
                        },
                        line: number,
                    });
                }
                Header::With {
                    items,
                    is_async,
                    inline,
                } => {
                    let with_body = self.suite(indent, inline, number, column)?;
                    body.push(Stmt {
                        kind: StmtKind::With {
                            items,
                            body: with_body,
                            is_async,
                        },
                        line: number,
                    });
                }
                Header::Try(inline) => {
                    let kind = self.try_statement(indent, inline, number, column)?;
                    body.push(Stmt { kind, line: number });
                }
                Header::Match(subject) => {
                    let kind = self.match_statement(indent, subject, number, column)?;
                    body.push(Stmt { kind, line: number });
                }
                Header::Elif(..)
                | Header::Else(_)
                | Header::Except { .. }
                | Header::Finally(_)
                | Header::Case { .. } => {}
            }
        }
        if let Some(line) = decorator_line {
            return Err(ParseError::new(line, 1, "decorator must be followed by a function or class definition"));
        }
        Ok(body)
    }

    /// Body of a compound statement: the inline statements after `:` or the
    /// next, deeper-indented block.
    fn suite(
        &mut self,
        indent: usize,
        inline: Option<Vec<StmtKind>>,
        number: usize,
        column: usize,
    ) -> Result<Vec<Stmt>, ParseError> {
        if let Some(kinds) = inline {
            return Ok(kinds.into_iter().map(|kind| Stmt { kind, line: number }).collect());
        }
        match self.lines.peek() {
            Some(next) if next.indent > indent => {
                let deeper = next.indent;
                self.nested(number, column, |builder| builder.block(deeper))
            }
            _ => Err(ParseError::new(number, column, "expected an indented block")),
        }
    }

    fn nested<T>(
        &mut self,
        number: usize,
        column: usize,
        body: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_BLOCK_DEPTH {
            return Err(ParseError::new(number, column, "too many levels of indentation"));
        }
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        result
    }

    fn next_clause(&mut self, indent: usize) -> Option<&Header> {
        self.lines
            .peek()
            .filter(|next| next.indent == indent)
            .map(|next| &next.header)
    }

    fn if_chain(
        &mut self,
        indent: usize,
        test: Expr,
        inline: Option<Vec<StmtKind>>,
        number: usize,
        column: usize,
    ) -> Result<StmtKind, ParseError> {
        let body = self.suite(indent, inline, number, column)?;
        if !matches!(self.next_clause(indent), Some(Header::Elif(..))) {
            let orelse = self.else_clause(indent)?;
            return Ok(StmtKind::If { test, body, orelse });
        }
        let orelse = match self.lines.next() {
            Some(ParsedLine {
                number,
                column,
                header: Header::Elif(elif_test, inline),
                ..
            }) => {
                let kind = self.if_chain(indent, elif_test, inline, number, column)?;
                vec![Stmt { kind, line: number }]
            }
            _ => Vec::new(),
        };
        Ok(StmtKind::If { test, body, orelse })
    }

    fn else_clause(&mut self, indent: usize) -> Result<Vec<Stmt>, ParseError> {
        if !matches!(self.next_clause(indent), Some(Header::Else(_))) {
            return Ok(Vec::new());
        }
        match self.lines.next() {
            Some(ParsedLine {
                number,
                column,
                header: Header::Else(inline),
                ..
            }) => self.suite(indent, inline, number, column),
            _ => Ok(Vec::new()),
        }
    }

    fn try_statement(
        &mut self,
        indent: usize,
        inline: Option<Vec<StmtKind>>,
        number: usize,
        column: usize,
    ) -> Result<StmtKind, ParseError> {
        let body = self.suite(indent, inline, number, column)?;
        let mut handlers = Vec::new();
        while matches!(self.next_clause(indent), Some(Header::Except { .. })) {
            if let Some(ParsedLine {
                number,
                column,
                header: Header::Except { kind, name, inline },
                ..
            }) = self.lines.next()
            {
                let body = self.suite(indent, inline, number, column)?;
                handlers.push(ExceptHandler { kind, name, body });
            }
        }
        let orelse = self.else_clause(indent)?;
        let mut finalbody = Vec::new();
        if matches!(self.next_clause(indent), Some(Header::Finally(_))) {
            if let Some(ParsedLine {
                number,
                column,
                header: Header::Finally(inline),
                ..
            }) = self.lines.next()
            {
                finalbody = self.suite(indent, inline, number, column)?;
            }
        }
        if handlers.is_empty() && finalbody.is_empty() {
            return Err(ParseError::new(number, column, "expected 'except' or 'finally' block"));
        }
        Ok(StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        })
    }
}

impl BlockBuilder {
    /// `match` header followed by an indented run of `case` clauses.
    fn match_statement(
        &mut self,
        indent: usize,
        subject: Expr,
        number: usize,
        column: usize,
    ) -> Result<StmtKind, ParseError> {
        let case_indent = match self.lines.peek() {
            Some(next) if next.indent > indent => next.indent,
            _ => return Err(ParseError::new(number, column, "expected an indented block")),
        };
        let cases = self.nested(number, column, |builder| builder.cases(case_indent))?;
        Ok(StmtKind::Match { subject, cases })
    }

    fn cases(&mut self, indent: usize) -> Result<Vec<MatchCase>, ParseError> {
        let mut cases = Vec::new();
        while let Some(next) = self.lines.peek() {
            if next.indent < indent {
                break;
            }
            if next.indent > indent {
                return Err(ParseError::new(next.number, next.column, "unexpected indent"));
            }
            let Some(line) = self.lines.next() else { break };
            let Header::Case {
                pattern,
                binding,
                guard,
                inline,
            } = line.header
            else {
                return Err(ParseError::new(line.number, line.column, "expected 'case' block"));
            };
            let body = self.suite(indent, inline, line.number, line.column)?;
            cases.push(MatchCase {
                pattern,
                binding,
                guard,
                body,
            });
        }
        Ok(cases)
    }
}

// ==================== Line headers ====================

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_as
            | Rule::kw_assert
            | Rule::kw_async
            | Rule::kw_break
            | Rule::kw_class
            | Rule::kw_continue
            | Rule::kw_def
            | Rule::kw_del
            | Rule::kw_elif
            | Rule::kw_else
            | Rule::kw_except
            | Rule::kw_finally
            | Rule::kw_for
            | Rule::kw_from
            | Rule::kw_global
            | Rule::kw_if
            | Rule::kw_import
            | Rule::kw_in
            | Rule::kw_lambda
            | Rule::kw_nonlocal
            | Rule::kw_pass
            | Rule::kw_raise
            | Rule::kw_return
            | Rule::kw_try
            | Rule::kw_while
            | Rule::kw_with
            | Rule::kw_yield
            | Rule::kw_await
            | Rule::kw_match
            | Rule::kw_case
    )
}

/// Inner pairs with keyword tokens removed.
fn significant(pair: Pair<Rule>) -> Vec<Pair<Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule())).collect()
}

fn has_async(pair: &Pair<Rule>) -> bool {
    pair.clone().into_inner().any(|p| p.as_rule() == Rule::kw_async)
}

fn build_header(pair: Pair<Rule>) -> Result<Header, String> {
    match pair.as_rule() {
        Rule::simple_stmts => Ok(Header::Simple(build_simple_stmts(pair)?)),
        Rule::decorator => {
            let expr = pair.into_inner().next().ok_or("decorator: missing expression")?;
            Ok(Header::Decorator(build_expr(expr)?))
        }
        Rule::def_header => build_def_header(pair),
        Rule::class_header => build_class_header(pair),
        Rule::if_header | Rule::elif_header | Rule::while_header => {
            let rule = pair.as_rule();
            let mut test = None;
            let mut inline = None;
            for inner in significant(pair) {
                match inner.as_rule() {
                    Rule::inline_body => inline = Some(build_inline(inner)?),
                    _ => test = Some(build_expr(inner)?),
                }
            }
            let test = test.ok_or("missing condition")?;
            Ok(match rule {
                Rule::if_header => Header::If(test, inline),
                Rule::elif_header => Header::Elif(test, inline),
                _ => Header::While(test, inline),
            })
        }
        Rule::else_header | Rule::try_header | Rule::finally_header => {
            let rule = pair.as_rule();
            let inline = match significant(pair).into_iter().next() {
                Some(body) => Some(build_inline(body)?),
                None => None,
            };
            Ok(match rule {
                Rule::else_header => Header::Else(inline),
                Rule::try_header => Header::Try(inline),
                _ => Header::Finally(inline),
            })
        }
        Rule::for_header => {
            let is_async = has_async(&pair);
            let mut target = None;
            let mut iter = None;
            let mut inline = None;
            for inner in significant(pair) {
                match inner.as_rule() {
                    Rule::target_list => target = Some(build_target_list(inner)?),
                    Rule::expr_list => iter = Some(build_expr_list(inner)?),
                    Rule::inline_body => inline = Some(build_inline(inner)?),
                    _ => {}
                }
            }
            Ok(Header::For {
                target: target.ok_or("for: missing target")?,
                iter: iter.ok_or("for: missing iterable")?,
                is_async,
                inline,
            })
        }
        Rule::with_header => {
            let is_async = has_async(&pair);
            let mut items = Vec::new();
            let mut inline = None;
            for inner in significant(pair) {
                match inner.as_rule() {
                    Rule::with_item => {
                        let mut parts = significant(inner).into_iter();
                        let context = build_expr(parts.next().ok_or("with: missing context")?)?;
                        let target = parts.next().map(build_target).transpose()?;
                        items.push(WithItem { context, target });
                    }
                    Rule::inline_body => inline = Some(build_inline(inner)?),
                    _ => {}
                }
            }
            Ok(Header::With {
                items,
                is_async,
                inline,
            })
        }
        Rule::except_header => {
            let mut kind = None;
            let mut name = None;
            let mut inline = None;
            for inner in significant(pair) {
                match inner.as_rule() {
                    Rule::ident => name = Some(inner.as_str().to_string()),
                    Rule::inline_body => inline = Some(build_inline(inner)?),
                    _ => kind = Some(build_expr(inner)?),
                }
            }
            Ok(Header::Except { kind, name, inline })
        }
        Rule::match_header => {
            let subject = significant(pair).into_iter().next().ok_or("match: missing subject")?;
            Ok(Header::Match(build_expr_list(subject)?))
        }
        Rule::case_header => {
            let mut pattern = None;
            let mut binding = None;
            let mut guard = None;
            let mut inline = None;
            for inner in significant(pair) {
                match inner.as_rule() {
                    Rule::case_pattern => {
                        let mut parts = significant(inner).into_iter();
                        pattern = Some(build_expr_list(parts.next().ok_or("case: missing pattern")?)?);
                        binding = parts.next().map(|p| p.as_str().to_string());
                    }
                    Rule::case_guard => {
                        let test = significant(inner).into_iter().next().ok_or("case: missing guard")?;
                        guard = Some(build_expr(test)?);
                    }
                    Rule::inline_body => inline = Some(build_inline(inner)?),
                    _ => {}
                }
            }
            Ok(Header::Case {
                pattern: pattern.ok_or("case: missing pattern")?,
                binding,
                guard,
                inline,
            })
        }
        other => Err(format!("unexpected {:?} at statement start", other)),
    }
}

fn build_inline(pair: Pair<Rule>) -> Result<Vec<StmtKind>, String> {
    let stmts = pair.into_inner().next().ok_or("empty inline body")?;
    build_simple_stmts(stmts)
}

fn build_def_header(pair: Pair<Rule>) -> Result<Header, String> {
    let is_async = has_async(&pair);
    let mut name = None;
    let mut params = Vec::new();
    let mut returns = None;
    let mut inline = None;
    for inner in significant(pair) {
        match inner.as_rule() {
            Rule::ident => name = Some(inner.as_str().to_string()),
            Rule::params => params = build_params(inner)?,
            Rule::return_annotation => {
                let expr = inner.into_inner().next().ok_or("def: missing return annotation")?;
                returns = Some(build_expr(expr)?);
            }
            Rule::inline_body => inline = Some(build_inline(inner)?),
            _ => {}
        }
    }
    let def = FunctionDef {
        name: name.ok_or("def: missing name")?,
        params,
        returns,
        body: Vec::new(),
        decorators: Vec::new(),
        is_async,
    };
    Ok(Header::Def(def, inline))
}

fn build_params(pair: Pair<Rule>) -> Result<Vec<Param>, String> {
    let mut params = Vec::new();
    for inner in pair.into_inner() {
        let kind = match inner.as_rule() {
            Rule::param | Rule::lambda_param => ParamKind::Regular,
            Rule::var_positional | Rule::lambda_var_positional => ParamKind::VarPositional,
            Rule::var_keyword | Rule::lambda_var_keyword => ParamKind::VarKeyword,
            _ => continue,
        };
        let mut name = String::new();
        let mut annotation = None;
        let mut default = None;
        for part in inner.into_inner() {
            match part.as_rule() {
                Rule::ident => name = part.as_str().to_string(),
                Rule::param_annotation => {
                    let expr = part.into_inner().next().ok_or("param: missing annotation")?;
                    annotation = Some(build_expr(expr)?);
                }
                Rule::param_default => {
                    let expr = part.into_inner().next().ok_or("param: missing default")?;
                    default = Some(build_expr(expr)?);
                }
                _ => {}
            }
        }
        params.push(Param {
            name,
            kind,
            annotation,
            default,
        });
    }
    Ok(params)
}

fn build_class_header(pair: Pair<Rule>) -> Result<Header, String> {
    let mut name = None;
    let mut bases = Vec::new();
    let mut keywords = Vec::new();
    let mut inline = None;
    for inner in significant(pair) {
        match inner.as_rule() {
            Rule::ident => name = Some(inner.as_str().to_string()),
            Rule::class_bases => {
                for arg in inner.into_inner() {
                    match build_argument(arg)? {
                        Argument::Positional(expr) => bases.push(expr),
                        Argument::Keyword(keyword) => keywords.push(keyword),
                    }
                }
            }
            Rule::inline_body => inline = Some(build_inline(inner)?),
            _ => {}
        }
    }
    let class = ClassDef {
        name: name.ok_or("class: missing name")?,
        bases,
        keywords,
        body: Vec::new(),
        decorators: Vec::new(),
    };
    Ok(Header::Class(class, inline))
}

// ==================== Simple statements ====================

fn build_simple_stmts(pair: Pair<Rule>) -> Result<Vec<StmtKind>, String> {
    pair.into_inner().map(build_simple_stmt).collect()
}

fn build_simple_stmt(pair: Pair<Rule>) -> Result<StmtKind, String> {
    match pair.as_rule() {
        Rule::pass_stmt => Ok(StmtKind::Pass),
        Rule::break_stmt => Ok(StmtKind::Break),
        Rule::continue_stmt => Ok(StmtKind::Continue),
        Rule::return_stmt => {
            let value = significant(pair).into_iter().next().map(build_expr_list).transpose()?;
            Ok(StmtKind::Return(value))
        }
        Rule::raise_stmt => {
            let mut exc = None;
            let mut cause = None;
            for inner in significant(pair) {
                match inner.as_rule() {
                    Rule::raise_cause => {
                        let expr = significant(inner).into_iter().next().ok_or("raise: missing cause")?;
                        cause = Some(build_expr(expr)?);
                    }
                    _ => exc = Some(build_expr(inner)?),
                }
            }
            Ok(StmtKind::Raise { exc, cause })
        }
        Rule::global_stmt | Rule::nonlocal_stmt => {
            let rule = pair.as_rule();
            let names: Vec<String> = significant(pair).iter().map(|p| p.as_str().to_string()).collect();
            Ok(if rule == Rule::global_stmt {
                StmtKind::Global(names)
            } else {
                StmtKind::Nonlocal(names)
            })
        }
        Rule::del_stmt => {
            let targets = significant(pair).into_iter().next().ok_or("del: missing target")?;
            Ok(StmtKind::Delete(build_expr_list(targets)?))
        }
        Rule::assert_stmt => {
            let mut parts = significant(pair).into_iter();
            let test = build_expr(parts.next().ok_or("assert: missing test")?)?;
            let msg = parts.next().map(build_expr).transpose()?;
            Ok(StmtKind::Assert { test, msg })
        }
        Rule::import_name => {
            let mut names = Vec::new();
            for inner in significant(pair) {
                names.push(build_alias(inner)?);
            }
            Ok(StmtKind::Import(names))
        }
        Rule::import_from => {
            let mut module = String::new();
            let mut names = Vec::new();
            for inner in significant(pair) {
                match inner.as_rule() {
                    Rule::module_path => module = inner.into_inner().map(|p| p.as_str()).collect(),
                    Rule::import_star => names.push(Alias {
                        name: "*".to_string(),
                        asname: None,
                    }),
                    Rule::import_as_name => names.push(build_alias(inner)?),
                    _ => {}
                }
            }
            Ok(StmtKind::ImportFrom { module, names })
        }
        Rule::yield_stmt => {
            let inner = pair.into_inner().next().ok_or("yield: empty")?;
            Ok(StmtKind::Expr(build_yield(inner)?))
        }
        Rule::aug_assign => {
            let mut parts = pair.into_inner();
            let target = build_target(parts.next().ok_or("augmented assignment: missing target")?)?;
            let op_pair = parts.next().ok_or("augmented assignment: missing operator")?;
            let op = aug_operator(op_pair.as_str())?;
            let value = build_expr_or_yield(parts.next().ok_or("augmented assignment: missing value")?)?;
            Ok(StmtKind::AugAssign { target, op, value })
        }
        Rule::ann_assign => {
            let mut parts = pair.into_inner();
            let target = build_target(parts.next().ok_or("annotation: missing target")?)?;
            let annotation = build_expr(parts.next().ok_or("annotation: missing type")?)?;
            let value = match parts.next() {
                Some(ann_value) => {
                    let inner = ann_value.into_inner().next().ok_or("annotation: missing value")?;
                    Some(build_expr_or_yield(inner)?)
                }
                None => None,
            };
            Ok(StmtKind::AnnAssign {
                target,
                annotation,
                value,
            })
        }
        Rule::assign_stmt => {
            let mut parts: Vec<Pair<Rule>> = pair.into_inner().collect();
            let value = build_expr_or_yield(parts.pop().ok_or("assignment: missing value")?)?;
            let targets = parts.into_iter().map(build_target_list).collect::<Result<_, _>>()?;
            Ok(StmtKind::Assign { targets, value })
        }
        Rule::expr_stmt => {
            let inner = pair.into_inner().next().ok_or("empty expression statement")?;
            Ok(StmtKind::Expr(build_expr_list(inner)?))
        }
        other => Err(format!("unexpected {:?} in statement", other)),
    }
}

fn build_alias(pair: Pair<Rule>) -> Result<Alias, String> {
    let mut parts = significant(pair).into_iter();
    let name = parts.next().ok_or("import: missing name")?.as_str().to_string();
    let asname = parts.next().map(|p| p.as_str().to_string());
    Ok(Alias { name, asname })
}

fn aug_operator(text: &str) -> Result<BinOp, String> {
    Ok(match text.trim_end_matches('=') {
        "+" => BinOp::Add,
        "-" => BinOp::Sub,
        "*" => BinOp::Mult,
        "**" => BinOp::Pow,
        "/" => BinOp::Div,
        "//" => BinOp::FloorDiv,
        "%" => BinOp::Mod,
        "@" => BinOp::MatMult,
        "&" => BinOp::BitAnd,
        "|" => BinOp::BitOr,
        "^" => BinOp::BitXor,
        "<<" => BinOp::LShift,
        ">>" => BinOp::RShift,
        other => return Err(format!("unknown augmented operator '{}='", other)),
    })
}

// ==================== Expressions ====================

fn build_expr_or_yield(pair: Pair<Rule>) -> Result<Expr, String> {
    match pair.as_rule() {
        Rule::yield_expr => build_yield(pair),
        Rule::expr_list => build_expr_list(pair),
        _ => build_expr(pair),
    }
}

/// Comma-separated expressions: a tuple unless there is one item and no trailing comma.
fn build_expr_list(pair: Pair<Rule>) -> Result<Expr, String> {
    let mut items = Vec::new();
    let mut trailing = false;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::trailing_comma => trailing = true,
            _ => items.push(build_expr(inner)?),
        }
    }
    if items.len() == 1 && !trailing {
        return items.pop().ok_or_else(|| "empty expression list".to_string());
    }
    Ok(Expr::Tuple(items))
}

fn build_target_list(pair: Pair<Rule>) -> Result<Expr, String> {
    let mut items = Vec::new();
    let mut trailing = false;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::trailing_comma => trailing = true,
            _ => items.push(build_target(inner)?),
        }
    }
    if items.len() == 1 && !trailing {
        return items.pop().ok_or_else(|| "empty target list".to_string());
    }
    Ok(Expr::Tuple(items))
}

fn build_target(pair: Pair<Rule>) -> Result<Expr, String> {
    match pair.as_rule() {
        Rule::starred_target => {
            let inner = pair.into_inner().next().ok_or("starred target: empty")?;
            Ok(Expr::Starred(Box::new(build_primary(inner)?)))
        }
        _ => build_expr(pair),
    }
}

fn build_expr(pair: Pair<Rule>) -> Result<Expr, String> {
    match pair.as_rule() {
        Rule::conditional => build_conditional(pair),
        Rule::lambda_expr => build_lambda(pair),
        Rule::named_expr => {
            let mut parts = pair.into_inner();
            let target = parts.next().ok_or("':=': missing target")?;
            let value = build_expr(parts.next().ok_or("':=': missing value")?)?;
            Ok(Expr::NamedExpr {
                target: Box::new(Expr::name(target.as_str())),
                value: Box::new(value),
            })
        }
        Rule::disjunction => build_disjunction(pair),
        Rule::primary => build_primary(pair),
        Rule::starred => {
            let inner = pair.into_inner().next().ok_or("starred: empty")?;
            Ok(Expr::Starred(Box::new(build_disjunction(inner)?)))
        }
        Rule::yield_expr => build_yield(pair),
        Rule::expr_list => build_expr_list(pair),
        other => Err(format!("unexpected {:?} in expression", other)),
    }
}

fn build_conditional(pair: Pair<Rule>) -> Result<Expr, String> {
    let mut parts = significant(pair).into_iter();
    let body = build_expr(parts.next().ok_or("conditional: empty")?)?;
    match (parts.next(), parts.next()) {
        (Some(test), Some(orelse)) => Ok(Expr::IfExp {
            test: Box::new(build_expr(test)?),
            body: Box::new(body),
            orelse: Box::new(build_expr(orelse)?),
        }),
        _ => Ok(body),
    }
}

fn build_lambda(pair: Pair<Rule>) -> Result<Expr, String> {
    let mut params = Vec::new();
    let mut body = None;
    for inner in significant(pair) {
        match inner.as_rule() {
            Rule::lambda_params => params = build_params(inner)?,
            _ => body = Some(build_expr(inner)?),
        }
    }
    Ok(Expr::Lambda {
        params,
        body: Box::new(body.ok_or("lambda: missing body")?),
    })
}

fn build_disjunction(pair: Pair<Rule>) -> Result<Expr, String> {
    let operators = pair.clone().into_inner().filter(|p| p.as_rule() != Rule::primary).count();
    if operators > MAX_CHAIN_LEN {
        return Err(format!("expression too deeply nested (more than {} operators)", MAX_CHAIN_LEN));
    }
    PRATT
        .map_primary(build_primary)
        .map_prefix(|op, operand| {
            let op = match op.as_rule() {
                Rule::op_not => UnaryOp::Not,
                Rule::op_neg => UnaryOp::Neg,
                Rule::op_pos => UnaryOp::Pos,
                Rule::op_invert => UnaryOp::Invert,
                other => return Err(format!("unexpected prefix operator {:?}", other)),
            };
            Ok(Expr::UnaryOp {
                op,
                operand: Box::new(operand?),
            })
        })
        .map_infix(|left, op, right| {
            let op = match op.as_rule() {
                Rule::op_or => BinOp::Or,
                Rule::op_and => BinOp::And,
                Rule::op_in => BinOp::In,
                Rule::op_not_in => BinOp::NotIn,
                Rule::op_is => BinOp::Is,
                Rule::op_is_not => BinOp::IsNot,
                Rule::op_eq => BinOp::Eq,
                Rule::op_ne => BinOp::NotEq,
                Rule::op_lt => BinOp::Lt,
                Rule::op_le => BinOp::LtE,
                Rule::op_gt => BinOp::Gt,
                Rule::op_ge => BinOp::GtE,
                Rule::op_bitor => BinOp::BitOr,
                Rule::op_bitxor => BinOp::BitXor,
                Rule::op_bitand => BinOp::BitAnd,
                Rule::op_lshift => BinOp::LShift,
                Rule::op_rshift => BinOp::RShift,
                Rule::op_add => BinOp::Add,
                Rule::op_sub => BinOp::Sub,
                Rule::op_mul => BinOp::Mult,
                Rule::op_div => BinOp::Div,
                Rule::op_floordiv => BinOp::FloorDiv,
                Rule::op_mod => BinOp::Mod,
                Rule::op_matmul => BinOp::MatMult,
                Rule::op_pow => BinOp::Pow,
                other => return Err(format!("unexpected operator {:?}", other)),
            };
            Ok(Expr::BinOp {
                left: Box::new(left?),
                op,
                right: Box::new(right?),
            })
        })
        .parse(pair.into_inner())
}

fn build_primary(pair: Pair<Rule>) -> Result<Expr, String> {
    let mut inner = pair.into_inner().peekable();
    let awaited = inner.next_if(|p| p.as_rule() == Rule::kw_await).is_some();
    let atom = inner.next().ok_or("empty primary")?;
    let mut expr = build_atom(atom)?;
    let trailers: Vec<Pair<Rule>> = inner.collect();
    if trailers.len() > MAX_CHAIN_LEN {
        return Err(format!("expression too deeply nested (more than {} trailers)", MAX_CHAIN_LEN));
    }
    for trailer in trailers {
        expr = match trailer.as_rule() {
            Rule::call => build_call(expr, trailer)?,
            Rule::subscript => build_subscript(expr, trailer)?,
            Rule::attribute => {
                let attr = trailer.into_inner().next().ok_or("attribute: missing name")?;
                Expr::Attribute {
                    value: Box::new(expr),
                    attr: attr.as_str().to_string(),
                }
            }
            other => return Err(format!("unexpected trailer {:?}", other)),
        };
    }
    if awaited {
        return Ok(Expr::Await(Box::new(expr)));
    }
    Ok(expr)
}

enum Argument {
    Positional(Expr),
    Keyword(Keyword),
}

fn build_argument(pair: Pair<Rule>) -> Result<Argument, String> {
    match pair.as_rule() {
        Rule::kwarg => {
            let mut parts = pair.into_inner();
            let name = parts.next().ok_or("keyword argument: missing name")?;
            let value = build_expr(parts.next().ok_or("keyword argument: missing value")?)?;
            Ok(Argument::Keyword(Keyword {
                arg: Some(name.as_str().to_string()),
                value,
            }))
        }
        Rule::double_star_arg => {
            let value = build_expr(pair.into_inner().next().ok_or("'**' argument: empty")?)?;
            Ok(Argument::Keyword(Keyword { arg: None, value }))
        }
        Rule::star_arg => {
            let value = build_expr(pair.into_inner().next().ok_or("'*' argument: empty")?)?;
            Ok(Argument::Positional(Expr::Starred(Box::new(value))))
        }
        Rule::positional_arg => {
            let mut parts = pair.into_inner();
            let element = build_expr(parts.next().ok_or("argument: empty")?)?;
            let generators = parts.map(build_comp_for).collect::<Result<Vec<_>, _>>()?;
            if generators.is_empty() {
                Ok(Argument::Positional(element))
            } else {
                Ok(Argument::Positional(Expr::Comprehension {
                    kind: ComprehensionKind::Generator,
                    element: Box::new(element),
                    value: None,
                    generators,
                }))
            }
        }
        other => Err(format!("unexpected {:?} in argument list", other)),
    }
}

fn build_call(func: Expr, pair: Pair<Rule>) -> Result<Expr, String> {
    let mut args = Vec::new();
    let mut keywords = Vec::new();
    for inner in pair.into_inner() {
        match build_argument(inner)? {
            Argument::Positional(expr) => args.push(expr),
            Argument::Keyword(keyword) => keywords.push(keyword),
        }
    }
    Ok(Expr::Call(Call {
        func: Box::new(func),
        args,
        keywords,
    }))
}

fn build_subscript(value: Expr, pair: Pair<Rule>) -> Result<Expr, String> {
    let mut items = Vec::new();
    let mut trailing = false;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::subscript_item => items.push(build_subscript_item(inner)?),
            Rule::trailing_comma => trailing = true,
            _ => {}
        }
    }
    let index = if items.len() == 1 && !trailing {
        items.pop().ok_or("empty subscript")?
    } else {
        Expr::Tuple(items)
    };
    Ok(Expr::Subscript {
        value: Box::new(value),
        index: Box::new(index),
    })
}

fn build_subscript_item(pair: Pair<Rule>) -> Result<Expr, String> {
    let mut lower = None;
    let mut upper = None;
    let mut step = None;
    let mut colons = 0;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::star_arg => {
                let value = build_expr(inner.into_inner().next().ok_or("'*' subscript: empty")?)?;
                return Ok(Expr::Starred(Box::new(value)));
            }
            Rule::slice_colon => colons += 1,
            Rule::slice_lower | Rule::slice_upper | Rule::slice_step => {
                let rule = inner.as_rule();
                let expr = build_expr(inner.into_inner().next().ok_or("slice: empty bound")?)?;
                let slot = match rule {
                    Rule::slice_lower => &mut lower,
                    Rule::slice_upper => &mut upper,
                    _ => &mut step,
                };
                *slot = Some(Box::new(expr));
            }
            _ => {}
        }
    }
    if colons == 0 {
        return lower.map(|e| *e).ok_or_else(|| "empty subscript".to_string());
    }
    Ok(Expr::Slice { lower, upper, step })
}

fn build_atom(pair: Pair<Rule>) -> Result<Expr, String> {
    match pair.as_rule() {
        Rule::ident => Ok(Expr::Name(pair.as_str().to_string())),
        Rule::number => build_number(pair.as_str()),
        Rule::strings => build_strings(pair),
        Rule::none_lit => Ok(Expr::Constant(Constant::None)),
        Rule::true_lit => Ok(Expr::Constant(Constant::Bool(true))),
        Rule::false_lit => Ok(Expr::Constant(Constant::Bool(false))),
        Rule::ellipsis => Ok(Expr::Constant(Constant::Ellipsis)),
        Rule::parenthesized => build_parenthesized(pair),
        Rule::list_form => {
            let (items, generators) = build_display_items(pair)?;
            display(ComprehensionKind::List, items, generators)
        }
        Rule::brace_form => build_brace_form(pair),
        other => Err(format!("unexpected {:?} in expression", other)),
    }
}

/// Elements and comprehension clauses of a bracketed display.
fn build_display_items(pair: Pair<Rule>) -> Result<(Vec<Expr>, Vec<Generator>), String> {
    let mut items = Vec::new();
    let mut generators = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::comp_for => generators.push(build_comp_for(inner)?),
            Rule::tuple_comma => {}
            _ => items.push(build_expr(inner)?),
        }
    }
    Ok((items, generators))
}

fn display(kind: ComprehensionKind, mut items: Vec<Expr>, generators: Vec<Generator>) -> Result<Expr, String> {
    if generators.is_empty() {
        return Ok(match kind {
            ComprehensionKind::Set => Expr::Set(items),
            ComprehensionKind::Generator => Expr::Tuple(items),
            _ => Expr::List(items),
        });
    }
    let element = items.pop().ok_or("comprehension: missing element")?;
    Ok(Expr::Comprehension {
        kind,
        element: Box::new(element),
        value: None,
        generators,
    })
}

fn build_parenthesized(pair: Pair<Rule>) -> Result<Expr, String> {
    let is_tuple = pair.clone().into_inner().any(|p| p.as_rule() == Rule::tuple_comma);
    let inner: Vec<Pair<Rule>> = pair.clone().into_inner().collect();
    if let [single] = inner.as_slice() {
        if single.as_rule() == Rule::yield_expr {
            return build_yield(single.clone());
        }
    }
    let (mut items, generators) = build_display_items(pair)?;
    if !generators.is_empty() {
        return display(ComprehensionKind::Generator, items, generators);
    }
    if items.len() == 1 && !is_tuple {
        return items.pop().ok_or_else(|| "empty parentheses".to_string());
    }
    Ok(Expr::Tuple(items))
}

fn build_brace_form(pair: Pair<Rule>) -> Result<Expr, String> {
    let Some(body) = pair.into_inner().next() else {
        return Ok(Expr::Dict(Vec::new()));
    };
    match body.as_rule() {
        Rule::set_body => {
            let (items, generators) = build_display_items(body)?;
            display(ComprehensionKind::Set, items, generators)
        }
        Rule::dict_body => {
            let mut entries = Vec::new();
            let mut generators = Vec::new();
            for inner in body.into_inner() {
                match inner.as_rule() {
                    Rule::dict_pair => {
                        let mut parts = inner.into_inner();
                        let key = build_expr(parts.next().ok_or("dict: missing key")?)?;
                        let value = build_expr(parts.next().ok_or("dict: missing value")?)?;
                        entries.push(DictEntry {
                            key: Some(key),
                            value,
                        });
                    }
                    Rule::dict_unpack => {
                        let value = build_disjunction(inner.into_inner().next().ok_or("dict: empty '**'")?)?;
                        entries.push(DictEntry { key: None, value });
                    }
                    Rule::comp_for => generators.push(build_comp_for(inner)?),
                    _ => {}
                }
            }
            if generators.is_empty() {
                return Ok(Expr::Dict(entries));
            }
            match entries.pop() {
                Some(DictEntry {
                    key: Some(key),
                    value,
                }) => Ok(Expr::Comprehension {
                    kind: ComprehensionKind::Dict,
                    element: Box::new(key),
                    value: Some(Box::new(value)),
                    generators,
                }),
                _ => Err("dict comprehension needs a key: value element".to_string()),
            }
        }
        other => Err(format!("unexpected {:?} in braces", other)),
    }
}

fn build_comp_for(pair: Pair<Rule>) -> Result<Generator, String> {
    let is_async = has_async(&pair);
    let mut target = None;
    let mut iter = None;
    let mut ifs = Vec::new();
    for inner in significant(pair) {
        match inner.as_rule() {
            Rule::target_list => target = Some(build_target_list(inner)?),
            Rule::comp_if => {
                let cond = significant(inner).into_iter().next().ok_or("comprehension: empty 'if'")?;
                ifs.push(build_expr(cond)?);
            }
            _ => iter = Some(build_expr(inner)?),
        }
    }
    Ok(Generator {
        target: target.ok_or("comprehension: missing target")?,
        iter: iter.ok_or("comprehension: missing iterable")?,
        ifs,
        is_async,
    })
}

fn build_yield(pair: Pair<Rule>) -> Result<Expr, String> {
    match significant(pair).into_iter().next() {
        None => Ok(Expr::Yield {
            value: None,
            delegate: false,
        }),
        Some(inner) if inner.as_rule() == Rule::yield_from => {
            let value = significant(inner).into_iter().next().ok_or("yield from: missing value")?;
            Ok(Expr::Yield {
                value: Some(Box::new(build_expr(value)?)),
                delegate: true,
            })
        }
        Some(inner) => Ok(Expr::Yield {
            value: Some(Box::new(build_expr_list(inner)?)),
            delegate: false,
        }),
    }
}

// ==================== Literals ====================

fn build_number(text: &str) -> Result<Expr, String> {
    let clean: String = text.chars().filter(|c| *c != '_').collect::<String>().to_ascii_lowercase();
    let radix = [("0x", 16), ("0o", 8), ("0b", 2)]
        .into_iter()
        .find_map(|(prefix, radix)| clean.strip_prefix(prefix).map(|digits| (digits, radix)));
    if let Some((digits, radix)) = radix {
        return i128::from_str_radix(digits, radix)
            .map(|i| Expr::Constant(Constant::Int(i)))
            .map_err(|_| format!("integer literal too large: {}", text));
    }
    if let Some(imag) = clean.strip_suffix('j') {
        return imag
            .parse::<f64>()
            .map(|x| Expr::Constant(Constant::Imaginary(x)))
            .map_err(|e| format!("invalid imaginary literal {}: {}", text, e));
    }
    if clean.contains('.') || clean.contains('e') {
        return clean
            .parse::<f64>()
            .map(|x| Expr::Constant(Constant::Float(x)))
            .map_err(|e| format!("invalid float literal {}: {}", text, e));
    }
    clean
        .parse::<i128>()
        .map(|i| Expr::Constant(Constant::Int(i)))
        .map_err(|_| format!("integer literal too large: {}", text))
}

enum StrPart {
    Str(String),
    Bytes(Vec<u8>),
    Formatted,
}

/// Adjacent string literals are concatenated; any f-string part keeps the
/// whole run as source text.
fn build_strings(pair: Pair<Rule>) -> Result<Expr, String> {
    let source = pair.as_str().to_string();
    let mut text = String::new();
    let mut bytes = Vec::new();
    let mut saw_str = false;
    let mut saw_bytes = false;
    let mut formatted = false;
    for inner in pair.into_inner() {
        match build_string(inner)? {
            StrPart::Str(s) => {
                saw_str = true;
                text.push_str(&s);
            }
            StrPart::Bytes(b) => {
                saw_bytes = true;
                bytes.extend(b);
            }
            StrPart::Formatted => {
                saw_str = true;
                formatted = true;
            }
        }
    }
    if saw_str && saw_bytes {
        return Err("cannot mix bytes and nonbytes literals".to_string());
    }
    if formatted {
        return Ok(Expr::FormattedString(source));
    }
    if saw_bytes {
        Ok(Expr::Constant(Constant::Bytes(bytes)))
    } else {
        Ok(Expr::Constant(Constant::Str(text)))
    }
}

fn build_string(pair: Pair<Rule>) -> Result<StrPart, String> {
    let mut prefix = String::new();
    let mut body = "";
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::string_prefix => prefix = inner.as_str().to_ascii_lowercase(),
            Rule::long_dq | Rule::long_sq | Rule::short_dq | Rule::short_sq => {
                body = inner.into_inner().next().map(|t| t.as_str()).unwrap_or("");
            }
            _ => {}
        }
    }
    let raw = prefix.contains('r');
    if prefix.contains('f') {
        return Ok(StrPart::Formatted);
    }
    if prefix.contains('b') {
        if !body.is_ascii() {
            return Err("bytes can only contain ASCII literal characters".to_string());
        }
        if raw {
            return Ok(StrPart::Bytes(body.as_bytes().to_vec()));
        }
        let units = unescape(body, true)?;
        let bytes = units
            .into_iter()
            .map(|u| u8::try_from(u).map_err(|_| "escape out of range in bytes literal".to_string()))
            .collect::<Result<Vec<u8>, String>>()?;
        return Ok(StrPart::Bytes(bytes));
    }
    if raw {
        return Ok(StrPart::Str(body.to_string()));
    }
    let units = unescape(body, false)?;
    Ok(StrPart::Str(
        units
            .into_iter()
            .map(|u| char::from_u32(u).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect(),
    ))
}

/// Resolve backslash escapes to code points (bytes when `bytes` is set).
fn unescape(body: &str, bytes: bool) -> Result<Vec<u32>, String> {
    let mut out = Vec::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c as u32);
            continue;
        }
        let Some(escaped) = chars.next() else {
            out.push('\\' as u32);
            break;
        };
        match escaped {
            '\n' => {}
            '\\' | '\'' | '"' => out.push(escaped as u32),
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'n' => out.push(0x0a),
            'r' => out.push(0x0d),
            't' => out.push(0x09),
            'v' => out.push(0x0b),
            '0'..='7' => {
                let mut value = escaped.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(value);
            }
            'x' => out.push(hex_escape(&mut chars, 2, "\\x")?),
            'u' if !bytes => out.push(hex_escape(&mut chars, 4, "\\u")?),
            'U' if !bytes => {
                let value = hex_escape(&mut chars, 8, "\\U")?;
                if value > 0x10ffff {
                    return Err("illegal Unicode character in \\U escape".to_string());
                }
                out.push(value);
            }
            'N' if !bytes => return Err("named Unicode escapes are not supported".to_string()),
            other => {
                out.push('\\' as u32);
                out.push(other as u32);
            }
        }
    }
    Ok(out)
}

fn hex_escape(chars: &mut Peekable<std::str::Chars<'_>>, digits: usize, name: &str) -> Result<u32, String> {
    let mut value = 0u32;
    for _ in 0..digits {
        let d = chars
            .next()
            .and_then(|c| c.to_digit(16))
            .ok_or_else(|| format!("truncated {} escape", name))?;
        value = value * 16 + d;
    }
    Ok(value)
}
