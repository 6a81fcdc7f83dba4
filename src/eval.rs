//! Partial evaluation of expressions to [`Value`]s.

use indexmap::IndexMap;

use crate::ast::{BinOp, Call, Constant, Expr, UnaryOp};
use crate::symbols::SymbolTable;
use crate::value::Value;

/// Value of a pure literal: constants, and tuples, lists, sets and dicts of
/// literals. `None` for anything that needs evaluation.
pub fn literal_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Constant(constant) => match constant {
            Constant::None => Some(Value::None),
            Constant::Bool(b) => Some(Value::Bool(*b)),
            Constant::Int(i) => Some(Value::Int(*i)),
            Constant::Float(x) => Some(Value::Float(*x)),
            Constant::Str(s) => Some(Value::Str(s.clone())),
            Constant::Bytes(b) => Some(Value::Str(b.iter().map(|&byte| byte as char).collect())),
            Constant::Imaginary(_) | Constant::Ellipsis => None,
        },
        Expr::Tuple(items) | Expr::List(items) | Expr::Set(items) => {
            items.iter().map(literal_value).collect::<Option<Vec<_>>>().map(Value::List)
        }
        Expr::Dict(entries) => {
            let mut map = IndexMap::new();
            for entry in entries {
                let key = literal_value(entry.key.as_ref()?).and_then(|k| dict_key(&k))?;
                map.insert(key, literal_value(&entry.value)?);
            }
            Some(Value::Dict(map))
        }
        Expr::UnaryOp {
            op: op @ (UnaryOp::Neg | UnaryOp::Pos),
            operand,
        } => match (op, literal_value(operand)?) {
            (UnaryOp::Neg, Value::Int(i)) => i.checked_neg().map(Value::Int),
            (UnaryOp::Neg, Value::Float(x)) => Some(Value::Float(-x)),
            (_, v @ (Value::Int(_) | Value::Float(_))) => Some(v),
            _ => None,
        },
        Expr::Call(Call { func, args, keywords })
            if args.is_empty() && keywords.is_empty() && **func == Expr::name("set") =>
        {
            Some(Value::List(Vec::new()))
        }
        _ => None,
    }
}

/// JSON object key for a literal dict key.
fn dict_key(key: &Value) -> Option<String> {
    match key {
        Value::Str(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        Value::Float(x) => Some(crate::ast::float_repr(*x)),
        Value::Bool(b) => Some(b.to_string()),
        Value::None => Some("null".to_string()),
        _ => None,
    }
}

/// `content * count` when both operands are literals.
pub fn literal_repetition(expr: &Expr) -> Option<(String, i128)> {
    match expr {
        Expr::BinOp {
            left,
            op: BinOp::Mult,
            right,
        } => match (literal_value(left)?, literal_value(right)?) {
            (Value::Str(content), Value::Int(count)) => Some((content, count)),
            _ => None,
        },
        _ => None,
    }
}

/// Largest repeated payload, in bytes, that is expanded in place. Longer
/// repetitions are only described by their `string_mult` descriptor.
pub const MAX_EXPANDED_LEN: usize = 1 << 20;

/// Python-style string repetition; `None` if the result exceeds [`MAX_EXPANDED_LEN`].
pub fn repeat(content: &str, count: i128) -> Option<String> {
    if count <= 0 {
        return Some(String::new());
    }
    let count = usize::try_from(count).ok()?;
    content.len().checked_mul(count).filter(|len| *len <= MAX_EXPANDED_LEN)?;
    Some(content.repeat(count))
}

/// Source text of `expr` up to the first `/`.
fn textual(expr: &Expr) -> Value {
    let text = expr.to_string();
    let head = text.split('/').next().unwrap_or_default();
    Value::placeholder(head.trim_end())
}

impl<'m> SymbolTable<'m> {
    /// Best-known value of `expr`. Never fails: anything that cannot be
    /// resolved becomes a [`Value::Placeholder`].
    pub fn evaluate(&mut self, expr: &'m Expr) -> Value {
        if let Some(value) = literal_value(expr) {
            return value;
        }
        match expr {
            Expr::Name(name) => match self.binding(name) {
                Some(bound) if self.enter_variable(name) => {
                    let value = self.evaluate(bound);
                    self.leave_variable(name);
                    value
                }
                _ => Value::unresolved_variable(name),
            },
            Expr::BinOp { op: BinOp::Mult, .. } => literal_repetition(expr)
                .and_then(|(content, count)| repeat(&content, count))
                .map(Value::Str)
                .unwrap_or_else(|| textual(expr)),
            Expr::BinOp {
                left,
                op: BinOp::Div,
                ..
            } => self.evaluate(left),
            Expr::NamedExpr { value, .. } => self.evaluate(value),
            Expr::Call(call) => match call.name() {
                Some(name) => Value::unresolved_call(name),
                None => Value::unresolved_call(&call.func.to_string()),
            },
            _ => textual(expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expr;

    fn eval(src: &str) -> Value {
        let expr = Box::leak(Box::new(parse_expr(src).expect("parse")));
        SymbolTable::new().evaluate(expr)
    }

    #[test]
    fn literals() {
        assert_eq!(eval("42"), Value::Int(42));
        assert_eq!(eval("-7"), Value::Int(-7));
        assert_eq!(eval("'abc'"), Value::from("abc"));
        assert_eq!(eval("b'\\x01A'"), Value::from("\u{1}A"));
        assert_eq!(
            eval("(1, 'a', [True, None])"),
            Value::List(vec![
                Value::Int(1),
                Value::from("a"),
                Value::List(vec![Value::Bool(true), Value::None]),
            ])
        );
    }

    #[test]
    fn unbound_names_and_calls_are_placeholders() {
        assert_eq!(eval("payload"), Value::placeholder("VAR_payload"));
        assert_eq!(eval("RandShort()"), Value::placeholder("CALL_RandShort"));
        assert_eq!(eval("scapy.volatile.RandIP()"), Value::placeholder("CALL_RandIP"));
    }

    #[test]
    fn repetition_and_division() {
        assert_eq!(eval("'AB' * 3"), Value::from("ABABAB"));
        assert_eq!(eval("'10.0.0.0' / 24"), Value::from("10.0.0.0"));
        assert_eq!(eval("x * 3"), Value::placeholder("x * 3"));
    }

    #[test]
    fn fallback_is_text_before_slash() {
        assert_eq!(eval("a.b + 1"), Value::placeholder("a.b + 1"));
        assert_eq!(eval("seq + 1 // 2"), Value::placeholder("seq + 1"));
    }

    #[test]
    fn bound_names_resolve_and_cycles_stop() {
        let module = crate::parser::parse("a = b\nb = a\nc = 'x' * 2\n").expect("parse");
        let module = Box::leak(Box::new(module));
        let mut symbols = SymbolTable::new();
        for stmt in &module.body {
            if let crate::ast::StmtKind::Assign { targets, value } = &stmt.kind {
                if let Expr::Name(name) = &targets[0] {
                    symbols.bind(name, value);
                }
            }
        }
        let a = Box::leak(Box::new(Expr::name("a")));
        let c = Box::leak(Box::new(Expr::name("c")));
        assert_eq!(symbols.evaluate(a), Value::placeholder("VAR_a"));
        assert_eq!(symbols.evaluate(c), Value::from("xx"));
    }

    #[test]
    fn repetition_literals() {
        let expr = parse_expr("'AB' * 3").expect("parse");
        assert_eq!(literal_repetition(&expr), Some(("AB".to_string(), 3)));
        assert_eq!(repeat("ab", -1), Some(String::new()));
    }

    #[test]
    fn oversized_repetition_is_not_expanded() {
        assert_eq!(repeat("A", MAX_EXPANDED_LEN as i128).map(|s| s.len()), Some(MAX_EXPANDED_LEN));
        assert_eq!(repeat("A", MAX_EXPANDED_LEN as i128 + 1), None);
        assert_eq!(repeat("AB", 1_000_000_000_000), None);
        assert_eq!(repeat("AB", i128::MAX), None);
        assert_eq!(eval("'A' * 1000000000000"), Value::placeholder("'A' * 1000000000000"));
    }

    #[test]
    fn named_expression_yields_its_value() {
        assert_eq!(eval("(n := 42)"), Value::Int(42));
        assert_eq!(eval("await x"), Value::placeholder("await x"));
    }
}
