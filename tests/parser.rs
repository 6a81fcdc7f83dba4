//! Script parser tests: statement structure, block assembly, expression shapes and syntax errors.

use scapy_ir::ast::{BinOp, Constant, Expr, StmtKind, UnaryOp};
use scapy_ir::parse;
use scapy_ir::parser::parse_expr;

// ==================== Statements and blocks ====================

#[test]
fn parse_empty_script() {
    let m = parse("").expect("empty script can parse");
    assert!(m.body.is_empty());
    let m = parse("# only a comment\n\n   \n").expect("comments only");
    assert!(m.body.is_empty());
}

#[test]
fn statement_lines_are_physical() {
    let src = r#"
from scapy.all import *

x = 1
y = (1,
     2)
z = 3
"#;
    let m = parse(src).expect("parse");
    let lines: Vec<usize> = m.body.iter().map(|s| s.line).collect();
    assert_eq!(lines, vec![2, 4, 5, 7]);
    assert!(matches!(&m.body[0].kind, StmtKind::ImportFrom { module, names } if module == "scapy.all" && names[0].name == "*"));
}

#[test]
fn function_definition_with_decorator() {
    let src = r#"
@cache
def build(dst="10.0.0.1", *args, **kw) -> Packet:
    """Docstring."""
    return Ether()/IP(dst=dst)
"#;
    let m = parse(src).expect("parse");
    assert_eq!(m.body.len(), 1);
    assert_eq!(m.body[0].line, 3);
    let StmtKind::FunctionDef(def) = &m.body[0].kind else {
        panic!("expected function definition");
    };
    assert_eq!(def.name, "build");
    assert_eq!(def.decorators.len(), 1);
    assert_eq!(def.params.len(), 3);
    assert!(def.returns.is_some());
    assert_eq!(
        def.returned_expr().map(|e| e.to_string()),
        Some("Ether() / IP(dst=dst)".to_string())
    );
}

#[test]
fn if_elif_else_chain() {
    let src = r#"
if a:
    x = 1
elif b:
    x = 2
else:
    x = 3
"#;
    let m = parse(src).expect("parse");
    let StmtKind::If { orelse, .. } = &m.body[0].kind else {
        panic!("expected if");
    };
    assert_eq!(orelse.len(), 1);
    let StmtKind::If { orelse: inner, .. } = &orelse[0].kind else {
        panic!("elif is a nested if");
    };
    assert_eq!(inner.len(), 1);
}

#[test]
fn try_except_finally_and_loops() {
    let src = r#"
try:
    for i in range(3):
        pass
    else:
        pass
except ValueError as e:
    raise
except:
    pass
finally:
    done = True
while False:
    break
with open("x") as f, lock:
    pass
"#;
    let m = parse(src).expect("parse");
    assert_eq!(m.body.len(), 3);
    let StmtKind::Try { handlers, finalbody, .. } = &m.body[0].kind else {
        panic!("expected try");
    };
    assert_eq!(handlers.len(), 2);
    assert_eq!(handlers[0].name.as_deref(), Some("e"));
    assert_eq!(finalbody.len(), 1);
    let StmtKind::With { items, .. } = &m.body[2].kind else {
        panic!("expected with");
    };
    assert_eq!(items.len(), 2);
}

#[test]
fn class_with_methods() {
    let src = r#"
class Gen(Base, metaclass=Meta):
    PORT = 80

    def pkt(self):
        return TCP(dport=self.PORT)
"#;
    let m = parse(src).expect("parse");
    let StmtKind::ClassDef(class) = &m.body[0].kind else {
        panic!("expected class");
    };
    assert_eq!(class.name, "Gen");
    assert_eq!(class.bases.len(), 1);
    assert_eq!(class.keywords.len(), 1);
    assert_eq!(class.body.len(), 2);
}

#[test]
fn inline_suites_and_semicolons() {
    let m = parse("if x: a = 1; b = 2\ndef f(): return IP()\n").expect("parse");
    let StmtKind::If { body, .. } = &m.body[0].kind else {
        panic!("expected if");
    };
    assert_eq!(body.len(), 2);
    let StmtKind::FunctionDef(def) = &m.body[1].kind else {
        panic!("expected def");
    };
    assert_eq!(def.returned_expr().map(|e| e.to_string()), Some("IP()".to_string()));
}

#[test]
fn assignment_forms() {
    let m = parse("a = b = 1\nc += 2\nd: int = 3\ne, f = 1, 2\n").expect("parse");
    assert!(matches!(&m.body[0].kind, StmtKind::Assign { targets, .. } if targets.len() == 2));
    assert!(matches!(&m.body[1].kind, StmtKind::AugAssign { op: BinOp::Add, .. }));
    assert!(matches!(&m.body[2].kind, StmtKind::AnnAssign { value: Some(_), .. }));
    assert!(matches!(&m.body[3].kind, StmtKind::Assign { targets, value: Expr::Tuple(_) } if matches!(targets[0], Expr::Tuple(_))));
}

#[test]
fn match_statement_with_cases() {
    let src = r#"
match pkt:
    case IP(dst="10.0.0.1") as ip if ip.ttl > 1:
        x = 1
    case [first, *rest]:
        pass
    case _: y = 2
after = 3
"#;
    let m = parse(src).expect("parse");
    assert_eq!(m.body.len(), 2);
    let StmtKind::Match { subject, cases } = &m.body[0].kind else {
        panic!("expected match");
    };
    assert_eq!(*subject, Expr::name("pkt"));
    assert_eq!(cases.len(), 3);
    assert_eq!(cases[0].pattern.to_string(), "IP(dst='10.0.0.1')");
    assert_eq!(cases[0].binding.as_deref(), Some("ip"));
    assert_eq!(cases[0].guard.as_ref().map(|g| g.to_string()), Some("ip.ttl > 1".to_string()));
    assert!(matches!(cases[1].pattern, Expr::List(ref items) if matches!(items[1], Expr::Starred(_))));
    assert_eq!(cases[2].body.len(), 1);
    assert_eq!(m.body[0].blocks().len(), 3);
}

#[test]
fn match_and_case_are_still_names() {
    let m = parse("match = re.match(p, s)\ncase = 1\nmatch(x)\n").expect("parse");
    assert_eq!(m.body.len(), 3);
    assert!(matches!(&m.body[0].kind, StmtKind::Assign { targets, .. } if targets[0] == Expr::name("match")));
    assert!(matches!(&m.body[1].kind, StmtKind::Assign { targets, .. } if targets[0] == Expr::name("case")));
    assert!(matches!(&m.body[2].kind, StmtKind::Expr(Expr::Call(c)) if c.name() == Some("match")));
}

#[test]
fn relative_imports() {
    let m = parse("from .. mod import x\nfrom . import y\nfrom .pkg.sub import z\nfrom ...top import w\n").expect("parse");
    let modules: Vec<&str> = m
        .body
        .iter()
        .map(|s| match &s.kind {
            StmtKind::ImportFrom { module, .. } => module.as_str(),
            other => panic!("expected import, got {:?}", other),
        })
        .collect();
    assert_eq!(modules, vec!["..mod", ".", ".pkg.sub", "...top"]);
}

#[test]
fn async_functions_with_await() {
    let src = r#"
async def fetch(host):
    reply = await sr1(IP(dst=host))
    return await reply
"#;
    let m = parse(src).expect("parse");
    let StmtKind::FunctionDef(def) = &m.body[0].kind else {
        panic!("expected def");
    };
    assert!(def.is_async);
    assert_eq!(def.returned_expr(), Some(&Expr::Await(Box::new(Expr::name("reply")))));
    let StmtKind::Assign { value, .. } = &def.body[0].kind else {
        panic!("expected assignment");
    };
    assert_eq!(value.to_string(), "await sr1(IP(dst=host))");
}

// ==================== Expressions ====================

#[test]
fn composition_chain_is_left_associative() {
    let e = parse_expr("Ether()/IP()/TCP()").expect("parse");
    let Expr::BinOp { left, op: BinOp::Div, right } = e else {
        panic!("expected division");
    };
    assert!(matches!(*left, Expr::BinOp { op: BinOp::Div, .. }));
    assert!(matches!(*right, Expr::Call(ref c) if c.name() == Some("TCP")));
}

#[test]
fn repetition_binds_tighter_than_addition() {
    let e = parse_expr("'a' + 'b' * 3").expect("parse");
    assert_eq!(e.to_string(), "'a' + 'b' * 3");
    let Expr::BinOp { op: BinOp::Add, right, .. } = e else {
        panic!("expected addition");
    };
    assert!(matches!(*right, Expr::BinOp { op: BinOp::Mult, .. }));
}

#[test]
fn call_arguments() {
    let e = parse_expr("IP(dst='10.0.0.1', *extra, ttl=64, **opts)").expect("parse");
    let Expr::Call(call) = e else {
        panic!("expected call");
    };
    assert_eq!(call.args.len(), 1);
    assert!(matches!(call.args[0], Expr::Starred(_)));
    assert_eq!(call.keywords.len(), 3);
    assert!(call.keywords[2].arg.is_none());
    assert_eq!(call.keyword("ttl"), Some(&Expr::Constant(Constant::Int(64))));
}

#[test]
fn attribute_call_name() {
    let e = parse_expr("scapy.layers.inet.IP()").expect("parse");
    let Expr::Call(call) = e else {
        panic!("expected call");
    };
    assert_eq!(call.name(), Some("IP"));
}

#[test]
fn displays_and_comprehensions() {
    for src in [
        "[1, 2, 3]",
        "(1,)",
        "{'a': 1, **rest}",
        "{1, 2}",
        "[p for p in pkts if p]",
        "{k: v for k, v in items}",
        "x if y else z",
        "lambda a, b=2: a + b",
        "pkts[1:3]",
        "not a and b or c",
        "a is not None",
        "x not in y",
        "-2 ** 2",
    ] {
        let e = parse_expr(src).unwrap_or_else(|err| panic!("{}: {}", src, err));
        assert_eq!(e.to_string(), src);
    }
}

#[test]
fn strings_and_bytes() {
    assert_eq!(parse_expr("'ab' 'cd'").expect("parse"), Expr::str("abcd"));
    assert_eq!(
        parse_expr(r"b'\x00\xff'").expect("parse"),
        Expr::Constant(Constant::Bytes(vec![0, 255]))
    );
    assert_eq!(parse_expr(r"r'\d+'").expect("parse"), Expr::str(r"\d+"));
    assert_eq!(parse_expr("'''multi\nline'''").expect("parse"), Expr::str("multi\nline"));
    assert!(matches!(parse_expr("f'{x}/24'").expect("parse"), Expr::FormattedString(_)));
}

#[test]
fn numbers() {
    assert_eq!(parse_expr("0x1F").expect("parse"), Expr::Constant(Constant::Int(31)));
    assert_eq!(parse_expr("1_000").expect("parse"), Expr::Constant(Constant::Int(1000)));
    assert_eq!(parse_expr("0o17").expect("parse"), Expr::Constant(Constant::Int(15)));
    assert_eq!(parse_expr("0b101").expect("parse"), Expr::Constant(Constant::Int(5)));
    assert_eq!(parse_expr("1.5e3").expect("parse"), Expr::Constant(Constant::Float(1500.0)));
}

#[test]
fn walrus_in_conditions_and_arguments() {
    let m = parse("if (n := 3) > 1:\n    pass\n").expect("parse");
    let StmtKind::If { test, .. } = &m.body[0].kind else {
        panic!("expected if");
    };
    assert_eq!(test.to_string(), "(n := 3) > 1");
    let Expr::BinOp { left, op: BinOp::Gt, .. } = test else {
        panic!("expected comparison");
    };
    assert!(matches!(left.as_ref(), Expr::NamedExpr { target, .. } if **target == Expr::name("n")));

    let e = parse_expr("send(pkt := IP())").expect("parse");
    let Expr::Call(call) = e else {
        panic!("expected call");
    };
    assert!(matches!(call.args[0], Expr::NamedExpr { .. }));
    assert!(call.keywords.is_empty());
}

#[test]
fn await_binds_tighter_than_power() {
    let e = parse_expr("await x ** 2").expect("parse");
    assert_eq!(e.to_string(), "await x ** 2");
    let Expr::BinOp { left, op: BinOp::Pow, .. } = e else {
        panic!("expected power");
    };
    assert_eq!(*left, Expr::Await(Box::new(Expr::name("x"))));
    assert!(matches!(
        parse_expr("-await x").expect("parse"),
        Expr::UnaryOp { op: UnaryOp::Neg, .. }
    ));
}

#[test]
fn f_strings_render_single_quoted() {
    assert_eq!(parse_expr("f\"{i}-send.pcap\"").expect("parse").to_string(), "f'{i}-send.pcap'");
    assert_eq!(parse_expr("F\"{i}.pcap\"").expect("parse").to_string(), "f'{i}.pcap'");
    assert_eq!(parse_expr("f'{x}/24'").expect("parse").to_string(), "f'{x}/24'");
    assert_eq!(parse_expr("f\"{x!r}'s\"").expect("parse").to_string(), "f\"{x!r}'s\"");
}

#[test]
fn long_chains_within_limit() {
    let src = format!("write_pcap('x-send.pcap', {}TCP())\n", "IP()/".repeat(200));
    parse(&src).expect("200-layer chain parses");
}

// ==================== Syntax errors ====================

#[test]
fn reject_invalid_expression() {
    let err = parse("x = 1\ny = (1 +\n").expect_err("unbalanced");
    assert_eq!(err.line, 2);
}

#[test]
fn reject_bad_token_reports_line() {
    let err = parse("a = 1\n\nb = = 2\n").expect_err("invalid syntax");
    assert_eq!(err.line, 3);
    assert!(err.to_string().starts_with("line 3"));
}

#[test]
fn reject_unexpected_indent() {
    let err = parse("a = 1\n    b = 2\n").expect_err("indent");
    assert_eq!(err.line, 2);
    assert!(err.message.contains("unexpected indent"));
}

#[test]
fn reject_missing_block() {
    let err = parse("def f():\nreturn 1\n").expect_err("missing block");
    assert!(err.message.contains("expected an indented block"));
}

#[test]
fn reject_dangling_clause() {
    let err = parse("else:\n    pass\n").expect_err("dangling else");
    assert!(err.message.contains("without a matching statement"));
}

#[test]
fn reject_unterminated_string() {
    let err = parse("x = 1\ns = 'abc\n").expect_err("unterminated");
    assert_eq!(err.line, 2);
}

#[test]
fn reject_misaligned_dedent() {
    let err = parse("if x:\n        a = 1\n    b = 2\n").expect_err("dedent");
    assert_eq!(err.line, 3);
}

#[test]
fn reject_case_outside_match() {
    let err = parse("case 1:\n    pass\n").expect_err("dangling case");
    assert!(err.message.contains("'case' without a matching statement"));
    let err = parse("match x:\n    y = 1\n").expect_err("no case");
    assert_eq!(err.line, 2);
    assert!(err.message.contains("expected 'case' block"));
}

#[test]
fn reject_overlong_operator_chain() {
    let src = format!("x = 1\npkt = {}TCP()\n", "IP()/".repeat(5000));
    let err = parse(&src).expect_err("chain too long");
    assert_eq!(err.line, 2);
    assert!(err.message.contains("too deeply nested"));
    let err = parse(&format!("y = x{}\n", ".a".repeat(5000))).expect_err("trailers");
    assert!(err.message.contains("too deeply nested"));
    let err = parse(&format!("z = {}1\n", "-".repeat(5000))).expect_err("prefix operators");
    assert!(err.message.contains("too deeply nested"));
}

#[test]
fn reject_deep_brackets() {
    let src = format!("x = {}1{}\n", "(".repeat(5000), ")".repeat(5000));
    let err = parse(&src).expect_err("nesting");
    assert_eq!(err.line, 1);
    assert!(err.message.contains("nested brackets"));
}

#[test]
fn reject_deep_indentation() {
    let mut src = String::new();
    for level in 0..150 {
        src.push_str(&" ".repeat(level));
        src.push_str("if x:\n");
    }
    src.push_str(&" ".repeat(150));
    src.push_str("pass\n");
    let err = parse(&src).expect_err("indentation");
    assert!(err.message.contains("too many levels of indentation"));
}
