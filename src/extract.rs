//! Traversal driver: walks a [`Module`], records symbols and collects emit calls.

use tracing::{debug, warn};

use crate::ast::{Call, Expr, Module, Stmt, StmtKind};
use crate::config::ExtractorConfig;
use crate::ir::{Diagnostic, EmitCall, Extraction, Ir};
use crate::pairing::pair_artifacts;
use crate::symbols::SymbolTable;
use crate::value::Value;

/// Extract the IR from a parsed script.
pub fn extract(module: &Module, config: &ExtractorConfig) -> Extraction {
    let mut extractor = Extractor::new(config);
    extractor.visit_block(&module.body);
    extractor.finish()
}

/// Mutable context of one extraction. Everything borrowed from the module
/// lives exactly as long as the extraction.
pub struct Extractor<'m> {
    pub(crate) config: &'m ExtractorConfig,
    pub(crate) symbols: SymbolTable<'m>,
    emits: Vec<EmitCall>,
    diagnostics: Vec<Diagnostic>,
    /// Line of the statement being visited.
    line: usize,
}

impl<'m> Extractor<'m> {
    pub fn new(config: &'m ExtractorConfig) -> Self {
        Self {
            config,
            symbols: SymbolTable::new(),
            emits: Vec::new(),
            diagnostics: Vec::new(),
            line: 0,
        }
    }

    pub(crate) fn diagnose(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(line = self.line, "{}", message);
        self.diagnostics.push(Diagnostic {
            line: self.line,
            message,
        });
    }

    pub fn visit_block(&mut self, body: &'m [Stmt]) {
        for stmt in body {
            self.visit_stmt(stmt);
        }
    }

    fn visit_stmt(&mut self, stmt: &'m Stmt) {
        self.line = stmt.line;
        match &stmt.kind {
            // Helper bodies are only read when inlined; emit calls inside them are not extracted.
            StmtKind::FunctionDef(def) => {
                if def.name != self.config.emit_function {
                    debug!(helper = %def.name, line = stmt.line, "found helper function");
                    self.symbols.define_helper(def, stmt.line);
                }
                return;
            }
            StmtKind::Assign { targets, value } => {
                for target in targets {
                    self.bind_target(target, value);
                }
            }
            StmtKind::AnnAssign {
                target,
                value: Some(value),
                ..
            } => self.bind_target(target, value),
            _ => {}
        }
        for expr in stmt.exprs() {
            self.visit_expr(expr);
        }
        for block in stmt.blocks() {
            self.visit_block(block);
        }
    }

    fn bind_target(&mut self, target: &'m Expr, value: &'m Expr) {
        match (target, value) {
            (Expr::Name(name), _) => {
                debug!(variable = %name, line = self.line, "found variable assignment");
                self.symbols.bind(name, value);
            }
            (Expr::Tuple(names) | Expr::List(names), Expr::Tuple(values) | Expr::List(values))
                if names.len() == values.len() && !names.iter().any(|n| matches!(n, Expr::Starred(_))) =>
            {
                for (name, value) in names.iter().zip(values) {
                    self.bind_target(name, value);
                }
            }
            _ => {}
        }
    }

    fn visit_expr(&mut self, expr: &'m Expr) {
        if let Expr::Call(call) = expr {
            self.visit_call(call);
        }
        for child in expr.children() {
            self.visit_expr(child);
        }
        if let Expr::NamedExpr { target, value } = expr {
            self.bind_target(target, value);
        }
    }

    fn visit_call(&mut self, call: &'m Call) {
        let Some(name) = call.name() else {
            return;
        };
        let emit = self.config.emit_function.as_str();
        let found = if name == emit {
            self.direct_emit(call)
        } else if name.starts_with(emit) {
            self.wrapper_emit(call, name)
        } else {
            return;
        };
        if let Some(found) = found {
            debug!(file = %found.filename, packets = found.packets.len(), line = found.line, "found emit call");
            self.emits.push(found);
        }
    }

    /// `write_pcap(filename, *packets)`
    fn direct_emit(&mut self, call: &'m Call) -> Option<EmitCall> {
        let Some(first) = call.args.first() else {
            self.diagnose(format!("{}() called without a filename", self.config.emit_function));
            return None;
        };
        let filename = self.filename(first)?;
        let packets = self.emitted_packets(call);
        Some(EmitCall {
            filename,
            packets,
            line: self.line,
        })
    }

    /// `write_pcap_step(filename)`: packets come from the emit call inside the
    /// wrapper, the filename from the outer call.
    fn wrapper_emit(&mut self, call: &'m Call, name: &str) -> Option<EmitCall> {
        let Some(wrapper) = self.symbols.helper(name) else {
            self.diagnose(format!("emit wrapper '{}' is not defined", name));
            return None;
        };
        let Some(first) = call.args.first() else {
            self.diagnose(format!("{}() called without a filename", name));
            return None;
        };
        let filename = self.filename(first)?;
        let Some(inner) = find_emit(&wrapper.def.body, &self.config.emit_function) else {
            self.diagnose(format!(
                "emit wrapper '{}' never calls {}()",
                name, self.config.emit_function
            ));
            return None;
        };
        let packets = self.emitted_packets(inner);
        Some(EmitCall {
            filename,
            packets,
            line: self.line,
        })
    }

    fn emitted_packets(&mut self, call: &'m Call) -> Vec<crate::ir::PacketDefinition> {
        let mut packets = Vec::new();
        for arg in call.args.iter().skip(1) {
            packets.extend(self.extract_packets(arg));
        }
        packets
    }

    fn filename(&mut self, expr: &'m Expr) -> Option<String> {
        match self.symbols.evaluate(expr) {
            Value::Str(name) | Value::Placeholder(name) => Some(name),
            other => {
                self.diagnose(format!("artifact name '{}' is not a string ({:?})", expr, other));
                None
            }
        }
    }

    pub fn finish(self) -> Extraction {
        let pcap_pairs = pair_artifacts(self.emits, &self.config.default_base_name);
        let ir = Ir {
            pcap_pairs,
            helper_functions: self.symbols.helper_names(),
        };
        debug!(
            pairs = ir.pcap_pairs.len(),
            helpers = ir.helper_functions.len(),
            diagnostics = self.diagnostics.len(),
            "extraction finished"
        );
        Extraction {
            ir,
            diagnostics: self.diagnostics,
        }
    }
}

/// First call to `emit` in `body`, in source order.
fn find_emit<'a>(body: &'a [Stmt], emit: &str) -> Option<&'a Call> {
    body.iter().find_map(|stmt| {
        stmt.exprs()
            .into_iter()
            .find_map(|expr| find_emit_in_expr(expr, emit))
            .or_else(|| stmt.blocks().into_iter().find_map(|block| find_emit(block, emit)))
    })
}

fn find_emit_in_expr<'a>(expr: &'a Expr, emit: &str) -> Option<&'a Call> {
    if let Expr::Call(call) = expr {
        if call.name() == Some(emit) {
            return Some(call);
        }
    }
    expr.children().into_iter().find_map(|child| find_emit_in_expr(child, emit))
}
