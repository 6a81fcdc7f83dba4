//! Variable bindings and helper functions recorded during one traversal.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::ast::{Expr, FunctionDef};
use crate::ir::PacketDefinition;

/// A packet-building function available for inlining.
#[derive(Debug, Clone, Copy)]
pub struct HelperFunction<'m> {
    pub def: &'m FunctionDef,
    pub line: usize,
}

impl<'m> HelperFunction<'m> {
    pub fn name(&self) -> &'m str {
        &self.def.name
    }

    /// Expression of the first top-level `return`.
    pub fn returned_expr(&self) -> Option<&'m Expr> {
        self.def.returned_expr()
    }
}

/// Symbols of one script, borrowed from its [`Module`](crate::ast::Module).
///
/// Resolution is syntactic: a variable maps to the expression last assigned to
/// it in traversal order, and a helper maps to its definition. The guard sets
/// break self-referential bindings and recursive helpers.
#[derive(Debug, Default)]
pub struct SymbolTable<'m> {
    variables: HashMap<&'m str, &'m Expr>,
    helpers: IndexMap<&'m str, HelperFunction<'m>>,
    resolving: HashSet<&'m str>,
    expanding: HashSet<&'m str>,
    helper_cache: HashMap<&'m str, Vec<PacketDefinition>>,
}

impl<'m> SymbolTable<'m> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`. Cached helper expansions may have read the
    /// previous binding, so they are all dropped.
    pub fn bind(&mut self, name: &'m str, value: &'m Expr) {
        self.variables.insert(name, value);
        self.helper_cache.clear();
    }

    pub fn binding(&self, name: &str) -> Option<&'m Expr> {
        self.variables.get(name).copied()
    }

    /// Register a helper. A re-definition replaces the body, keeps the
    /// original position and drops any cached expansion.
    pub fn define_helper(&mut self, def: &'m FunctionDef, line: usize) {
        self.helper_cache.remove(def.name.as_str());
        self.helpers.insert(&def.name, HelperFunction { def, line });
    }

    pub fn helper(&self, name: &str) -> Option<HelperFunction<'m>> {
        self.helpers.get(name).copied()
    }

    pub fn is_helper(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    /// Helper names in first-definition order.
    pub fn helper_names(&self) -> Vec<String> {
        self.helpers.keys().map(|name| name.to_string()).collect()
    }

    /// Mark `name` as being resolved; `false` if it already is (a cycle).
    pub(crate) fn enter_variable(&mut self, name: &'m str) -> bool {
        self.resolving.insert(name)
    }

    pub(crate) fn leave_variable(&mut self, name: &str) {
        self.resolving.remove(name);
    }

    /// Mark helper `name` as being expanded; `false` on recursion.
    pub(crate) fn enter_helper(&mut self, name: &'m str) -> bool {
        self.expanding.insert(name)
    }

    pub(crate) fn leave_helper(&mut self, name: &str) {
        self.expanding.remove(name);
    }

    pub(crate) fn cached_helper(&self, name: &str) -> Option<&[PacketDefinition]> {
        self.helper_cache.get(name).map(Vec::as_slice)
    }

    pub(crate) fn cache_helper(&mut self, name: &'m str, packets: Vec<PacketDefinition>) {
        self.helper_cache.insert(name, packets);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::StmtKind;
    use crate::parser::parse;

    #[test]
    fn redefinition_keeps_first_position() {
        let module = parse("def a():\n    return IP()\ndef b():\n    return TCP()\ndef a():\n    return UDP()\n")
            .expect("parse");
        let mut symbols = SymbolTable::new();
        for stmt in &module.body {
            if let StmtKind::FunctionDef(def) = &stmt.kind {
                symbols.define_helper(def, stmt.line);
            }
        }
        assert_eq!(symbols.helper_names(), vec!["a", "b"]);
        let a = symbols.helper("a").expect("helper");
        assert_eq!(a.line, 5);
        assert_eq!(a.returned_expr().map(|e| e.to_string()), Some("UDP()".to_string()));
    }

    #[test]
    fn rebinding_drops_cached_expansions() {
        let module = parse("a = 1\nb = 2\n").expect("parse");
        let values: Vec<&Expr> = module
            .body
            .iter()
            .filter_map(|stmt| match &stmt.kind {
                StmtKind::Assign { value, .. } => Some(value),
                _ => None,
            })
            .collect();
        let mut symbols = SymbolTable::new();
        symbols.cache_helper("h", vec![PacketDefinition::default()]);
        assert!(symbols.cached_helper("h").is_some());
        symbols.bind("x", values[0]);
        assert!(symbols.cached_helper("h").is_none());
        symbols.bind("x", values[1]);
        assert_eq!(symbols.binding("x"), Some(values[1]));
    }

    #[test]
    fn cycle_guard() {
        let mut symbols = SymbolTable::new();
        assert!(symbols.enter_variable("x"));
        assert!(!symbols.enter_variable("x"));
        symbols.leave_variable("x");
        assert!(symbols.enter_variable("x"));
    }
}
