//! Parsing and identifier normalization.
//!
//! Rewrites a parsed Python tree in place so that every user-chosen name
//! (variables, function names, parameters, class names) becomes a canonical
//! placeholder: `var_N`, `func_N`, `arg_N`, `class_N` with one shared,
//! strictly increasing counter. A name is mapped on first sight and the same
//! placeholder is reused for every later occurrence, so the map is injective
//! by construction. Names in the reserved set are left untouched.
//!
//! Scoping is flat: one map per session, keyed by name alone. A local `x`
//! and an unrelated outer `x` therefore share a placeholder. Node kinds the
//! normalizer does not interpret (match patterns, attribute names, import
//! aliases, keyword-argument names) pass through unchanged rather than
//! aborting the run.

use std::collections::HashSet;

use indexmap::IndexMap;
use rustpython_parser::{ast, Parse};

use crate::error::DetectError;
use crate::render;

#[derive(Debug, Clone, Copy)]
enum NameKind {
    Variable,
    Function,
    Argument,
    Class,
}

impl NameKind {
    fn prefix(self) -> &'static str {
        match self {
            NameKind::Variable => "var",
            NameKind::Function => "func",
            NameKind::Argument => "arg",
            NameKind::Class => "class",
        }
    }
}

/// Identifier map and counter for one normalization run.
///
/// Created fresh per canonicalized source and dropped with it; placeholder
/// numbering follows insertion order. Never stored on long-lived state,
/// which keeps unrelated requests from bleeding numbering into each other.
#[derive(Debug, Default)]
pub struct NameSession {
    map: IndexMap<String, String>,
    counter: usize,
}

impl NameSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct original names mapped so far.
    pub fn mapped_count(&self) -> usize {
        self.map.len()
    }
}

/// Parse source text into a structural tree.
pub fn parse(source: &str) -> Result<Vec<ast::Stmt>, DetectError> {
    ast::Suite::parse(source, "<source>").map_err(|e| DetectError::Parse(e.to_string()))
}

/// Parse, normalize identifiers, and render canonical text.
pub fn canonicalize(source: &str, reserved: &HashSet<String>) -> Result<String, DetectError> {
    let mut suite = parse(source)?;
    let mut session = NameSession::new();
    normalize_suite(&mut suite, &mut session, reserved);
    Ok(render::render_module(&suite))
}

/// Rewrite all identifier sites in the tree through the session map.
pub fn normalize_suite(
    suite: &mut [ast::Stmt],
    session: &mut NameSession,
    reserved: &HashSet<String>,
) {
    let mut normalizer = IdentifierNormalizer { session, reserved };
    for stmt in suite.iter_mut() {
        normalizer.visit_stmt(stmt);
    }
}

struct IdentifierNormalizer<'a> {
    session: &'a mut NameSession,
    reserved: &'a HashSet<String>,
}

impl IdentifierNormalizer<'_> {
    fn rename(&mut self, kind: NameKind, name: &mut ast::Identifier) {
        if self.reserved.contains(name.as_str()) {
            return;
        }
        if let Some(existing) = self.session.map.get(name.as_str()) {
            *name = ast::Identifier::new(existing.clone());
            return;
        }
        let placeholder = format!("{}_{}", kind.prefix(), self.session.counter);
        self.session.counter += 1;
        self.session
            .map
            .insert(name.as_str().to_string(), placeholder.clone());
        *name = ast::Identifier::new(placeholder);
    }

    fn visit_stmt(&mut self, stmt: &mut ast::Stmt) {
        use ast::Stmt::*;
        match stmt {
            FunctionDef(f) => {
                self.rename(NameKind::Function, &mut f.name);
                self.visit_arguments(&mut f.args);
                for s in &mut f.body {
                    self.visit_stmt(s);
                }
                for d in &mut f.decorator_list {
                    self.visit_expr(d);
                }
                if let Some(returns) = &mut f.returns {
                    self.visit_expr(returns);
                }
            }
            AsyncFunctionDef(f) => {
                self.rename(NameKind::Function, &mut f.name);
                self.visit_arguments(&mut f.args);
                for s in &mut f.body {
                    self.visit_stmt(s);
                }
                for d in &mut f.decorator_list {
                    self.visit_expr(d);
                }
                if let Some(returns) = &mut f.returns {
                    self.visit_expr(returns);
                }
            }
            ClassDef(c) => {
                self.rename(NameKind::Class, &mut c.name);
                for base in &mut c.bases {
                    self.visit_expr(base);
                }
                for kw in &mut c.keywords {
                    self.visit_expr(&mut kw.value);
                }
                for s in &mut c.body {
                    self.visit_stmt(s);
                }
                for d in &mut c.decorator_list {
                    self.visit_expr(d);
                }
            }
            Return(r) => {
                if let Some(value) = &mut r.value {
                    self.visit_expr(value);
                }
            }
            Delete(d) => {
                for target in &mut d.targets {
                    self.visit_expr(target);
                }
            }
            Assign(a) => {
                for target in &mut a.targets {
                    self.visit_expr(target);
                }
                self.visit_expr(&mut a.value);
            }
            TypeAlias(t) => {
                self.visit_expr(&mut t.name);
                self.visit_expr(&mut t.value);
            }
            AugAssign(a) => {
                self.visit_expr(&mut a.target);
                self.visit_expr(&mut a.value);
            }
            AnnAssign(a) => {
                self.visit_expr(&mut a.target);
                self.visit_expr(&mut a.annotation);
                if let Some(value) = &mut a.value {
                    self.visit_expr(value);
                }
            }
            For(f) => {
                self.visit_expr(&mut f.target);
                self.visit_expr(&mut f.iter);
                for s in &mut f.body {
                    self.visit_stmt(s);
                }
                for s in &mut f.orelse {
                    self.visit_stmt(s);
                }
            }
            AsyncFor(f) => {
                self.visit_expr(&mut f.target);
                self.visit_expr(&mut f.iter);
                for s in &mut f.body {
                    self.visit_stmt(s);
                }
                for s in &mut f.orelse {
                    self.visit_stmt(s);
                }
            }
            While(w) => {
                self.visit_expr(&mut w.test);
                for s in &mut w.body {
                    self.visit_stmt(s);
                }
                for s in &mut w.orelse {
                    self.visit_stmt(s);
                }
            }
            If(i) => {
                self.visit_expr(&mut i.test);
                for s in &mut i.body {
                    self.visit_stmt(s);
                }
                for s in &mut i.orelse {
                    self.visit_stmt(s);
                }
            }
            With(w) => {
                for item in &mut w.items {
                    self.visit_expr(&mut item.context_expr);
                    if let Some(vars) = &mut item.optional_vars {
                        self.visit_expr(vars);
                    }
                }
                for s in &mut w.body {
                    self.visit_stmt(s);
                }
            }
            AsyncWith(w) => {
                for item in &mut w.items {
                    self.visit_expr(&mut item.context_expr);
                    if let Some(vars) = &mut item.optional_vars {
                        self.visit_expr(vars);
                    }
                }
                for s in &mut w.body {
                    self.visit_stmt(s);
                }
            }
            Match(m) => {
                // Patterns pass through unchanged; only the subject, guards,
                // and case bodies are normalized.
                self.visit_expr(&mut m.subject);
                for case in &mut m.cases {
                    if let Some(guard) = &mut case.guard {
                        self.visit_expr(guard);
                    }
                    for s in &mut case.body {
                        self.visit_stmt(s);
                    }
                }
            }
            Raise(r) => {
                if let Some(exc) = &mut r.exc {
                    self.visit_expr(exc);
                }
                if let Some(cause) = &mut r.cause {
                    self.visit_expr(cause);
                }
            }
            Try(t) => {
                for s in &mut t.body {
                    self.visit_stmt(s);
                }
                for handler in &mut t.handlers {
                    let ast::ExceptHandler::ExceptHandler(h) = handler;
                    if let Some(type_) = &mut h.type_ {
                        self.visit_expr(type_);
                    }
                    for s in &mut h.body {
                        self.visit_stmt(s);
                    }
                }
                for s in &mut t.orelse {
                    self.visit_stmt(s);
                }
                for s in &mut t.finalbody {
                    self.visit_stmt(s);
                }
            }
            TryStar(t) => {
                for s in &mut t.body {
                    self.visit_stmt(s);
                }
                for handler in &mut t.handlers {
                    let ast::ExceptHandler::ExceptHandler(h) = handler;
                    if let Some(type_) = &mut h.type_ {
                        self.visit_expr(type_);
                    }
                    for s in &mut h.body {
                        self.visit_stmt(s);
                    }
                }
                for s in &mut t.orelse {
                    self.visit_stmt(s);
                }
                for s in &mut t.finalbody {
                    self.visit_stmt(s);
                }
            }
            Assert(a) => {
                self.visit_expr(&mut a.test);
                if let Some(msg) = &mut a.msg {
                    self.visit_expr(msg);
                }
            }
            Expr(e) => self.visit_expr(&mut e.value),
            Import(_) | ImportFrom(_) | Global(_) | Nonlocal(_) | Pass(_) | Break(_)
            | Continue(_) => {}
        }
    }

    fn visit_arguments(&mut self, args: &mut ast::Arguments) {
        for a in &mut args.posonlyargs {
            self.visit_arg_with_default(a);
        }
        for a in &mut args.args {
            self.visit_arg_with_default(a);
        }
        if let Some(vararg) = &mut args.vararg {
            self.visit_arg(vararg);
        }
        for a in &mut args.kwonlyargs {
            self.visit_arg_with_default(a);
        }
        if let Some(kwarg) = &mut args.kwarg {
            self.visit_arg(kwarg);
        }
    }

    fn visit_arg_with_default(&mut self, a: &mut ast::ArgWithDefault) {
        self.visit_arg(&mut a.def);
        if let Some(default) = &mut a.default {
            self.visit_expr(default);
        }
    }

    fn visit_arg(&mut self, a: &mut ast::Arg) {
        self.rename(NameKind::Argument, &mut a.arg);
        if let Some(annotation) = &mut a.annotation {
            self.visit_expr(annotation);
        }
    }

    fn visit_expr(&mut self, expr: &mut ast::Expr) {
        use ast::Expr::*;
        match expr {
            BoolOp(b) => {
                for value in &mut b.values {
                    self.visit_expr(value);
                }
            }
            NamedExpr(n) => {
                self.visit_expr(&mut n.target);
                self.visit_expr(&mut n.value);
            }
            BinOp(b) => {
                self.visit_expr(&mut b.left);
                self.visit_expr(&mut b.right);
            }
            UnaryOp(u) => self.visit_expr(&mut u.operand),
            Lambda(l) => {
                self.visit_arguments(&mut l.args);
                self.visit_expr(&mut l.body);
            }
            IfExp(i) => {
                self.visit_expr(&mut i.test);
                self.visit_expr(&mut i.body);
                self.visit_expr(&mut i.orelse);
            }
            Dict(d) => {
                for key in d.keys.iter_mut().flatten() {
                    self.visit_expr(key);
                }
                for value in &mut d.values {
                    self.visit_expr(value);
                }
            }
            Set(s) => {
                for elt in &mut s.elts {
                    self.visit_expr(elt);
                }
            }
            ListComp(l) => {
                self.visit_expr(&mut l.elt);
                self.visit_generators(&mut l.generators);
            }
            SetComp(s) => {
                self.visit_expr(&mut s.elt);
                self.visit_generators(&mut s.generators);
            }
            DictComp(d) => {
                self.visit_expr(&mut d.key);
                self.visit_expr(&mut d.value);
                self.visit_generators(&mut d.generators);
            }
            GeneratorExp(g) => {
                self.visit_expr(&mut g.elt);
                self.visit_generators(&mut g.generators);
            }
            Await(a) => self.visit_expr(&mut a.value),
            Yield(y) => {
                if let Some(value) = &mut y.value {
                    self.visit_expr(value);
                }
            }
            YieldFrom(y) => self.visit_expr(&mut y.value),
            Compare(c) => {
                self.visit_expr(&mut c.left);
                for comparator in &mut c.comparators {
                    self.visit_expr(comparator);
                }
            }
            Call(c) => {
                self.visit_expr(&mut c.func);
                for arg in &mut c.args {
                    self.visit_expr(arg);
                }
                for kw in &mut c.keywords {
                    self.visit_expr(&mut kw.value);
                }
            }
            FormattedValue(f) => {
                self.visit_expr(&mut f.value);
                if let Some(spec) = &mut f.format_spec {
                    self.visit_expr(spec);
                }
            }
            JoinedStr(j) => {
                for value in &mut j.values {
                    self.visit_expr(value);
                }
            }
            Constant(_) => {}
            Attribute(a) => {
                // Attribute names are structural (e.g. self.solve); only the
                // object expression is normalized.
                self.visit_expr(&mut a.value);
            }
            Subscript(s) => {
                self.visit_expr(&mut s.value);
                self.visit_expr(&mut s.slice);
            }
            Starred(s) => self.visit_expr(&mut s.value),
            Name(n) => self.rename(NameKind::Variable, &mut n.id),
            List(l) => {
                for elt in &mut l.elts {
                    self.visit_expr(elt);
                }
            }
            Tuple(t) => {
                for elt in &mut t.elts {
                    self.visit_expr(elt);
                }
            }
            Slice(s) => {
                if let Some(lower) = &mut s.lower {
                    self.visit_expr(lower);
                }
                if let Some(upper) = &mut s.upper {
                    self.visit_expr(upper);
                }
                if let Some(step) = &mut s.step {
                    self.visit_expr(step);
                }
            }
        }
    }

    fn visit_generators(&mut self, generators: &mut [ast::Comprehension]) {
        for gen in generators.iter_mut() {
            self.visit_expr(&mut gen.target);
            self.visit_expr(&mut gen.iter);
            for condition in &mut gen.ifs {
                self.visit_expr(condition);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;

    fn canonical(source: &str) -> String {
        let config = DetectorConfig::default();
        canonicalize(source, &config.reserved_names).unwrap()
    }

    #[test]
    fn canonicalization_is_deterministic_across_sessions() {
        let source = "def solve(nums):\n    total = 0\n    for n in nums:\n        total += n\n    return total\n";
        assert_eq!(canonical(source), canonical(source));
    }

    #[test]
    fn consistent_renaming_yields_identical_canonical_text() {
        let a = "def solve(nums):\n    best = nums[0]\n    for n in nums:\n        best = n\n    return best\n";
        let b = "def answer(arr):\n    top = arr[0]\n    for item in arr:\n        top = item\n    return top\n";
        assert_eq!(canonical(a), canonical(b));
    }

    #[test]
    fn formatting_differences_do_not_matter() {
        let a = "def f(x):\n    return x + 1\n";
        let b = "def f( x ):  # comment\n\n    return (x +\n        1)\n";
        assert_eq!(canonical(a), canonical(b));
    }

    #[test]
    fn placeholders_follow_category_and_first_sight_order() {
        let out = canonical("def solve(nums):\n    best = nums\n    return best\n");
        assert_eq!(
            out,
            "def func_0(arg_1):\n    var_2 = arg_1\n    return var_2\n"
        );
    }

    #[test]
    fn class_names_get_their_own_category() {
        let out = canonical("class Solution:\n    pass\n");
        assert_eq!(out, "class class_0:\n    pass\n");
    }

    #[test]
    fn reserved_builtins_are_untouched() {
        let out = canonical("def f(xs):\n    print(len(xs))\n");
        assert!(out.contains("print(len(arg_1))"), "got: {}", out);
    }

    #[test]
    fn same_name_maps_to_one_placeholder_everywhere() {
        // Flat scoping: the `x` in both functions shares a placeholder.
        let out = canonical("def f(x):\n    return x\ndef g(x):\n    return x\n");
        let first = out.lines().nth(1).unwrap();
        let second = out.lines().nth(3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_names_never_collide() {
        let source = "a = 1\nb = 2\nc = a + b\n";
        let out = canonical(source);
        assert_eq!(out, "var_0 = 1\nvar_1 = 2\nvar_2 = var_0 + var_1\n");
    }

    #[test]
    fn attribute_names_pass_through() {
        let out = canonical("result = self.compute(data)\n");
        assert!(out.contains(".compute("), "got: {}", out);
    }

    #[test]
    fn invalid_syntax_is_a_parse_error() {
        let config = DetectorConfig::default();
        let err = canonicalize("def broken(:\n    pass\n", &config.reserved_names).unwrap_err();
        assert!(matches!(err, DetectError::Parse(_)));
    }

    #[test]
    fn snippet_without_module_boilerplate_parses() {
        // A bare expression statement is still a valid module.
        let out = canonical("total + 1\n");
        assert_eq!(out, "var_0 + 1\n");
    }

    #[test]
    fn session_tracks_mapped_names() {
        let mut suite = parse("x = y\n").unwrap();
        let mut session = NameSession::new();
        let config = DetectorConfig::default();
        normalize_suite(&mut suite, &mut session, &config.reserved_names);
        assert_eq!(session.mapped_count(), 2);
    }
}
