//! Canonical rendering of normalized syntax trees.
//!
//! Serializes a parsed tree back to text deterministically: four-space
//! indentation, one statement per line, no comments or blank lines, minimal
//! precedence-driven parenthesization. Two trees with identical shape and
//! identical canonical names render byte-identically regardless of how the
//! original sources were formatted, which is what makes exact-match and
//! line-set comparison meaningful downstream.

use rustpython_parser::ast;

/// Render a parsed module to canonical text.
pub fn render_module(stmts: &[ast::Stmt]) -> String {
    let mut renderer = Renderer {
        out: String::new(),
        indent: 0,
    };
    for stmt in stmts {
        renderer.write_stmt(stmt);
    }
    renderer.out
}

// Expression precedence levels, lowest binds loosest.
const PREC_YIELD: u8 = 1;
const PREC_NAMED: u8 = 2;
const PREC_LAMBDA: u8 = 3;
const PREC_TERNARY: u8 = 4;
const PREC_OR: u8 = 5;
const PREC_AND: u8 = 6;
const PREC_NOT: u8 = 7;
const PREC_CMP: u8 = 8;
const PREC_BOR: u8 = 9;
const PREC_BXOR: u8 = 10;
const PREC_BAND: u8 = 11;
const PREC_SHIFT: u8 = 12;
const PREC_ARITH: u8 = 13;
const PREC_TERM: u8 = 14;
const PREC_UNARY: u8 = 15;
const PREC_POW: u8 = 16;
const PREC_AWAIT: u8 = 17;
const PREC_ATOM: u8 = 18;

struct Renderer {
    out: String,
    indent: usize,
}

impl Renderer {
    fn stmt_line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn write_body(&mut self, body: &[ast::Stmt]) {
        self.indent += 1;
        for stmt in body {
            self.write_stmt(stmt);
        }
        self.indent -= 1;
    }

    fn write_stmt(&mut self, stmt: &ast::Stmt) {
        use ast::Stmt::*;
        match stmt {
            FunctionDef(f) => {
                self.write_function(&f.decorator_list, "def", &f.name, &f.args, &f.returns);
                self.write_body(&f.body);
            }
            AsyncFunctionDef(f) => {
                self.write_function(&f.decorator_list, "async def", &f.name, &f.args, &f.returns);
                self.write_body(&f.body);
            }
            ClassDef(c) => {
                for decorator in &c.decorator_list {
                    self.stmt_line(&format!("@{}", expr(decorator, PREC_NAMED)));
                }
                let mut parts: Vec<String> =
                    c.bases.iter().map(|b| expr(b, PREC_NAMED)).collect();
                for kw in &c.keywords {
                    parts.push(keyword_text(kw));
                }
                if parts.is_empty() {
                    self.stmt_line(&format!("class {}:", c.name.as_str()));
                } else {
                    self.stmt_line(&format!("class {}({}):", c.name.as_str(), parts.join(", ")));
                }
                self.write_body(&c.body);
            }
            Return(r) => match &r.value {
                Some(value) => self.stmt_line(&format!("return {}", expr(value, PREC_YIELD))),
                None => self.stmt_line("return"),
            },
            Delete(d) => {
                let targets: Vec<String> =
                    d.targets.iter().map(|t| expr(t, PREC_NAMED)).collect();
                self.stmt_line(&format!("del {}", targets.join(", ")));
            }
            Assign(a) => {
                let mut line = String::new();
                for target in &a.targets {
                    line.push_str(&expr(target, PREC_NAMED));
                    line.push_str(" = ");
                }
                line.push_str(&expr(&a.value, PREC_YIELD));
                self.stmt_line(&line);
            }
            TypeAlias(t) => {
                self.stmt_line(&format!(
                    "type {} = {}",
                    expr(&t.name, PREC_NAMED),
                    expr(&t.value, PREC_NAMED)
                ));
            }
            AugAssign(a) => {
                let (symbol, _, _) = operator_info(&a.op);
                self.stmt_line(&format!(
                    "{} {}= {}",
                    expr(&a.target, PREC_NAMED),
                    symbol,
                    expr(&a.value, PREC_YIELD)
                ));
            }
            AnnAssign(a) => {
                let mut line = format!(
                    "{}: {}",
                    expr(&a.target, PREC_NAMED),
                    expr(&a.annotation, PREC_NAMED)
                );
                if let Some(value) = &a.value {
                    line.push_str(&format!(" = {}", expr(value, PREC_YIELD)));
                }
                self.stmt_line(&line);
            }
            For(f) => {
                self.write_for("for", &f.target, &f.iter, &f.body, &f.orelse);
            }
            AsyncFor(f) => {
                self.write_for("async for", &f.target, &f.iter, &f.body, &f.orelse);
            }
            While(w) => {
                self.stmt_line(&format!("while {}:", expr(&w.test, PREC_NAMED)));
                self.write_body(&w.body);
                self.write_orelse(&w.orelse);
            }
            If(i) => self.write_if(i, "if"),
            With(w) => {
                self.write_with("with", &w.items, &w.body);
            }
            AsyncWith(w) => {
                self.write_with("async with", &w.items, &w.body);
            }
            Match(m) => {
                self.stmt_line(&format!("match {}:", expr(&m.subject, PREC_NAMED)));
                self.indent += 1;
                for case in &m.cases {
                    let mut line = format!("case {}", pattern_text(&case.pattern));
                    if let Some(guard) = &case.guard {
                        line.push_str(&format!(" if {}", expr(guard, PREC_NAMED)));
                    }
                    line.push(':');
                    self.stmt_line(&line);
                    self.write_body(&case.body);
                }
                self.indent -= 1;
            }
            Raise(r) => {
                let mut line = "raise".to_string();
                if let Some(exc) = &r.exc {
                    line.push_str(&format!(" {}", expr(exc, PREC_NAMED)));
                    if let Some(cause) = &r.cause {
                        line.push_str(&format!(" from {}", expr(cause, PREC_NAMED)));
                    }
                }
                self.stmt_line(&line);
            }
            Try(t) => {
                self.write_try(&t.body, &t.handlers, &t.orelse, &t.finalbody, "except");
            }
            TryStar(t) => {
                self.write_try(&t.body, &t.handlers, &t.orelse, &t.finalbody, "except*");
            }
            Assert(a) => {
                let mut line = format!("assert {}", expr(&a.test, PREC_NAMED));
                if let Some(msg) = &a.msg {
                    line.push_str(&format!(", {}", expr(msg, PREC_NAMED)));
                }
                self.stmt_line(&line);
            }
            Import(i) => {
                let names: Vec<String> = i.names.iter().map(alias_text).collect();
                self.stmt_line(&format!("import {}", names.join(", ")));
            }
            ImportFrom(i) => {
                let dots = ".".repeat(i.level.as_ref().map(|l| l.to_u32() as usize).unwrap_or(0));
                let module = i.module.as_ref().map(|m| m.as_str()).unwrap_or("");
                let names: Vec<String> = i.names.iter().map(alias_text).collect();
                self.stmt_line(&format!("from {}{} import {}", dots, module, names.join(", ")));
            }
            Global(g) => {
                let names: Vec<&str> = g.names.iter().map(|n| n.as_str()).collect();
                self.stmt_line(&format!("global {}", names.join(", ")));
            }
            Nonlocal(n) => {
                let names: Vec<&str> = n.names.iter().map(|x| x.as_str()).collect();
                self.stmt_line(&format!("nonlocal {}", names.join(", ")));
            }
            Expr(e) => {
                self.stmt_line(&expr(&e.value, 0));
            }
            Pass(_) => self.stmt_line("pass"),
            Break(_) => self.stmt_line("break"),
            Continue(_) => self.stmt_line("continue"),
        }
    }

    fn write_function(
        &mut self,
        decorators: &[ast::Expr],
        keyword: &str,
        name: &ast::Identifier,
        args: &ast::Arguments,
        returns: &Option<Box<ast::Expr>>,
    ) {
        for decorator in decorators {
            self.stmt_line(&format!("@{}", expr(decorator, PREC_NAMED)));
        }
        let mut line = format!("{} {}({})", keyword, name.as_str(), arguments_text(args, true));
        if let Some(ret) = returns {
            line.push_str(&format!(" -> {}", expr(ret, PREC_NAMED)));
        }
        line.push(':');
        self.stmt_line(&line);
    }

    fn write_for(
        &mut self,
        keyword: &str,
        target: &ast::Expr,
        iter: &ast::Expr,
        body: &[ast::Stmt],
        orelse: &[ast::Stmt],
    ) {
        self.stmt_line(&format!(
            "{} {} in {}:",
            keyword,
            expr(target, PREC_NAMED),
            expr(iter, PREC_NAMED)
        ));
        self.write_body(body);
        self.write_orelse(orelse);
    }

    fn write_if(&mut self, i: &ast::StmtIf, keyword: &str) {
        self.stmt_line(&format!("{} {}:", keyword, expr(&i.test, PREC_NAMED)));
        self.write_body(&i.body);
        match i.orelse.as_slice() {
            [] => {}
            [ast::Stmt::If(nested)] => self.write_if(nested, "elif"),
            other => {
                self.stmt_line("else:");
                self.write_body(other);
            }
        }
    }

    fn write_orelse(&mut self, orelse: &[ast::Stmt]) {
        if !orelse.is_empty() {
            self.stmt_line("else:");
            self.write_body(orelse);
        }
    }

    fn write_with(&mut self, keyword: &str, items: &[ast::WithItem], body: &[ast::Stmt]) {
        let rendered: Vec<String> = items
            .iter()
            .map(|item| {
                let mut s = expr(&item.context_expr, PREC_NAMED);
                if let Some(vars) = &item.optional_vars {
                    s.push_str(&format!(" as {}", expr(vars, PREC_NAMED)));
                }
                s
            })
            .collect();
        self.stmt_line(&format!("{} {}:", keyword, rendered.join(", ")));
        self.write_body(body);
    }

    fn write_try(
        &mut self,
        body: &[ast::Stmt],
        handlers: &[ast::ExceptHandler],
        orelse: &[ast::Stmt],
        finalbody: &[ast::Stmt],
        except_keyword: &str,
    ) {
        self.stmt_line("try:");
        self.write_body(body);
        for handler in handlers {
            let ast::ExceptHandler::ExceptHandler(h) = handler;
            let mut line = except_keyword.to_string();
            if let Some(type_) = &h.type_ {
                line.push_str(&format!(" {}", expr(type_, PREC_NAMED)));
                if let Some(name) = &h.name {
                    line.push_str(&format!(" as {}", name.as_str()));
                }
            }
            line.push(':');
            self.stmt_line(&line);
            self.write_body(&h.body);
        }
        self.write_orelse(orelse);
        if !finalbody.is_empty() {
            self.stmt_line("finally:");
            self.write_body(finalbody);
        }
    }
}

/// Render an expression, parenthesizing when its precedence is below the
/// context's minimum.
fn expr(e: &ast::Expr, min_prec: u8) -> String {
    let (text, prec) = render_expr(e);
    if prec < min_prec {
        format!("({})", text)
    } else {
        text
    }
}

fn render_expr(e: &ast::Expr) -> (String, u8) {
    use ast::Expr::*;
    match e {
        BoolOp(b) => {
            let (joiner, prec) = match b.op {
                ast::BoolOp::And => (" and ", PREC_AND),
                ast::BoolOp::Or => (" or ", PREC_OR),
            };
            let parts: Vec<String> = b.values.iter().map(|v| expr(v, prec + 1)).collect();
            (parts.join(joiner), prec)
        }
        NamedExpr(n) => (
            format!(
                "{} := {}",
                expr(&n.target, PREC_ATOM),
                expr(&n.value, PREC_NAMED + 1)
            ),
            PREC_NAMED,
        ),
        BinOp(b) => {
            let (symbol, prec, right_assoc) = operator_info(&b.op);
            let (left_min, right_min) = if right_assoc {
                (prec + 1, prec)
            } else {
                (prec, prec + 1)
            };
            (
                format!(
                    "{} {} {}",
                    expr(&b.left, left_min),
                    symbol,
                    expr(&b.right, right_min)
                ),
                prec,
            )
        }
        UnaryOp(u) => match u.op {
            ast::UnaryOp::Not => (format!("not {}", expr(&u.operand, PREC_NOT)), PREC_NOT),
            ast::UnaryOp::Invert => (format!("~{}", expr(&u.operand, PREC_UNARY)), PREC_UNARY),
            ast::UnaryOp::UAdd => (format!("+{}", expr(&u.operand, PREC_UNARY)), PREC_UNARY),
            ast::UnaryOp::USub => (format!("-{}", expr(&u.operand, PREC_UNARY)), PREC_UNARY),
        },
        Lambda(l) => {
            let args = arguments_text(&l.args, false);
            let body = expr(&l.body, PREC_LAMBDA);
            if args.is_empty() {
                (format!("lambda: {}", body), PREC_LAMBDA)
            } else {
                (format!("lambda {}: {}", args, body), PREC_LAMBDA)
            }
        }
        IfExp(i) => (
            format!(
                "{} if {} else {}",
                expr(&i.body, PREC_OR),
                expr(&i.test, PREC_OR),
                expr(&i.orelse, PREC_TERNARY)
            ),
            PREC_TERNARY,
        ),
        Dict(d) => {
            let mut parts: Vec<String> = Vec::new();
            for (key, value) in d.keys.iter().zip(d.values.iter()) {
                match key {
                    Some(k) => parts.push(format!(
                        "{}: {}",
                        expr(k, PREC_NAMED),
                        expr(value, PREC_NAMED)
                    )),
                    None => parts.push(format!("**{}", expr(value, PREC_NAMED))),
                }
            }
            (format!("{{{}}}", parts.join(", ")), PREC_ATOM)
        }
        Set(s) => {
            let parts: Vec<String> = s.elts.iter().map(|x| expr(x, PREC_NAMED)).collect();
            (format!("{{{}}}", parts.join(", ")), PREC_ATOM)
        }
        ListComp(l) => (
            format!(
                "[{}{}]",
                expr(&l.elt, PREC_NAMED),
                comprehension_clauses(&l.generators)
            ),
            PREC_ATOM,
        ),
        SetComp(s) => (
            format!(
                "{{{}{}}}",
                expr(&s.elt, PREC_NAMED),
                comprehension_clauses(&s.generators)
            ),
            PREC_ATOM,
        ),
        DictComp(d) => (
            format!(
                "{{{}: {}{}}}",
                expr(&d.key, PREC_NAMED),
                expr(&d.value, PREC_NAMED),
                comprehension_clauses(&d.generators)
            ),
            PREC_ATOM,
        ),
        GeneratorExp(g) => (
            format!(
                "({}{})",
                expr(&g.elt, PREC_NAMED),
                comprehension_clauses(&g.generators)
            ),
            PREC_ATOM,
        ),
        Await(a) => (format!("await {}", expr(&a.value, PREC_AWAIT)), PREC_AWAIT),
        Yield(y) => match &y.value {
            Some(value) => (format!("yield {}", expr(value, PREC_NAMED)), PREC_YIELD),
            None => ("yield".to_string(), PREC_YIELD),
        },
        YieldFrom(y) => (
            format!("yield from {}", expr(&y.value, PREC_NAMED)),
            PREC_YIELD,
        ),
        Compare(c) => {
            let mut text = expr(&c.left, PREC_CMP + 1);
            for (op, comparator) in c.ops.iter().zip(c.comparators.iter()) {
                text.push_str(&format!(
                    " {} {}",
                    cmp_op_str(op),
                    expr(comparator, PREC_CMP + 1)
                ));
            }
            (text, PREC_CMP)
        }
        Call(c) => {
            let mut parts: Vec<String> =
                c.args.iter().map(|a| expr(a, PREC_NAMED)).collect();
            for kw in &c.keywords {
                parts.push(keyword_text(kw));
            }
            (
                format!("{}({})", expr(&c.func, PREC_ATOM), parts.join(", ")),
                PREC_ATOM,
            )
        }
        FormattedValue(f) => (format!("f'{}'", formatted_value_text(f)), PREC_ATOM),
        JoinedStr(j) => (fstring_text(&j.values), PREC_ATOM),
        Constant(c) => (constant_text(&c.value), PREC_ATOM),
        Attribute(a) => (
            format!("{}.{}", expr(&a.value, PREC_ATOM), a.attr.as_str()),
            PREC_ATOM,
        ),
        Subscript(s) => (
            format!("{}[{}]", expr(&s.value, PREC_ATOM), subscript_text(&s.slice)),
            PREC_ATOM,
        ),
        Starred(s) => (format!("*{}", expr(&s.value, PREC_UNARY)), PREC_ATOM),
        Name(n) => (n.id.as_str().to_string(), PREC_ATOM),
        List(l) => {
            let parts: Vec<String> = l.elts.iter().map(|x| expr(x, PREC_NAMED)).collect();
            (format!("[{}]", parts.join(", ")), PREC_ATOM)
        }
        Tuple(t) => {
            let parts: Vec<String> = t.elts.iter().map(|x| expr(x, PREC_NAMED)).collect();
            match parts.len() {
                0 => ("()".to_string(), PREC_ATOM),
                1 => (format!("({},)", parts[0]), PREC_ATOM),
                _ => (format!("({})", parts.join(", ")), PREC_ATOM),
            }
        }
        Slice(s) => (slice_text(s), PREC_YIELD),
    }
}

fn subscript_text(slice: &ast::Expr) -> String {
    match slice {
        ast::Expr::Slice(s) => slice_text(s),
        ast::Expr::Tuple(t) if !t.elts.is_empty() => {
            let parts: Vec<String> = t
                .elts
                .iter()
                .map(|e| match e {
                    ast::Expr::Slice(s) => slice_text(s),
                    other => expr(other, PREC_NAMED),
                })
                .collect();
            parts.join(", ")
        }
        other => expr(other, PREC_NAMED),
    }
}

fn slice_text(s: &ast::ExprSlice) -> String {
    let lower = s.lower.as_ref().map(|e| expr(e, PREC_NAMED)).unwrap_or_default();
    let upper = s.upper.as_ref().map(|e| expr(e, PREC_NAMED)).unwrap_or_default();
    match &s.step {
        Some(step) => format!("{}:{}:{}", lower, upper, expr(step, PREC_NAMED)),
        None => format!("{}:{}", lower, upper),
    }
}

fn comprehension_clauses(generators: &[ast::Comprehension]) -> String {
    let mut text = String::new();
    for gen in generators {
        let keyword = if gen.is_async { "async for" } else { "for" };
        text.push_str(&format!(
            " {} {} in {}",
            keyword,
            expr(&gen.target, PREC_NAMED),
            expr(&gen.iter, PREC_OR)
        ));
        for condition in &gen.ifs {
            text.push_str(&format!(" if {}", expr(condition, PREC_OR)));
        }
    }
    text
}

fn keyword_text(kw: &ast::Keyword) -> String {
    match &kw.arg {
        Some(name) => format!("{}={}", name.as_str(), expr(&kw.value, PREC_NAMED)),
        None => format!("**{}", expr(&kw.value, PREC_NAMED)),
    }
}

fn alias_text(alias: &ast::Alias) -> String {
    match &alias.asname {
        Some(asname) => format!("{} as {}", alias.name.as_str(), asname.as_str()),
        None => alias.name.as_str().to_string(),
    }
}

fn arguments_text(args: &ast::Arguments, with_annotations: bool) -> String {
    let mut parts: Vec<String> = Vec::new();
    for a in &args.posonlyargs {
        parts.push(arg_with_default_text(a, with_annotations));
    }
    if !args.posonlyargs.is_empty() {
        parts.push("/".to_string());
    }
    for a in &args.args {
        parts.push(arg_with_default_text(a, with_annotations));
    }
    if let Some(vararg) = &args.vararg {
        parts.push(format!("*{}", arg_text(vararg, with_annotations)));
    } else if !args.kwonlyargs.is_empty() {
        parts.push("*".to_string());
    }
    for a in &args.kwonlyargs {
        parts.push(arg_with_default_text(a, with_annotations));
    }
    if let Some(kwarg) = &args.kwarg {
        parts.push(format!("**{}", arg_text(kwarg, with_annotations)));
    }
    parts.join(", ")
}

fn arg_with_default_text(a: &ast::ArgWithDefault, with_annotations: bool) -> String {
    let mut text = arg_text(&a.def, with_annotations);
    if let Some(default) = &a.default {
        text.push_str(&format!("={}", expr(default, PREC_NAMED)));
    }
    text
}

fn arg_text(a: &ast::Arg, with_annotations: bool) -> String {
    let mut text = a.arg.as_str().to_string();
    if with_annotations {
        if let Some(annotation) = &a.annotation {
            text.push_str(&format!(": {}", expr(annotation, PREC_NAMED)));
        }
    }
    text
}

fn pattern_text(pattern: &ast::Pattern) -> String {
    use ast::Pattern::*;
    match pattern {
        MatchValue(v) => expr(&v.value, PREC_NAMED),
        MatchSingleton(s) => constant_text(&s.value),
        MatchSequence(s) => {
            let parts: Vec<String> = s.patterns.iter().map(pattern_text).collect();
            format!("[{}]", parts.join(", "))
        }
        MatchMapping(m) => {
            let mut parts: Vec<String> = m
                .keys
                .iter()
                .zip(m.patterns.iter())
                .map(|(k, p)| format!("{}: {}", expr(k, PREC_NAMED), pattern_text(p)))
                .collect();
            if let Some(rest) = &m.rest {
                parts.push(format!("**{}", rest.as_str()));
            }
            format!("{{{}}}", parts.join(", "))
        }
        MatchClass(c) => {
            let mut parts: Vec<String> = c.patterns.iter().map(pattern_text).collect();
            for (attr, p) in c.kwd_attrs.iter().zip(c.kwd_patterns.iter()) {
                parts.push(format!("{}={}", attr.as_str(), pattern_text(p)));
            }
            format!("{}({})", expr(&c.cls, PREC_ATOM), parts.join(", "))
        }
        MatchStar(s) => format!("*{}", s.name.as_ref().map(|n| n.as_str()).unwrap_or("_")),
        MatchAs(a) => match (&a.pattern, &a.name) {
            (Some(p), Some(n)) => format!("{} as {}", pattern_text(p), n.as_str()),
            (None, Some(n)) => n.as_str().to_string(),
            _ => "_".to_string(),
        },
        MatchOr(o) => {
            let parts: Vec<String> = o.patterns.iter().map(pattern_text).collect();
            parts.join(" | ")
        }
    }
}

fn operator_info(op: &ast::Operator) -> (&'static str, u8, bool) {
    use ast::Operator::*;
    match op {
        Add => ("+", PREC_ARITH, false),
        Sub => ("-", PREC_ARITH, false),
        Mult => ("*", PREC_TERM, false),
        MatMult => ("@", PREC_TERM, false),
        Div => ("/", PREC_TERM, false),
        Mod => ("%", PREC_TERM, false),
        FloorDiv => ("//", PREC_TERM, false),
        Pow => ("**", PREC_POW, true),
        LShift => ("<<", PREC_SHIFT, false),
        RShift => (">>", PREC_SHIFT, false),
        BitOr => ("|", PREC_BOR, false),
        BitXor => ("^", PREC_BXOR, false),
        BitAnd => ("&", PREC_BAND, false),
    }
}

fn cmp_op_str(op: &ast::CmpOp) -> &'static str {
    use ast::CmpOp::*;
    match op {
        Eq => "==",
        NotEq => "!=",
        Lt => "<",
        LtE => "<=",
        Gt => ">",
        GtE => ">=",
        Is => "is",
        IsNot => "is not",
        In => "in",
        NotIn => "not in",
    }
}

fn constant_text(constant: &ast::Constant) -> String {
    match constant {
        ast::Constant::None => "None".to_string(),
        ast::Constant::Bool(true) => "True".to_string(),
        ast::Constant::Bool(false) => "False".to_string(),
        ast::Constant::Str(s) => string_repr(s),
        ast::Constant::Bytes(b) => bytes_repr(b),
        ast::Constant::Int(i) => format!("{}", i),
        ast::Constant::Float(f) => float_text(*f),
        ast::Constant::Complex { real, imag } => {
            if *real == 0.0 {
                format!("{}j", float_text(*imag))
            } else {
                format!("({}+{}j)", float_text(*real), float_text(*imag))
            }
        }
        ast::Constant::Ellipsis => "...".to_string(),
        ast::Constant::Tuple(values) => {
            let parts: Vec<String> = values.iter().map(constant_text).collect();
            format!("({})", parts.join(", "))
        }
    }
}

fn float_text(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

fn string_repr(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

fn bytes_repr(bytes: &[u8]) -> String {
    let mut out = String::from("b'");
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            other => out.push_str(&format!("\\x{:02x}", other)),
        }
    }
    out.push('\'');
    out
}

fn fstring_text(values: &[ast::Expr]) -> String {
    let mut inner = String::new();
    for value in values {
        match value {
            ast::Expr::Constant(c) => {
                if let ast::Constant::Str(s) = &c.value {
                    inner.push_str(&escape_fstring_literal(s));
                }
            }
            ast::Expr::FormattedValue(f) => inner.push_str(&formatted_value_text(f)),
            other => inner.push_str(&format!("{{{}}}", expr(other, PREC_NAMED))),
        }
    }
    format!("f'{}'", inner)
}

fn formatted_value_text(f: &ast::ExprFormattedValue) -> String {
    let mut text = format!("{{{}", expr(&f.value, PREC_NAMED));
    match f.conversion {
        ast::ConversionFlag::Str => text.push_str("!s"),
        ast::ConversionFlag::Ascii => text.push_str("!a"),
        ast::ConversionFlag::Repr => text.push_str("!r"),
        _ => {}
    }
    if let Some(spec) = &f.format_spec {
        text.push(':');
        text.push_str(&format_spec_text(spec));
    }
    text.push('}');
    text
}

fn format_spec_text(spec: &ast::Expr) -> String {
    match spec {
        ast::Expr::JoinedStr(j) => {
            let mut out = String::new();
            for value in &j.values {
                match value {
                    ast::Expr::Constant(c) => {
                        if let ast::Constant::Str(s) = &c.value {
                            out.push_str(s);
                        }
                    }
                    other => out.push_str(&format!("{{{}}}", expr(other, PREC_NAMED))),
                }
            }
            out
        }
        other => expr(other, PREC_NAMED),
    }
}

fn escape_fstring_literal(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '{' => escaped.push_str("{{"),
            '}' => escaped.push_str("}}"),
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustpython_parser::{ast, Parse};

    fn render(source: &str) -> String {
        let suite = ast::Suite::parse(source, "<test>").unwrap();
        render_module(&suite)
    }

    #[test]
    fn formatting_and_comments_do_not_survive() {
        let messy = "x   =  1   # tracker\n\n\ny = (  x +   2 )\n";
        let clean = "x = 1\ny = x + 2\n";
        assert_eq!(render(messy), render(clean));
    }

    #[test]
    fn function_renders_one_statement_per_line() {
        let out = render("def f(a, b=2):\n    return a + b\n");
        assert_eq!(out, "def f(a, b=2):\n    return a + b\n");
    }

    #[test]
    fn nested_blocks_use_four_space_indent() {
        let out = render("def f(xs):\n  for x in xs:\n    if x:\n      return x\n");
        assert_eq!(
            out,
            "def f(xs):\n    for x in xs:\n        if x:\n            return x\n"
        );
    }

    #[test]
    fn elif_chains_are_preserved() {
        let out = render("if a:\n    pass\nelif b:\n    pass\nelse:\n    pass\n");
        assert!(out.contains("elif b:"));
        assert!(out.contains("else:"));
    }

    #[test]
    fn operator_precedence_keeps_necessary_parens() {
        assert_eq!(render("x = (a + b) * c\n"), "x = (a + b) * c\n");
        assert_eq!(render("x = a + b * c\n"), "x = a + b * c\n");
        // Redundant parens are dropped.
        assert_eq!(render("x = (a) + ((b * c))\n"), "x = a + b * c\n");
    }

    #[test]
    fn right_associative_power_keeps_shape() {
        assert_eq!(render("x = a ** b ** c\n"), "x = a ** b ** c\n");
        assert_eq!(render("x = (a ** b) ** c\n"), "x = (a ** b) ** c\n");
    }

    #[test]
    fn string_and_number_literals_round_trip() {
        assert_eq!(render("s = 'hi\\n'\n"), "s = 'hi\\n'\n");
        assert_eq!(render("f = 1.0\n"), "f = 1.0\n");
        assert_eq!(render("n = 42\n"), "n = 42\n");
    }

    #[test]
    fn class_and_try_render_deterministically() {
        let out = render(
            "class A(B):\n    def m(self):\n        try:\n            pass\n        except ValueError as e:\n            raise\n",
        );
        assert!(out.starts_with("class A(B):\n    def m(self):\n        try:\n"));
        assert!(out.contains("        except ValueError as e:\n"));
    }

    #[test]
    fn comprehension_and_slice_render() {
        assert_eq!(render("y = [i * 2 for i in xs if i]\n"), "y = [i * 2 for i in xs if i]\n");
        assert_eq!(render("z = xs[1:2]\n"), "z = xs[1:2]\n");
        assert_eq!(render("z = xs[::2]\n"), "z = xs[::2]\n");
    }

    #[test]
    fn fstring_renders() {
        assert_eq!(render("m = f'got {x!r}'\n"), "m = f'got {x!r}'\n");
    }

    #[test]
    fn rendering_is_idempotent() {
        let source = "def f(a):\n    b = {k: v for k, v in a.items()}\n    return b\n";
        let once = render(source);
        assert_eq!(render(&once), once);
    }
}
