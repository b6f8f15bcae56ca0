//! JavaScript emitter
//!
//! Prints a (lowered) syntax tree as JavaScript in the layout the runtime's
//! reference toolchain produces: four-space indentation, `else`/`catch` on
//! their own line, single-line object literals unless the source broke them
//! across lines, and empty bodies printed as `{ }`.

use crate::ast::*;

#[derive(Debug, Clone)]
pub struct PrinterConfig {
    /// Number of spaces for each indentation level.
    pub indent_width: usize,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self { indent_width: 4 }
    }
}

pub struct Printer {
    out: String,
    indent_level: usize,
    config: PrinterConfig,
}

/// Prints a whole program.
pub fn print_program(program: &Program) -> String {
    let mut printer = Printer::new(PrinterConfig::default());
    printer.program(program);
    printer.finish()
}

/// Prints a single expression at indentation level zero.
pub fn print_expr(expr: &Expr) -> String {
    let mut printer = Printer::new(PrinterConfig::default());
    printer.expr(expr);
    printer.finish()
}

/// Prints statements, one per line, at indentation level zero.
pub fn print_stmts(stmts: &[Stmt]) -> String {
    let mut printer = Printer::new(PrinterConfig::default());
    for stmt in stmts {
        printer.stmt(stmt);
        printer.out.push('\n');
    }
    printer.finish()
}

impl Printer {
    pub fn new(config: PrinterConfig) -> Self {
        Self {
            out: String::new(),
            indent_level: 0,
            config,
        }
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn write(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn newline(&mut self) {
        self.out.push('\n');
        let width = self.indent_level * self.config.indent_width;
        self.out.extend(std::iter::repeat(' ').take(width));
    }

    fn push_indent(&mut self) {
        self.indent_level += 1;
    }

    fn pop_indent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    pub fn program(&mut self, program: &Program) {
        for item in &program.items {
            if self.item(item) {
                self.out.push('\n');
            }
        }
    }

    /// Returns false when the item printed nothing.
    fn item(&mut self, item: &Item) -> bool {
        match item {
            Item::Import(decl) => self.import(decl),
            Item::ExportNamed { specifiers, source } => {
                self.write("export { ");
                self.specifiers(specifiers);
                self.write(" }");
                if let Some(source) = source {
                    self.write(" from ");
                    self.write(source);
                }
                self.write(";");
            }
            Item::ExportAll { alias, source } => {
                self.write("export *");
                if let Some(alias) = alias {
                    self.write(" as ");
                    self.write(alias);
                }
                self.write(" from ");
                self.write(source);
                self.write(";");
            }
            Item::ExportDefault(expr) => {
                self.write("export default ");
                self.expr(expr);
                self.write(";");
            }
            Item::Struct(decl) => {
                // structs are lowered before printing; print the shell if one slips through
                self.export_prefix(decl.export);
                self.write("class ");
                self.write(&decl.name);
                self.write(" ");
                self.class_body(&decl.members);
            }
            Item::Class(decl) => {
                self.export_prefix(decl.export);
                self.class(decl);
            }
            Item::Function(decl) => {
                self.export_prefix(decl.export);
                self.function_decl(decl);
            }
            Item::Enum(decl) => self.enum_decl(decl),
            Item::Statement { stmt, export } => {
                self.export_prefix(*export);
                self.stmt(stmt);
            }
            Item::Erased => return false,
        }
        true
    }

    fn export_prefix(&mut self, export: Export) {
        match export {
            Export::None => {}
            Export::Named => self.write("export "),
            Export::Default => self.write("export default "),
        }
    }

    fn import(&mut self, decl: &ImportDecl) {
        self.write("import ");
        let mut needs_from = false;
        if let Some(default) = &decl.default {
            self.write(default);
            needs_from = true;
        }
        if let Some(namespace) = &decl.namespace {
            if needs_from {
                self.write(", ");
            }
            self.write("* as ");
            self.write(namespace);
            needs_from = true;
        }
        if !decl.named.is_empty() {
            if needs_from {
                self.write(", ");
            }
            self.write("{ ");
            self.specifiers(&decl.named);
            self.write(" }");
            needs_from = true;
        }
        if needs_from {
            self.write(" from ");
        }
        self.write(&decl.source);
        self.write(";");
    }

    fn specifiers(&mut self, specifiers: &[(String, Option<String>)]) {
        for (i, (name, alias)) in specifiers.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write(name);
            if let Some(alias) = alias {
                self.write(" as ");
                self.write(alias);
            }
        }
    }

    /// Enums lower to the usual IIFE over a `var`.
    fn enum_decl(&mut self, decl: &EnumDecl) {
        if decl.export != Export::None {
            self.write("export ");
        }
        self.write("var ");
        self.write(&decl.name);
        self.write(";");
        self.newline();
        self.write("(function (");
        self.write(&decl.name);
        self.write(") {");
        self.push_indent();
        let mut next_value: Option<i64> = Some(0);
        for (key, init) in &decl.members {
            self.newline();
            let key_literal = format!("\"{}\"", key);
            match init {
                Some(Expr::Str(raw)) => {
                    self.write(&format!("{}[{}] = {};", decl.name, key_literal, raw));
                    next_value = None;
                }
                Some(expr) => {
                    self.write(&format!("{}[{}[{}] = ", decl.name, decl.name, key_literal));
                    self.expr(expr);
                    self.write(&format!("] = {};", key_literal));
                    next_value = match expr {
                        Expr::Number(raw) => raw.parse::<i64>().ok().map(|v| v + 1),
                        Expr::Unary { op, arg } if op == "-" => match &**arg {
                            Expr::Number(raw) => raw.parse::<i64>().ok().map(|v| 1 - v),
                            _ => None,
                        },
                        _ => None,
                    };
                }
                None => {
                    let value = next_value.unwrap_or(0);
                    self.write(&format!(
                        "{}[{}[{}] = {}] = {};",
                        decl.name, decl.name, key_literal, value, key_literal
                    ));
                    next_value = Some(value + 1);
                }
            }
        }
        self.pop_indent();
        self.newline();
        self.write(&format!("}})({} || ({} = {{}}));", decl.name, decl.name));
    }

    fn function_decl(&mut self, decl: &FunctionDecl) {
        if decl.func.is_async {
            self.write("async ");
        }
        self.write("function");
        if decl.func.is_generator {
            self.write("*");
        }
        self.write(" ");
        self.write(&decl.name);
        self.params(&decl.func.params);
        self.write(" ");
        self.block(&decl.func.body);
    }

    fn class(&mut self, decl: &ClassDecl) {
        self.write("class ");
        if let Some(name) = &decl.name {
            self.write(name);
            self.write(" ");
        }
        if let Some(super_class) = &decl.super_class {
            self.write("extends ");
            self.expr(super_class);
            self.write(" ");
        }
        self.class_body(&decl.members);
    }

    fn class_body(&mut self, members: &[ClassMember]) {
        if members.is_empty() {
            self.write("{");
            self.newline();
            self.write("}");
            return;
        }
        self.write("{");
        self.push_indent();
        for member in members {
            self.newline();
            match member {
                ClassMember::Property(prop) => {
                    if prop.is_static {
                        self.write("static ");
                    }
                    self.prop_key(&prop.key);
                    if let Some(init) = &prop.init {
                        self.write(" = ");
                        self.expr(init);
                    }
                    self.write(";");
                }
                ClassMember::Method(method) => {
                    if method.is_static {
                        self.write("static ");
                    }
                    self.method(&method.key, method.kind, &method.func, method.pos.line == 0);
                }
            }
        }
        self.pop_indent();
        self.newline();
        self.write("}");
    }

    /// Synthesized methods (no source position) with an empty body keep
    /// their braces on separate lines.
    fn method(&mut self, key: &PropKey, kind: MethodKind, func: &Function, synthesized: bool) {
        if func.is_async {
            self.write("async ");
        }
        match kind {
            MethodKind::Getter => self.write("get "),
            MethodKind::Setter => self.write("set "),
            MethodKind::Method | MethodKind::Constructor => {}
        }
        if func.is_generator {
            self.write("*");
        }
        self.prop_key(key);
        self.params(&func.params);
        self.write(" ");
        if func.body.is_empty() && synthesized {
            self.write("{");
            self.newline();
            self.write("}");
        } else {
            self.block(&func.body);
        }
    }

    fn prop_key(&mut self, key: &PropKey) {
        match key {
            PropKey::Ident(name) => self.write(name),
            PropKey::Literal(raw) => self.write(raw),
            PropKey::Computed(expr) => {
                self.write("[");
                self.expr(expr);
                self.write("]");
            }
        }
    }

    fn params(&mut self, params: &[Param]) {
        self.write("(");
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.param(param);
        }
        self.write(")");
    }

    fn param(&mut self, param: &Param) {
        if param.rest {
            self.write("...");
        }
        self.pattern(&param.pattern);
        if let Some(default) = &param.default {
            self.write(" = ");
            self.expr(default);
        }
    }

    fn pattern(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Ident(name) => self.write(name),
            Pattern::Object(props) => {
                if props.is_empty() {
                    self.write("{}");
                    return;
                }
                self.write("{ ");
                for (i, prop) in props.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    if prop.rest {
                        self.write("...");
                        self.pattern(&prop.value);
                        continue;
                    }
                    if !prop.shorthand {
                        self.prop_key(&prop.key);
                        self.write(": ");
                    }
                    self.pattern(&prop.value);
                    if let Some(default) = &prop.default {
                        self.write(" = ");
                        self.expr(default);
                    }
                }
                self.write(" }");
            }
            Pattern::Array(elems) => {
                self.write("[");
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    if let Some(elem) = elem {
                        if elem.rest {
                            self.write("...");
                        }
                        self.pattern(&elem.pattern);
                        if let Some(default) = &elem.default {
                            self.write(" = ");
                            self.expr(default);
                        }
                    }
                }
                if matches!(elems.last(), Some(None)) {
                    self.write(",");
                }
                self.write("]");
            }
        }
    }

    /// `{ ... }` with each statement on its own line; `{ }` when empty.
    pub fn block(&mut self, stmts: &[Stmt]) {
        if stmts.is_empty() {
            self.write("{ }");
            return;
        }
        self.write("{");
        self.push_indent();
        for stmt in stmts {
            self.newline();
            self.stmt(stmt);
        }
        self.pop_indent();
        self.newline();
        self.write("}");
    }

    pub fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(expr) => {
                // object literals and function expressions need parens at statement start
                let needs_parens = matches!(expr, Expr::Object { .. } | Expr::Function { .. } | Expr::Class(_));
                if needs_parens {
                    self.write("(");
                }
                self.expr(expr);
                if needs_parens {
                    self.write(")");
                }
                self.write(";");
            }
            Stmt::Var(decl) => {
                self.var_decl(decl);
                self.write(";");
            }
            Stmt::Function(decl) => self.function_decl(decl),
            Stmt::Class(decl) => self.class(decl),
            Stmt::Return(arg) => {
                self.write("return");
                if let Some(arg) = arg {
                    self.write(" ");
                    self.expr(arg);
                }
                self.write(";");
            }
            Stmt::If { test, cons, alt, .. } => {
                self.write("if (");
                self.expr(test);
                self.write(") ");
                self.body_stmt(cons);
                if let Some(alt) = alt {
                    self.newline();
                    self.write("else ");
                    self.body_stmt(alt);
                }
            }
            Stmt::Block(stmts) => self.block(stmts),
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                self.write("for (");
                if let Some(init) = init {
                    self.for_init(init);
                }
                self.write(";");
                if let Some(test) = test {
                    self.write(" ");
                    self.expr(test);
                }
                self.write(";");
                if let Some(update) = update {
                    self.write(" ");
                    self.expr(update);
                }
                self.write(") ");
                self.body_stmt(body);
            }
            Stmt::ForIn {
                left,
                right,
                body,
                of,
                is_await,
            } => {
                self.write("for ");
                if *is_await {
                    self.write("await ");
                }
                self.write("(");
                self.for_init(left);
                self.write(if *of { " of " } else { " in " });
                self.expr(right);
                self.write(") ");
                self.body_stmt(body);
            }
            Stmt::While { test, body } => {
                self.write("while (");
                self.expr(test);
                self.write(") ");
                self.body_stmt(body);
            }
            Stmt::DoWhile { body, test } => {
                self.write("do ");
                self.body_stmt(body);
                self.write(" while (");
                self.expr(test);
                self.write(");");
            }
            Stmt::Break(label) => {
                self.write("break");
                if let Some(label) = label {
                    self.write(" ");
                    self.write(label);
                }
                self.write(";");
            }
            Stmt::Continue(label) => {
                self.write("continue");
                if let Some(label) = label {
                    self.write(" ");
                    self.write(label);
                }
                self.write(";");
            }
            Stmt::Throw(arg) => {
                self.write("throw ");
                self.expr(arg);
                self.write(";");
            }
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => {
                self.write("try ");
                self.block(block);
                if let Some(handler) = handler {
                    self.newline();
                    self.write("catch ");
                    if let Some(param) = param {
                        self.write("(");
                        self.pattern(param);
                        self.write(") ");
                    }
                    self.block(handler);
                }
                if let Some(finalizer) = finalizer {
                    self.newline();
                    self.write("finally ");
                    self.block(finalizer);
                }
            }
            Stmt::Switch { discriminant, cases } => {
                self.write("switch (");
                self.expr(discriminant);
                self.write(") {");
                self.push_indent();
                for case in cases {
                    self.newline();
                    match &case.test {
                        Some(test) => {
                            self.write("case ");
                            self.expr(test);
                            self.write(":");
                        }
                        None => self.write("default:"),
                    }
                    self.push_indent();
                    for stmt in &case.body {
                        self.newline();
                        self.stmt(stmt);
                    }
                    self.pop_indent();
                }
                self.pop_indent();
                self.newline();
                self.write("}");
            }
            Stmt::Labeled { label, body } => {
                self.write(label);
                self.write(": ");
                self.stmt(body);
            }
            Stmt::Empty => self.write(";"),
        }
    }

    /// Loop and branch bodies: blocks inline, anything else indented on the next line.
    fn body_stmt(&mut self, stmt: &Stmt) {
        if let Stmt::Block(stmts) = stmt {
            self.block(stmts);
        } else if let Stmt::If { .. } = stmt {
            self.stmt(stmt);
        } else {
            self.push_indent();
            self.newline();
            self.stmt(stmt);
            self.pop_indent();
        }
    }

    fn for_init(&mut self, init: &ForInit) {
        match init {
            ForInit::Var(decl) => self.var_decl(decl),
            ForInit::Expr(expr) => self.expr(expr),
        }
    }

    fn var_decl(&mut self, decl: &VarDecl) {
        self.write(decl.kind.as_str());
        self.write(" ");
        for (i, declarator) in decl.decls.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.pattern(&declarator.pattern);
            if let Some(init) = &declarator.init {
                self.write(" = ");
                self.expr(init);
            }
        }
    }

    fn args(&mut self, args: &[Expr]) {
        self.write("(");
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.expr(arg);
        }
        self.write(")");
    }

    pub fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(name) => self.write(name),
            Expr::This => self.write("this"),
            Expr::Super => self.write("super"),
            Expr::Number(raw) | Expr::Str(raw) | Expr::Regex(raw) => self.write(raw),
            Expr::Raw(code) => self.raw(code),
            Expr::Template { tag, quasis, exprs } => {
                if let Some(tag) = tag {
                    self.expr(tag);
                }
                self.write("`");
                for (i, quasi) in quasis.iter().enumerate() {
                    self.write(quasi);
                    if let Some(expr) = exprs.get(i) {
                        self.write("${");
                        self.expr(expr);
                        self.write("}");
                    }
                }
                self.write("`");
            }
            Expr::Array { elements, multiline } => self.array(elements, *multiline),
            Expr::Object { props, multiline } => self.object(props, *multiline),
            Expr::Function { name, func } => {
                if func.is_async {
                    self.write("async ");
                }
                self.write("function");
                if func.is_generator {
                    self.write("*");
                }
                if let Some(name) = name {
                    self.write(" ");
                    self.write(name);
                } else {
                    self.write(" ");
                }
                self.params(&func.params);
                self.write(" ");
                self.block(&func.body);
            }
            Expr::Arrow(arrow) => self.arrow(arrow),
            Expr::Class(decl) => self.class(decl),
            Expr::Member {
                object,
                property,
                optional,
            } => {
                self.member_object(object);
                self.write(if *optional { "?." } else { "." });
                self.write(property);
            }
            Expr::Index {
                object,
                index,
                optional,
            } => {
                self.member_object(object);
                if *optional {
                    self.write("?.");
                }
                self.write("[");
                self.expr(index);
                self.write("]");
            }
            Expr::Call {
                callee,
                args,
                optional,
                ..
            } => {
                self.member_object(callee);
                if *optional {
                    self.write("?.");
                }
                self.args(args);
            }
            Expr::New { callee, args, .. } => {
                self.write("new ");
                self.member_object(callee);
                match args {
                    Some(args) => self.args(args),
                    None => self.write("()"),
                }
            }
            Expr::Unary { op, arg } => {
                self.write(op);
                if op.chars().all(char::is_alphabetic) {
                    self.write(" ");
                } else if let Expr::Unary { op: inner, .. } | Expr::Update { op: inner, prefix: true, .. } = &**arg {
                    // `- -x`, `+ ++x`
                    if inner.starts_with(op.as_str()) {
                        self.write(" ");
                    }
                }
                self.expr(arg);
            }
            Expr::Update { op, prefix, arg } => {
                if *prefix {
                    self.write(op);
                    self.expr(arg);
                } else {
                    self.expr(arg);
                    self.write(op);
                }
            }
            Expr::Binary { op, left, right } => {
                self.expr(left);
                self.write(" ");
                self.write(op);
                self.write(" ");
                self.expr(right);
            }
            Expr::Assign { op, target, value } => {
                self.expr(target);
                self.write(" ");
                self.write(op);
                self.write(" ");
                self.expr(value);
            }
            Expr::Conditional { test, cons, alt } => {
                self.expr(test);
                self.write(" ? ");
                self.expr(cons);
                self.write(" : ");
                self.expr(alt);
            }
            Expr::Sequence(exprs) => {
                for (i, expr) in exprs.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.expr(expr);
                }
            }
            Expr::Spread(arg) => {
                self.write("...");
                self.expr(arg);
            }
            Expr::Paren(inner) => {
                self.write("(");
                self.expr(inner);
                self.write(")");
            }
            Expr::Await(arg) => {
                self.write("await ");
                self.expr(arg);
            }
            Expr::Yield { arg, delegate } => {
                self.write("yield");
                if *delegate {
                    self.write("*");
                }
                if let Some(arg) = arg {
                    self.write(" ");
                    self.expr(arg);
                }
            }
            Expr::TwoWay(inner) => self.expr(inner),
            Expr::ImplicitChain(chain) => {
                for (name, args) in chain {
                    self.write(".");
                    self.write(name);
                    self.args(args);
                }
            }
        }
    }

    /// Synthesized snippets; continuation lines are placed relative to the
    /// current indentation.
    fn raw(&mut self, code: &str) {
        for (i, line) in code.split('\n').enumerate() {
            if i > 0 {
                self.newline();
            }
            self.write(line);
        }
    }

    /// Callee and member objects that are not primary expressions get parens.
    fn member_object(&mut self, object: &Expr) {
        let needs_parens = matches!(
            object,
            Expr::Arrow(_)
                | Expr::Function { .. }
                | Expr::Binary { .. }
                | Expr::Assign { .. }
                | Expr::Conditional { .. }
                | Expr::Unary { .. }
                | Expr::Await(_)
                | Expr::Sequence(_)
                | Expr::Object { .. }
        );
        if needs_parens {
            self.write("(");
            self.expr(object);
            self.write(")");
        } else {
            self.expr(object);
        }
    }

    fn arrow(&mut self, arrow: &ArrowFn) {
        if arrow.is_async {
            self.write("async ");
        }
        let bare = !arrow.parens
            && arrow.params.len() == 1
            && arrow.params[0].name().is_some()
            && arrow.params[0].default.is_none()
            && !arrow.params[0].rest;
        if bare {
            self.param(&arrow.params[0]);
        } else {
            self.params(&arrow.params);
        }
        self.write(" => ");
        match &arrow.body {
            ArrowBody::Block(stmts) => self.block(stmts),
            ArrowBody::Expr(expr) => {
                if matches!(**expr, Expr::Object { .. }) {
                    self.write("(");
                    self.expr(expr);
                    self.write(")");
                } else {
                    self.expr(expr);
                }
            }
        }
    }

    fn array(&mut self, elements: &[Option<Expr>], multiline: bool) {
        if elements.is_empty() {
            self.write("[]");
            return;
        }
        self.write("[");
        if multiline {
            self.push_indent();
        }
        for (i, elem) in elements.iter().enumerate() {
            if multiline {
                self.newline();
            } else if i > 0 {
                self.write(" ");
            }
            if let Some(elem) = elem {
                self.expr(elem);
            }
            if i + 1 < elements.len() || elem.is_none() {
                self.write(",");
            }
        }
        if multiline {
            self.pop_indent();
            self.newline();
        }
        self.write("]");
    }

    fn object(&mut self, props: &[ObjectProp], multiline: bool) {
        if props.is_empty() {
            self.write("{}");
            return;
        }
        self.write("{");
        if multiline {
            self.push_indent();
        }
        for (i, prop) in props.iter().enumerate() {
            if multiline {
                self.newline();
            } else {
                self.write(" ");
            }
            self.object_prop(prop);
            if i + 1 < props.len() {
                self.write(",");
            }
        }
        if multiline {
            self.pop_indent();
            self.newline();
        } else {
            self.write(" ");
        }
        self.write("}");
    }

    fn object_prop(&mut self, prop: &ObjectProp) {
        match prop {
            ObjectProp::KeyValue { key, value } => {
                self.prop_key(key);
                self.write(": ");
                self.expr(value);
            }
            ObjectProp::Shorthand(name) => self.write(name),
            ObjectProp::Method { key, kind, func } => self.method(key, *kind, func, false),
            ObjectProp::Spread(expr) => {
                self.write("...");
                self.expr(expr);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn roundtrip(source: &str) -> String {
        print_program(&parse_source(source, "test.ets").unwrap())
    }

    #[test]
    fn test_types_are_erased() {
        let out = roundtrip("let a: number = 1;\nfunction f(x: string, y?: number): void { return; }\n");
        assert_eq!(out, "let a = 1;\nfunction f(x, y) {\n    return;\n}\n");
    }

    #[test]
    fn test_else_on_new_line() {
        let out = roundtrip("if (a) { b(); } else { c(); }\n");
        assert_eq!(out, "if (a) {\n    b();\n}\nelse {\n    c();\n}\n");
    }

    #[test]
    fn test_object_layout_follows_source() {
        assert_eq!(roundtrip("x = { a: 1, b };\n"), "x = { a: 1, b };\n");
        assert_eq!(
            roundtrip("x = {\n  a: 1,\n  b: 2\n};\n"),
            "x = {\n    a: 1,\n    b: 2\n};\n"
        );
    }

    #[test]
    fn test_arrow_parens_preserved() {
        assert_eq!(roundtrip("f(x => x + 1, (y) => { });\n"), "f(x => x + 1, (y) => { });\n");
    }

    #[test]
    fn test_enum_lowering() {
        let out = roundtrip("enum Color { Red, Green = 5, Blue, Name = 'n' }\n");
        assert_eq!(
            out,
            "var Color;\n(function (Color) {\n    Color[Color[\"Red\"] = 0] = \"Red\";\n    Color[Color[\"Green\"] = 5] = \"Green\";\n    Color[Color[\"Blue\"] = 6] = \"Blue\";\n    Color[\"Name\"] = 'n';\n})(Color || (Color = {}));\n"
        );
    }

    #[test]
    fn test_raw_continuation_lines_follow_indent() {
        let stmts = vec![Stmt::If {
            test: Expr::ident("a"),
            cons: Box::new(Stmt::Block(vec![Stmt::Expr(Expr::call(
                Expr::ident("f"),
                vec![Expr::raw("() => {\n}")],
            ))])),
            alt: None,
            pos: Pos::default(),
        }];
        assert_eq!(print_stmts(&stmts), "if (a) {\n    f(() => {\n    });\n}\n");
    }

    #[test]
    fn test_interfaces_print_nothing() {
        assert_eq!(roundtrip("interface A { x: number }\nlet b = 2\n"), "let b = 2;\n");
    }
}
