//! Render tree lowering
//!
//! Rewrites the declarative statements of `build()` and `@Builder` bodies into
//! imperative element construction. Each built-in element call becomes a
//! `create` call followed by one call per chained attribute, wrapped (in
//! partial-update mode) in an observe-creation closure, then its lowered
//! children and a closing `pop()`. Control flow, custom components and
//! builder invocations are dispatched to their own modules.

use crate::ast::*;
use crate::decorator::{ComponentFlavor, WrapperKind};
use crate::error::Diagnostics;
use crate::printer::print_expr;
use crate::tables::ComponentTables;
use crate::transform::{ComponentSummary, Registry, RenderMode, TransformOptions};

/// One chained attribute call: `.name(args)`.
#[derive(Debug, Clone)]
pub struct Attr {
    pub name: String,
    pub args: Vec<Expr>,
}

/// Where the lowering currently is.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Struct whose `build` or builder method is being lowered.
    pub component: Option<String>,
    /// Inside a global `@Builder` function, observed through the caller.
    pub global_builder: bool,
    /// Inside an `if` branch.
    pub in_branch: bool,
    /// Builder parameters re-bound in every observe closure (`value = __value__`).
    pub captured: Vec<String>,
    /// `@Styles` groups being expanded; guards against self-reference.
    styles_stack: Vec<String>,
}

pub struct Lowerer<'a> {
    pub tables: &'a ComponentTables,
    pub registry: &'a Registry,
    pub options: &'a TransformOptions,
    pub file: &'a str,
    pub diags: Diagnostics,
    pub scope: Scope,
    next_id: usize,
}

/// Splits `Type(args){...}.a(x).b(y)` into the base call and its attribute chain.
/// Returns `None` unless the innermost callee is a bare identifier.
pub fn split_chain(expr: &Expr) -> Option<(&Expr, Vec<Attr>)> {
    let mut chain = Vec::new();
    let mut current = expr;
    loop {
        match current {
            Expr::Call { callee, .. } if matches!(**callee, Expr::Ident(_)) => {
                chain.reverse();
                return Some((current, chain));
            }
            Expr::Call { callee, args, .. } => match &**callee {
                Expr::Member { object, property, .. } => {
                    chain.push(Attr {
                        name: property.clone(),
                        args: args.clone(),
                    });
                    current = object;
                }
                _ => return None,
            },
            _ => return None,
        }
    }
}

impl<'a> Lowerer<'a> {
    pub fn new(
        tables: &'a ComponentTables,
        registry: &'a Registry,
        options: &'a TransformOptions,
        file: &'a str,
    ) -> Self {
        let next_id = match options.mode {
            RenderMode::Partial => 0,
            // "1" belongs to the root component
            RenderMode::Full => 1,
        };
        Self {
            tables,
            registry,
            options,
            file,
            diags: Diagnostics::new(),
            scope: Scope::default(),
            next_id,
        }
    }

    pub fn finish(self) -> Diagnostics {
        self.diags
    }

    pub fn partial(&self) -> bool {
        self.options.mode == RenderMode::Partial
    }

    /// Synthetic element id for full-mode elements and lazy lists.
    pub fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    /// Receiver of observe-creation calls.
    pub fn driver(&self) -> Expr {
        if self.scope.global_builder {
            Expr::raw("(parent ? parent : this)")
        } else {
            Expr::This
        }
    }

    pub fn component(&self) -> Option<&'a ComponentSummary> {
        let name = self.scope.component.as_ref()?;
        self.registry.components.get(name)
    }

    pub fn error(&mut self, pos: Pos, message: impl Into<String>) {
        self.diags.error(self.file, pos.line, pos.column, message);
    }

    /// `(elmtId, isInitialRender) => { body }` with captured builder parameters.
    pub fn creation_closure(&self, body: Vec<Stmt>) -> Expr {
        let mut params = vec![Param::simple("elmtId"), Param::simple("isInitialRender")];
        for name in &self.scope.captured {
            let mut param = Param::simple(name);
            param.default = Some(Expr::Ident(format!("__{}__", name)));
            params.push(param);
        }
        Expr::Arrow(Box::new(ArrowFn {
            params,
            body: ArrowBody::Block(body),
            is_async: false,
            parens: true,
        }))
    }

    /// `driver.observeComponentCreation2((elmtId, isInitialRender) => { body }, target);`
    pub fn observe(&self, body: Vec<Stmt>, target: Expr) -> Stmt {
        Stmt::Expr(Expr::method_call(
            self.driver(),
            "observeComponentCreation2",
            vec![self.creation_closure(body), target],
        ))
    }

    /// Runs `f` with a modified scope and restores the previous one.
    pub fn with_scope<T>(&mut self, update: impl FnOnce(&mut Scope), f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.scope.clone();
        update(&mut self.scope);
        let result = f(self);
        self.scope = saved;
        result
    }

    /// Lowers a `build` (or builder) statement list.
    pub fn lower_stmts(&mut self, stmts: &[Stmt]) -> Vec<Stmt> {
        let mut out = Vec::new();
        for stmt in stmts {
            self.lower_stmt(stmt, &mut out);
        }
        out
    }

    fn lower_stmt(&mut self, stmt: &Stmt, out: &mut Vec<Stmt>) {
        match stmt {
            Stmt::Expr(expr) => self.lower_expr_stmt(expr, out),
            Stmt::If { .. } => self.lower_if(stmt, out),
            Stmt::Block(stmts) => {
                let inner = self.lower_stmts(stmts);
                out.push(Stmt::Block(inner));
            }
            other => out.push(other.clone()),
        }
    }

    fn lower_expr_stmt(&mut self, expr: &Expr, out: &mut Vec<Stmt>) {
        if let Some(stmt) = self.lower_this_call(expr) {
            out.push(stmt);
            return;
        }
        let (base, chain) = match split_chain(expr) {
            Some(split) => split,
            None => {
                out.push(Stmt::Expr(expr.clone()));
                return;
            }
        };
        let (name, args, trailing, pos) = match base {
            Expr::Call {
                callee,
                args,
                trailing,
                pos,
                ..
            } => match callee.as_ident() {
                Some(name) => (name, args, trailing.as_deref(), *pos),
                None => {
                    out.push(Stmt::Expr(expr.clone()));
                    return;
                }
            },
            _ => {
                out.push(Stmt::Expr(expr.clone()));
                return;
            }
        };
        match name {
            "ForEach" => self.lower_for_each(args, &chain, pos, out),
            "LazyForEach" => self.lower_lazy_for_each(args, &chain, pos, out),
            "Repeat" => self.lower_repeat(args, &chain, pos, out),
            _ if self.tables.is_builtin(name) => self.lower_element(name, args, trailing, &chain, out),
            _ if self.registry.builders.contains_key(name) && chain.is_empty() => {
                out.push(self.invoke_global_builder(name, args));
            }
            _ if self.is_custom_component(name) => {
                self.lower_custom_component(name, args, trailing, &chain, pos, out)
            }
            _ => out.push(Stmt::Expr(expr.clone())),
        }
    }

    /// `this.builder(args)` and `this.builderParam(args)` statements.
    fn lower_this_call(&mut self, expr: &Expr) -> Option<Stmt> {
        let (callee, args) = match expr {
            Expr::Call { callee, args, .. } => (callee, args),
            _ => return None,
        };
        let name = callee.as_this_member()?;
        let component = self.component()?;
        if component.builder_methods.contains_key(name) {
            return Some(self.invoke_method_builder(name, args));
        }
        let is_builder_param = component
            .field(name)
            .map_or(false, |f| matches!(f.kind, WrapperKind::BuilderParam));
        is_builder_param.then(|| {
            Stmt::Expr(Expr::call(
                Expr::method_call(Expr::this_member(name), "bind", vec![Expr::This]),
                args.clone(),
            ))
        })
    }

    /// Local structs, and capitalized callees that are neither built-ins nor
    /// known functions (imported components).
    pub fn is_custom_component(&self, name: &str) -> bool {
        if self.registry.components.contains_key(name) {
            return true;
        }
        name.chars().next().map_or(false, char::is_uppercase)
            && !self.registry.functions.contains(name)
            && !self.registry.builders.contains_key(name)
    }

    /// A built-in element with its attributes and children.
    pub fn lower_element(
        &mut self,
        name: &str,
        args: &[Expr],
        children: Option<&[Stmt]>,
        chain: &[Attr],
        out: &mut Vec<Stmt>,
    ) {
        let mut create_args: Vec<Expr> = args.iter().map(|a| self.rewrite_bindings(a)).collect();
        let create = if name == "Button" {
            if children.is_some() || args.is_empty() {
                "createWithChild"
            } else {
                "createWithLabel"
            }
        } else {
            "create"
        };
        let content_closure = self.partial() && self.tables.has_content_closure(name);
        let mut lowered_children = Vec::new();
        if let Some(children) = children {
            let lowered = self.lower_stmts(children);
            if content_closure {
                create_args.insert(0, Expr::arrow(&[], lowered));
            } else {
                lowered_children = lowered;
            }
        }

        let target = Expr::ident(name);
        let mut body = vec![Stmt::Expr(Expr::method_call(target.clone(), create, create_args))];
        self.lower_attrs(name, chain, &mut body);

        let mut stmts = Vec::new();
        if self.partial() {
            stmts.push(self.observe(body, target.clone()));
        } else {
            stmts.extend(body);
        }
        stmts.extend(lowered_children);
        if !self.tables.is_leaf(name) || children.is_some() {
            stmts.push(Stmt::Expr(Expr::method_call(target, "pop", Vec::new())));
        }

        match chain.iter().find(|a| a.name == "id") {
            Some(id) if self.partial() && self.scope.in_branch => {
                let id = id.args.first().map(print_expr).unwrap_or_default();
                out.push(Stmt::if_then(Expr::raw(format!("!If.canRetake({})", id)), stmts));
            }
            _ => out.extend(stmts),
        }
    }

    /// Attribute calls against `target`, with `@Styles` groups inlined,
    /// `@Extend` functions called and `.animation` routed through `Context`.
    pub fn lower_attrs(&mut self, target: &str, chain: &[Attr], out: &mut Vec<Stmt>) {
        let mut animated = false;
        let mut after_animation = false;
        for attr in chain {
            if attr.name == "animation" {
                out.push(Stmt::Expr(Expr::method_call(
                    Expr::ident("Context"),
                    "animation",
                    attr.args.clone(),
                )));
                animated = true;
                after_animation = false;
                continue;
            }
            after_animation = true;
            if attr.args.is_empty() {
                if let Some(group) = self.styles_group(&attr.name) {
                    if self.scope.styles_stack.contains(&attr.name) {
                        self.diags.error(
                            self.file,
                            0,
                            0,
                            format!("@Styles '{}' refers to itself", attr.name),
                        );
                        continue;
                    }
                    self.scope.styles_stack.push(attr.name.clone());
                    self.lower_attrs(target, &group, out);
                    self.scope.styles_stack.pop();
                    continue;
                }
            }
            if self
                .registry
                .extends
                .contains(&(target.to_string(), attr.name.clone()))
            {
                let args = attr.args.iter().map(|a| self.rewrite_bindings(a)).collect();
                out.push(Stmt::Expr(Expr::call(
                    Expr::Ident(format!("__{}__{}", target, attr.name)),
                    args,
                )));
                continue;
            }
            let args = self.lower_attr_args(&attr.name, &attr.args);
            out.push(Stmt::Expr(Expr::method_call(Expr::ident(target), &attr.name, args)));
        }
        if animated && after_animation {
            out.push(Stmt::raw("Context.animation(null)"));
        }
    }

    /// Attribute list of a `@Styles` method of the current struct or a global one.
    fn styles_group(&self, name: &str) -> Option<Vec<Attr>> {
        let chain = self
            .component()
            .and_then(|c| c.styles.get(name))
            .or_else(|| self.registry.styles.get(name))?;
        Some(
            chain
                .iter()
                .map(|(name, args)| Attr {
                    name: name.clone(),
                    args: args.clone(),
                })
                .collect(),
        )
    }

    pub fn flavor(&self) -> ComponentFlavor {
        self.component().map_or(ComponentFlavor::V1, |c| c.flavor)
    }
}
