//! `@Builder` functions, builder invocations and attribute arguments
//!
//! Global builders are observed through the caller (`parent`), so their
//! parameters are captured once and re-bound in every creation closure.
//! Builder references passed to attributes are wrapped as
//! `{ builder: ... }` objects bound to the calling component, and `$$`/`!!`
//! bindings expand into a value plus a change callback.

use crate::ast::*;
use crate::control_flow::{arrow_fn, const_decl};
use crate::decorator::WrapperKind;
use crate::render::Lowerer;
use crate::transform::{attribute_chain, extend_target};

/// `$$this.x` and `$$x` with the prefix removed. A bare `$$` is a builder
/// parameter, not a binding.
pub fn strip_dollar(expr: &Expr) -> Option<Expr> {
    match expr {
        Expr::Ident(name) if name.len() > 2 && name.starts_with("$$") => {
            let rest = &name[2..];
            Some(if rest == "this" { Expr::This } else { Expr::ident(rest) })
        }
        Expr::Member {
            object,
            property,
            optional,
        } => Some(Expr::Member {
            object: Box::new(strip_dollar(object)?),
            property: property.clone(),
            optional: *optional,
        }),
        Expr::Index {
            object,
            index,
            optional,
        } => Some(Expr::Index {
            object: Box::new(strip_dollar(object)?),
            index: index.clone(),
            optional: *optional,
        }),
        _ => None,
    }
}

/// `newValue => { target = newValue; }`
fn change_callback(target: &Expr) -> Expr {
    arrow_fn(
        vec![Param::simple("newValue")],
        vec![Stmt::Expr(Expr::Assign {
            op: "=".into(),
            target: Box::new(target.clone()),
            value: Box::new(Expr::ident("newValue")),
        })],
        false,
    )
}

/// `{ value: target, <event>: newValue => { target = newValue; } }`
fn binding_object(target: &Expr, event: &str) -> Expr {
    Expr::Object {
        props: vec![
            ObjectProp::KeyValue {
                key: PropKey::Ident("value".into()),
                value: target.clone(),
            },
            ObjectProp::KeyValue {
                key: PropKey::Ident(event.into()),
                value: change_callback(target),
            },
        ],
        multiline: false,
    }
}

/// `{ builder: value }`
fn builder_object(value: Expr) -> Expr {
    Expr::Object {
        props: vec![ObjectProp::KeyValue {
            key: PropKey::Ident("builder".into()),
            value,
        }],
        multiline: false,
    }
}

fn bind_this(target: Expr) -> Expr {
    Expr::method_call(target, "bind", vec![Expr::This])
}

impl<'a> Lowerer<'a> {
    /// Expands `$$` and `!!` bindings inside create arguments and objects.
    pub fn rewrite_bindings(&self, expr: &Expr) -> Expr {
        if let Expr::TwoWay(inner) = expr {
            return binding_object(inner, "$value");
        }
        if let Some(target) = strip_dollar(expr) {
            return binding_object(&target, "changeEvent");
        }
        match expr {
            Expr::Object { props, multiline } => Expr::Object {
                props: props
                    .iter()
                    .map(|prop| match prop {
                        ObjectProp::KeyValue { key, value } => ObjectProp::KeyValue {
                            key: key.clone(),
                            value: self.rewrite_bindings(value),
                        },
                        other => other.clone(),
                    })
                    .collect(),
                multiline: *multiline,
            },
            other => other.clone(),
        }
    }

    /// Arguments of one chained attribute call.
    pub fn lower_attr_args(&mut self, name: &str, args: &[Expr]) -> Vec<Expr> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            if let Expr::TwoWay(inner) = arg {
                out.push(binding_object(inner, "$value"));
                continue;
            }
            if let Some(target) = strip_dollar(arg) {
                if self.tables.uses_object_binding(name) {
                    out.push(binding_object(&target, "changeEvent"));
                } else {
                    out.push(target.clone());
                    out.push(change_callback(&target));
                }
                continue;
            }
            let arg = if self.tables.takes_builder(name) {
                self.builder_value(arg)
            } else {
                arg.clone()
            };
            out.push(self.rewrite_bindings(&arg));
        }
        out
    }

    /// A builder method, `@BuilderParam` or global builder named by `expr`.
    fn builder_ref(&self, expr: &Expr) -> Option<Expr> {
        if let Expr::Ident(name) = expr {
            return self.registry.builders.contains_key(name).then(|| expr.clone());
        }
        let name = expr.as_this_member()?;
        let component = self.component()?;
        let is_builder = component.builder_methods.contains_key(name)
            || component
                .field(name)
                .map_or(false, |f| matches!(f.kind, WrapperKind::BuilderParam));
        is_builder.then(|| expr.clone())
    }

    /// Rewrites a builder-valued attribute argument.
    fn builder_value(&mut self, expr: &Expr) -> Expr {
        match expr {
            Expr::Paren(inner) => Expr::Paren(Box::new(self.builder_value(inner))),
            Expr::Conditional { test, cons, alt } => Expr::Conditional {
                test: test.clone(),
                cons: Box::new(self.builder_value(cons)),
                alt: Box::new(self.builder_value(alt)),
            },
            Expr::Object { props, multiline } => {
                let props = props
                    .iter()
                    .map(|prop| match prop {
                        ObjectProp::KeyValue { key, value } if key.name() == "builder" => ObjectProp::KeyValue {
                            key: key.clone(),
                            value: self.builder_value(value),
                        },
                        other => other.clone(),
                    })
                    .collect();
                Expr::Object {
                    props,
                    multiline: *multiline,
                }
            }
            Expr::Call {
                callee, args, pos, ..
            } => {
                if let Some(target) = self.builder_ref(callee) {
                    let mut call_args = vec![Expr::This];
                    call_args.extend(args.iter().cloned());
                    let call = Expr::method_call(target, "call", call_args);
                    return builder_object(Expr::arrow(&[], vec![Stmt::Expr(call)]));
                }
                if let Some(name) = callee.as_ident() {
                    if self.registry.components.contains_key(name) {
                        self.error(*pos, format!("component '{}' cannot be used as a builder", name));
                    }
                }
                expr.clone()
            }
            other => match self.builder_ref(other) {
                Some(target) => builder_object(bind_this(target)),
                None => other.clone(),
            },
        }
    }

    /// `name.bind(this)(args)` for a global builder.
    pub fn invoke_global_builder(&self, name: &str, args: &[Expr]) -> Stmt {
        let proxy = self.registry.builders.get(name).copied().unwrap_or(false);
        Stmt::Expr(builder_call(Expr::ident(name), name, args, proxy))
    }

    /// `this.name.bind(this)(args)` for a builder method.
    pub fn invoke_method_builder(&self, name: &str, args: &[Expr]) -> Stmt {
        let proxy = self
            .component()
            .and_then(|c| c.builder_methods.get(name).copied())
            .unwrap_or(false);
        Stmt::Expr(builder_call(Expr::this_member(name), name, args, proxy))
    }

    fn builder_params(&self, params: &[Param]) -> Vec<Param> {
        let mut params = params.to_vec();
        if self.partial() {
            let mut parent = Param::simple("parent");
            parent.default = Some(Expr::ident("null"));
            params.push(parent);
        }
        params
    }

    /// A global `@Builder` function.
    pub fn lower_builder_function(&mut self, decl: &FunctionDecl) -> FunctionDecl {
        let partial = self.partial();
        let captured: Vec<String> = if partial {
            decl.func
                .params
                .iter()
                .filter_map(|p| p.name())
                .map(str::to_string)
                .collect()
        } else {
            Vec::new()
        };
        let lowered = self.with_scope(
            |scope| {
                scope.component = None;
                scope.global_builder = partial;
                scope.in_branch = false;
                scope.captured = captured.clone();
            },
            |lowerer| lowerer.lower_stmts(&decl.func.body),
        );

        let mut body: Vec<Stmt> = captured
            .iter()
            .map(|name| const_decl(&format!("__{}__", name), Expr::ident(name)))
            .collect();
        body.extend(lowered);
        FunctionDecl {
            name: decl.name.clone(),
            decorators: Vec::new(),
            func: Function {
                params: self.builder_params(&decl.func.params),
                body,
                is_async: decl.func.is_async,
                is_generator: decl.func.is_generator,
            },
            export: decl.export,
            pos: decl.pos,
        }
    }

    /// A `@Builder` method of `component`.
    pub fn lower_builder_method(&mut self, method: &MethodDecl, component: &str) -> MethodDecl {
        let body = self.with_scope(
            |scope| {
                scope.component = Some(component.to_string());
                scope.global_builder = false;
                scope.in_branch = false;
                scope.captured.clear();
            },
            |lowerer| lowerer.lower_stmts(&method.func.body),
        );
        MethodDecl {
            key: method.key.clone(),
            decorators: Vec::new(),
            kind: method.kind,
            func: Function {
                params: self.builder_params(&method.func.params),
                body,
                is_async: method.func.is_async,
                is_generator: method.func.is_generator,
            },
            is_static: method.is_static,
            pos: method.pos,
        }
    }

    /// `@Extend(T) function f(params) { .a(x) }` becomes
    /// `function __T__f(params) { T.a(x); }`.
    pub fn lower_extend_function(&mut self, decl: &FunctionDecl) -> Option<FunctionDecl> {
        let target = extend_target(decl)?;
        if !self.tables.is_builtin(&target) {
            self.error(decl.pos, format!("@Extend target '{}' is not a built-in component", target));
            return None;
        }
        let chain: Vec<_> = attribute_chain(&decl.func.body)
            .into_iter()
            .map(|(name, args)| crate::render::Attr { name, args })
            .collect();
        let mut body = Vec::new();
        self.with_scope(
            |scope| scope.component = None,
            |lowerer| lowerer.lower_attrs(&target, &chain, &mut body),
        );
        Some(FunctionDecl {
            name: format!("__{}__{}", target, decl.name),
            decorators: Vec::new(),
            func: Function {
                params: decl.func.params.clone(),
                body,
                is_async: false,
                is_generator: false,
            },
            export: decl.export,
            pos: decl.pos,
        })
    }
}

/// `target.bind(this)(args)`, or the parameter-proxy form for a builder
/// taking a single `$$` object.
fn builder_call(target: Expr, name: &str, args: &[Expr], proxy: bool) -> Expr {
    let args = match args {
        [Expr::Object { props, .. }] if proxy => vec![parameter_proxy(name, props)],
        _ => args.to_vec(),
    };
    Expr::call(bind_this(target), args)
}

/// `makeBuilderParameterProxy("name", { p: () => value })`. State fields are
/// read through their backing property so the builder observes them.
fn parameter_proxy(name: &str, props: &[ObjectProp]) -> Expr {
    let getters = props
        .iter()
        .map(|prop| match prop {
            ObjectProp::KeyValue { key, value } => ObjectProp::KeyValue {
                key: key.clone(),
                value: getter(value),
            },
            ObjectProp::Shorthand(field) => ObjectProp::KeyValue {
                key: PropKey::Ident(field.clone()),
                value: getter(&Expr::ident(field)),
            },
            other => other.clone(),
        })
        .collect();
    Expr::call(
        Expr::ident("makeBuilderParameterProxy"),
        vec![
            Expr::string(name),
            Expr::Object {
                props: getters,
                multiline: false,
            },
        ],
    )
}

fn getter(value: &Expr) -> Expr {
    match value.as_this_member() {
        Some(field) => Expr::raw(format!(
            "() => (this[\"__{f}\"] ? this[\"__{f}\"] : this[\"{f}\"])",
            f = field
        )),
        None => Expr::Arrow(Box::new(ArrowFn {
            params: Vec::new(),
            body: ArrowBody::Expr(Box::new(value.clone())),
            is_async: false,
            parens: true,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Diagnostics;
    use crate::parser::parse_source;
    use crate::printer::{print_program, print_stmts};
    use crate::tables::ComponentTables;
    use crate::transform::{Registry, RenderMode, TransformOptions};

    fn build_of(program: &Program, component: &str) -> Vec<Stmt> {
        program
            .items
            .iter()
            .find_map(|item| match item {
                Item::Struct(decl) if decl.name == component => decl.members.iter().find_map(|m| match m {
                    ClassMember::Method(m) if m.name() == "build" => Some(m.func.body.clone()),
                    _ => None,
                }),
                _ => None,
            })
            .unwrap()
    }

    fn lower_build(source: &str) -> (String, Diagnostics) {
        let program = parse_source(source, "test.ets").unwrap();
        let registry = Registry::collect(&program, "test.ets");
        let tables = ComponentTables::standard();
        let options = TransformOptions::default();
        let mut lowerer = Lowerer::new(&tables, &registry, &options, "test.ets");
        lowerer.scope.component = Some("Index".into());
        let out = lowerer.lower_stmts(&build_of(&program, "Index"));
        (print_stmts(&out), lowerer.finish())
    }

    fn lower_functions(source: &str, mode: RenderMode) -> String {
        let program = parse_source(source, "test.ets").unwrap();
        let registry = Registry::collect(&program, "test.ets");
        let tables = ComponentTables::standard();
        let options = TransformOptions {
            mode,
            ..TransformOptions::default()
        };
        let mut lowerer = Lowerer::new(&tables, &registry, &options, "test.ets");
        let mut items = Vec::new();
        for item in &program.items {
            if let Item::Function(decl) = item {
                if decl.has_decorator("Builder") {
                    items.push(Item::Function(lowerer.lower_builder_function(decl)));
                } else if let Some(f) = lowerer.lower_extend_function(decl) {
                    items.push(Item::Function(f));
                }
            }
        }
        print_program(&Program { items })
    }

    #[test]
    fn test_strip_dollar() {
        let stripped = strip_dollar(&Expr::member(Expr::ident("$$this"), "value")).unwrap();
        assert!(matches!(stripped.as_this_member(), Some("value")));
        assert!(strip_dollar(&Expr::member(Expr::ident("$$"), "value")).is_none());
        assert!(matches!(strip_dollar(&Expr::ident("$$count")), Some(Expr::Ident(ref n)) if n == "count"));
    }

    #[test]
    fn test_global_builder_captures_parameters() {
        let out = lower_functions("@Builder function item(value: string) {\n  Text(value)\n}\n", RenderMode::Partial);
        assert_eq!(
            out,
            "function item(value, parent = null) {\n    const __value__ = value;\n    \
             (parent ? parent : this).observeComponentCreation2((elmtId, isInitialRender, value = __value__) => {\n        \
             Text.create(value);\n    }, Text);\n    Text.pop();\n}\n"
        );
    }

    #[test]
    fn test_empty_builder() {
        let out = lower_functions("@Builder function commonBuilder() {\n}\n", RenderMode::Partial);
        assert_eq!(out, "function commonBuilder(parent = null) { }\n");
    }

    #[test]
    fn test_full_mode_builder_has_no_parent() {
        let out = lower_functions("@Builder function item(value: string) {\n  Text(value)\n}\n", RenderMode::Full);
        assert!(out.starts_with("function item(value) {\n    Text.create(value);"));
    }

    #[test]
    fn test_extend_function() {
        let out = lower_functions(
            "@Extend(Text) function big(size: number) {\n  .fontSize(size)\n  .fontColor(Color.Red)\n}\n",
            RenderMode::Partial,
        );
        assert_eq!(
            out,
            "function __Text__big(size) {\n    Text.fontSize(size);\n    Text.fontColor(Color.Red);\n}\n"
        );
    }

    #[test]
    fn test_builder_invocations() {
        let (out, diags) = lower_build(
            "@Builder function item(v: string) {\n  Text(v)\n}\n@Component struct Index {\n  @Builder inner() {\n    Divider()\n  }\n  build() {\n    Column() {\n      this.inner()\n      item('a')\n    }\n  }\n}\n",
        );
        assert!(diags.is_empty());
        assert!(out.contains("this.inner.bind(this)();"));
        assert!(out.contains("item.bind(this)('a');"));
    }

    #[test]
    fn test_parameter_proxy() {
        let (out, _) = lower_build(
            "@Builder function comp($$: { vis: boolean }) {\n  Text('x')\n}\n@Component struct Index {\n  @State vis: boolean = true\n  build() {\n    Column() {\n      comp({ vis: this.vis })\n    }\n  }\n}\n",
        );
        assert!(out.contains(
            "comp.bind(this)(makeBuilderParameterProxy(\"comp\", { vis: () => (this[\"__vis\"] ? this[\"__vis\"] : this[\"vis\"]) }));"
        ));
    }

    #[test]
    fn test_builder_attribute_arguments() {
        let (out, _) = lower_build(
            "@Builder function global() {\n  Text('g')\n}\n@Component struct Index {\n  @State judge: boolean = true\n  @Builder inner(s: string) {\n    Text(s)\n  }\n  build() {\n    Row() {\n    }\n    .bindMenu(this.inner('111'))\n    .bindContextMenu(this.judge ? global : undefined, ResponseType.RightClick)\n    .bindPopup(false, { builder: global() })\n  }\n}\n",
        );
        assert!(out.contains("Row.bindMenu({ builder: () => {"));
        assert!(out.contains("this.inner.call(this, '111');"));
        assert!(out.contains(
            "Row.bindContextMenu(this.judge ? { builder: global.bind(this) } : undefined, ResponseType.RightClick);"
        ));
        assert!(out.contains("builder: { builder: () => {"));
        assert!(out.contains("global.call(this);"));
    }

    #[test]
    fn test_builder_reference_is_bound() {
        let (out, _) = lower_build(
            "@Component struct Index {\n  @Builder menu() {\n    Text('m')\n  }\n  build() {\n    Text('a').bindMenu(this.menu)\n  }\n}\n",
        );
        assert!(out.contains("Text.bindMenu({ builder: this.menu.bind(this) });"));
    }

    #[test]
    fn test_dollar_bindings() {
        let (out, _) = lower_build(
            "@Component struct Index {\n  @State on: boolean = false\n  @State show: boolean = false\n  build() {\n    Column() {\n      Radio({ value: 'a', group: 'g' }).checked($$this.on)\n      Text('t').bindSheet($$this.show, undefined)\n      Toggle({ type: ToggleType.Switch, isOn: this.on!! })\n    }\n  }\n}\n",
        );
        assert!(out.contains("Radio.checked(this.on, newValue => {\n        this.on = newValue;\n    });"));
        assert!(out.contains("Text.bindSheet({ value: this.show, changeEvent: newValue => {"));
        assert!(out.contains("isOn: { value: this.on, $value: newValue => {"));
    }

    #[test]
    fn test_component_as_builder_is_rejected() {
        let (_, diags) = lower_build(
            "@Component struct Child {\n  build() {\n    Text('c')\n  }\n}\n@Component struct Index {\n  build() {\n    Text('a').bindMenu(Child())\n  }\n}\n",
        );
        assert!(diags.has_errors());
        assert!(diags
            .iter()
            .any(|d| d.message.contains("component 'Child' cannot be used as a builder")));
    }
}
