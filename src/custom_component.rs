//! Custom component instantiation
//!
//! A call to a user struct inside a render body becomes a create-or-update
//! block: the child is constructed on initial render and afterwards only the
//! parameters it re-reads from its parent are pushed again.

use crate::ast::*;
use crate::builder::strip_dollar;
use crate::control_flow::arrow_fn;
use crate::decorator::{ComponentFlavor, WrapperKind};
use crate::printer::print_expr;
use crate::render::{Attr, Lowerer};
use crate::transform::{file_stem, ComponentSummary};
use std::path::Path;

/// One constructor parameter after routing.
struct Routed {
    key: String,
    /// Passed to the constructor.
    ctor: Expr,
    /// Re-read by the params lambda and the update path.
    value: Expr,
    /// `$key` change callback of a `!!` parameter.
    callback: Option<Expr>,
    update: bool,
}

fn let_decl(name: &str, init: Expr) -> Stmt {
    Stmt::Var(VarDecl {
        kind: VarKind::Let,
        decls: vec![VarDeclarator {
            pattern: Pattern::Ident(name.to_string()),
            init: Some(init),
        }],
    })
}

fn if_else(test: Expr, cons: Vec<Stmt>, alt: Vec<Stmt>) -> Stmt {
    Stmt::If {
        test,
        cons: Box::new(Stmt::Block(cons)),
        alt: Some(Box::new(Stmt::Block(alt))),
        pos: Pos::default(),
    }
}

fn object(props: Vec<(String, Expr)>, multiline: bool) -> Expr {
    Expr::Object {
        props: props
            .into_iter()
            .map(|(key, value)| ObjectProp::KeyValue {
                key: PropKey::Ident(key),
                value,
            })
            .collect(),
        multiline,
    }
}

/// `$name` (single dollar) refers to the parent's wrapper of `name`.
fn dollar_field(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Ident(name) if name.len() > 1 && name.starts_with('$') && !name.starts_with("$$") => Some(&name[1..]),
        _ => None,
    }
}

fn backing(field: &str) -> Expr {
    Expr::this_member(&format!("__{}", field))
}

impl<'a> Lowerer<'a> {
    fn parent_arg(&self) -> Expr {
        if self.scope.global_builder {
            Expr::raw("parent ? parent : this")
        } else {
            Expr::This
        }
    }

    fn route(&self, child: Option<&ComponentSummary>, key: &str, value: &Expr) -> Routed {
        let field = child.and_then(|c| c.field(key));
        let update = match (child, field) {
            (None, _) => true,
            (Some(_), Some(field)) => {
                field.kind.updates_from_parent() || matches!(field.kind, WrapperKind::Plain)
            }
            (Some(_), None) => false,
        };
        let two_way = field.map_or(false, |f| f.kind.is_two_way());

        if let Some(name) = dollar_field(value) {
            return Routed {
                key: key.to_string(),
                ctor: backing(name),
                value: Expr::this_member(name),
                callback: None,
                update,
            };
        }
        if let Expr::TwoWay(inner) = value {
            let inner = (**inner).clone();
            if two_way {
                if let Some(name) = inner.as_this_member() {
                    return Routed {
                        key: key.to_string(),
                        ctor: backing(name),
                        value: inner.clone(),
                        callback: None,
                        update,
                    };
                }
            }
            let callback = arrow_fn(
                vec![Param::simple("value")],
                vec![Stmt::Expr(Expr::Assign {
                    op: "=".into(),
                    target: Box::new(inner.clone()),
                    value: Box::new(Expr::ident("value")),
                })],
                false,
            );
            return Routed {
                key: key.to_string(),
                ctor: inner.clone(),
                value: inner,
                callback: Some(callback),
                update,
            };
        }
        let ctor = match value.as_this_member() {
            Some(name) if two_way => backing(name),
            _ => self.rewrite_bindings(value),
        };
        let value = strip_dollar(value).unwrap_or_else(|| value.clone());
        Routed {
            key: key.to_string(),
            ctor,
            value,
            callback: None,
            update,
        }
    }

    /// `Child({ ... })` with an optional trailing closure and attribute chain.
    pub fn lower_custom_component(
        &mut self,
        name: &str,
        args: &[Expr],
        trailing: Option<&[Stmt]>,
        chain: &[Attr],
        pos: Pos,
        out: &mut Vec<Stmt>,
    ) {
        let child = self.registry.components.get(name);
        let flavor = child.map_or(ComponentFlavor::V1, |c| c.flavor);
        if !self.partial() && flavor == ComponentFlavor::V2 {
            self.error(pos, format!("@ComponentV2 '{}' is not supported in full render mode", name));
            return;
        }

        let mut routed = Vec::new();
        let mut source_multiline = false;
        match args.first().map(Expr::unparen) {
            Some(Expr::Object { props, multiline }) => {
                source_multiline = *multiline;
                for prop in props {
                    match prop {
                        ObjectProp::KeyValue { key, value } => routed.push(self.route(child, &key.name(), value)),
                        ObjectProp::Shorthand(field) => {
                            routed.push(self.route(child, field, &Expr::ident(field)))
                        }
                        _ => {}
                    }
                }
            }
            Some(other) => {
                self.error(pos, format!("parameters of '{}' must be an object literal, found '{}'", name, print_expr(other)));
                return;
            }
            None => {}
        }

        if let Some(body) = trailing {
            match child.map(|c| c.single_builder_param()) {
                Some(Some(param)) => {
                    let lowered = self.lower_stmts(body);
                    let closure = Expr::arrow(&[], lowered);
                    routed.push(Routed {
                        key: param.to_string(),
                        ctor: closure.clone(),
                        value: closure,
                        callback: None,
                        update: false,
                    });
                }
                _ => self.error(
                    pos,
                    format!(
                        "'{}' takes a trailing closure but does not declare exactly one @BuilderParam",
                        name
                    ),
                ),
            }
        }

        if let Some(child) = child {
            for field in child.fields.iter().filter(|f| f.require) {
                if !routed.iter().any(|r| r.key == field.name) {
                    self.error(
                        pos,
                        format!("property '{}' of '{}' is @Require and must be initialized", field.name, name),
                    );
                }
            }
        }

        let attrs: Vec<Attr> = chain.iter().filter(|a| a.name != "reuseId").cloned().collect();
        let reuse_id = chain
            .iter()
            .find(|a| a.name == "reuseId")
            .and_then(|a| a.args.first().cloned());

        if !attrs.is_empty() {
            let mut body = vec![Stmt::raw("__Common__.create()")];
            self.lower_attrs("__Common__", &attrs, &mut body);
            if self.partial() {
                out.push(self.observe(body, Expr::ident("__Common__")));
            } else {
                out.extend(body);
            }
        }

        let storage = args.get(1).cloned().unwrap_or_else(|| Expr::ident("undefined"));
        let reusable = child.map_or(false, |c| c.reusable);
        if !self.partial() {
            self.full_mode_child(name, &routed, out);
        } else if reusable {
            let reuse_id = reuse_id.unwrap_or_else(|| Expr::string(name));
            self.recycled_child(name, &routed, storage, reuse_id, pos, out);
        } else {
            self.partial_child(name, flavor, &routed, storage, source_multiline, pos, out);
        }

        if !attrs.is_empty() {
            out.push(Stmt::raw("__Common__.pop()"));
        }
    }

    fn ctor_object(routed: &[Routed], multiline: bool) -> Expr {
        let mut props = Vec::new();
        let mut has_callback = false;
        for r in routed {
            props.push((r.key.clone(), r.ctor.clone()));
            if let Some(callback) = &r.callback {
                props.push((format!("${}", r.key), callback.clone()));
                has_callback = true;
            }
        }
        object(props, multiline || has_callback)
    }

    fn lambda_object(routed: &[Routed], multiline: bool) -> Expr {
        object(routed.iter().map(|r| (r.key.clone(), r.value.clone())).collect(), multiline)
    }

    fn update_object(routed: &[Routed]) -> Expr {
        object(
            routed
                .iter()
                .filter(|r| r.update)
                .map(|r| (r.key.clone(), r.value.clone()))
                .collect(),
            true,
        )
    }

    fn extra_info(&self, pos: Pos, with_column: bool) -> Option<Expr> {
        if !self.options.emit_source_position {
            return None;
        }
        let page = Path::new(self.file)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_stem(self.file));
        Some(Expr::raw(if with_column {
            format!("{{ page: \"{}\", line: {}, col: {} }}", page, pos.line, pos.column)
        } else {
            format!("{{ page: \"{}\", line: {} }}", page, pos.line)
        }))
    }

    fn params_lambda(routed: &[Routed]) -> Stmt {
        let_decl(
            "paramsLambda",
            Expr::arrow(&[], vec![Stmt::Return(Some(Self::lambda_object(routed, true)))]),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn partial_child(
        &mut self,
        name: &str,
        flavor: ComponentFlavor,
        routed: &[Routed],
        storage: Expr,
        multiline: bool,
        pos: Pos,
        out: &mut Vec<Stmt>,
    ) {
        let driver = self.driver();
        let mut ctor_args = vec![
            self.parent_arg(),
            Self::ctor_object(routed, multiline),
            storage,
            Expr::ident("elmtId"),
            Expr::raw("() => { }"),
        ];
        ctor_args.extend(self.extra_info(pos, true));
        let view = match flavor {
            ComponentFlavor::V1 => "ViewPU",
            ComponentFlavor::V2 => "ViewV2",
        };
        let initial = vec![
            let_decl(
                "componentCall",
                Expr::New {
                    callee: Box::new(Expr::ident(name)),
                    args: Some(ctor_args),
                    pos: Pos::default(),
                },
            ),
            Stmt::Expr(Expr::method_call(
                Expr::ident(view),
                "create",
                vec![Expr::ident("componentCall")],
            )),
            Self::params_lambda(routed),
            Stmt::raw("componentCall.paramsGenerator_ = paramsLambda"),
        ];
        let update = vec![Stmt::Expr(Expr::method_call(
            driver.clone(),
            "updateStateVarsOfChildByElmtId",
            vec![Expr::ident("elmtId"), Self::update_object(routed)],
        ))];
        let body = vec![if_else(Expr::ident("isInitialRender"), initial, update)];
        let observe = Stmt::Expr(Expr::method_call(
            driver,
            "observeComponentCreation2",
            vec![
                self.creation_closure(body),
                Expr::raw(format!("{{ name: \"{}\" }}", name)),
            ],
        ));
        out.push(Stmt::Block(vec![observe]));
    }

    fn recycled_child(
        &mut self,
        name: &str,
        routed: &[Routed],
        storage: Expr,
        reuse_id: Expr,
        pos: Pos,
        out: &mut Vec<Stmt>,
    ) {
        let driver = self.driver();
        out.push(self.observe(vec![Stmt::raw("__Recycle__.create()")], Expr::ident("__Recycle__")));

        let mut ctor_args = vec![
            self.parent_arg(),
            Self::ctor_object(routed, false),
            storage,
            Expr::ident("elmtId"),
            Expr::ident("paramsLambda"),
        ];
        ctor_args.extend(self.extra_info(pos, false));
        let node = Expr::Conditional {
            test: Box::new(Expr::ident("recycleNode")),
            cons: Box::new(Expr::ident("recycleNode")),
            alt: Box::new(Expr::New {
                callee: Box::new(Expr::ident(name)),
                args: Some(ctor_args),
                pos: Pos::default(),
            }),
        };
        let reuse_params = match Self::lambda_object(routed, false) {
            Expr::Object { props, .. } => Expr::Object {
                props,
                multiline: false,
            },
            other => other,
        };
        let reuse = Expr::arrow(
            &[],
            vec![if_else(
                Expr::raw("recycleNode && typeof recycleNode.aboutToReuseInternal === \"function\""),
                vec![Stmt::raw("recycleNode.aboutToReuseInternal()")],
                vec![
                    Stmt::if_then(
                        Expr::raw("recycleNode.aboutToReuse && typeof recycleNode.aboutToReuse === \"function\""),
                        vec![Stmt::Expr(Expr::method_call(
                            Expr::ident("recycleNode"),
                            "aboutToReuse",
                            vec![reuse_params],
                        ))],
                    ),
                    Stmt::raw("recycleNode.rerender()"),
                ],
            )],
        );
        let initial = vec![
            Self::params_lambda(routed),
            Stmt::if_then(
                Expr::ident("recycleNode"),
                vec![Stmt::raw("recycleNode.paramsGenerator_ = paramsLambda")],
            ),
            Stmt::Expr(Expr::method_call(
                Expr::ident("ViewPU"),
                "createRecycle",
                vec![node, Expr::raw("recycleNode !== null"), reuse_id.clone(), reuse],
            )),
        ];
        let update = vec![Stmt::Expr(Expr::method_call(
            driver.clone(),
            "updateStateVarsOfChildByElmtId",
            vec![Expr::ident("elmtId"), Self::update_object(routed)],
        ))];
        let mut params = vec![Param::simple("elmtId"), Param::simple("isInitialRender")];
        let mut recycle_node = Param::simple("recycleNode");
        recycle_node.default = Some(Expr::ident("null"));
        params.push(recycle_node);
        let closure = arrow_fn(
            params,
            vec![
                Stmt::raw("ViewStackProcessor.StartGetAccessRecordingFor(elmtId)"),
                if_else(Expr::ident("isInitialRender"), initial, update),
                Stmt::raw("ViewStackProcessor.StopGetAccessRecording()"),
            ],
            true,
        );
        let observe = Stmt::Expr(Expr::method_call(
            driver,
            "observeRecycleComponentCreation",
            vec![reuse_id, closure],
        ));
        out.push(Stmt::Block(vec![observe]));
        out.push(Stmt::raw("__Recycle__.pop()"));
    }

    fn full_mode_child(&mut self, name: &str, routed: &[Routed], out: &mut Vec<Stmt>) {
        let id = self.next_id();
        let earlier = format!("earlierCreatedChild_{}", id);
        out.push(let_decl(
            &earlier,
            Expr::raw(format!(
                "(this && this.findChildById) ? this.findChildById(\"{}\") : undefined",
                id
            )),
        ));
        let ctor = Expr::New {
            callee: Box::new(Expr::ident(name)),
            args: Some(vec![
                Expr::string(&id),
                Expr::This,
                Self::ctor_object(routed, false),
            ]),
            pos: Pos::default(),
        };
        out.push(if_else(
            Expr::raw(format!("{} == undefined", earlier)),
            vec![Stmt::Expr(Expr::method_call(Expr::ident("View"), "create", vec![ctor]))],
            vec![
                Stmt::Expr(Expr::method_call(
                    Expr::ident(&earlier),
                    "updateWithValueParams",
                    vec![Self::lambda_object(routed, true)],
                )),
                Stmt::Expr(Expr::method_call(
                    Expr::ident("View"),
                    "create",
                    vec![Expr::ident(&earlier)],
                )),
            ],
        ));
    }

    /// `new CustomDialogController({ builder: Dialog({...}), ... })` as a field
    /// initializer: the dialog is built inside a closure and receives the
    /// controller stored in `field`.
    pub fn rewrite_dialog_controller(&mut self, init: &Expr, field: &str) -> Expr {
        let (callee, args, pos) = match init {
            Expr::New {
                callee,
                args: Some(args),
                pos,
            } if callee.as_ident() == Some("CustomDialogController") => (callee, args, *pos),
            other => return other.clone(),
        };
        let mut args = args.clone();
        if let Some(Expr::Object { props, .. }) = args.first_mut() {
            for prop in props.iter_mut() {
                if let ObjectProp::KeyValue { key, value } = prop {
                    if key.name() != "builder" {
                        continue;
                    }
                    if let Some(closure) = self.dialog_builder(value, field) {
                        *value = closure;
                    }
                }
            }
        }
        args.push(Expr::This);
        Expr::New {
            callee: callee.clone(),
            args: Some(args),
            pos,
        }
    }

    fn dialog_builder(&mut self, value: &Expr, field: &str) -> Option<Expr> {
        let (dialog, args) = match value {
            Expr::Call { callee, args, .. } => (callee.as_ident()?, args),
            _ => return None,
        };
        let child = self.registry.components.get(dialog);
        let mut routed = Vec::new();
        if let Some(Expr::Object { props, .. }) = args.first() {
            for prop in props {
                match prop {
                    ObjectProp::KeyValue { key, value } => routed.push(self.route(child, &key.name(), value)),
                    ObjectProp::Shorthand(name) => routed.push(self.route(child, name, &Expr::ident(name))),
                    _ => {}
                }
            }
        }
        let ctor = Expr::New {
            callee: Box::new(Expr::ident(dialog)),
            args: Some(vec![Expr::This, Self::ctor_object(&routed, true)]),
            pos: Pos::default(),
        };
        Some(Expr::arrow(
            &[],
            vec![
                let_decl("jsDialog", ctor),
                Stmt::raw(format!("jsDialog.setController(this.{})", field)),
                Stmt::raw("ViewPU.create(jsDialog)"),
            ],
        ))
    }
}
