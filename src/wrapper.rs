//! Wrapper synthesis
//!
//! Turns classified fields into the constructor initializers, accessor pairs
//! and dispatch statements of the generated component class. Each function
//! here handles one field; `component` stitches the pieces together in
//! declaration order.

use crate::ast::*;
use crate::decorator::{FieldClass, WrapperKind};
use crate::transform::RenderMode;

/// A classified field together with its (already lowered) initializer.
#[derive(Debug, Clone)]
pub struct FieldPlan {
    pub class: FieldClass,
    pub init: Option<Expr>,
    /// Whether the simple (primitive) wrapper variant applies.
    pub simple: bool,
}

impl FieldPlan {
    pub fn new(class: FieldClass, ty: Option<&str>, init: Option<Expr>) -> Self {
        let simple = is_simple_type(ty, init.as_ref());
        Self { class, init, simple }
    }

    pub fn name(&self) -> &str {
        &self.class.name
    }

    pub fn kind(&self) -> &WrapperKind {
        &self.class.kind
    }

    /// `this.__name`
    fn backing(&self) -> Expr {
        Expr::this_member(&format!("__{}", self.name()))
    }

    /// `params.name`
    fn param(&self) -> Expr {
        Expr::member(Expr::ident("params"), self.name())
    }

    fn init_or(&self, fallback: &str) -> Expr {
        self.init.clone().unwrap_or_else(|| Expr::raw(fallback))
    }
}

const PRIMITIVE_TYPES: &[&str] = &["number", "string", "boolean", "bigint"];

/// Heuristic primitive check: a primitive annotation (optionally widened with
/// `undefined`/`null` or literal types), or no annotation and a literal
/// initializer.
pub fn is_simple_type(ty: Option<&str>, init: Option<&Expr>) -> bool {
    match ty {
        Some(ty) => {
            let mut primitive = false;
            for part in ty.split('|').map(str::trim) {
                if PRIMITIVE_TYPES.contains(&part) || is_literal_type(part) {
                    primitive = true;
                } else if part != "undefined" && part != "null" {
                    return false;
                }
            }
            primitive
        }
        None => match init {
            Some(Expr::Ident(name)) => name == "true" || name == "false",
            Some(expr) => expr.is_literal(),
            None => false,
        },
    }
}

fn is_literal_type(part: &str) -> bool {
    part.starts_with('"')
        || part.starts_with('\'')
        || part == "true"
        || part == "false"
        || part.parse::<f64>().is_ok()
}

fn wrapper_class(plan: &FieldPlan, mode: RenderMode) -> Option<String> {
    let shape = if plan.simple { "Simple" } else { "Object" };
    let base = match plan.kind() {
        WrapperKind::State | WrapperKind::Provide { .. } => format!("ObservedProperty{}", shape),
        WrapperKind::Prop => format!("SynchedProperty{}OneWay", shape),
        WrapperKind::Link => format!("SynchedProperty{}TwoWay", shape),
        WrapperKind::ObjectLink => "SynchedPropertyNesedObject".to_string(),
        _ => return None,
    };
    Some(match mode {
        RenderMode::Partial => format!("{}PU", base),
        RenderMode::Full => base,
    })
}

fn assign(target: Expr, value: Expr) -> Stmt {
    Stmt::Expr(Expr::Assign {
        op: "=".to_string(),
        target: Box::new(target),
        value: Box::new(value),
    })
}

fn new_expr(class: &str, args: Vec<Expr>) -> Expr {
    Expr::New {
        callee: Box::new(Expr::ident(class)),
        args: Some(args),
        pos: Pos::default(),
    }
}

/// Constructor statements creating the field's backing storage.
pub fn constructor_inits(plan: &FieldPlan, mode: RenderMode) -> Vec<Stmt> {
    let name = plan.name();
    let name_lit = Expr::string(name);
    let this_call = |method: &str, args: Vec<Expr>| Expr::method_call(Expr::This, method, args);
    match plan.kind() {
        WrapperKind::Plain | WrapperKind::BuilderParam => {
            vec![assign(Expr::this_member(name), plan.init_or("undefined"))]
        }
        WrapperKind::State => vec![assign(
            plan.backing(),
            new_expr(
                &wrapper_class(plan, mode).unwrap_or_default(),
                vec![plan.init_or("undefined"), Expr::This, name_lit],
            ),
        )],
        WrapperKind::Provide {
            alias,
            allow_override,
        } => {
            let mut stmts = vec![assign(
                plan.backing(),
                new_expr(
                    &wrapper_class(plan, mode).unwrap_or_default(),
                    vec![plan.init_or("undefined"), Expr::This, name_lit.clone()],
                ),
            )];
            let provided = |key: Expr| {
                let mut args = vec![key, plan.backing()];
                if mode == RenderMode::Partial {
                    args.push(Expr::ident(if *allow_override { "true" } else { "false" }));
                }
                Stmt::Expr(this_call("addProvidedVar", args))
            };
            if let Some(alias) = alias {
                stmts.push(provided(alias.clone()));
            }
            stmts.push(provided(name_lit));
            stmts
        }
        WrapperKind::Prop | WrapperKind::Link | WrapperKind::ObjectLink => vec![assign(
            plan.backing(),
            new_expr(
                &wrapper_class(plan, mode).unwrap_or_default(),
                vec![plan.param(), Expr::This, name_lit],
            ),
        )],
        WrapperKind::Consume { alias } => vec![assign(
            plan.backing(),
            this_call(
                "initializeConsume",
                vec![alias.clone().unwrap_or_else(|| name_lit.clone()), name_lit],
            ),
        )],
        WrapperKind::StorageLink(key)
        | WrapperKind::StorageProp(key)
        | WrapperKind::LocalStorageLink(key)
        | WrapperKind::LocalStorageProp(key) => {
            let init = plan.init_or("undefined");
            let value = match mode {
                RenderMode::Partial => {
                    let method = match plan.kind() {
                        WrapperKind::StorageLink(_) => "createStorageLink",
                        WrapperKind::StorageProp(_) => "createStorageProp",
                        WrapperKind::LocalStorageLink(_) => "createLocalStorageLink",
                        _ => "createLocalStorageProp",
                    };
                    this_call(method, vec![key.clone(), init, name_lit])
                }
                RenderMode::Full => {
                    let (owner, method) = match plan.kind() {
                        WrapperKind::StorageLink(_) => (Expr::ident("AppStorage"), "SetAndLink"),
                        WrapperKind::StorageProp(_) => (Expr::ident("AppStorage"), "SetAndProp"),
                        WrapperKind::LocalStorageLink(_) => (Expr::this_member("localStorage_"), "setAndLink"),
                        _ => (Expr::this_member("localStorage_"), "setAndProp"),
                    };
                    Expr::method_call(owner, method, vec![key.clone(), init, Expr::This, name_lit])
                }
            };
            vec![assign(plan.backing(), value)]
        }
        WrapperKind::Local
        | WrapperKind::Param { .. }
        | WrapperKind::Event
        | WrapperKind::Provider { .. }
        | WrapperKind::Consumer { .. } => Vec::new(),
    }
}

/// `this.declareWatch("x", this.handler);`
pub fn watch_stmt(plan: &FieldPlan) -> Option<Stmt> {
    let handler = plan.class.watch.as_ref()?;
    Some(Stmt::Expr(Expr::method_call(
        Expr::This,
        "declareWatch",
        vec![Expr::string(plan.name()), Expr::this_member(handler)],
    )))
}

/// Statements seeding the field from construction parameters
/// (`setInitiallyProvidedValue`, or `updateWithValueParams` in full mode).
pub fn seed_stmts(plan: &FieldPlan, mode: RenderMode) -> Vec<Stmt> {
    let name = plan.name();
    match plan.kind() {
        kind if kind.seeds_when_supplied() => vec![Stmt::if_then(
            Expr::raw(format!("params.{} !== undefined", name)),
            vec![assign(Expr::this_member(name), plan.param())],
        )],
        WrapperKind::Prop => match (mode, &plan.init) {
            (RenderMode::Full, _) => vec![assign(Expr::this_member(name), plan.param())],
            (RenderMode::Partial, Some(init)) => vec![Stmt::if_then(
                Expr::raw(format!("params.{} === undefined", name)),
                vec![Stmt::Expr(Expr::method_call(plan.backing(), "set", vec![init.clone()]))],
            )],
            (RenderMode::Partial, None) => Vec::new(),
        },
        WrapperKind::ObjectLink => vec![Stmt::Expr(Expr::method_call(
            plan.backing(),
            "set",
            vec![plan.param()],
        ))],
        _ => Vec::new(),
    }
}

/// Re-entry statements for `updateStateVars` (partial mode).
pub fn update_stmts(plan: &FieldPlan) -> Vec<Stmt> {
    match plan.kind() {
        WrapperKind::Prop => vec![Stmt::Expr(Expr::method_call(
            plan.backing(),
            "reset",
            vec![plan.param()],
        ))],
        WrapperKind::ObjectLink => vec![Stmt::Expr(Expr::method_call(
            plan.backing(),
            "set",
            vec![plan.param()],
        ))],
        _ => Vec::new(),
    }
}

pub fn purge_stmt(plan: &FieldPlan) -> Option<Stmt> {
    plan.kind().is_wrapped().then(|| {
        Stmt::Expr(Expr::method_call(
            plan.backing(),
            "purgeDependencyOnElmtId",
            vec![Expr::ident("rmElmtId")],
        ))
    })
}

pub fn delete_stmt(plan: &FieldPlan) -> Option<Stmt> {
    plan.kind()
        .is_wrapped()
        .then(|| Stmt::Expr(Expr::method_call(plan.backing(), "aboutToBeDeleted", Vec::new())))
}

pub fn recycle_stmt(plan: &FieldPlan) -> Option<Stmt> {
    plan.kind().is_wrapped().then(|| {
        Stmt::Expr(Expr::method_call(
            plan.backing(),
            "updateElmtId",
            vec![Expr::ident("oldElmtId"), Expr::ident("newElmtId")],
        ))
    })
}

/// Getter and setter over the backing wrapper; `@ObjectLink` is read-only.
pub fn accessors(plan: &FieldPlan) -> Vec<ClassMember> {
    if !plan.kind().is_wrapped() {
        return Vec::new();
    }
    let accessor = |kind: MethodKind, params: Vec<Param>, body: Vec<Stmt>| {
        ClassMember::Method(MethodDecl {
            key: PropKey::Ident(plan.name().to_string()),
            decorators: Vec::new(),
            kind,
            func: Function {
                params,
                body,
                is_async: false,
                is_generator: false,
            },
            is_static: false,
            pos: Pos::default(),
        })
    };
    let mut members = vec![accessor(
        MethodKind::Getter,
        Vec::new(),
        vec![Stmt::Return(Some(Expr::method_call(plan.backing(), "get", Vec::new())))],
    )];
    if !matches!(plan.kind(), WrapperKind::ObjectLink) {
        members.push(accessor(
            MethodKind::Setter,
            vec![Param::simple("newValue")],
            vec![Stmt::Expr(Expr::method_call(
                plan.backing(),
                "set",
                vec![Expr::ident("newValue")],
            ))],
        ));
    }
    members
}

/// Constructor statement of a `@ComponentV2` field.
pub fn v2_init(plan: &FieldPlan) -> Stmt {
    let name = plan.name();
    match plan.kind() {
        WrapperKind::Param { .. } => Stmt::Expr(Expr::method_call(
            Expr::This,
            "initParam",
            vec![
                Expr::string(name),
                Expr::Conditional {
                    test: Box::new(Expr::raw(format!("(params && \"{}\" in params)", name))),
                    cons: Box::new(plan.param()),
                    alt: Box::new(plan.init_or("undefined")),
                },
            ],
        )),
        WrapperKind::Event | WrapperKind::BuilderParam => assign(
            Expr::this_member(name),
            Expr::Conditional {
                test: Box::new(Expr::raw(format!("\"{}\" in params", name))),
                cons: Box::new(plan.param()),
                alt: Box::new(plan.init_or("undefined")),
            },
        ),
        _ => assign(Expr::this_member(name), plan.init_or("undefined")),
    }
}

/// `updateStateVars` statement of a `@ComponentV2` field.
pub fn v2_update(plan: &FieldPlan) -> Option<Stmt> {
    let name = plan.name();
    matches!(plan.kind(), WrapperKind::Param { once: false }).then(|| {
        Stmt::if_then(
            Expr::raw(format!("\"{}\" in params", name)),
            vec![Stmt::Expr(Expr::method_call(
                Expr::This,
                "updateParam",
                vec![Expr::string(name), plan.param()],
            ))],
        )
    })
}

/// Decorator expressions recorded on the prototype for a V2 field.
pub fn v2_decorators(plan: &FieldPlan) -> Vec<String> {
    let aliased = |base: &str, alias: &Option<String>| match alias {
        Some(alias) => format!("{}(\"{}\")", base, alias),
        None => format!("{}()", base),
    };
    match plan.kind() {
        WrapperKind::Local => vec!["Local".to_string()],
        WrapperKind::Param { once } => {
            let mut names = vec!["Param".to_string()];
            if *once {
                names.push("Once".to_string());
            }
            names
        }
        WrapperKind::Event => vec!["Event".to_string()],
        WrapperKind::BuilderParam => vec!["BuilderParam".to_string()],
        WrapperKind::Provider { alias } => vec![aliased("Provider", alias)],
        WrapperKind::Consumer { alias } => vec![aliased("Consumer", alias)],
        _ => Vec::new(),
    }
}

/// `__decorate([...], Class.prototype, "member", void 0);` The descriptor is
/// `void 0` for fields and `null` for methods and accessors.
pub fn decorate_member(decorators: &[String], class: &str, member: &str, descriptor: &str) -> Stmt {
    Stmt::raw(format!(
        "__decorate([\n    {}\n], {}.prototype, \"{}\", {})",
        decorators.join(",\n    "),
        class,
        member,
        descriptor
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Pos;
    use crate::printer::print_stmts;

    fn plan(name: &str, kind: WrapperKind, ty: Option<&str>, init: Option<Expr>) -> FieldPlan {
        FieldPlan::new(
            FieldClass {
                name: name.to_string(),
                kind,
                watch: None,
                require: false,
                pos: Pos::default(),
            },
            ty,
            init,
        )
    }

    #[test]
    fn test_simple_type_heuristic() {
        assert!(is_simple_type(Some("number"), None));
        assert!(is_simple_type(Some("string | undefined"), None));
        assert!(is_simple_type(Some("'a' | 'b'"), None));
        assert!(!is_simple_type(Some("number[]"), None));
        assert!(!is_simple_type(Some("Set<number>"), None));
        assert!(!is_simple_type(Some("undefined"), None));
        assert!(is_simple_type(None, Some(&Expr::Number("1".into()))));
        assert!(is_simple_type(None, Some(&Expr::ident("true"))));
        assert!(!is_simple_type(None, Some(&Expr::ident("undefined"))));
    }

    #[test]
    fn test_state_init_and_accessors() {
        let p = plan("count", WrapperKind::State, Some("number"), Some(Expr::Number("0".into())));
        let out = print_stmts(&constructor_inits(&p, RenderMode::Partial));
        assert_eq!(out, "this.__count = new ObservedPropertySimplePU(0, this, \"count\");\n");
        let full = print_stmts(&constructor_inits(&p, RenderMode::Full));
        assert_eq!(full, "this.__count = new ObservedPropertySimple(0, this, \"count\");\n");
        assert_eq!(accessors(&p).len(), 2);
        assert_eq!(
            print_stmts(&seed_stmts(&p, RenderMode::Partial)),
            "if (params.count !== undefined) {\n    this.count = params.count;\n}\n"
        );
    }

    #[test]
    fn test_prop_seeds_default_and_resets() {
        let p = plan("fruit", WrapperKind::Prop, Some("ClassA"), Some(Expr::raw("new ClassA(1)")));
        assert_eq!(
            print_stmts(&constructor_inits(&p, RenderMode::Partial)),
            "this.__fruit = new SynchedPropertyObjectOneWayPU(params.fruit, this, \"fruit\");\n"
        );
        assert_eq!(
            print_stmts(&seed_stmts(&p, RenderMode::Partial)),
            "if (params.fruit === undefined) {\n    this.__fruit.set(new ClassA(1));\n}\n"
        );
        assert_eq!(print_stmts(&update_stmts(&p)), "this.__fruit.reset(params.fruit);\n");
        assert_eq!(print_stmts(&seed_stmts(&p, RenderMode::Full)), "this.fruit = params.fruit;\n");
    }

    #[test]
    fn test_provide_registers_alias_then_name() {
        let p = plan(
            "reviewVotes",
            WrapperKind::Provide {
                alias: Some(Expr::Str("\"reviewVote\"".into())),
                allow_override: false,
            },
            Some("number"),
            Some(Expr::Number("0".into())),
        );
        assert_eq!(
            print_stmts(&constructor_inits(&p, RenderMode::Partial)),
            "this.__reviewVotes = new ObservedPropertySimplePU(0, this, \"reviewVotes\");\n\
             this.addProvidedVar(\"reviewVote\", this.__reviewVotes, false);\n\
             this.addProvidedVar(\"reviewVotes\", this.__reviewVotes, false);\n"
        );
    }

    #[test]
    fn test_consume_and_storage() {
        let c = plan("votes", WrapperKind::Consume { alias: None }, Some("number"), None);
        assert_eq!(
            print_stmts(&constructor_inits(&c, RenderMode::Partial)),
            "this.__votes = this.initializeConsume(\"votes\", \"votes\");\n"
        );
        let s = plan(
            "theme",
            WrapperKind::StorageLink(Expr::Str("'theme'".into())),
            Some("string"),
            Some(Expr::Str("'dark'".into())),
        );
        assert_eq!(
            print_stmts(&constructor_inits(&s, RenderMode::Partial)),
            "this.__theme = this.createStorageLink('theme', 'dark', \"theme\");\n"
        );
        assert!(seed_stmts(&s, RenderMode::Partial).is_empty());
        assert!(purge_stmt(&s).is_some());
    }

    #[test]
    fn test_object_link_is_read_only() {
        let p = plan("model", WrapperKind::ObjectLink, Some("Model"), None);
        assert_eq!(accessors(&p).len(), 1);
        assert_eq!(
            print_stmts(&seed_stmts(&p, RenderMode::Partial)),
            "this.__model.set(params.model);\n"
        );
    }

    #[test]
    fn test_plain_field_has_no_wrapper() {
        let p = plan("count", WrapperKind::Plain, Some("number"), Some(Expr::Number("0".into())));
        assert_eq!(print_stmts(&constructor_inits(&p, RenderMode::Partial)), "this.count = 0;\n");
        assert!(accessors(&p).is_empty());
        assert!(purge_stmt(&p).is_none());
        assert!(delete_stmt(&p).is_none());
    }

    #[test]
    fn test_v2_param_surface() {
        let p = plan("count", WrapperKind::Param { once: false }, Some("number"), Some(Expr::Number("0".into())));
        assert_eq!(
            print_stmts(&[v2_init(&p)]),
            "this.initParam(\"count\", (params && \"count\" in params) ? params.count : 0);\n"
        );
        assert_eq!(
            print_stmts(&[v2_update(&p).unwrap()]),
            "if (\"count\" in params) {\n    this.updateParam(\"count\", params.count);\n}\n"
        );
        assert_eq!(
            print_stmts(&[decorate_member(&v2_decorators(&p), "Index", "count", "void 0")]),
            "__decorate([\n    Param\n], Index.prototype, \"count\", void 0);\n"
        );
        let once = plan("seed", WrapperKind::Param { once: true }, None, None);
        assert!(v2_update(&once).is_none());
        assert_eq!(v2_decorators(&once), ["Param", "Once"]);
    }

    #[test]
    fn test_v2_event_default() {
        let p = plan("changed", WrapperKind::Event, None, None);
        assert_eq!(
            print_stmts(&[v2_init(&p)]),
            "this.changed = \"changed\" in params ? params.changed : undefined;\n"
        );
    }

    #[test]
    fn test_watch_registration() {
        let mut p = plan("basket", WrapperKind::State, Some("string[]"), None);
        p.class.watch = Some("onBasketUpdated".into());
        assert_eq!(
            print_stmts(&[watch_stmt(&p).unwrap()]),
            "this.declareWatch(\"basket\", this.onBasketUpdated);\n"
        );
    }
}
