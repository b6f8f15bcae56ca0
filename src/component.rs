//! Component class assembly
//!
//! Stitches the per-field pieces from [`crate::wrapper`] and the lowered
//! render body into one class per struct. Three layouts exist: `ViewPU`
//! (partial update), `View` (full render) and `ViewV2`.

use crate::ast::*;
use crate::decorator::{
    classify_class, classify_component, classify_field, classify_method, ClassObservation, ComponentFlavor,
    ComponentInfo, EntryInfo, MethodRole,
};
use crate::error::{CompilerError, Result};
use crate::printer::print_expr;
use crate::render::Lowerer;
use crate::transform::RenderMode;
use crate::wrapper::{self, FieldPlan};
use log::debug;

/// Output of one struct.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub items: Vec<Item>,
    /// The items call the `__decorate` helper.
    pub decorates: bool,
    pub entry: Option<EntryInfo>,
    pub flavor: ComponentFlavor,
}

/// Members of a struct sorted by role.
struct Parts<'d> {
    fields: Vec<FieldPlan>,
    statics: Vec<ClassMember>,
    methods: Vec<(&'d MethodDecl, MethodRole)>,
    build: &'d MethodDecl,
}

fn param(name: &str, default: Option<&str>) -> Param {
    let mut param = Param::simple(name);
    param.default = default.map(Expr::raw);
    param
}

/// A generated method; no source position, so an empty body keeps its braces
/// on separate lines.
fn synthesized_method(name: &str, params: Vec<Param>, body: Vec<Stmt>) -> MethodDecl {
    MethodDecl {
        key: PropKey::Ident(name.to_string()),
        decorators: Vec::new(),
        kind: MethodKind::Method,
        func: Function {
            params,
            body,
            is_async: false,
            is_generator: false,
        },
        is_static: false,
        pos: Pos::default(),
    }
}

fn synthesized(name: &str, params: Vec<Param>, body: Vec<Stmt>) -> ClassMember {
    ClassMember::Method(synthesized_method(name, params, body))
}

fn constructor(params: Vec<Param>, body: Vec<Stmt>) -> ClassMember {
    ClassMember::Method(MethodDecl {
        key: PropKey::Ident("constructor".into()),
        decorators: Vec::new(),
        kind: MethodKind::Constructor,
        func: Function {
            params,
            body,
            is_async: false,
            is_generator: false,
        },
        is_static: false,
        pos: Pos::default(),
    })
}

/// User method with its decorators removed.
fn plain_method(method: &MethodDecl) -> ClassMember {
    ClassMember::Method(MethodDecl {
        decorators: Vec::new(),
        ..method.clone()
    })
}

fn class_item(name: &str, base: &str, members: Vec<ClassMember>, export: Export, pos: Pos) -> Item {
    Item::Class(ClassDecl {
        name: Some(name.to_string()),
        decorators: Vec::new(),
        super_class: Some(Expr::ident(base)),
        members,
        export,
        pos,
    })
}

fn split<'d>(lowerer: &mut Lowerer, decl: &'d StructDecl, info: &ComponentInfo) -> Result<Parts<'d>> {
    let file = lowerer.file;
    let mut fields = Vec::new();
    let mut statics = Vec::new();
    let mut methods = Vec::new();
    let mut build = None;
    for member in &decl.members {
        match member {
            ClassMember::Property(prop) if prop.is_static => statics.push(ClassMember::Property(PropertyDecl {
                decorators: Vec::new(),
                ..prop.clone()
            })),
            ClassMember::Property(prop) => {
                let class = classify_field(prop, info.flavor, file)?;
                let init = prop
                    .init
                    .as_ref()
                    .map(|init| lowerer.rewrite_dialog_controller(init, &prop.name()));
                fields.push(FieldPlan::new(class, prop.ty.as_deref(), init));
            }
            ClassMember::Method(method) if method.name() == "build" && method.kind == MethodKind::Method => {
                if build.is_some() {
                    return Err(CompilerError::component(
                        file,
                        method.pos.line,
                        format!("struct '{}' declares more than one build method", decl.name),
                    ));
                }
                build = Some(method);
            }
            ClassMember::Method(method) if method.kind == MethodKind::Constructor => {
                return Err(CompilerError::component(
                    file,
                    method.pos.line,
                    format!("struct '{}' cannot declare a constructor", decl.name),
                ));
            }
            ClassMember::Method(method) => {
                let role = classify_method(method, info.flavor, file)?;
                methods.push((method, role));
            }
        }
    }
    let build = build.ok_or_else(|| {
        CompilerError::component(file, decl.pos.line, format!("struct '{}' has no build method", decl.name))
    })?;
    Ok(Parts {
        fields,
        statics,
        methods,
        build,
    })
}

/// Lowers one component struct.
pub fn assemble(lowerer: &mut Lowerer, decl: &StructDecl) -> Result<Assembled> {
    let info = classify_component(decl, lowerer.file)?;
    let parts = split(lowerer, decl, &info)?;
    debug!(
        "assembling '{}' ({:?}, {} fields, {} methods)",
        decl.name,
        info.flavor,
        parts.fields.len(),
        parts.methods.len()
    );
    match (info.flavor, lowerer.options.mode) {
        (ComponentFlavor::V2, RenderMode::Full) => Err(CompilerError::component(
            lowerer.file,
            decl.pos.line,
            format!("@ComponentV2 struct '{}' requires the partial render mode", decl.name),
        )),
        (ComponentFlavor::V2, RenderMode::Partial) => Ok(assemble_v2(lowerer, decl, &info, parts)),
        (ComponentFlavor::V1, RenderMode::Partial) => Ok(assemble_partial(lowerer, decl, &info, parts)),
        (ComponentFlavor::V1, RenderMode::Full) => Ok(assemble_full(lowerer, decl, &info, parts)),
    }
}

/// User methods in source order: builders lowered, style groups dropped.
fn user_methods(lowerer: &mut Lowerer, name: &str, methods: &[(&MethodDecl, MethodRole)]) -> Vec<ClassMember> {
    let mut members = Vec::new();
    for (method, role) in methods {
        match role {
            MethodRole::Builder => members.push(ClassMember::Method(lowerer.lower_builder_method(method, name))),
            MethodRole::Styles => {}
            _ => members.push(plain_method(method)),
        }
    }
    members
}

fn lower_build(lowerer: &mut Lowerer, name: &str, build: &MethodDecl) -> Vec<Stmt> {
    lowerer.with_scope(
        |scope| {
            scope.component = Some(name.to_string());
            scope.global_builder = false;
            scope.in_branch = false;
            scope.captured.clear();
        },
        |lowerer| lowerer.lower_stmts(&build.func.body),
    )
}

/// Render method carrying the position of `build`.
fn render_method(name: &str, body: Vec<Stmt>, build: &MethodDecl) -> ClassMember {
    ClassMember::Method(MethodDecl {
        key: PropKey::Ident(name.to_string()),
        decorators: Vec::new(),
        kind: MethodKind::Method,
        func: Function {
            params: Vec::new(),
            body,
            is_async: false,
            is_generator: false,
        },
        is_static: false,
        pos: build.pos,
    })
}

fn watches(lowerer: &mut Lowerer, decl: &StructDecl, parts: &Parts) -> Vec<Stmt> {
    let mut stmts = Vec::new();
    for plan in &parts.fields {
        if let Some(handler) = &plan.class.watch {
            let exists = parts.methods.iter().any(|(m, _)| &m.name() == handler);
            if !exists {
                lowerer.error(
                    plan.class.pos,
                    format!("@Watch handler '{}' of '{}' is not a method of '{}'", handler, plan.name(), decl.name),
                );
                continue;
            }
        }
        stmts.extend(wrapper::watch_stmt(plan));
    }
    stmts
}

fn dialog_setter(lowerer: &Lowerer, decl: &StructDecl) -> Option<ClassMember> {
    let controller = lowerer.registry.components.get(&decl.name)?.controller.clone()?;
    Some(synthesized(
        "setController",
        vec![Param::simple("ctr")],
        vec![Stmt::raw(format!("this.{} = ctr", controller))],
    ))
}

fn assemble_partial(lowerer: &mut Lowerer, decl: &StructDecl, info: &ComponentInfo, parts: Parts) -> Assembled {
    let mode = RenderMode::Partial;
    let mut ctor = vec![
        Stmt::raw("super(parent, __localStorage, elmtId, extraInfo)"),
        Stmt::if_then(
            Expr::raw("typeof paramsLambda === \"function\""),
            vec![Stmt::raw("this.paramsGenerator_ = paramsLambda")],
        ),
    ];
    for plan in &parts.fields {
        ctor.extend(wrapper::constructor_inits(plan, mode));
    }
    ctor.push(Stmt::raw("this.setInitiallyProvidedValue(params)"));
    ctor.extend(watches(lowerer, decl, &parts));
    ctor.push(Stmt::raw("this.finalizeConstruction()"));

    let mut members = parts.statics.clone();
    members.push(constructor(
        vec![
            param("parent", None),
            param("params", None),
            param("__localStorage", None),
            param("elmtId", Some("-1")),
            param("paramsLambda", Some("undefined")),
            param("extraInfo", None),
        ],
        ctor,
    ));
    let seeds = parts.fields.iter().flat_map(|p| wrapper::seed_stmts(p, mode)).collect();
    members.push(synthesized("setInitiallyProvidedValue", vec![Param::simple("params")], seeds));
    let updates = parts.fields.iter().flat_map(wrapper::update_stmts).collect();
    members.push(synthesized("updateStateVars", vec![Param::simple("params")], updates));
    let purges = parts.fields.iter().filter_map(wrapper::purge_stmt).collect();
    members.push(synthesized(
        "purgeVariableDependenciesOnElmtId",
        vec![Param::simple("rmElmtId")],
        purges,
    ));
    let mut deletes: Vec<Stmt> = parts.fields.iter().filter_map(wrapper::delete_stmt).collect();
    deletes.push(Stmt::raw("SubscriberManager.Get().delete(this.id__())"));
    deletes.push(Stmt::raw("this.aboutToBeDeletedInternal()"));
    members.push(synthesized("aboutToBeDeleted", Vec::new(), deletes));
    if info.reusable {
        let recycles = parts.fields.iter().filter_map(wrapper::recycle_stmt).collect();
        members.push(synthesized(
            "updateRecycleElmtId",
            vec![Param::simple("oldElmtId"), Param::simple("newElmtId")],
            recycles,
        ));
    }
    for plan in &parts.fields {
        members.extend(wrapper::accessors(plan));
    }
    if info.custom_dialog {
        members.extend(dialog_setter(lowerer, decl));
    }
    members.extend(user_methods(lowerer, &decl.name, &parts.methods));
    let body = lower_build(lowerer, &decl.name, parts.build);
    members.push(render_method("initialRender", body, parts.build));
    members.push(synthesized("rerender", Vec::new(), vec![Stmt::raw("this.updateDirtyElements()")]));

    Assembled {
        items: vec![class_item(&decl.name, "ViewPU", members, decl.export, decl.pos)],
        decorates: false,
        entry: info.entry.clone(),
        flavor: ComponentFlavor::V1,
    }
}

fn assemble_full(lowerer: &mut Lowerer, decl: &StructDecl, info: &ComponentInfo, parts: Parts) -> Assembled {
    let mode = RenderMode::Full;
    let mut ctor = vec![Stmt::raw("super(compilerAssignedUniqueChildId, parent, localStorage)")];
    for plan in &parts.fields {
        ctor.extend(wrapper::constructor_inits(plan, mode));
    }
    ctor.push(Stmt::raw("this.updateWithValueParams(params)"));
    ctor.extend(watches(lowerer, decl, &parts));

    let mut members = parts.statics.clone();
    members.push(constructor(
        vec![
            param("compilerAssignedUniqueChildId", None),
            param("parent", None),
            param("params", None),
            param("localStorage", None),
        ],
        ctor,
    ));
    let seeds = parts.fields.iter().flat_map(|p| wrapper::seed_stmts(p, mode)).collect();
    members.push(synthesized("updateWithValueParams", vec![Param::simple("params")], seeds));
    let mut deletes: Vec<Stmt> = parts.fields.iter().filter_map(wrapper::delete_stmt).collect();
    deletes.push(Stmt::raw("SubscriberManager.Get().delete(this.id())"));
    members.push(synthesized("aboutToBeDeleted", Vec::new(), deletes));
    for plan in &parts.fields {
        members.extend(wrapper::accessors(plan));
    }
    if info.custom_dialog {
        members.extend(dialog_setter(lowerer, decl));
    }
    members.extend(user_methods(lowerer, &decl.name, &parts.methods));
    let body = lower_build(lowerer, &decl.name, parts.build);
    members.push(render_method("render", body, parts.build));

    Assembled {
        items: vec![class_item(&decl.name, "View", members, decl.export, decl.pos)],
        decorates: false,
        entry: info.entry.clone(),
        flavor: ComponentFlavor::V1,
    }
}

/// `"a.b"` arguments of `@Monitor` as printed.
fn monitor_decorator(paths: &[Expr]) -> String {
    let args: Vec<String> = paths.iter().map(print_expr).collect();
    format!("Monitor({})", args.join(", "))
}

fn method_decorates(name: &str, methods: &[(&MethodDecl, MethodRole)]) -> Vec<Stmt> {
    methods
        .iter()
        .filter_map(|(method, role)| {
            let decorator = match role {
                MethodRole::Computed => "Computed".to_string(),
                MethodRole::Monitor(paths) => monitor_decorator(paths),
                _ => return None,
            };
            Some(wrapper::decorate_member(&[decorator], name, &method.name(), "null"))
        })
        .collect()
}

fn assemble_v2(lowerer: &mut Lowerer, decl: &StructDecl, info: &ComponentInfo, parts: Parts) -> Assembled {
    let mut ctor = vec![Stmt::raw("super(parent, elmtId, extraInfo)")];
    ctor.extend(parts.fields.iter().map(wrapper::v2_init));
    ctor.push(Stmt::raw("this.finalizeConstruction()"));

    let mut members = parts.statics.clone();
    members.push(constructor(
        vec![
            param("parent", None),
            param("params", None),
            param("__localStorage", None),
            param("elmtId", Some("-1")),
            param("paramsLambda", None),
            param("extraInfo", None),
        ],
        ctor,
    ));
    members.extend(user_methods(lowerer, &decl.name, &parts.methods));
    let body = lower_build(lowerer, &decl.name, parts.build);
    members.push(render_method("initialRender", body, parts.build));
    let updates: Vec<Stmt> = parts.fields.iter().filter_map(wrapper::v2_update).collect();
    if !updates.is_empty() {
        let mut body = vec![Stmt::if_then(
            Expr::raw("params === undefined"),
            vec![Stmt::Return(None)],
        )];
        body.extend(updates);
        members.push(synthesized("updateStateVars", vec![Param::simple("params")], body));
    }
    members.push(synthesized("rerender", Vec::new(), vec![Stmt::raw("this.updateDirtyElements()")]));
    if info.entry.is_some() {
        members.push(ClassMember::Method(MethodDecl {
            is_static: true,
            ..synthesized_method(
                "getEntryName",
                Vec::new(),
                vec![Stmt::Return(Some(Expr::string(&decl.name)))],
            )
        }));
    }

    let mut items = vec![class_item(&decl.name, "ViewV2", members, decl.export, decl.pos)];
    let mut decorate_stmts = Vec::new();
    for plan in &parts.fields {
        let decorators = wrapper::v2_decorators(plan);
        if !decorators.is_empty() {
            decorate_stmts.push(wrapper::decorate_member(&decorators, &decl.name, plan.name(), "void 0"));
        }
    }
    decorate_stmts.extend(method_decorates(&decl.name, &parts.methods));
    let decorates = !decorate_stmts.is_empty();
    items.extend(decorate_stmts.into_iter().map(|stmt| Item::Statement {
        stmt,
        export: Export::None,
    }));

    Assembled {
        items,
        decorates,
        entry: info.entry.clone(),
        flavor: ComponentFlavor::V2,
    }
}

/// Plain classes: uninitialized field declarations and decorators are
/// removed; `@Observed`/`@ObservedV2` classes become a decorated class
/// expression. Returns the items and whether `__decorate` is used.
pub fn assemble_class(decl: &ClassDecl, file: &str) -> Result<(Vec<Item>, bool)> {
    let observation = classify_class(decl, file)?;
    let mut members = Vec::new();
    let mut methods = Vec::new();
    for member in &decl.members {
        match member {
            ClassMember::Property(prop) if prop.init.is_none() && !prop.is_static => {}
            ClassMember::Property(prop) => members.push(ClassMember::Property(PropertyDecl {
                decorators: Vec::new(),
                ..prop.clone()
            })),
            ClassMember::Method(method) => {
                if matches!(observation, ClassObservation::ObservedV2 { .. }) {
                    methods.push((method, classify_method(method, ComponentFlavor::V2, file)?));
                }
                members.push(plain_method(method));
            }
        }
    }
    let cleaned = ClassDecl {
        decorators: Vec::new(),
        members,
        ..decl.clone()
    };

    let name = match (&observation, &decl.name) {
        (ClassObservation::None, _) | (_, None) => return Ok((vec![Item::Class(cleaned)], false)),
        (_, Some(name)) => name.clone(),
    };

    let mut items = vec![Item::Statement {
        stmt: Stmt::Var(VarDecl {
            kind: VarKind::Let,
            decls: vec![VarDeclarator {
                pattern: Pattern::Ident(name.clone()),
                init: Some(Expr::Class(Box::new(ClassDecl {
                    export: Export::None,
                    ..cleaned
                }))),
            }],
        }),
        export: Export::None,
    }];
    let class_decorator = match &observation {
        ClassObservation::ObservedV2 { traced } => {
            for field in traced {
                items.push(Item::Statement {
                    stmt: wrapper::decorate_member(&["Trace".to_string()], &name, field, "void 0"),
                    export: Export::None,
                });
            }
            for stmt in method_decorates(&name, &methods) {
                items.push(Item::Statement {
                    stmt,
                    export: Export::None,
                });
            }
            "ObservedV2"
        }
        _ => "Observed",
    };
    items.push(Item::Statement {
        stmt: Stmt::raw(format!("{n} = __decorate([\n    {d}\n], {n})", n = name, d = class_decorator)),
        export: Export::None,
    });
    match decl.export {
        Export::Named => items.push(Item::Statement {
            stmt: Stmt::raw(format!("export {{ {} }}", name)),
            export: Export::None,
        }),
        Export::Default => items.push(Item::Statement {
            stmt: Stmt::raw(format!("export default {}", name)),
            export: Export::None,
        }),
        Export::None => {}
    }
    Ok((items, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::printer::print_program;
    use crate::tables::ComponentTables;
    use crate::transform::{Registry, TransformOptions};

    fn assemble_with(source: &str, mode: RenderMode) -> (String, Assembled) {
        let program = parse_source(source, "Index.ets").unwrap();
        let registry = Registry::collect(&program, "Index.ets");
        let tables = ComponentTables::standard();
        let options = TransformOptions {
            mode,
            ..TransformOptions::default()
        };
        let mut lowerer = Lowerer::new(&tables, &registry, &options, "Index.ets");
        let decl = program
            .items
            .iter()
            .find_map(|item| match item {
                Item::Struct(decl) => Some(decl.clone()),
                _ => None,
            })
            .unwrap();
        let assembled = assemble(&mut lowerer, &decl).unwrap();
        (
            print_program(&Program {
                items: assembled.items.clone(),
            }),
            assembled,
        )
    }

    fn class_of(source: &str) -> (String, bool) {
        let program = parse_source(source, "Index.ets").unwrap();
        let decl = program
            .items
            .iter()
            .find_map(|item| match item {
                Item::Class(decl) => Some(decl.clone()),
                _ => None,
            })
            .unwrap();
        let (items, decorates) = assemble_class(&decl, "Index.ets").unwrap();
        (print_program(&Program { items }), decorates)
    }

    #[test]
    fn test_partial_layout() {
        let (out, assembled) = assemble_with(
            "@Entry\n@Component\nstruct Index {\n  @State @Watch('onCount') count: number = 0\n  @Prop label: string = 'a'\n  onCount() {\n  }\n  build() {\n    Text(this.label)\n  }\n}\n",
            RenderMode::Partial,
        );
        assert!(assembled.entry.is_some());
        assert!(!assembled.decorates);
        assert!(out.starts_with(
            "class Index extends ViewPU {\n    constructor(parent, params, __localStorage, elmtId = -1, paramsLambda = undefined, extraInfo) {\n        super(parent, __localStorage, elmtId, extraInfo);\n        if (typeof paramsLambda === \"function\") {\n            this.paramsGenerator_ = paramsLambda;\n        }\n"
        ));
        assert!(out.contains(
            "        this.setInitiallyProvidedValue(params);\n        this.declareWatch(\"count\", this.onCount);\n        this.finalizeConstruction();\n    }\n"
        ));
        assert!(out.contains("    updateStateVars(params) {\n        this.__label.reset(params.label);\n    }\n"));
        assert!(out.contains(
            "    aboutToBeDeleted() {\n        this.__count.aboutToBeDeleted();\n        this.__label.aboutToBeDeleted();\n        SubscriberManager.Get().delete(this.id__());\n        this.aboutToBeDeletedInternal();\n    }\n"
        ));
        assert!(out.contains("    onCount() { }\n"));
        assert!(out.contains("    rerender() {\n        this.updateDirtyElements();\n    }\n}\n"));
        let order: Vec<usize> = ["setInitiallyProvidedValue", "purgeVariableDependenciesOnElmtId", "get count()", "initialRender"]
            .iter()
            .map(|m| out.find(m).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_reusable_and_dialog_members() {
        let (out, _) = assemble_with(
            "@Reusable\n@Component\nstruct Item {\n  @State n: number = 0\n  build() {\n    Text('x')\n  }\n}\n",
            RenderMode::Partial,
        );
        assert!(out.contains("updateRecycleElmtId(oldElmtId, newElmtId) {\n        this.__n.updateElmtId(oldElmtId, newElmtId);\n    }"));

        let (out, _) = assemble_with(
            "@CustomDialog\nstruct Dialog {\n  controller: CustomDialogController\n  build() {\n    Text('x')\n  }\n}\n",
            RenderMode::Partial,
        );
        assert!(out.contains("    setController(ctr) {\n        this.controller = ctr;\n    }\n"));
    }

    #[test]
    fn test_full_layout() {
        let (out, _) = assemble_with(
            "@Component\nstruct Index {\n  @Prop name: string\n  build() {\n    Text(this.name)\n  }\n}\n",
            RenderMode::Full,
        );
        assert!(out.starts_with(
            "class Index extends View {\n    constructor(compilerAssignedUniqueChildId, parent, params, localStorage) {\n        super(compilerAssignedUniqueChildId, parent, localStorage);\n        this.__name = new SynchedPropertySimpleOneWay(params.name, this, \"name\");\n        this.updateWithValueParams(params);\n    }\n    updateWithValueParams(params) {\n        this.name = params.name;\n    }\n"
        ));
        assert!(out.contains("SubscriberManager.Get().delete(this.id());"));
        assert!(out.contains("    render() {\n        Text.create(this.name);\n        Text.pop();\n    }\n"));
    }

    #[test]
    fn test_v2_layout() {
        let (out, assembled) = assemble_with(
            "@Entry\n@ComponentV2\nstruct Index {\n  @Local title: string = 'a'\n  @Param @Once seed: number = 1\n  @Param size: number = 2\n  build() {\n  }\n}\n",
            RenderMode::Partial,
        );
        assert!(assembled.decorates);
        assert!(out.starts_with(
            "class Index extends ViewV2 {\n    constructor(parent, params, __localStorage, elmtId = -1, paramsLambda, extraInfo) {\n        super(parent, elmtId, extraInfo);\n        this.title = 'a';\n"
        ));
        assert!(out.contains("    initialRender() { }\n"));
        assert!(out.contains(
            "    updateStateVars(params) {\n        if (params === undefined) {\n            return;\n        }\n        if (\"size\" in params) {\n            this.updateParam(\"size\", params.size);\n        }\n    }\n"
        ));
        assert!(out.contains("    static getEntryName() {\n        return \"Index\";\n    }\n"));
        assert!(out.contains("__decorate([\n    Local\n], Index.prototype, \"title\", void 0);\n"));
        assert!(out.contains("__decorate([\n    Param,\n    Once\n], Index.prototype, \"seed\", void 0);\n"));
    }

    #[test]
    fn test_v2_full_mode_rejected() {
        let program = parse_source("@ComponentV2\nstruct Index {\n  build() {\n  }\n}\n", "Index.ets").unwrap();
        let registry = Registry::collect(&program, "Index.ets");
        let tables = ComponentTables::standard();
        let options = TransformOptions {
            mode: RenderMode::Full,
            ..TransformOptions::default()
        };
        let mut lowerer = Lowerer::new(&tables, &registry, &options, "Index.ets");
        let decl = match &program.items[0] {
            Item::Struct(decl) => decl.clone(),
            _ => panic!("Expected struct"),
        };
        assert!(assemble(&mut lowerer, &decl).is_err());
    }

    #[test]
    fn test_missing_watch_handler() {
        let program = parse_source(
            "@Component\nstruct Index {\n  @State @Watch('gone') n: number = 0\n  build() {\n  }\n}\n",
            "Index.ets",
        )
        .unwrap();
        let registry = Registry::collect(&program, "Index.ets");
        let tables = ComponentTables::standard();
        let options = TransformOptions::default();
        let mut lowerer = Lowerer::new(&tables, &registry, &options, "Index.ets");
        let decl = match &program.items[0] {
            Item::Struct(decl) => decl.clone(),
            _ => panic!("Expected struct"),
        };
        assemble(&mut lowerer, &decl).unwrap();
        assert!(lowerer.finish().has_errors());
    }

    #[test]
    fn test_observed_v2_class() {
        let (out, decorates) = class_of(
            "@ObservedV2\nclass User {\n  @Trace name: string;\n  constructor(name: string) {\n    this.name = name;\n  }\n}\n",
        );
        assert!(decorates);
        assert_eq!(
            out,
            "let User = class User {\n    constructor(name) {\n        this.name = name;\n    }\n};\n__decorate([\n    Trace\n], User.prototype, \"name\", void 0);\nUser = __decorate([\n    ObservedV2\n], User);\n"
        );
    }

    #[test]
    fn test_plain_class_untouched() {
        let (out, decorates) = class_of("class Point {\n  x: number = 0\n  y: number\n}\n");
        assert!(!decorates);
        assert_eq!(out, "class Point {\n    x = 0;\n}\n");
    }
}
