//! Transform entry point
//!
//! Collects what every struct and global function declares, validates the
//! file, then lowers each declaration in source order and prints the result
//! behind the runtime preamble and the entry bootstrap.

use crate::ast::*;
use crate::component;
use crate::decorator::{
    classify_component, classify_field, classify_method, ComponentFlavor, EntryInfo, FieldClass, MethodRole,
    WrapperKind,
};
use crate::error::{CompilerError, Diagnostics};
use crate::printer::{print_expr, print_program};
use crate::render::Lowerer;
use crate::semantic;
use crate::tables::ComponentTables;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;

/// Runtime the generated code targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Fine-grained updates through `ViewPU`/`ViewV2`.
    #[default]
    Partial,
    /// Whole-render `View` runtime.
    Full,
}

impl FromStr for RenderMode {
    type Err = CompilerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "partial" => Ok(RenderMode::Partial),
            "full" => Ok(RenderMode::Full),
            other => Err(CompilerError::InvalidFormat {
                message: format!("unknown render mode '{}' (expected 'partial' or 'full')", other),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformOptions {
    pub mode: RenderMode,
    /// Page path recorded by named-route registration, e.g. `pages/Index`.
    pub page_path: String,
    /// Route name applied to the entry component when `@Entry` names none.
    pub route_name: Option<String>,
    pub bundle_name: String,
    pub module_name: String,
    /// Pass `{ page, line, col }` to child constructors.
    pub emit_source_position: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            mode: RenderMode::Partial,
            page_path: String::new(),
            route_name: None,
            bundle_name: String::new(),
            module_name: String::new(),
            emit_source_position: true,
        }
    }
}

/// What the rest of the file needs to know about one struct.
#[derive(Debug, Clone)]
pub struct ComponentSummary {
    pub name: String,
    pub flavor: ComponentFlavor,
    pub reusable: bool,
    pub custom_dialog: bool,
    pub fields: Vec<FieldClass>,
    /// `@Builder` methods; the flag marks a single `$$` parameter.
    pub builder_methods: HashMap<String, bool>,
    /// `@Styles` methods as attribute chains.
    pub styles: HashMap<String, Vec<(String, Vec<Expr>)>>,
    /// Field typed `CustomDialogController`.
    pub controller: Option<String>,
}

impl ComponentSummary {
    pub fn field(&self, name: &str) -> Option<&FieldClass> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The `@BuilderParam` a trailing closure is passed to, when there is exactly one.
    pub fn single_builder_param(&self) -> Option<&str> {
        let mut params = self
            .fields
            .iter()
            .filter(|f| matches!(f.kind, WrapperKind::BuilderParam));
        match (params.next(), params.next()) {
            (Some(field), None) => Some(&field.name),
            _ => None,
        }
    }
}

/// Declarations of one file, gathered before lowering.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub components: HashMap<String, ComponentSummary>,
    /// Global `@Builder` functions; the flag marks a single `$$` parameter.
    pub builders: HashMap<String, bool>,
    /// Global `@Styles` functions.
    pub styles: HashMap<String, Vec<(String, Vec<Expr>)>>,
    /// `(Type, name)` pairs of `@Extend(Type) function name`.
    pub extends: HashSet<(String, String)>,
    /// Other global functions.
    pub functions: HashSet<String>,
}

/// Attribute chain of a `@Styles`/`@Extend` body.
pub fn attribute_chain(body: &[Stmt]) -> Vec<(String, Vec<Expr>)> {
    body.iter()
        .filter_map(|stmt| match stmt {
            Stmt::Expr(Expr::ImplicitChain(chain)) => Some(chain.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

fn has_proxy_param(func: &Function) -> bool {
    func.params.len() == 1 && func.params[0].name() == Some("$$")
}

impl Registry {
    /// Declarations that fail classification are left out; validation
    /// reports them.
    pub fn collect(program: &Program, file: &str) -> Self {
        let mut registry = Registry::default();
        for item in &program.items {
            match item {
                Item::Struct(decl) => {
                    if let Ok(info) = classify_component(decl, file) {
                        registry
                            .components
                            .insert(decl.name.clone(), summarize(decl, info.flavor, info.reusable, info.custom_dialog, file));
                    }
                }
                Item::Function(decl) => {
                    if decl.has_decorator("Builder") {
                        registry.builders.insert(decl.name.clone(), has_proxy_param(&decl.func));
                    } else if decl.has_decorator("Styles") {
                        registry.styles.insert(decl.name.clone(), attribute_chain(&decl.func.body));
                    } else if let Some(target) = extend_target(decl) {
                        registry.extends.insert((target, decl.name.clone()));
                    } else {
                        registry.functions.insert(decl.name.clone());
                    }
                }
                _ => {}
            }
        }
        registry
    }
}

/// `Type` of `@Extend(Type)`.
pub fn extend_target(decl: &FunctionDecl) -> Option<String> {
    let extend = decl.decorators.iter().find(|d| d.name == "Extend")?;
    extend.first_arg()?.as_ident().map(str::to_string)
}

fn summarize(decl: &StructDecl, flavor: ComponentFlavor, reusable: bool, custom_dialog: bool, file: &str) -> ComponentSummary {
    let mut summary = ComponentSummary {
        name: decl.name.clone(),
        flavor,
        reusable,
        custom_dialog,
        fields: Vec::new(),
        builder_methods: HashMap::new(),
        styles: HashMap::new(),
        controller: None,
    };
    for member in &decl.members {
        match member {
            ClassMember::Property(prop) => {
                if prop.ty.as_deref() == Some("CustomDialogController") {
                    summary.controller = Some(prop.name());
                }
                if let Ok(class) = classify_field(prop, flavor, file) {
                    summary.fields.push(class);
                }
            }
            ClassMember::Method(method) => match classify_method(method, flavor, file) {
                Ok(MethodRole::Builder) => {
                    summary
                        .builder_methods
                        .insert(method.name(), has_proxy_param(&method.func));
                }
                Ok(MethodRole::Styles) => {
                    summary.styles.insert(method.name(), attribute_chain(&method.func.body));
                }
                _ => {}
            },
        }
    }
    summary
}

/// Result of transforming one file.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub code: String,
    pub diagnostics: Diagnostics,
    /// Number of component structs emitted.
    pub components: usize,
}

const DECORATE_HELPER: &str = "var __decorate = (this && this.__decorate) || function (decorators, target, key, desc) {
    var c = arguments.length, r = c < 3 ? target : desc === null ? desc = Object.getOwnPropertyDescriptor(target, key) : desc, d;
    if (typeof Reflect === \"object\" && typeof Reflect.decorate === \"function\") r = Reflect.decorate(decorators, target, key, desc);
    else for (var i = decorators.length - 1; i >= 0; i--) if (d = decorators[i]) r = (c < 3 ? d(r) : c > 3 ? d(target, key, r) : d(target, key)) || r;
    return c > 3 && r && Object.defineProperty(target, key, r), r;
};
";

const FINALIZE_GUARD: &str = "if (!(\"finalizeConstruction\" in ViewPU.prototype)) {
    Reflect.set(ViewPU.prototype, \"finalizeConstruction\", () => { });
}
";

/// File stem used for page names and generated ids.
pub fn file_stem(file: &str) -> String {
    Path::new(file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `animateTo(...)` and friends go through `Context`.
fn rewrite_context_calls(program: &mut Program, tables: &ComponentTables) {
    let mut rewrite = |expr: &mut Expr| {
        if let Expr::Call { callee, .. } = expr {
            let name = match callee.as_ident() {
                Some(name) if tables.is_context_call(name) => name.to_string(),
                _ => return,
            };
            **callee = Expr::member(Expr::ident("Context"), &name);
        }
    };
    for item in &mut program.items {
        match item {
            Item::Struct(decl) => walk_members_mut(&mut decl.members, &mut rewrite),
            Item::Class(decl) => walk_members_mut(&mut decl.members, &mut rewrite),
            Item::Function(decl) => walk_stmts_mut(&mut decl.func.body, &mut rewrite),
            Item::Statement { stmt, .. } => walk_stmt_mut(stmt, &mut rewrite),
            Item::ExportDefault(expr) => walk_expr_mut(expr, &mut rewrite),
            _ => {}
        }
    }
}

/// Transforms a parsed file. Declarations with errors are skipped and
/// reported; everything else is still emitted.
pub fn transform_program(
    program: &Program,
    tables: &ComponentTables,
    options: &TransformOptions,
    file: &str,
) -> TransformOutput {
    let mut program = program.clone();
    rewrite_context_calls(&mut program, tables);

    let registry = Registry::collect(&program, file);
    let validation = semantic::validate(&program, &registry, file);
    debug!(
        "{}: {} components, {} global builders, {} rejected",
        file,
        registry.components.len(),
        registry.builders.len(),
        validation.rejected.len()
    );

    let mut lowerer = Lowerer::new(tables, &registry, options, file);
    lowerer.diags.extend(validation.diagnostics);
    let mut items = Vec::new();
    let mut needs_decorate = false;
    let mut entry: Option<(String, ComponentFlavor, EntryInfo)> = None;
    let mut components = 0;

    for item in &program.items {
        match item {
            Item::Struct(decl) => {
                if validation.rejected.contains(&decl.name) {
                    debug!("skipping struct '{}'", decl.name);
                    continue;
                }
                match component::assemble(&mut lowerer, decl) {
                    Ok(assembled) => {
                        components += 1;
                        needs_decorate |= assembled.decorates;
                        if let Some(info) = assembled.entry {
                            entry = Some((decl.name.clone(), assembled.flavor, info));
                        }
                        items.extend(assembled.items);
                    }
                    Err(err) => lowerer.diags.push_error(&err),
                }
            }
            Item::Class(decl) => match component::assemble_class(decl, file) {
                Ok((class_items, decorates)) => {
                    needs_decorate |= decorates;
                    items.extend(class_items);
                }
                Err(err) => lowerer.diags.push_error(&err),
            },
            Item::Function(decl) if decl.has_decorator("Builder") => {
                items.push(Item::Function(lowerer.lower_builder_function(decl)));
            }
            Item::Function(decl) if decl.has_decorator("Styles") => {}
            Item::Function(decl) if extend_target(decl).is_some() => {
                if let Some(function) = lowerer.lower_extend_function(decl) {
                    items.push(Item::Function(function));
                }
            }
            other => items.push(other.clone()),
        }
    }

    let mut code = String::from("\"use strict\";\n");
    if needs_decorate {
        code.push_str(DECORATE_HELPER);
    }
    match options.mode {
        RenderMode::Partial => {
            if components > 0 {
                code.push_str(FINALIZE_GUARD);
            }
        }
        RenderMode::Full => {
            code.push_str(&format!(
                "let __generate__Id = 0;\nfunction generateId() {{\n    return \"{}_\" + ++__generate__Id;\n}}\n",
                file_stem(file)
            ));
        }
    }
    code.push_str(&print_program(&Program { items }));
    if let Some((name, flavor, info)) = entry {
        code.push_str(&bootstrap(&name, flavor, &info, options, file));
    }

    let diagnostics = lowerer.finish();
    info!(
        "{}: {} components, {} errors, {} warnings",
        file,
        components,
        diagnostics.error_count(),
        diagnostics.warning_count()
    );
    TransformOutput {
        code,
        diagnostics,
        components,
    }
}

/// Page registration or `loadDocument` call for the `@Entry` component.
fn bootstrap(name: &str, flavor: ComponentFlavor, info: &EntryInfo, options: &TransformOptions, file: &str) -> String {
    const START: &str =
        "ViewStackProcessor.StartGetAccessRecordingFor(ViewStackProcessor.AllocateNewElmetIdForNextComponent());";
    const STOP: &str = "ViewStackProcessor.StopGetAccessRecording();";

    if options.mode == RenderMode::Full {
        let storage = info
            .storage
            .as_ref()
            .map(|s| format!(", {}", print_expr(s)))
            .unwrap_or_default();
        return format!("loadDocument(new {}(\"1\", undefined, {{}}{}));\n", name, storage);
    }

    let page_path = if options.page_path.is_empty() {
        file_stem(file)
    } else {
        options.page_path.clone()
    };
    let route_info = format!(
        "{{ bundleName: \"{}\", moduleName: \"{}\", pagePath: \"{}\", pageFullPath: \"{}\", integratedHsp: \"false\" }}",
        options.bundle_name, options.module_name, page_path, page_path
    );
    let route = info
        .route_name
        .as_ref()
        .map(print_expr)
        .or_else(|| options.route_name.as_ref().map(|r| format!("\"{}\"", r)));
    let storage = match flavor {
        ComponentFlavor::V1 => info.storage.as_ref().map(print_expr),
        ComponentFlavor::V2 => None,
    };

    match (route, storage) {
        (Some(route), None) => format!(
            "registerNamedRoute(() => new {}(undefined, {{}}), {}, {});\n",
            name, route, route_info
        ),
        (Some(route), Some(storage)) => format!(
            "registerNamedRoute(() => new {}(undefined, {{}}, {}), {}, {});\n",
            name, storage, route, route_info
        ),
        (None, Some(storage)) if info.use_shared_storage.is_none() && is_plain_identifier(&storage) => {
            // a bare storage argument may also carry a route name at runtime
            format!(
                "if ({s} && {s}.routeName != undefined && {s}.storage != undefined) {{\n    registerNamedRoute(() => new {n}(undefined, {{}}, {s}.storage), {s}.routeName, {r});\n}}\n\
                 else if ({s} && {s}.routeName != undefined && {s}.storage == undefined) {{\n    registerNamedRoute(() => new {n}(undefined, {{}}), {s}.routeName, {r});\n}}\n\
                 else if ({s} && {s}.routeName == undefined && {s}.storage != undefined) {{\n    {start}\n    loadDocument(new {n}(undefined, {{}}, {s}.storage));\n    {stop}\n}}\n\
                 else {{\n    {start}\n    loadDocument(new {n}(undefined, {{}}, {s}));\n    {stop}\n}}\n",
                s = storage,
                n = name,
                r = route_info,
                start = START,
                stop = STOP
            )
        }
        (None, Some(storage)) => format!(
            "{}\nloadDocument(new {}(undefined, {{}}, {}));\n{}\n",
            START, name, storage, STOP
        ),
        (None, None) => format!("{}\nloadDocument(new {}(undefined, {{}}));\n{}\n", START, name, STOP),
    }
}

fn is_plain_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .map_or(false, |c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn transform(source: &str, mode: RenderMode) -> TransformOutput {
        let program = parse_source(source, "Index.ets").unwrap();
        let options = TransformOptions {
            mode,
            ..TransformOptions::default()
        };
        transform_program(&program, &ComponentTables::standard(), &options, "Index.ets")
    }

    const COUNTER: &str = "@Entry\n@Component\nstruct Index {\n  @State count: number = 0\n  build() {\n    Column() {\n      Button('+').onClick(() => { this.count++ })\n    }\n  }\n}\n";

    #[test]
    fn test_render_mode_from_str() {
        assert_eq!("full".parse::<RenderMode>().unwrap(), RenderMode::Full);
        assert!("fast".parse::<RenderMode>().is_err());
    }

    #[test]
    fn test_counter_scenario() {
        let out = transform(COUNTER, RenderMode::Partial);
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        assert_eq!(out.components, 1);
        let code = &out.code;
        assert!(code.starts_with("\"use strict\";\nif (!(\"finalizeConstruction\" in ViewPU.prototype))"));
        assert!(code.contains("this.__count = new ObservedPropertySimplePU(0, this, \"count\");"));
        assert!(code.contains("Button.createWithLabel('+');"));
        assert!(code.contains("Button.onClick(() => {\n                this.count++;\n            });"));
        assert!(code.contains("Button.pop();"));
        assert!(code.ends_with(
            "ViewStackProcessor.StartGetAccessRecordingFor(ViewStackProcessor.AllocateNewElmetIdForNextComponent());\nloadDocument(new Index(undefined, {}));\nViewStackProcessor.StopGetAccessRecording();\n"
        ));
    }

    #[test]
    fn test_transform_is_idempotent() {
        let first = transform(COUNTER, RenderMode::Partial).code;
        let second = transform(COUNTER, RenderMode::Partial).code;
        assert_eq!(first, second);
    }

    #[test]
    fn test_full_mode_preamble_and_bootstrap() {
        let out = transform(COUNTER, RenderMode::Full);
        assert!(out.code.starts_with(
            "\"use strict\";\nlet __generate__Id = 0;\nfunction generateId() {\n    return \"Index_\" + ++__generate__Id;\n}\n"
        ));
        assert!(out.code.contains("class Index extends View {"));
        assert!(out.code.ends_with("loadDocument(new Index(\"1\", undefined, {}));\n"));
    }

    #[test]
    fn test_named_route_bootstrap() {
        let source = COUNTER.replace("@Entry\n", "@Entry({ routeName: 'home' })\n");
        let out = transform(&source, RenderMode::Partial);
        assert!(out.code.ends_with(
            "registerNamedRoute(() => new Index(undefined, {}), 'home', { bundleName: \"\", moduleName: \"\", pagePath: \"Index\", pageFullPath: \"Index\", integratedHsp: \"false\" });\n"
        ));
    }

    #[test]
    fn test_storage_bootstrap_branches() {
        let source = format!("let storage = new LocalStorage();\n{}", COUNTER.replace("@Entry\n", "@Entry(storage)\n"));
        let out = transform(&source, RenderMode::Partial);
        assert!(out
            .code
            .contains("if (storage && storage.routeName != undefined && storage.storage != undefined) {"));
        assert!(out.code.contains("loadDocument(new Index(undefined, {}, storage));"));
    }

    #[test]
    fn test_animate_to_goes_through_context() {
        let source = "@Component\nstruct Index {\n  @State w: number = 1\n  grow() {\n    animateTo({ duration: 100 }, () => { this.w = 2 })\n  }\n  build() {\n    Column()\n  }\n}\n";
        let out = transform(source, RenderMode::Partial);
        assert!(out.code.contains("Context.animateTo({ duration: 100 }, () => {"));
    }

    #[test]
    fn test_invalid_struct_is_skipped_but_siblings_emitted() {
        let source = "@Component\nstruct Bad {\n  @State @Prop a: number = 0\n  build() {\n    Column()\n  }\n}\n@Component\nstruct Good {\n  build() {\n    Column()\n  }\n}\n";
        let out = transform(source, RenderMode::Partial);
        assert!(out.diagnostics.has_errors());
        assert!(!out.code.contains("class Bad"));
        assert!(out.code.contains("class Good extends ViewPU"));
    }

    #[test]
    fn test_registry_collects_declarations() {
        let program = parse_source(
            "@Builder function card($$: Model) {\n  Text($$.title)\n}\n@Styles function wide() {\n  .width('100%')\n}\n@Extend(Text) function big() {\n  .fontSize(40)\n}\nfunction helper() {}\n@Component\nstruct Index {\n  @BuilderParam content: () => void\n  dialog: CustomDialogController = new CustomDialogController({ builder: Dlg() })\n  build() {}\n}\n",
            "Index.ets",
        )
        .unwrap();
        let registry = Registry::collect(&program, "Index.ets");
        assert_eq!(registry.builders.get("card"), Some(&true));
        assert_eq!(registry.styles["wide"].len(), 1);
        assert!(registry.extends.contains(&("Text".to_string(), "big".to_string())));
        assert!(registry.functions.contains("helper"));
        let index = &registry.components["Index"];
        assert_eq!(index.single_builder_param(), Some("content"));
        assert_eq!(index.controller.as_deref(), Some("dialog"));
    }
}
