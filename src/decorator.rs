//! Decorator classification
//!
//! Every struct field is mapped to exactly one [`WrapperKind`] by looking at
//! its decorator tags. The mapping is a pure function over the tag list;
//! combinations that are not explicitly allowed are rejected with a located
//! error instead of letting one decorator silently win.

use crate::ast::*;
use crate::error::{CompilerError, Result};
use serde::Serialize;

/// Which runtime base class a component compiles against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComponentFlavor {
    /// `@Component`, rendered through `ViewPU` (or `View` in full mode).
    V1,
    /// `@ComponentV2`, rendered through `ViewV2`.
    V2,
}

/// Arguments of `@Entry(...)`.
#[derive(Debug, Clone, Default)]
pub struct EntryInfo {
    /// `@Entry(storage)`: a bare storage expression.
    pub storage: Option<Expr>,
    /// `@Entry({ routeName: "r" })`
    pub route_name: Option<Expr>,
    pub use_shared_storage: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub name: String,
    pub flavor: ComponentFlavor,
    pub entry: Option<EntryInfo>,
    pub custom_dialog: bool,
    pub reusable: bool,
    pub preview: bool,
}

impl ComponentInfo {
    pub fn is_entry(&self) -> bool {
        self.entry.is_some()
    }
}

/// Ownership category of a component field.
#[derive(Debug, Clone)]
pub enum WrapperKind {
    Plain,
    State,
    Prop,
    Link,
    ObjectLink,
    Provide { alias: Option<Expr>, allow_override: bool },
    Consume { alias: Option<Expr> },
    StorageLink(Expr),
    StorageProp(Expr),
    LocalStorageLink(Expr),
    LocalStorageProp(Expr),
    BuilderParam,
    Local,
    Param { once: bool },
    Event,
    Provider { alias: Option<String> },
    Consumer { alias: Option<String> },
}

impl WrapperKind {
    pub fn label(&self) -> &'static str {
        match self {
            WrapperKind::Plain => "Plain",
            WrapperKind::State => "State",
            WrapperKind::Prop => "Prop",
            WrapperKind::Link => "Link",
            WrapperKind::ObjectLink => "ObjectLink",
            WrapperKind::Provide { .. } => "Provide",
            WrapperKind::Consume { .. } => "Consume",
            WrapperKind::StorageLink(_) => "StorageLink",
            WrapperKind::StorageProp(_) => "StorageProp",
            WrapperKind::LocalStorageLink(_) => "LocalStorageLink",
            WrapperKind::LocalStorageProp(_) => "LocalStorageProp",
            WrapperKind::BuilderParam => "BuilderParam",
            WrapperKind::Local => "Local",
            WrapperKind::Param { once: false } => "Param",
            WrapperKind::Param { once: true } => "Param+Once",
            WrapperKind::Event => "Event",
            WrapperKind::Provider { .. } => "Provider",
            WrapperKind::Consumer { .. } => "Consumer",
        }
    }

    /// Backed by a `__name` wrapper object with an accessor pair (V1 only).
    pub fn is_wrapped(&self) -> bool {
        matches!(
            self,
            WrapperKind::State
                | WrapperKind::Prop
                | WrapperKind::Link
                | WrapperKind::ObjectLink
                | WrapperKind::Provide { .. }
                | WrapperKind::Consume { .. }
                | WrapperKind::StorageLink(_)
                | WrapperKind::StorageProp(_)
                | WrapperKind::LocalStorageLink(_)
                | WrapperKind::LocalStorageProp(_)
        )
    }

    /// The child shares the parent's wrapper instead of a value.
    pub fn is_two_way(&self) -> bool {
        matches!(self, WrapperKind::Link)
    }

    /// Values that the parent pushes again on every re-render.
    pub fn updates_from_parent(&self) -> bool {
        matches!(
            self,
            WrapperKind::Prop | WrapperKind::ObjectLink | WrapperKind::Param { once: false }
        )
    }

    /// Seeded from construction parameters only when the parent supplies them.
    pub fn seeds_when_supplied(&self) -> bool {
        matches!(
            self,
            WrapperKind::Plain | WrapperKind::State | WrapperKind::Provide { .. } | WrapperKind::BuilderParam
        )
    }

    pub fn is_v2(&self) -> bool {
        matches!(
            self,
            WrapperKind::Local
                | WrapperKind::Param { .. }
                | WrapperKind::Event
                | WrapperKind::Provider { .. }
                | WrapperKind::Consumer { .. }
        )
    }
}

/// Classification result for one field.
#[derive(Debug, Clone)]
pub struct FieldClass {
    pub name: String,
    pub kind: WrapperKind,
    /// Method named by `@Watch`.
    pub watch: Option<String>,
    pub require: bool,
    pub pos: Pos,
}

/// Role of a struct method.
#[derive(Debug, Clone)]
pub enum MethodRole {
    Plain,
    Builder,
    Styles,
    Computed,
    Monitor(Vec<Expr>),
}

/// Observation marker of a plain class.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassObservation {
    None,
    Observed,
    ObservedV2 { traced: Vec<String> },
}

const V1_FIELD_DECORATORS: &[&str] = &[
    "State",
    "Prop",
    "Link",
    "ObjectLink",
    "Provide",
    "Consume",
    "StorageLink",
    "StorageProp",
    "LocalStorageLink",
    "LocalStorageProp",
];

const V2_FIELD_DECORATORS: &[&str] = &["Local", "Param", "Event", "Provider", "Consumer"];

const SHARED_FIELD_DECORATORS: &[&str] = &["BuilderParam"];

/// Decorators that modify a kind instead of choosing one.
const MODIFIER_DECORATORS: &[&str] = &["Watch", "Once", "Require"];

pub fn classify_component(decl: &StructDecl, file: &str) -> Result<ComponentInfo> {
    let mut info = ComponentInfo {
        name: decl.name.clone(),
        flavor: ComponentFlavor::V1,
        entry: None,
        custom_dialog: false,
        reusable: false,
        preview: false,
    };
    let mut v1 = false;
    let mut v2 = false;
    for decorator in &decl.decorators {
        match decorator.name.as_str() {
            "Component" => v1 = true,
            "ComponentV2" => v2 = true,
            "CustomDialog" => info.custom_dialog = true,
            "Reusable" => info.reusable = true,
            "Preview" => info.preview = true,
            "Entry" => info.entry = Some(entry_info(decorator)),
            other => {
                return Err(CompilerError::decorator(
                    file,
                    decorator.pos.line,
                    format!("'@{}' cannot decorate struct '{}'", other, decl.name),
                ))
            }
        }
    }
    if v1 && v2 {
        return Err(CompilerError::decorator(
            file,
            decl.pos.line,
            format!("struct '{}' cannot be both @Component and @ComponentV2", decl.name),
        ));
    }
    if !v1 && !v2 && !info.custom_dialog {
        return Err(CompilerError::decorator(
            file,
            decl.pos.line,
            format!("struct '{}' is missing a @Component or @ComponentV2 decorator", decl.name),
        ));
    }
    if v2 {
        info.flavor = ComponentFlavor::V2;
        if info.reusable || info.custom_dialog {
            return Err(CompilerError::decorator(
                file,
                decl.pos.line,
                format!("@ComponentV2 struct '{}' cannot be @Reusable or @CustomDialog", decl.name),
            ));
        }
    }
    Ok(info)
}

fn entry_info(decorator: &Decorator) -> EntryInfo {
    let mut entry = EntryInfo::default();
    match decorator.first_arg().map(Expr::unparen) {
        Some(Expr::Object { props, .. }) => {
            for prop in props {
                if let ObjectProp::KeyValue { key, value } = prop {
                    match key.name().as_str() {
                        "routeName" => entry.route_name = Some(value.clone()),
                        "storage" => entry.storage = Some(value.clone()),
                        "useSharedStorage" => entry.use_shared_storage = Some(value.clone()),
                        _ => {}
                    }
                }
            }
        }
        Some(expr) => entry.storage = Some(expr.clone()),
        None => {}
    }
    entry
}

/// Classifies one field of a component of the given flavor.
pub fn classify_field(prop: &PropertyDecl, flavor: ComponentFlavor, file: &str) -> Result<FieldClass> {
    let name = prop.name();
    let err = |line: usize, message: String| CompilerError::decorator(file, line, message);

    let mut ownership: Option<&Decorator> = None;
    let mut watch = None;
    let mut once = false;
    let mut require = false;
    for (i, decorator) in prop.decorators.iter().enumerate() {
        let dname = decorator.name.as_str();
        if prop.decorators[..i].iter().any(|d| d.name == dname) {
            return Err(err(
                decorator.pos.line,
                format!("duplicate decorator '@{}' on property '{}'", dname, name),
            ));
        }
        if dname == "Trace" {
            return Err(err(
                decorator.pos.line,
                format!("'@Trace' is only valid inside @ObservedV2 classes, found on '{}'", name),
            ));
        }
        let is_v1 = V1_FIELD_DECORATORS.contains(&dname);
        let is_v2 = V2_FIELD_DECORATORS.contains(&dname);
        if !is_v1 && !is_v2 && !SHARED_FIELD_DECORATORS.contains(&dname) && !MODIFIER_DECORATORS.contains(&dname) {
            return Err(err(
                decorator.pos.line,
                format!("unknown decorator '@{}' on property '{}'", dname, name),
            ));
        }
        if (is_v1 || dname == "Watch") && flavor == ComponentFlavor::V2 {
            return Err(err(
                decorator.pos.line,
                format!("'@{}' cannot be used in a @ComponentV2 struct", dname),
            ));
        }
        if (is_v2 || dname == "Once") && flavor == ComponentFlavor::V1 {
            return Err(err(
                decorator.pos.line,
                format!("'@{}' can only be used in a @ComponentV2 struct", dname),
            ));
        }
        match dname {
            "Watch" => {
                watch = Some(decorator.string_arg().ok_or_else(|| {
                    err(
                        decorator.pos.line,
                        format!("'@Watch' on '{}' needs a method name string", name),
                    )
                })?);
            }
            "Once" => once = true,
            "Require" => require = true,
            _ => {
                if let Some(previous) = ownership {
                    return Err(err(
                        decorator.pos.line,
                        format!(
                            "property '{}' cannot be decorated with both '@{}' and '@{}'",
                            name, previous.name, dname
                        ),
                    ));
                }
                ownership = Some(decorator);
            }
        }
    }

    let kind = match ownership {
        None => WrapperKind::Plain,
        Some(decorator) => ownership_kind(decorator, &name, file)?,
    };
    let line = prop.pos.line;
    if once && !matches!(kind, WrapperKind::Param { .. }) {
        return Err(err(line, format!("'@Once' on '{}' must be combined with '@Param'", name)));
    }
    let kind = match kind {
        WrapperKind::Param { .. } => WrapperKind::Param { once },
        other => other,
    };
    if watch.is_some() && matches!(kind, WrapperKind::Plain | WrapperKind::BuilderParam) {
        return Err(err(
            line,
            format!("'@Watch' on '{}' requires a state management decorator", name),
        ));
    }
    if require
        && !matches!(
            kind,
            WrapperKind::Plain | WrapperKind::Prop | WrapperKind::Param { .. } | WrapperKind::BuilderParam | WrapperKind::State
        )
    {
        return Err(err(
            line,
            format!("'@Require' cannot be combined with '@{}' on '{}'", kind.label(), name),
        ));
    }
    if prop.init.is_some()
        && matches!(kind, WrapperKind::Link | WrapperKind::ObjectLink | WrapperKind::Consume { .. })
    {
        return Err(err(
            line,
            format!("'@{}' property '{}' cannot be initialized locally", kind.label(), name),
        ));
    }
    if prop.is_static && !matches!(kind, WrapperKind::Plain) {
        return Err(err(line, format!("static property '{}' cannot be decorated", name)));
    }

    Ok(FieldClass {
        name,
        kind,
        watch,
        require,
        pos: prop.pos,
    })
}

fn ownership_kind(decorator: &Decorator, name: &str, file: &str) -> Result<WrapperKind> {
    let key = || -> Result<Expr> {
        decorator.first_arg().cloned().ok_or_else(|| {
            CompilerError::decorator(
                file,
                decorator.pos.line,
                format!("'@{}' on '{}' needs a storage key argument", decorator.name, name),
            )
        })
    };
    let kind = match decorator.name.as_str() {
        "State" => WrapperKind::State,
        "Prop" => WrapperKind::Prop,
        "Link" => WrapperKind::Link,
        "ObjectLink" => WrapperKind::ObjectLink,
        "Provide" => match decorator.first_arg().map(Expr::unparen) {
            Some(Expr::Object { props, .. }) => {
                let alias = props.iter().find_map(|p| match p {
                    ObjectProp::KeyValue { key, value } if key.name() == "allowOverride" => Some(value.clone()),
                    _ => None,
                });
                WrapperKind::Provide {
                    alias,
                    allow_override: true,
                }
            }
            other => WrapperKind::Provide {
                alias: other.cloned(),
                allow_override: false,
            },
        },
        "Consume" => WrapperKind::Consume {
            alias: decorator.first_arg().cloned(),
        },
        "StorageLink" => WrapperKind::StorageLink(key()?),
        "StorageProp" => WrapperKind::StorageProp(key()?),
        "LocalStorageLink" => WrapperKind::LocalStorageLink(key()?),
        "LocalStorageProp" => WrapperKind::LocalStorageProp(key()?),
        "BuilderParam" => WrapperKind::BuilderParam,
        "Local" => WrapperKind::Local,
        "Param" => WrapperKind::Param { once: false },
        "Event" => WrapperKind::Event,
        "Provider" => WrapperKind::Provider {
            alias: decorator.string_arg(),
        },
        "Consumer" => WrapperKind::Consumer {
            alias: decorator.string_arg(),
        },
        other => {
            return Err(CompilerError::decorator(
                file,
                decorator.pos.line,
                format!("unknown decorator '@{}' on property '{}'", other, name),
            ))
        }
    };
    Ok(kind)
}

/// Role of a struct method; `@Monitor` and `@Computed` are V2 only.
pub fn classify_method(method: &MethodDecl, flavor: ComponentFlavor, file: &str) -> Result<MethodRole> {
    let mut role = MethodRole::Plain;
    for decorator in &method.decorators {
        let next = match decorator.name.as_str() {
            "Builder" => MethodRole::Builder,
            "Styles" => MethodRole::Styles,
            "Computed" if method.kind == MethodKind::Getter && flavor == ComponentFlavor::V2 => {
                MethodRole::Computed
            }
            "Monitor" if flavor == ComponentFlavor::V2 => {
                MethodRole::Monitor(decorator.args.clone().unwrap_or_default())
            }
            "Computed" | "Monitor" => {
                return Err(CompilerError::decorator(
                    file,
                    decorator.pos.line,
                    format!(
                        "'@{}' on '{}' requires a @ComponentV2 struct{}",
                        decorator.name,
                        method.name(),
                        if decorator.name == "Computed" { " and a getter" } else { "" }
                    ),
                ))
            }
            other => {
                return Err(CompilerError::decorator(
                    file,
                    decorator.pos.line,
                    format!("'@{}' cannot decorate method '{}'", other, method.name()),
                ))
            }
        };
        if !matches!(role, MethodRole::Plain) {
            return Err(CompilerError::decorator(
                file,
                decorator.pos.line,
                format!("method '{}' has more than one decorator", method.name()),
            ));
        }
        role = next;
    }
    Ok(role)
}

/// Checks `@Observed`/`@ObservedV2`/`@Trace` usage on a plain class.
pub fn classify_class(decl: &ClassDecl, file: &str) -> Result<ClassObservation> {
    let name = decl.name.clone().unwrap_or_default();
    let mut observed = false;
    let mut observed_v2 = false;
    for decorator in &decl.decorators {
        match decorator.name.as_str() {
            "Observed" => observed = true,
            "ObservedV2" => observed_v2 = true,
            _ => {}
        }
    }
    if observed && observed_v2 {
        return Err(CompilerError::decorator(
            file,
            decl.pos.line,
            format!("class '{}' cannot be both @Observed and @ObservedV2", name),
        ));
    }
    let mut traced = Vec::new();
    for member in &decl.members {
        if let ClassMember::Property(prop) = member {
            for decorator in &prop.decorators {
                if decorator.name != "Trace" {
                    continue;
                }
                if !observed_v2 {
                    return Err(CompilerError::decorator(
                        file,
                        decorator.pos.line,
                        format!(
                            "'@Trace' on '{}' requires the class '{}' to be @ObservedV2",
                            prop.name(),
                            name
                        ),
                    ));
                }
                traced.push(prop.name());
            }
        }
    }
    Ok(if observed_v2 {
        ClassObservation::ObservedV2 { traced }
    } else if observed {
        ClassObservation::Observed
    } else {
        ClassObservation::None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn first_struct(source: &str) -> StructDecl {
        let program = parse_source(source, "test.ets").unwrap();
        program
            .items
            .into_iter()
            .find_map(|item| match item {
                Item::Struct(decl) => Some(decl),
                _ => None,
            })
            .expect("struct")
    }

    fn classify_all(source: &str) -> Result<Vec<FieldClass>> {
        let decl = first_struct(source);
        let info = classify_component(&decl, "test.ets")?;
        decl.members
            .iter()
            .filter_map(|m| match m {
                ClassMember::Property(p) => Some(classify_field(p, info.flavor, "test.ets")),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_v1_kinds() {
        let fields = classify_all(
            "@Component struct A {\n  @State a: number = 0\n  @Prop b: string\n  @Link c: number\n  @Provide('k') d: number = 1\n  @Consume e: number\n  plain: number = 2\n  build() {}\n}\n",
        )
        .unwrap();
        let labels: Vec<_> = fields.iter().map(|f| f.kind.label()).collect();
        assert_eq!(labels, ["State", "Prop", "Link", "Provide", "Consume", "Plain"]);
        assert!(fields[0].kind.is_wrapped());
        assert!(fields[2].kind.is_two_way());
        assert!(fields[1].kind.updates_from_parent());
        assert!(!fields[5].kind.is_wrapped());
    }

    #[test]
    fn test_provide_allow_override() {
        let fields =
            classify_all("@Component struct A {\n  @Provide({ allowOverride: 'x' }) d: number = 1\n  build() {}\n}\n")
                .unwrap();
        match &fields[0].kind {
            WrapperKind::Provide {
                alias: Some(Expr::Str(raw)),
                allow_override: true,
            } => assert_eq!(raw, "'x'"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_watch_and_require() {
        let fields =
            classify_all("@Component struct A {\n  @State @Watch('onA') a: number = 0\n  @Require @Prop b: number\n  build() {}\n}\n")
                .unwrap();
        assert_eq!(fields[0].watch.as_deref(), Some("onA"));
        assert!(fields[1].require);
    }

    #[test]
    fn test_two_ownership_decorators_rejected() {
        let err = classify_all("@Component struct A {\n  @State @Prop a: number = 0\n  build() {}\n}\n").unwrap_err();
        assert!(err.to_string().contains("both '@State' and '@Prop'"));
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_flavor_mismatch_rejected() {
        assert!(classify_all("@ComponentV2 struct A {\n  @State a: number = 0\n  build() {}\n}\n").is_err());
        assert!(classify_all("@Component struct A {\n  @Local a: number = 0\n  build() {}\n}\n").is_err());
    }

    #[test]
    fn test_once_requires_param() {
        let fields =
            classify_all("@ComponentV2 struct A {\n  @Param @Once a: number = 0\n  @Param b: number = 1\n  build() {}\n}\n")
                .unwrap();
        assert!(matches!(fields[0].kind, WrapperKind::Param { once: true }));
        assert!(!fields[0].kind.updates_from_parent());
        assert!(fields[1].kind.updates_from_parent());
        assert!(classify_all("@ComponentV2 struct A {\n  @Local @Once a: number = 0\n  build() {}\n}\n").is_err());
    }

    #[test]
    fn test_watch_on_plain_rejected() {
        assert!(classify_all("@Component struct A {\n  @Watch('f') a: number = 0\n  build() {}\n}\n").is_err());
    }

    #[test]
    fn test_unknown_decorator_rejected() {
        let err = classify_all("@Component struct A {\n  @Stat a: number = 0\n  build() {}\n}\n").unwrap_err();
        assert!(err.to_string().contains("unknown decorator '@Stat'"));
    }

    #[test]
    fn test_link_initializer_rejected() {
        assert!(classify_all("@Component struct A {\n  @Link a: number = 0\n  build() {}\n}\n").is_err());
    }

    #[test]
    fn test_storage_key_required() {
        let fields =
            classify_all("@Component struct A {\n  @StorageLink('k') a: number = 0\n  build() {}\n}\n").unwrap();
        assert!(matches!(fields[0].kind, WrapperKind::StorageLink(_)));
        assert!(classify_all("@Component struct A {\n  @StorageLink a: number = 0\n  build() {}\n}\n").is_err());
    }

    #[test]
    fn test_component_markers() {
        let decl = first_struct("@Entry({ routeName: 'home' })\n@Component\nstruct A {\n  build() {}\n}\n");
        let info = classify_component(&decl, "test.ets").unwrap();
        assert!(info.is_entry());
        assert!(info.entry.unwrap().route_name.is_some());

        let decl = first_struct("@Component @ComponentV2 struct B {\n  build() {}\n}\n");
        assert!(classify_component(&decl, "test.ets").is_err());

        let decl = first_struct("struct C {\n  build() {}\n}\n");
        assert!(classify_component(&decl, "test.ets").is_err());
    }

    #[test]
    fn test_trace_outside_observed_v2() {
        let program = parse_source("@Observed class A {\n  @Trace x: number = 0\n}\n", "test.ets").unwrap();
        let class = match &program.items[0] {
            Item::Class(decl) => decl.clone(),
            _ => panic!("Expected class"),
        };
        assert!(classify_class(&class, "test.ets").is_err());

        let program = parse_source("@ObservedV2 class B {\n  @Trace x: number = 0\n}\n", "test.ets").unwrap();
        let class = match &program.items[0] {
            Item::Class(decl) => decl.clone(),
            _ => panic!("Expected class"),
        };
        assert_eq!(
            classify_class(&class, "test.ets").unwrap(),
            ClassObservation::ObservedV2 {
                traced: vec!["x".to_string()]
            }
        );
    }
}
