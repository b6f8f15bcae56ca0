//! Abstract Syntax Tree types for the etsc compiler
//!
//! The tree covers the TypeScript subset that component sources use, plus the
//! ETS extensions: `struct` declarations, decorators on functions, trailing
//! closure children (`Column() { ... }`), leading-dot attribute bodies of
//! `@Styles`/`@Extend` functions and the `!!` two-way binding suffix.
//! Type annotations are erased by the parser; where a declared type matters
//! (wrapper selection) it is kept as normalized text.

/// Source position of a node, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Export {
    #[default]
    None,
    Named,
    Default,
}

#[derive(Debug, Clone)]
pub enum Item {
    Import(ImportDecl),
    /// `export { a, b as c } [from "m"]`
    ExportNamed {
        specifiers: Vec<(String, Option<String>)>,
        source: Option<String>,
    },
    /// `export * [as ns] from "m"`
    ExportAll {
        alias: Option<String>,
        source: String,
    },
    /// `export default <expr>`
    ExportDefault(Expr),
    Struct(StructDecl),
    Class(ClassDecl),
    Function(FunctionDecl),
    Enum(EnumDecl),
    Statement { stmt: Stmt, export: Export },
    /// Interfaces, type aliases and ambient declarations; nothing is emitted.
    Erased,
}

#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub default: Option<String>,
    pub namespace: Option<String>,
    pub named: Vec<(String, Option<String>)>,
    /// Module specifier, raw with quotes.
    pub source: String,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct Decorator {
    pub name: String,
    /// `None` for `@State`, `Some` for `@Watch("m")` and `@Provider()`.
    pub args: Option<Vec<Expr>>,
    pub pos: Pos,
}

impl Decorator {
    /// First argument when it is a string literal, unquoted.
    pub fn string_arg(&self) -> Option<String> {
        match self.args.as_ref()?.first()? {
            Expr::Str(raw) => Some(unquote(raw)),
            _ => None,
        }
    }

    pub fn first_arg(&self) -> Option<&Expr> {
        self.args.as_ref()?.first()
    }
}

/// A `struct` carrying component decorators.
#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub decorators: Vec<Decorator>,
    pub members: Vec<ClassMember>,
    pub export: Export,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: Option<String>,
    pub decorators: Vec<Decorator>,
    pub super_class: Option<Expr>,
    pub members: Vec<ClassMember>,
    pub export: Export,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub enum ClassMember {
    Property(PropertyDecl),
    Method(MethodDecl),
}

#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub key: PropKey,
    pub decorators: Vec<Decorator>,
    pub ty: Option<String>,
    pub init: Option<Expr>,
    pub is_static: bool,
    pub pos: Pos,
}

impl PropertyDecl {
    pub fn name(&self) -> String {
        self.key.name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
    Constructor,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub key: PropKey,
    pub decorators: Vec<Decorator>,
    pub kind: MethodKind,
    pub func: Function,
    pub is_static: bool,
    pub pos: Pos,
}

impl MethodDecl {
    pub fn name(&self) -> String {
        self.key.name()
    }

    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorators.iter().any(|d| d.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub decorators: Vec<Decorator>,
    pub func: Function,
    pub export: Export,
    pub pos: Pos,
}

impl FunctionDecl {
    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorators.iter().any(|d| d.name == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Function {
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub is_async: bool,
    pub is_generator: bool,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub pattern: Pattern,
    pub ty: Option<String>,
    pub default: Option<Expr>,
    pub rest: bool,
    /// Constructor parameter property (`constructor(private a: number)`).
    pub property: bool,
}

impl Param {
    pub fn simple(name: &str) -> Self {
        Param {
            pattern: Pattern::Ident(name.to_string()),
            ty: None,
            default: None,
            rest: false,
            property: false,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match &self.pattern {
            Pattern::Ident(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Ident(String),
    Object(Vec<ObjectPatternProp>),
    Array(Vec<Option<PatternElem>>),
}

#[derive(Debug, Clone)]
pub struct ObjectPatternProp {
    pub key: PropKey,
    pub value: Pattern,
    pub default: Option<Expr>,
    pub shorthand: bool,
    pub rest: bool,
}

#[derive(Debug, Clone)]
pub struct PatternElem {
    pub pattern: Pattern,
    pub default: Option<Expr>,
    pub rest: bool,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<(String, Option<Expr>)>,
    pub export: Export,
}

#[derive(Debug, Clone)]
pub enum PropKey {
    Ident(String),
    /// String or numeric literal key, raw.
    Literal(String),
    Computed(Box<Expr>),
}

impl PropKey {
    pub fn name(&self) -> String {
        match self {
            PropKey::Ident(name) => name.clone(),
            PropKey::Literal(raw) => unquote(raw),
            PropKey::Computed(_) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

impl VarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VarKind::Var => "var",
            VarKind::Let => "let",
            VarKind::Const => "const",
        }
    }
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub kind: VarKind,
    pub decls: Vec<VarDeclarator>,
}

#[derive(Debug, Clone)]
pub struct VarDeclarator {
    pub pattern: Pattern,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone)]
pub enum ForInit {
    Var(VarDecl),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    Var(VarDecl),
    Function(FunctionDecl),
    Class(ClassDecl),
    Return(Option<Expr>),
    If {
        test: Expr,
        cons: Box<Stmt>,
        alt: Option<Box<Stmt>>,
        pos: Pos,
    },
    Block(Vec<Stmt>),
    For {
        init: Option<ForInit>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        left: ForInit,
        right: Expr,
        body: Box<Stmt>,
        of: bool,
        is_await: bool,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        param: Option<Pattern>,
        handler: Option<Vec<Stmt>>,
        finalizer: Option<Vec<Stmt>>,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    Labeled {
        label: String,
        body: Box<Stmt>,
    },
    Empty,
}

impl Stmt {
    /// Synthesized statement printed verbatim.
    pub fn raw(code: impl Into<String>) -> Stmt {
        Stmt::Expr(Expr::Raw(code.into()))
    }

    /// `if (test) { body }` without an else branch.
    pub fn if_then(test: Expr, body: Vec<Stmt>) -> Stmt {
        Stmt::If {
            test,
            cons: Box::new(Stmt::Block(body)),
            alt: None,
            pos: Pos::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ObjectProp {
    KeyValue { key: PropKey, value: Expr },
    Shorthand(String),
    Method {
        key: PropKey,
        kind: MethodKind,
        func: Function,
    },
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum ArrowBody {
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub struct ArrowFn {
    pub params: Vec<Param>,
    pub body: ArrowBody,
    pub is_async: bool,
    /// Parameters were written inside parentheses.
    pub parens: bool,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Ident(String),
    This,
    Super,
    Number(String),
    /// String literal, raw with quotes.
    Str(String),
    Regex(String),
    Template {
        tag: Option<Box<Expr>>,
        quasis: Vec<String>,
        exprs: Vec<Expr>,
    },
    Array {
        elements: Vec<Option<Expr>>,
        multiline: bool,
    },
    Object {
        props: Vec<ObjectProp>,
        multiline: bool,
    },
    Function {
        name: Option<String>,
        func: Box<Function>,
    },
    Arrow(Box<ArrowFn>),
    Class(Box<ClassDecl>),
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        optional: bool,
        /// Child content block of a UI call: `Column() { ... }`.
        trailing: Option<Vec<Stmt>>,
        pos: Pos,
    },
    New {
        callee: Box<Expr>,
        args: Option<Vec<Expr>>,
        pos: Pos,
    },
    Unary {
        op: String,
        arg: Box<Expr>,
    },
    Update {
        op: String,
        prefix: bool,
        arg: Box<Expr>,
    },
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: String,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        cons: Box<Expr>,
        alt: Box<Expr>,
    },
    Sequence(Vec<Expr>),
    Spread(Box<Expr>),
    Paren(Box<Expr>),
    Await(Box<Expr>),
    Yield {
        arg: Option<Box<Expr>>,
        delegate: bool,
    },
    /// `expr!!` two-way binding.
    TwoWay(Box<Expr>),
    /// A leading-dot attribute chain inside `@Styles`/`@Extend` bodies:
    /// `.width(100).height(20)` with an implicit receiver.
    ImplicitChain(Vec<(String, Vec<Expr>)>),
    /// Synthesized code, printed verbatim.
    Raw(String),
}

impl Expr {
    pub fn ident(name: &str) -> Expr {
        Expr::Ident(name.to_string())
    }

    /// Double-quoted string literal.
    pub fn string(value: &str) -> Expr {
        Expr::Str(format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"")))
    }

    pub fn member(object: Expr, property: &str) -> Expr {
        Expr::Member {
            object: Box::new(object),
            property: property.to_string(),
            optional: false,
        }
    }

    /// `this.<name>`
    pub fn this_member(name: &str) -> Expr {
        Expr::member(Expr::This, name)
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            args,
            optional: false,
            trailing: None,
            pos: Pos::default(),
        }
    }

    /// `object.method(args)`
    pub fn method_call(object: Expr, method: &str, args: Vec<Expr>) -> Expr {
        Expr::call(Expr::member(object, method), args)
    }

    /// `(a, b) => { body }`
    pub fn arrow(params: &[&str], body: Vec<Stmt>) -> Expr {
        Expr::Arrow(Box::new(ArrowFn {
            params: params.iter().map(|p| Param::simple(p)).collect(),
            body: ArrowBody::Block(body),
            is_async: false,
            parens: true,
        }))
    }

    pub fn raw(code: impl Into<String>) -> Expr {
        Expr::Raw(code.into())
    }

    /// Identifier name when the expression is a bare identifier.
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// `name` when the expression is `this.name`.
    pub fn as_this_member(&self) -> Option<&str> {
        match self {
            Expr::Member {
                object, property, ..
            } if matches!(**object, Expr::This) => Some(property),
            _ => None,
        }
    }

    /// Drops redundant parentheses.
    pub fn unparen(&self) -> &Expr {
        match self {
            Expr::Paren(inner) => inner.unparen(),
            other => other,
        }
    }

    pub fn is_literal(&self) -> bool {
        match self {
            Expr::Number(_) | Expr::Str(_) | Expr::Regex(_) => true,
            Expr::Template { tag: None, exprs, .. } => exprs.is_empty(),
            Expr::Ident(name) => matches!(name.as_str(), "true" | "false" | "null" | "undefined"),
            Expr::Unary { op, arg } => op == "-" && matches!(**arg, Expr::Number(_)),
            _ => false,
        }
    }
}

/// Applies `f` to every expression below `stmts`, children first.
pub fn walk_stmts_mut(stmts: &mut [Stmt], f: &mut dyn FnMut(&mut Expr)) {
    for stmt in stmts {
        walk_stmt_mut(stmt, f);
    }
}

pub fn walk_stmt_mut(stmt: &mut Stmt, f: &mut dyn FnMut(&mut Expr)) {
    match stmt {
        Stmt::Expr(expr) | Stmt::Throw(expr) => walk_expr_mut(expr, f),
        Stmt::Return(arg) => {
            if let Some(arg) = arg {
                walk_expr_mut(arg, f);
            }
        }
        Stmt::Var(decl) => walk_var_mut(decl, f),
        Stmt::Function(decl) => walk_stmts_mut(&mut decl.func.body, f),
        Stmt::Class(decl) => walk_members_mut(&mut decl.members, f),
        Stmt::If { test, cons, alt, .. } => {
            walk_expr_mut(test, f);
            walk_stmt_mut(cons, f);
            if let Some(alt) = alt {
                walk_stmt_mut(alt, f);
            }
        }
        Stmt::Block(stmts) => walk_stmts_mut(stmts, f),
        Stmt::For {
            init,
            test,
            update,
            body,
        } => {
            match init {
                Some(ForInit::Var(decl)) => walk_var_mut(decl, f),
                Some(ForInit::Expr(expr)) => walk_expr_mut(expr, f),
                None => {}
            }
            for expr in [test, update].into_iter().flatten() {
                walk_expr_mut(expr, f);
            }
            walk_stmt_mut(body, f);
        }
        Stmt::ForIn { right, body, .. } => {
            walk_expr_mut(right, f);
            walk_stmt_mut(body, f);
        }
        Stmt::While { test, body } | Stmt::DoWhile { body, test } => {
            walk_expr_mut(test, f);
            walk_stmt_mut(body, f);
        }
        Stmt::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            walk_stmts_mut(block, f);
            for stmts in [handler, finalizer].into_iter().flatten() {
                walk_stmts_mut(stmts, f);
            }
        }
        Stmt::Switch { discriminant, cases } => {
            walk_expr_mut(discriminant, f);
            for case in cases {
                if let Some(test) = &mut case.test {
                    walk_expr_mut(test, f);
                }
                walk_stmts_mut(&mut case.body, f);
            }
        }
        Stmt::Labeled { body, .. } => walk_stmt_mut(body, f),
        Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty => {}
    }
}

fn walk_var_mut(decl: &mut VarDecl, f: &mut dyn FnMut(&mut Expr)) {
    for declarator in &mut decl.decls {
        if let Some(init) = &mut declarator.init {
            walk_expr_mut(init, f);
        }
    }
}

pub fn walk_members_mut(members: &mut [ClassMember], f: &mut dyn FnMut(&mut Expr)) {
    for member in members {
        match member {
            ClassMember::Property(prop) => {
                if let Some(init) = &mut prop.init {
                    walk_expr_mut(init, f);
                }
            }
            ClassMember::Method(method) => walk_stmts_mut(&mut method.func.body, f),
        }
    }
}

pub fn walk_expr_mut(expr: &mut Expr, f: &mut dyn FnMut(&mut Expr)) {
    match expr {
        Expr::Template { tag, exprs, .. } => {
            if let Some(tag) = tag {
                walk_expr_mut(tag, f);
            }
            for e in exprs {
                walk_expr_mut(e, f);
            }
        }
        Expr::Array { elements, .. } => {
            for e in elements.iter_mut().flatten() {
                walk_expr_mut(e, f);
            }
        }
        Expr::Object { props, .. } => {
            for prop in props {
                match prop {
                    ObjectProp::KeyValue { value, .. } => walk_expr_mut(value, f),
                    ObjectProp::Method { func, .. } => walk_stmts_mut(&mut func.body, f),
                    ObjectProp::Spread(e) => walk_expr_mut(e, f),
                    ObjectProp::Shorthand(_) => {}
                }
            }
        }
        Expr::Function { func, .. } => walk_stmts_mut(&mut func.body, f),
        Expr::Arrow(arrow) => match &mut arrow.body {
            ArrowBody::Expr(e) => walk_expr_mut(e, f),
            ArrowBody::Block(stmts) => walk_stmts_mut(stmts, f),
        },
        Expr::Class(decl) => walk_members_mut(&mut decl.members, f),
        Expr::Member { object, .. } => walk_expr_mut(object, f),
        Expr::Index { object, index, .. } => {
            walk_expr_mut(object, f);
            walk_expr_mut(index, f);
        }
        Expr::Call {
            callee,
            args,
            trailing,
            ..
        } => {
            walk_expr_mut(callee, f);
            for a in args {
                walk_expr_mut(a, f);
            }
            if let Some(stmts) = trailing {
                walk_stmts_mut(stmts, f);
            }
        }
        Expr::New { callee, args, .. } => {
            walk_expr_mut(callee, f);
            for a in args.iter_mut().flatten() {
                walk_expr_mut(a, f);
            }
        }
        Expr::Unary { arg, .. } | Expr::Update { arg, .. } => walk_expr_mut(arg, f),
        Expr::Binary { left, right, .. } => {
            walk_expr_mut(left, f);
            walk_expr_mut(right, f);
        }
        Expr::Assign { target, value, .. } => {
            walk_expr_mut(target, f);
            walk_expr_mut(value, f);
        }
        Expr::Conditional { test, cons, alt } => {
            walk_expr_mut(test, f);
            walk_expr_mut(cons, f);
            walk_expr_mut(alt, f);
        }
        Expr::Sequence(exprs) => {
            for e in exprs {
                walk_expr_mut(e, f);
            }
        }
        Expr::Spread(e) | Expr::Paren(e) | Expr::Await(e) | Expr::TwoWay(e) => walk_expr_mut(e, f),
        Expr::Yield { arg, .. } => {
            if let Some(arg) = arg {
                walk_expr_mut(arg, f);
            }
        }
        Expr::ImplicitChain(chain) => {
            for (_, args) in chain {
                for a in args {
                    walk_expr_mut(a, f);
                }
            }
        }
        Expr::Ident(_)
        | Expr::This
        | Expr::Super
        | Expr::Number(_)
        | Expr::Str(_)
        | Expr::Regex(_)
        | Expr::Raw(_) => {}
    }
    f(expr);
}

/// Strips the quotes off a raw string literal.
pub fn unquote(raw: &str) -> String {
    let mut chars = raw.chars();
    match (chars.next(), raw.chars().last()) {
        (Some(first), Some(last))
            if raw.len() >= 2 && first == last && matches!(first, '"' | '\'' | '`') =>
        {
            raw[1..raw.len() - 1].to_string()
        }
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'abc'"), "abc");
        assert_eq!(unquote("\"x\""), "x");
        assert_eq!(unquote("plain"), "plain");
    }

    #[test]
    fn test_string_literal_escapes() {
        match Expr::string("say \"hi\"") {
            Expr::Str(raw) => assert_eq!(raw, "\"say \\\"hi\\\"\""),
            _ => panic!("Expected string"),
        }
    }

    #[test]
    fn test_expression_shapes() {
        let e = Expr::this_member("count");
        assert_eq!(e.as_this_member(), Some("count"));
        assert!(Expr::ident("undefined").is_literal());
        let neg = Expr::Unary {
            op: "-".into(),
            arg: Box::new(Expr::Number("1".into())),
        };
        assert!(neg.is_literal());
        assert!(!Expr::this_member("a").is_literal());
    }

    #[test]
    fn test_walk_reaches_nested_calls() {
        let mut stmts = vec![Stmt::Expr(Expr::call(
            Expr::ident("f"),
            vec![Expr::arrow(&[], vec![Stmt::Expr(Expr::call(Expr::ident("g"), Vec::new()))])],
        ))];
        let mut seen = Vec::new();
        walk_stmts_mut(&mut stmts, &mut |e| {
            if let Expr::Call { callee, .. } = e {
                if let Some(name) = callee.as_ident() {
                    seen.push(name.to_string());
                }
            }
        });
        assert_eq!(seen, ["g", "f"]);
    }

    #[test]
    fn test_decorator_string_arg() {
        let d = Decorator {
            name: "Watch".into(),
            args: Some(vec![Expr::Str("'onChange'".into())]),
            pos: Pos::default(),
        };
        assert_eq!(d.string_arg().as_deref(), Some("onChange"));
    }
}
