//! Control-flow lowering: `if`/`else`, `ForEach`, `LazyForEach` and `Repeat`.

use crate::ast::*;
use crate::render::{split_chain, Attr, Lowerer};

/// `if`/`else if`/`else` chain flattened into (condition, body) arms.
fn branch_arms(stmt: &Stmt) -> (Vec<(Expr, Vec<Stmt>)>, Option<Vec<Stmt>>) {
    let mut arms = Vec::new();
    let mut current = stmt;
    loop {
        match current {
            Stmt::If { test, cons, alt, .. } => {
                arms.push((test.clone(), block_body(cons)));
                match alt.as_deref() {
                    Some(next @ Stmt::If { .. }) => current = next,
                    Some(other) => return (arms, Some(block_body(other))),
                    None => return (arms, None),
                }
            }
            other => return (arms, Some(block_body(other))),
        }
    }
}

fn block_body(stmt: &Stmt) -> Vec<Stmt> {
    match stmt {
        Stmt::Block(stmts) => stmts.clone(),
        other => vec![other.clone()],
    }
}

/// Rebuilds an `if`/`else if` chain from lowered arms.
fn chain_arms(arms: Vec<(Expr, Vec<Stmt>)>, otherwise: Option<Vec<Stmt>>) -> Stmt {
    let mut result = otherwise.map(Stmt::Block);
    for (test, body) in arms.into_iter().rev() {
        result = Some(Stmt::If {
            test,
            cons: Box::new(Stmt::Block(body)),
            alt: result.map(Box::new),
            pos: Pos::default(),
        });
    }
    result.unwrap_or(Stmt::Empty)
}

/// `(param) => { body }` pieces of an item generator or key closure.
struct Closure {
    params: Vec<Param>,
    body: Vec<Stmt>,
}

fn closure(expr: &Expr) -> Option<Closure> {
    match expr.unparen() {
        Expr::Arrow(arrow) => Some(Closure {
            params: arrow.params.clone(),
            body: match &arrow.body {
                ArrowBody::Block(stmts) => stmts.clone(),
                ArrowBody::Expr(e) => vec![Stmt::Expr((**e).clone())],
            },
        }),
        Expr::Function { func, .. } => Some(Closure {
            params: func.params.clone(),
            body: func.body.clone(),
        }),
        _ => None,
    }
}

pub(crate) fn arrow_fn(params: Vec<Param>, body: Vec<Stmt>, parens: bool) -> Expr {
    Expr::Arrow(Box::new(ArrowFn {
        params,
        body: ArrowBody::Block(body),
        is_async: false,
        parens,
    }))
}

pub(crate) fn const_decl(name: &str, init: Expr) -> Stmt {
    Stmt::Var(VarDecl {
        kind: VarKind::Const,
        decls: vec![VarDeclarator {
            pattern: Pattern::Ident(name.to_string()),
            init: Some(init),
        }],
    })
}

/// Raw string literal passed to `.id(...)` on an element statement.
fn retake_id(stmt: &Stmt) -> Option<String> {
    let expr = match stmt {
        Stmt::Expr(expr) => expr,
        _ => return None,
    };
    let (_, chain) = split_chain(expr)?;
    chain.iter().rev().find(|attr| attr.name == "id").and_then(|attr| match attr.args.first() {
        Some(Expr::Str(raw)) => Some(raw.clone()),
        _ => None,
    })
}

impl<'a> Lowerer<'a> {
    pub fn lower_if(&mut self, stmt: &Stmt, out: &mut Vec<Stmt>) {
        let (arms, otherwise) = branch_arms(stmt);
        let partial = self.partial();
        let driver = self.driver();
        let mut index = 0;
        let mut wrap_branch = |lowerer: &mut Self, body: &[Stmt]| {
            let lowered = lowerer.with_scope(
                |s| s.in_branch = true,
                |l| {
                    if partial {
                        l.lower_retakable(body)
                    } else {
                        l.lower_stmts(body)
                    }
                },
            );
            let branch = if partial {
                vec![Stmt::Expr(Expr::method_call(
                    driver.clone(),
                    "ifElseBranchUpdateFunction",
                    vec![Expr::Number(index.to_string()), Expr::arrow(&[], lowered)],
                ))]
            } else {
                let mut stmts = vec![Stmt::raw(format!("If.branchId({})", index))];
                stmts.extend(lowered);
                stmts
            };
            index += 1;
            branch
        };

        let mut lowered_arms = Vec::new();
        for (test, body) in &arms {
            let branch = wrap_branch(self, body);
            lowered_arms.push((test.clone(), branch));
        }
        let otherwise = match otherwise {
            Some(body) => Some(wrap_branch(self, &body)),
            // the runtime clears the previous branch through an empty one
            None if partial => Some(vec![Stmt::Expr(Expr::method_call(
                driver.clone(),
                "ifElseBranchUpdateFunction",
                vec![Expr::Number(index.to_string()), Expr::raw("() => {\n}")],
            ))]),
            None => None,
        };

        let mut body = vec![Stmt::raw("If.create()"), chain_arms(lowered_arms, otherwise)];
        if partial {
            out.push(self.observe(body, Expr::ident("If")));
        } else {
            out.append(&mut body);
        }
        out.push(Stmt::raw("If.pop()"));
    }

    /// Lowers a branch body, guarding each element that carries a literal
    /// `.id(...)` so the runtime can reuse a retained node instead.
    fn lower_retakable(&mut self, body: &[Stmt]) -> Vec<Stmt> {
        let mut out = Vec::new();
        for stmt in body {
            let lowered = self.lower_stmts(std::slice::from_ref(stmt));
            match retake_id(stmt) {
                Some(id) => out.push(Stmt::If {
                    test: Expr::raw(format!("!If.canRetake({})", id)),
                    cons: Box::new(Stmt::Block(lowered)),
                    alt: None,
                    pos: Pos::default(),
                }),
                None => out.extend(lowered),
            }
        }
        out
    }

    /// `ForEach(source, generator[, key])` followed by its attributes.
    pub fn lower_for_each(&mut self, args: &[Expr], chain: &[Attr], pos: Pos, out: &mut Vec<Stmt>) {
        let (source, generator) = match (args.first(), args.get(1).and_then(closure)) {
            (Some(source), Some(generator)) => (source.clone(), generator),
            _ => {
                self.error(pos, "ForEach needs a data source and an item generator closure");
                return;
            }
        };
        let key = args.get(2).cloned();

        if !self.partial() {
            let id = self.next_id();
            let item_body = self.lower_stmts(&generator.body);
            let mut create_args = vec![
                Expr::string(&id),
                Expr::This,
                Expr::method_call(Expr::ident("ObservedObject"), "GetRawObject", vec![source]),
                arrow_fn(generator.params.clone(), item_body, true),
            ];
            create_args.extend(key);
            out.push(Stmt::Expr(Expr::method_call(Expr::ident("ForEach"), "create", create_args)));
            self.lower_attrs("ForEach", chain, out);
            out.push(Stmt::raw("ForEach.pop()"));
            return;
        }

        let mut params = vec![Param::simple("_item")];
        params.extend(generator.params.iter().skip(1).cloned());
        let gen_has_index = generator.params.len() > 1;
        let parens = params.len() > 1;
        let item_body = self.item_body(&generator);

        let mut body = vec![Stmt::raw("ForEach.create()")];
        self.lower_attrs("ForEach", chain, &mut body);
        body.push(const_decl("forEachItemGenFunction", arrow_fn(params, item_body, parens)));
        let mut update_args = vec![
            Expr::ident("elmtId"),
            source,
            Expr::ident("forEachItemGenFunction"),
        ];
        let key_has_index = key.as_ref().and_then(closure).map_or(false, |k| k.params.len() > 1);
        if key.is_some() || gen_has_index {
            update_args.push(key.unwrap_or_else(|| Expr::ident("undefined")));
            update_args.push(Expr::ident(if gen_has_index { "true" } else { "false" }));
            update_args.push(Expr::ident(if key_has_index { "true" } else { "false" }));
        }
        body.push(Stmt::Expr(Expr::method_call(
            self.driver(),
            "forEachUpdateFunction",
            update_args,
        )));
        out.push(self.observe(body, Expr::ident("ForEach")));
        out.push(Stmt::raw("ForEach.pop()"));
    }

    /// `const item = _item;` followed by the lowered generator body.
    fn item_body(&mut self, generator: &Closure) -> Vec<Stmt> {
        let item = generator
            .params
            .first()
            .and_then(Param::name)
            .unwrap_or("item")
            .to_string();
        let mut body = vec![const_decl(&item, Expr::ident("_item"))];
        body.extend(self.lower_stmts(&generator.body));
        body
    }

    pub fn lower_lazy_for_each(&mut self, args: &[Expr], chain: &[Attr], pos: Pos, out: &mut Vec<Stmt>) {
        let (source, generator) = match (args.first(), args.get(1).and_then(closure)) {
            (Some(source), Some(generator)) => (source.clone(), generator),
            _ => {
                self.error(pos, "LazyForEach needs a data source and an item generator closure");
                return;
            }
        };
        let key = args.get(2).cloned();
        let id = self.next_id();

        if !self.partial() {
            let mut item_body = vec![Stmt::raw("this.isRenderingInProgress = true")];
            item_body.extend(self.lower_stmts(&generator.body));
            item_body.push(Stmt::raw("this.isRenderingInProgress = false"));
            let mut create_args = vec![
                Expr::string(&id),
                Expr::This,
                Expr::method_call(Expr::ident("ObservedObject"), "GetRawObject", vec![source]),
                arrow_fn(generator.params.clone(), item_body, true),
            ];
            create_args.extend(key);
            out.push(Stmt::Expr(Expr::method_call(
                Expr::ident("LazyForEach"),
                "create",
                create_args,
            )));
            self.lower_attrs("LazyForEach", chain, out);
            out.push(Stmt::raw("LazyForEach.pop()"));
            return;
        }

        let mut params = vec![Param::simple("_item")];
        params.extend(generator.params.iter().skip(1).cloned());
        let parens = params.len() > 1;
        let item_body = self.item_body(&generator);

        let mut block = vec![const_decl(
            "__lazyForEachItemGenFunction",
            arrow_fn(params, item_body, parens),
        )];
        let mut create_args = vec![
            Expr::string(&id),
            Expr::This,
            source,
            Expr::ident("__lazyForEachItemGenFunction"),
        ];
        if let Some(key) = key {
            block.push(const_decl("__lazyForEachItemIdFunc", key));
            create_args.push(Expr::ident("__lazyForEachItemIdFunc"));
        }
        block.push(Stmt::Expr(Expr::method_call(
            Expr::ident("LazyForEach"),
            "create",
            create_args,
        )));
        self.lower_attrs("LazyForEach", chain, &mut block);
        block.push(Stmt::raw("LazyForEach.pop()"));
        out.push(Stmt::Block(block));
    }

    /// `Repeat(src).each(...).key(...)...` keeps its call order; item
    /// closures of `each` and `template` are lowered in place.
    pub fn lower_repeat(&mut self, args: &[Expr], chain: &[Attr], pos: Pos, out: &mut Vec<Stmt>) {
        if !self.partial() {
            self.error(pos, "Repeat is only supported in partial-update mode");
            return;
        }
        let source = match args.first() {
            Some(source) => source.clone(),
            None => {
                self.error(pos, "Repeat needs a data source");
                return;
            }
        };
        let mut call = Expr::call(Expr::ident("Repeat"), vec![source, self.driver()]);
        for attr in chain {
            let closure_index = match attr.name.as_str() {
                "each" => Some(0),
                "template" => Some(1),
                _ => None,
            };
            let args = attr
                .args
                .iter()
                .enumerate()
                .map(|(i, arg)| match (closure_index == Some(i), closure(arg)) {
                    (true, Some(item)) => {
                        let body = self.lower_stmts(&item.body);
                        arrow_fn(item.params, body, true)
                    }
                    _ => arg.clone(),
                })
                .collect();
            call = Expr::method_call(call, &attr.name, args);
        }
        let call = Expr::method_call(call, "render", vec![Expr::ident("isInitialRender")]);
        out.push(self.observe(vec![Stmt::Expr(call)], Expr::ident("Repeat")));
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parser::parse_source;
    use crate::printer::print_stmts;
    use crate::render::Lowerer;
    use crate::tables::ComponentTables;
    use crate::transform::{Registry, RenderMode, TransformOptions};

    fn lower_with(build: &str, mode: RenderMode) -> String {
        let source = format!(
            "@Component\nstruct Index {{\n  @State arr: string[] = []\n  build() {{\n{}\n  }}\n}}\n",
            build
        );
        let program = parse_source(&source, "test.ets").unwrap();
        let registry = Registry::collect(&program, "test.ets");
        let body = program
            .items
            .iter()
            .find_map(|item| match item {
                Item::Struct(decl) => decl.members.iter().find_map(|m| match m {
                    ClassMember::Method(m) if m.name() == "build" => Some(m.func.body.clone()),
                    _ => None,
                }),
                _ => None,
            })
            .unwrap();
        let tables = ComponentTables::standard();
        let options = TransformOptions {
            mode,
            ..TransformOptions::default()
        };
        let mut lowerer = Lowerer::new(&tables, &registry, &options, "test.ets");
        lowerer.scope.component = Some("Index".into());
        print_stmts(&lowerer.lower_stmts(&body))
    }

    fn lower(build: &str) -> String {
        lower_with(build, RenderMode::Partial)
    }

    #[test]
    fn test_if_else_chain() {
        let out = lower("if (this.a) {\n  Text('a')\n} else if (this.b) {\n  Text('b')\n} else {\n  Divider()\n}");
        assert!(out.starts_with("this.observeComponentCreation2((elmtId, isInitialRender) => {\n    If.create();\n    if (this.a) {\n        this.ifElseBranchUpdateFunction(0, () => {"));
        assert!(out.contains("else if (this.b) {\n        this.ifElseBranchUpdateFunction(1, () => {"));
        assert!(out.contains("else {\n        this.ifElseBranchUpdateFunction(2, () => {"));
        assert!(out.ends_with("}, If);\nIf.pop();\n"));
    }

    #[test]
    fn test_missing_else_gets_empty_branch() {
        let out = lower("if (this.a) {\n  Text('a')\n}");
        assert!(out.contains("else {\n        this.ifElseBranchUpdateFunction(1, () => {\n        });\n    }"));
    }

    #[test]
    fn test_branch_element_with_id_is_retake_guarded() {
        let out = lower("if (this.a) {\n  Column() {\n    Text('a').id('id5')\n  }.id('id10')\n  Divider()\n}");
        assert!(out.contains(
            "this.ifElseBranchUpdateFunction(0, () => {\n            if (!If.canRetake('id10')) {\n                this.observeComponentCreation2("
        ));
        assert!(out.contains("Column.pop();\n            }\n"));
        assert_eq!(out.matches("If.canRetake").count(), 1);
    }

    #[test]
    fn test_retake_guard_needs_literal_id() {
        let out = lower("if (this.a) Text('odd').id(this.key)");
        assert!(!out.contains("canRetake"));
        let out = lower("if (this.a) Text('odd').id('id7')");
        assert!(out.contains("if (!If.canRetake('id7')) {"));
        let full = lower_with("if (this.a) Text('odd').id('id7')", RenderMode::Full);
        assert!(!full.contains("canRetake"));
    }

    #[test]
    fn test_branch_ids_are_stable() {
        let source = "if (this.a) {\n  Text('a')\n} else {\n  Text('b')\n}";
        assert_eq!(lower(source), lower(source));
    }

    #[test]
    fn test_full_mode_if() {
        let out = lower_with("if (this.a) {\n  Text('a')\n}", RenderMode::Full);
        assert_eq!(
            out,
            "If.create();\nif (this.a) {\n    If.branchId(0);\n    Text.create('a');\n    Text.pop();\n}\nIf.pop();\n"
        );
    }

    #[test]
    fn test_for_each_without_key() {
        let out = lower("List() {\n  ForEach(this.arr, item => {\n    Text(item)\n  })\n}");
        assert!(out.contains(
            "    ForEach.create();\n    const forEachItemGenFunction = _item => {\n        const item = _item;\n"
        ));
        assert!(out.contains("this.forEachUpdateFunction(elmtId, this.arr, forEachItemGenFunction);\n}, ForEach);\nForEach.pop();\n"));
    }

    #[test]
    fn test_for_each_with_index_and_key() {
        let out = lower("ForEach(this.arr, (item, index) => {\n  Text(item)\n}, item => item.toString())");
        assert!(out.contains("const forEachItemGenFunction = (_item, index) => {"));
        assert!(out.contains(
            "this.forEachUpdateFunction(elmtId, this.arr, forEachItemGenFunction, item => item.toString(), true, false);"
        ));
    }

    #[test]
    fn test_for_each_attributes_follow_create() {
        let out = lower("ForEach(this.arr, item => {\n  Text(item)\n}).onMove((from, to) => { })");
        assert!(out.contains("ForEach.create();\n    ForEach.onMove((from, to) => { });\n    const forEachItemGenFunction"));
    }

    #[test]
    fn test_full_mode_for_each() {
        let out = lower_with("ForEach(this.arr, (item) => {\n  Text(item)\n})", RenderMode::Full);
        assert!(out.starts_with("ForEach.create(\"2\", this, ObservedObject.GetRawObject(this.arr), (item) => {"));
        assert!(out.ends_with("ForEach.pop();\n"));
    }

    #[test]
    fn test_lazy_for_each() {
        let out = lower("LazyForEach(this.data, (item) => {\n  Text(item)\n}, item => item)");
        assert!(out.starts_with("{\n    const __lazyForEachItemGenFunction = _item => {\n        const item = _item;"));
        assert!(out.contains("const __lazyForEachItemIdFunc = item => item;"));
        assert!(out.contains(
            "LazyForEach.create(\"1\", this, this.data, __lazyForEachItemGenFunction, __lazyForEachItemIdFunc);\n    LazyForEach.pop();\n}"
        ));

        let out = lower("LazyForEach(this.data, (item) => {\n  Text(item)\n})");
        assert!(!out.contains("__lazyForEachItemIdFunc"));
    }

    #[test]
    fn test_full_mode_lazy_for_each() {
        let out = lower_with("LazyForEach(this.data, (item) => {\n  Text(item)\n})", RenderMode::Full);
        assert!(out.contains("(item) => {\n    this.isRenderingInProgress = true;\n    Text.create(item);"));
        assert!(out.contains("this.isRenderingInProgress = false;\n});\nLazyForEach.pop();"));
    }

    #[test]
    fn test_repeat_keeps_call_order() {
        let out = lower("Repeat(this.arr).each((obj) => {\n  Text(obj.item)\n}).key((item) => item)");
        assert!(out.starts_with("this.observeComponentCreation2((elmtId, isInitialRender) => {\n    Repeat(this.arr, this).each((obj) => {\n        this.observeComponentCreation2("));
        assert!(out.contains("}).key((item) => item).render(isInitialRender);\n}, Repeat);"));
    }
}
