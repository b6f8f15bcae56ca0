//! Recursive descent parser for ETS sources
//!
//! Produces the tree in [`crate::ast`]. Type annotations are consumed and
//! erased; the text of field types is kept for wrapper selection.

use crate::ast::*;
use crate::error::{CompilerError, Result};
use crate::lexer::{Lexer, Token, TokenType};

const BINARY_PRECEDENCE: &[(&str, u8)] = &[
    ("??", 1),
    ("||", 2),
    ("&&", 3),
    ("|", 4),
    ("^", 5),
    ("&", 6),
    ("==", 7),
    ("!=", 7),
    ("===", 7),
    ("!==", 7),
    ("<", 8),
    (">", 8),
    ("<=", 8),
    (">=", 8),
    ("instanceof", 8),
    ("in", 8),
    ("<<", 9),
    (">>", 9),
    (">>>", 9),
    ("+", 10),
    ("-", 10),
    ("*", 11),
    ("/", 11),
    ("%", 11),
    ("**", 12),
];

const ASSIGN_OPS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "**=", "<<=", ">>=", ">>>=", "&=", "|=", "^=", "&&=",
    "||=", "??=",
];

const MEMBER_MODIFIERS: &[&str] = &[
    "public", "private", "protected", "readonly", "static", "declare", "abstract", "override",
    "accessor",
];

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    filename: String,
    /// Disables `in` as a binary operator inside `for (...)` heads.
    no_in: bool,
    /// Disables trailing closures while parsing class heritage clauses.
    no_trailing: bool,
    /// Allows `.attr()` statements with an implicit receiver.
    implicit_chain: bool,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, filename: impl Into<String>) -> Self {
        Self {
            tokens,
            current: 0,
            filename: filename.into(),
            no_in: false,
            no_trailing: false,
            implicit_chain: false,
        }
    }

    pub fn parse(&mut self) -> Result<Program> {
        let mut items = Vec::new();
        while !self.is_at_end() {
            items.push(self.parse_item()?);
        }
        log::debug!("Parsed {} top-level items from {}", items.len(), self.filename);
        Ok(Program { items })
    }

    fn parse_item(&mut self) -> Result<Item> {
        if self.check_ident("import") && !self.check_next_punct("(") && !self.check_next_punct(".") {
            return Ok(self.parse_import()?.map_or(Item::Erased, Item::Import));
        }

        let decorators = self.parse_decorators()?;

        let mut export = Export::None;
        if self.check_ident("export") {
            self.advance();
            if self.match_ident("default") {
                export = Export::Default;
                if !self.is_declaration_start() {
                    let expr = self.parse_assignment()?;
                    self.consume_semicolon()?;
                    return Ok(Item::ExportDefault(expr));
                }
            } else if self.check_punct("{") {
                return self.parse_export_named();
            } else if self.check_punct("*") {
                return self.parse_export_all();
            } else {
                export = Export::Named;
            }
        }
        // decorators may also follow `export`
        let mut decorators = decorators;
        decorators.extend(self.parse_decorators()?);

        if self.check_ident("struct") {
            return self.parse_struct(decorators, export).map(Item::Struct);
        }
        if self.check_ident("class") || (self.check_ident("abstract") && self.check_next_ident("class")) {
            self.match_ident("abstract");
            return self.parse_class(decorators, export).map(Item::Class);
        }
        if self.check_ident("function") || (self.check_ident("async") && self.check_next_ident("function")) {
            return self.parse_function_decl(decorators, export).map(Item::Function);
        }
        if self.check_ident("enum") || (self.check_ident("const") && self.check_next_ident("enum")) {
            self.match_ident("const");
            return self.parse_enum(export).map(Item::Enum);
        }
        if self.is_erased_declaration() {
            self.skip_erased_declaration()?;
            return Ok(Item::Erased);
        }
        if let Some(dec) = decorators.first() {
            return Err(CompilerError::parse(
                self.filename.clone(),
                dec.pos.line,
                format!("Decorator '@{}' must precede a declaration", dec.name),
            ));
        }
        let stmt = self.parse_statement()?;
        Ok(Item::Statement { stmt, export })
    }

    fn is_declaration_start(&self) -> bool {
        ["struct", "class", "function", "abstract", "async", "enum", "interface"]
            .iter()
            .any(|kw| self.check_ident(kw))
            || self.check_punct("@")
    }

    fn is_erased_declaration(&self) -> bool {
        if self.check_ident("interface") || self.check_ident("declare") {
            return matches!(self.peek_at(1).token_type, TokenType::Identifier(_));
        }
        if self.check_ident("type") || self.check_ident("namespace") || self.check_ident("module") {
            return matches!(self.peek_at(1).token_type, TokenType::Identifier(_))
                && !self.peek_at(1).newline_before;
        }
        false
    }

    fn skip_erased_declaration(&mut self) -> Result<()> {
        let keyword = self.advance().ident().unwrap_or_default().to_string();
        if keyword == "type" {
            self.advance();
            if self.check_punct("<") {
                self.skip_angle_brackets()?;
            }
            self.consume_punct("=", "Expected '=' in type alias")?;
            self.parse_type()?;
            return self.consume_semicolon();
        }
        if keyword != "declare" {
            // interface, namespace or module: skip the head, then the body
            while !self.check_punct("{") {
                if self.is_at_end() {
                    return Err(self.error(format!("Expected '{{' in {} declaration", keyword)));
                }
                self.advance();
            }
            return self.skip_balanced("{", "}");
        }
        let mut depth = 0usize;
        while !self.is_at_end() {
            let token = self.advance().clone();
            if token.is_punct("{") || token.is_punct("(") || token.is_punct("[") {
                depth += 1;
            } else if token.is_punct("}") || token.is_punct(")") || token.is_punct("]") {
                depth = depth.saturating_sub(1);
                if depth == 0 && token.is_punct("}") {
                    break;
                }
            } else if token.is_punct(";") && depth == 0 {
                break;
            }
            let continues = ["{", "|", "&", ".", "=>"].iter().any(|p| self.check_punct(p));
            if depth == 0 && self.peek().newline_before && !continues {
                break;
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Modules
    // ---------------------------------------------------------------------

    /// `None` for type-only imports, which are erased.
    fn parse_import(&mut self) -> Result<Option<ImportDecl>> {
        let pos = self.pos();
        self.advance();
        let mut decl = ImportDecl {
            default: None,
            namespace: None,
            named: Vec::new(),
            source: String::new(),
            pos,
        };
        if let TokenType::String(raw) = &self.peek().token_type {
            decl.source = raw.clone();
            self.advance();
            self.consume_semicolon()?;
            return Ok(Some(decl));
        }
        let type_only = self.check_ident("type") && !self.check_next_ident("from") && !self.check_next_punct(",");
        if type_only {
            self.advance();
        }
        if let Some(name) = self.peek().ident().map(str::to_string) {
            if name != "from" || self.check_next_ident("from") {
                self.advance();
                decl.default = Some(name);
                self.match_punct(",");
            }
        }
        if self.match_punct("*") {
            self.expect_ident("as")?;
            decl.namespace = Some(self.expect_identifier("Expected namespace name")?);
        }
        if self.match_punct("{") {
            decl.named = self.parse_specifiers()?;
        }
        self.expect_ident("from")?;
        decl.source = match self.advance().token_type.clone() {
            TokenType::String(raw) => raw,
            other => {
                return Err(self.error(format!("Expected module specifier, found {}", other)));
            }
        };
        self.consume_semicolon()?;
        Ok(if type_only { None } else { Some(decl) })
    }

    /// Parses `a, b as c }` after an opening brace.
    fn parse_specifiers(&mut self) -> Result<Vec<(String, Option<String>)>> {
        let mut specifiers = Vec::new();
        while !self.check_punct("}") {
            if self.check_ident("type") && matches!(self.peek_at(1).token_type, TokenType::Identifier(_)) && !self.check_next_ident("as") {
                self.advance();
            }
            let name = self.expect_identifier("Expected import/export name")?;
            let alias = if self.match_ident("as") {
                Some(self.expect_identifier("Expected alias")?)
            } else {
                None
            };
            specifiers.push((name, alias));
            if !self.match_punct(",") {
                break;
            }
        }
        self.consume_punct("}", "Expected '}' after specifiers")?;
        Ok(specifiers)
    }

    fn parse_export_named(&mut self) -> Result<Item> {
        self.advance();
        let specifiers = self.parse_specifiers()?;
        let source = if self.match_ident("from") {
            match self.advance().token_type.clone() {
                TokenType::String(raw) => Some(raw),
                other => return Err(self.error(format!("Expected module specifier, found {}", other))),
            }
        } else {
            None
        };
        self.consume_semicolon()?;
        Ok(Item::ExportNamed { specifiers, source })
    }

    fn parse_export_all(&mut self) -> Result<Item> {
        self.advance();
        let alias = if self.match_ident("as") {
            Some(self.expect_identifier("Expected namespace alias")?)
        } else {
            None
        };
        self.expect_ident("from")?;
        let source = match self.advance().token_type.clone() {
            TokenType::String(raw) => raw,
            other => return Err(self.error(format!("Expected module specifier, found {}", other))),
        };
        self.consume_semicolon()?;
        Ok(Item::ExportAll { alias, source })
    }

    // ---------------------------------------------------------------------
    // Declarations
    // ---------------------------------------------------------------------

    fn parse_decorators(&mut self) -> Result<Vec<Decorator>> {
        let mut decorators = Vec::new();
        while self.check_punct("@") {
            let pos = self.pos();
            self.advance();
            let mut name = self.expect_identifier("Expected decorator name")?;
            while self.check_punct(".") && !self.peek().newline_before {
                self.advance();
                name.push('.');
                name.push_str(&self.expect_identifier("Expected decorator name")?);
            }
            let args = if self.check_punct("(") && !self.peek().newline_before {
                self.advance();
                Some(self.parse_arguments()?)
            } else {
                None
            };
            decorators.push(Decorator { name, args, pos });
        }
        Ok(decorators)
    }

    fn parse_struct(&mut self, decorators: Vec<Decorator>, export: Export) -> Result<StructDecl> {
        let pos = self.pos();
        self.advance();
        let name = self.expect_identifier("Expected struct name")?;
        if self.check_punct("<") {
            self.skip_angle_brackets()?;
        }
        let members = self.parse_class_body()?;
        Ok(StructDecl {
            name,
            decorators,
            members,
            export,
            pos,
        })
    }

    fn parse_class(&mut self, decorators: Vec<Decorator>, export: Export) -> Result<ClassDecl> {
        let pos = self.pos();
        self.advance();
        let name = match self.peek().ident() {
            Some(id) if id != "extends" && id != "implements" => {
                let id = id.to_string();
                self.advance();
                Some(id)
            }
            _ => None,
        };
        if self.check_punct("<") {
            self.skip_angle_brackets()?;
        }
        let mut super_class = None;
        if self.match_ident("extends") {
            let saved = self.no_trailing;
            self.no_trailing = true;
            super_class = Some(self.parse_call_member()?);
            self.no_trailing = saved;
            if self.check_punct("<") {
                self.skip_angle_brackets()?;
            }
        }
        if self.match_ident("implements") {
            loop {
                self.parse_type()?;
                if !self.match_punct(",") {
                    break;
                }
            }
        }
        let members = self.parse_class_body()?;
        Ok(ClassDecl {
            name,
            decorators,
            super_class,
            members,
            export,
            pos,
        })
    }

    fn parse_class_body(&mut self) -> Result<Vec<ClassMember>> {
        self.consume_punct("{", "Expected '{' to open class body")?;
        let mut members = Vec::new();
        while !self.check_punct("}") {
            if self.is_at_end() {
                return Err(self.error("Unterminated class body"));
            }
            if self.match_punct(";") {
                continue;
            }
            if let Some(member) = self.parse_class_member()? {
                members.push(member);
            }
        }
        self.advance();
        Ok(members)
    }

    fn parse_class_member(&mut self) -> Result<Option<ClassMember>> {
        let decorators = self.parse_decorators()?;
        let pos = self.pos();
        let mut is_static = false;
        let mut is_async = false;
        let mut is_generator = false;

        // modifiers are only modifiers when followed by another member token
        loop {
            let word = match self.peek().ident() {
                Some(w) => w.to_string(),
                None => break,
            };
            let next = self.peek_at(1);
            let followed_by_key = !next.newline_before
                && (matches!(next.token_type, TokenType::Identifier(_) | TokenType::String(_) | TokenType::Number(_))
                    || next.is_punct("[")
                    || next.is_punct("*")
                    || next.is_punct("#"));
            if MEMBER_MODIFIERS.contains(&word.as_str()) && followed_by_key {
                if word == "static" {
                    is_static = true;
                }
                self.advance();
            } else if word == "async" && followed_by_key {
                is_async = true;
                self.advance();
            } else {
                break;
            }
        }
        if self.match_punct("*") {
            is_generator = true;
        }

        // index signature `[key: string]: T;`
        if self.check_punct("[")
            && matches!(self.peek_at(1).token_type, TokenType::Identifier(_))
            && self.peek_at(2).is_punct(":")
        {
            self.skip_balanced("[", "]")?;
            if self.match_punct(":") {
                self.parse_type()?;
            }
            self.consume_semicolon()?;
            return Ok(None);
        }

        let mut kind = MethodKind::Method;
        if (self.check_ident("get") || self.check_ident("set"))
            && !self.check_next_punct("(")
            && !self.check_next_punct(":")
            && !self.check_next_punct("=")
            && !self.check_next_punct(";")
            && !self.peek_at(1).newline_before
        {
            kind = if self.check_ident("get") {
                MethodKind::Getter
            } else {
                MethodKind::Setter
            };
            self.advance();
        }

        let key = self.parse_property_key()?;
        if matches!(&key, PropKey::Ident(name) if name == "constructor") && self.check_punct("(") {
            kind = MethodKind::Constructor;
        }

        // optional / definite markers
        if self.check_punct("?") || self.check_punct("!") {
            self.advance();
        }

        if self.check_punct("(") || self.check_punct("<") {
            if self.check_punct("<") {
                self.skip_angle_brackets()?;
            }
            let styles_body = decorators.iter().any(|d| d.name == "Styles");
            let params = self.parse_params()?;
            if self.match_punct(":") {
                self.parse_type()?;
            }
            if !self.check_punct("{") {
                // overload signature or abstract member
                self.consume_semicolon()?;
                return Ok(None);
            }
            let saved = self.implicit_chain;
            self.implicit_chain = styles_body;
            let body = self.parse_block_body()?;
            self.implicit_chain = saved;
            return Ok(Some(ClassMember::Method(MethodDecl {
                key,
                decorators,
                kind,
                func: Function {
                    params,
                    body,
                    is_async,
                    is_generator,
                },
                is_static,
                pos,
            })));
        }

        let ty = if self.match_punct(":") {
            Some(self.parse_type()?)
        } else {
            None
        };
        let init = if self.match_punct("=") {
            Some(self.parse_assignment()?)
        } else {
            None
        };
        self.consume_semicolon()?;
        Ok(Some(ClassMember::Property(PropertyDecl {
            key,
            decorators,
            ty,
            init,
            is_static,
            pos,
        })))
    }

    fn parse_property_key(&mut self) -> Result<PropKey> {
        let token = self.advance().clone();
        match token.token_type {
            TokenType::Identifier(name) => Ok(PropKey::Ident(name)),
            TokenType::String(raw) | TokenType::Number(raw) => Ok(PropKey::Literal(raw)),
            TokenType::Punct("[") => {
                let expr = self.parse_assignment()?;
                self.consume_punct("]", "Expected ']' after computed key")?;
                Ok(PropKey::Computed(Box::new(expr)))
            }
            other => Err(CompilerError::parse(
                self.filename.clone(),
                token.line,
                format!("Expected property name, found {}", other),
            )),
        }
    }

    fn parse_function_decl(&mut self, decorators: Vec<Decorator>, export: Export) -> Result<FunctionDecl> {
        let pos = self.pos();
        let is_async = self.match_ident("async");
        self.expect_ident("function")?;
        let is_generator = self.match_punct("*");
        let name = self.expect_identifier("Expected function name")?;
        if self.check_punct("<") {
            self.skip_angle_brackets()?;
        }
        let params = self.parse_params()?;
        if self.match_punct(":") {
            self.parse_type()?;
        }
        let saved = self.implicit_chain;
        self.implicit_chain = decorators.iter().any(|d| d.name == "Styles" || d.name == "Extend");
        let body = self.parse_block_body()?;
        self.implicit_chain = saved;
        Ok(FunctionDecl {
            name,
            decorators,
            func: Function {
                params,
                body,
                is_async,
                is_generator,
            },
            export,
            pos,
        })
    }

    fn parse_enum(&mut self, export: Export) -> Result<EnumDecl> {
        self.advance();
        let name = self.expect_identifier("Expected enum name")?;
        self.consume_punct("{", "Expected '{' after enum name")?;
        let mut members = Vec::new();
        while !self.check_punct("}") {
            let key = self.parse_property_key()?.name();
            let init = if self.match_punct("=") {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            members.push((key, init));
            if !self.match_punct(",") {
                break;
            }
        }
        self.consume_punct("}", "Expected '}' after enum members")?;
        Ok(EnumDecl { name, members, export })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        self.consume_punct("(", "Expected '(' before parameters")?;
        let mut params = Vec::new();
        while !self.check_punct(")") {
            self.parse_decorators()?;
            let mut property = false;
            while let Some(word) = self.peek().ident() {
                let is_modifier = matches!(word, "public" | "private" | "protected" | "readonly" | "override");
                let next = self.peek_at(1);
                if is_modifier && matches!(next.token_type, TokenType::Identifier(_) | TokenType::Punct("{") | TokenType::Punct("[")) {
                    property = true;
                    self.advance();
                } else {
                    break;
                }
            }
            let rest = self.match_punct("...");
            let pattern = self.parse_binding_pattern()?;
            self.match_punct("?");
            let ty = if self.match_punct(":") {
                Some(self.parse_type()?)
            } else {
                None
            };
            let default = if self.match_punct("=") {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            // `this` parameters only carry a type
            if !matches!(&pattern, Pattern::Ident(name) if name == "this") {
                params.push(Param {
                    pattern,
                    ty,
                    default,
                    rest,
                    property,
                });
            }
            if !self.match_punct(",") {
                break;
            }
        }
        self.consume_punct(")", "Expected ')' after parameters")?;
        Ok(params)
    }

    fn parse_binding_pattern(&mut self) -> Result<Pattern> {
        if self.match_punct("{") {
            let mut props = Vec::new();
            while !self.check_punct("}") {
                if self.match_punct("...") {
                    let name = self.expect_identifier("Expected rest binding")?;
                    props.push(ObjectPatternProp {
                        key: PropKey::Ident(name.clone()),
                        value: Pattern::Ident(name),
                        default: None,
                        shorthand: true,
                        rest: true,
                    });
                } else {
                    let key = self.parse_property_key()?;
                    let (value, shorthand) = if self.match_punct(":") {
                        (self.parse_binding_pattern()?, false)
                    } else {
                        (Pattern::Ident(key.name()), true)
                    };
                    let default = if self.match_punct("=") {
                        Some(self.parse_assignment()?)
                    } else {
                        None
                    };
                    props.push(ObjectPatternProp {
                        key,
                        value,
                        default,
                        shorthand,
                        rest: false,
                    });
                }
                if !self.match_punct(",") {
                    break;
                }
            }
            self.consume_punct("}", "Expected '}' after object pattern")?;
            return Ok(Pattern::Object(props));
        }
        if self.match_punct("[") {
            let mut elems = Vec::new();
            while !self.check_punct("]") {
                if self.check_punct(",") {
                    self.advance();
                    elems.push(None);
                    continue;
                }
                let rest = self.match_punct("...");
                let pattern = self.parse_binding_pattern()?;
                let default = if self.match_punct("=") {
                    Some(self.parse_assignment()?)
                } else {
                    None
                };
                elems.push(Some(PatternElem { pattern, default, rest }));
                if !self.match_punct(",") {
                    break;
                }
            }
            self.consume_punct("]", "Expected ']' after array pattern")?;
            return Ok(Pattern::Array(elems));
        }
        Ok(Pattern::Ident(self.expect_identifier("Expected binding name")?))
    }

    // ---------------------------------------------------------------------
    // Types (erased; text kept)
    // ---------------------------------------------------------------------

    /// Parses a type and returns its normalized text.
    pub fn parse_type(&mut self) -> Result<String> {
        let mut text = String::new();
        if self.check_punct("|") || self.check_punct("&") {
            self.advance();
        }
        loop {
            text.push_str(&self.parse_type_operand()?);
            if (self.check_punct("|") || self.check_punct("&")) && !self.is_at_end() {
                let op = self.advance().token_type.to_string();
                text.push_str(if op.contains('|') { " | " } else { " & " });
                continue;
            }
            break;
        }
        // conditional type
        if self.check_ident("extends") && !self.peek().newline_before {
            self.advance();
            self.parse_type()?;
            self.consume_punct("?", "Expected '?' in conditional type")?;
            self.parse_type()?;
            self.consume_punct(":", "Expected ':' in conditional type")?;
            let alt = self.parse_type()?;
            text = alt;
        }
        Ok(text)
    }

    fn parse_type_operand(&mut self) -> Result<String> {
        let token = self.peek().clone();
        let mut text = match &token.token_type {
            TokenType::Identifier(word) if matches!(word.as_str(), "keyof" | "typeof" | "readonly" | "unique" | "infer") => {
                self.advance();
                format!("{} {}", word, self.parse_type_operand()?)
            }
            TokenType::Identifier(word) if word == "new" => {
                self.advance();
                self.parse_type_operand()?
            }
            TokenType::Punct("(") => {
                let save = self.current;
                self.skip_balanced("(", ")")?;
                if self.check_punct("=>") {
                    self.advance();
                    let ret = self.parse_type()?;
                    format!("() => {}", ret)
                } else {
                    self.current = save;
                    self.advance();
                    let inner = self.parse_type()?;
                    self.consume_punct(")", "Expected ')' in type")?;
                    format!("({})", inner)
                }
            }
            TokenType::Punct("<") => {
                self.skip_angle_brackets()?;
                self.skip_balanced("(", ")")?;
                self.consume_punct("=>", "Expected '=>' in generic function type")?;
                let ret = self.parse_type()?;
                format!("() => {}", ret)
            }
            TokenType::Punct("{") => {
                self.skip_balanced("{", "}")?;
                "{}".to_string()
            }
            TokenType::Punct("[") => {
                self.skip_balanced("[", "]")?;
                "[]".to_string()
            }
            TokenType::Punct("-") => {
                self.advance();
                format!("-{}", self.token_text_advance())
            }
            TokenType::String(_) | TokenType::Number(_) | TokenType::Template(_) => self.token_text_advance(),
            TokenType::Identifier(_) => {
                let mut name = self.token_text_advance();
                while self.check_punct(".") {
                    self.advance();
                    name.push('.');
                    name.push_str(&self.token_text_advance());
                }
                if self.check_punct("<") && !self.peek().newline_before {
                    name.push_str(&self.skip_angle_brackets()?);
                }
                // type predicates: `x is T`, `asserts x is T`
                if self.check_ident("is") && !self.peek().newline_before {
                    self.advance();
                    self.parse_type()?;
                    name = "boolean".to_string();
                }
                if name == "asserts" {
                    if self.peek().ident().is_some() {
                        self.advance();
                        if self.match_ident("is") {
                            self.parse_type()?;
                        }
                    }
                    name = "void".to_string();
                }
                name
            }
            other => {
                return Err(CompilerError::parse(
                    self.filename.clone(),
                    token.line,
                    format!("Expected type, found {}", other),
                ))
            }
        };
        // array and indexed access suffixes
        while self.check_punct("[") && !self.peek().newline_before {
            if self.check_next_punct("]") {
                self.advance();
                self.advance();
                text.push_str("[]");
            } else {
                self.skip_balanced("[", "]")?;
            }
        }
        Ok(text)
    }

    /// Skips a balanced `<...>` group, honouring `>>` and `>>>`.
    fn skip_angle_brackets(&mut self) -> Result<String> {
        let mut depth: i32 = 0;
        let mut text = String::new();
        loop {
            if self.is_at_end() {
                return Err(self.error("Unterminated type argument list"));
            }
            let token = self.advance().clone();
            match &token.token_type {
                TokenType::Punct("<") => depth += 1,
                TokenType::Punct(">") => depth -= 1,
                TokenType::Punct(">>") => depth -= 2,
                TokenType::Punct(">>>") => depth -= 3,
                _ => {}
            }
            text.push_str(&token_text(&token));
            if token.is_punct(",") {
                text.push(' ');
            }
            if depth <= 0 {
                return Ok(text);
            }
        }
    }

    /// Tries to read `<T, U>` type arguments in expression position.
    fn try_type_arguments(&mut self) -> bool {
        let save = self.current;
        let mut depth: i32 = 0;
        loop {
            let token = self.peek().clone();
            let ok = match &token.token_type {
                TokenType::Punct("<") => {
                    depth += 1;
                    true
                }
                TokenType::Punct(">") => {
                    depth -= 1;
                    true
                }
                TokenType::Punct(">>") => {
                    depth -= 2;
                    true
                }
                TokenType::Punct(p) => matches!(*p, "," | "." | "[" | "]" | "|" | "&"),
                TokenType::Identifier(_) | TokenType::String(_) | TokenType::Number(_) => true,
                _ => false,
            };
            if !ok || self.is_at_end() {
                self.current = save;
                return false;
            }
            self.advance();
            if depth == 0 {
                break;
            }
            if depth < 0 {
                self.current = save;
                return false;
            }
        }
        if self.check_punct("(") && !self.peek().newline_before {
            true
        } else {
            self.current = save;
            false
        }
    }

    fn skip_balanced(&mut self, open: &str, close: &str) -> Result<()> {
        self.consume_punct(open, &format!("Expected '{}'", open))?;
        let mut depth = 1usize;
        while depth > 0 {
            if self.is_at_end() {
                return Err(self.error(format!("Unbalanced '{}'", open)));
            }
            let token = self.advance();
            if token.is_punct(open) {
                depth += 1;
            } else if token.is_punct(close) {
                depth -= 1;
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    fn parse_block_body(&mut self) -> Result<Vec<Stmt>> {
        self.consume_punct("{", "Expected '{'")?;
        let mut stmts = Vec::new();
        while !self.check_punct("}") {
            if self.is_at_end() {
                return Err(self.error("Unterminated block"));
            }
            stmts.push(self.parse_statement()?);
        }
        self.advance();
        Ok(stmts)
    }

    pub fn parse_statement(&mut self) -> Result<Stmt> {
        let token = self.peek().clone();
        if token.is_punct("{") {
            return Ok(Stmt::Block(self.parse_block_body()?));
        }
        if token.is_punct(";") {
            self.advance();
            return Ok(Stmt::Empty);
        }
        if let TokenType::Identifier(word) = &token.token_type {
            // labeled statement
            if self.check_next_punct(":") && !is_reserved(word) {
                self.advance();
                self.advance();
                let body = self.parse_statement()?;
                return Ok(Stmt::Labeled {
                    label: word.clone(),
                    body: Box::new(body),
                });
            }
            match word.as_str() {
                "var" | "let" | "const" if self.is_var_decl_start() => {
                    let decl = self.parse_var_decl()?;
                    self.consume_semicolon()?;
                    return Ok(Stmt::Var(decl));
                }
                "if" => return self.parse_if(),
                "for" => return self.parse_for(),
                "while" => {
                    self.advance();
                    let test = self.parse_paren_expression()?;
                    let body = self.parse_statement()?;
                    return Ok(Stmt::While {
                        test,
                        body: Box::new(body),
                    });
                }
                "do" => {
                    self.advance();
                    let body = self.parse_statement()?;
                    self.expect_ident("while")?;
                    let test = self.parse_paren_expression()?;
                    self.match_punct(";");
                    return Ok(Stmt::DoWhile {
                        body: Box::new(body),
                        test,
                    });
                }
                "return" => {
                    self.advance();
                    let arg = if self.at_statement_end() {
                        None
                    } else {
                        Some(self.parse_expression()?)
                    };
                    self.consume_semicolon()?;
                    return Ok(Stmt::Return(arg));
                }
                "break" | "continue" => {
                    self.advance();
                    let label = match self.peek().ident() {
                        Some(l) if !self.peek().newline_before => {
                            let l = l.to_string();
                            self.advance();
                            Some(l)
                        }
                        _ => None,
                    };
                    self.consume_semicolon()?;
                    return Ok(if word == "break" {
                        Stmt::Break(label)
                    } else {
                        Stmt::Continue(label)
                    });
                }
                "throw" => {
                    self.advance();
                    let arg = self.parse_expression()?;
                    self.consume_semicolon()?;
                    return Ok(Stmt::Throw(arg));
                }
                "try" => return self.parse_try(),
                "switch" => return self.parse_switch(),
                "function" => {
                    return Ok(Stmt::Function(self.parse_function_decl(Vec::new(), Export::None)?));
                }
                "async" if self.check_next_ident("function") && !self.peek_at(1).newline_before => {
                    return Ok(Stmt::Function(self.parse_function_decl(Vec::new(), Export::None)?));
                }
                "class" => return Ok(Stmt::Class(self.parse_class(Vec::new(), Export::None)?)),
                "interface" | "type" if self.is_erased_declaration() => {
                    self.skip_erased_declaration()?;
                    return Ok(Stmt::Empty);
                }
                _ => {}
            }
        }
        let expr = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Stmt::Expr(expr))
    }

    fn is_var_decl_start(&self) -> bool {
        if self.check_ident("let") {
            let next = self.peek_at(1);
            return matches!(next.token_type, TokenType::Identifier(_)) || next.is_punct("[") || next.is_punct("{");
        }
        true
    }

    fn parse_var_decl(&mut self) -> Result<VarDecl> {
        let kind = match self.advance().ident() {
            Some("var") => VarKind::Var,
            Some("let") => VarKind::Let,
            _ => VarKind::Const,
        };
        let mut decls = Vec::new();
        loop {
            let pattern = self.parse_binding_pattern()?;
            self.match_punct("!");
            if self.match_punct(":") {
                self.parse_type()?;
            }
            let init = if self.match_punct("=") {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            decls.push(VarDeclarator { pattern, init });
            if !self.match_punct(",") {
                break;
            }
        }
        Ok(VarDecl { kind, decls })
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let pos = self.pos();
        self.advance();
        let test = self.parse_paren_expression()?;
        let cons = self.parse_statement()?;
        let alt = if self.match_ident("else") {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            cons: Box::new(cons),
            alt,
            pos,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        self.advance();
        let is_await = self.match_ident("await");
        self.consume_punct("(", "Expected '(' after 'for'")?;
        let mut init = None;
        if !self.check_punct(";") {
            self.no_in = true;
            let head = if (self.check_ident("var") || self.check_ident("let") || self.check_ident("const"))
                && self.is_var_decl_start()
            {
                self.parse_var_decl().map(ForInit::Var)
            } else {
                self.parse_expression().map(ForInit::Expr)
            };
            self.no_in = false;
            let head = head?;
            if self.check_ident("of") || self.check_ident("in") {
                let of = self.advance().is_ident("of");
                let right = if of {
                    self.parse_assignment()?
                } else {
                    self.parse_expression()?
                };
                self.consume_punct(")", "Expected ')' after for-in/of head")?;
                let body = self.parse_statement()?;
                return Ok(Stmt::ForIn {
                    left: head,
                    right,
                    body: Box::new(body),
                    of,
                    is_await,
                });
            }
            init = Some(head);
        }
        self.consume_punct(";", "Expected ';' in for statement")?;
        let test = if self.check_punct(";") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_punct(";", "Expected ';' in for statement")?;
        let update = if self.check_punct(")") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_punct(")", "Expected ')' after for clauses")?;
        let body = self.parse_statement()?;
        Ok(Stmt::For {
            init,
            test,
            update,
            body: Box::new(body),
        })
    }

    fn parse_try(&mut self) -> Result<Stmt> {
        self.advance();
        let block = self.parse_block_body()?;
        let mut param = None;
        let mut handler = None;
        if self.match_ident("catch") {
            if self.match_punct("(") {
                param = Some(self.parse_binding_pattern()?);
                if self.match_punct(":") {
                    self.parse_type()?;
                }
                self.consume_punct(")", "Expected ')' after catch binding")?;
            }
            handler = Some(self.parse_block_body()?);
        }
        let finalizer = if self.match_ident("finally") {
            Some(self.parse_block_body()?)
        } else {
            None
        };
        Ok(Stmt::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    fn parse_switch(&mut self) -> Result<Stmt> {
        self.advance();
        let discriminant = self.parse_paren_expression()?;
        self.consume_punct("{", "Expected '{' after switch")?;
        let mut cases = Vec::new();
        while !self.check_punct("}") {
            let test = if self.match_ident("case") {
                Some(self.parse_expression()?)
            } else {
                self.expect_ident("default")?;
                None
            };
            self.consume_punct(":", "Expected ':' after case")?;
            let mut body = Vec::new();
            while !self.check_ident("case") && !self.check_ident("default") && !self.check_punct("}") {
                if self.is_at_end() {
                    return Err(self.error("Unterminated switch"));
                }
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        self.advance();
        Ok(Stmt::Switch { discriminant, cases })
    }

    fn parse_paren_expression(&mut self) -> Result<Expr> {
        self.consume_punct("(", "Expected '('")?;
        let expr = self.parse_expression()?;
        self.consume_punct(")", "Expected ')'")?;
        Ok(expr)
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    pub fn parse_expression(&mut self) -> Result<Expr> {
        let first = self.parse_assignment()?;
        if !self.check_punct(",") {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.match_punct(",") {
            exprs.push(self.parse_assignment()?);
        }
        Ok(Expr::Sequence(exprs))
    }

    pub fn parse_assignment(&mut self) -> Result<Expr> {
        if let Some(arrow) = self.try_parse_arrow()? {
            return Ok(arrow);
        }
        if self.check_ident("yield") {
            self.advance();
            let delegate = self.match_punct("*");
            let arg = if self.at_statement_end() || self.check_punct(")") || self.check_punct(",") || self.check_punct("]") {
                None
            } else {
                Some(Box::new(self.parse_assignment()?))
            };
            return Ok(Expr::Yield { arg, delegate });
        }
        let target = self.parse_conditional()?;
        if let TokenType::Punct(op) = self.peek().token_type {
            if ASSIGN_OPS.contains(&op) {
                self.advance();
                let value = self.parse_assignment()?;
                return Ok(Expr::Assign {
                    op: op.to_string(),
                    target: Box::new(target),
                    value: Box::new(value),
                });
            }
        }
        Ok(target)
    }

    fn try_parse_arrow(&mut self) -> Result<Option<Expr>> {
        let save = self.current;
        let is_async = self.check_ident("async")
            && !self.peek_at(1).newline_before
            && (self.check_next_punct("(") || matches!(self.peek_at(1).token_type, TokenType::Identifier(_)));
        if is_async {
            self.advance();
        }
        // `x => ...`
        if let Some(name) = self.peek().ident().map(str::to_string) {
            if self.check_next_punct("=>") {
                self.advance();
                self.advance();
                let body = self.parse_arrow_body()?;
                return Ok(Some(Expr::Arrow(Box::new(ArrowFn {
                    params: vec![Param::simple(&name)],
                    body,
                    is_async,
                    parens: false,
                }))));
            }
        }
        if self.check_punct("<") {
            // generic arrow `<T>(x: T) => x`
            let inner = self.current;
            if self.skip_angle_brackets().is_ok() && self.check_punct("(") && self.arrow_follows_parens() {
                let params = self.parse_params()?;
                if self.match_punct(":") {
                    self.parse_type()?;
                }
                self.consume_punct("=>", "Expected '=>'")?;
                let body = self.parse_arrow_body()?;
                return Ok(Some(Expr::Arrow(Box::new(ArrowFn {
                    params,
                    body,
                    is_async,
                    parens: true,
                }))));
            }
            self.current = inner;
        }
        if self.check_punct("(") && self.arrow_follows_parens() {
            let params = self.parse_params()?;
            if self.match_punct(":") {
                self.parse_type()?;
            }
            self.consume_punct("=>", "Expected '=>'")?;
            let body = self.parse_arrow_body()?;
            return Ok(Some(Expr::Arrow(Box::new(ArrowFn {
                params,
                body,
                is_async,
                parens: true,
            }))));
        }
        self.current = save;
        Ok(None)
    }

    /// Looks past a parenthesized group for `=>` or a return type then `=>`.
    fn arrow_follows_parens(&mut self) -> bool {
        let save = self.current;
        let mut result = false;
        if self.skip_balanced("(", ")").is_ok() {
            if self.check_punct("=>") && !self.peek().newline_before {
                result = true;
            } else if self.check_punct(":") {
                self.advance();
                if self.parse_type().is_ok() && self.check_punct("=>") {
                    result = true;
                }
            }
        }
        self.current = save;
        result
    }

    fn parse_arrow_body(&mut self) -> Result<ArrowBody> {
        if self.check_punct("{") {
            Ok(ArrowBody::Block(self.with_in_allowed(Self::parse_block_body)?))
        } else {
            Ok(ArrowBody::Expr(Box::new(self.parse_assignment()?)))
        }
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        let test = self.parse_binary(0)?;
        if self.match_punct("?") {
            let cons = self.with_in_allowed(Self::parse_assignment)?;
            self.consume_punct(":", "Expected ':' in conditional expression")?;
            let alt = self.parse_assignment()?;
            return Ok(Expr::Conditional {
                test: Box::new(test),
                cons: Box::new(cons),
                alt: Box::new(alt),
            });
        }
        Ok(test)
    }

    fn binary_precedence(&self) -> Option<(String, u8)> {
        let token = self.peek();
        let op = match &token.token_type {
            TokenType::Punct(p) => *p,
            TokenType::Identifier(id) if id == "instanceof" => "instanceof",
            TokenType::Identifier(id) if id == "in" && !self.no_in => "in",
            _ => return None,
        };
        BINARY_PRECEDENCE
            .iter()
            .find(|(candidate, _)| *candidate == op)
            .map(|(candidate, prec)| (candidate.to_string(), *prec))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            // `as` / `satisfies` bind tighter than any binary operator
            if (self.check_ident("as") || self.check_ident("satisfies")) && !self.peek().newline_before {
                self.advance();
                if !self.match_ident("const") {
                    self.parse_type()?;
                }
                continue;
            }
            let (op, prec) = match self.binary_precedence() {
                Some(found) if found.1 > min_prec => found,
                _ => break,
            };
            self.advance();
            // `**` is right associative
            let next_min = if op == "**" { prec - 1 } else { prec };
            let right = self.parse_binary(next_min)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        match &token.token_type {
            TokenType::Punct(op) if matches!(*op, "!" | "-" | "+" | "~") => {
                self.advance();
                let arg = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: op.to_string(),
                    arg: Box::new(arg),
                })
            }
            TokenType::Punct(op) if matches!(*op, "++" | "--") => {
                self.advance();
                let arg = self.parse_unary()?;
                Ok(Expr::Update {
                    op: op.to_string(),
                    prefix: true,
                    arg: Box::new(arg),
                })
            }
            TokenType::Punct("<") => {
                // legacy `<T>expr` assertion
                self.skip_angle_brackets()?;
                self.parse_unary()
            }
            TokenType::Identifier(word) if matches!(word.as_str(), "typeof" | "void" | "delete") => {
                self.advance();
                let arg = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: word.clone(),
                    arg: Box::new(arg),
                })
            }
            TokenType::Identifier(word) if word == "await" => {
                self.advance();
                let arg = self.parse_unary()?;
                Ok(Expr::Await(Box::new(arg)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let expr = self.parse_call_member()?;
        if (self.check_punct("++") || self.check_punct("--")) && !self.peek().newline_before {
            let op = if self.match_punct("++") { "++" } else { "--" };
            if op == "--" {
                self.advance();
            }
            return Ok(Expr::Update {
                op: op.to_string(),
                prefix: false,
                arg: Box::new(expr),
            });
        }
        Ok(expr)
    }

    pub(crate) fn parse_call_member(&mut self) -> Result<Expr> {
        let start = self.pos();
        let mut expr = if self.check_ident("new") && !self.check_next_punct(".") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };

        loop {
            let token = self.peek().clone();
            match &token.token_type {
                TokenType::Punct(".") => {
                    self.advance();
                    let property = self.expect_identifier("Expected property name after '.'")?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                        optional: false,
                    };
                }
                TokenType::Punct("?.") => {
                    self.advance();
                    if self.match_punct("(") {
                        let args = self.parse_arguments()?;
                        expr = Expr::Call {
                            callee: Box::new(expr),
                            args,
                            optional: true,
                            trailing: None,
                            pos: start,
                        };
                    } else if self.match_punct("[") {
                        let index = self.parse_expression()?;
                        self.consume_punct("]", "Expected ']'")?;
                        expr = Expr::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                            optional: true,
                        };
                    } else {
                        let property = self.expect_identifier("Expected property name after '?.'")?;
                        expr = Expr::Member {
                            object: Box::new(expr),
                            property,
                            optional: true,
                        };
                    }
                }
                TokenType::Punct("[") if !token.newline_before => {
                    self.advance();
                    let index = self.with_in_allowed(Self::parse_expression)?;
                    self.consume_punct("]", "Expected ']'")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        optional: false,
                    };
                }
                TokenType::Punct("(") if !token.newline_before => {
                    self.advance();
                    let args = self.parse_arguments()?;
                    let trailing = self.parse_trailing_closure(&expr)?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        optional: false,
                        trailing,
                        pos: start,
                    };
                }
                TokenType::Punct("<") if !token.newline_before && self.try_type_arguments() => {
                    // type arguments consumed; the call follows
                }
                TokenType::Punct("!") if !token.newline_before => {
                    let next = self.peek_at(1).clone();
                    if next.is_punct("!") && !next.newline_before && self.two_way_terminator(2) {
                        self.advance();
                        self.advance();
                        expr = Expr::TwoWay(Box::new(expr));
                    } else if self.two_way_terminator(1) || next.is_punct(".") || next.is_punct("[") || next.is_punct("(") || next.is_punct("?.") {
                        // non-null assertion
                        self.advance();
                    } else {
                        break;
                    }
                }
                TokenType::Template(_) if !token.newline_before => {
                    if let Expr::Template { quasis, exprs, .. } = self.parse_primary()? {
                        expr = Expr::Template {
                            tag: Some(Box::new(expr)),
                            quasis,
                            exprs,
                        };
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Whether the token at `offset` cannot continue an expression.
    fn two_way_terminator(&self, offset: usize) -> bool {
        let token = self.peek_at(offset);
        token.newline_before
            || matches!(
                token.token_type,
                TokenType::Punct(")") | TokenType::Punct(",") | TokenType::Punct("}") | TokenType::Punct("]")
                    | TokenType::Punct(";") | TokenType::Punct(":") | TokenType::Punct("=")
                    | TokenType::Punct("==") | TokenType::Punct("===") | TokenType::Punct("!=")
                    | TokenType::Punct("!==") | TokenType::Punct("&&") | TokenType::Punct("||")
                    | TokenType::Punct("??") | TokenType::Punct("?") | TokenType::Eof
            )
    }

    fn parse_trailing_closure(&mut self, callee: &Expr) -> Result<Option<Vec<Stmt>>> {
        if self.no_trailing || !self.check_punct("{") {
            return Ok(None);
        }
        let name = match callee {
            Expr::Ident(name) => name,
            _ => return Ok(None),
        };
        let same_line = !self.peek().newline_before;
        let capitalized = name.chars().next().map_or(false, |c| c.is_uppercase());
        if !same_line && !capitalized {
            return Ok(None);
        }
        Ok(Some(self.with_in_allowed(Self::parse_block_body)?))
    }

    fn parse_new(&mut self) -> Result<Expr> {
        let pos = self.pos();
        self.advance();
        let mut callee = if self.check_ident("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        while self.check_punct(".") {
            self.advance();
            let property = self.expect_identifier("Expected property name after '.'")?;
            callee = Expr::Member {
                object: Box::new(callee),
                property,
                optional: false,
            };
        }
        if self.check_punct("<") {
            self.skip_angle_brackets()?;
        }
        let args = if self.check_punct("(") {
            self.advance();
            Some(self.parse_arguments()?)
        } else {
            None
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
            pos,
        })
    }

    /// Parses arguments after an opening parenthesis, through the closing one.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>> {
        let args = self.with_in_allowed(|p| {
            let mut args = Vec::new();
            while !p.check_punct(")") {
                if p.match_punct("...") {
                    let arg = p.parse_assignment()?;
                    args.push(Expr::Spread(Box::new(arg)));
                } else {
                    args.push(p.parse_assignment()?);
                }
                if !p.match_punct(",") {
                    break;
                }
            }
            Ok(args)
        })?;
        self.consume_punct(")", "Expected ')' after arguments")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        match &token.token_type {
            TokenType::Identifier(word) => match word.as_str() {
                "this" => {
                    self.advance();
                    Ok(Expr::This)
                }
                "super" => {
                    self.advance();
                    Ok(Expr::Super)
                }
                "function" => self.parse_function_expression(false),
                "async" if self.check_next_ident("function") => {
                    self.advance();
                    self.parse_function_expression(true)
                }
                "class" => {
                    let class = self.parse_class(Vec::new(), Export::None)?;
                    Ok(Expr::Class(Box::new(class)))
                }
                _ => {
                    self.advance();
                    Ok(Expr::Ident(word.clone()))
                }
            },
            TokenType::Number(raw) => {
                self.advance();
                Ok(Expr::Number(raw.clone()))
            }
            TokenType::String(raw) => {
                self.advance();
                Ok(Expr::Str(raw.clone()))
            }
            TokenType::Regex(raw) => {
                self.advance();
                Ok(Expr::Regex(raw.clone()))
            }
            TokenType::Template(template) => {
                self.advance();
                let mut exprs = Vec::new();
                for (source, line) in &template.exprs {
                    exprs.push(self.parse_fragment(source, *line)?);
                }
                Ok(Expr::Template {
                    tag: None,
                    quasis: template.quasis.clone(),
                    exprs,
                })
            }
            TokenType::Punct("(") => {
                self.advance();
                let inner = self.with_in_allowed(Self::parse_expression)?;
                self.consume_punct(")", "Expected ')'")?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            TokenType::Punct("[") => self.parse_array_literal(),
            TokenType::Punct("{") => self.parse_object_literal(),
            TokenType::Punct(".") if self.implicit_chain => self.parse_implicit_chain(),
            TokenType::Punct("@") => {
                // decorated class expression
                let decorators = self.parse_decorators()?;
                let class = self.parse_class(decorators, Export::None)?;
                Ok(Expr::Class(Box::new(class)))
            }
            other => Err(CompilerError::parse(
                self.filename.clone(),
                token.line,
                format!("Unexpected token {}", other),
            )),
        }
    }

    fn parse_fragment(&self, source: &str, line: usize) -> Result<Expr> {
        let tokens = Lexer::new_at_line(source, self.filename.clone(), line).tokenize()?;
        let mut parser = Parser::new(tokens, self.filename.clone());
        parser.implicit_chain = self.implicit_chain;
        let expr = parser.parse_expression()?;
        if !parser.is_at_end() {
            return Err(parser.error("Unexpected token in template expression"));
        }
        Ok(expr)
    }

    fn parse_function_expression(&mut self, is_async: bool) -> Result<Expr> {
        self.advance();
        let is_generator = self.match_punct("*");
        let name = match self.peek().ident() {
            Some(n) => {
                let n = n.to_string();
                self.advance();
                Some(n)
            }
            None => None,
        };
        if self.check_punct("<") {
            self.skip_angle_brackets()?;
        }
        let params = self.parse_params()?;
        if self.match_punct(":") {
            self.parse_type()?;
        }
        let body = self.parse_block_body()?;
        Ok(Expr::Function {
            name,
            func: Box::new(Function {
                params,
                body,
                is_async,
                is_generator,
            }),
        })
    }

    fn parse_array_literal(&mut self) -> Result<Expr> {
        self.advance();
        let multiline = self.peek().newline_before;
        let elements = self.with_in_allowed(|p| {
            let mut elements = Vec::new();
            while !p.check_punct("]") {
                if p.match_punct(",") {
                    elements.push(None);
                    continue;
                }
                if p.match_punct("...") {
                    let arg = p.parse_assignment()?;
                    elements.push(Some(Expr::Spread(Box::new(arg))));
                } else {
                    elements.push(Some(p.parse_assignment()?));
                }
                if !p.match_punct(",") {
                    break;
                }
            }
            Ok(elements)
        })?;
        self.consume_punct("]", "Expected ']' after array elements")?;
        Ok(Expr::Array { elements, multiline })
    }

    fn parse_object_literal(&mut self) -> Result<Expr> {
        self.advance();
        let multiline = self.peek().newline_before;
        let props = self.with_in_allowed(|p| {
            let mut props = Vec::new();
            while !p.check_punct("}") {
                props.push(p.parse_object_prop()?);
                if !p.match_punct(",") {
                    break;
                }
            }
            Ok(props)
        })?;
        self.consume_punct("}", "Expected '}' after object literal")?;
        Ok(Expr::Object { props, multiline })
    }

    fn parse_object_prop(&mut self) -> Result<ObjectProp> {
        if self.match_punct("...") {
            return Ok(ObjectProp::Spread(self.parse_assignment()?));
        }
        let mut kind = MethodKind::Method;
        let mut is_async = false;
        let mut is_generator = false;
        let next_is_key = |p: &Parser| {
            let next = p.peek_at(1);
            !next.is_punct("(") && !next.is_punct(":") && !next.is_punct(",") && !next.is_punct("}") && !next.is_punct("=")
        };
        if (self.check_ident("get") || self.check_ident("set")) && next_is_key(self) {
            kind = if self.check_ident("get") {
                MethodKind::Getter
            } else {
                MethodKind::Setter
            };
            self.advance();
        } else if self.check_ident("async") && next_is_key(self) {
            is_async = true;
            self.advance();
        }
        if self.match_punct("*") {
            is_generator = true;
        }
        let key = self.parse_property_key()?;
        if self.check_punct("(") || self.check_punct("<") {
            if self.check_punct("<") {
                self.skip_angle_brackets()?;
            }
            let params = self.parse_params()?;
            if self.match_punct(":") {
                self.parse_type()?;
            }
            let body = self.parse_block_body()?;
            return Ok(ObjectProp::Method {
                key,
                kind,
                func: Function {
                    params,
                    body,
                    is_async,
                    is_generator,
                },
            });
        }
        if self.match_punct(":") {
            let value = self.parse_assignment()?;
            return Ok(ObjectProp::KeyValue { key, value });
        }
        match key {
            PropKey::Ident(name) => Ok(ObjectProp::Shorthand(name)),
            _ => Err(self.error("Expected ':' after property key")),
        }
    }

    /// `.attr(args).attr2(args)` with an implicit receiver.
    fn parse_implicit_chain(&mut self) -> Result<Expr> {
        let mut chain = Vec::new();
        while self.check_punct(".") {
            self.advance();
            let name = self.expect_identifier("Expected attribute name")?;
            self.consume_punct("(", "Expected '(' after attribute name")?;
            let args = self.parse_arguments()?;
            chain.push((name, args));
        }
        Ok(Expr::ImplicitChain(chain))
    }

    // ---------------------------------------------------------------------
    // Token helpers
    // ---------------------------------------------------------------------

    fn consume_semicolon(&mut self) -> Result<()> {
        if self.match_punct(";") {
            return Ok(());
        }
        if self.at_statement_end() {
            return Ok(());
        }
        let token = self.peek().clone();
        Err(CompilerError::parse(
            self.filename.clone(),
            token.line,
            format!("Expected ';' but found {}", token.token_type),
        ))
    }

    fn at_statement_end(&self) -> bool {
        self.check_punct(";") || self.check_punct("}") || self.is_at_end() || self.peek().newline_before
    }

    fn token_text_advance(&mut self) -> String {
        let token = self.advance().clone();
        token_text(&token)
    }

    fn pos(&self) -> Pos {
        let token = self.peek();
        Pos {
            line: token.line,
            column: token.column,
        }
    }

    fn error(&self, message: impl Into<String>) -> CompilerError {
        CompilerError::parse(self.filename.clone(), self.peek().line, message)
    }

    fn check_punct(&self, p: &str) -> bool {
        self.peek().is_punct(p)
    }

    fn check_next_punct(&self, p: &str) -> bool {
        self.peek_at(1).is_punct(p)
    }

    fn check_ident(&self, name: &str) -> bool {
        self.peek().is_ident(name)
    }

    fn check_next_ident(&self, name: &str) -> bool {
        self.peek_at(1).is_ident(name)
    }

    fn match_punct(&mut self, p: &str) -> bool {
        if self.check_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_ident(&mut self, name: &str) -> bool {
        if self.check_ident(name) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume_punct(&mut self, p: &str, message: &str) -> Result<()> {
        if self.match_punct(p) {
            Ok(())
        } else {
            let token = self.peek().clone();
            Err(CompilerError::parse(
                self.filename.clone(),
                token.line,
                format!("{} (found {})", message, token.token_type),
            ))
        }
    }

    fn expect_ident(&mut self, name: &str) -> Result<()> {
        if self.match_ident(name) {
            Ok(())
        } else {
            let token = self.peek().clone();
            Err(CompilerError::parse(
                self.filename.clone(),
                token.line,
                format!("Expected '{}' but found {}", name, token.token_type),
            ))
        }
    }

    fn expect_identifier(&mut self, message: &str) -> Result<String> {
        let token = self.peek().clone();
        match token.token_type {
            TokenType::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(CompilerError::parse(
                self.filename.clone(),
                token.line,
                format!("{} (found {})", message, other),
            )),
        }
    }

    fn advance(&mut self) -> &Token {
        if self.is_at_end() {
            return &self.tokens[self.current];
        }
        self.current += 1;
        &self.tokens[self.current - 1]
    }

    /// Runs `f` with `in` re-enabled as a binary operator.
    fn with_in_allowed<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.no_in;
        self.no_in = false;
        let result = f(self);
        self.no_in = saved;
        result
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::Eof)
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let index = (self.current + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }
}

fn token_text(token: &Token) -> String {
    match &token.token_type {
        TokenType::Identifier(s) | TokenType::String(s) | TokenType::Number(s) | TokenType::Regex(s) => s.clone(),
        TokenType::Punct(p) => p.to_string(),
        TokenType::Template(t) => format!("`{}`", t.quasis.join("")),
        TokenType::Eof => String::new(),
    }
}

fn is_reserved(word: &str) -> bool {
    matches!(
        word,
        "case" | "default" | "this" | "true" | "false" | "null" | "new" | "typeof" | "void" | "delete"
    )
}

/// Lexes and parses a whole compilation unit.
pub fn parse_source(source: &str, filename: &str) -> Result<Program> {
    let tokens = Lexer::new(source, filename.to_string()).tokenize()?;
    log::debug!("Tokenized {} tokens", tokens.len());
    Parser::new(tokens, filename).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        parse_source(source, "test.ets").unwrap()
    }

    fn first_struct(program: &Program) -> &StructDecl {
        program
            .items
            .iter()
            .find_map(|item| match item {
                Item::Struct(s) => Some(s),
                _ => None,
            })
            .expect("struct")
    }

    #[test]
    fn test_parse_component_struct() {
        let program = parse(
            r#"
@Entry
@Component
struct Counter {
  @State count: number = 0
  @Watch('onChange') @Prop label: string
  private helper?: Helper

  build() {
    Column() {
      Button('+').onClick(() => { this.count++ })
    }
    .width('100%')
  }
}
"#,
        );
        let decl = first_struct(&program);
        assert_eq!(decl.name, "Counter");
        assert_eq!(decl.decorators.len(), 2);
        assert_eq!(decl.members.len(), 4);
        match &decl.members[0] {
            ClassMember::Property(p) => {
                assert_eq!(p.name(), "count");
                assert_eq!(p.ty.as_deref(), Some("number"));
                assert!(p.init.is_some());
            }
            _ => panic!("Expected property"),
        }
        match &decl.members[1] {
            ClassMember::Property(p) => {
                assert_eq!(p.decorators.len(), 2);
                assert_eq!(p.decorators[0].string_arg().as_deref(), Some("onChange"));
            }
            _ => panic!("Expected property"),
        }
    }

    #[test]
    fn test_trailing_closure_and_attribute_chain() {
        let program = parse("Column() {\n  Text('a')\n  Text('b')\n}\n.width(100)\n");
        match &program.items[0] {
            Item::Statement {
                stmt: Stmt::Expr(Expr::Call { callee, .. }),
                ..
            } => match &**callee {
                Expr::Member { object, property, .. } => {
                    assert_eq!(property, "width");
                    match &**object {
                        Expr::Call { trailing: Some(body), .. } => assert_eq!(body.len(), 2),
                        other => panic!("Expected trailing closure, got {:?}", other),
                    }
                }
                other => panic!("Expected member, got {:?}", other),
            },
            other => panic!("Unexpected item {:?}", other),
        }
    }

    #[test]
    fn test_two_way_suffix_and_non_null() {
        let program = parse("Checkbox().select(this.on!!)\nlet a = b!.c\n");
        match &program.items[0] {
            Item::Statement {
                stmt: Stmt::Expr(Expr::Call { args, .. }),
                ..
            } => assert!(matches!(args[0], Expr::TwoWay(_))),
            other => panic!("Unexpected item {:?}", other),
        }
        match &program.items[1] {
            Item::Statement { stmt: Stmt::Var(decl), .. } => {
                assert!(matches!(decl.decls[0].init, Some(Expr::Member { .. })));
            }
            other => panic!("Unexpected item {:?}", other),
        }
    }

    #[test]
    fn test_arrow_functions_and_types() {
        let program = parse(
            "let f: (a: number) => string = (a: number): string => 'x' + a\nlet g = async x => await x\nlet m = new Map<string, number>()\n",
        );
        assert_eq!(program.items.len(), 3);
        match &program.items[0] {
            Item::Statement { stmt: Stmt::Var(decl), .. } => match &decl.decls[0].init {
                Some(Expr::Arrow(arrow)) => {
                    assert!(arrow.parens);
                    assert_eq!(arrow.params.len(), 1);
                }
                other => panic!("Expected arrow, got {:?}", other),
            },
            other => panic!("Unexpected item {:?}", other),
        }
    }

    #[test]
    fn test_conditional_is_not_arrow() {
        let program = parse("let v = c ? (a) : b\n");
        match &program.items[0] {
            Item::Statement { stmt: Stmt::Var(decl), .. } => {
                assert!(matches!(decl.decls[0].init, Some(Expr::Conditional { .. })));
            }
            other => panic!("Unexpected item {:?}", other),
        }
    }

    #[test]
    fn test_erased_declarations() {
        let program = parse(
            "interface A { x: number }\ntype B = string | number\nimport { C } from './c'\nexport class D extends C implements A { x: number = 1 }\n",
        );
        assert!(matches!(program.items[0], Item::Erased));
        assert!(matches!(program.items[1], Item::Erased));
        assert!(matches!(program.items[2], Item::Import(_)));
        match &program.items[3] {
            Item::Class(c) => {
                assert_eq!(c.export, Export::Named);
                assert!(c.super_class.is_some());
            }
            other => panic!("Unexpected item {:?}", other),
        }
    }

    #[test]
    fn test_styles_function_body() {
        let program = parse("@Styles function fancy() {\n  .width(100)\n  .height(20)\n}\n");
        match &program.items[0] {
            Item::Function(f) => match &f.func.body[0] {
                Stmt::Expr(Expr::ImplicitChain(chain)) => assert_eq!(chain.len(), 2),
                other => panic!("Unexpected body {:?}", other),
            },
            other => panic!("Unexpected item {:?}", other),
        }
    }

    #[test]
    fn test_for_of_and_in() {
        let program = parse("for (const [k, v] of map) { sum += v }\nfor (let key in obj) {}\nfor (let i = 0; i < n; i++) {}\n");
        assert!(matches!(program.items[0], Item::Statement { stmt: Stmt::ForIn { of: true, .. }, .. }));
        assert!(matches!(program.items[1], Item::Statement { stmt: Stmt::ForIn { of: false, .. }, .. }));
        assert!(matches!(program.items[2], Item::Statement { stmt: Stmt::For { .. }, .. }));
    }

    #[test]
    fn test_parse_error_has_line() {
        let err = parse_source("let a = (1 +\n", "bad.ets").unwrap_err();
        assert!(matches!(err, CompilerError::Parse { .. }));
    }

    #[test]
    fn test_module_specifiers() {
        let program = parse("import { a } from './a';\nexport { b } from \"./b\";\nexport * as ns from './c';\n");
        assert!(matches!(&program.items[0], Item::Import(decl) if decl.source == "'./a'"));
        assert!(matches!(&program.items[1], Item::ExportNamed { source: Some(s), .. } if s == "\"./b\""));
        assert!(matches!(&program.items[2], Item::ExportAll { source, .. } if source == "'./c'"));
    }

    #[test]
    fn test_bad_module_specifier() {
        for source in ["import { a } from b;\n", "export { a } from 1;\n", "export * from c;\n"] {
            let err = parse_source(source, "bad.ets").unwrap_err();
            assert!(err.to_string().contains("Expected module specifier"), "{}", err);
        }
    }
}
