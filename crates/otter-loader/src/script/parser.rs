//! Recursive-descent parser for module scripts.

use std::collections::HashSet;

use super::ast::{DeclKind, Expr, Program, Stmt};
use super::lexer::{Spanned, Token, line_col, tokenize};
use crate::compiler::{ExportEntry, ImportEntry, ImportName};
use crate::value::Value;

/// Local name holding the value of `export default <expr>`
pub(crate) const DEFAULT_LOCAL: &str = "*default*";

pub(crate) struct ParsedModule {
    pub(crate) requests: Vec<String>,
    pub(crate) imports: Vec<ImportEntry>,
    pub(crate) exports: Vec<ExportEntry>,
    pub(crate) program: Program,
}

pub(crate) fn parse(source: &str) -> Result<ParsedModule, String> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        module: ParsedModule {
            requests: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            program: Program::default(),
        },
    };
    while !parser.at_end() {
        parser.module_item()?;
    }
    parser.finish()
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    module: ParsedModule,
}

impl Parser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error_here(&self, message: &str) -> String {
        match self.tokens.get(self.pos) {
            Some((token, offset)) => {
                let (line, column) = line_col(self.source, *offset);
                format!("{} but found {} at {}:{}", message, token.describe(), line, column)
            }
            None => format!("{} but reached end of input", message),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.error_here(&format!("expected {}", expected.describe())))
        }
    }

    fn identifier(&mut self) -> Result<String, String> {
        if let Some(Token::Ident(name)) = self.peek() {
            let name = name.clone();
            self.pos += 1;
            return Ok(name);
        }
        Err(self.error_here("expected identifier"))
    }

    /// Identifier or keyword, as allowed after `.` and in export lists
    fn name(&mut self) -> Result<String, String> {
        if let Some(keyword) = self.peek().and_then(Token::keyword_name) {
            self.pos += 1;
            return Ok(keyword.to_string());
        }
        self.identifier()
    }

    fn string(&mut self) -> Result<String, String> {
        if let Some(Token::Str(value)) = self.peek() {
            let value = value.clone();
            self.pos += 1;
            return Ok(value);
        }
        Err(self.error_here("expected string literal"))
    }

    fn end_statement(&mut self) {
        self.eat(&Token::Semicolon);
    }

    fn request(&mut self, specifier: &str) {
        if !self.module.requests.iter().any(|r| r == specifier) {
            self.module.requests.push(specifier.to_string());
        }
    }

    fn declare(&mut self, kind: DeclKind, name: &str) -> Result<(), String> {
        let imported = self.module.imports.iter().any(|i| i.local_name == name);
        if imported || self.module.program.declarations.contains_key(name) {
            return Err(format!("Identifier '{}' has already been declared", name));
        }
        self.module.program.declarations.insert(name.to_string(), kind);
        Ok(())
    }

    fn add_import(&mut self, specifier: &str, import_name: ImportName, local_name: String) -> Result<(), String> {
        let taken = self.module.imports.iter().any(|i| i.local_name == local_name)
            || self.module.program.declarations.contains_key(&local_name);
        if taken {
            return Err(format!("Identifier '{}' has already been declared", local_name));
        }
        self.module.imports.push(ImportEntry {
            specifier: specifier.to_string(),
            import_name,
            local_name,
        });
        Ok(())
    }

    fn module_item(&mut self) -> Result<(), String> {
        match self.peek() {
            Some(Token::Import) if self.peek_at(1) != Some(&Token::Dot) => self.import_declaration(),
            Some(Token::Export) => self.export_declaration(),
            Some(Token::Const) | Some(Token::Let) => self.variable_declaration().map(drop),
            Some(Token::Semicolon) => {
                self.pos += 1;
                Ok(())
            }
            _ => {
                let stmt = self.statement()?;
                self.module.program.body.push(stmt);
                Ok(())
            }
        }
    }

    fn import_declaration(&mut self) -> Result<(), String> {
        self.expect(Token::Import)?;

        if let Some(Token::Str(_)) = self.peek() {
            let specifier = self.string()?;
            self.request(&specifier);
            self.end_statement();
            return Ok(());
        }

        let mut bindings: Vec<(ImportName, String)> = Vec::new();
        if let Some(Token::Ident(_)) = self.peek() {
            let local = self.identifier()?;
            bindings.push((ImportName::Named("default".into()), local));
            if !self.eat(&Token::Comma) {
                return self.import_from(bindings);
            }
        }

        if self.eat(&Token::Star) {
            self.expect(Token::As)?;
            let local = self.identifier()?;
            bindings.push((ImportName::Namespace, local));
        } else if self.eat(&Token::LBrace) {
            while !self.eat(&Token::RBrace) {
                let is_keyword = self.peek().and_then(Token::keyword_name).is_some();
                let imported = self.name()?;
                let local = if self.eat(&Token::As) {
                    self.identifier()?
                } else if is_keyword {
                    return Err(self.error_here(&format!("expected 'as' after '{}'", imported)));
                } else {
                    imported.clone()
                };
                bindings.push((ImportName::Named(imported), local));
                if !self.eat(&Token::Comma) {
                    self.expect(Token::RBrace)?;
                    break;
                }
            }
        } else {
            return Err(self.error_here("expected import clause"));
        }

        self.import_from(bindings)
    }

    fn import_from(&mut self, bindings: Vec<(ImportName, String)>) -> Result<(), String> {
        self.expect(Token::From)?;
        let specifier = self.string()?;
        self.request(&specifier);
        for (import_name, local) in bindings {
            self.add_import(&specifier, import_name, local)?;
        }
        self.end_statement();
        Ok(())
    }

    fn export_declaration(&mut self) -> Result<(), String> {
        self.expect(Token::Export)?;
        match self.peek() {
            Some(Token::Default) => {
                self.pos += 1;
                let value = self.expression()?;
                self.declare(DeclKind::Const, DEFAULT_LOCAL)?;
                self.module.program.body.push(Stmt::Declare {
                    name: DEFAULT_LOCAL.to_string(),
                    init: Some(value),
                });
                self.module.exports.push(ExportEntry::Local {
                    export_name: "default".into(),
                    local_name: DEFAULT_LOCAL.into(),
                });
                self.end_statement();
                Ok(())
            }
            Some(Token::Const) | Some(Token::Let) => {
                let names = self.variable_declaration()?;
                for name in names {
                    self.module.exports.push(ExportEntry::Local {
                        export_name: name.clone(),
                        local_name: name,
                    });
                }
                Ok(())
            }
            Some(Token::Star) => {
                self.pos += 1;
                let alias = if self.eat(&Token::As) { Some(self.name()?) } else { None };
                self.expect(Token::From)?;
                let specifier = self.string()?;
                self.request(&specifier);
                self.module.exports.push(match alias {
                    Some(export_name) => ExportEntry::Indirect {
                        export_name,
                        specifier,
                        import_name: ImportName::Namespace,
                    },
                    None => ExportEntry::Star { specifier },
                });
                self.end_statement();
                Ok(())
            }
            Some(Token::LBrace) => {
                self.pos += 1;
                let mut specifiers: Vec<(String, String)> = Vec::new();
                while !self.eat(&Token::RBrace) {
                    let local = self.name()?;
                    let exported = if self.eat(&Token::As) { self.name()? } else { local.clone() };
                    specifiers.push((local, exported));
                    if !self.eat(&Token::Comma) {
                        self.expect(Token::RBrace)?;
                        break;
                    }
                }
                if self.eat(&Token::From) {
                    let specifier = self.string()?;
                    self.request(&specifier);
                    for (imported, export_name) in specifiers {
                        self.module.exports.push(ExportEntry::Indirect {
                            export_name,
                            specifier: specifier.clone(),
                            import_name: ImportName::Named(imported),
                        });
                    }
                } else {
                    for (local_name, export_name) in specifiers {
                        self.module.exports.push(ExportEntry::Local {
                            export_name,
                            local_name,
                        });
                    }
                }
                self.end_statement();
                Ok(())
            }
            _ => Err(self.error_here("expected export declaration")),
        }
    }

    /// `const a = 1, b = 2` / `let c;` (pushes the statements, returns the names)
    fn variable_declaration(&mut self) -> Result<Vec<String>, String> {
        let kind = match self.advance() {
            Some(Token::Const) => DeclKind::Const,
            Some(Token::Let) => DeclKind::Let,
            _ => return Err(self.error_here("expected 'const' or 'let'")),
        };
        let mut names = Vec::new();
        loop {
            let name = self.identifier()?;
            let init = if self.eat(&Token::Assign) {
                Some(self.expression()?)
            } else if kind == DeclKind::Const {
                return Err(format!("Missing initializer in const declaration '{}'", name));
            } else {
                None
            };
            self.declare(kind, &name)?;
            self.module.program.body.push(Stmt::Declare {
                name: name.clone(),
                init,
            });
            names.push(name);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.end_statement();
        Ok(names)
    }

    fn statement(&mut self) -> Result<Stmt, String> {
        match self.peek() {
            Some(Token::Throw) => {
                self.pos += 1;
                let value = self.expression()?;
                self.end_statement();
                Ok(Stmt::Throw(value))
            }
            Some(Token::Ident(_)) if self.peek_at(1) == Some(&Token::Assign) => {
                let name = self.identifier()?;
                self.expect(Token::Assign)?;
                let value = self.expression()?;
                self.end_statement();
                Ok(Stmt::Assign { name, value })
            }
            _ => {
                let value = self.expression()?;
                self.end_statement();
                Ok(Stmt::Expr(value))
            }
        }
    }

    fn expression(&mut self) -> Result<Expr, String> {
        let mut left = self.unary()?;
        while self.eat(&Token::Plus) {
            let right = self.unary()?;
            left = Expr::Add(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Typeof) {
            return Ok(Expr::TypeOf(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let property = self.name()?;
                expr = Expr::Member(Box::new(expr), property);
            } else if self.eat(&Token::LBracket) {
                let index = self.expression()?;
                self.expect(Token::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.check(&Token::LParen) {
                let args = self.arguments()?;
                expr = Expr::Call(Box::new(expr), args);
            } else {
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, String> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        while !self.eat(&Token::RParen) {
            args.push(self.expression()?);
            if !self.eat(&Token::Comma) {
                self.expect(Token::RParen)?;
                break;
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error_here("expected expression"));
        };
        match token {
            Token::Number(n) => {
                self.pos += 1;
                Ok(Expr::Literal(Value::Number(n)))
            }
            Token::Str(s) => {
                self.pos += 1;
                Ok(Expr::Literal(Value::from(s)))
            }
            Token::True | Token::False => {
                self.pos += 1;
                Ok(Expr::Literal(Value::Bool(token == Token::True)))
            }
            Token::Null => {
                self.pos += 1;
                Ok(Expr::Literal(Value::Null))
            }
            Token::Undefined => {
                self.pos += 1;
                Ok(Expr::Literal(Value::Undefined))
            }
            Token::Ident(name) => {
                self.pos += 1;
                Ok(Expr::Ident(name))
            }
            Token::Import => {
                self.pos += 1;
                self.expect(Token::Dot)?;
                match self.advance() {
                    Some(Token::Ident(meta)) if meta == "meta" => Ok(Expr::ImportMeta),
                    _ => Err("expected 'import.meta'".to_string()),
                }
            }
            Token::New => {
                self.pos += 1;
                let constructor = self.identifier()?;
                let args = if self.check(&Token::LParen) {
                    self.arguments()?
                } else {
                    Vec::new()
                };
                Ok(Expr::New(constructor, args))
            }
            Token::LParen => {
                self.pos += 1;
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                self.pos += 1;
                let mut items = Vec::new();
                while !self.eat(&Token::RBracket) {
                    items.push(self.expression()?);
                    if !self.eat(&Token::Comma) {
                        self.expect(Token::RBracket)?;
                        break;
                    }
                }
                Ok(Expr::Array(items))
            }
            Token::LBrace => {
                self.pos += 1;
                let mut properties = Vec::new();
                while !self.eat(&Token::RBrace) {
                    let key = match self.peek() {
                        Some(Token::Str(_)) => self.string()?,
                        _ => self.name()?,
                    };
                    let value = if self.eat(&Token::Colon) {
                        self.expression()?
                    } else {
                        Expr::Ident(key.clone())
                    };
                    properties.push((key, value));
                    if !self.eat(&Token::Comma) {
                        self.expect(Token::RBrace)?;
                        break;
                    }
                }
                Ok(Expr::Object(properties))
            }
            _ => Err(self.error_here("expected expression")),
        }
    }

    fn finish(self) -> Result<ParsedModule, String> {
        let module = self.module;
        let mut exported = HashSet::new();
        for export in &module.exports {
            let Some(name) = export.export_name() else {
                continue;
            };
            if !exported.insert(name) {
                return Err(format!("Duplicate export of '{}'", name));
            }
            if let ExportEntry::Local { local_name, .. } = export {
                let declared = module.program.declarations.contains_key(local_name)
                    || module.imports.iter().any(|i| &i.local_name == local_name);
                if !declared {
                    return Err(format!("Export '{}' is not defined in module", local_name));
                }
            }
        }
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_import_forms() {
        let module = parse(
            r#"
            import a, { b as c, default as d } from "./x.js";
            import * as ns from "./y.js";
            import "./side-effect.js";
            "#,
        )
        .unwrap();

        assert_eq!(module.requests, vec!["./x.js", "./y.js", "./side-effect.js"]);
        let locals: Vec<_> = module.imports.iter().map(|i| i.local_name.as_str()).collect();
        assert_eq!(locals, vec!["a", "c", "d", "ns"]);
        assert_eq!(module.imports[3].import_name, ImportName::Namespace);
    }

    #[test]
    fn test_export_forms() {
        let module = parse(
            r#"
            export const x = 1, y = 2;
            let z = 3;
            export { z as zed };
            export default x + y;
            export * from "./all.js";
            export * as util from "./util.js";
            export { a as b } from "./a.js";
            "#,
        )
        .unwrap();

        let names: Vec<_> = module.exports.iter().map(ExportEntry::export_name).collect();
        assert_eq!(
            names,
            vec![Some("x"), Some("y"), Some("zed"), Some("default"), None, Some("util"), Some("b")]
        );
        assert_eq!(module.requests, vec!["./all.js", "./util.js", "./a.js"]);
    }

    #[test]
    fn test_import_meta_is_an_expression() {
        let module = parse("import.meta.url").unwrap();
        assert!(module.imports.is_empty());
        assert_eq!(module.program.body.len(), 1);
    }

    #[test]
    fn test_rejects_duplicates() {
        let err = parse("const a = 1; let a = 2;").err().unwrap();
        assert!(err.contains("already been declared"), "{}", err);

        let err = parse("import a from './a'; const a = 1;").err().unwrap();
        assert!(err.contains("already been declared"), "{}", err);

        let err = parse("const a = 1; export { a, a };").err().unwrap();
        assert!(err.contains("Duplicate export"), "{}", err);
    }

    #[test]
    fn test_rejects_undefined_local_export() {
        let err = parse("export { missing };").err().unwrap();
        assert!(err.contains("not defined"), "{}", err);
    }

    #[test]
    fn test_syntax_error_position() {
        let err = parse("const x = ;").err().unwrap();
        assert!(err.contains("1:11"), "{}", err);
    }
}
