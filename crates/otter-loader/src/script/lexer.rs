//! Tokenizer for module scripts.

use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
pub(crate) enum Token {
    #[regex(r"[ \t\r\n\f]+", logos::skip)]
    Whitespace,

    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[regex(r"/\*", lex_block_comment)]
    BlockComment,

    #[token("import")]
    Import,
    #[token("export")]
    Export,
    #[token("from")]
    From,
    #[token("as")]
    As,
    #[token("default")]
    Default,
    #[token("const")]
    Const,
    #[token("let")]
    Let,
    #[token("throw")]
    Throw,
    #[token("new")]
    New,
    #[token("typeof")]
    Typeof,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,
    #[token("undefined")]
    Undefined,

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("*")]
    Star,
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,

    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""([^"\\\n]|\\.)*""#, unescape)]
    #[regex(r"'([^'\\\n]|\\.)*'", unescape)]
    Str(String),

    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*", |lex| lex.slice().to_string())]
    Ident(String),
}

fn lex_block_comment(lex: &mut logos::Lexer<Token>) -> logos::Skip {
    let remainder = lex.remainder();
    match remainder.find("*/") {
        Some(end) => lex.bump(end + 2),
        None => lex.bump(remainder.len()),
    }
    logos::Skip
}

fn unescape(lex: &mut logos::Lexer<Token>) -> Option<String> {
    let slice = lex.slice();
    let body = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            other => out.push(other),
        }
    }
    Some(out)
}

impl Token {
    /// Human-readable form for error messages
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Str(s) => format!("string {:?}", s),
            Token::Ident(name) => format!("identifier '{}'", name),
            other => format!("{:?}", other),
        }
    }

    /// Keywords usable as property and export names
    pub(crate) fn keyword_name(&self) -> Option<&'static str> {
        Some(match self {
            Token::Import => "import",
            Token::Export => "export",
            Token::From => "from",
            Token::As => "as",
            Token::Default => "default",
            Token::Const => "const",
            Token::Let => "let",
            Token::Throw => "throw",
            Token::New => "new",
            Token::Typeof => "typeof",
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::Undefined => "undefined",
            _ => return None,
        })
    }
}

/// Token with its byte offset in the source
pub(crate) type Spanned = (Token, usize);

/// 1-based line and column of a byte offset
pub(crate) fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..offset.min(source.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, column)
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, String> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        let start = lexer.span().start;
        match token {
            Ok(token) => tokens.push((token, start)),
            Err(()) => {
                let (line, column) = line_col(source, start);
                return Err(format!(
                    "unexpected character {:?} at {}:{}",
                    lexer.slice(),
                    line,
                    column
                ));
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_import_declaration() {
        assert_eq!(
            kinds(r#"import x, * as ns from "./a.js";"#),
            vec![
                Token::Import,
                Token::Ident("x".into()),
                Token::Comma,
                Token::Star,
                Token::As,
                Token::Ident("ns".into()),
                Token::From,
                Token::Str("./a.js".into()),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        assert_eq!(
            kinds("importer constant"),
            vec![Token::Ident("importer".into()), Token::Ident("constant".into())]
        );
    }

    #[test]
    fn test_comments_and_escapes() {
        assert_eq!(
            kinds("/* a */ 'it\\'s' // tail\n 1.5"),
            vec![Token::Str("it's".into()), Token::Number(1.5)]
        );
    }

    #[test]
    fn test_unexpected_character_reports_position() {
        let err = tokenize("const a = 1;\nconst b = #;").unwrap_err();
        assert!(err.contains("2:11"), "{}", err);
    }
}
