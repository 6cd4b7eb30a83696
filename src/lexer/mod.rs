//! The scanner.
//!
//! Turns source bytes into a `(Token, Span)` stream. Identifiers may
//! contain `-`, `_` and `/` after the first character, so builtin names
//! like `list/map` and import heads like `$sha256` are single tokens.
//! There are no comments and no escape sequences in text literals.

use logos::Logos;

use crate::source::{Error, Source, Span};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    #[regex(r"[A-Za-z_$][A-Za-z0-9_/-]*")]
    Ident,
    #[regex(r"[0-9]+")]
    Int,
    #[regex(r"[0-9]+\.[0-9]*")]
    #[regex(r"\.[0-9]+")]
    Float,
    #[regex(r#""[^"\n]*""#)]
    Text,
    #[regex(r"~[0-9a-fA-F][0-9a-fA-F]")]
    Byte,
    #[regex(r"~~[A-Za-z0-9+/]*={0,2}")]
    Bytes,

    #[token("()")]
    Hole,

    #[token("=")]
    Assign,
    #[token(";")]
    Where,
    #[token(",")]
    Comma,

    #[token(":")]
    Define,
    #[token("::")]
    Pick,
    #[token("#")]
    Option,
    #[token(".")]
    Access,
    #[token("..")]
    Spread,

    #[token("+")]
    Add,
    #[token("-")]
    Sub,
    #[token("*")]
    Mul,

    #[token("++")]
    Concat,
    #[token("+<")]
    Append,
    #[token(">+")]
    Prepend,

    #[token("->")]
    Arrow,
    #[token("|")]
    Pipe,

    #[token("<|")]
    Lpipe,
    #[token("|>")]
    Rpipe,

    #[token(">>")]
    Rcomp,
    #[token("<<")]
    Lcomp,

    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    #[token("(")]
    Lparen,
    #[token("[")]
    Lbrack,
    #[token("{")]
    Lbrace,

    #[token(")")]
    Rparen,
    #[token("]")]
    Rbrack,
    #[token("}")]
    Rbrace,
}

pub const WHERE_PREC: u8 = 0;
pub const BASE_PREC: u8 = 1;
pub const CALL_PREC: u8 = 7;

impl Token {
    /// Binding strength for the Pratt parser. Tokens that are not
    /// binary operators sit at `BASE_PREC`.
    pub fn precedence(self) -> u8 {
        match self {
            Token::Where => WHERE_PREC,
            Token::Pipe => 1,
            Token::Lpipe | Token::Rpipe => 2,
            Token::Arrow => 3,
            Token::Lt | Token::Gt => 4,
            Token::Add | Token::Sub | Token::Concat | Token::Append | Token::Prepend => 5,
            Token::Mul => 6,
            Token::Pick | Token::Access | Token::Spread => 8,
            _ => BASE_PREC,
        }
    }

    /// True for tokens that can begin an operand, which is how the
    /// parser recognises juxtaposition calls.
    pub fn starts_operand(self) -> bool {
        matches!(
            self,
            Token::Ident
                | Token::Int
                | Token::Float
                | Token::Text
                | Token::Byte
                | Token::Bytes
                | Token::Hole
                | Token::Lparen
                | Token::Lbrack
                | Token::Lbrace
                | Token::Option
        )
    }

    fn describe(self) -> &'static str {
        match self {
            Token::Ident => "identifier",
            Token::Int => "integer",
            Token::Float => "float",
            Token::Text => "text",
            Token::Byte => "byte",
            Token::Bytes => "bytes",
            Token::Hole => "'()'",
            Token::Assign => "'='",
            Token::Where => "';'",
            Token::Comma => "','",
            Token::Define => "':'",
            Token::Pick => "'::'",
            Token::Option => "'#'",
            Token::Access => "'.'",
            Token::Spread => "'..'",
            Token::Add => "'+'",
            Token::Sub => "'-'",
            Token::Mul => "'*'",
            Token::Concat => "'++'",
            Token::Append => "'+<'",
            Token::Prepend => "'>+'",
            Token::Arrow => "'->'",
            Token::Pipe => "'|'",
            Token::Lpipe => "'<|'",
            Token::Rpipe => "'|>'",
            Token::Rcomp => "'>>'",
            Token::Lcomp => "'<<'",
            Token::Lt => "'<'",
            Token::Gt => "'>'",
            Token::Lparen => "'('",
            Token::Lbrack => "'['",
            Token::Lbrace => "'{'",
            Token::Rparen => "')'",
            Token::Rbrack => "']'",
            Token::Rbrace => "'}'",
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

/// Scans a whole source buffer, failing on the first illegal character.
pub fn scan(source: &Source) -> Result<Vec<(Token, Span)>, Error> {
    let text = std::str::from_utf8(source.bytes())
        .map_err(|_| Error::msg("source is not valid utf-8"))?;

    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(text);
    while let Some(result) = lexer.next() {
        let span = Span::new(lexer.span().start, lexer.span().end);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => return Err(source.error(span, "illegal character")),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        let source = Source::new(input.as_bytes().to_vec());
        scan(&source)
            .expect("scan failed")
            .into_iter()
            .map(|(tok, _)| tok)
            .collect()
    }

    #[test]
    fn test_scan_literals() {
        assert_eq!(
            kinds(r#"1 1.5 .5 "hi" ~ff ~~aGk= ()"#),
            vec![
                Token::Int,
                Token::Float,
                Token::Float,
                Token::Text,
                Token::Byte,
                Token::Bytes,
                Token::Hole,
            ]
        );
    }

    #[test]
    fn test_scan_empty_bytes() {
        assert_eq!(kinds("~~"), vec![Token::Bytes]);
    }

    #[test]
    fn test_scan_identifiers() {
        assert_eq!(
            kinds("list/map my-type _ $sha256"),
            vec![Token::Ident; 4]
        );
    }

    #[test]
    fn test_scan_operators_prefer_longest() {
        assert_eq!(
            kinds("+ ++ +< >+ -> | |> <| >> << :: : .. ."),
            vec![
                Token::Add,
                Token::Concat,
                Token::Append,
                Token::Prepend,
                Token::Arrow,
                Token::Pipe,
                Token::Rpipe,
                Token::Lpipe,
                Token::Rcomp,
                Token::Lcomp,
                Token::Pick,
                Token::Define,
                Token::Spread,
                Token::Access,
            ]
        );
    }

    #[test]
    fn test_scan_import() {
        let source = Source::new(b"$sha256~~abcd".to_vec());
        let tokens = scan(&source).expect("scan failed");
        assert_eq!(tokens[0].0, Token::Ident);
        assert_eq!(source.get(tokens[0].1), "$sha256");
        assert_eq!(tokens[1].0, Token::Bytes);
        assert_eq!(source.get(tokens[1].1), "~~abcd");
    }

    #[test]
    fn test_scan_pick_expression() {
        assert_eq!(
            kinds("e::l 4"),
            vec![Token::Ident, Token::Pick, Token::Ident, Token::Int]
        );
    }

    #[test]
    fn test_scan_rejects_illegal_character() {
        let source = Source::new(b"1 ? 2".to_vec());
        let err = scan(&source).unwrap_err();
        assert!(err.to_string().contains("illegal character"));
    }

    #[test]
    fn test_spans_index_source() {
        let source = Source::new(b"ab 12".to_vec());
        let tokens = scan(&source).expect("scan failed");
        assert_eq!(source.get(tokens[0].1), "ab");
        assert_eq!(source.get(tokens[1].1), "12");
    }
}
