//! The parser.
//!
//! Precedence-climbing over the token stream. Function application is
//! juxtaposition and binds tighter than every binary operator except
//! `::` and `.`; arrows and binary operators associate to the right by
//! re-entering the climb at their own precedence.

use std::rc::Rc;

use crate::ast::{Alt, Ast, BinOp, Expr, ExprId, LitKind, SourceExpr};
use crate::lexer::{self, Token, BASE_PREC, CALL_PREC};
use crate::source::{Error, Source, Span};

/// Parses a full program; the whole input must be one expression.
pub fn parse(source: Rc<Source>) -> Result<SourceExpr, Error> {
    let tokens = lexer::scan(&source)?;
    let mut parser = Parser {
        source: &source,
        tokens,
        pos: 0,
        ast: Ast::default(),
    };

    let root = parser.parse_expr()?;
    if let Some(tok) = parser.cur() {
        return Err(parser.error(format!("Expected end of input, got {tok}")));
    }

    Ok(SourceExpr {
        source: source.clone(),
        ast: Rc::new(parser.ast),
        root,
    })
}

/// Convenience wrapper for parsing a string, used by tests and the CLI.
pub fn parse_str(text: &str) -> Result<SourceExpr, Error> {
    parse(Rc::new(Source::new(text.as_bytes().to_vec())))
}

struct Parser<'a> {
    source: &'a Source,
    tokens: Vec<(Token, Span)>,
    pos: usize,
    ast: Ast,
}

impl<'a> Parser<'a> {
    fn cur(&self) -> Option<Token> {
        self.tokens.get(self.pos).map(|(tok, _)| *tok)
    }

    fn span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some((_, span)) => *span,
            None => {
                let end = self.source.bytes().len();
                Span::new(end, end)
            }
        }
    }

    fn next(&mut self) {
        self.pos += 1;
    }

    fn error(&self, msg: impl Into<String>) -> Error {
        self.source.error(self.span(), msg)
    }

    fn expect(&self, tok: Token) -> Result<(), Error> {
        match self.cur() {
            Some(found) if found == tok => Ok(()),
            Some(found) => Err(self.error(format!("Expected {tok}, got {found}"))),
            None => Err(self.error(format!("Expected {tok}, got end of input"))),
        }
    }

    fn unexpected(&self) -> Error {
        match self.cur() {
            Some(tok) => self.error(format!("Unexpected {tok}")),
            None => self.error("Unexpected end of input"),
        }
    }

    /// Parses an identifier token into its span.
    fn ident_span(&mut self) -> Result<Span, Error> {
        self.expect(Token::Ident)?;
        let span = self.span();
        self.next();
        Ok(span)
    }

    fn parse_expr(&mut self) -> Result<ExprId, Error> {
        let mut expr = self.parse_plain_expr(BASE_PREC)?;

        while self.cur() == Some(Token::Where) {
            self.next();
            expr = self.parse_where(expr)?;
        }

        Ok(expr)
    }

    fn parse_plain_expr(&mut self, prec: u8) -> Result<ExprId, Error> {
        let mut left = self.parse_binary(None, prec)?;

        loop {
            let tok = match self.cur() {
                Some(tok) => tok,
                None => break,
            };

            if tok.starts_operand() && CALL_PREC > prec {
                let arg = self.parse_binary(None, CALL_PREC - 1)?;
                left = self.ast.add(Expr::Call { fun: left, arg });
            } else if is_binary_like(tok) && tok.precedence() > prec {
                left = self.parse_binary(Some(left), tok.precedence())?;
            } else {
                break;
            }
        }

        Ok(left)
    }

    fn parse_binary(&mut self, left: Option<ExprId>, prec: u8) -> Result<ExprId, Error> {
        let x = match left {
            Some(x) => x,
            None => self.parse_unary()?,
        };

        let tok = match self.cur() {
            Some(tok) => tok,
            None => return Ok(x),
        };
        if is_binary_like(tok) && tok.precedence() < prec {
            return Ok(x);
        }

        match tok {
            Token::Add
            | Token::Sub
            | Token::Mul
            | Token::Concat
            | Token::Append
            | Token::Prepend
            | Token::Lpipe
            | Token::Rpipe
            | Token::Lcomp
            | Token::Rcomp => {
                let op = binop(tok);
                self.next();
                let right = self.parse_plain_expr(tok.precedence())?;
                Ok(self.ast.add(Expr::Binary { op, left: x, right }))
            }

            Token::Pick => {
                self.next();
                let span = self.ident_span()?;
                let right = self.ast.add(Expr::Ident { span });
                Ok(self.ast.add(Expr::Binary {
                    op: BinOp::Pick,
                    left: x,
                    right,
                }))
            }

            Token::Access => {
                self.next();
                let key = self.ident_span()?;
                Ok(self.ast.add(Expr::Access { rec: x, key }))
            }

            Token::Arrow => {
                self.next();
                let body = self.parse_plain_expr(Token::Arrow.precedence())?;
                Ok(self.ast.add(Expr::Func { arg: x, body }))
            }

            _ => Ok(x),
        }
    }

    fn parse_unary(&mut self) -> Result<ExprId, Error> {
        let tok = match self.cur() {
            Some(tok) => tok,
            None => return Err(self.unexpected()),
        };

        match tok {
            Token::Ident => {
                let span = self.span();
                self.next();
                // `$algo` directly followed by a bytes literal is an import.
                let name = self.source.get(span);
                if let Some(algo) = name.strip_prefix('$') {
                    if self.cur() == Some(Token::Bytes) && self.span().start == span.end {
                        let algo = algo.to_string();
                        let hash_span = self.span();
                        self.next();
                        let value = self.ast.add(Expr::Literal {
                            span: hash_span,
                            kind: LitKind::Bytes,
                        });
                        return Ok(self.ast.add(Expr::Import {
                            span: span.to(hash_span),
                            algo,
                            value,
                        }));
                    }
                }
                Ok(self.ast.add(Expr::Ident { span }))
            }

            Token::Int | Token::Float | Token::Text | Token::Byte | Token::Bytes
            | Token::Hole => {
                let span = self.span();
                self.next();
                Ok(self.ast.add(Expr::Literal {
                    span,
                    kind: lit_kind(tok),
                }))
            }

            // A minus directly before a numeric literal folds into it.
            Token::Sub => {
                let minus = self.span();
                self.next();
                match self.cur() {
                    Some(num @ (Token::Int | Token::Float)) if self.span().start == minus.end => {
                        let span = minus.to(self.span());
                        self.next();
                        Ok(self.ast.add(Expr::Literal {
                            span,
                            kind: lit_kind(num),
                        }))
                    }
                    _ => Err(self.unexpected()),
                }
            }

            Token::Lbrace => self.parse_record(),
            Token::Lbrack => self.parse_list(),
            Token::Lparen => self.parse_paren(),
            Token::Pipe => self.parse_match_func(),
            Token::Option => self.parse_enum(),

            _ => Err(self.unexpected()),
        }
    }

    fn parse_paren(&mut self) -> Result<ExprId, Error> {
        self.next();
        let x = self.parse_expr()?;
        self.expect(Token::Rparen)?;
        self.next();
        Ok(x)
    }

    fn parse_where(&mut self, body: ExprId) -> Result<ExprId, Error> {
        let name = self.ident_span()?;

        let mut typ = None;
        if self.cur() == Some(Token::Define) {
            self.next();
            typ = Some(self.parse_plain_expr(BASE_PREC)?);
            if self.cur() != Some(Token::Assign) {
                return Ok(self.ast.add(Expr::Where {
                    body,
                    name,
                    typ,
                    val: None,
                }));
            }
        }

        self.expect(Token::Assign)?;
        self.next();
        let val = Some(self.parse_plain_expr(BASE_PREC)?);

        Ok(self.ast.add(Expr::Where {
            body,
            name,
            typ,
            val,
        }))
    }

    fn parse_record(&mut self) -> Result<ExprId, Error> {
        let start = self.span();
        self.next();

        let mut entries = Vec::new();
        let mut rest = None;
        loop {
            match self.cur() {
                Some(Token::Rbrace) => break,
                Some(Token::Spread) => {
                    if rest.is_some() {
                        return Err(self.error("duplicate spread in record"));
                    }
                    self.next();
                    rest = Some(self.parse_plain_expr(BASE_PREC)?);
                }
                _ => {
                    let key = self.ident_span()?;
                    self.expect(Token::Assign)?;
                    self.next();
                    let value = self.parse_expr()?;
                    entries.push((self.source.get(key).to_string(), value));
                }
            }

            if self.cur() != Some(Token::Comma) {
                break;
            }
            self.next();
        }

        self.expect(Token::Rbrace)?;
        let span = start.to(self.span());
        self.next();

        Ok(self.ast.add(Expr::Record {
            span,
            entries,
            rest,
        }))
    }

    fn parse_list(&mut self) -> Result<ExprId, Error> {
        let start = self.span();
        self.next();

        let mut elements = Vec::new();
        loop {
            if self.cur() == Some(Token::Rbrack) {
                break;
            }
            elements.push(self.parse_expr()?);

            if self.cur() != Some(Token::Comma) {
                break;
            }
            self.next();
        }

        self.expect(Token::Rbrack)?;
        let span = start.to(self.span());
        self.next();

        Ok(self.ast.add(Expr::List { span, elements }))
    }

    fn parse_match_func(&mut self) -> Result<ExprId, Error> {
        let mut alts = Vec::new();

        while self.cur() == Some(Token::Pipe) {
            self.next();

            let pattern = if self.cur() == Some(Token::Option) {
                self.parse_variant()?
            } else {
                self.parse_binary(None, Token::Arrow.precedence() + 1)?
            };

            self.expect(Token::Arrow)?;
            self.next();
            let body = self.parse_plain_expr(Token::Arrow.precedence())?;

            alts.push(Alt { pattern, body });
        }

        Ok(self.ast.add(Expr::MatchFunc { alts }))
    }

    fn parse_enum(&mut self) -> Result<ExprId, Error> {
        let mut variants = Vec::new();
        while self.cur() == Some(Token::Option) {
            variants.push(self.parse_variant()?);
        }
        Ok(self.ast.add(Expr::Enum { variants }))
    }

    fn parse_variant(&mut self) -> Result<ExprId, Error> {
        // Eat the '#'.
        self.next();
        let tag = self.ident_span()?;

        let payload = match self.cur() {
            // Nested variants need parens; `#a #b` is two variants.
            Some(tok) if tok.starts_operand() && tok != Token::Option => {
                Some(self.parse_binary(None, Token::Arrow.precedence() + 1)?)
            }
            _ => None,
        };

        Ok(self.ast.add(Expr::Variant { tag, payload }))
    }
}

fn is_binary_like(tok: Token) -> bool {
    matches!(
        tok,
        Token::Add
            | Token::Sub
            | Token::Mul
            | Token::Concat
            | Token::Append
            | Token::Prepend
            | Token::Lpipe
            | Token::Rpipe
            | Token::Lcomp
            | Token::Rcomp
            | Token::Pick
            | Token::Access
            | Token::Arrow
    )
}

fn binop(tok: Token) -> BinOp {
    match tok {
        Token::Add => BinOp::Add,
        Token::Sub => BinOp::Sub,
        Token::Mul => BinOp::Mul,
        Token::Concat => BinOp::Concat,
        Token::Append => BinOp::Append,
        Token::Prepend => BinOp::Prepend,
        Token::Lpipe => BinOp::Lpipe,
        Token::Rpipe => BinOp::Rpipe,
        Token::Lcomp => BinOp::Lcomp,
        Token::Rcomp => BinOp::Rcomp,
        _ => unreachable!("not a binary operator token"),
    }
}

fn lit_kind(tok: Token) -> LitKind {
    match tok {
        Token::Int => LitKind::Int,
        Token::Float => LitKind::Float,
        Token::Text => LitKind::Text,
        Token::Byte => LitKind::Byte,
        Token::Bytes => LitKind::Bytes,
        Token::Hole => LitKind::Hole,
        _ => unreachable!("not a literal token"),
    }
}
