//! The abstract syntax tree.
//!
//! Expressions live in a flat arena (`Ast`) and refer to each other by
//! `ExprId`. That keeps nodes `Copy`-cheap to reference and lets closures
//! hold on to `Rc<Ast>` + an id instead of borrowing the tree. A parsed
//! program is a `SourceExpr`: the arena, the root id and the source buffer
//! the spans index into.

use std::rc::Rc;

use crate::source::{Source, Span};

/// Index of an expression within an [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprId(u32);

/// Literal kinds. The literal's text is its span in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Hole,
    Int,
    Float,
    Text,
    Byte,
    Bytes,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Concat,
    Append,
    Prepend,
    Lpipe,
    Rpipe,
    Lcomp,
    Rcomp,
    Pick,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Concat => "++",
            BinOp::Append => "+<",
            BinOp::Prepend => ">+",
            BinOp::Lpipe => "<|",
            BinOp::Rpipe => "|>",
            BinOp::Lcomp => "<<",
            BinOp::Rcomp => ">>",
            BinOp::Pick => "::",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal {
        span: Span,
        kind: LitKind,
    },
    Ident {
        span: Span,
    },
    Binary {
        op: BinOp,
        left: ExprId,
        right: ExprId,
    },
    Call {
        fun: ExprId,
        arg: ExprId,
    },
    /// `pattern -> body`. The argument is a full pattern expression; an
    /// identifier pattern is the plain lambda case.
    Func {
        arg: ExprId,
        body: ExprId,
    },
    /// `| pat -> body | pat2 -> body2 ...`, tried in source order.
    MatchFunc {
        alts: Vec<Alt>,
    },
    Record {
        span: Span,
        entries: Vec<(String, ExprId)>,
        rest: Option<ExprId>,
    },
    Access {
        rec: ExprId,
        key: Span,
    },
    List {
        span: Span,
        elements: Vec<ExprId>,
    },
    /// `body ; name : typ = val`; at least one of `typ`/`val` is present.
    Where {
        body: ExprId,
        name: Span,
        typ: Option<ExprId>,
        val: Option<ExprId>,
    },
    /// `#tag payload?`, always owned by an `Enum` or used as a pattern.
    Variant {
        tag: Span,
        payload: Option<ExprId>,
    },
    Enum {
        variants: Vec<ExprId>,
    },
    /// `$algo~~hash`; `value` is the bytes literal holding the hash.
    Import {
        span: Span,
        algo: String,
        value: ExprId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alt {
    pub pattern: ExprId,
    pub body: ExprId,
}

/// The expression arena.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Ast {
    exprs: Vec<Expr>,
}

impl Ast {
    pub fn add(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn get(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    /// The source range an expression covers.
    pub fn span(&self, id: ExprId) -> Span {
        match self.get(id) {
            Expr::Literal { span, .. }
            | Expr::Ident { span }
            | Expr::Record { span, .. }
            | Expr::List { span, .. }
            | Expr::Import { span, .. } => *span,
            Expr::Binary { left, right, .. } => self.span(*left).to(self.span(*right)),
            Expr::Call { fun, arg } => self.span(*fun).to(self.span(*arg)),
            Expr::Func { arg, body } => self.span(*arg).to(self.span(*body)),
            Expr::MatchFunc { alts } => {
                let first = alts.first().expect("match func has at least one alternative");
                let last = alts.last().expect("match func has at least one alternative");
                self.span(first.pattern).to(self.span(last.body))
            }
            Expr::Access { rec, key } => self.span(*rec).to(*key),
            Expr::Where { body, name, typ, val } => {
                let end = val
                    .or(*typ)
                    .map(|id| self.span(id))
                    .unwrap_or(*name);
                self.span(*body).to(end)
            }
            Expr::Variant { tag, payload } => {
                // One char back for the '#'.
                let start = Span::new(tag.start.saturating_sub(1), tag.end);
                match payload {
                    Some(p) => start.to(self.span(*p)),
                    None => start,
                }
            }
            Expr::Enum { variants } => {
                let first = *variants.first().expect("enum has at least one variant");
                let last = *variants.last().expect("enum has at least one variant");
                self.span(first).to(self.span(last))
            }
        }
    }
}

/// A parsed expression together with its arena and source.
#[derive(Debug, Clone)]
pub struct SourceExpr {
    pub source: Rc<Source>,
    pub ast: Rc<Ast>,
    pub root: ExprId,
}

impl SourceExpr {
    /// The source text of a node, as written.
    pub fn text(&self, id: ExprId) -> &str {
        self.source.get(self.ast.span(id))
    }
}
