//! Hindley-Milner type inference.
//!
//! One recursive walk over the AST. Identifiers instantiate their scheme
//! on every use; where-bindings generalize. Lambda patterns are match-bound
//! in type direction: the pattern's structural shape is unified against the
//! argument variable while pattern names enter the type scope.

use crate::ast::{Alt, BinOp, Expr, ExprId, LitKind, SourceExpr};
use crate::scope::Scope;
use crate::source::{Error, Span};

use super::registry::Registry;
use super::ty::{self, TypeRef};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Resolves imports during inference. The registry is handed back so the
/// resolver can infer the imported scrap in the same type world.
pub trait InferImport {
    fn infer_import(
        &mut self,
        reg: &mut Registry,
        algo: &str,
        hash: &[u8],
    ) -> Result<TypeRef, Error>;
}

/// The base type scope: all primitive types bound by name.
pub fn default_scope() -> Scope<TypeRef> {
    let mut scope = Scope::empty();
    for (re, name) in ty::PRIMITIVES.iter().zip(ty::PRIMITIVE_NAMES) {
        scope = scope.bind(name, *re);
    }
    scope
}

/// Infers the type of a whole program.
pub fn infer<'a, 'i>(
    reg: &'a mut Registry,
    scope: Scope<TypeRef>,
    se: &'a SourceExpr,
    imports: Option<&'a mut (dyn InferImport + 'i)>,
) -> Result<TypeRef, Error> {
    let mut ctx = Ctx {
        se,
        reg,
        scope,
        imports,
    };
    ctx.infer(se.root)
}

struct Ctx<'a, 'i> {
    se: &'a SourceExpr,
    reg: &'a mut Registry,
    scope: Scope<TypeRef>,
    imports: Option<&'a mut (dyn InferImport + 'i)>,
}

impl Ctx<'_, '_> {
    fn span(&self, id: ExprId) -> Span {
        self.se.ast.span(id)
    }

    fn text(&self, id: ExprId) -> &str {
        self.se.text(id)
    }

    fn bail(&self, span: Span, msg: impl Into<String>) -> Error {
        self.se.source.error(span, msg)
    }

    fn bind(&mut self, name: &str, re: TypeRef) {
        self.scope = self.scope.bind(name, re);
    }

    fn unbind(&mut self, count: usize) {
        for _ in 0..count {
            self.scope = self.scope.parent();
        }
    }

    /// Unifies `got` with `want`, attaching `id`'s span on failure.
    fn ensure(&mut self, id: ExprId, got: TypeRef, want: TypeRef) -> Result<TypeRef, Error> {
        if got != want {
            self.reg
                .unify(got, want)
                .map_err(|e| self.bail(self.span(id), e.render(self.reg)))?;
        }
        Ok(want)
    }

    fn infer(&mut self, id: ExprId) -> Result<TypeRef, Error> {
        match self.se.ast.get(id).clone() {
            Expr::Literal { kind, .. } => Ok(literal_type(kind)),

            Expr::Ident { span } => {
                let name = self.se.source.get(span).to_string();
                match self.scope.lookup(&name) {
                    Some(&re) => Ok(self.reg.instantiate(re)),
                    None => Err(self.bail(span, format!("unbound variable: {name}"))),
                }
            }

            Expr::Where { body, name, typ, val } => self.where_expr(body, name, typ, val),

            Expr::List { elements, .. } => self.list(&elements),

            Expr::Record { entries, rest, .. } => self.record(&entries, rest),

            Expr::Enum { .. } => self.type_of(id),

            Expr::Func { arg, body } => {
                let binder = self.reg.var();
                let bound = self.match_bind(arg, binder)?;
                let result = self.infer(body);
                self.unbind(bound);
                let ret = result?;
                Ok(self.reg.func(binder, ret))
            }

            Expr::MatchFunc { alts } => {
                let arg_ty = self.reg.var();
                let body_ty = self.reg.var();
                for Alt { pattern, body } in alts {
                    let bound = self.match_bind(pattern, arg_ty)?;
                    let result = self
                        .infer(body)
                        .and_then(|inferred| self.ensure(body, body_ty, inferred));
                    self.unbind(bound);
                    result?;
                }
                Ok(self.reg.func(arg_ty, body_ty))
            }

            Expr::Call { fun, arg } => {
                // A call of a pick expression constructs a variant.
                if let Expr::Binary { op: BinOp::Pick, left, right } = *self.se.ast.get(fun) {
                    return self.pick(left, right, Some(arg));
                }
                self.call(id, fun, arg)
            }

            Expr::Binary { op, left, right } => self.binary(id, op, left, right),

            Expr::Access { rec, key } => {
                let rec_ty = self.infer(rec)?;
                let map = match self.reg.get_record(rec_ty) {
                    Some(map) => map.clone(),
                    None => {
                        let shown = self.reg.format(rec_ty);
                        return Err(self.bail(self.span(rec), format!("{shown} isn't a record")));
                    }
                };
                let name = self.se.source.get(key);
                match map.get(name) {
                    Some(&re) => Ok(re),
                    None => {
                        let shown = self.reg.format(rec_ty);
                        Err(self.bail(key, format!("record {shown} has no key {name}")))
                    }
                }
            }

            Expr::Import { span, value, algo } => {
                if self.imports.is_none() {
                    return Err(
                        self.bail(span, "<internal error> missing infer import function")
                    );
                }
                let hash = self.import_hash(value)?;
                let imports = self.imports.as_deref_mut().expect("checked above");
                imports
                    .infer_import(self.reg, &algo, &hash)
                    .map_err(|e| self.se.source.error(span, e.to_string()))
            }

            Expr::Variant { tag, .. } => {
                let name = self.se.source.get(tag);
                Err(self.bail(tag, format!("#{name} is only valid inside an enum or pattern")))
            }
        }
    }

    /// Decodes the base64 payload of an import's bytes literal.
    fn import_hash(&self, value: ExprId) -> Result<Vec<u8>, Error> {
        let span = self.span(value).trim_start(2);
        let text = self.se.source.get(span);
        BASE64
            .decode(text)
            .map_err(|_| self.bail(span, format!("bad import hash {text:?}")))
    }

    fn call(&mut self, id: ExprId, fun: ExprId, arg: ExprId) -> Result<TypeRef, Error> {
        let res = self.reg.var();
        let fun_ty = self.infer(fun)?;
        let arg_ty = self.infer(arg)?;
        let wanted = self.reg.func(arg_ty, res);
        self.ensure(id, fun_ty, wanted)?;
        Ok(res)
    }

    fn binary(&mut self, id: ExprId, op: BinOp, left: ExprId, right: ExprId) -> Result<TypeRef, Error> {
        if op == BinOp::Pick {
            return self.pick(left, right, None);
        }

        // Pipes and composition evaluate their operands themselves.
        match op {
            BinOp::Lpipe => return self.call(id, left, right),
            BinOp::Rpipe => return self.call(id, right, left),
            BinOp::Rcomp => return self.compose(left, right),
            BinOp::Lcomp => return self.compose(right, left),
            _ => {}
        }

        let left_ty = self.infer(left)?;
        let right_ty = self.infer(right)?;

        match op {
            BinOp::Prepend => self.pend(left, right, left_ty, right_ty),
            BinOp::Append => self.pend(right, left, right_ty, left_ty),

            BinOp::Concat => {
                let l = self.reg.resolve(left_ty);
                let r = self.reg.resolve(right_ty);
                if l == ty::TEXT || r == ty::TEXT {
                    self.ensure(id, left_ty, right_ty)?;
                    return Ok(ty::TEXT);
                }
                if l == ty::BYTES || r == ty::BYTES {
                    self.ensure(id, left_ty, right_ty)?;
                    return Ok(ty::BYTES);
                }
                let element = self.reg.var();
                let lists = self.reg.list(element);
                self.ensure(id, left_ty, right_ty)?;
                self.ensure(id, left_ty, lists)?;
                Ok(lists)
            }

            BinOp::Add | BinOp::Sub | BinOp::Mul => {
                let l = self.reg.resolve(left_ty);
                let r = self.reg.resolve(right_ty);
                if l == ty::FLOAT || r == ty::FLOAT {
                    self.ensure(id, left_ty, right_ty)?;
                    return Ok(ty::FLOAT);
                }
                // Default to int, like ML does.
                self.ensure(left, left_ty, ty::INT)?;
                self.ensure(right, right_ty, ty::INT)
            }

            _ => unreachable!("binary operator {op:?} handled above"),
        }
    }

    /// Either pre-pend or ap-pend: `single` joins `list`.
    fn pend(
        &mut self,
        single_x: ExprId,
        list_x: ExprId,
        single: TypeRef,
        list: TypeRef,
    ) -> Result<TypeRef, Error> {
        // The byte and bytes special case.
        if self.reg.resolve(single) == ty::BYTE || self.reg.resolve(list) == ty::BYTES {
            self.ensure(single_x, single, ty::BYTE)?;
            self.ensure(list_x, list, ty::BYTES)?;
            return Ok(ty::BYTES);
        }

        let single_list = self.reg.list(single);
        self.ensure(single_x, single_list, list)?;
        Ok(list)
    }

    fn compose(&mut self, first: ExprId, second: ExprId) -> Result<TypeRef, Error> {
        let a = self.reg.var();
        let b = self.reg.var();
        let c = self.reg.var();
        let first_ty = self.infer(first)?;
        let wanted = self.reg.func(a, b);
        self.ensure(first, first_ty, wanted)?;
        let second_ty = self.infer(second)?;
        let wanted = self.reg.func(b, c);
        self.ensure(second, second_ty, wanted)?;
        Ok(self.reg.func(a, c))
    }

    fn pick(
        &mut self,
        left: ExprId,
        right: ExprId,
        value: Option<ExprId>,
    ) -> Result<TypeRef, Error> {
        let enum_ty = self.infer(left)?;
        let map = match self.reg.get_enum(enum_ty) {
            Some(map) => map.clone(),
            None => {
                let shown = self.reg.format(enum_ty);
                return Err(self.bail(self.span(left), format!("{shown} isn't an enum")));
            }
        };

        let tag_span = match self.se.ast.get(right) {
            Expr::Ident { span } => *span,
            _ => return Err(self.bail(self.span(right), "cannot pick with a non-identifier")),
        };
        let tag = self.se.source.get(tag_span).to_string();

        let payload = match map.get(&tag) {
            Some(&re) => re,
            None => {
                let shown = self.reg.format(enum_ty);
                return Err(self.bail(
                    tag_span,
                    format!("#{tag} isn't a valid option for enum {shown}"),
                ));
            }
        };

        if payload == ty::NEVER {
            if let Some(value) = value {
                return Err(self.bail(self.span(value), format!("#{tag} doesn't take any value")));
            }
            return Ok(enum_ty);
        }

        match value {
            Some(value) => {
                let value_ty = self.infer(value)?;
                self.ensure(value, value_ty, payload)?;
                Ok(enum_ty)
            }
            // Bare constructor for a payload-carrying tag: a function
            // from the payload type to the enum.
            None => Ok(self.reg.func(payload, enum_ty)),
        }
    }

    fn where_expr(
        &mut self,
        body: ExprId,
        name: Span,
        typ: Option<ExprId>,
        val: Option<ExprId>,
    ) -> Result<TypeRef, Error> {
        let name = self.se.source.get(name).to_string();

        let val = match val {
            // Type-only declaration.
            None => {
                let typ = typ.expect("where has a type or a value");
                let declared = self.type_of(typ)?;
                let scheme = self.reg.generalize(declared);
                self.bind(&name, scheme);
                let result = self.infer(body);
                self.unbind(1);
                return result;
            }
            Some(val) => val,
        };

        let mut val_ty = self.infer(val)?;

        // An annotation must match the inferred type, and the annotated
        // type is what the name gets.
        if let Some(typ) = typ {
            let declared = self.type_of(typ)?;
            self.ensure(typ, val_ty, declared)?;
            val_ty = declared;
        }

        let scheme = self.reg.generalize(val_ty);
        self.bind(&name, scheme);
        let result = self.infer(body);
        self.unbind(1);
        result
    }

    /// Interprets a restricted expression grammar as a type: identifiers
    /// name types, arrows build function types, enum literals build enums.
    fn type_of(&mut self, id: ExprId) -> Result<TypeRef, Error> {
        match self.se.ast.get(id).clone() {
            Expr::Ident { span } => {
                let name = self.se.source.get(span);
                match self.scope.lookup(name) {
                    Some(&re) => Ok(re),
                    None => Err(self.bail(span, format!("unknown type {name}"))),
                }
            }
            Expr::Func { arg, body } => {
                let arg = self.type_of(arg)?;
                let body = self.type_of(body)?;
                Ok(self.reg.func(arg, body))
            }
            Expr::Enum { variants } => {
                let mut map = super::TypeMap::new();
                for variant in variants {
                    let Expr::Variant { tag, payload } = self.se.ast.get(variant).clone() else {
                        unreachable!("enums only contain variants");
                    };
                    let name = self.se.source.get(tag).to_string();
                    let payload = match payload {
                        Some(p) => self.type_of(p)?,
                        None => ty::NEVER,
                    };
                    map.insert(name, payload);
                }
                Ok(self.reg.enum_of(map))
            }
            _ => {
                let text = self.text(id).to_string();
                Err(self.bail(self.span(id), format!("cannot use {text} as a type")))
            }
        }
    }

    fn list(&mut self, elements: &[ExprId]) -> Result<TypeRef, Error> {
        let mut element = None;
        for &el in elements {
            let el_ty = self.infer(el)?;
            match element {
                None => element = Some(el_ty),
                Some(first) => {
                    self.ensure(el, first, el_ty)?;
                }
            }
        }
        let element = match element {
            Some(re) => re,
            None => self.reg.var(),
        };
        Ok(self.reg.list(element))
    }

    fn record(
        &mut self,
        entries: &[(String, ExprId)],
        rest: Option<ExprId>,
    ) -> Result<TypeRef, Error> {
        // With a spread, the result type is the spread's type and every
        // listed field must keep its declared type.
        if let Some(rest) = rest {
            let rest_ty = self.infer(rest)?;
            let map = match self.reg.get_record(rest_ty) {
                Some(map) => map.clone(),
                None => {
                    let shown = self.reg.format(rest_ty);
                    return Err(self.bail(
                        self.span(rest),
                        format!("cannot spread from non-record type {shown}"),
                    ));
                }
            };
            for (key, value) in entries {
                let expected = match map.get(key) {
                    Some(&re) => re,
                    None => {
                        return Err(self.bail(
                            self.span(*value),
                            format!("cannot set {key} not in the base record"),
                        ));
                    }
                };
                let actual = self.infer(*value)?;
                if self.reg.unify(actual, expected).is_err() {
                    let expected = self.reg.format(expected);
                    let actual = self.reg.format(actual);
                    return Err(self.bail(
                        self.span(*value),
                        format!("type of {key} must be {expected}, not {actual}"),
                    ));
                }
            }
            return Ok(rest_ty);
        }

        let mut map = super::TypeMap::new();
        for (key, value) in entries {
            let value_ty = self.infer(*value)?;
            map.insert(key.clone(), value_ty);
        }
        Ok(self.reg.record_of(map))
    }

    /// Type-direction pattern matching: unifies the pattern's shape
    /// against `arg_ty`, binding pattern names in the type scope.
    /// Returns the number of bindings added so the caller can unwind.
    fn match_bind(&mut self, pattern: ExprId, arg_ty: TypeRef) -> Result<usize, Error> {
        match self.se.ast.get(pattern).clone() {
            Expr::Ident { span } => {
                let name = self.se.source.get(span).to_string();
                if name == "_" {
                    return Ok(0);
                }
                self.bind(&name, arg_ty);
                Ok(1)
            }

            Expr::Literal { kind, .. } => {
                self.ensure(pattern, arg_ty, literal_type(kind))?;
                Ok(0)
            }

            Expr::Binary { op, left, right } => {
                let element = self.reg.var();
                let element_list = self.reg.list(element);
                match op {
                    BinOp::Prepend => {
                        self.ensure(pattern, arg_ty, element_list)?;
                        Ok(self.match_bind(left, element)? + self.match_bind(right, element_list)?)
                    }
                    BinOp::Append => {
                        self.ensure(pattern, arg_ty, element_list)?;
                        Ok(self.match_bind(left, element_list)? + self.match_bind(right, element)?)
                    }
                    BinOp::Concat => {
                        self.ensure(pattern, arg_ty, element_list)?;
                        Ok(self.match_bind(left, element_list)?
                            + self.match_bind(right, element_list)?)
                    }
                    _ => {
                        let text = self.text(pattern).to_string();
                        Err(self.bail(self.span(pattern), format!("cannot match on {text}")))
                    }
                }
            }

            Expr::List { elements, .. } => {
                let element = self.reg.var();
                let element_list = self.reg.list(element);
                self.ensure(pattern, element_list, arg_ty)?;
                let mut bound = 0;
                for el in elements {
                    bound += self.match_bind(el, element)?;
                }
                Ok(bound)
            }

            // A record pattern without a spread pins the exact key set;
            // with a spread the argument stays unconstrained and the rest
            // binds a fresh variable.
            Expr::Record { entries, rest, .. } => {
                let mut bound = 0;
                let mut map = super::TypeMap::new();
                let mut field_tys = Vec::with_capacity(entries.len());
                for (key, _) in &entries {
                    let field = self.reg.var();
                    map.insert(key.clone(), field);
                    field_tys.push(field);
                }
                if rest.is_none() {
                    let record = self.reg.record_of(map);
                    self.ensure(pattern, record, arg_ty)?;
                }
                for ((_, field_pattern), field_ty) in entries.iter().zip(field_tys) {
                    bound += self.match_bind(*field_pattern, field_ty)?;
                }
                if let Some(rest) = rest {
                    let rest_ty = self.reg.var();
                    bound += self.match_bind(rest, rest_ty)?;
                }
                Ok(bound)
            }

            // Tag sets aren't row-polymorphic, so a variant pattern can't
            // pin the whole enum; its payload binds a fresh variable and
            // the call site supplies the concrete type.
            Expr::Variant { payload, .. } => match payload {
                Some(payload) => {
                    let payload_ty = self.reg.var();
                    self.match_bind(payload, payload_ty)
                }
                None => Ok(0),
            },

            _ => {
                let text = self.text(pattern).to_string();
                Err(self.bail(self.span(pattern), format!("cannot match on {text}")))
            }
        }
    }
}

fn literal_type(kind: LitKind) -> TypeRef {
    match kind {
        LitKind::Hole => ty::HOLE,
        LitKind::Int => ty::INT,
        LitKind::Float => ty::FLOAT,
        LitKind::Text => ty::TEXT,
        LitKind::Byte => ty::BYTE,
        LitKind::Bytes => ty::BYTES,
    }
}
