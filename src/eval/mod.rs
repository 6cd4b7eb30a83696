//! The tree-walking evaluator.
//!
//! Assumes inference has succeeded on the same AST but keeps defensive
//! type-tag checks for the places type and value can disagree (float
//! pattern equality, empty-list polymorphism) and against bugs. Closures
//! capture their arena and scope; the registry and the import resolver
//! are threaded through every call instead of being captured.

pub mod builtins;
pub mod matcher;
pub mod value;

use std::rc::Rc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::ast::{Alt, Ast, BinOp, Expr, ExprId, LitKind, SourceExpr};
use crate::scope::Scope;
use crate::source::{Error, Source, Span};
use crate::types::{self, Registry, TypeMap, TypeRef};

pub use builtins::install;
pub use matcher::{match_value, MatchError};
pub use value::{
    BuiltinFn, ClosureCtx, FnKind, List, Record, ScriptFn, Value, ValueMap, VariantValue,
};

/// The value environment.
pub type ValueScope = Scope<Value>;

/// Resolves imports during evaluation.
pub trait EvalImport {
    fn eval_import(
        &mut self,
        reg: &mut Registry,
        algo: &str,
        hash: &[u8],
    ) -> Result<Value, Error>;
}

/// Evaluates a whole program in the given environment.
pub fn eval(
    se: &SourceExpr,
    reg: &mut Registry,
    scope: &ValueScope,
    imports: Option<&mut dyn EvalImport>,
) -> Result<Value, Error> {
    let mut ctx = Ctx {
        source: &se.source,
        ast: &se.ast,
        reg,
        imports,
    };
    ctx.eval(se.root, scope)
}

/// Applies a function value to an argument.
pub fn call<'a, 'i>(
    reg: &'a mut Registry,
    mut imports: Option<&'a mut (dyn EvalImport + 'i)>,
    fun: &Value,
    arg: Value,
) -> Result<Value, Error> {
    match fun {
        Value::Builtin(b) => {
            let mut args = b.args.clone();
            args.push(arg);
            if args.len() >= b.op.arity() {
                builtins::run(reg, imports, b.op, &args)
            } else {
                let typ = reg
                    .get_func(b.typ)
                    .map(|(_, result)| result)
                    .unwrap_or(types::NEVER);
                Ok(Value::Builtin(Rc::new(BuiltinFn {
                    name: b.name,
                    typ,
                    op: b.op,
                    args,
                })))
            }
        }

        Value::Func(f) => match &f.kind {
            FnKind::Lambda { ctx, pattern, body } => {
                match match_value(&ctx.source, &ctx.ast, reg, *pattern, &arg) {
                    Ok(vars) => {
                        let scope = bind_all(&ctx.scope, vars);
                        let mut c = Ctx {
                            source: &ctx.source,
                            ast: &ctx.ast,
                            reg,
                            imports,
                        };
                        c.eval(*body, &scope)
                    }
                    Err(MatchError::NoMatch) => {
                        Err(ctx.source.error(ctx.ast.span(*pattern), "no match found"))
                    }
                    Err(MatchError::Hard(err)) => Err(err),
                }
            }

            FnKind::Match { ctx, alts } => {
                for Alt { pattern, body } in alts {
                    match match_value(&ctx.source, &ctx.ast, reg, *pattern, &arg) {
                        Ok(vars) => {
                            let scope = bind_all(&ctx.scope, vars);
                            let mut c = Ctx {
                                source: &ctx.source,
                                ast: &ctx.ast,
                                reg,
                                imports,
                            };
                            return c.eval(*body, &scope);
                        }
                        Err(MatchError::NoMatch) => continue,
                        Err(MatchError::Hard(err)) => return Err(err),
                    }
                }
                Err(Error::msg(format!(
                    "{} had no alternative for {}",
                    f.source,
                    arg.display(reg)
                )))
            }

            FnKind::Compose { first, second } => {
                let mid = call(reg, imports.as_deref_mut(), first, arg)?;
                call(reg, imports, second, mid)
            }
        },

        other => Err(Error::msg(format!("non-func value {}", other.display(reg)))),
    }
}

fn bind_all(scope: &ValueScope, vars: ValueMap) -> ValueScope {
    let mut scope = scope.clone();
    for (name, value) in vars {
        scope = scope.bind(name, value);
    }
    scope
}

/// Decodes a literal's span text into its value.
pub(crate) fn literal_value(source: &Source, span: Span, kind: LitKind) -> Result<Value, Error> {
    let text = source.get(span);
    match kind {
        LitKind::Hole => Ok(Value::Hole),
        LitKind::Int => text
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| source.error(span, format!("bad int literal {text}"))),
        LitKind::Float => text
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| source.error(span, format!("bad float literal {text}"))),
        LitKind::Text => Ok(Value::Text(source.get(span.trim_both()).into())),
        LitKind::Byte => u8::from_str_radix(source.get(span.trim_start(1)), 16)
            .map(Value::Byte)
            .map_err(|_| source.error(span, format!("bad byte literal {text}"))),
        LitKind::Bytes => BASE64
            .decode(source.get(span.trim_start(2)))
            .map(|bytes| Value::Bytes(bytes.into()))
            .map_err(|_| source.error(span, format!("bad bytes literal {text}"))),
    }
}

struct Ctx<'a, 'i> {
    source: &'a Rc<Source>,
    ast: &'a Rc<Ast>,
    reg: &'a mut Registry,
    imports: Option<&'a mut (dyn EvalImport + 'i)>,
}

impl Ctx<'_, '_> {
    fn span(&self, id: ExprId) -> Span {
        self.ast.span(id)
    }

    fn text(&self, id: ExprId) -> &str {
        self.source.get(self.ast.span(id))
    }

    fn error(&self, span: Span, msg: impl Into<String>) -> Error {
        self.source.error(span, msg)
    }

    fn do_call(&mut self, fun: &Value, arg: Value) -> Result<Value, Error> {
        call(self.reg, self.imports.as_deref_mut(), fun, arg)
    }

    fn closure(&self, scope: &ValueScope) -> ClosureCtx {
        ClosureCtx {
            source: self.source.clone(),
            ast: self.ast.clone(),
            scope: scope.clone(),
        }
    }

    fn eval(&mut self, id: ExprId, scope: &ValueScope) -> Result<Value, Error> {
        match self.ast.get(id).clone() {
            Expr::Literal { span, kind } => literal_value(self.source, span, kind),

            Expr::Ident { span } => {
                let name = self.source.get(span);
                match scope.lookup(name) {
                    Some(v) => Ok(v.clone()),
                    None => Err(self.error(span, format!("unknown variable {name}"))),
                }
            }

            Expr::Binary { op, left, right } => self.binary(id, op, left, right, scope),

            Expr::Call { fun, arg } => {
                // A call of a pick expression constructs a variant.
                if let Expr::Binary { op: BinOp::Pick, left, right } = *self.ast.get(fun) {
                    return self.pick(id, left, right, Some(arg), scope);
                }
                let f = self.eval_callable(fun, scope)?;
                let a = self.eval(arg, scope)?;
                self.do_call(&f, a)
            }

            Expr::Where { body, name, typ, val } => {
                let name = self.source.get(name).to_string();
                let bound = match val {
                    Some(val) => self.eval(val, scope)?,
                    // A type-only where binds a type constant.
                    None => {
                        let typ = typ.expect("where has a type or a value");
                        Value::TypeConst(self.type_value(typ, scope)?)
                    }
                };
                let inner = scope.bind(name, bound);
                self.eval(body, &inner)
            }

            Expr::Enum { .. } => {
                let re = self.enum_value(id, scope)?;
                Ok(Value::TypeConst(re))
            }

            Expr::Record { entries, rest, .. } => self.record_expr(&entries, rest, scope),

            Expr::List { elements, .. } => self.list_expr(&elements, scope),

            Expr::Func { arg, body } => Ok(Value::Func(Rc::new(ScriptFn {
                source: self.text(id).to_string(),
                kind: FnKind::Lambda {
                    ctx: self.closure(scope),
                    pattern: arg,
                    body,
                },
            }))),

            Expr::MatchFunc { alts } => Ok(Value::Func(Rc::new(ScriptFn {
                source: self.text(id).to_string(),
                kind: FnKind::Match {
                    ctx: self.closure(scope),
                    alts,
                },
            }))),

            Expr::Access { rec, key } => {
                let record = self.eval_record(rec, scope)?;
                let name = self.source.get(key);
                match record.values.get(name) {
                    Some(v) => Ok(v.clone()),
                    None => {
                        let shown = Value::Record(record.clone()).display(self.reg).to_string();
                        Err(self.error(key, format!("record {shown} has no key {name}")))
                    }
                }
            }

            Expr::Import { span, algo, value } => {
                if self.imports.is_none() {
                    return Err(self.error(span, "missing eval import function"));
                }
                let hash_span = self.span(value).trim_start(2);
                let text = self.source.get(hash_span);
                let hash = BASE64
                    .decode(text)
                    .map_err(|_| self.error(hash_span, format!("bad import hash {text:?}")))?;
                let imports = self.imports.as_deref_mut().expect("checked above");
                imports
                    .eval_import(self.reg, &algo, &hash)
                    .map_err(|e| self.source.error(span, e.to_string()))
            }

            Expr::Variant { tag, .. } => {
                let name = self.source.get(tag);
                Err(self.error(tag, format!("#{name} is only valid inside an enum or pattern")))
            }
        }
    }

    fn binary(
        &mut self,
        id: ExprId,
        op: BinOp,
        left: ExprId,
        right: ExprId,
        scope: &ValueScope,
    ) -> Result<Value, Error> {
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul => {
                let l = self.eval(left, scope)?;
                match l {
                    Value::Float(lf) => {
                        let rf = self.eval_float(right, scope)?;
                        Ok(Value::Float(float_op(op, lf, rf)))
                    }
                    Value::Int(li) => {
                        let ri = self.eval_int(right, scope)?;
                        Ok(Value::Int(int_op(op, li, ri)))
                    }
                    other => {
                        let shown = self.reg.format(other.type_of());
                        Err(self.error(
                            self.span(id),
                            format!("cannot perform arithmetic on {shown}"),
                        ))
                    }
                }
            }

            BinOp::Append => {
                let l = self.eval(left, scope)?;
                match l {
                    Value::Bytes(bs) => {
                        let b = self.eval_byte(right, scope)?;
                        let mut bytes = bs.to_vec();
                        bytes.push(b);
                        Ok(Value::Bytes(bytes.into()))
                    }
                    Value::List(ls) => {
                        let r = self.eval(right, scope)?;
                        let elem = self.pend_element_type(right, &ls, &r)?;
                        let mut elements = ls.elements.to_vec();
                        elements.push(r);
                        Ok(Value::List(List {
                            typ: self.reg.list(elem),
                            elements: Rc::new(elements),
                        }))
                    }
                    other => {
                        let shown = other.display(self.reg).to_string();
                        Err(self.error(self.span(id), format!("cannot append to non-list {shown}")))
                    }
                }
            }

            BinOp::Prepend => {
                let r = self.eval(right, scope)?;
                match r {
                    Value::Bytes(bs) => {
                        let b = self.eval_byte(left, scope)?;
                        let mut bytes = vec![b];
                        bytes.extend_from_slice(&bs);
                        Ok(Value::Bytes(bytes.into()))
                    }
                    Value::List(ls) => {
                        let l = self.eval(left, scope)?;
                        let elem = self.pend_element_type(left, &ls, &l)?;
                        let mut elements = vec![l];
                        elements.extend_from_slice(&ls.elements);
                        Ok(Value::List(List {
                            typ: self.reg.list(elem),
                            elements: Rc::new(elements),
                        }))
                    }
                    other => {
                        let shown = other.display(self.reg).to_string();
                        Err(self.error(
                            self.span(id),
                            format!("cannot prepend to non-list {shown}"),
                        ))
                    }
                }
            }

            BinOp::Concat => {
                let l = self.eval(left, scope)?;
                match l {
                    Value::Bytes(bs) => {
                        let r = self.eval_bytes(right, scope)?;
                        let mut bytes = bs.to_vec();
                        bytes.extend_from_slice(&r);
                        Ok(Value::Bytes(bytes.into()))
                    }
                    Value::Text(t) => {
                        let r = self.eval_text(right, scope)?;
                        let mut text = t.to_string();
                        text.push_str(&r);
                        Ok(Value::Text(text.into()))
                    }
                    Value::List(ls) => {
                        let r = self.eval_list(right, scope)?;
                        // The empty list absorbs the other side's type.
                        let mut typ = ls.typ;
                        if typ != r.typ {
                            if self.reg.get_list(typ) == Some(types::NEVER) {
                                typ = r.typ;
                            } else if self.reg.get_list(r.typ) != Some(types::NEVER) {
                                let lt = self.reg.format(ls.typ);
                                let rt = self.reg.format(r.typ);
                                return Err(self.error(
                                    self.span(left),
                                    format!("cannot concat {lt} to {rt}"),
                                ));
                            }
                        }
                        let mut elements = ls.elements.to_vec();
                        elements.extend_from_slice(&r.elements);
                        Ok(Value::List(List {
                            typ,
                            elements: Rc::new(elements),
                        }))
                    }
                    other => {
                        let shown = other.display(self.reg).to_string();
                        Err(self.error(self.span(id), format!("cannot concat non-list {shown}")))
                    }
                }
            }

            BinOp::Rpipe => {
                let f = self.eval_callable(right, scope)?;
                let a = self.eval(left, scope)?;
                self.do_call(&f, a)
            }
            BinOp::Lpipe => {
                let f = self.eval_callable(left, scope)?;
                let a = self.eval(right, scope)?;
                self.do_call(&f, a)
            }

            BinOp::Rcomp | BinOp::Lcomp => {
                let l = self.eval_callable(left, scope)?;
                let r = self.eval_callable(right, scope)?;
                let (first, second) = match op {
                    BinOp::Rcomp => (l, r),
                    _ => (r, l),
                };
                Ok(Value::Func(Rc::new(ScriptFn {
                    source: self.text(id).to_string(),
                    kind: FnKind::Compose { first, second },
                })))
            }

            BinOp::Pick => self.pick(id, left, right, None, scope),
        }
    }

    /// The element type a list gains by prepending or appending `v`,
    /// absorbing the empty list's `never`.
    fn pend_element_type(
        &mut self,
        at: ExprId,
        list: &List,
        v: &Value,
    ) -> Result<TypeRef, Error> {
        let elem = self.reg.get_list(list.typ).unwrap_or(types::NEVER);
        if v.type_of() == elem {
            return Ok(elem);
        }
        if elem == types::NEVER {
            return Ok(v.type_of());
        }
        let vt = self.reg.format(v.type_of());
        let lt = self.reg.format(list.typ);
        Err(self.error(self.span(at), format!("cannot extend {lt} with {vt}")))
    }

    fn pick(
        &mut self,
        id: ExprId,
        left: ExprId,
        right: ExprId,
        value: Option<ExprId>,
        scope: &ValueScope,
    ) -> Result<Value, Error> {
        let enum_ref = self.type_value(left, scope)?;
        let map = match self.reg.get_enum(enum_ref) {
            Some(map) => map.clone(),
            None => {
                let shown = self.reg.format(enum_ref);
                return Err(self.error(self.span(left), format!("{shown} isn't an enum")));
            }
        };

        let Expr::Ident { span: tag_span } = *self.ast.get(right) else {
            return Err(self.error(self.span(right), "cannot pick with a non-identifier"));
        };
        let tag = self.source.get(tag_span).to_string();

        let payload_ty = match map.get(&tag) {
            Some(&re) => re,
            None => {
                let tags = map.keys().cloned().collect::<Vec<_>>().join(", #");
                return Err(self.error(
                    self.span(id),
                    format!("#{tag} isn't one of the valid tags: #{tags}"),
                ));
            }
        };

        if payload_ty == types::NEVER {
            return match value {
                None => Ok(Value::Variant(Rc::new(VariantValue {
                    typ: enum_ref,
                    tag,
                    value: None,
                }))),
                Some(value) => Err(self.error(
                    self.span(value),
                    format!("#{tag} does not take a value"),
                )),
            };
        }

        match value {
            None => {
                let shown = self.reg.format(payload_ty);
                Err(self.error(
                    tag_span,
                    format!("#{tag} requires a value of type {shown}"),
                ))
            }
            Some(value) => {
                let v = self.eval(value, scope)?;
                // Function values report `never`; inference already
                // checked them.
                let got_ty = v.type_of();
                if got_ty != types::NEVER && got_ty != self.reg.follow(payload_ty) {
                    let want = self.reg.format(payload_ty);
                    let got = self.reg.format(got_ty);
                    return Err(self.error(
                        self.span(value),
                        format!("#{tag} requires a value of type {want}, got {got}"),
                    ));
                }
                Ok(Value::Variant(Rc::new(VariantValue {
                    typ: enum_ref,
                    tag,
                    value: Some(v),
                })))
            }
        }
    }

    /// Evaluates a type expression to its `TypeRef`.
    fn type_value(&mut self, id: ExprId, scope: &ValueScope) -> Result<TypeRef, Error> {
        match self.ast.get(id).clone() {
            Expr::Ident { span } => {
                let v = self.eval(id, scope)?;
                match v {
                    Value::TypeConst(re) => Ok(re),
                    other => {
                        let shown = other.display(self.reg).to_string();
                        Err(self.error(span, format!("required a type, got {shown}")))
                    }
                }
            }
            Expr::Func { arg, body } => {
                let arg = self.type_value(arg, scope)?;
                let body = self.type_value(body, scope)?;
                Ok(self.reg.func(arg, body))
            }
            Expr::Enum { .. } => self.enum_value(id, scope),
            _ => {
                let text = self.text(id).to_string();
                Err(self.error(self.span(id), format!("{text} does not evaluate to a type")))
            }
        }
    }

    fn enum_value(&mut self, id: ExprId, scope: &ValueScope) -> Result<TypeRef, Error> {
        let Expr::Enum { variants } = self.ast.get(id).clone() else {
            unreachable!("enum_value on a non-enum");
        };
        let mut map = TypeMap::new();
        for variant in variants {
            let Expr::Variant { tag, payload } = self.ast.get(variant).clone() else {
                unreachable!("enums only contain variants");
            };
            let name = self.source.get(tag).to_string();
            if map.contains_key(&name) {
                return Err(self.error(tag, format!("cannot define tag #{name} more than once")));
            }
            let payload_ty = match payload {
                Some(p) => self.type_value(p, scope)?,
                None => types::NEVER,
            };
            map.insert(name, payload_ty);
        }
        Ok(self.reg.enum_of(map))
    }

    fn record_expr(
        &mut self,
        entries: &[(String, ExprId)],
        rest: Option<ExprId>,
        scope: &ValueScope,
    ) -> Result<Value, Error> {
        // A fresh record.
        let Some(rest) = rest else {
            let mut types_map = TypeMap::new();
            let mut values = ValueMap::new();
            for (key, x) in entries {
                let v = self.eval(*x, scope)?;
                types_map.insert(key.clone(), v.type_of());
                values.insert(key.clone(), v);
            }
            let typ = self.reg.record_of(types_map);
            return Ok(Value::Record(Record {
                typ,
                values: Rc::new(values),
            }));
        };

        // A record based on another.
        let other = self.eval_record(rest, scope)?;
        let declared = self.reg.get_record(other.typ).cloned().unwrap_or_default();
        let mut values = (*other.values).clone();

        for (key, x) in entries {
            let Some(&typ) = declared.get(key) else {
                return Err(self.error(
                    self.span(*x),
                    format!("cannot set key {key} not in the base record"),
                ));
            };
            let v = self.eval(*x, scope)?;
            let got_ty = v.type_of();
            if got_ty != types::NEVER && got_ty != self.reg.follow(typ) {
                let from = self.reg.format(typ);
                let to = self.reg.format(got_ty);
                return Err(self.error(
                    self.span(*x),
                    format!("cannot change type of key {key} from {from} to {to}"),
                ));
            }
            values.insert(key.clone(), v);
        }

        Ok(Value::Record(Record {
            typ: other.typ,
            values: Rc::new(values),
        }))
    }

    fn list_expr(&mut self, elements: &[ExprId], scope: &ValueScope) -> Result<Value, Error> {
        let mut values = Vec::with_capacity(elements.len());
        let mut typ = types::NEVER;
        for x in elements {
            let v = self.eval(*x, scope)?;
            if v.type_of() != typ {
                if typ == types::NEVER {
                    typ = v.type_of();
                } else {
                    let want = self.reg.format(typ);
                    let got = self.reg.format(v.type_of());
                    return Err(self.error(
                        self.span(*x),
                        format!("list elements must all be of type {want}, got {got}"),
                    ));
                }
            }
            values.push(v);
        }
        Ok(Value::List(List {
            typ: self.reg.list(typ),
            elements: Rc::new(values),
        }))
    }

    // ── Typed evaluation helpers ────────────────────────────────────

    fn eval_callable(&mut self, id: ExprId, scope: &ValueScope) -> Result<Value, Error> {
        let v = self.eval(id, scope)?;
        if v.is_callable() {
            Ok(v)
        } else {
            let shown = v.display(self.reg).to_string();
            Err(self.error(self.span(id), format!("non-func value {shown}")))
        }
    }

    fn eval_int(&mut self, id: ExprId, scope: &ValueScope) -> Result<i64, Error> {
        match self.eval(id, scope)? {
            Value::Int(i) => Ok(i),
            v => Err(self.non(id, "int", &v)),
        }
    }

    fn eval_float(&mut self, id: ExprId, scope: &ValueScope) -> Result<f64, Error> {
        match self.eval(id, scope)? {
            Value::Float(f) => Ok(f),
            v => Err(self.non(id, "float", &v)),
        }
    }

    fn eval_byte(&mut self, id: ExprId, scope: &ValueScope) -> Result<u8, Error> {
        match self.eval(id, scope)? {
            Value::Byte(b) => Ok(b),
            v => Err(self.non(id, "byte", &v)),
        }
    }

    fn eval_bytes(&mut self, id: ExprId, scope: &ValueScope) -> Result<Rc<[u8]>, Error> {
        match self.eval(id, scope)? {
            Value::Bytes(bs) => Ok(bs),
            v => Err(self.non(id, "bytes", &v)),
        }
    }

    fn eval_text(&mut self, id: ExprId, scope: &ValueScope) -> Result<Rc<str>, Error> {
        match self.eval(id, scope)? {
            Value::Text(t) => Ok(t),
            v => Err(self.non(id, "text", &v)),
        }
    }

    fn eval_list(&mut self, id: ExprId, scope: &ValueScope) -> Result<List, Error> {
        match self.eval(id, scope)? {
            Value::List(l) => Ok(l),
            v => Err(self.non(id, "list", &v)),
        }
    }

    fn eval_record(&mut self, id: ExprId, scope: &ValueScope) -> Result<Record, Error> {
        match self.eval(id, scope)? {
            Value::Record(r) => Ok(r),
            v => Err(self.non(id, "record", &v)),
        }
    }

    fn non(&self, id: ExprId, kind: &str, v: &Value) -> Error {
        let shown = v.display(self.reg).to_string();
        self.error(self.span(id), format!("non-{kind} value {shown}"))
    }
}

fn int_op(op: BinOp, a: i64, b: i64) -> i64 {
    match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        _ => unreachable!("not an arithmetic operator"),
    }
}

fn float_op(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        _ => unreachable!("not an arithmetic operator"),
    }
}
