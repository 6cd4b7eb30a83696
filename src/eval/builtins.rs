//! Builtin functions and the base scopes.
//!
//! Builtins are values carrying their polymorphic type (stored with
//! unbounds; every identifier use instantiates it fresh). Multi-argument
//! builtins accumulate applied arguments until saturated.

use std::rc::Rc;

use crate::scope::Scope;
use crate::source::Error;
use crate::types::{self, Registry, TypeRef};

use super::value::{BuiltinFn, List, Value};
use super::{call, EvalImport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinOp {
    ToFloat,
    Round,
    Ceil,
    Floor,
    BytesToUtf8Text,
    BytesFromUtf8Text,
    ListLength,
    ListMap,
    ListFold,
    ListRepeat,
    TextLength,
    TextRepeat,
    TextJoin,
}

impl BuiltinOp {
    pub fn arity(self) -> usize {
        match self {
            BuiltinOp::ToFloat
            | BuiltinOp::Round
            | BuiltinOp::Ceil
            | BuiltinOp::Floor
            | BuiltinOp::BytesToUtf8Text
            | BuiltinOp::BytesFromUtf8Text
            | BuiltinOp::ListLength
            | BuiltinOp::TextLength => 1,
            BuiltinOp::ListMap
            | BuiltinOp::ListRepeat
            | BuiltinOp::TextRepeat
            | BuiltinOp::TextJoin => 2,
            BuiltinOp::ListFold => 3,
        }
    }
}

/// Builds the base type and value scopes: primitive type names, type
/// constants, and the builtin function table.
pub fn install(reg: &mut Registry) -> (Scope<TypeRef>, Scope<Value>) {
    let mut types_scope = crate::types::default_scope();
    let mut values = Scope::empty();

    // Built-in types are values too, usable in pick expressions and
    // type annotations.
    values = values.bind("()", Value::TypeConst(types::HOLE));
    values = values.bind("int", Value::TypeConst(types::INT));
    values = values.bind("float", Value::TypeConst(types::FLOAT));
    values = values.bind("text", Value::TypeConst(types::TEXT));
    values = values.bind("byte", Value::TypeConst(types::BYTE));
    values = values.bind("bytes", Value::TypeConst(types::BYTES));

    let a = reg.unbound();
    let b = reg.unbound();
    let a_to_b = reg.func(a, b);
    let a_list = reg.list(a);
    let b_list = reg.list(b);
    let text_list = reg.list(types::TEXT);

    let mut define = |name: &'static str, typ: TypeRef, op: BuiltinOp| {
        values = values.bind(
            name,
            Value::Builtin(Rc::new(BuiltinFn {
                name,
                typ,
                op,
                args: Vec::new(),
            })),
        );
        types_scope = types_scope.bind(name, typ);
    };

    // Lists
    let t = reg.func(a_list, types::INT);
    define("list/length", t, BuiltinOp::ListLength);

    let lists = reg.func(a_list, b_list);
    let t = reg.func(a_to_b, lists);
    define("list/map", t, BuiltinOp::ListMap);

    let step = reg.func(b, a);
    let accum = reg.func(a, step);
    let tail = reg.func(b_list, a);
    let folder = reg.func(accum, tail);
    let t = reg.func(a, folder);
    define("list/fold", t, BuiltinOp::ListFold);

    let repeat = reg.func(a, a_list);
    let t = reg.func(types::INT, repeat);
    define("list/repeat", t, BuiltinOp::ListRepeat);

    // Text
    let t = reg.func(types::TEXT, types::INT);
    define("text/length", t, BuiltinOp::TextLength);

    let repeat = reg.func(types::TEXT, types::TEXT);
    let t = reg.func(types::INT, repeat);
    define("text/repeat", t, BuiltinOp::TextRepeat);

    let join = reg.func(text_list, types::TEXT);
    let t = reg.func(types::TEXT, join);
    define("text/join", t, BuiltinOp::TextJoin);

    // Numeric conversions
    let t = reg.func(types::INT, types::FLOAT);
    define("to-float", t, BuiltinOp::ToFloat);

    let float_to_int = reg.func(types::FLOAT, types::INT);
    define("round", float_to_int, BuiltinOp::Round);
    define("ceil", float_to_int, BuiltinOp::Ceil);
    define("floor", float_to_int, BuiltinOp::Floor);

    // Bytes <-> text
    let t = reg.func(types::BYTES, types::TEXT);
    define("bytes/to-utf8-text", t, BuiltinOp::BytesToUtf8Text);

    let t = reg.func(types::TEXT, types::BYTES);
    define("bytes/from-utf8-text", t, BuiltinOp::BytesFromUtf8Text);

    (types_scope, values)
}

/// Runs a saturated builtin.
pub(super) fn run<'a, 'i>(
    reg: &'a mut Registry,
    mut imports: Option<&'a mut (dyn EvalImport + 'i)>,
    op: BuiltinOp,
    args: &[Value],
) -> Result<Value, Error> {
    match op {
        BuiltinOp::ToFloat => match &args[0] {
            Value::Int(i) => Ok(Value::Float(*i as f64)),
            v => Err(non("int", v, reg)),
        },
        BuiltinOp::Round => round(reg, &args[0], f64::round),
        BuiltinOp::Ceil => round(reg, &args[0], f64::ceil),
        BuiltinOp::Floor => round(reg, &args[0], f64::floor),

        BuiltinOp::BytesToUtf8Text => match &args[0] {
            Value::Bytes(bs) => match std::str::from_utf8(bs) {
                Ok(text) => Ok(Value::Text(text.into())),
                Err(_) => Err(Error::msg("bytes are not valid utf-8")),
            },
            v => Err(non("bytes", v, reg)),
        },
        BuiltinOp::BytesFromUtf8Text => match &args[0] {
            Value::Text(t) => Ok(Value::Bytes(t.as_bytes().to_vec().into())),
            v => Err(non("text", v, reg)),
        },

        BuiltinOp::ListLength => match &args[0] {
            Value::List(l) => Ok(Value::Int(l.elements.len() as i64)),
            v => Err(non("list", v, reg)),
        },

        BuiltinOp::ListMap => {
            let f = &args[0];
            let Value::List(list) = &args[1] else {
                return Err(non("list", &args[1], reg));
            };
            let list = list.clone();
            let mut mapped = Vec::with_capacity(list.elements.len());
            for v in list.elements.iter() {
                mapped.push(call(reg, imports.as_deref_mut(), f, v.clone())?);
            }
            Ok(Value::List(from_values(reg, mapped)))
        }

        BuiltinOp::ListFold => {
            let mut acc = args[0].clone();
            let f = &args[1];
            let Value::List(list) = &args[2] else {
                return Err(non("list", &args[2], reg));
            };
            let list = list.clone();
            for v in list.elements.iter() {
                let step = call(reg, imports.as_deref_mut(), f, acc)?;
                acc = call(reg, imports.as_deref_mut(), &step, v.clone())?;
            }
            Ok(acc)
        }

        BuiltinOp::ListRepeat => {
            let Value::Int(n) = args[0] else {
                return Err(non("int", &args[0], reg));
            };
            let count = n.max(0) as usize;
            let elements = vec![args[1].clone(); count];
            let typ = reg.list(args[1].type_of());
            Ok(Value::List(List {
                typ,
                elements: Rc::new(elements),
            }))
        }

        BuiltinOp::TextLength => match &args[0] {
            Value::Text(t) => Ok(Value::Int(t.len() as i64)),
            v => Err(non("text", v, reg)),
        },

        BuiltinOp::TextRepeat => {
            let Value::Int(n) = args[0] else {
                return Err(non("int", &args[0], reg));
            };
            let Value::Text(t) = &args[1] else {
                return Err(non("text", &args[1], reg));
            };
            Ok(Value::Text(t.repeat(n.max(0) as usize).into()))
        }

        BuiltinOp::TextJoin => {
            let Value::Text(sep) = &args[0] else {
                return Err(non("text", &args[0], reg));
            };
            let Value::List(list) = &args[1] else {
                return Err(non("list", &args[1], reg));
            };
            let mut parts = Vec::with_capacity(list.elements.len());
            for v in list.elements.iter() {
                let Value::Text(t) = v else {
                    return Err(non("text", v, reg));
                };
                parts.push(t.to_string());
            }
            Ok(Value::Text(parts.join(sep).into()))
        }
    }
}

/// Builds a list value, absorbing the empty list's `never` element type.
pub(super) fn from_values(reg: &mut Registry, values: Vec<Value>) -> List {
    let element = values
        .first()
        .map(Value::type_of)
        .unwrap_or(types::NEVER);
    List {
        typ: reg.list(element),
        elements: Rc::new(values),
    }
}

fn round(reg: &Registry, v: &Value, f: fn(f64) -> f64) -> Result<Value, Error> {
    match v {
        Value::Float(x) => Ok(Value::Int(f(*x) as i64)),
        v => Err(non("float", v, reg)),
    }
}

fn non(kind: &str, v: &Value, reg: &Registry) -> Error {
    Error::msg(format!("non-{kind} value {}", v.display(reg)))
}
