//! Runtime values.
//!
//! Values are immutable; collections share their contents through `Rc`.
//! Every value can report its `TypeRef`, which the evaluator uses for its
//! defensive checks. Printing is registry-aware because type constants
//! render as their type's source form.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::ast::{Ast, Alt, ExprId};
use crate::scope::Scope;
use crate::source::Source;
use crate::types::{Registry, TypeRef};

pub type ValueMap = BTreeMap<String, Value>;

#[derive(Debug, Clone)]
pub enum Value {
    Hole,
    Int(i64),
    Float(f64),
    Text(Rc<str>),
    Byte(u8),
    Bytes(Rc<[u8]>),
    /// A named type, usable on the left of a pick expression.
    TypeConst(TypeRef),
    Record(Record),
    List(List),
    Variant(Rc<VariantValue>),
    Builtin(Rc<BuiltinFn>),
    Func(Rc<ScriptFn>),
}

#[derive(Debug, Clone)]
pub struct Record {
    /// The interned record type.
    pub typ: TypeRef,
    pub values: Rc<ValueMap>,
}

#[derive(Debug, Clone)]
pub struct List {
    /// The interned list type.
    pub typ: TypeRef,
    pub elements: Rc<Vec<Value>>,
}

#[derive(Debug)]
pub struct VariantValue {
    pub typ: TypeRef,
    pub tag: String,
    pub value: Option<Value>,
}

/// A builtin function, possibly partially applied.
#[derive(Debug)]
pub struct BuiltinFn {
    pub name: &'static str,
    pub typ: TypeRef,
    pub op: super::builtins::BuiltinOp,
    pub args: Vec<Value>,
}

/// A user-defined function value.
#[derive(Debug)]
pub struct ScriptFn {
    /// The function's original source text, which is how it prints.
    pub source: String,
    pub kind: FnKind,
}

/// What a closure needs to run later: its arena, source and captured
/// scope. Frames are immutable, so capturing is a pointer copy.
#[derive(Debug)]
pub struct ClosureCtx {
    pub source: Rc<Source>,
    pub ast: Rc<Ast>,
    pub scope: Scope<Value>,
}

#[derive(Debug)]
pub enum FnKind {
    Lambda {
        ctx: ClosureCtx,
        pattern: ExprId,
        body: ExprId,
    },
    Match {
        ctx: ClosureCtx,
        alts: Vec<Alt>,
    },
    /// `first` runs before `second`, data-flow order.
    Compose { first: Value, second: Value },
}

impl Value {
    pub fn type_of(&self) -> TypeRef {
        match self {
            Value::Hole => crate::types::HOLE,
            Value::Int(_) => crate::types::INT,
            Value::Float(_) => crate::types::FLOAT,
            Value::Text(_) => crate::types::TEXT,
            Value::Byte(_) => crate::types::BYTE,
            Value::Bytes(_) => crate::types::BYTES,
            Value::TypeConst(_) => crate::types::NEVER,
            Value::Record(r) => r.typ,
            Value::List(l) => l.typ,
            Value::Variant(v) => v.typ,
            Value::Builtin(b) => b.typ,
            Value::Func(_) => crate::types::NEVER,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Builtin(_) | Value::Func(_))
    }

    /// Structural equality. Functions compare by identity only.
    pub fn equals(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Hole, Value::Hole) => true,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Float(x), Value::Float(y)) => x == y,
            (Value::Text(x), Value::Text(y)) => x == y,
            (Value::Byte(x), Value::Byte(y)) => x == y,
            (Value::Bytes(x), Value::Bytes(y)) => x == y,
            (Value::TypeConst(x), Value::TypeConst(y)) => x == y,
            (Value::Record(x), Value::Record(y)) => {
                x.typ == y.typ
                    && x.values.len() == y.values.len()
                    && x.values
                        .iter()
                        .all(|(k, v)| y.values.get(k).is_some_and(|w| Value::equals(v, w)))
            }
            (Value::List(x), Value::List(y)) => {
                x.typ == y.typ
                    && x.elements.len() == y.elements.len()
                    && x.elements
                        .iter()
                        .zip(y.elements.iter())
                        .all(|(v, w)| Value::equals(v, w))
            }
            (Value::Variant(x), Value::Variant(y)) => {
                x.tag == y.tag
                    && match (&x.value, &y.value) {
                        (None, None) => true,
                        (Some(v), Some(w)) => Value::equals(v, w),
                        _ => false,
                    }
            }
            (Value::Builtin(x), Value::Builtin(y)) => {
                x.name == y.name && x.args.len() == y.args.len()
            }
            (Value::Func(x), Value::Func(y)) => Rc::ptr_eq(x, y),
            _ => false,
        }
    }

    /// Registry-aware display in source form.
    pub fn display<'a>(&'a self, reg: &'a Registry) -> DisplayValue<'a> {
        DisplayValue { value: self, reg }
    }
}

pub struct DisplayValue<'a> {
    value: &'a Value,
    reg: &'a Registry,
}

impl fmt::Display for DisplayValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let reg = self.reg;
        match self.value {
            Value::Hole => f.write_str("()"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => {
                let rendered = x.to_string();
                if rendered.contains('.') {
                    f.write_str(&rendered)
                } else {
                    write!(f, "{rendered}.0")
                }
            }
            Value::Text(t) => write!(f, "{t:?}"),
            Value::Byte(b) => write!(f, "~{b:02X}"),
            Value::Bytes(bs) => write!(f, "~~{}", BASE64.encode(bs)),
            Value::TypeConst(t) => f.write_str(&reg.format(*t)),
            Value::Record(r) => {
                if r.values.is_empty() {
                    return f.write_str("{ }");
                }
                f.write_str("{ ")?;
                let mut first = true;
                for (key, value) in r.values.iter() {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    write!(f, "{key} = {}", value.display(reg))?;
                }
                f.write_str(" }")
            }
            Value::List(l) => {
                if l.elements.is_empty() {
                    return f.write_str("[]");
                }
                f.write_str("[ ")?;
                let mut first = true;
                for value in l.elements.iter() {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    write!(f, "{}", value.display(reg))?;
                }
                f.write_str(" ]")
            }
            Value::Variant(v) => {
                write!(f, "#{}", v.tag)?;
                if let Some(value) = &v.value {
                    write!(f, " {}", value.display(reg))?;
                }
                Ok(())
            }
            Value::Builtin(b) => {
                f.write_str(b.name)?;
                for arg in &b.args {
                    write!(f, " {}", arg.display(reg))?;
                }
                Ok(())
            }
            Value::Func(s) => f.write_str(&s.source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{INT, TEXT};

    fn show(value: &Value) -> String {
        let reg = Registry::new();
        value.display(&reg).to_string()
    }

    #[test]
    fn test_display_literals() {
        assert_eq!(show(&Value::Hole), "()");
        assert_eq!(show(&Value::Int(-8)), "-8");
        assert_eq!(show(&Value::Float(3.0)), "3.0");
        assert_eq!(show(&Value::Float(1.0002)), "1.0002");
        assert_eq!(show(&Value::Text("hello".into())), "\"hello\"");
        assert_eq!(show(&Value::Byte(0xff)), "~FF");
        assert_eq!(
            show(&Value::Bytes(b"hello world".to_vec().into())),
            "~~aGVsbG8gd29ybGQ="
        );
        assert_eq!(show(&Value::Bytes(Vec::new().into())), "~~");
    }

    #[test]
    fn test_display_collections_sorted() {
        let mut reg = Registry::new();
        let mut values = ValueMap::new();
        values.insert("b".into(), Value::Text("x".into()));
        values.insert("a".into(), Value::Int(1));
        let typ = reg.record_of(crate::types::TypeMap::from([
            ("a".to_string(), INT),
            ("b".to_string(), TEXT),
        ]));
        let record = Value::Record(Record {
            typ,
            values: Rc::new(values),
        });
        assert_eq!(record.display(&reg).to_string(), r#"{ a = 1, b = "x" }"#);

        let list_ty = reg.list(INT);
        let list = Value::List(List {
            typ: list_ty,
            elements: Rc::new(vec![Value::Int(1), Value::Int(2)]),
        });
        assert_eq!(list.display(&reg).to_string(), "[ 1, 2 ]");

        let empty = Value::List(List {
            typ: list_ty,
            elements: Rc::new(Vec::new()),
        });
        assert_eq!(empty.display(&reg).to_string(), "[]");
    }

    #[test]
    fn test_display_variant() {
        let reg = Registry::new();
        let variant = Value::Variant(Rc::new(VariantValue {
            typ: crate::types::NEVER,
            tag: "l".into(),
            value: Some(Value::Int(4)),
        }));
        assert_eq!(variant.display(&reg).to_string(), "#l 4");
    }

    #[test]
    fn test_equality() {
        assert!(Value::equals(&Value::Int(1), &Value::Int(1)));
        assert!(!Value::equals(&Value::Int(1), &Value::Float(1.0)));
        assert!(Value::equals(
            &Value::Text("a".into()),
            &Value::Text("a".into())
        ));
        assert!(!Value::equals(&Value::Byte(1), &Value::Int(1)));
    }
}
