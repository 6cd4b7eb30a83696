//! Value-direction structural matching.
//!
//! Matches a pattern expression against a runtime value, producing the
//! bindings the pattern introduces or a no-match verdict. Hard errors
//! (duplicate names, missing record keys, float literals) abort the whole
//! match instead of falling through to the next alternative.

use std::rc::Rc;

use crate::ast::{Ast, BinOp, Expr, ExprId};
use crate::source::{Error, Source};
use crate::types::Registry;

use super::value::{List, Record, Value, ValueMap};
use super::literal_value;

#[derive(Debug)]
pub enum MatchError {
    NoMatch,
    Hard(Error),
}

impl From<Error> for MatchError {
    fn from(err: Error) -> Self {
        MatchError::Hard(err)
    }
}

/// Matches `pattern` against `value`, returning the new bindings.
pub fn match_value(
    source: &Source,
    ast: &Ast,
    reg: &mut Registry,
    pattern: ExprId,
    value: &Value,
) -> Result<ValueMap, MatchError> {
    let mut m = Matcher {
        source,
        ast,
        reg,
        vars: ValueMap::new(),
    };
    m.match_pattern(pattern, value)?;
    Ok(m.vars)
}

struct Matcher<'a> {
    source: &'a Source,
    ast: &'a Ast,
    reg: &'a mut Registry,
    vars: ValueMap,
}

impl Matcher<'_> {
    fn hard(&self, pattern: ExprId, msg: impl Into<String>) -> MatchError {
        MatchError::Hard(self.source.error(self.ast.span(pattern), msg))
    }

    fn match_pattern(&mut self, pattern: ExprId, value: &Value) -> Result<(), MatchError> {
        match self.ast.get(pattern).clone() {
            Expr::Ident { span } => {
                let name = self.source.get(span).to_string();
                // `_` matches anything without binding.
                if name == "_" {
                    return Ok(());
                }
                if self.vars.contains_key(&name) {
                    return Err(self.hard(pattern, format!("cannot bind {name} twice")));
                }
                self.vars.insert(name, value.clone());
                Ok(())
            }

            Expr::Literal { span, kind } => {
                let lit = literal_value(self.source, span, kind)?;
                if matches!(lit, Value::Float(_)) {
                    return Err(self.hard(pattern, "cannot match on floats"));
                }
                if Value::equals(&lit, value) {
                    Ok(())
                } else {
                    Err(MatchError::NoMatch)
                }
            }

            Expr::Variant { tag, payload } => {
                let Value::Variant(variant) = value else {
                    return Err(MatchError::NoMatch);
                };
                if self.source.get(tag) != variant.tag {
                    return Err(MatchError::NoMatch);
                }
                match (payload, &variant.value) {
                    (None, None) => Ok(()),
                    (Some(p), Some(v)) => {
                        let v = v.clone();
                        self.match_pattern(p, &v)
                    }
                    _ => Err(MatchError::NoMatch),
                }
            }

            Expr::Record { entries, rest, .. } => {
                let Value::Record(record) = value else {
                    return Err(MatchError::NoMatch);
                };
                let record = record.clone();
                for (key, sub) in &entries {
                    let Some(v) = record.values.get(key) else {
                        return Err(self.hard(*sub, format!("cannot bind to missing key {key}")));
                    };
                    let v = v.clone();
                    self.match_pattern(*sub, &v)?;
                }

                // A spread binds the record of all unused keys.
                if let Some(rest) = rest {
                    let mut typ = self
                        .reg
                        .get_record(record.typ)
                        .cloned()
                        .unwrap_or_default();
                    let mut values = (*record.values).clone();
                    for (key, _) in &entries {
                        typ.remove(key);
                        values.remove(key);
                    }
                    let residual = Value::Record(Record {
                        typ: self.reg.record_of(typ),
                        values: Rc::new(values),
                    });
                    self.match_pattern(rest, &residual)?;
                }
                Ok(())
            }

            Expr::List { elements, .. } => {
                let Value::List(list) = value else {
                    return Err(MatchError::NoMatch);
                };
                if elements.len() != list.elements.len() {
                    return Err(MatchError::NoMatch);
                }
                let list = list.clone();
                for (sub, v) in elements.iter().zip(list.elements.iter()) {
                    let v = v.clone();
                    self.match_pattern(*sub, &v)?;
                }
                Ok(())
            }

            Expr::Binary { op, left, right } => {
                let Value::List(list) = value else {
                    return Err(MatchError::NoMatch);
                };
                let list = list.clone();
                match op {
                    BinOp::Prepend => {
                        if list.elements.is_empty() {
                            return Err(MatchError::NoMatch);
                        }
                        let head = list.elements[0].clone();
                        let tail = sublist(&list, 1, list.elements.len());
                        self.match_pattern(left, &head)?;
                        self.match_pattern(right, &tail)
                    }
                    BinOp::Append => {
                        if list.elements.is_empty() {
                            return Err(MatchError::NoMatch);
                        }
                        let last = list.elements[list.elements.len() - 1].clone();
                        let init = sublist(&list, 0, list.elements.len() - 1);
                        self.match_pattern(left, &init)?;
                        self.match_pattern(right, &last)
                    }
                    BinOp::Concat => self.match_concat(left, right, &list),
                    _ => Err(MatchError::NoMatch),
                }
            }

            _ => Err(MatchError::NoMatch),
        }
    }

    /// A concat pattern splits the list around a fixed-length side.
    fn match_concat(&mut self, left: ExprId, right: ExprId, list: &List) -> Result<(), MatchError> {
        let total = list.elements.len();

        if let Expr::List { elements, .. } = self.ast.get(left) {
            let elements = elements.clone();
            if elements.len() > total {
                return Err(MatchError::NoMatch);
            }
            for (sub, v) in elements.iter().zip(list.elements.iter()) {
                let v = v.clone();
                self.match_pattern(*sub, &v)?;
            }
            let tail = sublist(list, elements.len(), total);
            return self.match_pattern(right, &tail);
        }

        if let Expr::List { elements, .. } = self.ast.get(right) {
            let elements = elements.clone();
            if elements.len() > total {
                return Err(MatchError::NoMatch);
            }
            let split = total - elements.len();
            let head = sublist(list, 0, split);
            self.match_pattern(left, &head)?;
            for (sub, v) in elements.iter().zip(list.elements[split..].iter()) {
                let v = v.clone();
                self.match_pattern(*sub, &v)?;
            }
            return Ok(());
        }

        Err(MatchError::NoMatch)
    }
}

fn sublist(list: &List, start: usize, end: usize) -> Value {
    Value::List(List {
        typ: list.typ,
        elements: Rc::new(list.elements[start..end].to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;
    use crate::types::INT;

    fn int_list(reg: &mut Registry, ints: &[i64]) -> Value {
        Value::List(List {
            typ: reg.list(INT),
            elements: Rc::new(ints.iter().map(|&i| Value::Int(i)).collect()),
        })
    }

    fn run(pattern: &str, value: &Value) -> Result<ValueMap, MatchError> {
        let se = parse_str(pattern).expect("parse failed");
        let mut reg = Registry::new();
        match_value(&se.source, &se.ast, &mut reg, se.root, value)
    }

    #[test]
    fn test_ident_binds() {
        let vars = run("x", &Value::Int(3)).unwrap();
        assert!(Value::equals(&vars["x"], &Value::Int(3)));
    }

    #[test]
    fn test_wildcard_does_not_bind() {
        let vars = run("_", &Value::Int(3)).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn test_literal_match_and_mismatch() {
        assert!(run("1", &Value::Int(1)).is_ok());
        assert!(matches!(
            run("1", &Value::Int(2)),
            Err(MatchError::NoMatch)
        ));
    }

    #[test]
    fn test_float_literal_is_rejected() {
        let err = run("1.0", &Value::Float(1.0)).unwrap_err();
        let MatchError::Hard(err) = err else {
            panic!("expected hard error");
        };
        assert!(err.to_string().contains("cannot match on floats"));
    }

    #[test]
    fn test_list_pattern_length() {
        let mut reg = Registry::new();
        let list = int_list(&mut reg, &[1, 2]);
        let vars = run("[a, b]", &list).unwrap();
        assert!(Value::equals(&vars["a"], &Value::Int(1)));
        assert!(Value::equals(&vars["b"], &Value::Int(2)));
        assert!(matches!(run("[a]", &list), Err(MatchError::NoMatch)));
    }

    #[test]
    fn test_prepend_pattern_splits_head() {
        let mut reg = Registry::new();
        let list = int_list(&mut reg, &[1, 2, 3]);
        let vars = run("x >+ rest", &list).unwrap();
        assert!(Value::equals(&vars["x"], &Value::Int(1)));
        let Value::List(rest) = &vars["rest"] else {
            panic!("expected list");
        };
        assert_eq!(rest.elements.len(), 2);
    }

    #[test]
    fn test_append_pattern_splits_last() {
        let mut reg = Registry::new();
        let list = int_list(&mut reg, &[1, 2, 3]);
        let vars = run("init +< x", &list).unwrap();
        assert!(Value::equals(&vars["x"], &Value::Int(3)));
        let Value::List(init) = &vars["init"] else {
            panic!("expected list");
        };
        assert_eq!(init.elements.len(), 2);
    }

    #[test]
    fn test_concat_pattern_with_literal_prefix() {
        let mut reg = Registry::new();
        let list = int_list(&mut reg, &[1, 2, 3]);
        let vars = run("[1] ++ rest", &list).unwrap();
        let Value::List(rest) = &vars["rest"] else {
            panic!("expected list");
        };
        assert_eq!(rest.elements.len(), 2);
    }

    #[test]
    fn test_duplicate_binding_is_hard_error() {
        let mut reg = Registry::new();
        let list = int_list(&mut reg, &[1, 2]);
        let err = run("[a, a]", &list).unwrap_err();
        let MatchError::Hard(err) = err else {
            panic!("expected hard error");
        };
        assert!(err.to_string().contains("cannot bind a twice"));
    }

    #[test]
    fn test_empty_list_never_splits() {
        let mut reg = Registry::new();
        let list = int_list(&mut reg, &[]);
        assert!(matches!(
            run("x >+ rest", &list),
            Err(MatchError::NoMatch)
        ));
        assert!(matches!(
            run("init +< x", &list),
            Err(MatchError::NoMatch)
        ));
    }
}
