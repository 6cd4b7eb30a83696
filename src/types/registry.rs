//! The type registry.
//!
//! All types of an interpretation session live here. Compound types are
//! interned structurally, so two structurally identical types share one
//! `TypeRef` and reference equality is type equality. Type variables are
//! a side table of `ordinal -> TypeRef` slots resolved by union-find with
//! path compression; `unbound` ordinals are scheme parameters that only
//! appear in generalized types and are never unified against.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use super::ty::{self, Kind, TypeRef};

/// Payload of an enum or record type: tag or key to type, sorted.
pub type TypeMap = BTreeMap<String, TypeRef>;

/// A failure inside `unify`, spanless until the inferencer attaches one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnifyError {
    Mismatch(TypeRef, TypeRef),
    Occurs,
    UnexpectedUnbound,
}

impl UnifyError {
    pub fn render(&self, reg: &Registry) -> String {
        match self {
            UnifyError::Mismatch(a, b) => {
                format!("cannot unify '{}' with '{}'", reg.format(*a), reg.format(*b))
            }
            UnifyError::Occurs => "occurs check failed".to_string(),
            UnifyError::UnexpectedUnbound => {
                "unexpected unbound var during unification".to_string()
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    /// Count of unbound (scheme) ordinals handed out.
    unbound: u32,
    lists: Vec<TypeRef>,
    list_ids: FxHashMap<TypeRef, usize>,
    funcs: Vec<(TypeRef, TypeRef)>,
    func_ids: FxHashMap<(TypeRef, TypeRef), usize>,
    enums: Vec<TypeMap>,
    enum_ids: FxHashMap<TypeMap, usize>,
    records: Vec<TypeMap>,
    record_ids: FxHashMap<TypeMap, usize>,
    /// Variable slots; `NEVER` means not yet bound.
    vars: Vec<TypeRef>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    // ── Interning constructors ──────────────────────────────────────

    pub fn list(&mut self, element: TypeRef) -> TypeRef {
        if let Some(&i) = self.list_ids.get(&element) {
            return TypeRef::pack(Kind::List, i);
        }
        let i = self.lists.len();
        self.lists.push(element);
        self.list_ids.insert(element, i);
        TypeRef::pack(Kind::List, i)
    }

    pub fn func(&mut self, arg: TypeRef, result: TypeRef) -> TypeRef {
        if let Some(&i) = self.func_ids.get(&(arg, result)) {
            return TypeRef::pack(Kind::Func, i);
        }
        let i = self.funcs.len();
        self.funcs.push((arg, result));
        self.func_ids.insert((arg, result), i);
        TypeRef::pack(Kind::Func, i)
    }

    pub fn enum_of(&mut self, map: TypeMap) -> TypeRef {
        if let Some(&i) = self.enum_ids.get(&map) {
            return TypeRef::pack(Kind::Enum, i);
        }
        let i = self.enums.len();
        self.enums.push(map.clone());
        self.enum_ids.insert(map, i);
        TypeRef::pack(Kind::Enum, i)
    }

    pub fn record_of(&mut self, map: TypeMap) -> TypeRef {
        if let Some(&i) = self.record_ids.get(&map) {
            return TypeRef::pack(Kind::Record, i);
        }
        let i = self.records.len();
        self.records.push(map.clone());
        self.record_ids.insert(map, i);
        TypeRef::pack(Kind::Record, i)
    }

    /// A fresh unification variable.
    pub fn var(&mut self) -> TypeRef {
        let i = self.vars.len();
        self.vars.push(ty::NEVER);
        TypeRef::pack(Kind::Var, i)
    }

    /// A fresh scheme parameter.
    pub fn unbound(&mut self) -> TypeRef {
        let i = self.unbound as usize;
        self.unbound += 1;
        TypeRef::pack(Kind::Unbound, i)
    }

    // ── Destructuring accessors ─────────────────────────────────────

    /// The element type of a list type, resolving variables first.
    pub fn get_list(&self, re: TypeRef) -> Option<TypeRef> {
        let re = self.follow(re);
        match re.kind() {
            Kind::List => Some(self.lists[re.index()]),
            _ => None,
        }
    }

    pub fn get_func(&self, re: TypeRef) -> Option<(TypeRef, TypeRef)> {
        let re = self.follow(re);
        match re.kind() {
            Kind::Func => Some(self.funcs[re.index()]),
            _ => None,
        }
    }

    pub fn get_enum(&self, re: TypeRef) -> Option<&TypeMap> {
        let re = self.follow(re);
        match re.kind() {
            Kind::Enum => Some(&self.enums[re.index()]),
            _ => None,
        }
    }

    pub fn get_record(&self, re: TypeRef) -> Option<&TypeMap> {
        let re = self.follow(re);
        match re.kind() {
            Kind::Record => Some(&self.records[re.index()]),
            _ => None,
        }
    }

    // ── Union-find ──────────────────────────────────────────────────

    /// Follows a variable chain without mutating it.
    pub fn follow(&self, re: TypeRef) -> TypeRef {
        let mut current = re;
        while current.is_var() {
            let next = self.vars[current.index()];
            if next == ty::NEVER {
                break;
            }
            current = next;
        }
        current
    }

    /// Follows a variable chain, path-compressing as it goes.
    pub fn resolve(&mut self, re: TypeRef) -> TypeRef {
        let target = self.follow(re);
        // Second pass: point every var on the chain at the representative.
        let mut current = re;
        while current.is_var() && current != target {
            let next = self.vars[current.index()];
            if next == ty::NEVER {
                break;
            }
            self.vars[current.index()] = target;
            current = next;
        }
        target
    }

    fn occurs(&self, var: TypeRef, re: TypeRef) -> bool {
        let re = self.follow(re);
        if re == var {
            return true;
        }
        match re.kind() {
            Kind::List => self.occurs(var, self.lists[re.index()]),
            Kind::Func => {
                let (arg, result) = self.funcs[re.index()];
                self.occurs(var, arg) || self.occurs(var, result)
            }
            Kind::Enum => self.enums[re.index()]
                .values()
                .any(|&v| self.occurs(var, v)),
            Kind::Record => self.records[re.index()]
                .values()
                .any(|&v| self.occurs(var, v)),
            _ => false,
        }
    }

    /// Destructively unifies two types.
    pub fn unify(&mut self, a: TypeRef, b: TypeRef) -> Result<(), UnifyError> {
        let a = self.resolve(a);
        let b = self.resolve(b);
        if a == b {
            return Ok(());
        }

        if a.is_var() {
            if self.occurs(a, b) {
                return Err(UnifyError::Occurs);
            }
            self.vars[a.index()] = b;
            return Ok(());
        }
        if b.is_var() {
            if self.occurs(b, a) {
                return Err(UnifyError::Occurs);
            }
            self.vars[b.index()] = a;
            return Ok(());
        }

        if a.is_unbound() || b.is_unbound() {
            return Err(UnifyError::UnexpectedUnbound);
        }

        match (a.kind(), b.kind()) {
            (Kind::List, Kind::List) => {
                let (ae, be) = (self.lists[a.index()], self.lists[b.index()]);
                self.unify(ae, be)
            }
            (Kind::Func, Kind::Func) => {
                let (aa, ar) = self.funcs[a.index()];
                let (ba, br) = self.funcs[b.index()];
                self.unify(aa, ba)?;
                self.unify(ar, br)
            }
            (Kind::Enum, Kind::Enum) => {
                let am = self.enums[a.index()].clone();
                let bm = self.enums[b.index()].clone();
                if !am.keys().eq(bm.keys()) {
                    return Err(UnifyError::Mismatch(a, b));
                }
                for (tag, &av) in &am {
                    self.unify(av, bm[tag])?;
                }
                Ok(())
            }
            (Kind::Record, Kind::Record) => {
                let am = self.records[a.index()].clone();
                let bm = self.records[b.index()].clone();
                if !am.keys().eq(bm.keys()) {
                    return Err(UnifyError::Mismatch(a, b));
                }
                for (key, &av) in &am {
                    self.unify(av, bm[key])?;
                }
                Ok(())
            }
            _ => Err(UnifyError::Mismatch(a, b)),
        }
    }

    // ── Schemes ─────────────────────────────────────────────────────

    /// A copy of `re` with every distinct `unbound` replaced by a fresh
    /// variable. Shared unbounds stay shared in the result.
    pub fn instantiate(&mut self, re: TypeRef) -> TypeRef {
        let mut subst = FxHashMap::default();
        self.instantiate_into(re, &mut subst)
    }

    fn instantiate_into(
        &mut self,
        re: TypeRef,
        subst: &mut FxHashMap<usize, TypeRef>,
    ) -> TypeRef {
        let re = self.resolve(re);
        match re.kind() {
            Kind::Unbound => match subst.get(&re.index()) {
                Some(&var) => var,
                None => {
                    let var = self.var();
                    subst.insert(re.index(), var);
                    var
                }
            },
            Kind::List => {
                let el = self.lists[re.index()];
                let el = self.instantiate_into(el, subst);
                self.list(el)
            }
            Kind::Func => {
                let (arg, result) = self.funcs[re.index()];
                let arg = self.instantiate_into(arg, subst);
                let result = self.instantiate_into(result, subst);
                self.func(arg, result)
            }
            Kind::Enum => {
                let map = self.enums[re.index()].clone();
                let map = map
                    .into_iter()
                    .map(|(k, v)| (k, self.instantiate_into(v, subst)))
                    .collect();
                self.enum_of(map)
            }
            Kind::Record => {
                let map = self.records[re.index()].clone();
                let map = map
                    .into_iter()
                    .map(|(k, v)| (k, self.instantiate_into(v, subst)))
                    .collect();
                self.record_of(map)
            }
            _ => re,
        }
    }

    /// A copy of `re` with every distinct unresolved variable replaced by
    /// a fresh `unbound`. Shared variables stay shared in the result.
    pub fn generalize(&mut self, re: TypeRef) -> TypeRef {
        let mut subst = FxHashMap::default();
        self.generalize_into(re, &mut subst)
    }

    fn generalize_into(&mut self, re: TypeRef, subst: &mut FxHashMap<usize, TypeRef>) -> TypeRef {
        let re = self.resolve(re);
        match re.kind() {
            Kind::Var => match subst.get(&re.index()) {
                Some(&unbound) => unbound,
                None => {
                    let unbound = self.unbound();
                    subst.insert(re.index(), unbound);
                    unbound
                }
            },
            Kind::List => {
                let el = self.lists[re.index()];
                let el = self.generalize_into(el, subst);
                self.list(el)
            }
            Kind::Func => {
                let (arg, result) = self.funcs[re.index()];
                let arg = self.generalize_into(arg, subst);
                let result = self.generalize_into(result, subst);
                self.func(arg, result)
            }
            Kind::Enum => {
                let map = self.enums[re.index()].clone();
                let map = map
                    .into_iter()
                    .map(|(k, v)| (k, self.generalize_into(v, subst)))
                    .collect();
                self.enum_of(map)
            }
            Kind::Record => {
                let map = self.records[re.index()].clone();
                let map = map
                    .into_iter()
                    .map(|(k, v)| (k, self.generalize_into(v, subst)))
                    .collect();
                self.record_of(map)
            }
            _ => re,
        }
    }

    // ── Printing ────────────────────────────────────────────────────

    /// Renders a type. Unbounds print as letters assigned in order of
    /// first appearance within this call; unresolved variables print as
    /// `$N` of their representative.
    pub fn format(&self, re: TypeRef) -> String {
        let mut out = Formatter {
            reg: self,
            buf: String::new(),
            unbounds: Vec::new(),
        };
        out.format(re, 0);
        out.buf
    }
}

struct Formatter<'a> {
    reg: &'a Registry,
    buf: String,
    unbounds: Vec<usize>,
}

impl Formatter<'_> {
    fn unbound(&mut self, index: usize) {
        let i = match self.unbounds.iter().position(|&u| u == index) {
            Some(i) => i,
            None => {
                self.unbounds.push(index);
                self.unbounds.len() - 1
            }
        };
        if i < 26 {
            self.buf.push((b'a' + i as u8) as char);
        } else {
            self.buf.push_str(&format!("t{i}"));
        }
    }

    fn format(&mut self, re: TypeRef, nesting: u8) {
        match re.kind() {
            Kind::Primitive => self.buf.push_str(ty::PRIMITIVE_NAMES[re.index()]),
            Kind::List => {
                if nesting > 1 {
                    self.buf.push('(');
                }
                self.buf.push_str("list ");
                self.format(self.reg.lists[re.index()], 2);
                if nesting > 1 {
                    self.buf.push(')');
                }
            }
            Kind::Func => {
                let (arg, result) = self.reg.funcs[re.index()];
                if nesting > 0 {
                    self.buf.push('(');
                }
                self.format(arg, 1);
                self.buf.push_str(" -> ");
                self.format(result, 0);
                if nesting > 0 {
                    self.buf.push(')');
                }
            }
            Kind::Enum => {
                let map = &self.reg.enums[re.index()];
                let mut first = true;
                for (tag, &payload) in map {
                    if !first {
                        self.buf.push(' ');
                    }
                    first = false;
                    self.buf.push('#');
                    self.buf.push_str(tag);
                    if payload != ty::NEVER {
                        self.buf.push(' ');
                        self.format(payload, 1);
                    }
                }
            }
            Kind::Record => {
                let map = &self.reg.records[re.index()];
                self.buf.push_str("{ ");
                let mut first = true;
                for (key, &value) in map {
                    if !first {
                        self.buf.push_str(", ");
                    }
                    first = false;
                    self.buf.push_str(key);
                    self.buf.push_str(" : ");
                    self.format(value, 1);
                }
                self.buf.push_str(" }");
            }
            Kind::Unbound => self.unbound(re.index()),
            Kind::Var => {
                let target = self.reg.follow(re);
                if target.is_var() {
                    self.buf.push('$');
                    self.buf.push_str(&target.index().to_string());
                } else {
                    self.format(target, nesting);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::ty::{BYTE, FLOAT, INT, NEVER, TEXT};
    use super::*;

    #[test]
    fn test_interning_is_structural() {
        let mut reg = Registry::new();
        let a = reg.list(INT);
        let b = reg.list(INT);
        assert_eq!(a, b);
        let f1 = reg.func(INT, TEXT);
        let f2 = reg.func(INT, TEXT);
        assert_eq!(f1, f2);
        assert_ne!(reg.func(TEXT, INT), f1);
    }

    #[test]
    fn test_map_interning_ignores_insertion_order() {
        let mut reg = Registry::new();
        let mut m1 = TypeMap::new();
        m1.insert("a".into(), INT);
        m1.insert("b".into(), TEXT);
        let mut m2 = TypeMap::new();
        m2.insert("b".into(), TEXT);
        m2.insert("a".into(), INT);
        assert_eq!(reg.record_of(m1), reg.record_of(m2));
    }

    #[test]
    fn test_unify_var_with_primitive() {
        let mut reg = Registry::new();
        let v = reg.var();
        reg.unify(v, INT).unwrap();
        assert_eq!(reg.resolve(v), INT);
        // Symmetric direction.
        let w = reg.var();
        reg.unify(FLOAT, w).unwrap();
        assert_eq!(reg.resolve(w), FLOAT);
    }

    #[test]
    fn test_unify_chains_compress() {
        let mut reg = Registry::new();
        let a = reg.var();
        let b = reg.var();
        let c = reg.var();
        reg.unify(a, b).unwrap();
        reg.unify(b, c).unwrap();
        reg.unify(c, BYTE).unwrap();
        assert_eq!(reg.resolve(a), BYTE);
        assert_eq!(reg.resolve(b), BYTE);
    }

    #[test]
    fn test_unify_mismatch() {
        let mut reg = Registry::new();
        let err = reg.unify(INT, FLOAT).unwrap_err();
        assert_eq!(err.render(&reg), "cannot unify 'int' with 'float'");
    }

    #[test]
    fn test_unify_lists_elementwise() {
        let mut reg = Registry::new();
        let v = reg.var();
        let lv = reg.list(v);
        let li = reg.list(INT);
        reg.unify(lv, li).unwrap();
        assert_eq!(reg.resolve(v), INT);
    }

    #[test]
    fn test_unify_funcs() {
        let mut reg = Registry::new();
        let (a, b) = (reg.var(), reg.var());
        let f1 = reg.func(a, b);
        let f2 = reg.func(INT, TEXT);
        reg.unify(f1, f2).unwrap();
        assert_eq!(reg.resolve(a), INT);
        assert_eq!(reg.resolve(b), TEXT);
    }

    #[test]
    fn test_unify_enums_require_same_tags() {
        let mut reg = Registry::new();
        let e1 = reg.enum_of(TypeMap::from([("l".to_string(), INT), ("r".to_string(), NEVER)]));
        let e2 = reg.enum_of(TypeMap::from([("l".to_string(), INT)]));
        assert!(reg.unify(e1, e2).is_err());
    }

    #[test]
    fn test_occurs_check() {
        let mut reg = Registry::new();
        let v = reg.var();
        let f = reg.func(v, INT);
        let err = reg.unify(v, f).unwrap_err();
        assert_eq!(err, UnifyError::Occurs);
    }

    #[test]
    fn test_occurs_check_through_bound_vars() {
        let mut reg = Registry::new();
        let a = reg.var();
        let b = reg.var();
        let f = reg.func(b, INT);
        // b resolves to a function containing a.
        let inner = reg.func(a, INT);
        reg.unify(b, inner).unwrap();
        assert!(reg.unify(a, f).is_err());
    }

    #[test]
    fn test_unify_is_symmetric_in_result() {
        let mut reg = Registry::new();
        let a = reg.var();
        let b = reg.var();
        let la = reg.list(a);
        let lb = reg.list(b);
        reg.unify(la, lb).unwrap();
        assert_eq!(reg.resolve(a), reg.resolve(b));
    }

    #[test]
    fn test_instantiate_freshens_unbounds() {
        let mut reg = Registry::new();
        let u = reg.unbound();
        let scheme = reg.func(u, u);
        let t1 = reg.instantiate(scheme);
        let t2 = reg.instantiate(scheme);
        assert_ne!(t1, t2);
        // Sharing preserved: both sides of each instance are one var.
        let (arg, result) = reg.get_func(t1).unwrap();
        assert_eq!(arg, result);
        assert!(arg.is_var());
        // The two instances unify independently.
        let int_to_int = reg.func(INT, INT);
        reg.unify(t1, int_to_int).unwrap();
        assert_eq!(reg.instantiate(int_to_int), int_to_int);
        let (arg, _) = reg.get_func(t2).unwrap();
        assert!(reg.resolve(arg).is_var());
    }

    #[test]
    fn test_generalize_replaces_vars() {
        let mut reg = Registry::new();
        let v = reg.var();
        let t = reg.func(v, v);
        let scheme = reg.generalize(t);
        let (arg, result) = reg.get_func(scheme).unwrap();
        assert!(arg.is_unbound());
        assert_eq!(arg, result);
        // The original variable is untouched.
        assert_eq!(reg.resolve(v), v);
    }

    #[test]
    fn test_generalize_is_idempotent() {
        let mut reg = Registry::new();
        let v = reg.var();
        let t = reg.func(v, INT);
        let once = reg.generalize(t);
        let twice = reg.generalize(once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_generalize_resolves_before_copying() {
        let mut reg = Registry::new();
        let v = reg.var();
        reg.unify(v, INT).unwrap();
        let t = reg.func(v, v);
        let scheme = reg.generalize(t);
        assert_eq!(scheme, reg.func(INT, INT));
    }

    #[test]
    fn test_instantiate_generalize_roundtrip_prints_alike() {
        let mut reg = Registry::new();
        let v = reg.var();
        let lv = reg.list(v);
        let t = reg.func(v, lv);
        let scheme = reg.generalize(t);
        assert_eq!(reg.format(scheme), "a -> list a");
        let fresh = reg.instantiate(scheme);
        // Same shape, new variables.
        let (arg, _) = reg.get_func(fresh).unwrap();
        assert!(arg.is_var());
        assert_ne!(reg.resolve(arg), reg.resolve(v));
    }

    #[test]
    fn test_format_primitives_and_compounds() {
        let mut reg = Registry::new();
        assert_eq!(reg.format(INT), "int");
        let li = reg.list(INT);
        assert_eq!(reg.format(li), "list int");
        let lli = reg.list(li);
        assert_eq!(reg.format(lli), "list (list int)");
        let f = reg.func(INT, TEXT);
        let g = reg.func(f, li);
        assert_eq!(reg.format(g), "(int -> text) -> list int");
        let h = reg.func(INT, f);
        assert_eq!(reg.format(h), "int -> int -> text");
    }

    #[test]
    fn test_format_enum_sorted_with_payloads() {
        let mut reg = Registry::new();
        let e = reg.enum_of(TypeMap::from([
            ("r".to_string(), NEVER),
            ("l".to_string(), INT),
        ]));
        assert_eq!(reg.format(e), "#l int #r");
    }

    #[test]
    fn test_format_record_sorted() {
        let mut reg = Registry::new();
        let r = reg.record_of(TypeMap::from([
            ("b".to_string(), TEXT),
            ("a".to_string(), INT),
        ]));
        assert_eq!(reg.format(r), "{ a : int, b : text }");
    }

    #[test]
    fn test_format_vars_use_representative() {
        let mut reg = Registry::new();
        let a = reg.var();
        let b = reg.var();
        reg.unify(a, b).unwrap();
        let t = reg.func(a, b);
        assert_eq!(reg.format(t), "$1 -> $1");
    }

    #[test]
    fn test_format_letters_are_per_call() {
        let mut reg = Registry::new();
        let u1 = reg.unbound();
        let u2 = reg.unbound();
        let t = reg.func(u2, u1);
        // Letters follow first appearance, not ordinal.
        assert_eq!(reg.format(t), "a -> b");
    }
}
