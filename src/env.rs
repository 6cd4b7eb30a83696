//! The interpretation environment.
//!
//! Owns the registry, the base scopes and the scrap cache. Scraps are
//! keyed by the lowercase hex SHA-256 of their source bytes; their
//! inferred type (stored generalized) and evaluated value are memoized,
//! which also breaks recursion through imports. Evaluating always infers
//! first, so type errors surface before any evaluation.

use std::rc::Rc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rustc_hash::FxHashMap;

use crate::ast::SourceExpr;
use crate::eval::{self, EvalImport, Value, ValueScope};
use crate::parser;
use crate::scope::Scope;
use crate::source::{Error, Source};
use crate::types::{self, InferImport, Registry, TypeRef};
use crate::yards::{sha256_hex, Fetcher};

/// A read scrap with its memoized type and value.
struct Scrap {
    se: SourceExpr,
    /// The generalized type; import sites instantiate it fresh.
    typ: Option<TypeRef>,
    val: Option<Value>,
}

pub struct Environment {
    reg: Registry,
    type_scope: Scope<TypeRef>,
    value_scope: ValueScope,
    fetcher: Option<Box<dyn Fetcher>>,
    scraps: FxHashMap<String, Scrap>,
}

impl Environment {
    pub fn new() -> Self {
        let mut reg = Registry::new();
        let (type_scope, value_scope) = eval::install(&mut reg);
        Environment {
            reg,
            type_scope,
            value_scope,
            fetcher: None,
            scraps: FxHashMap::default(),
        }
    }

    /// Resolves imports through `fetcher` from now on.
    pub fn use_fetcher(&mut self, fetcher: Box<dyn Fetcher>) {
        self.fetcher = Some(fetcher);
    }

    /// Parses a scrap and stores it under its hash.
    pub fn read(&mut self, bytes: &[u8]) -> Result<String, Error> {
        if bytes.is_empty() {
            return Err(Error::msg("empty script"));
        }
        let key = sha256_hex(bytes);
        if !self.scraps.contains_key(&key) {
            let se = parser::parse(Rc::new(Source::new(bytes.to_vec())))?;
            self.scraps.insert(
                key.clone(),
                Scrap {
                    se,
                    typ: None,
                    val: None,
                },
            );
        }
        Ok(key)
    }

    /// The scrap's generalized type, inferring and memoizing on first use.
    pub fn infer(&mut self, key: &str) -> Result<TypeRef, Error> {
        if let Some(typ) = self.scraps.get(key).and_then(|s| s.typ) {
            return Ok(typ);
        }
        let se = self
            .scraps
            .get(key)
            .ok_or_else(|| Error::msg(format!("unknown scrap {key}")))?
            .se
            .clone();

        let scope = self.type_scope.clone();
        let mut resolver = Resolver {
            fetcher: self.fetcher.as_deref(),
            scraps: &mut self.scraps,
            type_scope: &self.type_scope,
            value_scope: &self.value_scope,
        };
        let typ = types::infer(
            &mut self.reg,
            scope,
            &se,
            Some(&mut resolver as &mut dyn InferImport),
        )?;
        let scheme = self.reg.generalize(typ);
        if let Some(scrap) = self.scraps.get_mut(key) {
            scrap.typ = Some(scheme);
        }
        Ok(scheme)
    }

    /// The scrap's value, inferring first and memoizing both.
    pub fn eval(&mut self, key: &str) -> Result<Value, Error> {
        self.infer(key)?;
        if let Some(val) = self.scraps.get(key).and_then(|s| s.val.clone()) {
            return Ok(val);
        }
        let se = self
            .scraps
            .get(key)
            .ok_or_else(|| Error::msg(format!("unknown scrap {key}")))?
            .se
            .clone();

        let mut resolver = Resolver {
            fetcher: self.fetcher.as_deref(),
            scraps: &mut self.scraps,
            type_scope: &self.type_scope,
            value_scope: &self.value_scope,
        };
        let val = eval::eval(
            &se,
            &mut self.reg,
            &self.value_scope,
            Some(&mut resolver as &mut dyn EvalImport),
        )?;
        if let Some(scrap) = self.scraps.get_mut(key) {
            scrap.val = Some(val.clone());
        }
        Ok(val)
    }

    /// Applies an evaluated function value to an argument.
    pub fn call(&mut self, fun: &Value, arg: Value) -> Result<Value, Error> {
        let mut resolver = Resolver {
            fetcher: self.fetcher.as_deref(),
            scraps: &mut self.scraps,
            type_scope: &self.type_scope,
            value_scope: &self.value_scope,
        };
        eval::call(
            &mut self.reg,
            Some(&mut resolver as &mut dyn EvalImport),
            fun,
            arg,
        )
    }

    /// Renders a type.
    pub fn type_string(&self, typ: TypeRef) -> String {
        self.reg.format(typ)
    }

    /// Renders a value in plain source form.
    pub fn show(&self, value: &Value) -> String {
        value.display(&self.reg).to_string()
    }

    /// Renders a value as a self-contained program: variants carry their
    /// enum so the output re-parses on its own.
    pub fn scrap(&self, value: &Value) -> String {
        match value {
            Value::Variant(variant) => {
                let typ = self.reg.format(variant.typ);
                match &variant.value {
                    None => format!("({typ})::{}", variant.tag),
                    Some(v) => format!("({typ})::{} {}", variant.tag, self.scrap(v)),
                }
            }
            other => self.show(other),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

/// Import resolution against the scrap cache and the fetcher. Both
/// directions normalize keys to lowercase hex and store a scrap before
/// recursing into it.
struct Resolver<'a> {
    fetcher: Option<&'a dyn Fetcher>,
    scraps: &'a mut FxHashMap<String, Scrap>,
    type_scope: &'a Scope<TypeRef>,
    value_scope: &'a ValueScope,
}

impl Resolver<'_> {
    /// Normalizes an import hash to a lowercase hex key. The scanner
    /// reads hex-spelled keys as 48 bytes of base64; re-encoding
    /// recovers the original spelling.
    fn key_for(&self, algo: &str, hash: &[u8]) -> Result<String, Error> {
        if algo != "sha256" {
            return Err(Error::msg(format!("cannot import via hash algorithm {algo}")));
        }
        match hash.len() {
            32 => Ok(crate::yards::hex_lower(hash)),
            48 => {
                let key = BASE64.encode(hash).to_lowercase();
                if key.bytes().all(|b| b.is_ascii_hexdigit()) {
                    Ok(key)
                } else {
                    Err(Error::msg("bad sha256 import key"))
                }
            }
            n => Err(Error::msg(format!(
                "cannot import sha256 bytes of length {n}, must be 32"
            ))),
        }
    }

    fn ensure_scrap(&mut self, key: &str) -> Result<SourceExpr, Error> {
        if let Some(scrap) = self.scraps.get(key) {
            return Ok(scrap.se.clone());
        }
        let fetcher = self
            .fetcher
            .ok_or_else(|| Error::msg(format!("no scrap found for {key}")))?;
        let bytes = fetcher
            .fetch_sha256(key)
            .map_err(|err| Error::msg(err.to_string()))?;
        let se = parser::parse(Rc::new(Source::new(bytes)))?;
        self.scraps.insert(
            key.to_string(),
            Scrap {
                se: se.clone(),
                typ: None,
                val: None,
            },
        );
        Ok(se)
    }
}

impl InferImport for Resolver<'_> {
    fn infer_import(
        &mut self,
        reg: &mut Registry,
        algo: &str,
        hash: &[u8],
    ) -> Result<TypeRef, Error> {
        let key = self.key_for(algo, hash)?;
        let se = self.ensure_scrap(&key)?;
        if let Some(typ) = self.scraps.get(&key).and_then(|s| s.typ) {
            return Ok(reg.instantiate(typ));
        }
        let typ = types::infer(
            reg,
            self.type_scope.clone(),
            &se,
            Some(self as &mut dyn InferImport),
        )?;
        let scheme = reg.generalize(typ);
        if let Some(scrap) = self.scraps.get_mut(&key) {
            scrap.typ = Some(scheme);
        }
        Ok(reg.instantiate(scheme))
    }
}

impl EvalImport for Resolver<'_> {
    fn eval_import(
        &mut self,
        reg: &mut Registry,
        algo: &str,
        hash: &[u8],
    ) -> Result<Value, Error> {
        let key = self.key_for(algo, hash)?;
        let se = self.ensure_scrap(&key)?;
        if let Some(val) = self.scraps.get(&key).and_then(|s| s.val.clone()) {
            return Ok(val);
        }
        let val = eval::eval(
            &se,
            reg,
            self.value_scope,
            Some(self as &mut dyn EvalImport),
        )?;
        if let Some(scrap) = self.scraps.get_mut(&key) {
            scrap.val = Some(val.clone());
        }
        Ok(val)
    }
}
