//! Content-addressed import tests against a map-backed yard.

use std::collections::HashMap;

use pretty_assertions::assert_eq;

use scrapscript::yards::{Fetcher, YardError};
use scrapscript::Environment;

struct MapFetcher(HashMap<String, String>);

impl Fetcher for MapFetcher {
    fn fetch_sha256(&self, key: &str) -> Result<Vec<u8>, YardError> {
        match self.0.get(key) {
            Some(source) => Ok(source.as_bytes().to_vec()),
            None => Err(YardError::NotFound),
        }
    }
}

fn env_with(scraps: &[(&str, &str)]) -> Environment {
    let mut env = Environment::new();
    env.use_fetcher(Box::new(MapFetcher(
        scraps
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )));
    env
}

fn eval_str(env: &mut Environment, source: &str) -> Result<String, String> {
    let key = env.read(source.as_bytes()).map_err(|e| e.to_string())?;
    let value = env.eval(&key).map_err(|e| e.to_string())?;
    Ok(env.show(&value))
}

#[test]
fn test_import_chain() {
    let mut env = env_with(&[
        (
            "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447",
            "3 + $sha256~~a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a445",
        ),
        (
            "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a445",
            "2",
        ),
    ]);

    let out = eval_str(
        &mut env,
        "$sha256~~a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447 - 1",
    )
    .unwrap();
    assert_eq!(out, "4");
}

#[test]
fn test_import_key_spelled_as_raw_base64() {
    // 44 base64 chars decode to 32 raw bytes; the key is their hex.
    let key = "0000000000000000000000000000000000000000000000000000000000000000";
    let mut env = env_with(&[(key, "2")]);
    let out = eval_str(
        &mut env,
        "$sha256~~AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA= + 1",
    )
    .unwrap();
    assert_eq!(out, "3");
}

#[test]
fn test_polymorphic_import_is_fresh_per_use() {
    let key = "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447";
    let mut env = env_with(&[(key, "a -> a")]);

    let source = format!(r#"{{ a = $sha256~~{key} 1, b = $sha256~~{key} "x" }}"#);
    let sk = env.read(source.as_bytes()).unwrap();
    let typ = env.infer(&sk).unwrap();
    assert_eq!(env.type_string(typ), "{ a : int, b : text }");
}

#[test]
fn test_import_not_found() {
    let mut env = env_with(&[]);
    let err = eval_str(
        &mut env,
        "$sha256~~a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447",
    )
    .unwrap_err();
    assert!(err.contains("no scrap found"), "error was:\n{err}");
}

#[test]
fn test_import_without_fetcher() {
    let mut env = Environment::new();
    let err = eval_str(
        &mut env,
        "$sha256~~a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447",
    )
    .unwrap_err();
    assert!(err.contains("no scrap found"), "error was:\n{err}");
}

#[test]
fn test_import_bad_length() {
    let mut env = env_with(&[]);
    let err = eval_str(&mut env, "$sha256~~aGk= + 1").unwrap_err();
    assert!(
        err.contains("cannot import sha256 bytes of length"),
        "error was:\n{err}"
    );
}

#[test]
fn test_import_type_error_surfaces_at_import_site() {
    let key = "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447";
    let mut env = env_with(&[(key, "1.5")]);
    let err = eval_str(&mut env, &format!("1 + $sha256~~{key}")).unwrap_err();
    assert!(
        err.contains("cannot unify 'int' with 'float'"),
        "error was:\n{err}"
    );
}
