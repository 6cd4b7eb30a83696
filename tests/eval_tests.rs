//! Evaluator tests, run directly against `eval::eval` so that match
//! alternatives and error paths can be exercised without the inferencer
//! in front.

use pretty_assertions::assert_eq;

use scrapscript::eval;
use scrapscript::parser::parse_str;
use scrapscript::types::Registry;

fn eval_value(source: &str) -> Result<String, String> {
    let se = parse_str(source).map_err(|e| e.to_string())?;
    let mut reg = Registry::new();
    let (_, values) = eval::install(&mut reg);
    match eval::eval(&se, &mut reg, &values, None) {
        Ok(v) => Ok(v.display(&reg).to_string()),
        Err(err) => Err(err.to_string()),
    }
}

fn eval_ok(source: &str, expected: &str) {
    match eval_value(source) {
        Ok(shown) => assert_eq!(shown, expected, "source: {source}"),
        Err(err) => panic!("evaluation of {source} failed:\n{err}"),
    }
}

fn eval_err(source: &str, expected: &str) {
    match eval_value(source) {
        Ok(shown) => panic!("expected {source} to fail, got {shown}"),
        Err(err) => assert!(
            err.contains(expected),
            "source: {source}\nexpected {expected:?} in:\n{err}"
        ),
    }
}

#[test]
fn test_literals() {
    eval_ok("1", "1");
    eval_ok("1.0", "1.0");
    eval_ok("1.0002", "1.0002");
    eval_ok(r#""hello""#, r#""hello""#);
    eval_ok("~41", "~41");
    eval_ok("~~aGVsbG8gd29ybGQ=", "~~aGVsbG8gd29ybGQ=");
    eval_ok("()", "()");
    eval_ok("~ff", "~FF");
    eval_ok("~~abcd", "~~abcd");
}

#[test]
fn test_where_bindings() {
    eval_ok("200 + (x ; x = 150)", "350");
    eval_ok("a + b + c ; a = 1 ; b = 2 ; c = 3", "6");
}

#[test]
fn test_arithmetic() {
    eval_ok("1 + 2", "3");
    eval_ok("1 + 3 * 3", "10");
    eval_ok("1.0 + 2.0", "3.0");
    eval_ok("3 - 2", "1");
    eval_ok("3.0 - 2.0", "1.0");
    eval_ok("1.0 + to-float 1", "2.0");
    eval_ok("1 + 2 * floor 3.4", "7");
    eval_ok("2 * ceil 2.2 + 1", "7");
    eval_ok("-3 - 5", "-8");
}

#[test]
fn test_text_concat() {
    eval_ok(r#""hello" ++ " " ++ "world""#, r#""hello world""#);
}

#[test]
fn test_functions_and_pipes() {
    eval_ok("2 |> | _ -> 3", "3");
    eval_ok("f 2 ; f = | a -> a + a", "4");
    eval_ok("2 |> | a -> a + a", "4");
    eval_ok("f 1 2 ; f = a -> b -> a + b", "3");
    eval_ok("f 1 <| 2 ; f = a -> b -> a + b", "3");
    eval_ok("(x -> x) (y -> y)", "y -> y");
    eval_ok("3 |> a -> b -> a", "b -> a");
}

#[test]
fn test_match_alternatives() {
    eval_ok(
        r#"f "b"
; f =
  | "a" -> 1
  | "b" -> 2
  | "c" -> 3
  |  x  -> 0"#,
        "2",
    );
    eval_ok(r#"f "b" ; f = | "a" -> 1 | "b" -> 2 | "c" -> 3 | x -> 0"#, "2");
    eval_ok(r#"[ 1, 4 ] |> | [1,3] -> "three" |[_,4] -> "four""#, r#""four""#);
}

#[test]
fn test_variants() {
    eval_ok(
        "hand::l 5 |> | #l n -> n * 2 | #r n -> n * 3 ; hand : #l int #r int",
        "10",
    );
    eval_ok(
        r#"(hand::l 5 |>
        | #l n -> n * 2
        | #r n -> n * 3)
; hand : #l int #r int"#,
        "10",
    );
    eval_ok(
        r#"m::just 2 |> | #just 2 -> "two" | #just _ -> "other" | #no -> "x" ; m : #just int #no"#,
        r#""two""#,
    );
    eval_ok("e::l 4 ; e : #l int #r", "#l 4");
    eval_ok("a ; a : #x int #y float #z", "#x int #y float #z");
}

#[test]
fn test_composition() {
    eval_ok(
        r#"(f >> (x -> x) >> g) 7
  ; f =
      | 7 -> "cat"
      | 4 -> "dog"
      | _ -> "shark"
  ; g =
      | "cat" -> "kitten"
      | "dog" -> "puppy"
      |   a   -> "baby " ++ a"#,
        r#""kitten""#,
    );
}

#[test]
fn test_record_destructuring() {
    eval_ok("{ a = 1, b = 2 } |> | { a = c, b = d } -> c + d", "3");
    eval_ok("{ a = 1 } |> | { a = 2 } -> c | { a = c } -> c", "1");
    eval_ok(
        r#"{ a = 2, b = 3, c = 4 } |>
    | { ..x, a = 1, b = 2, c = 3 } -> ()
    | {      a = 1, b = b,       } -> ()
    | {      a = 1, b = 2,       } -> ()
    | { ..x,               c = c } -> { c = c, x = x }"#,
        "{ c = 4, x = { a = 2, b = 3 } }",
    );
}

#[test]
fn test_records() {
    eval_ok(r#"rec.a ; rec = { a = 1, b = "x" }"#, "1");
    eval_ok(
        r#"{ ..g, a = 2, c = ~FF }
; g = { a = 1, b = "x", c = ~00 }"#,
        r#"{ a = 2, b = "x", c = ~FF }"#,
    );
    eval_ok(r#"{ ..{ a = 2, c = 1 }, a = 1 }"#, "{ a = 1, c = 1 }");
    eval_err(
        r#"{ ..{ a = 2, c = 1 }, a = 1, b = "x"}"#,
        "cannot set key b not in the base record",
    );
    eval_err(
        "{ ..base, a = 1 } ; base = { a = ~00 }",
        "cannot change type of key a from byte to int",
    );
}

#[test]
fn test_lists() {
    eval_ok("1 >+ [2, 3] +< 4", "[ 1, 2, 3, 4 ]");
    eval_ok(
        r#"["prefix"] ++ ["in" ++ "fix"] +< "postfix""#,
        r#"[ "prefix", "infix", "postfix" ]"#,
    );
    eval_ok("[ 4 + 2, 5 - 1, ]", "[ 6, 4 ]");
}

#[test]
fn test_bytes_builtins() {
    eval_ok(
        "bytes/to-utf8-text <| ~~aGVsbG8gd29ybGQ= +< ~21",
        r#""hello world!""#,
    );
    eval_ok(
        "~~aGVsbG8gd29ybGQ= +< ~21 |> bytes/to-utf8-text",
        r#""hello world!""#,
    );
    eval_ok("bytes/to-utf8-text ~~aGVsbG8gd29ybGQ=", r#""hello world""#);
    eval_ok(r#"bytes/from-utf8-text "hello world""#, "~~aGVsbG8gd29ybGQ=");
}

#[test]
fn test_list_builtins() {
    eval_ok(r#"list/map text/length ["hey", "beautiful"]"#, "[ 3, 9 ]");
    eval_ok("list/map text/length", "list/map text/length");
    eval_ok("list/fold 0 (a -> b -> a + b) []", "0");
    eval_ok("list/fold 0 (a -> b -> a + b)", "list/fold 0 a -> b -> a + b");
    eval_ok("list/fold 0 (a -> b -> a + b) [1, 2]", "3");
    eval_ok(r#"list/repeat 3 "ha""#, r#"[ "ha", "ha", "ha" ]"#);
    eval_ok("list/length [1, 2, 3]", "3");
}

#[test]
fn test_text_builtins() {
    eval_ok(r#"text/repeat 2 "ab""#, r#""abab""#);
    eval_ok(r#"text/join ", " ["a", "b"]"#, r#""a, b""#);
    eval_ok(r#"text/length "hey""#, "3");
}

#[test]
fn test_failures() {
    eval_err("f 1 ; f = a -> b", "unknown variable b");
    eval_err("f 1 ; b = 2 ; f = a -> b", "unknown variable b");
    eval_err("{ a = 1 } |> | { b = a } -> a", "cannot bind to missing key b");
    eval_err(
        r#"[ 1, ] |> | [] -> "four""#,
        r#"[] -> "four" had no alternative for [ 1 ]"#,
    );
    eval_err(r#"[] ++ """#, r#"non-list value """#);
    eval_err(r#""" ++ []"#, "non-text value []");
    eval_err(
        "hand::left 5 ; hand : #l int #r int",
        "#left isn't one of the valid tags: #l, #r",
    );
    eval_err("{ a = 2 } |> | { a = a, b = a } -> ()", "cannot bind to missing key b");
    eval_err("{ a = 2, b = 1 } |> | { a = a, b = a } -> ()", "cannot bind a twice");
    eval_err("1.5 |> | 1.5 -> ()", "cannot match on floats");
    eval_err("e::l ; e : #l int #r", "#l requires a value of type int");
    eval_err("e::r 1 ; e : #l int #r", "#r does not take a value");
    eval_err("a ; a : #x #x", "cannot define tag #x more than once");
}
