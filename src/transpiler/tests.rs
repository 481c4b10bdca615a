use super::{transpile, PlainScript, Transpile, TranspilerRegistry};
use rstest::rstest;

#[test]
fn test_type_stripper_removes_annotations() {
    let out = transpile("const x: number = 1;\nconsole.log(x)").unwrap();
    assert_eq!(out, "const x = 1;\nconsole.log(x);\n");
}

#[test]
fn test_type_stripper_lowers_modules_to_commonjs() {
    let out = transpile("import { readFile } from \"fs\";\nexport function f(): void {}").unwrap();
    assert!(out.contains("require(\"fs\")"));
    assert!(out.contains("exports.f = f;"));
}

#[test]
fn test_empty_source_transpiles_to_empty_output() {
    assert_eq!(transpile("").unwrap(), "");
}

#[test]
fn test_syntax_error_has_position() {
    let err = transpile("let a = 1;\nconst = 2;").unwrap_err();
    assert_eq!(err.line, 2);
    assert!(err.to_string().ends_with(&format!("({}:{})", err.line, err.column)));
}

#[test]
fn test_plain_script_passes_through() {
    let source = "console.log( 'kept'   )";
    assert_eq!(PlainScript.transpile(source).unwrap(), source);
}

#[test]
fn test_plain_script_rejects_types() {
    assert!(PlainScript.transpile("let a: string = \"\"").is_err());
}

#[rstest]
#[case("ts", "type-stripper")]
#[case(".TS", "type-stripper")]
#[case("js", "plain")]
#[case("xyz", "type-stripper")]
#[case("", "type-stripper")]
fn test_registry_selects_by_extension(#[case] extension: &str, #[case] expected: &str) {
    let registry = TranspilerRegistry::standard();
    assert_eq!(registry.select(extension).name(), expected);
}

#[test]
fn test_registered_adapter_overrides_fallback() {
    let mut registry = TranspilerRegistry::new();
    assert_eq!(registry.select("mjs").name(), "type-stripper");
    registry.register("MJS", PlainScript);
    assert_eq!(registry.select(".mjs").name(), "plain");
    assert_eq!(registry.select("mts").name(), "type-stripper");
}
