use super::{CodeValidator, NameRules, DEFAULT_DENYLIST};
use crate::store::StoreError;
use rstest::rstest;

#[rstest]
#[case("console.log(1)", true)]
#[case("", true)]
#[case("eval(\"1 + 1\")", false)]
#[case("const r = fetch(\"/x\")", false)]
#[case("// fetch( in a comment still counts", false)]
#[case("evaluate(x)", true)]
#[case("eval (x)", true)]
fn test_default_denylist(#[case] source: &str, #[case] valid: bool) {
    assert_eq!(CodeValidator::new().is_valid(source), valid);
}

#[test]
fn test_check_names_matched_pattern() {
    let validator = CodeValidator::default();
    let violation = validator.check("x; fetch(url)").unwrap_err();
    assert_eq!(violation.pattern, r"fetch\(");
    assert!(validator.check("console.log(1)").is_ok());
}

#[test]
fn test_extra_patterns_extend_default() {
    let validator = CodeValidator::with_extra_patterns([r"while\s*\(true\)", r"eval\("]).unwrap();
    assert_eq!(validator.patterns().len(), DEFAULT_DENYLIST.len() + 1);
    assert!(!validator.is_valid("while (true) {}"));
    assert!(!validator.is_valid("eval(1)"));
}

#[test]
fn test_invalid_extra_pattern_is_rejected() {
    assert!(CodeValidator::with_extra_patterns(["("]).is_err());
}

#[test]
fn test_valid_name_is_trimmed() {
    assert_eq!(NameRules::validate("  notes ").unwrap(), "notes");
    assert_eq!(NameRules::validate("a.b").unwrap(), "a.b");
}

#[rstest]
#[case("")]
#[case("   ")]
#[case(".")]
#[case("..")]
#[case("dir/file")]
#[case("dir\\file")]
#[case("tab\there")]
fn test_invalid_names(#[case] name: &str) {
    assert!(matches!(
        NameRules::validate(name),
        Err(StoreError::InvalidName(_))
    ));
}

#[test]
fn test_overlong_name_rejected() {
    let name = "x".repeat(256);
    let err = NameRules::validate(&name).unwrap_err();
    assert!(err.to_string().contains("max: 255"));
}

#[rstest]
#[case("hello.ts", "hello")]
#[case("a.b.ts", "a.b")]
#[case("dir/nested/demo.js", "demo")]
#[case("README", "")]
#[case(".ts", "")]
#[case("trailing.", "trailing")]
fn test_strip_extension(#[case] file_name: &str, #[case] expected: &str) {
    assert_eq!(NameRules::strip_extension(file_name), expected);
}

#[test]
fn test_with_extension() {
    assert_eq!(NameRules::with_extension("demo", "ts"), "demo.ts");
    assert_eq!(NameRules::with_extension("demo", ".js"), "demo.js");
    assert_eq!(NameRules::with_extension("demo", ""), "demo");
}
