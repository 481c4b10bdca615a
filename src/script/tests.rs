use super::ast::{DeclKind, Expr, Stmt};
use super::{format_number, parse, print_program, tokenize, Dialect, TokenKind};

fn roundtrip(source: &str, dialect: Dialect) -> String {
    let program = parse(source, dialect).unwrap();
    print_program(&program)
}

#[test]
fn test_tokenize_punctuators_longest_first() {
    let tokens = tokenize("a === b !== c ?? d?.e").unwrap();
    let puncts: Vec<_> = tokens
        .iter()
        .filter_map(|t| match t.kind {
            TokenKind::Punct(p) => Some(p),
            _ => None,
        })
        .collect();
    assert_eq!(puncts, vec!["===", "!==", "??", "?."]);
}

#[test]
fn test_tokenize_tracks_newlines_and_positions() {
    let tokens = tokenize("let a = 1\nlet b").unwrap();
    let second_let = &tokens[4];
    assert_eq!(second_let.kind, TokenKind::Ident("let".to_string()));
    assert!(second_let.newline_before);
    assert_eq!(second_let.span.line, 2);
    assert_eq!(second_let.span.column, 1);
}

#[test]
fn test_tokenize_string_escapes() {
    let tokens = tokenize(r#""a\nb\t\"c\" A""#).unwrap();
    assert_eq!(tokens[0].kind, TokenKind::Str("a\nb\t\"c\" A".to_string()));
}

#[test]
fn test_tokenize_unterminated_string() {
    let err = tokenize("\"abc").unwrap_err();
    assert!(err.message.contains("unterminated string"));
    assert_eq!((err.line, err.column), (1, 1));
}

#[test]
fn test_tokenize_skips_comments() {
    let tokens = tokenize("// line\n/* block\n */ x").unwrap();
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].kind, TokenKind::Ident("x".to_string()));
}

#[test]
fn test_parse_hello_world() {
    let program = parse("console.log(\"hi\")", Dialect::Plain).unwrap();
    assert_eq!(program.body.len(), 1);
    assert!(matches!(program.body[0], Stmt::Expr(Expr::Call { .. })));
}

#[test]
fn test_parse_without_semicolons() {
    let program = parse("let a = 1\nlet b = a + 1\nconsole.log(b)", Dialect::Plain).unwrap();
    assert_eq!(program.body.len(), 3);
}

#[test]
fn test_parse_rejects_two_statements_on_one_line() {
    let err = parse("let a = 1 let b = 2", Dialect::Plain).unwrap_err();
    assert!(err.message.contains("expected ';'"));
}

#[test]
fn test_parse_const_requires_initializer() {
    let err = parse("const a;", Dialect::Plain).unwrap_err();
    assert!(err.message.contains("missing initializer"));
}

#[test]
fn test_plain_dialect_rejects_annotations() {
    let err = parse("let a: number = 1", Dialect::Plain).unwrap_err();
    assert!(err.message.contains("typed sources"));
}

#[test]
fn test_typed_dialect_strips_annotations() {
    let out = roundtrip(
        "function add(a: number, b?: number): number { return a + (b ?? 0); }",
        Dialect::Typed,
    );
    assert_eq!(out, "function add(a, b) {\n    return a + (b ?? 0);\n}\n");
}

#[test]
fn test_typed_dialect_drops_interfaces_and_aliases() {
    let source = "interface Point { x: number; y: number }\n\
                  type Pair<T> = [T, T] | null;\n\
                  const p: Point = { x: 1, y: 2 };";
    let out = roundtrip(source, Dialect::Typed);
    assert_eq!(out, "const p = { x: 1, y: 2 };\n");
}

#[test]
fn test_typed_dialect_strips_generics_and_casts() {
    let source = "function id<T>(x: T): T { return x as T; }\n\
                  const xs: Array<Map<string, number[]>> = [];\n\
                  const n = (xs as any)!.length;";
    let out = roundtrip(source, Dialect::Typed);
    assert!(out.contains("function id(x) {\n    return x;\n}"));
    assert!(out.contains("const xs = [];"));
    assert!(out.contains("const n = xs.length;"));
}

#[test]
fn test_typed_arrow_with_return_type() {
    let out = roundtrip("const f = (a: number, b: number): number => a * b;", Dialect::Typed);
    assert_eq!(out, "const f = (a, b) => a * b;\n");
}

#[test]
fn test_ternary_with_parenthesized_branch_is_not_an_arrow() {
    let out = roundtrip("const v = ok ? (a) : b;", Dialect::Typed);
    assert_eq!(out, "const v = ok ? a : b;\n");
}

#[test]
fn test_imports_lower_to_require() {
    let out = roundtrip(
        "import fs from \"fs\";\nimport { join as j } from \"path\";",
        Dialect::Typed,
    );
    assert!(out.contains("const __import0 = require(\"fs\");"));
    assert!(out.contains("const fs = __import0.default;"));
    assert!(out.contains("const __import1 = require(\"path\");"));
    assert!(out.contains("const j = __import1.join;"));
}

#[test]
fn test_exports_assign_to_exports_object() {
    let out = roundtrip("export const answer: number = 42;", Dialect::Typed);
    assert_eq!(out, "const answer = 42;\nexports.answer = answer;\n");
}

#[test]
fn test_classes_are_rejected() {
    let err = parse("class Foo {}", Dialect::Typed).unwrap_err();
    assert!(err.message.contains("not supported"));
}

#[test]
fn test_runtime_emitting_type_constructs_are_rejected() {
    for source in [
        "enum Color { Red }",
        "const enum Color { Red }",
        "namespace N { }",
        "module M { }",
        "abstract class A { }",
        "const C = class { };",
    ] {
        let err = parse(source, Dialect::Typed).unwrap_err();
        assert!(err.message.contains("not supported"), "{}: {}", source, err.message);
    }
}

#[test]
fn test_module_object_is_still_an_identifier() {
    assert_eq!(roundtrip("module.exports = 1;", Dialect::Plain), "module.exports = 1;
");
}

#[test]
fn test_printer_keeps_precedence() {
    let out = roundtrip("const x = (1 + 2) * 3 - -4 ** 2;", Dialect::Plain);
    assert_eq!(out, "const x = (1 + 2) * 3 - (-4) ** 2;\n");
}

#[test]
fn test_printer_wraps_object_expression_statement() {
    let out = roundtrip("({ a: 1 }).a;", Dialect::Plain);
    assert_eq!(out, "({ a: 1 }).a;\n");
}

#[test]
fn test_printed_output_reparses_as_plain() {
    let source = r#"
        type Shape = { kind: string; size: number };
        const shapes: Shape[] = [{ kind: "square", size: 2 }, { kind: "circle", size: 3 }];
        let total: number = 0;
        for (const s of shapes) {
            switch (s.kind) {
                case "square":
                    total += s.size ** 2;
                    break;
                default:
                    total += 3 * s.size;
            }
        }
        try { throw new Error(`total ${total}`); } catch (e: unknown) { console.log(e); } finally { total = 0; }
        const greet = (name: string = "you"): string => `hi ${name.toUpperCase()}`;
        do { total++; } while (total < 3);
    "#;
    let printed = roundtrip(source, Dialect::Typed);
    let reparsed = parse(&printed, Dialect::Plain).unwrap();
    assert_eq!(print_program(&reparsed), printed);
}

#[test]
fn test_var_decl_kinds() {
    let program = parse("var a = 1, b; let c; const d = 2;", Dialect::Plain).unwrap();
    let kinds: Vec<_> = program
        .body
        .iter()
        .filter_map(|s| match s {
            Stmt::VarDecl { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec![DeclKind::Var, DeclKind::Let, DeclKind::Const]);
}

#[test]
fn test_syntax_error_position() {
    let err = parse("let x = 1;\nlet y = ;", Dialect::Plain).unwrap_err();
    assert_eq!(err.line, 2);
    assert_eq!(err.column, 9);
}

#[test]
fn test_template_substitution_error_position() {
    let err = parse("const s = `a ${1 +} b`;", Dialect::Plain).unwrap_err();
    assert_eq!(err.line, 1);
    assert!(err.column > 14);
}

#[test]
fn test_format_number() {
    assert_eq!(format_number(1.0), "1");
    assert_eq!(format_number(-0.0), "0");
    assert_eq!(format_number(0.5), "0.5");
    assert_eq!(format_number(f64::NAN), "NaN");
    assert_eq!(format_number(f64::INFINITY), "Infinity");
    assert_eq!(format_number(1e21), "1e+21");
    assert_eq!(format_number(123456789.0), "123456789");
}

/// Runs `f` on a thread with room for deeply nested input
fn with_big_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    std::thread::Builder::new()
        .stack_size(16 << 20)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap()
}

fn nesting_error(source: String) -> String {
    with_big_stack(move || parse(&source, Dialect::Typed).unwrap_err().message)
}

#[test]
fn test_deep_parentheses_are_a_syntax_error() {
    let source = format!("console.log({}1{})", "(".repeat(800), ")".repeat(800));
    assert_eq!(nesting_error(source), "expression nested too deeply");
}

#[test]
fn test_long_operator_chain_is_a_syntax_error() {
    let source = format!("console.log(1{})", "+1".repeat(5000));
    assert_eq!(nesting_error(source), "expression nested too deeply");
}

#[test]
fn test_long_member_chain_is_a_syntax_error() {
    let source = format!("a{};", ".b".repeat(5000));
    assert_eq!(nesting_error(source), "expression nested too deeply");
}

#[test]
fn test_deep_blocks_are_a_syntax_error() {
    let source = format!("{}{}", "{".repeat(1000), "}".repeat(1000));
    assert_eq!(nesting_error(source), "expression nested too deeply");
}

#[test]
fn test_chains_nested_inside_chains_are_a_syntax_error() {
    let mut expr = "x".to_string();
    for _ in 0..3 {
        expr = format!("({}{})", expr, " + 1".repeat(200));
    }
    let err = with_big_stack(move || parse(&format!("let y = {};", expr), Dialect::Plain).unwrap_err());
    assert_eq!(err.message, "expression nested too deeply");
    assert_eq!((err.line, err.column), (1, 1));
}

#[test]
fn test_moderate_nesting_still_parses() {
    let source = format!(
        "const x = {}1{};\nconst y = 1{};",
        "(".repeat(40),
        ")".repeat(40),
        " + 1".repeat(100)
    );
    let out = with_big_stack(move || roundtrip(&source, Dialect::Plain));
    assert!(out.starts_with("const x = 1;\nconst y = 1 + 1 + 1"));
}

#[test]
fn test_call_type_arguments_are_dropped() {
    let source = "function id<T>(x: T): T { return x; }\n\
                  console.log(id<number>(4), pair<string, Array<number>>(\"a\", []));";
    let out = roundtrip(source, Dialect::Typed);
    assert!(out.ends_with("console.log(id(4), pair(\"a\", []));\n"));
}

#[test]
fn test_angle_brackets_without_call_stay_comparisons() {
    assert_eq!(roundtrip("const d = a < b > c;", Dialect::Typed), "const d = a < b > c;\n");
    assert_eq!(
        roundtrip("const e = a < b && c > (d);", Dialect::Typed),
        "const e = a < b && c > d;\n"
    );
}
