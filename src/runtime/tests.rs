use super::{execute, Console, Limits, MemorySink, ScriptFailure};
use rstest::rstest;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use uuid::Uuid;

fn run_with(source: &str, limits: Limits) -> (Vec<String>, Result<(), ScriptFailure>) {
    let console = Console::new(MemorySink::new());
    let redirect = console.redirect(Uuid::new_v4(), limits.max_output_lines);
    let result = execute(
        source,
        redirect.channel(),
        limits,
        Arc::new(AtomicBool::new(false)),
    );
    (redirect.release(), result)
}

fn output(source: &str) -> Vec<String> {
    let (lines, result) = run_with(source, Limits::default());
    result.unwrap();
    lines
}

fn failure(source: &str) -> String {
    match run_with(source, Limits::default()).1 {
        Err(ScriptFailure::Error(message)) => message,
        other => panic!("expected a script error, got {:?}", other),
    }
}

#[test]
fn test_console_log_captures_line() {
    assert_eq!(output("console.log(\"hi\")"), vec!["hi"]);
}

#[test]
fn test_console_log_joins_arguments_with_space() {
    assert_eq!(
        output("console.log(\"a\", 1, true, null, undefined)"),
        vec!["a 1 true null undefined"]
    );
}

#[test]
fn test_arithmetic_and_concatenation() {
    assert_eq!(
        output("console.log(1 + 2 * 3, \"x\" + 1, 7 % 3, 2 ** 10, 0.1 + 0.2 === 0.3, 1 / 3)"),
        vec!["7 x1 1 1024 false 0.3333333333333333"]
    );
}

#[test]
fn test_closures_and_recursion() {
    let source = r#"
        function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); }
        const counter = () => { let c = 0; return () => ++c; };
        const next = counter();
        next(); next();
        console.log(fib(10), next());
    "#;
    assert_eq!(output(source), vec!["55 3"]);
}

#[test]
fn test_rest_spread_and_defaults() {
    let source = r#"
        function sum(first, ...rest) { return rest.reduce((a, b) => a + b, first); }
        const greet = (n = "you") => "hi " + n;
        console.log(sum(1, ...[2, 3], 4), greet(), greet("me"), Math.max(...[1, 5, 3]));
    "#;
    assert_eq!(output(source), vec!["10 hi you hi me 5"]);
}

#[test]
fn test_array_methods() {
    let source = r#"
        const xs = [3, 1, 2];
        xs.push(4);
        console.log(xs.map(x => x * 2).join("-"), xs.filter(x => x > 1).length, xs.reduce((a, b) => a + b, 0));
        console.log([...xs].sort().join(","), xs.indexOf(2), xs.includes(5));
        console.log(xs.sort((a, b) => b - a), xs.slice(-2), xs.length);
    "#;
    assert_eq!(
        output(source),
        vec!["6-2-4-8 3 10", "1,2,3,4 2 false", "4,3,2,1 2,1 4"]
    );
}

#[test]
fn test_objects_and_json() {
    let source = r#"
        const o = { a: 1, b: [1, 2], c: { d: "x" } };
        console.log(JSON.stringify(o));
        console.log(Object.keys(o).join(","), o.c.d, o["b"][1]);
        const v = JSON.parse("{\"a\":[1,2,{\"b\":null}]}");
        console.log(v.a[2].b, v.a.length, String(o));
    "#;
    assert_eq!(
        output(source),
        vec![
            r#"{"a":1,"b":[1,2],"c":{"d":"x"}}"#,
            "a,b,c x 2",
            "null 3 [object Object]"
        ]
    );
}

#[test]
fn test_templates_and_string_methods() {
    let source = r#"
        const name = "World";
        console.log(`Hello, ${name.toUpperCase()}!`, "a,b".split(","), " x ".trim() + "|");
        console.log("abc".slice(1), "abc".padStart(5, "-"), "a-b-c".replaceAll("-", "+"), "abc".at(-1));
    "#;
    assert_eq!(
        output(source),
        vec!["Hello, WORLD! a,b x|", "bc --abc a+b+c c"]
    );
}

#[test]
fn test_control_flow() {
    let source = r#"
        let out = [];
        for (let i = 0; i < 5; i++) {
            if (i === 1) continue;
            if (i === 4) break;
            out.push(i);
        }
        let j = 0;
        while (true) { j++; if (j > 2) break; }
        switch (j) {
            case 3: out.push("three");
            case 4: out.push("four"); break;
            default: out.push("none");
        }
        try { null.x; } catch (e) { out.push(e.message); } finally { out.push("done"); }
        console.log(out.join("|"));
    "#;
    assert_eq!(
        output(source),
        vec!["0|2|3|three|four|Cannot read properties of null (reading 'x')|done"]
    );
}

#[test]
fn test_for_in_and_for_of() {
    let source = r#"
        const o = { x: 1, y: 2 };
        for (const k in o) console.log(k, o[k]);
        for (const c of "ab") console.log(c);
    "#;
    assert_eq!(output(source), vec!["x 1", "y 2", "a", "b"]);
}

#[test]
fn test_optional_chaining_and_nullish() {
    let source = r#"
        const o = null;
        console.log(o?.a.b, o ?? "d", 0 || "x", 0 ?? "y", typeof missing, typeof console.log);
    "#;
    assert_eq!(output(source), vec!["undefined d x 0 undefined function"]);
}

#[test]
fn test_number_conversions() {
    let source = r#"
        console.log((3.14159).toFixed(2), (255).toString(16), parseInt("42px"), parseFloat("3.5kg"), Number("x"));
    "#;
    assert_eq!(output(source), vec!["3.14 ff 42 3.5 NaN"]);
}

#[rstest]
#[case("undefinedVar + 1", "undefinedVar is not defined")]
#[case("const a = 1; a = 2;", "Assignment to constant variable.")]
#[case("let o; o.x", "Cannot read properties of undefined (reading 'x')")]
#[case("const f = 5; f()", "f is not a function")]
#[case("throw new Error(\"boom\")", "boom")]
#[case("throw \"raw\"", "raw")]
#[case("require(\"fs\")", "require is not defined")]
#[case("exports.a = 1", "exports is not defined")]
fn test_runtime_errors(#[case] source: &str, #[case] message: &str) {
    assert_eq!(failure(source), message);
}

#[test]
fn test_caught_error_carries_name() {
    let source = r#"
        try { undefinedThing; } catch (e) { console.log(e.name + ": " + e.message); console.log(String(e)); }
    "#;
    let expected = "ReferenceError: undefinedThing is not defined";
    assert_eq!(output(source), vec![expected, expected]);
}

#[test]
fn test_syntax_error_reported() {
    assert!(failure("let = ;").starts_with("SyntaxError"));
}

#[test]
fn test_step_limit_stops_infinite_loop() {
    let limits = Limits {
        max_steps: 1_000,
        ..Limits::default()
    };
    let (_, result) = run_with("while (true) {}", limits);
    match result {
        Err(ScriptFailure::Error(message)) => assert!(message.contains("step limit")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_call_depth_is_a_catchable_range_error() {
    let limits = Limits {
        max_call_depth: 32,
        ..Limits::default()
    };
    let source = r#"
        function f() { return f(); }
        try { f(); } catch (e) { console.log(e.name, e.message); }
    "#;
    let (lines, result) = run_with(source, limits);
    result.unwrap();
    assert_eq!(lines, vec!["RangeError Maximum call stack size exceeded"]);
}

#[test]
fn test_self_containing_array_converts_in_linear_time() {
    let source = r#"
        const a = [1];
        a.push(a, a);
        console.log(a);
        console.log(a.join("-"));
        console.log(String([a, 2]));
    "#;
    assert_eq!(output(source), vec!["1,,", "1--", "1,,,2"]);
}

#[test]
fn test_error_naming_itself_converts() {
    let source = r#"
        const e = new Error("m");
        e.name = e;
        console.log(String(e));
    "#;
    assert_eq!(output(source), vec![": m"]);
}

#[rstest]
#[case("const a = [1]; a.push(a); JSON.stringify(a)")]
#[case("const o = {}; o.self = { back: o }; JSON.stringify(o)")]
fn test_circular_json_is_a_type_error(#[case] source: &str) {
    assert_eq!(failure(source), "Converting circular structure to JSON");
}

#[test]
fn test_shared_json_value_is_not_circular() {
    let source = r#"
        const shared = [1];
        console.log(JSON.stringify({ a: shared, b: shared }));
    "#;
    assert_eq!(output(source), vec![r#"{"a":[1],"b":[1]}"#]);
}

#[test]
fn test_flat_of_self_containing_array_gives_up() {
    let source = r#"
        const a = [1];
        a.push(a, a);
        console.log(a.flat(1).length);
        try { a.flat(Infinity); } catch (e) { console.log(e.name); }
    "#;
    assert_eq!(output(source), vec!["7", "RangeError"]);
}

#[test]
fn test_left_deep_recursion_is_a_range_error() {
    let source = r#"
        function f(n) { return n === 0 ? 0 : ((((((((f(n - 1)))))))) + 1) + 1 + 1 + 1 + 1 + 1 + 1 + 1; }
        try { f(250); } catch (e) { console.log(e.name); }
        console.log(f(10));
    "#;
    let worker = std::thread::Builder::new()
        .stack_size(16 << 20)
        .spawn(move || output(source))
        .unwrap();
    assert_eq!(worker.join().unwrap(), vec!["RangeError", "80"]);
}

#[test]
fn test_output_limit() {
    let limits = Limits {
        max_output_lines: 3,
        ..Limits::default()
    };
    let (lines, result) = run_with("for (let i = 0; i < 10; i++) console.log(i);", limits);
    assert_eq!(lines, vec!["0", "1", "2"]);
    match result {
        Err(ScriptFailure::Error(message)) => assert!(message.contains("output exceeded")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_cancel_flag_interrupts() {
    let console = Console::new(MemorySink::new());
    let redirect = console.redirect(Uuid::new_v4(), 10);
    let result = execute(
        "while (true) {}",
        redirect.channel(),
        Limits::default(),
        Arc::new(AtomicBool::new(true)),
    );
    assert_eq!(result, Err(ScriptFailure::Interrupted));
}

#[test]
fn test_host_log_reaches_sink_when_not_redirected() {
    let sink = MemorySink::new();
    let console = Console::new(sink.clone());
    console.log("before");
    let redirect = console.redirect(Uuid::new_v4(), 10);
    console.log("during");
    assert!(console.is_redirected());
    assert_eq!(redirect.release(), vec!["during"]);
    console.log("after");
    assert!(!console.is_redirected());
    assert_eq!(sink.lines(), vec!["before", "after"]);
}

#[test]
fn test_dropping_redirect_restores_console() {
    let console = Console::new(MemorySink::new());
    {
        let _redirect = console.redirect(Uuid::new_v4(), 10);
        assert!(console.is_redirected());
    }
    assert!(!console.is_redirected());
    assert_eq!(console.redirect_count(), 1);
}

#[test]
fn test_stale_redirect_cannot_undo_newer_one() {
    let console = Console::new(MemorySink::new());
    let first = console.redirect(Uuid::new_v4(), 10);
    let stale_channel = first.channel();
    let second = console.redirect(Uuid::new_v4(), 10);

    assert!(first.release().is_empty());
    assert!(console.is_redirected());

    stale_channel.emit("late".to_string()).unwrap();
    second.channel().emit("fresh".to_string()).unwrap();
    assert_eq!(second.release(), vec!["fresh"]);
    assert!(!console.is_redirected());
}
