use super::{Executor, ExecutorConfig, RunErrorKind, RunOutcome, RunPhase};
use crate::runtime::{Console, Limits, MemorySink};
use crate::security::CodeValidator;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn executor() -> (Executor, MemorySink) {
    let sink = MemorySink::new();
    let executor = Executor::new(Console::new(sink.clone()), ExecutorConfig::default());
    (executor, sink)
}

/// Config for runs that must keep going until stopped or timed out
fn unbounded(timeout_ms: u64) -> ExecutorConfig {
    ExecutorConfig {
        timeout_ms,
        limits: Limits {
            max_steps: u64::MAX,
            ..Limits::default()
        },
    }
}

fn wait_until_running(executor: &Executor) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !executor.is_running() {
        assert!(Instant::now() < deadline, "run never started");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_successful_run_captures_output() {
    let (executor, sink) = executor();
    let report = executor.run("console.log(\"hi\")", "ts").unwrap();

    assert_eq!(report.output(), Some(&["hi".to_string()][..]));
    assert_eq!(report.final_phase(), RunPhase::Completed);
    assert!(!executor.is_running());
    assert_eq!(executor.phase(), RunPhase::Idle);
    assert!(!executor.console().is_redirected());
    assert!(sink.lines().is_empty());
}

#[test]
fn test_typed_source_runs() {
    let (executor, _) = executor();
    let source = "function add(a: number, b: number): number { return a + b; }\nconsole.log(add(2, 3));";
    let report = executor.run(source, "ts").unwrap();
    assert_eq!(report.output(), Some(&["5".to_string()][..]));
}

#[test]
fn test_empty_output() {
    let (executor, _) = executor();
    let report = executor.run("const x = 1;", "ts").unwrap();
    assert!(report.is_success());
    assert_eq!(report.output(), Some(&[][..]));
}

#[test]
fn test_denylisted_source_never_redirects() {
    let (executor, _) = executor();
    let report = executor.run("eval(\"1\")", "ts").unwrap();
    assert_eq!(report.error_kind(), Some(RunErrorKind::ContentPolicy));
    assert_eq!(executor.console().redirect_count(), 0);
    assert!(!executor.is_running());
}

#[test]
fn test_extra_denylist_patterns() {
    let (executor, _) = executor();
    let executor =
        executor.with_validator(CodeValidator::with_extra_patterns(["document\\."]).unwrap());
    let report = executor.run("document.title", "ts").unwrap();
    assert_eq!(report.error_kind(), Some(RunErrorKind::ContentPolicy));
}

#[test]
fn test_transpile_error_never_redirects() {
    let (executor, _) = executor();
    let report = executor.run("let x: = 1", "ts").unwrap();
    assert_eq!(report.error_kind(), Some(RunErrorKind::Transpilation));
    assert_eq!(executor.console().redirect_count(), 0);
}

#[test]
fn test_plain_extension_rejects_types() {
    let (executor, _) = executor();
    let report = executor.run("let x: number = 1", "js").unwrap();
    assert_eq!(report.error_kind(), Some(RunErrorKind::Transpilation));
}

#[test]
fn test_runtime_error_restores_console() {
    let (executor, sink) = executor();
    let report = executor.run("console.log(\"lost\");\nnull.x;", "ts").unwrap();

    match &report.outcome {
        RunOutcome::Failed { kind, message } => {
            assert_eq!(*kind, RunErrorKind::Execution);
            assert_eq!(message, "Cannot read properties of null (reading 'x')");
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(!executor.is_running());
    assert_eq!(executor.console().redirect_count(), 1);

    executor.console().log("host");
    assert_eq!(sink.lines(), vec!["host"]);
}

#[test]
fn test_runs_are_independent() {
    let (executor, _) = executor();
    executor.run("console.log(1)", "ts").unwrap();
    let second = executor.run("console.log(2)", "ts").unwrap();
    assert_eq!(second.output(), Some(&["2".to_string()][..]));
    assert_ne!(
        executor.run("1", "ts").unwrap().id,
        second.id,
        "each run gets a fresh id"
    );
}

#[test]
fn test_deeply_nested_source_is_a_transpile_error() {
    let sources = vec![
        format!("console.log({}1{})", "(".repeat(800), ")".repeat(800)),
        format!("console.log(1{})", "+1".repeat(5000)),
    ];
    let reports = thread::Builder::new()
        .stack_size(16 << 20)
        .spawn(move || {
            let (executor, _) = executor();
            let mut reports: Vec<_> = sources
                .iter()
                .map(|source| executor.run(source, "ts").unwrap())
                .collect();
            reports.push(executor.run("console.log(\"after\")", "ts").unwrap());
            reports
        })
        .unwrap()
        .join()
        .unwrap();

    for report in &reports[..2] {
        match &report.outcome {
            RunOutcome::Failed { kind, message } => {
                assert_eq!(*kind, RunErrorKind::Transpilation);
                assert!(message.contains("nested too deeply"), "{}", message);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    assert_eq!(reports[2].output(), Some(&["after".to_string()][..]));
}

#[test]
fn test_call_with_type_arguments() {
    let (executor, _) = executor();
    let source = "function id<T>(x: T): T { return x; }\nconsole.log(id<number>(4))";
    let report = executor.run(source, "ts").unwrap();
    assert_eq!(report.output(), Some(&["4".to_string()][..]));
}

#[test]
fn test_self_containing_array_prints_before_timeout() {
    let (executor, _) = executor();
    let report = executor
        .run("const a = [1]; a.push(a, a); console.log(a)", "ts")
        .unwrap();
    assert_eq!(report.output(), Some(&["1,,".to_string()][..]));
}

#[test]
fn test_timeout_ends_infinite_loop() {
    let executor = Executor::new(Console::new(MemorySink::new()), unbounded(100));
    let report = executor.run("while (true) {}", "ts").unwrap();

    assert_eq!(report.error_kind(), Some(RunErrorKind::Timeout));
    assert!(!executor.is_running());
    assert!(!executor.console().is_redirected());
}

#[test]
fn test_step_limit_is_an_execution_error() {
    let config = ExecutorConfig {
        timeout_ms: 0,
        limits: Limits {
            max_steps: 500,
            ..Limits::default()
        },
    };
    let executor = Executor::new(Console::new(MemorySink::new()), config);
    let report = executor.run("for (;;) {}", "ts").unwrap();
    assert_eq!(report.error_kind(), Some(RunErrorKind::Execution));
}

#[test]
fn test_reentrant_run_is_ignored_and_stop_cancels() {
    let executor = Arc::new(Executor::new(
        Console::new(MemorySink::new()),
        unbounded(10_000),
    ));

    let background = {
        let executor = Arc::clone(&executor);
        thread::spawn(move || executor.run("while (true) {}", "ts"))
    };
    wait_until_running(&executor);

    assert!(executor.run("console.log(1)", "ts").is_none());
    assert!(executor.is_running());

    assert!(executor.stop_handle().stop());
    assert!(!executor.is_running());

    let report = background.join().unwrap().unwrap();
    assert_eq!(report.error_kind(), Some(RunErrorKind::Stopped));
    assert!(!executor.console().is_redirected());

    // the executor is usable again
    let next = executor.run("console.log(\"again\")", "ts").unwrap();
    assert_eq!(next.output(), Some(&["again".to_string()][..]));
}

#[test]
fn test_stop_when_idle() {
    let (executor, _) = executor();
    assert!(!executor.stop());
    assert!(!executor.is_running());
}

#[test]
fn test_report_serializes_with_status_tag() {
    let (executor, _) = executor();
    let report = executor.run("console.log(\"hi\")", "ts").unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["outcome"]["status"], "completed");
    assert_eq!(json["outcome"]["output"][0], "hi");

    let failed = executor.run("eval(1)", "ts").unwrap();
    let json = serde_json::to_value(&failed).unwrap();
    assert_eq!(json["outcome"]["status"], "failed");
    assert_eq!(json["outcome"]["kind"], "content_policy");
}
