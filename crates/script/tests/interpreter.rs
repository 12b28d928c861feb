//! Integration tests for the interpreter: language features, builtins,
//! error stacks, host functions and execution limits.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use rstest::rstest;
use sluice_script::{ErrorKind, Interpreter, Limits, ScriptError, Value};

async fn eval(source: &str) -> Value {
    Interpreter::new()
        .eval_source(source)
        .await
        .unwrap_or_else(|e| panic!("script failed: {}", e.render_stack(source)))
}

async fn eval_err(source: &str) -> ScriptError {
    match Interpreter::new().eval_source(source).await {
        Ok(value) => panic!("expected an error, got {value:?}"),
        Err(err) => err,
    }
}

#[rstest]
#[case("1 + 2 * 3", "7")]
#[case("'a' + 1 + 2", "a12")]
#[case("`sum: ${1 + 1}`", "sum: 2")]
#[case("typeof undeclared", "undefined")]
#[case("[1, [2, 3]].flat().length", "3")]
#[case("(0.1 + 0.2).toFixed(2)", "0.30")]
#[case("null ?? 'fallback'", "fallback")]
#[case("'x'.padStart(3, '-')", "--x")]
#[case("Math.max(1, 5, 3)", "5")]
#[case("parseInt('42px')", "42")]
#[tokio::test]
async fn expressions(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(eval(source).await.to_display_string(), expected);
}

#[tokio::test]
async fn closures_keep_their_scope() {
    let source = r"
        function counter() {
            let n = 0;
            return () => ++n;
        }
        const next = counter();
        next();
        next();
        next()
    ";
    assert_eq!(eval(source).await.to_number(), 3.0);
}

#[tokio::test]
async fn loop_closures_capture_each_iteration() {
    let source = r"
        const fns = [];
        for (let i = 0; i < 3; i++) {
            fns.push(() => i);
        }
        fns.map(f => f()).join(',')
    ";
    assert_eq!(eval(source).await.to_display_string(), "0,1,2");
}

#[tokio::test]
async fn destructuring_with_defaults_and_rest() {
    let source = r"
        const { a, b: [x, y = 5], ...rest } = { a: 1, b: [2], c: 3, d: 4 };
        [a, x, y, Object.keys(rest).join('')].join(',')
    ";
    assert_eq!(eval(source).await.to_display_string(), "1,2,5,cd");
}

#[tokio::test]
async fn array_callbacks() {
    let source = r"
        const total = [1, 2, 3, 4].reduce((sum, n) => sum + n, 0);
        const picked = [3, 1, 2]
            .map(n => n * 2)
            .filter(n => n > 2)
            .sort((a, b) => b - a);
        `${total}:${picked.join('-')}`
    ";
    assert_eq!(eval(source).await.to_display_string(), "10:6-4");
}

#[tokio::test]
async fn optional_chaining_short_circuits() {
    let source = r"
        const user = { profile: null };
        `${user.profile?.name ?? 'anon'}|${user.missing?.deep.deeper}`
    ";
    assert_eq!(eval(source).await.to_display_string(), "anon|undefined");
}

#[tokio::test]
async fn json_round_trip_keeps_key_order() {
    let source = r#"
        const parsed = JSON.parse('{"z": 1, "a": [true, null]}');
        parsed.extra = undefined;
        JSON.stringify(parsed)
    "#;
    assert_eq!(
        eval(source).await.to_display_string(),
        r#"{"z":1,"a":[true,null]}"#
    );
}

#[tokio::test]
async fn catch_binds_error_objects() {
    let source = r"
        let caught;
        try {
            missing;
        } catch (e) {
            caught = `${e.name}: ${e.message}`;
        }
        caught
    ";
    assert_eq!(
        eval(source).await.to_display_string(),
        "ReferenceError: missing is not defined"
    );
}

#[tokio::test]
async fn finally_runs_after_throw() {
    let source = r"
        const log = [];
        try {
            try {
                throw new TypeError('bad input');
            } finally {
                log.push('cleanup');
            }
        } catch (e) {
            log.push(e instanceof TypeError ? e.message : 'wrong');
        }
        log.join(', ')
    ";
    assert_eq!(eval(source).await.to_display_string(), "cleanup, bad input");
}

#[tokio::test]
async fn uncaught_errors_render_a_stack() {
    let source = "function nameOf(o) {\n  return o.name;\n}\nnameOf(null);\n";
    let err = eval_err(source).await;
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(
        err.render_stack(source),
        "TypeError: Cannot read properties of null (reading 'name')\n    at nameOf (2:10)\n    at <top-level> (4:1)"
    );
}

#[tokio::test]
async fn calling_a_non_function_names_the_callee() {
    let err = eval_err("const api = {};\napi.fetch();").await;
    assert_eq!(err.message(), "api.fetch is not a function");
}

#[tokio::test]
async fn const_reassignment_is_a_type_error() {
    let err = eval_err("const a = 1;\na = 2;").await;
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[tokio::test]
async fn async_functions_and_promise_all() {
    let source = r"
        async function double(x) {
            return x * 2;
        }
        const results = await Promise.all([double(1), double(2), 3]);
        results.join(',')
    ";
    assert_eq!(eval(source).await.to_display_string(), "2,4,3");
}

#[tokio::test(start_paused = true)]
async fn unawaited_host_calls_run_concurrently() {
    let interpreter = Interpreter::new();
    interpreter.define_global(
        "wait",
        Value::host("wait", |args| async move {
            let ms = args.first().map_or(0.0, Value::to_number);
            tokio::time::sleep(Duration::from_millis(ms as u64)).await;
            Ok(Value::Number(ms))
        }),
    );

    let started = tokio::time::Instant::now();
    let value = interpreter
        .eval_source("const a = wait(100);\nconst b = wait(100);\n(await a) + (await b)")
        .await
        .unwrap();

    assert_eq!(value.to_number(), 200.0);
    assert!(started.elapsed() < Duration::from_millis(150));
}

#[tokio::test]
async fn host_rejections_are_catchable() {
    let interpreter = Interpreter::new();
    interpreter.define_global(
        "fail",
        Value::host("fail", |_| async {
            Err(ScriptError::thrown(Value::error_object("Error", "boom")))
        }),
    );
    let value = interpreter
        .eval_source("let m;\ntry { await fail(); } catch (e) { m = e.message; }\nm")
        .await
        .unwrap();
    assert_eq!(value.to_display_string(), "boom");
}

#[rstest]
#[case::async_main("async function main() { const x = 1; }\nawait main();")]
#[case::self_reference("const again = () => again;\nagain();")]
#[case::returned_closure("function outer() { return () => outer; }\nconst kept = outer();")]
#[case::closure_in_object("const box = {};\nbox.self = () => box;")]
#[case::closures_in_loop("const fns = [];\nfor (let i = 0; i < 200; i++) { fns.push(() => i); }")]
#[tokio::test]
async fn dropping_the_interpreter_releases_globals(#[case] source: &str) {
    let sentinel = Arc::new(());
    let interpreter = Interpreter::new();
    let held = Arc::clone(&sentinel);
    interpreter.define_global(
        "noop",
        Value::host("noop", move |_| {
            let _held = Arc::clone(&held);
            async { Ok(Value::Undefined) }
        }),
    );
    interpreter.eval_source(source).await.unwrap();
    assert_eq!(Arc::strong_count(&sentinel), 2);

    drop(interpreter);
    assert_eq!(Arc::strong_count(&sentinel), 1);
}

#[rstest]
#[case::plus("s = s + s;")]
#[case::plus_assign("s += s;")]
#[case::template("s = `${s}${s}`;")]
#[case::concat("s = s.concat(s);")]
#[case::join("s = [s, s].join('');")]
#[tokio::test]
async fn doubling_a_string_hits_the_length_cap(#[case] step: &str) {
    let source = format!("let s = 'x';\nwhile (true) {{ {step} }}");
    let err = eval_err(&source).await;
    assert_eq!(err.kind(), ErrorKind::Range);
    assert_eq!(err.message(), "Invalid string length");
}

#[tokio::test]
async fn loop_budget_cannot_be_caught() {
    let interpreter = Interpreter::with_limits(Limits {
        max_loop_iterations: 100,
        ..Limits::default()
    });
    let err = interpreter
        .eval_source("try { while (true) {} } catch (e) { 'swallowed' }")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Limit);
}

#[tokio::test]
async fn runaway_recursion_hits_the_depth_limit() {
    let interpreter = Interpreter::with_limits(Limits {
        max_call_depth: 16,
        ..Limits::default()
    });
    let err = interpreter
        .eval_source("function down(n) { return down(n + 1); }\ndown(0);")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Limit);
    assert_eq!(err.message(), "Maximum call stack size exceeded");
}
