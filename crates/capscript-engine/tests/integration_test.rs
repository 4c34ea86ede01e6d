//! Integration tests for the capscript execution engine.
//!
//! These tests cover:
//! - Entry-point invocation and typed result marshalling
//! - The async capability bridge (promises, concurrency, rejection)
//! - Sync capability calls and argument validation
//! - Registration failure modes

use std::sync::{Arc, Mutex};

use capscript_core::{
    CapabilityArgs, CapabilityDescriptor, CapabilityEntry, CapabilityError, CapabilityHandler,
    IntoScript, ScriptValue, ValueKind,
};
use capscript_engine::{EngineError, LogSink, ScriptEngine};
use tokio::time::{sleep, Duration};

// ==============================================================================
// Test Fixtures
// ==============================================================================

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Profile {
    name: String,
    tags: Vec<String>,
    count: i64,
}

capscript_core::impl_from_script_decode!(Profile);

fn sample_profile() -> Profile {
    Profile {
        name: "Ada".to_string(),
        tags: vec!["math".to_string(), "logic".to_string()],
        count: 3,
    }
}

/// Demo capability surface used across the tests: a folder picker, an echo,
/// a failing picker, two timed capabilities, and a sync color setter.
struct PickerHost {
    colors: Arc<Mutex<Vec<String>>>,
}

impl PickerHost {
    fn new() -> Self {
        Self {
            colors: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl CapabilityHandler for PickerHost {
    fn capabilities(&self) -> Vec<CapabilityEntry> {
        let colors = self.colors.clone();
        vec![
            CapabilityEntry::async_fn(
                CapabilityDescriptor::asynchronous("openFolder").returns(ValueKind::String),
                |_args| async { Ok("/tmp".into_script()) },
            ),
            CapabilityEntry::async_fn(
                CapabilityDescriptor::asynchronous("getName")
                    .param("name", ValueKind::String)
                    .returns(ValueKind::String),
                |args: CapabilityArgs| async move {
                    let name: String = args.get(0)?;
                    Ok(name.into_script())
                },
            ),
            CapabilityEntry::async_fn(
                CapabilityDescriptor::asynchronous("pickFile").returns(ValueKind::String),
                |_args| async { Err(CapabilityError::failed("picker dismissed")) },
            ),
            CapabilityEntry::async_fn(
                CapabilityDescriptor::asynchronous("echoBack")
                    .param("value", ValueKind::Any)
                    .returns(ValueKind::Any),
                |args: CapabilityArgs| async move { args.get::<ScriptValue>(0) },
            ),
            CapabilityEntry::async_fn(
                CapabilityDescriptor::asynchronous("loadProfile").returns(ValueKind::Object),
                |_args| async { Ok(ScriptValue::encode(&sample_profile())?) },
            ),
            CapabilityEntry::async_fn(
                CapabilityDescriptor::asynchronous("slow").returns(ValueKind::String),
                |_args| async {
                    sleep(Duration::from_millis(80)).await;
                    Ok("slow".into_script())
                },
            ),
            CapabilityEntry::async_fn(
                CapabilityDescriptor::asynchronous("fast").returns(ValueKind::String),
                |_args| async {
                    sleep(Duration::from_millis(10)).await;
                    Ok("fast".into_script())
                },
            ),
            CapabilityEntry::sync_fn(
                CapabilityDescriptor::synchronous("setEditorColor")
                    .param("color", ValueKind::String),
                move |args| {
                    let color: String = args.get(0)?;
                    colors.lock().unwrap().push(color);
                    Ok(ScriptValue::Undefined)
                },
            ),
            CapabilityEntry::sync_fn(
                CapabilityDescriptor::synchronous("unavailable"),
                |_args| Err(CapabilityError::failed("not wired up")),
            ),
        ]
    }
}

struct MemorySink(Mutex<Vec<String>>);

impl LogSink for MemorySink {
    fn log(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

// ==============================================================================
// Scenario Tests
// ==============================================================================

#[tokio::test]
async fn test_zero_arg_async_capability() {
    let source = r#"
        async function handle(api) {
            log("Opening folder...");
            const folder = await api.openFolder();
            return folder;
        }
    "#;

    let engine = ScriptEngine::new();
    let result: String = engine.execute(source, &PickerHost::new()).await.unwrap();
    assert_eq!(result, "/tmp");
}

#[tokio::test]
async fn test_string_argument_passthrough() {
    let source = r#"
        async function handle(api) {
            return await api.getName("Hi");
        }
    "#;

    let engine = ScriptEngine::new();
    let result: String = engine.execute(source, &PickerHost::new()).await.unwrap();
    assert_eq!(result, "Hi");
}

#[tokio::test]
async fn test_missing_entry_point() {
    let engine = ScriptEngine::new();
    let err = engine
        .execute::<String>("const nothing = 1;", &PickerHost::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::EntryPointNotFound(name) if name == "handle"));
}

#[tokio::test]
async fn test_duplicate_capability_fails_before_evaluation() {
    struct DuplicateHost;
    impl CapabilityHandler for DuplicateHost {
        fn capabilities(&self) -> Vec<CapabilityEntry> {
            let entry = || {
                CapabilityEntry::async_fn(
                    CapabilityDescriptor::asynchronous("openFolder").returns(ValueKind::String),
                    |_args| async { Ok("/tmp".into_script()) },
                )
            };
            vec![entry(), entry()]
        }
    }

    let engine = ScriptEngine::new();
    // The source would throw on evaluation; registration must fail first.
    let err = engine
        .execute::<String>("throw new Error('never evaluated');", &DuplicateHost)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateCapability(name) if name == "openFolder"));
}

#[tokio::test]
async fn test_native_failure_rejects_script_promise() {
    let source = r#"
        async function handle(api) {
            return await api.pickFile();
        }
    "#;

    let engine = ScriptEngine::new();
    let err = engine
        .execute::<String>(source, &PickerHost::new())
        .await
        .unwrap_err();
    match err {
        EngineError::ScriptExecutionFailed(message) => {
            assert!(message.contains("picker dismissed"), "got: {message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ==============================================================================
// Bridge Behavior
// ==============================================================================

#[tokio::test]
async fn test_bridged_call_returns_promise_synchronously() {
    let source = r#"
        async function handle(api) {
            const pending = api.openFolder();
            const isPromise = pending instanceof Promise;
            await pending;
            return String(isPromise);
        }
    "#;

    let engine = ScriptEngine::new();
    let result: String = engine.execute(source, &PickerHost::new()).await.unwrap();
    assert_eq!(result, "true");
}

#[tokio::test]
async fn test_script_can_catch_native_rejection() {
    let source = r#"
        async function handle(api) {
            try {
                return await api.pickFile();
            } catch (e) {
                return "caught: " + e.message;
            }
        }
    "#;

    let engine = ScriptEngine::new();
    let result: String = engine.execute(source, &PickerHost::new()).await.unwrap();
    assert_eq!(result, "caught: picker dismissed");
}

#[tokio::test]
async fn test_concurrent_capability_calls() {
    let source = r#"
        async function handle(api) {
            const [a, b] = await Promise.all([api.slow(), api.fast()]);
            return a + ":" + b;
        }
    "#;

    let engine = ScriptEngine::new();
    let result: String = engine.execute(source, &PickerHost::new()).await.unwrap();
    assert_eq!(result, "slow:fast");
}

#[tokio::test]
async fn test_resolution_order_is_independent_of_call_order() {
    let source = r#"
        async function handle(api) {
            const slow = api.slow();
            const fast = api.fast();
            const first = await fast;
            const second = await slow;
            return first + "," + second;
        }
    "#;

    let engine = ScriptEngine::new();
    let result: String = engine.execute(source, &PickerHost::new()).await.unwrap();
    assert_eq!(result, "fast,slow");
}

#[tokio::test]
async fn test_structured_round_trip() {
    let source = r#"
        async function handle(api) {
            const profile = await api.loadProfile();
            return await api.echoBack(profile);
        }
    "#;

    let engine = ScriptEngine::new();
    let result: Profile = engine.execute(source, &PickerHost::new()).await.unwrap();
    assert_eq!(result, sample_profile());
}

#[tokio::test]
async fn test_script_built_object_decodes() {
    let source = r#"
        async function handle(api) {
            return { name: "Ada", tags: ["math", "logic"], count: 3 };
        }
    "#;

    let engine = ScriptEngine::new();
    let result: Profile = engine.execute(source, &PickerHost::new()).await.unwrap();
    assert_eq!(result, sample_profile());
}

#[tokio::test]
async fn test_numeric_results() {
    let engine = ScriptEngine::new();
    let host = PickerHost::new();

    let n: i64 = engine
        .execute(
            "async function handle(api) { return await api.echoBack(41) + 1; }",
            &host,
        )
        .await
        .unwrap();
    assert_eq!(n, 42);

    let f: f64 = engine
        .execute("async function handle(api) { return 2.5; }", &host)
        .await
        .unwrap();
    assert_eq!(f, 2.5);
}

// ==============================================================================
// Sync Capabilities and Argument Validation
// ==============================================================================

#[tokio::test]
async fn test_sync_capability_effect() {
    let source = r##"
        async function handle(api) {
            api.setEditorColor("#00ff00");
            api.setEditorColor("#112233");
            return "ok";
        }
    "##;

    let host = PickerHost::new();
    let engine = ScriptEngine::new();
    let result: String = engine.execute(source, &host).await.unwrap();
    assert_eq!(result, "ok");
    assert_eq!(
        host.colors.lock().unwrap().clone(),
        vec!["#00ff00".to_string(), "#112233".to_string()]
    );
}

#[tokio::test]
async fn test_sync_capability_error_is_catchable() {
    let source = r#"
        async function handle(api) {
            try {
                api.unavailable();
                return "no error";
            } catch (e) {
                return e.message;
            }
        }
    "#;

    let engine = ScriptEngine::new();
    let result: String = engine.execute(source, &PickerHost::new()).await.unwrap();
    assert_eq!(result, "not wired up");
}

#[tokio::test]
async fn test_argument_count_mismatch_throws() {
    let source = r#"
        async function handle(api) {
            try {
                await api.getName();
            } catch (e) {
                return e.message;
            }
        }
    "#;

    let engine = ScriptEngine::new();
    let result: String = engine.execute(source, &PickerHost::new()).await.unwrap();
    assert!(result.contains("expects 1 argument"), "got: {result}");
}

#[tokio::test]
async fn test_argument_kind_mismatch_throws() {
    let source = r#"
        async function handle(api) {
            try {
                await api.getName(42);
            } catch (e) {
                return e.message;
            }
        }
    "#;

    let engine = ScriptEngine::new();
    let result: String = engine.execute(source, &PickerHost::new()).await.unwrap();
    assert!(result.contains("expects string"), "got: {result}");
}

// ==============================================================================
// Driver Failure Modes
// ==============================================================================

#[tokio::test]
async fn test_evaluation_failure() {
    let engine = ScriptEngine::new();
    let err = engine
        .execute::<String>("function handle( {", &PickerHost::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ScriptEvaluationFailed(_)));
}

#[tokio::test]
async fn test_synchronous_throw_in_entry_point() {
    let source = r#"
        function handle(api) {
            throw new Error("sync boom");
        }
    "#;

    let engine = ScriptEngine::new();
    let err = engine
        .execute::<String>(source, &PickerHost::new())
        .await
        .unwrap_err();
    match err {
        EngineError::ScriptExecutionFailed(message) => assert!(message.contains("sync boom")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_return_value() {
    let source = "async function handle(api) { await api.openFolder(); }";

    let engine = ScriptEngine::new();
    let host = PickerHost::new();

    let err = engine.execute::<String>(source, &host).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Marshal(capscript_core::MarshalError::MissingReturnValue)
    ));

    // A unit target absorbs the missing value.
    engine.execute::<()>(source, &host).await.unwrap();
}

#[tokio::test]
async fn test_promise_that_can_never_settle() {
    let source = "function handle(api) { return new Promise(() => {}); }";

    let engine = ScriptEngine::new();
    let err = engine
        .execute::<String>(source, &PickerHost::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ScriptExecutionFailed(_)));
}

// ==============================================================================
// Host Integration
// ==============================================================================

#[tokio::test]
async fn test_custom_entry_point() {
    let source = r#"
        async function main(api) {
            return await api.openFolder();
        }
    "#;

    let engine = ScriptEngine::new();
    let result: String = engine
        .execute_entry(source, "main", &PickerHost::new())
        .await
        .unwrap();
    assert_eq!(result, "/tmp");
}

#[tokio::test]
async fn test_script_logging_reaches_custom_sink() {
    let sink = Arc::new(MemorySink(Mutex::new(Vec::new())));
    let engine = ScriptEngine::with_log_sink(sink.clone());

    let source = r#"
        async function handle(api) {
            log("picked", 2, "items");
            console.log("done");
            return "ok";
        }
    "#;

    let result: String = engine.execute(source, &PickerHost::new()).await.unwrap();
    assert_eq!(result, "ok");
    assert_eq!(sink.0.lock().unwrap().clone(), vec!["picked 2 items", "done"]);
}

#[tokio::test]
async fn test_context_is_not_shared_between_runs() {
    let engine = ScriptEngine::new();
    let host = PickerHost::new();

    let first: String = engine
        .execute(
            "async function handle(api) { globalThis.leak = 'x'; return 'one'; }",
            &host,
        )
        .await
        .unwrap();
    assert_eq!(first, "one");

    let second: String = engine
        .execute(
            "async function handle(api) { return String(globalThis.leak); }",
            &host,
        )
        .await
        .unwrap();
    assert_eq!(second, "undefined");
}
