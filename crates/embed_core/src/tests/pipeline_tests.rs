use super::*;
use crate::test_support::{
    stderr, stdout, test_result, CompileBehavior, ScriptedCompiler, ScriptedEnvironment,
};

fn pipeline(
    compiler: &Arc<ScriptedCompiler>,
    environment: &Arc<ScriptedEnvironment>,
) -> ExecutionPipeline {
    ExecutionPipeline::with_compile_timeout(
        compiler.clone(),
        environment.clone(),
        Duration::from_secs(5),
    )
}

fn drain(events: &mut mpsc::UnboundedReceiver<ExecutionEvent>) -> Vec<ExecutionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

#[tokio::test]
async fn successful_compile_forwards_artifact_with_empty_placeholders() {
    let compiler = Arc::new(ScriptedCompiler::artifact("compiled-js"));
    let environment = Arc::new(ScriptedEnvironment::emitting(Vec::new()));
    let pipeline = pipeline(&compiler, &environment);

    let handle = pipeline.run("void main() {}").await.expect("run");
    handle.finished().await;

    assert_eq!(compiler.requests(), vec![CompileRequest::new("void main() {}")]);
    let requests = environment.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].artifact, CompiledArtifact("compiled-js".to_string()));
    assert_eq!(requests[0].entry_point, "");
    assert_eq!(requests[0].imports, "");
}

#[tokio::test]
async fn events_are_relayed_verbatim_in_order() {
    let script = vec![
        stdout("a"),
        stderr("warning"),
        stdout("b"),
        test_result(true, "ok"),
    ];
    let compiler = Arc::new(ScriptedCompiler::artifact("js"));
    let environment = Arc::new(ScriptedEnvironment::emitting(script.clone()));
    let pipeline = pipeline(&compiler, &environment);
    let mut events = pipeline.subscribe_events();

    let relayed = pipeline.run("src").await.expect("run").finished().await;

    assert_eq!(relayed, 4);
    assert_eq!(drain(&mut events), script);
}

#[tokio::test(start_paused = true)]
async fn hanging_compile_times_out_without_execution() {
    let compiler = Arc::new(ScriptedCompiler::hang());
    let environment = Arc::new(ScriptedEnvironment::emitting(vec![stdout("never")]));
    let pipeline = pipeline(&compiler, &environment);
    let mut events = pipeline.subscribe_events();

    let started = tokio::time::Instant::now();
    let err = match pipeline.run("src").await {
        Ok(_) => panic!("hanging compile must fail"),
        Err(err) => err,
    };

    assert_eq!(
        err.compile_failure(),
        &CompileFailure::Timeout {
            after: Duration::from_secs(5)
        }
    );
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(environment.calls(), 0);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn compile_error_stops_the_run() {
    let compiler = Arc::new(ScriptedCompiler::reject("line 1: expected ';'"));
    let environment = Arc::new(ScriptedEnvironment::emitting(vec![stdout("never")]));
    let pipeline = pipeline(&compiler, &environment);

    let err = match pipeline.run("void main() {").await {
        Ok(_) => panic!("rejected compile must fail"),
        Err(err) => err,
    };

    assert!(matches!(
        err.compile_failure(),
        CompileFailure::Rejected(message) if message.contains("expected ';'")
    ));
    assert_eq!(environment.calls(), 0);
}

#[tokio::test]
async fn execution_start_failure_surfaces_as_stderr() {
    let compiler = Arc::new(ScriptedCompiler::artifact("js"));
    let environment = Arc::new(ScriptedEnvironment::failing("sandbox unavailable"));
    let pipeline = pipeline(&compiler, &environment);
    let mut events = pipeline.subscribe_events();

    pipeline
        .run("src")
        .await
        .expect("execution errors are not pipeline failures")
        .finished()
        .await;

    assert_eq!(drain(&mut events), vec![stderr("sandbox unavailable")]);
}

#[tokio::test]
async fn failed_run_leaves_pipeline_reusable() {
    let compiler = Arc::new(ScriptedCompiler::sequence(vec![
        CompileBehavior::Reject("boom".to_string()),
        CompileBehavior::Reject("boom".to_string()),
        CompileBehavior::Artifact("js".to_string()),
    ]));
    let environment = Arc::new(ScriptedEnvironment::emitting(vec![stdout("hi")]));
    let pipeline = pipeline(&compiler, &environment);
    let mut events = pipeline.subscribe_events();

    assert!(pipeline.run("src").await.is_err());
    assert!(pipeline.run("src").await.is_err());
    assert_eq!(environment.calls(), 0);
    assert!(drain(&mut events).is_empty());

    let first = pipeline.run("src").await.expect("first");
    first.finished().await;
    let second = pipeline.run("src").await.expect("second");
    assert_ne!(second.run_id(), Uuid::nil());
    second.finished().await;

    assert_eq!(drain(&mut events), vec![stdout("hi"), stdout("hi")]);
    assert_eq!(compiler.requests().len(), 4);
    assert_eq!(environment.calls(), 2);
}

#[tokio::test]
async fn every_subscriber_receives_long_output_in_full() {
    let script: Vec<ExecutionEvent> = (0..3000).map(|i| stdout(&i.to_string())).collect();
    let compiler = Arc::new(ScriptedCompiler::artifact("js"));
    let environment = Arc::new(ScriptedEnvironment::emitting(script.clone()));
    let pipeline = pipeline(&compiler, &environment);
    let mut first = pipeline.subscribe_events();
    let mut second = pipeline.subscribe_events();

    let relayed = pipeline.run("src").await.expect("run").finished().await;

    assert_eq!(relayed, 3000);
    assert_eq!(drain(&mut first), script);
    assert_eq!(drain(&mut second), script);
}

#[tokio::test]
async fn dropped_subscriber_does_not_stop_the_relay() {
    let compiler = Arc::new(ScriptedCompiler::artifact("js"));
    let environment = Arc::new(ScriptedEnvironment::emitting(vec![stdout("a"), stdout("b")]));
    let pipeline = pipeline(&compiler, &environment);
    drop(pipeline.subscribe_events());
    let mut events = pipeline.subscribe_events();

    let relayed = pipeline.run("src").await.expect("run").finished().await;

    assert_eq!(relayed, 2);
    assert_eq!(drain(&mut events), vec![stdout("a"), stdout("b")]);
}
