use std::{collections::VecDeque, sync::Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use shared::protocol::{CompileRequest, CompiledArtifact, ExecutionEvent, ExecutionRequest};

use crate::pipeline::{CompileService, ExecutionEnvironment, ExecutionEventStream};

#[derive(Clone)]
pub enum CompileBehavior {
    Artifact(String),
    Reject(String),
    Hang,
}

/// Plays its behaviors in order; the last one repeats.
pub struct ScriptedCompiler {
    behaviors: Mutex<VecDeque<CompileBehavior>>,
    requests: Mutex<Vec<CompileRequest>>,
}

impl ScriptedCompiler {
    pub fn artifact(artifact: &str) -> Self {
        Self::with(CompileBehavior::Artifact(artifact.to_string()))
    }

    pub fn reject(message: &str) -> Self {
        Self::with(CompileBehavior::Reject(message.to_string()))
    }

    pub fn hang() -> Self {
        Self::with(CompileBehavior::Hang)
    }

    pub fn sequence(behaviors: Vec<CompileBehavior>) -> Self {
        assert!(!behaviors.is_empty(), "at least one compile behavior");
        Self {
            behaviors: Mutex::new(behaviors.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn with(behavior: CompileBehavior) -> Self {
        Self::sequence(vec![behavior])
    }

    fn next_behavior(&self) -> CompileBehavior {
        let mut behaviors = self.behaviors.lock().expect("behaviors");
        if behaviors.len() > 1 {
            behaviors.pop_front().expect("non-empty")
        } else {
            behaviors.front().cloned().expect("non-empty")
        }
    }

    pub fn requests(&self) -> Vec<CompileRequest> {
        self.requests.lock().expect("requests").clone()
    }
}

#[async_trait]
impl CompileService for ScriptedCompiler {
    async fn compile(&self, request: CompileRequest) -> Result<CompiledArtifact> {
        self.requests.lock().expect("requests").push(request);
        match self.next_behavior() {
            CompileBehavior::Artifact(artifact) => Ok(CompiledArtifact(artifact)),
            CompileBehavior::Reject(message) => Err(anyhow!(message)),
            CompileBehavior::Hang => futures::future::pending::<Result<CompiledArtifact>>().await,
        }
    }
}

pub struct ScriptedEnvironment {
    events: Vec<ExecutionEvent>,
    fail_with: Option<String>,
    requests: Mutex<Vec<ExecutionRequest>>,
}

impl ScriptedEnvironment {
    pub fn emitting(events: Vec<ExecutionEvent>) -> Self {
        Self {
            events,
            fail_with: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            events: Vec::new(),
            fail_with: Some(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.requests.lock().expect("requests").clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests").len()
    }
}

#[async_trait]
impl ExecutionEnvironment for ScriptedEnvironment {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionEventStream> {
        self.requests.lock().expect("requests").push(request);
        if let Some(message) = &self.fail_with {
            return Err(anyhow!(message.clone()));
        }
        Ok(futures::stream::iter(self.events.clone()).boxed())
    }
}

pub fn stdout(text: &str) -> ExecutionEvent {
    ExecutionEvent::Stdout(text.to_string())
}

pub fn stderr(text: &str) -> ExecutionEvent {
    ExecutionEvent::Stderr(text.to_string())
}

pub fn test_result(success: bool, message: &str) -> ExecutionEvent {
    ExecutionEvent::TestResult {
        success,
        message: message.to_string(),
    }
}
