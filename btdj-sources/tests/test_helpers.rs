//! Scripted command runner for source tests.
//!
//! `ScriptedRunner` answers `CommandRunner::run` from a table keyed by the
//! full command line, so sources can be exercised without the real tools.

#![allow(dead_code)]

use async_trait::async_trait;
use btdj_sources::{CommandRunner, Result, SourceError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Canned response for one command line
#[derive(Debug, Clone)]
pub enum Response {
    Stdout(String),
    Missing,
    Fail { status: i32, stderr: String },
    Hang(Duration),
    Panic,
}

#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<String>>,
    call_count: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, command: &str, response: Response) {
        self.responses.lock().insert(command.to_string(), response);
    }

    pub fn stdout(&self, command: &str, output: &str) {
        self.respond(command, Response::Stdout(output.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.calls.lock().push(line.clone());
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let response = self.responses.lock().get(&line).cloned();
        match response {
            Some(Response::Stdout(output)) => Ok(output),
            Some(Response::Fail { status, stderr }) => Err(SourceError::CommandFailed {
                program: program.to_string(),
                status: Some(status),
                stderr,
            }),
            Some(Response::Hang(duration)) => {
                tokio::time::sleep(duration).await;
                Ok(String::new())
            }
            Some(Response::Panic) => panic!("scripted panic for {}", line),
            Some(Response::Missing) | None => {
                Err(SourceError::Unavailable(format!("{} not found", program)))
            }
        }
    }
}
