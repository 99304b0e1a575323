//! Canned-response runner for tests

use super::cli::{AwsCall, AwsCliError, AwsRunner};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

enum Canned {
    Stdout(String),
    Exit(i32, String),
}

/// Answers calls from a table keyed by, in lookup order:
/// `profile|service operation args...`, `service operation args...`,
/// `profile|service operation`, `service operation`.
/// Unknown calls fail with exit code 254.
#[derive(Default)]
pub struct FakeAws {
    responses: HashMap<String, Canned>,
    calls: Mutex<Vec<String>>,
}

impl FakeAws {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, key: &str, value: Value) -> Self {
        self.responses
            .insert(key.to_string(), Canned::Stdout(value.to_string()));
        self
    }

    pub fn stdout(mut self, key: &str, stdout: &str) -> Self {
        self.responses
            .insert(key.to_string(), Canned::Stdout(stdout.to_string()));
        self
    }

    pub fn fail(mut self, key: &str, stderr: &str) -> Self {
        self.responses
            .insert(key.to_string(), Canned::Exit(255, stderr.to_string()));
        self
    }

    /// Every call made so far, as `profile|service operation args...`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn lookup(&self, profile: &str, call: &AwsCall) -> Option<&Canned> {
        let full = call.describe();
        let short = format!("{} {}", call.service, call.operation);
        [
            format!("{}|{}", profile, full),
            full,
            format!("{}|{}", profile, short),
            short,
        ]
        .iter()
        .find_map(|key| self.responses.get(key))
    }
}

impl AwsRunner for FakeAws {
    async fn run(&self, profile: &str, call: &AwsCall) -> Result<String, AwsCliError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("{}|{}", profile, call.describe()));
        }

        match self.lookup(profile, call) {
            Some(Canned::Stdout(out)) => Ok(out.clone()),
            Some(Canned::Exit(code, stderr)) => Err(AwsCliError::Failed {
                command: call.describe(),
                code: *code,
                stderr: stderr.clone(),
            }),
            None => Err(AwsCliError::Failed {
                command: call.describe(),
                code: 254,
                stderr: "no canned response".to_string(),
            }),
        }
    }
}
