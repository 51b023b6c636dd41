//! Types for the encoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::pipeline::Stage;

/// One external encoder run: the argument vector and the file it must produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// Pipeline stage this run belongs to.
    pub stage: Stage,
    /// Arguments passed to the encoder executable.
    pub args: Vec<String>,
    /// File the run is expected to leave behind.
    pub output: PathBuf,
    /// Media length the run covers, used for progress percentages.
    pub expected_duration_secs: Option<f64>,
}

impl Invocation {
    pub fn new(stage: Stage, args: Vec<String>, output: PathBuf) -> Self {
        Self {
            stage,
            args,
            output,
            expected_duration_secs: None,
        }
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.expected_duration_secs = Some(secs);
        self
    }

    /// Value following `flag` in the argument vector.
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Renders the invocation as a single line for logs.
    pub fn command_line(&self, program: &str) -> String {
        let mut line = program.to_string();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// How an encoder run ended.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolExit {
    /// Process exit code, `None` when killed by a signal.
    pub code: Option<i32>,
    /// Error lines captured from the encoder's output.
    pub stderr: Option<String>,
}

impl ToolExit {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            stderr: None,
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stderr: Some(stderr.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}
