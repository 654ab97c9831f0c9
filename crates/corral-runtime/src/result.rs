use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

/// Exit status and captured output of one command invocation.
///
/// Immutable once produced. A zero status is success; anything else,
/// including termination by a signal (reported as `128 + signo`), is failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    exit_status: i32,
    #[serde(serialize_with = "serialize_lossy")]
    output: Vec<u8>,
    /// Set on results that stand in for a command that was never issued.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    synthetic: bool,
}

fn serialize_lossy<S: Serializer>(output: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(output))
}

impl ExecutionResult {
    pub fn new(exit_status: i32, output: impl Into<Vec<u8>>) -> Self {
        Self {
            exit_status,
            output: output.into(),
            synthetic: false,
        }
    }

    /// Success value for an operation that had nothing to do.
    pub fn synthetic_success() -> Self {
        Self {
            exit_status: 0,
            output: Vec::new(),
            synthetic: true,
        }
    }

    pub fn exit_status(&self) -> i32 {
        self.exit_status
    }

    pub fn success(&self) -> bool {
        self.exit_status == 0
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }

    /// Output with all line breaks removed, for single-value commands.
    pub fn output_single_line(&self) -> String {
        self.output_lossy().replace(['\n', '\r'], "")
    }

    pub fn into_output(self) -> Vec<u8> {
        self.output
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exit status {} ({} bytes of output)",
            self.exit_status,
            self.output.len()
        )
    }
}
