//! Closed result shape for sandbox executions.
//!
//! Remote interpreters hand back loosely shaped result objects (text,
//! error payloads, rendered images, interactive chart descriptions). This
//! module pins them to a tagged enum so callers match exhaustively instead
//! of probing for attributes.

use serde::{Deserialize, Serialize};

/// Outcome of one code execution inside a sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Whether the execution completed without a runtime error.
    pub success: bool,
    /// Combined textual output (stdout of the run).
    pub output: String,
    /// Non-textual results produced by the run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ExecutionArtifact>,
    /// The runtime error, when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
}

impl ExecutionReport {
    /// Successful report with the given output.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            artifacts: Vec::new(),
            error: None,
        }
    }

    /// Failed report carrying the runtime error.
    #[must_use]
    pub fn failed(error: ExecutionError) -> Self {
        Self {
            success: false,
            output: String::new(),
            artifacts: Vec::new(),
            error: Some(error),
        }
    }

    /// Append an artifact.
    #[must_use]
    pub fn with_artifact(mut self, artifact: ExecutionArtifact) -> Self {
        self.artifacts.push(artifact);
        self
    }
}

/// A single non-textual result from an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionArtifact {
    /// Plain text emitted as a display value.
    Text {
        /// The text content
        content: String,
    },
    /// A rendered image (e.g. a matplotlib figure).
    Image {
        /// Image format, e.g. "png"
        format: String,
        /// Base64-encoded image bytes
        data: String,
    },
    /// A derived description of an interactive chart.
    Chart {
        /// Chart kind as reported by the interpreter
        chart_type: String,
        /// Chart title
        title: String,
        /// X-axis label
        x_label: String,
        /// Y-axis label
        y_label: String,
        /// Data points
        elements: Vec<ChartElement>,
    },
}

/// One data point of a chart artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartElement {
    /// Point label
    pub label: String,
    /// Point value
    pub value: f64,
    /// Series/group the point belongs to
    #[serde(default)]
    pub group: String,
}

/// A runtime error raised inside the sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionError {
    /// Error class name
    pub name: String,
    /// Error message
    pub value: String,
    /// Remote traceback
    pub traceback: String,
}
