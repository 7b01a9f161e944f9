//! Structured output writer supporting JSON Lines and human-readable modes.

use serde::Serialize;

/// Output mode for CLI results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Envelope for one JSON result line
#[derive(Debug, Serialize)]
pub struct CommandResult<'a, T: Serialize> {
    pub command: &'a str,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Structured output writer that supports both human-readable and JSON output
#[derive(Debug, Clone)]
pub struct OutputWriter {
    pub mode: OutputMode,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self {
            mode: if json { OutputMode::Json } else { OutputMode::Human },
        }
    }

    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Print one JSON result line (no-op in human mode)
    pub fn json_result<T: Serialize>(&self, command: &str, success: bool, result: &T) {
        if self.is_json() {
            let line = CommandResult {
                command,
                success,
                result: Some(result),
                error: None,
            };
            if let Ok(json) = serde_json::to_string(&line) {
                println!("{}", json);
            }
        }
    }

    /// Print an error message
    pub fn error(&self, command: &str, msg: &str) {
        match self.mode {
            OutputMode::Json => {
                let line: CommandResult<'_, ()> = CommandResult {
                    command,
                    success: false,
                    result: None,
                    error: Some(sanitize_error(msg)),
                };
                if let Ok(json) = serde_json::to_string(&line) {
                    println!("{}", json);
                }
            }
            OutputMode::Human => {
                crate::cli_style::print_error(&sanitize_error(msg), None);
            }
        }
    }

    /// Print an info message (suppressed in JSON mode)
    pub fn info(&self, msg: &str) {
        if !self.is_json() {
            crate::cli_style::print_info(msg);
        }
    }

    /// Print a warning (suppressed in JSON mode)
    pub fn warning(&self, msg: &str) {
        if !self.is_json() {
            crate::cli_style::print_warning(msg);
        }
    }
}

/// Sanitize error messages by collapsing whitespace
pub fn sanitize_error(msg: &str) -> String {
    msg.split_whitespace().collect::<Vec<&str>>().join(" ")
}
