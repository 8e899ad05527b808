//! External schema compiler (`ncgen`-style).
//!
//! The compiler receives the textual schema on stdin and writes the file named
//! by `-o <path>`.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{NcError, NcResult};

/// Runs an external command that turns a textual schema into a file.
#[derive(Debug, Clone)]
pub struct SchemaCompiler {
    program: String,
}

impl SchemaCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Compile `text` into `output`.
    pub fn compile(&self, text: &str, output: &Path) -> NcResult<()> {
        debug!(program = %self.program, output = %output.display(), "Running schema compiler");
        let mut child = Command::new(&self.program)
            .arg("-o")
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| NcError::Command(format!("Failed to run {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| NcError::Command(format!("Failed to write schema to {}: {}", self.program, e)))?;
        }

        let result = child
            .wait_with_output()
            .map_err(|e| NcError::Command(format!("Failed to wait for {}: {}", self.program, e)))?;
        if !result.status.success() {
            return Err(NcError::Command(format!(
                "{} failed: {}",
                self.program,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl Default for SchemaCompiler {
    fn default() -> Self {
        Self::new("ncgen")
    }
}
