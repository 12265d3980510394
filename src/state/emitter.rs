//! Checkpoint output
//!
//! Checkpoints are written as single JSON lines to stdout for the process
//! that runs the loader, and optionally mirrored to a state file.

use crate::error::{Result, ResultExt};
use crate::types::JsonValue;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes flushed checkpoints
pub struct StateEmitter {
    /// Line-oriented output, normally stdout
    writer: Box<dyn Write + Send>,
    /// File holding the last emitted checkpoint
    state_file: Option<PathBuf>,
    /// Number of checkpoints written
    emitted: usize,
}

impl std::fmt::Debug for StateEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateEmitter")
            .field("state_file", &self.state_file)
            .field("emitted", &self.emitted)
            .finish_non_exhaustive()
    }
}

impl StateEmitter {
    /// Emit to the given writer
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer,
            state_file: None,
            emitted: 0,
        }
    }

    /// Emit to stdout
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Also keep the last checkpoint in `path`
    #[must_use]
    pub fn with_state_file(mut self, path: impl AsRef<Path>) -> Self {
        self.state_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Number of checkpoints written so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Write one checkpoint
    pub async fn emit(&mut self, state: &JsonValue) -> Result<()> {
        let line = serde_json::to_string(state)?;
        tracing::debug!("Emitting state {}", line);

        writeln!(self.writer, "{line}").context("Failed to write state")?;
        self.writer.flush().context("Failed to flush state output")?;

        if let Some(path) = &self.state_file {
            // Write to temp file first, then rename
            let temp_path = path.with_extension("tmp");
            tokio::fs::write(&temp_path, &line)
                .await
                .with_context(|| format!("Failed to write state file {}", temp_path.display()))?;
            tokio::fs::rename(&temp_path, path)
                .await
                .with_context(|| format!("Failed to rename state file {}", path.display()))?;
        }

        self.emitted += 1;
        Ok(())
    }
}

/// Read a checkpoint previously written with [`StateEmitter::with_state_file`]
pub async fn read_state_file(path: &Path) -> Result<Option<JsonValue>> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(None);
    }
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read state file {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&contents)?))
}
