//! Shared CLI utilities for the strata-tokenize binary.

pub mod source;

pub use source::{resolve_tokenizer, TokenizerSource};

use std::io::Read;
use std::path::Path;

use crate::error::TokenizerError;
use crate::tokenizer::{Batched, TextInput};

/// Initialize tracing/logging to stderr.
///
/// If `disable` is true, no output is produced.
/// Otherwise respects `RUST_LOG` env var, defaulting to WARN.
pub fn init_logging(disable: bool) {
    use tracing_subscriber::EnvFilter;

    if disable {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read input text from one of: prompt string, file path, or stdin.
///
/// Returns an error message string if no input source is provided.
pub fn read_input(
    prompt: Option<&str>,
    file: Option<&Path>,
    use_stdin: bool,
) -> Result<String, String> {
    if let Some(text) = prompt {
        return Ok(text.to_string());
    }

    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read file '{}': {}", path.display(), e));
    }

    if use_stdin {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("Failed to read stdin: {}", e))?;
        return Ok(buf);
    }

    Err("No input provided. Use --prompt, --file, or --stdin".to_string())
}

/// Interpret raw CLI input as text to tokenize.
///
/// With `json` set the input must be a JSON string or list of strings;
/// otherwise the whole input is one text.
pub fn parse_text_input(input: &str, json: bool) -> Result<TextInput, TokenizerError> {
    if json {
        TextInput::from_json(&serde_json::from_str(input)?)
    } else {
        Ok(Batched::Single(input.to_string()))
    }
}

/// Parse a JSON id list (`[1, 2]`) or a list of lists (`[[1], [2, 3]]`).
pub fn parse_id_input(input: &str) -> Result<Batched<Vec<u32>>, TokenizerError> {
    Batched::<Vec<u32>>::ids_from_json(&serde_json::from_str(input)?)
}

/// Format ids in list form: `[1, 2, 3]`.
pub fn format_ids(ids: &[u32]) -> String {
    let id_strs: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    format!("[{}]", id_strs.join(", "))
}
