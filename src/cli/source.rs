//! Tokenizer resolution from CLI `--config` / `--family` arguments.
//!
//! Either a saved tokenizer config is loaded as is, or one is assembled from
//! a family name plus its vocabulary (and merge) files.

use std::path::Path;

use crate::error::TokenizerError;
use crate::tokenizer::loader;
use crate::tokenizer::{BpeConfig, TokenizerConfig, WordPieceConfig};

/// Where the CLI should get its tokenizer from.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenizerSource<'a> {
    pub config: Option<&'a Path>,
    pub family: Option<&'a str>,
    pub vocab: Option<&'a Path>,
    pub merges: Option<&'a Path>,
    pub lowercase: bool,
}

/// Resolve CLI arguments to a [`TokenizerConfig`].
///
/// - `--config` wins and is read as a JSON tokenizer config.
/// - `--family opt|roberta` needs `--vocab` (vocab.json) and `--merges`.
/// - `--family bert` needs `--vocab`: a `.json` file is read as a token -> id
///   map, anything else as one token per line.
pub fn resolve_tokenizer(source: &TokenizerSource<'_>) -> Result<TokenizerConfig, TokenizerError> {
    if let Some(path) = source.config {
        return loader::read_config(path);
    }

    let family = source.family.ok_or_else(|| {
        TokenizerError::Configuration("No tokenizer given. Use --config or --family".to_string())
    })?;
    let vocab_path = source.vocab.ok_or_else(|| {
        TokenizerError::Configuration(format!("--family {} requires --vocab", family))
    })?;

    match family.to_ascii_lowercase().as_str() {
        name @ ("opt" | "roberta") => {
            let merges_path = source.merges.ok_or_else(|| {
                TokenizerError::Configuration(format!("--family {} requires --merges", name))
            })?;
            let bpe = BpeConfig {
                vocabulary: loader::read_vocabulary_json(vocab_path)?,
                merges: loader::read_merges(merges_path)?,
            };
            Ok(if name == "opt" {
                TokenizerConfig::Opt(bpe)
            } else {
                TokenizerConfig::Roberta(bpe)
            })
        }
        "bert" => {
            let is_json = vocab_path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            let vocabulary = if is_json {
                loader::read_vocabulary_json(vocab_path)?
            } else {
                loader::read_vocabulary_lines(vocab_path)?
            };
            Ok(TokenizerConfig::Bert(WordPieceConfig {
                vocabulary,
                lowercase: source.lowercase,
            }))
        }
        other => Err(TokenizerError::Configuration(format!(
            "Unknown family '{}'. Options: opt, roberta, bert",
            other
        ))),
    }
}
