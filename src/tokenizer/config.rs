//! Serializable tokenizer configuration.
//!
//! A [`TokenizerConfig`] holds exactly the construction parameters of a
//! tokenizer, so `tokenizer.config().build()` yields an equivalent tokenizer.
//! Persisting it is a matter of `serde_json`; see [`super::loader`].

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::bpe::{BpeFamily, BpeTokenizer};
use super::vocab::Vocabulary;
use super::wordpiece::WordPieceTokenizer;
use super::Tokenizer;

/// Construction parameters of a byte-level BPE tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpeConfig {
    pub vocabulary: Vocabulary,
    /// Merge rules as `"left right"` lines, highest priority first.
    #[serde(default)]
    pub merges: Vec<String>,
}

/// Construction parameters of a WordPiece tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPieceConfig {
    pub vocabulary: Vocabulary,
    #[serde(default)]
    pub lowercase: bool,
}

/// Tokenizer configuration for each supported model family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenizerConfig {
    Opt(BpeConfig),
    Roberta(BpeConfig),
    Bert(WordPieceConfig),
}

impl TokenizerConfig {
    /// Short family name, as used on the command line.
    pub fn family_name(&self) -> &'static str {
        match self {
            TokenizerConfig::Opt(_) => "opt",
            TokenizerConfig::Roberta(_) => "roberta",
            TokenizerConfig::Bert(_) => "bert",
        }
    }

    /// Construct the tokenizer this configuration describes.
    pub fn build(&self) -> Result<Box<dyn Tokenizer>> {
        Ok(match self {
            TokenizerConfig::Opt(cfg) => Box::new(BpeTokenizer::new(
                BpeFamily::Opt,
                cfg.vocabulary.clone(),
                cfg.merges.clone(),
            )?),
            TokenizerConfig::Roberta(cfg) => Box::new(BpeTokenizer::new(
                BpeFamily::Roberta,
                cfg.vocabulary.clone(),
                cfg.merges.clone(),
            )?),
            TokenizerConfig::Bert(cfg) => Box::new(WordPieceTokenizer::new(
                cfg.vocabulary.clone(),
                cfg.lowercase,
            )?),
        })
    }
}
