//! Tokenizer trait and the single-or-batch input/output types.
//!
//! This module defines the [`Tokenizer`] trait implemented by both
//! [`BpeTokenizer`] (OPT, RoBERTa) and [`WordPieceTokenizer`] (BERT), along with
//! [`Batched`] values that mirror whether the caller passed one text or a batch.

pub mod bpe;
pub mod byte_level;
pub mod config;
pub mod loader;
pub mod vocab;
pub mod wordpiece;

pub use bpe::{BpeFamily, BpeTokenizer};
pub use config::{BpeConfig, TokenizerConfig, WordPieceConfig};
pub use vocab::Vocabulary;
pub use wordpiece::WordPieceTokenizer;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, TokenizerError};

/// A tokenizer that converts text to token IDs and back.
///
/// All implementations must be thread-safe (`Send + Sync`): every table is
/// built at construction and only read afterwards.
pub trait Tokenizer: Send + Sync {
    /// Encode text into a sequence of token IDs. Never fails; unknown input
    /// degrades to fallback tokens.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode a sequence of token IDs back into text.
    ///
    /// Fails with [`TokenizerError::OutOfRange`] on the first id that has no
    /// vocabulary entry.
    fn decode(&self, ids: &[u32]) -> Result<String>;

    /// Number of distinct ids in the vocabulary.
    fn vocabulary_size(&self) -> usize;

    fn token_to_id(&self, token: &str) -> Option<u32>;

    fn id_to_token(&self, id: u32) -> Option<&str>;

    /// Token placed at the start of a packed sequence.
    fn start_token_id(&self) -> Option<u32>;

    /// Token placed at the end of a packed sequence (and between segments).
    fn end_token_id(&self) -> Option<u32>;

    fn pad_token_id(&self) -> Option<u32>;

    /// The construction parameters, enough to rebuild an identical tokenizer.
    fn config(&self) -> TokenizerConfig;

    /// Encode a single text or each element of a batch independently.
    fn tokenize(&self, input: &TextInput) -> Batched<Vec<u32>> {
        input.map(|text| self.encode(text))
    }

    /// Decode a single id sequence or each sequence of a batch.
    fn detokenize(&self, ids: &Batched<Vec<u32>>) -> Result<Batched<String>> {
        ids.try_map(|seq| self.decode(seq))
    }
}

/// Either one value or an ordered batch of them.
///
/// Outputs of [`Tokenizer::tokenize`] and the preprocessors keep the shape of
/// their input: a single text yields `Single`, a batch yields `Batch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Batched<T> {
    Single(T),
    Batch(Vec<T>),
}

/// Raw text input: one string or a batch of strings.
pub type TextInput = Batched<String>;

impl<T> Batched<T> {
    pub fn map<U, F>(&self, mut f: F) -> Batched<U>
    where
        F: FnMut(&T) -> U,
    {
        match self {
            Batched::Single(item) => Batched::Single(f(item)),
            Batched::Batch(items) => Batched::Batch(items.iter().map(f).collect()),
        }
    }

    /// Like [`Batched::map`], stopping at the first error.
    pub fn try_map<U, F>(&self, mut f: F) -> Result<Batched<U>>
    where
        F: FnMut(&T) -> Result<U>,
    {
        Ok(match self {
            Batched::Single(item) => Batched::Single(f(item)?),
            Batched::Batch(items) => {
                Batched::Batch(items.iter().map(f).collect::<Result<Vec<_>>>()?)
            }
        })
    }

    /// Number of elements, counting `Single` as one.
    pub fn len(&self) -> usize {
        match self {
            Batched::Single(_) => 1,
            Batched::Batch(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Batched::Batch(_))
    }

    /// The elements as a slice, one element for `Single`.
    pub fn as_slice(&self) -> &[T] {
        match self {
            Batched::Single(item) => std::slice::from_ref(item),
            Batched::Batch(items) => items,
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Batched::Single(item) => vec![item],
            Batched::Batch(items) => items,
        }
    }
}

impl From<&str> for TextInput {
    fn from(text: &str) -> Self {
        Batched::Single(text.to_string())
    }
}

impl From<Vec<&str>> for TextInput {
    fn from(texts: Vec<&str>) -> Self {
        Batched::Batch(texts.into_iter().map(str::to_string).collect())
    }
}

impl TextInput {
    /// Interpret a JSON value as text input.
    ///
    /// A string is a single text and an array of strings is a batch. Anything
    /// else, including nested arrays, is rejected before any tokenization.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(Batched::Single(text.clone())),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::String(text) => Ok(text.clone()),
                    Value::Array(_) => Err(TokenizerError::InputShape(format!(
                        "element {} is a nested list; pass multiple segments as separate inputs",
                        i
                    ))),
                    other => Err(TokenizerError::InputShape(format!(
                        "element {} is {}, expected a string",
                        i,
                        json_kind(other)
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(Batched::Batch),
            other => Err(TokenizerError::InputShape(format!(
                "expected a string or a list of strings, got {}",
                json_kind(other)
            ))),
        }
    }
}

impl Batched<Vec<u32>> {
    /// Interpret a JSON value as token ids: a list of ids or a list of lists.
    pub fn ids_from_json(value: &Value) -> Result<Self> {
        let Value::Array(items) = value else {
            return Err(TokenizerError::InputShape(format!(
                "expected a list of token ids, got {}",
                json_kind(value)
            )));
        };

        if items.iter().all(Value::is_array) && !items.is_empty() {
            return items
                .iter()
                .map(ids_from_array)
                .collect::<Result<Vec<_>>>()
                .map(Batched::Batch);
        }
        ids_from_array(value).map(Batched::Single)
    }
}

fn ids_from_array(value: &Value) -> Result<Vec<u32>> {
    let Value::Array(items) = value else {
        return Err(TokenizerError::InputShape(format!(
            "expected a list of token ids, got {}",
            json_kind(value)
        )));
    };
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|id| u32::try_from(id).ok())
                .ok_or_else(|| {
                    TokenizerError::InputShape(format!("'{}' is not a valid token id", item))
                })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
