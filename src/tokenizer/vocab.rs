//! Vocabulary tables shared by the BPE and WordPiece tokenizers.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TokenizerError};

/// A token vocabulary as supplied by the caller.
///
/// A list assigns ids by position; a map carries explicit ids (the layout of
/// a GPT-2 style `vocab.json`). Ids must be unique but need not be dense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Vocabulary {
    List(Vec<String>),
    Map(BTreeMap<String, u32>),
}

impl Vocabulary {
    pub fn len(&self) -> usize {
        match self {
            Vocabulary::List(tokens) => tokens.len(),
            Vocabulary::Map(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the forward and reverse lookup tables.
    ///
    /// Fails on an empty vocabulary, a repeated token string or a repeated id.
    pub(crate) fn build_index(&self) -> Result<VocabIndex> {
        if self.is_empty() {
            return Err(TokenizerError::Configuration(
                "vocabulary must not be empty".to_string(),
            ));
        }

        let mut index = VocabIndex {
            token_to_id: HashMap::with_capacity(self.len()),
            id_to_token: HashMap::with_capacity(self.len()),
        };

        let entries: Box<dyn Iterator<Item = (&str, u32)>> = match self {
            Vocabulary::List(tokens) => Box::new(
                tokens
                    .iter()
                    .enumerate()
                    .map(|(i, tok)| (tok.as_str(), i as u32)),
            ),
            Vocabulary::Map(map) => Box::new(map.iter().map(|(tok, &id)| (tok.as_str(), id))),
        };

        for (token, id) in entries {
            if index.token_to_id.insert(token.to_string(), id).is_some() {
                return Err(TokenizerError::Configuration(format!(
                    "duplicate token '{}' in vocabulary",
                    token
                )));
            }
            if let Some(previous) = index.id_to_token.insert(id, token.to_string()) {
                return Err(TokenizerError::Configuration(format!(
                    "id {} is assigned to both '{}' and '{}'",
                    id, previous, token
                )));
            }
        }

        Ok(index)
    }
}

/// Bidirectional token ↔ id lookup built from a [`Vocabulary`].
#[derive(Debug, Clone)]
pub(crate) struct VocabIndex {
    pub token_to_id: HashMap<String, u32>,
    pub id_to_token: HashMap<u32, String>,
}

impl VocabIndex {
    /// Resolve a special token that the tokenizer family cannot work without.
    pub fn require(&self, token: &str) -> Result<u32> {
        self.token_to_id.get(token).copied().ok_or_else(|| {
            TokenizerError::Configuration(format!(
                "required special token '{}' is missing from the vocabulary",
                token
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }
}
