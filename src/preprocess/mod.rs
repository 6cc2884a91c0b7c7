//! Model-input preprocessing: tokenize one or more text segments and pack them
//! into fixed-length `token_ids` / `segment_ids` / `padding_mask` arrays.
//!
//! Each model family packs differently:
//!
//! | Family  | Layout                                   | segment_ids |
//! |---------|------------------------------------------|-------------|
//! | BERT    | `[CLS] a [SEP] b [SEP] [PAD]...`         | yes         |
//! | RoBERTa | `<s> a </s></s> b </s> <pad>...`         | no          |
//! | OPT     | `</s> a </s> <pad>...` (one segment)     | no          |

pub mod packer;

pub use packer::{MultiSegmentPacker, StartEndPacker, TruncationStrategy};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, TokenizerError};
use crate::tokenizer::{Batched, TextInput, Tokenizer, TokenizerConfig};

/// Construction parameters of a [`Preprocessor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessorConfig {
    pub tokenizer: TokenizerConfig,
    pub sequence_length: usize,
    /// Ignored by single-segment families.
    #[serde(default)]
    pub truncate: TruncationStrategy,
}

impl PreprocessorConfig {
    pub fn build(&self) -> Result<Preprocessor> {
        Preprocessor::new(self.clone())
    }
}

/// One packed example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackedFeatures {
    pub token_ids: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_ids: Option<Vec<u32>>,
    pub padding_mask: Vec<bool>,
}

#[derive(Debug, Clone)]
enum Packer {
    MultiSegment {
        packer: MultiSegmentPacker,
        segment_ids: bool,
    },
    StartEnd(StartEndPacker),
}

/// A tokenizer paired with the packer of its model family.
pub struct Preprocessor {
    tokenizer: Box<dyn Tokenizer>,
    packer: Packer,
    pad_id: u32,
    config: PreprocessorConfig,
}

impl std::fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preprocessor")
            .field("family", &self.config.tokenizer.family_name())
            .field("sequence_length", &self.config.sequence_length)
            .field("truncate", &self.config.truncate)
            .finish()
    }
}

impl Preprocessor {
    pub fn new(config: PreprocessorConfig) -> Result<Self> {
        let tokenizer = config.tokenizer.build()?;
        Self::with_tokenizer(tokenizer, config)
    }

    /// Wrap an already built tokenizer. Its own config replaces
    /// `config.tokenizer`.
    pub fn from_tokenizer(
        tokenizer: Box<dyn Tokenizer>,
        sequence_length: usize,
        truncate: TruncationStrategy,
    ) -> Result<Self> {
        let config = PreprocessorConfig {
            tokenizer: tokenizer.config(),
            sequence_length,
            truncate,
        };
        Self::with_tokenizer(tokenizer, config)
    }

    fn with_tokenizer(tokenizer: Box<dyn Tokenizer>, config: PreprocessorConfig) -> Result<Self> {
        if config.sequence_length == 0 {
            return Err(TokenizerError::Configuration(
                "sequence_length must be greater than zero".to_string(),
            ));
        }

        let special = |id: Option<u32>, role: &str| {
            id.ok_or_else(|| {
                TokenizerError::Configuration(format!(
                    "{} tokenizer has no {} token",
                    config.tokenizer.family_name(),
                    role
                ))
            })
        };
        let start_id = special(tokenizer.start_token_id(), "start")?;
        let end_id = special(tokenizer.end_token_id(), "end")?;
        let pad_id = special(tokenizer.pad_token_id(), "padding")?;

        let packer = match &config.tokenizer {
            TokenizerConfig::Bert(_) => Packer::MultiSegment {
                packer: MultiSegmentPacker {
                    sequence_length: config.sequence_length,
                    start_value: vec![start_id],
                    sep_value: vec![end_id],
                    end_value: vec![end_id],
                    pad_value: pad_id,
                    truncate: config.truncate,
                },
                segment_ids: true,
            },
            TokenizerConfig::Roberta(_) => Packer::MultiSegment {
                packer: MultiSegmentPacker {
                    sequence_length: config.sequence_length,
                    start_value: vec![start_id],
                    sep_value: vec![end_id, end_id],
                    end_value: vec![end_id],
                    pad_value: pad_id,
                    truncate: config.truncate,
                },
                segment_ids: false,
            },
            TokenizerConfig::Opt(_) => Packer::StartEnd(StartEndPacker {
                sequence_length: config.sequence_length,
                start_value: Some(start_id),
                end_value: Some(end_id),
                pad_value: pad_id,
            }),
        };

        debug!(
            family = config.tokenizer.family_name(),
            sequence_length = config.sequence_length,
            truncate = ?config.truncate,
            "preprocessor initialized"
        );

        Ok(Self {
            tokenizer,
            packer,
            pad_id,
            config,
        })
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    pub fn sequence_length(&self) -> usize {
        self.config.sequence_length
    }

    pub fn config(&self) -> PreprocessorConfig {
        PreprocessorConfig {
            tokenizer: self.tokenizer.config(),
            ..self.config.clone()
        }
    }

    /// Tokenize and pack `segments`.
    ///
    /// Every segment must be a `Single` text, or every segment a `Batch` of
    /// the same length; the output has the same shape. Shape errors are
    /// reported before anything is tokenized.
    pub fn preprocess(&self, segments: &[TextInput]) -> Result<Batched<PackedFeatures>> {
        let batch_size = check_segment_shapes(segments)?;
        if matches!(self.packer, Packer::StartEnd(_)) && segments.len() != 1 {
            return Err(TokenizerError::InputShape(format!(
                "{} preprocessing takes exactly one segment, got {}",
                self.config.tokenizer.family_name(),
                segments.len()
            )));
        }

        let encoded: Vec<Batched<Vec<u32>>> = segments
            .iter()
            .map(|segment| self.tokenizer.tokenize(segment))
            .collect();

        let pack_row = |row: usize| -> Result<PackedFeatures> {
            let ids: Vec<&[u32]> = encoded
                .iter()
                .map(|seg| seg.as_slice()[row].as_slice())
                .collect();
            self.pack(&ids)
        };

        match batch_size {
            None => pack_row(0).map(Batched::Single),
            Some(n) => (0..n)
                .map(pack_row)
                .collect::<Result<Vec<_>>>()
                .map(Batched::Batch),
        }
    }

    /// Preprocess a single segment given as JSON: a string or a list of
    /// strings. Nested lists are rejected.
    pub fn preprocess_json(&self, value: &Value) -> Result<Batched<PackedFeatures>> {
        let input = TextInput::from_json(value)?;
        self.preprocess(std::slice::from_ref(&input))
    }

    fn pack(&self, segments: &[&[u32]]) -> Result<PackedFeatures> {
        let (token_ids, segment_ids) = match &self.packer {
            Packer::MultiSegment {
                packer,
                segment_ids,
            } => {
                let (token_ids, seg) = packer.pack(segments)?;
                (token_ids, segment_ids.then_some(seg))
            }
            Packer::StartEnd(packer) => (packer.pack(segments[0]), None),
        };
        let padding_mask = token_ids.iter().map(|&id| id != self.pad_id).collect();
        Ok(PackedFeatures {
            token_ids,
            segment_ids,
            padding_mask,
        })
    }
}

/// Returns `None` for single inputs, or the common batch size.
fn check_segment_shapes(segments: &[TextInput]) -> Result<Option<usize>> {
    let Some(first) = segments.first() else {
        return Err(TokenizerError::InputShape(
            "at least one segment is required".to_string(),
        ));
    };

    match first {
        Batched::Single(_) => {
            if segments.iter().any(Batched::is_batch) {
                return Err(TokenizerError::InputShape(
                    "segments mix single texts and batches".to_string(),
                ));
            }
            Ok(None)
        }
        Batched::Batch(items) => {
            let n = items.len();
            for (i, segment) in segments.iter().enumerate() {
                if !segment.is_batch() {
                    return Err(TokenizerError::InputShape(
                        "segments mix single texts and batches".to_string(),
                    ));
                }
                if segment.len() != n {
                    return Err(TokenizerError::InputShape(format!(
                        "segment {} has batch size {}, expected {}",
                        i,
                        segment.len(),
                        n
                    )));
                }
            }
            Ok(Some(n))
        }
    }
}
