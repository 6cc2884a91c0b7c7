//! Byte-level BPE (Byte-Pair Encoding) tokenizer for OPT and RoBERTa.
//!
//! Encoding runs in four stages:
//! 1. Special tokens (`</s>`, `<pad>`, ...) are cut out of the raw text by
//!    literal matching. They map straight to their ids and are never split.
//! 2. The remaining text is pre-tokenized into GPT-2 style word chunks, so
//!    `" airplane at airport"` becomes `[" airplane", " at", " airport"]`.
//! 3. Each chunk's UTF-8 bytes are remapped into the printable byte-level
//!    alphabet ([`super::byte_level`]) and reduced with the ranked merge rules.
//! 4. Merged symbols are looked up in the vocabulary, falling back to one token
//!    per byte for symbols the vocabulary lacks.
//!
//! Decoding concatenates token strings and inverts the byte remap.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Result, TokenizerError};

use super::byte_level;
use super::config::{BpeConfig, TokenizerConfig};
use super::vocab::Vocabulary;
use super::Tokenizer;

/// Model families sharing the byte-level BPE algorithm. They differ only in
/// their special tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BpeFamily {
    /// OPT: `</s>` both starts and ends a sequence.
    Opt,
    /// RoBERTa: `<s>` starts, `</s>` ends and separates, `<mask>` for MLM.
    Roberta,
}

impl BpeFamily {
    fn start_token(self) -> &'static str {
        match self {
            BpeFamily::Opt => "</s>",
            BpeFamily::Roberta => "<s>",
        }
    }

    fn end_token(self) -> &'static str {
        "</s>"
    }

    fn pad_token(self) -> &'static str {
        "<pad>"
    }

    fn mask_token(self) -> Option<&'static str> {
        match self {
            BpeFamily::Opt => None,
            BpeFamily::Roberta => Some("<mask>"),
        }
    }

    /// Every token that must exist in the vocabulary and is matched atomically.
    fn special_tokens(self) -> Vec<&'static str> {
        let mut tokens = vec![self.start_token(), self.end_token(), self.pad_token()];
        tokens.extend(self.mask_token());
        tokens.sort_unstable();
        tokens.dedup();
        tokens
    }
}

/// Byte-level BPE tokenizer with rank-based merges.
///
/// # Construction
///
/// Use [`BpeTokenizer::new`] (or the [`BpeTokenizer::opt`] /
/// [`BpeTokenizer::roberta`] shorthands) with a vocabulary and the merge list
/// in `"left right"` form, highest priority first.
pub struct BpeTokenizer {
    family: BpeFamily,
    /// The vocabulary as supplied, kept for [`Tokenizer::config`].
    vocabulary: Vocabulary,
    merges: Vec<String>,
    /// Token string -> token ID.
    token_to_id: HashMap<String, u32>,
    /// Token ID -> token string.
    id_to_token: HashMap<u32, String>,
    /// Merge rank lookup: (left_token, right_token) -> rank.
    merge_ranks: HashMap<(String, String), u32>,
    /// Special tokens with their ids, longest surface form first.
    special_tokens: Vec<(String, u32)>,
    start_id: u32,
    end_id: u32,
    pad_id: u32,
}

impl BpeTokenizer {
    /// Create a new byte-level BPE tokenizer.
    ///
    /// # Errors
    ///
    /// [`TokenizerError::Configuration`] if the vocabulary is empty, holds a
    /// duplicate token or id, lacks one of the family's special tokens, or if a
    /// merge line is not of the form `"left right"`.
    pub fn new(family: BpeFamily, vocabulary: Vocabulary, merges: Vec<String>) -> Result<Self> {
        let index = vocabulary.build_index()?;

        let mut special_tokens = Vec::new();
        for token in family.special_tokens() {
            special_tokens.push((token.to_string(), index.require(token)?));
        }
        special_tokens.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        let mut merge_ranks = HashMap::with_capacity(merges.len());
        for (rank, line) in merges.iter().enumerate() {
            let (left, right) = parse_merge(line)?;
            // A repeated rule keeps its first (highest) priority.
            merge_ranks
                .entry((left.to_string(), right.to_string()))
                .or_insert(rank as u32);
        }

        let start_id = index.require(family.start_token())?;
        let end_id = index.require(family.end_token())?;
        let pad_id = index.require(family.pad_token())?;

        debug!(
            ?family,
            vocab_size = index.len(),
            merge_count = merge_ranks.len(),
            "BPE tokenizer initialized"
        );

        Ok(Self {
            family,
            vocabulary,
            merges,
            token_to_id: index.token_to_id,
            id_to_token: index.id_to_token,
            merge_ranks,
            special_tokens,
            start_id,
            end_id,
            pad_id,
        })
    }

    /// OPT tokenizer: requires `<pad>` and `</s>`.
    pub fn opt(vocabulary: Vocabulary, merges: Vec<String>) -> Result<Self> {
        Self::new(BpeFamily::Opt, vocabulary, merges)
    }

    /// RoBERTa tokenizer: requires `<s>`, `<pad>`, `</s>` and `<mask>`.
    pub fn roberta(vocabulary: Vocabulary, merges: Vec<String>) -> Result<Self> {
        Self::new(BpeFamily::Roberta, vocabulary, merges)
    }

    pub fn family(&self) -> BpeFamily {
        self.family
    }

    pub fn mask_token_id(&self) -> Option<u32> {
        self.family
            .mask_token()
            .and_then(|token| self.token_to_id.get(token).copied())
    }

    /// Split `text` into the word chunks BPE operates on, without remapping.
    pub fn pre_tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        split_words(text)
    }

    /// Run the merge loop over one pre-tokenized chunk and return the
    /// resulting byte-level token strings.
    pub fn bpe(&self, word: &str) -> Vec<String> {
        let mut symbols: Vec<String> = byte_level::encode_bytes(word)
            .chars()
            .map(String::from)
            .collect();

        while symbols.len() > 1 {
            let best = symbols
                .windows(2)
                .filter_map(|pair| {
                    self.merge_rank(&pair[0], &pair[1])
                        .map(|rank| (rank, &pair[0], &pair[1]))
                })
                .min_by_key(|(rank, _, _)| *rank);
            let Some((_, left, right)) = best else {
                break;
            };
            let (left, right) = (left.clone(), right.clone());

            // Fuse every non-overlapping occurrence, left to right.
            let mut merged = Vec::with_capacity(symbols.len());
            let mut i = 0;
            while i < symbols.len() {
                if i + 1 < symbols.len() && symbols[i] == left && symbols[i + 1] == right {
                    merged.push(format!("{}{}", left, right));
                    i += 2;
                } else {
                    merged.push(std::mem::take(&mut symbols[i]));
                    i += 1;
                }
            }
            symbols = merged;
        }

        symbols
    }

    fn merge_rank(&self, left: &str, right: &str) -> Option<u32> {
        self.merge_ranks
            .get(&(left.to_string(), right.to_string()))
            .copied()
    }

    /// Encode one pre-tokenized chunk into token IDs.
    fn encode_word(&self, word: &str, output: &mut Vec<u32>) {
        for token in self.bpe(word) {
            if let Some(&id) = self.token_to_id.get(&token) {
                output.push(id);
            } else {
                self.byte_fallback(&token, output);
            }
        }
    }

    /// Emit one token per remapped byte of an out-of-vocabulary symbol.
    fn byte_fallback(&self, token: &str, output: &mut Vec<u32>) {
        let mut buf = [0u8; 4];
        for ch in token.chars() {
            match self.token_to_id.get(&*ch.encode_utf8(&mut buf)) {
                Some(&id) => output.push(id),
                // Only reachable with a vocabulary that lacks the base alphabet.
                None => debug!(symbol = %ch, "byte-level symbol missing from vocabulary, dropped"),
            }
        }
    }

    fn is_special(&self, id: u32) -> bool {
        self.special_tokens.iter().any(|&(_, special)| special == id)
    }
}

impl Tokenizer for BpeTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        let mut output = Vec::new();
        for segment in split_special_tokens(text, &self.special_tokens) {
            match segment {
                Segment::Special(id) => output.push(id),
                Segment::Text(chunk) => {
                    for word in split_words(chunk) {
                        self.encode_word(word, &mut output);
                    }
                }
            }
        }
        output
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let mut bytes = Vec::new();
        for &id in ids {
            let token = self
                .id_to_token
                .get(&id)
                .ok_or(TokenizerError::OutOfRange(id))?;
            if self.is_special(id) {
                bytes.extend_from_slice(token.as_bytes());
            } else {
                byte_level::decode_into(token, &mut bytes);
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn vocabulary_size(&self) -> usize {
        self.id_to_token.len()
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    fn id_to_token(&self, id: u32) -> Option<&str> {
        self.id_to_token.get(&id).map(String::as_str)
    }

    fn start_token_id(&self) -> Option<u32> {
        Some(self.start_id)
    }

    fn end_token_id(&self) -> Option<u32> {
        Some(self.end_id)
    }

    fn pad_token_id(&self) -> Option<u32> {
        Some(self.pad_id)
    }

    fn config(&self) -> TokenizerConfig {
        let config = BpeConfig {
            vocabulary: self.vocabulary.clone(),
            merges: self.merges.clone(),
        };
        match self.family {
            BpeFamily::Opt => TokenizerConfig::Opt(config),
            BpeFamily::Roberta => TokenizerConfig::Roberta(config),
        }
    }
}

/// Split a `"left right"` merge line.
fn parse_merge(line: &str) -> Result<(&str, &str)> {
    match line.split_once(' ') {
        Some((left, right)) if !left.is_empty() && !right.is_empty() && !right.contains(' ') => {
            Ok((left, right))
        }
        _ => Err(TokenizerError::Configuration(format!(
            "malformed merge rule '{}', expected \"left right\"",
            line
        ))),
    }
}

// ---------------------------------------------------------------------------
// Special-token extraction
// ---------------------------------------------------------------------------

/// A piece of input after cutting out special tokens.
#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Special(u32),
}

/// Cut literal occurrences of `specials` out of `text`.
///
/// Matching is leftmost first; at a given position the longest token wins,
/// which `specials` guarantees by being sorted longest first.
fn split_special_tokens<'a>(text: &'a str, specials: &[(String, u32)]) -> Vec<Segment<'a>> {
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while pos < text.len() {
        let rest = &text[pos..];
        let matched = specials
            .iter()
            .find(|(token, _)| !token.is_empty() && rest.starts_with(token.as_str()));
        match matched {
            Some((token, id)) => {
                if text_start < pos {
                    segments.push(Segment::Text(&text[text_start..pos]));
                }
                segments.push(Segment::Special(*id));
                pos += token.len();
                text_start = pos;
            }
            None => {
                pos += rest.chars().next().map_or(1, char::len_utf8);
            }
        }
    }

    if text_start < text.len() {
        segments.push(Segment::Text(&text[text_start..]));
    }
    segments
}

// ---------------------------------------------------------------------------
// Pre-tokenization (no regex dependency)
// ---------------------------------------------------------------------------

/// GPT-2-style pre-tokenization.
///
/// Produces the same chunks as the GPT-2 pattern
/// `'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+`:
/// 1. English contractions are their own chunks.
/// 2. Letter, number and other runs form chunks, each optionally prefixed by a
///    single plain space.
/// 3. Whitespace before a word keeps its last character back when that
///    character is a plain space, so the space can prefix the word.
fn split_words(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let len = chars.len();
    let offset = |i: usize| chars.get(i).map_or(text.len(), |&(pos, _)| pos);

    let mut pieces = Vec::new();
    let mut i = 0;

    while i < len {
        let start = i;
        let ch = chars[i].1;

        if let Some(n) = contraction_len(&chars[i..]) {
            i += n;
        } else if !ch.is_whitespace()
            || (ch == ' ' && i + 1 < len && !chars[i + 1].1.is_whitespace())
        {
            // Optional single space, then a run of one category.
            if ch == ' ' {
                i += 1;
            }
            let cat = char_category(chars[i].1);
            while i < len && char_category(chars[i].1) == cat {
                i += 1;
            }
        } else {
            while i < len && chars[i].1.is_whitespace() {
                i += 1;
            }
            // Before a word the run gives up its last character, which then
            // either prefixes the word (a plain space) or stands alone.
            if i < len && i - start > 1 {
                i -= 1;
            }
        }

        pieces.push(&text[offset(start)..offset(i)]);
    }

    pieces
}

/// Character categories for pre-tokenization grouping.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
enum CharCategory {
    Letter,
    Number,
    Whitespace,
    Other,
}

fn char_category(ch: char) -> CharCategory {
    if ch.is_alphabetic() {
        CharCategory::Letter
    } else if ch.is_numeric() {
        CharCategory::Number
    } else if ch.is_whitespace() {
        CharCategory::Whitespace
    } else {
        CharCategory::Other
    }
}

/// Length in chars of an English contraction at the start of `chars`.
fn contraction_len(chars: &[(usize, char)]) -> Option<usize> {
    if chars.first().map(|&(_, c)| c) != Some('\'') {
        return None;
    }
    let next = chars.get(1).map(|&(_, c)| c);
    let next2 = chars.get(2).map(|&(_, c)| c);
    match (next, next2) {
        (Some('r'), Some('e')) | (Some('v'), Some('e')) | (Some('l'), Some('l')) => Some(3),
        (Some('s' | 't' | 'm' | 'd'), _) => Some(2),
        _ => None,
    }
}
