//! WordPiece tokenizer for BERT-family models.
//!
//! The algorithm:
//!
//! 1. Optionally normalizes text: lowercase, NFD decomposition, strip accents.
//! 2. Splits on whitespace and punctuation; punctuation and CJK ideographs
//!    become single-character words.
//! 3. For each word, greedily takes the longest prefix found in the
//!    vocabulary, then continues with the remainder using the `##`
//!    continuation prefix.
//! 4. If any part of a word has no match, the whole word becomes `[UNK]`.
//!
//! Special tokens (`[CLS]`, `[SEP]`, ...) are not inserted here; packing is
//! done by [`crate::preprocess`].

use std::collections::HashMap;

use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Result, TokenizerError};

use super::config::{TokenizerConfig, WordPieceConfig};
use super::vocab::Vocabulary;
use super::Tokenizer;

/// The continuation prefix for WordPiece subwords.
const CONTINUATION_PREFIX: &str = "##";

/// Words longer than this many bytes are emitted as `[UNK]` without matching.
const MAX_BYTES_PER_WORD: usize = 100;

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";
pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";
pub const MASK_TOKEN: &str = "[MASK]";

/// WordPiece tokenizer compatible with BERT-family vocabularies.
///
/// # Construction
///
/// Use [`WordPieceTokenizer::new`] with a vocabulary list (id = position) or
/// map. `[PAD]`, `[UNK]`, `[CLS]`, `[SEP]` and `[MASK]` must all be present.
pub struct WordPieceTokenizer {
    vocabulary: Vocabulary,
    /// Token string -> token ID lookup.
    vocab: HashMap<String, u32>,
    /// Token ID -> token string (for decoding).
    id_to_token: HashMap<u32, String>,
    lowercase: bool,
    cls_id: u32,
    sep_id: u32,
    unk_id: u32,
    pad_id: u32,
    mask_id: u32,
}

impl WordPieceTokenizer {
    /// Create a new WordPiece tokenizer.
    ///
    /// When `lowercase` is set, input is lowercased and stripped of accents
    /// before matching.
    pub fn new(vocabulary: Vocabulary, lowercase: bool) -> Result<Self> {
        let index = vocabulary.build_index()?;

        let pad_id = index.require(PAD_TOKEN)?;
        let unk_id = index.require(UNK_TOKEN)?;
        let cls_id = index.require(CLS_TOKEN)?;
        let sep_id = index.require(SEP_TOKEN)?;
        let mask_id = index.require(MASK_TOKEN)?;

        debug!(
            vocab_size = index.len(),
            lowercase,
            cls_id,
            sep_id,
            unk_id,
            pad_id,
            "WordPiece tokenizer initialized"
        );

        Ok(Self {
            vocabulary,
            vocab: index.token_to_id,
            id_to_token: index.id_to_token,
            lowercase,
            cls_id,
            sep_id,
            unk_id,
            pad_id,
            mask_id,
        })
    }

    pub fn unk_token_id(&self) -> u32 {
        self.unk_id
    }

    pub fn mask_token_id(&self) -> u32 {
        self.mask_id
    }

    /// Lowercase, NFD-decompose and strip combining marks.
    fn normalize(&self, text: &str) -> String {
        text.to_lowercase()
            .nfd()
            .filter(|c| !is_combining_mark(*c))
            .collect()
    }

    /// Split text on whitespace and punctuation into individual words.
    ///
    /// Punctuation characters and CJK ideographs become their own words.
    /// Runs of whitespace are collapsed.
    fn basic_tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut words = Vec::new();
        let mut start = None;

        for (pos, ch) in text.char_indices() {
            if ch.is_whitespace() || is_punctuation(ch) || is_cjk(ch) {
                if let Some(s) = start.take() {
                    words.push(&text[s..pos]);
                }
                if !ch.is_whitespace() {
                    words.push(&text[pos..pos + ch.len_utf8()]);
                }
            } else if start.is_none() {
                start = Some(pos);
            }
        }

        if let Some(s) = start {
            words.push(&text[s..]);
        }

        words
    }

    /// Apply WordPiece subword tokenization to a single word.
    ///
    /// Greedily finds the longest prefix match in the vocabulary, then
    /// continues with the remainder using the `##` continuation prefix. A word
    /// with any unmatched remainder is emitted as a single UNK.
    fn wordpiece_tokenize(&self, word: &str, output: &mut Vec<u32>) {
        if word.is_empty() {
            return;
        }

        if word.len() > MAX_BYTES_PER_WORD {
            output.push(self.unk_id);
            return;
        }

        // Try whole word first (common case for short words).
        if let Some(&id) = self.vocab.get(word) {
            output.push(id);
            return;
        }

        // Char boundaries as byte offsets, including the end of the word.
        let bounds: Vec<usize> = word
            .char_indices()
            .map(|(pos, _)| pos)
            .chain(std::iter::once(word.len()))
            .collect();

        let mut pieces = Vec::new();
        let mut start = 0;

        while start + 1 < bounds.len() {
            let mut end = bounds.len() - 1;
            let mut found = None;

            while start < end {
                let slice = &word[bounds[start]..bounds[end]];
                let id = if start == 0 {
                    self.vocab.get(slice)
                } else {
                    self.vocab.get(&format!("{}{}", CONTINUATION_PREFIX, slice))
                };
                if let Some(&id) = id {
                    found = Some(id);
                    break;
                }
                end -= 1;
            }

            match found {
                Some(id) => {
                    pieces.push(id);
                    start = end;
                }
                None => {
                    output.push(self.unk_id);
                    return;
                }
            }
        }

        output.extend(pieces);
    }
}

impl Tokenizer for WordPieceTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        let normalized;
        let text = if self.lowercase {
            normalized = self.normalize(text);
            normalized.as_str()
        } else {
            text
        };

        let mut tokens = Vec::new();
        for word in self.basic_tokenize(text) {
            self.wordpiece_tokenize(word, &mut tokens);
        }
        tokens
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let mut text = String::new();
        for &id in ids {
            let token = self
                .id_to_token
                .get(&id)
                .ok_or(TokenizerError::OutOfRange(id))?;
            match token.strip_prefix(CONTINUATION_PREFIX) {
                // Continuation token: append directly to the previous word.
                Some(suffix) if !suffix.is_empty() => text.push_str(suffix),
                _ => {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(token);
                }
            }
        }
        Ok(text)
    }

    fn vocabulary_size(&self) -> usize {
        self.id_to_token.len()
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab.get(token).copied()
    }

    fn id_to_token(&self, id: u32) -> Option<&str> {
        self.id_to_token.get(&id).map(String::as_str)
    }

    fn start_token_id(&self) -> Option<u32> {
        Some(self.cls_id)
    }

    fn end_token_id(&self) -> Option<u32> {
        Some(self.sep_id)
    }

    fn pad_token_id(&self) -> Option<u32> {
        Some(self.pad_id)
    }

    fn config(&self) -> TokenizerConfig {
        TokenizerConfig::Bert(WordPieceConfig {
            vocabulary: self.vocabulary.clone(),
            lowercase: self.lowercase,
        })
    }
}

// ---------------------------------------------------------------------------
// Character classification helpers
// ---------------------------------------------------------------------------

/// Check if a character is punctuation.
///
/// ASCII symbols count as punctuation, as in BERT, so `$`, `+` and `^` split
/// words too.
fn is_punctuation(ch: char) -> bool {
    if ch.is_ascii() {
        return ch.is_ascii_punctuation();
    }

    let cp = ch as u32;
    // Common Unicode punctuation blocks.
    (0x00A1..=0x00BF).contains(&cp)        // Latin-1 Supplement punctuation
        || (0x2010..=0x2027).contains(&cp) // Dashes, quotes, bullets, ellipsis
        || (0x2030..=0x205E).contains(&cp) // Per mille, primes, misc punctuation
        || (0x2E00..=0x2E7F).contains(&cp) // Supplemental Punctuation
        || (0x3001..=0x3003).contains(&cp) // CJK comma, full stop, ditto
        || (0x3008..=0x3011).contains(&cp) // CJK brackets
        || (0xFE30..=0xFE4F).contains(&cp) // CJK Compatibility Forms
        || (0xFE50..=0xFE6F).contains(&cp) // Small Form Variants
        || (0xFF01..=0xFF0F).contains(&cp) // Fullwidth punctuation
        || (0xFF1A..=0xFF20).contains(&cp)
        || (0xFF3B..=0xFF40).contains(&cp)
        || (0xFF5B..=0xFF65).contains(&cp)
}

/// CJK Unified Ideographs and their extensions; each is tokenized as a word.
fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x4E00..=0x9FFF
            | 0x3400..=0x4DBF
            | 0x20000..=0x2A6DF
            | 0x2A700..=0x2B73F
            | 0x2B740..=0x2B81F
            | 0x2B820..=0x2CEAF
            | 0xF900..=0xFAFF
            | 0x2F800..=0x2FA1F
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Batched;

    // -----------------------------------------------------------------------
    // Helper: a small cased/uncased BERT vocabulary.
    // -----------------------------------------------------------------------

    fn bert_vocab() -> Vocabulary {
        Vocabulary::List(
            [
                "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "THE", "QUICK", "BROWN", "FOX",
                "the", "quick", "brown", "fox",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
        )
    }

    fn make_tokenizer() -> WordPieceTokenizer {
        WordPieceTokenizer::new(bert_vocab(), false).unwrap()
    }

    /// Vocabulary with sub-word pieces for the continuation tests.
    ///
    ///   0-4: specials, 5: hello, 6: world, 7: ##ing, 8: test, 9: ",",
    ///   10: run, 11: ##ning, 12: ##s, 13: cafe, 14: 世, 15: un, 16: ##aff,
    ///   17: ##able
    fn make_subword_tokenizer(lowercase: bool) -> WordPieceTokenizer {
        let tokens = [
            "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "hello", "world", "##ing", "test", ",",
            "run", "##ning", "##s", "cafe", "世", "un", "##aff", "##able",
        ];
        WordPieceTokenizer::new(
            Vocabulary::List(tokens.iter().map(|t| t.to_string()).collect()),
            lowercase,
        )
        .unwrap()
    }

    // -----------------------------------------------------------------------
    // BERT scenarios
    // -----------------------------------------------------------------------

    #[test]
    fn test_tokenize() {
        let tok = make_tokenizer();
        assert_eq!(tok.encode("THE QUICK BROWN FOX."), vec![5, 6, 7, 8, 1]);
    }

    #[test]
    fn test_tokenize_batch() {
        let tok = make_tokenizer();
        let out = tok.tokenize(&vec!["THE QUICK BROWN FOX.", "THE FOX."].into());
        assert_eq!(out, Batched::Batch(vec![vec![5, 6, 7, 8, 1], vec![5, 8, 1]]));
    }

    #[test]
    fn test_lowercase() {
        let tok = WordPieceTokenizer::new(bert_vocab(), true).unwrap();
        assert_eq!(tok.encode("THE QUICK BROWN FOX."), vec![9, 10, 11, 12, 1]);
    }

    #[test]
    fn test_detokenize() {
        let tok = make_tokenizer();
        let out = tok.detokenize(&Batched::Batch(vec![vec![5, 6, 7, 8]])).unwrap();
        assert_eq!(out, Batched::Batch(vec!["THE QUICK BROWN FOX".to_string()]));
    }

    #[test]
    fn test_vocabulary_size() {
        assert_eq!(make_tokenizer().vocabulary_size(), 13);
    }

    #[test]
    fn test_errors_missing_special_tokens() {
        let vocab = Vocabulary::List(vec!["a".into(), "b".into(), "c".into()]);
        let err = WordPieceTokenizer::new(vocab, false).err().unwrap();
        assert!(matches!(err, TokenizerError::Configuration(_)));
    }

    #[test]
    fn test_config_round_trip() {
        let tok = WordPieceTokenizer::new(bert_vocab(), true).unwrap();
        let json = serde_json::to_string(&tok.config()).unwrap();
        let restored: TokenizerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, tok.config());
        let rebuilt = restored.build().unwrap();
        assert_eq!(rebuilt.encode("The fox"), vec![9, 12]);
    }

    // -----------------------------------------------------------------------
    // Sub-word matching
    // -----------------------------------------------------------------------

    #[test]
    fn test_encode_subword() {
        let tok = make_subword_tokenizer(false);
        // "testing" -> "test" + "##ing"
        assert_eq!(tok.encode("testing"), vec![8, 7]);
    }

    #[test]
    fn test_multiple_continuations() {
        let tok = make_subword_tokenizer(false);
        // "unaffable" -> "un" + "##aff" + "##able"
        assert_eq!(tok.encode("unaffable"), vec![15, 16, 17]);
    }

    #[test]
    fn test_longest_match_first() {
        let tok = make_subword_tokenizer(false);
        // "running" -> "run" + "##ning"; no "##n" needed.
        assert_eq!(tok.encode("running"), vec![10, 11]);
    }

    #[test]
    fn test_partially_matched_word_is_unk() {
        let tok = make_subword_tokenizer(false);
        // "testx": "test" matches but "##x" does not, so the whole word is UNK.
        assert_eq!(tok.encode("testx hello"), vec![1, 5]);
    }

    #[test]
    fn test_unknown_word_single_unk() {
        let tok = make_subword_tokenizer(false);
        assert_eq!(tok.encode("xyz"), vec![1]);
    }

    #[test]
    fn test_overlong_word_is_unk() {
        let tok = make_subword_tokenizer(false);
        let word = "hello".repeat(30);
        assert_eq!(tok.encode(&word), vec![1]);
    }

    // -----------------------------------------------------------------------
    // Normalization and splitting
    // -----------------------------------------------------------------------

    #[test]
    fn test_case_sensitive_by_default() {
        let tok = make_subword_tokenizer(false);
        assert_eq!(tok.encode("Hello"), vec![1]);
    }

    #[test]
    fn test_accent_stripping_when_lowercasing() {
        let tok = make_subword_tokenizer(true);
        assert_eq!(tok.encode("CAFÉ"), vec![13]);
        assert_eq!(tok.encode("café"), vec![13]);
    }

    #[test]
    fn test_accents_kept_without_lowercase() {
        let tok = make_subword_tokenizer(false);
        assert_eq!(tok.encode("café"), vec![1]);
    }

    #[test]
    fn test_punctuation_split() {
        let tok = make_subword_tokenizer(false);
        assert_eq!(tok.encode("hello,world"), vec![5, 9, 6]);
    }

    #[test]
    fn test_cjk_chars_are_words() {
        let tok = make_subword_tokenizer(false);
        // "世界": "世" is known, "界" is not.
        assert_eq!(tok.encode("hello世界"), vec![5, 14, 1]);
    }

    #[test]
    fn test_whitespace_collapsed() {
        let tok = make_subword_tokenizer(false);
        assert_eq!(tok.encode("  hello \t\n world  "), vec![5, 6]);
        assert!(tok.encode(" \t\n ").is_empty());
        assert!(tok.encode("").is_empty());
    }

    #[test]
    fn test_basic_tokenize() {
        let tok = make_subword_tokenizer(false);
        assert_eq!(
            tok.basic_tokenize("a$b  c...d"),
            vec!["a", "$", "b", "c", ".", ".", ".", "d"]
        );
    }

    #[test]
    fn test_normalize() {
        let tok = make_subword_tokenizer(true);
        assert_eq!(tok.normalize("ÀÉÎõü"), "aeiou");
    }

    #[test]
    fn test_is_punctuation() {
        for ch in ['.', ',', '!', '?', '$', '~', '\u{2014}', '\u{3002}', '\u{FF01}', '¿'] {
            assert!(is_punctuation(ch), "{:?}", ch);
        }
        for ch in ['a', 'Z', '0', ' ', '\u{4e16}', 'é'] {
            assert!(!is_punctuation(ch), "{:?}", ch);
        }
    }

    #[test]
    fn test_is_cjk() {
        assert!(is_cjk('\u{4e16}'));
        assert!(is_cjk('\u{20000}'));
        assert!(!is_cjk('a'));
        assert!(!is_cjk('\u{3042}')); // Hiragana is not an ideograph.
    }

    // -----------------------------------------------------------------------
    // Decoding
    // -----------------------------------------------------------------------

    #[test]
    fn test_decode_joins_continuations() {
        let tok = make_subword_tokenizer(false);
        assert_eq!(tok.decode(&[8, 7, 10, 11]).unwrap(), "testing running");
    }

    #[test]
    fn test_decode_continuation_at_start() {
        let tok = make_subword_tokenizer(false);
        assert_eq!(tok.decode(&[7, 5]).unwrap(), "ing hello");
    }

    #[test]
    fn test_decode_keeps_special_tokens() {
        let tok = make_tokenizer();
        assert_eq!(tok.decode(&[2, 5, 8, 3, 0]).unwrap(), "[CLS] THE FOX [SEP] [PAD]");
    }

    #[test]
    fn test_decode_out_of_range() {
        let tok = make_tokenizer();
        let err = tok.decode(&[5, 13]).unwrap_err();
        assert!(matches!(err, TokenizerError::OutOfRange(13)));
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(make_tokenizer().decode(&[]).unwrap(), "");
    }

    // -----------------------------------------------------------------------
    // Special token ids and thread safety
    // -----------------------------------------------------------------------

    #[test]
    fn test_special_token_ids() {
        let tok = make_tokenizer();
        assert_eq!(tok.start_token_id(), Some(2));
        assert_eq!(tok.end_token_id(), Some(3));
        assert_eq!(tok.pad_token_id(), Some(0));
        assert_eq!(tok.unk_token_id(), 1);
        assert_eq!(tok.mask_token_id(), 4);
        assert_eq!(tok.token_to_id("FOX"), Some(8));
        assert_eq!(tok.id_to_token(7), Some("BROWN"));
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WordPieceTokenizer>();
    }
}
