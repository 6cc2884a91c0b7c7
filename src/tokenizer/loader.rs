//! Reading vocabularies, merge tables and configs from disk.
//!
//! Supported layouts:
//! - `vocab.json`: a JSON object of token -> id (GPT-2 / OPT / RoBERTa).
//! - `merges.txt`: one `"left right"` rule per line, optionally preceded by a
//!   `#version` header.
//! - `vocab.txt`: one token per line, id = line number (BERT).
//! - tokenizer config: the JSON form of [`TokenizerConfig`].

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::Result;

use super::config::TokenizerConfig;
use super::vocab::Vocabulary;

/// Read a `vocab.json` token -> id map.
pub fn read_vocabulary_json(path: &Path) -> Result<Vocabulary> {
    let text = fs::read_to_string(path)?;
    let vocabulary = Vocabulary::Map(serde_json::from_str(&text)?);
    info!(path = %path.display(), entries = vocabulary.len(), "loaded JSON vocabulary");
    Ok(vocabulary)
}

/// Read a `vocab.txt` file, one token per line.
pub fn read_vocabulary_lines(path: &Path) -> Result<Vocabulary> {
    let text = fs::read_to_string(path)?;
    let vocabulary = parse_vocabulary_lines(&text);
    info!(path = %path.display(), entries = vocabulary.len(), "loaded line vocabulary");
    Ok(vocabulary)
}

/// Parse `vocab.txt` content. Line endings may be `\n` or `\r\n`; a final
/// newline does not add an empty token.
pub fn parse_vocabulary_lines(text: &str) -> Vocabulary {
    Vocabulary::List(text.lines().map(str::to_string).collect())
}

/// Read a `merges.txt` file.
pub fn read_merges(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    let merges = parse_merges(&text);
    info!(path = %path.display(), merges = merges.len(), "loaded merge rules");
    Ok(merges)
}

/// Parse `merges.txt` content, skipping the `#version` header and blank lines.
/// Rule validation happens when the tokenizer is built.
pub fn parse_merges(text: &str) -> Vec<String> {
    text.lines()
        .enumerate()
        .filter(|(i, line)| !(*i == 0 && line.starts_with("#version")))
        .map(|(_, line)| line)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

pub fn read_config(path: &Path) -> Result<TokenizerConfig> {
    let text = fs::read_to_string(path)?;
    let config: TokenizerConfig = serde_json::from_str(&text)?;
    info!(path = %path.display(), family = config.family_name(), "loaded tokenizer config");
    Ok(config)
}

/// Write `config` as pretty-printed JSON.
pub fn write_config(path: &Path, config: &TokenizerConfig) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(config)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TokenizerError;
    use crate::tokenizer::config::BpeConfig;
    use crate::tokenizer::Tokenizer;

    #[test]
    fn test_parse_merges_skips_header_and_blanks() {
        let merges = parse_merges("#version: 0.2\nĠ a\n\np l\r\n  \n");
        assert_eq!(merges, vec!["Ġ a", "p l"]);
    }

    #[test]
    fn test_parse_merges_without_header() {
        assert_eq!(parse_merges("a b\nab c"), vec!["a b", "ab c"]);
    }

    #[test]
    fn test_parse_vocabulary_lines() {
        let vocab = parse_vocabulary_lines("[PAD]\r\n[UNK]\nthe\n");
        assert_eq!(
            vocab,
            Vocabulary::List(vec!["[PAD]".into(), "[UNK]".into(), "the".into()])
        );
    }

    #[test]
    fn test_read_opt_files() {
        let dir = tempfile::tempdir().unwrap();
        let vocab_path = dir.path().join("vocab.json");
        let merges_path = dir.path().join("merges.txt");
        std::fs::write(
            &vocab_path,
            r#"{"<pad>": 0, "</s>": 1, "Ġat": 2, "Ġa": 3}"#,
        )
        .unwrap();
        std::fs::write(&merges_path, "#version: 0.2\nĠ a\nĠa t\n").unwrap();

        let vocabulary = read_vocabulary_json(&vocab_path).unwrap();
        let merges = read_merges(&merges_path).unwrap();
        let config = TokenizerConfig::Opt(BpeConfig { vocabulary, merges });
        let tokenizer = config.build().unwrap();
        assert_eq!(tokenizer.encode(" at</s>"), vec![2, 1]);
        assert_eq!(tokenizer.vocabulary_size(), 4);
    }

    #[test]
    fn test_read_bert_vocab_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");
        std::fs::write(&path, "[PAD]\n[UNK]\n[CLS]\n[SEP]\n[MASK]\nfox\n").unwrap();

        let vocab = read_vocabulary_lines(&path).unwrap();
        assert_eq!(vocab.len(), 6);
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        let config = TokenizerConfig::Opt(BpeConfig {
            vocabulary: Vocabulary::List(vec!["<pad>".into(), "</s>".into()]),
            merges: vec!["Ġ a".into()],
        });

        write_config(&path, &config).unwrap();
        assert_eq!(read_config(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_merges(Path::new("/nonexistent/merges.txt")).unwrap_err();
        assert!(matches!(err, TokenizerError::Io(_)));
    }

    #[test]
    fn test_malformed_json_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.json");
        std::fs::write(&path, "[1, 2").unwrap();
        let err = read_vocabulary_json(&path).unwrap_err();
        assert!(matches!(err, TokenizerError::Json(_)));
    }

    #[test]
    fn test_vocabulary_json_must_be_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.json");
        std::fs::write(&path, r#"["a", "b"]"#).unwrap();
        assert!(read_vocabulary_json(&path).is_err());
    }
}
