//! strata-tokenize: Tokenize, detokenize or preprocess text with an OPT,
//! RoBERTa or BERT tokenizer.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use serde::Serialize;

use strata_tokenizers::cli::{self, TokenizerSource};
use strata_tokenizers::preprocess::{PreprocessorConfig, TruncationStrategy};
use strata_tokenizers::{Tokenizer, TokenizerError};

#[derive(Parser)]
#[command(
    name = "strata-tokenize",
    about = "Tokenize text with an OPT, RoBERTa or BERT vocabulary"
)]
struct Args {
    /// Saved tokenizer config (JSON)
    #[arg(short = 'c', long, conflicts_with = "family")]
    config: Option<PathBuf>,

    /// Tokenizer family: opt, roberta or bert
    #[arg(long, value_parser = validate_family)]
    family: Option<String>,

    /// Vocabulary file (vocab.json, or vocab.txt for bert)
    #[arg(long)]
    vocab: Option<PathBuf>,

    /// Merge rules file (merges.txt), opt and roberta only
    #[arg(long)]
    merges: Option<PathBuf>,

    /// Lowercase and strip accents before WordPiece (bert only)
    #[arg(long)]
    lowercase: bool,

    /// Text to tokenize
    #[arg(short = 'p', long, conflicts_with_all = ["file", "stdin"])]
    prompt: Option<String>,

    /// Read text from file
    #[arg(short = 'f', long, conflicts_with = "stdin")]
    file: Option<PathBuf>,

    /// Read text from stdin
    #[arg(long)]
    stdin: bool,

    /// Parse the input as JSON: a string or a list of strings
    #[arg(long)]
    json_input: bool,

    /// Treat the input as JSON token ids and print the decoded text
    #[arg(long, conflicts_with_all = ["json_input", "sequence_length"])]
    decode: bool,

    /// Pack the tokens into model inputs of this length
    #[arg(long)]
    sequence_length: Option<usize>,

    /// Truncation when packing: round_robin or waterfall
    #[arg(long, default_value = "round_robin", value_parser = validate_truncate)]
    truncate: String,

    /// Output only token IDs in list format: [1, 2, 3]
    #[arg(long)]
    ids: bool,

    /// Print total token count
    #[arg(long)]
    show_count: bool,

    /// Output format: text or json
    #[arg(long, default_value = "text", value_parser = validate_output_format)]
    output_format: String,

    /// Suppress all logging
    #[arg(long)]
    log_disable: bool,
}

fn validate_family(s: &str) -> Result<String, String> {
    match s {
        "opt" | "roberta" | "bert" => Ok(s.to_string()),
        _ => Err(format!("Unknown family '{}'. Options: opt, roberta, bert", s)),
    }
}

fn validate_truncate(s: &str) -> Result<String, String> {
    match s {
        "round_robin" | "waterfall" => Ok(s.to_string()),
        _ => Err(format!(
            "Unknown truncation '{}'. Options: round_robin, waterfall",
            s
        )),
    }
}

fn validate_output_format(s: &str) -> Result<String, String> {
    match s {
        "text" | "json" => Ok(s.to_string()),
        _ => Err(format!("Unknown output format '{}'. Options: text, json", s)),
    }
}

#[derive(Serialize)]
struct TokenEntry {
    id: u32,
    text: String,
}

#[derive(Serialize)]
struct JsonOutput {
    tokens: Vec<TokenEntry>,
    count: usize,
}

fn main() {
    let args = Args::parse();
    cli::init_logging(args.log_disable);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli::resolve_tokenizer(&TokenizerSource {
        config: args.config.as_deref(),
        family: args.family.as_deref(),
        vocab: args.vocab.as_deref(),
        merges: args.merges.as_deref(),
        lowercase: args.lowercase,
    })?;
    let input = cli::read_input(
        args.prompt.as_deref(),
        args.file.as_deref(),
        args.stdin,
    )?;
    let json = args.output_format == "json";

    if args.decode {
        let ids = cli::parse_id_input(&input)?;
        let tokenizer = config.build()?;
        let text = tokenizer.detokenize(&ids)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&text)?);
        } else {
            for line in text.as_slice() {
                println!("{}", line);
            }
        }
        return Ok(());
    }

    let text = cli::parse_text_input(&input, args.json_input)?;

    if let Some(sequence_length) = args.sequence_length {
        let truncate = match args.truncate.as_str() {
            "waterfall" => TruncationStrategy::Waterfall,
            _ => TruncationStrategy::RoundRobin,
        };
        let preprocessor = PreprocessorConfig {
            tokenizer: config,
            sequence_length,
            truncate,
        }
        .build()?;
        let features = preprocessor.preprocess(std::slice::from_ref(&text))?;

        if json {
            println!("{}", serde_json::to_string_pretty(&features)?);
        } else {
            for row in features.as_slice() {
                println!("token_ids:    {}", cli::format_ids(&row.token_ids));
                if let Some(segment_ids) = &row.segment_ids {
                    println!("segment_ids:  {}", cli::format_ids(segment_ids));
                }
                let mask: Vec<u32> = row.padding_mask.iter().map(|&m| u32::from(m)).collect();
                println!("padding_mask: {}", cli::format_ids(&mask));
            }
        }
        return Ok(());
    }

    let tokenizer = config.build()?;
    let token_ids = tokenizer.tokenize(&text);

    if json {
        let outputs = token_ids.try_map(|ids| json_output(tokenizer.as_ref(), ids))?;
        println!("{}", serde_json::to_string_pretty(&outputs)?);
        return Ok(());
    }

    for ids in token_ids.as_slice() {
        if args.ids {
            println!("{}", cli::format_ids(ids));
        } else {
            for &id in ids {
                let text = tokenizer.decode(&[id])?;
                println!("{:>5} -> '{}'", id, text);
            }
        }
    }

    if args.show_count {
        let total: usize = token_ids.as_slice().iter().map(Vec::len).sum();
        println!("Total number of tokens: {}", total);
    }

    Ok(())
}

fn json_output(tokenizer: &dyn Tokenizer, ids: &[u32]) -> Result<JsonOutput, TokenizerError> {
    let tokens = ids
        .iter()
        .map(|&id| {
            Ok(TokenEntry {
                id,
                text: tokenizer.decode(&[id])?,
            })
        })
        .collect::<Result<Vec<_>, TokenizerError>>()?;
    Ok(JsonOutput {
        count: tokens.len(),
        tokens,
    })
}
