pub mod cli;
pub mod error;
pub mod preprocess;
pub mod tokenizer;

pub use error::TokenizerError;
pub use preprocess::{PackedFeatures, Preprocessor, PreprocessorConfig};
pub use tokenizer::{Batched, BpeTokenizer, TextInput, Tokenizer, TokenizerConfig, WordPieceTokenizer};
