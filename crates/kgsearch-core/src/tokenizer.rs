//! Injectable tokenization for the BM25 stage of Rerank-RRF (§4.6, §9).
//! The core never hard-codes a linguistic library; a whitespace fallback is
//! always available.

/// A pluggable tokenizer. Implementations historically wrap a heavyweight
/// CJK segmenter; the whitespace tokenizer below is the required fallback.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Lowercases and splits on Unicode whitespace, dropping empty tokens.
/// Always available regardless of which linguistic tokenizer is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }
}
