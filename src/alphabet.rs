//! Genomic alphabet and token rendering.
//!
//! Raw sequences are mapped byte by byte onto a fixed alphabet of eleven
//! tokens. The first six are special tokens; `N` is a help token as well, so
//! every id below [`N_HELP_TOKENS`] separates sequences and is never merged.

use crate::{
    error::OutputError,
    types::{MergeRecord, Token},
};

/// Token strings of the base alphabet, indexed by token id.
pub const ALPHABET: [&str; 11] = [
    "[UNK]", "[CLS]", "[SEP]", "[PAD]", "[MASK]", "~", "N", "A", "C", "G", "T",
];

pub const ALPHABET_SIZE: Token = ALPHABET.len() as Token;

/// Tokens below this id are help tokens.
pub const N_HELP_TOKENS: Token = 7;

/// Special tokens exported as added tokens of the tokenizer model.
pub const N_SPECIAL_TOKENS: Token = 6;

pub const UNK: Token = 0;
pub const CLS: Token = 1;
pub const SEP: Token = 2;

/// Separator placed between sequences.
pub const SEPARATOR: Token = 5;

/// Maps one input byte to its token. Newlines become separators.
#[inline]
pub fn token_of(byte: u8) -> Token {
    match byte {
        b'~' | b'\n' => SEPARATOR,
        b'N' => 6,
        b'A' => 7,
        b'C' => 8,
        b'G' => 9,
        b'T' => 10,
        _ => UNK,
    }
}

/// Joins `seqs` with the separator and maps them onto the alphabet.
///
/// Works on raw bytes; anything outside the alphabet, valid UTF-8 or not,
/// becomes [`UNK`].
pub fn encode_sequences<S: AsRef<[u8]>>(seqs: &[S]) -> Vec<Token> {
    let total: usize = seqs.iter().map(|s| s.as_ref().len() + 1).sum();
    let mut tokens = Vec::with_capacity(total);
    for (i, seq) in seqs.iter().enumerate() {
        if i > 0 {
            tokens.push(SEPARATOR);
        }
        tokens.extend(seq.as_ref().iter().copied().map(token_of));
    }
    tokens
}

/// String form of every known token: the base alphabet plus merged tokens.
///
/// A merged token renders as the concatenation of its pair.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    strings: Vec<Option<String>>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            strings: ALPHABET.iter().map(|s| Some((*s).to_string())).collect(),
        }
    }
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base alphabet extended by `merges`, applied in order.
    pub fn from_merges(merges: &[MergeRecord]) -> Result<Self, OutputError> {
        let mut vocab = Self::new();
        for record in merges {
            vocab.push_merge(record)?;
        }
        Ok(vocab)
    }

    pub fn push_merge(&mut self, record: &MergeRecord) -> Result<(), OutputError> {
        let text = format!(
            "{}{}",
            self.render(record.pair.left())?,
            self.render(record.pair.right())?
        );
        let idx = usize::from(record.token);
        if idx >= self.strings.len() {
            self.strings.resize(idx + 1, None);
        }
        self.strings[idx] = Some(text);
        Ok(())
    }

    pub fn render(&self, token: Token) -> Result<&str, OutputError> {
        self.strings
            .get(usize::from(token))
            .and_then(Option::as_deref)
            .ok_or(OutputError::UnknownToken(token))
    }

    /// Number of rendered tokens.
    pub fn len(&self) -> usize {
        self.strings.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenPair;

    fn record(left: Token, right: Token, token: Token) -> MergeRecord {
        MergeRecord {
            pair_id: 1,
            pair: TokenPair(left, right),
            token,
            freq: 2,
        }
    }

    #[test]
    fn test_encode_joins_with_separator() {
        let tokens = encode_sequences(&["ACG", "TN"]);
        assert_eq!(tokens, vec![7, 8, 9, SEPARATOR, 10, 6]);
    }

    #[test]
    fn test_unknown_and_newline() {
        let tokens = encode_sequences(&["AxC\nG"]);
        assert_eq!(tokens, vec![7, UNK, 8, SEPARATOR, 9]);
        // lower case is not part of the alphabet
        assert_eq!(token_of(b'a'), UNK);
        let raw: [&[u8]; 2] = [b"A\xffC", b"\x80"];
        assert_eq!(encode_sequences(&raw), vec![7, UNK, 8, SEPARATOR, UNK]);
    }

    #[test]
    fn test_help_tokens_cover_n() {
        assert!(token_of(b'N') < N_HELP_TOKENS);
        assert!(token_of(b'A') >= N_HELP_TOKENS);
        assert_eq!(ALPHABET_SIZE, 11);
    }

    #[test]
    fn test_render_nested_merges() {
        let merges = [record(7, 8, 11), record(11, 11, 12), record(12, 9, 13)];
        let vocab = Vocabulary::from_merges(&merges).expect("merges render");
        assert_eq!(vocab.render(11).expect("token 11 known"), "AC");
        assert_eq!(vocab.render(12).expect("token 12 known"), "ACAC");
        assert_eq!(vocab.render(13).expect("token 13 known"), "ACACG");
        assert_eq!(vocab.len(), 14);
    }

    #[test]
    fn test_render_unknown_token() {
        let vocab = Vocabulary::new();
        match vocab.render(40) {
            Err(OutputError::UnknownToken(40)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(Vocabulary::from_merges(&[record(7, 30, 11)]).is_err());
    }
}
