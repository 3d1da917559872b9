//! Nondeterministic trie tokenizer
//!
//! Unlike a BPE tokenizer, which produces exactly one tokenization for a
//! text, this tokenizer enumerates every vocabulary token that matches at the
//! current position and picks one according to a [`Strategy`]. This way the
//! same text can be tokenized in many different ways, e.g. to produce as few
//! tokens as possible ([`Tokenizer::compress`]), or random tokenizations that
//! still decode to the same text.
//!
//! Segmentation is a single greedy pass from left to right. No backtracking
//! is done, so the result is not globally optimal.
//!
//! # Example
//!
//! ```
//! # use gramtok::tokenizer::{Strategy, TokenizeOptions, Tokenizer, Vocabulary};
//! let tokenizer = Tokenizer::new(Vocabulary::new(["a", "b", "ab"]));
//!
//! let options = TokenizeOptions {
//!     strategy: Strategy::Longest,
//!     ..Default::default()
//! };
//! let tokenization = tokenizer.tokenize("abab", &options);
//! assert_eq!(tokenization.tokens, [2, 2]);
//! assert_eq!(tokenizer.detokenize(&tokenization.tokens), "abab");
//! ```

pub mod compression;
pub mod special;
pub mod strategy;
pub mod trie;
pub mod vocab;

use std::path::Path;

use derivative::Derivative;
use rand::{
    rngs::StdRng,
    Rng,
    RngCore,
    SeedableRng,
};
use serde::{
    Deserialize,
    Serialize,
};

pub use self::{
    compression::{
        CompressionComparison,
        SelectiveRange,
    },
    strategy::Strategy,
    trie::Candidate,
    vocab::{
        TokenId,
        Vocabulary,
        VocabularyFile,
    },
};
use self::{
    special::{
        Segment,
        SpecialTokens,
    },
    strategy::DEFAULT_IDEAL_LENGTH,
    trie::Trie,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("invalid vocabulary file")]
    Json(#[from] serde_json::Error),

    #[error("token id {id} is out of range for a vocabulary of {n_vocab} tokens")]
    InvalidTokenId { id: TokenId, n_vocab: usize },

    #[error("{start}..{end} is not a valid range of the input")]
    InvalidRange { start: usize, end: usize },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizeOptions {
    pub strategy: Strategy,

    /// Target token length (in characters) for [`Strategy::IdealLength`].
    pub ideal_length: f64,

    /// Seed for the random number generator. Calls with the same seed and
    /// input produce the same tokens.
    pub seed: Option<u64>,

    /// Prepend the BOS token, if the vocabulary has one.
    pub add_bos: bool,

    /// Append the EOS token, if the vocabulary has one.
    pub add_eos: bool,

    /// Match special tokens in the input as atomic tokens.
    pub preserve_special_tokens: bool,
}

impl Default for TokenizeOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            ideal_length: DEFAULT_IDEAL_LENGTH,
            seed: None,
            add_bos: false,
            add_eos: false,
            preserve_special_tokens: true,
        }
    }
}

/// Result of a tokenization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tokenization {
    pub tokens: Vec<TokenId>,

    /// Byte offsets of input characters no token could cover. These were
    /// skipped, so the tokens don't decode to the input anymore.
    pub uncovered: Vec<usize>,
}

impl Tokenization {
    /// Whether the tokens decode back to the input.
    pub fn is_lossless(&self) -> bool {
        self.uncovered.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Runs `f` with a generator seeded from `seed`, or with the thread-local
/// generator if there is no seed.
pub(crate) fn with_rng<T>(seed: Option<u64>, f: impl FnOnce(&mut dyn RngCore) -> T) -> T {
    match seed {
        Some(seed) => f(&mut StdRng::seed_from_u64(seed)),
        None => f(&mut rand::thread_rng()),
    }
}

/// A vocabulary together with its trie and special-token index.
///
/// Immutable after construction, so it can be shared between threads.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Tokenizer {
    vocab: Vocabulary,
    #[derivative(Debug = "ignore")]
    trie: Trie,
    special: SpecialTokens,
}

impl Tokenizer {
    pub fn new(vocab: Vocabulary) -> Self {
        let trie = Trie::new(&vocab);
        let special = SpecialTokens::new(&vocab);
        tracing::debug!(n_vocab = vocab.len(), "created tokenizer");
        Self {
            vocab,
            trie,
            special,
        }
    }

    /// Loads the vocabulary from a file. This method is blocking.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        Ok(Self::new(Vocabulary::load(path)?))
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn n_vocab(&self) -> usize {
        self.vocab.len()
    }

    pub fn token(&self, id: TokenId) -> Option<&str> {
        self.vocab.token(id)
    }

    pub fn token_id(&self, text: &str) -> Option<TokenId> {
        self.vocab.token_id(text)
    }

    pub fn special_token_id(&self, text: &str) -> Option<TokenId> {
        self.special.get(text)
    }

    /// All tokens matching `text` at byte offset `start`, shortest first.
    pub fn find_valid_tokens<'a>(&self, text: &'a str, start: usize) -> Vec<Candidate<'a>> {
        self.trie.find_valid_tokens(text, start)
    }

    pub fn tokenize(&self, text: &str, options: &TokenizeOptions) -> Tokenization {
        with_rng(options.seed, |rng| self.tokenize_with_rng(text, options, rng))
    }

    /// Like [`Tokenizer::tokenize`], but draws from `rng` instead of the
    /// generator selected by [`TokenizeOptions::seed`].
    pub fn tokenize_with_rng<R: Rng + ?Sized>(
        &self,
        text: &str,
        options: &TokenizeOptions,
        rng: &mut R,
    ) -> Tokenization {
        let mut tokenization = Tokenization::default();

        self.push_bos(options, &mut tokenization);
        self.push_text(
            text,
            0,
            options.preserve_special_tokens,
            &mut tokenization,
            &mut |candidates| {
                options
                    .strategy
                    .select(candidates, options.ideal_length, &mut *rng)
                    .copied()
            },
        );
        self.push_eos(options, &mut tokenization);

        tokenization
    }

    /// Concatenates the token texts. Unknown ids contribute nothing.
    pub fn detokenize(&self, tokens: &[TokenId]) -> String {
        let mut output = String::new();
        for id in tokens {
            match self.vocab.token(*id) {
                Some(text) => output.push_str(text),
                None => tracing::debug!(id, "skipping unknown token"),
            }
        }
        output
    }

    fn push_bos(&self, options: &TokenizeOptions, tokenization: &mut Tokenization) {
        if options.add_bos {
            match self.vocab.bos() {
                Some(bos) => tokenization.tokens.push(bos),
                None => tracing::warn!("vocabulary has no BOS token"),
            }
        }
    }

    fn push_eos(&self, options: &TokenizeOptions, tokenization: &mut Tokenization) {
        if options.add_eos {
            match self.vocab.eos() {
                Some(eos) => tokenization.tokens.push(eos),
                None => tracing::warn!("vocabulary has no EOS token"),
            }
        }
    }

    /// Tokenizes `text`, which starts at byte `base` of the caller's input,
    /// and appends the tokens to `tokenization`.
    fn push_text<'a>(
        &self,
        text: &'a str,
        base: usize,
        preserve_special_tokens: bool,
        tokenization: &mut Tokenization,
        select: &mut impl FnMut(&[Candidate<'a>]) -> Option<Candidate<'a>>,
    ) {
        if !preserve_special_tokens || self.special.is_empty() {
            self.push_segment(text, base, tokenization, select);
            return;
        }

        for segment in self.special.segment(text) {
            match segment {
                Segment::Special(id) => tokenization.tokens.push(id),
                Segment::Text { offset, text } => {
                    self.push_segment(text, base + offset, tokenization, select)
                }
            }
        }
    }

    fn push_segment<'a>(
        &self,
        text: &'a str,
        base: usize,
        tokenization: &mut Tokenization,
        select: &mut impl FnMut(&[Candidate<'a>]) -> Option<Candidate<'a>>,
    ) {
        tracing::trace!(base, len = text.len(), "tokenizing segment");

        let mut position = 0;
        while position < text.len() {
            let candidates = self.trie.find_valid_tokens(text, position);

            match select(&candidates) {
                Some(candidate) => {
                    tokenization.tokens.push(candidate.token);
                    position += candidate.text.len();
                }
                None => {
                    let c = text[position..].chars().next().unwrap_or_default();
                    tracing::warn!(
                        offset = base + position,
                        character = ?c,
                        "no token covers character, skipping it"
                    );
                    tokenization.uncovered.push(base + position);
                    position += c.len_utf8();
                }
            }
        }
    }
}
