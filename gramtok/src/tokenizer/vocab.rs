//! Token vocabulary
//!
//! A vocabulary is an ordered list of token strings. A token's index in that
//! list is its [`TokenId`]. Vocabularies are usually loaded from a JSON file
//! that was extracted from a model file:
//!
//! ```json
//! {
//!   "tokens": ["<s>", "</s>", "a", "b", "ab"],
//!   "bos_token_id": 0,
//!   "eos_token_id": 1,
//!   "special_token_ids": [0, 1],
//!   "model_type": "llama"
//! }
//! ```
//!
//! Only `tokens` is required.

use std::{
    collections::{
        HashMap,
        HashSet,
    },
    fs::File,
    io::{
        BufReader,
        Read,
    },
    path::Path,
};

use itertools::{
    Itertools,
    MinMaxResult,
};
use serde::{
    Deserialize,
    Serialize,
};

use super::Error;

pub type TokenId = u32;

/// On-disk representation of a vocabulary.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VocabularyFile {
    pub tokens: Vec<String>,

    #[serde(default)]
    pub merges: Vec<String>,

    pub bos_token_id: Option<TokenId>,

    pub eos_token_id: Option<TokenId>,

    pub model_type: Option<String>,

    #[serde(default)]
    pub special_token_ids: Vec<TokenId>,
}

#[derive(Clone, Debug)]
pub struct Vocabulary {
    tokens: Vec<String>,
    ids: HashMap<String, TokenId>,
    merges: Vec<String>,
    model_type: Option<String>,
    bos: Option<TokenId>,
    eos: Option<TokenId>,

    /// Special tokens in registration order: explicit special tokens first,
    /// then BOS and EOS.
    special: Vec<TokenId>,
    special_set: HashSet<TokenId>,
}

impl Vocabulary {
    /// Creates a vocabulary without any special tokens.
    pub fn new<S: Into<String>>(tokens: impl IntoIterator<Item = S>) -> Self {
        Self::build(VocabularyFile {
            tokens: tokens.into_iter().map(Into::into).collect(),
            ..Default::default()
        })
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        let file: VocabularyFile = serde_json::from_str(json)?;
        file.try_into()
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, Error> {
        let file: VocabularyFile = serde_json::from_reader(reader)?;
        file.try_into()
    }

    /// Loads a vocabulary file. This method is blocking. If you want to load
    /// the vocabulary asynchronously, use
    /// [`load_vocabulary`](crate::loader::load_vocabulary).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        tracing::debug!("loading vocabulary: {}", path.display());
        let reader = BufReader::new(File::open(path)?);
        Self::from_reader(reader)
    }

    fn build(file: VocabularyFile) -> Self {
        let mut ids = HashMap::with_capacity(file.tokens.len());
        for (id, token) in file.tokens.iter().enumerate() {
            // duplicates resolve to the first id
            ids.entry(token.clone()).or_insert(id as TokenId);
        }

        let mut special = vec![];
        let mut special_set = HashSet::new();
        for id in file
            .special_token_ids
            .iter()
            .chain(&file.bos_token_id)
            .chain(&file.eos_token_id)
        {
            if special_set.insert(*id) {
                special.push(*id);
            }
        }

        Self {
            tokens: file.tokens,
            ids,
            merges: file.merges,
            model_type: file.model_type,
            bos: file.bos_token_id,
            eos: file.eos_token_id,
            special,
            special_set,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Returns the text of a token, or `None` if the id is out of range.
    pub fn token(&self, id: TokenId) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    /// Returns the id of the token with exactly this text.
    pub fn token_id(&self, text: &str) -> Option<TokenId> {
        self.ids.get(text).copied()
    }

    pub fn tokens(&self) -> impl Iterator<Item = (TokenId, &str)> {
        self.tokens
            .iter()
            .enumerate()
            .map(|(id, token)| (id as TokenId, token.as_str()))
    }

    pub fn bos(&self) -> Option<TokenId> {
        self.bos
    }

    pub fn eos(&self) -> Option<TokenId> {
        self.eos
    }

    pub fn is_special(&self, id: TokenId) -> bool {
        self.special_set.contains(&id)
    }

    /// Special tokens with their text, in registration order.
    pub fn special_tokens(&self) -> impl Iterator<Item = (TokenId, &str)> {
        self.special
            .iter()
            .filter_map(|id| self.token(*id).map(|text| (*id, text)))
    }

    pub fn merges(&self) -> &[String] {
        &self.merges
    }

    pub fn model_type(&self) -> Option<&str> {
        self.model_type.as_deref()
    }

    /// Shortest and longest non-empty token length in characters, looking at
    /// the first `sample_size` tokens only.
    pub fn token_length_bounds(&self, sample_size: usize) -> Option<(usize, usize)> {
        let lengths = self
            .tokens
            .iter()
            .take(sample_size)
            .map(|token| token.chars().count())
            .filter(|length| *length > 0);

        match lengths.minmax() {
            MinMaxResult::NoElements => None,
            MinMaxResult::OneElement(length) => Some((length, length)),
            MinMaxResult::MinMax(min, max) => Some((min, max)),
        }
    }
}

impl TryFrom<VocabularyFile> for Vocabulary {
    type Error = Error;

    fn try_from(file: VocabularyFile) -> Result<Self, Error> {
        let n_vocab = file.tokens.len();

        for id in file
            .special_token_ids
            .iter()
            .chain(&file.bos_token_id)
            .chain(&file.eos_token_id)
        {
            if *id as usize >= n_vocab {
                return Err(Error::InvalidTokenId { id: *id, n_vocab });
            }
        }

        Ok(Self::build(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_loads_vocabulary_json() {
        let vocab = Vocabulary::from_json(
            r#"{
                "tokens": ["<s>", "</s>", "a", "b", "ab", "a"],
                "merges": ["a b"],
                "bos_token_id": 0,
                "eos_token_id": 1,
                "special_token_ids": [1],
                "model_type": "llama"
            }"#,
        )
        .unwrap();

        assert_eq!(vocab.len(), 6);
        assert_eq!(vocab.token(4), Some("ab"));
        assert_eq!(vocab.token(6), None);
        assert_eq!(vocab.token_id("a"), Some(2));
        assert_eq!(vocab.token_id("c"), None);
        assert_eq!(vocab.bos(), Some(0));
        assert_eq!(vocab.eos(), Some(1));
        assert_eq!(vocab.merges(), ["a b"]);
        assert_eq!(vocab.model_type(), Some("llama"));
        assert!(vocab.is_special(0));
        assert!(!vocab.is_special(2));
        assert_eq!(
            vocab.special_tokens().collect::<Vec<_>>(),
            [(1, "</s>"), (0, "<s>")]
        );
    }

    #[test]
    fn it_requires_tokens() {
        assert!(matches!(
            Vocabulary::from_json(r#"{"bos_token_id": 0}"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn it_rejects_out_of_range_special_ids() {
        assert!(matches!(
            Vocabulary::from_json(r#"{"tokens": ["a"], "eos_token_id": 1}"#),
            Err(Error::InvalidTokenId { id: 1, n_vocab: 1 })
        ));
    }

    #[test]
    fn it_samples_token_lengths() {
        let vocab = Vocabulary::new(["", "a", "abc", "abcdefgh"]);
        assert_eq!(vocab.token_length_bounds(3), Some((1, 3)));
        assert_eq!(vocab.token_length_bounds(100), Some((1, 8)));
        assert_eq!(Vocabulary::new(Vec::<String>::new()).token_length_bounds(10), None);
    }
}
