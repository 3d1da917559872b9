//! Special-token segmentation
//!
//! Special tokens are matched as literal substrings before the input is
//! segmented by the trie. Each special token's occurrences are found
//! leftmost-first without overlap; matches of all special tokens are then
//! merged by start position. If matches of different special tokens overlap,
//! the one starting first wins, and for equal starts the one registered
//! first wins. Registration order is the vocabulary's `special_token_ids`,
//! followed by BOS and EOS.

use std::collections::HashMap;

use super::vocab::{
    TokenId,
    Vocabulary,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Segment<'a> {
    /// A special token, emitted verbatim.
    Special(TokenId),

    /// Ordinary text starting at byte `offset` of the input.
    Text { offset: usize, text: &'a str },
}

#[derive(Clone, Debug, Default)]
pub struct SpecialTokens {
    /// Texts in registration order.
    tokens: Vec<(String, TokenId)>,
    index: HashMap<String, TokenId>,
}

impl SpecialTokens {
    pub fn new(vocab: &Vocabulary) -> Self {
        let mut special_tokens = Self::default();

        for (id, text) in vocab.special_tokens() {
            if text.is_empty() || special_tokens.index.contains_key(text) {
                continue;
            }
            special_tokens.index.insert(text.to_owned(), id);
            special_tokens.tokens.push((text.to_owned(), id));
        }

        special_tokens
    }

    pub fn get(&self, text: &str) -> Option<TokenId> {
        self.index.get(text).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Splits `text` into special tokens and the ordinary text between them.
    pub fn segment<'a>(&self, text: &'a str) -> Vec<Segment<'a>> {
        let mut matches = self
            .tokens
            .iter()
            .flat_map(|(special, id)| {
                text.match_indices(special.as_str())
                    .map(move |(start, matched)| (start, start + matched.len(), *id))
            })
            .collect::<Vec<_>>();

        // stable, so registration order breaks ties
        matches.sort_by_key(|(start, _, _)| *start);

        let mut segments = vec![];
        let mut cursor = 0;

        for (start, end, id) in matches {
            if start < cursor {
                tracing::trace!(start, id, "dropping overlapping special token");
                continue;
            }
            if start > cursor {
                segments.push(Segment::Text {
                    offset: cursor,
                    text: &text[cursor..start],
                });
            }
            segments.push(Segment::Special(id));
            cursor = end;
        }

        if cursor < text.len() {
            segments.push(Segment::Text {
                offset: cursor,
                text: &text[cursor..],
            });
        }

        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::vocab::VocabularyFile;

    fn special_tokens(tokens: &[&str], special: &[TokenId]) -> SpecialTokens {
        let vocab = Vocabulary::try_from(VocabularyFile {
            tokens: tokens.iter().map(|token| token.to_string()).collect(),
            special_token_ids: special.to_vec(),
            ..Default::default()
        })
        .unwrap();
        SpecialTokens::new(&vocab)
    }

    #[test]
    fn it_splits_around_special_tokens() {
        let special = special_tokens(&["<s>", "</s>", "a"], &[0, 1]);
        assert_eq!(special.get("</s>"), Some(1));
        assert_eq!(
            special.segment("<s>hi</s><s>"),
            [
                Segment::Special(0),
                Segment::Text {
                    offset: 3,
                    text: "hi"
                },
                Segment::Special(1),
                Segment::Special(0),
            ]
        );
        assert_eq!(
            special.segment("plain"),
            [Segment::Text {
                offset: 0,
                text: "plain"
            }]
        );
        assert!(special.segment("").is_empty());
    }

    #[test]
    fn it_resolves_overlaps_by_start_then_registration() {
        // "<a>" and "<a>b" both start at 1, "b>" starts inside "<a>b"
        let special = special_tokens(&["b>", "<a>b", "<a>"], &[2, 1, 0]);
        assert_eq!(
            special.segment("x<a>b>"),
            [
                Segment::Text {
                    offset: 0,
                    text: "x"
                },
                Segment::Special(2),
                Segment::Special(0),
            ]
        );
    }

    #[test]
    fn it_ignores_empty_special_tokens() {
        let special = special_tokens(&["", "a"], &[0]);
        assert!(special.is_empty());
    }
}
