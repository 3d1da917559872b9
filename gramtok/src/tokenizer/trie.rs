//! Prefix tree over the vocabulary
//!
//! Special tokens are left out. They are only ever matched as whole
//! literals by [`SpecialTokens`](super::special::SpecialTokens), so they
//! can't appear in the middle of ordinary text.

use std::collections::HashMap;

use super::vocab::{
    TokenId,
    Vocabulary,
};

/// A token that matches the input at some position.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub token: TokenId,

    /// Matched length in characters.
    pub length: usize,

    /// The matched part of the input.
    pub text: &'a str,
}

#[derive(Debug, Default)]
struct Node {
    children: HashMap<char, usize>,
    tokens: Vec<TokenId>,
}

/// Immutable prefix tree. Nodes are stored in a flat arena, the root is at
/// index 0.
#[derive(Debug)]
pub struct Trie {
    nodes: Vec<Node>,
}

impl Trie {
    pub fn new(vocab: &Vocabulary) -> Self {
        let mut nodes = vec![Node::default()];

        for (id, token) in vocab.tokens() {
            // the empty token can never be matched
            if token.is_empty() || vocab.is_special(id) {
                continue;
            }

            let mut index = 0;
            for c in token.chars() {
                index = match nodes[index].children.get(&c) {
                    Some(child) => *child,
                    None => {
                        let child = nodes.len();
                        nodes.push(Node::default());
                        nodes[index].children.insert(c, child);
                        child
                    }
                };
            }
            nodes[index].tokens.push(id);
        }

        tracing::debug!(nodes = nodes.len(), "built trie");

        Self { nodes }
    }

    /// Finds all tokens that match `text` starting at byte offset `start`,
    /// shortest first. Returns nothing if `start` is out of bounds or not on a
    /// char boundary.
    pub fn find_valid_tokens<'a>(&self, text: &'a str, start: usize) -> Vec<Candidate<'a>> {
        let mut candidates = vec![];

        let Some(rest) = text.get(start..)
        else {
            return candidates;
        };

        let mut index = 0;
        for (length, (offset, c)) in rest.char_indices().enumerate() {
            let Some(child) = self.nodes[index].children.get(&c)
            else {
                break;
            };
            index = *child;

            let end = offset + c.len_utf8();
            for token in &self.nodes[index].tokens {
                candidates.push(Candidate {
                    token: *token,
                    length: length + 1,
                    text: &rest[..end],
                });
            }
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie() -> Trie {
        Trie::new(&Vocabulary::new(["a", "b", "ab", "abc", "ä", "äb", "", "ab"]))
    }

    #[test]
    fn it_finds_all_prefixes() {
        let candidates = trie().find_valid_tokens("abcd", 0);
        let found = candidates
            .iter()
            .map(|candidate| (candidate.token, candidate.length, candidate.text))
            .collect::<Vec<_>>();
        assert_eq!(found, [(0, 1, "a"), (2, 2, "ab"), (7, 2, "ab"), (3, 3, "abc")]);
    }

    #[test]
    fn it_starts_at_offsets() {
        let text = "xäb";
        let candidates = trie().find_valid_tokens(text, 1);
        assert_eq!(
            candidates,
            [
                Candidate {
                    token: 4,
                    length: 1,
                    text: "ä"
                },
                Candidate {
                    token: 5,
                    length: 2,
                    text: "äb"
                },
            ]
        );
    }

    #[test]
    fn it_leaves_out_special_tokens() {
        let vocab = crate::tokenizer::vocab::VocabularyFile {
            tokens: vec!["<s>".to_owned(), "<".to_owned()],
            special_token_ids: vec![0],
            ..Default::default()
        };
        let trie = Trie::new(&Vocabulary::try_from(vocab).unwrap());
        let candidates = trie.find_valid_tokens("<s>", 0);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].token, 1);
    }

    #[test]
    fn it_returns_nothing_without_coverage() {
        let trie = trie();
        assert!(trie.find_valid_tokens("xyz", 0).is_empty());
        assert!(trie.find_valid_tokens("ab", 2).is_empty());
        assert!(trie.find_valid_tokens("äb", 1).is_empty());
    }
}
