#![cfg_attr(docsrs, feature(doc_cfg))]

//! Grammar combinators for constrained decoding, and a nondeterministic trie
//! tokenizer.
//!
//! The [`grammar`] module lets you declare grammars as Rust values and
//! compile them into the BNF-like notation used by constrained-decoding
//! engines. The [`tokenizer`] module tokenizes text with a vocabulary, picking
//! one of the matching tokens at every position by a configurable strategy.
//!
//! # Features
//!
//!  - `grammar` (default): the grammar compiler and the grammar-notation
//!    parser.
//!  - `runtime-tokio`: the [`loader`] module, for loading vocabularies
//!    without blocking the [Tokio][1] runtime.
//!
//! # Example
//!
//! ```
//! # use gramtok::{choice, seq, grammar::ast::{Grammar, range}, tokenizer::{Tokenizer, Vocabulary}, Error};
//! # fn main() -> Result<(), Error> {
//! let grammar = Grammar::new()
//!     .rule_with("root", |refs| choice!["yes", "no", refs.get("number")])
//!     .rule_with("number", |_| range('0', '9').repeat1());
//! assert_eq!(
//!     grammar.compile(&Default::default())?,
//!     "root ::= (\"yes\" | \"no\" | number)\nnumber ::= [0-9]+",
//! );
//!
//! let tokenizer = Tokenizer::new(Vocabulary::new(["y", "e", "s", "ye", "yes"]));
//! let tokenization = tokenizer.compress("yesyes", None);
//! assert_eq!(tokenization.tokens, [4, 4]);
//! # Ok(())
//! # }
//! ```
//!
//! [1]: https://tokio.rs/

#[cfg_attr(docsrs, doc(cfg(feature = "grammar")))]
#[cfg(feature = "grammar")]
pub mod grammar;
#[cfg_attr(docsrs, doc(cfg(feature = "runtime-tokio")))]
#[cfg(feature = "runtime-tokio")]
pub mod loader;
pub mod tokenizer;
#[cfg(feature = "grammar")]
mod utils;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "grammar")]
    #[error("grammar error")]
    Grammar(#[from] crate::grammar::Error),

    #[error("tokenizer error")]
    Tokenizer(#[from] crate::tokenizer::Error),
}
