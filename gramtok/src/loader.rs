//! Asynchronous vocabulary loading
//!
//! See: [`TokenizerLoader`]

use std::{
    future::Future,
    panic::resume_unwind,
    path::Path,
    pin::Pin,
    task::{
        Context,
        Poll,
    },
};

use crate::{
    tokenizer::{
        Tokenizer,
        Vocabulary,
    },
    Error,
};

/// Loads a vocabulary file on the blocking thread pool and builds a
/// [`Tokenizer`] from it.
///
/// # Example
///
/// ```no_run
/// # use gramtok::{loader::TokenizerLoader, Error};
/// # #[tokio::main]
/// # async fn main() -> Result<(), Error> {
/// let tokenizer = TokenizerLoader::load("vocab.json").await?;
/// println!("{} tokens", tokenizer.n_vocab());
/// # Ok(())
/// # }
/// ```
pub struct TokenizerLoader {
    join_handle: tokio::task::JoinHandle<Result<Tokenizer, Error>>,
}

impl TokenizerLoader {
    /// Start loading the vocabulary file.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_owned();

        let join_handle = tokio::task::spawn_blocking(move || -> Result<Tokenizer, Error> {
            let _guard =
                tracing::debug_span!("tokenizer loader", path = %path.display()).entered();
            let vocab = Vocabulary::load(&path)?;
            Ok(Tokenizer::new(vocab))
        });

        Self { join_handle }
    }

    /// Waits until the tokenizer is ready.
    pub async fn wait_for_tokenizer(self) -> Result<Tokenizer, Error> {
        self.await
    }
}

impl Future for TokenizerLoader {
    type Output = Result<Tokenizer, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.join_handle).poll(cx).map(|result| {
            match result {
                Ok(result) => result,
                Err(error) => {
                    match error.try_into_panic() {
                        Ok(panic) => resume_unwind(panic),
                        Err(error) => {
                            Err(std::io::Error::new(std::io::ErrorKind::Interrupted, error).into())
                        }
                    }
                }
            }
        })
    }
}

/// Loads just the vocabulary, without building a trie.
pub async fn load_vocabulary(path: impl AsRef<Path>) -> Result<Vocabulary, Error> {
    let path = path.as_ref().to_owned();
    let vocab = tokio::task::spawn_blocking(move || Vocabulary::load(path))
        .await
        .map_err(|error| std::io::Error::new(std::io::ErrorKind::Interrupted, error))??;
    Ok(vocab)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn vocab_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("gramtok-{}-{name}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"tokens": ["<s>", "</s>", "a", "b", "ab"], "bos_token_id": 0, "eos_token_id": 1}"#,
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn it_loads_a_tokenizer() {
        let path = vocab_file("tokenizer");
        let tokenizer = TokenizerLoader::load(&path).await.unwrap();
        assert_eq!(tokenizer.n_vocab(), 5);
        assert_eq!(tokenizer.vocab().bos(), Some(0));
        assert_eq!(tokenizer.compress("abab", None).tokens, [4, 4]);
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn it_loads_a_vocabulary() {
        let path = vocab_file("vocabulary");
        let vocab = load_vocabulary(&path).await.unwrap();
        assert_eq!(vocab.token(4), Some("ab"));
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn it_fails_on_missing_files() {
        let result = TokenizerLoader::load("/nonexistent/vocab.json")
            .wait_for_tokenizer()
            .await;
        assert!(matches!(
            result,
            Err(Error::Tokenizer(crate::tokenizer::Error::Io(_)))
        ));
    }
}
