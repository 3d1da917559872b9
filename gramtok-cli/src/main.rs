use std::{
    io::{
        stdin,
        Read,
    },
    path::PathBuf,
};

use color_eyre::eyre::{
    bail,
    Error,
};
use gramtok::{
    grammar::CompilerOptions,
    loader::TokenizerLoader,
    tokenizer::{
        Strategy,
        TokenId,
        TokenizeOptions,
        Tokenization,
        Tokenizer,
    },
};
use itertools::Itertools;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
enum Args {
    /// Compiles or re-emits a grammar file.
    Grammar {
        path: PathBuf,

        /// Prefix for all production names, e.g. to concatenate grammars.
        #[structopt(short, long)]
        prefix: Option<String>,

        /// Substitute references with the referenced rule.
        #[structopt(short, long)]
        inline: bool,

        /// Escape quotes, backslashes and control characters.
        #[structopt(short, long)]
        escape: bool,

        /// Only check that all references can be resolved, with the given
        /// prefix and inline mode.
        #[structopt(long)]
        check: bool,
    },
    Tokenize {
        #[structopt(short, long, env = "GRAMTOK_VOCAB")]
        vocab: PathBuf,

        #[structopt(short, long, default_value = "random")]
        strategy: Strategy,

        #[structopt(long, default_value = "4.0")]
        ideal_length: f64,

        #[structopt(long)]
        seed: Option<u64>,

        #[structopt(long)]
        bos: bool,

        #[structopt(long)]
        eos: bool,

        /// Don't match special tokens in the input.
        #[structopt(long)]
        no_special: bool,

        /// Text to tokenize. Read from stdin if omitted.
        text: Option<String>,
    },
    Detokenize {
        #[structopt(short, long, env = "GRAMTOK_VOCAB")]
        vocab: PathBuf,

        ids: Vec<TokenId>,
    },
    /// Tokenizes with the longest tokens, or by compression factor or
    /// gradient.
    Compress {
        #[structopt(short, long, env = "GRAMTOK_VOCAB")]
        vocab: PathBuf,

        /// Compression factor between 0 (shortest tokens) and 1 (longest
        /// tokens).
        #[structopt(short, long, conflicts_with = "gradient")]
        factor: Option<f64>,

        /// Length bias between -1 (short tokens) and 1 (long tokens).
        #[structopt(short, long, allow_hyphen_values = true)]
        gradient: Option<f64>,

        #[structopt(long)]
        seed: Option<u64>,

        text: Option<String>,
    },
    /// Compares the shortest and longest tokenization.
    Compare {
        #[structopt(short, long, env = "GRAMTOK_VOCAB")]
        vocab: PathBuf,

        #[structopt(long)]
        seed: Option<u64>,

        text: Option<String>,
    },
    PrintVocab {
        #[structopt(short, long, env = "GRAMTOK_VOCAB")]
        vocab: PathBuf,
    },
}

impl Args {
    pub async fn run(self) -> Result<(), Error> {
        match self {
            Self::Grammar {
                path,
                prefix,
                inline,
                escape,
                check,
            } => {
                let options = CompilerOptions {
                    inline,
                    name_prefix: prefix,
                    escape_literals: escape,
                };

                if check {
                    let source = tokio::fs::read_to_string(&path).await?;
                    gramtok::grammar::parse(&source)?.check_with(&options)?;
                    println!("ok");
                }
                else {
                    let output = gramtok::grammar::compile_from_source(&path, &options)?;
                    println!("{output}");
                }
            }
            Self::Tokenize {
                vocab,
                strategy,
                ideal_length,
                seed,
                bos,
                eos,
                no_special,
                text,
            } => {
                let tokenizer = TokenizerLoader::load(&vocab).await?;
                let text = read_text(text)?;

                let options = TokenizeOptions {
                    strategy,
                    ideal_length,
                    seed,
                    add_bos: bos,
                    add_eos: eos,
                    preserve_special_tokens: !no_special,
                };

                let tokenization = tokenizer.tokenize(&text, &options);
                print_tokenization(&tokenizer, &tokenization);
            }
            Self::Detokenize { vocab, ids } => {
                let tokenizer = TokenizerLoader::load(&vocab).await?;
                println!("{}", tokenizer.detokenize(&ids));
            }
            Self::Compress {
                vocab,
                factor,
                gradient,
                seed,
                text,
            } => {
                let tokenizer = TokenizerLoader::load(&vocab).await?;
                let text = read_text(text)?;

                let tokenization = match (factor, gradient) {
                    (Some(factor), None) => tokenizer.compress_with_factor(&text, factor, seed),
                    (None, Some(gradient)) => {
                        tokenizer.compress_with_gradient(&text, gradient, seed)
                    }
                    (None, None) => tokenizer.compress(&text, seed),
                    (Some(_), Some(_)) => bail!("--factor and --gradient are mutually exclusive"),
                };

                print_tokenization(&tokenizer, &tokenization);
            }
            Self::Compare { vocab, seed, text } => {
                let tokenizer = TokenizerLoader::load(&vocab).await?;
                let text = read_text(text)?;

                let comparison = tokenizer.compare_compression(&text, seed);
                println!(
                    "most compressed:  {} tokens",
                    comparison.most_compressed.len()
                );
                println!(
                    "least compressed: {} tokens",
                    comparison.least_compressed.len()
                );
                println!("ratio:            {:.3}", comparison.ratio);
            }
            Self::PrintVocab { vocab } => {
                let tokenizer = TokenizerLoader::load(&vocab).await?;
                let vocab = tokenizer.vocab();

                for (id, token) in vocab.tokens() {
                    if vocab.is_special(id) {
                        println!("{id} = {token:?} (special)");
                    }
                    else {
                        println!("{id} = {token:?}");
                    }
                }
            }
        }

        Ok(())
    }
}

fn read_text(text: Option<String>) -> Result<String, Error> {
    match text {
        Some(text) => Ok(text),
        None => {
            let mut text = String::new();
            stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn print_tokenization(tokenizer: &Tokenizer, tokenization: &Tokenization) {
    println!("{}", tokenization.tokens.iter().join(" "));

    if !tokenization.is_lossless() {
        tracing::warn!(
            uncovered = tokenization.uncovered.len(),
            "some characters could not be tokenized"
        );
    }

    tracing::debug!(
        pieces = ?tokenization
            .tokens
            .iter()
            .filter_map(|id| tokenizer.token(*id))
            .collect_vec(),
    );
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let args = Args::from_args();
    args.run().await?;

    Ok(())
}
