//! Text compression presets
//!
//! All of these are built on the same segmentation as
//! [`Tokenizer::tokenize`], they only differ in how a candidate is picked at
//! each position.

use std::ops::Range;

use rand::Rng;

use super::{
    strategy::log_weighted_choice,
    with_rng,
    Error,
    Strategy,
    TokenizeOptions,
    Tokenization,
    Tokenizer,
};

/// Number of vocabulary entries looked at to find the shortest and longest
/// token length.
pub const VOCAB_SAMPLE_SIZE: usize = 1000;

/// Result of [`Tokenizer::compare_compression`].
#[derive(Clone, Debug, PartialEq)]
pub struct CompressionComparison {
    /// Tokenization with the longest tokens.
    pub most_compressed: Tokenization,

    /// Tokenization with the shortest tokens.
    pub least_compressed: Tokenization,

    /// `least_compressed.len() / most_compressed.len()`, or `1.0` for empty
    /// input.
    pub ratio: f64,
}

/// A byte range of the input that is tokenized with its own strategy.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectiveRange {
    pub range: Range<usize>,
    pub strategy: Strategy,
    pub ideal_length: f64,
}

impl SelectiveRange {
    pub fn new(range: Range<usize>, strategy: Strategy) -> Self {
        Self {
            range,
            strategy,
            ideal_length: super::strategy::DEFAULT_IDEAL_LENGTH,
        }
    }
}

impl Tokenizer {
    /// Tokenizes with the longest tokens, i.e. as few tokens as possible for
    /// a greedy tokenizer.
    pub fn compress(&self, text: &str, seed: Option<u64>) -> Tokenization {
        self.tokenize(
            text,
            &TokenizeOptions {
                strategy: Strategy::Longest,
                seed,
                ..Default::default()
            },
        )
    }

    /// Ideal length for [`Tokenizer::compress_with_factor`], interpolated
    /// between the shortest (`0.0`) and longest (`1.0`) token length.
    pub fn ideal_length_for_factor(&self, factor: f64) -> f64 {
        let factor = factor.clamp(0.0, 1.0);
        let (min, max) = self
            .vocab
            .token_length_bounds(VOCAB_SAMPLE_SIZE)
            .unwrap_or((1, 1));
        min as f64 + factor * (max - min) as f64
    }

    /// Tokenizes with [`Strategy::IdealLength`], with the ideal length
    /// derived from a compression factor in `[0, 1]`.
    pub fn compress_with_factor(&self, text: &str, factor: f64, seed: Option<u64>) -> Tokenization {
        let ideal_length = self.ideal_length_for_factor(factor);
        tracing::debug!(factor, ideal_length, "compressing with factor");

        self.tokenize(
            text,
            &TokenizeOptions {
                strategy: Strategy::IdealLength,
                ideal_length,
                seed,
                ..Default::default()
            },
        )
    }

    /// Tokenizes with candidates weighted by `exp(2 * gradient * length)`.
    ///
    /// A `gradient` of `1.0` strongly prefers long tokens, `-1.0` strongly
    /// prefers short tokens, and `0.0` is uniform. The gradient is clamped to
    /// `[-1, 1]`.
    pub fn compress_with_gradient(
        &self,
        text: &str,
        gradient: f64,
        seed: Option<u64>,
    ) -> Tokenization {
        with_rng(seed, |rng| self.compress_with_gradient_with_rng(text, gradient, rng))
    }

    pub fn compress_with_gradient_with_rng<R: Rng + ?Sized>(
        &self,
        text: &str,
        gradient: f64,
        rng: &mut R,
    ) -> Tokenization {
        let gradient = gradient.clamp(-1.0, 1.0);
        let mut tokenization = Tokenization::default();

        self.push_text(text, 0, true, &mut tokenization, &mut |candidates| {
            log_weighted_choice(candidates, &mut *rng, |candidate| {
                gradient * candidate.length as f64 * 2.0
            })
            .copied()
        });

        tokenization
    }

    /// Tokenizes with the longest and with the shortest tokens.
    pub fn compare_compression(&self, text: &str, seed: Option<u64>) -> CompressionComparison {
        with_rng(seed, |rng| {
            let options = |strategy| {
                TokenizeOptions {
                    strategy,
                    ..Default::default()
                }
            };

            let most_compressed =
                self.tokenize_with_rng(text, &options(Strategy::Longest), &mut *rng);
            let least_compressed =
                self.tokenize_with_rng(text, &options(Strategy::Shortest), &mut *rng);

            let ratio = if most_compressed.is_empty() {
                1.0
            }
            else {
                least_compressed.len() as f64 / most_compressed.len() as f64
            };

            CompressionComparison {
                most_compressed,
                least_compressed,
                ratio,
            }
        })
    }

    /// Tokenizes each of the given byte ranges with its own strategy.
    ///
    /// Parts of the input not covered by any range are tokenized with
    /// `default`'s strategy and ideal length. Ranges are processed in order of
    /// their start; a range overlapping an earlier one is cut to where the
    /// earlier one ends. BOS and EOS are added according to `default`.
    pub fn selective_compress(
        &self,
        text: &str,
        ranges: &[SelectiveRange],
        default: &TokenizeOptions,
    ) -> Result<Tokenization, Error> {
        for SelectiveRange { range, .. } in ranges {
            if range.start > range.end
                || !text.is_char_boundary(range.start)
                || !text.is_char_boundary(range.end)
            {
                return Err(Error::InvalidRange {
                    start: range.start,
                    end: range.end,
                });
            }
        }

        let mut ranges = ranges.iter().collect::<Vec<_>>();
        ranges.sort_by_key(|selective| selective.range.start);

        Ok(with_rng(default.seed, |rng| {
            let mut tokenization = Tokenization::default();
            let mut cursor = 0;

            let mut push = |tokenization: &mut Tokenization,
                            range: Range<usize>,
                            strategy: Strategy,
                            ideal_length: f64| {
                tracing::trace!(?range, %strategy, "tokenizing range");
                self.push_text(
                    &text[range.clone()],
                    range.start,
                    default.preserve_special_tokens,
                    tokenization,
                    &mut |candidates| {
                        strategy
                            .select(candidates, ideal_length, &mut *rng)
                            .copied()
                    },
                );
            };

            self.push_bos(default, &mut tokenization);

            for selective in ranges {
                let start = selective.range.start.max(cursor);
                let end = selective.range.end;
                if start >= end {
                    continue;
                }

                if start > cursor {
                    push(
                        &mut tokenization,
                        cursor..start,
                        default.strategy,
                        default.ideal_length,
                    );
                }
                push(
                    &mut tokenization,
                    start..end,
                    selective.strategy,
                    selective.ideal_length,
                );
                cursor = end;
            }

            if cursor < text.len() {
                push(
                    &mut tokenization,
                    cursor..text.len(),
                    default.strategy,
                    default.ideal_length,
                );
            }

            self.push_eos(default, &mut tokenization);

            tokenization
        }))
    }
}
