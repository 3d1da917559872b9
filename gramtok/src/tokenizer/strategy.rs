//! Candidate selection strategies

use std::{
    fmt,
    str::FromStr,
};

use itertools::Itertools;
use rand::{
    seq::SliceRandom,
    Rng,
};
use serde::{
    Deserialize,
    Serialize,
};

use super::trie::Candidate;

/// Default target length for [`Strategy::IdealLength`].
pub const DEFAULT_IDEAL_LENGTH: f64 = 4.0;

/// How to pick one of the tokens that match at a position.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Any candidate, uniformly.
    #[default]
    Random,

    /// One of the shortest candidates.
    Shortest,

    /// One of the longest candidates.
    Longest,

    /// Weighted towards candidates close to the ideal length.
    IdealLength,
}

impl Strategy {
    /// Selects a candidate. Returns `None` iff there are no candidates.
    pub fn select<'c, 'a, R: Rng + ?Sized>(
        &self,
        candidates: &'c [Candidate<'a>],
        ideal_length: f64,
        rng: &mut R,
    ) -> Option<&'c Candidate<'a>> {
        match self {
            Strategy::Random => candidates.choose(rng),
            Strategy::Shortest => {
                candidates
                    .iter()
                    .min_set_by_key(|candidate| candidate.length)
                    .choose(rng)
                    .copied()
            }
            Strategy::Longest => {
                candidates
                    .iter()
                    .max_set_by_key(|candidate| candidate.length)
                    .choose(rng)
                    .copied()
            }
            Strategy::IdealLength => {
                weighted_choice(candidates, rng, |candidate| {
                    1.0 / (1.0 + (candidate.length as f64 - ideal_length).abs())
                })
            }
        }
    }
}

/// Draws one uniform value in `[0, 1)` and walks the normalized cumulative
/// weights in candidate order until the draw is covered.
pub fn weighted_choice<'c, 'a, R: Rng + ?Sized>(
    candidates: &'c [Candidate<'a>],
    rng: &mut R,
    weight: impl Fn(&Candidate<'a>) -> f64,
) -> Option<&'c Candidate<'a>> {
    let weights = candidates.iter().map(weight).collect::<Vec<_>>();
    choose_by_weights(candidates, &weights, rng)
}

/// Like [`weighted_choice`], but `log_weight` returns the natural logarithm
/// of the weight.
///
/// Weights are shifted by the largest log-weight before exponentiating, so
/// large exponents neither overflow nor underflow to zero.
pub fn log_weighted_choice<'c, 'a, R: Rng + ?Sized>(
    candidates: &'c [Candidate<'a>],
    rng: &mut R,
    log_weight: impl Fn(&Candidate<'a>) -> f64,
) -> Option<&'c Candidate<'a>> {
    let log_weights = candidates.iter().map(log_weight).collect::<Vec<_>>();
    let max = log_weights
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);

    let weights = log_weights
        .iter()
        .map(|log_weight| (log_weight - max).exp())
        .collect::<Vec<_>>();
    choose_by_weights(candidates, &weights, rng)
}

fn choose_by_weights<'c, 'a, R: Rng + ?Sized>(
    candidates: &'c [Candidate<'a>],
    weights: &[f64],
    rng: &mut R,
) -> Option<&'c Candidate<'a>> {
    let total: f64 = weights.iter().sum();

    if !total.is_finite() || total <= 0.0 {
        // NaN weights
        return candidates.choose(rng);
    }

    let draw: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (candidate, weight) in candidates.iter().zip(weights) {
        cumulative += weight / total;
        if draw < cumulative {
            return Some(candidate);
        }
    }

    // rounding error
    candidates.last()
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strategy::Random => "random",
            Strategy::Shortest => "shortest",
            Strategy::Longest => "longest",
            Strategy::IdealLength => "ideal-length",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown strategy '{0}', expected one of: random, shortest, longest, ideal-length")]
pub struct ParseStrategyError(String);

impl FromStr for Strategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Strategy::Random),
            "shortest" => Ok(Strategy::Shortest),
            "longest" => Ok(Strategy::Longest),
            "ideal-length" | "ideal" => Ok(Strategy::IdealLength),
            _ => Err(ParseStrategyError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{
        rngs::StdRng,
        SeedableRng,
    };

    use super::*;

    fn candidates() -> Vec<Candidate<'static>> {
        vec![
            Candidate {
                token: 0,
                length: 1,
                text: "a",
            },
            Candidate {
                token: 1,
                length: 2,
                text: "ab",
            },
            Candidate {
                token: 2,
                length: 2,
                text: "ab",
            },
            Candidate {
                token: 3,
                length: 4,
                text: "abcd",
            },
        ]
    }

    #[test]
    fn it_selects_by_length() {
        let candidates = candidates();
        let mut rng = StdRng::seed_from_u64(1234);

        for _ in 0..20 {
            let shortest = Strategy::Shortest.select(&candidates, 4.0, &mut rng).unwrap();
            assert_eq!(shortest.token, 0);

            let longest = Strategy::Longest.select(&candidates, 4.0, &mut rng).unwrap();
            assert_eq!(longest.token, 3);
        }
    }

    #[test]
    fn it_breaks_ties_randomly() {
        let candidates = candidates()[1..3].to_vec();
        let mut rng = StdRng::seed_from_u64(1234);

        let mut seen = [false; 2];
        for _ in 0..100 {
            let token = Strategy::Shortest.select(&candidates, 4.0, &mut rng).unwrap().token;
            seen[token as usize - 1] = true;
        }
        assert_eq!(seen, [true, true]);
    }

    #[test]
    fn it_prefers_the_ideal_length() {
        let candidates = candidates();
        let mut rng = StdRng::seed_from_u64(1234);

        let mut counts = [0usize; 4];
        for _ in 0..2000 {
            let token = Strategy::IdealLength.select(&candidates, 1.0, &mut rng).unwrap().token;
            counts[token as usize] += 1;
        }

        // weights are 1, 1/2, 1/2, 1/4
        assert!(counts[0] > counts[1]);
        assert!(counts[0] > counts[3] * 2);
        assert!(counts.iter().all(|count| *count > 0));
    }

    #[test]
    fn it_keeps_the_bias_for_huge_log_weights() {
        let long = "a".repeat(400);
        let candidates = [
            Candidate {
                token: 0,
                length: 1,
                text: "a",
            },
            Candidate {
                token: 1,
                length: 400,
                text: &long,
            },
        ];
        let mut rng = StdRng::seed_from_u64(1234);

        for _ in 0..50 {
            let towards_long = log_weighted_choice(&candidates, &mut rng, |candidate| {
                2.0 * candidate.length as f64
            });
            assert_eq!(towards_long.unwrap().token, 1);

            let towards_short = log_weighted_choice(&candidates, &mut rng, |candidate| {
                -2.0 * candidate.length as f64
            });
            assert_eq!(towards_short.unwrap().token, 0);
        }

        assert!(log_weighted_choice(&[], &mut rng, |_| 0.0).is_none());
    }

    #[test]
    fn it_selects_nothing_from_nothing() {
        let mut rng = StdRng::seed_from_u64(1234);
        for strategy in [
            Strategy::Random,
            Strategy::Shortest,
            Strategy::Longest,
            Strategy::IdealLength,
        ] {
            assert!(strategy.select(&[], 4.0, &mut rng).is_none());
        }
    }

    #[test]
    fn it_parses_strategy_names() {
        for strategy in [
            Strategy::Random,
            Strategy::Shortest,
            Strategy::Longest,
            Strategy::IdealLength,
        ] {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
        }
        assert!("greedy".parse::<Strategy>().is_err());
        assert_eq!(
            serde_json::from_str::<Strategy>("\"ideal-length\"").unwrap(),
            Strategy::IdealLength
        );
    }
}
