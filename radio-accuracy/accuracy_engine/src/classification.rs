//! Maps classifier labels onto the closed sentiment/aspect vocabulary.
//!
//! Accepted labels are `"<Positive|Negative> about <car|strategy|tyres>"`,
//! `"Encoded strategy"` and `"Neutral"`, case-insensitively and tolerating a
//! trailing full stop. Anything else is a [`ClassificationParseError`].

use serde::{Deserialize, Serialize};

use crate::error::ClassificationParseError;
use crate::statement::NotComputableReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aspect {
    Car,
    Strategy,
    Tyres,
    EncodedStrategy,
}

/// Sentiments that imply a direction for the gap to move in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub sentiment: Sentiment,
    pub aspect: Option<Aspect>,
}

impl Classification {
    pub fn parse(label: &str) -> Result<Self, ClassificationParseError> {
        let err = || ClassificationParseError {
            label: label.to_string(),
        };
        let normalized = label.trim().trim_end_matches('.').to_ascii_lowercase();
        let tokens: Vec<&str> = normalized.split_whitespace().collect();

        match tokens.as_slice() {
            ["neutral"] => Ok(Self {
                sentiment: Sentiment::Neutral,
                aspect: None,
            }),
            ["encoded", "strategy"] => Ok(Self {
                sentiment: Sentiment::Neutral,
                aspect: Some(Aspect::EncodedStrategy),
            }),
            [first, "about", last] => {
                let sentiment = match *first {
                    "positive" => Sentiment::Positive,
                    "negative" => Sentiment::Negative,
                    _ => return Err(err()),
                };
                let aspect = match *last {
                    "car" => Aspect::Car,
                    "strategy" => Aspect::Strategy,
                    "tyres" => Aspect::Tyres,
                    _ => return Err(err()),
                };
                Ok(Self {
                    sentiment,
                    aspect: Some(aspect),
                })
            }
            _ => Err(err()),
        }
    }

    /// The direction to score against, or why there is none.
    pub fn polarity(&self) -> Result<Polarity, NotComputableReason> {
        match (self.sentiment, self.aspect) {
            (Sentiment::Positive, _) => Ok(Polarity::Positive),
            (Sentiment::Negative, _) => Ok(Polarity::Negative),
            (Sentiment::Neutral, Some(Aspect::EncodedStrategy)) => {
                Err(NotComputableReason::EncodedStrategy)
            }
            (Sentiment::Neutral, _) => Err(NotComputableReason::NeutralSentiment),
        }
    }
}
