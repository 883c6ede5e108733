//! Constraint scores with symbolic infinities.
//!
//! A score is either a finite integer, one of the two infinities, or
//! unset. Infinities model hard must / must-not rules: adding a finite
//! value to an infinity leaves the infinity in place, and adding the two
//! opposite infinities produces [`Score::Conflict`], which callers treat
//! as "mixed / undecided" rather than silently picking a side.
//!
//! # Text form
//!
//! ```text
//! ""            -> Unset
//! "INFINITY"    -> PlusInfinity     (also "+INFINITY", "inf", "+inf")
//! "-INFINITY"   -> MinusInfinity    (also "-inf")
//! "-50", "+10"  -> Value
//! ```
//!
//! Integers whose magnitude reaches [`SCORE_INFINITY`] are the platform's
//! infinity sentinel and parse to the matching infinity.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Magnitude at which a finite score becomes an infinity.
pub const SCORE_INFINITY: i64 = 1_000_000;

/// A constraint score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Score {
    /// No score configured.
    #[default]
    Unset,
    /// `+∞` and `−∞` were both contributed to a sum.
    Conflict,
    MinusInfinity,
    Value(i64),
    PlusInfinity,
}

impl Score {
    /// Build a finite score, saturating into the infinities at the sentinel.
    pub fn value(v: i64) -> Self {
        if v >= SCORE_INFINITY {
            Score::PlusInfinity
        } else if v <= -SCORE_INFINITY {
            Score::MinusInfinity
        } else {
            Score::Value(v)
        }
    }

    /// Parse score text.
    pub fn parse(text: &str) -> CoreResult<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Score::Unset);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "infinity" | "+infinity" | "inf" | "+inf" => return Ok(Score::PlusInfinity),
            "-infinity" | "-inf" => return Ok(Score::MinusInfinity),
            _ => {}
        }
        trimmed
            .parse::<i64>()
            .map(Score::value)
            .map_err(|_| CoreError::InvalidScoreFormat(text.to_string()))
    }

    /// Saturating addition.
    ///
    /// `Unset` is the identity, `Conflict` is absorbing, and
    /// `PlusInfinity + MinusInfinity` is `Conflict`.
    pub fn add(self, other: Score) -> Score {
        use Score::*;
        match (self, other) {
            (Conflict, _) | (_, Conflict) => Conflict,
            (Unset, x) | (x, Unset) => x,
            (PlusInfinity, MinusInfinity) | (MinusInfinity, PlusInfinity) => Conflict,
            (PlusInfinity, _) | (_, PlusInfinity) => PlusInfinity,
            (MinusInfinity, _) | (_, MinusInfinity) => MinusInfinity,
            (Value(a), Value(b)) => Score::value(a.saturating_add(b)),
        }
    }

    /// Total order: `Unset < Conflict < MinusInfinity < Value(n) < PlusInfinity`.
    pub fn compare(&self, other: &Score) -> Ordering {
        self.cmp(other)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Score::Value(0))
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Score::PlusInfinity | Score::MinusInfinity)
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Score::Unset)
    }

    /// Finite contribution of this score to a running sum.
    ///
    /// Infinities and `Unset` contribute nothing; infinities are tracked by
    /// the caller as separate flags.
    pub fn finite(&self) -> i64 {
        match self {
            Score::Value(v) => *v,
            _ => 0,
        }
    }

    /// Negative scores clamp to zero, infinities become the sentinel.
    ///
    /// Used for order scores, where only positive strength orders anything.
    pub fn clamped_non_negative(&self) -> i64 {
        match self {
            Score::Value(v) => (*v).max(0),
            Score::PlusInfinity => SCORE_INFINITY,
            _ => 0,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Score::Unset => 0,
            Score::Conflict => 1,
            Score::MinusInfinity => 2,
            Score::Value(_) => 3,
            Score::PlusInfinity => 4,
        }
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Score::Value(a), Score::Value(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::ops::Add for Score {
    type Output = Score;

    fn add(self, rhs: Score) -> Score {
        Score::add(self, rhs)
    }
}

impl std::iter::Sum for Score {
    fn sum<I: Iterator<Item = Score>>(iter: I) -> Score {
        iter.fold(Score::Unset, Score::add)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Unset => Ok(()),
            Score::Conflict => f.write_str("CONFLICT"),
            Score::MinusInfinity => f.write_str("-INFINITY"),
            Score::PlusInfinity => f.write_str("INFINITY"),
            Score::Value(v) => write!(f, "{v}"),
        }
    }
}

impl FromStr for Score {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Score::parse(s)
    }
}

impl TryFrom<String> for Score {
    type Error = CoreError;

    fn try_from(s: String) -> CoreResult<Self> {
        Score::parse(&s)
    }
}

impl From<Score> for String {
    fn from(score: Score) -> String {
        score.to_string()
    }
}
