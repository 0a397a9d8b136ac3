//! Per-stratum match counters.
//!
//! The counters field of a MAP record lists, for each edit-distance stratum,
//! how many candidate placements were found in it:
//!
//! ```text
//! 0:0:0:0:2+0:1
//! ```
//!
//! A `+` in place of a `:` marks the *max complete strata* boundary. Every
//! stratum before it was searched exhaustively, and the strata after it are a
//! partial tail. Without a `+` the boundary is unknown.
//!
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::template::MapError;

const STRATA_SEPARATOR: char = ':';
const MCS_SEPARATOR: char = '+';

/// The highest stratum a placement may be counted in.
pub const MAX_STRATUM: usize = 1 << 16;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Counters {
    strata: Vec<u64>,
    max_complete_strata: Option<usize>,
}

impl Counters {
    /// Empty counters, which render as `0`.
    pub fn new() -> Self {
        Self {
            strata: Vec::new(),
            max_complete_strata: None,
        }
    }

    /// The counters of a template without any placements.
    pub fn zeroed() -> Self {
        Self::from_strata(vec![0])
    }

    pub fn from_strata(strata: Vec<u64>) -> Self {
        Self {
            strata,
            max_complete_strata: None,
        }
    }

    pub fn strata(&self) -> &[u64] {
        &self.strata
    }

    pub fn len(&self) -> usize {
        self.strata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strata.is_empty()
    }

    /// The count at `stratum`; strata past the end count zero.
    pub fn get(&self, stratum: usize) -> u64 {
        self.strata.get(stratum).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.strata
            .iter()
            .fold(0, |total: u64, &count| total.saturating_add(count))
    }

    /// The lowest stratum with a non-zero count.
    pub fn first_populated(&self) -> Option<usize> {
        self.strata.iter().position(|&count| count > 0)
    }

    pub fn max_complete_strata(&self) -> Option<usize> {
        self.max_complete_strata
    }

    pub fn set_max_complete_strata(&mut self, mcs: Option<usize>) {
        self.max_complete_strata = mcs;
    }

    /// Count one more placement at `stratum`, growing the strata as needed.
    pub fn increment(&mut self, stratum: usize) -> Result<(), MapError> {
        if stratum > MAX_STRATUM {
            return Err(MapError::RangeError {
                index: stratum,
                length: MAX_STRATUM + 1,
            });
        }
        if stratum >= self.strata.len() {
            self.strata.resize(stratum + 1, 0);
        }
        self.strata[stratum] = self.strata[stratum].saturating_add(1);
        Ok(())
    }

    /// Remove one placement from `stratum`. Counts never drop below zero.
    pub fn decrement(&mut self, stratum: usize) {
        if let Some(count) = self.strata.get_mut(stratum) {
            *count = count.saturating_sub(1);
        }
    }

    /// Add `other` elementwise, saturating at `u64::MAX`. Strata only present
    /// in the longer of the two are carried over unchanged. The
    /// complete-strata marker is left alone.
    pub fn add(&mut self, other: &Counters) {
        for (count, &extra) in self.strata.iter_mut().zip(&other.strata) {
            *count = count.saturating_add(extra);
        }
        if other.strata.len() > self.strata.len() {
            self.strata.extend_from_slice(&other.strata[self.strata.len()..]);
        }
    }
}

impl FromStr for Counters {
    type Err = MapError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut counters = Counters::new();
        let mut rest = text;
        loop {
            let end = rest
                .find([STRATA_SEPARATOR, MCS_SEPARATOR])
                .unwrap_or(rest.len());
            let count: u64 = rest[..end].parse().map_err(|_| {
                MapError::malformed(format!("bad counter '{}'", &rest[..end]), text)
            })?;
            counters.strata.push(count);

            if end == rest.len() {
                break;
            }
            if rest[end..].starts_with(MCS_SEPARATOR) {
                if counters.max_complete_strata.is_some() {
                    return Err(MapError::malformed(
                        "more than one max complete strata marker",
                        text,
                    ));
                }
                counters.max_complete_strata = Some(counters.strata.len());
            }
            rest = &rest[end + 1..];
        }
        Ok(counters)
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.strata.is_empty() {
            return f.write_str("0");
        }
        for (i, count) in self.strata.iter().enumerate() {
            if i > 0 {
                let separator = if self.max_complete_strata == Some(i) {
                    MCS_SEPARATOR
                } else {
                    STRATA_SEPARATOR
                };
                write!(f, "{}", separator)?;
            }
            write!(f, "{}", count)?;
        }
        Ok(())
    }
}
