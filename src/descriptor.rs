//! The compact alignment descriptor carried by every MAP placement.
//!
//! A descriptor spells out how a read end lines up against the reference,
//! left to right, with no separators between tokens:
//!
//! ```text
//! (5)3>78*37>316*36(20)
//! ```
//!
//! | Token  | Operation                                   |
//! |--------|---------------------------------------------|
//! | `(N)`  | [`Operation::Hang`]: N trimmed, unaligned bases |
//! | `N`    | [`Operation::Match`]: a run of N matching bases |
//! | `A`    | [`Operation::Mismatch`]: the reference base at a mismatch |
//! | `>N+`  | [`Operation::Insertion`] of N bases          |
//! | `>N-`  | [`Operation::Deletion`] of N bases           |
//! | `>N*`  | [`Operation::Splice`]: N skipped reference bases (an intron) |
//!
//! The short forms `-N` and `*N` are also read, as a deletion and a splice.
//!
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::template::MapError;

/// A single edit operation of a [`Descriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Match(u32),
    /// Mismatch against the stored reference base.
    Mismatch(u8),
    Insertion(u32),
    Deletion(u32),
    Splice(u32),
    Hang(u32),
}

/// How edit operations are weighted when computing the stratum of a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceModel {
    /// Every mismatch, indel, splice, and hang counts as one event.
    #[default]
    Events,
    /// Mismatches count one, indels and splices count their length, hangs are free.
    Weighted,
}

impl Operation {
    /// The length of the operation; a mismatch always has length one.
    pub fn length(&self) -> u32 {
        match self {
            Operation::Match(len)
            | Operation::Insertion(len)
            | Operation::Deletion(len)
            | Operation::Splice(len)
            | Operation::Hang(len) => *len,
            Operation::Mismatch(_) => 1,
        }
    }

    /// The contribution of this operation to the edit distance of its placement.
    pub fn distance(&self, model: DistanceModel) -> usize {
        match (self, model) {
            (Operation::Match(_), _) => 0,
            (Operation::Mismatch(_), _) => 1,
            (Operation::Hang(_), DistanceModel::Weighted) => 0,
            (_, DistanceModel::Events) => 1,
            (op, DistanceModel::Weighted) => op.length() as usize,
        }
    }

    /// Fold `next` into `self` if both are runs of the same kind.
    fn coalesce(&mut self, next: &Operation) -> bool {
        let (len, extra) = match (self, next) {
            (Operation::Match(a), Operation::Match(b))
            | (Operation::Insertion(a), Operation::Insertion(b))
            | (Operation::Deletion(a), Operation::Deletion(b))
            | (Operation::Splice(a), Operation::Splice(b))
            | (Operation::Hang(a), Operation::Hang(b)) => (a, *b),
            _ => return false,
        };
        match len.checked_add(extra) {
            Some(total) => {
                *len = total;
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Match(len) => write!(f, "{}", len),
            Operation::Mismatch(base) => write!(f, "{}", *base as char),
            Operation::Insertion(len) => write!(f, ">{}+", len),
            Operation::Deletion(len) => write!(f, ">{}-", len),
            Operation::Splice(len) => write!(f, ">{}*", len),
            Operation::Hang(len) => write!(f, "({})", len),
        }
    }
}

/// An ordered list of edit operations describing one aligned read end.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Descriptor {
    operations: Vec<Operation>,
}

impl Descriptor {
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    /// Append an operation, merging it into the previous one when both are
    /// runs of the same kind.
    pub fn push(&mut self, operation: Operation) {
        if let Some(last) = self.operations.last_mut() {
            if last.coalesce(&operation) {
                return;
            }
        }
        self.operations.push(operation);
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// The length of the leading hang, if the descriptor starts with one.
    pub fn leading_hang(&self) -> Option<u32> {
        match self.operations.first() {
            Some(Operation::Hang(len)) => Some(*len),
            _ => None,
        }
    }

    /// Total edit distance of the described alignment under `model`.
    pub fn distance(&self, model: DistanceModel) -> usize {
        self.operations.iter().map(|op| op.distance(model)).sum()
    }
}

impl FromIterator<Operation> for Descriptor {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        let mut descriptor = Descriptor::new();
        for operation in iter {
            descriptor.push(operation);
        }
        descriptor
    }
}

/// Read a strictly positive decimal length starting at `start`, returning it
/// with the index of the first byte after the digits.
fn read_length(bytes: &[u8], start: usize) -> Result<(u32, usize), &'static str> {
    let end = bytes[start..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map_or(bytes.len(), |offset| start + offset);
    if end == start {
        return Err("missing length");
    }
    let mut length: u32 = 0;
    for &digit in &bytes[start..end] {
        length = length
            .checked_mul(10)
            .and_then(|l| l.checked_add(u32::from(digit - b'0')))
            .ok_or("length overflow")?;
    }
    if length == 0 {
        return Err("zero-length operation");
    }
    Ok((length, end))
}

impl FromStr for Descriptor {
    type Err = MapError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let malformed =
            |reason: &str| MapError::MalformedDescriptor(text.to_string(), reason.to_string());
        if text.is_empty() {
            return Err(malformed("empty descriptor"));
        }

        let bytes = text.as_bytes();
        let mut descriptor = Descriptor::new();
        let mut i = 0;
        while i < bytes.len() {
            let mut operation = match bytes[i] {
                b'0'..=b'9' => {
                    let (len, next) = read_length(bytes, i).map_err(malformed)?;
                    i = next;
                    Operation::Match(len)
                }
                b'(' => {
                    let (len, next) = read_length(bytes, i + 1).map_err(malformed)?;
                    if bytes.get(next) != Some(&b')') {
                        return Err(malformed("unterminated hang"));
                    }
                    i = next + 1;
                    Operation::Hang(len)
                }
                b'>' => {
                    let (len, next) = read_length(bytes, i + 1).map_err(malformed)?;
                    let operation = match bytes.get(next) {
                        Some(b'+') => Operation::Insertion(len),
                        Some(b'-') => Operation::Deletion(len),
                        Some(b'*') => Operation::Splice(len),
                        _ => return Err(malformed("indel without '+', '-' or '*' kind")),
                    };
                    i = next + 1;
                    operation
                }
                // short forms, rendered back in the '>' form
                b'-' | b'*' => {
                    let (len, next) = read_length(bytes, i + 1).map_err(malformed)?;
                    let operation = if bytes[i] == b'-' {
                        Operation::Deletion(len)
                    } else {
                        Operation::Splice(len)
                    };
                    i = next;
                    operation
                }
                base if base.is_ascii_alphabetic() => {
                    i += 1;
                    Operation::Mismatch(base)
                }
                _ => return Err(malformed("unexpected character")),
            };
            // a deletion before any aligned base is an unaligned flank
            if let (true, Operation::Deletion(len)) = (descriptor.is_empty(), operation) {
                operation = Operation::Hang(len);
            }
            descriptor.push(operation);
        }
        Ok(descriptor)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for operation in &self.operations {
            write!(f, "{}", operation)?;
        }
        Ok(())
    }
}
