//! Genomic placements and multi-map entries.
//!
//! A [`Placement`] is written `reference:strand:position:descriptor`, e.g.
//! `chr9:+:50:2C1`. A [`MultiMap`] holds one [`Slot`] per read end, joined by
//! `::` for paired templates, where an end without a placement is written `-`.
//!
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::descriptor::{Descriptor, DistanceModel};
use crate::template::MapError;

/// The separator between the end slots of a multi-map entry.
pub const END_SEPARATOR: &str = "::";

/// The text of an unmapped slot, and of a template without placements.
pub const UNMAPPED: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn as_char(&self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

impl FromStr for Strand {
    type Err = MapError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            _ => Err(MapError::malformed("unknown strand", text)),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// One alignment of one read end to the reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub reference: String,
    pub strand: Strand,
    /// 1-based position of the first aligned reference base.
    pub position: u64,
    pub descriptor: Descriptor,
}

impl Placement {
    pub fn new(reference: &str, strand: Strand, position: u64, descriptor: Descriptor) -> Self {
        Self {
            reference: reference.to_string(),
            strand,
            position,
            descriptor,
        }
    }

    /// Whether both placements start at the same reference locus on the same strand.
    pub fn same_locus(&self, other: &Placement) -> bool {
        self.position == other.position
            && self.strand == other.strand
            && self.reference == other.reference
    }

    pub fn distance(&self, model: DistanceModel) -> usize {
        self.descriptor.distance(model)
    }
}

impl FromStr for Placement {
    type Err = MapError;

    /// Parses `reference:strand:position:descriptor`. The reference is split
    /// off last, so it may itself contain `:`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut fields = text.rsplitn(4, ':');
        let (Some(descriptor), Some(position), Some(strand), Some(reference)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(MapError::malformed(
                "expected reference:strand:position:descriptor",
                text,
            ));
        };
        if reference.is_empty() {
            return Err(MapError::malformed("empty reference name", text));
        }
        let position: u64 = position
            .parse()
            .map_err(|_| MapError::malformed("non-numeric position", text))?;

        Ok(Placement {
            reference: reference.to_string(),
            strand: strand.parse()?,
            position,
            descriptor: descriptor.parse()?,
        })
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.reference, self.strand, self.position, self.descriptor
        )
    }
}

/// The placement of one read end within a multi-map entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    Mapped(Placement),
    Unmapped,
}

impl Slot {
    pub fn placement(&self) -> Option<&Placement> {
        match self {
            Slot::Mapped(placement) => Some(placement),
            Slot::Unmapped => None,
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, Slot::Mapped(_))
    }

    pub fn distance(&self, model: DistanceModel) -> usize {
        self.placement().map_or(0, |p| p.distance(model))
    }
}

impl FromStr for Slot {
    type Err = MapError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text == UNMAPPED {
            Ok(Slot::Unmapped)
        } else {
            Ok(Slot::Mapped(text.parse()?))
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Mapped(placement) => write!(f, "{}", placement),
            Slot::Unmapped => f.write_str(UNMAPPED),
        }
    }
}

/// One candidate placement of a whole template, with one slot per read end.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MultiMap {
    slots: Vec<Slot>,
}

impl MultiMap {
    pub fn new(slots: Vec<Slot>) -> Self {
        Self { slots }
    }

    /// A single-end entry.
    pub fn single(placement: Placement) -> Self {
        Self {
            slots: vec![Slot::Mapped(placement)],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// The slot of read end `end`.
    pub fn slot(&self, end: usize) -> Result<&Slot, MapError> {
        self.slots.get(end).ok_or(MapError::RangeError {
            index: end,
            length: self.slots.len(),
        })
    }

    /// The stratum of the entry: the summed distance of its mapped ends.
    pub fn distance(&self, model: DistanceModel) -> usize {
        self.slots.iter().map(|slot| slot.distance(model)).sum()
    }

    /// Whether `other` places every end at the same locus as this entry.
    pub fn same_locus(&self, other: &MultiMap) -> bool {
        self.slots.len() == other.slots.len()
            && self
                .slots
                .iter()
                .zip(&other.slots)
                .all(|pair| match pair {
                    (Slot::Mapped(a), Slot::Mapped(b)) => a.same_locus(b),
                    (Slot::Unmapped, Slot::Unmapped) => true,
                    _ => false,
                })
    }
}

impl FromStr for MultiMap {
    type Err = MapError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let slots = text
            .split(END_SEPARATOR)
            .map(str::parse)
            .collect::<Result<Vec<Slot>, _>>()?;
        Ok(MultiMap { slots })
    }
}

impl fmt::Display for MultiMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                f.write_str(END_SEPARATOR)?;
            }
            write!(f, "{}", slot)?;
        }
        Ok(())
    }
}
