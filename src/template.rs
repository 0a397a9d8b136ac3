use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

use crate::counters::Counters;
use crate::descriptor::DistanceModel;
use crate::placement::{MultiMap, Placement, Slot};

/// The most read ends a template can carry.
pub const MAX_BLOCKS: usize = 2;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("Malformed MAP record ({reason}): '{record}'")]
    MalformedRecord { reason: String, record: String },
    #[error("Malformed alignment descriptor '{0}': {1}")]
    MalformedDescriptor(String, String),
    #[error("Incompatible templates: {0} block(s) vs. {1} block(s)")]
    IncompatibleTemplates(usize, usize),
    #[error("Index {index} out of range for length {length}")]
    RangeError { index: usize, length: usize },
    #[error("IO error: {0}")]
    IOError(#[from] io::Error),
    #[error("MAP stream error: {0}")]
    CsvError(#[from] csv::Error),
}

impl MapError {
    pub(crate) fn malformed(reason: impl Into<String>, record: impl Into<String>) -> Self {
        MapError::MalformedRecord {
            reason: reason.into(),
            record: record.into(),
        }
    }

    /// Re-anchor an error raised while decoding one field on the whole record.
    pub(crate) fn within_record(self, line: &str) -> Self {
        match self {
            MapError::MalformedRecord { reason, record } if record != line => {
                MapError::malformed(format!("{} in '{}'", reason, record), line)
            }
            MapError::MalformedDescriptor(descriptor, reason) => MapError::malformed(
                format!("bad descriptor '{}': {}", descriptor, reason),
                line,
            ),
            other => other,
        }
    }
}

/// The bases and base qualities of one read end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub sequence: String,
    /// Empty when the read came without qualities.
    pub qualities: String,
}

impl Block {
    pub fn new(sequence: &str, qualities: &str) -> Self {
        Self {
            sequence: sequence.to_string(),
            qualities: qualities.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn has_qualities(&self) -> bool {
        !self.qualities.is_empty()
    }
}

/// A read, or read pair, with its counters and candidate placements.
///
/// Every [`MultiMap`] in a template has exactly one slot per block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub(crate) id: String,
    pub(crate) blocks: Vec<Block>,
    pub(crate) counters: Counters,
    pub(crate) mmaps: Vec<MultiMap>,
}

impl Template {
    /// Create an unmapped template from one or two read ends.
    pub fn new(id: &str, blocks: Vec<Block>) -> Result<Self, MapError> {
        if blocks.is_empty() || blocks.len() > MAX_BLOCKS {
            return Err(MapError::malformed(
                format!("{} blocks, expected 1 to {}", blocks.len(), MAX_BLOCKS),
                id,
            ));
        }
        Ok(Self {
            id: id.to_string(),
            blocks,
            counters: Counters::zeroed(),
            mmaps: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The block of read end `end`.
    pub fn block(&self, end: usize) -> Result<&Block, MapError> {
        self.blocks.get(end).ok_or(MapError::RangeError {
            index: end,
            length: self.blocks.len(),
        })
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_paired(&self) -> bool {
        self.blocks.len() == 2
    }

    /// Whether every block carries qualities.
    pub fn has_qualities(&self) -> bool {
        self.blocks.iter().all(Block::has_qualities)
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn set_counters(&mut self, counters: Counters) {
        self.counters = counters;
    }

    pub fn mmaps(&self) -> &[MultiMap] {
        &self.mmaps
    }

    pub fn mmap(&self, index: usize) -> Result<&MultiMap, MapError> {
        self.mmaps.get(index).ok_or(MapError::RangeError {
            index,
            length: self.mmaps.len(),
        })
    }

    pub fn is_mapped(&self) -> bool {
        !self.mmaps.is_empty()
    }

    /// Append a candidate placement. It must have one slot per block.
    ///
    /// The counters are not touched; call [`Template::recalculate_counters`]
    /// once all out-of-band edits are done.
    pub fn push_mmap(&mut self, mmap: MultiMap) -> Result<(), MapError> {
        if mmap.len() != self.blocks.len() {
            return Err(MapError::IncompatibleTemplates(
                self.blocks.len(),
                mmap.len(),
            ));
        }
        self.mmaps.push(mmap);
        Ok(())
    }

    /// The lowest stratum among the multi-maps.
    pub fn best_stratum(&self, model: DistanceModel) -> Option<usize> {
        self.mmaps.iter().map(|mmap| mmap.distance(model)).min()
    }

    /// Iterate over every placement of read end `end`, in multi-map order.
    pub fn placements(&self, end: usize) -> impl Iterator<Item = &Placement> {
        self.mmaps
            .iter()
            .filter_map(move |mmap| mmap.slots().get(end).and_then(Slot::placement))
    }

    /// The distinct placements of read end `end`, in discovery order.
    pub fn placement_summary(&self, end: usize) -> Result<IndexSet<&Placement>, MapError> {
        self.block(end)?;
        Ok(self.placements(end).collect())
    }

    /// Copy the template.
    ///
    /// Without `include_placements` the copy is the bare read: zeroed counters
    /// and no multi-maps. With placements but without `include_mmaps` the
    /// counters are kept and the multi-maps are rebuilt from each end's
    /// distinct placements, with all other ends unmapped.
    pub fn copy(&self, include_placements: bool, include_mmaps: bool) -> Template {
        let (counters, mmaps) = match (include_placements, include_mmaps) {
            (false, _) => (Counters::zeroed(), Vec::new()),
            (true, true) => (self.counters.clone(), self.mmaps.clone()),
            (true, false) => (self.counters.clone(), self.summary_mmaps()),
        };
        Template {
            id: self.id.clone(),
            blocks: self.blocks.clone(),
            counters,
            mmaps,
        }
    }

    fn summary_mmaps(&self) -> Vec<MultiMap> {
        let num_blocks = self.blocks.len();
        let mut mmaps = Vec::new();
        for end in 0..num_blocks {
            let distinct: IndexSet<&Placement> = self.placements(end).collect();
            for placement in distinct {
                let slots = (0..num_blocks)
                    .map(|e| {
                        if e == end {
                            Slot::Mapped(placement.clone())
                        } else {
                            Slot::Unmapped
                        }
                    })
                    .collect();
                mmaps.push(MultiMap::new(slots));
            }
        }
        mmaps
    }

    /// Rebuild the counters from the multi-maps, using [`DistanceModel::Events`].
    pub fn recalculate_counters(&mut self) -> Result<(), MapError> {
        self.recalculate_counters_with(DistanceModel::default())
    }

    /// Rebuild the counters from the multi-maps. Previous strata are
    /// discarded; the max complete strata marker is kept.
    ///
    /// Fails, leaving the counters untouched, if a multi-map lies past
    /// [`MAX_STRATUM`](crate::counters::MAX_STRATUM).
    pub fn recalculate_counters_with(&mut self, model: DistanceModel) -> Result<(), MapError> {
        let mut counters = Counters::new();
        for mmap in &self.mmaps {
            counters.increment(mmap.distance(model))?;
        }
        if counters.is_empty() {
            counters = Counters::zeroed();
        }
        counters.set_max_complete_strata(self.counters.max_complete_strata());
        self.counters = counters;
        Ok(())
    }
}
