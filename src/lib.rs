//! Functionality for reading, merging, and writing GEM MAP alignment records.
//!
//! A MAP line describes one [`Template`]: a read or read pair, its per-stratum
//! [`Counters`], and the candidate genomic placements ([`MultiMap`]s) found
//! for it. Templates are decoded with [`decode_line`], written back with
//! [`render_template`], and the placements of two search passes over the same
//! read are reconciled with [`merge_multimaps`].
//!
//! Here is an example which merges the results of a second mapping pass into
//! the first.
//!
//! ```
//! use gemmap::prelude::*;
//!
//! let mut first = decode_line("ID\tACGT\t####\t1\tchr1:-:20:4")
//!                     .expect("could not decode first pass");
//! let second = decode_line("ID\tACGT\t####\t1:1\tchr1:-:20:4,chr9:+:50:2C1")
//!                     .expect("could not decode second pass");
//!
//! merge_multimaps(&mut first, &second).expect("templates are compatible");
//! assert_eq!(
//!     render_template(&first, MmapFilter::All, true),
//!     "ID\tACGT\t####\t1+1\tchr1:-:20:4,chr9:+:50:2C1\n"
//! );
//! ```
//!
//! Whole streams, plaintext or gzip-compressed, can be read with
//! [`io::MapReader`]:
//!
//! ```no_run
//! use gemmap::io::{open_reader, MapReader};
//! use std::fs::File;
//!
//! let input = open_reader(File::open("pass1.map.gz").unwrap()).unwrap();
//! for template in MapReader::new(input).filter_map(Result::ok) {
//!     println!("{}\t{}", template.id(), template.counters());
//! }
//! ```

pub mod counters;
pub mod descriptor;
pub mod io;
pub mod map;
pub mod merge;
pub mod placement;
pub mod template;

pub use counters::Counters;
pub use descriptor::{Descriptor, DistanceModel, Operation};
pub use map::{decode_fields, decode_line, render_template, MmapFilter};
pub use merge::{merge_multimaps, merge_multimaps_with, MergeOptions, MergeOrder, MergeSummary};
pub use placement::{MultiMap, Placement, Slot, Strand};
pub use template::{Block, MapError, Template};

pub mod prelude {
    pub use crate::counters::Counters;
    pub use crate::descriptor::{Descriptor, DistanceModel, Operation};
    pub use crate::map::{decode_line, render_template, MmapFilter};
    pub use crate::merge::{merge_multimaps, merge_multimaps_with, MergeOptions, MergeOrder};
    pub use crate::placement::{MultiMap, Placement, Slot, Strand};
    pub use crate::template::{Block, MapError, Template};
}
