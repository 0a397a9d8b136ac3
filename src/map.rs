//! Decoding and encoding of MAP records.
//!
//! One record per line, five tab-separated fields:
//!
//! ```text
//! ID <TAB> SEQ[;SEQ2] <TAB> QUAL[;QUAL2] <TAB> COUNTERS <TAB> MULTIMAPS
//! ```
//!
//! The multi-map field is a `,`-separated list of entries, or `-` when the
//! template has no placements.
//!
use tracing::trace;

use crate::descriptor::DistanceModel;
use crate::placement::{MultiMap, UNMAPPED};
use crate::template::{Block, MapError, Template, MAX_BLOCKS};

pub const FIELD_SEPARATOR: char = '\t';
pub const BLOCK_SEPARATOR: char = ';';
pub const MMAP_SEPARATOR: char = ',';

const NUM_FIELDS: usize = 5;

/// Which multi-maps of a template get written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MmapFilter {
    #[default]
    All,
    /// Only the entries in the lowest populated stratum.
    Best,
    /// The first `n` entries.
    First(usize),
}

impl MmapFilter {
    pub fn select<'a>(&self, template: &'a Template) -> Vec<&'a MultiMap> {
        let mmaps = template.mmaps().iter();
        match *self {
            MmapFilter::All => mmaps.collect(),
            MmapFilter::First(n) => mmaps.take(n).collect(),
            MmapFilter::Best => {
                let model = DistanceModel::default();
                match template.best_stratum(model) {
                    Some(best) => mmaps.filter(|m| m.distance(model) == best).collect(),
                    None => Vec::new(),
                }
            }
        }
    }
}

/// Decode one MAP line into a [`Template`]. A trailing newline is ignored.
pub fn decode_line(line: &str) -> Result<Template, MapError> {
    let line = line.trim_end_matches(['\n', '\r']);
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    decode_fields(&fields).map_err(|e| e.within_record(line))
}

/// Decode a MAP record that has already been split into its fields.
pub fn decode_fields(fields: &[&str]) -> Result<Template, MapError> {
    if fields.len() < NUM_FIELDS {
        return Err(MapError::malformed(
            format!(
                "expected {} tab-separated fields, found {}",
                NUM_FIELDS,
                fields.len()
            ),
            fields.join("\t"),
        ));
    }
    if fields.len() > NUM_FIELDS {
        trace!(
            id = fields[0],
            extra = fields.len() - NUM_FIELDS,
            "ignoring extra MAP fields"
        );
    }

    let blocks = parse_blocks(fields[1], fields[2])?;
    let mut template = Template::new(fields[0], blocks)?;
    template.counters = fields[3].parse()?;
    template.mmaps = parse_mmaps(fields[4], template.num_blocks())?;
    Ok(template)
}

/// Split the sequence and quality fields into blocks.
///
/// Qualities are cut at the sequence lengths rather than split on the block
/// separator, since `;` is itself a valid quality character.
fn parse_blocks(sequences: &str, qualities: &str) -> Result<Vec<Block>, MapError> {
    let sequences: Vec<&str> = sequences.split(BLOCK_SEPARATOR).collect();
    if sequences.len() > MAX_BLOCKS {
        return Err(MapError::malformed(
            format!("{} sequence blocks, at most {} allowed", sequences.len(), MAX_BLOCKS),
            sequences.join(";"),
        ));
    }
    if sequences.iter().any(|s| s.is_empty()) {
        return Err(MapError::malformed("empty sequence block", sequences.join(";")));
    }

    if qualities.is_empty() {
        return Ok(sequences.iter().map(|s| Block::new(s, "")).collect());
    }

    let mut blocks = Vec::with_capacity(sequences.len());
    let mut rest = qualities;
    for (i, sequence) in sequences.iter().enumerate() {
        if i > 0 {
            rest = rest.strip_prefix(BLOCK_SEPARATOR).ok_or_else(|| {
                MapError::malformed("quality blocks do not match sequence blocks", qualities)
            })?;
        }
        if rest.len() < sequence.len() || !rest.is_char_boundary(sequence.len()) {
            return Err(MapError::malformed(
                format!("block {} has fewer qualities than bases", i + 1),
                qualities,
            ));
        }
        let (block_qualities, tail) = rest.split_at(sequence.len());
        blocks.push(Block::new(sequence, block_qualities));
        rest = tail;
    }
    if !rest.is_empty() {
        return Err(MapError::malformed("more qualities than bases", qualities));
    }
    Ok(blocks)
}

fn parse_mmaps(field: &str, num_blocks: usize) -> Result<Vec<MultiMap>, MapError> {
    if field == UNMAPPED {
        return Ok(Vec::new());
    }
    field
        .split(MMAP_SEPARATOR)
        .map(|entry| {
            let mmap: MultiMap = entry.parse()?;
            if mmap.len() != num_blocks {
                return Err(MapError::malformed(
                    format!("expected {} end slot(s), found {}", num_blocks, mmap.len()),
                    entry,
                ));
            }
            Ok(mmap)
        })
        .collect()
}

/// Render a template as a MAP line, writing only the multi-maps `filter` selects.
pub fn render_template(template: &Template, filter: MmapFilter, with_newline: bool) -> String {
    let sequences: Vec<&str> = template
        .blocks()
        .iter()
        .map(|b| b.sequence.as_str())
        .collect();
    let qualities: Vec<&str> = if template.has_qualities() {
        template
            .blocks()
            .iter()
            .map(|b| b.qualities.as_str())
            .collect()
    } else {
        Vec::new()
    };
    let mmaps = filter.select(template);
    let mmaps = if mmaps.is_empty() {
        UNMAPPED.to_string()
    } else {
        mmaps
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    };

    let mut line = [
        template.id().to_string(),
        sequences.join(";"),
        qualities.join(";"),
        template.counters().to_string(),
        mmaps,
    ]
    .join("\t");
    if with_newline {
        line.push('\n');
    }
    line
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&render_template(self, MmapFilter::All, false))
    }
}
