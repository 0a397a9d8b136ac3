//! Merging the candidate placements of two templates for the same read.
//!
//! [`merge_multimaps`] folds the multi-maps and counters of a *target*
//! template, e.g. the output of a second search pass, into a *source*
//! template in place.
//!
//! - Counters are summed stratum by stratum. Strata present in only one of
//!   the two are carried over unchanged.
//! - The max complete strata of the result is the smaller of the two. A
//!   source without a marker is complete up to its own strata count; a
//!   target without a marker does not lower it.
//! - A target entry at the same locus as a source entry is a duplicate. The
//!   lower-stratum entry is kept, in the position where it was first
//!   discovered, and the duplicate is only counted once. Each source entry
//!   absorbs at most one target entry, and target entries are never
//!   compared with each other.
//! - New entries are appended, or inserted by stratum with
//!   [`MergeOrder::ByStratum`].
//!
use std::mem;
use tracing::debug;

use crate::counters::Counters;
use crate::descriptor::DistanceModel;
use crate::placement::MultiMap;
use crate::template::{MapError, Template};

/// Where new multi-maps go in the merged list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeOrder {
    /// After all existing entries, in target order.
    #[default]
    Append,
    /// After the last existing entry whose stratum is not greater.
    ByStratum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOptions {
    pub order: MergeOrder,
    pub distance: DistanceModel,
}

/// What a merge did to the source template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeSummary {
    /// Target entries added as new multi-maps.
    pub added: usize,
    /// Target entries at a locus the source already had.
    pub duplicates: usize,
    /// Duplicates that replaced a worse source entry.
    pub replaced: usize,
}

/// Merge `target` into `source` with the default [`MergeOptions`].
pub fn merge_multimaps(
    source: &mut Template,
    target: &Template,
) -> Result<MergeSummary, MapError> {
    merge_multimaps_with(source, target, &MergeOptions::default())
}

pub fn merge_multimaps_with(
    source: &mut Template,
    target: &Template,
    options: &MergeOptions,
) -> Result<MergeSummary, MapError> {
    if source.num_blocks() != target.num_blocks() {
        return Err(MapError::IncompatibleTemplates(
            source.num_blocks(),
            target.num_blocks(),
        ));
    }

    merge_counters(&mut source.counters, &target.counters);

    let mut summary = MergeSummary::default();
    // source entries still free to absorb a duplicate; target entries never are
    let mut open = vec![true; source.mmaps.len()];
    for entry in target.mmaps() {
        let stratum = entry.distance(options.distance);
        let duplicate = source
            .mmaps
            .iter()
            .zip(&open)
            .position(|(m, &is_open)| is_open && m.same_locus(entry));
        match duplicate {
            Some(index) => {
                open[index] = false;
                summary.duplicates += 1;
                let existing = source.mmaps[index].distance(options.distance);
                let dropped = if stratum < existing {
                    summary.replaced += 1;
                    mem::replace(&mut source.mmaps[index], entry.clone())
                        .distance(DistanceModel::Events)
                } else {
                    entry.distance(DistanceModel::Events)
                };
                // counters are indexed by event count whatever model picks the winner
                source.counters.decrement(dropped);
            }
            None => {
                let index = match options.order {
                    MergeOrder::Append => source.mmaps.len(),
                    MergeOrder::ByStratum => {
                        insertion_point(&source.mmaps, stratum, options.distance)
                    }
                };
                source.mmaps.insert(index, entry.clone());
                open.insert(index, false);
                summary.added += 1;
            }
        }
    }

    debug!(
        id = source.id(),
        added = summary.added,
        duplicates = summary.duplicates,
        replaced = summary.replaced,
        "merged multi-maps"
    );
    Ok(summary)
}

fn merge_counters(source: &mut Counters, target: &Counters) {
    let complete = source.max_complete_strata().unwrap_or(source.len());
    let mcs = match target.max_complete_strata() {
        Some(target_mcs) => complete.min(target_mcs),
        None => complete,
    };
    source.add(target);
    source.set_max_complete_strata(Some(mcs));
}

fn insertion_point(mmaps: &[MultiMap], stratum: usize, model: DistanceModel) -> usize {
    mmaps
        .iter()
        .rposition(|m| m.distance(model) <= stratum)
        .map_or(0, |i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{decode_line, render_template, MmapFilter};

    fn decode(line: &str) -> Template {
        decode_line(line).unwrap()
    }

    fn render(template: &Template) -> String {
        render_template(template, MmapFilter::All, true)
    }

    const HANG_ID: &str = "HWI-962:71:D0PEYACXX:4:1101:18640:2354/2";
    const HANG_SEQ: &str =
        "CGCGCGGGAGCCAGCAGGAGCACCAGCTGCGCAGGCAGGTTGAACTGCTGGCTTATAAAGTAGAGCAGGAGAAGT";
    const HANG_QUAL: &str =
        "@CCFFFFFHHHHHIJIJJIJJJJJJJIIJGIDGIHHHFF6>CCCDEDDDDCBDD>CCDCC>CCCCCDDDDDBDC>";

    const SPLICE_ID: &str = "HISEQ8_0071:3:1101:19107:2010#TGACCA/1";
    const SPLICE_SEQ: &str = "NGTCATGAGTGCAAAATGCAAATGCAAGTTTGGCCAGAAGTCCGGTCACCATCCAGGGGAGACTCCACCTCTCATCACCCCAGGCTCAGCCCAAAGCTGAT";
    const SPLICE_QUAL: &str = "BPYcceeegegggiiiiiiiiiiiiiiighhhfgghhiiihhhifhfhhhfhhdghhiiihfbggedddeabbcdcccb`ZaW[^^abbcGW[`^`R]`BB";

    const INDEL_SEQ: &str = "GAGAGAACAGGCCTCTGAGCCCAAGCCAAGCCATCGCATCCCCTGTGACTTGCCCGTATATATGCCCAGATGGCCTGAAGTAACTGAAGAATCACAAAAGA";

    fn record(id: &str, seq: &str, qual: &str, counters: &str, mmaps: &str) -> String {
        [id, seq, qual, counters, mmaps].join("\t")
    }

    #[test]
    fn test_merge_duplicate_and_new() {
        let mut source = decode("ID\tACGT\t####\t1\tchr1:-:20:4");
        let target = decode("ID\tACGT\t####\t1:1\tchr1:-:20:4,chr9:+:50:2C1");
        let summary = merge_multimaps(&mut source, &target).unwrap();
        assert_eq!(render(&source), "ID\tACGT\t####\t1+1\tchr1:-:20:4,chr9:+:50:2C1\n");
        assert_eq!(
            summary,
            MergeSummary {
                added: 1,
                duplicates: 1,
                replaced: 0
            }
        );
        // the target is only read
        assert_eq!(
            render(&target),
            "ID\tACGT\t####\t1:1\tchr1:-:20:4,chr9:+:50:2C1\n"
        );
    }

    #[test]
    fn test_merge_nothing() {
        let source = decode("ID\tACGT\t####\t1\tchr1:-:20:4");
        assert_eq!(render(&source), "ID\tACGT\t####\t1\tchr1:-:20:4\n");

        let mut merged = source.clone();
        merge_multimaps(&mut merged, &source.copy(false, false)).unwrap();
        assert_eq!(render(&merged), "ID\tACGT\t####\t1\tchr1:-:20:4\n");
    }

    #[test]
    fn test_merge_into_unmapped_keeps_strata() {
        let mut source = decode(&record(HANG_ID, HANG_SEQ, HANG_QUAL, "0:0:0:0:0:0", "-"));
        let target = decode(&record(
            HANG_ID,
            HANG_SEQ,
            HANG_QUAL,
            "0:1",
            "chr21:+:47848466:39>1419*36",
        ));
        merge_multimaps(&mut source, &target).unwrap();
        assert_eq!(
            render(&source),
            record(
                HANG_ID,
                HANG_SEQ,
                HANG_QUAL,
                "0:1:0:0:0:0",
                "chr21:+:47848466:39>1419*36\n"
            )
        );
    }

    #[test]
    fn test_merge_hanging_splices() {
        let mut source = decode(&record(
            SPLICE_ID,
            SPLICE_SEQ,
            SPLICE_QUAL,
            "0:0:0:0:1",
            "chr19:+:35613736:C7>78*37>316*38>132*18",
        ));
        let target = decode(&record(
            SPLICE_ID,
            SPLICE_SEQ,
            SPLICE_QUAL,
            "0:0:0:0:1+0:1",
            "chr19:+:35613741:(5)3>78*37>316*36(20),chr19:+:35613819:(5)CAG37>316*36(20)",
        ));
        merge_multimaps(&mut source, &target).unwrap();
        assert_eq!(
            render(&source),
            record(
                SPLICE_ID,
                SPLICE_SEQ,
                SPLICE_QUAL,
                "0:0:0:0:2+0:1",
                "chr19:+:35613736:C7>78*37>316*38>132*18,chr19:+:35613741:(5)3>78*37>316*36(20),chr19:+:35613819:(5)CAG37>316*36(20)\n"
            )
        );
    }

    #[test]
    fn test_merge_inconsistent_counters_by_stratum() {
        let mut source = decode(&record(
            "ID/1",
            INDEL_SEQ,
            SPLICE_QUAL,
            "0:0:0:0:1:4+27:46:45:34:12:16:3:0:1",
            "chr7:+:24435865:1T>5-46A8C38,chr2:+:64479547:>1-1T>1-1T>1-94,chr4:+:16999371:1T>5-35>2-9A8C38,chr9:+:90025610:1T>5-28A17A8C38,chr11:-:130623749:2>1-1T1T46A2>2-43",
        ));
        let target = decode(&record(
            "ID/1",
            INDEL_SEQ,
            SPLICE_QUAL,
            "0:1:0:0:0:0:1:3",
            "chr2:+:64479108:10>436*91,chr2:+:64479544:TTC1TGT94,chr13:+:91496959:1GA1TGT27T18A47,chr2:+:216792393:1GA1TGT46A8C38,chr2:+:64478959:AG1T1G1TT1>585*91",
        ));
        source.recalculate_counters().unwrap();
        assert_eq!(source.counters().to_string(), "0:0:0:0:1:4");

        let options = MergeOptions {
            order: MergeOrder::ByStratum,
            ..Default::default()
        };
        merge_multimaps_with(&mut source, &target, &options).unwrap();
        assert_eq!(
            render(&source),
            record(
                "ID/1",
                INDEL_SEQ,
                SPLICE_QUAL,
                "0:1:0:0:1:4+1:3",
                "chr2:+:64479108:10>436*91,chr7:+:24435865:1T>5-46A8C38,chr2:+:64479547:(1)1T>1-1T>1-94,\
chr4:+:16999371:1T>5-35>2-9A8C38,chr9:+:90025610:1T>5-28A17A8C38,chr11:-:130623749:2>1-1T1T46A2>2-43,\
chr2:+:64479544:TTC1TGT94,chr13:+:91496959:1GA1TGT27T18A47,chr2:+:216792393:1GA1TGT46A8C38,chr2:+:64478959:AG1T1G1TT1>585*91\n"
            )
        );
    }

    #[test]
    fn test_append_order_keeps_target_after_source() {
        let mut source = decode("ID\tACGT\t####\t0:0:1\tchr1:+:10:1A1C");
        let target = decode("ID\tACGT\t####\t1\tchr2:+:10:4");
        merge_multimaps(&mut source, &target).unwrap();
        assert_eq!(source.to_string(), "ID\tACGT\t####\t1:0:1\tchr1:+:10:1A1C,chr2:+:10:4");

        let mut source = decode("ID\tACGT\t####\t0:0:1\tchr1:+:10:1A1C");
        let options = MergeOptions {
            order: MergeOrder::ByStratum,
            ..Default::default()
        };
        merge_multimaps_with(&mut source, &target, &options).unwrap();
        assert_eq!(source.to_string(), "ID\tACGT\t####\t1:0:1\tchr2:+:10:4,chr1:+:10:1A1C");
    }

    #[test]
    fn test_better_duplicate_replaces_in_place() {
        let mut source = decode("ID\tACGT\t####\t1:0:1\tchr3:+:1:4,chr1:+:10:1A1C");
        let target = decode("ID\tACGT\t####\t0:1\tchr1:+:10:2A1");
        let summary = merge_multimaps(&mut source, &target).unwrap();
        assert_eq!(summary.replaced, 1);
        assert_eq!(source.to_string(), "ID\tACGT\t####\t1:1:0\tchr3:+:1:4,chr1:+:10:2A1");
    }

    #[test]
    fn test_weighted_distance_decides_duplicates() {
        // one long deletion against two mismatches
        let source_line = "ID\tACGTACGT\t########\t0:1\tchr1:+:10:3>4-5";
        let target_line = "ID\tACGTACGT\t########\t0:0:1\tchr1:+:10:2A2C2";

        let mut source = decode(source_line);
        merge_multimaps(&mut source, &decode(target_line)).unwrap();
        assert_eq!(source.mmaps()[0].to_string(), "chr1:+:10:3>4-5");

        let mut source = decode(source_line);
        let options = MergeOptions {
            distance: DistanceModel::Weighted,
            ..Default::default()
        };
        let summary = merge_multimaps_with(&mut source, &decode(target_line), &options).unwrap();
        assert_eq!(summary.replaced, 1);
        assert_eq!(source.mmaps()[0].to_string(), "chr1:+:10:2A2C2");
        // the dropped entry is removed from its event stratum
        assert_eq!(source.counters().to_string(), "0:0+1");
    }

    #[test]
    fn test_target_entries_at_one_locus_are_kept() {
        let mut source = decode("ID\tACGT\t####\t0\t-");
        let target = decode("ID\tACGT\t####\t1:1\tchr1:+:10:4,chr1:+:10:1A2");
        let summary = merge_multimaps(&mut source, &target).unwrap();
        assert_eq!(summary.added, 2);
        assert_eq!(summary.duplicates, 0);
        assert_eq!(source.to_string(), "ID\tACGT\t####\t1+1\tchr1:+:10:4,chr1:+:10:1A2");

        // a source entry absorbs only the first of them
        let mut source = decode("ID\tACGT\t####\t1\tchr1:+:10:4");
        let summary = merge_multimaps(&mut source, &target).unwrap();
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.added, 1);
        assert_eq!(source.to_string(), "ID\tACGT\t####\t1+1\tchr1:+:10:4,chr1:+:10:1A2");
    }

    #[test]
    fn test_paired_merge() {
        let mut source = decode("p\tAC;GT\t##;##\t1\tchr1:+:100:2::chr1:-:300:2");
        let target = decode(
            "p\tAC;GT\t##;##\t1:1\tchr1:+:100:2::chr1:-:300:2,chr1:+:100:2::chr5:-:7:A1",
        );
        merge_multimaps(&mut source, &target).unwrap();
        assert_eq!(
            source.to_string(),
            "p\tAC;GT\t##;##\t1+1\tchr1:+:100:2::chr1:-:300:2,chr1:+:100:2::chr5:-:7:A1"
        );
    }

    #[test]
    fn test_incompatible_templates() {
        let mut single = decode("ID\tACGT\t####\t1\tchr1:-:20:4");
        let paired = decode("ID\tAC;GT\t##;##\t0\t-");
        assert!(matches!(
            merge_multimaps(&mut single, &paired),
            Err(MapError::IncompatibleTemplates(1, 2))
        ));
        assert_eq!(single.to_string(), "ID\tACGT\t####\t1\tchr1:-:20:4");
    }

    #[test]
    fn test_mmap_order_is_associative() {
        let a = decode("ID\tACGT\t####\t1\tchr1:+:10:4");
        let b = decode("ID\tACGT\t####\t1:1\tchr1:+:10:1A2,chr2:+:5:4");
        let c = decode("ID\tACGT\t####\t2\tchr3:-:7:4,chr2:+:5:4");

        let mut left = a.clone();
        merge_multimaps(&mut left, &b).unwrap();
        merge_multimaps(&mut left, &c).unwrap();

        let mut bc = b.clone();
        merge_multimaps(&mut bc, &c).unwrap();
        let mut right = a.clone();
        merge_multimaps(&mut right, &bc).unwrap();

        assert_eq!(left.mmaps(), right.mmaps());
        let loci: Vec<String> = left.mmaps().iter().map(ToString::to_string).collect();
        assert_eq!(loci, vec!["chr1:+:10:4", "chr2:+:5:4", "chr3:-:7:4"]);
    }

    #[test]
    fn test_counter_sums_saturate() {
        let mut source = decode("ID\tACGT\t####\t18446744073709551615\tchr1:-:20:4");
        let target = decode("ID\tACGT\t####\t1\tchr2:-:20:4");
        merge_multimaps(&mut source, &target).unwrap();
        assert_eq!(source.counters().strata(), &[u64::MAX]);
        assert_eq!(source.mmaps().len(), 2);
    }
}
