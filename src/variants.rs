//! Classification of annotated mutations into silent, nonsilent,
//! missense and intronic streams, and their intersection with the ON
//! and OFF protein interval sets.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Error;
use crate::interval::IntervalSet;
use crate::mutation::MutationRecord;

/// Consequence fragments excluded from the coding streams.
const NEGATIVE_FILTER: [&str; 16] = [
    "#",
    "intergenic_variant",
    "UTR",
    "downstream",
    "intron",
    "miRNA",
    "frameshift",
    "non_coding",
    "splice_acceptor_variant",
    "splice_donor_variant",
    "TF_binding_site_variant",
    "upstream",
    "incomplete",
    "regulatory_region_variant",
    "retained",
    "?",
];

/// A coding variant projected onto the protein axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProteinVariant {
    pub transcript: String,
    /// 0-based residue index.
    pub position: u64,
}

/// The four classified mutation streams.
#[derive(Debug, Clone, Default)]
pub struct VariantStreams {
    pub silent: Vec<ProteinVariant>,
    pub nonsilent: Vec<ProteinVariant>,
    pub missense: Vec<ProteinVariant>,
    /// Per-transcript intronic line counts.
    pub intronic: BTreeMap<String, u64>,
    /// Records dropped by the negative filter or the indel discard.
    pub discarded: u64,
    /// Coding records kept but lacking a protein position.
    pub unplaced: u64,
}

/// Raw and intersected counts for one coding stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamCounts {
    /// Line total before intersection.
    pub raw: u64,
    /// Distinct ON sites hit.
    pub on: u64,
    /// Distinct OFF sites hit.
    pub off: u64,
}

/// All counts consumed by the statistics stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassCounts {
    pub silent: StreamCounts,
    pub nonsilent: StreamCounts,
    pub missense: StreamCounts,
    pub intronic_total: u64,
}

/// Partition annotated mutations into the four streams.
///
/// Intronic records are collected before the negative filter since the
/// filter itself removes `intron`; splice-overlapping records never
/// count as intronic.
#[must_use]
pub fn classify(mutations: &[MutationRecord]) -> VariantStreams {
    let mut streams = VariantStreams::default();
    for mutation in mutations {
        let consequence = mutation.consequence.as_str();
        if consequence.contains("intron_variant") && !consequence.contains("splice") {
            *streams.intronic.entry(mutation.transcript.clone()).or_insert(0) += 1;
            continue;
        }
        if NEGATIVE_FILTER.iter().any(|term| consequence.contains(term)) {
            streams.discarded += 1;
            continue;
        }
        if !mutation.is_substitution() {
            streams.discarded += 1;
            continue;
        }
        let Some(position) = mutation.protein_start() else {
            streams.unplaced += 1;
            continue;
        };
        let variant = ProteinVariant {
            transcript: mutation.transcript.clone(),
            position,
        };
        if consequence.contains("synonymous_variant") {
            streams.silent.push(variant);
        } else {
            if consequence.contains("missense_variant") {
                streams.missense.push(variant.clone());
            }
            streams.nonsilent.push(variant);
        }
    }
    streams
}

/// Distinct sites of `variants` falling inside `set`.
fn distinct_hits(variants: &[ProteinVariant], set: &IntervalSet) -> u64 {
    let mut sites: BTreeSet<(&str, u64)> = BTreeSet::new();
    for v in variants {
        if set.contains(&v.transcript, v.position) {
            sites.insert((v.transcript.as_str(), v.position));
        }
    }
    sites.len() as u64
}

/// Intersect every coding stream with the ON and OFF sets.
#[must_use]
pub fn count_intersections(
    streams: &VariantStreams,
    on: &IntervalSet,
    off: &IntervalSet,
) -> ClassCounts {
    let count = |variants: &[ProteinVariant]| StreamCounts {
        raw: variants.len() as u64,
        on: distinct_hits(variants, on),
        off: distinct_hits(variants, off),
    };
    ClassCounts {
        silent: count(&streams.silent),
        nonsilent: count(&streams.nonsilent),
        missense: count(&streams.missense),
        intronic_total: streams.intronic.values().sum(),
    }
}

/// Abort check: without any ON signal the comparison is undefined.
pub fn ensure_target_signal(counts: &ClassCounts) -> Result<(), Error> {
    if counts.silent.on + counts.nonsilent.on + counts.missense.on == 0 {
        return Err(Error::NoTargetMutations);
    }
    Ok(())
}

/// Write the per-sample aggregate report: one `transcript\tcount\tlabel`
/// row per transcript and stream.
pub fn write_report(streams: &VariantStreams, path: &Path) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    for (label, variants) in [
        ("silent", &streams.silent),
        ("nonsilent", &streams.nonsilent),
        ("missense", &streams.missense),
    ] {
        let mut per_transcript: BTreeMap<&str, u64> = BTreeMap::new();
        for v in variants {
            *per_transcript.entry(v.transcript.as_str()).or_insert(0) += 1;
        }
        for (transcript, count) in per_transcript {
            writeln!(w, "{transcript}\t{count}\t{label}")?;
        }
    }
    for (transcript, count) in &streams.intronic {
        writeln!(w, "{transcript}\t{count}\tintronic")?;
    }
    w.flush()?;
    Ok(())
}
