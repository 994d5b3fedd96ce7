//! Theoretical substitution-site estimation over sliced CDS regions.
//!
//! Every possible single-nucleotide substitution at positions with full
//! trinucleotide context is classified as synonymous or non-synonymous
//! and tallied per channel. Each substitution contributes a third of a
//! site, so counts are real-valued.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::channels::{Ssb7Table, SubstitutionModel, channel_id};
use crate::codon::{CodonTable, SubstitutionKind};
use crate::error::Error;
use crate::slicer::RegionSequence;

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Per-channel site counts for one sliced region.
#[derive(Debug, Clone)]
pub struct RegionSites {
    pub transcript: String,
    pub start: u64,
    pub end: u64,
    pub nonsyn: Vec<f64>,
    pub syn: Vec<f64>,
}

impl RegionSites {
    #[must_use]
    pub fn nonsyn_total(&self) -> f64 {
        self.nonsyn.iter().sum()
    }

    #[must_use]
    pub fn syn_total(&self) -> f64 {
        self.syn.iter().sum()
    }
}

/// Per-transcript per-channel site counts, summed across a region's
/// intervals.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSites {
    pub nonsyn: Vec<f64>,
    pub syn: Vec<f64>,
}

impl TranscriptSites {
    #[must_use]
    pub fn zeroed(model: SubstitutionModel) -> Self {
        Self {
            nonsyn: vec![0.0; model.channel_count()],
            syn: vec![0.0; model.channel_count()],
        }
    }

    #[must_use]
    pub fn nonsyn_total(&self) -> f64 {
        self.nonsyn.iter().sum()
    }

    #[must_use]
    pub fn syn_total(&self) -> f64 {
        self.syn.iter().sum()
    }
}

/// Estimator for theoretical synonymous and non-synonymous sites.
pub struct SiteEstimator {
    codons: CodonTable,
    model: SubstitutionModel,
    ssb7: Option<Ssb7Table>,
}

impl SiteEstimator {
    pub fn new(model: SubstitutionModel) -> Result<Self, Error> {
        let ssb7 = match model {
            SubstitutionModel::Ssb192 => None,
            SubstitutionModel::Ssb7 => Some(Ssb7Table::embedded()?),
        };
        Ok(Self {
            codons: CodonTable::standard(),
            model,
            ssb7,
        })
    }

    #[must_use]
    pub fn model(&self) -> SubstitutionModel {
        self.model
    }

    /// Enumerate substitutions over one sliced region.
    ///
    /// A position is counted when both flanking bases lie inside the
    /// slice and its codon is complete. Slices are codon-aligned, so the
    /// frame is the slice frame. Substitutions whose codon or context
    /// contains an ambiguous base are skipped.
    #[must_use]
    pub fn estimate_region(&self, region: &RegionSequence) -> RegionSites {
        let channels = self.model.channel_count();
        let mut sites = RegionSites {
            transcript: region.transcript.clone(),
            start: region.start,
            end: region.end,
            nonsyn: vec![0.0; channels],
            syn: vec![0.0; channels],
        };
        let seq = &region.sequence;
        if seq.len() < 3 {
            return sites;
        }
        for pos in 1..seq.len() - 1 {
            let codon_start = (pos / 3) * 3;
            if codon_start + 3 > seq.len() {
                continue;
            }
            let codon = &seq[codon_start..codon_start + 3];
            let offset = pos - codon_start;
            let triplet = &seq[pos - 1..pos + 2];
            for alt in BASES {
                let Some(kind) = self.codons.classify_substitution(codon, offset, alt) else {
                    continue;
                };
                let Some(channel) = channel_id(triplet, alt) else {
                    continue;
                };
                let channel = match &self.ssb7 {
                    Some(table) => table.class_of(channel),
                    None => channel,
                };
                match kind {
                    SubstitutionKind::NonSynonymous => sites.nonsyn[channel] += 1.0 / 3.0,
                    SubstitutionKind::Synonymous => sites.syn[channel] += 1.0 / 3.0,
                }
            }
        }
        sites
    }

    /// Estimate every region and sum the per-channel counts by
    /// transcript.
    #[must_use]
    pub fn estimate_all(&self, regions: &[RegionSequence]) -> BTreeMap<String, TranscriptSites> {
        let mut by_transcript: BTreeMap<String, TranscriptSites> = BTreeMap::new();
        for region in regions {
            let sites = self.estimate_region(region);
            let entry = by_transcript
                .entry(sites.transcript.clone())
                .or_insert_with(|| TranscriptSites::zeroed(self.model));
            for channel in 0..self.model.channel_count() {
                entry.nonsyn[channel] += sites.nonsyn[channel];
                entry.syn[channel] += sites.syn[channel];
            }
        }
        by_transcript
    }
}

/// Write per-transcript per-channel sites as a tab-delimited table:
/// `transcript<TAB>channel<TAB>nonsyn<TAB>syn`, zero channels omitted.
pub fn write_sites(sites: &BTreeMap<String, TranscriptSites>, path: &Path) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    for (transcript, counts) in sites {
        for channel in 0..counts.nonsyn.len() {
            let (n, s) = (counts.nonsyn[channel], counts.syn[channel]);
            if n == 0.0 && s == 0.0 {
                continue;
            }
            writeln!(w, "{transcript}\t{channel}\t{n}\t{s}")?;
        }
    }
    w.flush()?;
    Ok(())
}

/// Read a table written by [`write_sites`].
pub fn read_sites(
    path: &Path,
    model: SubstitutionModel,
) -> Result<BTreeMap<String, TranscriptSites>, Error> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut sites: BTreeMap<String, TranscriptSites> = BTreeMap::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let bad = || {
            Error::Parse(format!(
                "{}:{}: malformed sites record",
                path.display(),
                lineno + 1
            ))
        };
        let fields: Vec<&str> = line.split('\t').collect();
        let [transcript, channel, nonsyn, syn] = fields[..] else {
            return Err(bad());
        };
        let channel: usize = channel.parse().map_err(|_| bad())?;
        if channel >= model.channel_count() {
            return Err(bad());
        }
        let nonsyn: f64 = nonsyn.parse().map_err(|_| bad())?;
        let syn: f64 = syn.parse().map_err(|_| bad())?;
        let entry = sites
            .entry(transcript.to_string())
            .or_insert_with(|| TranscriptSites::zeroed(model));
        entry.nonsyn[channel] += nonsyn;
        entry.syn[channel] += syn;
    }
    Ok(sites)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(transcript: &str, start: u64, end: u64, seq: &[u8]) -> RegionSequence {
        RegionSequence {
            transcript: transcript.to_string(),
            start,
            end,
            sequence: seq.to_vec(),
        }
    }

    #[test]
    fn three_codon_region_counts() {
        // AAA GCT TTT: positions 1..8 are interior. Hand count gives 4
        // synonymous and 17 non-synonymous substitutions.
        let estimator = SiteEstimator::new(SubstitutionModel::Ssb192).unwrap();
        let sites = estimator.estimate_region(&region("T1", 0, 9, b"AAAGCTTTT"));
        assert!((sites.syn_total() - 4.0 / 3.0).abs() < 1e-9);
        assert!((sites.nonsyn_total() - 17.0 / 3.0).abs() < 1e-9);
        // 7 interior positions, a third of a site per substitution
        assert!((sites.syn_total() + sites.nonsyn_total() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn fourfold_site_lands_in_expected_channel() {
        let estimator = SiteEstimator::new(SubstitutionModel::Ssb192).unwrap();
        let sites = estimator.estimate_region(&region("T1", 0, 9, b"AAAGCTTTT"));
        // Third base of GCT has context CTT; CTT>A must be synonymous.
        let channel = channel_id(b"CTT", b'A').unwrap();
        assert!((sites.syn[channel] - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(sites.nonsyn[channel], 0.0);
    }

    #[test]
    fn ssb7_totals_match_ssb192() {
        let seq = b"AAAGCTTTTGGGCCCAAA";
        let full = SiteEstimator::new(SubstitutionModel::Ssb192).unwrap();
        let folded = SiteEstimator::new(SubstitutionModel::Ssb7).unwrap();
        let a = full.estimate_region(&region("T1", 0, 18, seq));
        let b = folded.estimate_region(&region("T1", 0, 18, seq));
        assert_eq!(b.nonsyn.len(), 7);
        assert!((a.syn_total() - b.syn_total()).abs() < 1e-9);
        assert!((a.nonsyn_total() - b.nonsyn_total()).abs() < 1e-9);
    }

    #[test]
    fn ambiguous_bases_are_skipped() {
        let estimator = SiteEstimator::new(SubstitutionModel::Ssb192).unwrap();
        let sites = estimator.estimate_region(&region("T1", 0, 9, b"NNNNNNNNN"));
        assert_eq!(sites.syn_total(), 0.0);
        assert_eq!(sites.nonsyn_total(), 0.0);
    }

    #[test]
    fn short_region_yields_no_sites() {
        let estimator = SiteEstimator::new(SubstitutionModel::Ssb192).unwrap();
        let sites = estimator.estimate_region(&region("T1", 0, 2, b"AC"));
        assert_eq!(sites.syn_total() + sites.nonsyn_total(), 0.0);
    }

    #[test]
    fn estimate_all_sums_by_transcript() {
        let estimator = SiteEstimator::new(SubstitutionModel::Ssb192).unwrap();
        let regions = vec![
            region("T1", 0, 9, b"AAAGCTTTT"),
            region("T1", 9, 18, b"AAAGCTTTT"),
            region("T2", 0, 9, b"AAAGCTTTT"),
        ];
        let sites = estimator.estimate_all(&regions);
        assert_eq!(sites.len(), 2);
        let t1 = &sites["T1"];
        let t2 = &sites["T2"];
        assert!((t1.syn_total() - 2.0 * t2.syn_total()).abs() < 1e-9);
    }

    #[test]
    fn sites_table_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.tsv");
        let estimator = SiteEstimator::new(SubstitutionModel::Ssb192).unwrap();
        let sites = estimator.estimate_all(&[region("T1", 0, 9, b"AAAGCTTTT")]);
        write_sites(&sites, &path).unwrap();
        let back = read_sites(&path, SubstitutionModel::Ssb192).unwrap();
        assert_eq!(back.len(), 1);
        let (orig, read) = (&sites["T1"], &back["T1"]);
        for channel in 0..192 {
            assert!((orig.nonsyn[channel] - read.nonsyn[channel]).abs() < 1e-12);
            assert!((orig.syn[channel] - read.syn[channel]).abs() < 1e-12);
        }
    }
}
