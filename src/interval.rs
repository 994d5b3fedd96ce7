//! Per-transcript interval sets and the region algebra built on them.
//!
//! Intervals are half-open `[start, end)` on either the protein axis
//! (amino-acid units) or the CDS axis (nucleotide units). The canonical
//! form of a set is sorted and merged; every operation returns canonical
//! output when given canonical input.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Error;

/// Maximum placement attempts per region before a shuffle fails loudly.
const MAX_PLACEMENT_ATTEMPTS: u32 = 1000;

/// A half-open interval on a single transcript axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Interval {
    #[must_use]
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True when the intervals overlap or abut.
    #[must_use]
    pub fn touches(&self, other: &Interval) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    #[must_use]
    pub fn contains(&self, pos: u64) -> bool {
        self.start <= pos && pos < self.end
    }
}

/// A bag of intervals keyed by transcript id, kept in canonical
/// (sorted, merged) form by the constructors and operations below.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalSet {
    regions: BTreeMap<String, Vec<Interval>>,
}

impl IntervalSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a canonical set from raw (transcript, start, end) records.
    pub fn from_records<I>(records: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (String, u64, u64)>,
    {
        let mut set = Self::new();
        for (transcript, start, end) in records {
            if start >= end {
                return Err(Error::Validation(format!(
                    "degenerate interval {start}-{end} on {transcript}"
                )));
            }
            set.regions
                .entry(transcript)
                .or_default()
                .push(Interval::new(start, end));
        }
        set.sort();
        Ok(set)
    }

    pub fn insert(&mut self, transcript: &str, interval: Interval) {
        self.regions
            .entry(transcript.to_string())
            .or_default()
            .push(interval);
    }

    /// Canonicalise ordering: per transcript by (start, end), so intervals
    /// sharing a start are ordered shortest first (the longer ends last).
    pub fn sort(&mut self) {
        for intervals in self.regions.values_mut() {
            intervals.sort();
        }
    }

    /// Coalesce overlapping and adjacent intervals. Idempotent.
    pub fn merge(&mut self) {
        self.sort();
        for intervals in self.regions.values_mut() {
            let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
            for &iv in intervals.iter() {
                match merged.last_mut() {
                    Some(last) if iv.start <= last.end => {
                        last.end = last.end.max(iv.end);
                    }
                    _ => merged.push(iv),
                }
            }
            *intervals = merged;
        }
        self.regions.retain(|_, v| !v.is_empty());
    }

    /// Drop intervals whose transcript is not in `allowed`.
    pub fn filter_by_transcripts(&mut self, allowed: &BTreeSet<String>) {
        self.regions.retain(|t, _| allowed.contains(t));
    }

    /// For each transcript in `lengths`, return `[0, length) \ self`.
    /// Transcripts absent from `self` yield the full `[0, length)`.
    #[must_use]
    pub fn complement(&self, lengths: &BTreeMap<String, u64>) -> IntervalSet {
        let mut out = IntervalSet::new();
        for (transcript, &length) in lengths {
            if length == 0 {
                continue;
            }
            let mut cursor = 0u64;
            if let Some(intervals) = self.regions.get(transcript) {
                for iv in intervals {
                    if iv.start > cursor {
                        out.insert(transcript, Interval::new(cursor, iv.start.min(length)));
                    }
                    cursor = cursor.max(iv.end);
                    if cursor >= length {
                        break;
                    }
                }
            }
            if cursor < length {
                out.insert(transcript, Interval::new(cursor, length));
            }
        }
        out.merge();
        out
    }

    /// Per-transcript set difference `self \ other`.
    #[must_use]
    pub fn subtract(&self, other: &IntervalSet) -> IntervalSet {
        let mut out = IntervalSet::new();
        for (transcript, intervals) in &self.regions {
            let holes = other.regions.get(transcript);
            for &iv in intervals {
                match holes {
                    None => out.insert(transcript, iv),
                    Some(holes) => {
                        let mut cursor = iv.start;
                        for hole in holes {
                            if hole.end <= cursor {
                                continue;
                            }
                            if hole.start >= iv.end {
                                break;
                            }
                            if hole.start > cursor {
                                out.insert(transcript, Interval::new(cursor, hole.start));
                            }
                            cursor = cursor.max(hole.end);
                            if cursor >= iv.end {
                                break;
                            }
                        }
                        if cursor < iv.end {
                            out.insert(transcript, Interval::new(cursor, iv.end));
                        }
                    }
                }
            }
        }
        out.merge();
        out
    }

    /// Per-transcript intersection, also returning the total overlap length
    /// for accounting.
    #[must_use]
    pub fn intersect(&self, other: &IntervalSet) -> (IntervalSet, u64) {
        let mut out = IntervalSet::new();
        let mut overlap_total = 0u64;
        for (transcript, a_ivs) in &self.regions {
            let Some(b_ivs) = other.regions.get(transcript) else {
                continue;
            };
            let (mut i, mut j) = (0usize, 0usize);
            while i < a_ivs.len() && j < b_ivs.len() {
                let a = a_ivs[i];
                let b = b_ivs[j];
                let start = a.start.max(b.start);
                let end = a.end.min(b.end);
                if start < end {
                    out.insert(transcript, Interval::new(start, end));
                    overlap_total += end - start;
                }
                if a.end <= b.end {
                    i += 1;
                } else {
                    j += 1;
                }
            }
        }
        out.merge();
        (out, overlap_total)
    }

    /// Replace each transcript's intervals by uniformly random intervals of
    /// the same lengths drawn from `[0, length)`, rejecting candidates that
    /// touch an exclusion or an already-placed region.
    ///
    /// Deterministic for a fixed seed; transcripts are visited in sorted id
    /// order. Fails with `ShuffleFailed` when a region cannot be placed
    /// within the attempt bound.
    pub fn shuffle(
        &self,
        exclusions: &IntervalSet,
        lengths: &BTreeMap<String, u64>,
        seed: u64,
    ) -> Result<IntervalSet, Error> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut out = IntervalSet::new();

        for (transcript, intervals) in &self.regions {
            let Some(&length) = lengths.get(transcript) else {
                return Err(Error::MissingTranscript(transcript.clone()));
            };
            let forbidden = exclusions
                .regions
                .get(transcript)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            // Longest first: the hardest placements go while space is widest.
            let mut wanted: Vec<u64> = intervals.iter().map(Interval::len).collect();
            wanted.sort_unstable_by(|a, b| b.cmp(a));

            let mut placed: Vec<Interval> = Vec::with_capacity(wanted.len());
            for len in wanted {
                if len > length {
                    return Err(Error::ShuffleFailed {
                        transcript: transcript.clone(),
                        attempts: 0,
                    });
                }
                let mut attempts = 0u32;
                loop {
                    attempts += 1;
                    if attempts > MAX_PLACEMENT_ATTEMPTS {
                        return Err(Error::ShuffleFailed {
                            transcript: transcript.clone(),
                            attempts: MAX_PLACEMENT_ATTEMPTS,
                        });
                    }
                    let start = rng.gen_range(0..=length - len);
                    let candidate = Interval::new(start, start + len);
                    let clash = forbidden.iter().any(|f| f.touches(&candidate))
                        || placed.iter().any(|p| p.touches(&candidate));
                    if !clash {
                        placed.push(candidate);
                        break;
                    }
                }
            }
            for iv in placed {
                out.insert(transcript, iv);
            }
        }
        out.merge();
        Ok(out)
    }

    /// Map protein-axis intervals to the CDS axis: `(s, e) -> (3s - k, 3e)`,
    /// clamped to `[0, cds_length]`. `k` widens the start to retain left
    /// trinucleotide context.
    #[must_use]
    pub fn transform_protein_to_cds(
        &self,
        k: u64,
        cds_lengths: &BTreeMap<String, u64>,
    ) -> IntervalSet {
        let mut out = IntervalSet::new();
        for (transcript, intervals) in &self.regions {
            let cds_len = cds_lengths.get(transcript).copied().unwrap_or(u64::MAX);
            for iv in intervals {
                let start = (iv.start * 3).saturating_sub(k);
                let end = (iv.end * 3).min(cds_len);
                if start < end {
                    out.insert(transcript, Interval::new(start.min(cds_len), end));
                }
            }
        }
        out.merge();
        out
    }

    /// True when `pos` falls inside any interval of `transcript`.
    #[must_use]
    pub fn contains(&self, transcript: &str, pos: u64) -> bool {
        self.regions
            .get(transcript)
            .is_some_and(|ivs| ivs.iter().any(|iv| iv.contains(pos)))
    }

    /// Iterate (transcript, interval) pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Interval)> {
        self.regions
            .iter()
            .flat_map(|(t, ivs)| ivs.iter().map(move |&iv| (t.as_str(), iv)))
    }

    /// Transcript ids present in the set, in sorted order.
    pub fn transcripts(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    #[must_use]
    pub fn intervals_for(&self, transcript: &str) -> &[Interval] {
        self.regions
            .get(transcript)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn transcript_count(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub fn interval_count(&self) -> usize {
        self.regions.values().map(Vec::len).sum()
    }

    /// Sum of interval lengths across all transcripts.
    #[must_use]
    pub fn total_len(&self) -> u64 {
        self.regions
            .values()
            .flat_map(|ivs| ivs.iter().map(Interval::len))
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
