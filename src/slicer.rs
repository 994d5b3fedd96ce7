//! Extraction of CDS subsequences for an interval set from a transcript
//! FASTA, producing `transcript:start-end` region records.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Error;
use crate::interval::IntervalSet;

/// A sliced CDS region with its extracted sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSequence {
    pub transcript: String,
    pub start: u64,
    pub end: u64,
    pub sequence: Vec<u8>,
}

impl RegionSequence {
    /// Canonical region identifier used in FASTA headers and identifier
    /// lists.
    #[must_use]
    pub fn identifier(&self) -> String {
        format!("{}:{}-{}", self.transcript, self.start, self.end)
    }
}

/// Index FASTA records by identifier for random access.
#[must_use]
pub fn sequence_map(records: Vec<(String, Vec<u8>)>) -> BTreeMap<String, Vec<u8>> {
    records.into_iter().collect()
}

/// Extract the subsequence of every interval in `set` from `sequences`.
///
/// Every sliced sequence has length `end - start`. A transcript absent
/// from the FASTA or an interval running past the end of its sequence is
/// an error.
pub fn slice_regions(
    sequences: &BTreeMap<String, Vec<u8>>,
    set: &IntervalSet,
) -> Result<Vec<RegionSequence>, Error> {
    let mut regions = Vec::with_capacity(set.interval_count());
    for (transcript, iv) in set.iter() {
        let sequence = sequences
            .get(transcript)
            .ok_or_else(|| Error::MissingTranscript(transcript.to_string()))?;
        let (start, end) = (iv.start as usize, iv.end as usize);
        if end > sequence.len() {
            return Err(Error::Validation(format!(
                "interval {}:{}-{} exceeds sequence length {}",
                transcript,
                iv.start,
                iv.end,
                sequence.len()
            )));
        }
        regions.push(RegionSequence {
            transcript: transcript.to_string(),
            start: iv.start,
            end: iv.end,
            sequence: sequence[start..end].to_vec(),
        });
    }
    Ok(regions)
}

/// Write region records as FASTA with `transcript:start-end` headers.
pub fn write_region_fasta(regions: &[RegionSequence], path: &Path) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    for region in regions {
        writeln!(w, ">{}", region.identifier())?;
        w.write_all(&region.sequence)?;
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}

/// Write the plain-text identifier list, one `transcript:start-end` per
/// line, in the same order as the FASTA.
pub fn write_identifier_list(regions: &[RegionSequence], path: &Path) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    for region in regions {
        writeln!(w, "{}", region.identifier())?;
    }
    w.flush()?;
    Ok(())
}

/// Parse a `transcript:start-end` identifier back into its parts.
pub fn parse_identifier(id: &str) -> Result<(String, u64, u64), Error> {
    let bad = || Error::Parse(format!("malformed region identifier: {id}"));
    let (transcript, range) = id.rsplit_once(':').ok_or_else(bad)?;
    let (start, end) = range.split_once('-').ok_or_else(bad)?;
    if transcript.is_empty() {
        return Err(bad());
    }
    let start: u64 = start.parse().map_err(|_| bad())?;
    let end: u64 = end.parse().map_err(|_| bad())?;
    Ok((transcript.to_string(), start, end))
}
