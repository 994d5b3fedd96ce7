//! Trinucleotide context pipeline: derive each substitution's reference
//! triplet from the genome, validate reference concordance, and tally
//! the channel spectrum.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::channels::{
    SSB7_CLASSES, Spectrum, Ssb7Table, SubstitutionModel, channel_id, channel_name,
};
use crate::error::Error;
use crate::genome::Genome;
use crate::mutation::MutationRecord;

/// Outcome of the reference-concordance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextFlag {
    Good,
    Fail,
}

/// A substitution widened to its reference trinucleotide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextRecord {
    pub chrom: String,
    /// 0-based BED-like interval of the substituted base.
    pub start: u64,
    pub end: u64,
    pub ref_allele: u8,
    pub alt_allele: u8,
    /// None when the position sits at a chromosome end.
    pub triplet: Option<[u8; 3]>,
    pub flag: ContextFlag,
}

/// Counters reported in the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextStats {
    pub good: u64,
    pub fail: u64,
    pub non_substitutions: u64,
}

/// Widen every substitution record by one base on each side and flag it.
///
/// GOOD requires the fetched centre base to equal the record's reference
/// allele; chromosome-end clamping and unknown chromosomes flag FAIL.
/// Non-substitutions (indels, missing codon change) are skipped and
/// counted separately.
#[must_use]
pub fn annotate_contexts(
    mutations: &[MutationRecord],
    genome: &Genome,
) -> (Vec<ContextRecord>, ContextStats) {
    let mut records = Vec::new();
    let mut stats = ContextStats::default();
    for mutation in mutations {
        if !mutation.is_substitution() {
            stats.non_substitutions += 1;
            continue;
        }
        let ref_allele = mutation.ref_allele.as_bytes()[0].to_ascii_uppercase();
        let alt_allele = mutation.alt_allele.as_bytes()[0].to_ascii_uppercase();
        let triplet = genome.trinucleotide(&mutation.chrom, mutation.position);
        let flag = match triplet {
            Some(t) if t[1].to_ascii_uppercase() == ref_allele => ContextFlag::Good,
            _ => ContextFlag::Fail,
        };
        match flag {
            ContextFlag::Good => stats.good += 1,
            ContextFlag::Fail => stats.fail += 1,
        }
        records.push(ContextRecord {
            chrom: mutation.chrom.clone(),
            start: mutation.position - 1,
            end: mutation.position,
            ref_allele,
            alt_allele,
            triplet,
            flag,
        });
    }
    (records, stats)
}

/// Tally GOOD records into a channel spectrum under `model`.
///
/// Records whose channel is degenerate or ambiguous are dropped from the
/// tally. Fewer than 7 non-zero channels in the final spectrum is a
/// [`Error::SpectrumTooSparse`].
pub fn spectrum_from_records(
    records: &[ContextRecord],
    model: SubstitutionModel,
) -> Result<Spectrum, Error> {
    let mut raw = Spectrum::new(SubstitutionModel::Ssb192);
    for record in records {
        if record.flag != ContextFlag::Good {
            continue;
        }
        let Some(triplet) = record.triplet else {
            continue;
        };
        if let Some(channel) = channel_id(&triplet, record.alt_allele) {
            raw.increment(channel);
        }
    }
    let spectrum = match model {
        SubstitutionModel::Ssb192 => raw,
        SubstitutionModel::Ssb7 => raw.fold(&Ssb7Table::embedded()?),
    };
    let channels = spectrum.non_zero_channels();
    if channels < SSB7_CLASSES {
        return Err(Error::SpectrumTooSparse { channels });
    }
    Ok(spectrum)
}

/// Write flagged context records as a tab-delimited BED-like artefact.
pub fn write_contexts(records: &[ContextRecord], path: &Path) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    for r in records {
        let triplet = r
            .triplet
            .map_or_else(|| "NNN".to_string(), |t| String::from_utf8_lossy(&t).to_string());
        let flag = match r.flag {
            ContextFlag::Good => "GOOD",
            ContextFlag::Fail => "FAIL",
        };
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            r.chrom, r.start, r.end, r.ref_allele as char, r.alt_allele as char, triplet, flag
        )?;
    }
    w.flush()?;
    Ok(())
}

/// Write a spectrum as `channel_name\tcount`, zero channels included so
/// the artefact is fixed-width per model.
pub fn write_spectrum(spectrum: &Spectrum, path: &Path) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    for (channel, &count) in spectrum.counts().iter().enumerate() {
        let name = match spectrum.model() {
            SubstitutionModel::Ssb192 => channel_name(channel),
            SubstitutionModel::Ssb7 => format!("{}", channel + 1),
        };
        writeln!(w, "{name}\t{count}")?;
    }
    w.flush()?;
    Ok(())
}

/// Read a spectrum written by [`write_spectrum`].
pub fn read_spectrum(path: &Path, model: SubstitutionModel) -> Result<Spectrum, Error> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut spectrum = Spectrum::new(model);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let bad = || {
            Error::Parse(format!(
                "{}:{}: malformed spectrum record",
                path.display(),
                lineno + 1
            ))
        };
        let (name, count) = line.split_once('\t').ok_or_else(bad)?;
        let count: u64 = count.trim().parse().map_err(|_| bad())?;
        let channel = match model {
            SubstitutionModel::Ssb192 => {
                let (triplet, alt) = name.split_once('>').ok_or_else(bad)?;
                channel_id(triplet.as_bytes(), *alt.as_bytes().first().ok_or_else(bad)?)
                    .ok_or_else(bad)?
            }
            SubstitutionModel::Ssb7 => {
                let class: usize = name.trim().parse().map_err(|_| bad())?;
                if class == 0 || class > SSB7_CLASSES {
                    return Err(bad());
                }
                class - 1
            }
        };
        for _ in 0..count {
            spectrum.increment(channel);
        }
    }
    Ok(spectrum)
}
