//! Context correction: rescale theoretical site counts by the empirical
//! channel spectrum.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::channels::Spectrum;
use crate::error::Error;
use crate::sites::TranscriptSites;

/// Context-corrected site totals for one transcript.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectedSites {
    pub nonsyn: f64,
    pub syn: f64,
}

/// Rescale each channel's theoretical site count by the empirical rate
/// `count[channel] / total` and sum over channels.
///
/// The resulting totals are expected mutability-weighted sites; they are
/// typically well below the raw counts and may drop under 1.
pub fn correct_sites(
    theoretical: &BTreeMap<String, TranscriptSites>,
    spectrum: &Spectrum,
) -> BTreeMap<String, CorrectedSites> {
    let total = spectrum.total() as f64;
    let mut corrected = BTreeMap::new();
    for (transcript, sites) in theoretical {
        let mut nonsyn = 0.0;
        let mut syn = 0.0;
        for (channel, &count) in spectrum.counts().iter().enumerate() {
            let rate = count as f64 / total;
            nonsyn += sites.nonsyn[channel] * rate;
            syn += sites.syn[channel] * rate;
        }
        corrected.insert(transcript.clone(), CorrectedSites { nonsyn, syn });
    }
    corrected
}

/// Sum corrected per-transcript sites into the scalar `(site_1, site_2)`
/// pair used as a dN/dS denominator.
#[must_use]
pub fn aggregate(corrected: &BTreeMap<String, CorrectedSites>) -> (f64, f64) {
    corrected.values().fold((0.0, 0.0), |(n, s), c| {
        (n + c.nonsyn, s + c.syn)
    })
}

/// Write corrected sites as `transcript\tnonsyn\tsyn`.
pub fn write_corrected(
    corrected: &BTreeMap<String, CorrectedSites>,
    path: &Path,
) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    for (transcript, sites) in corrected {
        writeln!(w, "{transcript}\t{}\t{}", sites.nonsyn, sites.syn)?;
    }
    w.flush()?;
    Ok(())
}

/// Read a table written by [`write_corrected`].
pub fn read_corrected(path: &Path) -> Result<BTreeMap<String, CorrectedSites>, Error> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut corrected = BTreeMap::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let bad = || {
            Error::Parse(format!(
                "{}:{}: malformed corrected-sites record",
                path.display(),
                lineno + 1
            ))
        };
        let fields: Vec<&str> = line.split('\t').collect();
        let [transcript, nonsyn, syn] = fields[..] else {
            return Err(bad());
        };
        let nonsyn: f64 = nonsyn.parse().map_err(|_| bad())?;
        let syn: f64 = syn.parse().map_err(|_| bad())?;
        corrected.insert(transcript.to_string(), CorrectedSites { nonsyn, syn });
    }
    Ok(corrected)
}
