//! Transcript length catalogue: CDS lengths (nt) and protein lengths (aa),
//! filtered to the transcripts an input BED actually references.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Error;
use crate::interval::IntervalSet;

/// Filtered transcript catalogue.
///
/// Both maps hold exactly the same transcript ids after filtering; the CDS
/// length is 3x the protein length for every entry.
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    cds_lengths: BTreeMap<String, u64>,
    protein_lengths: BTreeMap<String, u64>,
}

impl Catalogue {
    /// Load the two `transcript\tlength` tables and keep only transcripts
    /// referenced by `bed`. Unknown BED transcripts are reported back for
    /// logging; they are dropped, not fatal.
    pub fn load_filtered(
        cds_table: &Path,
        protein_table: &Path,
        bed: &IntervalSet,
    ) -> Result<(Self, Vec<String>), Error> {
        let cds_all = read_length_table(cds_table)?;
        let protein_all = read_length_table(protein_table)?;

        let mut catalogue = Catalogue::default();
        let mut missing: Vec<String> = Vec::new();

        for transcript in bed.transcripts() {
            let (Some(&cds), Some(&protein)) =
                (cds_all.get(transcript), protein_all.get(transcript))
            else {
                missing.push(transcript.to_string());
                continue;
            };
            catalogue.insert_checked(transcript, cds, protein)?;
        }

        Ok((catalogue, missing))
    }

    /// Load every transcript present in both tables. Transcripts
    /// appearing in only one table are dropped silently; inconsistent
    /// entries are fatal.
    pub fn load_all(cds_table: &Path, protein_table: &Path) -> Result<Self, Error> {
        let cds_all = read_length_table(cds_table)?;
        let protein_all = read_length_table(protein_table)?;

        let mut catalogue = Catalogue::default();
        for (transcript, &cds) in &cds_all {
            if let Some(&protein) = protein_all.get(transcript) {
                catalogue.insert_checked(transcript, cds, protein)?;
            }
        }
        Ok(catalogue)
    }

    fn insert_checked(&mut self, transcript: &str, cds: u64, protein: u64) -> Result<(), Error> {
        if cds % 3 != 0 {
            return Err(Error::Validation(format!(
                "CDS length {cds} of {transcript} is not a multiple of 3"
            )));
        }
        if cds != protein * 3 {
            return Err(Error::Validation(format!(
                "inconsistent lengths for {transcript}: CDS {cds} nt vs protein {protein} aa"
            )));
        }
        self.cds_lengths.insert(transcript.to_string(), cds);
        self.protein_lengths.insert(transcript.to_string(), protein);
        Ok(())
    }

    /// Drop a set of transcripts, returning how many were removed.
    pub fn remove_transcripts(&mut self, excluded: &BTreeSet<String>) -> usize {
        let before = self.cds_lengths.len();
        self.cds_lengths.retain(|t, _| !excluded.contains(t));
        self.protein_lengths.retain(|t, _| !excluded.contains(t));
        before - self.cds_lengths.len()
    }

    #[must_use]
    pub fn cds_lengths(&self) -> &BTreeMap<String, u64> {
        &self.cds_lengths
    }

    #[must_use]
    pub fn protein_lengths(&self) -> &BTreeMap<String, u64> {
        &self.protein_lengths
    }

    #[must_use]
    pub fn cds_length(&self, transcript: &str) -> Option<u64> {
        self.cds_lengths.get(transcript).copied()
    }

    #[must_use]
    pub fn transcripts(&self) -> BTreeSet<String> {
        self.cds_lengths.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cds_lengths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cds_lengths.is_empty()
    }
}

/// Read a two-column `transcript\tlength` table.
fn read_length_table(path: &Path) -> Result<BTreeMap<String, u64>, Error> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut table = BTreeMap::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split('\t');
        let transcript = fields.next().unwrap_or_default();
        let length: u64 = fields
            .next()
            .and_then(|f| f.trim().parse().ok())
            .ok_or_else(|| {
                Error::Parse(format!(
                    "{}:{}: expected numeric transcript length",
                    path.display(),
                    lineno + 1
                ))
            })?;
        if transcript.is_empty() {
            return Err(Error::Parse(format!(
                "{}:{}: empty transcript id",
                path.display(),
                lineno + 1
            )));
        }
        table.insert(transcript.to_string(), length);
    }
    Ok(table)
}
