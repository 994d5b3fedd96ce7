//! In-memory reference genome with chromosome-size bookkeeping, used for
//! trinucleotide context lookups.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Error;
use crate::fasta::read_fasta;

/// Reference genome loaded from FASTA plus a `chrom\tsize` table.
#[derive(Debug, Clone, Default)]
pub struct Genome {
    chromosomes: BTreeMap<String, Vec<u8>>,
    sizes: BTreeMap<String, u64>,
}

impl Genome {
    /// Load the genome FASTA (plain or gz) and the chromosome-size table.
    ///
    /// Every FASTA record must appear in the size table with a matching
    /// length.
    pub fn load(fasta: &Path, sizes: &Path) -> Result<Self, Error> {
        let sizes = read_size_table(sizes)?;
        let mut chromosomes = BTreeMap::new();
        for (id, sequence) in read_fasta(fasta)? {
            match sizes.get(&id) {
                Some(&size) if size == sequence.len() as u64 => {}
                Some(&size) => {
                    return Err(Error::Validation(format!(
                        "chromosome {id}: FASTA length {} disagrees with size table {size}",
                        sequence.len()
                    )));
                }
                None => {
                    return Err(Error::Validation(format!(
                        "chromosome {id} missing from size table"
                    )));
                }
            }
            chromosomes.insert(id, sequence);
        }
        Ok(Self { chromosomes, sizes })
    }

    /// Build a genome directly from records, sizes taken from the
    /// sequences themselves.
    #[must_use]
    pub fn from_records(records: Vec<(String, Vec<u8>)>) -> Self {
        let mut genome = Self::default();
        for (id, sequence) in records {
            genome.sizes.insert(id.clone(), sequence.len() as u64);
            genome.chromosomes.insert(id, sequence);
        }
        genome
    }

    /// Fetch `[start, end)` of a chromosome, or None when the chromosome
    /// is unknown or the range runs off either end.
    #[must_use]
    pub fn fetch(&self, chrom: &str, start: u64, end: u64) -> Option<&[u8]> {
        let sequence = self.chromosomes.get(chrom)?;
        if start >= end || end > sequence.len() as u64 {
            return None;
        }
        Some(&sequence[start as usize..end as usize])
    }

    /// Reference trinucleotide centred on a 1-based position.
    ///
    /// None at chromosome ends where a full flank does not exist.
    #[must_use]
    pub fn trinucleotide(&self, chrom: &str, position: u64) -> Option<[u8; 3]> {
        if position < 2 {
            return None;
        }
        let triplet = self.fetch(chrom, position - 2, position + 1)?;
        Some([triplet[0], triplet[1], triplet[2]])
    }

    #[must_use]
    pub fn size(&self, chrom: &str) -> Option<u64> {
        self.sizes.get(chrom).copied()
    }

    #[must_use]
    pub fn chromosome_count(&self) -> usize {
        self.chromosomes.len()
    }
}

/// Read a two-column `chrom\tsize` table.
fn read_size_table(path: &Path) -> Result<BTreeMap<String, u64>, Error> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut sizes = BTreeMap::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split('\t');
        let chrom = fields.next().unwrap_or_default();
        let size: u64 = fields
            .next()
            .and_then(|f| f.trim().parse().ok())
            .ok_or_else(|| {
                Error::Parse(format!(
                    "{}:{}: expected numeric chromosome size",
                    path.display(),
                    lineno + 1
                ))
            })?;
        if chrom.is_empty() {
            return Err(Error::Parse(format!(
                "{}:{}: empty chromosome name",
                path.display(),
                lineno + 1
            )));
        }
        sizes.insert(chrom.to_string(), size);
    }
    Ok(sizes)
}
