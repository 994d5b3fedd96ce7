//! Parsing of the tab-delimited annotated mutation file.
//!
//! One mutation per line, VEP-style columns: uploaded variation
//! (`chrom_pos_ref/alt`), location (`chrom:pos`), allele, gene,
//! transcript, feature type, consequence, cDNA position, CDS position,
//! protein position, amino-acid change, codon change, existing
//! variation, extra (`key=value;...`).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Error;

/// One annotated mutation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub chrom: String,
    /// 1-based genomic position.
    pub position: u64,
    pub ref_allele: String,
    pub alt_allele: String,
    pub gene: String,
    pub transcript: String,
    pub feature_type: String,
    pub consequence: String,
    pub cds_position: Option<u64>,
    /// 1-based residue index within the protein.
    pub protein_position: Option<u64>,
    pub ref_codon: Option<String>,
    pub alt_codon: Option<String>,
    pub symbol: Option<String>,
}

impl MutationRecord {
    /// True when the codon change describes a single-base substitution:
    /// both codons present, length 3, and the alt allele a single
    /// non-`-` base.
    #[must_use]
    pub fn is_substitution(&self) -> bool {
        let codons_ok = matches!(
            (&self.ref_codon, &self.alt_codon),
            (Some(r), Some(a)) if r.len() == 3 && a.len() == 3
        );
        codons_ok
            && self.ref_allele.len() == 1
            && self.alt_allele.len() == 1
            && self.alt_allele != "-"
            && self.ref_allele != "-"
    }

    /// Zero-based protein start of the residue this mutation hits.
    #[must_use]
    pub fn protein_start(&self) -> Option<u64> {
        self.protein_position.map(|p| p.saturating_sub(1))
    }
}

/// Strip simulation artefacts so simulated and observed files parse the
/// same way: a `sim_` prefix on the uploaded-variation id.
#[must_use]
pub fn fix_simulated(line: &str) -> &str {
    line.strip_prefix("sim_").unwrap_or(line)
}

/// Read the whole annotated file, skipping headers and comment lines.
pub fn read_mutations(path: &Path) -> Result<Vec<MutationRecord>, Error> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let source = path.display().to_string();
    let mut records = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if let Some(record) = parse_line(fix_simulated(line.trim_end()), &source, lineno)? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Parse one annotated line; None for comments and blank lines.
pub fn parse_line(
    line: &str,
    source: &str,
    lineno: usize,
) -> Result<Option<MutationRecord>, Error> {
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 12 {
        return Err(Error::Parse(format!(
            "{source}:{}: expected at least 12 columns, found {}",
            lineno + 1,
            fields.len()
        )));
    }

    let (ref_allele, alt_allele) = parse_uploaded_alleles(fields[0], source, lineno)?;
    let (chrom, position) = parse_location(fields[1], source, lineno)?;
    let (ref_codon, alt_codon) = parse_codons(fields[11]);

    Ok(Some(MutationRecord {
        chrom,
        position,
        ref_allele,
        alt_allele,
        gene: fields[3].to_string(),
        transcript: fields[4].to_string(),
        feature_type: fields[5].to_string(),
        consequence: fields[6].to_string(),
        cds_position: parse_numeric_position(fields[8]),
        protein_position: parse_numeric_position(fields[9]),
        ref_codon,
        alt_codon,
        symbol: fields.get(13).and_then(|extra| parse_symbol(extra)),
    }))
}

/// `chrom_pos_ref/alt` from the uploaded-variation column.
fn parse_uploaded_alleles(
    field: &str,
    source: &str,
    lineno: usize,
) -> Result<(String, String), Error> {
    let bad = || {
        Error::Parse(format!(
            "{source}:{}: malformed uploaded variation: {field}",
            lineno + 1
        ))
    };
    let (_, alleles) = field.rsplit_once('_').ok_or_else(bad)?;
    let (r, a) = alleles.split_once('/').ok_or_else(bad)?;
    if r.is_empty() || a.is_empty() {
        return Err(bad());
    }
    Ok((r.to_ascii_uppercase(), a.to_ascii_uppercase()))
}

/// `chrom:pos` or `chrom:start-end`; the first coordinate is used.
fn parse_location(field: &str, source: &str, lineno: usize) -> Result<(String, u64), Error> {
    let bad = || {
        Error::Parse(format!(
            "{source}:{}: malformed location: {field}",
            lineno + 1
        ))
    };
    let (chrom, pos) = field.split_once(':').ok_or_else(bad)?;
    let pos = pos.split('-').next().ok_or_else(bad)?;
    let position: u64 = pos.parse().map_err(|_| bad())?;
    if chrom.is_empty() {
        return Err(bad());
    }
    Ok((chrom.to_string(), position))
}

/// VEP codon column `gcC/gcA`; `-` when absent.
fn parse_codons(field: &str) -> (Option<String>, Option<String>) {
    match field.split_once('/') {
        Some((r, a)) if r != "-" && a != "-" => {
            (Some(r.to_ascii_uppercase()), Some(a.to_ascii_uppercase()))
        }
        _ => (None, None),
    }
}

/// Positions may be `-`, a plain number, or a `start-end` range.
fn parse_numeric_position(field: &str) -> Option<u64> {
    field.split('-').next().and_then(|f| f.parse().ok())
}

/// `SYMBOL=<gene>` from the `key=value;...` extra column.
fn parse_symbol(extra: &str) -> Option<String> {
    extra.split(';').find_map(|kv| {
        kv.split_once('=')
            .filter(|(k, _)| *k == "SYMBOL")
            .map(|(_, v)| v.to_string())
    })
}
