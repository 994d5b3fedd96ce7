//! Reading and writing transcript-keyed BED records.
//!
//! The target BED is `transcript\tstart\tend` in protein coordinates,
//! half-open. Extra columns are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::Error;
use crate::interval::IntervalSet;

/// Parse a BED file into a canonical interval set.
pub fn read_bed(path: &Path) -> Result<IntervalSet, Error> {
    let file = File::open(path)?;
    parse_bed(BufReader::new(file), &path.display().to_string())
}

/// Parse BED records from a reader. `source` names the input in errors.
pub fn parse_bed<R: BufRead>(reader: R, source: &str) -> Result<IntervalSet, Error> {
    let mut records: Vec<(String, u64, u64)> = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split('\t');
        let transcript = fields
            .next()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Parse(format!("{source}:{}: empty record", lineno + 1)))?;
        let start = parse_coord(fields.next(), source, lineno)?;
        let end = parse_coord(fields.next(), source, lineno)?;
        records.push((transcript.to_string(), start, end));
    }
    IntervalSet::from_records(records)
}

fn parse_coord(field: Option<&str>, source: &str, lineno: usize) -> Result<u64, Error> {
    field
        .and_then(|f| f.trim().parse::<u64>().ok())
        .ok_or_else(|| {
            Error::Parse(format!(
                "{source}:{}: expected numeric BED coordinate",
                lineno + 1
            ))
        })
}

/// Write an interval set as a three-column BED in canonical order.
pub fn write_bed(set: &IntervalSet, path: &Path) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    for (transcript, iv) in set.iter() {
        writeln!(w, "{transcript}\t{}\t{}", iv.start, iv.end)?;
    }
    w.flush()?;
    Ok(())
}
