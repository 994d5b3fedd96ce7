//! Parser for FASTA sequence files, plain or gzip-compressed.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::Error;

/// Reads a FASTA file, transparently decompressing when the path ends in `.gz`,
/// and yields (identifier, sequence) pairs.
pub fn read_fasta(path: &Path) -> Result<Vec<(String, Vec<u8>)>, Error> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|e| e == "gz") {
        parse_fasta(BufReader::new(GzDecoder::new(file)))
    } else {
        parse_fasta(BufReader::new(file))
    }
}

/// Reads gzip-compressed FASTA and yields (identifier, sequence) pairs.
pub fn parse_fasta_gz<R: Read>(reader: R) -> Result<Vec<(String, Vec<u8>)>, Error> {
    let decoder = GzDecoder::new(reader);
    let buf_reader = BufReader::new(decoder);
    parse_fasta(buf_reader)
}

/// Reads FASTA from a buffered reader and yields (identifier, sequence) pairs.
///
/// The identifier is the first whitespace-delimited token after `>`.
/// Sequence bases are uppercased.
pub fn parse_fasta<R: BufRead>(reader: R) -> Result<Vec<(String, Vec<u8>)>, Error> {
    let mut results: Vec<(String, Vec<u8>)> = Vec::new();
    let mut current_id: Option<String> = None;
    let mut current_sequence: Vec<u8> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.starts_with('>') {
            // Finish previous record
            if let Some(id) = current_id.take() {
                results.push((id, current_sequence));
                current_sequence = Vec::new();
            }
            current_id = Some(extract_identifier(&line)?);
        } else if current_id.is_some() {
            let trimmed = line.trim();
            let start = current_sequence.len();
            current_sequence.extend_from_slice(trimmed.as_bytes());
            current_sequence[start..].make_ascii_uppercase();
        }
    }

    // Don't forget the last record
    if let Some(id) = current_id {
        results.push((id, current_sequence));
    }

    Ok(results)
}

/// Extracts the identifier from a FASTA header line: the first
/// whitespace-delimited token after `>`, with any Ensembl-style version
/// suffix kept as-is.
fn extract_identifier(header: &str) -> Result<String, Error> {
    let header = header.trim_start_matches('>');
    let first_token = header.split_whitespace().next().unwrap_or("");
    if first_token.is_empty() {
        return Err(Error::Parse(format!("empty FASTA header: >{header}")));
    }
    Ok(first_token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn make_gz(content: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(content).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn parse_single_sequence() {
        let fasta = b">ENST00000371953 cds chromosome:GRCh38:10\nACGTacgt\nNNNN\n";
        let gz = make_gz(fasta);
        let results = parse_fasta_gz(std::io::Cursor::new(gz)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "ENST00000371953");
        assert_eq!(results[0].1, b"ACGTACGTNNNN");
    }

    #[test]
    fn parse_multiple_sequences() {
        let fasta = b">T1\nACGT\n>T2\nTTTT\nAAAA\n>T3\nGGG\n";
        let results = parse_fasta(std::io::Cursor::new(&fasta[..])).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, "T1");
        assert_eq!(results[0].1, b"ACGT");
        assert_eq!(results[1].0, "T2");
        assert_eq!(results[1].1, b"TTTTAAAA");
        assert_eq!(results[2].0, "T3");
        assert_eq!(results[2].1, b"GGG");
    }

    #[test]
    fn uppercase_bases() {
        let fasta = b">seq1\nacgtACGTnN\n";
        let results = parse_fasta(std::io::Cursor::new(&fasta[..])).unwrap();
        assert_eq!(results[0].1, b"ACGTACGTNN");
    }

    #[test]
    fn read_fasta_sniffs_gz_extension() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("t.fa");
        std::fs::write(&plain, ">A\nACGT\n").unwrap();
        let results = read_fasta(&plain).unwrap();
        assert_eq!(results[0].1, b"ACGT");

        let gzpath = dir.path().join("t.fa.gz");
        let mut encoder =
            GzEncoder::new(File::create(&gzpath).unwrap(), Compression::fast());
        encoder.write_all(b">A\nACGT\n").unwrap();
        encoder.finish().unwrap();
        let results = read_fasta(&gzpath).unwrap();
        assert_eq!(results[0].1, b"ACGT");
    }

    #[test]
    fn empty_header_is_error() {
        let fasta = b">\nACGT\n";
        assert!(parse_fasta(std::io::Cursor::new(&fasta[..])).is_err());
    }
}
