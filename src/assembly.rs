//! Genome assembly identification for config validation and cache naming.

use std::fmt;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenomeAssembly {
    GRCh37,
    GRCh38,
    GRCm38,
    GRCm39,
}

impl std::str::FromStr for GenomeAssembly {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "grch37" => Ok(GenomeAssembly::GRCh37),
            "grch38" => Ok(GenomeAssembly::GRCh38),
            "grcm38" => Ok(GenomeAssembly::GRCm38),
            "grcm39" => Ok(GenomeAssembly::GRCm39),
            _ => Err(Error::Parse(format!("unrecognized genome assembly: {s}"))),
        }
    }
}

impl GenomeAssembly {
    /// Species the assembly belongs to, as used in Ensembl file naming.
    #[must_use]
    pub fn species(self) -> &'static str {
        match self {
            GenomeAssembly::GRCh37 | GenomeAssembly::GRCh38 => "homo_sapiens",
            GenomeAssembly::GRCm38 | GenomeAssembly::GRCm39 => "mus_musculus",
        }
    }
}

impl fmt::Display for GenomeAssembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenomeAssembly::GRCh37 => write!(f, "GRCh37"),
            GenomeAssembly::GRCh38 => write!(f, "GRCh38"),
            GenomeAssembly::GRCm38 => write!(f, "GRCm38"),
            GenomeAssembly::GRCm39 => write!(f, "GRCm39"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_from_string() {
        assert_eq!(
            "GRCh38".parse::<GenomeAssembly>().unwrap(),
            GenomeAssembly::GRCh38
        );
        assert_eq!(
            "grch37".parse::<GenomeAssembly>().unwrap(),
            GenomeAssembly::GRCh37
        );
        assert_eq!(
            "GRCM39".parse::<GenomeAssembly>().unwrap(),
            GenomeAssembly::GRCm39
        );
        assert!("hg19".parse::<GenomeAssembly>().is_err());
    }

    #[test]
    fn species_mapping() {
        assert_eq!(GenomeAssembly::GRCh38.species(), "homo_sapiens");
        assert_eq!(GenomeAssembly::GRCm39.species(), "mus_musculus");
    }

    #[test]
    fn display_round_trip() {
        for a in [
            GenomeAssembly::GRCh37,
            GenomeAssembly::GRCh38,
            GenomeAssembly::GRCm38,
            GenomeAssembly::GRCm39,
        ] {
            let s = a.to_string();
            assert_eq!(s.parse::<GenomeAssembly>().unwrap(), a);
        }
    }
}
