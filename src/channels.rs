//! Trinucleotide substitution channels.
//!
//! A channel is a `(reference_triplet, alt_base)` pair where the alt
//! replaces the centre base. With 64 triplets and 3 non-degenerate alts
//! per triplet there are 192 strand-aware channels (SSB192). The SSB7
//! model folds these into 7 classes through a fixed translation table
//! shipped with the crate.

use std::fmt;
use std::str::FromStr;

use crate::codon::base_to_index;
use crate::error::Error;

/// Number of strand-aware `(triplet, alt)` channels.
pub const SSB192_CHANNELS: usize = 192;

/// Number of folded substitution classes.
pub const SSB7_CLASSES: usize = 7;

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

static SSB7_TABLE_TSV: &str = include_str!("../data/final_translate_SSB192toSSB7.tsv");

/// Substitution model selecting the channel resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstitutionModel {
    Ssb192,
    Ssb7,
}

impl SubstitutionModel {
    /// Number of spectrum channels under this model.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        match self {
            Self::Ssb192 => SSB192_CHANNELS,
            Self::Ssb7 => SSB7_CLASSES,
        }
    }

    /// Nucleotides of left context added when transforming protein
    /// intervals to CDS intervals. SSB192 keeps a full codon on each
    /// side to retain the trinucleotide context of the edge residues.
    #[must_use]
    pub fn context_pad(&self) -> u64 {
        match self {
            Self::Ssb192 => 6,
            Self::Ssb7 => 3,
        }
    }
}

impl FromStr for SubstitutionModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ssb192" => Ok(Self::Ssb192),
            "ssb7" => Ok(Self::Ssb7),
            _ => Err(Error::Parse(format!(
                "unknown substitution model: {s} (expected ssb192 or ssb7)"
            ))),
        }
    }
}

impl fmt::Display for SubstitutionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ssb192 => write!(f, "ssb192"),
            Self::Ssb7 => write!(f, "ssb7"),
        }
    }
}

/// Channel id for a `(triplet, alt)` pair, lexicographic in the pair.
///
/// Returns None for ambiguous bases or a degenerate alt equal to the
/// centre base.
#[must_use]
pub fn channel_id(triplet: &[u8], alt: u8) -> Option<usize> {
    if triplet.len() != 3 {
        return None;
    }
    let t0 = base_to_index(triplet[0])?;
    let t1 = base_to_index(triplet[1])?;
    let t2 = base_to_index(triplet[2])?;
    let a = base_to_index(alt)?;
    if a == t1 {
        return None;
    }
    // Rank of the alt among the three bases that differ from the centre.
    let rank = if a < t1 { a } else { a - 1 };
    Some((t0 * 16 + t1 * 4 + t2) * 3 + rank)
}

/// Human-readable `TRIPLET>ALT` name for a channel id.
#[must_use]
pub fn channel_name(id: usize) -> String {
    let triplet_index = id / 3;
    let rank = id % 3;
    let t0 = BASES[triplet_index / 16];
    let t1 = BASES[(triplet_index / 4) % 4];
    let t2 = BASES[triplet_index % 4];
    let centre = (triplet_index / 4) % 4;
    let alt_index = if rank < centre { rank } else { rank + 1 };
    format!(
        "{}{}{}>{}",
        t0 as char, t1 as char, t2 as char, BASES[alt_index] as char
    )
}

/// SSB192 to SSB7 folding table.
#[derive(Debug, Clone)]
pub struct Ssb7Table {
    classes: [u8; SSB192_CHANNELS],
}

impl Ssb7Table {
    /// Parse the embedded translation table.
    pub fn embedded() -> Result<Self, Error> {
        let mut classes = [0u8; SSB192_CHANNELS];
        let mut seen = [false; SSB192_CHANNELS];
        for (lineno, line) in SSB7_TABLE_TSV.lines().enumerate() {
            let mut fields = line.split('\t');
            let (Some(triplet), Some(alt), Some(class)) =
                (fields.next(), fields.next(), fields.next())
            else {
                return Err(Error::Parse(format!(
                    "ssb7 table line {}: expected 3 fields",
                    lineno + 1
                )));
            };
            let alt = alt.as_bytes().first().copied().unwrap_or(b'?');
            let id = channel_id(triplet.as_bytes(), alt).ok_or_else(|| {
                Error::Parse(format!(
                    "ssb7 table line {}: invalid channel {triplet}>{}",
                    lineno + 1,
                    alt as char
                ))
            })?;
            let class: u8 = class.trim().parse().map_err(|_| {
                Error::Parse(format!("ssb7 table line {}: bad class", lineno + 1))
            })?;
            if class == 0 || class as usize > SSB7_CLASSES {
                return Err(Error::Parse(format!(
                    "ssb7 table line {}: class {class} out of range",
                    lineno + 1
                )));
            }
            classes[id] = class;
            seen[id] = true;
        }
        if seen.iter().any(|s| !s) {
            return Err(Error::Parse(
                "ssb7 table does not cover all 192 channels".to_string(),
            ));
        }
        Ok(Self { classes })
    }

    /// Zero-based class index (0..7) of a 192-channel id.
    #[must_use]
    pub fn class_of(&self, channel: usize) -> usize {
        (self.classes[channel] - 1) as usize
    }
}

/// Per-channel counts under a substitution model.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    model: SubstitutionModel,
    counts: Vec<u64>,
}

impl Spectrum {
    #[must_use]
    pub fn new(model: SubstitutionModel) -> Self {
        Self {
            model,
            counts: vec![0; model.channel_count()],
        }
    }

    #[must_use]
    pub fn model(&self) -> SubstitutionModel {
        self.model
    }

    pub fn increment(&mut self, channel: usize) {
        self.counts[channel] += 1;
    }

    #[must_use]
    pub fn count(&self, channel: usize) -> u64 {
        self.counts[channel]
    }

    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    #[must_use]
    pub fn non_zero_channels(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Fold a 192-channel spectrum into the 7 SSB7 classes.
    #[must_use]
    pub fn fold(&self, table: &Ssb7Table) -> Spectrum {
        let mut folded = Spectrum::new(SubstitutionModel::Ssb7);
        for (channel, &count) in self.counts.iter().enumerate() {
            folded.counts[table.class_of(channel)] += count;
        }
        folded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_ids_are_lexicographic_and_dense() {
        assert_eq!(channel_id(b"AAA", b'C'), Some(0));
        assert_eq!(channel_id(b"AAA", b'G'), Some(1));
        assert_eq!(channel_id(b"AAA", b'T'), Some(2));
        assert_eq!(channel_id(b"AAC", b'C'), Some(3));
        assert_eq!(channel_id(b"TTT", b'G'), Some(191));
    }

    #[test]
    fn degenerate_and_ambiguous_channels_are_none() {
        assert_eq!(channel_id(b"ACA", b'C'), None);
        assert_eq!(channel_id(b"ANA", b'C'), None);
        assert_eq!(channel_id(b"ACA", b'N'), None);
        assert_eq!(channel_id(b"AC", b'G'), None);
    }

    #[test]
    fn channel_name_round_trips() {
        for id in 0..SSB192_CHANNELS {
            let name = channel_name(id);
            let (triplet, alt) = name.split_once('>').unwrap();
            assert_eq!(channel_id(triplet.as_bytes(), alt.as_bytes()[0]), Some(id));
        }
    }

    #[test]
    fn embedded_table_covers_all_channels() {
        let table = Ssb7Table::embedded().unwrap();
        let mut hit = [false; SSB7_CLASSES];
        for channel in 0..SSB192_CHANNELS {
            hit[table.class_of(channel)] = true;
        }
        assert!(hit.iter().all(|&h| h));
    }

    #[test]
    fn folding_is_strand_symmetric() {
        // ACA>T and its reverse complement TGT>A share a class.
        let table = Ssb7Table::embedded().unwrap();
        let fwd = channel_id(b"ACA", b'T').unwrap();
        let rev = channel_id(b"TGT", b'A').unwrap();
        assert_eq!(table.class_of(fwd), table.class_of(rev));
    }

    #[test]
    fn cpg_transition_has_its_own_class() {
        let table = Ssb7Table::embedded().unwrap();
        let cpg = channel_id(b"ACG", b'T').unwrap();
        let non_cpg = channel_id(b"ACA", b'T').unwrap();
        assert_ne!(table.class_of(cpg), table.class_of(non_cpg));
    }

    #[test]
    fn spectrum_fold_preserves_total() {
        let table = Ssb7Table::embedded().unwrap();
        let mut spectrum = Spectrum::new(SubstitutionModel::Ssb192);
        spectrum.increment(channel_id(b"ACG", b'T').unwrap());
        spectrum.increment(channel_id(b"ACG", b'T').unwrap());
        spectrum.increment(channel_id(b"TTT", b'G').unwrap());
        let folded = spectrum.fold(&table);
        assert_eq!(folded.total(), 3);
        assert_eq!(folded.model(), SubstitutionModel::Ssb7);
        assert_eq!(folded.non_zero_channels(), 2);
    }

    #[test]
    fn model_parsing() {
        assert_eq!(
            "SSB192".parse::<SubstitutionModel>().unwrap(),
            SubstitutionModel::Ssb192
        );
        assert_eq!(
            "ssb7".parse::<SubstitutionModel>().unwrap(),
            SubstitutionModel::Ssb7
        );
        assert!("ssb5".parse::<SubstitutionModel>().is_err());
        assert_eq!(SubstitutionModel::Ssb192.context_pad(), 6);
        assert_eq!(SubstitutionModel::Ssb7.context_pad(), 3);
    }
}
