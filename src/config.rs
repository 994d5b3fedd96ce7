//! Run configuration: every pipeline branch is decided once here, then
//! the stage graph executes without further option lookups.

use std::env;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::channels::SubstitutionModel;
use crate::error::Error;

/// Cache root override, checked once at startup.
pub const CACHE_ROOT_ENV: &str = "CACHE_ROOT";

const DEFAULT_SEED: u64 = 1234;

/// Immutable configuration for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub analysis_name: String,
    /// Annotated mutation file.
    pub input: PathBuf,
    /// Target BED in protein coordinates.
    pub bed_file: PathBuf,
    pub cache_dir: PathBuf,
    pub use_ssb192: bool,
    pub use_random: bool,
    /// Confine random placement to these regions when set.
    pub random_regions: Option<PathBuf>,
    pub exclude_drivers: bool,
    pub drivers_list: Option<PathBuf>,
    pub seed: u64,
    /// CDS lengths table (nt).
    pub transcript_lengths: PathBuf,
    /// Protein lengths table (aa).
    pub protein_lengths: PathBuf,
    pub transcript_fasta: PathBuf,
    pub genome_fasta: PathBuf,
    pub chrom_sizes: PathBuf,
    pub species: String,
    pub assembly: String,
    pub release: u32,
    /// When false, a stage refuses to replace an existing artefact.
    pub overwrite: bool,
}

impl RunConfig {
    #[must_use]
    pub fn model(&self) -> SubstitutionModel {
        if self.use_ssb192 {
            SubstitutionModel::Ssb192
        } else {
            SubstitutionModel::Ssb7
        }
    }

    /// Default seed used when the CLI does not supply one.
    #[must_use]
    pub fn default_seed() -> u64 {
        DEFAULT_SEED
    }

    /// Cache root: `$CACHE_ROOT` when set, otherwise the given default.
    #[must_use]
    pub fn cache_root(fallback: &Path) -> PathBuf {
        env::var_os(CACHE_ROOT_ENV)
            .map_or_else(|| fallback.to_path_buf(), PathBuf::from)
    }

    /// Cache artefact path: `{cache_dir}/{analysis}.{stage}.{ext}`.
    #[must_use]
    pub fn artefact(&self, stage: &str, ext: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{stage}.{ext}", self.analysis_name))
    }

    /// Path of the final results table.
    #[must_use]
    pub fn results_path(&self) -> PathBuf {
        self.artefact("results", "tsv")
    }

    /// Serialise the configuration snapshot next to the run's artefacts.
    pub fn save_snapshot(&self) -> Result<PathBuf, Error> {
        let path = self.artefact("config", "json");
        let file = File::create(&path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| Error::Validation(format!("cannot serialise config: {e}")))?;
        Ok(path)
    }

    /// Read a snapshot written by [`RunConfig::save_snapshot`].
    pub fn load_snapshot(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Parse(format!("{}: {e}", path.display())))
    }

    /// Check that every configured input file exists before any stage
    /// runs.
    pub fn validate(&self) -> Result<(), Error> {
        let mut required: Vec<&Path> = vec![
            &self.input,
            &self.bed_file,
            &self.transcript_lengths,
            &self.protein_lengths,
            &self.transcript_fasta,
            &self.genome_fasta,
            &self.chrom_sizes,
        ];
        if let Some(regions) = &self.random_regions {
            required.push(regions);
        }
        if self.exclude_drivers {
            match &self.drivers_list {
                Some(list) => required.push(list),
                None => {
                    return Err(Error::Validation(
                        "driver exclusion enabled but no drivers list given".to_string(),
                    ));
                }
            }
        }
        for path in required {
            if !path.is_file() {
                return Err(Error::MissingData {
                    stage: "Configure".to_string(),
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(())
    }
}
