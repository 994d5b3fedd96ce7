use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use aria::assembly::GenomeAssembly;
use aria::cli;
use aria::config::RunConfig;
use aria::stage;

#[derive(Parser)]
#[command(
    name = "aria",
    about = "ON/OFF dN/dS selection test for annotated somatic mutations"
)]
struct Cli {
    /// Annotated mutation file (VEP tab-delimited output)
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Target regions BED in protein coordinates
    #[arg(short = 'b', long = "bed_file")]
    bed_file: PathBuf,

    /// Cache directory for run artefacts
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Analysis name used to prefix every artefact
    #[arg(short = 'n', long = "name")]
    name: String,

    /// Use the 192-channel substitution model instead of the 7-channel one
    #[arg(long = "use_ssb192")]
    use_ssb192: bool,

    /// Shuffle the target regions before analysis
    #[arg(long = "use_random")]
    use_random: bool,

    /// Confine shuffled placement to these regions (BED, protein coordinates)
    #[arg(long = "random_regions")]
    random_regions: Option<PathBuf>,

    /// Keep known driver transcripts in the comparison space
    #[arg(long = "keep_drivers")]
    keep_drivers: bool,

    /// List of driver transcripts to exclude (one id per line)
    #[arg(long = "drivers")]
    drivers: Option<PathBuf>,

    /// Seed for the region shuffle
    #[arg(long = "seed")]
    seed: Option<u64>,

    /// CDS length table (transcript, length in nt)
    #[arg(long = "transcript")]
    transcript: PathBuf,

    /// Protein length table (transcript, length in aa)
    #[arg(long = "protein_transcript")]
    protein_transcript: PathBuf,

    /// Transcript CDS FASTA, plain or gzip-compressed
    #[arg(long = "fasta")]
    fasta: PathBuf,

    /// Species name as used in reference file naming
    #[arg(long = "species", default_value = "homo_sapiens")]
    species: String,

    /// Genome assembly (GRCh37, GRCh38, GRCm38, GRCm39)
    #[arg(long = "assembly", default_value = "GRCh38")]
    assembly: String,

    /// Ensembl release of the reference data
    #[arg(long = "release", default_value_t = 110)]
    release: u32,

    /// Replace existing artefacts instead of refusing to overwrite
    #[arg(long = "overwrite")]
    overwrite: bool,
}

fn main() -> Result<()> {
    let start = Instant::now();
    let cli_args = Cli::parse();

    cli::banner("Selection Analysis");

    // ── Configuration ────────────────────────────────────
    cli::section("Configuration");

    let assembly: GenomeAssembly = cli_args.assembly.parse()?;
    let data_root = RunConfig::cache_root(&PathBuf::from("data"));
    let reference_stem = format!("{}.{assembly}.{}", cli_args.species, cli_args.release);
    let genome_fasta = data_root.join(format!("{reference_stem}.dna.fa"));
    let chrom_sizes = data_root.join(format!("{reference_stem}.sizes"));

    let config = RunConfig {
        analysis_name: cli_args.name.clone(),
        input: cli_args.input,
        bed_file: cli_args.bed_file,
        cache_dir: cli_args.output,
        use_ssb192: cli_args.use_ssb192,
        use_random: cli_args.use_random,
        random_regions: cli_args.random_regions,
        exclude_drivers: !cli_args.keep_drivers,
        drivers_list: cli_args.drivers,
        seed: cli_args.seed.unwrap_or_else(RunConfig::default_seed),
        transcript_lengths: cli_args.transcript,
        protein_lengths: cli_args.protein_transcript,
        transcript_fasta: cli_args.fasta,
        genome_fasta,
        chrom_sizes,
        species: cli_args.species,
        assembly: assembly.to_string(),
        release: cli_args.release,
        overwrite: cli_args.overwrite,
    };

    cli::kv("Analysis", &config.analysis_name);
    cli::kv("Input", &config.input.display().to_string());
    cli::kv("Target BED", &config.bed_file.display().to_string());
    cli::kv("Cache dir", &config.cache_dir.display().to_string());
    cli::kv("Model", &config.model().to_string());
    cli::kv(
        "Reference",
        &format!("{} {assembly} release {}", config.species, config.release),
    );
    if config.use_random {
        cli::kv("Shuffle seed", &config.seed.to_string());
    }
    if config.exclude_drivers {
        let list = config
            .drivers_list
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none given)".to_string());
        cli::kv("Driver exclusion", &list);
    } else {
        cli::kv("Driver exclusion", &"off".dimmed().to_string());
    }

    eprintln!();

    // ── Stages ───────────────────────────────────────────
    cli::section("Stages");

    let results_path = stage::run_pipeline(&config)
        .with_context(|| format!("analysis '{}' failed", config.analysis_name))?;

    eprintln!();

    // ── Results ──────────────────────────────────────────
    cli::section("Results");

    let results = fs::read_to_string(&results_path)
        .with_context(|| format!("cannot read results: {}", results_path.display()))?;
    for line in results.lines().skip(1) {
        let mut fields = line.split('\t');
        let coverage = fields.next().unwrap_or_default();
        let kaks_on = fields.next().unwrap_or_default();
        let pvalue = line.split('\t').nth(9).unwrap_or_default();
        cli::kv(
            coverage,
            &format!("ON dN/dS {} (p = {})", kaks_on.bold(), pvalue),
        );
    }
    cli::success(&format!("results written to {}", results_path.display()));

    // ── Summary ──────────────────────────────────────────
    cli::print_summary(start);
    Ok(())
}
