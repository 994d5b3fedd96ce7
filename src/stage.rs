//! Stage-graph orchestration: a total order of stages, each declaring
//! its input artefacts, checked before it runs so a failure surfaces at
//! the first missing input.
//!
//! Stages communicate exclusively through cache files named
//! `{analysis}.{stage}.{ext}`, which keeps preconditions honest and
//! reruns inspectable.

use std::collections::BTreeSet;
use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::bed::{read_bed, write_bed};
use crate::catalogue::Catalogue;
use crate::cli;
use crate::config::RunConfig;
use crate::context::{annotate_contexts, spectrum_from_records, write_contexts, write_spectrum};
use crate::context::{ContextStats, read_spectrum};
use crate::corrector::{aggregate, correct_sites, read_corrected, write_corrected};
use crate::error::Error;
use crate::fasta::read_fasta;
use crate::genome::Genome;
use crate::interval::IntervalSet;
use crate::mutation::read_mutations;
use crate::sites::{SiteEstimator, read_sites, write_sites};
use crate::slicer::{
    RegionSequence, parse_identifier, sequence_map, slice_regions, write_identifier_list,
    write_region_fasta,
};
use crate::stats::{RegionInput, compute_results, write_results};
use crate::variants::{ClassCounts, classify, count_intersections, ensure_target_signal, write_report};

/// One stage of the pipeline: a name, a status line, the artefacts it
/// requires, and the work itself.
pub struct Stage {
    pub name: &'static str,
    pub message: &'static str,
    pub inputs: Vec<PathBuf>,
    run: fn(&RunConfig) -> Result<(), Error>,
}

/// Assemble the stage list for this configuration. Conditional slots
/// are resolved here, once, so the driver is branch-free.
#[must_use]
pub fn pipeline(config: &RunConfig) -> Vec<Stage> {
    let a = |stage: &str, ext: &str| config.artefact(stage, ext);

    let mut stages = vec![Stage {
        name: "FilterTranscripts",
        message: "filtering target regions to catalogued transcripts",
        inputs: vec![
            config.bed_file.clone(),
            config.transcript_lengths.clone(),
            config.protein_lengths.clone(),
        ],
        run: filter_transcripts,
    }];

    if config.exclude_drivers {
        let mut inputs = vec![a("target", "bed")];
        if let Some(list) = &config.drivers_list {
            inputs.push(list.clone());
        }
        stages.push(Stage {
            name: "ExcludeDrivers",
            message: "removing driver transcripts",
            inputs,
            run: exclude_drivers,
        });
    } else {
        stages.push(Stage {
            name: "KeepDrivers",
            message: "keeping driver transcripts",
            inputs: vec![a("target", "bed")],
            run: keep_drivers,
        });
    }

    match (config.use_random, &config.random_regions) {
        (false, _) => stages.push(Stage {
            name: "NonRandom",
            message: "using target regions as given",
            inputs: vec![a("kept", "bed")],
            run: select_non_random,
        }),
        (true, Some(regions)) => stages.push(Stage {
            name: "RandomizeRegions",
            message: "shuffling regions within the allowed space",
            inputs: vec![a("kept", "bed"), regions.clone()],
            run: select_random_regions,
        }),
        (true, None) => stages.push(Stage {
            name: "RandomizeNoRegions",
            message: "shuffling regions across whole transcripts",
            inputs: vec![a("kept", "bed")],
            run: select_random_no_regions,
        }),
    }

    stages.push(Stage {
        name: "Complement",
        message: "deriving OFF regions",
        inputs: vec![a("on_protein", "bed")],
        run: complement_regions,
    });

    stages.push(Stage {
        name: if config.use_ssb192 { "SSB192Prep" } else { "SSB7Prep" },
        message: "projecting protein regions onto the CDS",
        inputs: vec![a("on_protein", "bed"), a("off_protein", "bed")],
        run: transform_regions,
    });

    stages.push(Stage {
        name: "SliceFasta",
        message: "extracting region sequences",
        inputs: vec![
            a("on_cds", "bed"),
            a("off_cds", "bed"),
            config.transcript_fasta.clone(),
        ],
        run: slice_fasta,
    });

    stages.push(Stage {
        name: "TheoreticalSites",
        message: "enumerating substitution sites",
        inputs: vec![a("on", "fa"), a("off", "fa")],
        run: theoretical_sites,
    });

    stages.push(Stage {
        name: "ContextSpectrum",
        message: "tallying mutation contexts",
        inputs: vec![
            config.input.clone(),
            config.genome_fasta.clone(),
            config.chrom_sizes.clone(),
        ],
        run: context_spectrum,
    });

    stages.push(Stage {
        name: "CorrectSites",
        message: "applying context correction",
        inputs: vec![
            a("on_sites", "tsv"),
            a("off_sites", "tsv"),
            a("spectrum", "tsv"),
        ],
        run: correct_site_tables,
    });

    stages.push(Stage {
        name: "ClassifyVariants",
        message: "classifying and intersecting mutations",
        inputs: vec![
            config.input.clone(),
            a("on_protein", "bed"),
            a("off_protein", "bed"),
        ],
        run: classify_variants,
    });

    stages.push(Stage {
        name: "Statistics",
        message: "computing selection estimates",
        inputs: vec![
            a("counts", "tsv"),
            a("on_corrected", "tsv"),
            a("off_corrected", "tsv"),
        ],
        run: statistics,
    });

    stages.push(Stage {
        name: "Summary",
        message: "writing run summary",
        inputs: vec![a("context_stats", "tsv"), a("counts", "tsv")],
        run: summary,
    });

    stages
}

/// Run every stage in order. Returns the path of the results table.
pub fn run_pipeline(config: &RunConfig) -> Result<PathBuf, Error> {
    config.validate()?;
    fs::create_dir_all(&config.cache_dir)?;
    config.save_snapshot()?;
    for stage in pipeline(config) {
        for input in &stage.inputs {
            if !is_present(input) {
                return Err(Error::MissingData {
                    stage: stage.name.to_string(),
                    path: input.clone(),
                });
            }
        }
        cli::stage(stage.name, stage.message);
        (stage.run)(config)?;
    }
    Ok(config.results_path())
}

fn is_present(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// Artefact path for writing, honouring the overwrite flag.
fn fresh(config: &RunConfig, stage: &str, ext: &str) -> Result<PathBuf, Error> {
    let path = config.artefact(stage, ext);
    if !config.overwrite && path.exists() {
        return Err(Error::FileExists(path));
    }
    Ok(path)
}

fn driver_transcripts(config: &RunConfig) -> Result<BTreeSet<String>, Error> {
    let Some(list) = (config.exclude_drivers).then_some(config.drivers_list.as_ref()).flatten()
    else {
        return Ok(BTreeSet::new());
    };
    let file = File::open(list)?;
    let mut drivers = BTreeSet::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let id = line.trim();
        if !id.is_empty() && !id.starts_with('#') {
            drivers.insert(id.to_string());
        }
    }
    Ok(drivers)
}

/// Full comparison space: every consistent transcript in the length
/// tables, minus excluded drivers. OFF regions complement against this,
/// so transcripts absent from the BED count as entirely OFF.
fn comparison_space(config: &RunConfig) -> Result<Catalogue, Error> {
    let mut catalogue = Catalogue::load_all(&config.transcript_lengths, &config.protein_lengths)?;
    catalogue.remove_transcripts(&driver_transcripts(config)?);
    Ok(catalogue)
}

fn filter_transcripts(config: &RunConfig) -> Result<(), Error> {
    let mut bed = read_bed(&config.bed_file)?;
    let (catalogue, missing) =
        Catalogue::load_filtered(&config.transcript_lengths, &config.protein_lengths, &bed)?;
    for transcript in &missing {
        cli::warning(&format!("dropping unknown transcript {transcript}"));
    }
    bed.filter_by_transcripts(&catalogue.transcripts());
    if bed.is_empty() {
        return Err(Error::Validation(
            "no target intervals remain after transcript filtering".to_string(),
        ));
    }
    write_bed(&bed, &fresh(config, "target", "bed")?)
}

fn exclude_drivers(config: &RunConfig) -> Result<(), Error> {
    let mut bed = read_bed(&config.artefact("target", "bed"))?;
    let drivers = driver_transcripts(config)?;
    let kept: BTreeSet<String> = bed
        .transcripts()
        .filter(|t| !drivers.contains(*t))
        .map(str::to_string)
        .collect();
    bed.filter_by_transcripts(&kept);
    if bed.is_empty() {
        return Err(Error::Validation(
            "no target intervals remain after driver exclusion".to_string(),
        ));
    }
    write_bed(&bed, &fresh(config, "kept", "bed")?)
}

fn keep_drivers(config: &RunConfig) -> Result<(), Error> {
    let bed = read_bed(&config.artefact("target", "bed"))?;
    write_bed(&bed, &fresh(config, "kept", "bed")?)
}

fn select_non_random(config: &RunConfig) -> Result<(), Error> {
    let bed = read_bed(&config.artefact("kept", "bed"))?;
    write_bed(&bed, &fresh(config, "on_protein", "bed")?)
}

fn select_random_no_regions(config: &RunConfig) -> Result<(), Error> {
    let bed = read_bed(&config.artefact("kept", "bed"))?;
    let (catalogue, _) =
        Catalogue::load_filtered(&config.transcript_lengths, &config.protein_lengths, &bed)?;
    let shuffled = bed.shuffle(&IntervalSet::new(), catalogue.protein_lengths(), config.seed)?;
    write_bed(&shuffled, &fresh(config, "on_protein", "bed")?)
}

fn select_random_regions(config: &RunConfig) -> Result<(), Error> {
    let bed = read_bed(&config.artefact("kept", "bed"))?;
    let allowed = match &config.random_regions {
        Some(path) => read_bed(path)?,
        None => {
            return Err(Error::Validation(
                "random-regions placement requested without a regions file".to_string(),
            ));
        }
    };
    let (catalogue, _) =
        Catalogue::load_filtered(&config.transcript_lengths, &config.protein_lengths, &bed)?;
    // Placement is confined to the allowed regions by forbidding their
    // complement.
    let forbidden = allowed.complement(catalogue.protein_lengths());
    let shuffled = bed.shuffle(&forbidden, catalogue.protein_lengths(), config.seed)?;
    write_bed(&shuffled, &fresh(config, "on_protein", "bed")?)
}

fn complement_regions(config: &RunConfig) -> Result<(), Error> {
    let on = read_bed(&config.artefact("on_protein", "bed"))?;
    let space = comparison_space(config)?;
    let off = on.complement(space.protein_lengths());
    write_bed(&off, &fresh(config, "off_protein", "bed")?)
}

fn transform_regions(config: &RunConfig) -> Result<(), Error> {
    let k = config.model().context_pad();
    let space = comparison_space(config)?;
    for (side, out) in [("on_protein", "on_cds"), ("off_protein", "off_cds")] {
        let protein = read_bed(&config.artefact(side, "bed"))?;
        let cds = protein.transform_protein_to_cds(k, space.cds_lengths());
        write_bed(&cds, &fresh(config, out, "bed")?)?;
    }
    Ok(())
}

fn slice_fasta(config: &RunConfig) -> Result<(), Error> {
    let sequences = sequence_map(read_fasta(&config.transcript_fasta)?);
    for (bed_stage, side) in [("on_cds", "on"), ("off_cds", "off")] {
        let set = read_bed(&config.artefact(bed_stage, "bed"))?;
        let regions = slice_regions(&sequences, &set)?;
        write_region_fasta(&regions, &fresh(config, side, "fa")?)?;
        write_identifier_list(&regions, &fresh(config, side, "txt")?)?;
    }
    Ok(())
}

fn theoretical_sites(config: &RunConfig) -> Result<(), Error> {
    let estimator = SiteEstimator::new(config.model())?;
    for side in ["on", "off"] {
        let records = read_fasta(&config.artefact(side, "fa"))?;
        let regions: Vec<RegionSequence> = records
            .into_iter()
            .map(|(id, sequence)| {
                let (transcript, start, end) = parse_identifier(&id)?;
                Ok(RegionSequence {
                    transcript,
                    start,
                    end,
                    sequence,
                })
            })
            .collect::<Result<_, Error>>()?;
        let sites = estimator.estimate_all(&regions);
        write_sites(&sites, &fresh(config, &format!("{side}_sites"), "tsv")?)?;
    }
    Ok(())
}

fn context_spectrum(config: &RunConfig) -> Result<(), Error> {
    let mutations = read_mutations(&config.input)?;
    let genome = Genome::load(&config.genome_fasta, &config.chrom_sizes)?;
    let (records, stats) = annotate_contexts(&mutations, &genome);
    write_contexts(&records, &fresh(config, "contexts", "bed")?)?;
    write_context_stats(&stats, &fresh(config, "context_stats", "tsv")?)?;
    let spectrum = spectrum_from_records(&records, config.model())?;
    write_spectrum(&spectrum, &fresh(config, "spectrum", "tsv")?)
}

fn correct_site_tables(config: &RunConfig) -> Result<(), Error> {
    let spectrum = read_spectrum(&config.artefact("spectrum", "tsv"), config.model())?;
    for side in ["on", "off"] {
        let sites = read_sites(&config.artefact(&format!("{side}_sites"), "tsv"), config.model())?;
        let corrected = correct_sites(&sites, &spectrum);
        write_corrected(&corrected, &fresh(config, &format!("{side}_corrected"), "tsv")?)?;
    }
    Ok(())
}

fn classify_variants(config: &RunConfig) -> Result<(), Error> {
    let mutations = read_mutations(&config.input)?;
    let streams = classify(&mutations);
    let on = read_bed(&config.artefact("on_protein", "bed"))?;
    let off = read_bed(&config.artefact("off_protein", "bed"))?;
    let counts = count_intersections(&streams, &on, &off);
    write_report(&streams, &fresh(config, "variants", "tsv")?)?;
    write_counts(&counts, &fresh(config, "counts", "tsv")?)?;
    ensure_target_signal(&counts)
}

fn statistics(config: &RunConfig) -> Result<(), Error> {
    let counts = read_counts(&config.artefact("counts", "tsv"))?;
    let (on_nonsyn, on_syn) = aggregate(&read_corrected(&config.artefact("on_corrected", "tsv"))?);
    let (off_nonsyn, off_syn) =
        aggregate(&read_corrected(&config.artefact("off_corrected", "tsv"))?);
    let on = RegionInput {
        n_mis: counts.missense.on,
        n_syn: counts.silent.on,
        site_nonsyn: on_nonsyn,
        site_syn: on_syn,
    };
    let off = RegionInput {
        n_mis: counts.missense.off,
        n_syn: counts.silent.off,
        site_nonsyn: off_nonsyn,
        site_syn: off_syn,
    };
    let rows = compute_results(on, off, counts.intronic_total);
    let _ = fresh(config, "results", "tsv")?;
    write_results(&rows, &config.results_path())
}

fn summary(config: &RunConfig) -> Result<(), Error> {
    let stats = read_context_stats(&config.artefact("context_stats", "tsv"))?;
    let counts = read_counts(&config.artefact("counts", "tsv"))?;
    let file = File::create(fresh(config, "summary", "tsv")?)?;
    let mut w = BufWriter::new(file);
    writeln!(w, "contexts_good\t{}", stats.good)?;
    writeln!(w, "contexts_fail\t{}", stats.fail)?;
    writeln!(w, "non_substitutions\t{}", stats.non_substitutions)?;
    for (label, stream) in [
        ("silent", counts.silent),
        ("nonsilent", counts.nonsilent),
        ("missense", counts.missense),
    ] {
        writeln!(
            w,
            "{label}_raw\t{}\n{label}_on\t{}\n{label}_off\t{}",
            stream.raw, stream.on, stream.off
        )?;
    }
    writeln!(w, "intronic\t{}", counts.intronic_total)?;
    w.flush()?;
    Ok(())
}

fn write_context_stats(stats: &ContextStats, path: &Path) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    writeln!(w, "good\t{}", stats.good)?;
    writeln!(w, "fail\t{}", stats.fail)?;
    writeln!(w, "non_substitutions\t{}", stats.non_substitutions)?;
    w.flush()?;
    Ok(())
}

fn read_context_stats(path: &Path) -> Result<ContextStats, Error> {
    let mut stats = ContextStats::default();
    for (key, value) in read_key_values(path)? {
        match key.as_str() {
            "good" => stats.good = value,
            "fail" => stats.fail = value,
            "non_substitutions" => stats.non_substitutions = value,
            _ => {}
        }
    }
    Ok(stats)
}

fn write_counts(counts: &ClassCounts, path: &Path) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    for (label, stream) in [
        ("silent", counts.silent),
        ("nonsilent", counts.nonsilent),
        ("missense", counts.missense),
    ] {
        writeln!(w, "{label}\t{}\t{}\t{}", stream.raw, stream.on, stream.off)?;
    }
    writeln!(w, "intronic\t{}", counts.intronic_total)?;
    w.flush()?;
    Ok(())
}

fn read_counts(path: &Path) -> Result<ClassCounts, Error> {
    let file = File::open(path)?;
    let mut counts = ClassCounts::default();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let bad = || {
            Error::Parse(format!(
                "{}:{}: malformed counts record",
                path.display(),
                lineno + 1
            ))
        };
        let fields: Vec<&str> = line.split('\t').collect();
        match fields[..] {
            [label, raw, on, off] => {
                let stream = match label {
                    "silent" => &mut counts.silent,
                    "nonsilent" => &mut counts.nonsilent,
                    "missense" => &mut counts.missense,
                    _ => return Err(bad()),
                };
                stream.raw = raw.parse().map_err(|_| bad())?;
                stream.on = on.parse().map_err(|_| bad())?;
                stream.off = off.parse().map_err(|_| bad())?;
            }
            ["intronic", total] => {
                counts.intronic_total = total.parse().map_err(|_| bad())?;
            }
            _ => return Err(bad()),
        }
    }
    Ok(counts)
}

fn read_key_values(path: &Path) -> Result<Vec<(String, u64)>, Error> {
    let file = File::open(path)?;
    let mut pairs = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let (key, value) = line.split_once('\t').ok_or_else(|| {
            Error::Parse(format!(
                "{}:{}: malformed summary record",
                path.display(),
                lineno + 1
            ))
        })?;
        let value: u64 = value.trim().parse().map_err(|_| {
            Error::Parse(format!(
                "{}:{}: expected numeric value",
                path.display(),
                lineno + 1
            ))
        })?;
        pairs.push((key.to_string(), value));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;

    // A 20 bp chromosome whose 1-based positions 2..15 give distinct
    // trinucleotide channels for spectrum building.
    const GENOME: &str = "AACCGGTTACGTAACCGGTT";

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new(bed: &str, mutations: &[String]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let p = dir.path();

            fs::write(p.join("target.bed"), bed).unwrap();
            fs::write(
                p.join("cds.tsv"),
                "T1\t540\nT2\t600\nT3\t300\n",
            )
            .unwrap();
            fs::write(
                p.join("protein.tsv"),
                "T1\t180\nT2\t200\nT3\t100\n",
            )
            .unwrap();

            let mut transcripts = String::new();
            for (id, len) in [("T1", 540usize), ("T2", 600), ("T3", 300)] {
                writeln!(transcripts, ">{id}").unwrap();
                let seq: String = "ACGT".chars().cycle().take(len).collect();
                writeln!(transcripts, "{seq}").unwrap();
            }
            fs::write(p.join("transcripts.fa"), transcripts).unwrap();

            fs::write(p.join("genome.fa"), format!(">1\n{GENOME}\n")).unwrap();
            fs::write(p.join("genome.sizes"), format!("1\t{}\n", GENOME.len())).unwrap();

            let mut annotated = String::from("#Uploaded_variation\tLocation\tAllele\n");
            for m in mutations {
                annotated.push_str(m);
                annotated.push('\n');
            }
            fs::write(p.join("muts.tsv"), annotated).unwrap();

            Self { dir }
        }

        fn config(&self) -> RunConfig {
            let p = self.dir.path();
            RunConfig {
                analysis_name: "run".to_string(),
                input: p.join("muts.tsv"),
                bed_file: p.join("target.bed"),
                cache_dir: p.join("cache"),
                use_ssb192: true,
                use_random: false,
                random_regions: None,
                exclude_drivers: false,
                drivers_list: None,
                seed: 1234,
                transcript_lengths: p.join("cds.tsv"),
                protein_lengths: p.join("protein.tsv"),
                transcript_fasta: p.join("transcripts.fa"),
                genome_fasta: p.join("genome.fa"),
                chrom_sizes: p.join("genome.sizes"),
                species: "homo_sapiens".to_string(),
                assembly: "GRCh38".to_string(),
                release: 110,
                overwrite: true,
            }
        }
    }

    fn mline(
        pos: u64,
        ref_allele: char,
        alt: char,
        transcript: &str,
        consequence: &str,
        protein_pos: &str,
        codons: &str,
    ) -> String {
        format!(
            "1_{pos}_{ref_allele}/{alt}\t1:{pos}\t{alt}\tG{transcript}\t{transcript}\tTranscript\t{consequence}\t-\t-\t{protein_pos}\t-\t{codons}\t-\tSYMBOL=S{transcript}"
        )
    }

    /// Substitutions at 6 distinct channels, dropped from the coding
    /// streams by the consequence filter but kept by the spectrum.
    fn spectrum_fillers() -> Vec<String> {
        vec![
            mline(7, 'T', 'C', "T2", "stop_retained_variant", "10", "Act/Acc"),
            mline(9, 'A', 'G', "T2", "stop_retained_variant", "11", "Aca/Gca"),
            mline(10, 'C', 'T', "T2", "stop_retained_variant", "12", "aCa/aTa"),
            mline(12, 'T', 'C', "T2", "stop_retained_variant", "13", "aTa/aCa"),
            mline(14, 'A', 'T', "T2", "stop_retained_variant", "14", "Aca/Tca"),
            mline(15, 'C', 'G', "T2", "stop_retained_variant", "15", "Cca/Gca"),
        ]
    }

    fn toy_mutations() -> Vec<String> {
        let mut mutations = vec![
            // ON missense: T1 residue 110 falls inside T1:100-120
            mline(2, 'A', 'G', "T1", "missense_variant", "110", "Aag/Gag"),
            // OFF silent: T1 residue 150 is outside the target
            mline(3, 'C', 'T', "T1", "synonymous_variant", "150", "aaC/aaT"),
            // OFF missense by absence: T3 has no target intervals
            mline(5, 'G', 'A', "T3", "missense_variant", "50", "Gca/Aca"),
        ];
        mutations.extend(spectrum_fillers());
        mutations
    }

    #[test]
    fn toy_pipeline_counts_and_results() {
        let fixture = Fixture::new("T1\t100\t120\nT2\t50\t70\n", &toy_mutations());
        let config = fixture.config();
        let results = run_pipeline(&config).unwrap();

        let counts = read_counts(&config.artefact("counts", "tsv")).unwrap();
        assert_eq!(counts.missense.raw, 2);
        assert_eq!(counts.missense.on, 1);
        assert_eq!(counts.missense.off, 1);
        assert_eq!(counts.silent.raw, 1);
        assert_eq!(counts.silent.on, 0);
        assert_eq!(counts.silent.off, 1);
        assert_eq!(counts.intronic_total, 0);

        let written = fs::read_to_string(results).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("Exonic_Only\t"));

        let summary = fs::read_to_string(config.artefact("summary", "tsv")).unwrap();
        assert!(summary.contains("contexts_good\t9"));
        assert!(summary.contains("missense_on\t1"));
    }

    #[test]
    fn on_off_partition_the_comparison_space() {
        let fixture = Fixture::new("T1\t100\t120\nT2\t50\t70\n", &toy_mutations());
        let config = fixture.config();
        run_pipeline(&config).unwrap();

        let on = read_bed(&config.artefact("on_protein", "bed")).unwrap();
        let off = read_bed(&config.artefact("off_protein", "bed")).unwrap();
        let (_, overlap) = on.intersect(&off);
        assert_eq!(overlap, 0);
        // T1 180 aa + T2 200 aa + T3 100 aa
        assert_eq!(on.total_len() + off.total_len(), 480);
    }

    #[test]
    fn unknown_bed_transcript_is_dropped_not_fatal() {
        let fixture = Fixture::new("T1\t100\t120\nTX\t5\t9\n", &toy_mutations());
        let config = fixture.config();
        run_pipeline(&config).unwrap();
        let target = read_bed(&config.artefact("target", "bed")).unwrap();
        assert_eq!(target.transcript_count(), 1);
    }

    #[test]
    fn empty_on_signal_aborts() {
        // The target only covers T2; every coding mutation sits elsewhere.
        let mut mutations = vec![mline(2, 'A', 'G', "T1", "missense_variant", "30", "Aag/Gag")];
        mutations.extend(spectrum_fillers());
        let fixture = Fixture::new("T2\t50\t70\n", &mutations);
        let err = run_pipeline(&fixture.config()).unwrap_err();
        assert!(matches!(err, Error::NoTargetMutations));
    }

    #[test]
    fn all_silent_target_reports_zero_dnds() {
        let mut mutations = vec![
            mline(2, 'A', 'G', "T1", "synonymous_variant", "105", "aaA/aaG"),
            mline(3, 'C', 'T', "T1", "synonymous_variant", "110", "aaC/aaT"),
            mline(5, 'G', 'A', "T1", "missense_variant", "150", "Gca/Aca"),
        ];
        mutations.extend(spectrum_fillers());
        let fixture = Fixture::new("T1\t100\t120\n", &mutations);
        let config = fixture.config();
        let results = run_pipeline(&config).unwrap();

        let written = fs::read_to_string(results).unwrap();
        let row: Vec<&str> = written.lines().nth(1).unwrap().split('\t').collect();
        assert_eq!(row[0], "Exonic_Only");
        assert_eq!(row[1], "0.000000"); // ON_dNdS
        assert_eq!(row[10], "0"); // ON_na
        assert_eq!(row[12], "2"); // ON_ns
    }

    #[test]
    fn shuffle_runs_are_deterministic_for_a_seed() {
        let run = |seed: u64| {
            let fixture = Fixture::new("T1\t100\t120\nT2\t50\t70\n", &toy_mutations());
            let mut config = fixture.config();
            config.use_random = true;
            config.seed = seed;
            let results = run_pipeline(&config).unwrap();
            (
                fs::read_to_string(config.artefact("on_protein", "bed")).unwrap(),
                fs::read_to_string(results).unwrap(),
            )
        };
        let (on_a, results_a) = run(1234);
        let (on_b, results_b) = run(1234);
        assert_eq!(on_a, on_b);
        assert_eq!(results_a, results_b);
        let (on_c, _) = run(99);
        assert_ne!(on_a, on_c);
    }

    #[test]
    fn intronic_mutations_add_a_second_row() {
        let mut mutations = toy_mutations();
        mutations.push(mline(17, 'G', 'A', "T1", "intron_variant", "-", "-"));
        mutations.push(mline(18, 'G', 'T', "T1", "intron_variant", "-", "-"));
        // OFF needs synonymous signal for the augmentation to move.
        mutations.push(mline(19, 'T', 'A', "T2", "synonymous_variant", "150", "aaT/aaA"));
        let fixture = Fixture::new("T1\t100\t120\nT2\t50\t70\n", &mutations);
        let config = fixture.config();
        let results = run_pipeline(&config).unwrap();

        let written = fs::read_to_string(results).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("Exonic_Only\t"));
        assert!(lines[2].starts_with("Exonic_Intronic\t"));
        let off_only: Vec<&str> = lines[1].split('\t').collect();
        let off_intron: Vec<&str> = lines[2].split('\t').collect();
        assert_ne!(off_only[5], off_intron[5]); // OFF_dNdS moves
        assert_eq!(off_only[1], off_intron[1]); // ON_dNdS does not
    }

    #[test]
    fn sparse_spectrum_aborts() {
        let mutations = vec![mline(2, 'A', 'G', "T1", "missense_variant", "110", "Aag/Gag")];
        let fixture = Fixture::new("T1\t100\t120\n", &mutations);
        let err = run_pipeline(&fixture.config()).unwrap_err();
        assert!(matches!(err, Error::SpectrumTooSparse { .. }));
    }

    #[test]
    fn driver_exclusion_removes_transcript_everywhere() {
        let fixture = Fixture::new("T1\t100\t120\nT2\t50\t70\n", &toy_mutations());
        let mut config = fixture.config();
        fs::write(fixture.dir.path().join("drivers.txt"), "T2\n").unwrap();
        config.exclude_drivers = true;
        config.drivers_list = Some(fixture.dir.path().join("drivers.txt"));
        run_pipeline(&config).unwrap();

        let kept = read_bed(&config.artefact("kept", "bed")).unwrap();
        assert_eq!(kept.transcript_count(), 1);
        let off = read_bed(&config.artefact("off_protein", "bed")).unwrap();
        assert!(off.intervals_for("T2").is_empty());
        // T1 180 aa + T3 100 aa, minus the 20 aa target
        assert_eq!(off.total_len(), 260);
    }

    #[test]
    fn rerun_without_overwrite_reports_existing_artefact() {
        let fixture = Fixture::new("T1\t100\t120\n", &toy_mutations());
        let mut config = fixture.config();
        run_pipeline(&config).unwrap();
        config.overwrite = false;
        let err = run_pipeline(&config).unwrap_err();
        assert!(matches!(err, Error::FileExists(_)));
    }

    #[test]
    fn missing_artefact_names_stage_and_path() {
        let fixture = Fixture::new("T1\t100\t120\n", &toy_mutations());
        let config = fixture.config();
        fs::create_dir_all(&config.cache_dir).unwrap();
        // Statistics preconditions are absent when invoked directly.
        let stages = pipeline(&config);
        let statistics = stages.iter().find(|s| s.name == "Statistics").unwrap();
        let missing = statistics
            .inputs
            .iter()
            .find(|p| !is_present(p))
            .unwrap()
            .clone();
        let err = Error::MissingData {
            stage: statistics.name.to_string(),
            path: missing.clone(),
        };
        assert!(err.to_string().contains("Statistics"));
        assert!(err.to_string().contains(missing.to_string_lossy().as_ref()));
    }

    #[test]
    fn stage_order_is_total_and_conditional() {
        let fixture = Fixture::new("T1\t100\t120\n", &toy_mutations());
        let mut config = fixture.config();
        let names: Vec<&str> = pipeline(&config).iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "FilterTranscripts",
                "KeepDrivers",
                "NonRandom",
                "Complement",
                "SSB192Prep",
                "SliceFasta",
                "TheoreticalSites",
                "ContextSpectrum",
                "CorrectSites",
                "ClassifyVariants",
                "Statistics",
                "Summary",
            ]
        );

        config.use_ssb192 = false;
        config.use_random = true;
        config.exclude_drivers = true;
        config.drivers_list = Some(fixture.dir.path().join("drivers.txt"));
        let names: Vec<&str> = pipeline(&config).iter().map(|s| s.name).collect();
        assert!(names.contains(&"ExcludeDrivers"));
        assert!(names.contains(&"RandomizeNoRegions"));
        assert!(names.contains(&"SSB7Prep"));
    }
}
