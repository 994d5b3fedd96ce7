//! dN/dS point estimates, Katz log-ratio confidence intervals, intronic
//! augmentation and the ON/OFF difference p-value.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Error;

const Z_95: f64 = 1.96;
const PVALUE_FLOOR: f64 = 1e-4;

/// Counts and corrected site totals for one region (ON or OFF).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionInput {
    pub n_mis: u64,
    pub n_syn: u64,
    /// Non-synonymous sites, context-corrected, uncapped.
    pub site_nonsyn: f64,
    /// Synonymous sites, context-corrected, uncapped.
    pub site_syn: f64,
}

/// A dN/dS point estimate with its Katz confidence interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub kaks: f64,
    pub low: f64,
    pub high: f64,
}

/// Katz log-ratio estimate for missense versus synonymous rates.
///
/// Site totals below 1 are floored to 1 here; the raw totals still
/// appear in the report columns. Zero counts collapse the interval to
/// an uninformative `[0, inf)`.
#[must_use]
pub fn katz_estimate(n_mis: u64, n_syn: u64, site_nonsyn: f64, site_syn: f64) -> Estimate {
    let s1 = site_nonsyn.max(1.0);
    let s2 = site_syn.max(1.0);
    let p1 = n_mis as f64 / s1;
    let p2 = n_syn as f64 / s2;
    let kaks = p1 / p2;
    if p1 <= 0.0 || p2 <= 0.0 {
        return Estimate {
            kaks,
            low: 0.0,
            high: f64::INFINITY,
        };
    }
    let f1 = (1.0 - p1) / (s1 * p1);
    let f2 = (1.0 - p2) / (s2 * p2);
    // Floored sites can push a rate past 1 and the variance negative;
    // collapse to a zero-width interval instead of a NaN.
    let half_width = Z_95 * (f1 + f2).max(0.0).sqrt();
    Estimate {
        kaks,
        low: kaks * (-half_width).exp(),
        high: kaks * half_width.exp(),
    }
}

/// Synonymous sites attributed to `n_int` intronic mutations, scaled by
/// the mean of the ON and OFF synonymous rates.
#[must_use]
pub fn intronic_sites(n_int: u64, on: &RegionInput, off: &RegionInput) -> f64 {
    let rate = |r: &RegionInput| r.n_syn as f64 / r.site_syn.max(1.0);
    let denominator = rate(on) + rate(off);
    if denominator <= 0.0 {
        return 0.0;
    }
    2.0 * n_int as f64 / denominator
}

/// Two-sided p-value for the difference of two dN/dS estimates, from
/// the normal approximation `z = delta / SE` with `SE` recovered from
/// the comparison interval.
#[must_use]
pub fn difference_pvalue(kaks_on: f64, comparison: &Estimate) -> f64 {
    let se = (comparison.high - comparison.low) / (2.0 * Z_95);
    let z = (kaks_on - comparison.kaks) / se;
    if z.is_nan() {
        return 1.0;
    }
    let p2 = (0.717 * z + 0.416 * z * z).exp();
    let p = if p2 > 0.0 && p2 <= 1.0 {
        p2
    } else {
        (-0.717 * z - 0.416 * z * z).exp()
    };
    p.clamp(PVALUE_FLOOR, 1.0)
}

/// One emitted result row.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub coverage: String,
    pub on: Estimate,
    pub on_mutations: u64,
    pub off: Estimate,
    pub off_mutations: u64,
    pub pvalue: f64,
    pub on_input: RegionInput,
    pub off_input: RegionInput,
    /// OFF synonymous count and sites as used by this row, including
    /// any intronic augmentation.
    pub off_syn_used: f64,
    pub off_site_syn_used: f64,
}

/// Compute the `Exonic_Only` row and, when intronic mutations exist,
/// the `Exonic_Intronic` row with the augmented OFF estimate.
#[must_use]
pub fn compute_results(on: RegionInput, off: RegionInput, n_int: u64) -> Vec<ResultRow> {
    let on_estimate = katz_estimate(on.n_mis, on.n_syn, on.site_nonsyn, on.site_syn);
    let off_estimate = katz_estimate(off.n_mis, off.n_syn, off.site_nonsyn, off.site_syn);

    let mut rows = vec![ResultRow {
        coverage: "Exonic_Only".to_string(),
        on: on_estimate,
        on_mutations: on.n_mis + on.n_syn,
        off: off_estimate,
        off_mutations: off.n_mis + off.n_syn,
        pvalue: difference_pvalue(on_estimate.kaks, &off_estimate),
        on_input: on,
        off_input: off,
        off_syn_used: off.n_syn as f64,
        off_site_syn_used: off.site_syn,
    }];

    if n_int > 0 {
        let s_int = intronic_sites(n_int, &on, &off);
        let off_intron = katz_estimate(
            off.n_mis,
            off.n_syn + n_int,
            off.site_nonsyn,
            off.site_syn + s_int,
        );
        rows.push(ResultRow {
            coverage: "Exonic_Intronic".to_string(),
            on: on_estimate,
            on_mutations: on.n_mis + on.n_syn,
            off: off_intron,
            off_mutations: off.n_mis + off.n_syn + n_int,
            pvalue: difference_pvalue(on_estimate.kaks, &off_intron),
            on_input: on,
            off_input: off,
            off_syn_used: (off.n_syn + n_int) as f64,
            off_site_syn_used: off.site_syn + s_int,
        });
    }
    rows
}

pub const RESULTS_HEADER: &str = "Coverage\tON_dNdS\tON_Low_CI\tON_High_CI\tON_Mutations\tOFF_dNdS\tOFF_Low_CI\tOFF_High_CI\tOFF_Mutations\tPvalue\tON_na\tON_NA\tON_ns\tON_NS\tOFF_na\tOFF_NA\tOFF_ns\tOFF_NS";

/// Write the results table with its fixed header.
pub fn write_results(rows: &[ResultRow], path: &Path) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    writeln!(w, "{RESULTS_HEADER}")?;
    for row in rows {
        writeln!(
            w,
            "{}\t{:.6}\t{:.6}\t{:.6}\t{}\t{:.6}\t{:.6}\t{:.6}\t{}\t{:.6}\t{}\t{:.6}\t{}\t{:.6}\t{}\t{:.6}\t{}\t{:.6}",
            row.coverage,
            row.on.kaks,
            row.on.low,
            row.on.high,
            row.on_mutations,
            row.off.kaks,
            row.off.low,
            row.off.high,
            row.off_mutations,
            row.pvalue,
            row.on_input.n_mis,
            row.on_input.site_nonsyn,
            row.on_input.n_syn,
            row.on_input.site_syn,
            row.off_input.n_mis,
            row.off_input.site_nonsyn,
            row.off_syn_used,
            row.off_site_syn_used,
        )?;
    }
    w.flush()?;
    Ok(())
}
