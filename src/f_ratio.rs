//! # Dispersion Ranking
//!
//! Ranks genes by how differently they are expressed in a single-cell cohort and
//! a bulk cohort, using a one-way ANOVA between the two cohorts' non-zero values.
//!
//! Zeros are dropped before the test, so each gene is tested on its own number
//! of observations (genes detected in fewer samples get fewer degrees of
//! freedom). Genes that are zero in every sample of either cohort have nothing
//! to test and are removed up front.

use crate::matrix::{self, ExpressionMatrix, MatrixError};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FRatioError {
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    #[error("No gene with non-zero expression is shared between the single-cell and bulk matrices.")]
    EmptyIntersection,
    #[error("Invalid F distribution with ({0}, {1}) degrees of freedom: {2}")]
    Distribution(f64, f64, String),
}

/// One-way ANOVA result for a single gene.
#[derive(Debug, Clone, PartialEq)]
pub struct AnovaResult {
    pub f_ratio: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneFRatio {
    pub gene: String,
    pub f_ratio: f64,
    pub p_value: f64,
}

impl AnovaResult {
    fn undefined() -> Self {
        Self {
            f_ratio: f64::NAN,
            p_value: f64::NAN,
        }
    }

    pub fn is_defined(&self) -> bool {
        !self.f_ratio.is_nan()
    }
}

/// One-way ANOVA over `groups`.
///
/// Undefined cases return NaN for both statistics instead of failing:
/// fewer than two non-empty groups, or no within-group degrees of freedom.
/// Groups that are each constant but differ from one another give F = +inf, p = 0.
pub fn one_way_anova(groups: &[&[f64]]) -> Result<AnovaResult, FRatioError> {
    let groups: Vec<&[f64]> = groups.iter().copied().filter(|g| !g.is_empty()).collect();
    let k = groups.len();
    let n: usize = groups.iter().map(|g| g.len()).sum();
    if k < 2 || n <= k {
        return Ok(AnovaResult::undefined());
    }

    let grand_mean = groups.iter().flat_map(|g| g.iter()).sum::<f64>() / n as f64;
    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for group in &groups {
        let mean = group.iter().sum::<f64>() / group.len() as f64;
        ss_between += group.len() as f64 * (mean - grand_mean).powi(2);
        ss_within += group.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    }

    let df_between = (k - 1) as f64;
    let df_within = (n - k) as f64;

    if ss_within == 0.0 {
        return Ok(if ss_between == 0.0 {
            AnovaResult::undefined()
        } else {
            AnovaResult {
                f_ratio: f64::INFINITY,
                p_value: 0.0,
            }
        });
    }

    let f_ratio = (ss_between / df_between) / (ss_within / df_within);
    let dist = FisherSnedecor::new(df_between, df_within)
        .map_err(|e| FRatioError::Distribution(df_between, df_within, e.to_string()))?;
    Ok(AnovaResult {
        f_ratio,
        p_value: dist.sf(f_ratio),
    })
}

/// Genes with at least one non-zero value.
fn expressed_genes(matrix: &ExpressionMatrix) -> BTreeSet<&str> {
    matrix
        .genes
        .iter()
        .zip(matrix.values.columns())
        .filter(|(_, column)| column.iter().any(|&v| v != 0.0))
        .map(|(gene, _)| gene.as_str())
        .collect()
}

/// Shared genes that are not expressed in at least one cohort, sorted.
fn silent_in_one_cohort<'a>(
    sc_all: &BTreeSet<&'a str>,
    bulk_all: &BTreeSet<&'a str>,
    sc_expressed: &BTreeSet<&str>,
    bulk_expressed: &BTreeSet<&str>,
) -> Vec<&'a str> {
    sc_all
        .intersection(bulk_all)
        .copied()
        .filter(|g| !(sc_expressed.contains(g) && bulk_expressed.contains(g)))
        .collect()
}

/// Per-gene F-ratio between the two cohorts, sorted by F descending.
/// Undefined statistics (NaN) sort last; ties are broken by gene id.
pub fn rank_genes(
    single_cell: &ExpressionMatrix,
    bulk: &ExpressionMatrix,
) -> Result<Vec<GeneFRatio>, FRatioError> {
    let sc_expressed = expressed_genes(single_cell);
    let bulk_expressed = expressed_genes(bulk);

    let sc_all: BTreeSet<&str> = single_cell.genes.iter().map(String::as_str).collect();
    let bulk_all: BTreeSet<&str> = bulk.genes.iter().map(String::as_str).collect();
    let shared = sc_all.intersection(&bulk_all).count();

    let common: Vec<&str> = sc_expressed.intersection(&bulk_expressed).copied().collect();
    if common.is_empty() {
        return Err(FRatioError::EmptyIntersection);
    }
    if common.len() < shared {
        let skipped = silent_in_one_cohort(&sc_all, &bulk_all, &sc_expressed, &bulk_expressed);
        log::warn!(
            "Skipping {} of {} shared genes that are zero in every sample of one cohort",
            skipped.len(),
            shared
        );
        log::debug!("Genes without expression in one cohort: {skipped:?}");
    }

    let sc_index = single_cell.gene_index();
    let bulk_index = bulk.gene_index();
    let mut results = Vec::with_capacity(common.len());
    for gene in common {
        let (Some(&sc_col), Some(&bulk_col)) = (sc_index.get(gene), bulk_index.get(gene)) else {
            continue;
        };
        let sc_values = single_cell.values.column(sc_col);
        let bulk_values = bulk.values.column(bulk_col);
        let sc_non_zero: Vec<f64> = sc_values.iter().copied().filter(|&v| v != 0.0).collect();
        let bulk_non_zero: Vec<f64> = bulk_values.iter().copied().filter(|&v| v != 0.0).collect();

        let anova = one_way_anova(&[sc_non_zero.as_slice(), bulk_non_zero.as_slice()])?;
        results.push(GeneFRatio {
            gene: gene.to_string(),
            f_ratio: anova.f_ratio,
            p_value: anova.p_value,
        });
    }

    let undefined = results.iter().filter(|r| r.f_ratio.is_nan()).count();
    if undefined > 0 {
        log::warn!(
            "{undefined} genes have an undefined F-ratio (a single non-zero value per cohort, or identical constant cohorts); reported as NaN"
        );
    }

    results.sort_by(|a, b| {
        descending_nan_last(a.f_ratio, b.f_ratio).then_with(|| a.gene.cmp(&b.gene))
    });
    Ok(results)
}

fn descending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

pub fn write_f_ratios(path: &Path, results: &[GeneFRatio]) -> Result<(), FRatioError> {
    let mut writer = matrix::tsv_writer(path).map_err(FRatioError::from)?;
    writer
        .write_record(["genes", "f_ratio", "pvalue"])
        .map_err(MatrixError::from)?;
    for r in results {
        writer
            .write_record([r.gene.clone(), r.f_ratio.to_string(), r.p_value.to_string()])
            .map_err(MatrixError::from)?;
    }
    writer.flush().map_err(MatrixError::from)?;
    Ok(())
}

/// Loads both cohorts, ranks the shared genes and writes the table.
pub fn f_ratio_comparison(
    single_cell_path: &Path,
    bulk_path: &Path,
    output_path: &Path,
) -> Result<Vec<GeneFRatio>, FRatioError> {
    let bulk = ExpressionMatrix::from_tsv(bulk_path)?;
    let single_cell = ExpressionMatrix::from_tsv(single_cell_path)?;
    let results = rank_genes(&single_cell, &bulk)?;
    write_f_ratios(output_path, &results)?;
    log::info!(
        "Wrote F-ratios for {} genes to '{}'",
        results.len(),
        output_path.display()
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    fn cohort(genes: &[&str], values: Array2<f64>) -> ExpressionMatrix {
        let samples = (0..values.nrows()).map(|i| format!("s{i}")).collect();
        ExpressionMatrix::new(
            "sample".into(),
            samples,
            genes.iter().map(|g| g.to_string()).collect(),
            values,
        )
        .unwrap()
    }

    #[test]
    fn anova_matches_hand_computation() {
        // means 7.5 / 3.5, SSB = 16, SSW = 13, df = (1, 2)
        let r = one_way_anova(&[&[5.0, 10.0], &[3.0, 4.0]]).unwrap();
        assert_abs_diff_eq!(r.f_ratio, 32.0 / 13.0, epsilon = 1e-12);
        // For df1 = 1, F(1, 2) tail equals the two-sided t(2) tail: 1 - t / sqrt(t^2 + 2).
        let t = (32.0_f64 / 13.0).sqrt();
        let expected_p = 1.0 - t / (t * t + 2.0).sqrt();
        assert_abs_diff_eq!(r.p_value, expected_p, epsilon = 1e-9);
    }

    #[test]
    fn zeros_are_dropped_before_the_test() {
        let sc = cohort(&["g"], array![[0.0], [0.0], [5.0], [10.0]]);
        let bulk = cohort(&["g"], array![[0.0], [3.0], [4.0]]);
        let ranked = rank_genes(&sc, &bulk).unwrap();
        assert_eq!(ranked.len(), 1);
        let direct = one_way_anova(&[&[5.0, 10.0], &[3.0, 4.0]]).unwrap();
        assert_abs_diff_eq!(ranked[0].f_ratio, direct.f_ratio, epsilon = 1e-12);
        assert_abs_diff_eq!(ranked[0].p_value, direct.p_value, epsilon = 1e-12);
    }

    #[test]
    fn all_zero_genes_are_skipped() {
        let sc = cohort(&["a", "b"], array![[1.0, 0.0], [2.0, 0.0], [4.0, 0.0]]);
        let bulk = cohort(&["a", "b"], array![[7.0, 1.0], [9.0, 2.0]]);
        let ranked = rank_genes(&sc, &bulk).unwrap();
        assert_eq!(ranked.iter().map(|r| r.gene.as_str()).collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn skipped_genes_are_named() {
        let sc = cohort(&["a", "b", "c", "d"], array![[1.0, 0.0, 2.0, 1.0], [2.0, 0.0, 3.0, 1.0]]);
        let bulk = cohort(&["a", "b", "c"], array![[7.0, 1.0, 0.0], [9.0, 2.0, 0.0]]);
        let sc_all: BTreeSet<&str> = sc.genes.iter().map(String::as_str).collect();
        let bulk_all: BTreeSet<&str> = bulk.genes.iter().map(String::as_str).collect();
        let skipped = silent_in_one_cohort(
            &sc_all,
            &bulk_all,
            &expressed_genes(&sc),
            &expressed_genes(&bulk),
        );
        assert_eq!(skipped, vec!["b", "c"]);
    }

    #[test]
    fn no_expressed_common_gene_is_an_error() {
        let sc = cohort(&["a"], array![[0.0], [0.0]]);
        let bulk = cohort(&["a"], array![[1.0], [2.0]]);
        assert!(matches!(rank_genes(&sc, &bulk), Err(FRatioError::EmptyIntersection)));
    }

    #[test]
    fn degenerate_genes_are_nan_and_sorted_last() {
        let sc = cohort(
            &["single", "strong", "weak", "flat"],
            array![[5.0, 1.0, 1.0, 2.0], [0.0, 1.1, 3.0, 2.0], [0.0, 0.9, 2.0, 2.0]],
        );
        let bulk = cohort(
            &["single", "strong", "weak", "flat"],
            array![[4.0, 9.0, 2.5, 2.0], [0.0, 9.2, 1.5, 2.0]],
        );
        let ranked = rank_genes(&sc, &bulk).unwrap();
        let order: Vec<&str> = ranked.iter().map(|r| r.gene.as_str()).collect();
        assert_eq!(order, vec!["strong", "weak", "flat", "single"]);
        assert!(ranked[2].f_ratio.is_nan() && ranked[2].p_value.is_nan());
        assert!(ranked[3].f_ratio.is_nan());

        for pair in ranked.windows(2).take(1) {
            assert!(pair[0].f_ratio >= pair[1].f_ratio);
        }
    }

    #[test]
    fn constant_but_different_cohorts_give_infinite_f() {
        let r = one_way_anova(&[&[2.0, 2.0], &[3.0, 3.0, 3.0]]).unwrap();
        assert!(r.f_ratio.is_infinite());
        assert_eq!(r.p_value, 0.0);
    }

    #[test]
    fn ranking_is_deterministic() {
        let sc = cohort(&["x", "y", "z"], array![[1.0, 5.0, 3.0], [2.0, 6.0, 0.0], [3.0, 4.0, 2.0]]);
        let bulk = cohort(&["z", "y", "x"], array![[8.0, 5.0, 1.5], [9.0, 5.5, 2.5]]);
        let first = rank_genes(&sc, &bulk).unwrap();
        let second = rank_genes(&sc, &bulk).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].gene, "z");
    }
}
