//! # Two-Stage Normalization
//!
//! 1. Sample-wise: each row is centered on its own mean and divided by its own
//!    (population) standard deviation. Training and testing rows are scaled
//!    independently.
//! 2. Feature-wise: each gene is centered and scaled with the mean and sample
//!    standard deviation of the sample-wise-scaled *training* matrix. The same
//!    training statistics are applied to the testing matrix; testing data never
//!    contributes to them.
//!
//! Genes whose training standard deviation is zero after stage 1 carry no
//! information for a linear boundary and would divide by zero in stage 2.
//! They are dropped from both matrices before stage 2.

use crate::matrix::{ExpressionMatrix, MatrixError};
use ndarray::{Array1, Axis};
use thiserror::Error;

/// Standard deviations at or below this are treated as zero.
const ZERO_SCALE: f64 = 10.0 * f64::EPSILON;

#[derive(Error, Debug)]
pub enum NormalizationError {
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    #[error(
        "Sample '{0}' has the same value for every gene, so it cannot be scaled sample-wise."
    )]
    DegenerateSample(String),
    #[error(
        "Feature-wise statistics need at least {required} training samples, found {found}."
    )]
    TooFewSamples { found: usize, required: usize },
    #[error(
        "All {0} aligned genes have zero variance across the training samples; no features remain."
    )]
    AllGenesZeroVariance(usize),
}

/// Per-gene mean and standard deviation of the sample-wise-scaled training matrix.
#[derive(Debug, Clone)]
pub struct MeanSdTable {
    pub genes: Vec<String>,
    pub mean: Array1<f64>,
    pub sd: Array1<f64>,
}

impl MeanSdTable {
    /// Column means and sample (n - 1) standard deviations.
    pub fn fit(training_sw: &ExpressionMatrix) -> Result<Self, NormalizationError> {
        let n = training_sw.n_samples();
        if n < 2 {
            return Err(NormalizationError::TooFewSamples {
                found: n,
                required: 2,
            });
        }
        let mean = training_sw
            .values
            .mean_axis(Axis(0))
            .ok_or(NormalizationError::TooFewSamples {
                found: n,
                required: 2,
            })?;
        let sd = training_sw.values.std_axis(Axis(0), 1.0);
        Ok(Self {
            genes: training_sw.genes.clone(),
            mean,
            sd,
        })
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Splits off genes with zero (or non-finite) standard deviation.
    /// Returns the reduced table and the excluded gene ids.
    pub fn without_zero_variance(self) -> Result<(Self, Vec<String>), NormalizationError> {
        let total = self.len();
        let (keep, dropped): (Vec<usize>, Vec<usize>) =
            (0..total).partition(|&j| self.sd[j].is_finite() && self.sd[j] > ZERO_SCALE);
        if keep.is_empty() {
            return Err(NormalizationError::AllGenesZeroVariance(total));
        }

        let excluded = dropped.iter().map(|&j| self.genes[j].clone()).collect();
        let table = Self {
            genes: keep.iter().map(|&j| self.genes[j].clone()).collect(),
            mean: self.mean.select(Axis(0), &keep),
            sd: self.sd.select(Axis(0), &keep),
        };
        Ok((table, excluded))
    }

    /// `(x - mean) / sd` per gene. `matrix` is subset to this table's genes first.
    pub fn apply(&self, matrix: &ExpressionMatrix) -> Result<ExpressionMatrix, NormalizationError> {
        let subset = matrix.select_genes(&self.genes)?;
        let scaled = (&subset.values - &self.mean) / &self.sd;
        Ok(subset.with_values(scaled)?)
    }
}

/// Centers and scales each row by its own mean and population standard deviation.
pub fn scale_samples(matrix: &ExpressionMatrix) -> Result<ExpressionMatrix, NormalizationError> {
    let mut values = matrix.values.clone();
    for (sample, mut row) in matrix.samples.iter().zip(values.rows_mut()) {
        let mean = row.mean().unwrap_or(0.0);
        let sd = row.std(0.0);
        if !(sd > ZERO_SCALE) {
            return Err(NormalizationError::DegenerateSample(sample.clone()));
        }
        row.mapv_inplace(|x| (x - mean) / sd);
    }
    Ok(matrix.with_values(values)?)
}

/// Training-derived normalization, fitted once and applied to both matrices.
#[derive(Debug, Clone)]
pub struct Normalizer {
    aligned_genes: Vec<String>,
    table: MeanSdTable,
}

impl Normalizer {
    /// Fits on `training` restricted to `aligned_genes` and returns the
    /// normalizer together with the doubly-scaled training matrix.
    pub fn fit(
        training: &ExpressionMatrix,
        aligned_genes: &[String],
    ) -> Result<(Self, ExpressionMatrix), NormalizationError> {
        let training_sw = scale_samples(&training.select_genes(aligned_genes)?)?;
        let (table, excluded) = MeanSdTable::fit(&training_sw)?.without_zero_variance()?;

        if !excluded.is_empty() {
            log::warn!(
                "Excluding {} of {} genes with zero variance across training samples",
                excluded.len(),
                aligned_genes.len()
            );
            log::debug!("Zero-variance genes: {excluded:?}");
        }

        let training_sw_fw = table.apply(&training_sw)?;
        let normalizer = Self {
            aligned_genes: aligned_genes.to_vec(),
            table,
        };
        Ok((normalizer, training_sw_fw))
    }

    /// Sample-wise scales `matrix` over the aligned genes, then feature-wise
    /// scales it with the training statistics.
    pub fn transform(&self, matrix: &ExpressionMatrix) -> Result<ExpressionMatrix, NormalizationError> {
        let sw = scale_samples(&matrix.select_genes(&self.aligned_genes)?)?;
        self.table.apply(&sw)
    }

    /// Genes that reach the classifier, after zero-variance exclusion.
    pub fn genes(&self) -> &[String] {
        &self.table.genes
    }

    pub fn table(&self) -> &MeanSdTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    fn matrix(values: Array2<f64>) -> ExpressionMatrix {
        let samples = (0..values.nrows()).map(|i| format!("s{i}")).collect();
        let genes = (0..values.ncols()).map(|j| format!("g{j}")).collect();
        ExpressionMatrix::new("sample".into(), samples, genes, values).unwrap()
    }

    #[test]
    fn sample_wise_rows_have_zero_mean_unit_population_sd() {
        let m = matrix(array![[1.0, 2.0, 3.0, 10.0], [5.0, 0.0, 0.0, 1.0]]);
        let sw = scale_samples(&m).unwrap();
        for row in sw.values.rows() {
            assert_abs_diff_eq!(row.mean().unwrap(), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(row.std(0.0), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn constant_sample_is_rejected() {
        let m = matrix(array![[1.0, 2.0, 3.0], [4.0, 4.0, 4.0]]);
        match scale_samples(&m) {
            Err(NormalizationError::DegenerateSample(s)) => assert_eq!(s, "s1"),
            other => panic!("Expected DegenerateSample(s1), got {:?}", other),
        }
    }

    #[test]
    fn training_genes_are_standardized() {
        let m = matrix(array![
            [1.0, 5.0, 2.0, 8.0, 0.5],
            [3.0, 1.0, 7.0, 2.0, 4.0],
            [0.0, 9.0, 1.0, 1.0, 6.0],
            [2.0, 2.0, 2.5, 9.0, 3.0],
        ]);
        let genes = m.genes.clone();
        let (normalizer, scaled) = Normalizer::fit(&m, &genes).unwrap();
        assert_eq!(normalizer.genes().len(), scaled.n_genes());
        for column in scaled.values.columns() {
            assert_abs_diff_eq!(column.mean().unwrap(), 0.0, epsilon = 1e-10);
            assert_abs_diff_eq!(column.std(1.0), 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn zero_variance_genes_are_excluded() {
        // Rows are permutations of each other in g1/g2, so g0 and g3 scale identically.
        let m = matrix(array![[1.0, 2.0, 3.0, 10.0], [1.0, 3.0, 2.0, 10.0]]);
        let genes = m.genes.clone();
        let (normalizer, scaled) = Normalizer::fit(&m, &genes).unwrap();
        assert_eq!(normalizer.genes(), &["g1".to_string(), "g2".to_string()]);
        assert_eq!(scaled.genes, vec!["g1", "g2"]);
        assert!(scaled.values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn zero_variance_split_keeps_gene_order() {
        let table = MeanSdTable {
            genes: ["a", "b", "c", "d", "e"].map(String::from).to_vec(),
            mean: Array1::zeros(5),
            sd: Array1::from(vec![1.0, 0.0, 2.0, f64::NAN, 0.5]),
        };
        let (kept, excluded) = table.without_zero_variance().unwrap();
        assert_eq!(kept.genes, vec!["a", "c", "e"]);
        assert_eq!(kept.sd.to_vec(), vec![1.0, 2.0, 0.5]);
        assert_eq!(excluded, vec!["b".to_string(), "d".to_string()]);
    }

    #[test]
    fn all_zero_variance_is_an_error() {
        let m = matrix(array![[1.0, 2.0, 3.0], [2.0, 4.0, 6.0]]);
        let genes = m.genes.clone();
        assert!(matches!(
            Normalizer::fit(&m, &genes),
            Err(NormalizationError::AllGenesZeroVariance(3))
        ));
    }

    #[test]
    fn single_training_sample_is_rejected() {
        let m = matrix(array![[1.0, 2.0, 3.0]]);
        let genes = m.genes.clone();
        assert!(matches!(
            Normalizer::fit(&m, &genes),
            Err(NormalizationError::TooFewSamples { found: 1, .. })
        ));
    }

    #[test]
    fn testing_uses_training_statistics() {
        let training = matrix(array![[1.0, 2.0, 6.0], [4.0, 1.0, 1.0], [2.0, 8.0, 3.0]]);
        let genes = training.genes.clone();
        let (normalizer, _) = Normalizer::fit(&training, &genes).unwrap();

        // Extra testing-only gene is ignored; columns are reordered to the training set.
        let testing = ExpressionMatrix::new(
            "id".into(),
            vec!["t0".into()],
            vec!["g2".into(), "extra".into(), "g0".into(), "g1".into()],
            array![[5.0, 100.0, 3.0, 1.0]],
        )
        .unwrap();
        let out = normalizer.transform(&testing).unwrap();
        assert_eq!(out.genes, vec!["g0", "g1", "g2"]);

        let row = array![3.0, 1.0, 5.0];
        let mean = row.mean().unwrap();
        let sd = row.std(0.0);
        let table = normalizer.table();
        for j in 0..3 {
            let expected = ((row[j] - mean) / sd - table.mean[j]) / table.sd[j];
            assert_abs_diff_eq!(out.values[[0, j]], expected, epsilon = 1e-12);
        }
    }
}
