//! Multiclass linear SVM assembled from binary `linfa-svm` models.
//!
//! One binary model is fit for every pair of classes (one-vs-one). At
//! prediction time each pairwise model casts a vote; the class with the most
//! votes wins and ties go to the lower class code. With two classes this is a
//! single binary SVM.
//!
//! linfa is built on ndarray 0.15 while the rest of the crate uses 0.16, so
//! records are copied into `ndarray_v15` arrays at this boundary.

use super::ClassifyError;
use crate::config::SvmSettings;
use linfa::prelude::*;
use linfa_svm::Svm;
use ndarray::{Array2, ArrayView2};
use std::fmt;

/// Row-major copy of `records` as an ndarray 0.15 matrix.
fn to_linfa_records(records: ArrayView2<f64>) -> ndarray_v15::Array2<f64> {
    ndarray_v15::Array2::from_shape_fn(records.dim(), |(i, j)| records[[i, j]])
}

struct PairwiseModel {
    /// Class voted for when the model answers `true`.
    positive: usize,
    negative: usize,
    model: Svm<f64, bool>,
}

pub struct LinearSvc {
    n_classes: usize,
    n_features: usize,
    pairs: Vec<PairwiseModel>,
}

impl fmt::Debug for LinearSvc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearSvc")
            .field("n_classes", &self.n_classes)
            .field("n_features", &self.n_features)
            .field("pairwise_models", &self.pairs.len())
            .finish()
    }
}

impl LinearSvc {
    /// Fits on `records` (samples × features) with class `codes` in `0..n_classes`.
    pub fn fit(
        records: ArrayView2<f64>,
        codes: &[usize],
        n_classes: usize,
        settings: &SvmSettings,
    ) -> Result<Self, ClassifyError> {
        settings.validate()?;
        if records.nrows() != codes.len() {
            return Err(ClassifyError::LabelCountMismatch {
                records: records.nrows(),
                labels: codes.len(),
            });
        }
        if n_classes < 2 {
            return Err(ClassifyError::TooFewClasses(n_classes));
        }
        if let Some(&code) = codes.iter().find(|&&c| c >= n_classes) {
            return Err(ClassifyError::UnknownCode { code, n_classes });
        }

        let mut pairs = Vec::with_capacity(n_classes * (n_classes - 1) / 2);
        for positive in 0..n_classes {
            for negative in (positive + 1)..n_classes {
                let rows: Vec<usize> = codes
                    .iter()
                    .enumerate()
                    .filter(|&(_, &c)| c == positive || c == negative)
                    .map(|(r, _)| r)
                    .collect();
                let targets: ndarray_v15::Array1<bool> =
                    rows.iter().map(|&r| codes[r] == positive).collect();
                if targets.iter().all(|&t| t) || targets.iter().all(|&t| !t) {
                    // One class of the pair has no samples.
                    return Err(ClassifyError::TooFewClasses(1));
                }

                let subset = ndarray_v15::Array2::from_shape_fn(
                    (rows.len(), records.ncols()),
                    |(i, j)| records[[rows[i], j]],
                );
                let dataset = Dataset::new(subset, targets);
                let model = Svm::<f64, bool>::params()
                    .pos_neg_weights(settings.c, settings.c)
                    .eps(settings.tolerance)
                    .linear_kernel()
                    .fit(&dataset)?;
                log::debug!(
                    "Fit pairwise model {positive} vs {negative} on {} samples",
                    rows.len()
                );
                pairs.push(PairwiseModel {
                    positive,
                    negative,
                    model,
                });
            }
        }

        Ok(Self {
            n_classes,
            n_features: records.ncols(),
            pairs,
        })
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Predicted class code for each row of `records`.
    pub fn predict(&self, records: ArrayView2<f64>) -> Result<Vec<usize>, ClassifyError> {
        if records.ncols() != self.n_features {
            return Err(ClassifyError::FeatureMismatch {
                expected: self.n_features,
                found: records.ncols(),
            });
        }

        let linfa_records = to_linfa_records(records);
        let mut votes = Array2::<usize>::zeros((records.nrows(), self.n_classes));
        for pair in &self.pairs {
            let decisions: ndarray_v15::Array1<bool> = pair.model.predict(&linfa_records);
            for (r, &decision) in decisions.iter().enumerate() {
                let winner = if decision {
                    pair.positive
                } else {
                    pair.negative
                };
                votes[[r, winner]] += 1;
            }
        }

        Ok(votes
            .rows()
            .into_iter()
            .map(|row| {
                // First maximum wins, so ties resolve to the lower code.
                let mut best = 0;
                for (code, &count) in row.iter().enumerate() {
                    if count > row[best] {
                        best = code;
                    }
                }
                best
            })
            .collect())
    }
}
