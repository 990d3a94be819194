//! Supervised tumor / tissue-of-origin classification.
//!
//! A run trains on a reference matrix restricted to the genes it shares with the
//! testing matrix, then normalizes and classifies the testing samples with the
//! training statistics. Nothing is persisted between runs.

pub mod encoder;
pub mod prediction;
pub mod svm;
pub mod task;
pub mod training;

use crate::config::ConfigError;
use crate::genes::AlignmentError;
use crate::matrix::MatrixError;
use crate::normalization::NormalizationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    #[error(transparent)]
    Alignment(#[from] AlignmentError),
    #[error(transparent)]
    Normalization(#[from] NormalizationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Linear SVM fit failed: {0}")]
    SvmFit(#[from] linfa_svm::SvmError),
    #[error("Training labels contain {0} distinct class(es); at least two are required.")]
    TooFewClasses(usize),
    #[error("Label '{0}' was not seen during training.")]
    UnknownLabel(String),
    #[error("Class code {code} is outside the {n_classes} trained classes.")]
    UnknownCode { code: usize, n_classes: usize },
    #[error("{records} samples were given with {labels} labels.")]
    LabelCountMismatch { records: usize, labels: usize },
    #[error(
        "The classifier was trained on {expected} genes but the testing matrix provides {found}."
    )]
    FeatureMismatch { expected: usize, found: usize },
}
