use super::ClassifyError;
use super::encoder::LabelEncoder;
use super::svm::LinearSvc;
use crate::config::SvmSettings;
use crate::genes::{GeneList, align_genes};
use crate::matrix::{ExpressionMatrix, SampleLabels};
use crate::normalization::Normalizer;

/// Everything fitted on the training side of one run. Immutable once built and
/// tied to the testing genes it was aligned against.
#[derive(Debug)]
pub struct TrainedClassifier {
    normalizer: Normalizer,
    encoder: LabelEncoder,
    svm: LinearSvc,
}

impl TrainedClassifier {
    /// Genes the classifier consumes, in order.
    pub fn genes(&self) -> &[String] {
        self.normalizer.genes()
    }

    pub fn n_genes(&self) -> usize {
        self.genes().len()
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn encoder(&self) -> &LabelEncoder {
        &self.encoder
    }

    pub fn svm(&self) -> &LinearSvc {
        &self.svm
    }
}

/// Trains on the genes shared by `training`, `testing_genes` and `gene_list`.
///
/// The training subset is sample-wise and feature-wise scaled with its own
/// statistics, labels are encoded in sorted order, and a linear SVM is fit on
/// the result.
pub fn train(
    training: &ExpressionMatrix,
    labels: &SampleLabels,
    testing_genes: &[String],
    gene_list: Option<&GeneList>,
    settings: &SvmSettings,
) -> Result<TrainedClassifier, ClassifyError> {
    let aligned = align_genes(&training.genes, testing_genes, gene_list)?;
    let (normalizer, training_scaled) = Normalizer::fit(training, &aligned)?;

    let training_labels = labels.labels_for(&training.samples)?;
    let encoder = LabelEncoder::fit(&training_labels);
    if encoder.n_classes() < 2 {
        return Err(ClassifyError::TooFewClasses(encoder.n_classes()));
    }
    let codes = encoder.transform(&training_labels)?;
    log::info!(
        "Training on {} samples × {} genes across {} classes: {:?}",
        training_scaled.n_samples(),
        training_scaled.n_genes(),
        encoder.n_classes(),
        encoder.classes()
    );

    let svm = LinearSvc::fit(
        training_scaled.values.view(),
        &codes,
        encoder.n_classes(),
        settings,
    )?;

    Ok(TrainedClassifier {
        normalizer,
        encoder,
        svm,
    })
}
