//! The two prediction workflows: tumor vs. non-tumor and tissue of origin.

use super::ClassifyError;
use super::prediction::{self, Prediction};
use super::training;
use crate::config::{ReferencePaths, SvmSettings, ToposConfig};
use crate::genes::GeneList;
use crate::matrix::{ExpressionMatrix, SampleLabels};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Tumor,
    TissueOfOrigin,
}

impl Task {
    /// Tag embedded in the prediction file name.
    pub fn file_tag(self) -> &'static str {
        match self {
            Task::Tumor => "tumor-non-tumor",
            Task::TissueOfOrigin => "TOO",
        }
    }

    /// Reference training matrix and labels for this task.
    pub fn reference(self, paths: &ReferencePaths) -> (&Path, &Path) {
        match self {
            Task::Tumor => (&paths.tumor_training, &paths.tumor_labels),
            Task::TissueOfOrigin => (&paths.too_training, &paths.too_labels),
        }
    }

    /// `P_<tag>_<n>-genes.tsv`
    pub fn prediction_file_name(self, n_genes: usize) -> String {
        format!("P_{}_{}-genes.tsv", self.file_tag(), n_genes)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Tumor => write!(f, "tumor vs non-tumor"),
            Task::TissueOfOrigin => write!(f, "tissue of origin"),
        }
    }
}

#[derive(Debug)]
pub struct TaskOutcome {
    pub output_path: PathBuf,
    /// Genes actually used after alignment and zero-variance exclusion.
    pub n_genes: usize,
    pub predictions: Vec<Prediction>,
}

/// Train → normalize testing → predict, entirely in memory.
pub fn classify(
    training: &ExpressionMatrix,
    labels: &SampleLabels,
    testing: &ExpressionMatrix,
    gene_list: Option<&GeneList>,
    settings: &SvmSettings,
) -> Result<(usize, Vec<Prediction>), ClassifyError> {
    log::info!("Training model starts");
    let trained = training::train(training, labels, &testing.genes, gene_list, settings)?;

    log::info!("Normalization of testing dataset starts");
    let testing_sw_fw = prediction::normalize_testing(testing, &trained)?;

    log::info!("Prediction starts");
    let predictions = prediction::predict(&testing_sw_fw, &trained)?;
    Ok((testing_sw_fw.n_genes(), predictions))
}

/// Loads the task's reference data and the user's testing matrix, classifies,
/// and writes the prediction file into `prediction_dir`.
pub fn run_task(
    task: Task,
    testing_path: &Path,
    gene_list_path: Option<&Path>,
    prediction_dir: &Path,
    config: &ToposConfig,
) -> Result<TaskOutcome, ClassifyError> {
    let (training_path, labels_path) = task.reference(&config.reference);
    log::info!("Importing reference data for {task} prediction");
    let training = ExpressionMatrix::from_tsv(training_path)?;
    let labels = SampleLabels::from_tsv(labels_path)?;
    let testing = ExpressionMatrix::from_tsv(testing_path)?;
    let gene_list = gene_list_path.map(GeneList::from_file).transpose()?;

    let (n_genes, predictions) = classify(
        &training,
        &labels,
        &testing,
        gene_list.as_ref(),
        &config.classifier,
    )?;

    fs::create_dir_all(prediction_dir)?;
    let output_path = prediction_dir.join(task.prediction_file_name(n_genes));
    prediction::write_predictions(&output_path, &testing.index_label, &predictions)?;
    log::info!(
        "Wrote {} {task} predictions over {n_genes} genes to '{}'",
        predictions.len(),
        output_path.display()
    );

    Ok(TaskOutcome {
        output_path,
        n_genes,
        predictions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_embed_task_and_gene_count() {
        assert_eq!(
            Task::Tumor.prediction_file_name(812),
            "P_tumor-non-tumor_812-genes.tsv"
        );
        assert_eq!(
            Task::TissueOfOrigin.prediction_file_name(3),
            "P_TOO_3-genes.tsv"
        );
    }

    #[test]
    fn each_task_reads_its_own_reference() {
        let paths = ReferencePaths::default();
        let (tumor_training, tumor_labels) = Task::Tumor.reference(&paths);
        assert_eq!(tumor_training, paths.tumor_training.as_path());
        assert_eq!(tumor_labels, paths.tumor_labels.as_path());
        let (too_training, _) = Task::TissueOfOrigin.reference(&paths);
        assert_eq!(too_training, paths.too_training.as_path());
    }
}
