use super::ClassifyError;
use super::training::TrainedClassifier;
use crate::matrix::{self, ExpressionMatrix, MatrixError};
use std::path::Path;

/// Hard class label for one testing sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub sample: String,
    pub label: String,
}

/// Scales `testing` the way the training matrix was scaled: sample-wise over the
/// aligned genes, then feature-wise with the training mean/SD table.
pub fn normalize_testing(
    testing: &ExpressionMatrix,
    trained: &TrainedClassifier,
) -> Result<ExpressionMatrix, ClassifyError> {
    Ok(trained.normalizer().transform(testing)?)
}

/// Classifies every sample of an already normalized testing matrix.
pub fn predict(
    testing_nrmlz: &ExpressionMatrix,
    trained: &TrainedClassifier,
) -> Result<Vec<Prediction>, ClassifyError> {
    if testing_nrmlz.genes != trained.genes() {
        return Err(ClassifyError::FeatureMismatch {
            expected: trained.n_genes(),
            found: testing_nrmlz.n_genes(),
        });
    }

    let codes = trained.svm().predict(testing_nrmlz.values.view())?;
    let labels = trained.encoder().inverse_transform(&codes)?;
    Ok(testing_nrmlz
        .samples
        .iter()
        .cloned()
        .zip(labels)
        .map(|(sample, label)| Prediction { sample, label })
        .collect())
}

/// `<index_label>\tbest_prediction`, one row per sample.
pub fn write_predictions(
    path: &Path,
    index_label: &str,
    predictions: &[Prediction],
) -> Result<(), ClassifyError> {
    let mut writer = matrix::tsv_writer(path)?;
    writer
        .write_record([index_label, "best_prediction"])
        .map_err(MatrixError::from)?;
    for p in predictions {
        writer
            .write_record([p.sample.as_str(), p.label.as_str()])
            .map_err(MatrixError::from)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::training::train;
    use crate::config::SvmSettings;
    use crate::matrix::SampleLabels;
    use ndarray::array;
    use tempfile::NamedTempFile;

    fn trained() -> TrainedClassifier {
        let m = ExpressionMatrix::new(
            "sample".into(),
            ["a", "b", "c", "d", "e", "f"].map(String::from).to_vec(),
            ["g1", "g2", "g3"].map(String::from).to_vec(),
            array![
                [9.0, 1.0, 3.0],
                [8.0, 2.0, 3.5],
                [9.5, 1.5, 2.5],
                [1.0, 9.0, 3.0],
                [2.0, 8.0, 2.0],
                [1.5, 9.5, 3.5],
            ],
        )
        .unwrap();
        let labels = SampleLabels::from_pairs([
            ("a", "tumor"),
            ("b", "tumor"),
            ("c", "tumor"),
            ("d", "normal"),
            ("e", "normal"),
            ("f", "normal"),
        ]);
        train(&m, &labels, &m.genes, None, &SvmSettings::default()).unwrap()
    }

    #[test]
    fn predictions_are_label_strings() {
        let trained = trained();
        let testing = ExpressionMatrix::new(
            "id".into(),
            vec!["x".into(), "y".into()],
            vec!["g3".into(), "g2".into(), "g1".into()],
            array![[3.0, 1.2, 8.8], [2.8, 8.7, 1.1]],
        )
        .unwrap();
        let scaled = normalize_testing(&testing, &trained).unwrap();
        let predictions = predict(&scaled, &trained).unwrap();

        assert_eq!(
            predictions,
            vec![
                Prediction { sample: "x".into(), label: "tumor".into() },
                Prediction { sample: "y".into(), label: "normal".into() },
            ]
        );
    }

    #[test]
    fn unnormalized_gene_order_is_rejected() {
        let trained = trained();
        let testing = ExpressionMatrix::new(
            "id".into(),
            vec!["x".into()],
            vec!["g3".into(), "g2".into(), "g1".into()],
            array![[3.0, 1.2, 8.8]],
        )
        .unwrap();
        assert!(matches!(
            predict(&testing, &trained),
            Err(ClassifyError::FeatureMismatch { .. })
        ));
    }

    #[test]
    fn prediction_file_layout() {
        let out = NamedTempFile::new().unwrap();
        let predictions = vec![
            Prediction { sample: "x".into(), label: "Breast".into() },
            Prediction { sample: "y".into(), label: "Lung".into() },
        ];
        write_predictions(out.path(), "sample", &predictions).unwrap();
        let text = std::fs::read_to_string(out.path()).unwrap();
        assert_eq!(text, "sample\tbest_prediction\nx\tBreast\ny\tLung\n");
    }
}
