use super::ClassifyError;
use std::collections::BTreeSet;

/// Maps class names to integer codes and back.
///
/// Codes follow the sorted order of the distinct training labels, so
/// `["tumor", "tumor", "normal"]` gives `normal = 0`, `tumor = 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Self {
        let classes: BTreeSet<&str> = labels.iter().map(AsRef::as_ref).collect();
        Self {
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn encode(&self, label: &str) -> Result<usize, ClassifyError> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| ClassifyError::UnknownLabel(label.to_string()))
    }

    pub fn decode(&self, code: usize) -> Result<&str, ClassifyError> {
        self.classes
            .get(code)
            .map(String::as_str)
            .ok_or(ClassifyError::UnknownCode {
                code,
                n_classes: self.n_classes(),
            })
    }

    pub fn transform<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>, ClassifyError> {
        labels.iter().map(|l| self.encode(l.as_ref())).collect()
    }

    pub fn inverse_transform(&self, codes: &[usize]) -> Result<Vec<String>, ClassifyError> {
        codes
            .iter()
            .map(|&c| self.decode(c).map(str::to_string))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_sorted_labels() {
        let encoder = LabelEncoder::fit(&["tumor", "tumor", "normal"]);
        assert_eq!(encoder.classes(), &["normal".to_string(), "tumor".to_string()]);
        assert_eq!(encoder.transform(&["tumor", "tumor", "normal"]).unwrap(), vec![1, 1, 0]);
    }

    #[test]
    fn decoding_returns_every_training_label() {
        let labels = ["Lung", "Breast", "Colon", "Breast", "Prostate", "Lung"];
        let encoder = LabelEncoder::fit(&labels);
        let codes = encoder.transform(&labels).unwrap();
        let decoded = encoder.inverse_transform(&codes).unwrap();
        assert_eq!(decoded, labels.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn unknown_label_and_code_are_errors() {
        let encoder = LabelEncoder::fit(&["a", "b"]);
        assert!(matches!(encoder.encode("c"), Err(ClassifyError::UnknownLabel(l)) if l == "c"));
        assert!(matches!(
            encoder.decode(2),
            Err(ClassifyError::UnknownCode { code: 2, n_classes: 2 })
        ));
    }
}
