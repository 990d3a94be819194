//! RPKM/FPKM to TPM conversion: each sample is rescaled so its values sum to one million.

use crate::matrix::{ExpressionMatrix, MatrixError};
use std::path::Path;
use thiserror::Error;

const TPM_TOTAL: f64 = 1e6;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    #[error("Sample '{sample}' sums to {sum}; only samples with a positive total can be converted to TPM.")]
    ZeroSumSample { sample: String, sum: f64 },
}

/// `value / row_sum * 1e6` for every sample.
pub fn to_tpm(matrix: &ExpressionMatrix) -> Result<ExpressionMatrix, ConversionError> {
    let mut values = matrix.values.clone();
    for (sample, mut row) in matrix.samples.iter().zip(values.rows_mut()) {
        let sum = row.sum();
        if !(sum > 0.0 && sum.is_finite()) {
            return Err(ConversionError::ZeroSumSample {
                sample: sample.clone(),
                sum,
            });
        }
        row.mapv_inplace(|x| x / sum * TPM_TOTAL);
    }
    Ok(matrix.with_values(values)?)
}

/// Reads `input`, converts it and writes the result with index label `sample`.
pub fn convert_file(input: &Path, output: &Path) -> Result<ExpressionMatrix, ConversionError> {
    let matrix = ExpressionMatrix::from_tsv(input)?;
    let tpm = to_tpm(&matrix)?;
    tpm.write_tsv(output, "sample")?;
    log::info!(
        "Converted {} samples × {} genes to TPM: '{}'",
        tpm.n_samples(),
        tpm.n_genes(),
        output.display()
    );
    Ok(tpm)
}
