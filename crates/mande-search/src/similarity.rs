//! Vector similarity.

use mande_core::{Error, Result, Vector};

/// Cosine similarity `dot / (|a| * |b|)`.
///
/// Returns 0 when either operand has zero magnitude and `InvalidInput` when
/// the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::InvalidInput(format!(
            "Vector dimension mismatch: {} != {}",
            a.len(),
            b.len()
        )));
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let a_norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let b_norm: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if a_norm == 0.0 || b_norm == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (a_norm * b_norm))
}

/// [`cosine_similarity`] over stored vectors.
pub fn vector_similarity(a: &Vector, b: &Vector) -> Result<f32> {
    cosine_similarity(a.as_slice(), b.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]).unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).unwrap() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_magnitude_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = cosine_similarity(&[1.0], &[1.0, 0.0]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
