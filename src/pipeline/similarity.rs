use crate::error::{FaceError, FaceResult};

/// Cosine similarity `dot(a,b) / (|a|·|b|)`, clamped to `[-1, 1]`.
///
/// Vectors of different length are rejected. A zero-magnitude vector scores
/// `0.0` against anything rather than producing NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> FaceResult<f32> {
    if a.len() != b.len() {
        return Err(FaceError::InvalidArgument(format!(
            "embedding length mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    let similarity = dot_product / (norm_a * norm_b);
    if similarity.is_nan() {
        return Ok(0.0);
    }
    Ok(similarity.clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_similarity_is_one() {
        for v in [vec![1.0, 2.0, 3.0], vec![-0.3, 0.9], vec![1e-3; 512], vec![7.5]] {
            let s = cosine_similarity(&v, &v).unwrap();
            assert!((s - 1.0).abs() < 1e-5, "got {}", s);
        }
    }

    #[test]
    fn test_symmetric() {
        let a = [0.2, -0.7, 0.1, 0.9];
        let b = [0.5, 0.5, -0.3, 0.05];
        assert_eq!(cosine_similarity(&a, &b).unwrap(), cosine_similarity(&b, &a).unwrap());
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let zero = [0.0; 4];
        let other = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(cosine_similarity(&zero, &other).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&other, &zero).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero).unwrap(), 0.0);
    }

    #[test]
    fn test_orthogonal_and_opposite() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]).unwrap() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_scale_invariant() {
        let s = cosine_similarity(&[1.0, 0.0, 0.0, 0.0, 0.0], &[3.0, 2.0, 1.0, 1.0, 1.0]).unwrap();
        assert_eq!(s, 0.75);
        let scaled = cosine_similarity(&[10.0, 0.0, 0.0, 0.0, 0.0], &[3.0, 2.0, 1.0, 1.0, 1.0]).unwrap();
        assert_eq!(scaled, 0.75);
    }

    #[test]
    fn test_length_mismatch_is_invalid_argument() {
        let err = cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, FaceError::InvalidArgument(_)));
    }
}
