//! Deterministic local embedding approximation.
//!
//! Used whenever the remote embedding endpoint is unavailable. The output is
//! a pure function of the input text and the dimension.

use mande_core::defaults::{FALLBACK_MAX_WORDS, FALLBACK_SPREAD, FALLBACK_STRIDE};

/// 32-bit rolling hash `h = h * 31 + c` with wrapping arithmetic.
pub fn rolling_hash(word: &str) -> u32 {
    word.chars()
        .fold(0u32, |h, c| h.wrapping_mul(31).wrapping_add(c as u32))
}

/// Hash-scatter embedding of `text` with `dimension` components.
///
/// Non-empty input yields a unit vector; input without words yields the
/// zero vector.
pub fn hash_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimension];
    if dimension == 0 {
        return vector;
    }

    let lowered = text.to_lowercase();
    for word in lowered.split_whitespace().take(FALLBACK_MAX_WORDS) {
        let h = rolling_hash(word);
        let value = (h % 1000) as f32 / 1000.0;
        for k in 0..FALLBACK_SPREAD {
            let bucket = (u64::from(h) + u64::from(k * FALLBACK_STRIDE)) % dimension as u64;
            vector[bucket as usize] += value;
        }
    }

    l2_normalize(vector)
}

/// Divide every component by the vector's magnitude; zero vectors pass through.
pub fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let magnitude = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in vector.iter_mut() {
            *x /= magnitude;
        }
    }
    vector
}
