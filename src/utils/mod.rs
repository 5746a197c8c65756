use rand::Rng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

pub mod validation;

/// Cosine of the angle between `a` and `b`.
///
/// Mismatched lengths, empty inputs and zero-norm vectors all yield 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot_product / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

pub fn normalize_vector(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Stable-within-a-build 64-bit hash of a string.
pub fn hash_str(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Retries `operation` while `should_retry` accepts the error, doubling the
/// delay each time and adding up to 50% random jitter.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    mut operation: F,
    max_retries: usize,
    initial_delay: Duration,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut delay = initial_delay;
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries && should_retry(&e) => {
                attempt += 1;
                let jitter_ms = delay.as_millis() as u64 / 2;
                let jitter = if jitter_ms > 0 {
                    Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
                } else {
                    Duration::ZERO
                };

                tracing::warn!(
                    "Operation failed (attempt {}), retrying in {:?}: {}",
                    attempt,
                    delay + jitter,
                    e
                );
                tokio::time::sleep(delay + jitter).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}
