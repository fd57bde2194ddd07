use rand::Rng;

/// Inverse-CDF draw over an ordered probability vector. The action order
/// is fixed by the caller, so a seeded RNG reproduces the same draws.
pub fn sample_weighted<R: Rng>(probs: &[f64], rng: &mut R) -> usize {
    debug_assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    let mut dart = rng.gen_range(0.0, 1.0);
    for (i, p) in probs.iter().enumerate() {
        dart -= p;
        if dart < 0.0 {
            return i;
        }
    }
    probs.len() - 1
}

/// Uniform distribution over `n` outcomes.
pub fn uniform(n: usize) -> Vec<f64> {
    debug_assert!(n > 0);
    vec![1.0 / n as f64; n]
}
