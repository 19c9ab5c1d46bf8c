// Poisson Event Generator: seedable disturbance stream for the demo driver
// Each simulated year draws a Poisson event count with exponential sizes

use rand::Rng;
use rand_chacha::ChaCha8Rng;

pub struct EventGenerator {
    rng: ChaCha8Rng,
    /// Expected events per year.
    pub lambda: f64,
    /// Mean event size.
    pub mean_size: f64,
}

impl EventGenerator {
    pub fn new(rng: ChaCha8Rng, lambda: f64, mean_size: f64) -> Self {
        Self { rng, lambda, mean_size }
    }

    /// Event sizes for one simulated year (possibly none).
    pub fn generate_year(&mut self) -> Vec<f64> {
        if self.lambda <= 0.0 {
            return Vec::new();
        }
        let n = poisson_sample(&mut self.rng, self.lambda);
        (0..n)
            .map(|_| exponential_sample(&mut self.rng, self.mean_size))
            .collect()
    }
}

/// Poisson sampling via Knuth algorithm.
/// For λ < 30, uses direct method. For larger λ, uses normal approximation.
fn poisson_sample(rng: &mut ChaCha8Rng, lambda: f64) -> u32 {
    if lambda < 30.0 {
        let l = (-lambda).exp();
        let mut k: u32 = 0;
        let mut p: f64 = 1.0;
        loop {
            k += 1;
            p *= rng.gen::<f64>();
            if p <= l {
                return k - 1;
            }
        }
    } else {
        let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
        let u2: f64 = rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        let result = lambda + lambda.sqrt() * z;
        result.round().max(0.0) as u32
    }
}

/// Inverse-CDF exponential draw.
fn exponential_sample(rng: &mut ChaCha8Rng, mean: f64) -> f64 {
    let u: f64 = rng.gen();
    -(1.0 - u).ln() * mean
}
