//! K-means color quantization.
//!
//! Lloyd iterations over RGB samples with random-sample initialization and
//! several restarts; the run with the lowest compactness (sum of squared
//! distances to the assigned center) wins.

use image::{Rgb, RgbImage};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// K-means parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    /// Number of clusters.
    pub clusters: usize,
    /// Iteration cap per attempt.
    pub max_iterations: usize,
    /// An attempt stops early once no center moves farther than this.
    pub epsilon: f32,
    /// Number of independent restarts.
    pub attempts: usize,
    /// Seed for center initialization; attempts use consecutive seeds.
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            clusters: 10,
            max_iterations: 10,
            epsilon: 1.0,
            attempts: 4,
            seed: 0x5eed,
        }
    }
}

crate::impl_config_validator!(KMeansConfig {
    clusters: min(1),
    max_iterations: min(1),
    epsilon: min(0.0),
    attempts: min(1),
});

/// Result of a clustering run.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// Cluster centers.
    pub centers: Vec<[f32; 3]>,
    /// Center index for every sample.
    pub labels: Vec<usize>,
    /// Sum of squared distances from samples to their centers.
    pub compactness: f64,
}

#[inline]
fn squared_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

fn nearest_center(sample: &[f32; 3], centers: &[[f32; 3]]) -> (usize, f32) {
    centers
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(sample, c)))
        .fold((0, f32::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

fn run_attempt(samples: &[[f32; 3]], k: usize, config: &KMeansConfig, seed: u64) -> KMeansResult {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centers: Vec<[f32; 3]> = rand::seq::index::sample(&mut rng, samples.len(), k)
        .iter()
        .map(|i| samples[i])
        .collect();

    let epsilon_sq = config.epsilon * config.epsilon;
    let mut labels = vec![0usize; samples.len()];

    for _ in 0..config.max_iterations.max(1) {
        labels = samples
            .par_iter()
            .map(|s| nearest_center(s, &centers).0)
            .collect();

        let mut sums = vec![[0.0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (sample, &label) in samples.iter().zip(&labels) {
            for c in 0..3 {
                sums[label][c] += sample[c] as f64;
            }
            counts[label] += 1;
        }

        let mut max_shift_sq = 0.0f32;
        for (center, (sum, &count)) in centers.iter_mut().zip(sums.iter().zip(&counts)) {
            // An empty cluster keeps its previous center.
            if count == 0 {
                continue;
            }
            let updated = [
                (sum[0] / count as f64) as f32,
                (sum[1] / count as f64) as f32,
                (sum[2] / count as f64) as f32,
            ];
            max_shift_sq = max_shift_sq.max(squared_distance(center, &updated));
            *center = updated;
        }

        if max_shift_sq <= epsilon_sq {
            break;
        }
    }

    let (labels, compactness): (Vec<usize>, Vec<f64>) = samples
        .par_iter()
        .map(|s| {
            let (label, dist) = nearest_center(s, &centers);
            (label, dist as f64)
        })
        .unzip();

    KMeansResult {
        centers,
        labels,
        compactness: compactness.iter().sum(),
    }
}

/// Clusters `samples` into at most `config.clusters` groups.
///
/// Returns `None` when there is nothing to cluster.
pub fn kmeans(samples: &[[f32; 3]], config: &KMeansConfig) -> Option<KMeansResult> {
    if samples.is_empty() || config.clusters == 0 {
        return None;
    }
    let k = config.clusters.min(samples.len());

    (0..config.attempts.max(1) as u64)
        .map(|attempt| run_attempt(samples, k, config, config.seed.wrapping_add(attempt)))
        .min_by(|a, b| a.compactness.total_cmp(&b.compactness))
}

/// Replaces every pixel with its cluster center.
pub fn posterize(image: &RgbImage, config: &KMeansConfig) -> RgbImage {
    let samples: Vec<[f32; 3]> = image
        .pixels()
        .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
        .collect();

    let Some(result) = kmeans(&samples, config) else {
        return image.clone();
    };

    let palette: Vec<Rgb<u8>> = result
        .centers
        .iter()
        .map(|c| Rgb(c.map(|v| v.clamp(0.0, 255.0) as u8)))
        .collect();

    let mut out = RgbImage::new(image.width(), image.height());
    for (dst, &label) in out.pixels_mut().zip(&result.labels) {
        *dst = palette[label];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_two_obvious_clusters() {
        let mut samples = vec![[10.0, 10.0, 10.0]; 50];
        samples.extend(vec![[240.0, 240.0, 240.0]; 50]);
        let config = KMeansConfig {
            clusters: 2,
            ..Default::default()
        };
        let result = kmeans(&samples, &config).unwrap();
        assert!(result.compactness < 1e-6);
        assert_ne!(result.labels[0], result.labels[99]);
    }

    #[test]
    fn test_more_clusters_than_samples() {
        let samples = vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let result = kmeans(&samples, &KMeansConfig::default()).unwrap();
        assert_eq!(result.centers.len(), 2);
    }

    #[test]
    fn test_posterize_limits_palette() {
        let image = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]));
        let config = KMeansConfig {
            clusters: 4,
            ..Default::default()
        };
        let poster = posterize(&image, &config);
        let colors: HashSet<[u8; 3]> = poster.pixels().map(|p| p.0).collect();
        assert!(colors.len() <= 4);
        assert_eq!(poster.dimensions(), image.dimensions());
    }

    #[test]
    fn test_posterize_is_deterministic() {
        let image = RgbImage::from_fn(32, 32, |x, y| Rgb([(x * 8) as u8, (x * y) as u8, (y * 8) as u8]));
        let config = KMeansConfig::default();
        assert_eq!(posterize(&image, &config), posterize(&image, &config));
    }
}
