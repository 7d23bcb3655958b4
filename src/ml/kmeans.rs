use ndarray::{Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{RegimeError, Result};

/// Result of a k-means fit.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    /// One row per cluster.
    pub centroids: Array2<f64>,
    /// Cluster id per observation, ids in `0..n_clusters`.
    pub labels: Vec<usize>,
    /// Sum of squared distances to the assigned centroid.
    pub inertia: f64,
    pub n_iter: usize,
}

/// Lloyd's k-means with k-means++ seeding and several restarts.
///
/// All randomness comes from one `StdRng` seeded with `seed`, so the same
/// data always produces the same fit. Cluster ids carry no meaning beyond
/// grouping.
#[derive(Debug, Clone)]
pub struct KMeans {
    n_clusters: usize,
    n_init: usize,
    max_iter: usize,
    tol: f64,
    seed: u64,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
        }
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn fit(&self, data: &Array2<f64>) -> Result<KMeansFit> {
        let n_samples = data.nrows();
        if self.n_clusters == 0 {
            return Err(RegimeError::Config("n_clusters must be > 0".to_string()));
        }
        if n_samples < self.n_clusters {
            return Err(RegimeError::InsufficientData(format!(
                "{} samples for {} clusters",
                n_samples, self.n_clusters
            )));
        }
        if let Some(index) = data.iter().position(|v| !v.is_finite()) {
            return Err(RegimeError::NonFinite {
                column: "features".to_string(),
                index: index / data.ncols().max(1),
            });
        }

        // Convergence threshold scales with the data's spread
        let spread = data.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0);
        let threshold = self.tol * spread;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<KMeansFit> = None;

        for run in 0..self.n_init {
            let centroids = self.init_plus_plus(data, &mut rng);
            let fit = self.lloyd(data, centroids, threshold);
            debug!(run, inertia = fit.inertia, n_iter = fit.n_iter, "k-means restart");

            let better = best.as_ref().map_or(true, |b| fit.inertia < b.inertia);
            if better {
                best = Some(fit);
            }
        }

        best.ok_or_else(|| RegimeError::Numerical("k-means produced no fit".to_string()))
    }

    fn init_plus_plus(&self, data: &Array2<f64>, rng: &mut StdRng) -> Array2<f64> {
        let n_samples = data.nrows();
        let mut centroids = Array2::zeros((self.n_clusters, data.ncols()));

        let first = rng.gen_range(0..n_samples);
        centroids.row_mut(0).assign(&data.row(first));

        for k in 1..self.n_clusters {
            let distances: Vec<f64> = data
                .rows()
                .into_iter()
                .map(|sample| {
                    (0..k)
                        .map(|j| squared_distance(sample, centroids.row(j)))
                        .fold(f64::INFINITY, f64::min)
                })
                .collect();
            let total: f64 = distances.iter().sum();

            let threshold = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            let mut chosen = n_samples - 1;
            for (i, &distance) in distances.iter().enumerate() {
                cumulative += distance;
                if cumulative >= threshold {
                    chosen = i;
                    break;
                }
            }
            centroids.row_mut(k).assign(&data.row(chosen));
        }

        centroids
    }

    fn lloyd(&self, data: &Array2<f64>, mut centroids: Array2<f64>, threshold: f64) -> KMeansFit {
        let mut labels = assign(data, &centroids);
        let mut n_iter = 0;

        for iteration in 0..self.max_iter {
            n_iter = iteration + 1;
            let previous = centroids.clone();

            let mut sums = Array2::<f64>::zeros(centroids.raw_dim());
            let mut counts = vec![0usize; self.n_clusters];
            for (sample, &label) in data.rows().into_iter().zip(&labels) {
                let mut row = sums.row_mut(label);
                row += &sample;
                counts[label] += 1;
            }
            for (k, &count) in counts.iter().enumerate() {
                // An empty cluster keeps its previous centroid
                if count > 0 {
                    let mean = &sums.row(k) / count as f64;
                    centroids.row_mut(k).assign(&mean);
                }
            }

            labels = assign(data, &centroids);

            let shift: f64 = (&centroids - &previous).mapv(|x| x * x).sum();
            if shift <= threshold {
                break;
            }
        }

        let inertia = data
            .rows()
            .into_iter()
            .zip(&labels)
            .map(|(sample, &label)| squared_distance(sample, centroids.row(label)))
            .sum();

        KMeansFit {
            centroids,
            labels,
            inertia,
            n_iter,
        }
    }
}

/// Nearest centroid per row; ties go to the lower cluster id.
pub fn assign(data: &Array2<f64>, centroids: &Array2<f64>) -> Vec<usize> {
    data.rows()
        .into_iter()
        .map(|sample| {
            let mut best = 0;
            let mut best_distance = f64::INFINITY;
            for (k, centroid) in centroids.rows().into_iter().enumerate() {
                let distance = squared_distance(sample, centroid);
                if distance < best_distance {
                    best_distance = distance;
                    best = k;
                }
            }
            best
        })
        .collect()
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_blobs() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [0.1, 0.1],
            [10.0, 10.0],
            [10.1, 10.0],
            [10.0, 10.1],
            [10.1, 10.1],
        ]
    }

    #[test]
    fn test_separates_blobs() {
        let fit = KMeans::new(2).fit(&two_blobs()).unwrap();
        assert_eq!(fit.labels.len(), 8);
        assert!(fit.labels[..4].iter().all(|&l| l == fit.labels[0]));
        assert!(fit.labels[4..].iter().all(|&l| l == fit.labels[4]));
        assert_ne!(fit.labels[0], fit.labels[4]);
        assert!(fit.inertia < 0.1);
    }

    #[test]
    fn test_same_seed_same_labels() {
        let data = two_blobs();
        let a = KMeans::new(3).with_seed(7).fit(&data).unwrap();
        let b = KMeans::new(3).with_seed(7).fit(&data).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.inertia, b.inertia);
    }

    #[test]
    fn test_too_few_samples() {
        let data = array![[1.0, 2.0]];
        assert!(matches!(
            KMeans::new(3).fit(&data),
            Err(RegimeError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_rejects_non_finite() {
        let data = array![[1.0, 2.0], [f64::NAN, 0.0], [3.0, 4.0]];
        match KMeans::new(2).fit(&data) {
            Err(RegimeError::NonFinite { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected non-finite error, got {:?}", other),
        }
    }

    #[test]
    fn test_identical_points() {
        let data = Array2::from_elem((5, 2), 1.0);
        let fit = KMeans::new(2).fit(&data).unwrap();
        assert_eq!(fit.inertia, 0.0);
        assert!(fit.labels.iter().all(|&l| l < 2));
    }
}
