//! One-dimensional K-Means used by the `kmeans` binning strategy.
//!
//! Lloyd's algorithm with k-means++ seeding. Boundaries are later placed at
//! the midpoints between adjacent sorted centers.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// K-Means over a single feature column.
///
/// # Examples
///
/// ```
/// use faultsense::discretize::kmeans::KMeans1d;
///
/// let data = [1.0, 1.1, 0.9, 10.0, 10.2, 9.8];
/// let mut km = KMeans1d::new(2).with_random_state(0);
/// km.fit(&data).unwrap();
/// let centers = km.sorted_centers().unwrap();
/// assert!((centers[0] - 1.0).abs() < 1e-9);
/// assert!((centers[1] - 10.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct KMeans1d {
    n_clusters: usize,
    max_iter: usize,
    tol: f64,
    random_state: u64,
    centers: Option<Vec<f64>>,
    inertia: f64,
    n_iter: usize,
}

impl KMeans1d {
    /// Creates a new K-Means with the specified number of clusters.
    #[must_use]
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            random_state: 0,
            centers: None,
            inertia: 0.0,
            n_iter: 0,
        }
    }

    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    #[must_use]
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    #[must_use]
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Cluster centers in ascending order, `None` before fitting.
    #[must_use]
    pub fn sorted_centers(&self) -> Option<Vec<f64>> {
        let mut centers = self.centers.clone()?;
        centers.sort_by(f64::total_cmp);
        Some(centers)
    }

    /// Within-cluster sum of squares.
    #[must_use]
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    #[must_use]
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// k-means++ seeding: each new center is drawn with probability
    /// proportional to its squared distance from the nearest chosen center.
    fn plusplus_init(&self, x: &[f64]) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(self.random_state);
        let mut centers = Vec::with_capacity(self.n_clusters);
        centers.push(x[rng.gen_range(0..x.len())]);

        let mut min_dist: Vec<f64> = x.iter().map(|v| (v - centers[0]).powi(2)).collect();
        while centers.len() < self.n_clusters {
            let total: f64 = min_dist.iter().sum();
            let next = if total > 0.0 {
                let mut target = rng.gen::<f64>() * total;
                let mut chosen = x.len() - 1;
                for (i, d) in min_dist.iter().enumerate() {
                    if target < *d {
                        chosen = i;
                        break;
                    }
                    target -= d;
                }
                x[chosen]
            } else {
                // every point already sits on a center
                centers[0]
            };
            centers.push(next);
            for (d, v) in min_dist.iter_mut().zip(x) {
                *d = d.min((v - next).powi(2));
            }
        }
        centers
    }

    fn nearest(centers: &[f64], v: f64) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (k, c) in centers.iter().enumerate() {
            let dist = (v - c).abs();
            if dist < best_dist {
                best_dist = dist;
                best = k;
            }
        }
        best
    }

    /// Fits the model.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is empty, has fewer samples than
    /// clusters, or the cluster count is zero.
    pub fn fit(&mut self, x: &[f64]) -> Result<(), &'static str> {
        if self.n_clusters == 0 {
            return Err("Number of clusters must be positive");
        }
        if x.is_empty() {
            return Err("Cannot fit with zero samples");
        }
        if x.len() < self.n_clusters {
            return Err("Number of samples must be >= number of clusters");
        }

        let mut centers = self.plusplus_init(x);
        let mut labels = vec![0usize; x.len()];

        for iter in 0..self.max_iter {
            for (label, v) in labels.iter_mut().zip(x) {
                *label = Self::nearest(&centers, *v);
            }

            let mut sums = vec![0.0; self.n_clusters];
            let mut counts = vec![0usize; self.n_clusters];
            for (label, v) in labels.iter().zip(x) {
                sums[*label] += v;
                counts[*label] += 1;
            }
            // empty clusters keep their previous center
            let updated: Vec<f64> = centers
                .iter()
                .enumerate()
                .map(|(k, c)| {
                    if counts[k] > 0 {
                        sums[k] / counts[k] as f64
                    } else {
                        *c
                    }
                })
                .collect();

            let shift = centers
                .iter()
                .zip(&updated)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            centers = updated;
            self.n_iter = iter + 1;
            if shift <= self.tol {
                break;
            }
        }

        self.inertia = x
            .iter()
            .map(|v| (v - centers[Self::nearest(&centers, *v)]).powi(2))
            .sum();
        self.centers = Some(centers);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_separated_groups() {
        let data = [0.0, 0.1, 0.2, 5.0, 5.1, 5.2, 10.0, 10.1, 10.2];
        let mut km = KMeans1d::new(3).with_random_state(7);
        km.fit(&data).unwrap();
        let centers = km.sorted_centers().unwrap();
        assert!((centers[0] - 0.1).abs() < 1e-9);
        assert!((centers[1] - 5.1).abs() < 1e-9);
        assert!((centers[2] - 10.1).abs() < 1e-9);
        assert!(km.inertia() < 0.2);
    }

    #[test]
    fn test_reproducible_with_same_seed() {
        let data: Vec<f64> = (0..200).map(|i| ((i * 37) % 101) as f64).collect();
        let mut a = KMeans1d::new(5).with_random_state(3);
        let mut b = KMeans1d::new(5).with_random_state(3);
        a.fit(&data).unwrap();
        b.fit(&data).unwrap();
        assert_eq!(a.sorted_centers(), b.sorted_centers());
    }

    #[test]
    fn test_errors() {
        assert!(KMeans1d::new(2).fit(&[]).is_err());
        assert!(KMeans1d::new(3).fit(&[1.0, 2.0]).is_err());
        assert!(KMeans1d::new(0).fit(&[1.0]).is_err());
    }

    #[test]
    fn test_identical_points_converge() {
        let data = [4.2; 10];
        let mut km = KMeans1d::new(2);
        km.fit(&data).unwrap();
        assert_eq!(km.sorted_centers().unwrap(), vec![4.2, 4.2]);
        assert_eq!(km.inertia(), 0.0);
    }

    #[test]
    fn test_unfitted_has_no_centers() {
        assert!(KMeans1d::new(2).sorted_centers().is_none());
    }
}
