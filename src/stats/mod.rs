//! Descriptive statistics over sensor columns.
//!
//! Percentiles use linear interpolation between closest ranks (R-7), the
//! default in R, `NumPy` and Pandas, so boundaries line up with what plant
//! engineers see in their spreadsheets.

/// Descriptive statistics over a slice of finite `f64` values.
///
/// Callers are expected to strip NaN before construction; see
/// [`finite_values`].
#[derive(Debug, Clone, Copy)]
pub struct DescriptiveStats<'a> {
    data: &'a [f64],
}

impl<'a> DescriptiveStats<'a> {
    #[must_use]
    pub fn new(data: &'a [f64]) -> Self {
        Self { data }
    }

    /// Arithmetic mean, `None` when empty.
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        if self.data.is_empty() {
            return None;
        }
        Some(self.data.iter().sum::<f64>() / self.data.len() as f64)
    }

    /// Population standard deviation (divides by n).
    #[must_use]
    pub fn std(&self) -> Option<f64> {
        let mean = self.mean()?;
        let var = self
            .data
            .iter()
            .map(|x| (x - mean) * (x - mean))
            .sum::<f64>()
            / self.data.len() as f64;
        Some(var.sqrt())
    }

    #[must_use]
    pub fn min(&self) -> Option<f64> {
        self.data.iter().copied().reduce(f64::min)
    }

    #[must_use]
    pub fn max(&self) -> Option<f64> {
        self.data.iter().copied().reduce(f64::max)
    }

    /// Compute multiple percentiles efficiently (single sort).
    ///
    /// # Arguments
    /// * `percentiles` - Slice of percentile values (0-100)
    ///
    /// # Returns
    /// Vector of percentile values in the same order as input
    ///
    /// # Errors
    /// Returns error if the data is empty or a percentile is outside [0, 100].
    ///
    /// # Examples
    /// ```
    /// use faultsense::stats::DescriptiveStats;
    ///
    /// let data = [1.0, 2.0, 3.0, 4.0, 5.0];
    /// let p = DescriptiveStats::new(&data).percentiles(&[25.0, 50.0, 75.0]).unwrap();
    /// assert_eq!(p, vec![2.0, 3.0, 4.0]);
    /// ```
    pub fn percentiles(&self, percentiles: &[f64]) -> Result<Vec<f64>, String> {
        if self.data.is_empty() {
            return Err("Cannot compute percentiles of empty column".to_string());
        }
        for &p in percentiles {
            if !(0.0..=100.0).contains(&p) {
                return Err(format!("Percentile must be in [0, 100], got {p}"));
            }
        }

        let mut sorted = self.data.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let results = percentiles
            .iter()
            .map(|&p| {
                // R-7: h = (n - 1) * q, 0-indexed
                let h = (n - 1) as f64 * (p / 100.0);
                let lo = h.floor() as usize;
                let hi = h.ceil() as usize;
                if lo == hi {
                    sorted[lo]
                } else {
                    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
                }
            })
            .collect();
        Ok(results)
    }
}

/// Copy out the finite values of a column.
#[must_use]
pub fn finite_values(column: &[f64]) -> Vec<f64> {
    column.iter().copied().filter(|v| v.is_finite()).collect()
}
