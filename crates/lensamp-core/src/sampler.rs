//! Velocity-dispersion sampling from a binned local distribution function.
//!
//! The density is evaluated at each bin's left edge and treated as constant
//! across the bin, so draws follow a piecewise-uniform approximation of the
//! distribution function rather than the function itself. Any statistical
//! check against the continuous density only holds at bin resolution.

use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::function::gamma::gamma;

use crate::error::{LensError, LensResult};

/// Local velocity dispersion function of early-type galaxies,
///
/// `phi(s) = phi* (s/s*)^alpha exp(-(s/s*)^beta) beta / Gamma(alpha/beta) / s`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispersionFunction {
    /// Normalization, (h/0.7)^3 Mpc^-3.
    pub phi_star: f64,
    /// Characteristic dispersion, km/s.
    pub sigma_star: f64,
    pub alpha: f64,
    pub beta: f64,
}

impl Default for DispersionFunction {
    fn default() -> Self {
        Self {
            phi_star: 2.099e-2,
            sigma_star: 113.78,
            alpha: 0.94,
            beta: 1.85,
        }
    }
}

impl DispersionFunction {
    pub fn density(&self, sigma: f64) -> f64 {
        let x = sigma / self.sigma_star;
        self.phi_star * x.powf(self.alpha) * (-x.powf(self.beta)).exp() * self.beta
            / gamma(self.alpha / self.beta)
            / sigma
    }
}

/// One bin of the cumulative table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispersionBin {
    pub lower: f64,
    pub cumulative: f64,
}

/// Cumulative frequency table over equal-width dispersion bins.
///
/// Built once per run and read-only afterwards. Cumulative values are
/// non-decreasing and the last one is exactly `1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct DispersionBinTable {
    bins: Vec<DispersionBin>,
    width: f64,
}

impl DispersionBinTable {
    pub fn build(
        sigma_min: f64,
        sigma_max: f64,
        num_bins: usize,
        function: &DispersionFunction,
    ) -> LensResult<Self> {
        if num_bins == 0 {
            return Err(LensError::Config("dispersion bin count must be at least 1".into()));
        }
        if !sigma_min.is_finite() || !sigma_max.is_finite() || sigma_min <= 0.0 {
            return Err(LensError::Config(format!(
                "invalid dispersion range [{sigma_min}, {sigma_max}]"
            )));
        }
        if sigma_max <= sigma_min {
            return Err(LensError::Config(format!(
                "sigma_max ({sigma_max}) must exceed sigma_min ({sigma_min})"
            )));
        }

        let width = (sigma_max - sigma_min) / num_bins as f64;
        let lowers: Vec<f64> = (0..num_bins)
            .map(|i| sigma_min + i as f64 * width)
            .collect();
        let densities: Vec<f64> = lowers.iter().map(|&s| function.density(s)).collect();

        if densities.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(LensError::Config(
                "dispersion function produced a non-finite or negative density".into(),
            ));
        }
        let total: f64 = densities.iter().sum();
        if total <= 0.0 {
            return Err(LensError::Config(
                "dispersion function is zero over the whole range".into(),
            ));
        }

        let mut running = 0.0;
        let mut bins: Vec<DispersionBin> = lowers
            .iter()
            .zip(&densities)
            .map(|(&lower, &density)| {
                running += density / total;
                DispersionBin {
                    lower,
                    cumulative: running.min(1.0),
                }
            })
            .collect();
        if let Some(last) = bins.last_mut() {
            last.cumulative = 1.0;
        }

        Ok(Self { bins, width })
    }

    pub fn bins(&self) -> &[DispersionBin] {
        &self.bins
    }

    pub fn bin_width(&self) -> f64 {
        self.width
    }

    /// Index of the first bin whose cumulative value reaches `u`, or the
    /// last bin when rounding leaves `u` above every entry.
    pub fn bin_for(&self, u: f64) -> usize {
        self.bins
            .iter()
            .position(|b| b.cumulative >= u)
            .unwrap_or(self.bins.len() - 1)
    }

    /// Map a bin-selection uniform `u` and an in-bin uniform `v`, both in
    /// `[0, 1)`, to a dispersion.
    pub fn value_at(&self, u: f64, v: f64) -> f64 {
        let bin = &self.bins[self.bin_for(u)];
        bin.lower + v * self.width
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.gen();
        let v: f64 = rng.gen();
        self.value_at(u, v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn default_table() -> DispersionBinTable {
        DispersionBinTable::build(75.0, 375.0, 15, &DispersionFunction::default()).unwrap()
    }

    #[test]
    fn test_density_positive_and_decreasing_at_high_sigma() {
        let f = DispersionFunction::default();
        assert!(f.density(100.0) > 0.0);
        assert!(f.density(200.0) > f.density(300.0));
        assert!(f.density(300.0) > f.density(375.0));
    }

    #[test]
    fn test_cumulative_monotone_and_normalized() {
        for n in 1..=64 {
            let table =
                DispersionBinTable::build(75.0, 375.0, n, &DispersionFunction::default()).unwrap();
            assert_eq!(table.bins().len(), n);
            for pair in table.bins().windows(2) {
                assert!(pair[1].cumulative >= pair[0].cumulative, "n={n}");
            }
            assert_eq!(table.bins().last().unwrap().cumulative, 1.0);
        }
    }

    #[test]
    fn test_bin_edges() {
        let table = default_table();
        assert_eq!(table.bin_width(), 20.0);
        assert_eq!(table.bins()[0].lower, 75.0);
        assert_eq!(table.bins()[14].lower, 355.0);
    }

    #[test]
    fn test_rejects_bad_input() {
        let f = DispersionFunction::default();
        assert!(matches!(
            DispersionBinTable::build(75.0, 375.0, 0, &f),
            Err(LensError::Config(_))
        ));
        assert!(DispersionBinTable::build(375.0, 75.0, 15, &f).is_err());
        assert!(DispersionBinTable::build(0.0, 75.0, 15, &f).is_err());
        assert!(DispersionBinTable::build(75.0, f64::NAN, 15, &f).is_err());
    }

    #[test]
    fn test_bin_lookup() {
        let table = default_table();
        assert_eq!(table.bin_for(0.0), 0);
        assert_eq!(table.bin_for(1.0), 14);
        // Above every entry falls back to the last bin
        assert_eq!(table.bin_for(1.5), 14);

        let first = table.bins()[0].cumulative;
        assert_eq!(table.bin_for(first), 0);
        assert_eq!(table.bin_for(first + 1e-12), 1);
    }

    #[test]
    fn test_value_within_selected_bin() {
        let table = default_table();
        let v = table.value_at(0.999_999, 0.5);
        assert!((v - 365.0).abs() < 1e-9);
        assert_eq!(table.value_at(0.0, 0.0), 75.0);
    }

    #[test]
    fn test_samples_in_range() {
        let table = default_table();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..10_000 {
            let s = table.sample(&mut rng);
            assert!((75.0..375.0).contains(&s));
        }
    }

    #[test]
    fn test_fixed_seed_reproducible() {
        let table = default_table();
        let mut a = ChaCha8Rng::seed_from_u64(2019);
        let mut b = ChaCha8Rng::seed_from_u64(2019);
        let xs: Vec<f64> = (0..100).map(|_| table.sample(&mut a)).collect();
        let ys: Vec<f64> = (0..100).map(|_| table.sample(&mut b)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_bin_frequencies_match_table() {
        let table = default_table();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let n = 200_000;
        let mut counts = vec![0usize; 15];
        for _ in 0..n {
            let s = table.sample(&mut rng);
            let idx = (((s - 75.0) / table.bin_width()) as usize).min(14);
            counts[idx] += 1;
        }
        let mut prev = 0.0;
        for (i, bin) in table.bins().iter().enumerate() {
            let expected = bin.cumulative - prev;
            prev = bin.cumulative;
            let observed = counts[i] as f64 / n as f64;
            assert!(
                (observed - expected).abs() < 0.01,
                "bin {i}: observed {observed}, expected {expected}"
            );
        }
    }
}
