//! Pairwise and per-system statistics over accepted samples.
//!
//! Pure functions: inputs are borrowed and never modified, every result is a
//! fresh value.

use serde::{Deserialize, Serialize};

use crate::image::{ImageRecord, SampleResult};

/// Day thresholds of the interference CDF.
pub const CDF_DAYS: std::ops::RangeInclusive<u32> = 1..=30;

/// Statistics of one image pair within a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairStat {
    /// `|t_i - t_j|`, days.
    pub pair_delay: f64,
    /// `|mag_leading| / |mag_trailing|`; the leading image arrives first.
    pub mag_ratio: f64,
}

impl PairStat {
    /// `a` must precede `b` in record order. When both delays are equal the
    /// earlier record leads.
    pub fn between(a: &ImageRecord, b: &ImageRecord) -> Self {
        let (leading, trailing) = if b.time_delay < a.time_delay {
            (b, a)
        } else {
            (a, b)
        };
        Self {
            pair_delay: (a.time_delay - b.time_delay).abs(),
            mag_ratio: leading.magnification.abs() / trailing.magnification.abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleStat {
    pub image_count: usize,
    /// Sum of absolute magnifications.
    pub total_magnification: f64,
    /// `None` when the sample has fewer than two images.
    pub min_pair_delay: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageStat {
    pub time_delay: f64,
    pub magnification: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CdfPoint {
    pub days: u32,
    /// Fraction of samples whose minimum pair delay is strictly below `days`.
    pub fraction_below: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSummary {
    pub total_samples: usize,
    pub total_images: usize,
    pub total_pairs: usize,
    /// Minimum pair delay of every sample that has one, in sample order.
    pub min_delays: Vec<f64>,
    pub interference_cdf: Vec<CdfPoint>,
}

/// Everything derived from one corpus of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub pairs: Vec<PairStat>,
    pub samples: Vec<SampleStat>,
    pub images: Vec<ImageStat>,
    pub summary: TrialSummary,
}

/// Pairs of one sample in `(i, j)`, `i < j` order.
pub fn sample_pairs(sample: &SampleResult) -> Vec<PairStat> {
    let images = &sample.images;
    let mut pairs = Vec::with_capacity(images.len() * images.len().saturating_sub(1) / 2);
    for (i, a) in images.iter().enumerate() {
        for b in &images[i + 1..] {
            pairs.push(PairStat::between(a, b));
        }
    }
    pairs
}

pub fn aggregate(samples: &[SampleResult]) -> Aggregate {
    let mut pairs = Vec::new();
    let mut sample_stats = Vec::with_capacity(samples.len());
    let mut images = Vec::new();

    for sample in samples {
        let own = sample_pairs(sample);
        let min_pair_delay = own.iter().map(|p| p.pair_delay).reduce(f64::min);
        sample_stats.push(SampleStat {
            image_count: sample.image_count(),
            total_magnification: sample.images.iter().map(|i| i.magnification.abs()).sum(),
            min_pair_delay,
        });
        images.extend(sample.images.iter().map(|i| ImageStat {
            time_delay: i.time_delay,
            magnification: i.magnification,
        }));
        pairs.extend(own);
    }

    let min_delays: Vec<f64> = sample_stats.iter().filter_map(|s| s.min_pair_delay).collect();
    let summary = TrialSummary {
        total_samples: samples.len(),
        total_images: sample_stats.iter().map(|s| s.image_count).sum(),
        total_pairs: pairs.len(),
        interference_cdf: interference_cdf(&min_delays),
        min_delays,
    };

    Aggregate {
        pairs,
        samples: sample_stats,
        images,
        summary,
    }
}

/// For each day threshold in [`CDF_DAYS`], the fraction of `min_delays`
/// strictly below it. All zeros for an empty input.
pub fn interference_cdf(min_delays: &[f64]) -> Vec<CdfPoint> {
    let mut sorted = min_delays.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();

    CDF_DAYS
        .map(|days| {
            let below = sorted.partition_point(|&d| d < f64::from(days));
            CdfPoint {
                days,
                fraction_below: if n == 0 { 0.0 } else { below as f64 / n as f64 },
            }
        })
        .collect()
}
