use std::fmt::Display;

use lensamp_core::{RunRecord, TrialSummary};

/// Ordered `Key: value` report, one entry per line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsReport {
    entries: Vec<(String, String)>,
}

impl StatsReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The corpus counts every report carries.
    pub fn from_summary(summary: &TrialSummary) -> Self {
        Self::new()
            .with("Total Samples", summary.total_samples)
            .with("Total Number of Images", summary.total_images)
            .with("Total Number of Image Pairs", summary.total_pairs)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.entries.push((key.into(), value.to_string()));
        self
    }

    pub fn with_run(self, run: &RunRecord) -> Self {
        self.with("Run ID", &run.id)
            .with("Started", run.started_at.format("%Y-%m-%d %H:%M:%S UTC"))
            .with("Seed", run.seed)
            .with("Total Trials", run.trials)
            .with("Percent Good", format!("{:.2}", run.success_percent()))
            .with("Malformed Outputs", run.malformed)
            .with("Execution Time (sec)", format!("{:.3}", run.elapsed_secs))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{k}: {v}\n"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RunRecord {
        serde_json::from_str(
            r#"{
                "id": "01J0000000000000000000TEST",
                "started_at": "2024-03-01T12:00:00Z",
                "seed": 2019,
                "trials": 80,
                "accepted": 20,
                "malformed": 1,
                "elapsed_secs": 12.5
            }"#,
        )
        .unwrap()
    }

    fn summary() -> TrialSummary {
        TrialSummary {
            total_samples: 20,
            total_images: 58,
            total_pairs: 61,
            min_delays: vec![],
            interference_cdf: vec![],
        }
    }

    #[test]
    fn test_summary_keys() {
        let report = StatsReport::from_summary(&summary());
        assert_eq!(
            report.render(),
            "Total Samples: 20\nTotal Number of Images: 58\nTotal Number of Image Pairs: 61\n"
        );
    }

    #[test]
    fn test_run_entries() {
        let report = StatsReport::from_summary(&summary())
            .with_run(&record())
            .with("Sampling Radius", 1.0);
        assert_eq!(report.get("Percent Good"), Some("25.00"));
        assert_eq!(report.get("Started"), Some("2024-03-01 12:00:00 UTC"));
        assert_eq!(report.get("Seed"), Some("2019"));
        assert_eq!(report.get("Sampling Radius"), Some("1"));
        assert!(report.render().ends_with("Sampling Radius: 1\n"));
    }
}
