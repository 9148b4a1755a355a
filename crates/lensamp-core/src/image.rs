use serde::{Deserialize, Serialize};

use crate::error::{LensError, LensResult};

/// Number of numeric columns in every row of the solver's point output.
pub const TABLE_COLUMNS: usize = 4;

/// A raw output row: `[x, y, magnification, time_delay]` for images, or the
/// header with the image count in column 0.
pub type TableRow = [f64; TABLE_COLUMNS];

// ---------------------------------------------------------------------------
// ImageRecord
// ---------------------------------------------------------------------------

/// One lensed image of the source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub x: f64,
    pub y: f64,
    /// Signed magnification; negative for saddle-point images.
    pub magnification: f64,
    /// Days, relative to the first-arriving image.
    pub time_delay: f64,
}

impl ImageRecord {
    pub fn new(x: f64, y: f64, magnification: f64, time_delay: f64) -> Self {
        Self {
            x,
            y,
            magnification,
            time_delay,
        }
    }

    pub fn from_row(row: &TableRow) -> Self {
        Self::new(row[0], row[1], row[2], row[3])
    }

    pub fn to_row(&self) -> TableRow {
        [self.x, self.y, self.magnification, self.time_delay]
    }
}

// ---------------------------------------------------------------------------
// SolverTable
// ---------------------------------------------------------------------------

/// Whitespace-delimited numeric table written by the solver.
///
/// Row 0 is the header whose first column declares the image count; the
/// following rows hold one image each.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverTable {
    rows: Vec<TableRow>,
}

impl SolverTable {
    /// `inf` and `NaN` tokens are malformed output, like any other value
    /// that cannot be persisted as a JSON number.
    pub fn parse(text: &str) -> LensResult<Self> {
        let mut rows = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let values = line
                .split_whitespace()
                .map(|tok| match tok.parse::<f64>() {
                    Ok(v) if v.is_finite() => Ok(v),
                    Ok(_) => Err(LensError::MalformedOutput(format!(
                        "line {}: non-finite value {tok:?}",
                        lineno + 1
                    ))),
                    Err(_) => Err(LensError::MalformedOutput(format!(
                        "line {}: non-numeric value {tok:?}",
                        lineno + 1
                    ))),
                })
                .collect::<LensResult<Vec<f64>>>()?;
            let row: TableRow = values.as_slice().try_into().map_err(|_| {
                LensError::MalformedOutput(format!(
                    "line {}: expected {TABLE_COLUMNS} columns, found {}",
                    lineno + 1,
                    values.len()
                ))
            })?;
            rows.push(row);
        }

        let Some(header) = rows.first() else {
            return Err(LensError::MalformedOutput("empty output table".into()));
        };
        let declared = header[0];
        if !declared.is_finite() || declared < 0.0 || declared.fract() != 0.0 {
            return Err(LensError::MalformedOutput(format!(
                "invalid image count {declared} in header"
            )));
        }
        let declared = declared as usize;
        if declared != rows.len() - 1 {
            return Err(LensError::MalformedOutput(format!(
                "header declares {declared} images but table has {} image rows",
                rows.len() - 1
            )));
        }

        Ok(Self { rows })
    }

    /// Image count declared in the header row.
    pub fn image_count(&self) -> usize {
        self.rows.len() - 1
    }

    pub fn is_multiply_imaged(&self) -> bool {
        self.image_count() > 1
    }

    pub fn into_sample(self) -> SampleResult {
        SampleResult::from_rows(&self.rows)
    }
}

// ---------------------------------------------------------------------------
// SampleResult
// ---------------------------------------------------------------------------

/// Images produced by one accepted trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleResult {
    /// Raw header row as written by the solver, kept for persistence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<TableRow>,
    pub images: Vec<ImageRecord>,
}

impl SampleResult {
    pub fn new(images: Vec<ImageRecord>) -> Self {
        Self {
            header: None,
            images,
        }
    }

    /// Build from persisted rows, header first. An empty slice gives an
    /// empty sample.
    pub fn from_rows(rows: &[TableRow]) -> Self {
        match rows.split_first() {
            Some((header, images)) => Self {
                header: Some(*header),
                images: images.iter().map(ImageRecord::from_row).collect(),
            },
            None => Self::new(Vec::new()),
        }
    }

    /// Rows in solver layout, header first. A sample without a stored header
    /// gets `[count, 0, 0, 0]`.
    pub fn to_rows(&self) -> Vec<TableRow> {
        let header = self
            .header
            .unwrap_or([self.images.len() as f64, 0.0, 0.0, 0.0]);
        std::iter::once(header)
            .chain(self.images.iter().map(ImageRecord::to_row))
            .collect()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn is_multiply_imaged(&self) -> bool {
        self.images.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
4 3.0 0.0 0.0
 0.61 0.52 -3.2 0.0
-0.48 0.67 4.1 1.7
 0.55 -0.49 2.8 3.9
-0.70 -0.58 -1.1 12.4
";

    #[test]
    fn test_parse_quad() {
        let table = SolverTable::parse(QUAD).unwrap();
        assert_eq!(table.image_count(), 4);
        assert!(table.is_multiply_imaged());

        let sample = table.into_sample();
        assert_eq!(sample.header, Some([4.0, 3.0, 0.0, 0.0]));
        assert_eq!(sample.images[1], ImageRecord::new(-0.48, 0.67, 4.1, 1.7));
        assert_eq!(sample.images[3].time_delay, 12.4);
    }

    #[test]
    fn test_parse_header_only() {
        let table = SolverTable::parse("0 3.0 0.0 0.0\n").unwrap();
        assert_eq!(table.image_count(), 0);
        assert!(!table.is_multiply_imaged());
    }

    #[test]
    fn test_parse_single_image() {
        let table = SolverTable::parse("1 3.0 0.0 0.0\n0.1 0.2 1.3 0.0\n").unwrap();
        assert!(!table.is_multiply_imaged());
    }

    #[test]
    fn test_parse_empty_is_malformed() {
        let err = SolverTable::parse("\n  \n").unwrap_err();
        assert!(matches!(err, LensError::MalformedOutput(_)));
    }

    #[test]
    fn test_parse_wrong_columns() {
        let err = SolverTable::parse("2 3.0 0.0 0.0\n0.1 0.2 1.3\n0.1 0.2 1.3 4.0\n").unwrap_err();
        assert!(err.to_string().contains("expected 4 columns"));
    }

    #[test]
    fn test_parse_non_numeric() {
        let err = SolverTable::parse("1 3.0 0.0 0.0\n0.1 nope 1.3 0.0\n").unwrap_err();
        assert!(err.to_string().contains("non-numeric"));
    }

    #[test]
    fn test_parse_rejects_non_finite() {
        for text in [
            "2 3 0 0\n0.1 0.2 inf 0.0\n-0.1 0.0 1.5 4.5\n",
            "2 3 0 0\n0.1 0.2 -1.5 0.0\n-0.1 0.0 NaN 4.5\n",
            "inf 3 0 0\n",
        ] {
            let err = SolverTable::parse(text).unwrap_err();
            assert!(matches!(err, LensError::MalformedOutput(_)), "{text:?}");
            assert!(err.to_string().contains("non-finite"));
        }
    }

    #[test]
    fn test_parse_count_mismatch() {
        let err = SolverTable::parse("3 3.0 0.0 0.0\n0.1 0.2 1.3 0.0\n").unwrap_err();
        assert!(err.to_string().contains("declares 3 images"));
    }

    #[test]
    fn test_rows_keep_header() {
        let sample = SolverTable::parse(QUAD).unwrap().into_sample();
        let rows = sample.to_rows();
        assert_eq!(rows.len(), 5);
        assert_eq!(SampleResult::from_rows(&rows), sample);
    }

    #[test]
    fn test_rows_synthesize_header() {
        let sample = SampleResult::new(vec![
            ImageRecord::new(0.0, 0.0, 1.0, 0.0),
            ImageRecord::new(0.0, 0.0, -1.0, 2.0),
        ]);
        assert_eq!(sample.to_rows()[0], [2.0, 0.0, 0.0, 0.0]);
    }
}
