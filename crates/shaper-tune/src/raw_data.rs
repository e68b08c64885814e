use crate::config::InputConfig;
use anyhow::{Context, Result};
use shaper_tune_core::{Matrix, matrix::MIN_SAMPLE_COLUMNS};
use std::{fs, path::Path};

/// Drops samples that arrive faster than a configured rate.
///
/// The time of the last kept sample is owned by the filter, so every capture
/// starts from a clean slate.
#[derive(Debug, Clone)]
pub struct SampleFilter {
    min_interval: Option<f64>,
    last_time: Option<f64>,
}

impl SampleFilter {
    pub fn new(max_sample_rate: f64) -> Self {
        Self {
            min_interval: (max_sample_rate > 0.0).then(|| 1.0 / max_sample_rate),
            last_time: None,
        }
    }

    /// Whether a sample taken at `time` should be kept.
    pub fn accept(&mut self, time: f64) -> bool {
        let too_soon = matches!(
            (self.min_interval, self.last_time),
            (Some(min_interval), Some(last_time)) if time - last_time < min_interval
        );
        if too_soon {
            return false;
        }
        self.last_time = Some(time);
        true
    }
}

/// Load a raw `time, accel_x, accel_y, accel_z[, ...]` capture from `path`.
pub fn load_raw_samples(path: &Path, input: &InputConfig) -> Result<Matrix> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read raw capture {}", path.display()))?;
    parse_raw_samples(&content, input)
        .with_context(|| format!("failed to parse raw capture {}", path.display()))
}

/// Parse comma-separated raw samples. Empty lines and `#` comments are
/// skipped, long captures are strided down to `max_rows` rows, and rows
/// arriving faster than `max_sample_rate` are dropped.
pub fn parse_raw_samples(content: &str, input: &InputConfig) -> Result<Matrix> {
    let lines: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .collect();

    let max_rows = input.max_rows.max(1);
    let step = if lines.len() > max_rows {
        lines.len() as f64 / max_rows as f64
    } else {
        1.0
    };
    tracing::debug!("{} data lines, keeping every {step:.3}", lines.len());

    let mut filter = SampleFilter::new(input.max_sample_rate);
    let mut matrix: Option<Matrix> = None;
    let mut next_line = 0.0;
    for (idx, &(line_no, line)) in lines.iter().enumerate() {
        if (idx as f64) < next_line {
            continue;
        }
        next_line += step;

        let row = parse_row(line).with_context(|| format!("line {line_no}"))?;
        if !filter.accept(row[0]) {
            continue;
        }
        let matrix = matrix
            .get_or_insert_with(|| Matrix::with_capacity(lines.len().min(max_rows), row.len()));
        matrix
            .push_row(&row)
            .with_context(|| format!("line {line_no}"))?;
    }

    let matrix = matrix.unwrap_or_default();
    tracing::info!("Loaded {} samples", matrix.rows());
    Ok(matrix)
}

fn parse_row(line: &str) -> Result<Vec<f64>> {
    let row = line
        .split(',')
        .map(|field| {
            let field = field.trim();
            field
                .parse::<f64>()
                .with_context(|| format!("invalid number '{field}'"))
        })
        .collect::<Result<Vec<f64>>>()?;
    if row.len() < MIN_SAMPLE_COLUMNS {
        anyhow::bail!(
            "expected at least {MIN_SAMPLE_COLUMNS} values (time, x, y, z), got {}",
            row.len()
        );
    }
    Ok(row)
}
