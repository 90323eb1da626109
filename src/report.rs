//! Result presentation: labeled messages and per-cluster histograms

use crate::dataset::{ClusterSubset, ReferenceDataset};
use crate::error::{PredictError, Result};
use crate::types::prediction::{Prediction, PredictionKind};
use plotters::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

const MAX_BINS: usize = 100;
const CHART_SIZE: (u32, u32) = (640, 160);
const CHART_MARGIN: i32 = 8;

/// One histogram bin; the last bin of a histogram is closed on the right
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Frequency distribution of one column within a cluster
#[derive(Debug, Clone, Serialize)]
pub struct Histogram {
    pub column: String,
    pub title: String,
    pub bins: Vec<Bin>,
    /// Inline SVG; absent when rendering failed
    #[serde(skip)]
    pub svg: Option<String>,
}

/// Everything shown for one prediction
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub kind: PredictionKind,
    pub value: f64,
    pub message: String,
    /// Size of the matching reference subset (cluster deployments only)
    pub subset_rows: Option<usize>,
    pub histograms: Vec<Histogram>,
}

/// Formats model output for a deployment
#[derive(Debug, Clone)]
pub struct Presenter {
    kind: PredictionKind,
    label: String,
    categories: HashMap<String, String>,
}

impl Presenter {
    pub fn new(
        kind: PredictionKind,
        label: Option<String>,
        categories: HashMap<String, String>,
    ) -> Self {
        let label = label.unwrap_or_else(|| default_label(kind).to_string());
        Self {
            kind,
            label,
            categories,
        }
    }

    pub fn kind(&self) -> PredictionKind {
        self.kind
    }

    /// Human-readable form of the raw value
    pub fn display_value(&self, value: f64) -> String {
        let plain = format_number(value);
        match self.kind {
            PredictionKind::Category => self.categories.get(&plain).cloned().unwrap_or(plain),
            PredictionKind::Cluster => (value.round() as i64).to_string(),
            PredictionKind::Regression => plain,
        }
    }

    pub fn message(&self, value: f64) -> String {
        format!("{}: {}", self.label, self.display_value(value))
    }

    /// Build the report; cluster deployments also get one histogram per
    /// reference column restricted to the predicted cluster
    pub fn present(
        &self,
        prediction: &Prediction,
        dataset: Option<&ReferenceDataset>,
    ) -> Result<Report> {
        let mut report = Report {
            kind: self.kind,
            value: prediction.value,
            message: self.message(prediction.value),
            subset_rows: None,
            histograms: Vec::new(),
        };

        if let (PredictionKind::Cluster, Some(dataset)) = (self.kind, dataset) {
            let subset = dataset.cluster_subset(prediction.cluster_id())?;
            report.subset_rows = Some(subset.rows);
            report.histograms = cluster_histograms(&subset);
        }

        Ok(report)
    }
}

fn default_label(kind: PredictionKind) -> &'static str {
    match kind {
        PredictionKind::Cluster => "Data Belongs to Cluster",
        PredictionKind::Category => "Predicted Category",
        PredictionKind::Regression => "Prediction",
    }
}

/// Integral values print without a fractional part
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Histograms for every non-empty column of the subset
pub fn cluster_histograms(subset: &ClusterSubset) -> Vec<Histogram> {
    subset
        .columns
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(column, values)| {
            let bins = histogram(values);
            let title = format!("Histogram for {} in Cluster {}", column, subset.cluster);
            let svg = match render_svg(&bins, CHART_SIZE) {
                Ok(svg) => Some(svg),
                Err(e) => {
                    warn!(column = %column, error = %e, "Histogram rendering failed");
                    None
                }
            };
            Histogram {
                column: column.clone(),
                title,
                bins,
                svg,
            }
        })
        .collect()
}

/// Bin values with numpy's `auto` rule
pub fn histogram(values: &[f64]) -> Vec<Bin> {
    if values.is_empty() {
        return Vec::new();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if range == 0.0 {
        return vec![Bin {
            lower: min - 0.5,
            upper: min + 0.5,
            count: values.len(),
        }];
    }

    let n_bins = auto_bin_count(values, range);
    let width = range / n_bins as f64;

    let mut bins: Vec<Bin> = (0..n_bins)
        .map(|i| Bin {
            lower: min + i as f64 * width,
            upper: if i + 1 == n_bins {
                max
            } else {
                min + (i + 1) as f64 * width
            },
            count: 0,
        })
        .collect();

    for &v in values {
        let idx = (((v - min) / width).floor() as usize).min(n_bins - 1);
        bins[idx].count += 1;
    }

    bins
}

/// max(Sturges, Freedman-Diaconis) bin count; Sturges alone when IQR is zero
fn auto_bin_count(values: &[f64], range: f64) -> usize {
    let n = values.len() as f64;
    let sturges_width = range / (n.log2() + 1.0);

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let iqr = percentile(&sorted, 75.0) - percentile(&sorted, 25.0);
    let fd_width = 2.0 * iqr * n.powf(-1.0 / 3.0);

    let width = if fd_width > 0.0 {
        fd_width.min(sturges_width)
    } else {
        sturges_width
    };

    ((range / width).ceil() as usize).clamp(1, MAX_BINS)
}

/// Linear-interpolated percentile of sorted data
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q / 100.0;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Draw bars as an inline SVG document
pub fn render_svg(bins: &[Bin], size: (u32, u32)) -> Result<String> {
    let render_err = |e: String| PredictError::Render(e);
    let mut svg = String::new();

    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&WHITE).map_err(|e| render_err(e.to_string()))?;

        let (w, h) = (size.0 as i32, size.1 as i32);
        let baseline = h - CHART_MARGIN;
        let plot_height = (h - 2 * CHART_MARGIN) as f64;
        let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0).max(1) as f64;
        let bar_width = ((w - 2 * CHART_MARGIN) / bins.len().max(1) as i32).max(1);

        for (i, bin) in bins.iter().enumerate() {
            let x0 = CHART_MARGIN + i as i32 * bar_width;
            let x1 = x0 + (bar_width - 1).max(1);
            let top = baseline - (bin.count as f64 / max_count * plot_height).round() as i32;
            root.draw(&Rectangle::new(
                [(x0, top), (x1, baseline)],
                BLUE.mix(0.6).filled(),
            ))
            .map_err(|e| render_err(e.to_string()))?;
        }

        root.draw(&PathElement::new(
            vec![(CHART_MARGIN, baseline), (w - CHART_MARGIN, baseline)],
            BLACK,
        ))
        .map_err(|e| render_err(e.to_string()))?;

        root.present().map_err(|e| render_err(e.to_string()))?;
    }

    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_auto_bins() {
        let values = [1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 4.0, 4.0, 4.0, 4.0];
        let bins = histogram(&values);

        assert_eq!(bins.len(), 5);
        let counts: Vec<usize> = bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 2, 0, 3, 4]);
        assert_eq!(bins[0].lower, 1.0);
        assert_eq!(bins[4].upper, 4.0);
    }

    #[test]
    fn test_histogram_constant_column() {
        let bins = histogram(&[12.0, 12.0, 12.0]);
        assert_eq!(
            bins,
            vec![Bin {
                lower: 11.5,
                upper: 12.5,
                count: 3
            }]
        );
        assert!(histogram(&[]).is_empty());
    }

    #[test]
    fn test_histogram_counts_every_value() {
        let values: Vec<f64> = (0..1000).map(|i| ((i * 37) % 101) as f64 * 0.5).collect();
        let bins = histogram(&values);
        assert!(bins.len() <= MAX_BINS);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), values.len());
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 4.0, 4.0, 4.0, 4.0];
        assert_eq!(percentile(&sorted, 25.0), 2.25);
        assert_eq!(percentile(&sorted, 75.0), 4.0);
        assert_eq!(percentile(&sorted, 0.0), 1.0);
    }

    #[test]
    fn test_messages() {
        let cluster = Presenter::new(PredictionKind::Cluster, None, HashMap::new());
        assert_eq!(cluster.message(3.0), "Data Belongs to Cluster: 3");

        let mut categories = HashMap::new();
        categories.insert("2".to_string(), "Hit".to_string());
        let category = Presenter::new(
            PredictionKind::Category,
            Some("Predicted Success Category".to_string()),
            categories,
        );
        assert_eq!(category.message(2.0), "Predicted Success Category: Hit");
        assert_eq!(category.message(1.0), "Predicted Success Category: 1");

        let regression = Presenter::new(PredictionKind::Regression, None, HashMap::new());
        assert_eq!(regression.message(2101.5), "Prediction: 2101.5");
        assert_eq!(regression.message(-4.0), "Prediction: -4");
    }

    #[test]
    fn test_cluster_histograms_skip_empty_columns() {
        let subset = ClusterSubset {
            cluster: 2,
            rows: 2,
            columns: vec![
                ("BALANCE".to_string(), vec![10.0, 20.0]),
                ("MINIMUM_PAYMENTS".to_string(), vec![]),
            ],
        };
        let histograms = cluster_histograms(&subset);
        assert_eq!(histograms.len(), 1);
        assert_eq!(histograms[0].title, "Histogram for BALANCE in Cluster 2");
        assert_eq!(histograms[0].bins.iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[test]
    fn test_present_without_dataset() {
        let presenter = Presenter::new(PredictionKind::Cluster, None, HashMap::new());
        let prediction = Prediction::new("segmentation", 1.0);
        let report = presenter.present(&prediction, None).unwrap();
        assert_eq!(report.message, "Data Belongs to Cluster: 1");
        assert!(report.subset_rows.is_none());
        assert!(report.histograms.is_empty());
    }
}
