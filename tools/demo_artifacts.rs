//! Demo Artifact Generator
//!
//! Writes synthetic model, scaler and reference-dataset files for every
//! deployment in a configuration so the sample config can be served without
//! the original trained models. Each artifact is sized from the deployment's
//! field list.

use anyhow::{Context, Result};
use clap::Parser;
use polars::prelude::*;
use predict_forms::config::{AppConfig, DeploymentConfig, DEFAULT_CONFIG_PATH};
use predict_forms::models::native::{
    Forest, ForestTask, ModelArtifact, NativeModel, ScalerArtifact, Tree,
};
use predict_forms::models::Model;
use predict_forms::types::{FieldKind, FieldSpec, PredictionKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "Generate demo artifacts for a predict-forms configuration")]
struct Args {
    /// Configuration whose deployments need artifacts
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Rows in each generated reference dataset
    #[arg(long, default_value = "600")]
    rows: usize,

    /// Number of clusters for cluster deployments
    #[arg(short = 'k', long, default_value = "4")]
    clusters: usize,

    /// Trees in each generated forest
    #[arg(long, default_value = "25")]
    trees: usize,

    /// RNG seed; the same seed gives the same files
    #[arg(long, default_value = "42")]
    seed: u64,
}

/// Synthetic parameter generator
struct ArtifactGenerator {
    rng: StdRng,
}

impl ArtifactGenerator {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Typical magnitude of a field, taken from its default and bounds
    fn spread(field: &FieldSpec) -> f64 {
        match (field.min, field.max) {
            (Some(min), Some(max)) if max > min => (max - min) / 2.0,
            _ => (field.default.abs() * 0.5).max(1.0),
        }
    }

    /// A plausible value for the field around its default
    fn sample(&mut self, field: &FieldSpec, center: f64) -> f64 {
        let spread = Self::spread(field);
        let value = field.clamp(center + self.rng.gen_range(-spread..spread) * 0.5);
        match field.kind {
            FieldKind::Integer => field.clamp(value.round()),
            FieldKind::Float => value,
        }
    }

    fn kmeans(&mut self, fields: &[FieldSpec], k: usize) -> ModelArtifact {
        let centroids = (0..k.max(1))
            .map(|_| {
                fields
                    .iter()
                    .map(|f| {
                        let spread = Self::spread(f);
                        f.clamp(f.default + self.rng.gen_range(-spread..spread))
                    })
                    .collect()
            })
            .collect();
        ModelArtifact::Kmeans { centroids }
    }

    /// Rows scattered around the centroids, labeled by the model itself
    fn clustered_rows(
        &mut self,
        artifact: &ModelArtifact,
        fields: &[FieldSpec],
        rows: usize,
    ) -> Result<(Vec<Vec<f64>>, Vec<i64>)> {
        let ModelArtifact::Kmeans { centroids } = artifact else {
            anyhow::bail!("clustered rows need a kmeans model");
        };
        let model = NativeModel::try_from(artifact.clone()).map_err(anyhow::Error::msg)?;

        let mut data = Vec::with_capacity(rows);
        let mut labels = Vec::with_capacity(rows);
        for i in 0..rows {
            let centroid = &centroids[i % centroids.len()];
            let row: Vec<f64> = fields
                .iter()
                .zip(centroid)
                .map(|(f, &c)| self.sample(f, c))
                .collect();
            labels.push(model.predict(&row)?.round() as i64);
            data.push(row);
        }
        Ok((data, labels))
    }

    /// Complete binary tree of `depth` in preorder, so children follow parents
    fn tree(&mut self, fields: &[FieldSpec], depth: usize, n_classes: usize) -> Tree {
        let mut tree = Tree {
            children_left: Vec::new(),
            children_right: Vec::new(),
            feature: Vec::new(),
            threshold: Vec::new(),
            value: Vec::new(),
        };
        self.grow(&mut tree, fields, depth, n_classes);
        tree
    }

    fn grow(&mut self, tree: &mut Tree, fields: &[FieldSpec], depth: usize, width: usize) -> usize {
        let id = tree.children_left.len();
        tree.children_left.push(-1);
        tree.children_right.push(-1);

        if depth == 0 {
            tree.feature.push(-2);
            tree.threshold.push(-2.0);
            let weights: Vec<f64> = (0..width).map(|_| self.rng.gen_range(0.0..10.0)).collect();
            tree.value.push(weights);
            return id;
        }

        let feature = self.rng.gen_range(0..fields.len());
        let threshold = self.sample(&fields[feature], fields[feature].default);
        tree.feature.push(feature as i64);
        tree.threshold.push(threshold);
        tree.value.push(vec![0.0; width]);

        let left = self.grow(tree, fields, depth - 1, width);
        let right = self.grow(tree, fields, depth - 1, width);
        tree.children_left[id] = left as i64;
        tree.children_right[id] = right as i64;
        // Internal nodes carry the combined weight of their subtree
        let total: Vec<f64> = tree.value[left]
            .iter()
            .zip(&tree.value[right])
            .map(|(l, r)| l + r)
            .collect();
        tree.value[id] = total;
        id
    }

    fn forest(&mut self, fields: &[FieldSpec], classes: Vec<f64>, trees: usize) -> ModelArtifact {
        let width = classes.len();
        let trees = (0..trees.max(1)).map(|_| self.tree(fields, 3, width)).collect();
        ModelArtifact::Forest(Forest {
            task: ForestTask::Classification,
            n_features: fields.len(),
            classes: Some(classes),
            trees,
        })
    }

    fn linear(&mut self, n: usize) -> ModelArtifact {
        ModelArtifact::Linear {
            coefficients: (0..n).map(|_| self.rng.gen_range(-300.0..300.0)).collect(),
            intercept: self.rng.gen_range(1500.0..2500.0),
        }
    }

    fn standard_scaler(fields: &[FieldSpec]) -> ScalerArtifact {
        ScalerArtifact::Standard {
            mean: fields.iter().map(|f| f.default).collect(),
            scale: fields.iter().map(Self::spread).collect(),
        }
    }
}

fn write_json<T: Serialize>(path: &Path, artifact: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(artifact)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Artifact written");
    Ok(())
}

fn write_dataset(
    path: &Path,
    fields: &[FieldSpec],
    cluster_column: &str,
    rows: &[Vec<f64>],
    labels: Vec<i64>,
) -> Result<()> {
    let mut columns: Vec<Column> = fields
        .iter()
        .enumerate()
        .map(|(j, f)| {
            let values: Vec<f64> = rows.iter().map(|r| r[j]).collect();
            Series::new(f.name.as_str().into(), values).into()
        })
        .collect();
    columns.push(Series::new(cluster_column.into(), labels).into());
    let mut df = DataFrame::new(columns)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;

    info!(path = %path.display(), rows = df.height(), "Reference dataset written");
    Ok(())
}

fn category_classes(deployment: &DeploymentConfig) -> Vec<f64> {
    let mut classes: Vec<f64> = deployment
        .categories
        .keys()
        .filter_map(|k| k.parse().ok())
        .collect();
    if classes.is_empty() {
        classes = vec![0.0, 1.0, 2.0];
    }
    classes.sort_by(|a, b| a.total_cmp(b));
    classes
}

fn generate(generator: &mut ArtifactGenerator, deployment: &DeploymentConfig, args: &Args) -> Result<()> {
    let fields = deployment.fields.fields();

    match deployment.kind {
        PredictionKind::Cluster => {
            let model = generator.kmeans(fields, args.clusters);
            write_json(&deployment.model_path, &model)?;
            if let Some(dataset) = &deployment.dataset {
                let (rows, labels) = generator.clustered_rows(&model, fields, args.rows)?;
                write_dataset(&dataset.path, fields, &dataset.cluster_column, &rows, labels)?;
            }
        }
        PredictionKind::Category => {
            let model = generator.forest(fields, category_classes(deployment), args.trees);
            write_json(&deployment.model_path, &model)?;
        }
        PredictionKind::Regression => {
            write_json(&deployment.model_path, &generator.linear(fields.len()))?;
        }
    }

    if let Some(scaler_path) = &deployment.scaler_path {
        write_json(scaler_path, &ArtifactGenerator::standard_scaler(fields))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("demo_artifacts=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = AppConfig::load_from_path(&args.config)?;
    info!(
        config = %args.config,
        deployments = config.deployments.len(),
        seed = args.seed,
        "Generating demo artifacts"
    );

    let mut generator = ArtifactGenerator::new(args.seed);
    for deployment in &config.deployments {
        generate(&mut generator, deployment, &args)
            .with_context(|| format!("Deployment '{}'", deployment.name))?;
        info!(deployment = %deployment.name, kind = deployment.kind.as_str(), "Deployment artifacts ready");
    }

    info!("Done");
    Ok(())
}
