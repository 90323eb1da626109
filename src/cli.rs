//! Command-line interface definitions and argument parsing

use crate::config::DEFAULT_CONFIG_PATH;
use crate::server::AppState;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;

/// Form front-ends for pre-trained clustering, classification and regression models
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Serve the HTML forms and JSON endpoints (default)
    Serve,

    /// Run a single prediction offline and print the result
    Predict {
        /// Deployment name
        #[arg(short, long)]
        app: String,

        /// Field value as NAME=VALUE; repeat for each field
        /// Example: --field BALANCE=1500 --field TENURE=12
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
}

impl Args {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}

/// Turn `--field` pairs into the same map a form submission produces
pub fn fields_to_form(fields: &[(String, String)]) -> HashMap<String, String> {
    fields.iter().cloned().collect()
}

/// Run one prediction and format what the form page would show, as text
pub fn predict_once(
    state: &AppState,
    app: &str,
    fields: &[(String, String)],
) -> crate::Result<String> {
    let form = fields_to_form(fields);
    let (deployment, prediction) = state.predict(app, &form)?;
    let report = deployment.report(&prediction)?;

    let mut lines = vec![report.message.clone()];
    if let Some(rows) = report.subset_rows {
        lines.push(format!(
            "{} reference rows in cluster {}",
            rows,
            prediction.cluster_id()
        ));
        for histogram in &report.histograms {
            lines.push(format!("  {}: {} bins", histogram.column, histogram.bins.len()));
        }
    }
    Ok(lines.join("\n"))
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in '{}'", s));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_field("TENURE=12").unwrap(),
            ("TENURE".to_string(), "12".to_string())
        );
        assert_eq!(
            parse_field("Item_Weight = 9.3").unwrap(),
            ("Item_Weight".to_string(), "9.3".to_string())
        );
        assert_eq!(parse_field("gross=").unwrap().1, "");
        assert!(parse_field("TENURE").is_err());
        assert!(parse_field("=12").is_err());
    }

    #[test]
    fn test_default_command_is_serve() {
        let args = Args::parse_from(["predict-forms"]);
        assert_eq!(args.command(), Command::Serve);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_predict_command() {
        let args = Args::parse_from([
            "predict-forms",
            "--config",
            "other.toml",
            "predict",
            "--app",
            "segmentation",
            "--field",
            "TENURE=6",
            "-f",
            "BALANCE=100",
        ]);
        match args.command() {
            Command::Predict { app, fields } => {
                assert_eq!(app, "segmentation");
                let form = fields_to_form(&fields);
                assert_eq!(form["TENURE"], "6");
                assert_eq!(form["BALANCE"], "100");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
