//! Server-rendered HTML for the form routes

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;

use super::state::Deployment;
use crate::report::{format_number, Histogram, Report};
use crate::types::schema::{FieldKind, FieldSpec};

const STYLE: &str = "body{font-family:sans-serif;max-width:56rem;margin:2rem auto;padding:0 1rem;color:#222}\
label{display:block;margin-top:.6rem;font-weight:600}\
input{width:16rem;padding:.25rem}\
button{margin-top:1rem;padding:.4rem 1.2rem}\
.result{margin-top:1.5rem;padding:.8rem;background:#eef6ee;border-left:4px solid #3a3}\
.error{margin-top:1.5rem;padding:.8rem;background:#fbeaea;border-left:4px solid #c33}\
table{border-collapse:collapse;font-size:.8rem}td,th{padding:.1rem .5rem;border:1px solid #ddd}";

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>{style}</style>
</head>
<body>
{body}
</body>
</html>"#,
        title = escape(title),
        style = STYLE,
        body = body,
    )
}

pub fn index_page(deployments: &[Arc<Deployment>]) -> String {
    let items: String = deployments
        .iter()
        .map(|d| {
            format!(
                r#"<li><a href="/apps/{name}">{title}</a> <small>({kind}, {n} inputs)</small></li>"#,
                name = escape(d.name()),
                title = escape(d.config.display_title()),
                kind = d.config.kind.as_str(),
                n = d.config.fields.len(),
            )
        })
        .collect();
    layout(
        "Prediction forms",
        &format!("<h1>Prediction forms</h1>\n<ul>\n{}</ul>", items),
    )
}

/// The input form, optionally prefilled and followed by a result
pub fn form_page(
    deployment: &Deployment,
    values: Option<&HashMap<String, String>>,
    report: Option<&Report>,
) -> String {
    let mut body = form_html(deployment, values);
    if let Some(report) = report {
        body.push_str(&report_html(report));
    }
    layout(deployment.config.display_title(), &body)
}

pub fn form_page_with_error(
    deployment: &Deployment,
    values: &HashMap<String, String>,
    message: &str,
) -> String {
    let mut body = form_html(deployment, Some(values));
    body.push_str(&format!(r#"<div class="error">{}</div>"#, escape(message)));
    layout(deployment.config.display_title(), &body)
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let code = status.as_u16();
    let reason = status.canonical_reason().unwrap_or("Error");
    layout(
        reason,
        &format!(
            r#"<h1>{code} {reason}</h1>
<div class="error">{message}</div>
<p><a href="/">Back to all forms</a></p>"#,
            code = code,
            reason = escape(reason),
            message = escape(message),
        ),
    )
}

fn form_html(deployment: &Deployment, values: Option<&HashMap<String, String>>) -> String {
    let inputs: String = deployment
        .config
        .fields
        .fields()
        .iter()
        .map(|field| {
            let value = values
                .and_then(|v| v.get(&field.name))
                .cloned()
                .unwrap_or_else(|| format_number(field.default));
            input_html(field, &value)
        })
        .collect();

    format!(
        r#"<h1>{title}</h1>
<form method="post" action="/apps/{name}">
{inputs}<button type="submit">Predict</button>
</form>
"#,
        title = escape(deployment.config.display_title()),
        name = escape(deployment.name()),
        inputs = inputs,
    )
}

fn input_html(field: &FieldSpec, value: &str) -> String {
    // A float step would make the browser refuse unaligned values
    let step = match field.kind {
        FieldKind::Integer => format_number(field.step.unwrap_or(1.0)),
        FieldKind::Float => "any".to_string(),
    };
    let mut attrs = format!(r#" step="{}""#, step);
    if let Some(min) = field.min {
        attrs.push_str(&format!(r#" min="{}""#, format_number(min)));
    }
    if let Some(max) = field.max {
        attrs.push_str(&format!(r#" max="{}""#, format_number(max)));
    }
    if field.required {
        attrs.push_str(" required");
    }

    format!(
        "<label for=\"{id}\">{label}</label>\n<input type=\"number\" id=\"{id}\" name=\"{id}\" value=\"{value}\"{attrs}>\n",
        id = escape(&field.name),
        label = escape(field.display_label()),
        value = escape(value),
        attrs = attrs,
    )
}

fn report_html(report: &Report) -> String {
    let mut html = format!(r#"<div class="result">{}</div>"#, escape(&report.message));
    if let Some(rows) = report.subset_rows {
        html.push_str(&format!(
            "\n<p>{} reference rows in this cluster</p>",
            rows
        ));
    }
    for histogram in &report.histograms {
        html.push_str(&histogram_html(histogram));
    }
    html
}

fn histogram_html(histogram: &Histogram) -> String {
    let rows: String = histogram
        .bins
        .iter()
        .map(|b| {
            format!(
                "<tr><td>{:.3}</td><td>{:.3}</td><td>{}</td></tr>",
                b.lower, b.upper, b.count
            )
        })
        .collect();
    let chart = histogram.svg.as_deref().unwrap_or("");
    format!(
        r#"
<section>
<h3>{title}</h3>
{chart}
<details><summary>Bins</summary>
<table><tr><th>from</th><th>to</th><th>count</th></tr>{rows}</table>
</details>
</section>"#,
        title = escape(&histogram.title),
        chart = chart,
        rows = rows,
    )
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Bin;
    use crate::types::prediction::PredictionKind;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<b a="1">Tom & 'Jerry'</b>"#),
            "&lt;b a=&quot;1&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_input_attributes() {
        let field = FieldSpec::integer("color")
            .with_bounds(Some(0.0), Some(1.0))
            .with_default(1.0);
        let html = input_html(&field, "1");
        assert!(html.contains(r#"name="color""#));
        assert!(html.contains(r#"value="1""#));
        assert!(html.contains(r#"step="1""#));
        assert!(html.contains(r#"min="0""#));
        assert!(html.contains(r#"max="1""#));
        assert!(!html.contains("required"));

        let html = input_html(&FieldSpec::float("Item_Mrp").required(), "");
        assert!(html.contains(r#"step="any""#));
        assert!(html.contains("required"));
    }

    #[test]
    fn test_float_input_accepts_any_precision() {
        let mut field = FieldSpec::float("BALANCE");
        field.step = Some(0.01);
        let html = input_html(&field, "95.4321");
        assert!(html.contains(r#"step="any""#));
        assert!(!html.contains(r#"step="0.01""#));

        let mut field = FieldSpec::integer("PURCHASES_TRX");
        field.step = Some(5.0);
        assert!(input_html(&field, "10").contains(r#"step="5""#));
    }

    #[test]
    fn test_error_page() {
        let html = error_page(StatusCode::NOT_FOUND, "Unknown deployment: <x>");
        assert!(html.contains("404 Not Found"));
        assert!(html.contains("Unknown deployment: &lt;x&gt;"));
    }

    #[test]
    fn test_report_html() {
        let report = Report {
            kind: PredictionKind::Cluster,
            value: 2.0,
            message: "Data Belongs to Cluster: 2".to_string(),
            subset_rows: Some(4),
            histograms: vec![Histogram {
                column: "BALANCE".to_string(),
                title: "Histogram for BALANCE in Cluster 2".to_string(),
                bins: vec![Bin {
                    lower: 0.0,
                    upper: 1.0,
                    count: 4,
                }],
                svg: Some("<svg></svg>".to_string()),
            }],
        };
        let html = report_html(&report);
        assert!(html.contains("Data Belongs to Cluster: 2"));
        assert!(html.contains("Histogram for BALANCE in Cluster 2"));
        assert!(html.contains("<svg></svg>"));
        assert!(html.contains("<td>4</td>"));
    }
}
