//! Quote document rendering.
//!
//! Quotes are rendered from an HTML template and converted to PDF via
//! wkhtmltopdf when the binary is available; otherwise the HTML itself is
//! returned for browser rendering. The rasterizer is an external
//! collaborator, so its absence degrades gracefully instead of failing.

use std::collections::HashMap;
use std::process::Stdio;

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use tera::{Context, Tera};
use tokio::process::Command;
use tracing::{error, info, warn};

/// Register custom Tera filters used by quote templates.
///
/// - `format`: printf-style formatting, e.g. `"%.2f" | format(value=price)`
/// - `money`:  alias for 2-decimal rounding, e.g. `amount | money`
pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("format", tera_format_filter);
    tera.register_filter("money", tera_money_filter);
}

fn tera_format_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let format_str = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("format filter expects a string input"))?;

    let val = args
        .get("value")
        .ok_or_else(|| tera::Error::msg("format filter requires a 'value' argument"))?;

    let num = match val {
        tera::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    };

    // Parse %.<N>f patterns
    let result = if let Some(rest) = format_str.strip_prefix("%.") {
        if let Some(precision_str) = rest.strip_suffix('f') {
            let precision: usize = precision_str.parse().unwrap_or(2);
            format!("{:.*}", precision, num)
        } else {
            format!("{}", num)
        }
    } else {
        format!("{}", num)
    };

    Ok(tera::Value::String(result))
}

fn tera_money_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let num = match value {
        tera::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(tera::Value::String(format!("{:.2}", num)))
}

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("template error: {0}")]
    Template(String),
    #[error("conversion error: {0}")]
    Conversion(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug)]
pub struct PdfGenerator {
    tera: Tera,
    wkhtmltopdf_path: Option<String>,
}

impl PdfGenerator {
    /// Create a generator over the given template directory. The embedded
    /// template backs any name the directory does not provide.
    pub fn new(template_dir: &str) -> Result<Self, PdfError> {
        let mut tera = Tera::new(&format!("{}/**/*", template_dir))
            .map_err(|e| PdfError::Template(e.to_string()))?;

        register_template_filters(&mut tera);

        if !tera.get_template_names().any(|name| name == "quote.html.tera") {
            tera.add_raw_template(
                "quote.html.tera",
                include_str!("../../../templates/quotes/quote.html.tera"),
            )
            .map_err(|e| PdfError::Template(e.to_string()))?;
        }

        Ok(Self { tera, wkhtmltopdf_path: find_wkhtmltopdf() })
    }

    /// Create a generator from the embedded template, for deployments that
    /// ship without a templates directory.
    pub fn with_embedded_templates() -> Self {
        let mut tera = Tera::default();
        register_template_filters(&mut tera);

        tera.add_raw_template(
            "quote.html.tera",
            include_str!("../../../templates/quotes/quote.html.tera"),
        )
        .expect("embedded quote template must parse");

        Self { tera, wkhtmltopdf_path: find_wkhtmltopdf() }
    }

    /// Render a quote document. Returns PDF bytes when wkhtmltopdf is
    /// available, HTML otherwise.
    pub async fn generate_quote_document(
        &self,
        quote_data: &serde_json::Value,
    ) -> Result<PdfResult, PdfError> {
        let mut context = Context::new();
        context.insert("quote", quote_data);
        context.insert(
            "client",
            &quote_data.get("client").cloned().unwrap_or(serde_json::json!({})),
        );
        context.insert(
            "lines",
            &quote_data.get("lines").cloned().unwrap_or(serde_json::json!([])),
        );
        context.insert(
            "pricing",
            &quote_data.get("pricing").cloned().unwrap_or(serde_json::json!({})),
        );

        let html = self
            .tera
            .render("quote.html.tera", &context)
            .map_err(|e| PdfError::Template(e.to_string()))?;

        if let Some(ref wkhtmltopdf) = self.wkhtmltopdf_path {
            match self.convert_html_to_pdf(&html, wkhtmltopdf).await {
                Ok(pdf_bytes) => Ok(PdfResult::Pdf(pdf_bytes)),
                Err(e) => {
                    warn!(error = %e, "PDF conversion failed, falling back to HTML");
                    Ok(PdfResult::Html(html))
                }
            }
        } else {
            Ok(PdfResult::Html(html))
        }
    }

    async fn convert_html_to_pdf(
        &self,
        html: &str,
        wkhtmltopdf_path: &str,
    ) -> Result<Vec<u8>, PdfError> {
        let temp_dir = std::env::temp_dir();
        let stem = uuid::Uuid::new_v4();
        let html_path = temp_dir.join(format!("quote_{stem}.html"));
        let pdf_path = temp_dir.join(format!("quote_{stem}.pdf"));

        tokio::fs::write(&html_path, html).await?;

        let output = Command::new(wkhtmltopdf_path)
            .arg("--page-size")
            .arg("A4")
            .arg("--margin-top")
            .arg("10mm")
            .arg("--margin-bottom")
            .arg("10mm")
            .arg("--margin-left")
            .arg("10mm")
            .arg("--margin-right")
            .arg("10mm")
            .arg("--encoding")
            .arg("utf-8")
            .arg(&html_path)
            .arg(&pdf_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(stderr = %stderr, "wkhtmltopdf failed");
            return Err(PdfError::Conversion(stderr.to_string()));
        }

        let pdf_bytes = tokio::fs::read(&pdf_path).await?;

        let _ = tokio::fs::remove_file(&html_path).await;
        let _ = tokio::fs::remove_file(&pdf_path).await;

        info!(size = pdf_bytes.len(), "PDF generated successfully");

        Ok(pdf_bytes)
    }
}

fn find_wkhtmltopdf() -> Option<String> {
    let path = which::which("wkhtmltopdf").ok().map(|p| p.to_string_lossy().to_string());
    if path.is_none() {
        warn!("wkhtmltopdf not found in PATH - quote documents will render as HTML");
    }
    path
}

/// Result of document rendering.
pub enum PdfResult {
    Pdf(Vec<u8>),
    Html(String),
}

impl PdfResult {
    /// Convert to an Axum response; `inline` streams into the browser
    /// instead of forcing a download.
    pub fn into_response(self, filename: &str, inline: bool) -> Response {
        let disposition_kind = if inline { "inline" } else { "attachment" };
        match self {
            PdfResult::Pdf(bytes) => Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/pdf")
                .header(
                    header::CONTENT_DISPOSITION,
                    format!("{disposition_kind}; filename=\"{filename}\""),
                )
                .body(Body::from(bytes))
                .unwrap(),
            PdfResult::Html(html) => Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
                .body(Body::from(html))
                .unwrap(),
        }
    }
}
