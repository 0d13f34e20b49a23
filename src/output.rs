//! Report writers.

use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use subrecon_core::TargetReport;
use tracing::warn;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Txt,
    Csv,
    Json,
    Html,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Html => "html",
        }
    }
}

/// Writes one report. With an output directory the file is named
/// `<ascii-target>.<ext>`; an existing file is preserved unless overwrite
/// is set. Without a directory the subdomain list goes to stdout.
pub(crate) fn write_report(
    report: &TargetReport,
    ascii_target: &str,
    format: OutputFormat,
    output_dir: Option<&Path>,
    overwrite: bool,
) -> Result<()> {
    let Some(dir) = output_dir else {
        let mut stdout = std::io::stdout().lock();
        for subdomain in &report.subdomains {
            writeln!(stdout, "{subdomain}")?;
        }
        return Ok(());
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;
    let path = dir.join(format!("{ascii_target}.{}", format.extension()));
    if path.exists() && !overwrite {
        warn!(path = %path.display(), "output file exists, skipping write (use --overwrite)");
        return Ok(());
    }

    let rendered = render(report, ascii_target, format)?;
    std::fs::write(&path, rendered).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn render(report: &TargetReport, ascii_target: &str, format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Txt => {
            let mut text = report.subdomains.join("\n");
            if !text.is_empty() {
                text.push('\n');
            }
            Ok(text.into_bytes())
        }
        OutputFormat::Json => serde_json::to_vec_pretty(report).context("rendering json report"),
        OutputFormat::Csv => render_csv(report),
        OutputFormat::Html => Ok(render_html(report, ascii_target).into_bytes()),
    }
}

fn render_csv(report: &TargetReport) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["subdomain"])?;
    for subdomain in &report.subdomains {
        writer.write_record([subdomain.as_str()])?;
    }
    writer
        .into_inner()
        .map_err(|err| anyhow!("finalizing csv report: {err}"))
}

fn render_html(report: &TargetReport, ascii_target: &str) -> String {
    // Subdomains are validated hostnames, so they are safe to embed as-is.
    let rows: String = report
        .subdomains
        .iter()
        .map(|subdomain| format!("    <tr><td>{subdomain}</td></tr>\n"))
        .collect();
    format!(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>subrecon: {target}</title></head>\n<body>\n  <h1>{target}</h1>\n  <p>{count} subdomains</p>\n  <table>\n{rows}  </table>\n</body>\n</html>\n",
        target = ascii_target,
        count = report.subdomains.len(),
        rows = rows,
    )
}
