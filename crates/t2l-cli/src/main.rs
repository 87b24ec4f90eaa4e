//! t2l: translate a Tableau workbook document into a LookML project
//!
//! The workbook XML is expected already converted to its JSON form
//! (attributes under `@name`, element text under `#text`).

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

mod config;
mod logging;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "t2l")]
#[command(about = "Translate a Tableau workbook document into a LookML project")]
#[command(version)]
struct Args {
    /// Workbook document (JSON)
    document: PathBuf,

    /// YAML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Output root, overrides the configured directory
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Project name, defaults to the document's file stem
    #[arg(long)]
    name: Option<String>,

    /// Skip writing the JSON report
    #[arg(long)]
    no_report: bool,
}

/// What a run produced.
#[derive(Debug)]
struct Outcome {
    project_dir: PathBuf,
    files: usize,
    report: Option<PathBuf>,
    gaps: usize,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => Config::from_env()?,
    };
    config.apply_logging_env();
    logging::init()?;

    let outcome = run(&args, &config)?;
    info!(
        project = %outcome.project_dir.display(),
        files = outcome.files,
        gaps = outcome.gaps,
        "Done"
    );
    if let Some(report) = &outcome.report {
        info!(report = %report.display(), "Report written");
    }
    Ok(())
}

fn project_name(args: &Args) -> String {
    args.name
        .clone()
        .or_else(|| {
            args.document
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "workbook".to_string())
}

fn run(args: &Args, config: &Config) -> Result<Outcome> {
    let text = fs::read_to_string(&args.document)
        .with_context(|| format!("reading {}", args.document.display()))?;
    let document: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", args.document.display()))?;

    let translation = t2l_tableau::convert(&document, &project_name(args), config.lookml.clone())?;

    let root = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.directory));
    let written = translation.project.write_to(&root)?;

    let report = if config.output.report && !args.no_report {
        let path = root.join(format!("{}.report.json", translation.project.name()));
        write_report(&path, &translation)?;
        Some(path)
    } else {
        None
    };

    Ok(Outcome {
        project_dir: root.join(translation.project.name()),
        files: written.len(),
        report,
        gaps: translation.gaps.len(),
    })
}

fn write_report(path: &Path, translation: &t2l_tableau::Translation) -> Result<()> {
    let json = serde_json::to_string_pretty(&translation.report())?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> serde_json::Value {
        json!({"workbook": {"datasources": {"datasource": {
            "@name": "federated.1",
            "@caption": "Sales",
            "connection": {
                "relation": {"@name": "Orders", "@table": "[dbo].[Orders]", "@type": "table"},
                "metadata-records": {"metadata-record": {
                    "@class": "column",
                    "remote-name": "Amount",
                    "parent-name": "[Orders]",
                    "local-type": "real"
                }}
            }
        }}}})
    }

    fn args(dir: &Path, no_report: bool) -> Args {
        let document = dir.join("Quarterly Review.json");
        fs::write(&document, document_text()).unwrap();
        Args {
            document,
            config: None,
            output: Some(dir.join("out")),
            name: None,
            no_report,
        }
    }

    fn document_text() -> String {
        serde_json::to_string(&document()).unwrap()
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["t2l", "wb.json", "--output", "out", "--no-report"]).unwrap();
        assert_eq!(args.document, PathBuf::from("wb.json"));
        assert_eq!(args.output, Some(PathBuf::from("out")));
        assert!(args.no_report);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_run_writes_project_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run(&args(dir.path(), false), &Config::default()).unwrap();

        assert_eq!(outcome.project_dir, dir.path().join("out/quarterly_review"));
        assert_eq!(outcome.files, 2);
        assert_eq!(outcome.gaps, 0);
        assert!(outcome.project_dir.join("views/orders.view.lkml").is_file());
        assert!(outcome.project_dir.join("models/sales.model.lkml").is_file());

        let report_path = outcome.report.unwrap();
        assert_eq!(report_path, dir.path().join("out/quarterly_review.report.json"));
        let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(report_path).unwrap()).unwrap();
        assert_eq!(report["summary"]["views"], 1);
    }

    #[test]
    fn test_run_without_report() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run(&args(dir.path(), true), &Config::default()).unwrap();
        assert!(outcome.report.is_none());
        assert!(!dir.path().join("out/quarterly_review.report.json").exists());
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_each_gap_logged_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut document = document();
        document["workbook"]["datasources"]["datasource"]["connection"]["metadata-records"]["metadata-record"] = json!([
            {"@class": "column", "remote-name": "Amount", "parent-name": "[Orders]", "local-type": "real"},
            {"@class": "column", "remote-name": "Ghost", "parent-name": "[Missing]", "local-type": "string"}
        ]);
        let path = dir.path().join("ghost.json");
        fs::write(&path, serde_json::to_string(&document).unwrap()).unwrap();
        let args = Args {
            document: path,
            config: None,
            output: Some(dir.path().join("out")),
            name: None,
            no_report: true,
        };

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let outcome = tracing::subscriber::with_default(subscriber, || run(&args, &Config::default())).unwrap();

        assert_eq!(outcome.gaps, 1);
        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(logs.matches("Parent relation 'Missing' not found").count(), 1, "{logs}");
    }

    #[test]
    fn test_run_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("broken.json");
        fs::write(&document, "{\"other\": {}}").unwrap();
        let args = Args {
            document,
            config: None,
            output: Some(dir.path().join("out")),
            name: Some("broken".to_string()),
            no_report: false,
        };
        let err = run(&args, &Config::default()).unwrap_err();
        assert!(err.to_string().contains("workbook"));
    }
}
