mod config;
mod convert;
mod db;
mod error;
mod extract;
mod parser;
mod server;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use config::Settings;
use convert::{convert_document, UploadedFile};
use db::ConversionRow;
use extract::MimeType;

#[derive(Parser)]
#[command(name = "docjson", about = "Convert loosely formatted documents into structured JSON")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one .txt/.doc/.docx file and print the JSON result
    Convert {
        path: PathBuf,
        /// Declared content type (default: guessed from the extension)
        #[arg(long)]
        mime: Option<String>,
        /// Don't write the JSON artifact to the output dir
        #[arg(long)]
        no_save: bool,
        /// Print structuring warnings to stderr
        #[arg(long)]
        warnings: bool,
    },
    /// Convert every supported file in a directory
    Batch {
        dir: PathBuf,
        /// Max files to convert (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Run the HTTP upload endpoint
    Serve {
        /// Listen address (default from DOCJSON_ADDR or 0.0.0.0:3000)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Show recent conversions
    History {
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Show conversion statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;

    let result = match cli.command {
        Commands::Convert {
            path,
            mime,
            no_save,
            warnings,
        } => {
            if no_save {
                settings.save_json = false;
            }
            settings.ensure_dirs()?;
            let mime = mime.as_deref().map(MimeType::parse).transpose()?;
            let upload = UploadedFile::from_path(&path, mime)?;
            let outcome = convert_document(&upload, &settings);

            let conn = ledger(&settings)?;
            db::insert_conversion(&conn, &ConversionRow::from_outcome(&upload, &outcome))?;

            let result = outcome?;
            if warnings {
                for w in &result.warnings {
                    eprintln!("warning: {}", w);
                }
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Commands::Batch { dir, limit } => {
            settings.ensure_dirs()?;
            let mut files = supported_files(&dir)?;
            if let Some(n) = limit {
                files.truncate(n);
            }
            if files.is_empty() {
                println!("No .txt/.doc/.docx files in {}", dir.display());
                return Ok(());
            }
            println!("Converting {} files...", files.len());
            let conn = ledger(&settings)?;
            let counts = convert_batch(&conn, &files, &settings)?;
            println!("Done: {} converted, {} failed.", counts.ok, counts.failed);
            Ok(())
        }
        Commands::Serve { addr } => {
            if let Some(addr) = addr {
                settings.addr = addr;
            }
            let addr = settings.addr.clone();
            let state = server::AppState::open(settings)?;
            server::start_server(&addr, state).await?;
            Ok(())
        }
        Commands::History { limit } => {
            let conn = ledger(&settings)?;
            let rows = db::fetch_recent(&conn, limit)?;
            if rows.is_empty() {
                println!("No conversions yet.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<24} | {:<24} | {:<7} | {:>8} | {:>8} | {:>8}",
                "#", "File", "Converted", "Status", "Bytes", "Sections", "Warnings"
            );
            println!("{}", "-".repeat(100));
            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<24} | {:<24} | {:<7} | {:>8} | {:>8} | {:>8}",
                    i + 1,
                    truncate(&r.file_name, 24),
                    r.converted_at,
                    r.status,
                    r.file_size,
                    r.section_count,
                    r.warning_count
                );
                if let Some(err) = &r.error {
                    println!("    {}", truncate(err, 90));
                }
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = ledger(&settings)?;
            let s = db::get_stats(&conn)?;
            println!("Total:     {}", s.total);
            println!("Succeeded: {}", s.succeeded);
            println!("Failed:    {}", s.failed);
            println!("Sections:  {}", s.sections);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn ledger(settings: &Settings) -> anyhow::Result<rusqlite::Connection> {
    settings.ensure_dirs()?;
    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;
    Ok(conn)
}

/// Files in `dir` with an accepted extension, sorted by name.
fn supported_files(dir: &Path) -> anyhow::Result<Vec<UploadedFile>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() || MimeType::from_extension(&path).is_err() {
            continue;
        }
        files.push(UploadedFile::from_path(&path, None)?);
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

struct BatchCounts {
    ok: usize,
    failed: usize,
}

fn convert_batch(
    conn: &rusqlite::Connection,
    files: &[UploadedFile],
    settings: &Settings,
) -> anyhow::Result<BatchCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut counts = BatchCounts { ok: 0, failed: 0 };
    for chunk in files.chunks(500) {
        let rows: Vec<ConversionRow> = chunk
            .par_iter()
            .map(|upload| {
                let outcome = convert_document(upload, settings);
                if let Err(e) = &outcome {
                    pb.suspend(|| eprintln!("{}: {}", upload.original_name, e));
                }
                ConversionRow::from_outcome(upload, &outcome)
            })
            .collect();

        let failed = rows.iter().filter(|r| r.error.is_some()).count();
        counts.failed += failed;
        counts.ok += rows.len() - failed;
        db::insert_conversions(conn, &rows)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn truncates_on_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("résumé-final", 6), "résumé...");
    }

    #[test]
    fn batch_converts_supported_files_only() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = tmp.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("a.txt"), "Name: A").unwrap();
        fs::write(docs.join("b.txt"), "Tasks:\n- one\n- two").unwrap();
        fs::write(docs.join("c.docx"), "not a zip").unwrap();
        fs::write(docs.join("d.pdf"), "%PDF").unwrap();

        let settings = Settings {
            uploads_dir: tmp.path().join("uploads"),
            output_dir: tmp.path().join("temp"),
            db_path: tmp.path().join("ledger.sqlite"),
            addr: "127.0.0.1:0".into(),
            save_json: true,
        };
        let files = supported_files(&docs).unwrap();
        assert_eq!(
            files.iter().map(|f| f.original_name.as_str()).collect::<Vec<_>>(),
            ["a.txt", "b.txt", "c.docx"]
        );

        let conn = ledger(&settings).unwrap();
        let counts = convert_batch(&conn, &files, &settings).unwrap();
        assert_eq!((counts.ok, counts.failed), (2, 1));
        assert_eq!(fs::read_dir(&settings.output_dir).unwrap().count(), 2);

        let stats = db::get_stats(&conn).unwrap();
        assert_eq!((stats.total, stats.succeeded, stats.sections), (3, 2, 2));
    }
}
