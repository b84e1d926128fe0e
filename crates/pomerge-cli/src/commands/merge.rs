//! Merge command - reconcile, annotate and merge purchase-order PDFs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{Local, NaiveDate};
use clap::{Args, ValueEnum};
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use pomerge_core::aggregate::{StaffTotal, StoreTotal};
use pomerge_core::error::SourceError;
use pomerge_core::events::{date_total_message, extra_message, missing_message};
use pomerge_core::extract::format_date;
use pomerge_core::pipeline::DateTotal;
use pomerge_core::{
    DocumentSource, EventReporter, MergeOrder, PoMerger, QuantityFormat, RosterEntry, RunSummary,
    StoreCode, TracingReporter,
};
use rust_decimal::Decimal;

use super::config::load_config;

/// Page order of the merged file.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OrderArg {
    /// Input order, then page order within each file
    Source,
    /// Roster order, then codes not in the roster, then pages without a code
    Roster,
}

impl From<OrderArg> for MergeOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Source => MergeOrder::Source,
            OrderArg::Roster => MergeOrder::Roster,
        }
    }
}

/// Arguments for the merge command.
#[derive(Args)]
pub struct MergeArgs {
    /// Input PDF files, folders or glob patterns
    inputs: Vec<String>,

    /// Folder whose PDF files are merged before the other inputs
    #[arg(short, long)]
    input_folder: Option<PathBuf>,

    /// Roster file: one store code per line, optionally with a name and a staff column
    #[arg(short, long)]
    roster: PathBuf,

    /// Output PDF (default: PO_DDMMYYYY.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Store code pattern (regular expression)
    #[arg(short, long)]
    pattern: Option<String>,

    /// Page order of the merged file
    #[arg(long, value_enum)]
    order: Option<OrderArg>,

    /// Skip unreadable PDFs instead of failing
    #[arg(long)]
    lenient: bool,

    /// Do not write quantities onto pages
    #[arg(long)]
    no_annotate: bool,

    /// Write a run summary (JSON for .json files, CSV otherwise)
    #[arg(long)]
    summary: Option<PathBuf>,
}

/// Forwards events to the log and drives the progress bar.
struct ConsoleReporter {
    inner: TracingReporter,
    progress: ProgressBar,
}

impl ConsoleReporter {
    fn new(format: QuantityFormat) -> Self {
        let progress = ProgressBar::new(0);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Self {
            inner: TracingReporter::new(format),
            progress,
        }
    }
}

impl EventReporter for ConsoleReporter {
    fn on_code_extra(&mut self, code: &StoreCode, source_id: &str, page: u32) {
        self.inner.on_code_extra(code, source_id, page);
    }

    fn on_code_missing(&mut self, entry: &RosterEntry) {
        self.inner.on_code_missing(entry);
    }

    fn on_date_total(&mut self, date: NaiveDate, total: Decimal) {
        self.inner.on_date_total(date, total);
    }

    fn on_code_matched(&mut self, code: &StoreCode, source_id: &str, page: u32) {
        self.inner.on_code_matched(code, source_id, page);
    }

    fn on_source_skipped(&mut self, error: &SourceError) {
        self.progress.suspend(|| self.inner.on_source_skipped(error));
    }

    fn on_leading_pages(&mut self, count: usize, assigned_to: Option<&StoreCode>) {
        self.inner.on_leading_pages(count, assigned_to);
    }

    fn on_store_total(&mut self, code: &StoreCode, total: Decimal) {
        self.inner.on_store_total(code, total);
    }

    fn on_staff_total(&mut self, staff: &str, total: Decimal, codes: &[StoreCode]) {
        self.inner.on_staff_total(staff, total, codes);
    }

    fn on_progress(&mut self, done: usize, total: usize) {
        if self.progress.length() != Some(total as u64) {
            self.progress.set_length(total as u64);
        }
        self.progress.set_position(done as u64);
        if done == total {
            self.progress.finish_and_clear();
        }
    }
}

pub fn run(args: MergeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(pattern) = &args.pattern {
        config.extraction.store_code_pattern = pattern.clone();
    }
    if let Some(order) = args.order {
        config.merge.order = order.into();
    }
    if args.lenient {
        config.merge.strict = false;
    }
    if args.no_annotate {
        config.annotation.enabled = false;
    }

    let merger = PoMerger::new(config)?;
    let index = merger.load_roster_file(&args.roster)?;
    println!(
        "{} Loaded roster with {} store code(s)",
        style("ℹ").blue(),
        index.len()
    );

    let files = collect_inputs(&args.inputs, args.input_folder.as_deref())?;
    if files.is_empty() {
        anyhow::bail!("No PDF files found in the given inputs");
    }
    println!(
        "{} Found {} PDF file(s) to merge",
        style("ℹ").blue(),
        files.len()
    );

    let sources: Vec<DocumentSource> = files.into_iter().map(DocumentSource::from_path).collect();
    let format = merger.quantity_format();
    let mut reporter = ConsoleReporter::new(format);
    let report = merger.run(&sources, &index, &mut reporter)?;

    let output = args.output.unwrap_or_else(default_output_path);
    report.document.write_to(&output)?;

    print_summary(&report.summary, &format);

    if let Some(summary_path) = &args.summary {
        write_summary(summary_path, &report.summary, &format)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!();
    println!(
        "{} Merged {} page(s) into {} in {:?}",
        style("✓").green(),
        report.summary.page_count,
        output.display(),
        start.elapsed()
    );

    Ok(())
}

fn default_output_path() -> PathBuf {
    PathBuf::from(format!("PO_{}.pdf", Local::now().format("%d%m%Y")))
}

/// Resolve inputs to PDF paths: the input folder first, then each input in
/// order. Duplicates keep their first position.
pub fn collect_inputs(inputs: &[String], folder: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if let Some(folder) = folder {
        if !folder.is_dir() {
            anyhow::bail!("Input folder not found: {}", folder.display());
        }
        files.extend(pdfs_in_dir(folder)?);
    }

    for input in inputs {
        let path = Path::new(input);
        if path.is_dir() {
            files.extend(pdfs_in_dir(path)?);
        } else if path.is_file() {
            if is_pdf(path) {
                files.push(path.to_path_buf());
            } else {
                warn!("Skipping non-PDF input {}", path.display());
            }
        } else {
            let matches: Vec<PathBuf> = glob(input)?
                .filter_map(|r| r.ok())
                .filter(|p| p.is_file() && is_pdf(p))
                .collect();
            if matches.is_empty() {
                anyhow::bail!("No PDF files match {}", input);
            }
            debug!("{} matched {} file(s)", input, matches.len());
            files.extend(matches);
        }
    }

    let mut seen = HashSet::new();
    files.retain(|p| seen.insert(p.clone()));
    Ok(files)
}

fn pdfs_in_dir(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let pattern = format!("{}/*", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut files: Vec<PathBuf> = glob(&pattern)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file() && is_pdf(p))
        .collect();
    files.sort();
    Ok(files)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

fn print_summary(summary: &RunSummary, format: &QuantityFormat) {
    let reconciliation = &summary.reconciliation;

    if reconciliation.is_clean() {
        println!("{} Every roster store code was found", style("✓").green());
    }
    for entry in &reconciliation.missing {
        println!("{} {}", style("✗").red(), missing_message(entry));
    }
    for extra in &reconciliation.extra {
        println!(
            "{} {}",
            style("!").yellow(),
            extra_message(&extra.code, &extra.source_id, extra.page)
        );
    }
    for skipped in &summary.skipped_sources {
        println!("{} Skipped {}", style("!").yellow(), skipped.reason);
    }

    if !summary.date_totals.is_empty() {
        println!();
        for DateTotal { date, total } in &summary.date_totals {
            println!("{}", date_total_message(*date, &format.format(*total)));
        }
    }

    if !summary.staff_totals.is_empty() {
        println!();
        println!("{}", style("Totals by staff:").bold());
        for StaffTotal { staff, total, codes } in &summary.staff_totals {
            let codes: Vec<&str> = codes.iter().map(|c| c.as_str()).collect();
            println!("  {}: {} ({})", staff, format.format(*total), codes.join(", "));
        }
    }
}

fn write_summary(path: &Path, summary: &RunSummary, format: &QuantityFormat) -> anyhow::Result<()> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        std::fs::write(path, serde_json::to_string_pretty(summary)?)?;
        return Ok(());
    }

    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["kind", "key", "total"])?;
    for DateTotal { date, total } in &summary.date_totals {
        wtr.write_record(["date", &format_date(*date), &format.format(*total)])?;
    }
    for StoreTotal { code, total } in &summary.store_totals {
        wtr.write_record(["store", code.as_str(), &format.format(*total)])?;
    }
    for StaffTotal { staff, total, .. } in &summary.staff_totals {
        wtr.write_record(["staff", staff.as_str(), &format.format(*total)])?;
    }
    wtr.flush()?;
    Ok(())
}
