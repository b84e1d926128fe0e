//! The merge run: scan every page, reconcile codes against the roster,
//! total the quantities, annotate pages and assemble the output.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use lopdf::ObjectId;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregate::{halve, staff_totals, store_totals, QuantityAggregator, StaffTotal, StoreTotal};
use crate::error::{IntegrityError, PoMergeError, Result, SourceError};
use crate::events::EventReporter;
use crate::extract::{DateExtractor, FieldExtractor, QuantityExtractor, QuantityFormat, StoreCodeMatcher};
use crate::grouping::{source_order, PageGroups};
use crate::models::{MergeOrder, PageRecord, PageRef, PoMergeConfig};
use crate::pdf::{DocumentSource, MergeAssembler, MergedDocument, PageAnnotator, SourceDocument};
use crate::reconcile::{reconcile, FoundCode, ReconciliationResult};
use crate::roster::CodeIndex;

/// Loaded sources and their scanned pages.
#[derive(Debug)]
pub struct ScanOutcome {
    pub sources: Vec<SourceDocument>,
    /// One record per page, in source then page order.
    pub records: Vec<PageRecord>,
    /// Sources skipped in lenient mode.
    pub skipped: Vec<SourceError>,
}

/// One date's total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateTotal {
    pub date: NaiveDate,
    pub total: Decimal,
}

/// A source left out of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSource {
    pub source_id: String,
    pub reason: String,
}

/// Serializable outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub reconciliation: ReconciliationResult,
    pub date_totals: Vec<DateTotal>,
    pub store_totals: Vec<StoreTotal>,
    pub staff_totals: Vec<StaffTotal>,
    pub skipped_sources: Vec<SkippedSource>,
    pub page_count: usize,
    pub annotated_pages: usize,
    pub leading_pages: usize,
    pub processing_time_ms: u64,
}

/// Result of a successful run.
#[derive(Debug)]
pub struct MergeReport {
    pub document: MergedDocument,
    pub summary: RunSummary,
    pub records: Vec<PageRecord>,
}

/// Runs the reconciliation and merge over a list of sources.
#[derive(Debug)]
pub struct PoMerger {
    config: PoMergeConfig,
    matcher: StoreCodeMatcher,
    quantities: QuantityExtractor,
    dates: DateExtractor,
    annotator: PageAnnotator,
    cancel: Option<Arc<AtomicBool>>,
}

impl PoMerger {
    /// Validate the configuration and build the extractors.
    pub fn new(config: PoMergeConfig) -> Result<Self> {
        let matcher = StoreCodeMatcher::new(&config.extraction.store_code_pattern)?;
        let quantities = QuantityExtractor::new(&config.extraction.quantity_labels)?;
        let annotator = PageAnnotator::new(config.annotation.clone());

        Ok(Self {
            config,
            matcher,
            quantities,
            dates: DateExtractor::new(),
            annotator,
            cancel: None,
        })
    }

    /// Stop the run between sources once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &PoMergeConfig {
        &self.config
    }

    pub fn matcher(&self) -> &StoreCodeMatcher {
        &self.matcher
    }

    /// Formatting used for quantities in the overlay and in events.
    pub fn quantity_format(&self) -> QuantityFormat {
        QuantityFormat::from(&self.config.annotation)
    }

    /// Parse roster text with this run's pattern.
    pub fn load_roster(&self, text: &str) -> Result<CodeIndex> {
        Ok(CodeIndex::load(text, &self.matcher, &self.config.roster)?)
    }

    /// Read and parse a roster file with this run's pattern.
    pub fn load_roster_file(&self, path: &Path) -> Result<CodeIndex> {
        Ok(CodeIndex::from_path(path, &self.matcher, &self.config.roster)?)
    }

    /// Extract the per-page fields from page text.
    pub fn scan_page(&self, source_id: &str, page_ref: PageRef, text: String) -> PageRecord {
        PageRecord {
            source_id: source_id.to_string(),
            page_ref,
            code: self.matcher.find(&text),
            quantity: self.quantities.extract(&text).map(|m| m.value),
            date: self.dates.extract(&text).map(|m| m.value),
            raw_text: text,
        }
    }

    /// Load every source and scan every page.
    pub fn scan(
        &self,
        inputs: &[DocumentSource],
        reporter: &mut dyn EventReporter,
    ) -> Result<ScanOutcome> {
        let mut sources = Vec::with_capacity(inputs.len());
        let mut skipped = Vec::new();

        for input in inputs {
            self.check_cancelled(&input.id())?;
            match SourceDocument::load(input) {
                Ok(source) => sources.push(source),
                Err(e) if self.config.merge.strict => return Err(e.into()),
                Err(e) => {
                    reporter.on_source_skipped(&e);
                    skipped.push(e);
                }
            }
        }

        let total: usize = sources.iter().map(|s| s.page_count() as usize).sum();
        let mut records = Vec::with_capacity(total);

        for (index, source) in sources.iter().enumerate() {
            self.check_cancelled(source.id())?;
            for page in source.page_numbers() {
                let record = self.scan_page(source.id(), PageRef::new(index, page), source.page_text(page));
                if let Some(code) = &record.code {
                    reporter.on_code_matched(code, source.id(), page);
                }
                records.push(record);
                reporter.on_progress(records.len(), total);
            }
        }

        info!(
            "Scanned {} page(s) from {} source(s), {} skipped",
            records.len(),
            sources.len(),
            skipped.len()
        );
        Ok(ScanOutcome {
            sources,
            records,
            skipped,
        })
    }

    /// Run the whole pipeline. Nothing is written anywhere; the caller
    /// decides what to do with the merged bytes.
    pub fn run(
        &self,
        inputs: &[DocumentSource],
        index: &CodeIndex,
        reporter: &mut dyn EventReporter,
    ) -> Result<MergeReport> {
        let start = Instant::now();
        let ScanOutcome {
            mut sources,
            records,
            skipped,
        } = self.scan(inputs, reporter)?;

        // Reconciliation
        let reconciliation = reconcile(&FoundCode::from_records(&records), index);
        reconciliation.emit(reporter);
        debug!(
            "{} missing, {} extra store code(s)",
            reconciliation.missing.len(),
            reconciliation.extra.len()
        );

        // Per-date totals
        let mut aggregator = QuantityAggregator::new();
        let mut halved: HashMap<PageRef, Decimal> = HashMap::new();
        for record in &records {
            let Some(quantity) = record.quantity else {
                continue;
            };
            halved.insert(record.page_ref, halve(quantity));
            match record.date {
                Some(date) => {
                    aggregator.add(date, quantity);
                }
                None => debug!(
                    "{} page {}: quantity without a date is not totalled",
                    record.source_id,
                    record.page()
                ),
            }
        }
        aggregator.emit(reporter);

        // Store grouping and rollups
        let groups = PageGroups::build(&records);
        if groups.leading_count() > 0 {
            reporter.on_leading_pages(groups.leading_count(), groups.first_code());
        }
        let stores = store_totals(&groups, &halved, index);
        for store in &stores {
            reporter.on_store_total(&store.code, store.total);
        }
        let staff = staff_totals(&stores, index);
        for member in &staff {
            reporter.on_staff_total(&member.staff, member.total, &member.codes);
        }

        let annotated_pages = if self.config.annotation.enabled {
            self.annotate(&mut sources, &records, &halved)?
        } else {
            0
        };

        let order = match self.config.merge.order {
            MergeOrder::Source => source_order(&records),
            MergeOrder::Roster => groups.roster_order(index),
        };
        let document = MergeAssembler::new().assemble(sources, &order)?;

        let summary = RunSummary {
            reconciliation,
            date_totals: aggregator
                .totals()
                .iter()
                .map(|(date, total)| DateTotal {
                    date: *date,
                    total: *total,
                })
                .collect(),
            store_totals: stores,
            staff_totals: staff,
            skipped_sources: skipped
                .iter()
                .map(|e| SkippedSource {
                    source_id: e.source_id().to_string(),
                    reason: e.to_string(),
                })
                .collect(),
            page_count: document.page_count(),
            annotated_pages,
            leading_pages: groups.leading_count(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Merged {} page(s), {} annotated, in {} ms",
            summary.page_count, summary.annotated_pages, summary.processing_time_ms
        );
        Ok(MergeReport {
            document,
            summary,
            records,
        })
    }

    /// Write each page's halved quantity onto it. Returns the number of
    /// annotated pages.
    fn annotate(
        &self,
        sources: &mut [SourceDocument],
        records: &[PageRecord],
        halved: &HashMap<PageRef, Decimal>,
    ) -> Result<usize> {
        let format = self.quantity_format();
        let mut fonts: HashMap<usize, ObjectId> = HashMap::new();
        let mut count = 0;

        for record in records {
            let Some(value) = halved.get(&record.page_ref) else {
                continue;
            };
            let page_ref = record.page_ref;
            let source = sources
                .get_mut(page_ref.source)
                .ok_or(IntegrityError::UnknownSource(page_ref.source))?;
            let page_id = source.page_id(page_ref.page).ok_or_else(|| IntegrityError::MissingPage {
                source_id: record.source_id.clone(),
                page: page_ref.page,
            })?;

            let doc = source.document_mut();
            let font_id = *fonts
                .entry(page_ref.source)
                .or_insert_with(|| self.annotator.register_font(doc));
            self.annotator
                .annotate(doc, page_id, font_id, &format.format(*value))
                .map_err(|reason| IntegrityError::Annotation {
                    source_id: record.source_id.clone(),
                    page: page_ref.page,
                    reason,
                })?;
            count += 1;
        }

        Ok(count)
    }

    fn check_cancelled(&self, next_source: &str) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => {
                warn!("Run cancelled before {}", next_source);
                Err(PoMergeError::Cancelled(next_source.to_string()))
            }
            _ => Ok(()),
        }
    }
}
