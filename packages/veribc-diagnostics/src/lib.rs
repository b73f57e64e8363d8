//! Diagnostics for `veribc`.

pub mod span;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::{fmt, io};

pub use ariadne;

use ariadne::{ReportKind, Source};

use span::{FileId, FileIdMap, GetSpan, Span};

pub type Report = ariadne::Report<'static, Span>;
pub type ReportBuilder = ariadne::ReportBuilder<'static, Span>;
pub type Label = ariadne::Label<Span>;

impl ariadne::Span for Span {
    type SourceId = FileId;

    fn source(&self) -> &Self::SourceId {
        &self.file_id
    }

    fn start(&self) -> usize {
        self.start as usize
    }

    fn end(&self) -> usize {
        self.end as usize
    }
}

pub struct FileCache<'a> {
    map: &'a FileIdMap,
    sources: HashMap<FileId, Source>,
}

impl<'a> FileCache<'a> {
    pub fn new(map: &'a FileIdMap) -> Self {
        Self {
            map,
            sources: HashMap::new(),
        }
    }
}

impl ariadne::Cache<FileId> for FileCache<'_> {
    fn fetch(&mut self, id: &FileId) -> Result<&Source, Box<dyn fmt::Debug + '_>> {
        if !self.sources.contains_key(id) {
            let source = Source::from(self.map.get_virtual_source(*id));
            self.sources.insert(*id, source);
        }
        Ok(&self.sources[id])
    }

    fn display<'b>(&self, id: &'b FileId) -> Option<Box<dyn fmt::Display + 'b>> {
        Some(Box::new(self.map.get_file_display(*id)))
    }
}

pub trait IntoReport {
    fn into_report(self) -> ReportBuilder;
}

impl IntoReport for ReportBuilder {
    fn into_report(self) -> ReportBuilder {
        self
    }
}

/// Starts an error report with a single primary label.
pub fn error_report(
    message: impl fmt::Display,
    at: &impl GetSpan,
    label: impl fmt::Display,
) -> ReportBuilder {
    let span = at.span();
    Report::build(ReportKind::Error, span.file_id, span.start as usize)
        .with_message(message.to_string())
        .with_label(Label::new(span).with_message(label.to_string()))
}

#[derive(Debug, Default, Clone)]
pub struct Diagnostics(Arc<Mutex<DiagnosticsData>>);

#[derive(Debug, Default)]
pub struct DiagnosticsData {
    reports: Vec<Report>,
}

impl Diagnostics {
    pub fn add(&self, report: impl IntoReport) {
        let report = report.into_report().finish();
        self.lock().reports.push(report);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DiagnosticsData> {
        // A poisoned lock only means another thread panicked while pushing a report.
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Prints all the reports to the output stream. Returns `false` if not empty.
    pub fn write(&self, map: &FileIdMap, mut w: impl io::Write) -> io::Result<bool> {
        let mut cache = FileCache::new(map);
        for report in &self.lock().reports {
            report.write(&mut cache, &mut w)?;
        }
        Ok(self.is_empty())
    }

    /// Prints all the reports to `stderr`. Returns `false` if not empty.
    pub fn eprint(&self, map: &FileIdMap) -> bool {
        let mut cache = FileCache::new(map);
        for report in &self.lock().reports {
            // Nothing sensible to do if stderr is gone.
            let _ = report.eprint(&mut cache);
        }
        self.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().reports.is_empty()
    }
}
