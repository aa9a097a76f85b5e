//! Batch driver: walks input paths, runs parse → extract → emit for every
//! `.eml` file, and builds the thread graph of the whole batch.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::emit::EmailsWriter;
use crate::error::{EmlError, ErrorKind, Result};
use crate::export::attachment::{export_attachments, DirectorySink};
use crate::extract::extract_record;
use crate::model::record::MessageSource;
use crate::parser::eml::read_eml;
use crate::parser::message::{MessageParser, RawMessage};
use crate::thread::{NodeId, ThreadGraph};

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct BatchStats {
    /// Files looked at (every file found, `.eml` or not).
    pub files_seen: usize,
    /// `<e>` elements written.
    pub emails_written: usize,
    /// Inputs that are not messages.
    pub rejected: usize,
    /// Messages skipped because extraction failed.
    pub failed: usize,
    /// Thread nodes for messages only known by reference.
    pub placeholders: usize,
    /// Messages whose `In-Reply-To` target is unknown.
    pub broken_threads: usize,
    /// Attachment files stored.
    pub attachments: usize,
}

/// Per-run settings taken from [`Config`].
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub parser: MessageParser,
    pub include_headers: bool,
    pub attachment_dir: Option<PathBuf>,
}

impl BatchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            parser: MessageParser::new(config.parser.max_depth, config.parser.max_message_size),
            include_headers: config.output.include_headers,
            attachment_dir: config.attachment_dir(),
        }
    }
}

/// Result of a finished run.
#[derive(Debug)]
pub struct BatchOutcome<W> {
    pub stats: BatchStats,
    pub graph: ThreadGraph,
    pub output: W,
}

/// One run over a set of message sources, writing into a single document.
pub struct Batch<W: Write> {
    options: BatchOptions,
    writer: EmailsWriter<W>,
    output_path: PathBuf,
    graph: ThreadGraph,
    stats: BatchStats,
}

impl<W: Write> Batch<W> {
    /// Start a run. `output_path` names the document in error messages.
    pub fn new(out: W, output_path: impl Into<PathBuf>, options: BatchOptions) -> Result<Self> {
        let output_path = output_path.into();
        let writer = EmailsWriter::new(out).map_err(|e| EmlError::io(&output_path, e))?;
        Ok(Self {
            options,
            writer,
            output_path,
            graph: ThreadGraph::new(),
            stats: BatchStats::default(),
        })
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    /// Process a file, or every file below a directory.
    ///
    /// Missing paths and unreadable directories are logged and skipped, and
    /// so are symlinked directories found inside a directory. `progress` is
    /// called with each file before it is processed. Only a failure to write
    /// the output stops the walk.
    pub fn process_path(&mut self, path: &Path, progress: &dyn Fn(&Path)) -> Result<()> {
        if !path.exists() {
            warn!(path = %path.display(), "Path does not exist, skipped");
            return Ok(());
        }
        if !path.is_dir() {
            progress(path);
            return self.process_file(path);
        }

        let mut children: Vec<PathBuf> = match std::fs::read_dir(path) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read directory, skipped");
                return Ok(());
            }
        };
        children.sort();

        for child in &children {
            if child.is_symlink() && child.is_dir() {
                warn!(path = %child.display(), "Symlinked directory, skipped");
                continue;
            }
            self.process_path(child, progress)?;
        }
        Ok(())
    }

    /// Process one file. Non-fatal errors are counted and logged.
    pub fn process_file(&mut self, path: &Path) -> Result<()> {
        self.stats.files_seen += 1;

        match self.try_process_file(path) {
            Ok(_) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                match e.kind() {
                    ErrorKind::SourceRejected => {
                        self.stats.rejected += 1;
                        info!("{e}");
                    }
                    _ => {
                        self.stats.failed += 1;
                        warn!("{e}");
                    }
                }
                Ok(())
            }
        }
    }

    fn try_process_file(&mut self, path: &Path) -> Result<NodeId> {
        let source = MessageSource::new(path)?;
        let message = read_eml(&source, &self.options.parser)?;
        self.process_message(&source, &message)
    }

    /// Extract, emit and store one parsed message, and add it to the graph.
    pub fn process_message(&mut self, source: &MessageSource, message: &RawMessage) -> Result<NodeId> {
        let record = extract_record(message, source)?;

        let headers = self.options.include_headers.then(|| message.headers());
        self.writer
            .write_entry(&record, &source.display_path(), headers)
            .map_err(|e| EmlError::io(&self.output_path, e))?;
        self.stats.emails_written += 1;

        if let Some(root) = &self.options.attachment_dir {
            let mut sink = DirectorySink::for_record(root, source.record_name());
            let stored = export_attachments(message, self.options.parser.max_depth(), &mut sink)?;
            self.stats.attachments += stored.len();
        }

        debug!(path = %source.display_path(), "Processed message");
        Ok(self.graph.add_message(record))
    }

    /// Close the document, link the thread graph and compute thread lengths.
    pub fn finish(mut self) -> Result<BatchOutcome<W>> {
        let output = self
            .writer
            .finish()
            .map_err(|e| EmlError::io(&self.output_path, e))?;

        self.graph.resolve_links();
        self.graph.assign_thread_lengths();
        self.stats.placeholders = self.graph.placeholder_count();
        self.stats.broken_threads = self.graph.broken_count();

        Ok(BatchOutcome {
            stats: self.stats,
            graph: self.graph,
            output,
        })
    }
}
