//! A file sink with daily rotation, a size ceiling, gzip compression of
//! rotated files, and age-based retention.
//!
//! Files are named from a pattern such as `error.%DATE%.log`. When the
//! current file would grow past the size ceiling, writing continues in
//! `error.<date>.log.1`, `.2`, and so on. Rotated files are compressed to
//! `<name>.gz` when `zipped_archive` is set. After every rotation, files whose
//! date is older than the retention window are deleted.

use crate::core::{Level, LogRecord, Sink};
use crate::error::SinkError;
use crate::formatting::{RecordFormat, TextFormatter};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Placeholder replaced by the formatted date in `RotationSettings::filename`.
pub const DATE_TOKEN: &str = "%DATE%";

/// Default size ceiling for a single file (10 MiB).
pub const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;

/// Default retention window (30 days).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Parameters for `RotatingFileSink`.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationSettings {
    pub dirname: PathBuf,
    /// File name pattern containing `%DATE%`.
    pub filename: String,
    /// `chrono` format for the date token; it also sets the rotation cadence.
    pub date_pattern: String,
    pub zipped_archive: bool,
    pub max_size: u64,
    pub max_age: Duration,
    pub level: Level,
}

impl RotationSettings {
    /// The daily `error.%DATE%.log` rotation used for `warning` and above.
    pub fn new(dirname: impl Into<PathBuf>) -> Self {
        Self {
            dirname: dirname.into(),
            filename: "error.%DATE%.log".to_string(),
            date_pattern: "%Y-%m-%d".to_string(),
            zipped_archive: true,
            max_size: DEFAULT_MAX_SIZE,
            max_age: DEFAULT_MAX_AGE,
            level: Level::Warning,
        }
    }

    /// The parts of the pattern before and after `%DATE%`.
    fn affixes(&self) -> (&str, &str) {
        match self.filename.split_once(DATE_TOKEN) {
            Some((prefix, suffix)) => (prefix, suffix),
            None => (self.filename.as_str(), ""),
        }
    }
}

struct ActiveFile {
    day: NaiveDate,
    date: String,
    index: u32,
    path: PathBuf,
    file: File,
    size: u64,
}

pub struct RotatingFileSink {
    settings: RotationSettings,
    formatter: Box<dyn TextFormatter>,
    active: Mutex<Option<ActiveFile>>,
}

impl RotatingFileSink {
    /// Creates the sink and its directory. No file is opened until the first record.
    pub fn new(settings: RotationSettings, format: RecordFormat) -> Result<Self, SinkError> {
        fs::create_dir_all(&settings.dirname)?;
        Ok(Self {
            settings,
            formatter: format.formatter(),
            active: Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &RotationSettings {
        &self.settings
    }

    fn path_for(&self, date: &str, index: u32) -> PathBuf {
        let base = self.settings.filename.replace(DATE_TOKEN, date);
        let name = if index == 0 {
            base
        } else {
            format!("{}.{}", base, index)
        };
        self.settings.dirname.join(name)
    }

    /// Opens the newest file for `day`, continuing it if it was not yet rotated.
    fn open(&self, day: NaiveDate, date: &str) -> io::Result<ActiveFile> {
        let mut newest = None;
        let mut index = 0;
        loop {
            let path = self.path_for(date, index);
            if path.exists() {
                newest = Some((index, false));
            } else if gz_path(&path).exists() {
                newest = Some((index, true));
            } else {
                break;
            }
            index += 1;
        }

        let index = match newest {
            None => 0,
            Some((i, false)) => i,
            Some((i, true)) => i + 1,
        };
        self.open_at(day, date, index)
    }

    fn open_at(&self, day: NaiveDate, date: &str, index: u32) -> io::Result<ActiveFile> {
        let path = self.path_for(date, index);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();
        debug!(path = %path.display(), "Opened log file");
        Ok(ActiveFile {
            day,
            date: date.to_string(),
            index,
            path,
            file,
            size,
        })
    }

    /// Closes `old` and compresses it if configured.
    fn retire(&self, old: ActiveFile) -> io::Result<()> {
        let ActiveFile { mut file, path, .. } = old;
        file.flush()?;
        drop(file);
        if self.settings.zipped_archive {
            compress(&path)?;
        }
        Ok(())
    }

    /// Appends `line`, rotating when `now` falls on a later day than the
    /// active file. Records stamped before the active day go to the active
    /// file, so rotation never moves backwards.
    fn write_line(&self, line: &str, now: DateTime<Local>) -> Result<(), SinkError> {
        let day = now.date_naive();
        let date = now.format(&self.settings.date_pattern).to_string();
        let len = line.len() as u64 + 1;
        let mut active = self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let current = match active.take() {
            Some(current) if current.date == date || day < current.day => {
                if current.size > 0 && current.size + len > self.settings.max_size {
                    let (day, date, next) = (current.day, current.date.clone(), current.index + 1);
                    self.retire(current)?;
                    self.open_at(day, &date, next)?
                } else {
                    current
                }
            }
            Some(stale) => {
                self.retire(stale)?;
                let fresh = self.open(day, &date)?;
                self.sweep(day);
                fresh
            }
            None => {
                let fresh = self.open(day, &date)?;
                self.sweep(day);
                fresh
            }
        };

        let current = active.insert(current);
        writeln!(current.file, "{}", line)?;
        current.size += len;
        Ok(())
    }

    /// Deletes files whose date is older than the retention window.
    fn sweep(&self, today: NaiveDate) {
        let Ok(max_age) = chrono::Duration::from_std(self.settings.max_age) else {
            return;
        };
        let cutoff = today - max_age;

        let entries = match fs::read_dir(&self.settings.dirname) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to read log directory for retention");
                return;
            }
        };

        let mut deleted_count = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(date) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|name| self.file_date(name))
            else {
                continue;
            };

            if date < cutoff {
                match fs::remove_file(&path) {
                    Ok(()) => deleted_count += 1,
                    Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete old log file"),
                }
            }
        }

        if deleted_count > 0 {
            info!(count = deleted_count, "Cleaned up old log files");
        }
    }

    /// Extracts the date from a file name produced by this sink.
    fn file_date(&self, name: &str) -> Option<NaiveDate> {
        let (prefix, suffix) = self.settings.affixes();
        let rest = name.strip_prefix(prefix)?;
        let date_str = if suffix.is_empty() {
            rest.split('.').next()?
        } else {
            &rest[..rest.find(suffix)?]
        };
        NaiveDate::parse_from_str(date_str, &self.settings.date_pattern).ok()
    }
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

/// Replaces `path` with a gzip-compressed `path.gz`.
fn compress(path: &Path) -> io::Result<PathBuf> {
    let target = gz_path(path);
    let mut input = File::open(path)?;
    let mut encoder = GzEncoder::new(File::create(&target)?, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    fs::remove_file(path)?;
    Ok(target)
}

#[async_trait]
impl Sink for RotatingFileSink {
    fn name(&self) -> &str {
        "rotating_file"
    }

    fn level(&self) -> Level {
        self.settings.level
    }

    fn log(&self, record: &LogRecord) -> Result<(), SinkError> {
        let line = self.formatter.format(record);
        self.write_line(&line, record.timestamp.with_timezone(&Local))
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let mut active = self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(current) = active.as_mut() {
            current.file.flush()?;
        }
        Ok(())
    }
}
