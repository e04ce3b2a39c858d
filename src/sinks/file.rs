//! A plain, never-rotating file sink.

use crate::core::{Level, LogRecord, Sink};
use crate::error::SinkError;
use crate::formatting::{RecordFormat, TextFormatter};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

pub struct FileSink {
    level: Level,
    path: PathBuf,
    formatter: Box<dyn TextFormatter>,
    appender: Mutex<RollingFileAppender>,
}

impl FileSink {
    /// Opens (or creates) `dir/filename` for appending. The directory is
    /// created if it does not exist.
    pub fn new(
        dir: &Path,
        filename: &str,
        level: Level,
        format: RecordFormat,
    ) -> Result<Self, SinkError> {
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(filename)
            .build(dir)?;

        Ok(Self {
            level,
            path: dir.join(filename),
            formatter: format.formatter(),
            appender: Mutex::new(appender),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn level(&self) -> Level {
        self.level
    }

    fn log(&self, record: &LogRecord) -> Result<(), SinkError> {
        let line = self.formatter.format(record);
        let mut appender = self.appender.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(appender, "{}", line)?;
        appender.flush()?;
        Ok(())
    }
}
