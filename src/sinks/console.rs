//! A sink that writes rendered records to the terminal.

use crate::core::{Level, LogRecord, Sink};
use crate::error::SinkError;
use crate::formatting::{RecordFormat, TextFormatter};
use async_trait::async_trait;
use std::io::{self, Write};
use std::sync::Mutex;

pub struct ConsoleSink {
    level: Level,
    handle_exceptions: bool,
    formatter: Box<dyn TextFormatter>,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    /// Creates a sink writing to stdout.
    pub fn new(level: Level, handle_exceptions: bool, format: RecordFormat) -> Self {
        Self::with_writer(level, handle_exceptions, format, Box::new(io::stdout()))
    }

    pub fn with_writer(
        level: Level,
        handle_exceptions: bool,
        format: RecordFormat,
        writer: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            level,
            handle_exceptions,
            formatter: format.formatter(),
            writer: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn level(&self) -> Level {
        self.level
    }

    fn handles_exceptions(&self) -> bool {
        self.handle_exceptions
    }

    fn log(&self, record: &LogRecord) -> Result<(), SinkError> {
        let line = self.formatter.format(record);
        let mut writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let mut writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writer.flush()?;
        Ok(())
    }
}
