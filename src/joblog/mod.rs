//! Per-job log file.
//!
//! One log per (parameter row, pipeline). Lines are
//! `{timestamp} [{LEVEL}] {message}`; generated scripts are written as
//! delimited blocks, and external process output is appended verbatim via
//! [`JobLog::process_sink`]. The file is opened in append mode so repeated
//! runs accumulate history.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, SecondsFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

pub struct JobLog {
    path: PathBuf,
    file: File,
}

impl JobLog {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        self.line(Level::Info, message.as_ref());
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        self.line(Level::Warn, message.as_ref());
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.line(Level::Error, message.as_ref());
    }

    /// Write a titled block, e.g. a generated script.
    pub fn block(&mut self, title: &str, body: &str) {
        self.info(format!("{title}:"));
        let mut text = String::with_capacity(body.len() + 64);
        text.push_str("----- begin -----\n");
        text.push_str(body);
        if !body.ends_with('\n') {
            text.push('\n');
        }
        text.push_str("----- end -----\n");
        self.write_raw(&text);
    }

    /// Handle for redirecting a child's stdout/stderr into this log.
    pub fn process_sink(&mut self) -> io::Result<File> {
        self.file.flush()?;
        self.file.try_clone()
    }

    fn line(&mut self, level: Level, message: &str) {
        let stamp = Local::now().to_rfc3339_opts(SecondsFormat::Millis, false);
        self.write_raw(&format!("{stamp} [{}] {message}\n", level.tag()));
    }

    // A log that cannot be written must not fail the job; the failure is
    // surfaced through tracing instead.
    fn write_raw(&mut self, text: &str) {
        if let Err(err) = self.file.write_all(text.as_bytes()) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to write job log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn lines_carry_timestamp_and_level() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("logs/job.synth.log");
        let mut log = JobLog::open(&path).unwrap();
        log.info("starting");
        log.warn("careful");
        log.error("boom");
        drop(log);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("[INFO] starting"));
        assert!(lines[1].ends_with("[WARN] careful"));
        assert!(lines[2].ends_with("[ERROR] boom"));
        let stamp = lines[0].split(' ').next().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[test]
    fn appends_across_opens() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.log");
        JobLog::open(&path).unwrap().info("first");
        JobLog::open(&path).unwrap().info("second");
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("first"));
        assert!(text.contains("second"));
    }

    #[test]
    fn blocks_and_sink_are_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("b.log");
        let mut log = JobLog::open(&path).unwrap();
        log.block("babsma script", "'LAMBDA_MIN:'   '6000.000'");
        {
            let mut sink = log.process_sink().unwrap();
            sink.write_all(b"raw child output\n").unwrap();
        }
        log.info("done");
        drop(log);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("[INFO] babsma script:\n----- begin -----\n'LAMBDA_MIN:'   '6000.000'\n----- end -----\n"));
        assert!(text.contains("\nraw child output\n"));
        assert!(text.trim_end().ends_with("[INFO] done"));
    }
}
