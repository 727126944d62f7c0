//! In-memory sink for `tracing` output, shown in the "Log" panel.

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex},
};

use tracing_subscriber::fmt::MakeWriter;

/// Keeps the last `capacity` formatted log lines.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// The newest `count` lines, oldest first.
    pub fn tail(&self, count: usize) -> Vec<String> {
        let Ok(lines) = self.lines.lock() else {
            return Vec::new();
        };
        let skip = lines.len().saturating_sub(count);
        lines.iter().skip(skip).cloned().collect()
    }

    fn push(&self, text: &str) {
        let Ok(mut lines) = self.lines.lock() else {
            return;
        };
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            if lines.len() == self.capacity {
                lines.pop_front();
            }
            lines.push_back(line.to_owned());
        }
    }
}

/// Collects one event's bytes and commits them when dropped.
pub struct LogWriter {
    buffer: LogBuffer,
    pending: Vec<u8>,
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            self.buffer.push(&String::from_utf8_lossy(&self.pending));
        }
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            buffer: self.clone(),
            pending: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn keeps_only_the_newest_lines() {
        let buffer = LogBuffer::new(2);
        for text in ["one\n", "two\n", "three\n"] {
            let mut writer = buffer.make_writer();
            writer.write_all(text.as_bytes()).unwrap();
        }
        assert_eq!(buffer.tail(5), vec!["two".to_string(), "three".to_string()]);
        assert_eq!(buffer.tail(1), vec!["three".to_string()]);
    }

    #[test]
    fn partial_writes_form_one_line() {
        let buffer = LogBuffer::new(4);
        {
            let mut writer = buffer.make_writer();
            writer.write_all(b"Player picked ").unwrap();
            writer.write_all(b"B0A1-3\n").unwrap();
            assert!(buffer.tail(1).is_empty());
        }
        assert_eq!(buffer.tail(1), vec!["Player picked B0A1-3".to_string()]);
    }
}
