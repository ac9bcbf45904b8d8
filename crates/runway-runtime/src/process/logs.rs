//! Captured process output.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use runway_core::ports::OutputLine;
use tokio::sync::broadcast;

use super::ProcessEvent;

/// Maximum number of output lines kept per process.
pub const MAX_LOG_LINES: usize = 5000;

/// Ring buffer of recent output lines.
#[derive(Debug)]
pub struct LogBuffer {
    lines: Mutex<VecDeque<OutputLine>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOG_LINES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    /// Add a line, dropping the oldest when full.
    pub fn push(&self, line: OutputLine) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// All buffered lines, oldest first.
    pub fn snapshot(&self) -> Vec<OutputLine> {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Where stream readers deliver lines: the ring buffer plus subscribers.
#[derive(Debug, Clone)]
pub(crate) struct OutputSink {
    pub(crate) buffer: std::sync::Arc<LogBuffer>,
    pub(crate) events: broadcast::Sender<ProcessEvent>,
}

impl OutputSink {
    pub(crate) fn publish(&self, line: OutputLine) {
        self.buffer.push(line.clone());
        // No receivers is fine
        let _ = self.events.send(ProcessEvent::Line(line));
    }
}

#[cfg(test)]
mod tests {
    use runway_core::ports::OutputStream;

    use super::*;

    #[test]
    fn ring_buffer_drops_oldest() {
        let buffer = LogBuffer::with_capacity(3);
        for i in 0..5 {
            buffer.push(OutputLine::now(OutputStream::Stdout, format!("line {i}")));
        }
        let lines: Vec<String> = buffer.snapshot().into_iter().map(|l| l.line).collect();
        assert_eq!(lines, vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn sink_buffers_and_broadcasts() {
        let (events, mut rx) = broadcast::channel(8);
        let sink = OutputSink {
            buffer: std::sync::Arc::new(LogBuffer::new()),
            events,
        };
        sink.publish(OutputLine::now(OutputStream::Stderr, "boom"));

        assert_eq!(sink.buffer.len(), 1);
        match rx.try_recv().unwrap() {
            ProcessEvent::Line(line) => {
                assert_eq!(line.line, "boom");
                assert_eq!(line.stream, OutputStream::Stderr);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
