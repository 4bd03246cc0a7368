//! The output sink: an abstract byte writer the winner writes its
//! reconstructed secret to. Concrete sinks (file, network, buffer) are
//! collaborators, not part of the core.

use std::fs::File;
use std::io::{self, Write};
use std::sync::Mutex;

/// Anything that can receive the winner's single write.
pub trait OutputSink: Send + Sync {
    fn write_secret(&self, bytes: &[u8]) -> io::Result<()>;
}

/// Writes to a file at a fixed path, truncating any prior contents.
pub struct FileSink {
    path: String,
}

impl FileSink {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl OutputSink for FileSink {
    fn write_secret(&self, bytes: &[u8]) -> io::Result<()> {
        let mut file = File::create(&self.path)?;
        file.write_all(bytes)
    }
}

/// An in-memory sink for tests: records every write it receives (there
/// should only ever be one, but recording all of them lets tests assert
/// the exactly-once-winner property directly).
#[derive(Default)]
pub struct MemorySink {
    writes: Mutex<Vec<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().expect("memory sink mutex poisoned").clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().expect("memory sink mutex poisoned").len()
    }
}

impl OutputSink for MemorySink {
    fn write_secret(&self, bytes: &[u8]) -> io::Result<()> {
        self.writes
            .lock()
            .expect("memory sink mutex poisoned")
            .push(bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records_every_write() {
        let sink = MemorySink::new();
        sink.write_secret(b"hello world.").unwrap();
        assert_eq!(sink.write_count(), 1);
        assert_eq!(sink.writes()[0], b"hello world.");
    }
}
