use std::fmt::Display;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Destination an actuator writes values to.
pub trait Sink<T>: Send {
    fn write(&mut self, value: T) -> io::Result<()>;
}

/// Sysfs-style value file, e.g. an LED `brightness` attribute. Every write
/// replaces the file contents.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> FileSink {
        FileSink { path: path.into() }
    }
}

impl<T: Display + Send> Sink<T> for FileSink {
    fn write(&mut self, value: T) -> io::Result<()> {
        fs::write(&self.path, value.to_string())
    }
}

/// Records every write with its instant; the test double for playback timing
/// assertions. Clones share the same record.
#[derive(Clone)]
pub struct MemorySink<T> {
    writes: Arc<Mutex<Vec<(Instant, T)>>>,
}

impl<T> MemorySink<T> {
    pub fn new() -> MemorySink<T> {
        MemorySink {
            writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn writes(&self) -> Vec<(Instant, T)>
    where
        T: Clone,
    {
        self.writes.lock().expect("Sink record poisoned").clone()
    }

    pub fn last(&self) -> Option<T>
    where
        T: Clone,
    {
        self.writes
            .lock()
            .expect("Sink record poisoned")
            .last()
            .map(|(_, value)| value.clone())
    }
}

impl<T: Send> Sink<T> for MemorySink<T> {
    fn write(&mut self, value: T) -> io::Result<()> {
        self.writes
            .lock()
            .expect("Sink record poisoned")
            .push((Instant::now(), value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_replaces_contents() {
        let path = std::env::temp_dir().join(format!("beacon-sink-{}", std::process::id()));

        let mut sink = FileSink::new(&path);
        Sink::<i32>::write(&mut sink, 1).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1");

        Sink::<i32>::write(&mut sink, 0).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "0");

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();

        writer.write(1).unwrap();
        writer.write(0).unwrap();
        writer.write(1).unwrap();

        let values: Vec<i32> = sink.writes().into_iter().map(|(_, value)| value).collect();
        assert_eq!(values, vec![1, 0, 1]);
        assert_eq!(sink.last(), Some(1));
    }
}
