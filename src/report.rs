use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Local};
use parking_lot::Mutex;

use crate::errors::AppError;
use crate::model::MetadataRecord;
use crate::platform::path_bytes;

const SEPARATOR: &str = "-------------------";

/// Serialises records to the report. Each record is formatted up front and
/// written under the lock as one block, then flushed.
pub struct ReportSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ReportSink {
    pub fn create(path: &Path) -> Result<Self, AppError> {
        let file = File::create(path).map_err(|source| AppError::OpenOutput {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }

    pub fn write_record(&self, record: &MetadataRecord) -> io::Result<()> {
        let block = format_record(record);
        let mut out = self.out.lock();
        out.write_all(&block)?;
        out.flush()
    }

    pub fn flush(&self) -> io::Result<()> {
        self.out.lock().flush()
    }
}

pub fn format_record(record: &MetadataRecord) -> Vec<u8> {
    let modified: DateTime<Local> = record.modified.into();
    let path = path_bytes(&record.path);
    let mut block = Vec::with_capacity(160 + path.len());
    block.extend_from_slice(b"Path: ");
    block.extend_from_slice(&path);
    block.push(b'\n');
    // Writing into a Vec cannot fail.
    let _ = writeln!(block, "Size: {} bytes", record.size);
    let _ = writeln!(block, "Type: {}", record.kind);
    let _ = writeln!(block, "Permissions: {:o}", record.permissions);
    let _ = writeln!(
        block,
        "Last Modified: {}",
        modified.format("%a %b %e %H:%M:%S %Y")
    );
    let _ = writeln!(block, "{SEPARATOR}");
    block
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::thread;
    use std::time::SystemTime;

    use super::*;
    use crate::model::FsEntryKind;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record(path: &str, size: u64) -> MetadataRecord {
        MetadataRecord {
            path: PathBuf::from(path),
            size,
            kind: FsEntryKind::File,
            permissions: 0o644,
            modified: SystemTime::now(),
        }
    }

    #[test]
    fn formats_block_in_fixed_shape() {
        let block = String::from_utf8(format_record(&record("/data/a.txt", 10))).expect("utf8");
        let lines: Vec<&str> = block.lines().collect();

        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "Path: /data/a.txt");
        assert_eq!(lines[1], "Size: 10 bytes");
        assert_eq!(lines[2], "Type: Regular File");
        assert_eq!(lines[3], "Permissions: 644");
        assert!(lines[4].starts_with("Last Modified: "));
        assert_eq!(lines[5], SEPARATOR);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_path_is_written_verbatim() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let mut entry = record("/", 1);
        entry.path = PathBuf::from(OsStr::from_bytes(b"/data/caf\xe9.txt"));

        let block = format_record(&entry);
        assert!(block.starts_with(b"Path: /data/caf\xe9.txt\n"));
    }

    #[test]
    fn concurrent_writers_never_split_a_block() {
        let buf = SharedBuf::default();
        let sink = Arc::new(ReportSink::from_writer(buf.clone()));

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for i in 0..50 {
                        let path = format!("/w{worker}/f{i}");
                        sink.write_record(&record(&path, i)).expect("write");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }

        let text = String::from_utf8(buf.0.lock().clone()).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 200 * 6);
        for block in lines.chunks(6) {
            assert!(block[0].starts_with("Path: /w"));
            assert!(block[1].starts_with("Size: "));
            assert_eq!(block[5], SEPARATOR);
        }
    }
}
