use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Receives every line no template recognized. Kept around so new templates
/// can be written against real input.
pub trait OverflowSink {
    fn record(&mut self, line: &str) -> io::Result<()>;
}

/// Overflow written to a file, one line per unrecognized line. The file is
/// truncated when the sink is created.
#[derive(Debug)]
pub struct FileOverflow {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileOverflow {
    pub fn create(path: &Path) -> io::Result<FileOverflow> {
        let file = File::create(path)?;
        log::debug!("Writing unrecognized lines to {}", path.display());
        Ok(FileOverflow {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OverflowSink for FileOverflow {
    fn record(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryOverflow {
    pub lines: Vec<String>,
}

impl MemoryOverflow {
    pub fn new() -> MemoryOverflow {
        MemoryOverflow { lines: Vec::new() }
    }
}

impl OverflowSink for MemoryOverflow {
    fn record(&mut self, line: &str) -> io::Result<()> {
        self.lines.push(line.to_string());
        Ok(())
    }
}

impl<T: OverflowSink + ?Sized> OverflowSink for Box<T> {
    fn record(&mut self, line: &str) -> io::Result<()> {
        (**self).record(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_overflow_truncates_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unmatched.log");
        std::fs::write(&path, "stale content\n").unwrap();

        let mut sink = FileOverflow::create(&path).unwrap();
        sink.record("first").unwrap();
        sink.record("  second [Tag]").unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(content, "first\n  second [Tag]\n");
    }
}
