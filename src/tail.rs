use notify::Watcher;
use std::{
    fs::File,
    io::{self, BufRead, BufReader, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread,
    time::Duration,
};

use crate::error::{Error, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

type Changes = (
    notify::RecommendedWatcher,
    mpsc::Receiver<notify::Result<notify::Event>>,
);

/// Stops a running [`TailLines`]. Cloneable, so any thread can stop the tail.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A growing file read as a sequence of lines, like `tail -f`.
pub struct TailSource {
    path: PathBuf,
    reader: BufReader<File>,
    poll_interval: Duration,
    stop: StopHandle,
}

impl TailSource {
    pub fn open(path: &Path, poll_interval: Duration) -> Result<TailSource> {
        let file = File::open(path).map_err(|source| Error::Tail {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Tailing {}", path.display());
        Ok(TailSource {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            poll_interval,
            stop: StopHandle::default(),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Replays the current content and then follows the file forever, until
    /// stopped or a read fails.
    pub fn lines(self) -> TailLines {
        TailLines {
            path: self.path,
            reader: Some(self.reader),
            position: 0,
            pending: Vec::new(),
            poll_interval: self.poll_interval,
            stop: self.stop,
            changes: None,
            watch_failed: false,
        }
    }
}

/// Lines of a [`TailSource`]. Only complete lines are yielded; a line
/// still being written waits for its terminator.
pub struct TailLines {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    position: u64,
    pending: Vec<u8>,
    poll_interval: Duration,
    stop: StopHandle,
    changes: Option<Changes>,
    watch_failed: bool,
}

impl TailLines {
    fn close(&mut self) {
        self.reader = None;
        self.changes = None;
    }

    fn fail(&mut self, source: io::Error) -> Error {
        self.close();
        Error::Tail {
            path: self.path.clone(),
            source,
        }
    }

    fn rewind_if_truncated(&mut self) -> io::Result<()> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(());
        };
        let len = reader.get_ref().metadata()?.len();
        if len < self.position {
            log::warn!(
                "{} was truncated ({} < {}), reading from the start",
                self.path.display(),
                len,
                self.position
            );
            reader.seek(SeekFrom::Start(0))?;
            self.position = 0;
            self.pending.clear();
        }
        Ok(())
    }

    /// Blocks until the file changes or the poll interval passes.
    fn wait_for_changes(&mut self) {
        if self.changes.is_none() && !self.watch_failed {
            self.changes = watch(&self.path);
            self.watch_failed = self.changes.is_none();
        }

        let disconnected = match &self.changes {
            Some((_watcher, rx)) => match rx.recv_timeout(self.poll_interval) {
                Ok(_) | Err(mpsc::RecvTimeoutError::Timeout) => {
                    while rx.try_recv().is_ok() {}
                    false
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => true,
            },
            None => {
                thread::sleep(self.poll_interval);
                false
            }
        };

        if disconnected {
            log::warn!("File watcher for {} went away, polling only", self.path.display());
            self.changes = None;
            self.watch_failed = true;
        }
    }
}

impl Iterator for TailLines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Result<String>> {
        loop {
            if self.stop.is_stopped() {
                self.close();
                return None;
            }
            let reader = self.reader.as_mut()?;

            match reader.read_until(b'\n', &mut self.pending) {
                Ok(0) => {
                    if let Err(source) = self.rewind_if_truncated() {
                        return Some(Err(self.fail(source)));
                    }
                    self.wait_for_changes();
                }
                Ok(n) => {
                    self.position += n as u64;
                    if self.pending.last() != Some(&b'\n') {
                        // Partial line, the writer is not done with it yet.
                        continue;
                    }
                    let line = take_line(&mut self.pending);
                    if self.stop.is_stopped() {
                        self.close();
                        return None;
                    }
                    return Some(Ok(line));
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(source) => return Some(Err(self.fail(source))),
            }
        }
    }
}

fn take_line(pending: &mut Vec<u8>) -> String {
    let mut end = pending.len();
    if end > 0 && pending[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && pending[end - 1] == b'\r' {
        end -= 1;
    }
    let line = String::from_utf8_lossy(&pending[..end]).into_owned();
    pending.clear();
    line
}

fn watch(path: &Path) -> Option<Changes> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = match notify::recommended_watcher(tx) {
        Ok(watcher) => watcher,
        Err(err) => {
            log::warn!("Could not create file watcher, polling only: {}", err);
            return None;
        }
    };
    if let Err(err) = watcher.watch(path, notify::RecursiveMode::NonRecursive) {
        log::warn!("Could not watch {}, polling only: {}", path.display(), err);
        return None;
    }
    Some((watcher, rx))
}

/// Best-effort check whether another process holds `path` exclusively.
/// A missing file is not in use.
pub fn is_file_in_use(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    held_exclusively(path)
}

#[cfg(unix)]
fn held_exclusively(path: &Path) -> bool {
    use nix::{
        errno::Errno,
        fcntl::{flock, FlockArg},
    };
    use std::os::unix::io::AsRawFd;

    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            log::debug!("Could not open {}: {}", path.display(), err);
            return true;
        }
    };
    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(()) => {
            let _ = flock(file.as_raw_fd(), FlockArg::Unlock);
            false
        }
        Err(errno) => errno == Errno::EWOULDBLOCK,
    }
}

#[cfg(windows)]
fn held_exclusively(path: &Path) -> bool {
    use std::os::windows::fs::OpenOptionsExt;

    std::fs::OpenOptions::new()
        .read(true)
        .share_mode(0)
        .open(path)
        .is_err()
}

#[cfg(not(any(unix, windows)))]
fn held_exclusively(_path: &Path) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs::OpenOptions, io::Write, time::Instant};

    const POLL: Duration = Duration::from_millis(20);

    fn append(path: &Path, data: &str) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(data.as_bytes()).unwrap();
    }

    #[test]
    fn test_replays_existing_lines_then_follows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        std::fs::write(&path, "first\r\nsecond\n\nthird\n").unwrap();

        let mut lines = TailSource::open(&path, POLL).unwrap().lines();
        assert_eq!(lines.next().unwrap().unwrap(), "first");
        assert_eq!(lines.next().unwrap().unwrap(), "second");
        assert_eq!(lines.next().unwrap().unwrap(), "");
        assert_eq!(lines.next().unwrap().unwrap(), "third");

        append(&path, "fourth\n");
        assert_eq!(lines.next().unwrap().unwrap(), "fourth");
    }

    #[test]
    fn test_partial_line_waits_for_terminator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        std::fs::write(&path, "par").unwrap();

        let writer_path = path.clone();
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            append(&writer_path, "tial\nnext");
        });

        let start = Instant::now();
        let mut lines = TailSource::open(&path, POLL).unwrap().lines();
        assert_eq!(lines.next().unwrap().unwrap(), "partial");
        assert!(start.elapsed() >= Duration::from_millis(150));
        writer.join().unwrap();
    }

    #[test]
    fn test_stop_ends_the_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        std::fs::write(&path, "one\n").unwrap();

        let source = TailSource::open(&path, POLL).unwrap();
        let stop = source.stop_handle();
        let (tx, rx) = mpsc::channel();
        let consumer = thread::spawn(move || {
            for line in source.lines() {
                tx.send(line.unwrap()).unwrap();
            }
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "one");
        stop.stop();
        consumer.join().unwrap();

        append(&path, "two\n");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_truncated_file_is_read_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        std::fs::write(&path, "one\ntwo\n").unwrap();

        let mut lines = TailSource::open(&path, POLL).unwrap().lines();
        assert_eq!(lines.next().unwrap().unwrap(), "one");
        assert_eq!(lines.next().unwrap().unwrap(), "two");

        std::fs::write(&path, "x\n").unwrap();
        assert_eq!(lines.next().unwrap().unwrap(), "x");
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.log");
        assert!(matches!(
            TailSource::open(&path, POLL),
            Err(Error::Tail { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_read_error_is_fatal() {
        let dir = tempfile::tempdir().unwrap();

        // Opening a directory works on unix, reading from it does not.
        let mut lines = TailSource::open(dir.path(), POLL).unwrap().lines();
        assert!(matches!(lines.next(), Some(Err(Error::Tail { .. }))));
        assert!(lines.next().is_none());
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_is_file_in_use() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        assert!(!is_file_in_use(&path));

        std::fs::write(&path, "content\n").unwrap();
        assert!(!is_file_in_use(&path));
    }

    #[cfg(unix)]
    #[test]
    fn test_locked_file_is_in_use() {
        use nix::fcntl::{flock, FlockArg};
        use std::os::unix::io::AsRawFd;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        std::fs::write(&path, "content\n").unwrap();

        let holder = File::open(&path).unwrap();
        flock(holder.as_raw_fd(), FlockArg::LockExclusiveNonblock).unwrap();
        assert!(is_file_in_use(&path));

        drop(holder);
        assert!(!is_file_in_use(&path));
    }
}
