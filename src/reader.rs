use std::{
    io,
    path::{Path, PathBuf},
    sync::mpsc,
    thread,
    time::Duration,
};

use crate::{
    debounce::{IdleDebouncer, DEFAULT_IDLE_DELAY},
    error::{Error, Result},
    events::ReaderEvent,
    overflow::OverflowSink,
    parser::ParserStateMachine,
    tail::{StopHandle, TailSource, DEFAULT_POLL_INTERVAL},
    template_set::TemplateSet,
};

#[derive(Debug, Clone, Copy)]
pub struct ReaderOptions {
    pub poll_interval: Duration,
    pub idle_delay: Duration,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            poll_interval: DEFAULT_POLL_INTERVAL,
            idle_delay: DEFAULT_IDLE_DELAY,
        }
    }
}

/// Drives a parser with lines and publishes what happens on `tx`. Every line
/// and every completed entry counts as activity for the idle signal.
///
/// Lines can come from a [`TailSource`] (see [`LogReader`]) or be fed by
/// hand.
pub struct LineHandler<S: OverflowSink> {
    parser: ParserStateMachine<S>,
    debouncer: IdleDebouncer,
    tx: mpsc::Sender<ReaderEvent>,
    entries: usize,
}

impl<S: OverflowSink> LineHandler<S> {
    pub fn new(
        parser: ParserStateMachine<S>,
        idle_delay: Duration,
        tx: mpsc::Sender<ReaderEvent>,
    ) -> LineHandler<S> {
        let idle_tx = tx.clone();
        let debouncer = IdleDebouncer::new(idle_delay, move || {
            // Nobody listening any more is not an error for the timer.
            let _ = idle_tx.send(ReaderEvent::Idle);
        });
        LineHandler {
            parser,
            debouncer,
            tx,
            entries: 0,
        }
    }

    pub fn feed_line(&mut self, line: &str) -> Result<()> {
        self.debouncer.touch();
        if let Some(entry) = self.parser.handle_line(line)? {
            self.entries += 1;
            log::trace!(
                "Entry {} from template '{}'",
                self.entries,
                entry.template.id()
            );
            if self.tx.send(ReaderEvent::EntryCompleted(entry)).is_err() {
                log::debug!("Entry receiver is gone, dropping entry");
            }
            self.debouncer.touch();
        }
        Ok(())
    }

    pub fn entries_emitted(&self) -> usize {
        self.entries
    }

    pub fn parser(&self) -> &ParserStateMachine<S> {
        &self.parser
    }

    /// Feeds every line and finishes. A failing line source ends the session,
    /// but the unfinished block still goes to overflow before the error is
    /// returned.
    pub fn run<I>(mut self, lines: I) -> Result<S>
    where
        I: IntoIterator<Item = Result<String>>,
    {
        for line in lines {
            let failure = match line.and_then(|line| self.feed_line(&line)) {
                Ok(()) => continue,
                Err(err) => err,
            };
            log::debug!("Reader failed after {} entries: {}", self.entries, failure);
            if let Err(err) = self.finish() {
                log::error!("Could not move the unfinished block to overflow: {}", err);
            }
            return Err(failure);
        }
        log::debug!("Reader stopped after {} entries", self.entries);
        self.finish()
    }

    /// Stops the idle timer and moves any unfinished block to overflow.
    pub fn finish(mut self) -> Result<S> {
        self.debouncer.stop();
        self.parser.abandon_open_entry()?;
        Ok(self.parser.into_overflow())
    }
}

/// Tails one file on its own thread and parses every line.
///
/// Dropping the reader stops it; use [`LogReader::stop`] to get the result
/// of the session.
pub struct LogReader {
    path: PathBuf,
    stop: StopHandle,
    worker: Option<thread::JoinHandle<Result<()>>>,
}

impl LogReader {
    pub fn start<S>(
        path: &Path,
        templates: TemplateSet,
        overflow: S,
        options: ReaderOptions,
        tx: mpsc::Sender<ReaderEvent>,
    ) -> Result<LogReader>
    where
        S: OverflowSink + Send + 'static,
    {
        let source = TailSource::open(path, options.poll_interval)?;
        let stop = source.stop_handle();
        let parser = ParserStateMachine::new(templates, overflow);

        let worker = thread::Builder::new()
            .name("tail-reader".into())
            .spawn(move || {
                let handler = LineHandler::new(parser, options.idle_delay, tx);
                handler.run(source.lines()).map(|_| ())
            })?;

        log::info!("Reading {}", path.display());
        Ok(LogReader {
            path: path.to_path_buf(),
            stop,
            worker: Some(worker),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stops tailing and waits for the reader thread. No event is sent after
    /// this returns.
    pub fn stop(mut self) -> Result<()> {
        self.stop.stop();
        self.join()
    }

    /// Waits for the session to end on its own, which only happens on a read
    /// error.
    pub fn wait(mut self) -> Result<()> {
        self.join()
    }

    fn join(&mut self) -> Result<()> {
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .unwrap_or_else(|_| Err(Error::Io(io::Error::other("reader thread panicked")))),
            None => Ok(()),
        }
    }
}

impl Drop for LogReader {
    fn drop(&mut self) {
        self.stop.stop();
        if let Err(err) = self.join() {
            log::error!("Reader for {} failed: {}", self.path.display(), err);
        }
    }
}
