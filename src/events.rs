use crate::entry::LogEntry;

pub enum ReaderEvent {
    // From the parser, in arrival order
    EntryCompleted(LogEntry),

    // From the idle debouncer, once per quiet period
    Idle,
}
