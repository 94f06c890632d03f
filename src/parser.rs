use chrono::prelude::*;
use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    entry::LogEntry, error::Result, overflow::OverflowSink, template_set::TemplateSet,
};

/// `<2024-01-01T00:00:00.000Z>`: the brackets plus 24 characters of RFC 3339.
pub const TIMESTAMP_WIDTH: usize = 26;

lazy_static! {
    static ref TAG_RUN_RE: Regex = Regex::new(r"(?:\[[^\[\]]+\])+$").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"\[([^\[\]]+)\]").unwrap();
}

#[derive(Debug)]
struct OpenBlock {
    entry: LogEntry,
    // As received, so an abandoned block can go to overflow untouched.
    raw_lines: Vec<String>,
}

/// Turns lines into entries, one line at a time and in arrival order.
///
/// At most one multi-line block is open at any time. The parser is not
/// synchronized: feed it from a single thread, and use one parser per
/// source.
pub struct ParserStateMachine<S: OverflowSink> {
    templates: TemplateSet,
    open: Option<OpenBlock>,
    overflow: S,
}

impl<S: OverflowSink> ParserStateMachine<S> {
    pub fn new(templates: TemplateSet, overflow: S) -> ParserStateMachine<S> {
        ParserStateMachine {
            templates,
            open: None,
            overflow,
        }
    }

    pub fn overflow(&self) -> &S {
        &self.overflow
    }

    pub fn into_overflow(self) -> S {
        self.overflow
    }

    pub fn is_idle(&self) -> bool {
        self.open.is_none()
    }

    pub fn open_entry(&self) -> Option<&LogEntry> {
        self.open.as_ref().map(|block| &block.entry)
    }

    /// Feeds one raw line. Returns the entry this line completed, if any.
    ///
    /// The only error is a failure to write to the overflow sink.
    pub fn handle_line(&mut self, line: &str) -> Result<Option<LogEntry>> {
        let (timestamp, message) = split_timestamp(line);

        if let Some(block) = self.open.take() {
            return self.continue_block(block, line, timestamp, message);
        }

        if message.is_empty() {
            return Ok(None);
        }

        for template in self.templates.iter() {
            if !template.pre_match(message) {
                continue;
            }

            let Some(timestamp) = timestamp else {
                log::debug!(
                    "Discarding line without timestamp for template '{}': {}",
                    template.id(),
                    line
                );
                return Ok(None);
            };

            let (text, tags) = extract_tags(message);

            if template.is_multiline() && template.matches_start(message) {
                let mut entry = LogEntry::new(timestamp, template.clone());
                entry.tags = tags;
                entry.lines.push(text.to_string());
                self.open = Some(OpenBlock {
                    entry,
                    raw_lines: vec![line.to_string()],
                });
                return Ok(None);
            }

            match template.try_match(text) {
                Some(fields) => {
                    let mut entry = LogEntry::new(timestamp, template.clone());
                    entry.tags = tags;
                    entry.lines.push(text.to_string());
                    entry.fields = fields;
                    return Ok(Some(entry));
                }
                None => {
                    log::trace!("Template '{}' pre-matched but did not match", template.id());
                }
            }
        }

        self.overflow.record(line)?;
        Ok(None)
    }

    fn continue_block(
        &mut self,
        mut block: OpenBlock,
        line: &str,
        timestamp: Option<DateTime<Utc>>,
        message: &str,
    ) -> Result<Option<LogEntry>> {
        let template = block.entry.template.clone();

        if template.matches_end(message) {
            let (text, tags) = extract_tags(message);
            let mut entry = block.entry;
            entry.tags.extend(tags);
            entry.lines.push(text.to_string());
            match template.try_match(&entry.joined()) {
                Some(fields) => entry.fields = fields,
                None => log::debug!(
                    "Block for template '{}' closed without matching its pattern",
                    template.id()
                ),
            }
            return Ok(Some(entry));
        }

        if let Some(timestamp) = timestamp {
            if template.matches_start(message) {
                log::warn!(
                    "Template '{}' started a new block before the previous one ended; {} lines moved to overflow",
                    template.id(),
                    block.raw_lines.len()
                );
                for raw in &block.raw_lines {
                    self.overflow.record(raw)?;
                }
                let (text, tags) = extract_tags(message);
                let mut entry = LogEntry::new(timestamp, template);
                entry.tags = tags;
                entry.lines.push(text.to_string());
                self.open = Some(OpenBlock {
                    entry,
                    raw_lines: vec![line.to_string()],
                });
                return Ok(None);
            }
        }

        block.entry.lines.push(line.to_string());
        block.raw_lines.push(line.to_string());
        self.open = Some(block);
        Ok(None)
    }

    /// Gives up on the open block, if any, writing its lines to the overflow
    /// sink. Returns how many lines were moved.
    pub fn abandon_open_entry(&mut self) -> Result<usize> {
        let Some(block) = self.open.take() else {
            return Ok(0);
        };
        log::warn!(
            "Abandoning unfinished block for template '{}' ({} lines)",
            block.entry.template.id(),
            block.raw_lines.len()
        );
        for raw in &block.raw_lines {
            self.overflow.record(raw)?;
        }
        Ok(block.raw_lines.len())
    }
}

/// Splits the leading `<timestamp>` from a line. Lines without one, or with
/// one that does not parse, keep the whole trimmed line as message.
pub fn split_timestamp(line: &str) -> (Option<DateTime<Utc>>, &str) {
    let bytes = line.as_bytes();
    if bytes.len() >= TIMESTAMP_WIDTH
        && bytes[0] == b'<'
        && bytes[TIMESTAMP_WIDTH - 1] == b'>'
    {
        let parsed = line
            .get(1..TIMESTAMP_WIDTH - 1)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok());
        if let Some(timestamp) = parsed {
            return (
                Some(timestamp.with_timezone(&Utc)),
                line[TIMESTAMP_WIDTH..].trim(),
            );
        }
    }
    (None, line.trim())
}

/// Removes a trailing run of `[Tag]` tokens from a message, returning the
/// remaining text and the tags in order.
pub fn extract_tags(message: &str) -> (&str, Vec<String>) {
    match TAG_RUN_RE.find(message) {
        Some(run) => {
            let tags = TAG_RE
                .captures_iter(run.as_str())
                .filter_map(|caps| caps.get(1))
                .map(|tag| tag.as_str().to_string())
                .collect();
            (message[..run.start()].trim_end(), tags)
        }
        None => (message, vec![]),
    }
}
