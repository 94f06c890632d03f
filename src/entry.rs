use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc};

use crate::template::CompiledTemplate;

/// A recognized log event. Single-line entries are complete when created;
/// multi-line entries keep collecting lines until their end marker arrives.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub lines: Vec<String>,
    pub tags: Vec<String>,
    pub template: Arc<CompiledTemplate>,
    pub fields: HashMap<String, String>,
}

impl LogEntry {
    pub fn new(timestamp: DateTime<Utc>, template: Arc<CompiledTemplate>) -> LogEntry {
        LogEntry {
            timestamp,
            lines: Vec::new(),
            tags: Vec::new(),
            template,
            fields: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.fields.get(key)
    }

    pub fn label(&self) -> Option<&str> {
        self.template.label()
    }

    /// The accumulated lines as the block the template is matched against.
    pub fn joined(&self) -> String {
        self.lines.join("\n")
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}
