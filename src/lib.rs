//! tailscribe - follows a growing log file and recognizes its events
//!
//! Templates with `{name}` placeholders are compiled into anchored patterns,
//! lines are fed through a parser that understands single-line and
//! multi-line events, and an idle signal tells when the writer went quiet.

pub mod args;
pub mod debounce;
pub mod entry;
pub mod error;
pub mod events;
pub mod overflow;
pub mod parser;
pub mod reader;
pub mod settings;
pub mod summary;
pub mod tail;
pub mod template;
pub mod template_set;

// Re-export commonly used types for convenience
pub use entry::LogEntry;
pub use error::{Error, ValidationError};
pub use events::ReaderEvent;
pub use parser::ParserStateMachine;
pub use reader::{LogReader, ReaderOptions};
pub use template::{CompiledTemplate, TemplateDefinition};
pub use template_set::TemplateSet;
