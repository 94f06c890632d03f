use std::path::PathBuf;

use thiserror::Error;

/// A template definition that can not be turned into a matcher.
///
/// These are configuration errors: they are reported while loading the
/// template set, before any line is parsed, and the set must not be used.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("template is missing 'id'")]
    MissingId,

    #[error("template '{0}' defines both 'template' and 'starts-with'/'ends-with'")]
    BothForms(String),

    #[error("template '{0}' defines neither 'template' nor 'starts-with'/'ends-with'")]
    NoForm(String),

    #[error("template '{id}' defines '{present}' without '{missing}'")]
    UnpairedMarker {
        id: String,
        present: &'static str,
        missing: &'static str,
    },

    #[error("template '{id}': '{marker}' must begin with literal text")]
    MarkerWithoutLiteral { id: String, marker: &'static str },

    #[error("template '{id}' uses placeholder '{name}' more than once")]
    DuplicatePlaceholder { id: String, name: String },

    #[error("duplicate template id '{0}'")]
    DuplicateId(String),

    #[error("template '{id}' does not compile: {source}")]
    Pattern {
        id: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("could not read {path}: {source}")]
    Settings {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("error tailing {path:?}: {source}")]
    Tail {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
