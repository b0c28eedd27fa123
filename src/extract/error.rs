//! Error types for bundle schema extraction.
//!
//! Every variant except `Io` is raised while walking the bundle and aborts the
//! whole run; ignorable constructs never reach this type, they are only logged.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal faults raised while turning a bundle into a schema.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The JavaScript grammar could not be loaded into the parser.
    #[error("failed to load javascript grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    /// The parser gave up, or the tree contains syntax errors.
    #[error("failed to parse bundle: {0}")]
    Parse(String),

    /// A syntax node does not have one of the recognized shapes.
    #[error("unexpected shape in {context}: expected {expected}, found {found}")]
    StructuralMismatch {
        context: String,
        expected: &'static str,
        found: String,
    },

    /// A local binding or schema path was referenced but never declared.
    #[error("unresolved reference \"{name}\" in {context}")]
    UnresolvedReference { context: String, name: String },

    /// A deferred operation targets a message or field that does not exist.
    #[error("{what} \"{name}\" not declared ({context})")]
    MissingDeclaration {
        context: String,
        what: &'static str,
        name: String,
    },

    /// A message and an enum share one name at the same level.
    #[error("\"{name}\" is declared as both a message and an enum in scope \"{scope}\"")]
    NameCollision { scope: String, name: String },

    /// Reading the bundle or writing an output file failed.
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    /// Creates a structural mismatch error.
    pub fn mismatch(context: impl Into<String>, expected: &'static str, found: impl Into<String>) -> Self {
        Self::StructuralMismatch {
            context: context.into(),
            expected,
            found: found.into(),
        }
    }

    /// Creates an unresolved reference error.
    pub fn unresolved(context: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            context: context.into(),
            name: name.into(),
        }
    }

    /// Creates a missing declaration error.
    pub fn missing(context: impl Into<String>, what: &'static str, name: impl Into<String>) -> Self {
        Self::MissingDeclaration {
            context: context.into(),
            what,
            name: name.into(),
        }
    }
}

pub type ExtractResult<T> = Result<T, ExtractError>;
