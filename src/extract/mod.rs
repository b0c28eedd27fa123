//! Bundle schema extraction: rebuilds the proto2 schema hidden in the
//! initialization code of a bundled web client script.
//!
//! ## Architecture
//!
//! ```text
//! extract/
//! ├── mod.rs         - Entry point, pipeline
//! ├── common.rs      - Node text, traversal and literal helpers
//! ├── ast.rs         - Closed views over the recognized node shapes
//! ├── metadata.rs    - VERSION / BUILD_ID scan
//! ├── locator.rs     - Finds the spec functions in the module table
//! ├── demangle.rs    - `Outer$InnerSpec` -> Outer.Inner (message)
//! ├── policy.rs      - Reservation vs. assignment groups
//! ├── builder.rs     - Schema tree construction, statement dispatch
//! ├── interpret.rs   - Field sets, flags, references, defaults, enum literals
//! └── writer.rs      - Canonical proto2 output
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use proto_pack_lib::{extract, ExtractOptions};
//!
//! let extraction = extract(&bundle_source, &ExtractOptions::default())?;
//! std::fs::write("whatsapp.proto", &extraction.proto)?;
//! ```

pub mod ast;
pub mod builder;
pub mod common;
pub mod demangle;
pub mod error;
pub mod interpret;
pub mod locator;
pub mod metadata;
pub mod policy;
pub mod schema;
pub mod writer;

use tracing::{info, warn};
use tree_sitter::{Language, Parser};

pub use builder::{ExtractStats, SchemaBuilder};
pub use error::{ExtractError, ExtractResult};
pub use metadata::BundleMetadata;
pub use schema::SchemaRoot;

// ============ Options ============

pub const DEFAULT_PACKAGE: &str = "whatsapp";

/// Knobs for one extraction run
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Name written in the `package` header line
    pub package: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            package: DEFAULT_PACKAGE.to_string(),
        }
    }
}

// ============ Result Type ============

/// Everything one run produces
#[derive(Debug)]
pub struct Extraction {
    pub proto: String,
    pub schema: SchemaRoot,
    pub metadata: BundleMetadata,
    pub stats: ExtractStats,
}

// ============ Main Entry Point ============

/// Run the whole pipeline over the bundle source. Nothing is rendered unless
/// every spec function was processed without a fatal fault.
pub fn extract(content: &str, options: &ExtractOptions) -> ExtractResult<Extraction> {
    let metadata = BundleMetadata::scan(content);
    match &metadata.version {
        Some(version) => info!(version = %version, "found version"),
        None => warn!("bundle has no VERSION marker"),
    }
    match &metadata.build {
        Some(build) => info!(build = %build, "found build"),
        None => warn!("bundle has no BUILD_ID marker"),
    }

    let mut parser = Parser::new();
    let language: Language = tree_sitter_javascript::LANGUAGE.into();
    parser.set_language(&language)?;

    let tree = parser
        .parse(content, None)
        .ok_or_else(|| ExtractError::Parse("parser returned no tree".to_string()))?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(ExtractError::Parse(format!(
            "syntax error near line {}",
            first_error_line(root).unwrap_or(0)
        )));
    }

    let source = content.as_bytes();
    let specs = locator::locate_spec_functions(root, source)?;

    let mut builder = SchemaBuilder::new();
    for spec in &specs {
        builder.process(spec, source)?;
    }
    let (schema, stats) = builder.finish()?;

    info!(
        spec_functions = stats.spec_functions,
        messages = stats.messages,
        enums = stats.enums,
        properties = stats.properties,
        "total metrics"
    );

    let proto = writer::write_proto(&schema, &options.package);
    Ok(Extraction {
        proto,
        schema,
        metadata,
        stats,
    })
}

/// One-based line of the first error or missing node
fn first_error_line(node: tree_sitter::Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(common::line_of(node));
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error_line)
}
