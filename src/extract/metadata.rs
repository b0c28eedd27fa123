//! Build metadata scraped from the raw bundle text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"VERSION="(?<version>\d*\.\d*\.\d*)""#).expect("version pattern is valid"));

static BUILD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"BUILD_ID="(?<build>\d*)""#).expect("build pattern is valid"));

/// Informational values found in the bundle; not part of the schema
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BundleMetadata {
    pub version: Option<String>,
    pub build: Option<String>,
}

impl BundleMetadata {
    pub fn scan(content: &str) -> Self {
        let capture = |pattern: &Regex, group: &str| {
            pattern
                .captures(content)
                .and_then(|captures| captures.name(group))
                .map(|found| found.as_str().to_string())
        };
        Self {
            version: capture(&VERSION_PATTERN, "version"),
            build: capture(&BUILD_PATTERN, "build"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_finds_version_and_build() {
        let content = r#"e.VERSION="2.3000.1015901307",e.BUILD_ID="1015901307";"#;
        let metadata = BundleMetadata::scan(content);
        assert_eq!(metadata.version.as_deref(), Some("2.3000.1015901307"));
        assert_eq!(metadata.build.as_deref(), Some("1015901307"));
    }

    #[test]
    fn test_scan_without_markers() {
        assert_eq!(BundleMetadata::scan("nothing here"), BundleMetadata::default());
    }
}
