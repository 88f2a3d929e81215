//! Reading and writing object manifests.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Decode an object from YAML text.
///
/// # Errors
///
/// Returns `Error::YamlParseFailed` when the text is not a valid manifest.
pub fn from_yaml<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_yaml::from_str(text).map_err(|e| Error::yaml_parse_failed(e.to_string()))
}

/// Decode an object from JSON text.
///
/// # Errors
///
/// Returns `Error::JsonParseFailed` when the text is not a valid manifest.
pub fn from_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| Error::json_parse_failed(e.to_string()))
}

/// Read and decode a manifest file. `.json` files are read as JSON,
/// everything else as YAML.
///
/// # Errors
///
/// Returns `Error::FileReadFailed` when the file cannot be read, or a parse
/// error when its contents are invalid.
pub fn from_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        std::fs::read_to_string(path).map_err(|e| Error::file_read_failed(path, e.to_string()))?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => from_json(&text),
        _ => from_yaml(&text),
    }
}

/// Encode an object as YAML.
///
/// # Errors
///
/// Returns `Error::EncodeFailed` if the value cannot be represented.
pub fn to_yaml<T: Serialize>(value: &T) -> Result<String> {
    serde_yaml::to_string(value).map_err(|e| Error::encode_failed("yaml", e.to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::package::{InstalledPkg, PackageRef};
    use std::io::Write;

    #[test]
    fn test_from_file_reads_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "metadata:\n  name: web\n  namespace: apps\nspec:\n  pkgRef:\n    publicName: nginx\n    version: 1.2.0"
        )
        .unwrap();

        let intent: InstalledPkg = from_file(file.path()).unwrap();
        assert_eq!(intent.spec.pkg_ref, PackageRef::new("nginx", "1.2.0"));
    }

    #[test]
    fn test_from_file_reads_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"metadata":{{"name":"web","namespace":"apps"}},"spec":{{"pkgRef":{{"publicName":"nginx","version":"1.2.0"}}}}}}"#
        )
        .unwrap();

        let intent: InstalledPkg = from_file(file.path()).unwrap();
        assert_eq!(intent.metadata.name, "web");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result: Result<InstalledPkg> = from_file(Path::new("/nonexistent/intent.yaml"));
        assert!(matches!(result, Err(Error::FileReadFailed { .. })));
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let result: Result<InstalledPkg> = from_yaml("metadata: [unclosed");
        assert!(matches!(result, Err(Error::YamlParseFailed { .. })));
    }

    #[test]
    fn test_yaml_round_trip_keeps_identity() {
        let intent = InstalledPkg::new("apps", "web", PackageRef::new("nginx", "1.2.0"));
        let text = to_yaml(&intent).unwrap();
        let decoded: InstalledPkg = from_yaml(&text).unwrap();
        assert_eq!(decoded, intent);
    }
}
