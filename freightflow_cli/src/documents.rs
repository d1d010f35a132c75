use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

/// Reads a JSON or YAML document, picking the format from the extension.
pub fn read_document<T: DeserializeOwned, P: AsRef<Path>>(file: P) -> Result<T> {
    let file_path = file.as_ref();

    if !file_path.exists() {
        bail!("File not found: {}", file_path.display());
    }

    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read {}", file_path.display()))?;

    let document = match file_path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON in {}", file_path.display()))?,
        Some("yaml") | Some("yml") => from_yaml_str(&content)
            .with_context(|| format!("Failed to parse YAML in {}", file_path.display()))?,
        _ => {
            bail!("Unsupported file format. Use .json, .yaml, or .yml");
        }
    };

    Ok(document)
}

/// Goes through a JSON value so enums read the same in YAML as in JSON
/// (`decide: {...}` rather than serde_yaml's `!decide` tags).
pub fn from_yaml_str<T: DeserializeOwned>(content: &str) -> Result<T> {
    let value: Value = serde_yaml::from_str(content)?;
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn yaml_and_json_parse_to_same_value() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("wf.json");
        let yaml_path = dir.path().join("wf.yml");
        std::fs::write(&json_path, r#"{"id": "wf", "steps": [{"id": "L1"}]}"#).unwrap();
        std::fs::write(&yaml_path, "id: wf\nsteps:\n  - id: L1\n").unwrap();

        let from_json: Value = read_document(&json_path).unwrap();
        let from_yaml: Value = read_document(&yaml_path).unwrap();

        assert_eq!(from_json, from_yaml);
    }

    #[derive(Debug, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase")]
    enum Action {
        Decide { invoice: String },
        Wait(u64),
        Reconcile,
    }

    #[test]
    fn yaml_enums_use_map_form() {
        let actions: Vec<Action> =
            from_yaml_str("- decide: { invoice: INV-1 }\n- wait: 5\n- reconcile\n").unwrap();

        assert_eq!(
            actions,
            vec![
                Action::Decide {
                    invoice: "INV-1".to_string()
                },
                Action::Wait(5),
                Action::Reconcile,
            ]
        );
    }

    #[test]
    fn unknown_extension_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wf.toml");
        std::fs::write(&path, "id = 'wf'").unwrap();

        let err = read_document::<Value, _>(&path).unwrap_err();

        assert!(err.to_string().starts_with("Unsupported file format"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = read_document::<Value, _>("/definitely/not/here.json").unwrap_err();

        assert!(err.to_string().contains("File not found"));
    }
}
