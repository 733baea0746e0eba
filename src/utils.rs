use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

use anyhow::Context;
use reclaim::TargetDefinition;

pub fn format_duration(value: &Duration) -> String {
    if value.as_secs() < 60 * 60 {
        format!(
            "{:0>2}:{:0>2}.{:0>2}",
            value.as_secs() / 60,
            value.as_secs() % 60,
            value.subsec_millis() / 10
        )
    } else {
        format!(
            "{:0>2}:{:0>2}:{:0>2}",
            value.as_secs() / (60 * 60),
            (value.as_secs() / 60) % 60,
            value.as_secs() % 60
        )
    }
}

/// Canonical form of `path` without the `\\?\` prefix on Windows.
pub fn display_path(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| dunce::simplified(path).to_path_buf())
}

pub fn load_definitions(path: &Path) -> anyhow::Result<Vec<TargetDefinition>> {
    let path = dunce::canonicalize(path)
        .with_context(|| format!("invalid definitions path {}", path.display()))?;
    log::debug!("Loading target definitions from {}", path.display());

    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let definitions: Vec<TargetDefinition> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    log::info!("Loaded {} target definitions", definitions.len());
    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use reclaim::{
        Classification,
        TargetKind,
    };

    use super::*;

    #[test]
    fn formats_short_and_long_durations() {
        assert_eq!(format_duration(&Duration::from_millis(65_250)), "01:05.25");
        assert_eq!(format_duration(&Duration::from_secs(3 * 3600 + 125)), "03:02:05");
    }

    #[test]
    fn loads_definition_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("targets.json");
        fs::write(
            &file,
            r#"[
                {"classification": "temp", "category": "User temp", "path": "%TEMP%"},
                {"classification": "orphaned", "category": "Memory dump", "path": "%SystemRoot%\\memory.dmp", "kind": "file", "notes": "kernel dump"}
            ]"#,
        )
        .unwrap();

        let definitions = load_definitions(&file).unwrap();
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0].classification, Classification::Temp);
        assert_eq!(definitions[0].kind, TargetKind::Directory);
        assert_eq!(definitions[1].kind, TargetKind::File);
        assert_eq!(definitions[1].notes, "kernel dump");
    }

    #[test]
    fn shipped_example_definitions_parse() {
        let file = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/targets.example.json");
        let definitions = load_definitions(&file).unwrap();
        assert!(definitions
            .iter()
            .any(|definition| definition.kind == TargetKind::File));
    }

    #[test]
    fn reports_unreadable_definition_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.json");
        fs::write(&file, "{ not json").unwrap();

        let error = load_definitions(&file).unwrap_err();
        assert!(format!("{:#}", error).contains("failed to parse"));
        assert!(load_definitions(&dir.path().join("missing.json")).is_err());
    }
}
