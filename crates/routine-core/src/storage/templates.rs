//! Routine templates read from `~/.config/routine-runner/templates.toml`.
//!
//! ```toml
//! [[templates]]
//! id = "morning"
//! name = "Morning Routine"
//!
//! [[templates.tasks]]
//! id = "water"
//! name = "Drink water"
//! duration_min = 2
//! include_in_low = true
//! include_in_steady = true
//! include_in_flow = true
//! ```
//!
//! Tasks written before pace modes existed may carry `low_safe` /
//! `flow_extra` instead; they are migrated on load.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{CoreError, TemplateError};
use crate::template::{RoutineTemplate, TemplateProvider};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TemplateFile {
    #[serde(default)]
    templates: Vec<RoutineTemplate>,
}

/// In-memory view of the templates file.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    templates: Vec<RoutineTemplate>,
}

impl TemplateStore {
    pub fn new(templates: Vec<RoutineTemplate>) -> Result<Self, TemplateError> {
        let mut seen = HashSet::new();
        for template in &templates {
            if !seen.insert(template.id.as_str()) {
                return Err(TemplateError::DuplicateId(template.id.clone()));
            }
        }
        Ok(Self { templates })
    }

    fn path() -> Result<PathBuf, CoreError> {
        Ok(data_dir()?.join("templates.toml"))
    }

    /// Load from the default location.
    pub fn load() -> Result<Self, CoreError> {
        Ok(Self::load_from(&Self::path()?)?)
    }

    /// Load from `path`. A missing file yields the built-in morning routine.
    pub fn load_from(path: &Path) -> Result<Self, TemplateError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no templates file, using built-in routine");
                return Self::new(vec![RoutineTemplate::default_morning()]);
            }
            Err(source) => {
                return Err(TemplateError::ReadFailed {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let file: TemplateFile =
            toml::from_str(&content).map_err(|e| TemplateError::ParseFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Self::new(file.templates)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), CoreError> {
        let file = TemplateFile {
            templates: self.templates.clone(),
        };
        let content = toml::to_string_pretty(&file).map_err(|e| TemplateError::ParseFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn list(&self) -> &[RoutineTemplate] {
        &self.templates
    }

    pub fn get(&self, id: &str) -> Result<&RoutineTemplate, TemplateError> {
        self.templates
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }
}

impl TemplateProvider for TemplateStore {
    fn template(&self, id: &str) -> Option<RoutineTemplate> {
        self.get(id).ok().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Pace, PaceInclusion};

    #[test]
    fn missing_file_gives_builtin_routine() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::load_from(&dir.path().join("templates.toml")).unwrap();
        assert_eq!(store.list().len(), 1);
        assert!(store.template("morning").is_some());
    }

    #[test]
    fn loads_mixed_flag_encodings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.toml");
        std::fs::write(
            &path,
            r#"
[[templates]]
id = "evening"
name = "Evening"

[[templates.tasks]]
id = "dishes"
name = "Dishes"
duration_min = 10
order = 1
low_safe = true

[[templates.tasks]]
id = "read"
name = "Read"
duration_min = 20
order = 0
include_in_flow = true
"#,
        )
        .unwrap();

        let store = TemplateStore::load_from(&path).unwrap();
        let evening = store.get("evening").unwrap();
        assert_eq!(evening.tasks[0].paces, PaceInclusion::ALL);
        assert_eq!(evening.tasks[1].paces, PaceInclusion::FLOW_ONLY);
        assert_eq!(evening.total_duration_min(Pace::Flow), 30);
        assert!(matches!(store.get("nope"), Err(TemplateError::NotFound(_))));
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.toml");
        let store = TemplateStore::new(vec![RoutineTemplate::default_morning()]).unwrap();
        store.save_to(&path).unwrap();

        let reloaded = TemplateStore::load_from(&path).unwrap();
        assert_eq!(reloaded.list(), store.list());
    }

    #[test]
    fn rejects_duplicate_ids_and_bad_toml() {
        let morning = RoutineTemplate::default_morning();
        assert!(matches!(
            TemplateStore::new(vec![morning.clone(), morning]),
            Err(TemplateError::DuplicateId(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.toml");
        std::fs::write(&path, "[[templates]]\nname = 3\n").unwrap();
        assert!(matches!(
            TemplateStore::load_from(&path),
            Err(TemplateError::ParseFailed { .. })
        ));
    }
}
