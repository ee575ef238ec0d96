//! On-disk storage of named model environments.
//!
//! An environment bundles the model artifacts of one committee, their shared
//! species type map, and optionally the batch-submission settings used when
//! labeling jobs are dispatched to a cluster. Each environment is persisted as
//! one TOML file under the registry root, named after its label. Updates
//! replace the file atomically so a stored environment is never half-written.

use crate::core::models::ensemble::{DEFAULT_LABEL, Ensemble, ModelHandle};
use crate::core::models::typemap::TypeMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No environment named '{label}' in registry at '{root}'")]
    UnknownLabel { label: String, root: String },

    #[error("Environment label '{label}' is invalid, use alphanumerics, '-' or '_'")]
    InvalidLabel { label: String },

    #[error("Model '{path}' declares a different type map than '{first}'")]
    TypeMapMismatch { path: String, first: String },

    #[error("No models supplied for environment '{label}'")]
    EmptyEnvironment { label: String },

    #[error("No batch directives found in script '{path}'")]
    NoBatchDirectives { path: String },

    #[error("Registry I/O error for '{path}': {source}")]
    Io { path: String, source: io::Error },

    #[error("Malformed environment file '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },

    #[error("Failed to serialize environment '{label}': {source}")]
    Serialize {
        label: String,
        source: toml::ser::Error,
    },
}

/// Batch-submission settings stored alongside an environment.
///
/// `comment` is the scheduler directive line reproduced verbatim in generated
/// job scripts; `env` holds exported shell variables (thread pinning and the
/// like) the jobs should run with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpcSettings {
    pub comment: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl HpcSettings {
    /// Extracts `#SBATCH` directives and `export` variables from a submission script.
    ///
    /// All `#SBATCH` arguments are folded into one directive line; `export
    /// KEY=VALUE` lines become entries of `env`.
    pub fn from_script(path: &Path) -> Result<Self, RegistryError> {
        let content = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let mut args = Vec::new();
        let mut env = BTreeMap::new();
        for line in content.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("#SBATCH") {
                args.extend(rest.split_whitespace().map(String::from));
            } else if let Some(rest) = line.strip_prefix("export ") {
                if let Some((key, value)) = rest.split_once('=') {
                    env.insert(key.trim().to_string(), value.trim().to_string());
                }
            }
        }
        if args.is_empty() {
            return Err(RegistryError::NoBatchDirectives {
                path: path.display().to_string(),
            });
        }
        Ok(Self {
            comment: format!("#SBATCH {}", args.join(" ")),
            env,
        })
    }
}

/// Serialized form of one registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub models: Vec<PathBuf>,
    pub type_map: TypeMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hpc: Option<HpcSettings>,
}

/// Persistent store of named environments.
///
/// The registry is an explicit value passed to callers; there is no
/// process-wide current environment. Reads resolve a label into a validated
/// [`Ensemble`]; writes overwrite the whole entry, so multi-model committees
/// must be supplied together in one `set` call.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    root: PathBuf,
}

/// Target of a [`ModelRegistry::reset`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTarget<'a> {
    Label(&'a str),
    All,
}

impl ModelRegistry {
    /// Opens (creating if needed) a registry rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| RegistryError::Io {
            path: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores a committee under `label`, replacing any previous entry.
    ///
    /// Every handle must declare the identical type map; the first offender is
    /// named in the error. Batch settings already stored under the label are
    /// preserved across the overwrite.
    pub fn set(&self, label: &str, handles: &[ModelHandle]) -> Result<(), RegistryError> {
        validate_label(label)?;
        let Some(first) = handles.first() else {
            return Err(RegistryError::EmptyEnvironment {
                label: label.to_string(),
            });
        };
        for handle in &handles[1..] {
            if handle.type_map != first.type_map {
                return Err(RegistryError::TypeMapMismatch {
                    path: handle.path.display().to_string(),
                    first: first.path.display().to_string(),
                });
            }
        }

        let hpc = match self.read_environment(label) {
            Ok(existing) => existing.hpc,
            Err(RegistryError::UnknownLabel { .. }) => None,
            Err(other) => return Err(other),
        };
        let environment = Environment {
            models: handles.iter().map(|h| h.path.clone()).collect(),
            type_map: first.type_map.clone(),
            hpc,
        };
        self.write_environment(label, &environment)?;
        info!(label, models = handles.len(), "Stored environment");
        Ok(())
    }

    /// Stores a committee under [`DEFAULT_LABEL`].
    pub fn set_default(&self, handles: &[ModelHandle]) -> Result<(), RegistryError> {
        self.set(DEFAULT_LABEL, handles)
    }

    /// Attaches batch-submission settings to `label`, keeping its models.
    ///
    /// The entry is created without models if the label is new; `get` keeps
    /// failing for it until models are set.
    pub fn set_hpc(&self, label: &str, settings: HpcSettings) -> Result<(), RegistryError> {
        validate_label(label)?;
        let mut environment = self.read_environment(label).unwrap_or(Environment {
            models: Vec::new(),
            type_map: TypeMap::default(),
            hpc: None,
        });
        environment.hpc = Some(settings);
        self.write_environment(label, &environment)
    }

    /// Resolves `label` into a validated ensemble.
    pub fn get(&self, label: &str) -> Result<Ensemble, RegistryError> {
        validate_label(label)?;
        let environment = self.read_environment(label)?;
        let handles: Vec<ModelHandle> = environment
            .models
            .iter()
            .map(|path| ModelHandle::new(path.clone(), environment.type_map.clone()))
            .collect();
        Ensemble::new(label, handles).map_err(|_| RegistryError::EmptyEnvironment {
            label: label.to_string(),
        })
    }

    /// Resolves [`DEFAULT_LABEL`].
    pub fn get_default(&self) -> Result<Ensemble, RegistryError> {
        self.get(DEFAULT_LABEL)
    }

    /// Returns the stored batch settings for `label`, if any.
    pub fn hpc(&self, label: &str) -> Result<Option<HpcSettings>, RegistryError> {
        validate_label(label)?;
        Ok(self.read_environment(label)?.hpc)
    }

    /// Deletes one environment or every environment in the registry.
    pub fn reset(&self, target: ResetTarget) -> Result<(), RegistryError> {
        match target {
            ResetTarget::Label(label) => {
                validate_label(label)?;
                let path = self.environment_path(label);
                if !path.exists() {
                    return Err(RegistryError::UnknownLabel {
                        label: label.to_string(),
                        root: self.root.display().to_string(),
                    });
                }
                fs::remove_file(&path).map_err(|source| RegistryError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                info!(label, "Deleted environment");
            }
            ResetTarget::All => {
                for label in self.list()? {
                    let path = self.environment_path(&label);
                    fs::remove_file(&path).map_err(|source| RegistryError::Io {
                        path: path.display().to_string(),
                        source,
                    })?;
                }
                info!("Deleted all environments");
            }
        }
        Ok(())
    }

    /// Lists stored environment labels in sorted order.
    pub fn list(&self) -> Result<Vec<String>, RegistryError> {
        let entries = fs::read_dir(&self.root).map_err(|source| RegistryError::Io {
            path: self.root.display().to_string(),
            source,
        })?;
        let mut labels = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| RegistryError::Io {
                path: self.root.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "toml")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                labels.push(stem.to_string());
            }
        }
        labels.sort();
        Ok(labels)
    }

    fn environment_path(&self, label: &str) -> PathBuf {
        self.root.join(format!("{label}.toml"))
    }

    fn read_environment(&self, label: &str) -> Result<Environment, RegistryError> {
        let path = self.environment_path(label);
        if !path.exists() {
            return Err(RegistryError::UnknownLabel {
                label: label.to_string(),
                root: self.root.display().to_string(),
            });
        }
        let content = fs::read_to_string(&path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| RegistryError::Toml {
            path: path.display().to_string(),
            source,
        })
    }

    // Write-to-temp then rename, so readers never observe a partial entry.
    fn write_environment(
        &self,
        label: &str,
        environment: &Environment,
    ) -> Result<(), RegistryError> {
        let content =
            toml::to_string_pretty(environment).map_err(|source| RegistryError::Serialize {
                label: label.to_string(),
                source,
            })?;
        let path = self.environment_path(label);
        let tmp = self.root.join(format!("{label}.toml.tmp"));
        fs::write(&tmp, content).map_err(|source| RegistryError::Io {
            path: tmp.display().to_string(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(label, path = %path.display(), "Wrote environment file");
        Ok(())
    }
}

fn validate_label(label: &str) -> Result<(), RegistryError> {
    let valid = !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidLabel {
            label: label.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silica_map() -> TypeMap {
        TypeMap::from_pairs([("Si", 0), ("O", 1)])
    }

    fn handles(paths: &[&str]) -> Vec<ModelHandle> {
        paths
            .iter()
            .map(|p| ModelHandle::new(*p, silica_map()))
            .collect()
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();

        registry
            .set("silica", &handles(&["models/a.pb", "models/b.pb"]))
            .unwrap();

        let ensemble = registry.get("silica").unwrap();
        assert_eq!(ensemble.label(), "silica");
        assert_eq!(ensemble.len(), 2);
        assert_eq!(ensemble.type_map(), &silica_map());
        assert_eq!(
            ensemble.members()[0].path,
            PathBuf::from("models/a.pb")
        );
    }

    #[test]
    fn set_replaces_rather_than_appends() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();

        registry
            .set_default(&handles(&["models/a.pb", "models/b.pb"]))
            .unwrap();
        registry.set_default(&handles(&["models/c.pb"])).unwrap();

        let ensemble = registry.get_default().unwrap();
        assert_eq!(ensemble.len(), 1);
        assert_eq!(ensemble.members()[0].path, PathBuf::from("models/c.pb"));
    }

    #[test]
    fn set_rejects_mismatched_type_maps() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();

        let mixed = vec![
            ModelHandle::new("models/a.pb", silica_map()),
            ModelHandle::new("models/b.pb", TypeMap::from_pairs([("Si", 0)])),
        ];
        let err = registry.set("mixed", &mixed).unwrap_err();
        assert!(matches!(err, RegistryError::TypeMapMismatch { .. }));
        assert!(matches!(
            registry.get("mixed").unwrap_err(),
            RegistryError::UnknownLabel { .. }
        ));
    }

    #[test]
    fn set_rejects_empty_committee() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        let err = registry.set("empty", &[]).unwrap_err();
        assert!(matches!(err, RegistryError::EmptyEnvironment { .. }));
    }

    #[test]
    fn get_unknown_label_fails() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        let err = registry.get("nope").unwrap_err();
        match err {
            RegistryError::UnknownLabel { label, .. } => assert_eq!(label, "nope"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_labels_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        for label in ["", "up/../root", "a b"] {
            let err = registry.set(label, &handles(&["m.pb"])).unwrap_err();
            assert!(matches!(err, RegistryError::InvalidLabel { .. }));
        }
    }

    #[test]
    fn reset_label_deletes_only_that_environment() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        registry.set("one", &handles(&["a.pb"])).unwrap();
        registry.set("two", &handles(&["b.pb"])).unwrap();

        registry.reset(ResetTarget::Label("one")).unwrap();

        assert!(matches!(
            registry.get("one").unwrap_err(),
            RegistryError::UnknownLabel { .. }
        ));
        assert!(registry.get("two").is_ok());
    }

    #[test]
    fn reset_all_empties_the_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        registry.set("one", &handles(&["a.pb"])).unwrap();
        registry.set("two", &handles(&["b.pb"])).unwrap();

        registry.reset(ResetTarget::All).unwrap();
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn reset_unknown_label_fails() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        let err = registry.reset(ResetTarget::Label("ghost")).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownLabel { .. }));
    }

    #[test]
    fn list_returns_sorted_labels() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        registry.set("zeolite", &handles(&["z.pb"])).unwrap();
        registry.set("alumina", &handles(&["a.pb"])).unwrap();

        assert_eq!(registry.list().unwrap(), vec!["alumina", "zeolite"]);
    }

    #[test]
    fn hpc_settings_survive_model_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();

        registry.set("silica", &handles(&["a.pb"])).unwrap();
        let settings = HpcSettings {
            comment: "#SBATCH -N 1 -t 04:00:00".to_string(),
            env: BTreeMap::from([("OMP_NUM_THREADS".to_string(), "8".to_string())]),
        };
        registry.set_hpc("silica", settings.clone()).unwrap();
        registry.set("silica", &handles(&["b.pb"])).unwrap();

        assert_eq!(registry.hpc("silica").unwrap(), Some(settings));
    }

    #[test]
    fn hpc_settings_parse_from_submission_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("submit.sh");
        fs::write(
            &script,
            "#!/bin/bash\n#SBATCH -N 1\n#SBATCH -t 04:00:00\nexport OMP_NUM_THREADS=8\nmodule load things\n",
        )
        .unwrap();

        let settings = HpcSettings::from_script(&script).unwrap();
        assert_eq!(settings.comment, "#SBATCH -N 1 -t 04:00:00");
        assert_eq!(settings.env.get("OMP_NUM_THREADS").map(String::as_str), Some("8"));
    }

    #[test]
    fn script_without_directives_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("plain.sh");
        fs::write(&script, "#!/bin/bash\necho hello\n").unwrap();
        let err = HpcSettings::from_script(&script).unwrap_err();
        assert!(matches!(err, RegistryError::NoBatchDirectives { .. }));
    }
}
