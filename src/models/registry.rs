//! Registry of loaded model handles

use crate::config::ModelsConfig;
use crate::error::RegistryError;
use crate::models::backend::ModelBackend;
use crate::models::id::ModelId;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Model file location for each identifier
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFiles {
    paths: BTreeMap<ModelId, PathBuf>,
}

impl ModelFiles {
    /// Default file names for every identifier inside `models_dir`.
    pub fn in_dir<P: AsRef<Path>>(models_dir: P) -> Self {
        let models_dir = models_dir.as_ref();
        let paths = ModelId::ALL
            .iter()
            .map(|&id| (id, models_dir.join(id.default_file_name())))
            .collect();
        Self { paths }
    }

    /// Default layout with the per-identifier file name overrides from configuration.
    ///
    /// Override keys that do not name a model are logged and ignored.
    pub fn from_config(config: &ModelsConfig) -> Self {
        let mut files = Self::in_dir(&config.models_dir);
        for (key, file_name) in &config.files {
            match key.parse::<ModelId>() {
                Ok(id) => files.set(id, Path::new(&config.models_dir).join(file_name)),
                Err(e) => warn!(key = %key, error = %e, "Ignoring model file override"),
            }
        }
        files
    }

    pub fn set(&mut self, id: ModelId, path: PathBuf) {
        self.paths.insert(id, path);
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModelId, &Path)> {
        self.paths.iter().map(|(id, path)| (*id, path.as_path()))
    }
}

/// Loaded models keyed by identifier.
///
/// Populated once at startup and read-only afterwards, so it is shared across
/// requests behind an `Arc` without locking.
pub struct ModelRegistry<B: ModelBackend> {
    backend: B,
    models: HashMap<ModelId, B::Handle>,
}

impl<B: ModelBackend> ModelRegistry<B> {
    /// Create an empty registry.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            models: HashMap::new(),
        }
    }

    /// Load every listed model independently.
    ///
    /// A model that fails to load is logged and left out; loading as a whole
    /// never fails.
    pub fn load(backend: B, files: &ModelFiles) -> Self {
        let mut registry = Self::new(backend);

        for (id, path) in files.iter() {
            match registry.backend.load_model(path) {
                Ok(handle) => {
                    debug!(model = %id, path = %path.display(), "Model registered");
                    registry.register(id, handle);
                }
                Err(e) => {
                    warn!(model = %id, error = %e, "Failed to load model, skipping");
                }
            }
        }

        info!(
            count = registry.loaded_count(),
            total = ModelId::ALL.len(),
            "Loaded {} of {} models",
            registry.loaded_count(),
            ModelId::ALL.len()
        );

        registry
    }

    /// Register a handle, replacing any previous one for the same identifier.
    pub fn register(&mut self, id: ModelId, handle: B::Handle) {
        self.models.insert(id, handle);
    }

    pub fn is_loaded(&self, id: ModelId) -> bool {
        self.models.contains_key(&id)
    }

    pub fn get(&self, id: ModelId) -> Result<&B::Handle, RegistryError> {
        self.models.get(&id).ok_or(RegistryError::NotLoaded(id))
    }

    /// Loaded identifiers in canonical order.
    pub fn loaded_identifiers(&self) -> Vec<ModelId> {
        ModelId::ALL
            .iter()
            .copied()
            .filter(|id| self.models.contains_key(id))
            .collect()
    }

    pub fn loaded_count(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::models::testing::{MockBackend, MockModel};

    #[test]
    fn test_load_skips_failures() {
        let backend = MockBackend::new()
            .with_file("rf_model_gait_FIM.onnx", MockModel::Constant(5.0))
            .with_file("rf_model_eat_FIM.onnx", MockModel::Corrupt)
            .with_file("rf_model_all_FIM.onnx", MockModel::Constant(90.0));

        let registry = ModelRegistry::load(backend, &ModelFiles::in_dir("models"));

        assert_eq!(registry.loaded_count(), 2);
        assert!(registry.is_loaded(ModelId::Gait));
        assert!(registry.is_loaded(ModelId::Total));
        assert!(!registry.is_loaded(ModelId::Eat));
        assert_eq!(registry.loaded_identifiers(), vec![ModelId::Total, ModelId::Gait]);
    }

    #[test]
    fn test_get_not_loaded() {
        let registry = ModelRegistry::new(MockBackend::new());
        let err = registry.get(ModelId::Memory).err().unwrap();
        assert!(matches!(err, RegistryError::NotLoaded(ModelId::Memory)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_last_write_wins() {
        let mut registry = ModelRegistry::new(MockBackend::new());
        registry.register(ModelId::Bath, MockModel::Constant(1.0));
        registry.register(ModelId::Bath, MockModel::Constant(2.0));

        assert_eq!(registry.loaded_count(), 1);
        assert!(matches!(registry.get(ModelId::Bath), Ok(MockModel::Constant(v)) if *v == 2.0));
    }

    #[test]
    fn test_model_files_overrides() {
        let mut config = ModelsConfig::default();
        config.models_dir = "r_models".to_string();
        config.files.insert("total".to_string(), "all_v2.onnx".to_string());
        config.files.insert("stairs".to_string(), "stairs.onnx".to_string());

        let model_files = ModelFiles::from_config(&config);
        let files: BTreeMap<_, _> = model_files.iter().collect();

        assert_eq!(files.len(), 20);
        assert_eq!(files[&ModelId::Total], Path::new("r_models/all_v2.onnx"));
        assert_eq!(files[&ModelId::Gait], Path::new("r_models/rf_model_gait_FIM.onnx"));
    }

    #[test]
    fn test_missing_directory_loads_nothing() {
        let registry = ModelRegistry::load(MockBackend::new(), &ModelFiles::in_dir("nowhere"));
        assert!(registry.is_empty());
        assert!(matches!(
            registry.backend().load_model(Path::new("nowhere/x.onnx")),
            Err(LoadError::Missing(_))
        ));
    }
}
