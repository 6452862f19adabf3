//! Discovery of model classes from model definition files.
//!
//! A model file is a JSON document listing the classes of one importable module:
//!
//! ```json
//! {
//!     "module": "models",
//!     "classes": {
//!         "thermal_nonstat": {
//!             "name": "Non-stationary thermal problem",
//!             "inputs": [{"name": "edge temperature", "type": "Property", "obj_id": 3}],
//!             "outputs": [{"name": "temperature", "type": "Field",
//!                          "obj_type": "mupif.FieldID.FID_Temperature"}]
//!         }
//!     }
//! }
//! ```
//!
//! Entries that do not satisfy the [`ModelMetadata`] contract are skipped, so helper
//! definitions may live next to the models.

use super::{ModelClass, ModelMetadata, ModelRegistry};
use crate::error::LoadError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize)]
struct ModelFile {
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    classes: serde_json::Map<String, serde_json::Value>,
}

/// Loads every conforming class of `path` into `registry`.
///
/// Returns the number of newly registered classes. The import module defaults to the
/// file stem when the document does not name one.
pub fn load_models_from_file(
    path: impl AsRef<Path>,
    registry: &mut ModelRegistry,
) -> Result<usize, LoadError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let default_module = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "models".to_string());

    load(&content, &default_module, &path.display().to_string(), registry)
}

/// Loads classes from an in-memory model document.
pub fn load_models_from_str(
    source: &str,
    default_module: &str,
    registry: &mut ModelRegistry,
) -> Result<usize, LoadError> {
    load(source, default_module, "<memory>", registry)
}

fn load(
    source: &str,
    default_module: &str,
    origin: &str,
    registry: &mut ModelRegistry,
) -> Result<usize, LoadError> {
    let file: ModelFile = serde_json::from_str(source).map_err(|e| LoadError::Parse {
        path: origin.to_string(),
        message: e.to_string(),
    })?;
    let module = file.module.unwrap_or_else(|| default_module.to_string());

    let mut registered = 0;
    for (class_name, entry) in file.classes {
        let metadata = match serde_json::from_value::<ModelMetadata>(entry) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!("skipping '{}' in {}: {}", class_name, origin, e);
                continue;
            }
        };
        if let Some(name) = metadata.duplicate_slot_name() {
            tracing::debug!(
                "skipping '{}' in {}: slot '{}' is declared twice",
                class_name,
                origin,
                name
            );
            continue;
        }
        let class = ModelClass {
            import_statement: format!("from {} import {}", module, class_name),
            class_name,
            metadata,
        };
        if registry.register(class) {
            registered += 1;
        }
    }

    tracing::info!("loaded {} model classes from {}", registered, origin);
    Ok(registered)
}
