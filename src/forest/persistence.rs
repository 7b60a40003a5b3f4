// Forest persistence - JSON save/load
//
// The whole forest (configuration, descriptor shape, node arenas and leaf
// tables) is written as one JSON document. Floats round-trip exactly, so a
// loaded forest routes every descriptor to the same leaves as the original.

use std::fs;
use std::path::Path;

use crate::error::{log_persistence_error, PersistenceError};

use super::DecisionForest;

impl DecisionForest {
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate a forest
    ///
    /// # Returns
    /// * `Err(PersistenceError::Serialization)` - malformed JSON
    /// * `Err(PersistenceError::InvalidStructure)` - dangling child, bad leaf
    ///   numbering, or statistics inconsistent with the configuration
    pub fn from_json(json: &str) -> Result<Self, PersistenceError> {
        let forest: DecisionForest = serde_json::from_str(json)?;
        forest.validate_structure()?;
        Ok(forest)
    }

    /// Write the forest to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PersistenceError> {
        if let Err(err) = self
            .to_json()
            .and_then(|json| fs::write(&path, json).map_err(PersistenceError::from))
        {
            log_persistence_error(&err, "save");
            return Err(err);
        }
        log::info!(
            "[Forest] Saved {} trees to {:?}",
            self.trees.len(),
            path.as_ref()
        );
        Ok(())
    }

    /// Read a forest written by [`DecisionForest::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let forest = match fs::read_to_string(&path)
            .map_err(PersistenceError::from)
            .and_then(|json| Self::from_json(&json))
        {
            Ok(forest) => forest,
            Err(err) => {
                log_persistence_error(&err, "load");
                return Err(err);
            }
        };
        log::info!(
            "[Forest] Loaded {} trees from {:?}",
            forest.trees.len(),
            path.as_ref()
        );
        Ok(forest)
    }

    fn validate_structure(&self) -> Result<(), PersistenceError> {
        self.config
            .validate()
            .map_err(|err| PersistenceError::InvalidStructure {
                reason: err.to_string(),
            })?;
        if self.trees.len() != self.config.n_trees {
            return Err(PersistenceError::InvalidStructure {
                reason: format!(
                    "{} trees stored, configuration says {}",
                    self.trees.len(),
                    self.config.n_trees
                ),
            });
        }
        for (index, tree) in self.trees.iter().enumerate() {
            tree.validate(self.config.n_classes, self.descriptor_shape)
                .map_err(|reason| PersistenceError::InvalidStructure {
                    reason: format!("tree {}: {}", index, reason),
                })?;
        }
        Ok(())
    }
}
