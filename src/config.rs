//! Configuration persistence for a context's component set.
//!
//! What is persisted is the logical content only: one record per component
//! carrying kind, family, name, and the construction arguments originally
//! given to [`create_component`](crate::Context::create_component). The
//! on-disk syntax is a codec concern; [`JsonCodec`] is the default shipped
//! here and anything else can be plugged in through [`ConfigCodec`].

use crate::args::Args;
use crate::component::ComponentKind;
use crate::context::{Context, CreateError};
use crate::logging::{config_loaded_event, config_saved_event};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error as ThisError;

/// One persisted component description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub kind: ComponentKind,
    pub family: String,
    pub name: String,
    #[serde(default)]
    pub args: Args,
}

/// Encodes and decodes a set of component records.
pub trait ConfigCodec {
    fn encode(&self, records: &[ComponentRecord]) -> Result<Vec<u8>, ConfigError>;
    fn decode(&self, bytes: &[u8]) -> Result<Vec<ComponentRecord>, ConfigError>;
}

/// The default codec: a pretty-printed JSON array of records.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl ConfigCodec for JsonCodec {
    fn encode(&self, records: &[ComponentRecord]) -> Result<Vec<u8>, ConfigError> {
        serde_json::to_vec_pretty(records).map_err(|err| ConfigError::Codec(err.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<ComponentRecord>, ConfigError> {
        serde_json::from_slice(bytes).map_err(|err| ConfigError::Codec(err.to_string()))
    }
}

impl Context {
    /// The current component set as records, sorted by name so that saved
    /// output is stable.
    pub fn records(&self) -> Vec<ComponentRecord> {
        let mut records: Vec<ComponentRecord> = self
            .components()
            .map(|component| ComponentRecord {
                kind: component.kind(),
                family: component.family().to_string(),
                name: component.name().to_string(),
                args: component.args().clone(),
            })
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    /// Saves the component set with the default [`JsonCodec`].
    pub fn config_save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.config_save_with(path, &JsonCodec)
    }

    /// Saves the component set through `codec`.
    ///
    /// The bytes go to a sibling temporary file which is renamed into place,
    /// so a write failure never truncates an existing configuration.
    pub fn config_save_with(
        &self,
        path: impl AsRef<Path>,
        codec: &dyn ConfigCodec,
    ) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let records = self.records();
        let bytes = codec.encode(&records)?;

        let mut file_name = path
            .file_name()
            .ok_or_else(|| {
                ConfigError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("not a file path: {}", path.display()),
                ))
            })?
            .to_os_string();
        file_name.push(".tmp");
        let tmp = path.with_file_name(file_name);

        if let Err(err) = fs::write(&tmp, &bytes) {
            let _ = fs::remove_file(&tmp);
            return Err(ConfigError::Io(err));
        }
        if let Err(err) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(ConfigError::Io(err));
        }
        config_saved_event(records.len(), path);
        Ok(())
    }

    /// Loads records with the default [`JsonCodec`] and constructs them.
    pub fn config_load(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.config_load_with(path, &JsonCodec)
    }

    /// Loads records through `codec` and constructs every component they
    /// describe.
    ///
    /// All-or-nothing: when any record fails to validate or construct, every
    /// component created by this call is removed again and the context is
    /// left exactly as it was.
    pub fn config_load_with(
        &mut self,
        path: impl AsRef<Path>,
        codec: &dyn ConfigCodec,
    ) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let records = codec.decode(&bytes)?;

        // Validate up front so the common failure modes never start
        // constructing at all.
        let mut seen = std::collections::HashSet::new();
        for record in &records {
            if !self.registry().contains(record.kind, &record.family) {
                return Err(ConfigError::Create(CreateError::UnknownFamily {
                    kind: record.kind,
                    family: record.family.clone(),
                }));
            }
            if self.get_component(&record.name).is_some() || !seen.insert(record.name.clone()) {
                return Err(ConfigError::Create(CreateError::DuplicateName(
                    record.name.clone(),
                )));
            }
        }

        let mut created: Vec<String> = Vec::with_capacity(records.len());
        for record in &records {
            match self.create_component(
                record.kind,
                &record.family,
                Some(&record.name),
                record.args.clone(),
            ) {
                Ok(_) => created.push(record.name.clone()),
                Err(err) => {
                    for name in created {
                        self.remove_component(&name)
                            .expect("components created by this load are unreferenced");
                    }
                    return Err(ConfigError::Create(err));
                }
            }
        }
        config_loaded_event(created.len(), path);
        Ok(())
    }
}

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("configuration file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("configuration could not be encoded or decoded: {0}")]
    Codec(String),
    #[error(transparent)]
    Create(#[from] CreateError),
}
