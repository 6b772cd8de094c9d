//! Registro de artifacts content-addressed.
//!
//! Un `Artifact` es un output inmutable de la investigación (dataset, claim
//! derivado, blob). Identidad = hash blake3 del payload canónico; contenidos
//! idénticos deduplican al mismo registro. Cada artifact referencia el evento
//! `ArtifactProduced` que lo creó (`produced_in_seq`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::EngineError;
use crate::hashing::{hash_value, to_canonical_json};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub hash: String,
    pub kind: String,
    /// Tamaño en bytes de la forma canónica del payload.
    pub size: u64,
    pub investigation_id: Uuid,
    /// Seq del evento `ArtifactProduced` que lo registró.
    pub produced_in_seq: u64,
    pub payload: Value,
}

/// Contrato del registry.
///
/// Orden respecto al log: el contenido sólo se fija DESPUÉS de que el evento
/// `ArtifactProduced` correspondiente esté comprometido, de modo que ningún
/// lector observe un artifact cuyo evento productor no existe.
pub trait ArtifactRegistry {
    /// Registra contenido. Idempotente: contenido idéntico devuelve el mismo
    /// artifact sin duplicar storage. `EngineError::Storage` ante fallo IO.
    fn put(&mut self,
           investigation_id: Uuid,
           produced_in_seq: u64,
           kind: &str,
           payload: &Value)
           -> Result<Artifact, EngineError>;
    /// Recupera contenido por hash; `ArtifactNotFound` si no existe.
    fn get(&self, hash: &str) -> Result<Value, EngineError>;
}

/// Backend en memoria (referencia del contrato y tests).
pub struct InMemoryArtifactRegistry {
    inner: HashMap<String, Artifact>,
}

impl Default for InMemoryArtifactRegistry {
    fn default() -> Self {
        Self { inner: HashMap::new() }
    }
}

impl InMemoryArtifactRegistry {
    /// Cantidad de registros distintos (para verificar dedup en tests).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl ArtifactRegistry for InMemoryArtifactRegistry {
    fn put(&mut self,
           investigation_id: Uuid,
           produced_in_seq: u64,
           kind: &str,
           payload: &Value)
           -> Result<Artifact, EngineError> {
        let hash = hash_value(payload);
        if let Some(existing) = self.inner.get(&hash) {
            return Ok(existing.clone());
        }
        let artifact = Artifact { hash: hash.clone(),
                                  kind: kind.to_string(),
                                  size: to_canonical_json(payload).len() as u64,
                                  investigation_id,
                                  produced_in_seq,
                                  payload: payload.clone() };
        self.inner.insert(hash, artifact.clone());
        Ok(artifact)
    }

    fn get(&self, hash: &str) -> Result<Value, EngineError> {
        self.inner
            .get(hash)
            .map(|a| a.payload.clone())
            .ok_or_else(|| EngineError::ArtifactNotFound(hash.to_string()))
    }
}
