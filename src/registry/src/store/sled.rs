//! Embedded registry store backed by sled
//!
//! Definitions live in the `services` tree keyed by big-endian id. The
//! `service_ids` tree indexes service id text to id so exact lookups and
//! guarded inserts do not scan.

use super::{InsertOutcome, RegistryStore};
use crate::error::{RegistryError, Result};
use crate::service::{sort_definitions, MatchDimension, ServiceDefinition};
use async_trait::async_trait;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError, TransactionalTree,
};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use tracing::debug;
use wicket_core::ServiceDefinitionId;

const SERVICES_TREE: &str = "services";
const SERVICE_IDS_TREE: &str = "service_ids";

/// sled-backed registry store
#[derive(Clone)]
pub struct SledRegistryStore {
    db: Db,
    services: Tree,
    service_ids: Tree,
}

impl SledRegistryStore {
    /// Open (or create) a store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            RegistryError::StoreUnavailable(format!(
                "Failed to open sled database at {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_db(db)
    }

    /// Store that lives only as long as the process
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| RegistryError::StoreUnavailable(format!("Failed to open temporary sled database: {}", e)))?;
        Self::from_db(db)
    }

    pub fn from_db(db: Db) -> Result<Self> {
        let services = db.open_tree(SERVICES_TREE).map_err(storage_error)?;
        let service_ids = db.open_tree(SERVICE_IDS_TREE).map_err(storage_error)?;
        Ok(Self {
            db,
            services,
            service_ids,
        })
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await.map_err(storage_error)?;
        Ok(())
    }

    fn get_by_id(&self, id: ServiceDefinitionId) -> Result<Option<ServiceDefinition>> {
        self.services
            .get(id_key(id))
            .map_err(storage_error)?
            .map(|bytes| decode(&bytes))
            .transpose()
    }
}

fn id_key(id: ServiceDefinitionId) -> [u8; 8] {
    id.to_be_bytes()
}

fn id_from_bytes(bytes: &[u8]) -> Result<ServiceDefinitionId> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| RegistryError::Serialization(format!("Corrupt id index entry of {} bytes", bytes.len())))?;
    Ok(ServiceDefinitionId::from_be_bytes(raw))
}

fn encode(definition: &ServiceDefinition) -> Result<Vec<u8>> {
    serde_json::to_vec(definition)
        .map_err(|e| RegistryError::Serialization(format!("Failed to serialize service {}: {}", definition.id, e)))
}

fn decode(bytes: &[u8]) -> Result<ServiceDefinition> {
    serde_json::from_slice(bytes)
        .map_err(|e| RegistryError::Serialization(format!("Failed to deserialize service: {}", e)))
}

fn storage_error(e: sled::Error) -> RegistryError {
    RegistryError::StoreUnavailable(e.to_string())
}

fn transaction_error(e: TransactionError<RegistryError>) -> RegistryError {
    match e {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => storage_error(e),
    }
}

fn abort<T>(e: RegistryError) -> ConflictableTransactionResult<T, RegistryError> {
    Err(ConflictableTransactionError::Abort(e))
}

fn tx_get_by_id(
    services: &TransactionalTree,
    id: ServiceDefinitionId,
) -> ConflictableTransactionResult<Option<ServiceDefinition>, RegistryError> {
    match services.get(id_key(id))? {
        Some(bytes) => decode(&bytes).map(Some).or_else(abort),
        None => Ok(None),
    }
}

/// Id the index currently assigns to `service_id`, if that entry still exists
fn tx_index_owner(
    services: &TransactionalTree,
    service_ids: &TransactionalTree,
    service_id: &str,
) -> ConflictableTransactionResult<Option<ServiceDefinitionId>, RegistryError> {
    let Some(id_bytes) = service_ids.get(service_id.as_bytes())? else {
        return Ok(None);
    };
    let id = id_from_bytes(&id_bytes).or_else(abort)?;
    Ok(services.get(id_key(id))?.map(|_| id))
}

/// Drop the index entry for `service_id` only while it still points at `id`
fn tx_unindex(
    service_ids: &TransactionalTree,
    service_id: &str,
    id: ServiceDefinitionId,
) -> ConflictableTransactionResult<(), RegistryError> {
    if let Some(id_bytes) = service_ids.get(service_id.as_bytes())? {
        if id_from_bytes(&id_bytes).or_else(abort)? == id {
            service_ids.remove(service_id.as_bytes())?;
        }
    }
    Ok(())
}

#[async_trait]
impl RegistryStore for SledRegistryStore {
    fn name(&self) -> &str {
        "sled"
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.services.len())
    }

    async fn load(&self) -> Result<Vec<ServiceDefinition>> {
        let mut definitions = Vec::with_capacity(self.services.len());
        for item in self.services.iter() {
            let (_, bytes) = item.map_err(storage_error)?;
            definitions.push(decode(&bytes)?);
        }
        sort_definitions(&mut definitions);
        Ok(definitions)
    }

    async fn save(&self, definition: ServiceDefinition) -> Result<ServiceDefinition> {
        let bytes = encode(&definition)?;

        (&self.services, &self.service_ids)
            .transaction(|(services, service_ids)| -> ConflictableTransactionResult<(), RegistryError> {
                if let Some(owner) = tx_index_owner(services, service_ids, &definition.service_id)? {
                    if owner != definition.id {
                        return abort(RegistryError::DuplicateDefinition(format!(
                            "service id '{}' already belongs to definition {}",
                            definition.service_id, owner
                        )));
                    }
                }
                if let Some(previous) = tx_get_by_id(services, definition.id)? {
                    if previous.service_id != definition.service_id {
                        tx_unindex(service_ids, &previous.service_id, definition.id)?;
                    }
                }
                services.insert(id_key(definition.id).to_vec(), bytes.as_slice())?;
                service_ids.insert(definition.service_id.as_bytes(), id_key(definition.id).to_vec())?;
                Ok(())
            })
            .map_err(transaction_error)?;

        self.flush().await?;
        debug!("Saved service definition {}", definition);
        Ok(definition)
    }

    async fn insert_new(&self, definition: ServiceDefinition) -> Result<InsertOutcome> {
        let bytes = encode(&definition)?;

        let outcome = (&self.services, &self.service_ids)
            .transaction(|(services, service_ids)| -> ConflictableTransactionResult<InsertOutcome, RegistryError> {
                if let Some(existing) = services.get(id_key(definition.id))? {
                    return Ok(InsertOutcome::Conflict {
                        existing: decode(&existing).or_else(abort)?,
                        dimension: MatchDimension::Id,
                    });
                }

                if let Some(owner) = tx_index_owner(services, service_ids, &definition.service_id)? {
                    if let Some(existing) = tx_get_by_id(services, owner)? {
                        return Ok(InsertOutcome::Conflict {
                            existing,
                            dimension: MatchDimension::ExactServiceId,
                        });
                    }
                }

                services.insert(id_key(definition.id).to_vec(), bytes.as_slice())?;
                service_ids.insert(definition.service_id.as_bytes(), id_key(definition.id).to_vec())?;
                Ok(InsertOutcome::Inserted(definition.clone()))
            })
            .map_err(transaction_error)?;

        if outcome.is_inserted() {
            self.flush().await?;
        }
        Ok(outcome)
    }

    async fn find_by_id(&self, id: ServiceDefinitionId) -> Result<Option<ServiceDefinition>> {
        self.get_by_id(id)
    }

    async fn find_by_exact_service_id(&self, service_id: &str) -> Result<Option<ServiceDefinition>> {
        let Some(id_bytes) = self.service_ids.get(service_id.as_bytes()).map_err(storage_error)? else {
            return Ok(None);
        };
        self.get_by_id(id_from_bytes(&id_bytes)?)
    }

    async fn delete(&self, id: ServiceDefinitionId) -> Result<bool> {
        let removed = (&self.services, &self.service_ids)
            .transaction(|(services, service_ids)| -> ConflictableTransactionResult<bool, RegistryError> {
                let Some(previous) = tx_get_by_id(services, id)? else {
                    return Ok(false);
                };
                services.remove(id_key(id).to_vec())?;
                tx_unindex(service_ids, &previous.service_id, id)?;
                Ok(true)
            })
            .map_err(transaction_error)?;

        if removed {
            self.flush().await?;
        }
        Ok(removed)
    }
}
