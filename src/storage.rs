use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::types::{Machine, MachineId, MachineRecord, OwnerCode};

/// Record store the inventory service persists machines through.
///
/// Whether `count_by_owner` observes a just-completed mutation is the
/// implementation's concern.
#[async_trait]
pub trait MachineStore: Send + Sync {
    async fn create(&self, record: MachineRecord) -> Result<Machine, StoreError>;
    async fn list(&self) -> Result<Vec<Machine>, StoreError>;
    async fn get(&self, id: MachineId) -> Result<Machine, StoreError>;
    async fn by_owner(&self, owner: &OwnerCode) -> Result<Vec<Machine>, StoreError>;
    async fn count_by_owner(&self, owner: &OwnerCode) -> Result<u64, StoreError>;
    async fn update(&self, id: MachineId, record: MachineRecord) -> Result<Machine, StoreError>;
    async fn delete(&self, id: MachineId) -> Result<(), StoreError>;
}

/// In-memory store for tests and lightweight deployments.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    machines: BTreeMap<MachineId, Machine>,
}

impl Inner {
    fn mac_taken(&self, mac: &str, except: Option<MachineId>) -> bool {
        self.machines
            .values()
            .any(|m| m.mac_address.eq_ignore_ascii_case(mac) && Some(m.id) != except)
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MachineStore for InMemoryStore {
    async fn create(&self, record: MachineRecord) -> Result<Machine, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.mac_taken(&record.mac_address, None) {
            return Err(StoreError::Conflict(format!(
                "MAC address {} already registered",
                record.mac_address
            )));
        }

        inner.next_id += 1;
        let now = Utc::now();
        let machine = Machine {
            id: MachineId(inner.next_id),
            mac_address: record.mac_address,
            name: record.name,
            ip_address: record.ip_address,
            owner: record.owner,
            description: record.description,
            created_at: now,
            updated_at: now,
        };
        inner.machines.insert(machine.id, machine.clone());
        Ok(machine)
    }

    async fn list(&self) -> Result<Vec<Machine>, StoreError> {
        Ok(self.inner.lock().await.machines.values().cloned().collect())
    }

    async fn get(&self, id: MachineId) -> Result<Machine, StoreError> {
        self.inner
            .lock()
            .await
            .machines
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn by_owner(&self, owner: &OwnerCode) -> Result<Vec<Machine>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .machines
            .values()
            .filter(|m| m.owner.as_ref() == Some(owner))
            .cloned()
            .collect())
    }

    async fn count_by_owner(&self, owner: &OwnerCode) -> Result<u64, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .machines
            .values()
            .filter(|m| m.owner.as_ref() == Some(owner))
            .count() as u64)
    }

    async fn update(&self, id: MachineId, record: MachineRecord) -> Result<Machine, StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.machines.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        if inner.mac_taken(&record.mac_address, Some(id)) {
            return Err(StoreError::Conflict(format!(
                "MAC address {} already registered",
                record.mac_address
            )));
        }

        let machine = inner
            .machines
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        machine.mac_address = record.mac_address;
        machine.name = record.name;
        machine.ip_address = record.ip_address;
        machine.owner = record.owner;
        machine.description = record.description;
        machine.updated_at = Utc::now();
        Ok(machine.clone())
    }

    async fn delete(&self, id: MachineId) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .machines
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}
