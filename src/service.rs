use std::sync::Arc;

use tracing::{debug, warn};

use crate::dispatcher::Dispatcher;
use crate::error::{InventoryError, ValidationError};
use crate::storage::MachineStore;
use crate::trigger::ThresholdTrigger;
use crate::types::{Machine, MachineDraft, MachineId, OwnerCode};

/// Machine inventory operations with threshold warnings.
///
/// Validation and store failures are returned to the caller. Warnings are
/// handed to the [`Dispatcher`] after the store confirms a mutation, and
/// their delivery never affects the result.
pub struct InventoryService {
    store: Arc<dyn MachineStore>,
    dispatcher: Arc<Dispatcher>,
    trigger: ThresholdTrigger,
}

impl InventoryService {
    pub fn new(store: Arc<dyn MachineStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            trigger: ThresholdTrigger::default(),
        }
    }

    pub fn with_trigger(mut self, trigger: ThresholdTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub async fn create_machine(&self, draft: MachineDraft) -> Result<Machine, InventoryError> {
        let record = draft.validate()?;

        let count_before = match &record.owner {
            Some(owner) => self.store.count_by_owner(owner).await?,
            None => 0,
        };

        let machine = self.store.create(record).await?;
        debug!(id = %machine.id, owner = ?machine.owner, "machine created");

        if let Some(owner) = &machine.owner {
            if let Some(notification) = self.trigger.on_created(owner, count_before) {
                self.dispatcher.fire_and_forget(notification).await;
            }
        }

        Ok(machine)
    }

    pub async fn list_machines(&self) -> Result<Vec<Machine>, InventoryError> {
        Ok(self.store.list().await?)
    }

    pub async fn get_machine(&self, id: MachineId) -> Result<Machine, InventoryError> {
        ensure_valid_id(id)?;
        Ok(self.store.get(id).await?)
    }

    pub async fn machines_for_owner(&self, code: &str) -> Result<Vec<Machine>, InventoryError> {
        let owner = OwnerCode::parse(code)?;
        Ok(self.store.by_owner(&owner).await?)
    }

    /// Replace a machine's fields. Moving it to a different owner
    /// re-evaluates the threshold for the new owner.
    pub async fn update_machine(
        &self,
        id: MachineId,
        draft: MachineDraft,
    ) -> Result<Machine, InventoryError> {
        ensure_valid_id(id)?;
        let record = draft.validate()?;
        let existing = self.store.get(id).await?;

        let machine = self.store.update(id, record).await?;
        debug!(id = %machine.id, owner = ?machine.owner, "machine updated");

        if existing.owner != machine.owner {
            if let Some(owner) = &machine.owner {
                self.evaluate_reassignment(existing.owner.as_ref(), owner).await;
            }
        }

        Ok(machine)
    }

    pub async fn delete_machine(&self, id: MachineId) -> Result<(), InventoryError> {
        ensure_valid_id(id)?;
        self.store.get(id).await?;
        self.store.delete(id).await?;
        debug!(id = %id, "machine deleted");
        Ok(())
    }

    async fn evaluate_reassignment(&self, previous: Option<&OwnerCode>, owner: &OwnerCode) {
        let count = match self.store.count_by_owner(owner).await {
            Ok(count) => count,
            Err(err) => {
                warn!(owner = %owner, error = %err, "failed to count machines after reassignment");
                return;
            }
        };

        if let Some(notification) = self.trigger.on_reassigned(previous, Some(owner), count) {
            self.dispatcher.fire_and_forget(notification).await;
        }
    }
}

fn ensure_valid_id(id: MachineId) -> Result<(), ValidationError> {
    if id.0 == 0 {
        return Err(ValidationError::InvalidId);
    }
    Ok(())
}
