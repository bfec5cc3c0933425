use super::{Cascade, ResourceStore};
use crate::backend::StorageBackend;
use crate::error::StoreError;
use crate::resource::{Cost, Resource};
use uuid::Uuid;

impl<B: StorageBackend> ResourceStore<B> {
    /// Appends a Cost row and re-derives the itemized costs and total.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the Resource is absent or not the account's.
    pub fn create_cost(&self, account_id: Uuid, resource_id: Uuid, cost: Cost) -> Result<Resource, StoreError> {
        self.backend.transaction(|tx| {
            self.load_owned(tx, account_id, resource_id)?;
            let cost = tx.insert_cost(resource_id, &cost)?;
            log::debug!("cost {:?} added to {resource_id}", cost.name);
            self.costs_changed(tx, account_id, resource_id)
        })
    }

    /// Replaces the Cost row with `cost.id`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the Resource or the row is missing.
    pub fn update_cost(&self, account_id: Uuid, resource_id: Uuid, cost: Cost) -> Result<Resource, StoreError> {
        self.backend.transaction(|tx| {
            self.load_owned(tx, account_id, resource_id)?;
            if cost.id.is_none() || !tx.update_cost(resource_id, &cost)? {
                return Err(StoreError::not_found(format!("cost {:?} of resource {resource_id}", cost.id)));
            }
            self.costs_changed(tx, account_id, resource_id)
        })
    }

    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the Resource or the row is missing.
    pub fn delete_cost(&self, account_id: Uuid, resource_id: Uuid, cost_id: Uuid) -> Result<Resource, StoreError> {
        self.backend.transaction(|tx| {
            self.load_owned(tx, account_id, resource_id)?;
            if !tx.delete_cost(resource_id, cost_id)? {
                return Err(StoreError::not_found(format!("cost {cost_id} of resource {resource_id}")));
            }
            self.costs_changed(tx, account_id, resource_id)
        })
    }

    fn costs_changed(&self, tx: &B, account_id: Uuid, resource_id: Uuid) -> Result<Resource, StoreError> {
        let (schema, resource) = self.load_owned(tx, account_id, resource_id)?;
        self.apply(tx, &schema, &resource, Vec::new(), true, Cascade::FULL)
    }
}
