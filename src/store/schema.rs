use super::ResourceStore;
use crate::backend::StorageBackend;
use crate::error::StoreError;
use crate::schema::{Field, ResourceType, Schema, SchemaError};
use uuid::Uuid;

impl<B: StorageBackend> ResourceStore<B> {
    /// Saves the default Schema of every type the account lacks. Returns the
    /// account's Schemas, existing ones untouched.
    ///
    /// # Errors
    ///
    /// Storage failures, or a catalog whose default Schemas do not validate.
    pub fn provision_account(&self, account_id: Uuid) -> Result<Vec<Schema>, StoreError> {
        self.backend.transaction(|tx| {
            let mut schemas = Vec::with_capacity(ResourceType::ALL.len());
            for resource_type in ResourceType::ALL {
                if let Some(existing) = tx.read_schema(account_id, resource_type)? {
                    schemas.push(existing);
                    continue;
                }
                let schema = self.registry.default_schema(account_id, resource_type);
                self.registry.validate(&schema)?;
                tx.save_schema(&schema)?;
                log::info!("provisioned {resource_type} schema for account {account_id}");
                schemas.push(schema);
            }
            Ok(schemas)
        })
    }

    /// Appends a Field to a Schema, inside the named section when given.
    /// Existing Resources read the new field as empty.
    ///
    /// # Errors
    ///
    /// [`StoreError::Schema`] when the name is taken, the section does not
    /// exist or a template field does not match its template.
    pub fn add_field(
        &self,
        account_id: Uuid,
        resource_type: ResourceType,
        field: Field,
        section: Option<&str>,
    ) -> Result<Schema, StoreError> {
        self.backend.transaction(|tx| {
            let mut schema = self.schema_in(tx, account_id, resource_type)?;
            let name = field.name.clone();
            match section {
                Some(section) => schema
                    .sections
                    .iter_mut()
                    .find(|s| s.name == section)
                    .ok_or_else(|| SchemaError::SectionNotFound(section.to_string()))?
                    .fields
                    .push(field),
                None => schema.fields.push(field),
            }
            self.registry.validate(&schema)?;
            tx.save_schema(&schema)?;
            log::info!("added field {name:?} to {resource_type} schema of account {account_id}");
            Ok(schema)
        })
    }
}
