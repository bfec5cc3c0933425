use super::ResourceStore;
use crate::backend::{SearchQuery, StorageBackend};
use crate::error::StoreError;
use crate::query::compile_json;
use crate::resource::Resource;
use crate::schema::{ResourceType, TemplateId};
use crate::value::ValueResourceRef;
use serde_json::Value as Json;
use std::time::Instant;
use uuid::Uuid;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

impl<B: StorageBackend> ResourceStore<B> {
    /// Looks Resources up by name or PO number, best match first.
    ///
    /// `exact` asks for a case-insensitive equal match; otherwise matches are
    /// ranked by trigram similarity. At most `find_limit` references are
    /// returned and blank input finds nothing.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the account has no Schema for the type.
    pub fn find_resources(
        &self,
        account_id: Uuid,
        resource_type: ResourceType,
        input: &str,
        exact: bool,
    ) -> Result<Vec<ValueResourceRef>, StoreError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Vec::new());
        }
        self.backend.transaction(|tx| {
            let schema = self.schema_in(tx, account_id, resource_type)?;
            let field_ids: Vec<Uuid> = [TemplateId::NAME, TemplateId::PO_NUMBER]
                .iter()
                .filter_map(|t| schema.get_field(t).ok())
                .map(|f| f.id)
                .collect();
            if field_ids.is_empty() {
                return Ok(Vec::new());
            }
            let ids = tx.search(&SearchQuery {
                account_id,
                resource_type,
                field_ids,
                input: input.to_string(),
                exact,
                threshold: self.config.similarity_threshold,
                limit: self.config.find_limit,
            })?;
            let mut found = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(record) = tx.read_record(id)? {
                    found.push(self.load(tx, &schema, record)?.reference());
                }
            }
            log::debug!("find {resource_type} {input:?} (exact: {exact}): {} matches", found.len());
            Ok(found)
        })
    }

    /// Lists the Resources of a type matching a JSON-Logic filter.
    ///
    /// Resources come back in `order_by` order (empty values last), then
    /// newest first.
    ///
    /// # Errors
    ///
    /// [`StoreError::Query`] if the filter or ordering does not compile
    /// against the Schema, e.g. a `var` naming no Field.
    pub fn read_resources(
        &self,
        account_id: Uuid,
        resource_type: ResourceType,
        filter: Option<&Json>,
        order_by: Option<&Json>,
    ) -> Result<Vec<Resource>, StoreError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::store_operation_span("read_resources", resource_type.as_str()).entered();

        self.backend.transaction(|tx| {
            let schema = self.schema_in(tx, account_id, resource_type)?;
            let query = match compile_json(account_id, &schema, filter, order_by) {
                Ok(query) => query,
                Err(err) => {
                    #[cfg(feature = "metrics")]
                    METRICS.record_filter_error();
                    return Err(err.into());
                }
            };

            let started = Instant::now();
            let ids = tx.query_ids(&query)?;
            log::debug!(
                "listed {} {resource_type} resources in {:?}",
                ids.len(),
                started.elapsed()
            );

            let mut resources = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(record) = tx.read_record(id)? {
                    resources.push(self.load(tx, &schema, record)?);
                }
            }
            Ok(resources)
        })
    }
}
