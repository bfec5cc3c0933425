//! In-process storage.
//!
//! All state sits behind one lock; a transaction holds a separate writer
//! lock for its whole duration, snapshots the state on entry and restores
//! the snapshot if the closure fails.

use super::{SearchQuery, StorageBackend};
use crate::error::StoreError;
use crate::query::similarity::similarity;
use crate::query::{Direction, ResourceQuery};
use crate::resource::{Cost, ResourceRecord};
use crate::schema::{ResourceType, Schema, TemplateId};
use crate::value::{Scalar, Value, ValueData};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct State {
    schemas: HashMap<(Uuid, ResourceType), Schema>,
    resources: HashMap<Uuid, ResourceRecord>,
    values: HashMap<Uuid, HashMap<Uuid, Value>>,
    costs: HashMap<Uuid, Vec<Cost>>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    writer: Mutex<()>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Storage("memory backend lock poisoned".to_string()))
    }

    /// Number of stored Resources across all accounts.
    pub fn resource_count(&self) -> usize {
        self.state().map(|s| s.resources.len()).unwrap_or_default()
    }
}

fn sort_scalars(a: &Option<Scalar>, b: &Option<Scalar>, direction: Direction) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ordering = a.compare(b).unwrap_or(Ordering::Equal);
            match direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl StorageBackend for MemoryBackend {
    fn transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Self) -> Result<T, StoreError>,
    {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Storage("memory backend writer lock poisoned".to_string()))?;
        let snapshot = self.state()?.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                log::debug!("rolling back memory transaction: {err}");
                *self.state()? = snapshot;
                Err(err)
            }
        }
    }

    fn read_schema(&self, account_id: Uuid, resource_type: ResourceType) -> Result<Option<Schema>, StoreError> {
        Ok(self.state()?.schemas.get(&(account_id, resource_type)).cloned())
    }

    fn save_schema(&self, schema: &Schema) -> Result<(), StoreError> {
        self.state()?
            .schemas
            .insert((schema.account_id, schema.resource_type), schema.clone());
        Ok(())
    }

    fn insert_resource(
        &self,
        account_id: Uuid,
        resource_type: ResourceType,
        template_id: Option<&TemplateId>,
    ) -> Result<ResourceRecord, StoreError> {
        let mut state = self.state()?;
        let key = state
            .resources
            .values()
            .filter(|r| r.account_id == account_id && r.resource_type == resource_type)
            .map(|r| r.key)
            .max()
            .unwrap_or(0)
            + 1;
        let record = ResourceRecord {
            id: Uuid::new_v4(),
            account_id,
            resource_type,
            key,
            template_id: template_id.cloned(),
        };
        state.resources.insert(record.id, record.clone());
        Ok(record)
    }

    fn read_record(&self, id: Uuid) -> Result<Option<ResourceRecord>, StoreError> {
        Ok(self.state()?.resources.get(&id).cloned())
    }

    fn read_record_by_key(
        &self,
        account_id: Uuid,
        resource_type: ResourceType,
        key: i64,
    ) -> Result<Option<ResourceRecord>, StoreError> {
        Ok(self
            .state()?
            .resources
            .values()
            .find(|r| r.account_id == account_id && r.resource_type == resource_type && r.key == key)
            .cloned())
    }

    fn delete_resource(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        state.values.remove(&id);
        state.costs.remove(&id);
        Ok(state.resources.remove(&id).is_some())
    }

    fn read_values(&self, resource_id: Uuid) -> Result<Vec<(Uuid, Value)>, StoreError> {
        Ok(self
            .state()?
            .values
            .get(&resource_id)
            .map(|values| values.iter().map(|(id, v)| (*id, v.clone())).collect())
            .unwrap_or_default())
    }

    fn upsert_value(&self, resource_id: Uuid, field_id: Uuid, value: &Value) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if !state.resources.contains_key(&resource_id) {
            return Err(StoreError::not_found(format!("resource {resource_id}")));
        }
        state
            .values
            .entry(resource_id)
            .or_default()
            .insert(field_id, value.clone());
        Ok(())
    }

    fn read_costs(&self, resource_id: Uuid) -> Result<Vec<Cost>, StoreError> {
        Ok(self.state()?.costs.get(&resource_id).cloned().unwrap_or_default())
    }

    fn insert_cost(&self, resource_id: Uuid, cost: &Cost) -> Result<Cost, StoreError> {
        let mut state = self.state()?;
        if !state.resources.contains_key(&resource_id) {
            return Err(StoreError::not_found(format!("resource {resource_id}")));
        }
        let cost = Cost {
            id: Some(Uuid::new_v4()),
            ..cost.clone()
        };
        state.costs.entry(resource_id).or_default().push(cost.clone());
        Ok(cost)
    }

    fn update_cost(&self, resource_id: Uuid, cost: &Cost) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        let existing = state
            .costs
            .get_mut(&resource_id)
            .and_then(|costs| costs.iter_mut().find(|c| c.id.is_some() && c.id == cost.id));
        match existing {
            Some(existing) => {
                *existing = cost.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_cost(&self, resource_id: Uuid, cost_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        let Some(costs) = state.costs.get_mut(&resource_id) else {
            return Ok(false);
        };
        let before = costs.len();
        costs.retain(|c| c.id != Some(cost_id));
        Ok(costs.len() != before)
    }

    fn query_ids(&self, query: &ResourceQuery) -> Result<Vec<Uuid>, StoreError> {
        let state = self.state()?;
        let no_values = HashMap::new();
        let mut rows: Vec<(&ResourceRecord, Vec<Option<Scalar>>)> = state
            .resources
            .values()
            .filter(|r| r.account_id == query.account_id && r.resource_type == query.resource_type)
            .filter_map(|record| {
                let values = state.values.get(&record.id).unwrap_or(&no_values);
                let data = |field_id: &Uuid| values.get(field_id).map(|v| &v.data);
                let matched = query
                    .predicates
                    .iter()
                    .all(|p| p.matches(data(&p.field_id)));
                matched.then(|| {
                    let sort_keys = query
                        .order_by
                        .iter()
                        .map(|term| data(&term.field_id).and_then(ValueData::scalar))
                        .collect();
                    (record, sort_keys)
                })
            })
            .collect();

        rows.sort_by(|(a, a_keys), (b, b_keys)| {
            query
                .order_by
                .iter()
                .enumerate()
                .map(|(i, term)| sort_scalars(&a_keys[i], &b_keys[i], term.direction))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| b.key.cmp(&a.key))
        });
        Ok(rows.into_iter().map(|(record, _)| record.id).collect())
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<Uuid>, StoreError> {
        let state = self.state()?;
        let input = query.input.trim().to_lowercase();
        let mut scored: Vec<(f64, i64, Uuid)> = state
            .resources
            .values()
            .filter(|r| r.account_id == query.account_id && r.resource_type == query.resource_type)
            .filter_map(|record| {
                let values = state.values.get(&record.id)?;
                query
                    .field_ids
                    .iter()
                    .filter_map(|field_id| match values.get(field_id).map(|v| &v.data) {
                        Some(ValueData::String(Some(text))) if !text.is_empty() => Some(text),
                        _ => None,
                    })
                    .filter_map(|text| {
                        let score = similarity(text, &input);
                        let hit = if query.exact {
                            text.to_lowercase() == input
                        } else {
                            score >= query.threshold || text.to_lowercase().contains(&input)
                        };
                        hit.then_some(score)
                    })
                    .max_by(f64::total_cmp)
                    .map(|score| (score, record.key, record.id))
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(b.1.cmp(&a.1)));
        Ok(scored
            .into_iter()
            .take(query.limit)
            .map(|(_, _, id)| id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CompareOp, OrderTerm, Predicate};
    use crate::value::ValueColumn;
    use rust_decimal::Decimal;

    fn backend_with_lines(totals: &[Option<i64>]) -> (MemoryBackend, Uuid, Uuid, Vec<Uuid>) {
        let backend = MemoryBackend::new();
        let account = Uuid::new_v4();
        let field = Uuid::new_v4();
        let ids = totals
            .iter()
            .map(|total| {
                let record = backend.insert_resource(account, ResourceType::Line, None).unwrap();
                if let Some(total) = total {
                    backend
                        .upsert_value(record.id, field, &Value::number(*total))
                        .unwrap();
                }
                record.id
            })
            .collect();
        (backend, account, field, ids)
    }

    #[test]
    fn test_keys_are_sequential_per_type() {
        let backend = MemoryBackend::new();
        let account = Uuid::new_v4();
        let a = backend.insert_resource(account, ResourceType::Bill, None).unwrap();
        let b = backend.insert_resource(account, ResourceType::Bill, None).unwrap();
        let c = backend.insert_resource(account, ResourceType::Job, None).unwrap();
        assert_eq!((a.key, b.key, c.key), (1, 2, 1));
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let backend = MemoryBackend::new();
        let account = Uuid::new_v4();
        let result: Result<(), StoreError> = backend.transaction(|tx| {
            tx.insert_resource(account, ResourceType::Bill, None)?;
            Err(StoreError::Storage("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(backend.resource_count(), 0);
    }

    #[test]
    fn test_query_orders_with_empty_last_then_key() {
        let (backend, account, field, ids) = backend_with_lines(&[Some(5), None, Some(9), Some(5)]);
        let query = ResourceQuery {
            order_by: vec![OrderTerm {
                field_id: field,
                column: ValueColumn::Number,
                direction: Direction::Asc,
            }],
            ..ResourceQuery::all(account, ResourceType::Line)
        };
        assert_eq!(backend.query_ids(&query).unwrap(), vec![ids[3], ids[0], ids[2], ids[1]]);
    }

    #[test]
    fn test_query_filters_by_predicate() {
        let (backend, account, field, ids) = backend_with_lines(&[Some(5), None, Some(9)]);
        let query = ResourceQuery::all(account, ResourceType::Line).filter(Predicate {
            field_id: field,
            column: ValueColumn::Number,
            op: CompareOp::Gte,
            operand: Some(Scalar::Number(Decimal::from(6))),
        });
        assert_eq!(backend.query_ids(&query).unwrap(), vec![ids[2]]);
    }

    #[test]
    fn test_cost_crud() {
        let backend = MemoryBackend::new();
        let record = backend.insert_resource(Uuid::new_v4(), ResourceType::Bill, None).unwrap();
        let mut cost = backend.insert_cost(record.id, &Cost::new("Taxes", true, 0)).unwrap();
        cost.value = Decimal::TEN;
        assert!(backend.update_cost(record.id, &cost).unwrap());
        assert_eq!(backend.read_costs(record.id).unwrap()[0].value, Decimal::TEN);
        assert!(backend.delete_cost(record.id, cost.id.unwrap()).unwrap());
        assert!(backend.read_costs(record.id).unwrap().is_empty());
    }

    #[test]
    fn test_search_ranks_and_limits() {
        let backend = MemoryBackend::new();
        let account = Uuid::new_v4();
        let name = Uuid::new_v4();
        for text in ["McMaster-Carr", "Grainger", "McMaster"] {
            let record = backend.insert_resource(account, ResourceType::Vendor, None).unwrap();
            backend.upsert_value(record.id, name, &Value::text(text)).unwrap();
        }
        let mut query = SearchQuery {
            account_id: account,
            resource_type: ResourceType::Vendor,
            field_ids: vec![name],
            input: "mcmaster".to_string(),
            exact: false,
            threshold: 0.3,
            limit: 15,
        };
        assert_eq!(backend.search(&query).unwrap().len(), 2);

        query.exact = true;
        assert_eq!(backend.search(&query).unwrap().len(), 1);
    }
}
