//! Read-only view over a committed Resource.

use super::{Cost, FieldValues, Resource};
use crate::schema::Schema;
use crate::value::ValueData;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct ResourceReader<'a> {
    schema: &'a Schema,
    resource: &'a Resource,
}

impl<'a> ResourceReader<'a> {
    pub fn new(schema: &'a Schema, resource: &'a Resource) -> Self {
        debug_assert_eq!(schema.resource_type, resource.resource_type);
        Self { schema, resource }
    }

    pub fn resource(&self) -> &'a Resource {
        self.resource
    }

    pub fn costs(&self) -> &'a [Cost] {
        &self.resource.costs
    }
}

impl FieldValues for ResourceReader<'_> {
    fn schema(&self) -> &Schema {
        self.schema
    }

    fn data(&self, field_id: Uuid) -> Option<&ValueData> {
        self.resource.field(field_id).map(|f| &f.value.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceRecord;
    use crate::schema::{ResourceType, TemplateId, TemplateRegistry};
    use crate::value::Value;
    use chrono::NaiveDate;

    #[test]
    fn test_reader_three_states() {
        let schema = TemplateRegistry::standard().default_schema(Uuid::new_v4(), ResourceType::Bill);
        let record = ResourceRecord {
            id: Uuid::new_v4(),
            account_id: schema.account_id,
            resource_type: ResourceType::Bill,
            key: 1,
            template_id: None,
        };
        let invoice_date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let field_id = schema.expect_field(TemplateId::INVOICE_DATE).id;
        let mut resource = Resource::hydrate(record, &schema, [(field_id, Value::date(invoice_date))], Vec::new());
        let reader = ResourceReader::new(&schema, &resource);

        assert_eq!(reader.get_date(TemplateId::INVOICE_DATE), Some(Some(invoice_date)));
        assert_eq!(reader.get_number(TemplateId::PAYMENT_TERMS), Some(None));
        assert_eq!(reader.get_number(TemplateId::HOURS), None);

        resource.fields.retain(|f| f.field_id != field_id);
        let reader = ResourceReader::new(&schema, &resource);
        assert_eq!(reader.get_date(TemplateId::INVOICE_DATE), None);
    }
}
