//! Field and option resolution over a [`Schema`].
//!
//! The fallible lookups (`get_field`, `get_field_option`) serve ad-hoc refs
//! whose absence is a runtime condition. The `expect_*` lookups serve template
//! refs: a template field missing from an account's Schema is a configuration
//! bug, so they panic instead of returning an error.

use super::{Field, FieldRef, OptionRef, Schema, SchemaOption, TemplateId};
use std::fmt;

/// Schema lookup and validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// No field matches the ref
    FieldNotFound(FieldRef),
    /// The field exists but has no option matching the ref
    OptionNotFound { field: String, option: OptionRef },
    /// A field names a template the registry does not know
    UnknownTemplate(TemplateId),
    /// A template field's type or options diverge from its template
    TemplateMismatch { field: String, template: TemplateId, reason: String },
    /// Two options of one field share a name
    DuplicateOptionName { field: String, option: String },
    /// Two fields of one schema share a name
    DuplicateFieldName(String),
    /// No section of the schema has this name
    SectionNotFound(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::FieldNotFound(field) => write!(f, "Field not found: {field}"),
            SchemaError::OptionNotFound { field, option } => {
                write!(f, "Option not found: {option} in field {field:?}")
            }
            SchemaError::UnknownTemplate(template) => write!(f, "Unknown template: {template}"),
            SchemaError::TemplateMismatch { field, template, reason } => {
                write!(f, "Field {field:?} does not match template {template}: {reason}")
            }
            SchemaError::DuplicateOptionName { field, option } => {
                write!(f, "Duplicate option {option:?} in field {field:?}")
            }
            SchemaError::DuplicateFieldName(name) => write!(f, "Duplicate field name {name:?}"),
            SchemaError::SectionNotFound(name) => write!(f, "Section not found: {name:?}"),
        }
    }
}

impl std::error::Error for SchemaError {}

impl Schema {
    /// Resolves a field by template id, field id or name.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::FieldNotFound`] if nothing matches.
    pub fn get_field(&self, field_ref: impl Into<FieldRef>) -> Result<&Field, SchemaError> {
        let field_ref = field_ref.into();
        let found = match &field_ref {
            FieldRef::Template(template_id) => self
                .all_fields()
                .find(|f| f.template_id.as_ref() == Some(template_id)),
            FieldRef::Id(id) => self.all_fields().find(|f| f.id == *id),
            FieldRef::Name(name) => self.all_fields().find(|f| f.name == *name),
        };
        found.ok_or(SchemaError::FieldNotFound(field_ref))
    }

    /// Resolves a field that must exist.
    ///
    /// # Panics
    ///
    /// Panics if the field is missing; callers use this only after an
    /// `implements` guard or for template refs the schema is required to carry.
    pub fn expect_field(&self, field_ref: impl Into<FieldRef>) -> &Field {
        match self.get_field(field_ref) {
            Ok(field) => field,
            Err(err) => panic!("{} schema {}: {err}", self.resource_type, self.id),
        }
    }

    /// Resolves an option within a field.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::FieldNotFound`] or [`SchemaError::OptionNotFound`].
    pub fn get_field_option(
        &self,
        field_ref: impl Into<FieldRef>,
        option_ref: impl Into<OptionRef>,
    ) -> Result<&SchemaOption, SchemaError> {
        let field = self.get_field(field_ref)?;
        let option_ref = option_ref.into();
        let found = match &option_ref {
            OptionRef::Template(template_id) => field
                .options
                .iter()
                .find(|o| o.template_id.as_ref() == Some(template_id)),
            OptionRef::Id(id) => field.options.iter().find(|o| o.id == *id),
            OptionRef::Name(name) => field.options.iter().find(|o| o.name == *name),
        };
        found.ok_or_else(|| SchemaError::OptionNotFound {
            field: field.name.clone(),
            option: option_ref,
        })
    }

    /// Resolves an option that must exist.
    ///
    /// # Panics
    ///
    /// Panics if the field or option is missing.
    pub fn expect_field_option(
        &self,
        field_ref: impl Into<FieldRef>,
        option_ref: impl Into<OptionRef>,
    ) -> &SchemaOption {
        match self.get_field_option(field_ref, option_ref) {
            Ok(option) => option,
            Err(err) => panic!("{} schema {}: {err}", self.resource_type, self.id),
        }
    }

    /// True iff every ref resolves to a field of this schema.
    pub fn implements<I>(&self, refs: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<FieldRef>,
    {
        refs.into_iter().all(|r| self.get_field(r).is_ok())
    }

    /// Checks the per-schema naming invariants: field names unique, option
    /// names unique within each field.
    ///
    /// # Errors
    ///
    /// Returns the first duplicate found.
    pub fn check_names(&self) -> Result<(), SchemaError> {
        let mut seen = std::collections::HashSet::new();
        for field in self.all_fields() {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateFieldName(field.name.clone()));
            }
            let mut options = std::collections::HashSet::new();
            for option in &field.options {
                if !options.insert(option.name.as_str()) {
                    return Err(SchemaError::DuplicateOptionName {
                        field: field.name.clone(),
                        option: option.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ResourceType, Section};
    use crate::value::FieldType;
    use uuid::Uuid;

    fn job_schema() -> Schema {
        let mut status = Field::new("Job Status", FieldType::Select)
            .with_option(SchemaOption::new("Planned"))
            .with_option(SchemaOption {
                template_id: Some(TemplateId::IN_PROCESS),
                ..SchemaOption::new("In Process")
            });
        status.template_id = Some(TemplateId::JOB_STATUS);
        Schema::new(Uuid::new_v4(), ResourceType::Job)
            .with_section(Section {
                fields: vec![status],
                ..Section::new("Status")
            })
            .with_field(Field::new("Hours", FieldType::Number))
    }

    #[test]
    fn test_get_field_by_each_ref_kind() {
        let schema = job_schema();
        let hours_id = schema.expect_field("Hours").id;
        assert_eq!(schema.get_field(hours_id).unwrap().name, "Hours");
        assert_eq!(schema.get_field(TemplateId::JOB_STATUS).unwrap().name, "Job Status");
        assert!(matches!(
            schema.get_field("Missing"),
            Err(SchemaError::FieldNotFound(FieldRef::Name(_)))
        ));
    }

    #[test]
    fn test_get_field_option() {
        let schema = job_schema();
        let option = schema
            .get_field_option(TemplateId::JOB_STATUS, TemplateId::IN_PROCESS)
            .unwrap();
        assert_eq!(option.name, "In Process");
        assert!(matches!(
            schema.get_field_option(TemplateId::JOB_STATUS, "Done"),
            Err(SchemaError::OptionNotFound { .. })
        ));
    }

    #[test]
    fn test_implements_requires_every_ref() {
        let schema = job_schema();
        assert!(schema.implements([TemplateId::JOB_STATUS]));
        assert!(!schema.implements([TemplateId::JOB_STATUS, TemplateId::START_DATE]));
        assert!(schema.implements(Vec::<FieldRef>::new()));
    }

    #[test]
    #[should_panic(expected = "Field not found")]
    fn test_expect_field_panics_on_missing_template() {
        job_schema().expect_field(TemplateId::TOTAL_COST);
    }

    #[test]
    fn test_check_names_rejects_duplicate_options() {
        let schema = Schema::new(Uuid::new_v4(), ResourceType::Job).with_field(
            Field::new("Stage", FieldType::Select)
                .with_option(SchemaOption::new("A"))
                .with_option(SchemaOption::new("A")),
        );
        assert!(matches!(
            schema.check_names(),
            Err(SchemaError::DuplicateOptionName { .. })
        ));
    }
}
