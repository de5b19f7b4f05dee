//! Validation error types.

use serde::Serialize;
use std::collections::BTreeMap;

/// A single field validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    /// Name of the rule that failed (`required`, `unique`, ...).
    pub code: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
        }
    }
}

/// Every failure of one `validate()` run, in the order rules ran.
///
/// Empty means the data is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub items: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn push(&mut self, err: ValidationError) {
        self.items.push(err);
    }

    pub fn extend(&mut self, other: Self) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.items.iter()
    }

    /// Messages for `field`, in rule order.
    pub fn get(&self, field: &str) -> Vec<&str> {
        self.items
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.message.as_str())
            .collect()
    }

    pub fn first(&self, field: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// Fields with at least one failure, in first-failure order.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for err in &self.items {
            if !fields.contains(&err.field.as_str()) {
                fields.push(&err.field);
            }
        }
        fields
    }

    /// All messages flattened, grouped per field.
    pub fn join(&self, separator: &str) -> String {
        self.fields()
            .into_iter()
            .flat_map(|field| self.get(field))
            .collect::<Vec<_>>()
            .join(separator)
    }

    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for err in &self.items {
            map.entry(err.field.clone())
                .or_default()
                .push(err.message.clone());
        }
        map
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.push(ValidationError::new("username", "min", "This field must be at least 3 characters"));
        errors.push(ValidationError::new("email", "required", "This field is required"));
        errors.push(ValidationError::new("username", "alpha", "This field must contain only letters"));
        errors
    }

    #[test]
    fn groups_per_field_in_first_failure_order() {
        let errors = sample();
        assert_eq!(errors.fields(), vec!["username", "email"]);
        assert_eq!(errors.get("username").len(), 2);
        assert_eq!(errors.first("email"), Some("This field is required"));
        assert_eq!(errors.first("phone"), None);
        assert_eq!(
            errors.join(", "),
            "This field must be at least 3 characters, This field must contain only letters, \
             This field is required"
        );
    }

    #[test]
    fn empty_is_valid() {
        let errors = ValidationErrors::new();
        assert!(errors.is_empty());
        assert!(!errors.has_errors());
        assert_eq!(errors.join(", "), "");
    }

    #[test]
    fn serializes_items() {
        let mut errors = ValidationErrors::new();
        errors.push(ValidationError::new("email", "email", "Please enter a valid email address"));
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "items": [{
                    "field": "email",
                    "code": "email",
                    "message": "Please enter a valid email address"
                }]
            })
        );
    }

    #[test]
    fn to_map_collects_messages() {
        let map = sample().to_map();
        assert_eq!(map["username"].len(), 2);
        assert_eq!(map["email"], vec!["This field is required".to_string()]);
    }
}
