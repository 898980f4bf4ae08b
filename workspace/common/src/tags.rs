use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validators::{validate_color, validate_slug};

/// A tag as supplied by reference-data fixtures.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct TagDefinition {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(custom(function = "validate_color"))]
    pub color: String,
    #[validate(length(min = 1, max = 50), custom(function = "validate_slug"))]
    pub slug: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_definition_from_fixture() {
        let json = r##"[
            {"name": "Breakfast", "color": "#E26C2D", "slug": "breakfast"},
            {"name": "Lunch", "color": "#49B64E", "slug": "lunch"}
        ]"##;
        let tags: Vec<TagDefinition> = serde_json::from_str(json).unwrap();
        assert_eq!(tags.len(), 2);
        assert!(tags.iter().all(|t| t.validate().is_ok()));
    }

    #[test]
    fn test_tag_definition_field_errors() {
        let tag = TagDefinition {
            name: "Dinner".to_string(),
            color: "purple".to_string(),
            slug: "dinner time".to_string(),
        };
        let errors = tag.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("color"));
        assert!(fields.contains_key("slug"));
        assert!(!fields.contains_key("name"));
    }
}
