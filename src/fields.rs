//! Custom field lookup on task records.

use crate::types::CustomField;

/// Find the enum value of the field called `name` (case-insensitive).
///
/// Returns the option name lower-cased, or `None` if the field is missing or
/// has no option selected. When several fields share the name, the first one
/// in tracker order wins, even if it is unset.
pub fn enum_value(fields: &[CustomField], name: &str) -> Option<String> {
    let field = fields
        .iter()
        .find(|f| f.name.to_lowercase() == name.to_lowercase())?;
    let option = field.enum_value.as_ref()?;
    let value = option.name.trim().to_lowercase();
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EnumOption;

    fn unset(name: &str) -> CustomField {
        CustomField {
            gid: None,
            name: name.to_string(),
            enum_value: None,
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let fields = vec![CustomField::with_option("Stage", "In Progress")];
        assert_eq!(enum_value(&fields, "stage"), Some("in progress".to_string()));
        assert_eq!(enum_value(&fields, "STAGE"), Some("in progress".to_string()));
    }

    #[test]
    fn test_missing_field() {
        let fields = vec![CustomField::with_option("Stage", "Done")];
        assert_eq!(enum_value(&fields, "priority"), None);
        assert_eq!(enum_value(&[], "priority"), None);
    }

    #[test]
    fn test_unset_value() {
        let fields = vec![unset("Priority")];
        assert_eq!(enum_value(&fields, "priority"), None);

        let blank = vec![CustomField {
            gid: None,
            name: "Priority".to_string(),
            enum_value: Some(EnumOption {
                gid: None,
                name: "  ".to_string(),
            }),
        }];
        assert_eq!(enum_value(&blank, "priority"), None);
    }

    #[test]
    fn test_first_match_wins() {
        let fields = vec![
            CustomField::with_option("priority", "Low"),
            CustomField::with_option("Priority", "High"),
        ];
        assert_eq!(enum_value(&fields, "priority"), Some("low".to_string()));

        // An unset first match shadows later ones.
        let fields = vec![unset("Priority"), CustomField::with_option("Priority", "High")];
        assert_eq!(enum_value(&fields, "priority"), None);
    }
}
