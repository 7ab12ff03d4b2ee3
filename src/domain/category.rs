use serde::{Deserialize, Serialize};

use super::common::{Identifiable, TransactionKind, UserOwned};

/// User-defined label classifying transactions, optionally nested one level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl Category {
    pub fn new(name: impl Into<String>, kind: TransactionKind) -> Self {
        Self {
            id: String::new(),
            user_id: String::new(),
            name: name.into(),
            kind,
            parent_id: None,
        }
    }

    pub fn child_of(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl Identifiable for Category {
    fn id(&self) -> &str {
        &self.id
    }
}

impl UserOwned for Category {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn set_user_id(&mut self, user_id: String) {
        self.user_id = user_id;
    }
}

/// A top-level category together with its direct subcategories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup {
    pub parent: Category,
    pub subcategories: Vec<Category>,
}

impl CategoryGroup {
    /// Whether the parent or any subcategory name contains `needle` (already lowercased).
    pub(crate) fn matches(&self, needle: &str) -> bool {
        self.parent.name.to_lowercase().contains(needle)
            || self
                .subcategories
                .iter()
                .any(|sub| sub.name.to_lowercase().contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_categories_serialize_null_parent() {
        let category = Category::new("Food", TransactionKind::Expense);
        let value = serde_json::to_value(&category).unwrap();
        assert!(value["parentId"].is_null());
        assert_eq!(value["type"], "expense");
    }

    #[test]
    fn group_matches_on_subcategory_name() {
        let parent = Category::new("Transport", TransactionKind::Expense);
        let group = CategoryGroup {
            subcategories: vec![Category::new("Taxi", TransactionKind::Expense).child_of("p")],
            parent,
        };
        assert!(group.matches("tax"));
        assert!(group.matches("trans"));
        assert!(!group.matches("food"));
    }
}
