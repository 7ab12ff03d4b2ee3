use std::collections::HashSet;

use crate::domain::{Category, CategoryGroup, TransactionKind};
use crate::errors::ValidationError;

pub struct CategoryService;

impl CategoryService {
    /// Checks a new category against its (already fetched) parent.
    pub fn validate(category: &Category, parent: Option<&Category>) -> Result<(), ValidationError> {
        if category.name.trim().is_empty() {
            return Err(ValidationError::BlankName);
        }
        let Some(parent) = parent else {
            return Ok(());
        };
        if !category.id.is_empty() && parent.id == category.id {
            return Err(ValidationError::SelfParent);
        }
        if !parent.is_top_level() {
            return Err(ValidationError::NestedTooDeep);
        }
        if parent.kind != category.kind {
            return Err(ValidationError::CategoryTypeMismatch);
        }
        Ok(())
    }

    /// Builds parent/subcategory groups, one per distinct top-level category.
    ///
    /// Subcategories whose type differs from their parent are left out.
    pub fn group(categories: &[Category]) -> Vec<CategoryGroup> {
        let mut seen = HashSet::new();
        categories
            .iter()
            .filter(|category| category.is_top_level() && seen.insert(category.id.as_str()))
            .map(|parent| CategoryGroup {
                parent: parent.clone(),
                subcategories: categories
                    .iter()
                    .filter(|sub| {
                        sub.parent_id.as_deref() == Some(parent.id.as_str())
                            && sub.kind == parent.kind
                    })
                    .cloned()
                    .collect(),
            })
            .collect()
    }

    pub fn group_by_type(categories: &[Category], kind: TransactionKind) -> Vec<CategoryGroup> {
        let of_kind: Vec<Category> = categories
            .iter()
            .filter(|category| category.kind == kind)
            .cloned()
            .collect();
        Self::group(&of_kind)
    }

    /// Case-insensitive search. A matching parent keeps its whole group; otherwise
    /// only the matching subcategories are kept.
    pub fn filter_groups(groups: &[CategoryGroup], query: &str) -> Vec<CategoryGroup> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return groups.to_vec();
        }
        groups
            .iter()
            .filter(|group| group.matches(&needle))
            .map(|group| {
                if group.parent.name.to_lowercase().contains(&needle) {
                    group.clone()
                } else {
                    CategoryGroup {
                        parent: group.parent.clone(),
                        subcategories: group
                            .subcategories
                            .iter()
                            .filter(|sub| sub.name.to_lowercase().contains(&needle))
                            .cloned()
                            .collect(),
                    }
                }
            })
            .collect()
    }
}
