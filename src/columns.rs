use std::sync::LazyLock;

use regex::Regex;
use tracing::{trace, warn};

use crate::record::FIXED_FIELDS;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static pattern"));

/// How a record field is projected into the table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub key: String,
    pub label: String,
    pub visible: bool,
    pub editable: bool,
}

impl ColumnSpec {
    pub fn new(key: impl Into<String>, label: impl Into<String>, visible: bool) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            visible,
            editable: true,
        }
    }
}

/// Columns of a fresh table: the first four fixed fields are shown, department and location hidden.
pub fn default_columns() -> Vec<ColumnSpec> {
    FIXED_FIELDS
        .iter()
        .enumerate()
        .map(|(idx, key)| {
            let mut label = key.to_string();
            label[..1].make_ascii_uppercase();
            ColumnSpec::new(*key, label, idx < 4)
        })
        .collect()
}

pub fn visible_columns(columns: &[ColumnSpec]) -> Vec<&ColumnSpec> {
    columns.iter().filter(|c| c.visible).collect()
}

pub fn editable_columns(columns: &[ColumnSpec]) -> Vec<&ColumnSpec> {
    columns.iter().filter(|c| c.editable).collect()
}

/// Lowercase, every whitespace run replaced by a single `_`.
pub fn derive_key(label: &str) -> String {
    WHITESPACE_RUN
        .replace_all(&label.to_lowercase(), "_")
        .into_owned()
}

/// Flips the visibility of the column at `index`. Returns false if there is no such column.
pub fn toggle_visibility(columns: &mut [ColumnSpec], index: usize) -> bool {
    match columns.get_mut(index) {
        Some(column) => {
            column.visible = !column.visible;
            trace!("Column {} visible: {}", column.key, column.visible);
            true
        }
        None => false,
    }
}

/// Appends a visible, editable column for `label`. Returns false when the label or
/// the derived key is empty. Key collisions are accepted.
pub fn add_column(columns: &mut Vec<ColumnSpec>, label: &str) -> bool {
    let key = derive_key(label);
    if label.is_empty() || key.is_empty() {
        return false;
    }
    if columns.iter().any(|c| c.key == key) {
        warn!("Adding column \"{label}\" with already used key {key}");
    }
    columns.push(ColumnSpec::new(key, label, true));
    true
}

/// Swaps the column at `index` with its neighbour `offset` positions away.
pub fn move_column(columns: &mut [ColumnSpec], index: usize, offset: isize) -> bool {
    let Some(target) = index.checked_add_signed(offset) else {
        return false;
    };
    if index >= columns.len() || target >= columns.len() {
        return false;
    }
    columns.swap(index, target);
    true
}

pub fn column_order(columns: &[ColumnSpec]) -> Vec<String> {
    columns.iter().map(|c| c.key.clone()).collect()
}

/// Arranges columns by `order`. Columns whose key is not listed keep their relative order after the listed ones.
pub fn order_columns(columns: Vec<ColumnSpec>, order: &[String]) -> Vec<ColumnSpec> {
    let mut remaining: Vec<Option<ColumnSpec>> = columns.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(remaining.len());
    for key in order {
        if let Some(slot) = remaining
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|c| &c.key == key))
        {
            ordered.extend(slot.take());
        }
    }
    ordered.extend(remaining.into_iter().flatten());
    ordered
}
