use std::borrow::Cow;
use std::collections::BTreeMap;

use derive_setters::Setters;

/// Names of the fields every record carries, in their default column order.
pub const FIXED_FIELDS: [&str; 6] = ["name", "email", "age", "role", "department", "location"];

/// One row of the managed table.
///
/// The six known fields are typed, columns added at runtime live in `extra`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    id: String,
    pub name: String,
    pub email: String,
    pub age: i64,
    pub role: String,
    pub department: Option<String>,
    pub location: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// String form of the value stored under `key`, `None` if the record has no such value.
    pub fn field_text(&self, key: &str) -> Option<Cow<'_, str>> {
        match key {
            "id" => Some(Cow::Borrowed(self.id.as_str())),
            "name" => Some(Cow::Borrowed(self.name.as_str())),
            "email" => Some(Cow::Borrowed(self.email.as_str())),
            "age" => Some(Cow::Owned(self.age.to_string())),
            "role" => Some(Cow::Borrowed(self.role.as_str())),
            "department" => self.department.as_deref().map(Cow::Borrowed),
            "location" => self.location.as_deref().map(Cow::Borrowed),
            other => self.extra.get(other).map(|v| Cow::Borrowed(v.as_str())),
        }
    }

    /// All present values, id first, in a stable order.
    pub fn values(&self) -> impl Iterator<Item = Cow<'_, str>> {
        ["id", "name", "email", "age", "role", "department", "location"]
            .into_iter()
            .filter_map(|key| self.field_text(key))
            .chain(self.extra.values().map(|v| Cow::Borrowed(v.as_str())))
    }

    /// Case-insensitive substring match over all values. `needle` must already be lowercase.
    pub fn contains_lowercase(&self, needle: &str) -> bool {
        needle.is_empty() || self.values().any(|v| v.to_lowercase().contains(needle))
    }

    pub fn apply(&mut self, patch: &RecordPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(email) = &patch.email {
            self.email = email.clone();
        }
        if let Some(age) = patch.age {
            self.age = age;
        }
        if let Some(role) = &patch.role {
            self.role = role.clone();
        }
        if let Some(department) = &patch.department {
            self.department = Some(department.clone());
        }
        if let Some(location) = &patch.location {
            self.location = Some(location.clone());
        }
        for (key, value) in patch.extra.iter() {
            self.extra.insert(key.clone(), value.clone());
        }
    }
}

/// Partial update of a record. Unset fields keep their current value.
#[derive(Debug, Clone, PartialEq, Default, Setters)]
#[setters(strip_option, into)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i64>,
    pub role: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    #[setters(skip)]
    pub extra: BTreeMap<String, String>,
}

impl RecordPatch {
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == RecordPatch::default()
    }
}

/// Raw text of a record as held by the edit form, keyed by field name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordDraft {
    values: BTreeMap<String, String>,
}

impl RecordDraft {
    pub fn from_record(record: &Record) -> Self {
        let mut values = BTreeMap::new();
        for key in FIXED_FIELDS {
            if let Some(value) = record.field_text(key) {
                values.insert(key.to_string(), value.into_owned());
            }
        }
        for (key, value) in record.extra.iter() {
            values.insert(key.clone(), value.clone());
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Converts the draft into a patch. Call only after the draft validated,
    /// an unparsable age is left out of the patch.
    pub fn to_patch(&self, original: &Record) -> RecordPatch {
        let mut patch = RecordPatch::default();
        for (key, value) in self.values.iter() {
            match key.as_str() {
                "id" => {}
                "name" => patch.name = Some(value.clone()),
                "email" => patch.email = Some(value.clone()),
                "age" => patch.age = value.trim().parse().ok(),
                "role" => patch.role = Some(value.clone()),
                "department" => {
                    if !value.is_empty() || original.department.is_some() {
                        patch.department = Some(value.clone())
                    }
                }
                "location" => {
                    if !value.is_empty() || original.location.is_some() {
                        patch.location = Some(value.clone())
                    }
                }
                other => {
                    if !value.is_empty() || original.extra.contains_key(other) {
                        patch = patch.with_extra(other, value.clone());
                    }
                }
            }
        }
        patch
    }
}

/// Records shown before anything is imported.
pub fn seed_records() -> Vec<Record> {
    [
        ("1", "John Doe", "john@example.com", 28, "Developer"),
        ("2", "Jane Smith", "jane@example.com", 32, "Designer"),
        ("3", "Mike Johnson", "mike@example.com", 45, "Manager"),
        ("4", "Sarah Wilson", "sarah@example.com", 29, "Developer"),
        ("5", "Tom Brown", "tom@example.com", 35, "Analyst"),
    ]
    .into_iter()
    .map(|(id, name, email, age, role)| Record {
        name: name.to_string(),
        email: email.to_string(),
        age,
        role: role.to_string(),
        ..Record::new(id)
    })
    .collect()
}
