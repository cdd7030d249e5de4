use ratatui::crossterm::event::{KeyCode, KeyEvent};
use tracing::{debug, trace};

use crate::columns::{ColumnSpec, editable_columns};
use crate::inputter::Inputter;
use crate::record::{Record, RecordDraft, RecordPatch};
use crate::validation::validate;

pub struct FormField {
    pub key: String,
    pub label: String,
    pub input: Inputter,
}

#[derive(Debug, PartialEq)]
pub enum FormOutcome {
    Editing,
    Save(RecordPatch),
    Cancel,
}

/// The edit dialog of one record. Holds the raw text of every editable column.
pub struct EditForm {
    record: Record,
    pub fields: Vec<FormField>,
    pub active: usize,
    pub errors: Vec<String>,
}

impl EditForm {
    pub fn new(record: &Record, columns: &[ColumnSpec]) -> Self {
        let draft = RecordDraft::from_record(record);
        let fields = editable_columns(columns)
            .into_iter()
            .map(|column| FormField {
                key: column.key.clone(),
                label: column.label.clone(),
                input: Inputter::with_value(draft.get(&column.key).unwrap_or_default()),
            })
            .collect();
        Self {
            record: record.clone(),
            fields,
            active: 0,
            errors: Vec::new(),
        }
    }

    pub fn record_id(&self) -> &str {
        self.record.id()
    }

    /// Fields sharing a key collapse into one draft entry; a changed field wins over an
    /// untouched one.
    pub fn draft(&self) -> RecordDraft {
        let original = RecordDraft::from_record(&self.record);
        let mut draft = RecordDraft::default();
        for field in self.fields.iter() {
            let value = field.input.value();
            let changed = value != original.get(&field.key).unwrap_or_default();
            if changed || draft.get(&field.key).is_none() {
                draft.set(field.key.as_str(), value);
            }
        }
        draft
    }

    pub fn read(&mut self, key: KeyEvent) -> FormOutcome {
        match key.code {
            KeyCode::Esc => {
                debug!("Edit of {} canceled", self.record_id());
                FormOutcome::Cancel
            }
            KeyCode::Enter => self.submit(),
            KeyCode::Tab | KeyCode::Down => {
                self.next_field();
                FormOutcome::Editing
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.previous_field();
                FormOutcome::Editing
            }
            _ => {
                if let Some(field) = self.fields.get_mut(self.active) {
                    field.input.read(key);
                }
                FormOutcome::Editing
            }
        }
    }

    fn next_field(&mut self) {
        if !self.fields.is_empty() {
            self.active = (self.active + 1) % self.fields.len();
        }
    }

    fn previous_field(&mut self) {
        if !self.fields.is_empty() {
            self.active = (self.active + self.fields.len() - 1) % self.fields.len();
        }
    }

    /// Validates the current values. On failure the form stays open with the messages set.
    fn submit(&mut self) -> FormOutcome {
        let draft = self.draft();
        let report = validate(&draft);
        if report.valid {
            self.errors.clear();
            debug!("Edit of {} is valid", self.record_id());
            FormOutcome::Save(draft.to_patch(&self.record))
        } else {
            self.errors = report.messages();
            trace!("Edit of {} rejected: {:?}", self.record_id(), self.errors);
            FormOutcome::Editing
        }
    }
}

#[cfg(test)]
mod tests {
    use ratatui::crossterm::event::KeyModifiers;

    use super::*;
    use crate::columns::default_columns;
    use crate::record::seed_records;

    fn press(form: &mut EditForm, code: KeyCode) -> FormOutcome {
        form.read(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn form_for_first_seed() -> EditForm {
        EditForm::new(&seed_records()[0], &default_columns())
    }

    #[test]
    fn fields_follow_editable_columns() {
        let mut columns = default_columns();
        columns[5].editable = false;
        let form = EditForm::new(&seed_records()[0], &columns);
        let keys: Vec<&str> = form.fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["name", "email", "age", "role", "department"]);
        assert_eq!(form.fields[0].input.value(), "John Doe");
        assert_eq!(form.fields[2].input.value(), "28");
        assert_eq!(form.fields[4].input.value(), "");
        assert_eq!(form.record_id(), "1");
    }

    #[test]
    fn tab_cycles_through_fields() {
        let mut form = form_for_first_seed();
        press(&mut form, KeyCode::BackTab);
        assert_eq!(form.active, 5);
        press(&mut form, KeyCode::Tab);
        press(&mut form, KeyCode::Tab);
        assert_eq!(form.active, 1);
    }

    #[test]
    fn invalid_values_keep_the_form_open() {
        let mut form = form_for_first_seed();
        form.active = 1;
        for _ in 0..".com".len() {
            press(&mut form, KeyCode::Backspace);
        }
        assert_eq!(press(&mut form, KeyCode::Enter), FormOutcome::Editing);
        assert_eq!(form.errors, vec!["Valid email is required".to_string()]);
    }

    #[test]
    fn valid_values_produce_a_patch() {
        let mut form = form_for_first_seed();
        form.active = 3;
        form.fields[3].input.set("Lead");
        form.errors = vec!["stale".into()];

        match press(&mut form, KeyCode::Enter) {
            FormOutcome::Save(patch) => {
                assert_eq!(patch.role.as_deref(), Some("Lead"));
                assert_eq!(patch.name.as_deref(), Some("John Doe"));
                assert_eq!(patch.age, Some(28));
                assert_eq!(patch.department, None);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(form.errors.is_empty());
    }

    #[test]
    fn edit_in_first_of_duplicate_fields_is_kept() {
        let mut columns = default_columns();
        columns.push(ColumnSpec::new("email", "Email (work)", true));
        let mut form = EditForm::new(&seed_records()[0], &columns);
        let email_fields: Vec<usize> = form
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.key == "email")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(email_fields.len(), 2);

        form.fields[email_fields[0]].input.set("new@example.com");
        assert_eq!(form.draft().get("email"), Some("new@example.com"));

        match press(&mut form, KeyCode::Enter) {
            FormOutcome::Save(patch) => {
                assert_eq!(patch.email.as_deref(), Some("new@example.com"))
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn escape_cancels() {
        let mut form = form_for_first_seed();
        press(&mut form, KeyCode::Char('x'));
        assert_eq!(press(&mut form, KeyCode::Esc), FormOutcome::Cancel);
    }
}
