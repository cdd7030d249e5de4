use std::collections::HashSet;

use tracing::{debug, trace, warn};

use crate::columns::{self, ColumnSpec};
use crate::pipeline::SortSpec;
use crate::preferences::{Preferences, Theme};
use crate::record::{Record, RecordPatch};

/// Canonical, ordered sequence of records. Ids are unique at all times.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    pub fn new(records: Vec<Record>) -> Self {
        let mut store = Self::default();
        store.set_all(records);
        store
    }

    /// Replaces every record. Of rows sharing an id only the first is kept.
    pub fn set_all(&mut self, records: Vec<Record>) {
        let mut seen = HashSet::with_capacity(records.len());
        let total = records.len();
        self.records = records
            .into_iter()
            .filter(|r| seen.insert(r.id().to_string()))
            .collect();
        if self.records.len() != total {
            warn!(
                "Dropped {} records with duplicated ids",
                total - self.records.len()
            );
        }
    }

    /// Merges `patch` into the record with `id`. Unknown ids are ignored.
    pub fn upsert(&mut self, id: &str, patch: &RecordPatch) {
        if patch.is_empty() {
            trace!("Empty update of record {id} ignored");
            return;
        }
        match self.records.iter_mut().find(|r| r.id() == id) {
            Some(record) => record.apply(patch),
            None => trace!("Update of unknown record {id} ignored"),
        }
    }

    /// Removes the record with `id`. Unknown ids are ignored.
    pub fn remove(&mut self, id: &str) {
        let before = self.records.len();
        self.records.retain(|r| r.id() != id);
        if self.records.len() == before {
            trace!("Delete of unknown record {id} ignored");
        }
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The table partition: records, columns and view state. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TableState {
    pub records: RecordStore,
    pub columns: Vec<ColumnSpec>,
    pub search_term: String,
    pub sort: Option<SortSpec>,
    pub current_page: usize,
    pub page_size: usize,
    pub editing_row: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub table: TableState,
    pub preferences: Preferences,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetData(Vec<Record>),
    SetSearchTerm(String),
    SetSortConfig(Option<SortSpec>),
    SetCurrentPage(usize),
    SetPageSize(usize),
    SetColumns(Vec<ColumnSpec>),
    ToggleColumn(usize),
    AddColumn(String),
    MoveColumn { index: usize, offset: isize },
    SetEditingRow(Option<String>),
    UpdateRow { id: String, patch: RecordPatch },
    DeleteRow(String),
    SetTheme(Theme),
    ToggleTheme,
    SetColumnOrder(Vec<String>),
}

type Listener = Box<dyn FnMut(&AppState)>;

/// Application state container. All mutations go through `dispatch`.
pub struct Store {
    state: AppState,
    listeners: Vec<Listener>,
}

impl Store {
    pub fn init(seed: Vec<Record>, preferences: Preferences, page_size: usize) -> Self {
        let columns = columns::order_columns(columns::default_columns(), &preferences.column_order);
        Self {
            state: AppState {
                table: TableState {
                    records: RecordStore::new(seed),
                    columns,
                    search_term: String::new(),
                    sort: None,
                    current_page: 1,
                    page_size: page_size.max(1),
                    editing_row: None,
                },
                preferences,
            },
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Registers a listener called with the new state after every dispatch.
    pub fn subscribe(&mut self, listener: impl FnMut(&AppState) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn dispatch(&mut self, action: Action) {
        debug!("Dispatch {}", action_name(&action));
        let table = &mut self.state.table;
        let preferences = &mut self.state.preferences;
        match action {
            Action::SetData(records) => table.records.set_all(records),
            Action::SetSearchTerm(term) => {
                table.search_term = term;
                table.current_page = 1;
            }
            Action::SetSortConfig(sort) => table.sort = sort,
            Action::SetCurrentPage(page) => table.current_page = page.max(1),
            Action::SetPageSize(size) => table.page_size = size.max(1),
            Action::SetColumns(columns) => table.columns = columns,
            Action::ToggleColumn(index) => {
                columns::toggle_visibility(&mut table.columns, index);
            }
            Action::AddColumn(label) => {
                if !columns::add_column(&mut table.columns, &label) {
                    trace!("Rejected column label {label:?}");
                }
            }
            Action::MoveColumn { index, offset } => {
                if columns::move_column(&mut table.columns, index, offset) {
                    preferences.column_order = columns::column_order(&table.columns);
                }
            }
            Action::SetEditingRow(id) => table.editing_row = id,
            Action::UpdateRow { id, patch } => table.records.upsert(&id, &patch),
            Action::DeleteRow(id) => table.records.remove(&id),
            Action::SetTheme(theme) => preferences.theme = theme,
            Action::ToggleTheme => preferences.theme = preferences.theme.toggled(),
            Action::SetColumnOrder(order) => {
                let current = std::mem::take(&mut table.columns);
                table.columns = columns::order_columns(current, &order);
                preferences.column_order = order;
            }
        }
        for listener in self.listeners.iter_mut() {
            listener(&self.state);
        }
    }
}

fn action_name(action: &Action) -> String {
    match action {
        Action::SetData(records) => format!("SetData({} records)", records.len()),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::record::seed_records;

    fn ids(store: &RecordStore) -> Vec<&str> {
        store.records().iter().map(|r| r.id()).collect()
    }

    #[test]
    fn set_all_keeps_first_of_duplicated_ids() {
        let mut records = seed_records();
        let mut duplicate = Record::new("2");
        duplicate.name = "Impostor".into();
        records.push(duplicate);

        let store = RecordStore::new(records);
        assert_eq!(ids(&store), vec!["1", "2", "3", "4", "5"]);
        assert_eq!(store.get("2").unwrap().name, "Jane Smith");
    }

    #[test]
    fn upsert_merges_into_existing_record() {
        let mut store = RecordStore::new(seed_records());
        store.upsert("3", &RecordPatch::default().role("Director"));
        let record = store.get("3").unwrap();
        assert_eq!(record.role, "Director");
        assert_eq!(record.name, "Mike Johnson");
    }

    #[test]
    fn upsert_of_unknown_id_is_noop() {
        let mut store = RecordStore::new(seed_records());
        let before = store.clone();
        store.upsert("404", &RecordPatch::default().name("Ghost"));
        assert_eq!(store, before);
    }

    #[test]
    fn remove_of_unknown_id_is_noop() {
        let mut store = RecordStore::new(seed_records());
        let before = store.clone();
        store.remove("404");
        assert_eq!(store, before);

        store.remove("1");
        assert_eq!(ids(&store), vec!["2", "3", "4", "5"]);
    }

    #[test]
    fn search_resets_current_page() {
        let mut store = Store::init(seed_records(), Preferences::default(), 2);
        store.dispatch(Action::SetCurrentPage(3));
        assert_eq!(store.state().table.current_page, 3);

        store.dispatch(Action::SetSearchTerm("dev".into()));
        assert_eq!(store.state().table.current_page, 1);
        assert_eq!(store.state().table.search_term, "dev");
    }

    #[test]
    fn dispatch_notifies_listeners_in_order() {
        let mut store = Store::init(seed_records(), Preferences::default(), 10);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let first = Rc::clone(&seen);
        store.subscribe(move |state| first.borrow_mut().push(("first", state.table.records.len())));
        let second = Rc::clone(&seen);
        store.subscribe(move |state| second.borrow_mut().push(("second", state.table.records.len())));

        store.dispatch(Action::DeleteRow("1".into()));
        assert_eq!(*seen.borrow(), vec![("first", 4), ("second", 4)]);
    }

    #[test]
    fn init_orders_columns_by_preferences() {
        let preferences = Preferences {
            column_order: vec!["role".into(), "name".into()],
            ..Preferences::default()
        };
        let store = Store::init(seed_records(), preferences, 10);
        let keys: Vec<&str> = store.state().table.columns.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys[..3], ["role", "name", "email"]);
    }

    #[test]
    fn move_column_updates_column_order() {
        let mut store = Store::init(seed_records(), Preferences::default(), 10);
        store.dispatch(Action::MoveColumn { index: 0, offset: 1 });
        assert_eq!(store.state().table.columns[0].key, "email");
        assert_eq!(store.state().preferences.column_order[..2], ["email", "name"]);
    }

    #[test]
    fn toggle_theme_switches_preferences_only() {
        let mut store = Store::init(seed_records(), Preferences::default(), 10);
        let table = store.state().table.clone();
        store.dispatch(Action::ToggleTheme);
        assert_eq!(store.state().preferences.theme, Theme::Dark);
        assert_eq!(store.state().table, table);
    }
}
