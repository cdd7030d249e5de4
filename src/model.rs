use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, error, info, trace, warn};

use crate::columns::{ColumnSpec, column_order, default_columns, visible_columns};
use crate::csv_codec;
use crate::domain::{CMDMode, Config, HELP_TEXT, Message, TMError};
use crate::editor::{EditForm, FormOutcome};
use crate::import::{ImportPoll, ImportTask};
use crate::inputter::{InputResult, Inputter};
use crate::loader::expand_path;
use crate::pipeline::{self, SortDirection, SortSpec};
use crate::preferences::{Preferences, PreferencesStorage, Theme};
use crate::record::Record;
use crate::store::{Action, Store};

const PAGE_SIZES: [usize; 5] = [5, 10, 25, 50, 100];

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    IMPORTING,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    EDIT,
    COLUMNS,
    POPUP,
    CMDINPUT,
    CONFIRM,
}

#[derive(Debug, Clone)]
pub struct HeaderCell {
    pub key: String,
    pub label: String,
    pub sort: Option<SortDirection>,
}

#[derive(Debug, Clone)]
pub struct RowView {
    pub cells: Vec<String>,
    pub editing: bool,
}

#[derive(Debug, Clone)]
pub struct ColumnItem {
    pub label: String,
    pub key: String,
    pub visible: bool,
}

#[derive(Debug, Clone)]
pub struct EditView {
    pub title: String,
    pub fields: Vec<(String, InputResult)>,
    pub active: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Popup {
    Message(String),
    Confirm(String),
    Columns { items: Vec<ColumnItem>, selected: usize },
    Edit(EditView),
}

/// Everything the ui needs to draw one frame.
pub struct UIData {
    pub title: String,
    pub header: Vec<HeaderCell>,
    pub rows: Vec<RowView>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub total_matches: usize,
    pub current_page: usize,
    pub page_count: usize,
    pub page_size: usize,
    pub search_term: String,
    pub theme: Theme,
    pub popup: Option<Popup>,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub importing: Option<PathBuf>,
    pub import_error: Option<String>,
    pub status_message: String,
    pub last_status_message_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            title: String::new(),
            header: Vec::new(),
            rows: Vec::new(),
            selected_row: 0,
            selected_column: 0,
            total_matches: 0,
            current_page: 1,
            page_count: 1,
            page_size: 0,
            search_term: String::new(),
            theme: Theme::default(),
            popup: None,
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            importing: None,
            import_error: None,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        }
    }

    /// 1-based positions of the first and last shown entry, (0, 0) for an empty page.
    pub fn showing_range(&self) -> (usize, usize) {
        if self.rows.is_empty() {
            return (0, 0);
        }
        let start = (self.current_page - 1) * self.page_size + 1;
        (start, start + self.rows.len() - 1)
    }
}

pub struct Model {
    config: Config,
    store: Store,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    cursor_row: usize,
    cursor_column: usize,
    column_cursor: usize,
    page_ids: Vec<String>,
    edit_form: Option<EditForm>,
    pending_delete: Option<String>,
    popup_message: String,
    import_task: Option<ImportTask>,
    import_error: Option<String>,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    search_backup: String,
    uidata: UIData,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    /// Builds the model on `seed`. With `storage`, preferences are read from it and
    /// written back on every change.
    pub fn init(config: &Config, seed: Vec<Record>, storage: Option<PreferencesStorage>) -> Self {
        let preferences = storage
            .as_ref()
            .map(|s| s.load())
            .unwrap_or_else(Preferences::default);
        let mut store = Store::init(seed, preferences.clone(), config.page_size);
        if let Some(storage) = storage {
            debug!("Persisting preferences to {:?}", storage.path());
            store.subscribe(storage.into_listener(preferences));
        }
        if let Some(theme) = config.theme {
            store.dispatch(Action::SetTheme(theme));
        }

        let mut model = Self {
            config: config.clone(),
            store,
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            cursor_row: 0,
            cursor_column: 0,
            column_cursor: 0,
            page_ids: Vec::new(),
            edit_form: None,
            pending_delete: None,
            popup_message: String::new(),
            import_task: None,
            import_error: None,
            clipboard: None,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            search_backup: String::new(),
            uidata: UIData::empty(),
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        let records = &model.store.state().table.records;
        let message = if records.is_empty() {
            "No records loaded".to_string()
        } else {
            format!("Loaded {} records", records.len())
        };
        model.set_status_message(message);
        model.update_uidata();
        model
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn raw_keyevents(&self) -> bool {
        matches!(self.modus, Modus::CMDINPUT | Modus::EDIT)
    }

    pub fn quit(&mut self) {
        if let Some(task) = self.import_task.take() {
            task.cancel();
        }
        self.status = Status::QUITTING;
    }

    /// Applies `message` for the current modus. Failures end up in the status line or the
    /// import error, never stop the loop.
    pub fn update(&mut self, message: Option<Message>) {
        self.poll_import();

        if let Some(msg) = message {
            trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.cursor_row = self.cursor_row.saturating_sub(1),
                    Message::MoveDown => self.cursor_row += 1,
                    Message::MoveLeft => self.cursor_column = self.cursor_column.saturating_sub(1),
                    Message::MoveRight => self.cursor_column += 1,
                    Message::NextPage => self.goto_page(self.current_page() + 1),
                    Message::PrevPage => self.goto_page(self.current_page().saturating_sub(1)),
                    Message::LargerPages => self.step_page_size(true),
                    Message::SmallerPages => self.step_page_size(false),
                    Message::FirstPage => self.goto_page(1),
                    Message::LastPage => self.goto_page(self.page_count()),
                    Message::Sort => self.sort_current_column(),
                    Message::ClearSort => self.store.dispatch(Action::SetSortConfig(None)),
                    Message::Search => self.enter_cmd_mode(CMDMode::Search),
                    Message::Edit => self.open_edit_form(),
                    Message::Delete => self.ask_delete(),
                    Message::Import => self.enter_cmd_mode(CMDMode::ImportPath),
                    Message::Export => self.export(),
                    Message::ManageColumns => self.switch_modus(Modus::COLUMNS),
                    Message::ToggleTheme => self.store.dispatch(Action::ToggleTheme),
                    Message::CopyCell => self.copy_table_cell(),
                    Message::CopyRow => self.copy_table_row(),
                    Message::Help => self.show_help(),
                    Message::Exit => self.exit(),
                    _ => (),
                },
                Modus::CONFIRM => match msg {
                    Message::Confirm => self.confirm_delete(),
                    Message::Exit => self.exit(),
                    _ => (),
                },
                Modus::COLUMNS => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.column_cursor = self.column_cursor.saturating_sub(1),
                    Message::MoveDown => self.column_cursor += 1,
                    Message::ToggleColumn => {
                        self.store.dispatch(Action::ToggleColumn(self.column_cursor))
                    }
                    Message::MoveColumnUp => self.move_column(-1),
                    Message::MoveColumnDown => self.move_column(1),
                    Message::AddColumn => self.enter_cmd_mode(CMDMode::AddColumn),
                    Message::ResetColumns => self.reset_columns(),
                    Message::Exit => self.exit(),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Help | Message::Exit => self.exit(),
                    _ => (),
                },
                Modus::EDIT => {
                    if let Message::RawKey(key) = msg {
                        self.edit_input(key)
                    }
                }
                Modus::CMDINPUT => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)
                    }
                }
            }
        }

        self.update_uidata();
    }

    // -------------------- Control handling functions ---------------------- //

    fn switch_modus(&mut self, modus: Modus) {
        self.previous_modus = self.modus;
        self.modus = modus;
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {
                if let Some(task) = self.import_task.take() {
                    task.cancel();
                    self.status = Status::READY;
                    self.set_status_message(TMError::ImportCanceled.to_string());
                } else if self.import_error.take().is_some() {
                    trace!("Dismissed import error");
                }
            }
            Modus::CONFIRM => {
                self.pending_delete = None;
                self.switch_modus(Modus::TABLE);
            }
            Modus::COLUMNS | Modus::POPUP => {
                trace!("Close popup ...");
                self.switch_modus(Modus::TABLE);
            }
            Modus::EDIT | Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.popup_message = HELP_TEXT.to_string();
        self.switch_modus(Modus::POPUP);
    }

    fn current_page(&self) -> usize {
        self.store.state().table.current_page
    }

    fn page_count(&self) -> usize {
        let table = &self.store.state().table;
        let total = pipeline::filter(table.records.records(), &table.search_term).len();
        pipeline::page_count(total, table.page_size).max(1)
    }

    fn goto_page(&mut self, page: usize) {
        let page = page.clamp(1, self.page_count());
        if page != self.current_page() {
            self.store.dispatch(Action::SetCurrentPage(page));
            self.cursor_row = 0;
        }
    }

    /// Next entry of `PAGE_SIZES` above or below the current size. Starts over on page 1.
    fn step_page_size(&mut self, larger: bool) {
        let current = self.store.state().table.page_size;
        let next = if larger {
            PAGE_SIZES.iter().copied().find(|&size| size > current)
        } else {
            PAGE_SIZES.iter().rev().copied().find(|&size| size < current)
        };
        if let Some(size) = next {
            self.store.dispatch(Action::SetPageSize(size));
            self.store.dispatch(Action::SetCurrentPage(1));
            self.cursor_row = 0;
            self.set_status_message(format!("{size} rows per page"));
        }
    }

    fn current_column_key(&self) -> Option<String> {
        let columns = &self.store.state().table.columns;
        visible_columns(columns)
            .get(self.cursor_column)
            .map(|c| c.key.clone())
    }

    fn selected_record(&self) -> Option<&Record> {
        let id = self.page_ids.get(self.cursor_row)?;
        self.store.state().table.records.get(id)
    }

    /// Sorts by the selected column. Sorting again by the same column flips the direction.
    fn sort_current_column(&mut self) {
        let Some(key) = self.current_column_key() else {
            return;
        };
        let next = match &self.store.state().table.sort {
            Some(spec) if spec.key == key && spec.direction == SortDirection::Ascending => {
                SortSpec::descending(key)
            }
            _ => SortSpec::ascending(key),
        };
        debug!("Sort by {} {:?}", next.key, next.direction);
        self.store.dispatch(Action::SetSortConfig(Some(next)));
    }

    fn open_edit_form(&mut self) {
        let Some(record) = self.selected_record() else {
            trace!("Nothing to edit");
            return;
        };
        let form = EditForm::new(record, &self.store.state().table.columns);
        let id = form.record_id().to_string();
        self.edit_form = Some(form);
        self.store.dispatch(Action::SetEditingRow(Some(id)));
        self.switch_modus(Modus::EDIT);
    }

    fn edit_input(&mut self, key: KeyEvent) {
        let Some(form) = self.edit_form.as_mut() else {
            self.switch_modus(Modus::TABLE);
            return;
        };
        match form.read(key) {
            FormOutcome::Editing => {}
            FormOutcome::Save(patch) => {
                let id = form.record_id().to_string();
                self.store.dispatch(Action::UpdateRow {
                    id: id.clone(),
                    patch,
                });
                self.close_edit_form();
                self.set_status_message(format!("Saved record {id}"));
            }
            FormOutcome::Cancel => self.close_edit_form(),
        }
    }

    fn close_edit_form(&mut self) {
        self.edit_form = None;
        self.store.dispatch(Action::SetEditingRow(None));
        self.switch_modus(Modus::TABLE);
    }

    fn ask_delete(&mut self) {
        let Some((id, name)) = self
            .selected_record()
            .map(|r| (r.id().to_string(), r.name.clone()))
        else {
            return;
        };
        self.popup_message = format!("Delete {name}? (y/n)");
        self.pending_delete = Some(id);
        self.switch_modus(Modus::CONFIRM);
    }

    fn confirm_delete(&mut self) {
        if let Some(id) = self.pending_delete.take() {
            self.store.dispatch(Action::DeleteRow(id.clone()));
            self.set_status_message(format!("Deleted record {id}"));
            // The last row of the last page may have been removed.
            let last = self.page_count();
            if self.current_page() > last {
                self.store.dispatch(Action::SetCurrentPage(last));
            }
        }
        self.switch_modus(Modus::TABLE);
    }

    fn move_column(&mut self, offset: isize) {
        let before = self.store.state().table.columns.clone();
        self.store.dispatch(Action::MoveColumn {
            index: self.column_cursor,
            offset,
        });
        if self.store.state().table.columns != before {
            self.column_cursor = self.column_cursor.saturating_add_signed(offset);
        }
    }

    /// Back to the initial columns. Added columns are dropped.
    fn reset_columns(&mut self) {
        let columns = default_columns();
        let order = column_order(&columns);
        self.store.dispatch(Action::SetColumns(columns));
        self.store.dispatch(Action::SetColumnOrder(order));
        self.column_cursor = 0;
        self.cursor_column = 0;
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {:?} ...", mode);
        self.switch_modus(Modus::CMDINPUT);
        self.cmd_mode = Some(mode);

        self.active_cmdinput = true;
        self.input.clear();
        if mode == CMDMode::Search {
            self.search_backup = self.store.state().table.search_term.clone();
            self.input.set(&self.search_backup);
        }
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        self.last_input = self.input.read(key);
        if self.cmd_mode == Some(CMDMode::Search) && !self.last_input.canceled {
            self.live_search();
        }
        if self.last_input.finished {
            self.handle_cmd_input();
        }
    }

    /// Filters on every keystroke.
    fn live_search(&mut self) {
        let term = self.last_input.input.clone();
        if term != self.store.state().table.search_term {
            self.store.dispatch(Action::SetSearchTerm(term));
            self.cursor_row = 0;
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);

        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let cmd_input = self.last_input.input.clone();
        let canceled = self.last_input.canceled;
        match self.cmd_mode {
            Some(CMDMode::Search) => {
                if canceled {
                    let backup = std::mem::take(&mut self.search_backup);
                    if backup != self.store.state().table.search_term {
                        self.store.dispatch(Action::SetSearchTerm(backup));
                    }
                }
            }
            Some(CMDMode::ImportPath) if !canceled => self.start_import(&cmd_input),
            Some(CMDMode::AddColumn) if !canceled => {
                let count = self.store.state().table.columns.len();
                self.store.dispatch(Action::AddColumn(cmd_input.trim().to_string()));
                if self.store.state().table.columns.len() > count {
                    self.column_cursor = count;
                }
            }
            Some(mode) => trace!("Command {:?} canceled", mode),
            None => info!("Cmd mode is none!"),
        }

        self.cmd_mode = None;
    }

    fn start_import(&mut self, raw_path: &str) {
        let path = match expand_path(raw_path).and_then(|path| {
            csv_codec::ensure_csv_file_name(&path)?;
            Ok(path)
        }) {
            Ok(path) => path,
            Err(e) => {
                debug!("Rejected import of {raw_path:?}: {e}");
                self.import_error = Some(e.to_string());
                return;
            }
        };

        if let Some(previous) = self.import_task.take() {
            previous.cancel();
        }
        self.import_error = None;
        self.status = Status::IMPORTING;
        self.set_status_message(format!("Importing {} ...", path.display()));
        self.import_task = Some(ImportTask::spawn(path, self.config.import_timeout));
    }

    fn poll_import(&mut self) {
        let Some(task) = self.import_task.as_ref() else {
            return;
        };
        let outcome = task.poll();
        if matches!(outcome, ImportPoll::Pending) {
            return;
        }
        let path = task.path().to_path_buf();
        let timeout = task.timeout();
        self.import_task = None;
        self.status = Status::READY;

        match outcome {
            ImportPoll::Pending => {}
            ImportPoll::Done(Ok(records)) => {
                let count = records.len();
                self.store.dispatch(Action::SetData(records));
                self.store.dispatch(Action::SetCurrentPage(1));
                self.cursor_row = 0;
                self.set_status_message(format!("Imported {count} records from {}", path.display()));
            }
            ImportPoll::Done(Err(e)) => {
                warn!("Import of {:?} failed: {e}", path);
                if !e.is_import_error() {
                    error!("Unexpected import failure: {e:?}");
                }
                self.import_error = Some(e.to_string());
            }
            ImportPoll::TimedOut => {
                let e = TMError::ImportTimedOut(timeout);
                warn!("Import of {:?}: {e}", path);
                self.import_error = Some(e.to_string());
            }
        }
    }

    /// Writes the filtered and sorted rows, all pages, with the visible columns.
    fn export(&mut self) {
        match self.export_to_file() {
            Ok((path, count)) => {
                info!("Exported {count} rows to {:?}", path);
                self.set_status_message(format!("Exported {count} rows to {}", path.display()));
            }
            Err(e) => {
                error!("Export failed: {e}");
                self.set_status_message(format!("Export failed: {e}"));
            }
        }
    }

    fn export_to_file(&self) -> Result<(PathBuf, usize), TMError> {
        let table = &self.store.state().table;
        let rows = pipeline::matching(
            table.records.records(),
            &table.search_term,
            table.sort.as_ref(),
        );
        let content = csv_codec::encode(&rows, &visible_columns(&table.columns))?;
        fs::create_dir_all(&self.config.export_dir)?;
        let path = self.config.export_dir.join(csv_codec::export_file_name_now());
        fs::write(&path, content)?;
        Ok((path, rows.len()))
    }

    fn set_clipboard(&mut self, content: String) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    warn!("Clipboard not available: {e}");
                    self.set_status_message("Clipboard not available");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(content) {
                Ok(_) => trace!("Copied content to clipboard."),
                Err(e) => trace!("Error copying to clipboard: {:?}", e),
            }
        }
    }

    fn copy_table_cell(&mut self) {
        let Some(key) = self.current_column_key() else {
            return;
        };
        let Some(cell) = self
            .selected_record()
            .and_then(|r| r.field_text(&key))
            .map(|v| v.into_owned())
        else {
            return;
        };
        trace!("Cell content: {}", cell);
        self.set_clipboard(cell);
    }

    fn copy_table_row(&mut self) {
        let Some(record) = self.selected_record() else {
            return;
        };
        let line = csv_codec::encode_row(record, &visible_columns(&self.store.state().table.columns));
        match line {
            Ok(line) => self.set_clipboard(line),
            Err(e) => warn!("Could not encode row: {e}"),
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    // -------------------- UI data ---------------------- //

    fn update_uidata(&mut self) {
        let state = self.store.state();
        let table = &state.table;
        let columns: Vec<&ColumnSpec> = visible_columns(&table.columns);
        let projection = pipeline::project(
            table.records.records(),
            &table.search_term,
            table.sort.as_ref(),
            table.current_page,
            table.page_size,
        );

        self.cursor_row = self.cursor_row.min(projection.rows.len().saturating_sub(1));
        self.cursor_column = self.cursor_column.min(columns.len().saturating_sub(1));
        self.column_cursor = self
            .column_cursor
            .min(table.columns.len().saturating_sub(1));

        self.page_ids = projection.rows.iter().map(|r| r.id().to_string()).collect();

        let header = columns
            .iter()
            .map(|c| HeaderCell {
                key: c.key.clone(),
                label: c.label.clone(),
                sort: table
                    .sort
                    .as_ref()
                    .filter(|s| s.key == c.key)
                    .map(|s| s.direction),
            })
            .collect();
        let rows = projection
            .rows
            .iter()
            .map(|record| RowView {
                cells: columns
                    .iter()
                    .map(|c| {
                        record
                            .field_text(&c.key)
                            .map(|v| v.into_owned())
                            .unwrap_or_default()
                    })
                    .collect(),
                editing: table.editing_row.as_deref() == Some(record.id()),
            })
            .collect();

        let popup = match self.modus {
            Modus::POPUP => Some(Popup::Message(self.popup_message.clone())),
            Modus::CONFIRM => Some(Popup::Confirm(self.popup_message.clone())),
            Modus::COLUMNS => Some(self.columns_popup()),
            Modus::CMDINPUT if self.previous_modus == Modus::COLUMNS => Some(self.columns_popup()),
            Modus::EDIT => self.edit_form.as_ref().map(|form| {
                Popup::Edit(EditView {
                    title: format!("Edit record {}", form.record_id()),
                    fields: form
                        .fields
                        .iter()
                        .map(|f| (f.label.clone(), f.input.get()))
                        .collect(),
                    active: form.active,
                    errors: form.errors.clone(),
                })
            }),
            Modus::TABLE | Modus::CMDINPUT => None,
        };

        self.uidata = UIData {
            title: format!("Table Manager ({} records)", table.records.len()),
            header,
            rows,
            selected_row: self.cursor_row,
            selected_column: self.cursor_column,
            total_matches: projection.total_matches,
            current_page: table.current_page,
            page_count: pipeline::page_count(projection.total_matches, table.page_size).max(1),
            page_size: table.page_size,
            search_term: table.search_term.clone(),
            theme: state.preferences.theme,
            popup,
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            importing: self.import_task.as_ref().map(|t| t.path().to_path_buf()),
            import_error: self.import_error.clone(),
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
        };
    }

    fn columns_popup(&self) -> Popup {
        Popup::Columns {
            items: self
                .store
                .state()
                .table
                .columns
                .iter()
                .map(|c| ColumnItem {
                    label: c.label.clone(),
                    key: c.key.clone(),
                    visible: c.visible,
                })
                .collect(),
            selected: self.column_cursor,
        }
    }
}
