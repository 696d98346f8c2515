use arboard::Clipboard;
use chrono::Local;
use ratatui::crossterm::event::KeyEvent;
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::classifier::classify;
use crate::columns::ColumnDescriptor;
use crate::config::GridConfig;
use crate::domain::{CMDMode, HELP_TEXT, Message};
use crate::editor::EditBuffer;
use crate::inputter::{InputResult, Inputter};
use crate::mockdata::MockGenerator;
use crate::record::{Dataset, Row, Value};
use crate::renderer::{DisplayOutput, RenderContext, Registry, Renderer, RendererName, resolve};
use crate::ui::COLUMN_WIDTH_MARGIN;

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

/// Selection state of the rows in the current (filtered) view.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SelectionState {
    #[default]
    None,
    Some,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SortSpec {
    column: usize,
    ascending: bool,
}

struct TableView {
    rows: Arc<Vec<usize>>, // Mapping of view position to dataset index
    sort: Option<SortSpec>,
    filter: Option<String>,
    page_index: usize,
    page_size: usize, // 0 shows all rows on one page
    curser_row: usize, // Relative to the current page
    curser_column: usize,
    selected: BTreeSet<usize>, // Dataset indices
}

impl TableView {
    fn new(page_size: usize) -> Self {
        TableView {
            rows: Arc::new(Vec::new()),
            sort: None,
            filter: None,
            page_index: 0,
            page_size,
            curser_row: 0,
            curser_column: 0,
            selected: BTreeSet::new(),
        }
    }

    fn page_len(&self) -> usize {
        if self.page_size == 0 {
            self.rows.len().max(1)
        } else {
            self.page_size
        }
    }

    fn page_count(&self) -> usize {
        self.rows.len().div_ceil(self.page_len()).max(1)
    }

    fn page_range(&self) -> Range<usize> {
        let start = std::cmp::min(self.page_index * self.page_len(), self.rows.len());
        let end = std::cmp::min(start + self.page_len(), self.rows.len());
        start..end
    }

    fn clamp(&mut self, ncolumns: usize) {
        self.page_index = std::cmp::min(self.page_index, self.page_count() - 1);
        self.curser_row = std::cmp::min(self.curser_row, self.page_range().len().saturating_sub(1));
        self.curser_column = std::cmp::min(self.curser_column, ncolumns.saturating_sub(1));
    }

    fn selection_state(&self) -> SelectionState {
        let selected = self.rows.iter().filter(|r| self.selected.contains(r)).count();
        if selected == 0 {
            SelectionState::None
        } else if selected == self.rows.len() {
            SelectionState::All
        } else {
            SelectionState::Some
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnHeader {
    pub group: String,
    pub title: String,
    pub width: usize,
    /// `Some(true)` when sorted ascending by this column.
    pub sorted: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UIRow {
    pub label: String,
    pub selected: bool,
    pub cells: Vec<DisplayOutput>,
}

pub struct UIData {
    pub name: String,
    pub headers: Vec<ColumnHeader>,
    pub rows: Vec<UIRow>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub page_index: usize,
    pub page_count: usize,
    pub page_size: usize,
    pub nrows: usize, // Rows in the filtered view
    pub total_rows: usize,
    pub nselected: usize,
    pub selection: SelectionState,
    pub filter: Option<String>,
    pub editing: bool,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub last_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            headers: Vec::new(),
            rows: Vec::new(),
            selected_row: 0,
            selected_column: 0,
            page_index: 0,
            page_count: 1,
            page_size: 0,
            nrows: 0,
            total_rows: 0,
            nselected: 0,
            selection: SelectionState::None,
            filter: None,
            editing: false,
            show_popup: false,
            popup_message: String::new(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
            last_update: Instant::now(),
        }
    }
}

pub struct Model {
    config: GridConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    name: String,
    columns: Vec<ColumnDescriptor>,
    registry: Registry,
    data: Dataset,
    view: TableView,
    editor: Option<EditBuffer>,
    generator: MockGenerator,
    input: Inputter,
    last_input: InputResult,
    cmd_mode: Option<CMDMode>,
    active_cmdinput: bool,
    clipboard: Option<Clipboard>,
    uidata: UIData,
    status_message: String,
}

/// Text of a cell as matched by the row filter.
fn cell_text(column: &ColumnDescriptor, value: &Value) -> String {
    match column.formatter {
        Some(formatter) => formatter(value),
        None => value.to_string(),
    }
}

fn wrap_cell_content(c: &str) -> String {
    let needs_escaping = c.contains('"');
    let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
    let mut out = String::from(c);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping || needs_escaping {
        out = format!("\"{out}\"");
    }
    out
}

impl Model {
    pub fn init(
        config: &GridConfig,
        name: impl Into<String>,
        columns: Vec<ColumnDescriptor>,
        rows: Vec<Row>,
        generator: MockGenerator,
    ) -> Self {
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            name: name.into(),
            columns,
            registry: Registry::default(),
            data: Dataset::new(rows),
            view: TableView::new(config.page_size),
            editor: None,
            generator,
            input: Inputter::default(),
            last_input: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            clipboard: None,
            uidata: UIData::empty(),
            status_message: String::new(),
        };
        let message = if model.data.is_empty() {
            "No patients loaded, press n to add one".to_string()
        } else {
            format!("Loaded {} patients, press ? for help", model.data.len())
        };
        model.set_status_message(message);
        model.rebuild_view();
        model
    }

    #[cfg(test)]
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self.update_uidata();
        self
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn dataset(&self) -> &Dataset {
        &self.data
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_update = Instant::now();
    }

    /// Recomputes the row mapping from the dataset, the filter and the sort
    /// order. Called after every change of the row collection.
    fn rebuild_view(&mut self) {
        let rows = self.data.rows();
        let start_time = Instant::now();

        let mut indices: Vec<usize> = match &self.view.filter {
            Some(term) => {
                let term = term.to_lowercase();
                (0..rows.len())
                    .filter(|&i| {
                        self.columns.iter().any(|c| {
                            cell_text(c, rows[i].get(&c.id))
                                .to_lowercase()
                                .contains(&term)
                        })
                    })
                    .collect()
            }
            None => (0..rows.len()).collect(),
        };

        if let Some(sort) = self.view.sort
            && let Some(column) = self.columns.get(sort.column)
        {
            indices.sort_by(|&a, &b| {
                let (va, vb) = (rows[a].get(&column.id), rows[b].get(&column.id));
                if sort.ascending || va.is_missing() || vb.is_missing() {
                    va.compare(vb)
                } else {
                    vb.compare(va)
                }
            });
        }

        // Selected rows that no longer exist are dropped
        self.view.selected.retain(|&i| i < rows.len());
        self.view.rows = Arc::new(indices);
        self.view.clamp(self.columns.len());
        trace!(
            "View: {} of {} rows, sort {:?}, took {}µs",
            self.view.rows.len(),
            rows.len(),
            self.view.sort,
            start_time.elapsed().as_micros()
        );

        self.sync_editor();
        self.update_uidata();
    }

    fn sync_editor(&mut self) {
        let current = self
            .editor
            .as_ref()
            .and_then(|e| self.data.get(e.row_index()).map(|r| r.get(e.field()).clone()));
        match current {
            Some(value) => {
                if let Some(editor) = self.editor.as_mut() {
                    editor.sync_external(&value);
                }
            }
            None => self.editor = None,
        }
    }

    fn render_cell(&self, data_idx: usize, row: &Row, column: &ColumnDescriptor) -> DisplayOutput {
        let ctx = RenderContext::new(data_idx, row, column).with_buffer(self.editor.as_ref());
        self.registry.render_cell(classify(&column.id, ctx.value), &ctx)
    }

    fn update_uidata(&mut self) {
        let rows = self.data.rows();
        let range = self.view.page_range();

        let ui_rows: Vec<UIRow> = self.view.rows[range]
            .iter()
            .map(|&data_idx| {
                let row = &rows[data_idx];
                let label = match row.sub_rows.len() {
                    0 => (data_idx + 1).to_string(),
                    n => format!("{}+{n}", data_idx + 1),
                };
                UIRow {
                    label,
                    selected: self.view.selected.contains(&data_idx),
                    cells: self
                        .columns
                        .iter()
                        .map(|column| self.render_cell(data_idx, row, column))
                        .collect(),
                }
            })
            .collect();

        let headers = self
            .columns
            .iter()
            .enumerate()
            .map(|(cidx, column)| {
                let content_width = ui_rows
                    .iter()
                    .map(|r| r.cells[cidx].width())
                    .max()
                    .unwrap_or(0);
                let width = std::cmp::max(column.header.chars().count() + 2, content_width)
                    + COLUMN_WIDTH_MARGIN;
                ColumnHeader {
                    group: column.group.clone().unwrap_or_default(),
                    title: column.header.clone(),
                    width: std::cmp::min(width, self.config.max_column_width),
                    sorted: self
                        .view
                        .sort
                        .filter(|s| s.column == cidx)
                        .map(|s| s.ascending),
                }
            })
            .collect();

        let uidata = &mut self.uidata;
        uidata.name = self.name.clone();
        uidata.headers = headers;
        uidata.rows = ui_rows;
        uidata.selected_row = self.view.curser_row;
        uidata.selected_column = self.view.curser_column;
        uidata.page_index = self.view.page_index;
        uidata.page_count = self.view.page_count();
        uidata.page_size = self.view.page_size;
        uidata.nrows = self.view.rows.len();
        uidata.total_rows = rows.len();
        uidata.nselected = self.view.selected.len();
        uidata.selection = self.view.selection_state();
        uidata.filter = self.view.filter.clone();
        uidata.editing = self.editor.is_some();
        uidata.cmdinput = self.last_input.clone();
        uidata.cmd_mode = self.cmd_mode;
        uidata.active_cmdinput = self.active_cmdinput;
        uidata.status_message = self.status_message.clone();
        uidata.last_update = Instant::now();
    }

    pub fn update(&mut self, message: Option<Message>) {
        let Some(msg) = message else {
            return;
        };
        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_selection_up(),
                Message::MoveDown => self.move_selection_down(),
                Message::MoveLeft => self.move_selection_left(),
                Message::MoveRight => self.move_selection_right(),
                Message::NextPage => self.goto_page(self.view.page_index + 1),
                Message::PrevPage => self.goto_page(self.view.page_index.saturating_sub(1)),
                Message::FirstPage => self.goto_page(0),
                Message::LastPage => self.goto_page(self.view.page_count() - 1),
                Message::CyclePageSize => self.cycle_page_size(),
                Message::SortAscending => self.sort_current_column(Some(true)),
                Message::SortDescending => self.sort_current_column(Some(false)),
                Message::ClearSort => self.sort_current_column(None),
                Message::Filter => self.enter_cmd_mode(CMDMode::Filter),
                Message::ToggleRowSelection => self.toggle_row_selection(),
                Message::ToggleAllRowsSelection => self.toggle_all_rows_selection(),
                Message::DeleteSelected => self.delete_selected(),
                Message::AddPatient => self.add_patient(),
                Message::EditCell => self.start_edit(),
                Message::CopyCell => self.copy_cell(),
                Message::CopyRow => self.copy_row(),
                Message::Help => self.show_help(),
                Message::Exit => self.exit(),
                Message::Resize(width, height) => trace!("UI was resized to {width}x{height}"),
                Message::RawKey(_) => {}
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Help => self.exit(),
                _ => {}
            },
            Modus::CMDINPUT => {
                if let Message::RawKey(key) = msg {
                    self.raw_input(key)
                }
            }
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {
                if self.view.filter.take().is_some() {
                    self.set_status_message("Filter cleared");
                    self.rebuild_view();
                }
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
                self.uidata.show_popup = false;
                self.uidata.last_update = Instant::now();
            }
            Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup_message = HELP_TEXT.to_string();
        self.uidata.show_popup = true;
        self.uidata.last_update = Instant::now();
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;
        self.input.clear();
        self.last_input = self.input.get();
        self.update_uidata();
    }

    fn leave_cmd_mode(&mut self) {
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        self.cmd_mode = None;
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        self.last_input = self.input.read(key);
        let input = self.last_input.clone();

        match self.cmd_mode {
            Some(CMDMode::EditCell) => {
                if input.canceled {
                    self.cancel_edit();
                } else {
                    if let Some(editor) = self.editor.as_mut()
                        && editor.text() != input.input
                    {
                        editor.edit(input.input.clone());
                    }
                    if input.finished {
                        self.commit_edit();
                    }
                }
            }
            Some(CMDMode::Filter) => {
                if input.finished && !input.canceled {
                    self.apply_filter(&input.input);
                }
            }
            None => warn!("Raw input without command mode"),
        }

        if input.finished {
            self.leave_cmd_mode();
        }
        self.update_uidata();
    }

    fn focused_cell(&self) -> Option<(usize, usize)> {
        let pos = self.view.page_range().start + self.view.curser_row;
        let data_idx = *self.view.rows.get(pos)?;
        (self.view.curser_column < self.columns.len()).then_some((data_idx, self.view.curser_column))
    }

    fn start_edit(&mut self) {
        let Some((data_idx, cidx)) = self.focused_cell() else {
            return;
        };
        let rows = self.data.rows();
        let row = &rows[data_idx];
        let column = &self.columns[cidx];
        let value = row.get(&column.id);

        let name = resolve(column, classify(&column.id, value));
        let editable = name == RendererName::Default
            && column.is_editable()
            && matches!(self.registry.get(name), Ok(Renderer::Editable));
        if !editable {
            let message = format!("{} is not editable", column.header);
            self.set_status_message(message);
            return;
        }

        debug!("Editing cell {}:{}", data_idx, column.id);
        let buffer = EditBuffer::new(data_idx, column.id.clone(), value);
        self.enter_cmd_mode(CMDMode::EditCell);
        self.input.set(buffer.text());
        self.last_input = self.input.get();
        self.editor = Some(buffer);
        self.update_uidata();
    }

    fn commit_edit(&mut self) {
        if let Some(mut editor) = self.editor.take() {
            if editor.blur(&mut self.data) {
                let message = format!("Updated {} of row {}", editor.field(), editor.row_index() + 1);
                self.set_status_message(message);
                self.rebuild_view();
            }
        }
    }

    fn cancel_edit(&mut self) {
        if let Some(mut editor) = self.editor.take() {
            editor.revert();
            self.set_status_message("Edit discarded");
        }
    }

    fn apply_filter(&mut self, term: &str) {
        let term = term.trim();
        self.view.filter = (!term.is_empty()).then(|| term.to_string());
        self.view.page_index = 0;
        self.view.curser_row = 0;
        self.rebuild_view();
        let message = format!("{} of {} rows match", self.view.rows.len(), self.data.len());
        self.set_status_message(message);
    }

    fn sort_current_column(&mut self, ascending: Option<bool>) {
        self.view.sort = ascending.map(|ascending| SortSpec {
            column: self.view.curser_column,
            ascending,
        });
        self.rebuild_view();
    }

    fn goto_page(&mut self, page: usize) {
        self.view.page_index = std::cmp::min(page, self.view.page_count() - 1);
        self.view.clamp(self.columns.len());
        self.update_uidata();
    }

    fn cycle_page_size(&mut self) {
        let options = &self.config.page_size_options;
        if options.is_empty() {
            return;
        }
        let next = options
            .iter()
            .position(|&s| s == self.view.page_size)
            .map_or(0, |p| (p + 1) % options.len());
        let first_visible = self.view.page_range().start;
        self.view.page_size = options[next];
        self.view.page_index = first_visible / self.view.page_len();
        self.view.clamp(self.columns.len());
        let message = match self.view.page_size {
            0 => "Showing all rows".to_string(),
            n => format!("Showing {n} rows per page"),
        };
        self.set_status_message(message);
        self.update_uidata();
    }

    fn toggle_row_selection(&mut self) {
        if let Some((data_idx, _)) = self.focused_cell() {
            if !self.view.selected.remove(&data_idx) {
                self.view.selected.insert(data_idx);
            }
            self.update_uidata();
        }
    }

    // Covers every row of the filtered view, not only the current page.
    fn toggle_all_rows_selection(&mut self) {
        if self.view.selection_state() == SelectionState::All {
            for idx in self.view.rows.iter() {
                self.view.selected.remove(idx);
            }
        } else {
            self.view.selected.extend(self.view.rows.iter().copied());
        }
        self.update_uidata();
    }

    fn delete_selected(&mut self) {
        if self.view.selected.is_empty() {
            self.set_status_message("No rows selected");
            return;
        }
        let indices: Vec<usize> = self.view.selected.iter().copied().collect();
        let removed = self.data.remove_indices(&indices);
        self.view.selected.clear();
        info!("Deleted {removed} rows");
        self.set_status_message(format!("Deleted {removed} patients"));
        self.rebuild_view();
    }

    fn add_patient(&mut self) {
        let person = self.generator.new_person(Local::now().naive_local());
        self.data.push(person);
        self.view.selected.clear();
        info!("Added a patient, {} rows", self.data.len());
        self.set_status_message("Added a patient");
        self.rebuild_view();
    }

    fn copy_to_clipboard(&mut self, text: String) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    warn!("Clipboard not available: {e:?}");
                    self.set_status_message("Clipboard not available");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(text) {
                Ok(_) => {
                    trace!("Copied content to clipboard.");
                    self.set_status_message("Copied to clipboard");
                }
                Err(e) => warn!("Error copying to clipboard: {:?}", e),
            }
        }
    }

    fn focused_row_outputs(&self) -> Option<&[DisplayOutput]> {
        self.uidata
            .rows
            .get(self.view.curser_row)
            .map(|r| r.cells.as_slice())
    }

    fn copy_cell(&mut self) {
        let text = self
            .focused_row_outputs()
            .and_then(|cells| cells.get(self.view.curser_column))
            .map(DisplayOutput::plain_text);
        if let Some(text) = text {
            self.copy_to_clipboard(text);
        }
    }

    fn copy_row(&mut self) {
        let line = self.focused_row_outputs().map(|cells| {
            cells
                .iter()
                .map(|c| wrap_cell_content(&c.plain_text()))
                .collect::<Vec<String>>()
                .join(",")
        });
        if let Some(line) = line {
            self.copy_to_clipboard(line);
        }
    }

    fn move_selection_up(&mut self) {
        if self.view.curser_row > 0 {
            self.view.curser_row -= 1;
        } else if self.view.page_index > 0 {
            self.view.page_index -= 1;
            self.view.curser_row = self.view.page_len() - 1;
        }
        self.view.clamp(self.columns.len());
        self.update_uidata();
    }

    fn move_selection_down(&mut self) {
        if self.view.curser_row + 1 < self.view.page_range().len() {
            self.view.curser_row += 1;
        } else if self.view.page_index + 1 < self.view.page_count() {
            self.view.page_index += 1;
            self.view.curser_row = 0;
        }
        self.update_uidata();
    }

    fn move_selection_left(&mut self) {
        self.view.curser_column = self.view.curser_column.saturating_sub(1);
        self.update_uidata();
    }

    fn move_selection_right(&mut self) {
        if self.view.curser_column + 1 < self.columns.len() {
            self.view.curser_column += 1;
        }
        self.update_uidata();
    }
}
