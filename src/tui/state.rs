use crate::dialog::{LineInput, RecordDialog};
use crate::model::{Record, RecordKind};
use crate::table::{PageNav, TableViewModel, ViewMessage, ViewState};
use std::sync::Arc;

pub const HELP_TAB: usize = 2;

pub struct UiState {
    pub tab: usize,
    pub info: String,
    /// One view-model per record kind; each keeps its own filter, sort and page.
    pub tables: [TableViewModel; 2],
    pub selected: usize,
    pub filter_editing: bool,
    pub filter_input: LineInput,
    pub dialog: Option<RecordDialog>,
    pub alert: Option<String>,
    pub last_update: [Option<String>; 2],
    pub ticking: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: 0,
            info: String::new(),
            tables: [
                TableViewModel::new(ViewState::default()),
                TableViewModel::new(ViewState::default()),
            ],
            selected: 0,
            filter_editing: false,
            filter_input: LineInput::default(),
            dialog: None,
            alert: None,
            last_update: [None, None],
            ticking: false,
        }
    }
}

impl UiState {
    /// Page size and sort from the command line apply to both tables; the filter and
    /// page index only to the one shown first.
    pub fn new(kind: RecordKind, view: ViewState, ticking: bool) -> Self {
        let mut state = Self {
            tab: kind.index(),
            ticking,
            ..Default::default()
        };
        state.filter_input = LineInput::new(&view.filter);
        let shared = ViewState {
            sort: view.sort,
            page_size: view.page_size,
            ..Default::default()
        };
        state.tables = [
            TableViewModel::new(shared.clone()),
            TableViewModel::new(shared),
        ];
        state.tables[kind.index()] = TableViewModel::new(view);
        state
    }

    /// Kind of the visible table, or `None` on the help tab.
    pub fn kind(&self) -> Option<RecordKind> {
        RecordKind::ALL.get(self.tab).copied()
    }

    pub fn table(&self) -> Option<&TableViewModel> {
        self.kind().map(|k| &self.tables[k.index()])
    }

    pub fn table_mut(&mut self) -> Option<&mut TableViewModel> {
        self.kind().map(|k| &mut self.tables[k.index()])
    }

    pub fn selected_record(&self) -> Option<&Record> {
        self.table().and_then(|t| t.page().rows.get(self.selected))
    }

    pub fn apply_records(&mut self, kind: RecordKind, records: Arc<Vec<Record>>, stamp: String) {
        self.tables[kind.index()].update(ViewMessage::DataChanged(records));
        self.last_update[kind.index()] = Some(stamp);
        self.clamp_selection();
    }

    /// Send a message to the visible table and keep the cursor on a real row.
    pub fn update_view(&mut self, msg: ViewMessage) {
        if let Some(t) = self.table_mut() {
            t.update(msg);
        }
        self.clamp_selection();
    }

    /// Apply a paginator control to the visible table.
    pub fn navigate(&mut self, nav: PageNav) {
        if let Some(msg) = self.table().map(|t| t.page_message(nav)) {
            self.update_view(msg);
        }
    }

    pub fn clamp_selection(&mut self) {
        let rows = self.table().map(|t| t.page().rows.len()).unwrap_or(0);
        self.selected = self.selected.min(rows.saturating_sub(1));
    }

    pub fn select_next(&mut self) {
        self.selected += 1;
        self.clamp_selection();
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Switch tab and load the filter editor with that table's filter.
    pub fn set_tab(&mut self, tab: usize) {
        self.tab = tab;
        self.selected = 0;
        self.filter_editing = false;
        if let Some(filter) = self.table().map(|t| t.view().filter.clone()) {
            self.filter_input = LineInput::new(&filter);
        }
    }
}
