//! Table view-model.
//!
//! Derives the displayed page from a record snapshot and the user-controlled view state.
//! The derivation is a pure function: filter, then sort, then slice out one page.

use crate::model::Record;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

pub const PAGE_SIZE_OPTIONS: [usize; 4] = [5, 10, 25, 100];
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Id,
    Name,
    Price,
    Amount,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [SortKey::Id, SortKey::Name, SortKey::Price, SortKey::Amount];

    pub fn label(self) -> &'static str {
        match self {
            SortKey::Id => "ID",
            SortKey::Name => "Name",
            SortKey::Price => "Price",
            SortKey::Amount => "Amount",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
    #[default]
    None,
}

/// Active sort column and direction. A direction of `None` means "keep filtered order".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortState {
    pub key: Option<SortKey>,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self {
            key: Some(key),
            direction,
        }
    }

    /// Apply a click on a column header: a new column starts ascending, the active one
    /// cycles asc -> desc -> none.
    pub fn click(&mut self, key: SortKey) {
        if self.key == Some(key) {
            self.direction = match self.direction {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc => SortDirection::None,
                SortDirection::None => SortDirection::Asc,
            };
        } else {
            self.key = Some(key);
            self.direction = SortDirection::Asc;
        }
        if self.direction == SortDirection::None {
            self.key = None;
        }
    }

    pub fn is_active(&self) -> bool {
        self.key.is_some() && self.direction != SortDirection::None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub filter: String,
    pub sort: SortState,
    pub page_index: usize,
    pub page_size: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            filter: String::new(),
            sort: SortState::default(),
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ViewState {
    /// Replace the filter text. Any filter change jumps back to the first page.
    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
        self.page_index = 0;
    }

    /// Change the page size while keeping the first visible row on screen.
    pub fn set_page_size(&mut self, page_size: usize) {
        let page_size = page_size.max(1);
        let first_row = self.page_index.saturating_mul(self.page_size);
        self.page_index = first_row / page_size;
        self.page_size = page_size;
    }

    /// Neighbouring entry of `PAGE_SIZE_OPTIONS`, clamped at both ends.
    pub fn next_page_size(&self, forward: bool) -> usize {
        let pos = PAGE_SIZE_OPTIONS
            .iter()
            .position(|&s| s >= self.page_size)
            .unwrap_or(PAGE_SIZE_OPTIONS.len() - 1);
        let next = if forward {
            (pos + 1).min(PAGE_SIZE_OPTIONS.len() - 1)
        } else {
            pos.saturating_sub(1)
        };
        PAGE_SIZE_OPTIONS[next]
    }

    pub fn next_page_index(&self, filtered_len: usize) -> usize {
        self.page_index
            .saturating_add(1)
            .min(last_page_index(filtered_len, self.page_size))
    }

    pub fn prev_page_index(&self) -> usize {
        self.page_index.saturating_sub(1)
    }

    pub fn last_page_index(&self, filtered_len: usize) -> usize {
        last_page_index(filtered_len, self.page_size)
    }
}

pub fn page_count(filtered_len: usize, page_size: usize) -> usize {
    filtered_len.div_ceil(page_size.max(1)).max(1)
}

fn last_page_index(filtered_len: usize, page_size: usize) -> usize {
    page_count(filtered_len, page_size) - 1
}

/// One rendered page plus what a paginator needs to describe it.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Page {
    pub rows: Vec<Record>,
    pub filtered_len: usize,
    pub page_index: usize,
    pub page_size: usize,
}

impl Page {
    /// "1 - 10 of 42" style range, 1-based and inclusive.
    pub fn range_label(&self) -> String {
        if self.rows.is_empty() {
            return format!("0 of {}", self.filtered_len);
        }
        let start = self.page_index * self.page_size + 1;
        let end = start + self.rows.len() - 1;
        format!("{start} - {end} of {}", self.filtered_len)
    }
}

/// Keep records whose id followed by name contains `filter`, ignoring case.
pub fn filter_records<'a>(records: &'a [Record], filter: &str) -> Vec<&'a Record> {
    let needle = filter.to_lowercase();
    records
        .iter()
        .filter(|r| format!("{}{}", r.id, r.name).to_lowercase().contains(&needle))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
enum SortValue<'a> {
    Number(f64),
    Text(&'a str),
}

impl<'a> SortValue<'a> {
    fn coerce(raw: &'a str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return SortValue::Number(0.0);
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => SortValue::Number(v),
            _ => SortValue::Text(raw),
        }
    }

    fn less_than(&self, other: &SortValue<'_>) -> bool {
        match (self, other) {
            (SortValue::Number(a), SortValue::Number(b)) => a < b,
            (SortValue::Text(a), SortValue::Text(b)) => a < b,
            // A number never orders before text and vice versa.
            _ => false,
        }
    }
}

fn field_value(record: &Record, key: SortKey) -> SortValue<'_> {
    match key {
        SortKey::Id => SortValue::Number(record.id as f64),
        SortKey::Name => SortValue::coerce(&record.name),
        SortKey::Price => SortValue::coerce(&record.price),
        SortKey::Amount => SortValue::coerce(&record.amount),
    }
}

/// Column comparator. Returns `Less` only when `a` is strictly smaller; ties and
/// incomparable pairs are `Greater`. `Desc` flips the result. Never returns `Equal`.
pub fn compare_records(a: &Record, b: &Record, key: SortKey, direction: SortDirection) -> Ordering {
    let ord = if field_value(a, key).less_than(&field_value(b, key)) {
        Ordering::Less
    } else {
        Ordering::Greater
    };
    match direction {
        SortDirection::Desc => ord.reverse(),
        _ => ord,
    }
}

/// Sort according to `sort`, or keep the input order when no sort is active.
pub fn sort_records<'a>(records: Vec<&'a Record>, sort: SortState) -> Vec<&'a Record> {
    match sort.key {
        Some(key) if sort.is_active() => {
            merge_sort(records, &|a, b| compare_records(a, b, key, sort.direction))
        }
        _ => records,
    }
}

// The comparator is not a total order, so `slice::sort_by` is off the table.
// Top-down merge sort: take from the right run only when the left element compares `Greater`.
fn merge_sort<'a, F>(mut items: Vec<&'a Record>, cmp: &F) -> Vec<&'a Record>
where
    F: Fn(&Record, &Record) -> Ordering,
{
    if items.len() <= 1 {
        return items;
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, cmp);
    let right = merge_sort(right, cmp);

    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut l = left.into_iter().peekable();
    let mut r = right.into_iter().peekable();
    while let (Some(&a), Some(&b)) = (l.peek(), r.peek()) {
        if cmp(a, b) == Ordering::Greater {
            out.extend(r.next());
        } else {
            out.extend(l.next());
        }
    }
    out.extend(l);
    out.extend(r);
    out
}

/// `items[index*size .. index*size + size]`, clipped. Past the end yields an empty page.
pub fn paginate<T: Clone>(items: &[T], page_index: usize, page_size: usize) -> Vec<T> {
    let start = page_index.saturating_mul(page_size);
    if start >= items.len() {
        return Vec::new();
    }
    let end = start.saturating_add(page_size).min(items.len());
    items[start..end].to_vec()
}

/// The whole pipeline: filter, sort, paginate.
pub fn render_page(records: &[Record], view: &ViewState) -> Page {
    let filtered = filter_records(records, &view.filter);
    let filtered_len = filtered.len();
    let sorted = sort_records(filtered, view.sort);
    let rows = paginate(&sorted, view.page_index, view.page_size)
        .into_iter()
        .cloned()
        .collect();
    Page {
        rows,
        filtered_len,
        page_index: view.page_index,
        page_size: view.page_size,
    }
}

/// Upstream signals that invalidate the current page.
#[derive(Debug, Clone)]
pub enum ViewMessage {
    DataChanged(Arc<Vec<Record>>),
    SortClicked(SortKey),
    FilterChanged(String),
    PageChanged(usize),
    PageSizeChanged(usize),
}

/// Paginator controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNav {
    First,
    Prev,
    Next,
    Last,
    Larger,
    Smaller,
}

/// Holds the latest snapshot and view state, recomputing the page on every message.
#[derive(Debug, Clone, Default)]
pub struct TableViewModel {
    records: Arc<Vec<Record>>,
    view: ViewState,
    page: Page,
}

impl TableViewModel {
    pub fn new(view: ViewState) -> Self {
        let mut vm = Self {
            records: Arc::new(Vec::new()),
            view,
            page: Page::default(),
        };
        vm.recompute();
        vm
    }

    pub fn update(&mut self, msg: ViewMessage) -> &Page {
        match msg {
            ViewMessage::DataChanged(records) => self.records = records,
            ViewMessage::SortClicked(key) => self.view.sort.click(key),
            ViewMessage::FilterChanged(filter) => self.view.set_filter(filter),
            ViewMessage::PageChanged(index) => self.view.page_index = index,
            ViewMessage::PageSizeChanged(size) => self.view.set_page_size(size),
        }
        self.recompute();
        &self.page
    }

    /// Message a paginator control sends, worked out against the current page.
    pub fn page_message(&self, nav: PageNav) -> ViewMessage {
        let len = self.page.filtered_len;
        match nav {
            PageNav::First => ViewMessage::PageChanged(0),
            PageNav::Prev => ViewMessage::PageChanged(self.view.prev_page_index()),
            PageNav::Next => ViewMessage::PageChanged(self.view.next_page_index(len)),
            PageNav::Last => ViewMessage::PageChanged(self.view.last_page_index(len)),
            PageNav::Larger => ViewMessage::PageSizeChanged(self.view.next_page_size(true)),
            PageNav::Smaller => ViewMessage::PageSizeChanged(self.view.next_page_size(false)),
        }
    }

    pub fn recompute(&mut self) {
        self.page = render_page(&self.records, &self.view);
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }
}
