//! Add / edit / delete dialogs.
//!
//! A dialog collects or confirms one record. Confirming yields an action for the opener
//! together with result code 1; cancelling yields code 0.

use crate::model::{NewRecord, Record};

/// Single-line text input with a char-indexed cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineInput {
    value: String,
    cursor: usize,
}

impl LineInput {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            cursor: value.chars().count(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn insert(&mut self, ch: char) {
        let at = self.byte_pos();
        self.value.insert(at, ch);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_pos();
        self.value.remove(at);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let at = self.byte_pos();
            self.value.remove(at);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.value.chars().count();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    fn byte_pos(&self) -> usize {
        self.value
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogMode {
    Add,
    Edit,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Price,
    Amount,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Name, Field::Price, Field::Amount];

    pub fn label(self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Price => "Price",
            Field::Amount => "Amount",
        }
    }

    fn index(self) -> usize {
        match self {
            Field::Name => 0,
            Field::Price => 1,
            Field::Amount => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: &'static str,
}

/// What the opener should do after a confirmed dialog.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogAction {
    Create(NewRecord),
    Update(Record),
    Delete(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DialogResult {
    Confirmed(DialogAction),
    Cancelled,
}

impl DialogResult {
    pub const CONFIRMED: i32 = 1;
    pub const CANCELLED: i32 = 0;

    pub fn code(&self) -> i32 {
        match self {
            DialogResult::Confirmed(_) => Self::CONFIRMED,
            DialogResult::Cancelled => Self::CANCELLED,
        }
    }

    pub fn into_action(self) -> Option<DialogAction> {
        match self {
            DialogResult::Confirmed(action) => Some(action),
            DialogResult::Cancelled => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordDialog {
    pub mode: DialogMode,
    id: Option<u64>,
    inputs: [LineInput; 3],
    focus: Field,
    pub errors: Vec<FieldError>,
}

impl RecordDialog {
    pub fn add() -> Self {
        Self {
            mode: DialogMode::Add,
            id: None,
            inputs: Default::default(),
            focus: Field::Name,
            errors: Vec::new(),
        }
    }

    pub fn edit(record: &Record) -> Self {
        Self::prefilled(DialogMode::Edit, record)
    }

    pub fn delete(record: &Record) -> Self {
        Self::prefilled(DialogMode::Delete, record)
    }

    fn prefilled(mode: DialogMode, record: &Record) -> Self {
        Self {
            mode,
            id: Some(record.id),
            inputs: [
                LineInput::new(&record.name),
                LineInput::new(&record.price),
                LineInput::new(&record.amount),
            ],
            focus: Field::Name,
            errors: Vec::new(),
        }
    }

    pub fn title(&self) -> String {
        match (self.mode, self.id) {
            (DialogMode::Add, _) => "Add new record".to_string(),
            (DialogMode::Edit, Some(id)) => format!("Edit record #{id}"),
            (DialogMode::Delete, Some(id)) => format!("Delete record #{id}?"),
            (_, None) => "Record".to_string(),
        }
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn is_read_only(&self) -> bool {
        self.mode == DialogMode::Delete
    }

    pub fn focus(&self) -> Field {
        self.focus
    }

    pub fn input(&self, field: Field) -> &LineInput {
        &self.inputs[field.index()]
    }

    /// The input under the cursor, or None for read-only dialogs.
    pub fn focused_mut(&mut self) -> Option<&mut LineInput> {
        if self.is_read_only() {
            return None;
        }
        Some(&mut self.inputs[self.focus.index()])
    }

    pub fn focus_next(&mut self) {
        self.focus = Field::ALL[(self.focus.index() + 1) % Field::ALL.len()];
    }

    pub fn focus_prev(&mut self) {
        self.focus = Field::ALL[(self.focus.index() + Field::ALL.len() - 1) % Field::ALL.len()];
    }

    pub fn error_for(&self, field: Field) -> Option<&'static str> {
        self.errors.iter().find(|e| e.field == field).map(|e| e.message)
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        for field in Field::ALL {
            let value = self.input(field).value().trim();
            if value.is_empty() {
                errors.push(FieldError {
                    field,
                    message: "Required field",
                });
            } else if field != Field::Name && value.parse::<f64>().map_or(true, |v| !v.is_finite())
            {
                errors.push(FieldError {
                    field,
                    message: "Must be a number",
                });
            }
        }
        errors
    }

    /// Try to confirm. Validation failures keep the dialog open and are recorded in `errors`.
    pub fn confirm(&mut self) -> Result<DialogResult, Vec<FieldError>> {
        if self.mode == DialogMode::Delete {
            return match self.id {
                Some(id) => Ok(DialogResult::Confirmed(DialogAction::Delete(id))),
                None => Ok(DialogResult::Cancelled),
            };
        }

        self.errors = self.validate();
        if let Some(first) = self.errors.first() {
            self.focus = first.field;
            return Err(self.errors.clone());
        }

        let new = NewRecord {
            name: self.input(Field::Name).value().trim().to_string(),
            price: self.input(Field::Price).value().trim().to_string(),
            amount: self.input(Field::Amount).value().trim().to_string(),
        };
        let action = match (self.mode, self.id) {
            (DialogMode::Edit, Some(id)) => DialogAction::Update(new.with_id(id)),
            _ => DialogAction::Create(new),
        };
        Ok(DialogResult::Confirmed(action))
    }

    pub fn cancel(&self) -> DialogResult {
        DialogResult::Cancelled
    }
}
