use tracing::{debug, trace};

use crate::logging::redact;
use crate::record::Value;

/// Receiver of committed cell edits.
pub trait CellUpdater {
    fn update_cell(&mut self, row_index: usize, field: &str, value: Value);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Clean,
    Dirty,
}

/// Locally buffered text of one editable cell.
///
/// Keystrokes only touch the buffer. The row data is updated once, when the
/// cell loses focus. An external change of the underlying value always
/// replaces the buffer.
#[derive(Debug, Clone)]
pub struct EditBuffer {
    row_index: usize,
    field: String,
    numeric: bool,
    committed: String,
    buffer: String,
    state: BufferState,
}

impl EditBuffer {
    pub fn new(row_index: usize, field: impl Into<String>, value: &Value) -> Self {
        let text = value.to_string();
        Self {
            row_index,
            field: field.into(),
            numeric: matches!(value, Value::Number(_)),
            committed: text.clone(),
            buffer: text,
            state: BufferState::Clean,
        }
    }

    pub fn row_index(&self) -> usize {
        self.row_index
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    #[cfg(test)]
    pub fn state(&self) -> BufferState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state == BufferState::Dirty
    }

    pub fn is_for(&self, row_index: usize, field: &str) -> bool {
        self.row_index == row_index && self.field == field
    }

    pub fn edit(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
        self.state = BufferState::Dirty;
    }

    /// Commits a dirty buffer through `updater`. Returns whether a commit
    /// happened.
    pub fn blur(&mut self, updater: &mut impl CellUpdater) -> bool {
        if self.state == BufferState::Clean {
            return false;
        }
        let value = self.typed_value();
        debug!(
            "Commit {}:{} = {}",
            self.row_index,
            self.field,
            redact(&self.buffer)
        );
        updater.update_cell(self.row_index, &self.field, value);
        self.committed = self.buffer.clone();
        self.state = BufferState::Clean;
        true
    }

    pub fn revert(&mut self) {
        self.buffer = self.committed.clone();
        self.state = BufferState::Clean;
    }

    /// Called on every pass with the value currently held by the row.
    pub fn sync_external(&mut self, value: &Value) {
        let external = value.to_string();
        if external != self.committed {
            trace!(
                "External update of {}:{} replaces the edit buffer",
                self.row_index, self.field
            );
            self.numeric = matches!(value, Value::Number(_));
            self.committed = external.clone();
            self.buffer = external;
            self.state = BufferState::Clean;
        }
    }

    fn typed_value(&self) -> Value {
        if self.numeric
            && let Ok(n) = self.buffer.trim().parse::<f64>()
        {
            return Value::Number(n);
        }
        Value::Text(self.buffer.clone())
    }
}
