use crate::{CursorKind, LineKind};

/// One page of raw tuple lines belonging to a tabular result.
#[derive(Debug)]
pub(crate) struct DataBlock {
    rows: Vec<Option<String>>,
    capacity: usize,
    cursor: CursorKind,
}

impl DataBlock {
    pub(crate) fn new(capacity: usize, cursor: CursorKind) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            capacity,
            cursor,
        }
    }

    /// Appends one tuple line, rejecting anything else or an overflow.
    pub(crate) fn add_line(&mut self, line: String, kind: LineKind) -> Result<(), String> {
        if kind != LineKind::Result {
            return Err(format!("unexpected line in data block: {line}"));
        }
        if !self.wants_more() {
            return Err(format!(
                "data block already holds its {} rows, got: {line}",
                self.capacity
            ));
        }
        self.rows.push(Some(line));
        Ok(())
    }

    pub(crate) fn wants_more(&self) -> bool {
        self.rows.len() < self.capacity
    }

    /// Checks that the server sent exactly the rows it announced.
    pub(crate) fn complete(&self) -> Result<(), String> {
        if self.rows.len() != self.capacity {
            return Err(format!(
                "inconsistent state detected: block capacity {}, block usage {}",
                self.capacity,
                self.rows.len()
            ));
        }
        Ok(())
    }

    /// Returns the row at `index`. Forward-only blocks hand the row out once.
    pub(crate) fn row(&mut self, index: usize) -> Option<String> {
        let slot = self.rows.get_mut(index)?;
        match self.cursor {
            CursorKind::ForwardOnly => slot.take(),
            CursorKind::Scrollable => slot.clone(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn resident_rows(&self) -> usize {
        self.rows.iter().filter(|row| row.is_some()).count()
    }
}
