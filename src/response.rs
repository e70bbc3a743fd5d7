use std::collections::{HashMap, VecDeque};

use crate::{block::DataBlock, AutoCommitChange, TabularResult, UpdateResult};

/// One server acknowledgement of a submitted command.
#[derive(Debug)]
pub enum Response {
    Tabular(TabularResult),
    Update(UpdateResult),
    SchemaChange,
    AutoCommitChange(AutoCommitChange),
}

impl Response {
    pub fn as_tabular(&self) -> Option<&TabularResult> {
        match self {
            Self::Tabular(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_tabular_mut(&mut self) -> Option<&mut TabularResult> {
        match self {
            Self::Tabular(result) => Some(result),
            _ => None,
        }
    }

    pub fn into_tabular(self) -> Option<TabularResult> {
        match self {
            Self::Tabular(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_update(&self) -> Option<&UpdateResult> {
        match self {
            Self::Update(update) => Some(update),
            _ => None,
        }
    }

    pub fn as_auto_commit_change(&self) -> Option<AutoCommitChange> {
        match self {
            Self::AutoCommitChange(change) => Some(*change),
            _ => None,
        }
    }

    pub fn is_schema_change(&self) -> bool {
        matches!(self, Self::SchemaChange)
    }

    /// Releases server side resources held by a tabular response.
    pub async fn close(&mut self) {
        if let Self::Tabular(result) = self {
            result.close().await;
        }
    }
}

/// Receiver of the responses a read loop produces.
pub(crate) trait ResponseTarget: Send {
    fn add_response(&mut self, response: Response);

    /// Whether blocks for the result `id` may arrive here.
    fn has_result(&self, id: i64) -> bool;

    /// Opens a page for the result `id` starting at row `offset`.
    fn data_block(
        &mut self,
        id: i64,
        offset: usize,
        rows: usize,
    ) -> Result<&mut DataBlock, String>;
}

/// All responses of one submitted batch, in server order.
#[derive(Debug)]
pub struct ResponseSequence {
    sequence: u64,
    responses: VecDeque<Response>,
    // results that may still receive blocks, by id, while the batch is read
    open_results: HashMap<i64, usize>,
}

impl ResponseSequence {
    pub(crate) fn new(sequence: u64) -> Self {
        Self {
            sequence,
            responses: VecDeque::new(),
            open_results: HashMap::new(),
        }
    }

    /// Called once the prompt ending the batch was read.
    pub(crate) fn seal(&mut self) {
        self.open_results.clear();
    }

    /// Takes the next response. The caller owns it from here on.
    pub fn next_response(&mut self) -> Option<Response> {
        self.responses.pop_front()
    }

    pub fn peek(&self) -> Option<&Response> {
        self.responses.front()
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence
    }

    /// Closes every response still held.
    pub async fn close(&mut self) {
        while let Some(mut response) = self.responses.pop_front() {
            response.close().await;
        }
    }
}

impl ResponseTarget for ResponseSequence {
    fn add_response(&mut self, response: Response) {
        if let Response::Tabular(result) = &response {
            if result.expects_blocks() {
                self.open_results.insert(result.id(), self.responses.len());
            }
        }
        self.responses.push_back(response);
    }

    fn has_result(&self, id: i64) -> bool {
        self.open_results.contains_key(&id)
    }

    fn data_block(
        &mut self,
        id: i64,
        offset: usize,
        rows: usize,
    ) -> Result<&mut DataBlock, String> {
        let index = *self
            .open_results
            .get(&id)
            .ok_or_else(|| format!("no result with id {id} found"))?;
        match self.responses.get_mut(index) {
            Some(Response::Tabular(result)) => result.open_block(offset, rows),
            _ => Err(format!("no result with id {id} found")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Response, ResponseSequence, ResponseTarget};
    use crate::{AutoCommitChange, UpdateResult};

    #[test]
    fn responses_come_out_in_order() {
        let mut sequence = ResponseSequence::new(4);
        sequence.add_response(Response::Update(UpdateResult {
            affected_row_count: 3,
            generated_key: None,
        }));
        sequence.add_response(Response::SchemaChange);
        sequence.add_response(Response::AutoCommitChange(AutoCommitChange {
            auto_commit: false,
        }));
        assert_eq!(sequence.len(), 3);
        assert_eq!(sequence.sequence_number(), 4);

        let first = sequence.next_response().expect("must have first");
        assert_eq!(first.as_update().map(|u| u.affected_row_count), Some(3));
        assert!(sequence.next_response().expect("second").is_schema_change());
        assert_eq!(
            sequence
                .next_response()
                .and_then(|r| r.as_auto_commit_change()),
            Some(AutoCommitChange { auto_commit: false })
        );
        assert!(sequence.next_response().is_none());
    }

    #[test]
    fn unknown_block_id_is_rejected() {
        let mut sequence = ResponseSequence::new(0);
        assert!(!sequence.has_result(9));
        let err = sequence.data_block(9, 0, 1).expect_err("must fail");
        assert!(err.contains("id 9"));
    }
}
