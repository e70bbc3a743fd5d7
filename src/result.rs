use std::collections::{hash_map::Entry, HashMap};

use crate::{
    block::DataBlock,
    decode::{decode_column_header, ColumnHeader},
    response::{Response, ResponseTarget},
    row::Row,
    session::SequenceCounter,
    CursorKind, LineKind, Result, Session, SessionError, SessionOptions,
};

/// Page sizing knobs copied from the session options.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct PagePolicy {
    pub(crate) default_page_size: usize,
    pub(crate) growth_factor: usize,
    pub(crate) growth_limit: usize,
}

impl PagePolicy {
    pub(crate) fn from_options(options: &SessionOptions) -> Self {
        Self {
            default_page_size: options.default_page_size.max(1),
            growth_factor: options.growth_factor,
            growth_limit: options.growth_limit,
        }
    }

    fn ceiling(&self) -> usize {
        self.default_page_size.saturating_mul(self.growth_limit)
    }
}

/// Values taken from a `&1`/`&5` header plus submit settings.
#[derive(Debug)]
pub(crate) struct TableSpec {
    pub(crate) id: i64,
    pub(crate) total_rows: usize,
    pub(crate) columns: usize,
    pub(crate) initial_rows: usize,
    pub(crate) prepared: bool,
    pub(crate) page_size: Option<usize>,
    pub(crate) cursor: CursorKind,
    pub(crate) sequence: u64,
}

/// A tabular result with lazily fetched pages.
///
/// Rows already delivered with the header form page 0. Other pages are
/// requested with `export` on first access. Forward-only results keep at
/// most the page being read and hand every row out once.
#[derive(Debug)]
pub struct TabularResult {
    id: i64,
    total_rows: usize,
    columns: usize,
    prepared: bool,
    names: Option<Vec<String>>,
    types: Option<Vec<String>>,
    table_names: Option<Vec<String>>,
    display_widths: Option<Vec<usize>>,
    pages: HashMap<usize, DataBlock>,
    page_size: usize,
    page_size_explicit: bool,
    row_offset: usize,
    destroy_on_close: bool,
    cursor: CursorKind,
    policy: PagePolicy,
    sequence: u64,
    counter: SequenceCounter,
    session: Session,
    pages_fetched: usize,
    closed: bool,
}

impl TabularResult {
    pub(crate) fn new(
        spec: TableSpec,
        policy: PagePolicy,
        counter: SequenceCounter,
        session: Session,
    ) -> Self {
        let page_size_explicit = spec.page_size.is_some();
        // non-paginating replies (EXPLAIN and friends) deliver everything at once
        let page_size = spec
            .page_size
            .unwrap_or(policy.default_page_size)
            .max(spec.initial_rows)
            .max(1);

        let mut pages = HashMap::new();
        pages.insert(0, DataBlock::new(spec.initial_rows, spec.cursor));

        Self {
            id: spec.id,
            total_rows: spec.total_rows,
            columns: spec.columns,
            prepared: spec.prepared,
            names: None,
            types: None,
            table_names: None,
            display_widths: None,
            pages,
            page_size,
            page_size_explicit,
            row_offset: 0,
            destroy_on_close: spec.id > 0 && spec.total_rows > spec.initial_rows,
            cursor: spec.cursor,
            policy,
            sequence: spec.sequence,
            counter,
            session,
            pages_fetched: 1,
            closed: false,
        }
    }

    fn headers_complete(&self) -> bool {
        self.names.is_some()
            && self.types.is_some()
            && self.table_names.is_some()
            && self.display_widths.is_some()
    }

    /// Feeds one header or tuple line that followed the start-of-header.
    pub(crate) fn add_line(&mut self, line: String, kind: LineKind) -> std::result::Result<(), String> {
        if self.headers_complete() {
            return match self.pages.get_mut(&0) {
                Some(block) => block.add_line(line, kind),
                None => Err(format!("no first block to receive: {line}")),
            };
        }
        if kind != LineKind::Header {
            return Err(format!("header expected, got: {line}"));
        }
        match decode_column_header(&line, self.columns)? {
            ColumnHeader::Names(values) => self.names = Some(values),
            ColumnHeader::Types(values) => self.types = Some(values),
            ColumnHeader::TableNames(values) => self.table_names = Some(values),
            ColumnHeader::Lengths(values) => self.display_widths = Some(values),
            ColumnHeader::Other(_name) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(header = %_name, "ignoring unknown result header");
            }
        }
        Ok(())
    }

    pub(crate) fn wants_more(&self) -> bool {
        if !self.headers_complete() {
            return true;
        }
        self.pages.get(&0).is_some_and(DataBlock::wants_more)
    }

    pub(crate) fn complete(&self) -> std::result::Result<(), String> {
        let mut missing = Vec::new();
        if self.names.is_none() {
            missing.push("name header missing");
        }
        if self.types.is_none() {
            missing.push("type header missing");
        }
        if self.table_names.is_none() {
            missing.push("table name header missing");
        }
        if self.display_widths.is_none() {
            missing.push("column width header missing");
        }
        if !missing.is_empty() {
            return Err(missing.join(", "));
        }
        match self.pages.get(&0) {
            Some(block) => block.complete(),
            None => Ok(()),
        }
    }

    /// Whether later `&6` blocks may still arrive for this result.
    pub(crate) fn expects_blocks(&self) -> bool {
        self.pages
            .get(&0)
            .is_some_and(|block| block.capacity() < self.total_rows)
    }

    /// Places a new page announced at row `offset` and returns it for filling.
    pub(crate) fn open_block(
        &mut self,
        offset: usize,
        rows: usize,
    ) -> std::result::Result<&mut DataBlock, String> {
        let relative = offset.checked_sub(self.row_offset).ok_or_else(|| {
            format!(
                "block offset {offset} lies before the current position {}",
                self.row_offset
            )
        })?;
        let page = relative / self.page_size;
        let block = DataBlock::new(rows, self.cursor);
        self.pages_fetched += 1;
        Ok(match self.pages.entry(page) {
            Entry::Occupied(mut entry) => {
                entry.insert(block);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(block),
        })
    }

    /// Returns the raw tuple line of row `n`, fetching its page if needed.
    ///
    /// Returns `Ok(None)` for rows outside the result, and for rows of a
    /// forward-only result that were already handed out.
    pub async fn row_at(&mut self, n: usize) -> Result<Option<String>> {
        if self.closed {
            return Err(SessionError::Usage(format!(
                "result {} is already closed",
                self.id
            )));
        }
        if n >= self.total_rows {
            return Ok(None);
        }

        let mut page = self.page_of(n)?;
        if self.cursor == CursorKind::ForwardOnly {
            self.pages.retain(|&index, _| index >= page);
        }

        if !self.pages.contains_key(&page) {
            if self.should_grow(n, page) {
                let grown = self
                    .page_size
                    .saturating_mul(self.policy.growth_factor)
                    .min(self.policy.ceiling());
                #[cfg(feature = "tracing")]
                tracing::debug!(id = self.id, from = self.page_size, to = grown, "growing page size");
                self.row_offset += self.page_size;
                self.page_size = grown;
                self.pages.clear();
                page = self.page_of(n)?;
            }

            let count = self.page_size;
            let start = page * count + self.row_offset;
            let session = self.session.clone();
            session.fetch_page(self, start, count).await?;

            if !self.pages.contains_key(&page) {
                return Err(SessionError::protocol(format!(
                    "block {page} of result {} should have been fetched by now",
                    self.id
                )));
            }
        }

        let index = (n - self.row_offset) % self.page_size;
        Ok(self.pages.get_mut(&page).and_then(|block| block.row(index)))
    }

    /// Returns row `n` split into fields.
    pub async fn row_values(&mut self, n: usize) -> Result<Option<Row>> {
        match self.row_at(n).await? {
            Some(raw) => Row::parse(&raw).map(Some).map_err(SessionError::protocol),
            None => Ok(None),
        }
    }

    fn page_of(&self, n: usize) -> Result<usize> {
        let relative = n.checked_sub(self.row_offset).ok_or_else(|| {
            SessionError::Usage(format!(
                "row {n} lies before the forward-only position {}",
                self.row_offset
            ))
        })?;
        Ok(relative / self.page_size)
    }

    /// Detects an uninterrupted sequential scan worth larger pages.
    fn should_grow(&self, n: usize, page: usize) -> bool {
        self.cursor == CursorKind::ForwardOnly
            && !self.page_size_explicit
            && page >= 1
            && self.counter.current() == self.sequence + 1
            && self.total_rows - n > self.page_size
            && self.page_size < self.policy.ceiling()
            && self.page_size.saturating_mul(self.policy.growth_factor) > self.page_size
    }

    /// Releases the server side cursor, if any, and all resident pages.
    ///
    /// Failures while sending `close` are swallowed; calling this twice has
    /// no further effect.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        if self.destroy_on_close {
            let command = crate::wire::close_command(self.id);
            if let Err(_err) = self.session.execute_control(&command).await {
                #[cfg(feature = "tracing")]
                tracing::debug!(id = self.id, error = %_err, "ignoring failed result close");
            }
        }
        self.pages.clear();
        self.closed = true;
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn column_count(&self) -> usize {
        self.columns
    }

    pub fn column_names(&self) -> &[String] {
        self.names.as_deref().unwrap_or_default()
    }

    pub fn column_types(&self) -> &[String] {
        self.types.as_deref().unwrap_or_default()
    }

    pub fn table_names(&self) -> &[String] {
        self.table_names.as_deref().unwrap_or_default()
    }

    pub fn display_widths(&self) -> &[usize] {
        self.display_widths.as_deref().unwrap_or_default()
    }

    /// Rows requested per `export` at the moment.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn cursor(&self) -> CursorKind {
        self.cursor
    }

    /// Whether this result came from a prepare (`&5`).
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Sequence number of the submit that produced this result.
    pub fn sequence_number(&self) -> u64 {
        self.sequence
    }

    /// Indexes of the pages currently held in memory, ascending.
    pub fn resident_pages(&self) -> Vec<usize> {
        let mut pages: Vec<usize> = self.pages.keys().copied().collect();
        pages.sort_unstable();
        pages
    }

    /// Rows held in memory that were not handed out yet.
    pub fn resident_rows(&self) -> usize {
        self.pages.values().map(DataBlock::resident_rows).sum()
    }

    /// Pages received so far, including the one delivered with the header.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}

impl ResponseTarget for TabularResult {
    fn add_response(&mut self, _response: Response) {
        #[cfg(feature = "tracing")]
        tracing::debug!(id = self.id, "dropping response received during page fetch");
    }

    fn has_result(&self, id: i64) -> bool {
        id == self.id
    }

    fn data_block(
        &mut self,
        id: i64,
        offset: usize,
        rows: usize,
    ) -> std::result::Result<&mut DataBlock, String> {
        if id != self.id {
            return Err(format!("no result with id {id} found"));
        }
        self.open_block(offset, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::{PagePolicy, TableSpec, TabularResult};
    use crate::session::{tests::idle_session, SequenceCounter};
    use crate::{CursorKind, LineKind, SessionOptions};

    fn spec(total_rows: usize, initial_rows: usize, page_size: Option<usize>) -> TableSpec {
        TableSpec {
            id: 1,
            total_rows,
            columns: 2,
            initial_rows,
            prepared: false,
            page_size,
            cursor: CursorKind::ForwardOnly,
            sequence: 0,
        }
    }

    fn table(spec: TableSpec) -> TabularResult {
        let counter = SequenceCounter::default();
        counter.next();
        TabularResult::new(
            spec,
            PagePolicy::from_options(&SessionOptions::default()),
            counter,
            idle_session(),
        )
    }

    fn feed_headers(result: &mut TabularResult) {
        for line in [
            "% sys.t,\tsys.t # table_name",
            "% id,\tname # name",
            "% int,\tvarchar # type",
            "% 1,\t3 # length",
        ] {
            result
                .add_line(line.to_owned(), LineKind::Header)
                .expect("header must be accepted");
        }
    }

    #[tokio::test]
    async fn page_size_covers_initial_rows() {
        assert_eq!(table(spec(600, 400, None)).page_size(), 400);
        assert_eq!(table(spec(600, 10, Some(50))).page_size(), 50);
        assert_eq!(table(spec(600, 10, None)).page_size(), 250);
    }

    #[tokio::test]
    async fn destroy_on_close_only_for_partial_results() {
        assert!(table(spec(600, 250, None)).destroy_on_close);
        assert!(!table(spec(10, 10, None)).destroy_on_close);
    }

    #[tokio::test]
    async fn headers_then_rows() {
        let mut result = table(spec(2, 2, None));
        assert!(result.wants_more());
        feed_headers(&mut result);
        assert!(result.wants_more());
        assert_eq!(result.column_names(), ["id", "name"]);
        result
            .add_line("[ 1,\t\"a\"\t]".to_owned(), LineKind::Result)
            .expect("row must be accepted");
        result
            .add_line("[ 2,\t\"b\"\t]".to_owned(), LineKind::Result)
            .expect("row must be accepted");
        assert!(!result.wants_more());
        assert!(result.complete().is_ok());
        assert!(!result.expects_blocks());
    }

    #[tokio::test]
    async fn missing_headers_fail_completion() {
        let mut result = table(spec(0, 0, None));
        result
            .add_line("% id,\tname # name".to_owned(), LineKind::Header)
            .expect("header must be accepted");
        let err = result.complete().expect_err("must fail");
        let text = err.to_string();
        assert!(text.contains("type header missing"));
        assert!(text.contains("column width header missing"));
        assert!(!text.starts_with("protocol violation: name header missing"));
    }

    #[tokio::test]
    async fn rows_before_headers_are_rejected() {
        let mut result = table(spec(1, 1, None));
        assert!(result
            .add_line("[ 1\t]".to_owned(), LineKind::Result)
            .is_err());
    }

    #[tokio::test]
    async fn open_block_positions_by_offset() {
        let mut result = table(spec(1000, 250, None));
        result.open_block(750, 250).expect("must place block");
        assert_eq!(result.resident_pages(), vec![0, 3]);
        assert_eq!(result.pages_fetched(), 2);
    }

    #[tokio::test]
    async fn out_of_range_rows_are_none() {
        let mut result = table(spec(0, 0, None));
        feed_headers(&mut result);
        assert_eq!(result.row_at(0).await.expect("must not fail"), None);
    }

    #[tokio::test]
    async fn closed_result_rejects_reads() {
        let mut result = table(spec(1, 1, None));
        result.close().await;
        result.close().await;
        assert!(result.is_closed());
        assert!(result.row_at(0).await.is_err());
    }
}
