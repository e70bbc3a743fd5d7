use std::fmt;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex as StdMutex,
};
use std::time::Duration;

use tokio::sync::Mutex;

use crate::{
    decode::{decode_error_line, decode_info_line},
    response::{Response, ResponseSequence, ResponseTarget},
    result::{PagePolicy, TableSpec},
    sender::{BackgroundSender, SharedWriter},
    wire::{self, CommandKind, Header, Template},
    error::{PROTOCOL_VIOLATION, UNKNOWN_RESULT, WRITE_FAILURE},
    AutoCommitChange, ErrorChain, Line, LineKind, LineReader, LineWriter, Result, Savepoint,
    ServerError, SessionError, SessionOptions, SubmitOptions, TabularResult, TransportError,
    UpdateResult,
    Warning,
};

/// Per-session count of submitted batches.
#[derive(Clone, Debug, Default)]
pub(crate) struct SequenceCounter(Arc<AtomicU64>);

impl SequenceCounter {
    /// Allocates the next sequence number.
    pub(crate) fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    /// Number of sequence numbers handed out so far.
    pub(crate) fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle to one MAPI session.
///
/// Clones share the same transport. Every submit, page fetch and control
/// command holds the session lock for its whole write-and-drain cycle.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    options: SessionOptions,
    policy: PagePolicy,
    counter: SequenceCounter,
    closed: AtomicBool,
    auto_commit: AtomicBool,
    savepoints: AtomicU64,
    warnings: StdMutex<Vec<Warning>>,
    io: Mutex<Io>,
}

struct Io {
    reader: Option<Box<dyn LineReader>>,
    writer: Option<SharedWriter>,
    sender: Option<BackgroundSender>,
    reply_size: Option<usize>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("options", &self.inner.options)
            .field("sequence", &self.inner.counter.current())
            .field("auto_commit", &self.current_auto_commit())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Why a read loop stopped early.
enum ReadFault {
    Transport(TransportError),
    Violation(String),
    UnknownResult(i64),
}

impl From<TransportError> for ReadFault {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

/// Problems collected between two prompts.
#[derive(Default)]
struct Faults {
    chain: ErrorChain,
    violation: Option<(&'static str, String)>,
}

impl Faults {
    fn violation(&mut self, code: &'static str, message: String) {
        self.violation.get_or_insert((code, message));
    }

    fn into_result(self) -> Result<()> {
        match self.violation {
            Some((code, message)) => Err(SessionError::Protocol {
                code,
                message,
                chain: self.chain,
            }),
            None if !self.chain.is_empty() => Err(SessionError::Server(self.chain)),
            None => Ok(()),
        }
    }
}

impl Session {
    /// Creates a session over an already connected, logged in transport.
    pub fn new<R, W>(reader: R, writer: W, options: SessionOptions) -> Self
    where
        R: LineReader + 'static,
        W: LineWriter + 'static,
    {
        Self::from_boxed(Box::new(reader), Box::new(writer), options)
    }

    /// Same as [`Session::new`] for transports that are already boxed.
    pub fn from_boxed(
        reader: Box<dyn LineReader>,
        writer: Box<dyn LineWriter>,
        options: SessionOptions,
    ) -> Self {
        let policy = PagePolicy::from_options(&options);
        Self {
            inner: Arc::new(SessionInner {
                options,
                policy,
                counter: SequenceCounter::default(),
                closed: AtomicBool::new(false),
                auto_commit: AtomicBool::new(true),
                savepoints: AtomicU64::new(0),
                warnings: StdMutex::new(Vec::new()),
                io: Mutex::new(Io {
                    reader: Some(reader),
                    writer: Some(Arc::new(Mutex::new(writer))),
                    sender: None,
                    reply_size: None,
                }),
            }),
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    /// Submits command text and collects every response up to the prompt.
    ///
    /// Server errors of the whole batch are returned together. Responses
    /// received before an error are closed before the error is returned.
    pub async fn submit(&self, text: &str, options: SubmitOptions) -> Result<ResponseSequence> {
        self.ensure_open()?;
        let mut io = self.inner.io.lock().await;
        self.ensure_open()?;

        let sequence = self.inner.counter.next();
        #[cfg(feature = "tracing")]
        tracing::debug!(sequence, bytes = text.len(), "submitting command");

        let mut responses = ResponseSequence::new(sequence);
        let outcome = self
            .run_cycle(
                &mut io,
                CommandKind::Query,
                text,
                &options,
                sequence,
                &mut responses,
            )
            .await;
        responses.seal();
        drop(io);

        match outcome {
            Ok(()) => Ok(responses),
            Err(err) => {
                responses.close().await;
                Err(err)
            }
        }
    }

    /// Submits command text and discards its responses.
    pub async fn execute(&self, text: &str) -> Result<()> {
        let mut responses = self.submit(text, SubmitOptions::default()).await?;
        responses.close().await;
        Ok(())
    }

    /// Sends a control command and waits for its prompt.
    pub async fn execute_control(&self, command: &str) -> Result<()> {
        self.ensure_open()?;
        let mut io = self.inner.io.lock().await;
        self.ensure_open()?;
        self.control_locked(&mut io, command).await
    }

    /// Switches auto-commit mode, talking to the server only on change.
    pub async fn set_auto_commit(&self, enabled: bool) -> Result<()> {
        if self.current_auto_commit() == enabled {
            return Ok(());
        }
        self.execute_control(&wire::auto_commit_command(enabled))
            .await?;
        self.inner.auto_commit.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    pub fn current_auto_commit(&self) -> bool {
        self.inner.auto_commit.load(Ordering::SeqCst)
    }

    pub async fn commit(&self) -> Result<()> {
        self.execute("COMMIT").await
    }

    pub async fn rollback(&self) -> Result<()> {
        self.execute("ROLLBACK").await
    }

    /// Creates a savepoint, generating a name when none is given.
    pub async fn set_savepoint(&self, name: Option<&str>) -> Result<Savepoint> {
        let name = match name {
            Some(name) if name.trim().is_empty() => {
                return Err(SessionError::Usage(
                    "savepoint name cannot be empty".to_owned(),
                ))
            }
            Some(name) => name.trim().to_owned(),
            None => format!(
                "MonetDBSP{}",
                self.inner.savepoints.fetch_add(1, Ordering::SeqCst)
            ),
        };
        self.execute(&format!("SAVEPOINT {name}")).await?;
        Ok(Savepoint::new(name))
    }

    pub async fn release_savepoint(&self, savepoint: &Savepoint) -> Result<()> {
        self.execute(&format!("RELEASE SAVEPOINT {}", savepoint.name()))
            .await
    }

    pub async fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> Result<()> {
        self.execute(&format!("ROLLBACK TO SAVEPOINT {}", savepoint.name()))
            .await
    }

    /// Warnings collected since the last [`Session::clear_warnings`].
    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings_guard().clone()
    }

    pub fn clear_warnings(&self) {
        self.warnings_guard().clear();
    }

    /// Releases the transport and stops the background sender.
    ///
    /// Later operations fail with [`SessionError::Closed`]. Idempotent.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let mut io = self.inner.io.lock().await;
        Self::release(&mut io);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Requests rows `start..start + count` of `target` and stores the page.
    ///
    /// Takes a sequence number like [`Session::submit`] does.
    pub(crate) async fn fetch_page(
        &self,
        target: &mut TabularResult,
        start: usize,
        count: usize,
    ) -> Result<()> {
        self.ensure_open()?;
        let mut io = self.inner.io.lock().await;
        self.ensure_open()?;

        let command = wire::export_command(target.id(), start, count);
        #[cfg(feature = "tracing")]
        tracing::debug!(%command, "fetching page");
        let options = SubmitOptions::default().with_cursor(target.cursor());
        // exports take a sequence number like any submit
        let sequence = self.inner.counter.next();
        self.run_cycle(
            &mut io,
            CommandKind::Control,
            &command,
            &options,
            sequence,
            target,
        )
        .await
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn warnings_guard(&self) -> std::sync::MutexGuard<'_, Vec<Warning>> {
        // a panic while pushing a warning leaves the vector intact
        self.inner
            .warnings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn add_warning(&self, warning: Warning) {
        #[cfg(feature = "tracing")]
        tracing::debug!(code = %warning.code, message = %warning.message, "session warning");
        self.warnings_guard().push(warning);
    }

    fn release(io: &mut Io) {
        if let Some(mut sender) = io.sender.take() {
            sender.shutdown();
        }
        io.reader = None;
        io.writer = None;
        io.reply_size = None;
    }

    /// Marks the session closed after a transport failure.
    fn abort(&self, io: &mut Io, err: TransportError) -> SessionError {
        #[cfg(feature = "tracing")]
        tracing::warn!(error = %err, "closing session after transport failure");
        self.inner.closed.store(true, Ordering::SeqCst);
        Self::release(io);
        SessionError::Transport(err)
    }

    /// One write-and-drain cycle. The caller holds the session lock.
    async fn run_cycle(
        &self,
        io: &mut Io,
        kind: CommandKind,
        body: &str,
        options: &SubmitOptions,
        sequence: u64,
        target: &mut dyn ResponseTarget,
    ) -> Result<()> {
        let language = self.inner.options.language;
        if kind == CommandKind::Query && language == crate::Language::Sql {
            let mut size = options
                .requested_page_size()
                .unwrap_or(self.inner.policy.default_page_size);
            if options.max_rows != 0 {
                size = size.min(options.max_rows);
            }
            if io.reply_size != Some(size) {
                #[cfg(feature = "tracing")]
                tracing::debug!(size, "negotiating reply size");
                self.control_locked(io, &wire::reply_size_command(size))
                    .await?;
                io.reply_size = Some(size);
            }
        }

        let framed = Template::for_command(language, kind).frame(body);
        let writer = io.writer.clone().ok_or(SessionError::Closed)?;
        let background = framed.len() > self.inner.options.block_size;
        if background {
            let sender = io
                .sender
                .get_or_insert_with(|| BackgroundSender::spawn(writer));
            sender.send(framed)?;
        } else if let Err(err) = writer.lock().await.write_line(&framed).await {
            return Err(self.abort(io, err));
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(sequence, background, "command written");

        let read = match io.reader.as_deref_mut() {
            Some(reader) => {
                self.read_replies(reader, options, sequence, target)
                    .await
            }
            None => Err(TransportError::Closed),
        };

        // abort first, the sender task may be stuck in its write
        let mut faults = match read {
            Ok(faults) => faults,
            Err(err) => return Err(self.abort(io, err)),
        };
        if let Some(sender) = io.sender.as_mut().filter(|_| background) {
            if let Err(err) = sender.join().await {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %err, "background write failed");
                faults.chain.push(ServerError::new(WRITE_FAILURE, err.to_string()));
            }
        }
        faults.into_result()
    }

    /// Writes a control command and drains to the prompt.
    async fn control_locked(&self, io: &mut Io, command: &str) -> Result<()> {
        let framed = Template::for_command(self.inner.options.language, CommandKind::Control)
            .frame(command);
        let writer = io.writer.clone().ok_or(SessionError::Closed)?;
        if let Err(err) = writer.lock().await.write_line(&framed).await {
            return Err(self.abort(io, err));
        }

        let mut faults = Faults::default();
        let drained = match io.reader.as_deref_mut() {
            Some(reader) => self.drain(reader, &mut faults).await,
            None => Err(TransportError::Closed),
        };
        if let Err(err) = drained {
            return Err(self.abort(io, err));
        }
        faults.into_result()
    }

    /// Reads replies until the prompt, dispatching on line kind.
    async fn read_replies(
        &self,
        reader: &mut dyn LineReader,
        options: &SubmitOptions,
        sequence: u64,
        target: &mut dyn ResponseTarget,
    ) -> std::result::Result<Faults, TransportError> {
        let mut faults = Faults::default();
        let mut line = self.read_line(reader).await?;
        loop {
            match line.kind {
                LineKind::Prompt => break,
                LineKind::StartOfHeader => {
                    match self
                        .read_response(reader, &line.text, options, sequence, target)
                        .await
                    {
                        Ok(()) => {}
                        Err(ReadFault::Transport(err)) => return Err(err),
                        Err(ReadFault::Violation(message)) => {
                            faults.violation(PROTOCOL_VIOLATION, message);
                            self.drain(reader, &mut faults).await?;
                            break;
                        }
                        Err(ReadFault::UnknownResult(id)) => {
                            faults.violation(UNKNOWN_RESULT, format!("no result with id {id} found"));
                            self.drain(reader, &mut faults).await?;
                            break;
                        }
                    }
                    line = self.read_line(reader).await?;
                }
                LineKind::Info => {
                    self.add_warning(Warning::new("01000", decode_info_line(&line.text)));
                    line = self.read_line(reader).await?;
                }
                LineKind::Error => {
                    faults.chain.push(decode_error_line(&line.text));
                    self.drain(reader, &mut faults).await?;
                    break;
                }
                LineKind::Header | LineKind::Result | LineKind::Unknown => {
                    faults.violation(PROTOCOL_VIOLATION, format!("unexpected line: {}", line.text));
                    self.drain(reader, &mut faults).await?;
                    break;
                }
            }
        }
        Ok(faults)
    }

    /// Builds the response announced by `header_line` and feeds it its lines.
    async fn read_response(
        &self,
        reader: &mut dyn LineReader,
        header_line: &str,
        options: &SubmitOptions,
        sequence: u64,
        target: &mut dyn ResponseTarget,
    ) -> std::result::Result<(), ReadFault> {
        let header = wire::parse_start_of_header(header_line).map_err(|err| {
            ReadFault::Violation(format!("error while parsing start of header: {err}"))
        })?;

        match header {
            Header::Table {
                id,
                total_rows,
                columns,
                rows,
                prepared,
            } => {
                let total_rows = match options.max_rows {
                    0 => total_rows,
                    max => total_rows.min(max),
                };
                let spec = TableSpec {
                    id,
                    total_rows,
                    columns,
                    initial_rows: rows,
                    prepared,
                    page_size: options.requested_page_size(),
                    cursor: options.cursor,
                    sequence,
                };
                let mut result = TabularResult::new(
                    spec,
                    self.inner.policy,
                    self.inner.counter.clone(),
                    self.clone(),
                );
                while result.wants_more() {
                    let line = self.read_line(reader).await?;
                    result
                        .add_line(line.text, line.kind)
                        .map_err(ReadFault::Violation)?;
                }
                result.complete().map_err(ReadFault::Violation)?;
                target.add_response(Response::Tabular(result));
            }
            Header::Update { count, last_id } => {
                target.add_response(Response::Update(UpdateResult {
                    affected_row_count: count,
                    generated_key: last_id,
                }));
            }
            Header::Schema => target.add_response(Response::SchemaChange),
            Header::Transaction { auto_commit } => {
                let previous = self.inner.auto_commit.swap(auto_commit, Ordering::SeqCst);
                if previous && auto_commit {
                    self.add_warning(Warning::new(
                        "01M11",
                        "Server enabled auto commit mode while local state already was auto commit.",
                    ));
                }
                target.add_response(Response::AutoCommitChange(AutoCommitChange { auto_commit }));
            }
            Header::Block {
                id, rows, offset, ..
            } => {
                if !target.has_result(id) {
                    return Err(ReadFault::UnknownResult(id));
                }
                let block = target
                    .data_block(id, offset, rows)
                    .map_err(ReadFault::Violation)?;
                while block.wants_more() {
                    let line = self.read_line(reader).await?;
                    block
                        .add_line(line.text, line.kind)
                        .map_err(ReadFault::Violation)?;
                }
                block.complete().map_err(ReadFault::Violation)?;
            }
        }
        Ok(())
    }

    /// Skips to the prompt, keeping every error line on the way.
    async fn drain(
        &self,
        reader: &mut dyn LineReader,
        faults: &mut Faults,
    ) -> std::result::Result<(), TransportError> {
        loop {
            let line = self.read_line(reader).await?;
            match line.kind {
                LineKind::Prompt => return Ok(()),
                LineKind::Error => faults.chain.push(decode_error_line(&line.text)),
                _ => {}
            }
        }
    }

    async fn read_line(
        &self,
        reader: &mut dyn LineReader,
    ) -> std::result::Result<Line, TransportError> {
        match self.inner.options.read_timeout_ms {
            0 => reader.read_line().await,
            millis => tokio::time::timeout(Duration::from_millis(millis), reader.read_line())
                .await
                .map_err(|_| TransportError::Timeout)?,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex as StdMutex};

    use super::Session;
    use crate::{
        transport::BoxFuture, Language, Line, LineReader, LineWriter, SessionError,
        SessionOptions, SubmitOptions, TransportError,
    };

    struct ScriptReader {
        lines: Arc<StdMutex<VecDeque<Line>>>,
    }

    impl LineReader for ScriptReader {
        fn read_line(&mut self) -> BoxFuture<'_, Result<Line, TransportError>> {
            Box::pin(async move {
                self.lines
                    .lock()
                    .expect("script mutex must not be poisoned")
                    .pop_front()
                    .ok_or(TransportError::Closed)
            })
        }
    }

    struct LogWriter {
        log: Arc<StdMutex<Vec<String>>>,
    }

    impl LineWriter for LogWriter {
        fn write_line<'a>(
            &'a mut self,
            text: &'a str,
        ) -> BoxFuture<'a, Result<(), TransportError>> {
            Box::pin(async move {
                self.log
                    .lock()
                    .expect("log mutex must not be poisoned")
                    .push(text.to_owned());
                Ok(())
            })
        }
    }

    struct Script {
        session: Session,
        log: Arc<StdMutex<Vec<String>>>,
    }

    impl Script {
        fn written(&self) -> Vec<String> {
            self.log.lock().expect("log mutex must not be poisoned").clone()
        }
    }

    fn scripted(lines: &[&str], options: SessionOptions) -> Script {
        let queue = lines.iter().map(|line| Line::classified(*line)).collect();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let session = Session::new(
            ScriptReader {
                lines: Arc::new(StdMutex::new(queue)),
            },
            LogWriter { log: log.clone() },
            options,
        );
        Script { session, log }
    }

    /// A session whose transport has nothing to say.
    pub(crate) fn idle_session() -> Session {
        scripted(&[], SessionOptions::default()).session
    }

    #[tokio::test]
    async fn update_count_and_reply_size_negotiation() {
        let script = scripted(
            &["", "&2 3 -1", "", "&2 1 17", ""],
            SessionOptions::default(),
        );
        let mut first = script
            .session
            .submit("DELETE FROM t", SubmitOptions::default())
            .await
            .expect("submit must succeed");
        let update = first.next_response().expect("must have response");
        assert_eq!(update.as_update().map(|u| u.affected_row_count), Some(3));

        let mut second = script
            .session
            .submit("INSERT INTO t VALUES (1)", SubmitOptions::default())
            .await
            .expect("submit must succeed");
        let update = second.next_response().expect("must have response");
        assert_eq!(update.as_update().and_then(|u| u.generated_key), Some(17));
        assert_eq!(second.sequence_number(), 1);

        assert_eq!(
            script.written(),
            vec![
                "Xreply_size 250".to_owned(),
                "sDELETE FROM t\n;".to_owned(),
                "sINSERT INTO t VALUES (1)\n;".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn info_lines_become_warnings() {
        let script = scripted(&["", "#hello there", "&3", ""], SessionOptions::default());
        let mut responses = script
            .session
            .submit("CREATE TABLE t (i INT)", SubmitOptions::default())
            .await
            .expect("submit must succeed");
        assert!(responses.next_response().is_some_and(|r| r.is_schema_change()));
        let warnings = script.session.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, "01000");
        assert_eq!(warnings[0].message, "hello there");
        script.session.clear_warnings();
        assert!(script.session.warnings().is_empty());
    }

    #[tokio::test]
    async fn control_command_errors_are_reported() {
        let script = scripted(&["!42000!no such cursor", ""], SessionOptions::default());
        let err = script
            .session
            .execute_control("close 5")
            .await
            .expect_err("must fail");
        match err {
            SessionError::Server(chain) => {
                assert_eq!(chain.len(), 1);
                assert_eq!(chain.0[0].code, "42000");
            }
            other => panic!("expected server error, got {other:?}"),
        }
        assert_eq!(script.written(), vec!["Xclose 5".to_owned()]);
    }

    #[tokio::test]
    async fn set_auto_commit_only_on_change() {
        let script = scripted(&[""], SessionOptions::default());
        script
            .session
            .set_auto_commit(true)
            .await
            .expect("no-op must succeed");
        assert!(script.written().is_empty());
        script
            .session
            .set_auto_commit(false)
            .await
            .expect("change must succeed");
        assert!(!script.session.current_auto_commit());
        assert_eq!(script.written(), vec!["Xauto_commit 0".to_owned()]);
    }

    #[tokio::test]
    async fn mal_sessions_skip_reply_size() {
        let options = SessionOptions {
            language: Language::Mal,
            ..SessionOptions::default()
        };
        let script = scripted(&[""], options);
        script
            .session
            .execute("io.print(1)")
            .await
            .expect("must succeed");
        assert_eq!(script.written(), vec!["io.print(1);\n".to_owned()]);
    }

    #[tokio::test]
    async fn unexpected_line_is_a_protocol_violation() {
        let script = scripted(&["", "[ 1\t]", "!42000!later", ""], SessionOptions::default());
        let err = script
            .session
            .submit("SELECT 1", SubmitOptions::default())
            .await
            .expect_err("must fail");
        match err {
            SessionError::Protocol {
                code,
                message,
                chain,
            } => {
                assert_eq!(code, "M0M10");
                assert!(message.contains("unexpected line"));
                assert_eq!(chain.len(), 1);
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
        assert!(!script.session.is_closed());
    }

    #[tokio::test]
    async fn transport_failure_closes_session() {
        let script = scripted(&[""], SessionOptions::default());
        let err = script
            .session
            .submit("SELECT 1", SubmitOptions::default())
            .await
            .expect_err("reader runs dry");
        assert!(matches!(err, SessionError::Transport(TransportError::Closed)));
        assert!(script.session.is_closed());

        let written = script.written().len();
        let err = script
            .session
            .execute("SELECT 2")
            .await
            .expect_err("must fail fast");
        assert!(matches!(err, SessionError::Closed));
        assert_eq!(script.written().len(), written);
    }

    #[tokio::test]
    async fn savepoint_names() {
        let script = scripted(&["", "", "", ""], SessionOptions::default());
        let generated = script
            .session
            .set_savepoint(None)
            .await
            .expect("must create");
        assert_eq!(generated.name(), "MonetDBSP0");
        let named = script
            .session
            .set_savepoint(Some("before_load"))
            .await
            .expect("must create");
        script
            .session
            .rollback_to_savepoint(&named)
            .await
            .expect("must roll back");
        assert!(script.session.set_savepoint(Some(" ")).await.is_err());
        assert_eq!(
            script.written()[1..],
            [
                "sSAVEPOINT MonetDBSP0\n;".to_owned(),
                "sSAVEPOINT before_load\n;".to_owned(),
                "sROLLBACK TO SAVEPOINT before_load\n;".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let script = scripted(&[], SessionOptions::default());
        script.session.close().await;
        script.session.close().await;
        assert!(script.session.is_closed());
        assert!(matches!(
            script.session.execute_control("close 1").await,
            Err(SessionError::Closed)
        ));
    }
}
