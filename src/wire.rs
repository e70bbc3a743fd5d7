use crate::Language;

/// Decoded start-of-header line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Header {
    /// `&1` and `&5`: a tabular result, optionally from a prepare.
    Table {
        id: i64,
        total_rows: usize,
        columns: usize,
        rows: usize,
        prepared: bool,
    },
    /// `&2`: affected row count and last generated key.
    Update { count: i64, last_id: Option<i64> },
    /// `&3`
    Schema,
    /// `&4`: the server side auto-commit state.
    Transaction { auto_commit: bool },
    /// `&6`: another page for a result announced earlier.
    Block {
        id: i64,
        columns: usize,
        rows: usize,
        offset: usize,
    },
}

/// Parses a start-of-header line such as `&1 3 1000 2 250`.
pub(crate) fn parse_start_of_header(line: &str) -> Result<Header, String> {
    let body = line
        .strip_prefix('&')
        .ok_or_else(|| format!("start of header expected, found: \"{line}\""))?;
    let mut fields = Fields {
        line,
        inner: body.split_whitespace(),
    };
    let tag = fields.next_str("query type")?;

    match tag {
        "0" => Err("Q_PARSE header not allowed here".to_owned()),
        "1" | "5" => Ok(Header::Table {
            id: fields.next_int("result id")?,
            total_rows: fields.next_count("tuple count")?,
            columns: fields.next_count("column count")?,
            rows: fields.next_count("row count")?,
            prepared: tag == "5",
        }),
        "2" => {
            let count = fields.next_int("affected row count")?;
            let last_id = match fields.inner.next() {
                None => None,
                Some(value) => {
                    let id = parse_int(line, "last id", value)?;
                    (id >= 0).then_some(id)
                }
            };
            Ok(Header::Update { count, last_id })
        }
        "3" => Ok(Header::Schema),
        "4" => match fields.next_str("auto commit state")? {
            "t" => Ok(Header::Transaction { auto_commit: true }),
            "f" => Ok(Header::Transaction { auto_commit: false }),
            other => Err(format!(
                "invalid auto commit state '{other}' in: \"{line}\""
            )),
        },
        "6" => Ok(Header::Block {
            id: fields.next_int("result id")?,
            columns: fields.next_count("column count")?,
            rows: fields.next_count("row count")?,
            offset: fields.next_count("row offset")?,
        }),
        other => Err(format!("unknown header type '{other}' in: \"{line}\"")),
    }
}

struct Fields<'a> {
    line: &'a str,
    inner: std::str::SplitWhitespace<'a>,
}

impl<'a> Fields<'a> {
    fn next_str(&mut self, what: &str) -> Result<&'a str, String> {
        self.inner
            .next()
            .ok_or_else(|| format!("missing {what} in: \"{}\"", self.line))
    }

    fn next_int(&mut self, what: &str) -> Result<i64, String> {
        let value = self.next_str(what)?;
        parse_int(self.line, what, value)
    }

    fn next_count(&mut self, what: &str) -> Result<usize, String> {
        let value = self.next_str(what)?;
        value
            .parse::<usize>()
            .map_err(|err| format!("invalid {what} '{value}' in: \"{}\": {err}", self.line))
    }
}

fn parse_int(line: &str, what: &str, value: &str) -> Result<i64, String> {
    value
        .parse::<i64>()
        .map_err(|err| format!("invalid {what} '{value}' in: \"{line}\": {err}"))
}

/// Whether a command is caller text or a session control command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum CommandKind {
    Query,
    Control,
}

/// Language dependent framing around a command body.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Template {
    prefix: &'static str,
    suffix: &'static str,
}

impl Template {
    pub(crate) fn for_command(language: Language, kind: CommandKind) -> Self {
        let (prefix, suffix) = match (language, kind) {
            (Language::Sql, CommandKind::Query) => ("s", "\n;"),
            (Language::Sql, CommandKind::Control) => ("X", ""),
            (Language::Mal, CommandKind::Query) => ("", ";\n"),
            (Language::Mal, CommandKind::Control) | (Language::Other, _) => ("", ""),
        };
        Self { prefix, suffix }
    }

    /// Surrounds `body` with the template, leaving the body untouched.
    pub(crate) fn frame(&self, body: &str) -> String {
        let mut framed = String::with_capacity(self.prefix.len() + body.len() + self.suffix.len());
        framed.push_str(self.prefix);
        framed.push_str(body);
        framed.push_str(self.suffix);
        framed
    }
}

pub(crate) fn reply_size_command(size: usize) -> String {
    format!("reply_size {size}")
}

pub(crate) fn close_command(id: i64) -> String {
    format!("close {id}")
}

pub(crate) fn export_command(id: i64, start: usize, count: usize) -> String {
    format!("export {id} {start} {count}")
}

pub(crate) fn auto_commit_command(enabled: bool) -> String {
    format!("auto_commit {}", if enabled { 1 } else { 0 })
}
