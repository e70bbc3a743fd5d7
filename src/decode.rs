use crate::ServerError;

/// Status code given to error lines that carry none.
const GENERIC_ERROR_CODE: &str = "HY000";

/// One `% ... # name` line of a tabular result header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ColumnHeader {
    TableNames(Vec<String>),
    Names(Vec<String>),
    Types(Vec<String>),
    Lengths(Vec<usize>),
    Other(String),
}

pub(crate) fn decode_column_header(line: &str, columns: usize) -> Result<ColumnHeader, String> {
    let body = line
        .strip_prefix('%')
        .ok_or_else(|| format!("header expected, got: {line}"))?;
    let (values, name) = body
        .rsplit_once('#')
        .ok_or_else(|| format!("header name missing in: {line}"))?;
    let name = name.trim();
    let values = values.trim_matches(|c| c == ' ' || c == '\t');
    let values: Vec<String> = if columns == 0 && values.is_empty() {
        Vec::new()
    } else {
        values.split(",\t").map(str::to_owned).collect()
    };

    let known = matches!(name, "table_name" | "name" | "type" | "length");
    if known && values.len() != columns {
        return Err(format!(
            "{name} header has {} values, expected {columns}: {line}",
            values.len()
        ));
    }

    match name {
        "table_name" => Ok(ColumnHeader::TableNames(values)),
        "name" => Ok(ColumnHeader::Names(values)),
        "type" => Ok(ColumnHeader::Types(values)),
        "length" => values
            .iter()
            .map(|value| {
                value
                    .trim()
                    .parse::<usize>()
                    .map_err(|err| format!("invalid length '{value}' in: {line}: {err}"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(ColumnHeader::Lengths),
        other => Ok(ColumnHeader::Other(other.to_owned())),
    }
}

/// Splits `!CCCCC!message` into code and message.
pub(crate) fn decode_error_line(line: &str) -> ServerError {
    let body = line.strip_prefix('!').unwrap_or(line);
    match (body.get(..5), body.get(5..6), body.get(6..)) {
        (Some(code), Some("!"), Some(message))
            if code.bytes().all(|b| b.is_ascii_alphanumeric()) =>
        {
            ServerError::new(code, message)
        }
        _ => ServerError::new(GENERIC_ERROR_CODE, body),
    }
}

/// Text of an info line without its `#` marker.
pub(crate) fn decode_info_line(line: &str) -> &str {
    line.strip_prefix('#').unwrap_or(line)
}
