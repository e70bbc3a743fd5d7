//! Field access on raw tuple lines.
//!
//! A tuple arrives as `[ 1,\t"Kit",\tNULL\t]`. Fields are separated by
//! `,\t`, strings are double quoted with backslash escapes and `NULL` is the
//! unquoted null marker. Values are returned as text; conversion to typed
//! values is left to the caller.

/// One decoded tuple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    fields: Vec<Option<String>>,
}

impl Row {
    /// Splits a raw tuple line into its fields.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if let Some(value) = raw.strip_prefix('=') {
            return Ok(Self {
                fields: vec![Some(value.to_owned())],
            });
        }
        let inner = raw
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| format!("tuple must be enclosed in brackets: {raw}"))?;
        let inner = inner.strip_prefix(' ').unwrap_or(inner);
        let inner = inner.strip_suffix('\t').unwrap_or(inner);

        let mut fields = Vec::new();
        let mut chars = inner.chars().peekable();
        loop {
            let field = if chars.peek() == Some(&'"') {
                chars.next();
                Some(read_quoted(&mut chars, raw)?)
            } else {
                let mut text = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ',' {
                        break;
                    }
                    text.push(c);
                    chars.next();
                }
                (text != "NULL").then_some(text)
            };
            fields.push(field);

            match chars.next() {
                None => break,
                Some(',') => {
                    if chars.next() != Some('\t') {
                        return Err(format!("field separator must be ',\\t' in: {raw}"));
                    }
                }
                Some(other) => {
                    return Err(format!("unexpected '{other}' after quoted field in: {raw}"));
                }
            }
        }

        Ok(Self { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field text; `None` for NULL or an out-of-range index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index)?.as_deref()
    }

    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.fields.get(index), Some(None))
    }

    /// Field text by case-insensitive column name.
    pub fn get_by_name(&self, names: &[String], name: &str) -> Option<&str> {
        let index = names
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))?;
        self.get(index)
    }

    pub fn fields(&self) -> &[Option<String>] {
        &self.fields
    }
}

fn read_quoted(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    raw: &str,
) -> Result<String, String> {
    let mut text = String::new();
    loop {
        match chars.next() {
            None => return Err(format!("unterminated string in: {raw}")),
            Some('"') => return Ok(text),
            Some('\\') => match chars.next() {
                Some('t') => text.push('\t'),
                Some('n') => text.push('\n'),
                Some('r') => text.push('\r'),
                Some(d @ '0'..='7') => {
                    let mut code = d.to_digit(8).unwrap_or(0);
                    for _ in 0..2 {
                        match chars.peek().and_then(|c| c.to_digit(8)) {
                            Some(digit) => {
                                code = code * 8 + digit;
                                chars.next();
                            }
                            None => break,
                        }
                    }
                    text.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                Some(other) => text.push(other),
                None => return Err(format!("dangling escape in: {raw}")),
            },
            Some(c) => text.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Row;

    #[test]
    fn parse_mixed_fields() {
        let row = Row::parse("[ 1,\t\"Kit\",\tNULL\t]").expect("must parse");
        assert_eq!(row.len(), 3);
        assert_eq!(row.get(0), Some("1"));
        assert_eq!(row.get(1), Some("Kit"));
        assert_eq!(row.get(2), None);
        assert!(row.is_null(2));
        assert!(!row.is_null(3));
    }

    #[test]
    fn quoted_separator_is_not_a_split() {
        let row = Row::parse("[ \"a,\\tb\",\t\"say \\\"hi\\\"\"\t]").expect("must parse");
        assert_eq!(row.get(0), Some("a,\tb"));
        assert_eq!(row.get(1), Some("say \"hi\""));
    }

    #[test]
    fn octal_escape() {
        let row = Row::parse("[ \"\\101\"\t]").expect("must parse");
        assert_eq!(row.get(0), Some("A"));
    }

    #[test]
    fn raw_single_value_line() {
        let row = Row::parse("=plan text").expect("must parse");
        assert_eq!(row.get(0), Some("plan text"));
    }

    #[test]
    fn lookup_by_name() {
        let names = vec!["id".to_owned(), "Name".to_owned()];
        let row = Row::parse("[ 7,\t\"Kit\"\t]").expect("must parse");
        assert_eq!(row.get_by_name(&names, "name"), Some("Kit"));
        assert_eq!(row.get_by_name(&names, "missing"), None);
    }

    #[test]
    fn malformed_rows() {
        assert!(Row::parse("1,\t2").is_err());
        assert!(Row::parse("[ \"open\t]").is_err());
    }
}
