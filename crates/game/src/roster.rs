//! Response tables
//!
//! Commands such as `clientvarlist`, `binfo`, `gameinfo` and `rotation`
//! answer with a block of `r` rows: the first row names the columns, every
//! later row holds values.
//!
//! ```text
//! cclientvarlist ID Name Team
//! rID{DELIM}Name{DELIM}Team
//! r3{DELIM}Alice{DELIM}GDI
//! r4{DELIM}Bob{DELIM}Nod
//! ```

/// One collected response block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseTable {
    /// Command text that opened the block
    pub command: String,

    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResponseTable {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            header: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Add a response row (the first one becomes the header)
    pub fn push(&mut self, fields: Vec<String>) {
        if self.header.is_empty() {
            self.header = fields;
        } else {
            self.rows.push(fields);
        }
    }

    /// First word of the command, lower-cased
    pub fn verb(&self) -> String {
        self.command
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    /// Index of a column (case-insensitive)
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h.eq_ignore_ascii_case(name))
    }

    /// Cell of `row` in the named column
    pub fn get<'a>(&self, row: &'a [String], name: &str) -> Option<&'a str> {
        self.column(name).and_then(|i| row.get(i)).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_header_then_rows() {
        let mut table = ResponseTable::new("clientvarlist ID Name");
        assert!(table.is_empty());
        table.push(fields(&["ID", "Name"]));
        table.push(fields(&["3", "Alice"]));

        assert_eq!(table.verb(), "clientvarlist");
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.get(&table.rows[0], "name"), Some("Alice"));
        assert_eq!(table.get(&table.rows[0], "Score"), None);
    }
}
