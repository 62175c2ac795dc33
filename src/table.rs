/// An in-memory tabular dataset: named columns in declaration order, each
/// row holding one cell per column. Cells stay as the raw CSV strings;
/// callers parse timestamps and counts at the point of use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// An empty table with the given column names.
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Build a table from headers and pre-assembled rows. Every row must
    /// have one cell per header.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == headers.len()));
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the named column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Append one row. The caller guarantees the width matches.
    pub fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.headers.len());
        self.rows.push(row);
    }

    /// Rename a column header in place. Returns false when `from` is absent.
    pub fn rename_header(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.headers[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// New table keeping only the rows the predicate accepts; row order is
    /// preserved and `self` is untouched.
    pub fn retain_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[String]) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|row| keep(row.as_slice()))
            .cloned()
            .collect();
        Table {
            headers: self.headers.clone(),
            rows,
        }
    }

    /// Project onto the named columns, in the order given. Returns `None`
    /// if any requested column is absent.
    pub fn select(&self, names: &[&str]) -> Option<Table> {
        let indices: Vec<usize> = names
            .iter()
            .map(|&n| self.column_index(n))
            .collect::<Option<Vec<_>>>()?;
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Some(Table {
            headers: names.iter().map(|n| n.to_string()).collect(),
            rows,
        })
    }
}
