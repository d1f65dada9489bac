//! Column-aligned, awk-friendly tables for listings and reports.

use std::fmt::{self, Write};

pub(crate) struct Row {
    cells: Vec<String>,
}

impl Row {
    fn is_awk_safe(&self) -> bool {
        !self
            .cells
            .iter()
            .any(|cell| cell.contains(|c: char| c.is_whitespace()))
    }
}

impl From<Vec<String>> for Row {
    fn from(value: Vec<String>) -> Self {
        Row { cells: value }
    }
}

impl From<Vec<&str>> for Row {
    fn from(value: Vec<&str>) -> Self {
        Row {
            cells: value.into_iter().map(str::to_owned).collect(),
        }
    }
}

pub(crate) struct Table {
    header: Row,
    body: Vec<Row>,
    print_header: bool,
}

impl Table {
    /// Header cells must not contain whitespace, so `awk '{print $2}'` keeps working.
    pub(crate) fn new<R: Into<Row>>(header: R) -> Table {
        let header = header.into();

        debug_assert!(header.is_awk_safe(), "table header contains whitespace");

        Table {
            header,
            body: Vec::new(),
            print_header: true,
        }
    }

    pub(crate) fn print_header(&mut self, print_header: bool) {
        self.print_header = print_header;
    }

    /// Append a row; short rows are padded with empty cells, long rows truncated.
    pub(crate) fn add_row<R: Into<Row>>(&mut self, row: R) {
        let mut row = row.into();

        row.cells.resize(self.header.cells.len(), String::new());

        self.body.push(row);
    }

    fn rows(&self) -> impl Iterator<Item = &Row> {
        let header = self.print_header.then_some(&self.header);

        header.into_iter().chain(self.body.iter())
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths = vec![0usize; self.header.cells.len()];

        for row in self.rows() {
            for (i, cell) in row.cells.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        widths
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.column_widths();

        for row in self.rows() {
            let last = row.cells.len().saturating_sub(1);

            for (i, cell) in row.cells.iter().enumerate() {
                if i == last {
                    f.write_str(cell)?;
                } else {
                    write!(f, "{:<width$}  ", cell, width = widths[i])?;
                }
            }

            f.write_char('\n')?;
        }

        Ok(())
    }
}

pub(crate) trait IntoTable: Into<Table> + Sized {
    fn into_table(self) -> Table {
        self.into()
    }
}

impl<T> IntoTable for T where T: Into<Table> + Sized {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_are_aligned() {
        let mut tab = Table::new(vec!["EVALUATOR", "MODEL", "SOURCE"]);
        tab.add_row(vec!["claude-quick", "anthropic/claude-haiku-4-5", "requirement"]);
        tab.add_row(vec!["pinned", "x/y", "explicit"]);

        assert_eq!(
            tab.to_string(),
            "EVALUATOR     MODEL                       SOURCE\n\
             claude-quick  anthropic/claude-haiku-4-5  requirement\n\
             pinned        x/y                         explicit\n"
        );
    }

    #[test]
    fn test_headerless_and_padding() {
        let mut tab = Table::new(vec!["A", "B"]);
        tab.add_row(vec!["only"]);
        tab.print_header(false);

        assert_eq!(tab.to_string(), "only  \n");
    }
}
