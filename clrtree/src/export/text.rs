//! Plain-text tree table
//!
//! ```text
//! Structure                  ID     Flags              Path
//! CLR v4.0.30319.42000       1      CONCURRENT_GC      C:\app\app.exe
//!   AppDomain: DefaultDomain 1234   Default, Executable
//!     mscorlib               5678   DomainNeutral      C:\Windows\...\mscorlib.dll
//! ```
//!
//! Columns that are empty on every row are left out. A failed inspection
//! renders its error message instead of the tree.

use std::io::Write;

use comfy_table::{presets::NOTHING, Cell, ContentArrangement, Table};

use crate::domain::{ExportError, NodeId};
use crate::inspect::Inspection;
use crate::tree::{Column, NodeStore};

const INDENT: &str = "  ";
/// Spaces after each column
const COLUMN_GAP: u16 = 2;

struct Row<'a> {
    depth: usize,
    cells: Vec<&'a str>,
}

fn collect_rows<'a>(store: &'a NodeStore, id: NodeId, depth: usize, rows: &mut Vec<Row<'a>>) {
    rows.push(Row {
        depth,
        cells: Column::ALL.iter().map(|&column| store.cell_text(id, column)).collect(),
    });
    for child in store.children(id) {
        collect_rows(store, child, depth + 1, rows);
    }
}

/// Render the tree of `store` as an aligned table
#[must_use]
pub fn render_tree(store: &NodeStore) -> String {
    let mut rows = Vec::new();
    for &root in store.roots() {
        collect_rows(store, root, 0, &mut rows);
    }

    // Structure is always shown; the rest only when some row has a value
    let visible: Vec<usize> = (0..Column::ALL.len())
        .filter(|&i| i == 0 || rows.iter().any(|row| !row.cells[i].is_empty()))
        .collect();

    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        // Paths stay on one line so they can be copied
        .set_content_arrangement(ContentArrangement::Disabled)
        .set_header(visible.iter().map(|&i| Cell::new(Column::ALL[i].title())));

    for row in &rows {
        table.add_row(visible.iter().map(|&i| {
            if i == 0 {
                Cell::new(format!("{}{}", INDENT.repeat(row.depth), row.cells[i]))
            } else {
                Cell::new(row.cells[i])
            }
        }));
    }
    for column in table.column_iter_mut() {
        column.set_padding((0, COLUMN_GAP));
    }

    let mut out = table.trim_fmt();
    out.push('\n');
    out
}

/// Text for a whole inspection: the error message, or the tree
#[must_use]
pub fn render_text(inspection: &Inspection) -> String {
    if let Some(error) = &inspection.error {
        return format!("{error}\n");
    }
    if inspection.store.is_empty() {
        return format!("No .NET runtime found in {}\n", inspection.pid);
    }
    render_tree(&inspection.store)
}

/// # Errors
/// Returns an error if writing fails.
pub fn write_text<W: Write>(inspection: &Inspection, mut writer: W) -> Result<(), ExportError> {
    writer.write_all(render_text(inspection).as_bytes())?;
    writer.flush()?;
    Ok(())
}
