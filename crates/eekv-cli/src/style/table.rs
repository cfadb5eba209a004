//! Table formatting using comfy-table.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header_cell(title: &str) -> Cell {
    let cell = Cell::new(title);
    if super::no_color() {
        cell
    } else {
        cell.add_attribute(Attribute::Bold).fg(Color::Cyan)
    }
}

fn label_cell(label: &str) -> Cell {
    let cell = Cell::new(label);
    if super::no_color() {
        cell
    } else {
        cell.fg(Color::DarkGrey)
    }
}

/// Builds a table with a header row. Columns whose every value parses as
/// an integer are right-aligned.
pub fn data_table(columns: &[&str], rows: &[Vec<String>]) -> Table {
    let mut table = new_table();
    table.set_header(columns.iter().map(|title| header_cell(title)));
    for row in rows {
        table.add_row(row);
    }

    for (index, column) in table.column_iter_mut().enumerate() {
        let numeric = !rows.is_empty()
            && rows
                .iter()
                .all(|row| row.get(index).is_some_and(|v| v.parse::<u64>().is_ok()));
        if numeric {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }
    table
}

/// Builds a two-column label/value table.
pub fn info_table(entries: &[(&str, String)]) -> Table {
    let mut table = new_table();
    for (label, value) in entries {
        table.add_row(vec![label_cell(label), Cell::new(value)]);
    }
    table
}

/// Prints a label/value table.
pub fn print_info_table(entries: &[(&str, String)]) {
    if !super::quiet() {
        println!("{}", info_table(entries));
    }
}

/// Prints a table with a header row.
pub fn print_data_table(columns: &[&str], rows: &[Vec<String>]) {
    if !super::quiet() {
        println!("{}", data_table(columns, rows));
    }
}
