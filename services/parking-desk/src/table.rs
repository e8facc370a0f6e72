//! Keyed table view and snapshot reconciliation
//!
//! A [`Table`] holds one [`Row`] per key in display order. [`reconcile`] merges
//! a snapshot into it: rows whose key is still present are rewritten in place
//! and keep their position, unknown keys are appended, and keys missing from
//! the snapshot are dropped.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

/// Operator action attached to a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "target", rename_all = "snake_case")]
pub enum RowAction {
    Exit(u64),
    Delete(u64),
    ToggleOccupied(u64),
    ToggleCharging(u64),
}

/// Rendered content of one table cell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cell {
    Text(String),
    Placeholder(String),
    Image { src: String, alt: String },
    Actions(Vec<RowAction>),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn placeholder(value: impl Into<String>) -> Self {
        Cell::Placeholder(value.into())
    }

    /// Plain-text rendering used by the CLI
    pub fn plain(&self) -> String {
        match self {
            Cell::Text(s) | Cell::Placeholder(s) => s.clone(),
            Cell::Image { src, .. } => src.clone(),
            Cell::Actions(actions) => actions
                .iter()
                .map(|a| format!("{:?}", a))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// One table row keyed by the backend identifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub key: u64,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn actions(&self) -> &[RowAction] {
        self.cells
            .iter()
            .find_map(|c| match c {
                Cell::Actions(actions) => Some(actions.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn has_action(&self, action: RowAction) -> bool {
        self.actions().contains(&action)
    }
}

/// Ordered rows, at most one per key
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: u64) -> Option<&Row> {
        self.rows.iter().find(|r| r.key == key)
    }

    pub fn position(&self, key: u64) -> Option<usize> {
        self.rows.iter().position(|r| r.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.rows.iter().map(|r| r.key)
    }

    /// Remove the row for `key`, returning it if present
    pub fn remove(&mut self, key: u64) -> Option<Row> {
        let pos = self.position(key)?;
        Some(self.rows.remove(pos))
    }
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        self.inserted + self.updated + self.removed > 0
    }
}

/// Merge `items` into `table`.
///
/// `key` extracts the row key and `render` produces the row's cells. A key
/// repeated within the snapshot keeps a single row holding the last rendering.
pub fn reconcile<T, K, R>(table: &mut Table, items: &[T], key: K, render: R) -> ReconcileReport
where
    K: Fn(&T) -> u64,
    R: Fn(&T) -> Vec<Cell>,
{
    let mut report = ReconcileReport::default();
    let mut index: HashMap<u64, usize> = table
        .rows
        .iter()
        .enumerate()
        .map(|(pos, row)| (row.key, pos))
        .collect();
    // last occurrence of each key in the snapshot
    let last: HashMap<u64, usize> = items
        .iter()
        .enumerate()
        .map(|(pos, item)| (key(item), pos))
        .collect();
    let mut seen = HashSet::with_capacity(last.len());

    for (pos, item) in items.iter().enumerate() {
        let k = key(item);
        if last.get(&k) != Some(&pos) {
            continue;
        }
        let cells = render(item);
        seen.insert(k);

        match index.get(&k) {
            Some(&pos) => {
                let row = &mut table.rows[pos];
                if row.cells == cells {
                    report.unchanged += 1;
                } else {
                    row.cells = cells;
                    report.updated += 1;
                }
            }
            None => {
                table.rows.push(Row { key: k, cells });
                index.insert(k, table.rows.len() - 1);
                report.inserted += 1;
            }
        }
    }

    let before = table.rows.len();
    table.rows.retain(|row| seen.contains(&row.key));
    report.removed = before - table.rows.len();

    report
}
