//! Row templates for the records and spaces tables

use crate::messages;
use crate::table::{reconcile, Cell, ReconcileReport, RowAction, Table};
use crate::types::{Record, Space};

pub const RECORD_COLUMNS: [&str; 6] = [
    "車輛圖片",
    "車牌號碼",
    "進場時間",
    "離場時間",
    "停車費用",
    "操作",
];

pub const SPACE_COLUMNS: [&str; 6] = ["車位", "狀態", "車牌號碼", "充電", "充電費用", "操作"];

/// Relative URL of the stored plate image for `plate`
pub fn plate_image_src(plate: &str) -> String {
    format!("static/plates/{}.jpg", plate)
}

pub fn render_record(record: &Record) -> Vec<Cell> {
    let image = if record.plate_number.is_empty() {
        Cell::placeholder(messages::NO_IMAGE)
    } else {
        Cell::Image {
            src: plate_image_src(&record.plate_number),
            alt: messages::PLATE_IMAGE_ALT.to_string(),
        }
    };

    let exit = match record.exit_time() {
        Some(t) => Cell::text(t),
        None => Cell::placeholder(messages::NOT_EXITED),
    };

    let fee = match record.computed_fee() {
        Some(f) => Cell::text(f.to_string()),
        None => Cell::placeholder(messages::FEE_NOT_COMPUTED),
    };

    let mut actions = Vec::with_capacity(2);
    if record.exit_time().is_none() {
        actions.push(RowAction::Exit(record.id));
    }
    actions.push(RowAction::Delete(record.id));

    vec![
        image,
        Cell::text(record.plate_number.clone()),
        Cell::text(record.entry_time.clone()),
        exit,
        fee,
        Cell::Actions(actions),
    ]
}

pub fn render_space(space: &Space) -> Vec<Cell> {
    let status = if space.is_occupied {
        Cell::text(messages::OCCUPIED)
    } else {
        Cell::text(messages::VACANT)
    };

    let plate = match space.occupant() {
        Some(p) => Cell::text(p),
        None => Cell::placeholder(messages::NONE),
    };

    let charging = if space.charging {
        Cell::text(messages::CHARGING)
    } else {
        Cell::text(messages::NOT_CHARGING)
    };

    let cost = match space.charging_cost {
        Some(c) => Cell::text(c.to_string()),
        None => Cell::placeholder(messages::NONE),
    };

    vec![
        Cell::text(space.label()),
        status,
        plate,
        charging,
        cost,
        Cell::Actions(vec![
            RowAction::ToggleOccupied(space.id),
            RowAction::ToggleCharging(space.id),
        ]),
    ]
}

pub fn apply_records(table: &mut Table, records: &[Record]) -> ReconcileReport {
    reconcile(table, records, |r| r.id, render_record)
}

pub fn apply_spaces(table: &mut Table, spaces: &[Space]) -> ReconcileReport {
    reconcile(table, spaces, |s| s.id, render_space)
}
