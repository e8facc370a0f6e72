//! BDD step definitions for table reconciliation

use cucumber::{given, then, when};
use parking_desk::sync::{ChannelEvent, RECORDS_EVENT, SPACES_EVENT};
use parking_desk::table::{Row, RowAction, Table};

use crate::world::DeskWorld;

async fn push(world: &mut DeskWorld, event: &str, payload: &str) {
    let sync = world.sync_client();
    let mut events = sync.subscribe();
    let payload: serde_json::Value = serde_json::from_str(payload).expect("payload is not JSON");

    sync.handle_event(event, payload).await;

    world.last_report = match events.try_recv() {
        Ok(ChannelEvent::RecordsUpdated(report)) | Ok(ChannelEvent::SpacesUpdated(report)) => {
            Some(report)
        }
        _ => None,
    };
}

fn ids(table: &Table) -> String {
    table
        .keys()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn assert_row_shows(row: &Row, expected: &str) {
    assert!(
        row.cells.iter().any(|c| c.plain() == expected),
        "Expected row {} to show '{}', cells were: {:?}",
        row.key,
        expected,
        row.cells
    );
}

#[given(expr = "the channel pushed records {string}")]
async fn pushed_records(world: &mut DeskWorld, payload: String) {
    push(world, RECORDS_EVENT, &payload).await;
}

#[when(expr = "the channel pushes records {string}")]
async fn push_records(world: &mut DeskWorld, payload: String) {
    push(world, RECORDS_EVENT, &payload).await;
}

#[when(expr = "the channel pushes spaces {string}")]
async fn push_spaces(world: &mut DeskWorld, payload: String) {
    push(world, SPACES_EVENT, &payload).await;
}

#[then(expr = "the records table should list ids {string}")]
async fn records_ids(world: &mut DeskWorld, expected: String) {
    let state = world.state();
    let s = state.read().await;
    assert_eq!(ids(&s.records), expected);
}

#[then(expr = "the spaces table should list ids {string}")]
async fn spaces_ids(world: &mut DeskWorld, expected: String) {
    let state = world.state();
    let s = state.read().await;
    assert_eq!(ids(&s.spaces), expected);
}

#[then(expr = "record {int} should show {string}")]
async fn record_shows(world: &mut DeskWorld, id: u64, expected: String) {
    let state = world.state();
    let s = state.read().await;
    let row = s.records.get(id).expect("record row missing");
    assert_row_shows(row, &expected);
}

#[then(expr = "space {int} should show {string}")]
async fn space_shows(world: &mut DeskWorld, id: u64, expected: String) {
    let state = world.state();
    let s = state.read().await;
    let row = s.spaces.get(id).expect("space row missing");
    assert_row_shows(row, &expected);
}

#[then(expr = "record {int} should offer the exit control")]
async fn record_has_exit(world: &mut DeskWorld, id: u64) {
    let state = world.state();
    let s = state.read().await;
    let row = s.records.get(id).expect("record row missing");
    assert!(row.has_action(RowAction::Exit(id)));
}

#[then(expr = "record {int} should not offer the exit control")]
async fn record_has_no_exit(world: &mut DeskWorld, id: u64) {
    let state = world.state();
    let s = state.read().await;
    let row = s.records.get(id).expect("record row missing");
    assert!(!row.has_action(RowAction::Exit(id)));
    assert!(row.has_action(RowAction::Delete(id)));
}

#[then(
    expr = "the last reconciliation should report {int} inserted, {int} updated, {int} unchanged and {int} removed"
)]
fn last_report(
    world: &mut DeskWorld,
    inserted: usize,
    updated: usize,
    unchanged: usize,
    removed: usize,
) {
    let report = world.last_report.expect("no reconciliation happened");
    assert_eq!(report.inserted, inserted, "inserted");
    assert_eq!(report.updated, updated, "updated");
    assert_eq!(report.unchanged, unchanged, "unchanged");
    assert_eq!(report.removed, removed, "removed");
}
