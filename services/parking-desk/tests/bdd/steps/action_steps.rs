//! BDD step definitions for operator actions

use cucumber::{given, then, when};
use parking_desk::actions::FixedAnswer;
use parking_desk::state::NoticeLevel;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde_json::json;

use crate::world::DeskWorld;

fn assert_notice(world: &DeskWorld, level: NoticeLevel, expected: &str) {
    let notice = world.last_notice.as_ref().expect("no action was taken");
    assert_eq!(notice.text, expected);
    assert_eq!(notice.level, level, "unexpected level for '{}'", notice.text);
}

#[given(expr = "the backend accepts entries with message {string}")]
fn backend_accepts_entries(world: &mut DeskWorld, message: String) {
    world
        .backend()
        .respond("POST /entry", 200, &json!({ "message": message }).to_string());
}

#[given(expr = "the backend rejects entries with status {int} and error {string}")]
fn backend_rejects_entries(world: &mut DeskWorld, status: u16, error: String) {
    world
        .backend()
        .respond("POST /entry", status, &json!({ "error": error }).to_string());
}

#[given(expr = "the backend lists records {string}")]
fn backend_lists_records(world: &mut DeskWorld, records: String) {
    world.backend().respond("GET /get_records", 200, &records);
}

#[given(expr = "the desk has loaded records {string}")]
async fn desk_loaded_records(world: &mut DeskWorld, records: String) {
    world.backend().respond("GET /get_records", 200, &records);
    let notice = world.dispatcher().reload_records().await;
    assert!(notice.is_info(), "initial load failed: {}", notice);
}

#[given(expr = "the backend answers the exit of record {int} with {string}")]
fn backend_answers_exit(world: &mut DeskWorld, id: u64, body: String) {
    world
        .backend()
        .respond(&format!("POST /exit/{}", id), 200, &body);
}

#[given(expr = "the backend deletes record {int} with message {string}")]
fn backend_deletes(world: &mut DeskWorld, id: u64, message: String) {
    world.backend().respond(
        &format!("DELETE /delete_record/{}", id),
        200,
        &json!({ "message": message }).to_string(),
    );
}

#[given(expr = "the backend refuses to delete record {int} with error {string}")]
fn backend_refuses_delete(world: &mut DeskWorld, id: u64, error: String) {
    world.backend().respond(
        &format!("DELETE /delete_record/{}", id),
        404,
        &json!({ "error": error }).to_string(),
    );
}

#[given("the backend has no active record for fee estimates")]
fn backend_no_fee(world: &mut DeskWorld) {
    world.backend().respond(
        "POST /calculate_fee",
        404,
        &json!({ "error": "Vehicle not found or already exited" }).to_string(),
    );
}

#[given(expr = "the backend estimates fees at {float} for plate {string}")]
fn backend_estimates_fee(world: &mut DeskWorld, fee: f64, plate: String) {
    world.backend().respond(
        "POST /calculate_fee",
        200,
        &json!({ "plate_number": plate, "estimated_fee": fee }).to_string(),
    );
}

#[given(expr = "the backend finds record {int} for plate {string}")]
fn backend_finds_record(world: &mut DeskWorld, id: u64, plate: String) {
    let encoded = utf8_percent_encode(&plate, NON_ALPHANUMERIC).to_string();
    world.backend().respond(
        &format!("GET /find_record/{}", encoded),
        200,
        &json!({ "record_id": id }).to_string(),
    );
}

#[when(expr = "the operator registers an entry for plate {string}")]
async fn register_entry(world: &mut DeskWorld, plate: String) {
    let notice = world.dispatcher().entry(&plate).await;
    world.last_notice = Some(notice);
}

#[when(expr = "the operator registers the exit of record {int}")]
async fn register_exit(world: &mut DeskWorld, id: u64) {
    let notice = world.dispatcher().exit(id).await;
    world.last_notice = Some(notice);
}

#[when(expr = "the operator declines deleting record {int}")]
async fn decline_delete(world: &mut DeskWorld, id: u64) {
    let notice = world.dispatcher().delete(id, &FixedAnswer(false)).await;
    world.last_notice = Some(notice);
}

#[when(expr = "the operator confirms deleting record {int}")]
async fn confirm_delete(world: &mut DeskWorld, id: u64) {
    let notice = world.dispatcher().delete(id, &FixedAnswer(true)).await;
    world.last_notice = Some(notice);
}

#[when(expr = "the operator asks for the fee of plate {string}")]
async fn ask_fee(world: &mut DeskWorld, plate: String) {
    let notice = world.dispatcher().calculate_fee(&plate).await;
    world.last_notice = Some(notice);
}

#[when(expr = "the operator looks up plate {string}")]
async fn look_up_plate(world: &mut DeskWorld, plate: String) {
    let notice = world.dispatcher().find_record(&plate).await;
    world.last_notice = Some(notice);
}

#[then(expr = "the operator should be told {string}")]
fn told(world: &mut DeskWorld, expected: String) {
    assert_notice(world, NoticeLevel::Info, &expected);
}

#[then(expr = "the operator should be warned {string}")]
fn warned(world: &mut DeskWorld, expected: String) {
    assert_notice(world, NoticeLevel::Warning, &expected);
}

#[then(expr = "the operator should see the error {string}")]
fn error_shown(world: &mut DeskWorld, expected: String) {
    assert_notice(world, NoticeLevel::Error, &expected);
}

#[then(expr = "the backend should have received {string} followed by {string}")]
fn received_in_order(world: &mut DeskWorld, first: String, second: String) {
    let requests = world.backend().requests();
    let first_at = requests
        .iter()
        .position(|r| *r == first)
        .unwrap_or_else(|| panic!("'{}' was never sent: {:?}", first, requests));
    assert!(
        requests[first_at + 1..].contains(&second),
        "'{}' was not sent after '{}': {:?}",
        second,
        first,
        requests
    );
}

#[then(expr = "the backend should not have received {string}")]
fn not_received(world: &mut DeskWorld, route: String) {
    let requests = world.backend().requests();
    assert!(!requests.contains(&route), "unexpected '{}': {:?}", route, requests);
}

#[then("the backend should have received no requests")]
fn no_requests(world: &mut DeskWorld) {
    assert!(world.backend().requests().is_empty());
}
