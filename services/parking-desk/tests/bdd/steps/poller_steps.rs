//! BDD step definitions for recognition polling

use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when};
use parking_desk::poller::{Poller, TickOutcome};

use crate::world::{DeskWorld, GatedRecognizer, RecognizerReply, StillFrameSource};

fn install(world: &mut DeskWorld, reply: RecognizerReply, open: bool) {
    let recognizer = Arc::new(GatedRecognizer::new(reply, open));
    let poller = Poller::new(
        Arc::new(StillFrameSource),
        recognizer.clone(),
        world.state(),
        Duration::from_millis(3000),
    );
    world.recognizer = Some(recognizer);
    world.poller = Some(poller);
}

async fn finish_dispatched(world: &mut DeskWorld) {
    for outcome in world.tick_outcomes.drain(..) {
        if let TickOutcome::Dispatched(handle) = outcome {
            handle.await.expect("submission task panicked");
        }
    }
}

#[given(expr = "a recognizer that answers plate {string}")]
fn recognizer_with_plate(world: &mut DeskWorld, plate: String) {
    install(world, RecognizerReply::Plate(plate), true);
}

#[given(expr = "a slow recognizer that answers plate {string}")]
fn slow_recognizer(world: &mut DeskWorld, plate: String) {
    install(world, RecognizerReply::Plate(plate), false);
}

#[given("a recognizer that answers no plate")]
fn recognizer_without_plate(world: &mut DeskWorld) {
    install(world, RecognizerReply::Nothing, true);
}

#[given("a recognizer that fails")]
fn failing_recognizer(world: &mut DeskWorld) {
    install(world, RecognizerReply::Failure, true);
}

#[when("the poller ticks once and the submission completes")]
async fn tick_and_complete(world: &mut DeskWorld) {
    let outcome = world.poller.as_ref().expect("poller not set").tick();
    assert!(!outcome.is_skipped(), "first tick should dispatch");
    world.tick_outcomes.push(outcome);
    finish_dispatched(world).await;
}

#[when(expr = "the poller ticks {int} times")]
async fn tick_times(world: &mut DeskWorld, count: usize) {
    let poller = world.poller.as_ref().expect("poller not set");
    let mut outcomes = Vec::with_capacity(count);
    for _ in 0..count {
        outcomes.push(poller.tick());
        // let a dispatched submission reach the recognizer
        tokio::task::yield_now().await;
    }
    world.tick_outcomes.extend(outcomes);
}

#[when("the recognizer finishes")]
async fn recognizer_finishes(world: &mut DeskWorld) {
    world.recognizer.as_ref().expect("recognizer not set").release();
    finish_dispatched(world).await;
}

#[then(expr = "{int} tick should have dispatched and {int} should have skipped")]
fn tick_counts(world: &mut DeskWorld, dispatched: usize, skipped: usize) {
    let actual_skipped = world.tick_outcomes.iter().filter(|o| o.is_skipped()).count();
    let actual_dispatched = world.tick_outcomes.len() - actual_skipped;
    assert_eq!(actual_dispatched, dispatched);
    assert_eq!(actual_skipped, skipped);
}

#[then(expr = "the recognizer should have at most {int} request in flight")]
fn at_most_in_flight(world: &mut DeskWorld, limit: usize) {
    let recognizer = world.recognizer.as_ref().expect("recognizer not set");
    assert!(recognizer.max_in_flight() <= limit);
    assert!(world.poller.as_ref().expect("poller not set").is_in_flight());
}

#[then("the next tick should dispatch again")]
async fn next_tick_dispatches(world: &mut DeskWorld) {
    let poller = world.poller.as_ref().expect("poller not set");
    assert!(!poller.is_in_flight());
    let outcome = poller.tick();
    assert!(!outcome.is_skipped());
    world.tick_outcomes.push(outcome);
    finish_dispatched(world).await;
}

#[then(expr = "the entry form should hold {string}")]
async fn form_holds(world: &mut DeskWorld, plate: String) {
    let state = world.state();
    assert_eq!(state.read().await.entry_form.plate, plate);
}

#[then("the entry form should be empty")]
async fn form_empty(world: &mut DeskWorld) {
    let state = world.state();
    assert!(state.read().await.entry_form.plate.is_empty());
    let recognizer = world.recognizer.as_ref().expect("recognizer not set");
    assert_eq!(recognizer.calls(), 1);
}

#[then(expr = "the recognition label should read {string}")]
async fn label_reads(world: &mut DeskWorld, expected: String) {
    let state = world.state();
    assert_eq!(state.read().await.recognition_label.as_deref(), Some(expected.as_str()));
}

#[then("no recognition label should be shown")]
async fn no_label(world: &mut DeskWorld) {
    let state = world.state();
    assert!(state.read().await.recognition_label.is_none());
}
