//! BDD step definitions for the parking desk

pub mod action_steps;
pub mod poller_steps;
pub mod reconcile_steps;
