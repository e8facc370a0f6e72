//! Operator action dispatchers
//!
//! Each action validates its input locally, calls the backend, and turns the
//! outcome into a [`Notice`]. Invalid input and declined confirmations never
//! reach the network.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::api::BackendApi;
use crate::messages;
use crate::state::{Notice, StateHandle};
use crate::DeskError;

/// Asks the operator to confirm a destructive action
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Interactive confirmation on the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirm;

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        let prompt = prompt.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            use std::io::Write;
            eprint!("{} [y/N] ", prompt);
            let _ = std::io::stderr().flush();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => is_yes(&line),
            Ok(Err(e)) => {
                warn!("Failed to read confirmation: {}", e);
                false
            }
            Err(e) => {
                warn!("Confirmation prompt aborted: {}", e);
                false
            }
        }
    }
}

/// Answer decided up front (`--yes`, `?confirm=true`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedAnswer(pub bool);

#[async_trait]
impl Confirm for FixedAnswer {
    async fn confirm(&self, prompt: &str) -> bool {
        debug!("Confirmation '{}' answered {}", prompt, self.0);
        self.0
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Parse an operator-supplied id, rejecting anything but a positive integer
pub fn parse_id(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|id| *id > 0)
}

/// Non-empty trimmed plate
fn normalize_plate(raw: &str) -> Option<&str> {
    let plate = raw.trim();
    (!plate.is_empty()).then_some(plate)
}

/// Notice for a failed backend call: the server's own words when it gave any
fn failure_notice(err: &DeskError, fallback: &str) -> Notice {
    match err {
        DeskError::Server {
            status,
            message: Some(message),
        } if *status < 500 => Notice::warning(message.clone()),
        DeskError::Server {
            message: Some(message),
            ..
        } => Notice::error(message.clone()),
        _ => Notice::error(fallback),
    }
}

/// Runs operator actions against the backend and records their notices
pub struct Dispatcher {
    api: Arc<BackendApi>,
    state: StateHandle,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("api", &self.api).finish()
    }
}

impl Dispatcher {
    pub fn new(api: Arc<BackendApi>, state: StateHandle) -> Self {
        Self { api, state }
    }

    pub fn api(&self) -> &BackendApi {
        &self.api
    }

    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    async fn record(&self, notice: Notice) -> Notice {
        self.state.write().await.add_notice(notice.clone());
        notice
    }

    /// Pull a full records snapshot and reconcile it
    pub async fn reload_records(&self) -> Notice {
        match self.api.records().await {
            Ok(records) => {
                let report = self.state.write().await.apply_records(&records);
                debug!("Reloaded {} records: {:?}", records.len(), report);
                Notice::info(messages::DONE)
            }
            Err(e) => {
                warn!("Failed to load records: {}", e);
                self.record(Notice::error(messages::LOAD_RECORDS_FAILED)).await
            }
        }
    }

    /// Pull a full spaces snapshot and reconcile it
    pub async fn reload_spaces(&self) -> Notice {
        match self.api.spaces().await {
            Ok(spaces) => {
                let report = self.state.write().await.apply_spaces(&spaces);
                debug!("Reloaded {} spaces: {:?}", spaces.len(), report);
                Notice::info(messages::DONE)
            }
            Err(e) => {
                warn!("Failed to load spaces: {}", e);
                self.record(Notice::error(messages::LOAD_SPACES_FAILED)).await
            }
        }
    }

    pub async fn entry(&self, plate: &str) -> Notice {
        let Some(plate) = normalize_plate(plate) else {
            return self.record(Notice::warning(messages::PLATE_REQUIRED)).await;
        };

        let notice = match self.api.entry(plate).await {
            Ok(reply) => {
                info!("Entry registered for {}", plate);
                self.clear_entry_form(plate).await;
                self.reload_records().await;
                Notice::info(reply.text().unwrap_or(messages::DONE))
            }
            Err(e) => {
                warn!("Entry for {} failed: {}", plate, e);
                failure_notice(&e, messages::ENTRY_FAILED)
            }
        };
        self.record(notice).await
    }

    /// Entry with the plate from the argument, or the prefilled form if absent
    pub async fn entry_from_form(&self, plate: Option<&str>) -> Notice {
        let plate = match plate {
            Some(plate) => plate.to_string(),
            None => self.state.read().await.entry_form.plate.clone(),
        };
        self.entry(&plate).await
    }

    pub async fn entry_at_space(&self, space_id: u64, plate: &str) -> Notice {
        let Some(plate) = normalize_plate(plate) else {
            return self.record(Notice::warning(messages::PLATE_REQUIRED)).await;
        };
        if space_id == 0 {
            return self.record(Notice::warning(messages::INVALID_SPACE_ID)).await;
        }

        let notice = match self.api.entry_at_space(space_id, plate).await {
            Ok(reply) => {
                info!("Entry registered for {} at space {}", plate, space_id);
                self.clear_entry_form(plate).await;
                self.reload_records().await;
                self.reload_spaces().await;
                Notice::info(reply.text().unwrap_or(messages::DONE))
            }
            Err(e) => {
                warn!("Entry for {} at space {} failed: {}", plate, space_id, e);
                failure_notice(&e, messages::ENTRY_FAILED)
            }
        };
        self.record(notice).await
    }

    async fn clear_entry_form(&self, plate: &str) {
        let mut state = self.state.write().await;
        if state.entry_form.plate == plate {
            state.entry_form.plate.clear();
        }
    }

    pub async fn exit(&self, record_id: u64) -> Notice {
        if record_id == 0 {
            return self.record(Notice::warning(messages::INVALID_RECORD_ID)).await;
        }

        let notice = match self.api.exit(record_id).await {
            Ok(reply) => {
                self.reload_records().await;
                match reply.record {
                    Some(record) => {
                        info!("Record {} exited, fee {:?}", record_id, record.fee);
                        Notice::info(messages::exit_fee(record.computed_fee()))
                    }
                    None => Notice::warning(messages::EXIT_NO_RECORD),
                }
            }
            Err(e) => {
                warn!("Exit for record {} failed: {}", record_id, e);
                Notice::error(messages::EXIT_FAILED)
            }
        };
        self.record(notice).await
    }

    pub async fn delete(&self, record_id: u64, confirm: &dyn Confirm) -> Notice {
        if record_id == 0 {
            return self.record(Notice::warning(messages::INVALID_RECORD_ID)).await;
        }
        if !confirm.confirm(messages::CONFIRM_DELETE).await {
            debug!("Delete of record {} declined", record_id);
            return self.record(Notice::info(messages::DELETE_CANCELLED)).await;
        }

        let notice = match self.api.delete_record(record_id).await {
            Ok(reply) => {
                info!("Record {} deleted", record_id);
                self.state.write().await.mark_deleted(record_id);
                self.reload_records().await;
                Notice::info(reply.text().unwrap_or(messages::DONE))
            }
            Err(e) => {
                warn!("Delete of record {} failed: {}", record_id, e);
                Notice::error(messages::delete_failed(e.server_message()))
            }
        };
        self.record(notice).await
    }

    pub async fn calculate_fee(&self, plate: &str) -> Notice {
        let Some(plate) = normalize_plate(plate) else {
            return self.record(Notice::warning(messages::PLATE_REQUIRED)).await;
        };

        let notice = match self.api.calculate_fee(plate).await {
            Ok(estimate) => Notice::info(messages::fee_estimate(plate, estimate.estimated_fee)),
            Err(e) => {
                debug!("Fee estimate for {} failed: {}", plate, e);
                Notice::warning(messages::FEE_NOT_FOUND)
            }
        };
        self.record(notice).await
    }

    pub async fn toggle_charging(&self, space_id: u64) -> Notice {
        if space_id == 0 {
            return self.record(Notice::warning(messages::INVALID_SPACE_ID)).await;
        }

        let notice = match self.api.toggle_charging(space_id).await {
            Ok(reply) => {
                self.reload_spaces().await;
                Notice::info(reply.text().unwrap_or(messages::DONE))
            }
            Err(e) => {
                warn!("Toggle charging on space {} failed: {}", space_id, e);
                failure_notice(&e, messages::SPACE_UPDATE_FAILED)
            }
        };
        self.record(notice).await
    }

    pub async fn toggle_occupied(&self, space_id: u64, plate: Option<&str>, occupied: bool) -> Notice {
        if space_id == 0 {
            return self.record(Notice::warning(messages::INVALID_SPACE_ID)).await;
        }
        let plate = plate.and_then(normalize_plate);

        let notice = match self.api.toggle_occupied(space_id, plate, occupied).await {
            Ok(reply) => {
                self.reload_spaces().await;
                Notice::info(reply.text().unwrap_or(messages::DONE))
            }
            Err(e) => {
                warn!("Toggle occupied on space {} failed: {}", space_id, e);
                failure_notice(&e, messages::SPACE_UPDATE_FAILED)
            }
        };
        self.record(notice).await
    }

    pub async fn find_record(&self, plate: &str) -> Notice {
        let Some(plate) = normalize_plate(plate) else {
            return self.record(Notice::warning(messages::PLATE_REQUIRED)).await;
        };

        let notice = match self.api.find_record(plate).await {
            Ok(record_id) => Notice::info(messages::found_record(plate, record_id)),
            Err(DeskError::Server { status: 404, .. }) => Notice::warning(messages::RECORD_NOT_FOUND),
            Err(e) => failure_notice(&e, messages::RECORD_NOT_FOUND),
        };
        self.record(notice).await
    }
}
