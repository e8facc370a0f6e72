//! Shared desk state: reconciled tables, channel status, entry form and notices

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::messages;
use crate::table::{ReconcileReport, Table};
use crate::types::{Record, RecordState, Space};
use crate::view;

/// Push channel connection status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelStatus {
    Idle,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Disconnected { reason: String },
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelStatus::Idle => write!(f, "Idle"),
            ChannelStatus::Connecting => write!(f, "Connecting"),
            ChannelStatus::Connected => write!(f, "Connected"),
            ChannelStatus::Reconnecting { attempt } => write!(f, "Reconnecting (attempt {})", attempt),
            ChannelStatus::Disconnected { reason } => write!(f, "Disconnected: {}", reason),
        }
    }
}

/// Severity of an operator notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Message surfaced to the operator after an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub timestamp_epoch_ms: u64,
}

impl Notice {
    pub fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            timestamp_epoch_ms: current_epoch_ms(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, text)
    }

    pub fn is_info(&self) -> bool {
        self.level == NoticeLevel::Info
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Entry form contents, prefilled by plate recognition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryForm {
    pub plate: String,
}

/// State shared by the sync client, poller, dispatcher and dashboard
#[derive(Debug)]
pub struct DeskState {
    pub records: Table,
    pub spaces: Table,
    pub channel: ChannelStatus,
    pub entry_form: EntryForm,
    pub recognition_label: Option<String>,
    pub last_records_sync_epoch_ms: Option<u64>,
    pub last_spaces_sync_epoch_ms: Option<u64>,
    pub notices: VecDeque<Notice>,
    pub notice_max_size: usize,
    pub started_at: Instant,
    lifecycle: HashMap<u64, RecordState>,
    deleted: HashSet<u64>,
}

impl DeskState {
    pub fn new(notice_max_size: usize) -> Self {
        Self {
            records: Table::new(),
            spaces: Table::new(),
            channel: ChannelStatus::Idle,
            entry_form: EntryForm::default(),
            recognition_label: None,
            last_records_sync_epoch_ms: None,
            last_spaces_sync_epoch_ms: None,
            notices: VecDeque::with_capacity(notice_max_size),
            notice_max_size,
            started_at: Instant::now(),
            lifecycle: HashMap::new(),
            deleted: HashSet::new(),
        }
    }

    /// Reconcile a records snapshot. Records deleted from this desk stay deleted.
    pub fn apply_records(&mut self, records: &[Record]) -> ReconcileReport {
        let live: Vec<&Record> = records
            .iter()
            .filter(|r| !self.deleted.contains(&r.id))
            .collect();
        // later duplicates overwrite earlier ones, matching the table
        self.lifecycle = live.iter().map(|r| (r.id, r.state())).collect();

        let report = if live.len() == records.len() {
            view::apply_records(&mut self.records, records)
        } else {
            let live: Vec<Record> = live.into_iter().cloned().collect();
            view::apply_records(&mut self.records, &live)
        };
        self.last_records_sync_epoch_ms = Some(current_epoch_ms());
        report
    }

    pub fn apply_spaces(&mut self, spaces: &[Space]) -> ReconcileReport {
        let report = view::apply_spaces(&mut self.spaces, spaces);
        self.last_spaces_sync_epoch_ms = Some(current_epoch_ms());
        report
    }

    /// Drop the row of a record the backend confirmed as deleted
    pub fn mark_deleted(&mut self, record_id: u64) -> bool {
        self.deleted.insert(record_id);
        self.lifecycle.remove(&record_id);
        self.records.remove(record_id).is_some()
    }

    /// Lifecycle state of a record as seen from this desk
    pub fn record_state(&self, record_id: u64) -> Option<RecordState> {
        if self.deleted.contains(&record_id) {
            return Some(RecordState::Deleted);
        }
        self.lifecycle.get(&record_id).copied()
    }

    /// Fill the entry form with a recognized plate
    pub fn set_recognized_plate(&mut self, plate: &str) {
        self.entry_form.plate = plate.to_string();
        self.recognition_label = Some(messages::recognized_plate(plate));
    }

    pub fn set_channel(&mut self, status: ChannelStatus) {
        self.channel = status;
    }

    pub fn add_notice(&mut self, notice: Notice) {
        if self.notice_max_size == 0 {
            return;
        }
        if self.notices.len() >= self.notice_max_size {
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
    }
}

/// Thread-safe shared state handle
pub type StateHandle = Arc<RwLock<DeskState>>;

pub fn new_state_handle(notice_max_size: usize) -> StateHandle {
    Arc::new(RwLock::new(DeskState::new(notice_max_size)))
}

pub(crate) fn current_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
