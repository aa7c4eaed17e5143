use std::{
    collections::HashSet,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, bail, Context, Result};
use kudos_core::write_text_atomic;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{TransportHealthSnapshot, SOCKET_STATE_SCHEMA_VERSION};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SocketState {
    schema_version: u32,
    #[serde(default)]
    processed_event_keys: Vec<String>,
    #[serde(default)]
    transport_health: TransportHealthSnapshot,
}

impl Default for SocketState {
    fn default() -> Self {
        Self {
            schema_version: SOCKET_STATE_SCHEMA_VERSION,
            processed_event_keys: Vec::new(),
            transport_health: TransportHealthSnapshot::default(),
        }
    }
}

/// Durable dedup window plus the latest transport health snapshot.
#[derive(Debug)]
pub(super) struct SocketStateStore {
    path: PathBuf,
    cap: usize,
    state: SocketState,
    processed_index: HashSet<String>,
}

impl SocketStateStore {
    pub(super) fn load(path: PathBuf, cap: usize) -> Result<Self> {
        let mut state = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read state file {}", path.display()))?;
            serde_json::from_str::<SocketState>(&raw).with_context(|| {
                format!("failed to parse kudos socket state file {}", path.display())
            })?
        } else {
            SocketState::default()
        };

        if state.schema_version != SOCKET_STATE_SCHEMA_VERSION {
            bail!(
                "unsupported kudos state schema: expected {}, found {}",
                SOCKET_STATE_SCHEMA_VERSION,
                state.schema_version
            );
        }

        let cap = cap.max(1);
        let overflow = state.processed_event_keys.len().saturating_sub(cap);
        if overflow > 0 {
            state.processed_event_keys.drain(..overflow);
        }

        let processed_index = state
            .processed_event_keys
            .iter()
            .cloned()
            .collect::<HashSet<_>>();
        Ok(Self {
            path,
            cap,
            state,
            processed_index,
        })
    }

    pub(super) fn contains(&self, key: &str) -> bool {
        self.processed_index.contains(key)
    }

    /// Records a processed event key; returns false when it was already known.
    pub(super) fn mark_processed(&mut self, key: &str) -> bool {
        if !self.processed_index.insert(key.to_string()) {
            return false;
        }
        self.state.processed_event_keys.push(key.to_string());
        let overflow = self.state.processed_event_keys.len().saturating_sub(self.cap);
        for removed in self.state.processed_event_keys.drain(..overflow) {
            self.processed_index.remove(&removed);
        }
        true
    }

    pub(super) fn transport_health(&self) -> &TransportHealthSnapshot {
        &self.state.transport_health
    }

    pub(super) fn set_transport_health(&mut self, value: TransportHealthSnapshot) {
        self.state.transport_health = value;
    }

    pub(super) fn save(&self) -> Result<()> {
        let mut payload =
            serde_json::to_string_pretty(&self.state).context("failed to serialize state")?;
        payload.push('\n');
        write_text_atomic(&self.path, &payload)
            .with_context(|| format!("failed to write state file {}", self.path.display()))?;
        Ok(())
    }
}

/// Reads the persisted transport snapshot without taking ownership of the
/// state file. Any read or parse failure yields the default snapshot.
pub(crate) fn read_transport_health(path: &Path) -> TransportHealthSnapshot {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return TransportHealthSnapshot::default();
    };
    serde_json::from_str::<SocketState>(&raw)
        .map(|state| state.transport_health)
        .unwrap_or_default()
}

/// Append-only JSONL audit log. The runtime creates the state directory
/// before opening logs, so `open` expects the parent to exist.
#[derive(Clone)]
pub(super) struct JsonlEventLog {
    path: PathBuf,
    file: Arc<Mutex<std::fs::File>>,
}

impl JsonlEventLog {
    pub(super) fn open(path: PathBuf) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub(super) fn append(&self, value: &Value) -> Result<()> {
        let line = serde_json::to_string(value).context("failed to encode log event")?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("event log mutex poisoned"))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        Ok(())
    }
}
