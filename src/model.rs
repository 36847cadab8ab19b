use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::store::StoreError;

/// The two record collections the desk manages. Each one lives behind its own REST base URL.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Stocks,
    Brokers,
}

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::Stocks, RecordKind::Brokers];

    pub fn title(self) -> &'static str {
        match self {
            RecordKind::Stocks => "Stocks",
            RecordKind::Brokers => "Brokers",
        }
    }

    pub fn singular(self) -> &'static str {
        match self {
            RecordKind::Stocks => "stock",
            RecordKind::Brokers => "broker",
        }
    }

    pub fn index(self) -> usize {
        match self {
            RecordKind::Stocks => 0,
            RecordKind::Brokers => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub name: String,
    #[serde(deserialize_with = "decimal_text")]
    pub price: String,
    #[serde(deserialize_with = "decimal_text")]
    pub amount: String,
}

/// Body of a create request; the backend assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    pub name: String,
    pub price: String,
    pub amount: String,
}

impl NewRecord {
    pub fn with_id(self, id: u64) -> Record {
        Record {
            id,
            name: self.name,
            price: self.price,
            amount: self.amount,
        }
    }
}

// Prices and amounts travel as strings, but some backends emit bare numbers.
fn decimal_text<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Text {
        Str(String),
        Num(serde_json::Number),
    }

    Ok(match Text::deserialize(de)? {
        Text::Str(s) => s,
        Text::Num(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskConfig {
    pub stocks_url: String,
    pub brokers_url: String,
    pub initial_kind: RecordKind,
    pub user_agent: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub page_size: usize,
    /// None disables the live price simulation.
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Option<Duration>,
    /// Delay before re-fetching after a successful mutation. None disables the re-fetch.
    #[serde(with = "humantime_serde")]
    pub reload_delay: Option<Duration>,
    pub merge_locally: bool,
    pub price_jitter: f64,
    pub seed: Option<u64>,
}

impl DeskConfig {
    pub fn base_url(&self, kind: RecordKind) -> &str {
        match kind {
            RecordKind::Stocks => &self.stocks_url,
            RecordKind::Brokers => &self.brokers_url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationOp {
    Create,
    Update,
    Delete { id: u64 },
}

impl MutationOp {
    pub fn verb(self) -> &'static str {
        match self {
            MutationOp::Create => "Added",
            MutationOp::Update => "Updated",
            MutationOp::Delete { .. } => "Deleted",
        }
    }
}

/// Result of a create/update/delete call, returned to the caller. `result` carries the
/// accepted record when there is one: the backend echo, or the sent record for an update.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub kind: RecordKind,
    pub op: MutationOp,
    pub result: Result<Option<Record>, StoreError>,
}

/// Collection notifications emitted by record stores. Mutation outcomes go back to the
/// caller that asked for them instead.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    Changed {
        kind: RecordKind,
        records: Arc<Vec<Record>>,
    },
    FetchFailed {
        kind: RecordKind,
        error: StoreError,
    },
}

/// Events delivered to the UI thread.
#[derive(Debug, Clone)]
pub enum DeskEvent {
    Records {
        kind: RecordKind,
        records: Arc<Vec<Record>>,
    },
    Info(String),
    /// A blocking message the user has to dismiss.
    Alert(String),
}
