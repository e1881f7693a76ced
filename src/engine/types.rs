use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which ranking path a recommendation request is bound to. Fixed at request
/// creation; never re-derived for an existing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Heuristic,
    Model,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Heuristic => "heuristic",
            StrategyKind::Model => "model",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "heuristic" => Some(StrategyKind::Heuristic),
            "model" => Some(StrategyKind::Model),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Completed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RequestStatus::Pending),
            "completed" => Some(RequestStatus::Completed),
            _ => None,
        }
    }
}

/// One past attempt, as read from the interaction history provider.
/// Processing always consumes these ascending by timestamp.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub question_id: i64,
    pub correct: bool,
    pub response_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

/// A candidate item as read from the catalog provider (active items only).
#[derive(Debug, Clone, Copy)]
pub struct CatalogItem {
    pub id: i64,
    pub category_id: i64,
    pub difficulty: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredItem {
    pub question_id: i64,
    pub score: f64,
}
