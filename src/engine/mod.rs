#![allow(dead_code)]

pub mod config;
pub mod heuristic;
pub mod selector;
pub mod seqrec;
pub mod types;

pub use config::{EngineConfig, ModelConfig};
pub use heuristic::HeuristicRanker;
pub use selector::select_strategy;
pub use seqrec::SequenceRanker;
#[allow(unused_imports)]
pub use types::*;
