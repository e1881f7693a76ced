use std::time::Duration;

/// Sequence model dimensions. Defaults mirror the production checkpoint
/// shape: 64-dim embeddings, 4 heads, 2 encoder layers, 50-step window.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub d_model: usize,
    pub n_heads: usize,
    pub n_layers: usize,
    pub ff_dim: usize,
    pub max_seq_len: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let d_model = 64;
        Self {
            d_model,
            n_heads: 4,
            n_layers: 2,
            ff_dim: d_model * 4,
            max_seq_len: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// History length at which request creation switches from the heuristic
    /// path to the model path (inclusive at the threshold).
    pub model_history_threshold: usize,
    /// Below this history length the heuristic uses its cold-start weighting.
    pub heuristic_warmup_threshold: usize,
    pub heuristic_top_k: usize,
    pub model_top_k: usize,
    pub inference_timeout: Duration,
    pub model_seed: u64,
    pub model: ModelConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_history_threshold: 30,
            heuristic_warmup_threshold: 10,
            heuristic_top_k: 5,
            model_top_k: 10,
            inference_timeout: Duration::from_secs(5),
            model_seed: 42,
            model: ModelConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_history_threshold: env_usize(
                "REC_MODEL_HISTORY_THRESHOLD",
                defaults.model_history_threshold,
            ),
            heuristic_warmup_threshold: env_usize(
                "REC_HEURISTIC_WARMUP_THRESHOLD",
                defaults.heuristic_warmup_threshold,
            ),
            heuristic_top_k: env_usize("REC_HEURISTIC_TOP_K", defaults.heuristic_top_k),
            model_top_k: env_usize("REC_MODEL_TOP_K", defaults.model_top_k),
            inference_timeout: Duration::from_millis(env_u64(
                "REC_INFERENCE_TIMEOUT_MS",
                defaults.inference_timeout.as_millis() as u64,
            )),
            model_seed: env_u64("REC_MODEL_SEED", defaults.model_seed),
            model: defaults.model,
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}
