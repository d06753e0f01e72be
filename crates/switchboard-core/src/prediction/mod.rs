//! Performance prediction from rolling per-candidate statistics

mod predictor;
mod stats;

pub use predictor::{
    DEFAULT_CONFIDENCE, DEFAULT_COST_USD, DEFAULT_LATENCY_MS, DEFAULT_RELIABILITY,
    PerformancePredictor, Prediction, RequestFeatures, TrainingSample,
};
pub use stats::ModelStatistics;
