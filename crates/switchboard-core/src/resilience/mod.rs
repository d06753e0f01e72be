//! Failure isolation for provider/model candidates

mod circuit_breaker;

pub use circuit_breaker::{CircuitBreakerBank, CircuitSnapshot, CircuitStatus};
