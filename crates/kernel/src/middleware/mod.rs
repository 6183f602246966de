//! HTTP middleware components.
//!
//! The gate is the only request-time layer this kernel owns: it runs the
//! locale and access decision for every request before routing.

pub mod gate;

pub use gate::{GateConfig, GateDecision, ResolvedLocale, RouteClass, gate_request};
