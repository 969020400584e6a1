//! # Stage: Model Routing
//!
//! ## Responsibility
//! Decide which generation backend serves each query. Simple questions go to
//! the fast backend; analytical questions to the balanced backend; creative
//! or open-ended questions (and questions with thin retrieval support) to the
//! most capable backend. Cost-saving mode overrides everything and forces the
//! fast backend.
//!
//! ## Guarantees
//! - Deterministic: the same `(query, documents, mode, availability)` input
//!   always produces the same decision.
//! - Safe: the chosen backend is always a member of the availability set
//!   supplied by the caller; an unavailable preference is substituted along
//!   the MostCapable → Balanced → Fast downgrade chain and the substitution
//!   is recorded in the decision's reasoning.
//! - Total on non-empty sets: only an empty availability set fails, and it
//!   fails with a distinct error rather than a silent downgrade.
//! - Pure: no I/O, no interior state, no clock reads.
//!
//! ## NOT Responsible For
//! - Calling the generation backends (that belongs to `pipeline` / `generation`)
//! - Health or entitlement checks behind the availability set (hosting layer)
//! - Context sizing (that belongs to `context`)

pub mod config;
pub mod router;

// Re-exports for convenience
pub use config::{BackendCosts, BackendIds, RoutingConfig};
pub use router::{Backend, BackendInfo, ModelRouter, OperatingMode, RouterError, RoutingDecision};
