//! Application layer containing the payment orchestration.
//!
//! `PaymentEngine` is the entry point. It signs outbound payment requests,
//! reconciles inbound gateway callbacks against the ledger and applies the
//! resulting order and inventory changes, serializing conflicting work through
//! keyed async locks.

pub mod effects;
pub mod engine;
pub mod locks;
pub mod reconciliation;
pub mod session_builder;
pub mod signature;
