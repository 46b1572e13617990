//! solbundle: a custodial Solana transfer core for conversational front ends.
//!
//! The flow is intent -> quote -> confirm (or cancel). A transfer intent is
//! validated and priced against the live network, then parked as a pending
//! request under an unguessable id with a hard TTL. Confirmation atomically
//! claims the request, rebuilds the exact quoted message, signs it with the
//! user's sealed custodial key, submits, waits for a terminal status, and
//! records the outcome before the request is allowed to die. Cancellation
//! claims the same record, so the two can never both act.
//!
//! [`orchestrator::Orchestrator`] is the only type a front end needs;
//! [`bootstrap`] wires one up from the environment.

pub mod bootstrap;
pub mod config;
pub mod custody;
pub mod error;
pub mod orchestrator;
pub mod quote;
pub mod rpc;
pub mod store;
pub mod submit;
pub mod validate;

#[cfg(test)]
mod testutil;

pub use config::Config;
pub use error::{Error, Result};
pub use orchestrator::{ConfirmationPresentation, Orchestrator, OutcomePresentation};
pub use submit::CancelAck;
