//! Core types, seam traits, and the error taxonomy shared by every IntentForge crate.

pub mod deadline;
pub mod error;
pub mod traits;
pub mod types;

pub use deadline::{guarded, Interrupted};
pub use error::RouterError;
pub use traits::{
    InvocationError, LlmProvider, LlmRequest, LlmResponse, ProviderSession, SessionFactory,
};
pub use types::{
    CandidateCall, Catalog, CatalogEntry, DispatchOutcome, Exchange, ExchangeRole,
    OperationDescriptor, ParamSpec, ParamType, ProviderEndpoint,
};
