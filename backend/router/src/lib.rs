//! Request pipeline: open provider sessions, build the catalog, interpret, dispatch, release.

pub mod catalog;
pub mod dispatcher;
pub mod router;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{fetch_catalog, merge_listings};
pub use dispatcher::Dispatcher;
pub use router::{
    OracleHandle, ProviderStatus, RouteRequest, RouteResponse, Routed, Router, RouterSettings,
    NO_MATCH_RESULT,
};
pub use session::{SessionManager, SessionSet};
