//! correlator-api: the HTTP surface from spec §6. This crate is a thin
//! transport shell over `correlator-core`'s pipeline functions and
//! `correlator-query`'s read engine — every handler either parses a request,
//! delegates, and maps the result, or delegates and maps. No domain logic
//! lives here.

pub mod app;
pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use app::build_router;
pub use state::AppState;
