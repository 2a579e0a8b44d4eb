mod admin;
mod audit;
pub mod dto;
mod licenses;
mod limits;
mod login;
pub mod response;
mod router;
mod schools;
mod snapshot;
pub mod validation;

pub use admin::admin_router;
pub use router::{AppState, create_router};
