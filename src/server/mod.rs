mod accounts;
mod admin;
mod domains;
pub mod dto;
mod files;
pub mod hosting;
pub mod response;
mod router;
mod sites;

pub use admin::admin_router;
pub use router::{AppState, create_router};
