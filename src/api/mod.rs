pub mod extract;
pub mod handlers;
pub mod server;

pub use extract::ApiJson;
pub use server::{router, start_server, AppState};
