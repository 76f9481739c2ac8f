pub mod middleware;
pub mod response;
pub mod services;
pub mod state;

pub use response::{ApiResponse, ResponseCode};
pub use state::AppState;
