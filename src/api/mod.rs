pub mod error;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use session::{SessionLimits, SessionStore};
pub use state::AppState;
