mod handlers;
mod middleware;
mod routes;
mod types;
#[cfg(test)]
mod tests;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use middleware::REQUEST_ID;
pub use routes::{create_router, AppState};
pub use types::{ApiError, HealthResponse};
