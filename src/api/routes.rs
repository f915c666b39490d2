use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::{handlers, middleware};
use crate::config::Blacklist;
use crate::rpc::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub blacklist: Arc<Blacklist>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, blacklist: Blacklist) -> Self {
        Self {
            dispatcher,
            blacklist: Arc::new(blacklist),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/", get(handlers::index).post(handlers::rpc))
        .route("/rpc", post(handlers::rpc))
        .route("/relay", post(handlers::relay))
        .route("/health", get(handlers::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(from_fn(middleware::request_id))
                .layer(from_fn_with_state(state.clone(), middleware::reject_blacklisted)),
        )
        .with_state(state)
}
