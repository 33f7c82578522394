mod docs;
mod error;
mod middleware;
mod state;
mod util;

pub mod routes;
pub mod services;

pub use docs::ApiDoc;
pub use error::{ApiError, ErrorResponse};
pub use state::AppState;

use axum::{
    http::header::{AUTHORIZATION, CONTENT_TYPE},
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        // Auth routes
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/logout", post(routes::auth::logout))
        .route("/api/auth/me", get(routes::auth::me))
        // Manager routes
        .route(
            "/api/managers",
            get(routes::managers::list_managers).post(routes::managers::create_manager),
        )
        .route(
            "/api/managers/:manager_id",
            get(routes::managers::get_manager)
                .put(routes::managers::update_manager)
                .delete(routes::managers::delete_manager),
        )
        // Listing agent routes
        .route(
            "/api/agents",
            get(routes::agents::list_agents).post(routes::agents::create_agent),
        )
        .route(
            "/api/agents/:agent_id",
            get(routes::agents::get_agent)
                .put(routes::agents::update_agent)
                .delete(routes::agents::delete_agent),
        )
        // Property routes
        .route(
            "/api/properties",
            get(routes::properties::list_properties).post(routes::properties::create_property),
        )
        .route(
            "/api/properties/import",
            post(routes::properties::import_listing),
        )
        .route(
            "/api/properties/recategorize",
            post(routes::regions::recategorize),
        )
        .route(
            "/api/properties/:property_id",
            get(routes::properties::get_property)
                .patch(routes::properties::update_property)
                .delete(routes::properties::delete_property),
        )
        .route(
            "/api/properties/:property_id/images",
            post(routes::properties::add_image),
        )
        .route("/api/regions", get(routes::regions::list_regions))
        // Client and assignment routes
        .route(
            "/api/clients",
            get(routes::clients::list_clients).post(routes::clients::create_client),
        )
        .route(
            "/api/clients/:client_id",
            get(routes::clients::get_client)
                .patch(routes::clients::update_client)
                .delete(routes::clients::delete_client),
        )
        .route(
            "/api/clients/:client_id/assignments",
            get(routes::clients::list_assignments).post(routes::clients::assign_property),
        )
        .route(
            "/api/clients/:client_id/assignments/order",
            put(routes::clients::reorder_assignments),
        )
        .route(
            "/api/clients/:client_id/assignments/:property_id",
            axum::routing::patch(routes::clients::update_assignment)
                .delete(routes::clients::unassign_property),
        )
        // Invoice routes
        .route(
            "/api/invoices",
            get(routes::invoices::list_invoices).post(routes::invoices::create_invoice),
        )
        .route(
            "/api/invoices/:invoice_id",
            get(routes::invoices::get_invoice)
                .patch(routes::invoices::update_invoice)
                .delete(routes::invoices::delete_invoice),
        )
        .route(
            "/api/invoices/:invoice_id/send",
            post(routes::invoices::send_invoice),
        )
        .route(
            "/api/invoices/:invoice_id/void",
            post(routes::invoices::void_invoice),
        )
        .route(
            "/api/invoices/:invoice_id/mark-paid",
            post(routes::invoices::mark_invoice_paid),
        )
        .route(
            "/api/invoices/:invoice_id/pdf",
            get(routes::invoices::invoice_pdf),
        )
        // Quote routes
        .route(
            "/api/quotes",
            get(routes::quotes::list_quotes).post(routes::quotes::create_quote),
        )
        .route(
            "/api/quotes/:quote_id",
            get(routes::quotes::get_quote)
                .patch(routes::quotes::update_quote)
                .delete(routes::quotes::delete_quote),
        )
        .route("/api/quotes/:quote_id/send", post(routes::quotes::send_quote))
        .route(
            "/api/quotes/:quote_id/accept",
            post(routes::quotes::accept_quote),
        )
        .route(
            "/api/quotes/:quote_id/decline",
            post(routes::quotes::decline_quote),
        )
        .route(
            "/api/quotes/:quote_id/convert",
            post(routes::quotes::convert_quote),
        )
        .route("/api/quotes/:quote_id/pdf", get(routes::quotes::quote_pdf))
        // Public routes
        .route(
            "/api/payments/intent",
            post(routes::payments::create_payment_intent),
        )
        .route(
            "/api/payments/webhook",
            post(routes::payments::stripe_webhook),
        )
        .route(
            "/api/portfolios/:slug",
            get(routes::portfolios::get_portfolio),
        )
        .route(
            "/api/portfolios/:slug/properties/:property_id",
            get(routes::portfolios::get_portfolio_property),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::logging_middleware))
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}
