use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    routes::models::{Portfolio, PortfolioProperty},
    services::portfolio as portfolio_service,
    ApiError, AppState,
};

#[utoipa::path(
    get,
    path = "/api/portfolios/{slug}",
    tag = "Portfolios",
    params(("slug" = String, Path, description = "Client portfolio slug")),
    responses(
        (status = 200, description = "Curated portfolio with client-visible pricing", body = Portfolio),
        (status = 404, description = "No active portfolio with this slug", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_portfolio(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Portfolio>, ApiError> {
    let portfolio = portfolio_service::build_portfolio(state.db_pool(), &slug).await?;
    Ok(Json(portfolio))
}

#[utoipa::path(
    get,
    path = "/api/portfolios/{slug}/properties/{property_id}",
    tag = "Portfolios",
    params(
        ("slug" = String, Path, description = "Client portfolio slug"),
        ("property_id" = String, Path, description = "Property public identifier")
    ),
    responses(
        (status = 200, description = "One property from the portfolio", body = PortfolioProperty),
        (status = 404, description = "Property is not part of this portfolio", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_portfolio_property(
    State(state): State<AppState>,
    Path((slug, property_id)): Path<(String, String)>,
) -> Result<Json<PortfolioProperty>, ApiError> {
    let property =
        portfolio_service::portfolio_property(state.db_pool(), &slug, &property_id).await?;
    Ok(Json(property))
}
