use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::logout,
        crate::routes::auth::me,
        crate::routes::managers::list_managers,
        crate::routes::managers::create_manager,
        crate::routes::managers::get_manager,
        crate::routes::managers::update_manager,
        crate::routes::managers::delete_manager,
        crate::routes::agents::list_agents,
        crate::routes::agents::create_agent,
        crate::routes::agents::get_agent,
        crate::routes::agents::update_agent,
        crate::routes::agents::delete_agent,
        crate::routes::properties::list_properties,
        crate::routes::properties::create_property,
        crate::routes::properties::import_listing,
        crate::routes::properties::get_property,
        crate::routes::properties::update_property,
        crate::routes::properties::delete_property,
        crate::routes::properties::add_image,
        crate::routes::regions::list_regions,
        crate::routes::regions::recategorize,
        crate::routes::clients::list_clients,
        crate::routes::clients::create_client,
        crate::routes::clients::get_client,
        crate::routes::clients::update_client,
        crate::routes::clients::delete_client,
        crate::routes::clients::list_assignments,
        crate::routes::clients::assign_property,
        crate::routes::clients::reorder_assignments,
        crate::routes::clients::update_assignment,
        crate::routes::clients::unassign_property,
        crate::routes::invoices::list_invoices,
        crate::routes::invoices::create_invoice,
        crate::routes::invoices::get_invoice,
        crate::routes::invoices::update_invoice,
        crate::routes::invoices::delete_invoice,
        crate::routes::invoices::send_invoice,
        crate::routes::invoices::void_invoice,
        crate::routes::invoices::mark_invoice_paid,
        crate::routes::invoices::invoice_pdf,
        crate::routes::quotes::list_quotes,
        crate::routes::quotes::create_quote,
        crate::routes::quotes::get_quote,
        crate::routes::quotes::update_quote,
        crate::routes::quotes::delete_quote,
        crate::routes::quotes::send_quote,
        crate::routes::quotes::accept_quote,
        crate::routes::quotes::decline_quote,
        crate::routes::quotes::convert_quote,
        crate::routes::quotes::quote_pdf,
        crate::routes::payments::create_payment_intent,
        crate::routes::payments::stripe_webhook,
        crate::routes::portfolios::get_portfolio,
        crate::routes::portfolios::get_portfolio_property
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            crate::routes::health::HealthResponse,
            crate::routes::auth::SessionResponse,
            crate::routes::auth::MeResponse,
            crate::routes::models::RegisterRequest,
            crate::routes::models::LoginRequest,
            crate::routes::models::UserResponse,
            crate::routes::models::Manager,
            crate::routes::models::CreateManagerRequest,
            crate::routes::models::UpdateManagerRequest,
            crate::routes::managers::ManagersResponse,
            crate::routes::managers::ManagerResponse,
            crate::routes::models::ListingAgent,
            crate::routes::models::CreateAgentRequest,
            crate::routes::models::UpdateAgentRequest,
            crate::routes::agents::AgentsResponse,
            crate::routes::agents::AgentResponse,
            crate::routes::models::Property,
            crate::routes::models::CreatePropertyRequest,
            crate::routes::models::UpdatePropertyRequest,
            crate::routes::models::ImportListingRequest,
            crate::routes::models::AddImageRequest,
            crate::routes::models::RegionSummary,
            crate::routes::properties::PropertiesResponse,
            crate::routes::properties::PropertyResponse,
            crate::routes::regions::RegionsResponse,
            crate::routes::regions::RecategorizeResponse,
            crate::services::pricing::PricingVisibility,
            crate::services::pricing::VisibilityOverrides,
            crate::services::pricing::ClientPricing,
            crate::routes::models::Client,
            crate::routes::models::CreateClientRequest,
            crate::routes::models::UpdateClientRequest,
            crate::routes::clients::ClientsResponse,
            crate::routes::clients::ClientResponse,
            crate::routes::models::Assignment,
            crate::routes::models::AssignPropertyRequest,
            crate::routes::models::UpdateAssignmentRequest,
            crate::routes::models::ReorderAssignmentsRequest,
            crate::routes::clients::AssignmentsResponse,
            crate::routes::clients::AssignmentResponse,
            crate::routes::models::Portfolio,
            crate::routes::models::PortfolioProperty,
            crate::routes::models::PortfolioContact,
            crate::routes::models::LineItem,
            crate::services::billing::Totals,
            crate::services::invoices::Invoice,
            crate::services::invoices::InvoiceStatus,
            crate::routes::models::CreateInvoiceRequest,
            crate::routes::models::UpdateInvoiceRequest,
            crate::routes::invoices::InvoicesResponse,
            crate::routes::invoices::InvoiceResponse,
            crate::services::quotes::Quote,
            crate::services::quotes::QuoteStatus,
            crate::services::quotes::QuoteConversion,
            crate::routes::models::CreateQuoteRequest,
            crate::routes::models::UpdateQuoteRequest,
            crate::routes::quotes::QuotesResponse,
            crate::routes::quotes::QuoteResponse,
            crate::routes::models::CreatePaymentIntentRequest,
            crate::routes::models::PaymentIntentResponse,
            crate::routes::payments::WebhookAck
        )
    ),
    tags(
        (name = "Health", description = "Service health endpoints"),
        (name = "Auth", description = "Password accounts and sessions"),
        (name = "Managers", description = "Property manager administration"),
        (name = "Agents", description = "Listing agents"),
        (name = "Properties", description = "Property catalogue and listing import"),
        (name = "Regions", description = "Region categorization"),
        (name = "Clients", description = "Client records"),
        (name = "Assignments", description = "Curated client portfolios"),
        (name = "Invoices", description = "Invoices and PDF export"),
        (name = "Quotes", description = "Quotes, acceptance and conversion"),
        (name = "Payments", description = "Stripe payment intents and webhooks"),
        (name = "Portfolios", description = "Public client portfolios")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let schemes = &mut components.security_schemes;

        let mut scheme = SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer));
        if let SecurityScheme::Http(http) = &mut scheme {
            http.bearer_format = Some("Bearer".to_string());
        }

        schemes.insert("bearerAuth".to_string(), scheme);
    }
}
