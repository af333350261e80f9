use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Field Service API",
        version = "1.0.0",
        description = r#"
# Field Service Management API

Dispatch work orders to technicians, keep notes and attachments with each job,
and bill customers.

## Authentication

Log in with `POST /api/v1/auth/login` and send the returned token on every
other request:

```
Authorization: Bearer <your-jwt-token>
```

The event stream also accepts the token as an `access_token` query parameter.

## Live updates

`GET /api/v1/events` is a server-sent event stream carrying
`work-order-created`, `work-order-updated` and `work-order-deleted` frames.

## Pagination

List endpoints take `page` (default 1) and `perPage` (default 20, max 100).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "auth", description = "Login and identity"),
        (name = "work-orders", description = "Work order management"),
        (name = "notes", description = "Work order notes"),
        (name = "resources", description = "Work order attachments"),
        (name = "events", description = "Live work order events")
    ),
    paths(
        crate::handlers::auth::login,
        crate::handlers::auth::me,

        crate::handlers::work_orders::list_work_orders,
        crate::handlers::work_orders::get_work_order,
        crate::handlers::work_orders::create_work_order,
        crate::handlers::work_orders::update_work_order,
        crate::handlers::work_orders::delete_work_order,

        crate::handlers::notes::list_notes,
        crate::handlers::notes::add_note,
        crate::handlers::notes::delete_note,

        crate::handlers::resources::list_resources,
        crate::handlers::resources::upload_resource,
        crate::handlers::resources::download_resource,
        crate::handlers::resources::delete_resource,

        crate::handlers::events::stream_events,
    ),
    components(
        schemas(
            crate::handlers::common::PaginationMeta,

            crate::dto::LoginRequest,
            crate::dto::TokenResponse,
            crate::dto::UserResponse,
            crate::dto::CustomerResponse,
            crate::dto::ProviderResponse,
            crate::dto::CreateWorkOrderRequest,
            crate::dto::UpdateWorkOrderRequest,
            crate::dto::WorkOrderResponse,
            crate::dto::CreateNoteRequest,
            crate::dto::NoteResponse,
            crate::dto::ResourceResponse,
            crate::dto::InvoiceResponse,
            crate::dto::LocationResponse,

            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerSecurity)
)]
pub struct ApiDocV1;

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
