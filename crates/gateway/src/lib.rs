//! # chatline gateway crate
//!
//! The HTTP surface of chatline: REST endpoints for sign-in, the user
//! directory, chats and history, plus the `/ws` endpoint that carries live
//! events.
//!
//! - **REST**: [`rest`], documented with OpenAPI (Swagger UI in debug builds)
//! - **WebSocket**: [`websocket`], one [`chatline_realtime::ClientSession`] per socket
//! - **State**: [`GatewayState`], the services every handler shares
//! - **Middleware**: bearer-token authentication, CORS and request logging
//!
//! ```no_run
//! # async fn run(state: chatline_gateway::GatewayState) -> std::io::Result<()> {
//! let app = chatline_gateway::create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:7070").await?;
//! axum::serve(listener, app).await
//! # }
//! ```

pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod websocket;

pub use error::{GatewayError, GatewayResult};
pub use middleware::auth_middleware;
pub use state::GatewayState;

use std::sync::Arc;

use axum::{middleware as axum_middleware, Router};

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let arc_state = Arc::new(state);

    #[allow(unused_mut)]
    let mut router = Router::new()
        .merge(rest::create_rest_routes(arc_state.clone()).with_state(arc_state.clone()))
        .merge(websocket::create_websocket_routes(arc_state.clone()).with_state(arc_state));

    #[cfg(debug_assertions)]
    {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
        use utoipa::{Modify, OpenApi};
        use utoipa_swagger_ui::SwaggerUi;

        struct BearerAuth;

        impl Modify for BearerAuth {
            fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
                if let Some(components) = openapi.components.as_mut() {
                    components.add_security_scheme(
                        "bearer",
                        SecurityScheme::Http(
                            HttpBuilder::new()
                                .scheme(HttpAuthScheme::Bearer)
                                .bearer_format("JWT")
                                .build(),
                        ),
                    );
                }
            }
        }

        #[derive(OpenApi)]
        #[openapi(
            paths(
                rest::health::health_check,
                rest::auth::request_otp,
                rest::auth::verify_otp,
                rest::auth::signup,
                rest::auth::login,
                rest::auth::me,
                rest::users::list_other_users,
                rest::users::list_other_emails,
                rest::chats::list_chats,
                rest::chats::start_chat,
                rest::chats::create_group,
                rest::chats::add_member,
                rest::messages::send_message,
                rest::messages::list_messages,
                rest::messages::list_all_messages,
                rest::messages::list_received_messages,
                rest::presence::list_presence,
            ),
            components(
                schemas(
                    rest::ErrorResponse,
                    rest::health::HealthResponse,
                    rest::auth::RequestOtpRequest,
                    rest::auth::VerifyOtpRequest,
                    rest::auth::CredentialsRequest,
                    rest::auth::OtpRequestedResponse,
                    rest::auth::UserResponse,
                    rest::auth::SessionResponse,
                    rest::users::DirectoryEntryResponse,
                    rest::chats::ParticipantResponse,
                    rest::chats::ChatResponse,
                    rest::chats::ChatSummaryResponse,
                    rest::chats::StartChatRequest,
                    rest::chats::CreateGroupRequest,
                    rest::chats::AddMemberRequest,
                    rest::messages::MessageResponse,
                    rest::messages::SendMessageRequest,
                    rest::messages::SendMessageResponse,
                    rest::messages::DeliveryResponse,
                    rest::presence::PresenceEntryResponse,
                )
            ),
            modifiers(&BearerAuth),
            tags(
                (name = "health", description = "Liveness"),
                (name = "auth", description = "One-time codes, signup and login"),
                (name = "users", description = "User directory"),
                (name = "chats", description = "Direct and group chats"),
                (name = "messages", description = "Sending and history"),
                (name = "presence", description = "Who is online"),
            )
        )]
        struct ApiDoc;

        router = router
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router
        .layer(middleware::create_cors_middleware())
        .layer(middleware::create_trace_middleware())
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
}
