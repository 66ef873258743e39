use std::num::NonZeroUsize;
use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use shot_cooldown::Cooldown;
use shot_cooldown::CooldownStack;
use shot_cooldown::KeywordBucket;
use shot_cooldown::PositionalBucket;
use tower::BoxError;
use tower::ServiceBuilder;
use tower_cooldown::CooldownLayer;
use tower_cooldown::CooldownServiceError;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt().init();

    // 1. Setup Cooldowns
    // Requests are described as (method, path) plus one keyword argument per
    // header, so an API key header can pick the bucket. Anonymous requests
    // skip the per-key cooldown.
    let per_key = Cooldown::builder(
        NonZeroUsize::new(5).unwrap_or(NonZeroUsize::MIN),
        Duration::from_secs(10),
        KeywordBucket::new("x-api-key"),
    )
    .with_cooldown_id("per-key")
    .with_check(|inv| inv.get("x-api-key").is_some())
    .build()?;
    let per_path = Cooldown::new(
        NonZeroUsize::new(20).unwrap_or(NonZeroUsize::MIN),
        Duration::from_secs(1),
        PositionalBucket::new(1),
    )?;
    let cooldowns = CooldownLayer::new(CooldownStack::new("http").with(per_path).with(per_key));

    // 2. Build the Router
    let app = Router::new()
        .route("/", get(|| async { "Hello, Cooldown!" }))
        .layer(
            ServiceBuilder::new()
                // The outermost layer: catches BoxError and returns Response
                .layer(HandleErrorLayer::new(handle_cooldown_error))
                .layer(cooldowns)
                // Converts the Route's Infallible to BoxError
                .map_err(BoxError::from),
        );

    // 3. Serve
    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("listening on http://127.0.0.1:3000");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_cooldown_error(err: BoxError) -> impl IntoResponse {
    if let Some(cooldown_err) = err.downcast_ref::<CooldownServiceError>() {
        cooldown_err.clone().into_response()
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Service Error").into_response()
    }
}
