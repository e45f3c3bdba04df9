//! OpenAPI/Utoipa configuration.

use crate::api::{favicon::FAVICON_TAG, health::MISC_TAG, proxy::PROXY_TAG};
use utoipa::OpenApi;

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Identity Console Gateway API",
        version = "1.0.0",
        description = "Backend gateway for the identity-provider management console: an allowlisted \
                       API proxy and SSRF-guarded favicon discovery."
    ),
    tags(
        (name = PROXY_TAG, description = "Identity-provider API proxy"),
        (name = FAVICON_TAG, description = "Favicon discovery for OAuth2 application origins"),
        (name = MISC_TAG, description = "Miscellaneous endpoints")
    )
)]
pub struct ApiDoc;
