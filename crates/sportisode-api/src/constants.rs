//! API constants

/// API version segment, part of every versioned route
pub const API_VERSION: &str = "v0";

/// Prefix for versioned routes (`/api/v0`)
pub const API_PREFIX: &str = "/api/v0";

/// Where the OpenAPI document is served
pub const OPENAPI_JSON_PATH: &str = "/api/openapi.json";
