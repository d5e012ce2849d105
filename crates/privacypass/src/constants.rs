//! Protocol constants: media types, header names, well-known paths

/// Content type of a client's token request.
pub const TOKEN_REQUEST_MEDIA_TYPE: &str = "message/token-request";

/// Content type of an Issuer's blind signature response.
pub const TOKEN_RESPONSE_MEDIA_TYPE: &str = "message/token-response";

/// Issuer and Attester token request path.
pub const TOKEN_REQUEST_PATH: &str = "/token-request";

/// Issuer directory document path.
pub const ISSUER_DIRECTORY_PATH: &str = "/.well-known/token-issuer-directory";

/// Anonymized origin id on requests; blinded origin key on Issuer responses.
pub const HEADER_TOKEN_ORIGIN: &str = "sec-token-origin";
pub const HEADER_CLIENT_KEY: &str = "sec-token-client";
pub const HEADER_REQUEST_BLIND: &str = "sec-token-request-blind";
pub const HEADER_CLIENT_ID: &str = "sec-client-id";
pub const HEADER_TOKEN_LIMIT: &str = "sec-token-limit";

/// Client id used when `sec-client-id` is absent.
pub const DEFAULT_CLIENT_ID: &str = "default";

/// Headers a client sends to shape the challenges it receives.
pub const HEADER_TOKEN_TYPE: &str = "sec-ch-token-type";
pub const HEADER_NON_INTERACTIVE: &str = "sec-token-attribute-non-interactive";
pub const HEADER_CROSS_ORIGIN: &str = "sec-token-attribute-cross-origin";
pub const HEADER_CHALLENGE_COUNT: &str = "sec-token-attribute-count";

/// HTTP authentication scheme for challenges and redemptions.
pub const PRIVATE_TOKEN_SCHEME: &str = "PrivateToken";
