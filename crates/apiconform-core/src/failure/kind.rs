//! Failure kinds and their default HTTP mapping

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Why a request or response did not conform to the contract.
///
/// Request-side kinds render as 4xx client errors; response-side kinds mean the
/// server under test broke its own contract and are raised by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No declared path matches the request path
    NotFound,
    /// Path is declared but the method is not
    MethodNotAllowed,
    /// Request content-type is not declared for the operation
    UnsupportedMediaType,
    /// Request body missing, unparseable, or schema-invalid
    InvalidBody,
    /// Query parameters violate their schema
    InvalidQuery,
    /// Request headers violate their schema
    InvalidHeader,
    /// Path parameters violate their schema
    InvalidPath,
    /// Cookies violate their schema
    InvalidCookie,
    /// Response status or content-type is not declared
    ResponseNotFound,
    /// Response body unparseable or schema-invalid
    InvalidResponseBody,
    /// Response headers violate their schema
    InvalidResponseHeader,
}

impl FailureKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::NotFound,
        Self::MethodNotAllowed,
        Self::UnsupportedMediaType,
        Self::InvalidBody,
        Self::InvalidQuery,
        Self::InvalidHeader,
        Self::InvalidPath,
        Self::InvalidCookie,
        Self::ResponseNotFound,
        Self::InvalidResponseBody,
        Self::InvalidResponseHeader,
    ];

    /// Default HTTP status used when the failure is rendered.
    #[must_use]
    pub const fn default_status(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::UnsupportedMediaType => 415,
            Self::InvalidBody
            | Self::InvalidQuery
            | Self::InvalidHeader
            | Self::InvalidPath
            | Self::InvalidCookie => 400,
            Self::ResponseNotFound | Self::InvalidResponseBody | Self::InvalidResponseHeader => 500,
        }
    }

    /// Whether the failure was found while validating a response.
    #[must_use]
    pub const fn is_response_side(self) -> bool {
        matches!(
            self,
            Self::ResponseNotFound | Self::InvalidResponseBody | Self::InvalidResponseHeader
        )
    }

    /// Stable machine identifier, matching the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::UnsupportedMediaType => "unsupported_media_type",
            Self::InvalidBody => "invalid_body",
            Self::InvalidQuery => "invalid_query",
            Self::InvalidHeader => "invalid_header",
            Self::InvalidPath => "invalid_path",
            Self::InvalidCookie => "invalid_cookie",
            Self::ResponseNotFound => "response_not_found",
            Self::InvalidResponseBody => "invalid_response_body",
            Self::InvalidResponseHeader => "invalid_response_header",
        }
    }

    /// Short human-readable title used in rendered error bodies.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::NotFound => "Not Found",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::UnsupportedMediaType => "Unsupported Media Type",
            Self::InvalidBody => "Bad Request Body",
            Self::InvalidQuery => "Bad Query Parameter",
            Self::InvalidHeader => "Bad Request Header",
            Self::InvalidPath => "Bad Request Path",
            Self::InvalidCookie => "Bad Request Cookie",
            Self::ResponseNotFound => "Response Not Declared",
            Self::InvalidResponseBody => "Invalid Response Body",
            Self::InvalidResponseHeader => "Invalid Response Header",
        }
    }

    /// Longer description used when no specific message is attached.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::NotFound => "Request path is not defined in the API description",
            Self::MethodNotAllowed => "Request method is not defined for this path",
            Self::UnsupportedMediaType => "Request content type is not defined for this operation",
            Self::InvalidBody => "Request body is not valid",
            Self::InvalidQuery => "Query parameter is not valid",
            Self::InvalidHeader => "Request header is not valid",
            Self::InvalidPath => "Path segment is not valid",
            Self::InvalidCookie => "Cookie value is not valid",
            Self::ResponseNotFound => "Response status or content type is not defined",
            Self::InvalidResponseBody => "Response body is not valid",
            Self::InvalidResponseHeader => "Response header is not valid",
        }
    }

    /// Location label for parameter-group failures (`query`, `path`, ...).
    #[must_use]
    pub const fn parameter_location(self) -> Option<&'static str> {
        match self {
            Self::InvalidQuery => Some("query"),
            Self::InvalidHeader | Self::InvalidResponseHeader => Some("header"),
            Self::InvalidPath => Some("path"),
            Self::InvalidCookie => Some("cookie"),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_side_statuses() {
        assert_eq!(FailureKind::NotFound.default_status(), 404);
        assert_eq!(FailureKind::MethodNotAllowed.default_status(), 405);
        assert_eq!(FailureKind::UnsupportedMediaType.default_status(), 415);
        for kind in [
            FailureKind::InvalidBody,
            FailureKind::InvalidQuery,
            FailureKind::InvalidHeader,
            FailureKind::InvalidPath,
            FailureKind::InvalidCookie,
        ] {
            assert_eq!(kind.default_status(), 400, "{kind}");
            assert!(!kind.is_response_side());
        }
    }

    #[test]
    fn response_side_kinds() {
        let response_side: Vec<_> = FailureKind::ALL
            .into_iter()
            .filter(|k| k.is_response_side())
            .collect();
        assert_eq!(
            response_side,
            vec![
                FailureKind::ResponseNotFound,
                FailureKind::InvalidResponseBody,
                FailureKind::InvalidResponseHeader,
            ]
        );
    }

    #[test]
    fn serialized_form_matches_as_str() {
        for kind in FailureKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.as_str().into()));
        }
    }
}
