use axum::{extract::FromRequestParts, http::request::Parts};
use service_core::middleware::client_ip::{client_ip_or_unknown, user_agent_or_unknown};
use std::convert::Infallible;

/// Origin of a request as recorded on audit entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    pub ip_address: String,
    pub user_agent: String,
}

impl RequestMeta {
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            ip_address: client_ip_or_unknown(&parts.headers),
            user_agent: user_agent_or_unknown(&parts.headers),
        })
    }
}
