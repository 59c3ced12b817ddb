pub mod metrics;
pub mod session;

pub use metrics::metrics_middleware;
pub use session::{session_middleware, AuthIdentity, MaybeIdentity, SessionCookie};
