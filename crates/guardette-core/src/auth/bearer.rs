use http::header::{HeaderValue, AUTHORIZATION};

use super::{AuthContext, AuthHandler};
use crate::error::{GatewayError, GatewayResult};
use crate::BoxFuture;

/// `authorization: Bearer <secret>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BearerToken;

impl BearerToken {
    /// Registered kind.
    pub const KIND: &'static str = "bearer_token";
}

impl AuthHandler for BearerToken {
    fn apply<'a>(&'a self, mut ctx: AuthContext<'a>) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async move {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", ctx.secret("secret")?))
                .map_err(|_| GatewayError::auth_handler("bearer_token: invalid token"))?;
            value.set_sensitive(true);

            ctx.request.headers.insert(AUTHORIZATION, value);
            Ok(())
        })
    }
}
