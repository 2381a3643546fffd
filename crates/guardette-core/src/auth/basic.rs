use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::header::{HeaderValue, AUTHORIZATION};

use super::{AuthContext, AuthHandler};
use crate::error::{GatewayError, GatewayResult};
use crate::BoxFuture;

/// `authorization: Basic base64(username:password)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicAuth;

impl BasicAuth {
    /// Registered kind.
    pub const KIND: &'static str = "basic_auth";
}

impl AuthHandler for BasicAuth {
    fn apply<'a>(&'a self, mut ctx: AuthContext<'a>) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async move {
            let credentials = format!("{}:{}", ctx.secret("username")?, ctx.secret("password")?);
            let mut value = HeaderValue::from_str(&format!("Basic {}", STANDARD.encode(credentials)))
                .map_err(|_| GatewayError::auth_handler("basic_auth: invalid credentials"))?;
            value.set_sensitive(true);

            ctx.request.headers.insert(AUTHORIZATION, value);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyRequest;
    use http::Method;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_sets_basic_header() {
        let mut request = ProxyRequest::new(Method::GET, "https://api.example.com/".parse().unwrap());
        let ctx = AuthContext {
            request: &mut request,
            secret_params: HashMap::from([
                ("username".to_string(), "Aladdin".to_string()),
                ("password".to_string(), "open sesame".to_string()),
            ]),
            config_params: HashMap::new(),
        };

        BasicAuth.apply(ctx).await.unwrap();
        assert_eq!(
            request.headers.get(AUTHORIZATION).unwrap(),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
    }
}
