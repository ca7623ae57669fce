use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, DecodingKey, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Mints HS256 test tokens against a fixed secret, for driving a
/// [`TestApp`](crate::TestApp) through authenticated routes without standing
/// up a real OIDC server.
///
/// Pair with `JwtClaimsValidator::new_with_static_key(TestJwt::decoding_key(...), ..)`
/// on the application side so the same secret verifies what this mints.
#[derive(Clone)]
pub struct TestJwt {
    secret: String,
}

impl TestJwt {
    /// Create a minter using the given HMAC secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// The decoding key a `JwtClaimsValidator` should be constructed with to
    /// verify tokens minted by this `TestJwt`.
    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.secret.as_bytes())
    }

    /// Start building a token for the given subject.
    pub fn token_for(&self, sub: impl Into<String>) -> TokenBuilder<'_> {
        TokenBuilder {
            jwt: self,
            sub: sub.into(),
            claims: Map::new(),
            roles: Vec::new(),
            ttl_secs: 3600,
        }
    }
}

/// Fluent builder for a single test JWT.
pub struct TokenBuilder<'a> {
    jwt: &'a TestJwt,
    sub: String,
    claims: Map<String, Value>,
    roles: Vec<String>,
    ttl_secs: i64,
}

impl<'a> TokenBuilder<'a> {
    /// Attach a `tenant_id` claim — every ragflow route is tenant-scoped.
    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.claims
            .insert("tenant_id".into(), Value::String(tenant_id.into()));
        self
    }

    /// Attach a `role` claim (e.g. `"ADMIN"`, `"USER"`, `"READER"`).
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.claims
            .insert("role".into(), Value::String(role.into()));
        self
    }

    /// Attach standard OIDC `roles` array claim, read by the default role extractor.
    pub fn roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Set an arbitrary additional claim.
    pub fn claim(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.claims.insert(key.into(), value.into());
        self
    }

    /// Override the default one-hour expiry.
    pub fn expires_in(mut self, secs: i64) -> Self {
        self.ttl_secs = secs;
        self
    }

    /// Sign and return the compact JWT string.
    pub fn sign(self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before epoch")
            .as_secs() as i64;

        let mut body = json!({
            "sub": self.sub,
            "iss": "ragflow-test",
            "aud": "ragflow",
            "iat": now,
            "exp": now + self.ttl_secs,
            "roles": self.roles,
        });

        if let Value::Object(map) = &mut body {
            for (k, v) in self.claims {
                map.insert(k, v);
            }
        }

        encode(
            &Header::default(),
            &body,
            &EncodingKey::from_secret(self.jwt.secret.as_bytes()),
        )
        .expect("failed to sign test JWT")
    }
}
