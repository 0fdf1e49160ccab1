use crate::config::ServerConfig;
use crate::proto;
use crate::types::ProtoDeserializable;

/// Who is calling, and which quota class the call is charged to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user: String,
    pub credential: String,
    /// Never empty; an empty wire value becomes the default class.
    pub quota: String,
}

impl AuthContext {
    #[must_use]
    pub fn new(user: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            credential: credential.into(),
            quota: ServerConfig::DEFAULT_QUOTA.to_owned(),
        }
    }

    #[must_use]
    pub fn with_quota(mut self, quota: impl Into<String>) -> Self {
        self.quota = quota.into();
        self
    }
}

impl ProtoDeserializable<proto::AuthContext> for AuthContext {
    fn from_proto(auth: proto::AuthContext) -> Result<Self, String> {
        if auth.user.is_empty() {
            return Err("auth context must name a user".to_owned());
        }
        let quota = if auth.quota.is_empty() {
            ServerConfig::DEFAULT_QUOTA.to_owned()
        } else {
            auth.quota
        };
        Ok(Self {
            user: auth.user,
            credential: auth.credential,
            quota,
        })
    }
}

impl From<&AuthContext> for proto::AuthContext {
    fn from(auth: &AuthContext) -> Self {
        Self {
            user: auth.user.clone(),
            credential: auth.credential.clone(),
            quota: auth.quota.clone(),
        }
    }
}
