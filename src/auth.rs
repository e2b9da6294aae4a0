//! Bearer-token identities: anonymous visitors and the single owner.
//!
//! Tokens are opaque random strings handed out once; only their SHA-256
//! digest is stored.

use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::entity::{Identity, Role};
use crate::error::{AppError, AppResult};
use crate::store::Store;

#[derive(Clone, Debug)]
pub struct Authenticator {
    store: Store,
    owner_email: Option<String>,
    owner_password: Option<String>,
}

/// A freshly issued token and who it belongs to.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
}

impl Authenticator {
    pub fn new(store: Store, owner_email: Option<String>, owner_password: Option<String>) -> Self {
        Self {
            store,
            owner_email,
            owner_password,
        }
    }

    pub fn owner_email(&self) -> Option<&str> {
        self.owner_email.as_deref()
    }

    pub fn role(&self, identity: &Identity) -> Role {
        identity.role(self.owner_email())
    }

    pub async fn issue_anonymous(&self) -> AppResult<Session> {
        let identity = Identity::anonymous(Uuid::new_v4().to_string());
        self.store.create_identity(&identity).await?;
        let token = self.issue_token(&identity).await?;
        Ok(Session { token, identity })
    }

    /// Owner login. Anything but the configured email/password pair is
    /// Unauthorized.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<Session> {
        let (Some(owner_email), Some(owner_password)) = (&self.owner_email, &self.owner_password) else {
            warn!("Login attempted but no owner credential is configured");
            return Err(AppError::Unauthorized);
        };

        if email.trim() != owner_email.as_str() || digest(password) != digest(owner_password) {
            warn!("Rejected login for {}", email);
            return Err(AppError::Unauthorized);
        }

        let identity = match self.store.find_identity_by_email(owner_email).await? {
            Some(identity) => identity,
            None => {
                let identity = Identity {
                    id: Uuid::new_v4().to_string(),
                    email: Some(owner_email.clone()),
                    display_name: None,
                };
                self.store.create_identity(&identity).await?;
                info!("Created owner identity {}", identity.id);
                identity
            }
        };

        let token = self.issue_token(&identity).await?;
        Ok(Session { token, identity })
    }

    pub async fn authenticate(&self, token: Option<&str>) -> AppResult<Identity> {
        let token = token.filter(|t| !t.is_empty()).ok_or(AppError::Unauthorized)?;
        self.store
            .identity_for_token(&digest(token))
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Authenticate and insist on the owner.
    pub async fn authenticate_owner(&self, token: Option<&str>) -> AppResult<Identity> {
        let identity = self.authenticate(token).await?;
        match self.role(&identity) {
            Role::Owner => Ok(identity),
            Role::Visitor => Err(AppError::Forbidden),
        }
    }

    pub async fn logout(&self, token: &str) -> AppResult<()> {
        self.store.delete_token(&digest(token)).await?;
        Ok(())
    }

    async fn issue_token(&self, identity: &Identity) -> AppResult<String> {
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        self.store.insert_token(&digest(&token), &identity.id).await?;
        Ok(token)
    }
}

fn digest(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}
