use crate::db::models::user_models::UserRole;
use crate::error::Error;
use crate::config::SecurityConfig;
use anyhow::Result;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User name
    pub name: String,
    /// User role
    pub role: String,
    /// Assigned sites (supervisors)
    #[serde(default)]
    pub sites: Vec<Uuid>,
    /// Guard record of the account (guards)
    #[serde(default)]
    pub guard_id: Option<Uuid>,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

impl Claims {
    /// Get the user ID from the claims
    pub fn user_id(&self) -> Result<uuid::Uuid, uuid::Error> {
        uuid::Uuid::parse_str(&self.sub)
    }
}

/// Authenticated caller and its access scope.
///
/// Admins reach every site, supervisors their assigned sites, guards only
/// themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub user_id: Uuid,
    pub name: String,
    pub role: UserRole,
    pub sites: Vec<Uuid>,
    pub guard_id: Option<Uuid>,
}

impl Actor {
    pub fn from_claims(claims: &Claims) -> Result<Self, Error> {
        let user_id = claims
            .user_id()
            .map_err(|e| Error::Authentication(format!("Invalid user ID in token: {}", e)))?;
        let role = UserRole::parse(&claims.role)
            .ok_or_else(|| Error::Authentication(format!("Unknown role: {}", claims.role)))?;

        Ok(Self {
            user_id,
            name: claims.name.clone(),
            role,
            sites: claims.sites.clone(),
            guard_id: claims.guard_id,
        })
    }

    pub fn is_elevated(&self) -> bool {
        self.role.is_elevated()
    }

    pub fn can_access_site(&self, site_id: Uuid) -> bool {
        match self.role {
            UserRole::Admin => true,
            UserRole::Supervisor => self.sites.contains(&site_id),
            UserRole::Guard => false,
        }
    }

    /// Site filter for listings; `None` means every site
    pub fn site_filter(&self) -> Option<&[Uuid]> {
        match self.role {
            UserRole::Admin => None,
            _ => Some(&self.sites),
        }
    }

    pub fn ensure_elevated(&self) -> Result<(), Error> {
        if self.is_elevated() {
            Ok(())
        } else {
            Err(Error::Authorization(format!(
                "Role {} may not perform this action",
                self.role.as_str()
            )))
        }
    }

    /// Elevated role with scope over the site
    pub fn ensure_site(&self, site_id: Uuid) -> Result<(), Error> {
        if self.can_access_site(site_id) {
            Ok(())
        } else {
            Err(Error::Authorization(format!("No access to site {}", site_id)))
        }
    }

    /// Guards may only act for themselves; elevated roles may act for a guard
    /// at a site in their scope.
    pub fn ensure_acts_for(&self, guard_id: Uuid, site_id: Option<Uuid>) -> Result<(), Error> {
        match self.role {
            UserRole::Guard if self.guard_id == Some(guard_id) => Ok(()),
            UserRole::Guard => Err(Error::Authorization(
                "Guards may only act for themselves".to_string(),
            )),
            UserRole::Admin => Ok(()),
            UserRole::Supervisor => match site_id {
                Some(site_id) => self.ensure_site(site_id),
                None => Err(Error::Authorization(format!(
                    "Guard {} has no site in your scope",
                    guard_id
                ))),
            },
        }
    }
}

/// Signs and validates bearer tokens
pub struct SecurityService {
    config: SecurityConfig,
}

impl SecurityService {
    /// Create a new security service
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }

    /// Sign claims with the configured secret
    pub fn encode_claims(&self, claims: &Claims) -> Result<String> {
        let token = encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| Error::Authentication(format!("Failed to generate JWT token: {}", e)))?;

        Ok(token)
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| Error::Authentication(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }

    /// Validate a token and resolve the caller
    pub fn authenticate(&self, token: &str) -> Result<Actor> {
        let claims = self.validate_token(token)?;
        Ok(Actor::from_claims(&claims)?)
    }
}
