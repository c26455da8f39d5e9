//! Request parsing and authorization.

use crate::access::{Claim, Identity, IdentityResolver};
use crate::action::DatabaseAction;
use crate::error::{CoreError, CoreResult};
use crate::path::LogicalPath;
use crate::security::RuleOutcome;
use crate::state::ServiceState;
use std::sync::Arc;
use tracing::{debug, warn};

/// Suffix every data path must carry.
pub const PATH_SUFFIX: &str = ".json";

/// Authorization status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    /// Not yet decided.
    #[default]
    Unknown,
    /// The caller may perform the action.
    Granted,
    /// The caller may not perform the action.
    Denied,
}

/// A parsed data request.
///
/// Built once by [`DatabaseRequest::parse`], decided once by
/// [`RequestProcessor::authorize`], and read-only afterwards.
#[derive(Debug, Clone)]
pub struct DatabaseRequest {
    database_id: String,
    path: LogicalPath,
    action: DatabaseAction,
    auth_token: Option<String>,
    permission: PermissionState,
    invalid_reason: Option<String>,
}

impl DatabaseRequest {
    /// Parses a request for `raw_path` (e.g. `users/ada.json`) in realm
    /// `database_id`.
    ///
    /// Parsing never fails: a malformed request is returned with
    /// [`is_valid`](Self::is_valid) false.
    #[must_use]
    pub fn parse(
        database_id: &str,
        raw_path: &str,
        action: DatabaseAction,
        auth_token: Option<String>,
    ) -> Self {
        let invalid_reason = if !is_valid_database_id(database_id) {
            Some(format!("invalid database id {database_id:?}"))
        } else if !raw_path.ends_with(PATH_SUFFIX) {
            Some(format!("path must end with {PATH_SUFFIX}"))
        } else {
            None
        };
        let path = raw_path
            .strip_suffix(PATH_SUFFIX)
            .map(LogicalPath::parse)
            .unwrap_or_default();
        Self {
            database_id: database_id.to_string(),
            path,
            action,
            auth_token,
            permission: PermissionState::Unknown,
            invalid_reason,
        }
    }

    /// Builds an already granted request for in-process callers such as
    /// maintenance tools.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRequest`] for a malformed database id.
    pub fn trusted(
        database_id: &str,
        path: LogicalPath,
        action: DatabaseAction,
    ) -> CoreResult<Self> {
        if !is_valid_database_id(database_id) {
            return Err(CoreError::invalid_request(format!(
                "invalid database id {database_id:?}"
            )));
        }
        Ok(Self {
            database_id: database_id.to_string(),
            path,
            action,
            auth_token: None,
            permission: PermissionState::Granted,
            invalid_reason: None,
        })
    }

    /// Returns the realm.
    #[must_use]
    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    /// Returns the target path.
    #[must_use]
    pub fn path(&self) -> &LogicalPath {
        &self.path
    }

    /// Returns the action.
    #[must_use]
    pub fn action(&self) -> DatabaseAction {
        self.action
    }

    /// Returns the presented token.
    #[must_use]
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Returns the authorization status.
    #[must_use]
    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    /// Returns true if the request parsed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.invalid_reason.is_none()
    }

    /// Returns why the request did not parse.
    #[must_use]
    pub fn invalid_reason(&self) -> Option<&str> {
        self.invalid_reason.as_deref()
    }

    /// Fails unless the request is valid and granted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRequest`] for a malformed request and
    /// [`CoreError::Unauthorized`] for one that was not granted.
    pub fn ensure_permitted(&self) -> CoreResult<()> {
        if let Some(reason) = &self.invalid_reason {
            return Err(CoreError::invalid_request(reason.as_str()));
        }
        match self.permission {
            PermissionState::Granted => Ok(()),
            PermissionState::Denied => Err(CoreError::unauthorized("access denied")),
            PermissionState::Unknown => Err(CoreError::unauthorized("request was not authorized")),
        }
    }
}

fn is_valid_database_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Decides data requests against access keys and security rules.
///
/// The decision order is:
///
/// 1. the token must resolve to an identity and an access key;
/// 2. the key must be allowed into the realm;
/// 3. the key's private rules, then the realm's rules, are evaluated and the
///    first collection with a matching rule decides; a grant allows the
///    request;
/// 4. otherwise an identity holding [`Claim::Admin`] is allowed;
/// 5. everything else is denied.
#[derive(Clone)]
pub struct RequestProcessor {
    resolver: Arc<dyn IdentityResolver>,
    state: Arc<ServiceState>,
}

impl RequestProcessor {
    /// Creates a processor resolving tokens against the keys in `state`.
    #[must_use]
    pub fn new(state: Arc<ServiceState>) -> Self {
        Self {
            resolver: Arc::clone(&state) as Arc<dyn IdentityResolver>,
            state,
        }
    }

    /// Creates a processor with a separate token resolver.
    #[must_use]
    pub fn with_resolver(resolver: Arc<dyn IdentityResolver>, state: Arc<ServiceState>) -> Self {
        Self { resolver, state }
    }

    /// Parses and authorizes a request.
    #[must_use]
    pub fn process(
        &self,
        database_id: &str,
        raw_path: &str,
        action: DatabaseAction,
        auth_token: Option<String>,
    ) -> DatabaseRequest {
        self.authorize(DatabaseRequest::parse(
            database_id,
            raw_path,
            action,
            auth_token,
        ))
    }

    /// Decides a parsed request. Invalid requests are returned undecided.
    #[must_use]
    pub fn authorize(&self, mut request: DatabaseRequest) -> DatabaseRequest {
        if !request.is_valid() || request.permission != PermissionState::Unknown {
            return request;
        }
        request.permission = match self.decide(&request) {
            Ok(()) => PermissionState::Granted,
            Err(reason) => {
                warn!(
                    realm = %request.database_id,
                    path = %request.path,
                    action = %request.action,
                    reason,
                    "request denied"
                );
                PermissionState::Denied
            }
        };
        request
    }

    fn decide(&self, request: &DatabaseRequest) -> Result<(), &'static str> {
        let token = request.auth_token().ok_or("missing token")?;
        let identity = self
            .resolver
            .resolve_identity(token)
            .ok_or("unknown token")?;
        let key = self.resolver.resolve_key(token).ok_or("unknown key")?;
        if !key.allows_realm(&request.database_id) {
            return Err("realm not allowed");
        }

        let outcome = match key.security_rules.evaluate(&request.path, request.action) {
            RuleOutcome::NoMatch => {
                self.state
                    .evaluate_realm(&request.database_id, &request.path, request.action)
            }
            decided => decided,
        };
        if outcome == RuleOutcome::Granted {
            debug!(realm = %request.database_id, path = %request.path, "granted by rule");
            return Ok(());
        }
        if identity.has_claim(Claim::Admin) {
            debug!(realm = %request.database_id, path = %request.path, "granted by admin claim");
            return Ok(());
        }
        Err(match outcome {
            RuleOutcome::Denied => "denied by rule",
            _ => "no rule grants access",
        })
    }

    /// Resolves a token that must carry the administrative claim.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Unauthorized`] if the token is missing, unknown or
    /// not an administrator.
    pub fn authorize_admin(&self, token: Option<&str>) -> CoreResult<Identity> {
        let identity = token
            .and_then(|token| self.resolver.resolve_identity(token))
            .filter(|identity| identity.has_claim(Claim::Admin));
        identity.ok_or_else(|| {
            warn!("administrative request denied");
            CoreError::unauthorized("administrative access required")
        })
    }
}

impl std::fmt::Debug for RequestProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestProcessor").finish_non_exhaustive()
    }
}
