//! Rule and key management under `/rsec`.
//!
//! Every handler requires a token carrying the administrative claim, and
//! every mutation is persisted to the state file before the response is
//! sent. A mutation whose save fails is rolled back.
//!
//! Rules are scoped by exactly one of `dbid` (the realm's rules) or `keyid`
//! (the rules private to an access key).

use crate::auth::AuthToken;
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;
use arbordb_core::{
    AccessKey, ActionSet, CoreError, LogicalPath, RuleScope, SecurityRule, UNRANKED,
};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

/// Query parameters of the rule endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct RuleParams {
    /// Realm whose rules are addressed.
    pub dbid: Option<String>,
    /// Access key whose rules are addressed.
    pub keyid: Option<String>,
    /// Rule pattern on creation, path filter otherwise.
    pub path: Option<String>,
    /// `|`-separated action names.
    #[serde(rename = "type")]
    pub action_type: Option<String>,
    /// `1` grants, `0` denies.
    pub allow: Option<String>,
    /// Rule priority.
    pub priority: Option<String>,
    /// `1` treats `path` as a wildcard pattern.
    pub wc: Option<String>,
}

impl RuleParams {
    fn scope(&self) -> ServerResult<RuleScope> {
        let dbid = self.dbid.as_deref().filter(|s| !s.is_empty());
        let keyid = self.keyid.as_deref().filter(|s| !s.is_empty());
        match (dbid, keyid) {
            (Some(db), None) => Ok(RuleScope::Realm(db.to_string())),
            (None, Some(key)) => Ok(RuleScope::Key(key.to_string())),
            _ => Err(ServerError::InvalidRequest(
                "exactly one of dbid or keyid is required".into(),
            )),
        }
    }

    fn path_filter(&self) -> Option<LogicalPath> {
        self.path.as_deref().map(LogicalPath::parse)
    }

    fn build_rule(&self) -> ServerResult<SecurityRule> {
        let pattern = self
            .path
            .as_deref()
            .ok_or_else(|| ServerError::InvalidRequest("path is required".into()))?;
        let actions = ActionSet::parse(
            self.action_type
                .as_deref()
                .ok_or_else(|| ServerError::InvalidRequest("type is required".into()))?,
        )?;
        let allow = match self.allow.as_deref() {
            None => true,
            Some(flag) => parse_flag("allow", flag)?,
        };
        let priority = match self.priority.as_deref() {
            None | Some("") => UNRANKED,
            Some(p) => p
                .parse()
                .map_err(|_| ServerError::InvalidRequest(format!("invalid priority {p:?}")))?,
        };
        let wildcard = match self.wc.as_deref() {
            None => false,
            Some(flag) => parse_flag("wc", flag)?,
        };
        let rule = if wildcard {
            SecurityRule::from_wildcard(pattern, actions, allow, priority)?
        } else {
            SecurityRule::new(pattern, actions, allow, priority)?
        };
        Ok(rule)
    }
}

/// Query parameters of key creation.
#[derive(Debug, Default, Deserialize)]
pub struct KeyParams {
    /// The key string.
    pub keyid: Option<String>,
    /// `|`-separated realm ids.
    pub realms: Option<String>,
    /// `1` grants the administrative claim.
    pub admin: Option<String>,
}

fn parse_flag(name: &str, value: &str) -> ServerResult<bool> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(ServerError::InvalidRequest(format!(
            "invalid {name} flag {other:?}"
        ))),
    }
}

fn require_admin(app: &AppState, token: &AuthToken) -> ServerResult<()> {
    app.processor.authorize_admin(token.as_deref())?;
    Ok(())
}

/// `POST /rsec/rules`: creates a rule.
pub async fn create_rule(
    State(app): State<AppState>,
    token: AuthToken,
    Query(params): Query<RuleParams>,
) -> ServerResult<Json<SecurityRule>> {
    require_admin(&app, &token)?;
    let scope = params.scope()?;
    let rule = params.build_rule()?;
    app.commit(|state| state.add_rule(&scope, rule.clone())).await?;
    info!(%scope, rule = %rule.id(), pattern = rule.pattern(), "created security rule");
    Ok(Json(rule))
}

/// `GET /rsec/rules`: lists rules, optionally only those matching `path`.
pub async fn list_rules(
    State(app): State<AppState>,
    token: AuthToken,
    Query(params): Query<RuleParams>,
) -> ServerResult<Json<Vec<SecurityRule>>> {
    require_admin(&app, &token)?;
    let scope = params.scope()?;
    let rules = app.state.list_rules(&scope, params.path_filter().as_ref())?;
    Ok(Json(rules))
}

/// `DELETE /rsec/rules`: removes rules matching `path`, or all of them.
pub async fn remove_rules(
    State(app): State<AppState>,
    token: AuthToken,
    Query(params): Query<RuleParams>,
) -> ServerResult<Json<Value>> {
    require_admin(&app, &token)?;
    let scope = params.scope()?;
    let filter = params.path_filter();
    let removed = app
        .commit(|state| state.remove_rules(&scope, filter.as_ref()))
        .await?;
    info!(%scope, removed, "removed security rules");
    Ok(Json(json!({ "removed": removed })))
}

/// `GET /rsec/rules/{id}`: returns one rule.
pub async fn get_rule(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    token: AuthToken,
    Query(params): Query<RuleParams>,
) -> ServerResult<Json<SecurityRule>> {
    require_admin(&app, &token)?;
    let scope = params.scope()?;
    Ok(Json(app.state.get_rule(&scope, id)?))
}

/// `DELETE /rsec/rules/{id}`: removes one rule.
pub async fn remove_rule(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    token: AuthToken,
    Query(params): Query<RuleParams>,
) -> ServerResult<Json<SecurityRule>> {
    require_admin(&app, &token)?;
    let scope = params.scope()?;
    let rule = app.commit(|state| state.remove_rule(&scope, id)).await?;
    info!(%scope, rule = %id, "removed security rule");
    Ok(Json(rule))
}

/// `POST /rsec/keys`: creates an access key.
pub async fn create_key(
    State(app): State<AppState>,
    token: AuthToken,
    Query(params): Query<KeyParams>,
) -> ServerResult<Json<AccessKey>> {
    require_admin(&app, &token)?;
    let keyid = params
        .keyid
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ServerError::InvalidRequest("keyid is required".into()))?;
    let realms = params
        .realms
        .as_deref()
        .unwrap_or_default()
        .split('|')
        .map(str::trim)
        .filter(|r| !r.is_empty());
    let admin = match params.admin.as_deref() {
        None => false,
        Some(flag) => parse_flag("admin", flag)?,
    };

    let key = AccessKey::new(keyid, realms).with_admin(admin);
    app.commit(|state| state.create_key(key.clone())).await?;
    info!(key = keyid, admin, "created access key");
    Ok(Json(key))
}

/// `GET /rsec/keys/{keyid}`: returns an access key.
pub async fn get_key(
    State(app): State<AppState>,
    Path(keyid): Path<String>,
    token: AuthToken,
) -> ServerResult<Json<AccessKey>> {
    require_admin(&app, &token)?;
    app.state
        .get_key(&keyid)
        .map(Json)
        .ok_or_else(|| CoreError::not_found("key", keyid).into())
}

/// `DELETE /rsec/keys/{keyid}`: removes an access key.
pub async fn delete_key(
    State(app): State<AppState>,
    Path(keyid): Path<String>,
    token: AuthToken,
) -> ServerResult<Json<AccessKey>> {
    require_admin(&app, &token)?;
    let key = app.commit(|state| state.delete_key(&keyid)).await?;
    info!(key = %keyid, "deleted access key");
    Ok(Json(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbordb_core::DatabaseAction;

    fn rule_params(pairs: &[(&str, &str)]) -> RuleParams {
        let mut params = RuleParams::default();
        for (name, value) in pairs {
            let value = Some(value.to_string());
            match *name {
                "dbid" => params.dbid = value,
                "keyid" => params.keyid = value,
                "path" => params.path = value,
                "type" => params.action_type = value,
                "allow" => params.allow = value,
                "priority" => params.priority = value,
                "wc" => params.wc = value,
                _ => unreachable!(),
            }
        }
        params
    }

    #[test]
    fn scope_needs_exactly_one_owner() {
        assert!(matches!(
            rule_params(&[("dbid", "app")]).scope().unwrap(),
            RuleScope::Realm(_)
        ));
        assert!(matches!(
            rule_params(&[("keyid", "k")]).scope().unwrap(),
            RuleScope::Key(_)
        ));
        assert!(rule_params(&[]).scope().is_err());
        assert!(rule_params(&[("dbid", "app"), ("keyid", "k")]).scope().is_err());
    }

    #[test]
    fn build_wildcard_rule() {
        let rule = rule_params(&[
            ("path", "/users/*"),
            ("type", "Retrieve|Put"),
            ("allow", "0"),
            ("priority", "7"),
            ("wc", "1"),
        ])
        .build_rule()
        .unwrap();

        assert!(!rule.allow());
        assert_eq!(rule.priority(), 7);
        assert!(rule.actions().contains(DatabaseAction::Put));
        assert!(rule.matches_path(&LogicalPath::parse("users/ada")));
    }

    #[test]
    fn build_rule_defaults() {
        let rule = rule_params(&[("path", "^/a$"), ("type", "Retrieve")])
            .build_rule()
            .unwrap();
        assert!(rule.allow());
        assert_eq!(rule.priority(), UNRANKED);
    }

    #[test]
    fn build_rule_rejects_bad_input() {
        for params in [
            rule_params(&[("type", "Retrieve")]),
            rule_params(&[("path", "/a")]),
            rule_params(&[("path", "/a"), ("type", "Frobnicate")]),
            rule_params(&[("path", "/a"), ("type", "Put"), ("priority", "high")]),
            rule_params(&[("path", "/a"), ("type", "Put"), ("allow", "maybe")]),
            rule_params(&[("path", "("), ("type", "Put")]),
        ] {
            let err = params.build_rule().unwrap_err();
            assert!(err.is_client_error(), "{err}");
        }
    }

    #[test]
    fn flags() {
        assert!(parse_flag("x", "1").unwrap());
        assert!(!parse_flag("x", "false").unwrap());
        assert!(parse_flag("x", "yes").is_err());
    }
}
