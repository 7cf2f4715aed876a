//! API key lifecycle: create, rotate, revoke, verify.
//!
//! The plaintext secret is returned to the caller exactly once, at creation
//! or rotation time. Revocation is terminal; a revoked key can never be
//! rotated or reactivated.

use chrono::Utc;
use uuid::Uuid;

use crate::db::CredentialStore;
use crate::error::{AppError, AppResult};
use crate::models::api_key::{DEFAULT_RATE_LIMIT_PER_DAY, DEFAULT_RATE_LIMIT_PER_MINUTE};
use crate::models::{ApiKey, ApiKeyScope, AuthenticatedCaller, KeyPrefix};
use crate::services::secrets;

/// Parse and validate a requested scope list against the whitelist.
///
/// Every unknown value is collected and named in the error.
fn parse_scopes(requested: &[String]) -> AppResult<Vec<ApiKeyScope>> {
    if requested.is_empty() {
        return Err(AppError::InvalidInput(
            "At least one scope is required".to_string(),
        ));
    }

    let mut scopes = Vec::with_capacity(requested.len());
    let mut invalid = Vec::new();
    for raw in requested {
        match ApiKeyScope::parse(raw) {
            Some(scope) => {
                if !scopes.contains(&scope) {
                    scopes.push(scope);
                }
            }
            None => invalid.push(raw.as_str()),
        }
    }

    if !invalid.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "invalid scopes: {}",
            invalid.join(", ")
        )));
    }

    Ok(scopes)
}

/// Create a new API key.
///
/// Returns the full plaintext key (shown to the caller once) and the stored
/// record. The environment's production flag decides the secret prefix.
pub async fn create_key(
    store: &dyn CredentialStore,
    organization_id: Uuid,
    environment_id: Uuid,
    name: &str,
    requested_scopes: &[String],
) -> AppResult<(String, ApiKey)> {
    if name.trim().is_empty() {
        return Err(AppError::InvalidInput("Key name is required".to_string()));
    }
    let scopes = parse_scopes(requested_scopes)?;

    let environment = store
        .find_environment(environment_id)
        .await?
        .filter(|e| e.organization_id == organization_id)
        .ok_or_else(|| AppError::NotFound(format!("Environment {}", environment_id)))?;

    let prefix = if environment.is_production {
        KeyPrefix::Live
    } else {
        KeyPrefix::Test
    };

    let full_key = secrets::api_key_secret(prefix);
    let api_key = ApiKey {
        id: Uuid::new_v4(),
        organization_id,
        environment_id,
        name: name.to_string(),
        key_prefix: prefix,
        key_hash: secrets::hash_secret(&full_key),
        key_secret_last4: secrets::last4(&full_key),
        scopes,
        rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
        rate_limit_per_day: DEFAULT_RATE_LIMIT_PER_DAY,
        is_active: true,
        created_at: Utc::now(),
        revoked_at: None,
        revoked_by: None,
    };

    store.insert_api_key(&api_key).await?;
    tracing::info!(key_id = %api_key.id, org = %organization_id, "API key created");

    Ok((full_key, api_key))
}

/// Rotate an API key: revoke the old row and issue a replacement copying its
/// prefix, scopes, and rate limits.
///
/// The revocation is a conditional update; of two concurrent rotations only
/// one wins, the other observes the terminal state.
pub async fn rotate_key(
    store: &dyn CredentialStore,
    key_id: Uuid,
    organization_id: Uuid,
) -> AppResult<(String, ApiKey)> {
    let old_key = store
        .find_api_key(key_id, organization_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("API key {}", key_id)))?;

    if old_key.is_revoked() {
        return Err(AppError::InvalidState(
            "a revoked API key cannot be rotated".to_string(),
        ));
    }

    let now = Utc::now();
    let revoked = store
        .revoke_api_key(key_id, organization_id, "rotation", now)
        .await?;
    if !revoked {
        // Lost a race with a concurrent revoke/rotate.
        return Err(AppError::InvalidState(
            "a revoked API key cannot be rotated".to_string(),
        ));
    }

    let full_key = secrets::api_key_secret(old_key.key_prefix);
    let new_key = ApiKey {
        id: Uuid::new_v4(),
        organization_id,
        environment_id: old_key.environment_id,
        name: format!("{} (Rotated)", old_key.name),
        key_prefix: old_key.key_prefix,
        key_hash: secrets::hash_secret(&full_key),
        key_secret_last4: secrets::last4(&full_key),
        scopes: old_key.scopes.clone(),
        rate_limit_per_minute: old_key.rate_limit_per_minute,
        rate_limit_per_day: old_key.rate_limit_per_day,
        is_active: true,
        created_at: now,
        revoked_at: None,
        revoked_by: None,
    };
    store.insert_api_key(&new_key).await?;
    tracing::info!(old_key = %key_id, new_key = %new_key.id, "API key rotated");

    Ok((full_key, new_key))
}

/// Revoke an API key. Revoking an already-revoked key is rejected with
/// `InvalidState`, not silently accepted.
pub async fn revoke_key(
    store: &dyn CredentialStore,
    key_id: Uuid,
    organization_id: Uuid,
    revoked_by: &str,
) -> AppResult<()> {
    let key = store
        .find_api_key(key_id, organization_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("API key {}", key_id)))?;

    if key.is_revoked() {
        return Err(AppError::InvalidState(
            "API key is already revoked".to_string(),
        ));
    }

    let revoked = store
        .revoke_api_key(key_id, organization_id, revoked_by, Utc::now())
        .await?;
    if !revoked {
        return Err(AppError::InvalidState(
            "API key is already revoked".to_string(),
        ));
    }

    tracing::info!(key_id = %key_id, revoked_by = revoked_by, "API key revoked");
    Ok(())
}

/// Verify a presented API key and return the authenticated caller.
pub async fn verify_key(
    store: &dyn CredentialStore,
    presented: &str,
) -> AppResult<AuthenticatedCaller> {
    let key_hash = secrets::hash_secret(presented);

    let api_key = store
        .find_api_key_by_hash(&key_hash)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid API key".to_string()))?;

    if api_key.is_revoked() || !api_key.is_active {
        return Err(AppError::Unauthorized(
            "API key has been revoked".to_string(),
        ));
    }

    Ok(AuthenticatedCaller {
        key_id: api_key.id,
        organization_id: api_key.organization_id,
        name: api_key.name,
        scopes: api_key.scopes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::{Organization, TenantEnvironment};

    async fn seed_tenant(store: &MemoryStore, is_production: bool) -> (Uuid, Uuid) {
        let org = Organization {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
            slug: "acme-1a2b".to_string(),
            created_at: Utc::now(),
        };
        let env = TenantEnvironment {
            id: Uuid::new_v4(),
            organization_id: org.id,
            name: if is_production { "production" } else { "sandbox" }.to_string(),
            is_production,
            created_at: Utc::now(),
        };
        store.insert_organization(&org).await.unwrap();
        store.insert_environment(&env).await.unwrap();
        (org.id, env.id)
    }

    fn scope_strings(scopes: &[&str]) -> Vec<String> {
        scopes.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_key_live_prefix() {
        let store = MemoryStore::new();
        let (org, env) = seed_tenant(&store, true).await;

        let (full_key, api_key) =
            create_key(&store, org, env, "CI", &scope_strings(&["verify", "audit"]))
                .await
                .unwrap();

        assert!(full_key.starts_with("fus_live_"));
        assert_eq!(api_key.key_prefix, KeyPrefix::Live);
        assert_eq!(api_key.key_hash, secrets::hash_secret(&full_key));
        assert!(full_key.ends_with(&api_key.key_secret_last4));
        assert_eq!(
            api_key.scopes,
            vec![ApiKeyScope::Verify, ApiKeyScope::Audit]
        );
        assert_eq!(api_key.rate_limit_per_minute, 60);
        assert_eq!(api_key.rate_limit_per_day, 10_000);
    }

    #[tokio::test]
    async fn test_create_key_test_prefix() {
        let store = MemoryStore::new();
        let (org, env) = seed_tenant(&store, false).await;

        let (full_key, _) = create_key(&store, org, env, "CI", &scope_strings(&["verify"]))
            .await
            .unwrap();
        assert!(full_key.starts_with("fus_test_"));
    }

    #[tokio::test]
    async fn test_create_key_rejects_unknown_scope_by_name() {
        let store = MemoryStore::new();
        let (org, env) = seed_tenant(&store, false).await;

        let err = create_key(
            &store,
            org,
            env,
            "CI",
            &scope_strings(&["verify", "delete_everything"]),
        )
        .await
        .unwrap_err();

        match err {
            AppError::InvalidInput(msg) => assert!(msg.contains("delete_everything")),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_key_unknown_environment() {
        let store = MemoryStore::new();
        let (org, _) = seed_tenant(&store, false).await;

        let err = create_key(&store, org, Uuid::new_v4(), "CI", &scope_strings(&["verify"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_key_environment_org_mismatch() {
        let store = MemoryStore::new();
        let (_, env) = seed_tenant(&store, false).await;

        let err = create_key(&store, Uuid::new_v4(), env, "CI", &scope_strings(&["verify"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rotate_copies_scopes_and_terminalizes_old() {
        let store = MemoryStore::new();
        let (org, env) = seed_tenant(&store, true).await;
        let (_, old) = create_key(
            &store,
            org,
            env,
            "CI",
            &scope_strings(&["verify", "webhook_manage"]),
        )
        .await
        .unwrap();

        let (new_full, new_key) = rotate_key(&store, old.id, org).await.unwrap();

        assert!(new_full.starts_with("fus_live_"));
        assert_eq!(new_key.scopes, old.scopes);
        assert_eq!(new_key.rate_limit_per_minute, old.rate_limit_per_minute);
        assert_eq!(new_key.name, "CI (Rotated)");

        let old_after = store.find_api_key(old.id, org).await.unwrap().unwrap();
        assert!(!old_after.is_active);
        assert!(old_after.revoked_at.is_some());

        // Second rotation of the now-revoked key fails.
        let err = rotate_key(&store, old.id, org).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_rotate_missing_key() {
        let store = MemoryStore::new();
        let (org, _) = seed_tenant(&store, false).await;
        let err = rotate_key(&store, Uuid::new_v4(), org).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_revoke_is_one_way_and_rejects_repeat() {
        let store = MemoryStore::new();
        let (org, env) = seed_tenant(&store, false).await;
        let (_, key) = create_key(&store, org, env, "CI", &scope_strings(&["audit"]))
            .await
            .unwrap();

        revoke_key(&store, key.id, org, "ops@acme.io").await.unwrap();

        let after = store.find_api_key(key.id, org).await.unwrap().unwrap();
        assert!(!after.is_active);
        assert_eq!(after.revoked_by.as_deref(), Some("ops@acme.io"));

        let err = revoke_key(&store, key.id, org, "ops@acme.io")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_revoke_org_mismatch_is_not_found() {
        let store = MemoryStore::new();
        let (org, env) = seed_tenant(&store, false).await;
        let (_, key) = create_key(&store, org, env, "CI", &scope_strings(&["audit"]))
            .await
            .unwrap();

        let err = revoke_key(&store, key.id, Uuid::new_v4(), "ops")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_verify_round_trip_and_revocation() {
        let store = MemoryStore::new();
        let (org, env) = seed_tenant(&store, false).await;
        let (full_key, key) = create_key(&store, org, env, "CI", &scope_strings(&["verify"]))
            .await
            .unwrap();

        let caller = verify_key(&store, &full_key).await.unwrap();
        assert_eq!(caller.key_id, key.id);
        assert!(caller.has_scope(ApiKeyScope::Verify));

        assert!(matches!(
            verify_key(&store, "fus_test_bogus").await.unwrap_err(),
            AppError::Unauthorized(_)
        ));

        revoke_key(&store, key.id, org, "ops").await.unwrap();
        assert!(matches!(
            verify_key(&store, &full_key).await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
    }
}
