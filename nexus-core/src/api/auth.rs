//! Bearer authentication: API keys looked up by a non-secret prefix and
//! verified by constant-time HMAC comparison, or HS256 JWTs (spec.md §6
//! "Authentication headers"). Both paths resolve to an [`IdentitySubject`]
//! the rest of the request pipeline carries in an [`OperationContext`].

use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, DecodingKey, Validation};
use rand::RngCore;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::db::{entities, MetadataStore};
use crate::error::{NexusError, NexusResult};
use crate::model::{Entity, IdentitySubject};

type HmacSha256 = Hmac<Sha256>;

fn hmac_hex(secret: &[u8], message: &str) -> String {
	let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
	mac.update(message.as_bytes());
	hex::encode(mac.finalize().into_bytes())
}

/// Mint a new API key for `(tenant_id, subject_id)`. Returns the raw secret
/// (shown to the caller exactly once) and the row to persist — only the
/// prefix and HMAC digest are ever stored (spec.md §6 "API keys encode a
/// prefix `sk-<tenant>_<subject>_<random>_<hmac>`").
pub fn issue_api_key(
	secret: &[u8],
	tenant_id: &str,
	subject_type: &str,
	subject_id: &str,
	scopes: Vec<String>,
) -> (String, entities::api_key::ActiveModel) {
	let mut random_bytes = [0u8; 16];
	rand::thread_rng().fill_bytes(&mut random_bytes);
	let random = hex::encode(random_bytes);

	let prefix = format!("sk-{tenant_id}_{subject_id}_");
	let message = format!("{prefix}{random}");
	let digest = hmac_hex(secret, &message);
	let raw_key = format!("{message}_{digest}");

	let am = entities::api_key::ActiveModel {
		key_id: Set(uuid::Uuid::new_v4().to_string()),
		tenant_id: Set(tenant_id.to_string()),
		subject_type: Set(subject_type.to_string()),
		subject_id: Set(subject_id.to_string()),
		prefix: Set(prefix),
		hmac_digest: Set(digest),
		scopes: Set(serde_json::to_value(&scopes).unwrap_or(serde_json::Value::Null)),
		created_at: Set(chrono::Utc::now()),
		revoked_at: Set(None),
	};
	(raw_key, am)
}

/// Verify a raw `sk-...` key against the store, returning the subject it
/// authenticates as. Extracts `(tenant, subject)` from the key text itself
/// (no DB lookup needed for that), then validates the HMAC in constant time.
pub async fn verify_api_key(store: &MetadataStore, secret: &[u8], raw_key: &str) -> NexusResult<IdentitySubject> {
	let (message, _presented_digest) = raw_key
		.rsplit_once('_')
		.ok_or_else(|| NexusError::Unauthenticated)?;

	let without_scheme = message.strip_prefix("sk-").ok_or(NexusError::Unauthenticated)?;
	let mut parts = without_scheme.splitn(3, '_');
	let tenant_id = parts.next().ok_or(NexusError::Unauthenticated)?;
	let subject_id = parts.next().ok_or(NexusError::Unauthenticated)?;
	parts.next().ok_or(NexusError::Unauthenticated)?; // random component, unused beyond the HMAC input

	let prefix = format!("sk-{tenant_id}_{subject_id}_");
	let row = store
		.find_api_key_by_prefix(&prefix)
		.await?
		.ok_or(NexusError::Unauthenticated)?;

	if row.revoked_at.is_some() {
		return Err(NexusError::Unauthenticated);
	}

	let expected = hmac_hex(secret, message);
	if expected.as_bytes().ct_eq(row.hmac_digest.as_bytes()).unwrap_u8() != 1 {
		return Err(NexusError::Unauthenticated);
	}

	let scopes: Vec<String> = serde_json::from_value(row.scopes).unwrap_or_default();
	Ok(IdentitySubject::new(Entity::new(row.subject_type, row.subject_id), row.tenant_id).with_scopes(scopes))
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
	sub: String,
	tenant_id: String,
	#[serde(default)]
	scopes: Vec<String>,
	#[serde(default)]
	admin: bool,
	exp: usize,
}

/// Verify an HS256 JWT against the process secret.
pub fn verify_jwt(secret: &[u8], token: &str) -> NexusResult<IdentitySubject> {
	let data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &Validation::new(jsonwebtoken::Algorithm::HS256))
		.map_err(|_| NexusError::Unauthenticated)?;
	let claims = data.claims;
	let entity: Entity = claims.sub.parse()?;
	let mut subject = IdentitySubject::new(entity, claims.tenant_id).with_scopes(claims.scopes);
	if claims.admin {
		subject = subject.admin();
	}
	Ok(subject)
}

/// Authenticate an inbound request from its `Authorization: Bearer ...` (or
/// `X-Nexus-API-Key`) header value. Tries the API-key format first since its
/// `sk-` scheme is unambiguous, then falls back to JWT.
pub async fn authenticate(store: &MetadataStore, jwt_secret: &[u8], credential: &str) -> NexusResult<IdentitySubject> {
	if credential.starts_with("sk-") {
		verify_api_key(store, jwt_secret, credential).await
	} else {
		verify_jwt(jwt_secret, credential)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::db::{StoreConfig, WriterRole};

	async fn store() -> MetadataStore {
		let store = MetadataStore::connect(StoreConfig {
			url: "sqlite::memory:".to_string(),
			role: WriterRole::Single,
			max_connections: 1,
		})
		.await
		.unwrap();
		store.migrate().await.unwrap();
		store
	}

	#[tokio::test]
	async fn issued_key_round_trips_through_verify() {
		let store = store().await;
		let secret = b"test-secret";
		let (raw, am) = issue_api_key(secret, "t1", "user", "bob", vec!["fs.read".to_string()]);
		store.insert_api_key(am).await.unwrap();

		let subject = verify_api_key(&store, secret, &raw).await.unwrap();
		assert_eq!(subject.tenant_id, "t1");
		assert_eq!(subject.entity, Entity::new("user", "bob"));
		assert!(subject.has_scope("fs.read"));
	}

	#[tokio::test]
	async fn tampered_key_is_rejected() {
		let store = store().await;
		let secret = b"test-secret";
		let (raw, am) = issue_api_key(secret, "t1", "user", "bob", vec![]);
		store.insert_api_key(am).await.unwrap();

		let mut tampered = raw.clone();
		tampered.push('x');
		assert!(verify_api_key(&store, secret, &tampered).await.is_err());
	}

	#[tokio::test]
	async fn revoked_key_is_rejected() {
		let store = store().await;
		let secret = b"test-secret";
		let (raw, mut am) = issue_api_key(secret, "t1", "user", "bob", vec![]);
		am.revoked_at = Set(Some(chrono::Utc::now()));
		store.insert_api_key(am).await.unwrap();

		assert!(verify_api_key(&store, secret, &raw).await.is_err());
	}
}
