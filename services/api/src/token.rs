//! Session Broker
//!
//! Issues the short-lived capability token a client needs to attach to one
//! realtime room. The token is an HS256 JWT in the LiveKit access-token
//! shape: a `video` grant scoped to exactly the issued room, and the target
//! agent id carried once in the token's `metadata` so the remote agent
//! process can load the right knowledge record without a side channel.
//! Grants are not stored server-side; they expire passively via `exp`.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Signing credentials are unconfigured. Issuance fails closed; an
    /// unsigned or unscoped token is never produced.
    #[error("LiveKit signing credentials are not configured")]
    MissingCredentials,
    #[error("failed to sign access token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("failed to serialize token metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Room permissions embedded in the token. The grant authorizes exactly one
/// room, never the holder's account in general.
#[derive(Debug, Serialize, Deserialize)]
pub struct VideoGrant {
    pub room: String,
    #[serde(rename = "roomJoin")]
    pub room_join: bool,
    #[serde(rename = "canPublish")]
    pub can_publish: bool,
    #[serde(rename = "canSubscribe")]
    pub can_subscribe: bool,
}

/// JWT claims in the shape LiveKit servers verify.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// API key identifying the signing pair.
    pub iss: String,
    /// Participant identity.
    pub sub: String,
    pub nbf: i64,
    pub exp: i64,
    /// Serialized `{"agentId": ...}` object.
    pub metadata: String,
    pub video: VideoGrant,
}

/// One issued realtime-session capability.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub token: String,
    pub room_name: String,
    pub agent_id: String,
}

/// Issues session grants from a server-held signing pair.
#[derive(Clone)]
pub struct SessionBroker {
    api_key: Option<String>,
    api_secret: Option<String>,
    ttl: Duration,
    default_agent_id: String,
}

impl SessionBroker {
    pub fn new(
        api_key: Option<String>,
        api_secret: Option<String>,
        ttl: Duration,
        default_agent_id: impl Into<String>,
    ) -> Self {
        Self {
            api_key,
            api_secret,
            ttl,
            default_agent_id: default_agent_id.into(),
        }
    }

    /// Issues a grant bound to `agent_id`, or to the configured default
    /// when none is given. The id is not validated against the knowledge
    /// store; binding it to a record is the downstream agent's concern.
    pub fn issue(&self, agent_id: Option<&str>) -> Result<SessionGrant, TokenError> {
        let (key, secret) = match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) => (key, secret),
            _ => return Err(TokenError::MissingCredentials),
        };

        let agent_id = match agent_id {
            Some(id) if !id.is_empty() => id,
            _ => self.default_agent_id.as_str(),
        };

        let mut rng = rand::rng();
        // Millisecond timestamps alone leave a collision window under
        // concurrent session starts for the same agent; the random suffix
        // closes it.
        let room_name = format!(
            "exam-{agent_id}-{}-{:04x}",
            Utc::now().timestamp_millis(),
            rng.random::<u16>()
        );
        let identity = format!("student-{}", rng.random_range(0..10_000));

        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: key.clone(),
            sub: identity,
            nbf: now,
            exp: now + self.ttl.as_secs() as i64,
            metadata: serde_json::to_string(&serde_json::json!({ "agentId": agent_id }))?,
            video: VideoGrant {
                room: room_name.clone(),
                room_join: true,
                can_publish: true,
                can_subscribe: true,
            },
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;

        Ok(SessionGrant {
            token,
            room_name,
            agent_id: agent_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

    fn broker() -> SessionBroker {
        SessionBroker::new(
            Some("APIkey".to_string()),
            Some("super-secret".to_string()),
            Duration::from_secs(600),
            "default",
        )
    }

    fn decode_claims(token: &str) -> Claims {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(b"super-secret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap()
        .claims
    }

    #[test]
    fn missing_credentials_fail_closed() {
        let broker = SessionBroker::new(None, None, Duration::from_secs(600), "default");
        assert!(matches!(
            broker.issue(Some("bio")),
            Err(TokenError::MissingCredentials)
        ));

        let half = SessionBroker::new(
            Some("APIkey".to_string()),
            None,
            Duration::from_secs(600),
            "default",
        );
        assert!(matches!(
            half.issue(Some("bio")),
            Err(TokenError::MissingCredentials)
        ));
    }

    #[test]
    fn two_grants_for_one_agent_never_collide() {
        let broker = broker();
        let a = broker.issue(Some("bio")).unwrap();
        let b = broker.issue(Some("bio")).unwrap();

        assert_ne!(a.room_name, b.room_name);
        assert_ne!(a.token, b.token);
        for grant in [&a, &b] {
            assert!(grant.room_name.starts_with("exam-bio-"));
            let claims = decode_claims(&grant.token);
            let metadata: serde_json::Value = serde_json::from_str(&claims.metadata).unwrap();
            assert_eq!(metadata["agentId"], "bio");
        }
    }

    #[test]
    fn grant_is_scoped_to_exactly_its_room() {
        let broker = broker();
        let grant = broker.issue(Some("history-101")).unwrap();
        let claims = decode_claims(&grant.token);

        assert_eq!(claims.video.room, grant.room_name);
        assert!(claims.video.room_join);
        assert!(claims.video.can_publish);
        assert!(claims.video.can_subscribe);
        assert_eq!(claims.iss, "APIkey");
        assert!(claims.sub.starts_with("student-"));
    }

    #[test]
    fn ttl_bounds_the_validity_window() {
        let broker = SessionBroker::new(
            Some("APIkey".to_string()),
            Some("super-secret".to_string()),
            Duration::from_secs(90),
            "default",
        );
        let grant = broker.issue(None).unwrap();
        let claims = decode_claims(&grant.token);
        assert_eq!(claims.exp - claims.nbf, 90);
    }

    #[test]
    fn absent_agent_id_falls_back_to_default() {
        let broker = broker();
        for grant in [broker.issue(None).unwrap(), broker.issue(Some("")).unwrap()] {
            assert_eq!(grant.agent_id, "default");
            let claims = decode_claims(&grant.token);
            let metadata: serde_json::Value = serde_json::from_str(&claims.metadata).unwrap();
            assert_eq!(metadata["agentId"], "default");
        }
    }
}
