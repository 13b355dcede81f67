use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::debug;

use shared_models::auth::{JwtClaims, Role, User};

type HmacSha256 = Hmac<Sha256>;

/// Issue a signed HS256 token for a staff member.
pub fn sign_token(user: &User, jwt_secret: &str, ttl_hours: i64) -> Result<String, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let now = Utc::now();
    let exp = now + Duration::hours(ttl_hours);

    let header = json!({
        "alg": "HS256",
        "typ": "JWT"
    });
    let claims = json!({
        "sub": user.id,
        "username": user.username,
        "role": user.role,
        "name": user.name,
        "email": user.email,
        "iat": now.timestamp(),
        "exp": exp.timestamp()
    });

    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();

    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    // Split token into parts
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let header_b64 = parts[0];
    let claims_b64 = parts[1];
    let signature_b64 = parts[2];

    let signature = match URL_SAFE_NO_PAD.decode(signature_b64) {
        Ok(sig) => sig,
        Err(e) => {
            debug!("Failed to decode signature: {}", e);
            return Err("Invalid signature encoding".to_string());
        }
    };

    let signature_string = format!("{}.{}", header_b64, claims_b64);

    let mut mac = match HmacSha256::new_from_slice(jwt_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return Err("Failed to create HMAC".to_string()),
    };

    mac.update(signature_string.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    // Decode claims
    let claims_json = match URL_SAFE_NO_PAD.decode(claims_b64) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(json_str) => json_str,
            Err(_) => return Err("Invalid claims encoding".to_string()),
        },
        Err(_) => return Err("Invalid claims encoding".to_string()),
    };

    let claims: JwtClaims = match serde_json::from_str(&claims_json) {
        Ok(c) => c,
        Err(e) => {
            debug!("Failed to parse claims: {}", e);
            return Err("Invalid claims format".to_string());
        },
    };

    // Check expiration
    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp() as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    let user = User {
        id: claims.sub,
        username: claims.username,
        role: claims.role,
        name: claims.name,
        email: claims.email,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}

pub fn is_admin(role: Role) -> bool {
    role == Role::Admin
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn staff_user() -> User {
        User {
            id: Uuid::new_v4().to_string(),
            username: "STF-1001".to_string(),
            role: Role::Staff,
            name: Some("Front Desk".to_string()),
            email: Some("desk@clinic.test".to_string()),
        }
    }

    #[test]
    fn sign_then_validate_round_trips_claims() {
        let user = staff_user();
        let token = sign_token(&user, "a-sufficiently-long-test-secret", 24).unwrap();

        let validated = validate_token(&token, "a-sufficiently-long-test-secret").unwrap();
        assert_eq!(validated.id, user.id);
        assert_eq!(validated.username, user.username);
        assert_eq!(validated.role, Role::Staff);
        assert_eq!(validated.email, user.email);
    }

    #[test]
    fn validate_rejects_wrong_secret() {
        let token = sign_token(&staff_user(), "secret-one", 24).unwrap();
        let err = validate_token(&token, "secret-two").unwrap_err();
        assert_eq!(err, "Invalid token signature");
    }

    #[test]
    fn validate_rejects_expired_token() {
        let token = sign_token(&staff_user(), "a-sufficiently-long-test-secret", -1).unwrap();
        let err = validate_token(&token, "a-sufficiently-long-test-secret").unwrap_err();
        assert_eq!(err, "Token expired");
    }

    #[test]
    fn validate_rejects_garbage() {
        assert!(validate_token("not-a-token", "secret").is_err());
        assert!(validate_token("a.b", "secret").is_err());
        assert!(validate_token("a.b.c", "secret").is_err());
    }

    #[test]
    fn validate_rejects_tampered_claims() {
        let user = staff_user();
        let token = sign_token(&user, "a-sufficiently-long-test-secret", 24).unwrap();

        // Swap the claims segment for one announcing an admin role
        let parts: Vec<&str> = token.split('.').collect();
        let forged_claims = URL_SAFE_NO_PAD.encode(
            serde_json::json!({
                "sub": user.id,
                "username": user.username,
                "role": "ADMIN",
                "name": null,
                "email": null,
                "iat": 0,
                "exp": 9999999999u64
            })
            .to_string(),
        );
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);

        assert!(validate_token(&forged, "a-sufficiently-long-test-secret").is_err());
    }
}
