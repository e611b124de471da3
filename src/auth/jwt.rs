use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, Validation, decode};

/// Decodes and checks an access token. Refresh tokens are refused here; they
/// are only good at the sign-on service.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())?;

    if claims.token_type != TokenType::Access {
        return Err("refresh token cannot be used for API access".to_string());
    }

    Ok(claims)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub(crate) fn token(role: u8, employee_id: Option<u64>, token_type: TokenType, secret: &str) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as usize;
        let claims = Claims {
            user_id: 9,
            sub: "site.manager".to_string(),
            role,
            exp: now + 900,
            jti: "test-jti".to_string(),
            token_type,
            employee_id,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_access_token() {
        let claims = verify_token(&token(2, Some(4), TokenType::Access, "s3cret"), "s3cret").unwrap();
        assert_eq!(claims.role, 2);
        assert_eq!(claims.employee_id, Some(4));
    }

    #[test]
    fn refuses_refresh_token() {
        let err = verify_token(&token(2, None, TokenType::Refresh, "s3cret"), "s3cret").unwrap_err();
        assert!(err.contains("refresh token"));
    }

    #[test]
    fn refuses_wrong_secret() {
        assert!(verify_token(&token(1, None, TokenType::Access, "a"), "b").is_err());
    }
}
