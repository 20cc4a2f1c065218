//! 身份解析的两级实现：本地 JWT 解码与远程身份服务

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use application::{Identity, IdentityClient, IdentityError, TokenDecoder};

/// 与签发方约定的声明结构：`userId` 为数字 id，`sub` 为邮箱
#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[serde(rename = "userId")]
    user_id: i64,
    nickname: Option<String>,
    #[allow(dead_code)]
    sub: Option<String>,
}

pub struct JwtTokenDecoder {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtTokenDecoder {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl TokenDecoder for JwtTokenDecoder {
    fn decode(&self, token: &str) -> Result<Identity, IdentityError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| IdentityError::InvalidToken(err.to_string()))?;
        Ok(Identity {
            user_id: data.claims.user_id,
            nickname: data
                .claims
                .nickname
                .unwrap_or_else(|| "알 수 없는 사용자".to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RemoteIdentityResponse {
    #[serde(rename = "userId")]
    user_id: i64,
    nickname: String,
}

pub struct HttpIdentityClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpIdentityClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn resolve(&self, token: &str) -> Result<Identity, IdentityError> {
        let response = self
            .http
            .get(format!("{}/api/users/me", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| IdentityError::ServiceUnavailable(err.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(IdentityError::InvalidToken("远程校验未通过".to_string()));
        }
        let body: RemoteIdentityResponse = response
            .error_for_status()
            .map_err(|err| IdentityError::ServiceUnavailable(err.to_string()))?
            .json()
            .await
            .map_err(|err| IdentityError::ServiceUnavailable(err.to_string()))?;

        Ok(Identity {
            user_id: body.user_id,
            nickname: body.nickname,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        #[serde(rename = "userId")]
        user_id: i64,
        nickname: String,
        sub: String,
        exp: i64,
    }

    fn sign(secret: &str, user_id: i64, exp_offset: i64) -> String {
        let claims = TestClaims {
            user_id,
            nickname: "판매왕".to_string(),
            sub: "seller@example.com".to_string(),
            exp: chrono::Utc::now().timestamp() + exp_offset,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_decodes_to_identity() {
        let decoder = JwtTokenDecoder::new("test-secret");
        let token = sign("test-secret", 7, 3600);

        let identity = decoder.decode(&token).unwrap();
        assert_eq!(identity.user_id, 7);
        assert_eq!(identity.nickname, "판매왕");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let decoder = JwtTokenDecoder::new("test-secret");
        let token = sign("other-secret", 7, 3600);
        assert!(decoder.decode(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let decoder = JwtTokenDecoder::new("test-secret");
        let token = sign("test-secret", 7, -3600);
        assert!(decoder.decode(&token).is_err());
    }
}
