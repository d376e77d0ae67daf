use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub email: String,
    pub password: String,
}

impl UserCredentials {
    pub fn parse(input: &str) -> Result<Self> {
        let (email, password) = input
            .split_once(':')
            .context("Invalid credentials format. Expected email:password")?;
        if email.is_empty() || password.is_empty() {
            anyhow::bail!("Invalid credentials format. Expected email:password");
        }
        Ok(Self {
            email: email.to_string(),
            password: password.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub role: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    data: LoginData,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    user_id: String,
    role: String,
    token: String,
}

pub async fn login(
    client: &Client,
    base_url: &str,
    credentials: &UserCredentials,
) -> Result<AuthenticatedUser> {
    let url = format!("{}/login", base_url);

    let response = client
        .post(&url)
        .json(&LoginRequest {
            email: &credentials.email,
            password: &credentials.password,
        })
        .send()
        .await
        .context("Failed to send login request")?;

    if !response.status().is_success() {
        anyhow::bail!("Login failed for {}: {}", credentials.email, response.status());
    }

    let login_response: LoginResponse = response
        .json()
        .await
        .context("Failed to parse login response")?;

    Ok(AuthenticatedUser {
        user_id: login_response.data.user_id,
        role: login_response.data.role,
        token: login_response.data.token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_email_and_password() {
        let creds = UserCredentials::parse("u1@qroket.ch:pass:word").unwrap();
        assert_eq!(creds.email, "u1@qroket.ch");
        assert_eq!(creds.password, "pass:word");
    }

    #[test]
    fn rejects_malformed_credentials() {
        assert!(UserCredentials::parse("no-separator").is_err());
        assert!(UserCredentials::parse(":password").is_err());
    }
}
