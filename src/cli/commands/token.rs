use anyhow::Context;
use chrono::Utc;
use clap::Subcommand;
use serde_json::json;

use crate::auth::verifier::verify_with_secret;
use crate::auth::{issue_token, IdentityRef, VerificationClaims};
use crate::cli::utils::{output_details, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Sign a verification link token")]
    Sign {
        #[arg(long, help = "Subject (user id)")]
        sub: String,
        #[arg(long, help = "Email address being verified")]
        email: String,
        #[arg(long, help = "Identity provider connection, e.g. google-oauth2")]
        provider: Option<String>,
        #[arg(long, help = "User id at the identity provider")]
        provider_user_id: Option<String>,
        #[arg(long, default_value_t = 1440, help = "Lifetime in minutes")]
        ttl_minutes: i64,
        #[arg(long, env = "MY_REDIRECT_SECRET", hide_env_values = true)]
        secret: String,
    },

    #[command(about = "Verify a token and print its claims")]
    Verify {
        #[arg(help = "Token to verify")]
        token: String,
        #[arg(long, env = "MY_REDIRECT_SECRET", hide_env_values = true)]
        secret: String,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Sign {
            sub,
            email,
            provider,
            provider_user_id,
            ttl_minutes,
            secret,
        } => {
            let claims = sign_claims(sub, email, provider, provider_user_id, ttl_minutes)?;
            let token = issue_token(&claims, &secret).context("failed to sign token")?;

            match output_format {
                OutputFormat::Json => output_success(
                    &output_format,
                    "Token issued",
                    Some(json!({ "token": token, "claims": claims })),
                ),
                OutputFormat::Text => {
                    println!("{}", token);
                    Ok(())
                }
            }
        }
        TokenCommands::Verify { token, secret } => {
            let claims = verify_with_secret(&token, &secret)?;
            output_details(&output_format, "Token is valid", &serde_json::to_value(&claims)?)
        }
    }
}

fn sign_claims(
    sub: String,
    email: String,
    provider: Option<String>,
    provider_user_id: Option<String>,
    ttl_minutes: i64,
) -> anyhow::Result<VerificationClaims> {
    let now = Utc::now().timestamp();
    let exp = ttl_minutes
        .checked_mul(60)
        .and_then(|secs| now.checked_add(secs))
        .with_context(|| format!("--ttl-minutes {} is out of range", ttl_minutes))?;
    let identity = (provider.is_some() || provider_user_id.is_some()).then(|| IdentityRef {
        user_id: provider_user_id,
        provider,
    });

    Ok(VerificationClaims {
        sub,
        email,
        identity,
        iat: Some(now),
        exp: Some(exp),
    })
}
