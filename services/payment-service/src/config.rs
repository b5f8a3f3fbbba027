// /consult-payments/services/payment-service/src/config.rs

use bigdecimal::BigDecimal;
use std::{env, str::FromStr};
use crate::utils::error::{AppError, AppResult};

const MIN_SECRET_LENGTH: usize = 32;

/// Konfigurasi payment gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub merchant_id: String,
    pub client_id: String,
    /// Shared secret untuk signature redirect callback
    pub response_key: String,
    pub currency: String,
    pub return_url: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub payment_methods: Vec<String>,
    pub session_expiry_minutes: u32,
    pub webhook_username: Option<String>,
    pub webhook_password: Option<String>,
}

/// Konfigurasi service, dibaca sekali saat startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_acquire_timeout_secs: u64,
    pub port: String,
    pub environment: String,
    pub frontend_base_url: String,
    pub gateway: GatewayConfig,
    pub digest_secret: String,
    pub amount_epsilon: BigDecimal,
    pub resolver_lookback: i64,
    pub pending_ttl_minutes: i64,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
}

impl AppConfig {
    /// Load config dari environment (dotenv sudah di-load oleh main)
    pub fn from_env() -> AppResult<Self> {
        let gateway = GatewayConfig {
            base_url: env_or("GATEWAY_BASE_URL", "https://smartgatewayuat.hdfcbank.com"),
            api_key: required("GATEWAY_API_KEY")?,
            merchant_id: required("GATEWAY_MERCHANT_ID")?,
            client_id: env_or("GATEWAY_CLIENT_ID", "consult_client"),
            response_key: required("GATEWAY_RESPONSE_KEY")?,
            currency: env_or("GATEWAY_CURRENCY", "INR"),
            return_url: env_or(
                "GATEWAY_RETURN_URL",
                "http://localhost:3003/api/payments/callback",
            ),
            timeout_secs: parsed_or("GATEWAY_TIMEOUT_SECONDS", 15)?,
            max_attempts: parsed_or::<u32>("GATEWAY_MAX_ATTEMPTS", 2)?.max(1),
            payment_methods: parse_list(&env_or("GATEWAY_PAYMENT_METHODS", "UPI,CARD,NB,WALLET")),
            session_expiry_minutes: parsed_or("SESSION_EXPIRY_MINUTES", 15)?,
            webhook_username: optional("GATEWAY_WEBHOOK_USERNAME"),
            webhook_password: optional("GATEWAY_WEBHOOK_PASSWORD"),
        };

        if gateway.webhook_username.is_some() != gateway.webhook_password.is_some() {
            return Err(AppError::Configuration(
                "GATEWAY_WEBHOOK_USERNAME dan GATEWAY_WEBHOOK_PASSWORD harus di-set bersamaan".to_string(),
            ));
        }

        let environment = env_or("ENVIRONMENT", "development").to_lowercase();
        if environment == "production" && gateway.webhook_username.is_none() {
            return Err(AppError::Configuration(
                "GATEWAY_WEBHOOK_USERNAME dan GATEWAY_WEBHOOK_PASSWORD wajib di production".to_string(),
            ));
        }

        let digest_secret = required("AMOUNT_DIGEST_SECRET")?;
        check_secret_length("AMOUNT_DIGEST_SECRET", &digest_secret)?;

        let jwt_secret = required("JWT_SECRET")?;
        check_secret_length("JWT_SECRET", &jwt_secret)?;

        let amount_epsilon = BigDecimal::from_str(&env_or("AMOUNT_EPSILON", "0.01"))
            .map_err(|e| AppError::Configuration(format!("AMOUNT_EPSILON tidak valid: {}", e)))?;
        if amount_epsilon <= BigDecimal::from(0) {
            return Err(AppError::Configuration("AMOUNT_EPSILON harus positif".to_string()));
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parsed_or("DATABASE_MAX_CONNECTIONS", 10)?,
            database_acquire_timeout_secs: parsed_or("DATABASE_ACQUIRE_TIMEOUT_SECONDS", 3)?,
            port: env::var("PAYMENT_SERVICE_PORT")
                .or_else(|_| env::var("SERVER_PORT"))
                .unwrap_or_else(|_| "3003".to_string()),
            environment,
            frontend_base_url: env_or("FRONTEND_BASE_URL", "http://localhost:8080")
                .trim_end_matches('/')
                .to_string(),
            gateway,
            digest_secret,
            amount_epsilon,
            resolver_lookback: parsed_or::<i64>("RESOLVER_LOOKBACK", 20)?.clamp(1, 200),
            pending_ttl_minutes: parsed_or::<i64>("PENDING_BOOKING_TTL_MINUTES", 1440)?.max(1),
            jwt_secret,
            jwt_issuer: optional("JWT_ISSUER"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn required(key: &str) -> AppResult<String> {
    optional(key).ok_or_else(|| AppError::Configuration(format!("{} not set", key)))
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_string())
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> AppResult<T> {
    match optional(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| AppError::Configuration(format!("{} tidak valid: '{}'", key, raw))),
        None => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_ascii_uppercase())
        .filter(|item| !item.is_empty())
        .collect()
}

fn check_secret_length(key: &str, secret: &str) -> AppResult<()> {
    if secret.len() < MIN_SECRET_LENGTH {
        return Err(AppError::Configuration(format!(
            "{} must be at least {} characters long",
            key, MIN_SECRET_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const REQUIRED: [(&str, &str); 6] = [
        ("DATABASE_URL", "postgres://localhost/consult"),
        ("GATEWAY_API_KEY", "key"),
        ("GATEWAY_MERCHANT_ID", "merchant"),
        ("GATEWAY_RESPONSE_KEY", "response-key"),
        ("AMOUNT_DIGEST_SECRET", "0123456789abcdef0123456789abcdef"),
        ("JWT_SECRET", "fedcba9876543210fedcba9876543210"),
    ];

    const OPTIONAL: [&str; 6] = [
        "ENVIRONMENT",
        "GATEWAY_WEBHOOK_USERNAME",
        "GATEWAY_WEBHOOK_PASSWORD",
        "AMOUNT_EPSILON",
        "GATEWAY_PAYMENT_METHODS",
        "GATEWAY_MAX_ATTEMPTS",
    ];

    fn set_required() {
        for (key, value) in REQUIRED {
            env::set_var(key, value);
        }
        for key in OPTIONAL {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_applied() {
        set_required();
        let config = AppConfig::from_env().unwrap();

        assert_eq!(config.gateway.currency, "INR");
        assert_eq!(config.gateway.max_attempts, 2);
        assert_eq!(config.amount_epsilon, BigDecimal::from_str("0.01").unwrap());
        assert_eq!(config.gateway.payment_methods, vec!["UPI", "CARD", "NB", "WALLET"]);
        assert!(config.gateway.webhook_username.is_none());
    }

    #[test]
    #[serial]
    fn test_short_digest_secret_rejected() {
        set_required();
        env::set_var("AMOUNT_DIGEST_SECRET", "short");
        assert!(matches!(AppConfig::from_env(), Err(AppError::Configuration(_))));
    }

    #[test]
    #[serial]
    fn test_missing_gateway_key_rejected() {
        set_required();
        env::remove_var("GATEWAY_API_KEY");
        let err = AppConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("GATEWAY_API_KEY"));
    }

    #[test]
    #[serial]
    fn test_webhook_credentials_must_come_in_pairs() {
        set_required();
        env::set_var("GATEWAY_WEBHOOK_USERNAME", "gateway");
        assert!(AppConfig::from_env().is_err());

        env::set_var("GATEWAY_WEBHOOK_PASSWORD", "secret");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.gateway.webhook_password.as_deref(), Some("secret"));
    }

    #[test]
    #[serial]
    fn test_production_requires_webhook_credentials() {
        set_required();
        env::set_var("ENVIRONMENT", "Production");
        let err = AppConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("GATEWAY_WEBHOOK_USERNAME"));

        env::set_var("GATEWAY_WEBHOOK_USERNAME", "gateway");
        env::set_var("GATEWAY_WEBHOOK_PASSWORD", "secret");
        let config = AppConfig::from_env().unwrap();
        assert!(config.is_production());
        env::remove_var("ENVIRONMENT");
    }

    #[test]
    #[serial]
    fn test_payment_method_list_normalized() {
        set_required();
        env::set_var("GATEWAY_PAYMENT_METHODS", " upi, card ,,");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.gateway.payment_methods, vec!["UPI", "CARD"]);
    }
}
