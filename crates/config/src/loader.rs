//! Parses a TOML configuration file, expands `{{ env.VAR }}`-style dynamic
//! strings, and validates cross-section invariants before handing back a
//! `Config`. Grounded on `grafbase-nexus`'s `config::loader` (same
//! `expand_dynamic_strings` walk, same `indoc!`-formatted remediation
//! messages on failure).

use std::{fmt::Write, path::Path, str::FromStr};

use anyhow::bail;
use indoc::indoc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_dynamic_string::DynamicString;
use toml::Value;

use crate::{AuthMode, Config, TransportKind};

/// Loads and validates a configuration file.
pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_str(&content)
}

/// Parses and validates configuration already read into memory. Split out
/// from `load` so tests (and callers embedding a config inline) don't need
/// a file on disk.
pub fn parse_str(content: &str) -> anyhow::Result<Config> {
    let mut raw_config: Value = toml::from_str(content)?;

    expand_dynamic_strings(&mut Vec::new(), &mut raw_config)?;

    let config = Config::deserialize(raw_config)?;
    validate(&config)?;

    Ok(config)
}

fn expand_dynamic_strings<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => match DynamicString::<String>::from_str(s) {
            Ok(out) => *s = out.into_inner(),
            Err(err) => {
                let mut p = String::new();

                for segment in path.iter() {
                    match segment {
                        Ok(s) => {
                            p.push_str(s);
                            p.push('.');
                        }
                        Err(i) => write!(p, "[{i}]").unwrap(),
                    }
                }

                if p.ends_with('.') {
                    p.pop();
                }

                bail!("Failed to expand dynamic string at path '{p}': {err}");
            }
        },
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.as_str()));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }

    Ok(())
}

/// Cross-section invariants not expressible through `serde` defaults alone.
pub(crate) fn validate(config: &Config) -> anyhow::Result<()> {
    match config.server.transport {
        TransportKind::Pipe => {
            if !matches!(config.server.auth, AuthMode::None) {
                bail!(indoc! {r#"
                    The `pipe` transport carries no request boundary to authenticate —
                    it is cooperative, single-worker, and trusts its stdin. Remove
                    `[server.auth]` or switch `server.transport` to `http`/`websocket`.
                "#});
            }
        }
        TransportKind::Http | TransportKind::Websocket => {
            if config.server.listen_address.is_none() {
                bail!(indoc! {r#"
                    `server.transport` is `http`/`websocket` but `server.listen_address`
                    is not set. Add e.g.:

                      [server]
                      transport = "http"
                      listen_address = "127.0.0.1:8080"
                "#});
            }
        }
    }

    if let AuthMode::ApiKey { key, .. } = &config.server.auth
        && key.expose_secret().is_empty()
    {
        bail!("`server.auth` is `apiKey` but `key` is empty. Set a non-empty shared secret.");
    }

    if let AuthMode::Basic { username, password } = &config.server.auth
        && (username.is_empty() || password.expose_secret().is_empty())
    {
        bail!("`server.auth` is `basic` but `username`/`password` is empty. Set both.");
    }

    if let AuthMode::JwtHs256 { secret, .. } = &config.server.auth
        && secret.expose_secret().is_empty()
    {
        bail!(indoc! {r#"
            `server.auth` is `jwtHS256` but `secret` is empty. Set the shared HMAC
            secret used to verify the signature, e.g.:

              [server.auth]
              mode = "jwtHS256"
              secret = "{{ env.JWT_SECRET }}"
        "#});
    }

    if config.tokens.summary_budget > config.tokens.full_budget {
        bail!(
            "`tokens.summary_budget` ({}) must not exceed `tokens.full_budget` ({})",
            config.tokens.summary_budget,
            config.tokens.full_budget
        );
    }

    if let Some(percent) = &config.tokens.safety_percent
        && !(0.0..=1.0).contains(&percent.percent)
    {
        bail!("`tokens.safety_percent.percent` must be between 0.0 and 1.0, got {}", percent.percent);
    }

    if !(0.0..=1.0).contains(&config.verification_cache.eviction_percent) {
        bail!(
            "`verification_cache.eviction_percent` must be between 0.0 and 1.0, got {}",
            config.verification_cache.eviction_percent
        );
    }

    if config.supervisor.is_enabled() && config.supervisor.port.is_none() {
        bail!(indoc! {r#"
            `supervisor.command` is set but `supervisor.port` is not. The supervisor
            polls a health endpoint on that port to know the sibling process is up:

              [supervisor]
              command = "mcp-server"
              args = ["--transport", "http"]
              port = 8080
        "#});
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = parse_str("").unwrap();
        assert_eq!(config.tokens.summary_budget, 5_000);
        assert_eq!(config.tokens.full_budget, 24_000);
        assert!(matches!(config.server.transport, TransportKind::Pipe));
        assert!(matches!(config.server.auth, AuthMode::None));
    }

    #[test]
    fn http_without_listen_address_is_rejected() {
        let err = parse_str("[server]\ntransport = \"http\"\n").unwrap_err();
        assert!(err.to_string().contains("listen_address"));
    }

    #[test]
    fn pipe_with_auth_is_rejected() {
        let toml = indoc! {r#"
            [server]
            transport = "pipe"

            [server.auth]
            mode = "apiKey"
            key = "secret"
        "#};

        let err = parse_str(toml).unwrap_err();
        assert!(err.to_string().contains("pipe"));
    }

    #[test]
    fn http_with_api_key_auth_is_accepted() {
        let toml = indoc! {r#"
            [server]
            transport = "http"
            listen_address = "127.0.0.1:0"

            [server.auth]
            mode = "apiKey"
            key = "secret"
        "#};

        let config = parse_str(toml).unwrap();
        assert!(matches!(config.server.auth, AuthMode::ApiKey { .. }));
    }

    #[test]
    fn env_var_is_expanded() {
        temp_env::with_var("MCP_TEST_TOKEN_SECRET_LOADER", Some("shh"), || {
            let toml = indoc! {r#"
                [server]
                transport = "http"
                listen_address = "127.0.0.1:0"

                [server.auth]
                mode = "apiKey"
                key = "{{ env.MCP_TEST_TOKEN_SECRET_LOADER }}"
            "#};

            let config = parse_str(toml).unwrap();
            let AuthMode::ApiKey { key, .. } = &config.server.auth else {
                panic!("expected apiKey auth");
            };

            assert_eq!(key.expose_secret(), "shh");
        });
    }

    #[test]
    fn summary_budget_over_full_budget_is_rejected() {
        let toml = indoc! {r#"
            [tokens]
            summary_budget = 30000
            full_budget = 24000
        "#};

        let err = parse_str(toml).unwrap_err();
        assert!(err.to_string().contains("summary_budget"));
    }

    #[test]
    fn supervisor_without_port_is_rejected() {
        let toml = indoc! {r#"
            [supervisor]
            command = "mcp-server"
        "#};

        let err = parse_str(toml).unwrap_err();
        assert!(err.to_string().contains("port"));
    }
}
