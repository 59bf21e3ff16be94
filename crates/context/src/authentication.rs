use std::collections::HashMap;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The decoded JWT presented by a client authenticating via the
/// `jwtHS256` auth mode.
#[derive(Clone, Debug)]
pub struct BearerToken {
    pub raw: SecretString,
    pub token: jwt_compact::Token<Claims>,
}

impl std::ops::Deref for BearerToken {
    type Target = jwt_compact::Token<Claims>;
    fn deref(&self) -> &Self::Target {
        &self.token
    }
}

/// Standard JWT claims plus a free-form bag for anything else in the token.
#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, rename = "iss")]
    pub issuer: Option<String>,

    #[serde_as(deserialize_as = "Option<serde_with::OneOrMany<_>>")]
    #[serde(default, rename = "aud")]
    pub audience: Option<Vec<String>>,

    #[serde(default, rename = "sub")]
    pub subject: Option<String>,

    #[serde(flatten)]
    pub additional: HashMap<String, Value>,
}

impl Claims {
    /// Extracts a claim value by path, supporting nested claims
    /// (e.g. `"sub"` or `"user.plan"`).
    pub fn get_claim(&self, path: &str) -> Option<String> {
        match path {
            "iss" => return self.issuer.clone(),
            "sub" => return self.subject.clone(),
            "aud" => return self.audience.as_ref().and_then(|audiences| audiences.first().cloned()),
            _ => {}
        }

        let mut parts = path.split('.');
        let first = parts.next()?;
        let current = parts.fold(self.additional.get(first).unwrap_or(&Value::Null), |current, part| {
            current.get(part).unwrap_or(&Value::Null)
        });

        match current {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}
