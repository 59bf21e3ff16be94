//! A string wrapper type that expands `{{ env.VAR }}` placeholders against the
//! process environment before parsing into the target type.

use std::{
    fmt,
    marker::PhantomData,
    str::FromStr,
};

use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_with::{DeserializeAs, SerializeAs};
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*env\.([A-Za-z_][A-Za-z0-9_]*)\s*(?:,\s*\"([^\"]*)\")?\s*\}\}").unwrap())
}

/// Wraps a value of type `T` that was parsed from a string after expanding
/// any `{{ env.VAR }}` or `{{ env.VAR, "default" }}` placeholders it contained.
///
/// ```
/// # std::env::set_var("DYNAMIC_STRING_DOC_TEST", "42");
/// use serde_dynamic_string::DynamicString;
/// use std::str::FromStr;
///
/// let value = DynamicString::<u16>::from_str("{{ env.DYNAMIC_STRING_DOC_TEST }}").unwrap();
/// assert_eq!(value.into_inner(), 42);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicString<T>(T);

impl<T> DynamicString<T> {
    /// Consumes the wrapper, returning the parsed value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> FromStr for DynamicString<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let expanded = expand(input)?;

        let value = expanded
            .parse()
            .map_err(|err: T::Err| anyhow::anyhow!("failed to parse expanded value: {err}"))?;

        Ok(DynamicString(value))
    }
}

/// Replaces every `{{ env.VAR }}` / `{{ env.VAR, "default" }}` occurrence in
/// `input` with the value of `VAR` from the environment, falling back to the
/// literal default when the variable is unset and a default was given.
fn expand(input: &str) -> anyhow::Result<String> {
    let re = placeholder_regex();

    if !re.is_match(input) {
        return Ok(input.to_string());
    }

    let mut err = None;
    let expanded = re.replace_all(input, |caps: &regex::Captures<'_>| {
        let var = &caps[1];

        match (std::env::var(var), caps.get(2)) {
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.as_str().to_string(),
            (Err(_), None) => {
                err.get_or_insert_with(|| anyhow::anyhow!("environment variable '{var}' is not set"));
                String::new()
            }
        }
    });

    match err {
        Some(err) => Err(err),
        None => Ok(expanded.into_owned()),
    }
}

impl<'de, T> Deserialize<'de> for DynamicString<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DynamicString::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

impl<T: fmt::Display> fmt::Display for DynamicString<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// `serde_with`-compatible adapter for using [`DynamicString`] as a field
/// annotation (`#[serde_as(as = "DynamicStringAs")]`) rather than as the
/// field's own type.
pub struct DynamicStringAs<T>(PhantomData<T>);

impl<'de, T> DeserializeAs<'de, T> for DynamicStringAs<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    fn deserialize_as<D>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
    {
        DynamicString::deserialize(deserializer).map(DynamicString::into_inner)
    }
}

impl<T> SerializeAs<T> for DynamicStringAs<T>
where
    T: fmt::Display,
{
    fn serialize_as<S>(source: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_plain_strings() {
        let value = DynamicString::<String>::from_str("plain-value").unwrap();
        assert_eq!(value.into_inner(), "plain-value");
    }

    #[test]
    fn expands_env_var() {
        temp_env::with_var("SDS_TEST_VAR", Some("hello"), || {
            let value = DynamicString::<String>::from_str("{{ env.SDS_TEST_VAR }}").unwrap();
            assert_eq!(value.into_inner(), "hello");
        });
    }

    #[test]
    fn expands_with_surrounding_text() {
        temp_env::with_var("SDS_TEST_HOST", Some("localhost"), || {
            let value = DynamicString::<String>::from_str("http://{{ env.SDS_TEST_HOST }}:8080").unwrap();
            assert_eq!(value.into_inner(), "http://localhost:8080");
        });
    }

    #[test]
    fn falls_back_to_default_when_unset() {
        temp_env::with_var_unset("SDS_TEST_MISSING", || {
            let value = DynamicString::<String>::from_str(r#"{{ env.SDS_TEST_MISSING, "fallback" }}"#).unwrap();
            assert_eq!(value.into_inner(), "fallback");
        });
    }

    #[test]
    fn errors_on_missing_var_without_default() {
        temp_env::with_var_unset("SDS_TEST_ABSENT", || {
            let result = DynamicString::<String>::from_str("{{ env.SDS_TEST_ABSENT }}");
            assert!(result.is_err());
        });
    }

    #[test]
    fn parses_into_target_type() {
        temp_env::with_var("SDS_TEST_PORT", Some("9090"), || {
            let value = DynamicString::<u16>::from_str("{{ env.SDS_TEST_PORT }}").unwrap();
            assert_eq!(value.into_inner(), 9090);
        });
    }
}
