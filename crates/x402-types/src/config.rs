//! Configuration values that may live in the environment.
//!
//! Private keys and API secrets should stay out of config files. Any field typed as
//! [`LiteralOrEnv`] accepts either the literal value or a reference to an environment
//! variable:
//!
//! ```json
//! {
//!   "signer": "$EVM_PRIVATE_KEY",
//!   "apiSecret": "${GATE_WEB3_API_SECRET}"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

/// A value parsed from a literal string or from the environment variable it names.
///
/// `$VAR` and `${VAR}` are both recognized. The referenced variable must be set when
/// the value is deserialized.
#[derive(Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Returns the variable name if `s` is `$VAR` or `${VAR}`.
fn env_var_name(s: &str) -> Option<&str> {
    if let Some(braced) = s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        return (!braced.is_empty()).then_some(braced);
    }
    let bare = s.strip_prefix('$')?;
    let valid = !bare.is_empty() && bare.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(bare)
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Values are frequently secrets; never print them.
impl<T> fmt::Debug for LiteralOrEnv<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LiteralOrEnv(<redacted>)")
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let value = match env_var_name(&raw) {
            Some(var) => std::env::var(var).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{var}' not found (referenced as '{raw}')"
                ))
            })?,
            None => raw,
        };
        let parsed = value
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {e}")))?;
        Ok(LiteralOrEnv(parsed))
    }
}

impl<T: Serialize> Serialize for LiteralOrEnv<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_name() {
        assert_eq!(env_var_name("$GATE_KEY"), Some("GATE_KEY"));
        assert_eq!(env_var_name("${GATE_KEY}"), Some("GATE_KEY"));
        assert_eq!(env_var_name("$"), None);
        assert_eq!(env_var_name("${}"), None);
        assert_eq!(env_var_name("$not-a-var"), None);
        assert_eq!(env_var_name("plain"), None);
    }

    #[test]
    fn test_literal_value() {
        let value: LiteralOrEnv<u64> = serde_json::from_str("\"30\"").unwrap();
        assert_eq!(*value, 30);
    }

    #[test]
    fn test_env_value() {
        // SAFETY: test-only variable with a unique name
        unsafe { std::env::set_var("X402_TYPES_TEST_LITERAL_OR_ENV", "42") };
        let value: LiteralOrEnv<u64> =
            serde_json::from_str("\"${X402_TYPES_TEST_LITERAL_OR_ENV}\"").unwrap();
        assert_eq!(value.into_inner(), 42);
    }

    #[test]
    fn test_missing_env_value() {
        let err = serde_json::from_str::<LiteralOrEnv<String>>("\"$X402_TYPES_TEST_UNSET_VAR\"")
            .unwrap_err();
        assert!(err.to_string().contains("X402_TYPES_TEST_UNSET_VAR"));
    }

    #[test]
    fn test_debug_is_redacted() {
        let value = LiteralOrEnv::from_literal("secret".to_string());
        assert_eq!(format!("{value:?}"), "LiteralOrEnv(<redacted>)");
    }
}
