// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Decoding of raw stored values.

use std::{fmt, str::FromStr};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::{Error, ParameterValue, RawValue, Result};

/// How a raw stored value is decoded before it is returned and cached.
///
/// # Examples
///
/// ```
/// use paramstore::Transform;
///
/// assert_eq!(Transform::Auto.resolve("/app/settings.json"), Transform::Json);
/// assert_eq!(Transform::Auto.resolve("/app/cert.binary"), Transform::Binary);
/// assert_eq!(Transform::Auto.resolve("/app/plain"), Transform::None);
/// assert_eq!(Transform::Json.resolve("/app/plain"), Transform::Json);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Transform {
    /// The value is returned as stored.
    #[default]
    None,
    /// The value is parsed as JSON.
    Json,
    /// The value is decoded from standard base64.
    Binary,
    /// The mode is inferred from the parameter name's suffix:
    /// `.json` selects [`Transform::Json`], `.binary` selects
    /// [`Transform::Binary`], anything else selects [`Transform::None`].
    Auto,
}

impl Transform {
    /// Resolves [`Transform::Auto`] against a parameter name.
    ///
    /// Other modes are returned unchanged.
    #[must_use]
    pub fn resolve(self, name: &str) -> Self {
        match self {
            Self::Auto => {
                if name.ends_with(".json") {
                    Self::Json
                } else if name.ends_with(".binary") {
                    Self::Binary
                } else {
                    Self::None
                }
            }
            other => other,
        }
    }

    /// Returns the canonical lowercase name of this mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Json => "json",
            Self::Binary => "binary",
            Self::Auto => "auto",
        }
    }

    /// Decodes `raw` under this mode.
    ///
    /// `name` is used to resolve [`Transform::Auto`] and to describe failures.
    ///
    /// # Errors
    ///
    /// Returns a transform error if the value is not valid JSON or base64.
    pub fn apply(self, name: &str, raw: RawValue) -> Result<ParameterValue> {
        match self.resolve(name) {
            Self::None | Self::Auto => Ok(match raw {
                RawValue::Text(text) => ParameterValue::Text(text),
                RawValue::Binary(bytes) => ParameterValue::Binary(bytes),
            }),
            Self::Json => serde_json::from_slice(raw.as_bytes())
                .map(ParameterValue::Json)
                .map_err(|e| Error::transform(format!("unable to decode json value of parameter '{name}': {e}"))),
            Self::Binary => BASE64
                .decode(raw.as_bytes())
                .map(ParameterValue::Binary)
                .map_err(|e| Error::transform(format!("unable to decode base64 value of parameter '{name}': {e}"))),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "json" => Ok(Self::Json),
            "binary" => Ok(Self::Binary),
            "auto" => Ok(Self::Auto),
            other => Err(Error::configuration(format!(
                "unknown transform '{other}', expected one of none, json, binary, auto"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_passes_text_and_bytes_through() {
        assert_eq!(
            Transform::None.apply("p", RawValue::from("raw")).unwrap(),
            ParameterValue::Text("raw".to_string())
        );
        assert_eq!(
            Transform::None.apply("p", RawValue::from(vec![1, 2])).unwrap(),
            ParameterValue::Binary(vec![1, 2])
        );
    }

    #[test]
    fn json_round_trips_structures() {
        let original = serde_json::json!({"name": "db", "replicas": [1, 2, 3], "tls": true});
        let stored = RawValue::Text(original.to_string());

        let decoded = Transform::Json.apply("p", stored).unwrap();

        assert_eq!(decoded, ParameterValue::Json(original));
    }

    #[test]
    fn json_parses_binary_payloads() {
        let decoded = Transform::Json.apply("p", RawValue::Binary(br#"{"a":1}"#.to_vec())).unwrap();
        assert_eq!(decoded, ParameterValue::Json(serde_json::json!({"a": 1})));
    }

    #[test]
    fn malformed_json_is_a_transform_error() {
        let err = Transform::Json.apply("/app/broken", RawValue::from("{not json")).unwrap_err();
        assert!(err.is_transform());
        assert!(err.to_string().contains("/app/broken"));
    }

    #[test]
    fn binary_decodes_base64() {
        let decoded = Transform::Binary.apply("p", RawValue::from("aGVsbG8=")).unwrap();
        assert_eq!(decoded, ParameterValue::Binary(b"hello".to_vec()));
    }

    #[test]
    fn malformed_base64_is_a_transform_error() {
        let err = Transform::Binary.apply("p", RawValue::from("***")).unwrap_err();
        assert!(err.is_transform());
    }

    #[test]
    fn auto_matches_explicit_modes() {
        let json = RawValue::from(r#"{"k":"v"}"#);
        assert_eq!(
            Transform::Auto.apply("/cfg/app.json", json.clone()).unwrap(),
            Transform::Json.apply("/cfg/app.json", json).unwrap()
        );

        let binary = RawValue::from("AQID");
        assert_eq!(
            Transform::Auto.apply("/cfg/key.binary", binary.clone()).unwrap(),
            Transform::Binary.apply("/cfg/key.binary", binary).unwrap()
        );

        assert_eq!(
            Transform::Auto.apply("/cfg/plain.txt", RawValue::from("x")).unwrap(),
            ParameterValue::Text("x".to_string())
        );
    }

    #[test]
    fn auto_requires_the_dot() {
        assert_eq!(Transform::Auto.resolve("/cfg/json"), Transform::None);
        assert_eq!(Transform::Auto.resolve("/cfg/notbinary"), Transform::None);
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("JSON".parse::<Transform>().unwrap(), Transform::Json);
        assert_eq!("binary".parse::<Transform>().unwrap(), Transform::Binary);
        assert_eq!("auto".parse::<Transform>().unwrap(), Transform::Auto);
        assert_eq!("none".parse::<Transform>().unwrap(), Transform::None);
        assert!("yaml".parse::<Transform>().unwrap_err().is_configuration());
    }

    #[test]
    fn display_uses_canonical_names() {
        assert_eq!(Transform::Json.to_string(), "json");
        assert_eq!(Transform::Auto.to_string(), "auto");
    }
}
