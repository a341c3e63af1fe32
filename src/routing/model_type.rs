//! Service variants served by subgrid backends.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The model type currently loaded on a subgrid's backend.
///
/// Resolved per request because a subgrid can switch types between requests.
/// The baseline `3di` type doubles as the default for deployments that never
/// write the `loaded_model_type` key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ModelType {
    #[default]
    ThreeDi,
    ThreeDiUrban,
}

impl ModelType {
    /// The wire representation stored in the key-value store.
    pub fn as_str(self) -> &'static str {
        match self {
            ModelType::ThreeDi => "3di",
            ModelType::ThreeDiUrban => "3di-urban",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model type value outside the supported set.
///
/// Never defaulted over: an unknown value means the store holds data this
/// proxy does not understand, and forwarding anyway could hit the wrong port.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported model type: {0}")]
pub struct UnknownModelType(pub String);

impl FromStr for ModelType {
    type Err = UnknownModelType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "3di" => Ok(ModelType::ThreeDi),
            "3di-urban" => Ok(ModelType::ThreeDiUrban),
            other => Err(UnknownModelType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_types() {
        assert_eq!("3di".parse::<ModelType>().unwrap(), ModelType::ThreeDi);
        assert_eq!(
            "3di-urban".parse::<ModelType>().unwrap(),
            ModelType::ThreeDiUrban
        );
    }

    #[test]
    fn test_parse_unknown_type() {
        let err = "2di".parse::<ModelType>().unwrap_err();
        assert_eq!(err, UnknownModelType("2di".to_string()));
    }

    #[test]
    fn test_default_is_baseline() {
        assert_eq!(ModelType::default(), ModelType::ThreeDi);
    }

    #[test]
    fn test_round_trip() {
        for model_type in [ModelType::ThreeDi, ModelType::ThreeDiUrban] {
            assert_eq!(model_type.as_str().parse::<ModelType>().unwrap(), model_type);
        }
    }
}
