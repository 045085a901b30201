//! Typed models decoded from response bodies.
//!
//! The decoding arity follows the target type's shape:
//!
//! | Target            | Arity             | Failure behaviour                              |
//! |-------------------|-------------------|------------------------------------------------|
//! | `T`               | single            | any failure is an error                        |
//! | `Vec<T>`          | multiple          | the path must be an array; any bad element fails the whole decode |
//! | `Vec<Option<T>>`  | optional-multiple | the path must be an array; bad elements become `None` holes |
//! | `Option<T>`       | single-optional   | unparseable data or a missing path falls back to the format's empty value; `None` if `T` can't be built from that either |

use crate::container::{DataContainer, Format};
use crate::xml::XmlElement;
use crate::{Error, Result};
use serde_json::Value;

/// A type that can be built from a response body.
///
/// Implement [`Model::from_container`] and pick the [`Format`]; collection
/// and optional forms come for free. Serde types can use
/// [`decodable_model!`](crate::decodable_model) instead.
///
/// # Examples
///
/// ```
/// use cachet::{DataContainer, Format, Model, Result};
///
/// struct Score {
///     key: i64,
/// }
///
/// impl Model for Score {
///     const FORMAT: Format = Format::Json;
///
///     fn from_container(container: DataContainer) -> Result<Self> {
///         let json = container.into_json()?;
///         let key = json["key"]
///             .as_i64()
///             .ok_or_else(|| cachet::Error::DecodeFailed {
///                 path: None,
///                 message: "<key> value is invalid".to_string(),
///             })?;
///         Ok(Score { key })
///     }
/// }
///
/// let scores = Vec::<Option<Score>>::decode(br#"{"items": [{"key": 1}, {}]}"#, Some("items")).unwrap();
/// assert_eq!(scores[0].as_ref().map(|s| s.key), Some(1));
/// assert!(scores[1].is_none());
/// ```
pub trait Model: Sized + Send + 'static {
    /// Format the response body is parsed as.
    const FORMAT: Format;

    /// Builds the model from a container already narrowed to its path.
    fn from_container(container: DataContainer) -> Result<Self>;

    /// Parses `bytes` and decodes the value found at `path`.
    fn decode(bytes: &[u8], path: Option<&str>) -> Result<Self> {
        let container = DataContainer::parse(Self::FORMAT, bytes, path)?;
        Self::from_container(container).map_err(|e| e.with_path(path))
    }

    /// The value to report when the data doesn't exist at all, e.g. on a
    /// local cache miss. `None` means such models have no empty value.
    fn empty() -> Option<Self> {
        None
    }
}

impl<T: Model> Model for Vec<T> {
    const FORMAT: Format = T::FORMAT;

    fn from_container(container: DataContainer) -> Result<Self> {
        let format = container.format();
        let items = container
            .multiple()
            .ok_or_else(|| Error::decode(format!("{:?} container is not iterable", format)))?;
        items.into_iter().map(T::from_container).collect()
    }
}

impl<T: Model> Model for Option<T> {
    const FORMAT: Format = T::FORMAT;

    fn from_container(container: DataContainer) -> Result<Self> {
        match T::from_container(container) {
            Ok(model) => Ok(Some(model)),
            Err(e) => {
                tracing::debug!(error = %e, "Optional model decoded as empty");
                Ok(None)
            }
        }
    }

    fn decode(bytes: &[u8], path: Option<&str>) -> Result<Self> {
        let container = DataContainer::parse(T::FORMAT, bytes, path).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "No data for optional model, using the empty container");
            DataContainer::empty(T::FORMAT)
        });
        Self::from_container(container)
    }

    fn empty() -> Option<Self> {
        Some(None)
    }
}

impl Model for Value {
    const FORMAT: Format = Format::Json;

    fn from_container(container: DataContainer) -> Result<Self> {
        container.into_json()
    }
}

impl Model for XmlElement {
    const FORMAT: Format = Format::Xml;

    fn from_container(container: DataContainer) -> Result<Self> {
        container.into_xml()
    }
}

impl Model for String {
    const FORMAT: Format = Format::Text;

    fn from_container(container: DataContainer) -> Result<Self> {
        container.into_text()
    }
}

impl Model for bool {
    const FORMAT: Format = Format::Bool;

    fn from_container(container: DataContainer) -> Result<Self> {
        container.into_bool()
    }
}

/// Implements [`Model`] for serde types decoded from JSON.
///
/// # Examples
///
/// ```
/// use cachet::{decodable_model, Model};
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct Player {
///     first_name: String,
/// }
///
/// #[derive(Debug, Deserialize)]
/// struct Team {
///     name: String,
///     players: Vec<Player>,
/// }
///
/// decodable_model!(Player, Team);
///
/// let body = br#"{"teams": [{"name": "France", "players": [{"first_name": "Vasya"}]}]}"#;
/// let player = Player::decode(body, Some("teams[0]/players[0]")).unwrap();
/// assert_eq!(player.first_name, "Vasya");
/// ```
#[macro_export]
macro_rules! decodable_model {
    ($($model:ty),+ $(,)?) => {
        $(
            impl $crate::Model for $model {
                const FORMAT: $crate::Format = $crate::Format::Json;

                fn from_container(container: $crate::DataContainer) -> $crate::Result<Self> {
                    container.deserialize()
                }
            }
        )+
    };
}
