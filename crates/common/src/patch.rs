//! Partial-update field type.
//!
//! JSON request bodies cannot otherwise tell "field omitted" apart from
//! "field set to null". Fields of type [`Patch<T>`] must be marked
//! `#[serde(default)]`: an absent key yields [`Patch::Keep`], any present
//! value (including `null` when `T` is an `Option`) yields [`Patch::Update`].

use serde::{Deserialize, Deserializer, de};

/// A field in a partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    /// Leave the stored value unchanged.
    #[default]
    Keep,
    /// Replace the stored value.
    Update(T),
}

impl<T> Patch<T> {
    /// Borrow the new value, if any.
    #[must_use]
    pub const fn as_update(&self) -> Option<&T> {
        match self {
            Self::Keep => None,
            Self::Update(value) => Some(value),
        }
    }
}

impl<T> From<T> for Patch<T> {
    fn from(value: T) -> Self {
        Self::Update(value)
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Self::Update)
    }
}

/// Deserialize a boolean flag, also accepting `0`, `1`, `"0"` and `"1"`.
///
/// Use with `#[serde(default, deserialize_with = "...")]` on a `Patch<bool>`.
pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<Patch<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Str(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(Patch::Update(value)),
        Flag::Int(0) => Ok(Patch::Update(false)),
        Flag::Int(1) => Ok(Patch::Update(true)),
        Flag::Str(s) if s == "0" => Ok(Patch::Update(false)),
        Flag::Str(s) if s == "1" => Ok(Patch::Update(true)),
        _ => Err(de::Error::custom(r#"expected true, false, 0, 1, "0" or "1""#)),
    }
}
