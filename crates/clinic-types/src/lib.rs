//! Validated value types shared across the clinic workspace.
//!
//! Values are checked once at construction so downstream code (services, repositories, HTTP
//! handlers) can rely on the invariant without re-checking it.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when creating a [`Quantity`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("quantity must be greater than zero")]
    Zero,
    #[error("quantity must be greater than zero, got {0}")]
    Negative(i64),
    #[error("quantity {0} is too large")]
    TooLarge(i64),
}

/// A strictly positive count of dispensed units.
///
/// Stored as `u32` so that `price * quantity` always fits in an `i64` intermediate for any
/// realistic price; the multiplication itself is still checked by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(u32);

impl Quantity {
    /// Creates a quantity from a signed count, as read from JSON or a database row.
    ///
    /// # Errors
    ///
    /// Returns a [`QuantityError`] if `value` is zero, negative, or above `u32::MAX`.
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        match value {
            0 => Err(QuantityError::Zero),
            v if v < 0 => Err(QuantityError::Negative(v)),
            v => u32::try_from(v)
                .map(Self)
                .map_err(|_| QuantityError::TooLarge(v)),
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Returns the quantity widened to `i64`, the width used for stock and amounts.
    pub fn as_i64(self) -> i64 {
        i64::from(self.0)
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u32(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v = i64::deserialize(deserializer)?;
        Quantity::new(v).map_err(serde::de::Error::custom)
    }
}
