use crate::{
    Result,
    constants::{MAX_UID_LENGTH, MIN_UID_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Normalized identifier of a scanned tag.
///
/// Stored as the uppercase hexadecimal rendering of the tag UID, so two
/// credentials compare equal regardless of the case they were typed or
/// stored in.
///
/// # Security
/// Comparison is constant-time to avoid leaking how much of an identifier
/// matched.
///
/// # Examples
///
/// ```
/// use doorkeeper_core::Credential;
///
/// let typed = Credential::new("aabbccdd").unwrap();
/// let scanned = Credential::from_uid_bytes(&[0xAA, 0xBB, 0xCC, 0xDD]).unwrap();
/// assert_eq!(typed, scanned);
/// assert_eq!(typed.as_str(), "AABBCCDD");
/// ```
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Credential(String);

impl Credential {
    /// Create a credential from its hex text.
    ///
    /// The text is trimmed and uppercased before validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidCredential` if:
    /// - The text is not an even number of hex digits
    /// - The decoded UID is not 4-10 bytes long
    pub fn new(hex: &str) -> Result<Self> {
        let hex = hex.trim().to_uppercase();

        if hex.len() % 2 != 0 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidCredential(format!(
                "Credential must be hex digit pairs, got '{hex}'"
            )));
        }

        let bytes = hex.len() / 2;
        if !(MIN_UID_LENGTH..=MAX_UID_LENGTH).contains(&bytes) {
            return Err(Error::InvalidCredential(format!(
                "Credential must be {MIN_UID_LENGTH}-{MAX_UID_LENGTH} bytes, got {bytes}"
            )));
        }

        Ok(Credential(hex))
    }

    /// Create a credential from the raw UID bytes a reader produced.
    ///
    /// # Errors
    /// Returns `Error::InvalidCredential` if the UID is not 4-10 bytes long.
    pub fn from_uid_bytes(uid: &[u8]) -> Result<Self> {
        let hex: String = uid.iter().map(|b| format!("{b:02X}")).collect();
        Self::new(&hex)
    }

    /// Get the normalized hex text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode back to the raw UID bytes.
    #[must_use]
    pub fn to_uid_bytes(&self) -> Vec<u8> {
        self.0
            .as_bytes()
            .chunks(2)
            .filter_map(|pair| {
                std::str::from_utf8(pair)
                    .ok()
                    .and_then(|s| u8::from_str_radix(s, 16).ok())
            })
            .collect()
    }

    /// Compare against raw UID bytes in constant time.
    #[must_use]
    pub fn matches_uid(&self, uid: &[u8]) -> bool {
        self.to_uid_bytes().ct_eq(uid).into()
    }

    /// The hex text cut to at most `max_len` characters.
    #[must_use]
    pub fn truncated(&self, max_len: usize) -> &str {
        &self.0[..self.0.len().min(max_len)]
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Credential {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Credential::new(s)
    }
}

impl TryFrom<String> for Credential {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Credential::new(&value)
    }
}

impl From<Credential> for String {
    fn from(value: Credential) -> Self {
        value.0
    }
}

/// Constant-time comparison implementation for Credential
impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::hash::Hash for Credential {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}
