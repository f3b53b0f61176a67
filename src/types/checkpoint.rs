// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Global checkpoint tokens.
//!
//! A checkpoint is a position in the engine-wide commit order. Callers see it
//! as an opaque string; the engine compares the parsed value.

use crate::error::{PersistenceError, Result};
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Checkpoint(u64);

impl Checkpoint {
    /// Position before the first commit. Reading from here yields everything.
    pub const ORIGIN: Checkpoint = Checkpoint(0);

    pub const fn from_raw(value: u64) -> Self {
        Checkpoint(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    pub fn is_origin(&self) -> bool {
        self.0 == 0
    }

    /// Parse an optional token. `None` and the empty string mean "from the beginning".
    pub fn parse(token: Option<&str>) -> Result<Self> {
        match token.map(str::trim) {
            None | Some("") => Ok(Checkpoint::ORIGIN),
            Some(raw) => raw.parse(),
        }
    }

    pub fn token(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Checkpoint {
    type Err = PersistenceError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(Checkpoint)
            .map_err(|_| PersistenceError::InvalidCheckpoint(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_token_is_origin() {
        assert_eq!(Checkpoint::parse(None).unwrap(), Checkpoint::ORIGIN);
        assert_eq!(Checkpoint::parse(Some("")).unwrap(), Checkpoint::ORIGIN);
        assert_eq!(Checkpoint::parse(Some("0")).unwrap(), Checkpoint::ORIGIN);
    }

    #[test]
    fn test_malformed_token_rejected() {
        for bad in ["abc", "-1", "1.5", "18446744073709551616"] {
            let err = Checkpoint::parse(Some(bad)).unwrap_err();
            assert!(matches!(err, PersistenceError::InvalidCheckpoint(_)), "{bad} accepted");
        }
    }

    #[test]
    fn test_ordering_is_numeric_not_lexical() {
        let nine: Checkpoint = "9".parse().unwrap();
        let ten: Checkpoint = "10".parse().unwrap();
        assert!(nine < ten);
        assert_eq!(ten.token(), "10");
    }
}
