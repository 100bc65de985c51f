// src/health/status.rs
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Severity of a dependency check. Ordered by rank, worst last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Status {
    #[default]
    NotSet = 0,
    OK = 1,
    Warning = 2,
    Critical = 3,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0} is not a valid Status, try [NotSet, OK, Warning, Critical]")]
pub struct ParseStatusError(pub String);

impl Status {
    pub const ALL: [Status; 4] = [
        Status::NotSet,
        Status::OK,
        Status::Warning,
        Status::Critical,
    ];

    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        Self::ALL.get(rank as usize).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::NotSet => "NotSet",
            Status::OK => "OK",
            Status::Warning => "Warning",
            Status::Critical => "Critical",
        }
    }

    /// Parses one of the four labels. On failure the error is returned alongside
    /// `NotSet`, so callers that only want a value can ignore the error.
    pub fn parse(text: &str) -> (Status, Option<ParseStatusError>) {
        match text.parse() {
            Ok(status) => (status, None),
            Err(e) => (Status::NotSet, Some(e)),
        }
    }
}

/// Renders a raw rank, falling back to `Status(<rank>)` for ranks outside the enum.
pub fn rank_label(rank: u8) -> Cow<'static, str> {
    match Status::from_rank(rank) {
        Some(status) => Cow::Borrowed(status.as_str()),
        None => Cow::Owned(format!("Status({})", rank)),
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
