//! Represents a document stored in a bin.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

/// Languages the extraction worker knows how to OCR.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum Language {
    Eng,
    Nep,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Eng => "eng",
            Language::Nep => "nep",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("language `{0}` not supported")]
pub struct UnsupportedLanguage(pub String);

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eng" => Ok(Language::Eng),
            "nep" => Ok(Language::Nep),
            other => Err(UnsupportedLanguage(other.to_string())),
        }
    }
}

/// Metadata for a single uploaded document.
///
/// The payload itself lives in the object store under a key derived from
/// the owner's email, the bin and the reference name.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: i64,

    /// Original filename of the upload.
    pub name: String,

    /// Caller-chosen name, unique within the bin.
    pub reference_name: String,

    #[serde(rename = "bin")]
    pub bin_id: i64,

    /// Text written back by the extraction worker. Empty until then.
    pub extract: String,

    pub language: Language,

    pub created_at: DateTime<Utc>,
}

/// Input for inserting a document row after its blob was stored.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub name: String,
    pub reference_name: String,
    pub bin_id: i64,
    pub language: Language,
}

/// Suffix after the last `.` of a filename, empty when there is none.
pub fn file_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => "",
    }
}

impl Document {
    /// File extension of the original upload, without the dot.
    pub fn extension(&self) -> &str {
        file_extension(&self.name)
    }
}
