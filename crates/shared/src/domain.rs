use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

macro_rules! uuid_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

uuid_newtype!(SummaryId);
uuid_newtype!(DiagnosisId);
uuid_newtype!(FeedbackId);

/// Patients are keyed by an opaque string; the collaborator has emitted both
/// string and integer forms, so both are accepted on the wire.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PatientId(pub String);

impl PatientId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PatientId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(value) => Self(value),
            Raw::Number(value) => Self(value.to_string()),
        })
    }
}

/// Column the summary list is filtered on. The wire name doubles as the
/// query parameter name of the list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    #[default]
    Keyword,
    FileName,
    PatientId,
}

impl SearchField {
    pub const ALL: [SearchField; 3] = [
        SearchField::Keyword,
        SearchField::FileName,
        SearchField::PatientId,
    ];

    pub const fn as_param(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::FileName => "file_name",
            Self::PatientId => "patient_id",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Keyword => "Keyword",
            Self::FileName => "File Name",
            Self::PatientId => "Patient ID",
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSearchField(pub String);

impl fmt::Display for UnknownSearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown search field '{}'; expected keyword, file_name or patient_id",
            self.0
        )
    }
}

impl std::error::Error for UnknownSearchField {}

impl FromStr for SearchField {
    type Err = UnknownSearchField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|field| field.as_param() == normalized)
            .ok_or_else(|| UnknownSearchField(s.to_string()))
    }
}
