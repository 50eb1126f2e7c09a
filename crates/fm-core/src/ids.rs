//! Strongly-typed identifiers shared across the pipeline.
//!
//! Legacy exports pad and blank identifiers freely, so both types trim
//! their input and refuse values that are blank after trimming.

macro_rules! identifier {
    (
        $(#[$meta:meta])*
        pub struct $Name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
        #[serde(transparent)]
        pub struct $Name(String);

        impl $Name {
            /// Wrap a value known to be non-blank; panics otherwise.
            pub fn new(value: impl Into<String>) -> Self {
                match Self::try_new(value) {
                    Some(id) => id,
                    None => panic!(concat!(stringify!($Name), " must not be blank")),
                }
            }

            /// Trimmed value, or `None` when nothing is left.
            pub fn try_new(value: impl Into<String>) -> Option<Self> {
                let value = value.into();
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    None
                } else if trimmed.len() == value.len() {
                    Some(Self(value))
                } else {
                    Some(Self(trimmed.to_string()))
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl<'de> serde::Deserialize<'de> for $Name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                $Name::try_new(raw).ok_or_else(|| {
                    serde::de::Error::custom(concat!(stringify!($Name), " must not be blank"))
                })
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::ops::Deref for $Name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $Name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<&str> for $Name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<str> for $Name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }
    };
}

identifier! {
    /// Name of a configured legacy source (e.g. `kickstarter`).
    ///
    /// Also used to derive staging table names, so it is restricted to
    /// `[a-z0-9_]` by config validation.
    pub struct SourceName;
}

identifier! {
    /// Identifier a record carried in the system it was exported from.
    ///
    /// Not guaranteed unique across source files.
    pub struct LegacyId;
}

impl SourceName {
    /// Staging table holding this source's donor records.
    pub fn donor_staging_table(&self) -> String {
        format!("staging_{}_donors", self.0)
    }

    /// Staging table holding this source's pledge records.
    pub fn pledge_staging_table(&self) -> String {
        format!("staging_{}_pledges", self.0)
    }

    /// Tag written to `pledges.source` for pledges applied from this source.
    pub fn pledge_source_tag(&self) -> String {
        format!("staging:{}", self.0)
    }
}

impl LegacyId {
    /// Synthesize an id for sources that carry none: `<source>:<line>`.
    pub fn synthetic(source: &SourceName, line_no: u64) -> Self {
        Self(format!("{}:{}", source, line_no))
    }
}
