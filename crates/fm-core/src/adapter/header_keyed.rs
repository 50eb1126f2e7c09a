//! Platform exports with a header row.
//!
//! Column positions are discovered once from the header by matching
//! header names against role patterns; every data row is then decoded
//! through the resolved [`HeaderKeyedSchema`].

use super::{split_full_name, ExtractedRow, RowError};
use crate::error::{CoreError, CoreResult};
use crate::ids::{LegacyId, SourceName};
use crate::normalize::{normalize_email, normalize_text, parse_amount, parse_date};
use crate::record::{LegacyRow, NormalizedDonorRecord, StagingPledgeRecord};
use regex::Regex;
use std::sync::OnceLock;

struct RolePatterns {
    email: Regex,
    amount: Regex,
    date: Regex,
    reward: Regex,
    name: Regex,
    id: Regex,
}

static ROLE_PATTERNS: OnceLock<RolePatterns> = OnceLock::new();

fn role_patterns() -> &'static RolePatterns {
    ROLE_PATTERNS.get_or_init(|| RolePatterns {
        email: Regex::new(r"(?i)email").expect("valid regex literal"),
        amount: Regex::new(r"(?i)amount|usd|contrib").expect("valid regex literal"),
        date: Regex::new(r"(?i)date|time|pledged|created").expect("valid regex literal"),
        reward: Regex::new(r"(?i)reward|perk|tier").expect("valid regex literal"),
        name: Regex::new(r"(?i)name").expect("valid regex literal"),
        id: Regex::new(r"(?i)(^|[^a-z])id$").expect("valid regex literal"),
    })
}

/// Column index per role, resolved from a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderKeyedSchema {
    pub email: usize,
    pub amount: usize,
    pub date: Option<usize>,
    pub reward: Option<usize>,
    pub name: Option<usize>,
    pub id: Option<usize>,
}

impl HeaderKeyedSchema {
    /// Resolve column roles from header names.
    ///
    /// Email and amount are required. A column is claimed by at most one
    /// role; an amount column that also looks like a date ("Contribution
    /// Date") is only used when nothing better exists.
    pub fn resolve(source: &SourceName, headers: &[&str]) -> CoreResult<Self> {
        let p = role_patterns();
        let mut claimed: Vec<usize> = Vec::new();

        let find = |claimed: &[usize], pred: &dyn Fn(&str) -> bool| -> Option<usize> {
            headers
                .iter()
                .enumerate()
                .find(|(i, h)| !claimed.contains(i) && pred(h.trim()))
                .map(|(i, _)| i)
        };

        let missing = |column: &'static str| CoreError::MissingColumn {
            source_name: source.to_string(),
            column,
            headers: headers.join(", "),
        };

        let email =
            find(&claimed, &|h: &str| p.email.is_match(h)).ok_or_else(|| missing("email"))?;
        claimed.push(email);

        let amount = find(&claimed, &|h: &str| p.amount.is_match(h) && !p.date.is_match(h))
            .or_else(|| find(&claimed, &|h: &str| p.amount.is_match(h)))
            .ok_or_else(|| missing("amount"))?;
        claimed.push(amount);

        let id = find(&claimed, &|h: &str| p.id.is_match(h));
        claimed.extend(id);
        let date = find(&claimed, &|h: &str| p.date.is_match(h));
        claimed.extend(date);
        let reward = find(&claimed, &|h: &str| p.reward.is_match(h));
        claimed.extend(reward);
        let name = find(&claimed, &|h: &str| p.name.is_match(h));

        Ok(Self {
            email,
            amount,
            date,
            reward,
            name,
            id,
        })
    }

    /// Narrowest row width that still holds both required columns.
    pub fn required_width(&self) -> usize {
        self.email.max(self.amount) + 1
    }
}

/// Typed view of one data row under a resolved schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeaderKeyedRow<'a> {
    pub id: Option<&'a str>,
    pub email: &'a str,
    pub amount: &'a str,
    pub date: Option<&'a str>,
    pub reward: Option<&'a str>,
    pub name: Option<&'a str>,
}

impl<'a> HeaderKeyedRow<'a> {
    pub fn decode(schema: &HeaderKeyedSchema, row: &'a LegacyRow) -> Result<Self, RowError> {
        super::ensure_width(row, schema.required_width())?;
        let opt = move |idx: Option<usize>| idx.and_then(|i| row.fields.get(i));
        Ok(Self {
            id: opt(schema.id),
            email: row.field(schema.email),
            amount: row.field(schema.amount),
            date: opt(schema.date),
            reward: opt(schema.reward),
            name: opt(schema.name),
        })
    }
}

#[derive(Debug, Clone)]
pub struct HeaderKeyedAdapter {
    pub(crate) source: SourceName,
    pub(crate) schema: HeaderKeyedSchema,
}

impl HeaderKeyedAdapter {
    pub fn from_header(source: SourceName, header: Option<&LegacyRow>) -> CoreResult<Self> {
        let header = header.ok_or_else(|| CoreError::MissingHeader {
            source_name: source.to_string(),
        })?;
        let names: Vec<&str> = header.fields.iter().collect();
        let schema = HeaderKeyedSchema::resolve(&source, &names)?;
        log::debug!("Resolved header layout for '{}': {:?}", source, schema);
        Ok(Self { source, schema })
    }

    pub fn schema(&self) -> &HeaderKeyedSchema {
        &self.schema
    }

    pub fn extract(&self, row: &LegacyRow) -> Result<ExtractedRow, RowError> {
        let typed = HeaderKeyedRow::decode(&self.schema, row)?;
        let legacy_id = typed
            .id
            .and_then(normalize_text)
            .and_then(LegacyId::try_new)
            .unwrap_or_else(|| LegacyId::synthetic(&self.source, row.line_no));
        let email = normalize_email(typed.email);
        let pledge_date = typed.date.and_then(parse_date);
        let (first_name, last_name, full_name) =
            typed.name.map(split_full_name).unwrap_or((None, None, None));

        let mut donor = NormalizedDonorRecord::new(legacy_id, self.source.clone());
        donor.email = email.clone();
        donor.first_name = first_name;
        donor.last_name = last_name;
        donor.donor_name = full_name.clone();
        donor.full_name = full_name;
        donor.created_at = pledge_date;

        let pledge = StagingPledgeRecord {
            line_no: row.line_no,
            email,
            amount_cents: parse_amount(typed.amount),
            pledge_date,
            reward_name: typed.reward.and_then(normalize_text),
            raw_line: row.raw_line.clone(),
        };

        Ok(ExtractedRow {
            donor,
            pledge: Some(pledge),
        })
    }
}
