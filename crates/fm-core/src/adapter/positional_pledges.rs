//! Headerless payment-processor dump: `date, name, email, amount[, reward]`.

use super::{ensure_width, split_full_name, ExtractedRow, RowError};
use crate::ids::{LegacyId, SourceName};
use crate::normalize::{normalize_email, normalize_text, parse_amount, parse_date};
use crate::record::{LegacyRow, NormalizedDonorRecord, StagingPledgeRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PositionalPledgeRow<'a> {
    pub date: &'a str,
    pub name: &'a str,
    pub email: &'a str,
    pub amount: &'a str,
    pub reward: Option<&'a str>,
}

impl<'a> PositionalPledgeRow<'a> {
    pub const MIN_COLUMNS: usize = 4;

    pub fn decode(row: &'a LegacyRow) -> Result<Self, RowError> {
        ensure_width(row, Self::MIN_COLUMNS)?;
        Ok(Self {
            date: row.field(0),
            name: row.field(1),
            email: row.field(2),
            amount: row.field(3),
            reward: row.fields.get(4),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PositionalPledgesAdapter {
    pub(crate) source: SourceName,
}

impl PositionalPledgesAdapter {
    pub fn new(source: SourceName) -> Self {
        Self { source }
    }

    pub fn extract(&self, row: &LegacyRow) -> Result<ExtractedRow, RowError> {
        let typed = PositionalPledgeRow::decode(row)?;
        let email = normalize_email(typed.email);
        let pledge_date = parse_date(typed.date);
        let (first_name, last_name, full_name) = split_full_name(typed.name);

        let mut donor = NormalizedDonorRecord::new(
            LegacyId::synthetic(&self.source, row.line_no),
            self.source.clone(),
        );
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
