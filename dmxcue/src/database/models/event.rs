//! Event log database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::time::{datetime_to_ms, ms_to_datetime};
use crate::events::EventRecord;

/// Event log row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EventDbModel {
    pub id: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub kind: String,
    pub detail: String,
    pub origin_ip: String,
}

impl EventDbModel {
    pub fn from_record(record: &EventRecord) -> Self {
        Self {
            id: record.id.clone(),
            created_at: datetime_to_ms(record.created),
            expires_at: datetime_to_ms(record.expires),
            kind: record.kind.clone(),
            detail: record.detail.clone(),
            origin_ip: record.origin_ip.clone(),
        }
    }

    pub fn into_record(self) -> EventRecord {
        EventRecord {
            id: self.id,
            created: ms_to_datetime(self.created_at),
            expires: ms_to_datetime(self.expires_at),
            kind: self.kind,
            detail: self.detail,
            origin_ip: self.origin_ip,
        }
    }
}
