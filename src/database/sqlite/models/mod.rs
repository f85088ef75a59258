
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

/// A document known to the system; bookkeeping source of truth for uploads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DocumentRecord {
    pub id: i64,
    pub filename: String,
    pub original_filename: String,
    pub file_path: String,
    pub file_type: String,
    pub file_size: i64,
    pub status: DocumentStatus,
    pub chunk_count: i64,
    pub error_message: Option<String>,
    pub created_date: NaiveDateTime,
    pub updated_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for DocumentStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            DocumentStatus::Processing => write!(f, "Processing"),
            DocumentStatus::Completed => write!(f, "Completed"),
            DocumentStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub filename: String,
    pub original_filename: String,
    pub file_path: String,
    pub file_type: String,
    pub file_size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DocumentUpdate {
    pub status: Option<DocumentStatus>,
    pub chunk_count: Option<i64>,
    pub error_message: Option<String>,
}

impl DocumentRecord {
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status == DocumentStatus::Completed
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.status == DocumentStatus::Failed
    }
}
