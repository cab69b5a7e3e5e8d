//! Message identifiers
//!
//! Ids start with both participants' keys so they can be traced back to a
//! conversation by eye. The first message's id also names the conversation.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timestamp::DateFormat;

/// Shared by every generator in the process
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// How message ids are built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    /// `<other>_<me>_<formatted date>`; two ids in the same second collide
    Legacy,
    /// `<other>_<me>_<unix millis>_<sequence>_<random hex>`
    #[default]
    Unique,
}

impl IdStrategy {
    /// Build an id for a message from `me` to `other`
    pub fn generate(&self, other: &str, me: &str, now: DateTime<Utc>) -> String {
        match self {
            IdStrategy::Legacy => {
                format!("{}_{}_{}", other, me, DateFormat::Legacy.format(&now))
            }
            IdStrategy::Unique => {
                let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
                let mut nonce = [0u8; 4];
                rand::fill(&mut nonce);
                format!(
                    "{}_{}_{}_{}_{}",
                    other,
                    me,
                    now.timestamp_millis(),
                    seq,
                    hex::encode(nonce)
                )
            }
        }
    }
}
