//! Row enrichment applied to arriving records before planning.

use crate::{clock::format_timestamp, error::Result, Clock, ConfigError, KeyGenerator};
use crate::{PlannerConfig, Record};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Writes derived fields (synthetic keys, last-updated stamps) into records.
///
/// Each record is enriched independently. The input batch is never
/// modified; enriched copies are returned in the same order.
#[derive(Clone)]
pub struct Enricher {
    synthetic_key_field: Option<String>,
    synthetic_keys: bool,
    last_updated_field: Option<String>,
    clock: Arc<dyn Clock>,
    keys: Arc<dyn KeyGenerator>,
}

impl Enricher {
    pub fn new(config: &PlannerConfig, clock: Arc<dyn Clock>, keys: Arc<dyn KeyGenerator>) -> Self {
        Self {
            synthetic_key_field: config.key_fields().first().cloned(),
            synthetic_keys: config.synthetic_keys(),
            last_updated_field: config.last_updated_field().map(str::to_string),
            clock,
            keys,
        }
    }

    /// Enrich a batch, reading the clock once.
    ///
    /// Fails if synthetic keys are enabled without a key field, even for an
    /// empty batch.
    pub fn enrich(&self, batch: &[Record]) -> Result<Vec<Record>> {
        self.enrich_at(batch, self.clock.now())
    }

    /// Enrich a batch as of `now`.
    pub fn enrich_at(&self, batch: &[Record], now: DateTime<Utc>) -> Result<Vec<Record>> {
        let key_field = match (self.synthetic_keys, &self.synthetic_key_field) {
            (true, None) => return Err(ConfigError::SyntheticKeyWithoutKeyFields.into()),
            (true, Some(field)) => Some(field.as_str()),
            (false, _) => None,
        };

        let stamp = self
            .last_updated_field
            .as_deref()
            .map(|field| (field, format_timestamp(now)));

        Ok(batch
            .iter()
            .map(|record| {
                let mut enriched = record.clone();
                if let Some(field) = key_field {
                    enriched.set(field, self.keys.generate());
                }
                if let Some((field, ts)) = &stamp {
                    enriched.set(*field, ts.as_str());
                }
                enriched
            })
            .collect())
    }

    /// Stamp the last-updated field on a single record, if configured.
    pub fn touch(&self, record: &mut Record, now: DateTime<Utc>) {
        if let Some(field) = &self.last_updated_field {
            record.set(field.as_str(), format_timestamp(now));
        }
    }

    pub fn last_updated_field(&self) -> Option<&str> {
        self.last_updated_field.as_deref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher")
            .field("synthetic_key_field", &self.synthetic_key_field)
            .field("synthetic_keys", &self.synthetic_keys)
            .field("last_updated_field", &self.last_updated_field)
            .finish_non_exhaustive()
    }
}
