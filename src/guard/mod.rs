//! Record creation with generated identifiers.
//!
//! The guard turns a collection's template into a unique identifier by
//! composing a candidate and letting storage's uniqueness constraint decide.
//! Conflicts are resolved by retrying with a fresh sequence number and fresh
//! random draws, up to a configured bound. Nothing is locked across attempts:
//! unrelated creators never wait on each other.

mod config;

use std::borrow::Cow;
use std::sync::Arc;

use crate::contracts::{
    scope_key, validate_collection_id, ComposeError, IdError, NewRecord, RecordStore,
    SequenceAllocator, StorageError, StoredRecord,
};
use crate::metrics::IdentifierMetrics;
use crate::template::{compose, preview, ComposeContext, Template};

pub use config::{GuardConfig, DEFAULT_MAX_ATTEMPTS};

/// A collection that owns records and, optionally, an identifier template.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub id: String,
    pub template: Option<Template>,
}

impl Collection {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template: None,
        }
    }

    pub fn with_template(mut self, template: Template) -> Self {
        self.template = Some(template);
        self
    }

    /// Counter scope key for this collection.
    pub fn scope_key(&self) -> String {
        scope_key(&self.id)
    }

    /// The configured template, or the bare-sequence default.
    pub fn template(&self) -> Cow<'_, Template> {
        match &self.template {
            Some(template) => Cow::Borrowed(template),
            None => Cow::Owned(Template::default_sequence()),
        }
    }
}

/// Caller-provided content of a record to create.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub fields: serde_json::Value,
    pub created_by: Option<String>,
    /// Explicit identifier. When set the generator is skipped; a value that
    /// is blank after trimming is rejected.
    pub custom_id: Option<String>,
}

impl Default for RecordDraft {
    fn default() -> Self {
        Self::new(serde_json::Value::Object(serde_json::Map::new()))
    }
}

impl RecordDraft {
    pub fn new(fields: serde_json::Value) -> Self {
        Self {
            fields,
            created_by: None,
            custom_id: None,
        }
    }

    pub fn created_by(mut self, user: impl Into<String>) -> Self {
        self.created_by = Some(user.into());
        self
    }

    pub fn with_custom_id(mut self, custom_id: impl Into<String>) -> Self {
        self.custom_id = Some(custom_id.into());
        self
    }
}

/// Creates records whose identifiers are unique within their collection.
pub struct UniquenessGuard<A, S> {
    allocator: Arc<A>,
    store: Arc<S>,
    config: GuardConfig,
    metrics: Arc<IdentifierMetrics>,
}

impl<T> UniquenessGuard<T, T>
where
    T: SequenceAllocator + RecordStore,
{
    /// Guard over a storage backend that provides both counters and records.
    pub fn with_storage(storage: Arc<T>, config: GuardConfig) -> Self {
        Self::new(Arc::clone(&storage), storage, config)
    }
}

impl<A, S> UniquenessGuard<A, S>
where
    A: SequenceAllocator,
    S: RecordStore,
{
    pub fn new(allocator: Arc<A>, store: Arc<S>, config: GuardConfig) -> Self {
        Self {
            allocator,
            store,
            config,
            metrics: Arc::new(IdentifierMetrics::new()),
        }
    }

    /// Shares an existing metrics registry instead of a private one.
    pub fn with_metrics(mut self, metrics: Arc<IdentifierMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<IdentifierMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Creates a record using the configured attempt bound.
    pub fn create_with_generated_id(
        &self,
        collection: &Collection,
        draft: RecordDraft,
    ) -> Result<StoredRecord, IdError> {
        self.create_with_attempts(collection, draft, self.config.max_attempts)
    }

    /// Creates a record, trying at most `max_attempts` generated identifiers.
    ///
    /// An explicit identifier in the draft is inserted exactly once and never
    /// touches the allocator. Only uniqueness violations are retried; every
    /// other error is returned as-is. Invalid collection ids fail before any
    /// sequence number is allocated.
    pub fn create_with_attempts(
        &self,
        collection: &Collection,
        draft: RecordDraft,
        max_attempts: u32,
    ) -> Result<StoredRecord, IdError> {
        let RecordDraft {
            fields,
            created_by,
            custom_id,
        } = draft;

        validate_collection_id(&collection.id)?;

        if let Some(custom_id) = custom_id {
            let custom_id = custom_id.trim();
            if custom_id.is_empty() {
                return Err(StorageError::InvalidInput(
                    "custom identifier must not be blank".into(),
                )
                .into());
            }
            return self.insert_explicit(collection, custom_id.to_string(), fields, created_by);
        }

        let template = collection.template();
        if !template.enabled {
            return Err(ComposeError::TemplateDisabled.into());
        }
        let needs_sequence = template.needs_sequence();
        let scope = collection.scope_key();
        let max_attempts = max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let mut ctx = ComposeContext::now();
            if needs_sequence {
                let sequence = self.allocator.next_sequence(&scope)?;
                self.metrics.record_sequence_allocated();
                ctx = ctx.with_sequence(sequence);
            }

            let candidate = compose(&template, &ctx, &mut rand::rng())?;
            let custom_id = candidate.trim().to_string();
            tracing::debug!(
                collection = %collection.id,
                attempt,
                sequence = ?ctx.sequence,
                custom_id = %custom_id,
                "Inserting record with generated identifier"
            );

            let record = NewRecord {
                collection_id: collection.id.clone(),
                custom_id,
                fields: fields.clone(),
                created_by: created_by.clone(),
            };
            match self.store.insert(record) {
                Ok(stored) => {
                    self.metrics.record_created(attempt);
                    return Ok(stored);
                }
                Err(e) if e.is_unique_violation() => {
                    self.metrics.record_conflict();
                    tracing::warn!(
                        collection = %collection.id,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Generated identifier collided, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.metrics.record_exhausted();
        tracing::warn!(
            collection = %collection.id,
            max_attempts,
            "Gave up generating a unique identifier"
        );
        Err(IdError::IdentifierExhausted {
            collection: collection.id.clone(),
            attempts: max_attempts,
        })
    }

    fn insert_explicit(
        &self,
        collection: &Collection,
        custom_id: String,
        fields: serde_json::Value,
        created_by: Option<String>,
    ) -> Result<StoredRecord, IdError> {
        let record = NewRecord {
            collection_id: collection.id.clone(),
            custom_id,
            fields,
            created_by,
        };
        match self.store.insert(record) {
            Ok(stored) => {
                self.metrics.record_explicit();
                Ok(stored)
            }
            Err(StorageError::UniqueViolation { custom_id, .. }) => {
                Err(IdError::DuplicateIdentifier {
                    collection: collection.id.clone(),
                    custom_id,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Renders what the next generated identifier would look like, without
    /// allocating a sequence number or writing anything.
    pub fn preview(&self, collection: &Collection) -> Result<String, IdError> {
        let template = collection.template();
        let next = self
            .allocator
            .current_sequence(&collection.scope_key())?
            .saturating_add(1);
        Ok(preview(&template, chrono::Utc::now(), next, &mut rand::rng())?)
    }
}
