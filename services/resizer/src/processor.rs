use crate::config::{Config, ConfigValidationError};
use crate::error::{BatchFailure, ResizeError};
use crate::event::{self, Notification};
use crate::imaging::ImageEngine;
use crate::object_store::{ObjectStore, UploadRequest};
use crate::output_key::{KeyContext, KeyTemplate};
use crate::profile::ProfileResolver;
use crate::sizes::compute_sizes;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, Span};

/// Summary line logged after a fully successful batch
pub fn completion_message(count: usize) -> String {
    format!(
        "Completed processing {} event{}",
        count,
        if count == 1 { "" } else { "s" }
    )
}

/// Runs validation, profile resolution, sizing, resizing and uploads for
/// each notification of a batch
pub struct ImageProcessor {
    store: Arc<dyn ObjectStore>,
    engine: Arc<dyn ImageEngine>,
    profiles: ProfileResolver,
    key_template: KeyTemplate,
}

impl ImageProcessor {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        engine: Arc<dyn ImageEngine>,
        profiles: ProfileResolver,
        key_template: KeyTemplate,
    ) -> Self {
        Self {
            store,
            engine,
            profiles,
            key_template,
        }
    }

    /// Build a processor from validated configuration
    pub fn from_config(
        config: &Config,
        store: Arc<dyn ObjectStore>,
        engine: Arc<dyn ImageEngine>,
    ) -> Result<Self, ConfigValidationError> {
        Ok(Self::new(
            store,
            engine,
            config.profile_resolver(),
            config.key_template()?,
        ))
    }

    /// Process every notification concurrently.
    ///
    /// The first failure fails the batch and hands back all records so the
    /// platform can redeliver them; nothing is acknowledged partially.
    pub async fn process_batch(&self, records: Vec<Notification>) -> Result<usize, BatchFailure> {
        let count = records.len();

        let result = try_join_all(records.iter().map(|n| self.process_notification(n))).await;

        match result {
            Ok(outputs) => {
                let uploaded: usize = outputs.iter().map(Vec::len).sum();
                info!(events = count, outputs = uploaded, "{}", completion_message(count));
                Ok(count)
            }
            Err(source) => {
                metrics::counter!("resizer.batches.failed").increment(1);
                error!(
                    error = %source,
                    kind = source.kind(),
                    events = count,
                    "Failed to process batch"
                );
                Err(BatchFailure { source, records })
            }
        }
    }

    /// Process a single notification and return the keys written
    #[instrument(
        skip(self, notification),
        fields(event_name = %notification.event_name, key = tracing::field::Empty)
    )]
    pub async fn process_notification(
        &self,
        notification: &Notification,
    ) -> Result<Vec<String>, ResizeError> {
        let key = event::validate(notification)?;
        Span::current().record("key", key.as_str());

        let profile = self.profiles.resolve(&key);

        let source = self.store.get_object(&key).await?;
        let dimensions = self.engine.read_dimensions(&source.body)?;
        let sizes = compute_sizes(dimensions, &profile)?;

        debug!(
            key = %key,
            widths = ?sizes.widths(),
            heights = ?sizes.heights(),
            source_width = dimensions.width,
            source_height = dimensions.height,
            aspect_ratio = dimensions.aspect_ratio(),
            max_width = profile.max_width,
            max_height = ?profile.max_height,
            transform_mode = profile.transform_mode.as_str(),
            "Computed size set"
        );

        // Decoding and encoding are CPU-bound
        let engine = Arc::clone(&self.engine);
        let body = source.body.clone();
        let targets = sizes.clone();
        let outputs = tokio::task::spawn_blocking(move || engine.resize(&body, &targets))
            .await
            .map_err(|e| ResizeError::Transform(format!("resize task failed: {e}")))??;

        if outputs.len() != sizes.len() {
            return Err(ResizeError::Transform(format!(
                "expected {} derivatives, engine produced {}",
                sizes.len(),
                outputs.len()
            )));
        }

        let context = KeyContext {
            key: &key,
            content_type: source.content_type.as_deref(),
        };

        let uploads = sizes.targets().iter().zip(outputs).map(|(target, output)| {
            let request = UploadRequest {
                key: self
                    .key_template
                    .render(&context, target.label, &profile.output_dir),
                content_type: output.format.content_type().to_string(),
                body: output.data,
            };

            async move {
                let output_key = request.key.clone();
                let size_bytes = request.body.len() as u64;

                self.store.put_object(request).await?;

                metrics::counter!("resizer.outputs.uploaded").increment(1);
                metrics::counter!("resizer.bytes.uploaded").increment(size_bytes);
                Ok::<_, ResizeError>(output_key)
            }
        });

        let written = try_join_all(uploads).await?;

        metrics::counter!("resizer.notifications.processed").increment(1);
        info!(key = %key, outputs = written.len(), "Resized image");

        Ok(written)
    }
}
