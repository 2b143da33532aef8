use crate::error::BatchFailure;
use crate::event::Notification;
use crate::processor::ImageProcessor;
use aws_lambda_events::event::s3::{S3Event, S3EventRecord};
use lambda_runtime::LambdaEvent;
use tracing::{error, info};

impl From<&S3EventRecord> for Notification {
    fn from(record: &S3EventRecord) -> Self {
        Self {
            event_name: record.event_name.clone().unwrap_or_default(),
            key: record.s3.object.key.clone(),
        }
    }
}

/// Convert an S3 event into notifications, keeping record order
pub fn notifications(event: &S3Event) -> Vec<Notification> {
    event.records.iter().map(Notification::from).collect()
}

/// Lambda entry point for S3 object notifications.
///
/// Returning an error fails the invocation so the platform redelivers the
/// whole event.
pub async fn handle_s3_event(
    processor: &ImageProcessor,
    event: LambdaEvent<S3Event>,
) -> Result<(), BatchFailure> {
    let records = notifications(&event.payload);

    info!(
        request_id = %event.context.request_id,
        records = records.len(),
        "Received S3 event"
    );

    match processor.process_batch(records).await {
        Ok(_) => Ok(()),
        Err(failure) => {
            // The failure is returned whether or not the records serialize
            match serde_json::to_string(&failure.records) {
                Ok(records) => error!(error = %failure, records = %records, "Returning batch for redelivery"),
                Err(e) => error!(error = %failure, serialize_error = %e, "Returning batch for redelivery"),
            }
            Err(failure)
        }
    }
}
