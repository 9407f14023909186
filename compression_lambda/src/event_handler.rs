use aws_lambda_events::event::s3::{S3Event, S3EventRecord};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::Tag;
use aws_sdk_s3::Client as S3Client;
use lambda_runtime::{tracing, Error, LambdaEvent};
use percent_encoding::percent_decode_str;

use crate::config::Config;
use crate::error::{CompressionError, Result};
use crate::transcode::{transcode_to_jpeg_async, JPEG_CONTENT_TYPE};

pub const COMPRESSED_TAG_KEY: &str = "compressed";
pub const COMPRESSED_TAG_VALUE: &str = "true";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CompressionOutcome {
    /// Already carries `compressed=true`; nothing was read or written.
    Skipped,
    Compressed {
        original_bytes: usize,
        compressed_bytes: usize,
        width: u32,
        height: u32,
    },
    /// The object changed between our read and our write; the other writer's
    /// version stands.
    LostRace,
}

fn object_ref(record: &S3EventRecord) -> Result<ObjectRef> {
    let bucket = record
        .s3
        .bucket
        .name
        .clone()
        .ok_or(CompressionError::MissingBucket)?;
    let raw_key = record
        .s3
        .object
        .key
        .as_deref()
        .ok_or(CompressionError::MissingKey)?;
    Ok(ObjectRef {
        bucket,
        key: decode_key(raw_key)?,
    })
}

// keys arrive form-encoded: '+' for spaces, %XX for everything else
fn decode_key(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|key| key.into_owned())
        .map_err(|_| CompressionError::InvalidKey(raw.to_string()))
}

pub fn is_compressed(tags: &[Tag]) -> bool {
    tags.iter()
        .find(|tag| tag.key() == COMPRESSED_TAG_KEY)
        .is_some_and(|tag| tag.value() == COMPRESSED_TAG_VALUE)
}

fn s3_error<E>(operation: &'static str, object: &ObjectRef, err: E) -> CompressionError
where
    E: std::error::Error + 'static,
{
    CompressionError::S3 {
        operation,
        bucket: object.bucket.clone(),
        key: object.key.clone(),
        message: DisplayErrorContext(&err).to_string(),
    }
}

async fn read_compressed_tag(s3_client: &S3Client, object: &ObjectRef) -> Result<bool> {
    let tagging = s3_client
        .get_object_tagging()
        .bucket(&object.bucket)
        .key(&object.key)
        .send()
        .await
        .map_err(|e| s3_error("GetObjectTagging", object, e))?;
    Ok(is_compressed(tagging.tag_set()))
}

pub(crate) async fn compress_object(
    s3_client: &S3Client,
    object: &ObjectRef,
    config: &Config,
) -> Result<CompressionOutcome> {
    if read_compressed_tag(s3_client, object).await? {
        return Ok(CompressionOutcome::Skipped);
    }

    let original = s3_client
        .get_object()
        .bucket(&object.bucket)
        .key(&object.key)
        .send()
        .await
        .map_err(|e| s3_error("GetObject", object, e))?;
    let e_tag = original.e_tag().map(str::to_string);

    // The object may have been rewritten (and tagged) after the first tag read.
    // If-Match below only covers the version read here, so look again.
    if original.tag_count().unwrap_or_default() > 0
        && read_compressed_tag(s3_client, object).await?
    {
        return Ok(CompressionOutcome::Skipped);
    }
    let body = original
        .body
        .collect()
        .await
        .map_err(|e| CompressionError::Body {
            bucket: object.bucket.clone(),
            key: object.key.clone(),
            message: e.to_string(),
        })?
        .into_bytes();
    let original_bytes = body.len();

    let transcoded = transcode_to_jpeg_async(body, config.quality).await?;
    let compressed_bytes = transcoded.data.len();

    // Without If-Match two invocations for the same key can both pass the tag
    // check and both write.
    let if_match = e_tag.filter(|_| config.conditional_writes);
    let written = s3_client
        .put_object()
        .bucket(&object.bucket)
        .key(&object.key)
        .body(ByteStream::from(transcoded.data))
        .content_type(JPEG_CONTENT_TYPE)
        .tagging(format!("{COMPRESSED_TAG_KEY}={COMPRESSED_TAG_VALUE}"))
        .set_if_match(if_match)
        .send()
        .await;

    match written {
        Ok(_) => Ok(CompressionOutcome::Compressed {
            original_bytes,
            compressed_bytes,
            width: transcoded.width,
            height: transcoded.height,
        }),
        Err(err) if is_precondition_failure(err.code()) => Ok(CompressionOutcome::LostRace),
        Err(err) => Err(s3_error("PutObject", object, err)),
    }
}

fn is_precondition_failure(code: Option<&str>) -> bool {
    matches!(
        code,
        Some("PreconditionFailed") | Some("ConditionalRequestConflict")
    )
}

pub(crate) async fn function_handler(
    event: LambdaEvent<S3Event>,
    s3_client: &S3Client,
    config: &Config,
) -> std::result::Result<(), Error> {
    let payload = event.payload;
    if payload.records.is_empty() {
        tracing::warn!("No records found in S3 event");
        return Ok(());
    }
    for record in &payload.records {
        let object = object_ref(record)?;
        let outcome = compress_object(s3_client, &object, config).await?;
        match outcome {
            CompressionOutcome::Skipped => {
                tracing::info!(
                    bucket = %object.bucket,
                    key = %object.key,
                    "already compressed, skipping"
                );
            }
            CompressionOutcome::Compressed {
                original_bytes,
                compressed_bytes,
                width,
                height,
            } => {
                tracing::info!(
                    bucket = %object.bucket,
                    key = %object.key,
                    original_bytes,
                    compressed_bytes,
                    width,
                    height,
                    "compressed image"
                );
            }
            CompressionOutcome::LostRace => {
                tracing::info!(
                    bucket = %object.bucket,
                    key = %object.key,
                    "object replaced while compressing, leaving the newer version"
                );
            }
        }
    }
    Ok(())
}
