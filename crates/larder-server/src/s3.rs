//! S3-compatible origin client built on the AWS SDK

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use larder_cache::{CacheError, CacheResult, Origin, OriginObject, RangeSpec};

use crate::config::Config;

/// Origin client for any S3-compatible store (MinIO, AWS S3, ...).
///
/// Built once at startup and shared across all requests. Path-style
/// addressing is always used so bare `host:port` endpoints work.
pub struct S3Origin {
    client: Client,
}

impl S3Origin {
    pub fn new(config: &Config) -> Self {
        let endpoint_url = normalize_endpoint(&config.s3_endpoint, config.s3_use_ssl);
        let credentials = aws_sdk_s3::config::Credentials::new(
            config.s3_access_key.clone(),
            config.s3_secret_key.clone(),
            None, // session token
            None, // expiration
            "larder-config",
        );

        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.s3_region.clone()))
            .endpoint_url(endpoint_url)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
        }
    }
}

#[async_trait]
impl Origin for S3Origin {
    async fn fetch(&self, bucket: &str, key: &str, range: RangeSpec) -> CacheResult<OriginObject> {
        let mut request = self.client.get_object().bucket(bucket).key(key);
        if let Some(header) = range_header(range) {
            request = request.range(header);
        }

        let output = request
            .send()
            .await
            .map_err(|e| map_origin_error(e, bucket, key))?;

        let content_type = output
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        // For ranged reads the total size lives in Content-Range; otherwise
        // the body length is the object length
        let total_size = match output.content_range().and_then(parse_content_range_total) {
            Some(total) => total,
            None => output
                .content_length()
                .and_then(|len| u64::try_from(len).ok())
                .ok_or_else(|| CacheError::Origin {
                    context: format!("{}/{}", bucket, key),
                    source: "origin response carried no object size".into(),
                })?,
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| CacheError::Origin {
                context: format!("{}/{}", bucket, key),
                source: Box::new(e),
            })?
            .into_bytes();

        Ok(OriginObject {
            data,
            content_type,
            total_size,
        })
    }
}

/// Handle bare `host:port` endpoints by prepending a scheme chosen from the
/// TLS flag. Endpoints that already carry a scheme pass through untouched.
fn normalize_endpoint(endpoint: &str, use_ssl: bool) -> String {
    let lower = endpoint.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        endpoint.to_string()
    } else if use_ssl {
        format!("https://{}", endpoint)
    } else {
        format!("http://{}", endpoint)
    }
}

/// Render a range as an HTTP Range header value, or `None` for a full read.
/// An end without a start reads from the first byte, not a suffix.
fn range_header(range: RangeSpec) -> Option<String> {
    match (range.start, range.end) {
        (None, None) => None,
        (Some(start), Some(end)) => Some(format!("bytes={}-{}", start, end)),
        (Some(start), None) => Some(format!("bytes={}-", start)),
        (None, Some(end)) => Some(format!("bytes=0-{}", end)),
    }
}

/// Pull the total object size out of a `Content-Range` value like
/// `bytes 0-4/11`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

fn map_origin_error<E>(err: aws_sdk_s3::error::SdkError<E>, bucket: &str, key: &str) -> CacheError
where
    E: std::error::Error + Send + Sync + 'static,
{
    if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err {
        // The origin applies its own range check for reads we cannot
        // resolve locally; its refusal is still the client's error
        if service_err.raw().status().as_u16() == 416 {
            return CacheError::InvalidRange(format!(
                "origin rejected requested range for {}/{}",
                bucket, key
            ));
        }
    }
    CacheError::Origin {
        context: format!("{}/{}", bucket, key),
        source: Box::new(err),
    }
}
