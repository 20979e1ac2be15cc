use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::{Client, primitives::ByteStream};
use bytes::Bytes;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use crate::config::Config;
use crate::{Error, Result};
use super::{cancellable, ListPage, ListRequest, ObjectMeta, ObjectReader, ObjectStore, DELIMITER, DIRECTORY_CONTENT_TYPE};

const RANGE_NOT_SATISFIABLE: u16 = 416;

#[derive(Debug)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    endpoint: String,
    use_ssl: bool,
}

impl S3ObjectStore {
    pub async fn new(
        bucket: &str,
        endpoint: &str,
        region: Option<&str>,
        credentials: Option<(&str, &str)>,
        use_ssl: bool,
    ) -> Result<Self> {
        let region_provider = RegionProviderChain::first_try(region.map(|r| aws_config::Region::new(r.to_string())))
            .or_default_provider()
            .or_else("us-east-1");

        let mut config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(region_provider);

        if let Some((access_key_id, secret_access_key)) = credentials {
            config_builder = config_builder.credentials_provider(aws_sdk_s3::config::Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "static",
            ));
        }

        let endpoint = if endpoint.is_empty() || endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("{}://{}", protocol(use_ssl), endpoint)
        };

        if !endpoint.is_empty() {
            config_builder = config_builder.endpoint_url(&endpoint);
        }

        let config = config_builder.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            // Custom endpoints (MinIO and friends) rarely serve virtual-hosted buckets.
            .force_path_style(!endpoint.is_empty())
            .build();
        let client = Client::from_conf(s3_config);

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            endpoint,
            use_ssl,
        })
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        let storage = &config.storage;
        let credentials = match (&storage.access_key_id, &storage.secret_access_key) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        };

        Self::new(
            config.bucket()?,
            storage.endpoint.as_deref().unwrap_or_default(),
            storage.region.as_deref(),
            credentials,
            config.use_ssl(),
        )
        .await
    }

    pub fn protocol(&self) -> &str {
        protocol(self.use_ssl)
    }
}

fn protocol(use_ssl: bool) -> &'static str {
    if use_ssl {
        "https"
    } else {
        "http"
    }
}

fn to_chrono(dt: Option<&aws_sdk_s3::primitives::DateTime>) -> Option<chrono::DateTime<chrono::Utc>> {
    dt.and_then(|dt| chrono::DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
}

/// S3 listings carry no content type; a zero-length slash-terminated key is
/// treated as a directory marker.
fn inferred_content_type(key: &str, size: u64) -> Option<String> {
    if key.ends_with(DELIMITER) && size == 0 {
        Some(DIRECTORY_CONTENT_TYPE.to_string())
    } else {
        None
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn head_object(&self, key: &str, cancel: &CancellationToken) -> Result<Option<ObjectMeta>> {
        debug!("head_object s3://{}/{}", self.bucket, key);
        cancellable(cancel, async {
            match self.client.head_object().bucket(&self.bucket).key(key).send().await {
                Ok(response) => {
                    let size = response.content_length().unwrap_or(0).max(0) as u64;
                    let content_type = response
                        .content_type()
                        .map(str::to_string)
                        .or_else(|| inferred_content_type(key, size));
                    let updated = to_chrono(response.last_modified());
                    Ok(Some(ObjectMeta {
                        key: key.to_string(),
                        size,
                        content_type,
                        created: updated,
                        updated,
                    }))
                }
                Err(err) => {
                    if let Some(service_err) = err.as_service_error() {
                        if service_err.is_not_found() {
                            return Ok(None);
                        }
                    }
                    Err(Error::S3(err.into()))
                }
            }
        })
        .await
    }

    async fn list_page(&self, request: ListRequest, cancel: &CancellationToken) -> Result<ListPage> {
        debug!(
            "list_objects_v2 s3://{}/{} (token: {:?})",
            self.bucket, request.prefix, request.page_token
        );
        cancellable(cancel, async {
            let mut call = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .delimiter(&request.delimiter)
                .max_keys(request.page_size)
                .set_continuation_token(request.page_token.clone());

            if !request.prefix.is_empty() {
                call = call.prefix(&request.prefix);
            }

            let output = call.send().await.map_err(|e| Error::S3(e.into()))?;

            let items = output
                .contents()
                .iter()
                .filter_map(|obj| {
                    let key = obj.key()?;
                    let size = obj.size().unwrap_or(0).max(0) as u64;
                    let updated = to_chrono(obj.last_modified());
                    Some(ObjectMeta {
                        key: key.to_string(),
                        size,
                        content_type: inferred_content_type(key, size),
                        created: updated,
                        updated,
                    })
                })
                .collect();

            let prefixes = output
                .common_prefixes()
                .iter()
                .filter_map(|p| p.prefix().map(str::to_string))
                .collect();

            let next_page_token = if output.is_truncated() == Some(true) {
                output.next_continuation_token().map(str::to_string)
            } else {
                None
            };

            Ok(ListPage {
                items,
                prefixes,
                next_page_token,
            })
        })
        .await
    }

    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!("put_object s3://{}/{} ({} bytes)", self.bucket, key, data.len());
        cancellable(cancel, async {
            let mut request = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(data));

            if let Some(content_type) = content_type {
                request = request.content_type(content_type);
            }

            request.send().await.map_err(|e| Error::S3(e.into()))?;
            Ok(())
        })
        .await
    }

    async fn copy_object(&self, source: &str, dest: &str, cancel: &CancellationToken) -> Result<()> {
        debug!("copy_object s3://{}/{} -> {}", self.bucket, source, dest);
        // CopySource is bucket/key with the key percent-encoded.
        let copy_source = format!(
            "{}/{}",
            self.bucket,
            utf8_percent_encode(source, NON_ALPHANUMERIC)
        );

        cancellable(cancel, async {
            self.client
                .copy_object()
                .bucket(&self.bucket)
                .key(dest)
                .copy_source(copy_source)
                .send()
                .await
                .map_err(|e| Error::S3(e.into()))?;
            Ok(())
        })
        .await
    }

    async fn delete_object(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        debug!("delete_object s3://{}/{}", self.bucket, key);
        cancellable(cancel, async {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| Error::S3(e.into()))?;
            Ok(())
        })
        .await
    }

    async fn open_read(&self, key: &str, offset: u64, cancel: &CancellationToken) -> Result<ObjectReader> {
        debug!("get_object s3://{}/{} from byte {}", self.bucket, key, offset);
        cancellable(cancel, async {
            let mut request = self.client.get_object().bucket(&self.bucket).key(key);
            if offset > 0 {
                request = request.range(format!("bytes={}-", offset));
            }

            match request.send().await {
                Ok(response) => Ok(Box::pin(response.body.into_async_read()) as ObjectReader),
                Err(err) => {
                    let status = err.raw_response().map(|r| r.status().as_u16());
                    if status == Some(RANGE_NOT_SATISFIABLE) {
                        return Ok(Box::pin(tokio::io::empty()) as ObjectReader);
                    }
                    if let Some(service_err) = err.as_service_error() {
                        if service_err.is_no_such_key() {
                            return Err(Error::NotFound(key.to_string()));
                        }
                    }
                    Err(Error::S3(err.into()))
                }
            }
        })
        .await
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl std::fmt::Display for S3ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "S3ObjectStore(bucket: {}, endpoint: {}, protocol: {})",
            self.bucket, self.endpoint, self.protocol()
        )
    }
}
