//! S3 storage client
//!
//! Path-style addressing against the regional endpoint. Bucket creation in
//! the default region must omit the location constraint; everywhere else it
//! is required (one global bucket namespace, region-correct creation).

use super::client::AwsClient;
use super::remote_error;
use crate::provision::{ProvisionError, StorageService};
use async_trait::async_trait;

const SERVICE: &str = "s3";

#[derive(Clone)]
pub struct S3Client {
    aws: AwsClient,
}

impl S3Client {
    pub fn new(aws: AwsClient) -> Self {
        Self { aws }
    }

    fn bucket_url(&self, bucket: &str, region: &str) -> String {
        format!("{}/{}", self.aws.s3_base(region), bucket)
    }

    fn object_url(&self, bucket: &str, key: &str, region: &str) -> String {
        // Keys may contain slashes; encode each segment, keep the separators
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.bucket_url(bucket, region), encoded.join("/"))
    }
}

#[async_trait]
impl StorageService for S3Client {
    async fn bucket_exists(&self, name: &str, region: &str) -> Result<bool, ProvisionError> {
        let url = self.bucket_url(name, region);
        let status = self
            .aws
            .http
            .head(&url, &self.aws.credentials, SERVICE, region)
            .await
            .map_err(|e| remote_error(name, e))?;

        match status.as_u16() {
            // 301: the bucket exists in another region
            200 | 301 => Ok(true),
            404 => Ok(false),
            other => Err(ProvisionError::Remote {
                resource: name.to_string(),
                code: None,
                message: format!("bucket existence check returned {other}"),
            }),
        }
    }

    async fn create_bucket(
        &self,
        name: &str,
        location_constraint: Option<&str>,
    ) -> Result<(), ProvisionError> {
        let region = location_constraint.unwrap_or(crate::provision::DEFAULT_REGION);
        let url = self.bucket_url(name, region);

        let body = match location_constraint {
            Some(constraint) => format!(
                "<CreateBucketConfiguration xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
                 <LocationConstraint>{constraint}</LocationConstraint>\
                 </CreateBucketConfiguration>"
            )
            .into_bytes(),
            None => Vec::new(),
        };

        self.aws
            .http
            .put_raw(&url, body, "application/xml", &self.aws.credentials, SERVICE, region)
            .await
            .map_err(|e| remote_error(name, e))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        region: &str,
    ) -> Result<(), ProvisionError> {
        let url = self.object_url(bucket, key, region);
        self.aws
            .http
            .put_raw(
                &url,
                bytes,
                "application/octet-stream",
                &self.aws.credentials,
                SERVICE,
                region,
            )
            .await
            .map_err(|e| remote_error(&format!("{bucket}/{key}"), e))
    }
}
