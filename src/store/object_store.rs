use std::{path::Path, sync::Arc};

use object_store::{
    aws::AmazonS3Builder, local::LocalFileSystem, path::Path as ObjectPath, Attribute,
    AttributeValue, Attributes, ObjectStore as _, PutMultipartOpts, WriteMultipart,
};
use tokio::io::AsyncReadExt;
use url::Url;

use crate::{
    config::{Filesystem, ObjectStorage},
    store::{ObjectKey, Store, StoreError},
};

const CHUNK_SIZE: usize = 8 * 1024 * 1024;
const READ_BUFFER_SIZE: usize = 64 * 1024;
const MAX_CONCURRENT_PARTS: usize = 2;

const HEALTH_CHECK_KEY: &str = "tubely-health-check";

/// Publishes files to any `object_store` backend
#[derive(Clone)]
pub(crate) struct ObjectStore {
    inner: Arc<dyn object_store::ObjectStore>,
    public_base: Arc<str>,
    supports_attributes: bool,
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("inner", &self.inner.to_string())
            .field("public_base", &self.public_base)
            .field("supports_attributes", &self.supports_attributes)
            .finish()
    }
}

impl ObjectStore {
    pub(crate) fn build_s3(
        ObjectStorage {
            endpoint,
            bucket_name,
            use_path_style,
            region,
            access_key,
            secret_key,
            session_token,
            public_endpoint,
        }: ObjectStorage,
    ) -> Result<Self, StoreError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&bucket_name)
            .with_region(&region)
            .with_virtual_hosted_style_request(!use_path_style);

        if let Some(endpoint) = &endpoint {
            builder = builder
                .with_endpoint(endpoint.as_str().trim_end_matches('/'))
                .with_allow_http(endpoint.scheme() == "http");
        }
        if let Some(access_key) = access_key {
            builder = builder.with_access_key_id(access_key);
        }
        if let Some(secret_key) = secret_key {
            builder = builder.with_secret_access_key(secret_key);
        }
        if let Some(session_token) = session_token {
            builder = builder.with_token(session_token);
        }

        let public_base = match public_endpoint {
            Some(public_endpoint) => trimmed(&public_endpoint),
            None => format!("https://{bucket_name}.s3.{region}.amazonaws.com"),
        };

        Ok(ObjectStore {
            inner: Arc::new(builder.build()?),
            public_base: Arc::from(public_base),
            supports_attributes: true,
        })
    }

    pub(crate) async fn build_filesystem(
        Filesystem {
            path,
            public_endpoint,
        }: Filesystem,
    ) -> Result<Self, StoreError> {
        let public_endpoint = public_endpoint.ok_or(StoreError::MissingPublicEndpoint)?;

        tokio::fs::create_dir_all(&path)
            .await
            .map_err(StoreError::CreateDir)?;

        Ok(ObjectStore {
            inner: Arc::new(LocalFileSystem::new_with_prefix(path)?),
            public_base: Arc::from(trimmed(&public_endpoint)),
            supports_attributes: false,
        })
    }

    #[cfg(test)]
    pub(crate) fn in_memory(public_endpoint: &str) -> Self {
        ObjectStore {
            inner: Arc::new(object_store::memory::InMemory::new()),
            public_base: Arc::from(public_endpoint.trim_end_matches('/')),
            supports_attributes: true,
        }
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<dyn object_store::ObjectStore> {
        &self.inner
    }

    fn put_options(&self, content_type: &mime::Mime) -> PutMultipartOpts {
        let mut attributes = Attributes::new();

        if self.supports_attributes {
            attributes.insert(
                Attribute::ContentType,
                AttributeValue::from(content_type.essence_str().to_string()),
            );
        }

        PutMultipartOpts {
            attributes,
            ..Default::default()
        }
    }
}

fn trimmed(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}

async fn copy_file(
    file: &mut tokio::fs::File,
    writer: &mut WriteMultipart,
) -> Result<(), StoreError> {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = file.read(&mut buf).await.map_err(StoreError::ReadFile)?;

        if n == 0 {
            return Ok(());
        }

        writer.wait_for_capacity(MAX_CONCURRENT_PARTS).await?;
        writer.write(&buf[..n]);
    }
}

#[async_trait::async_trait(?Send)]
impl Store for ObjectStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        match self.inner.head(&ObjectPath::from(HEALTH_CHECK_KEY)).await {
            Ok(_) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self, key, content_type), fields(key = %key))]
    async fn save_file(
        &self,
        key: &ObjectKey,
        path: &Path,
        content_type: &mime::Mime,
    ) -> Result<(), StoreError> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(StoreError::ReadFile)?;

        let location = ObjectPath::from(key.as_str());

        let upload = self
            .inner
            .put_multipart_opts(&location, self.put_options(content_type))
            .await?;

        let mut writer = WriteMultipart::new_with_chunk_size(upload, CHUNK_SIZE);

        if let Err(e) = copy_file(&mut file, &mut writer).await {
            if let Err(abort) = writer.abort().await {
                tracing::warn!("Failed to abort multipart upload: {abort}");
            }

            metrics::counter!(crate::init_metrics::STORE_PUT, "completed" => "false")
                .increment(1);

            return Err(e);
        }

        if let Err(e) = writer.finish().await {
            metrics::counter!(crate::init_metrics::STORE_PUT, "completed" => "false")
                .increment(1);

            return Err(e.into());
        }

        metrics::counter!(crate::init_metrics::STORE_PUT, "completed" => "true").increment(1);

        Ok(())
    }

    fn public_url(&self, key: &ObjectKey) -> String {
        format!("{}/{}", self.public_base, key)
    }
}
