use std::{fmt::Debug, path::Path};

pub(crate) mod object_key;
pub(crate) mod object_store;

pub(crate) use object_key::{KeyLayout, ObjectKey};

use crate::error_code::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("Error in object store")]
    ObjectStore(#[from] ::object_store::Error),

    #[error("Error reading file for upload")]
    ReadFile(#[source] std::io::Error),

    #[error("Error preparing local store directory")]
    CreateDir(#[source] std::io::Error),

    #[error("Filesystem store requires a public_endpoint")]
    MissingPublicEndpoint,
}

impl StoreError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::ObjectStore(_) | Self::MissingPublicEndpoint => ErrorCode::OBJECT_STORE_ERROR,
            Self::ReadFile(_) | Self::CreateDir(_) => ErrorCode::OBJECT_IO_ERROR,
        }
    }
}

#[async_trait::async_trait(?Send)]
pub(crate) trait Store: Clone + Debug {
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Stream the file at `path` into the store under `key`
    ///
    /// Returns only once the backend has durably accepted the whole object
    async fn save_file(
        &self,
        key: &ObjectKey,
        path: &Path,
        content_type: &mime::Mime,
    ) -> Result<(), StoreError>;

    fn public_url(&self, key: &ObjectKey) -> String;
}

#[async_trait::async_trait(?Send)]
impl<T> Store for actix_web::web::Data<T>
where
    T: Store,
{
    async fn health_check(&self) -> Result<(), StoreError> {
        T::health_check(self).await
    }

    async fn save_file(
        &self,
        key: &ObjectKey,
        path: &Path,
        content_type: &mime::Mime,
    ) -> Result<(), StoreError> {
        T::save_file(self, key, path, content_type).await
    }

    fn public_url(&self, key: &ObjectKey) -> String {
        T::public_url(self, key)
    }
}
