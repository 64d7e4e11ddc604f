pub mod mongo_repository;
pub mod test_repository;

use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};

use crate::{error, geo::GeoPoint};

pub trait Entity {
    fn id(&self) -> ObjectId;
}

pub trait HasLastModified {
    fn last_modified(&self) -> i64;
    fn set_last_modified(&mut self, last_modified: i64);
}

#[macro_export]
macro_rules! impl_has_last_modified {
    ($t:ty) => {
        impl $crate::repository::HasLastModified for $t {
            fn last_modified(&self) -> i64 {
                self.last_modified
            }

            fn set_last_modified(&mut self, last_modified: i64) {
                self.last_modified = last_modified;
            }
        }
    };
}

#[async_trait]
pub trait Repository<T>: Send + Sync {
    async fn insert(&self, item: &T) -> error::Result<bool>;
    async fn find(&self, field: &str, value: &Bson) -> error::Result<Option<T>>;
    async fn find_one(&self, filter: Document) -> error::Result<Option<T>>;
    async fn find_many(&self, field: &str, value: &Bson) -> error::Result<Vec<T>>;
    async fn find_by_filter(
        &self,
        filter: Document,
        sort: Option<Document>,
        skip: u64,
        limit: i64,
    ) -> error::Result<Vec<T>>;
    async fn count(&self, filter: Document) -> error::Result<u64>;
    /// Documents matching `filter` whose GeoJSON `field` lies within
    /// `max_distance` metres of `point`, nearest first.
    async fn find_near(
        &self,
        field: &str,
        point: &GeoPoint,
        max_distance: f64,
        filter: Document,
        limit: i64,
    ) -> error::Result<Vec<T>>;
    /// Replaces the document matched by `old` if nobody changed it since
    /// `update` was read. A lost race is reported as 409.
    async fn update_one(&self, old: Document, update: &T) -> error::Result<T>;
    async fn delete(&self, field: &str, item: &ObjectId) -> error::Result<Option<T>>;
    async fn delete_many(&self, field: &str, value: &Bson) -> error::Result<u64>;
}

pub type RepositoryObject<T> = Arc<dyn Repository<T>>;
