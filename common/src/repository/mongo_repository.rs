use async_trait::async_trait;
use futures::StreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, to_document, Bson, Document},
    options::{FindOptions, IndexOptions},
    IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    default_timestamp,
    error::{self, AddCode},
    geo::GeoPoint,
};

use super::{Entity, HasLastModified, Repository};

pub struct MongoRepository<T> {
    pub collection: mongodb::Collection<T>,
}

impl<T> MongoRepository<T> {
    pub fn new(client: &mongodb::Client, database: &str, collection: &str) -> Self {
        let collection = client.database(database).collection(collection);
        Self { collection }
    }

    pub async fn ensure_index(&self, keys: Document, unique: bool) -> error::Result<()> {
        let options = IndexOptions::builder().unique(unique).build();
        self.collection
            .create_index(IndexModel::builder().keys(keys).options(options).build(), None)
            .await?;
        Ok(())
    }

    async fn collect_cursor(&self, cursor: mongodb::Cursor<T>) -> error::Result<Vec<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        let results: Vec<mongodb::error::Result<T>> = cursor.collect().await;
        Ok(results.into_iter().collect::<mongodb::error::Result<_>>()?)
    }
}

#[async_trait]
impl<T> Repository<T> for MongoRepository<T>
where
    T: Entity + Serialize + DeserializeOwned + Unpin + Clone + Send + Sync + HasLastModified,
{
    async fn insert(&self, item: &T) -> error::Result<bool> {
        let result = self
            .collection
            .find_one(doc! {"id": item.id()}, None)
            .await?
            .is_none();

        if result {
            self.collection.insert_one(item, None).await?;
        }
        Ok(result)
    }

    async fn find(&self, field: &str, value: &Bson) -> error::Result<Option<T>> {
        let result = self.collection.find_one(doc! {field: value}, None).await?;
        Ok(result)
    }

    async fn find_one(&self, filter: Document) -> error::Result<Option<T>> {
        Ok(self.collection.find_one(filter, None).await?)
    }

    async fn find_many(&self, field: &str, value: &Bson) -> error::Result<Vec<T>> {
        let cursor = self.collection.find(doc! {field: value}, None).await?;
        self.collect_cursor(cursor).await
    }

    async fn find_by_filter(
        &self,
        filter: Document,
        sort: Option<Document>,
        skip: u64,
        limit: i64,
    ) -> error::Result<Vec<T>> {
        let find_options = FindOptions::builder()
            .sort(sort)
            .skip(skip)
            .limit(limit)
            .build();

        let cursor = self.collection.find(filter, find_options).await?;
        self.collect_cursor(cursor).await
    }

    async fn count(&self, filter: Document) -> error::Result<u64> {
        Ok(self.collection.count_documents(filter, None).await?)
    }

    async fn find_near(
        &self,
        field: &str,
        point: &GeoPoint,
        max_distance: f64,
        mut filter: Document,
        limit: i64,
    ) -> error::Result<Vec<T>> {
        filter.insert(
            field,
            doc! {
                "$nearSphere": {
                    "$geometry": {
                        "type": "Point",
                        "coordinates": [point.lng(), point.lat()],
                    },
                    "$maxDistance": max_distance,
                }
            },
        );
        let find_options = FindOptions::builder().limit(limit).build();

        let cursor = self.collection.find(filter, find_options).await?;
        self.collect_cursor(cursor).await
    }

    async fn update_one(&self, mut old: Document, update: &T) -> error::Result<T> {
        old.extend(doc! {
            "$or": [
                { "last_modified": Bson::Int64(update.last_modified()) },
                { "last_modified": { "$exists": false } }
            ]
        });

        let mut update = update.clone();
        update.set_last_modified(default_timestamp().max(update.last_modified() + 1));

        let result = self
            .collection
            .find_one_and_update(old, doc! {"$set": to_document(&update)?}, None)
            .await?
            .is_some();

        if !result {
            return Err(
                anyhow::anyhow!("Failed to save changes, the record was modified").code(409),
            );
        }

        Ok(update)
    }

    async fn delete(&self, field: &str, item: &ObjectId) -> error::Result<Option<T>> {
        let result = self
            .collection
            .find_one_and_delete(doc! {field: item}, None)
            .await?;
        Ok(result)
    }

    async fn delete_many(&self, field: &str, value: &Bson) -> error::Result<u64> {
        let result = self
            .collection
            .delete_many(doc! {field: value}, None)
            .await?;
        Ok(result.deleted_count)
    }
}
