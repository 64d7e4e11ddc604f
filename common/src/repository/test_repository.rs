use std::{
    cmp::Ordering,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use mongodb::bson::{self, oid::ObjectId, Bson, Document};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    default_timestamp,
    error::{self, AddCode},
    geo::GeoPoint,
};

use super::{Entity, HasLastModified, Repository};

/// In-memory repository understanding the subset of the MongoDB query
/// language the services use: equality (with array membership), `$in`,
/// `$nin`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$exists`, `$or`, `$and`.
pub struct TestRepository<T> {
    _t: std::marker::PhantomData<T>,
    pub db: Mutex<Vec<Document>>,
}

impl<T> TestRepository<T> {
    pub fn new() -> Self {
        Self {
            _t: std::marker::PhantomData,
            db: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> error::Result<MutexGuard<'_, Vec<Document>>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("Test repository lock poisoned").code(500))
    }
}

impl<T> Default for TestRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            Bson::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (number(a), number(b)) {
        return a.partial_cmp(&b);
    }
    match (a, b) {
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        (Bson::DateTime(a), Bson::DateTime(b)) => Some(a.cmp(b)),
        (Bson::ObjectId(a), Bson::ObjectId(b)) => Some(a.cmp(b)),
        (Bson::Boolean(a), Bson::Boolean(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => expected == &Bson::Null,
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| equals(Some(item), expected))
        }
        Some(value) => compare(value, expected) == Some(Ordering::Equal) || value == expected,
    }
}

fn ordered(value: Option<&Bson>, arg: &Bson, accept: fn(Ordering) -> bool) -> bool {
    value
        .and_then(|value| compare(value, arg))
        .map(accept)
        .unwrap_or(false)
}

fn apply_operator(value: Option<&Bson>, op: &str, arg: &Bson) -> bool {
    match op {
        "$eq" => equals(value, arg),
        "$ne" => !equals(value, arg),
        "$in" => arg
            .as_array()
            .map(|items| items.iter().any(|item| equals(value, item)))
            .unwrap_or(false),
        "$nin" => arg
            .as_array()
            .map(|items| !items.iter().any(|item| equals(value, item)))
            .unwrap_or(true),
        "$gt" => ordered(value, arg, |o| o == Ordering::Greater),
        "$gte" => ordered(value, arg, |o| o != Ordering::Less),
        "$lt" => ordered(value, arg, |o| o == Ordering::Less),
        "$lte" => ordered(value, arg, |o| o != Ordering::Greater),
        "$exists" => value.is_some() == arg.as_bool().unwrap_or(true),
        _ => false,
    }
}

pub fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$or" | "$and" => {
            let clauses = condition
                .as_array()
                .map(|items| items.iter().filter_map(Bson::as_document).collect::<Vec<_>>())
                .unwrap_or_default();
            if key == "$or" {
                clauses.iter().any(|clause| matches(doc, clause))
            } else {
                clauses.iter().all(|clause| matches(doc, clause))
            }
        }
        _ => {
            let value = lookup(doc, key);
            match condition {
                Bson::Document(ops)
                    if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) =>
                {
                    ops.iter().all(|(op, arg)| apply_operator(value, op, arg))
                }
                _ => equals(value, condition),
            }
        }
    })
}

fn sort_documents(docs: &mut [Document], sort: &Document) {
    docs.sort_by(|a, b| {
        for (field, direction) in sort {
            let descending = number(direction).map(|d| d < 0.0).unwrap_or(false);
            let ordering = match (lookup(a, field), lookup(b, field)) {
                (Some(a), Some(b)) => compare(a, b).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };
            let ordering = if descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn point_of(doc: &Document, field: &str) -> Option<GeoPoint> {
    let value = lookup(doc, field)?.clone();
    bson::from_bson(value).ok()
}

fn decode<T: DeserializeOwned>(doc: Document) -> error::Result<T> {
    Ok(bson::from_document(doc)?)
}

fn decode_all<T: DeserializeOwned>(docs: Vec<Document>) -> error::Result<Vec<T>> {
    docs.into_iter().map(decode).collect()
}

#[async_trait]
impl<T> Repository<T> for TestRepository<T>
where
    T: Entity + Clone + Send + Sync + Serialize + DeserializeOwned + HasLastModified,
{
    async fn insert(&self, item: &T) -> error::Result<bool> {
        let document = bson::to_document(item)?;
        let mut db = self.lock()?;

        let id = Bson::ObjectId(item.id());
        let contains = db.iter().any(|x| x.get("id") == Some(&id));
        if !contains {
            db.push(document);
        }
        Ok(!contains)
    }

    async fn find(&self, field: &str, value: &Bson) -> error::Result<Option<T>> {
        let found = self
            .lock()?
            .iter()
            .find(|x| equals(lookup(x, field), value))
            .cloned();
        found.map(decode).transpose()
    }

    async fn find_one(&self, filter: Document) -> error::Result<Option<T>> {
        let found = self.lock()?.iter().find(|x| matches(x, &filter)).cloned();
        found.map(decode).transpose()
    }

    async fn find_many(&self, field: &str, value: &Bson) -> error::Result<Vec<T>> {
        let found: Vec<Document> = self
            .lock()?
            .iter()
            .filter(|x| equals(lookup(x, field), value))
            .cloned()
            .collect();
        decode_all(found)
    }

    async fn find_by_filter(
        &self,
        filter: Document,
        sort: Option<Document>,
        skip: u64,
        limit: i64,
    ) -> error::Result<Vec<T>> {
        let mut found: Vec<Document> = self
            .lock()?
            .iter()
            .filter(|x| matches(x, &filter))
            .cloned()
            .collect();

        if let Some(sort) = sort {
            sort_documents(&mut found, &sort);
        }

        let take = if limit > 0 { limit as usize } else { usize::MAX };
        let found = found.into_iter().skip(skip as usize).take(take).collect();
        decode_all(found)
    }

    async fn count(&self, filter: Document) -> error::Result<u64> {
        Ok(self.lock()?.iter().filter(|x| matches(x, &filter)).count() as u64)
    }

    async fn find_near(
        &self,
        field: &str,
        point: &GeoPoint,
        max_distance: f64,
        filter: Document,
        limit: i64,
    ) -> error::Result<Vec<T>> {
        let mut found: Vec<(f64, Document)> = self
            .lock()?
            .iter()
            .filter(|x| matches(x, &filter))
            .filter_map(|x| {
                let distance = point_of(x, field)?.distance_to(point);
                (distance <= max_distance).then(|| (distance, x.clone()))
            })
            .collect();

        found.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        let take = if limit > 0 { limit as usize } else { usize::MAX };
        decode_all(found.into_iter().take(take).map(|(_, doc)| doc).collect())
    }

    async fn update_one(&self, old: Document, update: &T) -> error::Result<T> {
        let mut db = self.lock()?;

        let expected = update.last_modified();
        let position = db.iter().position(|x| {
            matches(x, &old)
                && x.get("last_modified")
                    .map(|stored| equals(Some(stored), &Bson::Int64(expected)))
                    .unwrap_or(true)
        });

        let Some(position) = position else {
            return Err(
                anyhow::anyhow!("Failed to save changes, the record was modified").code(409),
            );
        };

        let mut update = update.clone();
        update.set_last_modified(default_timestamp().max(expected + 1));
        db[position] = bson::to_document(&update)?;

        Ok(update)
    }

    async fn delete(&self, field: &str, id: &ObjectId) -> error::Result<Option<T>> {
        let mut db = self.lock()?;
        let target = Bson::ObjectId(*id);
        let position = db.iter().position(|x| x.get(field) == Some(&target));

        position.map(|x| decode(db.remove(x))).transpose()
    }

    async fn delete_many(&self, field: &str, value: &Bson) -> error::Result<u64> {
        let mut db = self.lock()?;
        let before = db.len();
        db.retain(|x| !equals(lookup(x, field), value));
        Ok((before - db.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;

    use super::*;

    #[test]
    fn matcher_understands_operators() {
        let document = doc! {
            "status": "pending",
            "created_at": 100_i64,
            "upvotes": ["a", "b"],
            "location": { "address": "Main St" },
        };

        assert!(matches(&document, &doc! {"status": {"$in": ["pending", "assigned"]}}));
        assert!(!matches(&document, &doc! {"status": {"$nin": ["pending"]}}));
        assert!(matches(&document, &doc! {"created_at": {"$gte": 100, "$lt": 101_i64}}));
        assert!(matches(&document, &doc! {"upvotes": "b"}));
        assert!(matches(&document, &doc! {"location.address": "Main St"}));
        assert!(matches(&document, &doc! {"assigned_to": {"$exists": false}}));
        assert!(matches(
            &document,
            &doc! {"$or": [{"status": "resolved"}, {"created_at": 100_i64}]}
        ));
        assert!(!matches(&document, &doc! {"status": {"$ne": "pending"}}));
    }

    #[test]
    fn sort_orders_descending() {
        let mut docs = vec![doc! {"n": 1}, doc! {"n": 3}, doc! {"n": 2}];
        sort_documents(&mut docs, &doc! {"n": -1});
        let order: Vec<i32> = docs.iter().map(|d| d.get_i32("n").unwrap()).collect();
        assert_eq!(order, vec![3, 2, 1]);
    }
}
