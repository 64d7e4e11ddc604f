use mongodb::bson::{doc, oid::ObjectId, Bson};
use serde::{Deserialize, Serialize};

use crate::{
    default_timestamp,
    error::{self, AddCode},
    impl_has_last_modified,
    repository::{Entity, RepositoryObject},
};

const MICROS_PER_SECOND: i64 = 1_000_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateBucket {
    pub id: ObjectId,
    pub key: String,
    pub tokens: f64,
    pub refilled_at: i64,
    #[serde(default = "default_timestamp")]
    pub last_modified: i64,
}

impl_has_last_modified!(RateBucket);

impl Entity for RateBucket {
    fn id(&self) -> ObjectId {
        self.id
    }
}

/// `capacity` requests, refilled evenly over `period_seconds`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucket {
    pub capacity: u32,
    pub period_seconds: i64,
}

impl TokenBucket {
    pub const LOGIN: TokenBucket = TokenBucket::new(5, 60);
    pub const REGISTER: TokenBucket = TokenBucket::new(3, 60);
    pub const ISSUE: TokenBucket = TokenBucket::new(10, 3600);

    pub const fn new(capacity: u32, period_seconds: i64) -> Self {
        Self {
            capacity,
            period_seconds,
        }
    }

    fn tokens_per_micro(&self) -> f64 {
        self.capacity as f64 / (self.period_seconds * MICROS_PER_SECOND) as f64
    }

    pub fn full(&self, key: &str, now: i64) -> RateBucket {
        RateBucket {
            id: ObjectId::new(),
            key: key.to_string(),
            tokens: self.capacity as f64,
            refilled_at: now,
            last_modified: now,
        }
    }

    pub fn refill(&self, bucket: &mut RateBucket, now: i64) {
        let elapsed = (now - bucket.refilled_at).max(0);
        bucket.tokens =
            (bucket.tokens + elapsed as f64 * self.tokens_per_micro()).min(self.capacity as f64);
        bucket.refilled_at = now.max(bucket.refilled_at);
    }

    /// Refills, then spends one token if there is one.
    pub fn take(&self, bucket: &mut RateBucket, now: i64) -> bool {
        self.refill(bucket, now);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

fn too_many_requests() -> error::ServiceError {
    anyhow::anyhow!("Too many requests, please try again later").code(429)
}

/// Spends one token of the bucket stored under `key`, 429 when it is empty.
pub async fn check(
    repo: &RepositoryObject<RateBucket>,
    key: &str,
    policy: TokenBucket,
) -> error::Result<()> {
    let now = default_timestamp();

    let Some(mut bucket) = repo.find("key", &Bson::String(key.to_string())).await? else {
        let mut bucket = policy.full(key, now);
        policy.take(&mut bucket, now);
        repo.insert(&bucket).await?;
        return Ok(());
    };

    if !policy.take(&mut bucket, now) {
        log::warn!("Rate limit exceeded for {}", key);
        return Err(too_many_requests());
    }

    match repo.update_one(doc! {"id": bucket.id}, &bucket).await {
        Ok(_) => Ok(()),
        // Someone spent a token concurrently; count the loser as over the limit.
        Err(err) if err.code == 409 => Err(too_many_requests()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::repository::test_repository::TestRepository;

    #[test]
    fn bucket_refills_over_time() {
        let policy = TokenBucket::new(5, 60);
        let mut bucket = policy.full("login:a@b.c", 0);

        for _ in 0..5 {
            assert!(policy.take(&mut bucket, 0));
        }
        assert!(!policy.take(&mut bucket, 0));

        // One token every twelve seconds.
        assert!(!policy.take(&mut bucket, 11 * MICROS_PER_SECOND));
        assert!(policy.take(&mut bucket, 13 * MICROS_PER_SECOND));

        policy.refill(&mut bucket, 3600 * MICROS_PER_SECOND);
        assert_eq!(bucket.tokens, 5.0);
    }

    #[test]
    fn clock_going_backwards_does_not_drain() {
        let policy = TokenBucket::REGISTER;
        let mut bucket = policy.full("register:127.0.0.1", 100);
        policy.refill(&mut bucket, 0);
        assert_eq!(bucket.tokens, 3.0);
        assert_eq!(bucket.refilled_at, 100);
    }

    #[actix_web::test]
    async fn persisted_bucket_rejects_after_capacity() {
        let repo: RepositoryObject<RateBucket> = Arc::new(TestRepository::new());
        for _ in 0..3 {
            check(&repo, "register:10.0.0.1", TokenBucket::REGISTER)
                .await
                .unwrap();
        }
        let err = check(&repo, "register:10.0.0.1", TokenBucket::REGISTER)
            .await
            .unwrap_err();
        assert_eq!(err.code, 429);

        // Other keys are independent.
        check(&repo, "register:10.0.0.2", TokenBucket::REGISTER)
            .await
            .unwrap();
    }
}
