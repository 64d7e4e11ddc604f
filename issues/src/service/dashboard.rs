use std::{collections::BTreeMap, sync::Arc};

use mongodb::bson::doc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use common::{
    constants::PUBLIC_CACHE_SECONDS,
    context::Context,
    default_timestamp,
    entities::issue::{Category, Issue, Priority, Status},
    error,
    visibility::{PublicIssue, Visibility},
};

const RECENT_ISSUES: i64 = 10;
const MICROS_PER_SECOND: i64 = 1_000_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicDashboard {
    pub total: u64,
    pub open: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_category: BTreeMap<String, u64>,
    pub by_priority: BTreeMap<String, u64>,
    pub recent: Vec<PublicIssue>,
    pub generated_at: i64,
}

/// Last built dashboard together with the time it was built.
#[derive(Clone, Default)]
pub struct DashboardCache(Arc<RwLock<Option<(i64, PublicDashboard)>>>);

impl DashboardCache {
    pub async fn fresh(&self, now: i64) -> Option<PublicDashboard> {
        let cached = self.0.read().await;
        match &*cached {
            Some((built, dashboard)) if now - built < PUBLIC_CACHE_SECONDS * MICROS_PER_SECOND => {
                Some(dashboard.clone())
            }
            _ => None,
        }
    }

    pub async fn store(&self, now: i64, dashboard: PublicDashboard) {
        *self.0.write().await = Some((now, dashboard));
    }
}

pub struct DashboardService {
    context: Context,
}

impl DashboardService {
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    pub async fn public(&self) -> error::Result<PublicDashboard> {
        let now = default_timestamp();
        let cache = self.context.get_manual::<DashboardCache>();

        if let Some(cache) = &cache {
            if let Some(dashboard) = cache.fresh(now).await {
                return Ok(dashboard);
            }
        }

        let dashboard = self.build(now).await?;
        if let Some(cache) = cache {
            cache.store(now, dashboard.clone()).await;
        }
        Ok(dashboard)
    }

    async fn build(&self, now: i64) -> error::Result<PublicDashboard> {
        let issues = self.context.try_get_repository::<Issue>()?;

        let mut by_status = BTreeMap::new();
        for status in Status::ALL {
            let count = issues.count(doc! {"status": status.as_str()}).await?;
            by_status.insert(status.as_str().to_string(), count);
        }

        let mut by_category = BTreeMap::new();
        for category in Category::ALL {
            let count = issues.count(doc! {"category": category.as_str()}).await?;
            by_category.insert(category.as_str().to_string(), count);
        }

        let mut by_priority = BTreeMap::new();
        for priority in Priority::ALL {
            let count = issues.count(doc! {"priority": priority.as_str()}).await?;
            by_priority.insert(priority.as_str().to_string(), count);
        }

        let total = by_status.values().sum();
        let open = Status::ALL
            .iter()
            .filter(|status| status.is_open())
            .filter_map(|status| by_status.get(status.as_str()))
            .sum();

        let anonymous = Visibility::Redacted { viewer: None };
        let recent = issues
            .find_by_filter(doc! {}, Some(doc! {"created_at": -1}), 0, RECENT_ISSUES)
            .await?
            .into_iter()
            .map(|issue| anonymous.project_issue(issue, None, now))
            .collect();

        Ok(PublicDashboard {
            total,
            open,
            by_status,
            by_category,
            by_priority,
            recent,
            generated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dashboard(total: u64) -> PublicDashboard {
        PublicDashboard {
            total,
            open: total,
            by_status: BTreeMap::new(),
            by_category: BTreeMap::new(),
            by_priority: BTreeMap::new(),
            recent: vec![],
            generated_at: 0,
        }
    }

    #[actix_web::test]
    async fn cache_expires_after_five_minutes() {
        let cache = DashboardCache::default();
        assert!(cache.fresh(0).await.is_none());

        cache.store(0, dashboard(3)).await;
        let hit = cache.fresh(299 * MICROS_PER_SECOND).await;
        assert_eq!(hit.map(|d| d.total), Some(3));
        assert!(cache.fresh(300 * MICROS_PER_SECOND).await.is_none());
    }
}
