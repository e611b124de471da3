use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use moka::future::Cache;
use sqlx::MySqlPool;

use crate::error::LeaveError;
use crate::model::leave_policy::PolicyBundle;
use crate::store::policy_store;

/// Single-organization deployment, so the whole cache is one entry.
const COMPANY_POLICY: u8 = 0;

/// Company policy with its blackouts and shutdowns, read on every balance
/// and validation call. Every administrative write must call `invalidate`.
#[derive(Clone)]
pub struct PolicyCache {
    inner: Cache<u8, Arc<PolicyBundle>>,
}

impl PolicyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    pub async fn get_policy_for_org(&self, pool: &MySqlPool) -> Result<Arc<PolicyBundle>, LeaveError> {
        if let Some(bundle) = self.inner.get(&COMPANY_POLICY).await {
            return Ok(bundle);
        }

        let bundle = Arc::new(policy_store::load_company_policy(pool).await?);
        self.inner.insert(COMPANY_POLICY, bundle.clone()).await;
        tracing::debug!(policy_id = bundle.policy.id, "Company leave policy cached");
        Ok(bundle)
    }

    pub async fn invalidate(&self) {
        self.inner.invalidate(&COMPANY_POLICY).await;
    }

    #[cfg(test)]
    pub async fn prime(&self, bundle: PolicyBundle) {
        self.inner.insert(COMPANY_POLICY, Arc::new(bundle)).await;
    }
}

/// Loads the company policy once at startup so the first request does not
/// pay for it.
pub async fn warmup_policy_cache(cache: &PolicyCache, pool: &MySqlPool) -> Result<()> {
    let bundle = cache.get_policy_for_org(pool).await?;

    tracing::info!(
        policy_id = bundle.policy.id,
        blackouts = bundle.blackouts.len(),
        shutdowns = bundle.shutdowns.len(),
        "Policy cache warmup complete"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_policy::fixtures::{bundle, policy};
    use sqlx::mysql::MySqlPoolOptions;

    #[actix_web::test]
    async fn primed_policy_is_served_without_database() {
        let cache = PolicyCache::new(Duration::from_secs(60));
        cache.prime(bundle(policy())).await;

        // Lazy pool never connects unless a query runs
        let pool = MySqlPoolOptions::new()
            .connect_lazy("mysql://nobody@127.0.0.1:1/none")
            .unwrap();
        let served = cache.get_policy_for_org(&pool).await.unwrap();
        assert_eq!(served.policy.base_annual_days, 21);
    }

    #[actix_web::test]
    async fn invalidate_drops_entry() {
        let cache = PolicyCache::new(Duration::from_secs(60));
        cache.prime(bundle(policy())).await;
        cache.invalidate().await;
        assert!(cache.inner.get(&COMPANY_POLICY).await.is_none());
    }
}
