use concierge_config::RegionRule;
use sqlx::SqlitePool;
use tracing::info;

use super::access::Actor;
use super::error::ServiceError;
use crate::routes::models::RegionSummary;

pub const FALLBACK_REGION: &str = "Other";

/// The address parts region matching looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl PropertyAddress {
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        zip: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
            state: state.into(),
            zip: zip.into(),
        }
    }

    fn is_blank(&self) -> bool {
        [&self.street, &self.city, &self.state, &self.zip]
            .iter()
            .all(|part| part.trim().is_empty())
    }

    fn haystack(&self) -> String {
        format!(
            "{}, {}, {} {}",
            self.street.trim(),
            self.city.trim(),
            self.state.trim(),
            self.zip.trim()
        )
        .to_lowercase()
    }
}

/// Name of the first rule with a keyword found in the address, or `"Other"`.
///
/// Keywords are matched as lower-cased substrings without trimming, so `" 331"` only
/// matches a zip code that starts with 331.
pub fn categorize(address: &PropertyAddress, rules: &[RegionRule]) -> String {
    if address.is_blank() {
        return FALLBACK_REGION.to_string();
    }

    let haystack = address.haystack();
    rules
        .iter()
        .find(|rule| {
            rule.keywords
                .iter()
                .filter(|keyword| !keyword.trim().is_empty())
                .any(|keyword| haystack.contains(&keyword.to_lowercase()))
        })
        .map(|rule| rule.name.clone())
        .unwrap_or_else(|| FALLBACK_REGION.to_string())
}

/// Re-run categorization for every property, storing regions that changed.
pub async fn recategorize_all(
    pool: &SqlitePool,
    actor: &Actor,
    rules: &[RegionRule],
) -> Result<u64, ServiceError> {
    actor.require_admin()?;

    let rows = sqlx::query_as::<_, (i64, String, String, String, String, String)>(
        "SELECT id, street, city, state, zip, region FROM properties ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let now = chrono::Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    let mut updated = 0u64;

    for (id, street, city, state, zip, current) in rows {
        let region = categorize(&PropertyAddress::new(street, city, state, zip), rules);
        if region == current {
            continue;
        }

        sqlx::query("UPDATE properties SET region = ?, updated_at = ? WHERE id = ?")
            .bind(&region)
            .bind(&now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        updated += 1;
    }

    tx.commit().await?;
    info!(updated, "recategorized properties");
    Ok(updated)
}

/// Configured regions in rule order, then the fallback, each with its property count.
/// Regions stored on properties that no longer match a rule are listed after those.
pub async fn list_regions(
    pool: &SqlitePool,
    rules: &[RegionRule],
) -> Result<Vec<RegionSummary>, ServiceError> {
    let counts = sqlx::query_as::<_, (String, i64)>(
        "SELECT region, COUNT(*) FROM properties GROUP BY region ORDER BY region",
    )
    .fetch_all(pool)
    .await?;

    let count_for = |name: &str| {
        counts
            .iter()
            .find(|(region, _)| region == name)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    };

    let mut summaries: Vec<RegionSummary> = rules
        .iter()
        .map(|rule| rule.name.as_str())
        .chain(std::iter::once(FALLBACK_REGION))
        .map(|name| RegionSummary {
            name: name.to_string(),
            property_count: count_for(name),
        })
        .collect();

    for (region, count) in &counts {
        if !summaries.iter().any(|summary| &summary.name == region) {
            summaries.push(RegionSummary {
                name: region.clone(),
                property_count: *count,
            });
        }
    }

    Ok(summaries)
}
