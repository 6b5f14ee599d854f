//! Resource Queries
//!
//! Purely informational retrieval, separate from the reconciler. Which
//! backend call to make is resolved once from the identifying parameters
//! into an explicit [`QueryIntent`] rather than a first-match-wins chain
//! of conditionals, so precedence stays inspectable and testable. A
//! not-found answer is "no results", never an error.

use super::registry::{get_all_resource_keys, get_resource, ResourceDef};
use crate::azure::client::ArmClient;
use anyhow::{bail, Result};
use serde_json::Value;

/// Which retrieval operation the supplied parameters select.
/// The most specific combination of non-null parameters wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryIntent {
    GetByName {
        resource_group: String,
        name: String,
    },
    ListByResourceGroup {
        resource_group: String,
    },
    ListBySubscription,
}

impl QueryIntent {
    /// Resolve the intent from optional identifying parameters.
    pub fn resolve(resource_group: Option<&str>, name: Option<&str>) -> Result<Self> {
        match (resource_group, name) {
            (Some(rg), Some(n)) => Ok(QueryIntent::GetByName {
                resource_group: rg.to_string(),
                name: n.to_string(),
            }),
            (Some(rg), None) => Ok(QueryIntent::ListByResourceGroup {
                resource_group: rg.to_string(),
            }),
            (None, None) => Ok(QueryIntent::ListBySubscription),
            (None, Some(_)) => {
                bail!("a resource name requires a resource group (-g/--resource-group)")
            }
        }
    }
}

/// Fetch zero, one or many observed configurations for a resource type.
pub async fn query_resources(
    client: &ArmClient,
    def: &ResourceDef,
    intent: &QueryIntent,
    filter: Option<&str>,
) -> Result<Vec<Value>> {
    match intent {
        QueryIntent::GetByName {
            resource_group,
            name,
        } => {
            let url = client.resource_url(def, resource_group, name);
            Ok(client.get_optional(&url).await?.into_iter().collect())
        }
        QueryIntent::ListByResourceGroup { resource_group } => {
            let url = with_filter(client.collection_url(def, resource_group), filter);
            fetch_list(client, url).await
        }
        QueryIntent::ListBySubscription => {
            let url = with_filter(client.subscription_url(def), filter);
            fetch_list(client, url).await
        }
    }
}

/// List every registered resource type under the same scope, concurrently.
/// Types that fail to list are logged and reported empty rather than
/// failing the whole query.
pub async fn query_all_types(
    client: &ArmClient,
    resource_group: Option<&str>,
) -> Result<Vec<(&'static str, Vec<Value>)>> {
    let intent = QueryIntent::resolve(resource_group, None)?;

    let lookups = get_all_resource_keys().into_iter().filter_map(|key| {
        let def = get_resource(key)?;
        let intent = intent.clone();
        Some(async move {
            match query_resources(client, def, &intent, None).await {
                Ok(items) => (key, items),
                Err(e) => {
                    tracing::warn!("Failed to list {}: {}", key, e);
                    (key, Vec::new())
                }
            }
        })
    });

    Ok(futures::future::join_all(lookups).await)
}

/// Fetch all pages of a list URL (auto-paginate via `nextLink`)
async fn fetch_list(client: &ArmClient, first_url: String) -> Result<Vec<Value>> {
    let mut all_items = Vec::new();
    let mut next_url = Some(first_url);

    while let Some(url) = next_url {
        let Some(page) = client.get_optional(&url).await? else {
            // Listing an unknown scope is "no results"
            break;
        };

        if let Some(items) = page.get("value").and_then(|v| v.as_array()) {
            all_items.extend(items.iter().cloned());
        }

        next_url = page
            .get("nextLink")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
    }

    Ok(all_items)
}

fn with_filter(url: String, filter: Option<&str>) -> String {
    match filter {
        Some(f) => format!("{}&$filter={}", url, urlencoding::encode(f)),
        None => url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_specific_intent_wins() {
        assert_eq!(
            QueryIntent::resolve(Some("rg1"), Some("acct1")).unwrap(),
            QueryIntent::GetByName {
                resource_group: "rg1".to_string(),
                name: "acct1".to_string()
            }
        );
        assert_eq!(
            QueryIntent::resolve(Some("rg1"), None).unwrap(),
            QueryIntent::ListByResourceGroup {
                resource_group: "rg1".to_string()
            }
        );
        assert_eq!(
            QueryIntent::resolve(None, None).unwrap(),
            QueryIntent::ListBySubscription
        );
    }

    #[test]
    fn test_name_without_group_is_rejected() {
        let err = QueryIntent::resolve(None, Some("acct1")).unwrap_err();
        assert!(err.to_string().contains("resource group"));
    }

    #[test]
    fn test_filter_is_url_encoded() {
        let url = with_filter(
            "https://example.test/things?api-version=1".to_string(),
            Some("tagName eq 'env'"),
        );
        assert!(url.ends_with("&$filter=tagName%20eq%20%27env%27"));
    }
}
