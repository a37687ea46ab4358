use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Collections managed from the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resource {
    Users,
    Sellers,
    Products,
    SellOffers,
    Referrals,
    Notifications,
    EmailCampaigns,
}

impl Resource {
    pub const ALL: [Resource; 7] = [
        Resource::Users,
        Resource::Sellers,
        Resource::Products,
        Resource::SellOffers,
        Resource::Referrals,
        Resource::Notifications,
        Resource::EmailCampaigns,
    ];

    /// REST path segment, e.g. `sell-offers`.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Sellers => "sellers",
            Resource::Products => "products",
            Resource::SellOffers => "sell-offers",
            Resource::Referrals => "referrals",
            Resource::Notifications => "notifications",
            Resource::EmailCampaigns => "email-campaigns",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        match normalized.as_str() {
            "users" | "user" => Ok(Resource::Users),
            "sellers" | "seller" => Ok(Resource::Sellers),
            "products" | "product" => Ok(Resource::Products),
            "sell-offers" | "sell-offer" => Ok(Resource::SellOffers),
            "referrals" | "referral" => Ok(Resource::Referrals),
            "notifications" | "notification" => Ok(Resource::Notifications),
            "email-campaigns" | "email-campaign" | "email" => Ok(Resource::EmailCampaigns),
            _ => Err(format!("Unknown resource: {}", s)),
        }
    }
}

/// List request parameters shared by every collection screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ListQuery {
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: u32,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Column filters; ordered so the same filter set always yields the same query string.
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            search: None,
            filters: BTreeMap::new(),
        }
    }
}

impl ListQuery {
    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Query-string pairs in a stable order.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            pairs.push(("search".to_string(), search.trim().to_string()));
        }
        pairs.extend(self.filters.iter().map(|(k, v)| (k.clone(), v.clone())));
        pairs
    }
}

/// One page of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_round_trips_through_path_segment() {
        for resource in Resource::ALL {
            assert_eq!(
                resource.path_segment().parse::<Resource>().unwrap(),
                resource
            );
        }
        assert_eq!("sell_offer".parse::<Resource>().unwrap(), Resource::SellOffers);
        assert_eq!("email".parse::<Resource>().unwrap(), Resource::EmailCampaigns);
        assert!("orders".parse::<Resource>().is_err());
    }

    #[test]
    fn test_query_pairs_are_stable() {
        let query = ListQuery::default()
            .page(2)
            .search("  shoes ")
            .filter("status", "active")
            .filter("category", "footwear");
        assert_eq!(
            query.to_query_pairs(),
            vec![
                ("page".to_string(), "2".to_string()),
                ("limit".to_string(), "20".to_string()),
                ("search".to_string(), "shoes".to_string()),
                ("category".to_string(), "footwear".to_string()),
                ("status".to_string(), "active".to_string()),
            ]
        );
    }

    #[test]
    fn test_blank_search_is_omitted() {
        let query = ListQuery::default().search("   ");
        assert_eq!(query.to_query_pairs().len(), 2);
    }

    #[test]
    fn test_list_query_validation() {
        assert!(ListQuery::default().validate().is_ok());
        assert!(ListQuery::default().page(0).validate().is_err());
        assert!(ListQuery::default().limit(0).validate().is_err());
        assert!(ListQuery::default().limit(101).validate().is_err());
    }

    #[test]
    fn test_total_pages() {
        let page: Page<u8> = Page {
            items: vec![],
            total: 41,
            page: 1,
            limit: 20,
        };
        assert_eq!(page.total_pages(), 3);
    }
}
