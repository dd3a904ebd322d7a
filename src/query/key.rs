//! Cache keys
//!
//! A key is an ordered list of segments: endpoint identity first, then every
//! effective parameter. Two requests share a cache entry exactly when their
//! keys are equal; invalidation works on segment prefixes, so all stock
//! reads live under the `stock` prefix.

#![allow(dead_code)]

use crate::api::types::{Granularity, Target};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        prefix.len() <= self.0.len() && prefix.iter().zip(&self.0).all(|(p, s)| p == s)
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Key constructors, one per query unit.
pub mod keys {
    use super::*;

    pub fn health() -> QueryKey {
        QueryKey::new(["health"])
    }

    pub fn prediction(granularity: Granularity, name: &str, days: u32, target: Target) -> QueryKey {
        QueryKey::new([
            "predictions".to_string(),
            granularity.as_str().to_string(),
            name.to_string(),
            days.to_string(),
            target.as_str().to_string(),
        ])
    }

    pub fn demand_summary(days: u32) -> QueryKey {
        QueryKey::new(["demandSummary".to_string(), days.to_string()])
    }

    pub fn demand_by_category(days: u32) -> QueryKey {
        QueryKey::new(["demandByCategory".to_string(), days.to_string()])
    }

    pub fn demand_by_brand(days: u32, top: u32) -> QueryKey {
        QueryKey::new(["demandByBrand".to_string(), days.to_string(), top.to_string()])
    }

    pub fn stock_all() -> QueryKey {
        QueryKey::new(["stock"])
    }

    pub fn stock_item(producto: &str) -> QueryKey {
        QueryKey::new(["stock", "item", producto])
    }

    pub fn stock_summary() -> QueryKey {
        QueryKey::new(["stock", "summary"])
    }

    pub fn stock_alerts(days: u32) -> QueryKey {
        QueryKey::new(["stock".to_string(), "alerts".to_string(), days.to_string()])
    }

    pub fn stock_coverage(days: u32) -> QueryKey {
        QueryKey::new(["stock".to_string(), "coverage".to_string(), days.to_string()])
    }

    pub fn purchase_order(days: u32) -> QueryKey {
        QueryKey::new(["stock".to_string(), "purchaseOrder".to_string(), days.to_string()])
    }

    pub fn available_entities(granularity: Granularity) -> QueryKey {
        QueryKey::new(["availableEntities", granularity.as_str()])
    }

    pub fn data_stats() -> QueryKey {
        QueryKey::new(["dataStats"])
    }

    pub fn historical(limit: Option<u32>) -> QueryKey {
        let limit = limit.map_or_else(|| "all".to_string(), |l| l.to_string());
        QueryKey::new(["historical".to_string(), limit])
    }

    pub fn models() -> QueryKey {
        QueryKey::new(["models"])
    }

    pub fn model_performance() -> QueryKey {
        QueryKey::new(["models", "performance"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_parameters_equal_keys() {
        let a = keys::prediction(Granularity::Categoria, "Alimento", 30, Target::Kilos);
        let b = keys::prediction(Granularity::Categoria, "Alimento", 30, Target::Kilos);
        assert_eq!(a, b);
    }

    #[test]
    fn different_parameters_different_keys() {
        let a = keys::prediction(Granularity::Categoria, "Alimento", 30, Target::Kilos);
        let b = keys::prediction(Granularity::Categoria, "Alimento", 7, Target::Kilos);
        let c = keys::prediction(Granularity::Marca, "Alimento", 30, Target::Kilos);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn stock_prefix_covers_all_stock_reads() {
        for key in [
            keys::stock_all(),
            keys::stock_item("Purina 20kg"),
            keys::stock_alerts(30),
            keys::purchase_order(30),
            keys::stock_summary(),
            keys::stock_coverage(14),
        ] {
            assert!(key.starts_with(&["stock"]), "{key} should sit under stock");
        }
        assert!(!keys::demand_summary(30).starts_with(&["stock"]));
    }

    #[test]
    fn prefix_longer_than_key_does_not_match() {
        assert!(!keys::stock_all().starts_with(&["stock", "alerts"]));
    }
}
