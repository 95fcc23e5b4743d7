//! Path-payment route search.
//!
//! When a payer wants to send one asset and have the recipient receive
//! another, the ledger needs a chain of intermediate assets (hops) to
//! convert through. The backend's path service proposes candidates; this
//! module describes the query, the candidates, and the client-side filter
//! applied before the first candidate is taken.

use serde::{Deserialize, Serialize};

use crate::asset::Asset;

/// A request for conversion paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathQuery {
    /// Account that will pay; its balances bound the search.
    pub source_account: String,
    pub destination_account: String,
    pub destination_asset: Asset,
    /// Stroops the destination should receive.
    pub destination_amount: i64,
    /// Restrict candidates to those paying with this asset.
    pub send_asset: Option<Asset>,
    /// Restrict candidates to those costing at most this many stroops.
    pub max_send: Option<i64>,
}

/// One candidate route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathResult {
    pub source_asset: Asset,
    pub source_amount: i64,
    pub destination_asset: Asset,
    pub destination_amount: i64,
    /// Intermediate assets, in conversion order. Excludes both endpoints.
    pub hops: Vec<Asset>,
}

/// Keeps the candidates that pay with the requested asset and stay within
/// the send limit. Order is preserved; ranking belongs to the backend.
pub fn filter_candidates(query: &PathQuery, candidates: Vec<PathResult>) -> Vec<PathResult> {
    candidates
        .into_iter()
        .filter(|c| {
            query
                .send_asset
                .as_ref()
                .map_or(true, |asset| c.source_asset.same_as(asset))
        })
        .filter(|c| query.max_send.map_or(true, |max| c.source_amount <= max))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetType;
    use crate::crypto::KeyPair;

    fn candidate(source_asset: Asset, source_amount: i64, hops: Vec<Asset>) -> PathResult {
        PathResult {
            source_asset,
            source_amount,
            destination_asset: Asset::native(),
            destination_amount: 10,
            hops,
        }
    }

    #[test]
    fn filter_by_send_asset_and_max() {
        let issuer = KeyPair::random();
        let usd = Asset::new("USD", &issuer.address(), AssetType::Credit4);
        let eur = Asset::new("EUR", &issuer.address(), AssetType::Credit4);

        let query = PathQuery {
            source_account: "GSRC".into(),
            destination_account: "GDST".into(),
            destination_asset: Asset::native(),
            destination_amount: 10,
            send_asset: Some(Asset::new("USD", &issuer.seed(), AssetType::Credit4)),
            max_send: Some(100),
        };

        let kept = filter_candidates(
            &query,
            vec![
                candidate(eur.clone(), 50, vec![]),
                candidate(usd.clone(), 150, vec![eur.clone()]),
                candidate(usd.clone(), 90, vec![eur.clone()]),
                candidate(usd.clone(), 100, vec![]),
            ],
        );

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].source_amount, 90);
        assert_eq!(kept[0].hops, vec![eur]);
        assert_eq!(kept[1].source_amount, 100);
    }

    #[test]
    fn unconstrained_query_keeps_everything() {
        let query = PathQuery {
            source_account: "GSRC".into(),
            destination_account: "GDST".into(),
            destination_asset: Asset::native(),
            destination_amount: 10,
            send_asset: None,
            max_send: None,
        };
        let all = vec![
            candidate(Asset::native(), 1, vec![]),
            candidate(Asset::native(), i64::MAX, vec![]),
        ];
        assert_eq!(filter_candidates(&query, all.clone()), all);
    }
}
