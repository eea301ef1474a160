//! Client-side approximations used when the insights endpoints are missing.

use crate::models::{Listing, PopularEstate, PriceTrend, TrendingSearch};
use std::collections::BTreeMap;

const TRENDING_LIMIT: usize = 5;

#[derive(Default)]
struct Bucket {
    count: usize,
    total: u64,
}

impl Bucket {
    fn add(&mut self, price: u64) {
        self.count += 1;
        self.total = self.total.saturating_add(price);
    }

    fn average(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            (self.total as f64 / self.count as f64).round() as u64
        }
    }
}

fn group_by<'a>(listings: &'a [Listing], key: impl Fn(&'a Listing) -> &'a str) -> BTreeMap<&'a str, Bucket> {
    let mut groups: BTreeMap<&str, Bucket> = BTreeMap::new();
    for listing in listings {
        let k = key(listing).trim();
        if k.is_empty() {
            continue;
        }
        groups.entry(k).or_default().add(listing.price);
    }
    groups
}

/// Average price per house type, ordered by type tag.
pub fn price_trends(listings: &[Listing]) -> Vec<PriceTrend> {
    group_by(listings, |l| l.house_type.as_str())
        .into_iter()
        .map(|(kind, bucket)| PriceTrend {
            house_type: kind.to_string(),
            average_price: bucket.average(),
            listings: bucket.count,
        })
        .collect()
}

/// Estates ordered by number of listings, busiest first.
pub fn popular_estates(listings: &[Listing]) -> Vec<PopularEstate> {
    let mut estates: Vec<PopularEstate> = group_by(listings, |l| l.location.estate.as_str())
        .into_iter()
        .map(|(estate, bucket)| PopularEstate {
            estate: estate.to_string(),
            listings: bucket.count,
            average_price: bucket.average(),
        })
        .collect();
    // Stable sort keeps the alphabetical order among ties
    estates.sort_by(|a, b| b.listings.cmp(&a.listings));
    estates
}

/// Approximate what people search for by what is most listed.
pub fn trending_searches(listings: &[Listing]) -> Vec<TrendingSearch> {
    let mut terms: Vec<TrendingSearch> = group_by(listings, |l| l.location.estate.as_str())
        .into_iter()
        .chain(group_by(listings, |l| l.house_type.as_str()))
        .map(|(term, bucket)| TrendingSearch {
            term: term.to_string(),
            count: bucket.count,
        })
        .collect();
    terms.sort_by(|a, b| b.count.cmp(&a.count));
    terms.truncate(TRENDING_LIMIT);
    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HouseType;

    fn listing(id: &str, estate: &str, kind: HouseType, price: u64) -> Listing {
        let mut l = Listing::new(id, id, price, kind);
        l.location.estate = estate.to_string();
        l
    }

    fn sample() -> Vec<Listing> {
        vec![
            listing("1", "Amalemba", HouseType::Bedsitter, 6000),
            listing("2", "Amalemba", HouseType::Bedsitter, 7000),
            listing("3", "Maraba", HouseType::OneBedroom, 15000),
            listing("4", "", HouseType::Single, 5000),
        ]
    }

    #[test]
    fn price_trends_average_per_type() {
        let trends = price_trends(&sample());
        let bedsitter = trends.iter().find(|t| t.house_type == "bedsitter").unwrap();
        assert_eq!(bedsitter.average_price, 6500);
        assert_eq!(bedsitter.listings, 2);
        assert_eq!(trends.len(), 3);
    }

    #[test]
    fn popular_estates_skip_unnamed_and_sort_by_count() {
        let estates = popular_estates(&sample());
        assert_eq!(estates.len(), 2);
        assert_eq!(estates[0].estate, "Amalemba");
        assert_eq!(estates[0].listings, 2);
        assert_eq!(estates[1].average_price, 15000);
    }

    #[test]
    fn trending_is_capped() {
        let many: Vec<Listing> = (0..10)
            .map(|i| listing(&i.to_string(), &format!("Estate {i}"), HouseType::Hostel, 3000))
            .collect();
        let trending = trending_searches(&many);
        assert_eq!(trending.len(), TRENDING_LIMIT);
        assert_eq!(trending[0].term, "hostel");
        assert_eq!(trending[0].count, 10);
    }

    #[test]
    fn empty_input_gives_empty_insights() {
        assert!(price_trends(&[]).is_empty());
        assert!(popular_estates(&[]).is_empty());
    }
}
