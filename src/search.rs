//! Route name search.

use crate::model::DecodedRoute;

/// Returns the names that contain `query`, in their original order.
///
/// Matching is case-sensitive and an empty query matches everything.
pub fn filter_names<'a>(names: &'a [String], query: &str) -> Vec<&'a str> {
    names
        .iter()
        .map(String::as_str)
        .filter(|name| name.contains(query))
        .collect()
}

/// Returns the routes whose description contains `query`.
pub fn filter_routes<'a>(routes: &'a [DecodedRoute], query: &str) -> Vec<&'a DecodedRoute> {
    routes
        .iter()
        .filter(|r| r.route.description.contains(query))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Route;

    fn names() -> Vec<String> {
        vec!["North Loop".into(), "South Loop".into(), "Downtown".into()]
    }

    #[test]
    fn test_filter_names_substring() {
        assert_eq!(filter_names(&names(), "Loop"), vec!["North Loop", "South Loop"]);
    }

    #[test]
    fn test_filter_names_is_case_sensitive() {
        assert!(filter_names(&names(), "loop").is_empty());
    }

    #[test]
    fn test_empty_query_matches_all() {
        assert_eq!(filter_names(&names(), "").len(), 3);
    }

    #[test]
    fn test_filter_routes_by_description() {
        let routes: Vec<DecodedRoute> = names()
            .into_iter()
            .map(|description| {
                DecodedRoute::from_route(Route {
                    description,
                    ..Default::default()
                })
            })
            .collect();

        let found = filter_routes(&routes, "Down");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].route.description, "Downtown");
    }
}
