//! Search query planning: which (city, radius) queries a site is driven
//! through.

use petlead_core::SearchQuery;

/// The queries for one site job.
///
/// Iteration is lazy, follows configuration order, and can be repeated any
/// number of times. A location-independent site always gets exactly one
/// [`SearchQuery::nationwide`] query, whatever the city list holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationPlan {
    cities: Vec<String>,
    radius_km: u32,
    location_independent: bool,
}

impl LocationPlan {
    #[must_use]
    pub fn new(cities: Vec<String>, radius_km: u32, location_independent: bool) -> Self {
        Self {
            cities,
            radius_km,
            location_independent,
        }
    }

    /// Number of queries the plan yields.
    #[must_use]
    pub fn len(&self) -> usize {
        if self.location_independent {
            1
        } else {
            self.cities.len()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Queries<'_> {
        Queries {
            plan: self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for &'a LocationPlan {
    type Item = SearchQuery;
    type IntoIter = Queries<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`LocationPlan`].
#[derive(Debug, Clone)]
pub struct Queries<'a> {
    plan: &'a LocationPlan,
    next: usize,
}

impl Iterator for Queries<'_> {
    type Item = SearchQuery;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.plan.len() {
            return None;
        }
        let index = self.next;
        self.next += 1;
        if self.plan.location_independent {
            Some(SearchQuery::nationwide(self.plan.radius_km))
        } else {
            let city = self.plan.cities[index].trim();
            Some(SearchQuery::city(city, self.plan.radius_km))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.plan.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Queries<'_> {}
