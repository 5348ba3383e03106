//! Candidate Filter
//!
//! Pure filtering and ranking for discovery. Given the requesting user, the
//! candidate pool and the exclusion set, produces the ordered page of
//! candidates. No I/O; the caller supplies `today` so results are
//! reproducible.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};

use crate::domain::entities::{DiscoveryQuery, User};

/// Default number of candidates returned per discovery query.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// A candidate that passed every filter.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub user: User,
    /// Great-circle distance in km, when it was computed
    pub distance_km: Option<f64>,
}

/// Discovery filter configured with a page size.
#[derive(Debug, Clone, Copy)]
pub struct CandidateFilter {
    page_size: usize,
}

impl Default for CandidateFilter {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl CandidateFilter {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Store-side bounds for `requester`'s pool. Birthdates are bounded by
    /// whole calendar years; `apply` does the exact age check.
    pub fn query(&self, requester: &User, exclude: &HashSet<i64>, today: NaiveDate) -> DiscoveryQuery {
        let prefs = &requester.preferences;
        let year = today.year();
        let years_back = |age: u32| i32::try_from(age).ok().and_then(|a| year.checked_sub(a));

        let mut exclude: Vec<i64> = exclude.iter().copied().collect();
        if !exclude.contains(&requester.id) {
            exclude.push(requester.id);
        }
        exclude.sort_unstable();

        DiscoveryQuery {
            exclude,
            gender: prefs.interested_in.gender(),
            born_on_or_after: prefs
                .max_age
                .and_then(years_back)
                .and_then(|y| NaiveDate::from_ymd_opt(y - 1, 1, 1)),
            born_on_or_before: prefs
                .min_age
                .filter(|&min| min > 0)
                .and_then(years_back)
                .and_then(|y| NaiveDate::from_ymd_opt(y, 12, 31)),
            area: requester
                .location
                .zip(prefs.max_distance_km)
                .map(|(origin, km)| origin.bounds_within(km)),
        }
    }

    /// Filters and ranks `pool` for `requester`.
    ///
    /// `exclude` holds already-liked and blocked ids; the requester is
    /// always excluded as well.
    pub fn apply(
        &self,
        requester: &User,
        pool: Vec<User>,
        exclude: &HashSet<i64>,
        today: NaiveDate,
    ) -> Vec<RankedCandidate> {
        let prefs = &requester.preferences;
        let origin = requester.location.zip(prefs.max_distance_km);

        let mut candidates: Vec<RankedCandidate> = pool
            .into_iter()
            .filter(|c| c.id != requester.id && !exclude.contains(&c.id))
            .filter(|c| prefs.interested_in.accepts(c.gender))
            .filter(|c| within_age_window(c, prefs.min_age, prefs.max_age, today))
            .filter_map(|c| {
                let distance_km = match (origin, c.location) {
                    (Some((from, max_km)), Some(to)) => {
                        let d = from.distance_km(&to);
                        if d > max_km {
                            return None;
                        }
                        Some(d)
                    }
                    _ => None,
                };
                Some(RankedCandidate { user: c, distance_km })
            })
            .collect();

        // Stable: equal or missing distances keep pool order, measured ones first.
        candidates.sort_by(|a, b| match (a.distance_km, b.distance_km) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        candidates.truncate(self.page_size);
        candidates
    }
}

/// Age bounds are inclusive. A candidate without a birthdate fails any set bound.
fn within_age_window(
    candidate: &User,
    min_age: Option<u32>,
    max_age: Option<u32>,
    today: NaiveDate,
) -> bool {
    if min_age.is_none() && max_age.is_none() {
        return true;
    }
    let Some(age) = candidate.age_on(today) else {
        return false;
    };
    min_age.map_or(true, |min| age >= min) && max_age.map_or(true, |max| age <= max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Gender, GenderPreference, Preferences};
    use crate::domain::value_objects::GeoPoint;
    use pretty_assertions::assert_eq;

    // One degree of latitude is ~111.2 km.
    const KM_PER_DEGREE: f64 = 111.195;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 6, 15).unwrap()
    }

    fn user(id: i64) -> User {
        User {
            id,
            username: format!("user{}", id),
            display_name: None,
            avatar_url: None,
            gender: Some(Gender::Female),
            birthdate: NaiveDate::from_ymd_opt(2000, 1, 1),
            location: Some(GeoPoint::new(0.0, 0.0)),
            preferences: Preferences::default(),
            is_online: false,
            last_seen: None,
        }
    }

    fn at_km(mut u: User, km: f64) -> User {
        u.location = Some(GeoPoint::new(km / KM_PER_DEGREE, 0.0));
        u
    }

    fn requester() -> User {
        let mut r = user(1);
        r.gender = Some(Gender::Male);
        r.preferences = Preferences {
            interested_in: GenderPreference::Female,
            min_age: Some(18),
            max_age: Some(35),
            max_distance_km: Some(25.0),
        };
        r
    }

    fn ids(result: &[RankedCandidate]) -> Vec<i64> {
        result.iter().map(|c| c.user.id).collect()
    }

    #[test]
    fn test_candidate_within_all_bounds_is_included() {
        let candidate = at_km(user(2), 10.0);
        let result = CandidateFilter::default().apply(&requester(), vec![candidate], &HashSet::new(), today());

        assert_eq!(ids(&result), vec![2]);
        let d = result[0].distance_km.unwrap();
        assert!((d - 10.0).abs() < 0.1, "distance was {d}");
    }

    #[test]
    fn test_candidate_beyond_max_distance_is_excluded() {
        let candidate = at_km(user(2), 30.0);
        let result = CandidateFilter::default().apply(&requester(), vec![candidate], &HashSet::new(), today());
        assert!(result.is_empty());
    }

    #[test]
    fn test_requester_and_exclusions_are_removed() {
        let pool = vec![user(1), at_km(user(2), 1.0), at_km(user(3), 2.0)];
        let exclude: HashSet<i64> = [2].into_iter().collect();
        let result = CandidateFilter::default().apply(&requester(), pool, &exclude, today());
        assert_eq!(ids(&result), vec![3]);
    }

    #[test]
    fn test_gender_filter() {
        let mut male = at_km(user(2), 1.0);
        male.gender = Some(Gender::Male);
        let mut unknown = at_km(user(3), 1.0);
        unknown.gender = None;
        let female = at_km(user(4), 1.0);

        let result = CandidateFilter::default().apply(
            &requester(),
            vec![male, unknown, female],
            &HashSet::new(),
            today(),
        );
        assert_eq!(ids(&result), vec![4]);
    }

    #[test]
    fn test_both_preference_skips_gender_filter() {
        let mut r = requester();
        r.preferences.interested_in = GenderPreference::Both;
        let mut male = at_km(user(2), 1.0);
        male.gender = Some(Gender::Male);

        let result = CandidateFilter::default().apply(&r, vec![male], &HashSet::new(), today());
        assert_eq!(ids(&result), vec![2]);
    }

    #[test]
    fn test_age_window_is_inclusive_on_birthdays() {
        // Turns 18 today, turns 36 today, turns 35 tomorrow.
        let mut just_18 = at_km(user(2), 1.0);
        just_18.birthdate = NaiveDate::from_ymd_opt(2012, 6, 15);
        let mut just_36 = at_km(user(3), 1.0);
        just_36.birthdate = NaiveDate::from_ymd_opt(1994, 6, 15);
        let mut still_34 = at_km(user(4), 1.0);
        still_34.birthdate = NaiveDate::from_ymd_opt(1995, 6, 16);
        let mut seventeen = at_km(user(5), 1.0);
        seventeen.birthdate = NaiveDate::from_ymd_opt(2012, 6, 16);

        let result = CandidateFilter::default().apply(
            &requester(),
            vec![just_18, just_36, still_34, seventeen],
            &HashSet::new(),
            today(),
        );
        assert_eq!(ids(&result), vec![2, 4]);
    }

    #[test]
    fn test_missing_birthdate_fails_age_bounds() {
        let mut candidate = at_km(user(2), 1.0);
        candidate.birthdate = None;
        let result = CandidateFilter::default().apply(&requester(), vec![candidate.clone()], &HashSet::new(), today());
        assert!(result.is_empty());

        let mut r = requester();
        r.preferences.min_age = None;
        r.preferences.max_age = None;
        let result = CandidateFilter::default().apply(&r, vec![candidate], &HashSet::new(), today());
        assert_eq!(ids(&result), vec![2]);
    }

    #[test]
    fn test_missing_coordinates_skip_distance_filter() {
        let mut far_unknown = user(2);
        far_unknown.location = None;
        let near = at_km(user(3), 5.0);

        let result = CandidateFilter::default().apply(
            &requester(),
            vec![far_unknown, near],
            &HashSet::new(),
            today(),
        );
        assert_eq!(ids(&result), vec![3, 2]);
        assert!(result[1].distance_km.is_none());

        let mut r = requester();
        r.location = None;
        let far = at_km(user(4), 500.0);
        let result = CandidateFilter::default().apply(&r, vec![far], &HashSet::new(), today());
        assert_eq!(ids(&result), vec![4]);
        assert!(result[0].distance_km.is_none());
    }

    #[test]
    fn test_no_max_distance_means_no_distance_filter() {
        let mut r = requester();
        r.preferences.max_distance_km = None;
        let far = at_km(user(2), 900.0);
        let result = CandidateFilter::default().apply(&r, vec![far], &HashSet::new(), today());
        assert_eq!(ids(&result), vec![2]);
    }

    #[test]
    fn test_ranked_by_ascending_distance() {
        let pool = vec![
            at_km(user(2), 20.0),
            at_km(user(3), 3.0),
            at_km(user(4), 12.0),
        ];
        let result = CandidateFilter::default().apply(&requester(), pool, &HashSet::new(), today());
        assert_eq!(ids(&result), vec![3, 4, 2]);
    }

    #[test]
    fn test_query_bounds_follow_preferences() {
        let exclude: HashSet<i64> = [7, 3].into_iter().collect();
        let query = CandidateFilter::default().query(&requester(), &exclude, today());

        assert_eq!(query.exclude, vec![1, 3, 7]);
        assert_eq!(query.gender, Some(Gender::Female));
        assert_eq!(query.born_on_or_after, NaiveDate::from_ymd_opt(1994, 1, 1));
        assert_eq!(query.born_on_or_before, NaiveDate::from_ymd_opt(2012, 12, 31));
        assert!(query.area.is_some());

        let mut open = requester();
        open.preferences = Preferences::default();
        let query = CandidateFilter::default().query(&open, &HashSet::new(), today());
        assert_eq!(query.gender, None);
        assert_eq!(query.born_on_or_after, None);
        assert_eq!(query.born_on_or_before, None);
        assert_eq!(query.area, None);
    }

    #[test]
    fn test_query_keeps_everything_the_exact_filter_keeps() {
        let r = requester();
        let mut pool = Vec::new();
        let births = [(2012, 6, 15), (2012, 12, 31), (1995, 6, 16), (1994, 6, 15), (1993, 12, 31)];
        for (id, (y, m, d)) in (2..).zip(births) {
            let mut u = at_km(user(id), 24.9);
            u.birthdate = NaiveDate::from_ymd_opt(y, m, d);
            pool.push(u);
        }
        let mut unlocated = user(10);
        unlocated.location = None;
        pool.push(unlocated);
        let far = at_km(user(11), 60.0);
        pool.push(far.clone());

        let query = CandidateFilter::default().query(&r, &HashSet::new(), today());
        let kept = CandidateFilter::default().apply(&r, pool, &HashSet::new(), today());

        assert_eq!(ids(&kept), vec![2, 4, 10]);
        for candidate in &kept {
            assert!(query.admits(&candidate.user), "query dropped {}", candidate.user.id);
        }
        assert!(!query.admits(&far));
    }

    #[test]
    fn test_result_is_capped_to_page_size() {
        let pool: Vec<User> = (2..50).map(|id| at_km(user(id), id as f64 / 10.0)).collect();

        let result = CandidateFilter::default().apply(&requester(), pool.clone(), &HashSet::new(), today());
        assert_eq!(result.len(), DEFAULT_PAGE_SIZE);
        assert_eq!(result[0].user.id, 2);

        let result = CandidateFilter::new(5).apply(&requester(), pool, &HashSet::new(), today());
        assert_eq!(result.len(), 5);
    }
}
