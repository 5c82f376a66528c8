//! Reviewer selection.
//!
//! Pure selection of reviewers from a candidate pool. Randomness comes from
//! the caller so tests can drive it with a seeded generator.

use crate::models::User;
use rand::seq::SliceRandom;
use rand::Rng;

/// Number of reviewers assigned to a newly created pull request.
pub const REVIEWERS_PER_PULL_REQUEST: usize = 2;

/// Choose up to `count` reviewers uniformly at random from `candidates`,
/// never choosing the user with ID `exclude`.
///
/// Returns `min(count, |candidates \ {exclude}|)` distinct users, or an empty
/// list if nobody is eligible. Callers decide whether that is an error.
pub fn select_reviewers<R>(candidates: &[User], exclude: &str, count: usize, rng: &mut R) -> Vec<User>
where
    R: Rng + ?Sized,
{
    let eligible: Vec<&User> = candidates.iter().filter(|u| u.id != exclude).collect();

    eligible
        .choose_multiple(rng, count)
        .map(|u| (*u).clone())
        .collect()
}
