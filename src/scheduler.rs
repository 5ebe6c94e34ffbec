//! Turn scheduling
//!
//! The next speaker is derived from the transcript's last author, so the
//! driver's in-memory turn pointer is only a cache between polls. A restart,
//! a roster edit or a human interjection all resolve themselves here.

use crate::store::USER_AUTHOR;

/// Roster index of the agent that speaks next.
///
/// Returns `None` for an empty roster. A human message hands the turn to the
/// first agent; an agent's message hands it to the agent after it. Any other
/// author (an agent since removed from the roster, or no messages at all)
/// leaves `prior` in place.
pub fn next_turn<S: AsRef<str>>(
    roster: &[S],
    last_author: Option<&str>,
    prior: usize,
) -> Option<usize> {
    if roster.is_empty() {
        return None;
    }
    let len = roster.len();

    let turn = match last_author {
        Some(USER_AUTHOR) => 0,
        Some(author) => roster
            .iter()
            .position(|name| name.as_ref() == author)
            .map_or(prior, |i| i + 1),
        None => prior,
    };
    Some(turn % len)
}

/// Turn after `turn`, wrapping around a roster of `len` agents
pub fn advance(turn: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else {
        (turn + 1) % len
    }
}
