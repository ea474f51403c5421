//! Render-time grouping predicates over the ordered message sequence.
//!
//! All three are pure functions of `(sequence, index)`; nothing here is
//! cached on messages, so re-running on an unchanged sequence always yields
//! the same answer.

use chrono::{DateTime, NaiveDate, Utc};

use crate::types::Message;

/// Two messages from the same sender further apart than this get a visible
/// timestamp between them.
pub const TIMESTAMP_GAP_MS: u64 = 90_000;

/// Whether a date banner belongs above the message at `index`.
///
/// True for the first message and whenever the civil date changes from the
/// previous message.
pub fn is_day_boundary(messages: &[Message], index: usize) -> bool {
    let Some(message) = messages.get(index) else {
        return false;
    };
    if index == 0 {
        return true;
    }
    civil_date(message.created_at_ms) != civil_date(messages[index - 1].created_at_ms)
}

/// Whether the message at `index` closes a visual run of bubbles.
///
/// True for the last message overall, and whenever the next message is from
/// another day or another sender.
pub fn is_run_tail(messages: &[Message], index: usize) -> bool {
    let Some(message) = messages.get(index) else {
        return false;
    };
    let Some(next) = messages.get(index + 1) else {
        return true;
    };
    next.sender_id != message.sender_id
        || civil_date(next.created_at_ms) != civil_date(message.created_at_ms)
}

/// Whether the message at `index` shows its timestamp.
///
/// Every run tail does, and so does a message whose successor from the same
/// sender arrives more than [`TIMESTAMP_GAP_MS`] later.
pub fn shows_timestamp(messages: &[Message], index: usize) -> bool {
    let Some(message) = messages.get(index) else {
        return false;
    };
    if is_run_tail(messages, index) {
        return true;
    }
    let next = &messages[index + 1];
    next.created_at_ms.saturating_sub(message.created_at_ms) > TIMESTAMP_GAP_MS
}

fn civil_date(timestamp_ms: u64) -> NaiveDate {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms as i64)
        .map(|datetime| datetime.date_naive())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeliveryState;

    const DAY_MS: u64 = 24 * 60 * 60 * 1_000;

    fn message(id: &str, sender: &str, created_at_ms: u64) -> Message {
        Message {
            id: id.to_owned(),
            body: "hi".to_owned(),
            chat_id: "c1".to_owned(),
            sender_id: sender.to_owned(),
            created_at_ms,
            updated_at_ms: created_at_ms,
            delivery: DeliveryState::Delivered,
        }
    }

    #[test]
    fn sixty_second_gap_same_sender_shows_nothing_between() {
        // 10:00 and 10:01 on the same day, same sender.
        let base = 1_700_000_000_000;
        let messages = vec![message("M1", "a", base), message("M2", "a", base + 60_000)];

        assert!(!is_day_boundary(&messages, 1));
        assert!(!shows_timestamp(&messages, 0));
        assert!(!is_run_tail(&messages, 0));
    }

    #[test]
    fn gap_over_ninety_seconds_shows_timestamp_inside_a_run() {
        let base = 1_700_000_000_000;
        let messages = vec![
            message("M1", "a", base),
            message("M2", "a", base + TIMESTAMP_GAP_MS + 1),
        ];

        assert!(shows_timestamp(&messages, 0));
        // Same sender, same day: the run itself continues.
        assert!(!is_run_tail(&messages, 0));
    }

    #[test]
    fn exactly_ninety_seconds_is_not_a_gap() {
        let base = 1_700_000_000_000;
        let messages = vec![
            message("M1", "a", base),
            message("M2", "a", base + TIMESTAMP_GAP_MS),
        ];

        assert!(!shows_timestamp(&messages, 0));
    }

    #[test]
    fn sender_change_ends_the_run() {
        let base = 1_700_000_000_000;
        let messages = vec![
            message("M1", "a", base),
            message("M2", "b", base + 1_000),
            message("M3", "b", base + 2_000),
        ];

        assert!(is_run_tail(&messages, 0));
        assert!(!is_run_tail(&messages, 1));
        assert!(is_run_tail(&messages, 2));
    }

    #[test]
    fn day_change_raises_banner_and_ends_run() {
        let base = 1_700_000_000_000;
        let messages = vec![message("M1", "a", base), message("M2", "a", base + DAY_MS)];

        assert!(is_day_boundary(&messages, 0));
        assert!(is_day_boundary(&messages, 1));
        assert!(is_run_tail(&messages, 0));
    }

    #[test]
    fn a_week_apart_on_the_same_weekday_is_still_a_boundary() {
        // The civil date changed even though the weekday did not.
        let base = 1_700_000_000_000;
        let messages = vec![message("M1", "a", base), message("M2", "a", base + 7 * DAY_MS)];

        assert!(is_day_boundary(&messages, 1));
    }

    #[test]
    fn last_message_always_shows_timestamp() {
        let messages = vec![message("M1", "a", 1_700_000_000_000)];
        assert!(shows_timestamp(&messages, 0));
        assert!(is_run_tail(&messages, 0));
    }

    #[test]
    fn predicates_are_idempotent_over_an_unchanged_sequence() {
        let base = 1_700_000_000_000;
        let messages = vec![
            message("M1", "a", base),
            message("M2", "b", base + 200_000),
            message("M3", "b", base + DAY_MS),
        ];

        let first: Vec<(bool, bool, bool)> = (0..messages.len())
            .map(|i| {
                (
                    is_day_boundary(&messages, i),
                    shows_timestamp(&messages, i),
                    is_run_tail(&messages, i),
                )
            })
            .collect();
        let second: Vec<(bool, bool, bool)> = (0..messages.len())
            .map(|i| {
                (
                    is_day_boundary(&messages, i),
                    shows_timestamp(&messages, i),
                    is_run_tail(&messages, i),
                )
            })
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn out_of_range_index_is_never_grouped() {
        let messages = vec![message("M1", "a", 1_700_000_000_000)];
        assert!(!is_day_boundary(&messages, 5));
        assert!(!shows_timestamp(&messages, 5));
        assert!(!is_run_tail(&messages, 5));
    }
}
