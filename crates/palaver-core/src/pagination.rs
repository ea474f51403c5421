/// Minimum quiet time between two backward-page requests.
pub const PAGINATION_COOLDOWN_MS: u64 = 1_000;

/// Backward-pagination cursor for one conversation.
///
/// A request is allowed only while no other request is in flight, history is
/// not exhausted, and the cooldown since the last request activity has
/// elapsed. The timestamp is stamped on request and refreshed on completion,
/// so the cooldown counts from whichever happened last.
#[derive(Debug, Clone, Default)]
pub struct PaginationCursor {
    in_flight: bool,
    end_of_history: bool,
    last_request_at_ms: u64,
}

impl PaginationCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn end_of_history(&self) -> bool {
        self.end_of_history
    }

    /// Whether a backward-page request may be issued at `now_ms`.
    pub fn should_request(&self, now_ms: u64) -> bool {
        !self.end_of_history
            && !self.in_flight
            && now_ms.saturating_sub(self.last_request_at_ms) >= PAGINATION_COOLDOWN_MS
    }

    /// Record that a request was issued at `now_ms`.
    pub fn mark_requested(&mut self, now_ms: u64) {
        self.in_flight = true;
        self.last_request_at_ms = now_ms;
    }

    /// Record a `messages-loader` response landing at `now_ms`.
    pub fn complete(&mut self, end_of_history: bool, now_ms: u64) {
        self.in_flight = false;
        self.end_of_history = end_of_history;
        self.last_request_at_ms = now_ms;
    }

    /// Latch end-of-history without a round-trip (short init snapshot).
    pub fn latch_end(&mut self) {
        self.end_of_history = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_is_allowed_once_cooldown_has_passed_epoch() {
        let cursor = PaginationCursor::new();
        assert!(cursor.should_request(PAGINATION_COOLDOWN_MS));
    }

    #[test]
    fn request_fires_once_within_a_cooldown_window() {
        let mut cursor = PaginationCursor::new();

        assert!(cursor.should_request(10_000));
        cursor.mark_requested(10_000);

        // Second top-of-list sample 200 ms later: in flight, declined.
        assert!(!cursor.should_request(10_200));

        cursor.complete(false, 10_500);
        // Still inside the cooldown measured from the response.
        assert!(!cursor.should_request(10_900));
        assert!(cursor.should_request(11_500));
    }

    #[test]
    fn end_of_history_declines_forever() {
        let mut cursor = PaginationCursor::new();
        cursor.complete(true, 1_000);

        assert!(cursor.end_of_history());
        assert!(!cursor.should_request(1_000_000));
    }

    #[test]
    fn latch_end_skips_the_round_trip() {
        let mut cursor = PaginationCursor::new();
        cursor.latch_end();
        assert!(cursor.end_of_history());
        assert!(!cursor.in_flight());
        assert!(!cursor.should_request(1_000_000));
    }

    #[test]
    fn slow_response_does_not_let_a_second_request_slip_through() {
        let mut cursor = PaginationCursor::new();
        cursor.mark_requested(10_000);

        // The response is late; the cooldown alone would have elapsed.
        assert!(!cursor.should_request(12_000));

        cursor.complete(false, 12_500);
        assert!(!cursor.should_request(13_000));
        assert!(cursor.should_request(13_500));
    }
}
