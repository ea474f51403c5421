use crate::types::ViewportSample;

/// What the viewport should do after a store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollAction {
    /// Jump to the unread-messages marker.
    ScrollToUnreadMarker,
    /// Pin to the end of the list.
    ScrollToBottom,
    /// Restore the element that was topmost before a prepend.
    ScrollToAnchor(String),
    /// Leave the viewport where it is.
    NoOp,
}

/// A scroll action plus whether the visible messages should be marked read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollDecision {
    pub action: ScrollAction,
    pub mark_read: bool,
}

/// Decide the viewport reaction to a store mutation.
///
/// A pagination prepend always wins: the previously-topmost element is
/// re-anchored so history can grow above without a visual jump. Otherwise:
///
/// | overflow | unread | at bottom | action                      |
/// |----------|--------|-----------|-----------------------------|
/// | no       | any    | —         | mark read if unread, no-op  |
/// | yes      | yes    | no        | jump to unread marker       |
/// | yes      | yes    | yes       | mark read, pin to bottom    |
/// | yes      | no     | yes       | pin to bottom               |
/// | yes      | no     | no        | no-op                       |
pub fn decide(
    viewport: ViewportSample,
    first_unread_index: Option<usize>,
    prepend_anchor: Option<&str>,
) -> ScrollDecision {
    if let Some(anchor) = prepend_anchor {
        return ScrollDecision {
            action: ScrollAction::ScrollToAnchor(anchor.to_owned()),
            mark_read: false,
        };
    }

    if !viewport.has_overflow {
        return ScrollDecision {
            action: ScrollAction::NoOp,
            mark_read: first_unread_index.is_some(),
        };
    }

    match (first_unread_index, viewport.at_bottom) {
        (Some(_), false) => ScrollDecision {
            action: ScrollAction::ScrollToUnreadMarker,
            mark_read: false,
        },
        (Some(_), true) => ScrollDecision {
            action: ScrollAction::ScrollToBottom,
            mark_read: true,
        },
        (None, true) => ScrollDecision {
            action: ScrollAction::ScrollToBottom,
            mark_read: false,
        },
        (None, false) => ScrollDecision {
            action: ScrollAction::NoOp,
            mark_read: false,
        },
    }
}

/// Whether the jump-to-latest affordance should be visible.
///
/// Appears once the viewport has drifted more than half its own height away
/// from the end of the list.
pub fn show_jump_to_latest(distance_from_bottom_px: f32, viewport_height_px: f32) -> bool {
    distance_from_bottom_px > viewport_height_px / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(at_bottom: bool, has_overflow: bool) -> ViewportSample {
        ViewportSample {
            at_bottom,
            at_top: false,
            has_overflow,
        }
    }

    #[test]
    fn short_content_marks_read_without_scrolling() {
        let decision = decide(viewport(false, false), Some(3), None);
        assert_eq!(decision.action, ScrollAction::NoOp);
        assert!(decision.mark_read);

        let decision = decide(viewport(false, false), None, None);
        assert_eq!(decision.action, ScrollAction::NoOp);
        assert!(!decision.mark_read);
    }

    #[test]
    fn unread_away_from_bottom_jumps_to_marker() {
        let decision = decide(viewport(false, true), Some(3), None);
        assert_eq!(decision.action, ScrollAction::ScrollToUnreadMarker);
        assert!(!decision.mark_read);
    }

    #[test]
    fn unread_at_bottom_reads_and_pins() {
        let decision = decide(viewport(true, true), Some(3), None);
        assert_eq!(decision.action, ScrollAction::ScrollToBottom);
        assert!(decision.mark_read);
    }

    #[test]
    fn no_unread_at_bottom_stays_pinned() {
        let decision = decide(viewport(true, true), None, None);
        assert_eq!(decision.action, ScrollAction::ScrollToBottom);
        assert!(!decision.mark_read);
    }

    #[test]
    fn no_unread_scrolled_up_is_left_alone() {
        let decision = decide(viewport(false, true), None, None);
        assert_eq!(decision.action, ScrollAction::NoOp);
        assert!(!decision.mark_read);
    }

    #[test]
    fn pagination_prepend_overrides_everything_with_an_anchor() {
        let decision = decide(viewport(true, true), Some(0), Some("M17"));
        assert_eq!(
            decision.action,
            ScrollAction::ScrollToAnchor("M17".to_owned())
        );
        assert!(!decision.mark_read);
    }

    #[test]
    fn jump_to_latest_appears_past_half_a_viewport() {
        assert!(!show_jump_to_latest(100.0, 600.0));
        assert!(!show_jump_to_latest(300.0, 600.0));
        assert!(show_jump_to_latest(301.0, 600.0));
    }
}
