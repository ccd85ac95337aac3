//! Bounded forward scan over channel history
//!
//! `conversations.history` pages newest first, so the oldest unseen messages
//! sit on the last page of an open-ended query. Instead of reading every page
//! the scan walks forward from the cursor in time windows: a window that fits
//! in one page is complete and its messages are kept, a window that overflows
//! is narrowed, an empty one is widened. It stops once `limit` messages are
//! held, the window reaches the present, or [`MAX_HISTORY_REQUESTS`] pages
//! have been requested.

use std::future::Future;

use tracing::debug;

use crate::core::models::MessageId;
use crate::errors::DigestError;
use crate::platform::{PlatformMessage, oldest_unseen};

/// Messages asked for per history request.
pub const PAGE_LIMIT: u16 = 200;

/// Upper bound on history requests for one channel fetch.
pub const MAX_HISTORY_REQUESTS: usize = 16;

/// First window width: one hour on the microsecond id scale.
pub const INITIAL_WINDOW: MessageId = 3_600 * 1_000_000;

const GROWTH: MessageId = 8;

/// Ids in `(after, until]`. `until: None` runs up to the present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub after: MessageId,
    pub until: Option<MessageId>,
}

impl HistoryWindow {
    fn contains(&self, id: MessageId) -> bool {
        id > self.after && self.until.is_none_or(|until| id <= until)
    }
}

/// The newest messages of one window, up to [`PAGE_LIMIT`]. `has_more` means
/// the window held more than that.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub messages: Vec<PlatformMessage>,
    pub has_more: bool,
}

/// Collects the `limit` oldest messages after `after`, requesting one page
/// per window through `fetch_page`. `now` is the current time on the id
/// scale and decides when a window becomes open-ended.
///
/// Returns fewer than `limit` messages when the request budget runs out; the
/// caller's cursor then advances only past what was returned.
///
/// # Errors
///
/// Returns the first error `fetch_page` produces.
pub async fn scan_forward<F, Fut>(
    after: MessageId,
    limit: u32,
    now: MessageId,
    mut fetch_page: F,
) -> Result<Vec<PlatformMessage>, DigestError>
where
    F: FnMut(HistoryWindow) -> Fut,
    Fut: Future<Output = Result<HistoryPage, DigestError>>,
{
    let wanted = usize::try_from(limit).unwrap_or(usize::MAX);
    let mut lower = after;
    let mut width = INITIAL_WINDOW;
    let mut held: Vec<PlatformMessage> = Vec::new();
    let mut requests = 0;

    while requests < MAX_HISTORY_REQUESTS {
        let upper = lower.saturating_add(width);
        let window = HistoryWindow {
            after: lower,
            until: (upper < now).then_some(upper),
        };
        requests += 1;
        let page = fetch_page(window).await?;
        let in_window: Vec<PlatformMessage> = page
            .messages
            .into_iter()
            .filter(|m| window.contains(m.id))
            .collect();

        if page.has_more {
            // Everything between `lower` and the oldest id on this page is
            // still unseen, so the next window ends no later than that id.
            let gap = in_window
                .iter()
                .map(|m| m.id - lower)
                .min()
                .unwrap_or(width);
            width = (width / GROWTH).min(gap).max(1);
            continue;
        }

        let found = in_window.len();
        held.extend(in_window);
        if held.len() >= wanted || window.until.is_none() {
            break;
        }
        lower = upper;
        if found < usize::from(PAGE_LIMIT) / 4 {
            width = width.saturating_mul(GROWTH);
        }
    }

    if requests == MAX_HISTORY_REQUESTS {
        debug!(
            "History scan after {} stopped at {} requests holding {} messages",
            after,
            requests,
            held.len()
        );
    }

    Ok(oldest_unseen(held, after, limit))
}
