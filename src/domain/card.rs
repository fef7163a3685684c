//! The card record assembled for one submission.

use url::Url;

use super::counters::EngagementCounters;
use super::error::DomainError;

/// Everything the template renderer needs for one card.
///
/// Constructed fresh per submission and owned exclusively by the in-flight
/// request; nothing here outlives the pipeline run.
#[derive(Debug, Clone)]
pub struct CardData {
    pub avatar_url: Url,
    pub display_name: String,
    pub handle: String,
    pub body: String,
    pub time_label: String,
    pub date_label: String,
    pub counters: EngagementCounters,
    pub verified: bool,
}

impl CardData {
    /// Assemble a card, deriving the display name from the raw handle.
    ///
    /// The body must contain at least one non-whitespace character; length
    /// is otherwise unbounded.
    #[allow(clippy::too_many_arguments)]
    pub fn compose(
        avatar_url: Url,
        handle: impl Into<String>,
        body: impl Into<String>,
        time_label: String,
        date_label: String,
        counters: EngagementCounters,
        verified: bool,
    ) -> Result<Self, DomainError> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(DomainError::validation("card body text is empty"));
        }

        let handle = handle.into();
        let display_name = display_name_from_handle(&handle);

        Ok(Self {
            avatar_url,
            display_name,
            handle,
            body,
            time_label,
            date_label,
            counters,
            verified,
        })
    }
}

/// Derive the short display label from a raw handle: everything before the
/// first underscore. May be empty when the handle starts with one.
pub fn display_name_from_handle(handle: &str) -> String {
    match handle.find('_') {
        Some(index) => handle[..index].to_string(),
        None => handle.to_string(),
    }
}
