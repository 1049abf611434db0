//! Unread-message count from the badge next to the messages link.

use html_scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use super::{ExtractError, parse};
use crate::config::TimeoutConfig;
use crate::portal::PortalSession;
use crate::portal::layout::selectors;

static MESSAGES_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(selectors::MESSAGES_LINK).unwrap());
static BADGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(selectors::UNREAD_BADGE).unwrap());

pub async fn fetch(
    session: &mut dyn PortalSession,
    timeouts: &TimeoutConfig,
) -> Result<u32, ExtractError> {
    session
        .wait_for(selectors::MESSAGES_LINK, timeouts.selector)
        .await?;
    let html = session.html().await?;
    parse(&Html::parse_document(&html))
}

/// A missing badge means nothing is unread.
pub fn parse(document: &Html) -> Result<u32, ExtractError> {
    let link = document
        .select(&MESSAGES_LINK)
        .next()
        .ok_or(ExtractError::MissingElement("messages link"))?;

    let Some(badge) = find_badge(link) else {
        return Ok(0);
    };
    let text = badge.text().collect::<String>();
    Ok(parse::first_number(&text).unwrap_or(0))
}

/// The badge sits inside the link on some layouts and beside it on others.
fn find_badge(link: ElementRef<'_>) -> Option<ElementRef<'_>> {
    if let Some(badge) = link.select(&BADGE).next() {
        return Some(badge);
    }
    let parent = link.parent().and_then(ElementRef::wrap)?;
    parent.select(&BADGE).next()
}
