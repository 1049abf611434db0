//! Display name and school from the profile card.

use html_scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::{ExtractError, element_text};
use crate::config::TimeoutConfig;
use crate::portal::PortalSession;
use crate::portal::layout::selectors;

static NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(selectors::PROFILE_NAME).unwrap());
static SCHOOL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(selectors::PROFILE_SCHOOL).unwrap());

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: Option<String>,
    pub school: Option<String>,
}

pub async fn fetch(
    session: &mut dyn PortalSession,
    timeouts: &TimeoutConfig,
) -> Result<UserProfile, ExtractError> {
    session
        .wait_for(selectors::PROFILE_NAME, timeouts.selector)
        .await?;
    let html = session.html().await?;
    Ok(parse(&Html::parse_document(&html)))
}

pub fn parse(document: &Html) -> UserProfile {
    UserProfile {
        name: document.select(&NAME).next().and_then(element_text),
        school: document.select(&SCHOOL).next().and_then(element_text),
    }
}
