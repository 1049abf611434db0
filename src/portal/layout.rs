//! Where things live on the portal: view paths and CSS selectors.
//!
//! Selector drift on the portal side is expected; everything the driver and
//! extractors look for is kept in this one module.

use std::fmt;

use url::Url;

use super::PortalError;

/// One logical page of the portal that yields one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// Landing page after sign-in; carries the unread-messages badge.
    Home,
    Profile,
    Gradebook,
    Credits,
    Attendance,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::Home => "home",
            View::Profile => "profile",
            View::Gradebook => "gradebook",
            View::Credits => "credits",
            View::Attendance => "attendance",
        }
    }

    /// Path relative to the portal root.
    fn path(self) -> &'static str {
        match self {
            View::Home => "",
            View::Profile => "profile",
            View::Gradebook => "choices",
            View::Credits => "choices/credits",
            View::Attendance => "attendance/view",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const LOGIN_PATH: &str = "login";

/// Resolves view URLs against the configured portal root.
#[derive(Debug, Clone)]
pub struct PortalLayout {
    base: Url,
}

impl PortalLayout {
    pub fn new(mut base: Url) -> Self {
        // Url::join drops the last path segment unless the base ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self { base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn login_url(&self) -> Result<Url, PortalError> {
        Ok(self.base.join(LOGIN_PATH)?)
    }

    pub fn view_url(&self, view: View) -> Result<Url, PortalError> {
        Ok(self.base.join(view.path())?)
    }
}

pub mod selectors {
    pub const LOGIN_USERNAME: &str = "#login-frm input[name='Login']";
    pub const LOGIN_PASSWORD: &str = "#login-frm input[name='Password']";
    pub const LOGIN_SUBMIT: &str = "#login-frm [type='submit']";
    /// Only rendered for a signed-in user.
    pub const AUTHENTICATED_MARKER: &str = "#account-menu";

    pub const MESSAGES_LINK: &str = "a[href*='messages']";
    pub const UNREAD_BADGE: &str = ".badge";

    pub const PROFILE_NAME: &str = ".profile-card .profile-name";
    pub const PROFILE_SCHOOL: &str = ".profile-card .profile-school";

    pub const GRADEBOOK_TABLE: &str = "table#gradebook";
    pub const GRADEBOOK_ROW: &str = "table#gradebook tbody tr";
    pub const GRADEBOOK_EXPAND_ALL: &str = "#gradebook-expand-all";
    pub const GRADEBOOK_COLLAPSED_ROW: &str = "table#gradebook tr.collapsed";
    pub const CELL_CODE: &str = "td.code";
    pub const CELL_NAME: &str = "td.name";
    pub const CELL_GRADE: &str = "td.grade";
    pub const CELL_CREDITS: &str = "td.credits";
    pub const CELL_DATE: &str = "td.date";
    pub const CELL_TEACHER: &str = "td.teacher";

    pub const ATTENDANCE_TABLE: &str = "table#attendance";
    pub const ATTENDANCE_MARK: &str = "table#attendance td.event[title]";

    pub const CREDIT_TABLE: &str = "table#credit-summary";
    pub const CREDIT_HEADER_CELL: &str = "table#credit-summary thead th";
    pub const CREDIT_BODY_ROW: &str = "table#credit-summary tbody tr";
    pub const CREDIT_FOOTER_ROW: &str = "table#credit-summary tfoot tr";
    pub const CREDIT_CELL: &str = "th, td";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_urls_keep_base_prefix() {
        let layout = PortalLayout::new(Url::parse("https://school.example.fi/portal").unwrap());
        assert_eq!(
            layout.view_url(View::Credits).unwrap().as_str(),
            "https://school.example.fi/portal/choices/credits"
        );
        assert_eq!(
            layout.view_url(View::Home).unwrap().as_str(),
            "https://school.example.fi/portal/"
        );
        assert_eq!(
            layout.login_url().unwrap().as_str(),
            "https://school.example.fi/portal/login"
        );
    }
}
