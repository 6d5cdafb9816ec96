// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Permission checks for reviewers, app developers and admins.

use crate::models::{Addon, UserProfile};

/// May this user review apps?
pub fn is_reviewer(user: Option<&UserProfile>) -> bool {
    user.is_some_and(|u| u.action_allowed("Apps", "Review"))
}

/// May this user use the admin tools?
pub fn is_admin(user: Option<&UserProfile>) -> bool {
    user.is_some_and(|u| u.action_allowed("Admin", "Tools"))
}

/// Is the user an author of the app, or allowed to edit any app?
pub fn is_developer(app: &Addon, user_id: u64, user: Option<&UserProfile>) -> bool {
    app.has_author(user_id) || user.is_some_and(|u| u.action_allowed("Apps", "Edit"))
}
