// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Add-on and web app model.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Kind of listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddonType {
    Extension,
    Theme,
    Webapp,
}

/// Review/visibility status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddonStatus {
    Public,
    Pending,
    Disabled,
    Deleted,
}

/// How an app is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PremiumType {
    #[default]
    Free,
    Premium,
    PremiumInapp,
    FreeInapp,
    Other,
}

/// Application compatibility range for an add-on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Compat {
    pub min_version: String,
    pub max_version: String,
    /// Supported platforms; empty or containing "all" means every platform.
    #[serde(default)]
    pub platforms: Vec<String>,
}

/// An add-on or web app listed on the marketplace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Addon {
    /// Numeric primary key (also the document ID)
    pub id: u64,
    /// Stable public identifier, used in verify URLs
    pub guid: String,
    /// URL slug
    pub slug: String,
    pub name: String,
    pub addon_type: AddonType,
    pub status: AddonStatus,
    #[serde(default)]
    pub premium_type: PremiumType,
    /// Price in cents for premium apps. `Some(0)` marks a premium app with no charge.
    #[serde(default)]
    pub price_cents: Option<u64>,
    /// App origin (e.g. "app://game.example.com" or "https://game.example.com")
    #[serde(default)]
    pub origin: Option<String>,
    /// User IDs of the app's authors
    #[serde(default)]
    pub authors: Vec<u64>,
    #[serde(default)]
    pub compat: Option<Compat>,
}

impl Addon {
    pub fn is_premium(&self) -> bool {
        matches!(
            self.premium_type,
            PremiumType::Premium | PremiumType::PremiumInapp
        )
    }

    pub fn is_public(&self) -> bool {
        self.status == AddonStatus::Public
    }

    pub fn is_webapp(&self) -> bool {
        self.addon_type == AddonType::Webapp
    }

    pub fn has_author(&self, user_id: u64) -> bool {
        self.authors.contains(&user_id)
    }

    /// Premium app whose price is zero. Installs get an automatic purchase record.
    pub fn is_free_premium(&self) -> bool {
        self.is_premium() && self.price_cents == Some(0)
    }

    /// Host part of the app origin, if it parses.
    pub fn domain(&self) -> Option<String> {
        let origin = self.origin.as_deref()?;
        reqwest::Url::parse(origin)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }

    /// Check whether the add-on works on a platform and application version.
    ///
    /// Add-ons without compatibility info are treated as compatible everywhere.
    pub fn is_compatible(&self, app_version: &str, platform: &str) -> bool {
        let Some(compat) = &self.compat else {
            return true;
        };

        let platform_ok = compat.platforms.is_empty()
            || compat
                .platforms
                .iter()
                .any(|p| p.eq_ignore_ascii_case("all") || p.eq_ignore_ascii_case(platform));

        platform_ok
            && compare_versions(app_version, &compat.min_version) != Ordering::Less
            && compare_versions(app_version, &compat.max_version) != Ordering::Greater
    }
}

/// Compare dotted application versions ("3.6", "4.0b1", "3.6.*").
///
/// Each part compares by its leading number, then by the remaining suffix,
/// where no suffix sorts after any suffix ("4.0" > "4.0b1"). A `*` part
/// matches anything at or below it, so "3.6.*" is the upper end of 3.6.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a_parts: Vec<&str> = a.split('.').collect();
    let b_parts: Vec<&str> = b.split('.').collect();
    let len = a_parts.len().max(b_parts.len());

    for i in 0..len {
        let pa = a_parts.get(i).copied().unwrap_or("0");
        let pb = b_parts.get(i).copied().unwrap_or("0");

        if pa == "*" || pb == "*" {
            return match (pa == "*", pb == "*") {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                _ => Ordering::Less,
            };
        }

        let ord = compare_part(pa, pb);
        if ord != Ordering::Equal {
            return ord;
        }
    }

    Ordering::Equal
}

fn compare_part(a: &str, b: &str) -> Ordering {
    let (na, sa) = split_numeric(a);
    let (nb, sb) = split_numeric(b);

    na.cmp(&nb).then_with(|| match (sa.is_empty(), sb.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => sa.cmp(sb),
    })
}

fn split_numeric(part: &str) -> (u64, &str) {
    let digits = part.bytes().take_while(|b| b.is_ascii_digit()).count();
    let number = part[..digits].parse().unwrap_or(0);
    (number, &part[digits..])
}
