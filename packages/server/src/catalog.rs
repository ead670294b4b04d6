//! Catalog lookups that live outside the store: legacy path resolution and
//! display names.

use crate::entity::exercise;

pub const UPGRADE_CLIENT: &str = "please upgrade your exercism command-line client";

/// Track, slug and in-exercise path recovered from a legacy client path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyPath {
    pub track: String,
    pub slug: String,
    pub path: String,
}

/// Split a legacy `track/slug/file` path.
///
/// One leading `/` is dropped and both `/` and `\` separate segments. Anything
/// after the slug is rejoined with `/`. Returns `None` for fewer than three
/// segments.
pub fn resolve_legacy_path(path: &str) -> Option<LegacyPath> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let segments: Vec<&str> = path.split(['/', '\\']).collect();
    let [track, slug, rest @ ..] = segments.as_slice() else {
        return None;
    };
    if rest.is_empty() {
        return None;
    }

    Some(LegacyPath {
        track: (*track).to_string(),
        slug: (*slug).to_string(),
        path: rest.join("/"),
    })
}

/// Display name of an exercise: the catalog's name, else the title-cased slug.
pub fn problem_name(exercise: Option<&exercise::Model>, slug: &str) -> String {
    match exercise {
        Some(e) if !e.name.trim().is_empty() => e.name.clone(),
        _ => common::language::problem_name(slug),
    }
}
