//! Genre label normalization.
//!
//! Upstream metadata arrives in the requester's locale. Every genre
//! comparison in the engine is exact and case-sensitive against the canonical
//! English vocabulary, so labels go through [`normalize`] first.

use std::collections::BTreeSet;

/// Maps a localized genre label to its canonical English label.
///
/// Returns `None` for labels that are already canonical or unknown. No
/// canonical label appears on the left-hand side, which keeps [`normalize`]
/// idempotent.
pub fn canonical(label: &str) -> Option<&'static str> {
    let mapped = match label {
        // Movie genres
        "Aventure" => "Adventure",
        "Biographie" => "Biography",
        "Comédie" => "Comedy",
        "Documentaire" => "Documentary",
        "Drame" => "Drama",
        "Familial" => "Family",
        "Fantastique" => "Fantasy",
        "Histoire" => "History",
        "Horreur" => "Horror",
        "Musique" => "Music",
        "Mystère" => "Mystery",
        "Science-Fiction" => "Science Fiction",
        "Téléfilm" => "TV Movie",
        "Guerre" => "War",
        "Érotique" => "Erotic",
        "Adulte" => "Adult",
        // Series genres
        "Action & Aventure" => "Action & Adventure",
        "Enfants" => "Kids",
        "Actualités" => "News",
        "Téléréalité" => "Reality",
        "Science-Fiction & Fantastique" => "Sci-Fi & Fantasy",
        "Feuilleton" => "Soap",
        "Talk-show" => "Talk",
        "Guerre & Politique" => "War & Politics",
        _ => return None,
    };
    Some(mapped)
}

/// Normalizes genre labels, preserving order.
///
/// Unknown labels pass through unchanged.
pub fn normalize<S: AsRef<str>>(raw_genres: &[S]) -> Vec<String> {
    raw_genres
        .iter()
        .map(|g| {
            let g = g.as_ref();
            canonical(g).unwrap_or(g).to_string()
        })
        .collect()
}

/// Returns the normalized genres that appear in `list`, in request order.
pub fn matching(normalized: &[String], list: &BTreeSet<String>) -> Vec<String> {
    normalized
        .iter()
        .filter(|g| list.contains(g.as_str()))
        .cloned()
        .collect()
}
