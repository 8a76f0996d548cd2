// ABOUTME: Maps a listing of chapter elements to chapter records with dense ordinal numbers.
// ABOUTME: Ordinals are assigned here rather than trusted from page text.

use std::collections::HashSet;

use crate::model::MangaChapter;

/// Maps `items` to chapters, numbering them densely from `base` in display order.
///
/// Sites list newest first, so `reversed` flips the listing before numbering. The closure
/// receives the ordinal the chapter will get and may return `None` to skip an item; skipped
/// items and duplicate ids do not consume an ordinal.
pub fn map_chapters<T, F>(items: Vec<T>, reversed: bool, base: u32, mut f: F) -> Vec<MangaChapter>
where
    F: FnMut(u32, T) -> Option<MangaChapter>,
{
    let mut items = items;
    if reversed {
        items.reverse();
    }
    let mut seen = HashSet::with_capacity(items.len());
    let mut chapters = Vec::with_capacity(items.len());
    for item in items {
        let ordinal = base + chapters.len() as u32;
        let Some(chapter) = f(ordinal, item) else {
            continue;
        };
        if !seen.insert(chapter.id) {
            continue;
        }
        chapters.push(MangaChapter {
            number: ordinal as f32,
            ..chapter
        });
    }
    chapters
}
