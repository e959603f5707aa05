//! Composition of per-tenant content

use indexmap::IndexMap;

use super::types::ServableContent;
use crate::utils::error::ContentError;

/// Id clients load first
pub const DEFAULT_START_SCREEN: &str = "default";

/// Union of two tenants' content, keeping the first tenant's start screen
///
/// # Errors
///
/// Returns [`ContentError::DuplicateKey`] if any id appears in both.
pub fn merge_contents(
    a: ServableContent,
    b: ServableContent,
) -> Result<ServableContent, ContentError> {
    Ok(ServableContent {
        config_screens: merge_maps("config screens", a.config_screens, b.config_screens)?,
        start_screen_id: a.start_screen_id,
        plans: merge_maps("plans", a.plans, b.plans)?,
        contents: merge_maps("contents", a.contents, b.contents)?,
    })
}

/// Move the start screen to [`DEFAULT_START_SCREEN`]
///
/// # Errors
///
/// Fails if the start screen does not exist or the target id is taken by
/// another screen.
pub fn rename_start_screen(mut input: ServableContent) -> Result<ServableContent, ContentError> {
    let current = input.start_screen_id.clone();

    if !input.config_screens.contains_key(&current) {
        return Err(ContentError::UnknownStartScreen(current));
    }
    if current == DEFAULT_START_SCREEN {
        return Ok(input);
    }
    if input.config_screens.contains_key(DEFAULT_START_SCREEN) {
        return Err(ContentError::StartScreenConflict(DEFAULT_START_SCREEN.to_string()));
    }

    if let Some(screen) = input.config_screens.shift_remove(&current) {
        input
            .config_screens
            .insert(DEFAULT_START_SCREEN.to_string(), screen);
    }
    input.start_screen_id = DEFAULT_START_SCREEN.to_string();

    Ok(input)
}

fn merge_maps<V>(
    map: &'static str,
    mut a: IndexMap<String, V>,
    b: IndexMap<String, V>,
) -> Result<IndexMap<String, V>, ContentError> {
    for (key, value) in b {
        if a.contains_key(&key) {
            return Err(ContentError::DuplicateKey { map, key });
        }
        a.insert(key, value);
    }
    Ok(a)
}
