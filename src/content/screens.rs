//! Config screen items

use super::conditions::Conditions;
use super::params::ParameterNames;
use super::types::{ConditionKind, ConditionSetItem, ConfigItemKind, ConfigScreen, ConfigScreenItem, TRUE};
use super::ClassView;

const COURSE_HINT: &str = "Bitte die weiteren Optionen am Ende der Liste beachten";

/// Items of the main config screen
///
/// Class radios come first; the course selection blocks of all classes with
/// courses follow at the end of the list.
pub fn build_config_items(
    classes: &[ClassView<'_>],
    class_field: &str,
    conditions: &Conditions,
    params: &ParameterNames,
) -> Vec<ConfigScreenItem> {
    let mut items = Vec::new();

    for (index, class) in classes.iter().enumerate() {
        items.push(ConfigScreenItem::radio(class_field, class.name, class.name, TRUE));
        if !class.courses.is_empty() {
            items.push(ConfigScreenItem::text(
                COURSE_HINT,
                &conditions.class_selected[index],
            ));
        }
    }

    for (index, class) in classes.iter().enumerate() {
        if class.courses.is_empty() {
            continue;
        }

        let mode_param = &params.enable_course_selection[index];
        let selected = &conditions.class_selected[index];
        items.push(ConfigScreenItem::divider(selected));
        items.push(ConfigScreenItem::radio(mode_param, "Alle Kurse anzeigen", "full", selected));
        items.push(ConfigScreenItem::radio(
            mode_param,
            "Nur ausgewählte Kurse anzeigen",
            "flexible",
            selected,
        ));

        let manual = &conditions.manual_selection[index];
        for (course_index, course) in class.courses.iter().enumerate() {
            let param = &params.enable_specific_course[index][course_index];
            items.push(ConfigScreenItem::divider(manual));
            items.push(ConfigScreenItem::radio(param, format!("{course} ausblenden"), "hide", manual));
            items.push(ConfigScreenItem::radio(param, format!("{course} anzeigen"), "show", manual));
        }
    }

    items
}

/// Screen asking for the password before forwarding to `main_screen`
pub fn password_screen(prefix: &str, password_field: &str, main_screen: &str) -> ConfigScreen {
    let has_password = format!("{prefix}has-password");

    ConfigScreen {
        config: vec![
            ConfigScreenItem {
                kind: ConfigItemKind::Password,
                param: password_field.to_string(),
                label: "Passwort".to_string(),
                value: String::new(),
                visibility_condition_id: TRUE.to_string(),
            },
            ConfigScreenItem::other_screen(password_field, main_screen, &has_password),
        ],
        content_bucket_sets: Vec::new(),
        condition_sets: vec![ConditionSetItem {
            id: has_password.clone(),
            kind: ConditionKind::ParamNotEmpty,
            left: password_field.to_string(),
            right: String::new(),
        }],
        config_validation_condition_id: has_password,
    }
}
