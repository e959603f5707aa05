//! Servable-content compiler
//!
//! Turns a [`MergedSchedule`] into the immutable [`ServableContent`] that
//! clients consume: config screens with their condition graphs, plan buckets
//! per class and course, and message buckets.
//!
//! Each tenant (students, optionally teachers) is compiled independently
//! under its own name prefix. With a teacher tenant both results are merged
//! behind a user-type selection screen.

pub mod buckets;
pub mod conditions;
pub mod merge;
pub mod names;
pub mod params;
pub mod screens;
pub mod types;

pub use types::{Access, ServableContent};

use indexmap::IndexMap;

use crate::models::MergedSchedule;
use crate::utils::error::ContentError;
use buckets::{build_bucket_names, build_bucket_set_section, build_class_plans};
use conditions::build_conditions;
use params::build_parameter_names;
use types::{
    ConditionKind, ConditionSetItem, ConfigScreen, ConfigScreenItem, Protected, TRUE,
};

/// Class as seen by the compiler
///
/// `courses` is empty when course-level detail does not apply to the tenant.
#[derive(Debug, Clone)]
pub struct ClassView<'a> {
    pub name: &'a str,
    pub courses: Vec<&'a str>,
}

/// Input for one tenant
#[derive(Debug, Clone, Copy)]
pub struct TenantSource<'a> {
    pub schedule: &'a MergedSchedule,
    /// Password clients must present, if any
    pub password: Option<&'a str>,
    pub with_courses: bool,
}

const USER_TYPE_SCREEN: &str = "user-type-selection";
const USER_TYPE_FIELD: &str = "userType";

/// Compile servable content for one institution
///
/// # Errors
///
/// Fails on id collisions between tenants, an inconsistent start screen, or
/// a teacher tenant in legacy mode.
pub fn build_servable_content(
    legacy: bool,
    student: TenantSource<'_>,
    teacher: Option<TenantSource<'_>>,
) -> Result<ServableContent, ContentError> {
    let student_prefix = if legacy { "" } else { "student-" };
    let student_result = compile_tenant(student_prefix, student);

    let Some(teacher) = teacher else {
        return merge::rename_start_screen(student_result);
    };

    if legacy {
        return Err(ContentError::LegacyWithTeacher);
    }

    let teacher_result = compile_tenant("teacher-", teacher);
    let student_start = student_result.start_screen_id.clone();
    let teacher_start = teacher_result.start_screen_id.clone();

    let mut result = merge::merge_contents(student_result, teacher_result)?;
    if result.config_screens.contains_key(USER_TYPE_SCREEN) {
        return Err(ContentError::DuplicateKey {
            map: "config screens",
            key: USER_TYPE_SCREEN.to_string(),
        });
    }

    result.config_screens.insert(
        USER_TYPE_SCREEN.to_string(),
        Protected::new(user_type_screen(&student_start, &teacher_start), None),
    );
    result.start_screen_id = USER_TYPE_SCREEN.to_string();

    merge::rename_start_screen(result)
}

fn user_type_screen(student_start: &str, teacher_start: &str) -> ConfigScreen {
    let is_student = "isStudent";
    let is_teacher = "isTeacher";
    let any_user_type = "isValidUserType";

    ConfigScreen {
        config: vec![
            ConfigScreenItem::radio(USER_TYPE_FIELD, "Schüler", "student", TRUE),
            ConfigScreenItem::radio(USER_TYPE_FIELD, "Lehrer", "teacher", TRUE),
            ConfigScreenItem::divider(any_user_type),
            ConfigScreenItem::other_screen("", student_start, is_student),
            ConfigScreenItem::other_screen("", teacher_start, is_teacher),
        ],
        content_bucket_sets: Vec::new(),
        condition_sets: vec![
            ConditionSetItem {
                id: is_student.to_string(),
                kind: ConditionKind::ParamIs,
                left: USER_TYPE_FIELD.to_string(),
                right: "student".to_string(),
            },
            ConditionSetItem {
                id: is_teacher.to_string(),
                kind: ConditionKind::ParamIs,
                left: USER_TYPE_FIELD.to_string(),
                right: "teacher".to_string(),
            },
            ConditionSetItem {
                id: any_user_type.to_string(),
                kind: ConditionKind::Or,
                left: is_student.to_string(),
                right: is_teacher.to_string(),
            },
        ],
        config_validation_condition_id: any_user_type.to_string(),
    }
}

fn compile_tenant(prefix: &str, source: TenantSource<'_>) -> ServableContent {
    let schedule = source.schedule;
    let password = source.password.map(str::to_string);

    let classes: Vec<ClassView<'_>> = schedule
        .classes
        .iter()
        .map(|class| ClassView {
            name: &class.name,
            courses: if source.with_courses {
                class.courses.iter().map(|course| course.name.as_str()).collect()
            } else {
                Vec::new()
            },
        })
        .collect();

    let class_field = format!("{prefix}class");
    let password_field = format!("{prefix}password");

    let params = build_parameter_names(&classes, prefix);
    let bucket_names = build_bucket_names(&classes, prefix);
    let conditions = build_conditions(&classes, &class_field, &params, prefix);
    let config = screens::build_config_items(&classes, &class_field, &conditions, &params);
    let bucket_sets = build_bucket_set_section(
        &classes,
        &bucket_names,
        &conditions,
        password.as_ref().map(|_| password_field.as_str()),
    );

    let main_screen = ConfigScreen {
        config,
        content_bucket_sets: bucket_sets,
        condition_sets: conditions.items,
        config_validation_condition_id: conditions.final_validation,
    };

    let start_screen_id = format!("{prefix}start");
    let mut config_screens = IndexMap::new();
    match &password {
        None => {
            config_screens.insert(start_screen_id.clone(), Protected::new(main_screen, None));
        }
        Some(_) => {
            let main_screen_id = format!("{prefix}main");
            config_screens.insert(
                start_screen_id.clone(),
                Protected::new(
                    screens::password_screen(prefix, &password_field, &main_screen_id),
                    None,
                ),
            );
            config_screens.insert(main_screen_id, Protected::new(main_screen, password.clone()));
        }
    }

    let mut plans = IndexMap::new();
    let mut contents = IndexMap::new();
    for (index, class) in classes.iter().enumerate() {
        let class_plans = build_class_plans(schedule, class);

        plans.insert(
            bucket_names.full[index].clone(),
            Protected::new(class_plans.full, password.clone()),
        );
        plans.insert(
            bucket_names.base[index].clone(),
            Protected::new(class_plans.base, password.clone()),
        );
        for (id, (_, plan)) in bucket_names.course[index].iter().zip(class_plans.courses) {
            plans.insert(id.clone(), Protected::new(plan, password.clone()));
        }

        contents.insert(
            bucket_names.content[index].clone(),
            Protected::new(
                buckets::build_supervision_messages(schedule, class.name),
                password.clone(),
            ),
        );
    }

    contents.insert(
        bucket_names.default.clone(),
        Protected::new(buckets::build_default_messages(schedule), password),
    );

    ServableContent {
        config_screens,
        start_screen_id,
        plans,
        contents,
    }
}
