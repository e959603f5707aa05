//! Client parameter names for course selection

use super::names::Namespace;
use super::ClassView;

/// Parameter names, indexed like the class list
#[derive(Debug, Clone)]
pub struct ParameterNames {
    /// Per class: `full` or `flexible`
    pub enable_course_selection: Vec<String>,
    /// Per class and course: `show` or `hide`
    pub enable_specific_course: Vec<Vec<String>>,
}

pub fn build_parameter_names(classes: &[ClassView<'_>], prefix: &str) -> ParameterNames {
    let mut names = Namespace::new();

    let enable_course_selection = classes
        .iter()
        .map(|class| names.allocate(&format!("{prefix}enable-course-selection-{}", class.name)))
        .collect();

    let enable_specific_course = classes
        .iter()
        .map(|class| {
            class
                .courses
                .iter()
                .map(|course| {
                    names.allocate(&format!(
                        "{prefix}enable-specific-course-{}-{course}",
                        class.name
                    ))
                })
                .collect()
        })
        .collect();

    ParameterNames {
        enable_course_selection,
        enable_specific_course,
    }
}
