//! Condition graph construction
//!
//! Clients evaluate the graph against their stored parameters to decide which
//! config items are visible, which buckets to load and whether the
//! configuration is complete.

use super::names::Namespace;
use super::params::ParameterNames;
use super::types::{ConditionKind, ConditionSetItem, FALSE, TRUE};
use super::ClassView;

/// Boolean combinator for [`ConditionGraph::associate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

impl From<Combinator> for ConditionKind {
    fn from(value: Combinator) -> Self {
        match value {
            Combinator::And => Self::And,
            Combinator::Or => Self::Or,
        }
    }
}

#[derive(Debug, Clone)]
struct ConditionNode {
    kind: ConditionKind,
    left: String,
    right: String,
}

/// Condition nodes of one compilation pass
#[derive(Debug, Clone, Default)]
pub struct ConditionGraph {
    nodes: Namespace<ConditionNode>,
}

impl ConditionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single node and return its id
    pub fn add(&mut self, wish_name: &str, kind: ConditionKind, left: &str, right: &str) -> String {
        self.nodes.insert(
            wish_name,
            ConditionNode {
                kind,
                left: left.to_string(),
                right: right.to_string(),
            },
        )
    }

    /// Combine operands into a right-associated chain
    ///
    /// The last operand seeds the chain and every preceding operand wraps it
    /// in a new node, so `n` operands allocate `n - 1` nodes. The outermost
    /// node takes `wish_name`, inner node `i` takes `wish_name-i`. An empty
    /// list yields `_false` for `or` and `_true` for `and` without allocating.
    pub fn associate(&mut self, operands: &[String], combinator: Combinator, wish_name: &str) -> String {
        let Some((last, rest)) = operands.split_last() else {
            return match combinator {
                Combinator::Or => FALSE.to_string(),
                Combinator::And => TRUE.to_string(),
            };
        };

        let mut accumulator = last.clone();
        for (index, operand) in rest.iter().enumerate().rev() {
            let name = if index == 0 {
                wish_name.to_string()
            } else {
                format!("{wish_name}-{index}")
            };
            accumulator = self.add(&name, combinator.into(), operand, &accumulator);
        }

        accumulator
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn into_items(self) -> Vec<ConditionSetItem> {
        self.nodes
            .into_inner()
            .into_iter()
            .map(|(id, node)| ConditionSetItem {
                id,
                kind: node.kind,
                left: node.left,
                right: node.right,
            })
            .collect()
    }
}

/// Condition ids the other compiler stages refer to
#[derive(Debug, Clone)]
pub struct Conditions {
    pub items: Vec<ConditionSetItem>,
    pub final_validation: String,
    /// Per class: the class is selected
    pub class_selected: Vec<String>,
    /// Per class: selected and manual course selection chosen
    pub manual_selection: Vec<String>,
    /// Per class: selected and all courses shown
    pub full_selection: Vec<String>,
    /// Per class and course: manual selection with this course shown
    pub course_enabled: Vec<Vec<String>>,
}

/// Build the condition graph for one tenant
pub fn build_conditions(
    classes: &[ClassView<'_>],
    class_field: &str,
    params: &ParameterNames,
    prefix: &str,
) -> Conditions {
    let mut graph = ConditionGraph::new();

    let class_selected: Vec<String> = classes
        .iter()
        .map(|class| {
            graph.add(
                &format!("{prefix}is-class-selected-{}", class.name),
                ConditionKind::ParamIs,
                class_field,
                class.name,
            )
        })
        .collect();

    let without_courses: Vec<String> = classes
        .iter()
        .zip(&class_selected)
        .filter(|(class, _)| class.courses.is_empty())
        .map(|(_, id)| id.clone())
        .collect();
    let any_without_courses_selected = graph.associate(
        &without_courses,
        Combinator::Or,
        &format!("{prefix}is-class-without-courses-selected"),
    );

    let course_param = |class_index: usize, course_index: usize| {
        params.enable_specific_course[class_index][course_index].as_str()
    };

    let course_shown = per_course(classes, |ci, ki, class, course| {
        graph.add(
            &format!("{prefix}is-course-enabled-{}-{course}", class.name),
            ConditionKind::ParamIs,
            course_param(ci, ki),
            "show",
        )
    });

    let course_hidden = per_course(classes, |ci, ki, class, course| {
        graph.add(
            &format!("{prefix}is-course-disabled-{}-{course}", class.name),
            ConditionKind::ParamIs,
            course_param(ci, ki),
            "hide",
        )
    });

    let course_decided = per_course(classes, |ci, ki, class, course| {
        graph.add(
            &format!("{prefix}is-course-enabled-or-disabled-{}-{course}", class.name),
            ConditionKind::Or,
            &course_shown[ci][ki],
            &course_hidden[ci][ki],
        )
    });

    let all_courses_decided: Vec<String> = course_decided
        .iter()
        .map(|decided| {
            graph.associate(
                decided,
                Combinator::And,
                &format!("{prefix}are-courses-enabled-or-disabled"),
            )
        })
        .collect();

    let manual_selection: Vec<String> = classes
        .iter()
        .enumerate()
        .map(|(index, class)| {
            let chosen = graph.add(
                &format!("{prefix}class-manual-course-selection-enabled-{}", class.name),
                ConditionKind::ParamIs,
                &params.enable_course_selection[index],
                "flexible",
            );
            graph.add(
                &format!("{prefix}class-selected-and-manual-courses-enabled-{}", class.name),
                ConditionKind::And,
                &chosen,
                &class_selected[index],
            )
        })
        .collect();

    let course_enabled = per_course(classes, |ci, ki, class, course| {
        graph.associate(
            &[manual_selection[ci].clone(), course_shown[ci][ki].clone()],
            Combinator::And,
            &format!("{prefix}load-specific-course-{}-{course}", class.name),
        )
    });

    let full_selection: Vec<String> = classes
        .iter()
        .enumerate()
        .map(|(index, class)| {
            let chosen = graph.add(
                &format!("{prefix}class-full-course-selection-enabled-{}", class.name),
                ConditionKind::ParamIs,
                &params.enable_course_selection[index],
                "full",
            );
            // shares its wish-name with the manual variant and gets a suffix
            graph.add(
                &format!("{prefix}class-selected-and-manual-courses-enabled-{}", class.name),
                ConditionKind::And,
                &chosen,
                &class_selected[index],
            )
        })
        .collect();

    let any_full_selected = graph.associate(
        &full_selection,
        Combinator::Or,
        &format!("{prefix}any-class-with-courses-and-full-courses-selected"),
    );

    let manual_complete: Vec<String> = classes
        .iter()
        .enumerate()
        .map(|(index, class)| {
            if class.courses.is_empty() {
                return FALSE.to_string();
            }
            graph.add(
                &format!(
                    "{prefix}class-selected-and-manual-courses-enabled-and-complete-{}",
                    class.name
                ),
                ConditionKind::And,
                &manual_selection[index],
                &all_courses_decided[index],
            )
        })
        .collect();

    let any_manual_complete = graph.associate(
        &manual_complete,
        Combinator::Or,
        &format!(
            "{prefix}any-class-with-courses-selected-and-manual-course-selection-chosen-and-course-selection-complete"
        ),
    );

    let final_validation = graph.associate(
        &[any_full_selected, any_manual_complete, any_without_courses_selected],
        Combinator::Or,
        &format!("{prefix}final-validation"),
    );

    Conditions {
        items: graph.into_items(),
        final_validation,
        class_selected,
        manual_selection,
        full_selection,
        course_enabled,
    }
}

fn per_course<'a, F>(classes: &[ClassView<'a>], mut f: F) -> Vec<Vec<String>>
where
    F: FnMut(usize, usize, &ClassView<'a>, &'a str) -> String,
{
    classes
        .iter()
        .enumerate()
        .map(|(ci, class)| {
            class
                .courses
                .iter()
                .enumerate()
                .map(|(ki, course)| f(ci, ki, class, *course))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::params::build_parameter_names;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("op{i}")).collect()
    }

    #[test]
    fn test_associate_empty_lists() {
        let mut graph = ConditionGraph::new();
        assert_eq!(graph.associate(&[], Combinator::Or, "x"), FALSE);
        assert_eq!(graph.associate(&[], Combinator::And, "x"), TRUE);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_associate_single_operand() {
        let mut graph = ConditionGraph::new();
        assert_eq!(graph.associate(&ids(1), Combinator::And, "x"), "op0");
        assert!(graph.is_empty());
    }

    #[test]
    fn test_associate_node_count() {
        for n in 0..8 {
            let mut graph = ConditionGraph::new();
            graph.associate(&ids(n), Combinator::Or, "chain");
            assert_eq!(graph.len(), n.saturating_sub(1));
        }
    }

    #[test]
    fn test_associate_right_to_left_shape() {
        let mut graph = ConditionGraph::new();
        let root = graph.associate(&ids(3), Combinator::And, "all");
        assert_eq!(root, "all");

        let items = graph.into_items();
        assert_eq!(items.len(), 2);

        // inner node is created first
        assert_eq!(items[0].id, "all-1");
        assert_eq!(items[0].left, "op1");
        assert_eq!(items[0].right, "op2");
        assert_eq!(items[1].id, "all");
        assert_eq!(items[1].left, "op0");
        assert_eq!(items[1].right, "all-1");
        assert!(items.iter().all(|item| item.kind == ConditionKind::And));
    }

    #[test]
    fn test_build_conditions_without_courses() {
        let classes = vec![
            ClassView { name: "5a", courses: vec![] },
            ClassView { name: "5b", courses: vec![] },
        ];
        let params = build_parameter_names(&classes, "");
        let conditions = build_conditions(&classes, "class", &params, "");

        assert_eq!(conditions.class_selected, vec!["is-class-selected-5a", "is-class-selected-5b"]);
        assert_eq!(conditions.final_validation, "final-validation");

        let final_node = conditions
            .items
            .iter()
            .find(|item| item.id == "final-validation")
            .unwrap();
        assert_eq!(final_node.left, "any-class-with-courses-and-full-courses-selected");

        // neither class has courses, so the manual branch never holds
        let manual = conditions
            .items
            .iter()
            .find(|item| item.id.starts_with("any-class-with-courses-selected-and-manual"))
            .unwrap();
        assert_eq!((manual.left.as_str(), manual.right.as_str()), (FALSE, FALSE));

        let without = conditions
            .items
            .iter()
            .find(|item| item.id == "is-class-without-courses-selected")
            .unwrap();
        assert_eq!(without.kind, ConditionKind::Or);
        assert_eq!(without.left, "is-class-selected-5a");
        assert_eq!(without.right, "is-class-selected-5b");
    }

    #[test]
    fn test_build_conditions_with_courses() {
        let classes = vec![ClassView {
            name: "10a",
            courses: vec!["ma1", "de1"],
        }];
        let params = build_parameter_names(&classes, "student-");
        let conditions = build_conditions(&classes, "student-class", &params, "student-");

        assert_eq!(
            conditions.manual_selection,
            vec!["student-class-selected-and-manual-courses-enabled-10a"]
        );
        assert_eq!(
            conditions.full_selection,
            vec!["student-class-selected-and-manual-courses-enabled-10a-2"]
        );
        assert_eq!(
            conditions.course_enabled,
            vec![vec![
                "student-load-specific-course-10a-ma1",
                "student-load-specific-course-10a-de1"
            ]]
        );

        let shown = conditions
            .items
            .iter()
            .find(|item| item.id == "student-is-course-enabled-10a-ma1")
            .unwrap();
        assert_eq!(shown.left, "student-enable-specific-course-10a-ma1");
        assert_eq!(shown.right, "show");

        let complete = conditions
            .items
            .iter()
            .find(|item| item.id == "student-class-selected-and-manual-courses-enabled-and-complete-10a")
            .unwrap();
        assert_eq!(complete.right, "student-are-courses-enabled-or-disabled");

        // no course-less class, so the last operand of the final chain is _false
        let inner = conditions
            .items
            .iter()
            .find(|item| item.id == "student-final-validation-1")
            .unwrap();
        assert_eq!(inner.right, FALSE);
    }

    #[test]
    fn test_ids_unique_within_pass() {
        let classes = vec![
            ClassView { name: "10a", courses: vec!["ma1"] },
            ClassView { name: "10A", courses: vec!["ma1"] },
            ClassView { name: "5a", courses: vec![] },
        ];
        let params = build_parameter_names(&classes, "");
        let conditions = build_conditions(&classes, "class", &params, "");

        let mut seen = std::collections::HashSet::new();
        for item in &conditions.items {
            assert!(seen.insert(item.id.clone()), "duplicate id {}", item.id);
        }
    }
}
