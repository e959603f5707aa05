//! Merge engine
//!
//! Combines the per-date schedules of one cycle into a single
//! [`MergedSchedule`] that lists every class on every day.

use indexmap::IndexMap;
use std::collections::{BTreeSet, HashSet};

use crate::models::{
    DaySchedule, MergedClass, MergedClassDay, MergedCourse, MergedDay, MergedSchedule,
};
use crate::utils::error::MergeError;

/// Merge options
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Keep the course teacher in the merged class list
    pub keep_course_teachers: bool,
}

struct ClassAccumulator {
    sort_key: String,
    courses: IndexMap<String, Option<String>>,
}

/// Merge day schedules into one multi-day schedule
///
/// Days keep their input order. Classes are ordered by the sort key of their
/// most recently processed occurrence; ties keep first-appearance order.
///
/// # Errors
///
/// Returns [`MergeError::DuplicateKey`] when two inputs share a date.
pub fn merge_day_schedules(
    days: &[DaySchedule],
    options: MergeOptions,
) -> Result<MergedSchedule, MergeError> {
    let mut dates = HashSet::new();
    for day in days {
        if !dates.insert(day.date) {
            return Err(MergeError::DuplicateKey { date: day.date });
        }
    }

    let free_days: BTreeSet<_> = days
        .iter()
        .flat_map(|day| day.free_days.iter().copied())
        .collect();

    let mut accumulated: IndexMap<String, ClassAccumulator> = IndexMap::new();
    for class in days.iter().flat_map(|day| day.classes.iter()) {
        let entry = accumulated
            .entry(class.title.clone())
            .or_insert_with(|| ClassAccumulator {
                sort_key: class.sort_key.clone(),
                courses: IndexMap::new(),
            });

        entry.sort_key = class.sort_key.clone();
        for course in &class.courses {
            let teacher = options.keep_course_teachers.then(|| course.teacher.clone());
            entry.courses.insert(course.name.clone(), teacher);
        }
    }

    // stable, so equal sort keys keep first-appearance order
    accumulated.sort_by(|_, a, _, b| a.sort_key.cmp(&b.sort_key));

    let classes: Vec<MergedClass> = accumulated
        .into_iter()
        .map(|(name, class)| MergedClass {
            name,
            courses: class
                .courses
                .into_iter()
                .map(|(name, teacher)| MergedCourse { name, teacher })
                .collect(),
        })
        .collect();

    let merged_days = days
        .iter()
        .map(|day| MergedDay {
            date: day.date,
            last_modified_at: day.last_modified_at,
            classes: classes
                .iter()
                .map(|class| {
                    let entry = day.classes.iter().find(|item| item.title == class.name);
                    MergedClassDay {
                        title: class.name.clone(),
                        lesson_slots: entry
                            .map(|item| item.lesson_slots.clone())
                            .unwrap_or_default(),
                        supervisions: entry
                            .map(|item| item.supervisions.clone())
                            .unwrap_or_default(),
                    }
                })
                .collect(),
            messages: day.messages.clone(),
        })
        .collect();

    Ok(MergedSchedule {
        free_days,
        classes,
        days: merged_days,
    })
}
