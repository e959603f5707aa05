//! Content buckets: names, load rules and payloads

use indexmap::IndexMap;

use super::conditions::Conditions;
use super::names::Namespace;
use super::types::{
    BucketKind, ContentBucketSetItem, ContentMessage, MessageContent, PlanContent, PlanItem, TRUE,
};
use super::ClassView;
use crate::models::{LessonSlot, MergedSchedule, Supervision, SupervisionKind};
use crate::utils::hex;

/// Bucket ids, indexed like the class list
#[derive(Debug, Clone)]
pub struct BucketNames {
    pub default: String,
    pub content: Vec<String>,
    pub full: Vec<String>,
    pub base: Vec<String>,
    pub course: Vec<Vec<String>>,
}

/// Allocate bucket ids
///
/// Class and course names enter the ids hex-encoded, so distinct names never
/// collapse into the same slug.
pub fn build_bucket_names(classes: &[ClassView<'_>], prefix: &str) -> BucketNames {
    let mut names = Namespace::new();

    let mut per_class = |kind: &str| -> Vec<String> {
        classes
            .iter()
            .map(|class| names.allocate(&format!("{prefix}{kind}-{}", hex(class.name))))
            .collect()
    };

    let content = per_class("content");
    let full = per_class("full");
    let base = per_class("base");

    let course = classes
        .iter()
        .map(|class| {
            class
                .courses
                .iter()
                .map(|course| {
                    names.allocate(&format!(
                        "{prefix}single-course-{}-{}",
                        hex(class.name),
                        hex(course)
                    ))
                })
                .collect()
        })
        .collect();

    BucketNames {
        default: format!("{prefix}default"),
        content,
        full,
        base,
        course,
    }
}

/// Bucket load rules for the main config screen
pub fn build_bucket_set_section(
    classes: &[ClassView<'_>],
    names: &BucketNames,
    conditions: &Conditions,
    password_param: Option<&str>,
) -> Vec<ContentBucketSetItem> {
    let item = |id: &str, kind: BucketKind, condition: &str| ContentBucketSetItem {
        id: id.to_string(),
        password_param: password_param.map(str::to_string),
        usage_condition_id: condition.to_string(),
        kind,
    };

    let mut section = vec![item(&names.default, BucketKind::Content, TRUE)];

    section.extend(
        names
            .content
            .iter()
            .zip(&conditions.class_selected)
            .map(|(id, condition)| item(id, BucketKind::Content, condition)),
    );

    section.extend(classes.iter().enumerate().map(|(index, class)| {
        let condition = if class.courses.is_empty() {
            &conditions.class_selected[index]
        } else {
            &conditions.full_selection[index]
        };
        item(&names.full[index], BucketKind::Plan, condition)
    }));

    section.extend(
        names
            .base
            .iter()
            .zip(&conditions.manual_selection)
            .map(|(id, condition)| item(id, BucketKind::Plan, condition)),
    );

    for (ids, enabled) in names.course.iter().zip(&conditions.course_enabled) {
        section.extend(
            ids.iter()
                .zip(enabled)
                .map(|(id, condition)| item(id, BucketKind::Plan, condition)),
        );
    }

    section
}

/// Plan payloads of one class
#[derive(Debug, Clone, Default)]
pub struct ClassPlans {
    pub full: PlanContent,
    pub base: PlanContent,
    /// Keyed by course name, in declaration order
    pub courses: IndexMap<String, PlanContent>,
}

/// Sort the lesson slots of a class into its plan buckets
///
/// Slots referencing a course outside the class's declared set land in the
/// base bucket.
pub fn build_class_plans(schedule: &MergedSchedule, class: &ClassView<'_>) -> ClassPlans {
    let mut plans = ClassPlans {
        courses: class
            .courses
            .iter()
            .map(|course| (course.to_string(), PlanContent::default()))
            .collect(),
        ..ClassPlans::default()
    };

    for day in &schedule.days {
        let slots = day
            .classes
            .iter()
            .filter(|entry| entry.title == class.name)
            .flat_map(|entry| entry.lesson_slots.iter());

        for slot in slots {
            let item = plan_item(day.date, class.name, slot);
            plans.full.items.push(item.clone());

            let target = match slot.course.as_deref() {
                Some(course) => plans.courses.get_mut(course).unwrap_or(&mut plans.base),
                None => &mut plans.base,
            };
            target.items.push(item);
        }
    }

    plans
}

fn plan_item(date: chrono::NaiveDate, class: &str, slot: &LessonSlot) -> PlanItem {
    PlanItem {
        date,
        class: class.to_string(),
        lesson: slot.period,
        subject: slot.subject.clone(),
        subject_changed: slot.subject_changed,
        teacher: slot.teacher.clone(),
        teacher_changed: slot.teacher_changed,
        room: slot.room.clone(),
        room_changed: slot.room_changed,
        info: slot.info.clone(),
        start_time: slot.start_time.clone(),
        end_time: slot.end_time.clone(),
    }
}

/// Supervision duties of one class as messages
///
/// Regular duties are informational, cancelled and substituted ones notify.
pub fn build_supervision_messages(schedule: &MergedSchedule, class: &str) -> MessageContent {
    let messages = schedule
        .days
        .iter()
        .flat_map(|day| {
            day.classes
                .iter()
                .filter(move |entry| entry.title == class)
                .flat_map(move |entry| {
                    entry
                        .supervisions
                        .iter()
                        .enumerate()
                        .map(move |(index, supervision)| {
                            supervision_message(&day.date.to_string(), index, supervision)
                        })
                })
        })
        .collect();

    MessageContent { messages }
}

fn supervision_message(date: &str, index: usize, supervision: &Supervision) -> ContentMessage {
    let base_title = format!(
        "{date} - Aufsicht vor Stunde {}",
        supervision.preceding_period
    );
    let title = match supervision.kind {
        SupervisionKind::Regular => base_title,
        kind => format!("{} - {base_title}", kind.label()),
    };

    let replacement = supervision
        .replacement_for
        .as_ref()
        .map(|name| format!("Ersatz für {name}"));
    let content = [
        Some(supervision.time1.clone()),
        Some(supervision.time2.clone()),
        replacement,
        supervision.info.clone(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join("\n");

    ContentMessage {
        id: format!("{date}-{index}"),
        title,
        content,
        notify: supervision.kind != SupervisionKind::Regular,
    }
}

/// Free-text messages of every day
pub fn build_default_messages(schedule: &MergedSchedule) -> MessageContent {
    let messages = schedule
        .days
        .iter()
        .flat_map(|day| {
            let date = day.date.to_string();
            day.messages
                .iter()
                .enumerate()
                .map(move |(index, message)| ContentMessage {
                    id: format!("{date}-{index}"),
                    title: date.clone(),
                    content: message.clone(),
                    notify: false,
                })
        })
        .collect();

    MessageContent { messages }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MergedClassDay, MergedDay};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn slot(period: u32, course: Option<&str>) -> LessonSlot {
        LessonSlot {
            period,
            subject: Some("MA".into()),
            subject_changed: false,
            teacher: Some("Mei".into()),
            teacher_changed: false,
            room: None,
            room_changed: false,
            subject_id: None,
            info: None,
            course: course.map(str::to_string),
            start_time: None,
            end_time: None,
        }
    }

    fn supervision(kind: SupervisionKind, replacement: Option<&str>) -> Supervision {
        Supervision {
            kind,
            preceding_period: 3,
            time1: "09:20".into(),
            time2: "09:20 - 09:40".into(),
            location: "Hof".into(),
            replacement_for: replacement.map(str::to_string),
            info: None,
        }
    }

    fn schedule() -> MergedSchedule {
        MergedSchedule {
            free_days: Default::default(),
            classes: Vec::new(),
            days: vec![MergedDay {
                date: NaiveDate::from_ymd_opt(2024, 9, 5).unwrap(),
                last_modified_at: Utc.with_ymd_and_hms(2024, 9, 4, 7, 40, 0).unwrap(),
                classes: vec![MergedClassDay {
                    title: "10a".into(),
                    lesson_slots: vec![
                        slot(1, Some("ma1")),
                        slot(2, None),
                        slot(3, Some("ph9")),
                        slot(4, Some("de1")),
                    ],
                    supervisions: vec![
                        supervision(SupervisionKind::Regular, None),
                        supervision(SupervisionKind::Substituted, Some("Mül")),
                    ],
                }],
                messages: vec!["Heute Wandertag".into()],
            }],
        }
    }

    #[test]
    fn test_bucket_names_use_hex() {
        let classes = vec![ClassView { name: "10a", courses: vec!["ma1"] }];
        let names = build_bucket_names(&classes, "student-");

        assert_eq!(names.default, "student-default");
        assert_eq!(names.content, vec!["student-content-313061"]);
        assert_eq!(names.full, vec!["student-full-313061"]);
        assert_eq!(names.base, vec!["student-base-313061"]);
        assert_eq!(names.course, vec![vec!["student-single-course-313061-6d6131"]]);
    }

    #[test]
    fn test_class_plans_partition() {
        let class = ClassView { name: "10a", courses: vec!["ma1", "de1"] };
        let plans = build_class_plans(&schedule(), &class);

        assert_eq!(plans.full.items.len(), 4);
        let base: Vec<_> = plans.base.items.iter().map(|i| i.lesson).collect();
        assert_eq!(base, vec![2, 3]);
        assert_eq!(plans.courses["ma1"].items[0].lesson, 1);
        assert_eq!(plans.courses["de1"].items[0].lesson, 4);
    }

    #[test]
    fn test_supervision_messages() {
        let content = build_supervision_messages(&schedule(), "10a");
        assert_eq!(content.messages.len(), 2);

        let regular = &content.messages[0];
        assert_eq!(regular.id, "2024-09-05-0");
        assert_eq!(regular.title, "2024-09-05 - Aufsicht vor Stunde 3");
        assert_eq!(regular.content, "09:20\n09:20 - 09:40");
        assert!(!regular.notify);

        let substituted = &content.messages[1];
        assert_eq!(substituted.title, "Vertretung - 2024-09-05 - Aufsicht vor Stunde 3");
        assert_eq!(substituted.content, "09:20\n09:20 - 09:40\nErsatz für Mül");
        assert!(substituted.notify);
    }

    #[test]
    fn test_default_messages() {
        let content = build_default_messages(&schedule());
        assert_eq!(content.messages.len(), 1);
        assert_eq!(content.messages[0].id, "2024-09-05-0");
        assert_eq!(content.messages[0].title, "2024-09-05");
        assert!(!content.messages[0].notify);
    }
}
