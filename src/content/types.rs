//! Servable content data model
//!
//! Field names serialize in camelCase to match the client protocol.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Condition that always holds
pub const TRUE: &str = "_true";
/// Condition that never holds
pub const FALSE: &str = "_false";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionKind {
    And,
    Or,
    ParamIs,
    ParamNotEmpty,
}

/// A node of the condition graph
///
/// For `and`/`or` both operands are node ids (or a terminal). For `paramIs`
/// `left` is a parameter name and `right` the expected value. For
/// `paramNotEmpty` only `left` is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSetItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigItemKind {
    Radio,
    Password,
    OtherConfigBucket,
    Text,
    Divider,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigScreenItem {
    #[serde(rename = "type")]
    pub kind: ConfigItemKind,
    pub param: String,
    pub label: String,
    pub value: String,
    pub visibility_condition_id: String,
}

impl ConfigScreenItem {
    pub fn radio(param: &str, label: impl Into<String>, value: &str, visibility: &str) -> Self {
        Self {
            kind: ConfigItemKind::Radio,
            param: param.to_string(),
            label: label.into(),
            value: value.to_string(),
            visibility_condition_id: visibility.to_string(),
        }
    }

    pub fn divider(visibility: &str) -> Self {
        Self {
            kind: ConfigItemKind::Divider,
            param: String::new(),
            label: String::new(),
            value: String::new(),
            visibility_condition_id: visibility.to_string(),
        }
    }

    pub fn text(label: &str, visibility: &str) -> Self {
        Self {
            kind: ConfigItemKind::Text,
            param: String::new(),
            label: label.to_string(),
            value: String::new(),
            visibility_condition_id: visibility.to_string(),
        }
    }

    /// Link to another config screen
    pub fn other_screen(param: &str, screen: &str, visibility: &str) -> Self {
        Self {
            kind: ConfigItemKind::OtherConfigBucket,
            param: param.to_string(),
            label: String::new(),
            value: screen.to_string(),
            visibility_condition_id: visibility.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BucketKind {
    Content,
    Plan,
}

/// Declares when a client should load a content bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBucketSetItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_param: Option<String>,
    pub usage_condition_id: String,
    #[serde(rename = "type")]
    pub kind: BucketKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigScreen {
    pub config: Vec<ConfigScreenItem>,
    pub content_bucket_sets: Vec<ContentBucketSetItem>,
    pub condition_sets: Vec<ConditionSetItem>,
    pub config_validation_condition_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanItem {
    pub date: NaiveDate,
    pub class: String,
    pub lesson: u32,
    pub subject: Option<String>,
    pub subject_changed: bool,
    pub teacher: Option<String>,
    pub teacher_changed: bool,
    pub room: Option<String>,
    pub room_changed: bool,
    pub info: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanContent {
    pub items: Vec<PlanItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMessage {
    pub id: String,
    pub title: String,
    pub content: String,
    pub notify: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "message")]
    pub messages: Vec<ContentMessage>,
}

/// A value guarded by an optional password
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protected<T> {
    pub content: T,
    pub password: Option<String>,
}

impl<T> Protected<T> {
    pub fn new(content: T, password: Option<String>) -> Self {
        Self { content, password }
    }

    /// Opaque comparison against the stored password
    pub fn check(&self, password: Option<&str>) -> Access<&T> {
        match self.password.as_deref() {
            None => Access::Granted(&self.content),
            Some(expected) if password == Some(expected) => Access::Granted(&self.content),
            Some(_) => Access::Unauthorized,
        }
    }
}

/// Outcome of a lookup with password check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access<T> {
    Granted(T),
    Unauthorized,
    NotFound,
}

/// Immutable result of one compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServableContent {
    pub config_screens: IndexMap<String, Protected<ConfigScreen>>,
    pub start_screen_id: String,
    pub plans: IndexMap<String, Protected<PlanContent>>,
    pub contents: IndexMap<String, Protected<MessageContent>>,
}

impl ServableContent {
    pub fn config_screen(&self, name: &str, password: Option<&str>) -> Access<&ConfigScreen> {
        lookup(&self.config_screens, name, password)
    }

    pub fn plan(&self, name: &str, password: Option<&str>) -> Access<&PlanContent> {
        lookup(&self.plans, name, password)
    }

    pub fn content(&self, name: &str, password: Option<&str>) -> Access<&MessageContent> {
        lookup(&self.contents, name, password)
    }

    /// All condition nodes across every config screen
    pub fn condition_nodes(&self) -> impl Iterator<Item = &ConditionSetItem> {
        self.config_screens
            .values()
            .flat_map(|screen| screen.content.condition_sets.iter())
    }
}

fn lookup<'a, T>(
    map: &'a IndexMap<String, Protected<T>>,
    name: &str,
    password: Option<&str>,
) -> Access<&'a T> {
    map.get(name).map_or(Access::NotFound, |item| item.check(password))
}
