//! Administration records: users, roles, permissions, dictionaries and
//! data categories

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `0` enabled, `1` disabled, like the backend's status column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecordStatus {
    #[default]
    #[serde(rename = "0")]
    Enabled,
    #[serde(rename = "1")]
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: u64,
    pub user_name: String,
    #[serde(default)]
    pub nick_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phonenumber: Option<String>,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default)]
    pub role_ids: Vec<u64>,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
}

/// Form payload for creating or editing a user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserForm {
    pub user_name: String,
    pub nick_name: Option<String>,
    pub email: Option<String>,
    pub phonenumber: Option<String>,
    #[serde(default)]
    pub status: RecordStatus,
}

impl UserForm {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub role_id: u64,
    pub role_name: String,
    /// Permission string prefix, e.g. `admin`
    pub role_key: String,
    #[serde(default)]
    pub role_sort: u32,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default)]
    pub permission_ids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub permission_id: u64,
    pub name: String,
    /// e.g. `system:user:list`
    pub perms: String,
    #[serde(default)]
    pub parent_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictType {
    pub dict_id: u64,
    pub dict_name: String,
    pub dict_type: String,
    #[serde(default)]
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictData {
    pub dict_code: u64,
    pub dict_type: String,
    pub dict_label: String,
    pub dict_value: String,
    #[serde(default)]
    pub dict_sort: u32,
}

/// Node of the data category tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataCategory {
    pub category_id: u64,
    pub category_name: String,
    #[serde(default)]
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub order_num: u32,
}
