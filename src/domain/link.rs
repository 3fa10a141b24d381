use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LinkType {
    #[default]
    Standard,
    Social,
    Product,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "type", default)]
    pub link_type: LinkType,
    /// 同一用户链接内的排序键，允许存在空洞
    pub order: i32,
    pub is_active: bool,
    /// OpenGraph / 社交平台属性（icon_name、og:title 等）
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub click_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Link {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        order: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            title: title.into(),
            url: url.into(),
            link_type: LinkType::Standard,
            order,
            is_active: true,
            metadata: BTreeMap::new(),
            click_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
