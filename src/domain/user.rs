use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 页面 SEO 元信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SeoMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_url: String,
}

/// 个人主页主题设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Theme {
    pub layout_style: String,
    pub background_style: String,
    pub background_value: String,
    pub background_pattern: String,
    pub background_animation: String,
    pub primary_color: String,
    pub title_font_style: String,
    pub button_style: String,
    pub button_animation_type: String,
    pub fade_in_animation_enabled: bool,
    pub logo_animation_enabled: bool,
    /// "system" | "light" | "dark"
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    /// URL 路径安全的唯一标识
    pub handle: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub seo_meta: SeoMeta,
    #[serde(default)]
    pub theme: Theme,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: impl Into<String>, email: impl Into<String>, handle: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            email: email.into(),
            handle: handle.into(),
            title: String::new(),
            description: String::new(),
            avatar_url: String::new(),
            seo_meta: SeoMeta::default(),
            theme: Theme::default(),
            created_at: now,
            updated_at: now,
        }
    }
}
