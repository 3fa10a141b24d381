use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventType {
    View,
    Click,
    Scroll,
}

/// 追加写入的分析事件，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub id: String,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_id: Option<String>,
    /// 页面/链接的所有者，而不是访问者
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub visitor_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl AnalyticsEvent {
    pub const META_COUNTRY: &'static str = "country";
    pub const META_DEVICE_TYPE: &'static str = "device_type";

    pub fn new(event_type: EventType, visitor_id: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            event_type,
            link_id: None,
            user_id: None,
            visitor_id: visitor_id.into(),
            country: String::new(),
            region: String::new(),
            meta: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// 国家：优先取 country 字段，为空时回退到 meta["country"]
    pub fn country_label(&self) -> Option<&str> {
        if !self.country.is_empty() {
            return Some(self.country.as_str());
        }
        self.meta
            .get(Self::META_COUNTRY)
            .map(String::as_str)
            .filter(|c| !c.is_empty())
    }

    pub fn device_type(&self) -> Option<&str> {
        self.meta.get(Self::META_DEVICE_TYPE).map(String::as_str)
    }
}

/// 按需计算的聚合结果，不落盘
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_views: i64,
    pub total_clicks: i64,
    pub by_country: HashMap<String, i64>,
    pub by_device: HashMap<String, i64>,
}

impl AnalyticsSummary {
    /// 累加单个事件（KV 后端全量扫描时使用）
    pub fn accumulate(&mut self, event: &AnalyticsEvent) {
        match event.event_type {
            EventType::View => self.total_views += 1,
            EventType::Click => self.total_clicks += 1,
            EventType::Scroll => {}
        }

        if let Some(country) = event.country_label() {
            *self.by_country.entry(country.to_string()).or_default() += 1;
        }

        if let Some(device) = event.device_type() {
            *self.by_device.entry(device.to_string()).or_default() += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: EventType, country: &str, meta: &[(&str, &str)]) -> AnalyticsEvent {
        let mut e = AnalyticsEvent::new(event_type, "visitor");
        e.country = country.to_string();
        e.meta = meta
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        e
    }

    #[test]
    fn test_accumulate_counts_by_type() {
        let mut summary = AnalyticsSummary::default();
        summary.accumulate(&event(EventType::View, "", &[]));
        summary.accumulate(&event(EventType::Click, "", &[]));
        summary.accumulate(&event(EventType::Scroll, "", &[]));
        assert_eq!(summary.total_views, 1);
        assert_eq!(summary.total_clicks, 1);
        assert!(summary.by_country.is_empty());
        assert!(summary.by_device.is_empty());
    }

    #[test]
    fn test_country_falls_back_to_meta() {
        let e = event(EventType::View, "", &[("country", "US")]);
        assert_eq!(e.country_label(), Some("US"));

        let e = event(EventType::View, "DE", &[("country", "US")]);
        assert_eq!(e.country_label(), Some("DE"));

        let e = event(EventType::View, "", &[("country", "")]);
        assert_eq!(e.country_label(), None);
    }

    #[test]
    fn test_accumulate_device_from_meta() {
        let mut summary = AnalyticsSummary::default();
        let meta = [("country", "US"), ("device_type", "mobile")];
        summary.accumulate(&event(EventType::View, "", &meta));
        summary.accumulate(&event(EventType::View, "", &meta));
        summary.accumulate(&event(EventType::Click, "", &meta));
        assert_eq!(summary.by_country.get("US"), Some(&3));
        assert_eq!(summary.by_device.get("mobile"), Some(&3));
    }
}
