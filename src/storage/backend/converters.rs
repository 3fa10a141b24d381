use std::collections::BTreeMap;
use std::str::FromStr;

use sea_orm::ActiveValue::Set;

use crate::domain::{AnalyticsEvent, EventType, Link, LinkType, SeoMeta, Theme, User};
use crate::errors::{DriplnkError, Result};
use migration::entities::{analytics_event, link, user};

/// 嵌套值对象 -> JSON 文本列
fn to_json_column<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// JSON 文本列 -> 嵌套值对象；空字符串视为默认值
fn from_json_column<T>(raw: &str, column: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(raw)
        .map_err(|e| DriplnkError::serialization(format!("无法解析列 {}: {}", column, e)))
}

// ============ User ============

pub fn model_to_user(model: user::Model) -> Result<User> {
    Ok(User {
        seo_meta: from_json_column::<SeoMeta>(&model.seo_meta, "users.seo_meta")?,
        theme: from_json_column::<Theme>(&model.theme, "users.theme")?,
        id: model.id,
        email: model.email,
        handle: model.handle,
        title: model.title,
        description: model.description,
        avatar_url: model.avatar_url,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

pub fn user_to_active_model(user: &User) -> Result<user::ActiveModel> {
    Ok(user::ActiveModel {
        id: Set(user.id.clone()),
        email: Set(user.email.clone()),
        handle: Set(user.handle.clone()),
        title: Set(user.title.clone()),
        description: Set(user.description.clone()),
        avatar_url: Set(user.avatar_url.clone()),
        seo_meta: Set(to_json_column(&user.seo_meta)?),
        theme: Set(to_json_column(&user.theme)?),
        created_at: Set(user.created_at),
        updated_at: Set(user.updated_at),
    })
}

// ============ Link ============

pub fn model_to_link(model: link::Model) -> Result<Link> {
    let link_type = LinkType::from_str(&model.link_type).map_err(|_| {
        DriplnkError::serialization(format!(
            "未知的链接类型 '{}' (link={})",
            model.link_type, model.id
        ))
    })?;

    let click_count = u64::try_from(model.click_count).map_err(|_| {
        DriplnkError::serialization(format!(
            "点击数为负 {} (link={})",
            model.click_count, model.id
        ))
    })?;

    Ok(Link {
        metadata: from_json_column::<BTreeMap<String, String>>(&model.metadata, "links.metadata")?,
        id: model.id,
        user_id: model.user_id,
        title: model.title,
        url: model.url,
        link_type,
        order: model.link_order,
        is_active: model.is_active,
        click_count,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

pub fn link_to_active_model(link: &Link) -> Result<link::ActiveModel> {
    let click_count = i64::try_from(link.click_count).map_err(|_| {
        DriplnkError::validation(format!(
            "点击数超出 BIGINT 范围: {} (link={})",
            link.click_count, link.id
        ))
    })?;

    Ok(link::ActiveModel {
        id: Set(link.id.clone()),
        user_id: Set(link.user_id.clone()),
        title: Set(link.title.clone()),
        url: Set(link.url.clone()),
        link_type: Set(link.link_type.to_string()),
        link_order: Set(link.order),
        is_active: Set(link.is_active),
        metadata: Set(to_json_column(&link.metadata)?),
        click_count: Set(click_count),
        created_at: Set(link.created_at),
        updated_at: Set(link.updated_at),
    })
}

// ============ AnalyticsEvent ============

pub fn model_to_event(model: analytics_event::Model) -> Result<AnalyticsEvent> {
    let event_type = EventType::from_str(&model.event_type).map_err(|_| {
        DriplnkError::serialization(format!(
            "未知的事件类型 '{}' (event={})",
            model.event_type, model.id
        ))
    })?;

    Ok(AnalyticsEvent {
        meta: from_json_column::<BTreeMap<String, String>>(&model.meta, "analytics_events.meta")?,
        id: model.id,
        event_type,
        link_id: model.link_id,
        user_id: model.user_id,
        visitor_id: model.visitor_id,
        country: model.country,
        region: model.region,
        created_at: model.created_at,
    })
}

pub fn event_to_active_model(event: &AnalyticsEvent) -> Result<analytics_event::ActiveModel> {
    Ok(analytics_event::ActiveModel {
        id: Set(event.id.clone()),
        event_type: Set(event.event_type.to_string()),
        link_id: Set(event.link_id.clone()),
        user_id: Set(event.user_id.clone()),
        visitor_id: Set(event.visitor_id.clone()),
        country: Set(event.country.clone()),
        region: Set(event.region.clone()),
        meta: Set(to_json_column(&event.meta)?),
        created_at: Set(event.created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::ActiveValue;

    fn create_test_user_model() -> user::Model {
        user::Model {
            id: "u1".to_string(),
            email: "a@x.com".to_string(),
            handle: "alice".to_string(),
            title: "Alice".to_string(),
            description: String::new(),
            avatar_url: String::new(),
            seo_meta: r#"{"title":"Alice's links"}"#.to_string(),
            theme: r#"{"mode":"dark","fade_in_animation_enabled":true}"#.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_model_to_user_parses_json_columns() {
        let user = model_to_user(create_test_user_model()).unwrap();
        assert_eq!(user.seo_meta.title, "Alice's links");
        assert_eq!(user.theme.mode, "dark");
        assert!(user.theme.fade_in_animation_enabled);
        assert!(!user.theme.logo_animation_enabled);
    }

    #[test]
    fn test_empty_json_column_is_default() {
        let mut model = create_test_user_model();
        model.seo_meta = String::new();
        let user = model_to_user(model).unwrap();
        assert_eq!(user.seo_meta, SeoMeta::default());
    }

    #[test]
    fn test_corrupt_json_column_is_error() {
        let mut model = create_test_user_model();
        model.theme = "{not json".to_string();
        let err = model_to_user(model).unwrap_err();
        assert!(matches!(err, DriplnkError::Serialization(_)));
    }

    #[test]
    fn test_link_active_model_sets_every_column() {
        let mut link = Link::new("l1", "u1", "Shop", "https://shop.example", 4);
        link.link_type = LinkType::Product;
        link.metadata.insert("og:title".into(), "Shop".into());
        link.click_count = 9;

        let am = link_to_active_model(&link).unwrap();
        assert_eq!(am.link_type, ActiveValue::Set("product".to_string()));
        assert_eq!(am.link_order, ActiveValue::Set(4));
        assert_eq!(am.click_count, ActiveValue::Set(9));
        assert_eq!(
            am.metadata,
            ActiveValue::Set(r#"{"og:title":"Shop"}"#.to_string())
        );
    }

    #[test]
    fn test_click_count_out_of_range_is_validation_error() {
        let mut link = Link::new("l1", "u1", "Shop", "https://shop.example", 0);
        link.click_count = u64::MAX;
        let err = link_to_active_model(&link).unwrap_err();
        assert!(matches!(err, DriplnkError::Validation(_)), "{:?}", err);

        link.click_count = i64::MAX as u64;
        assert_eq!(
            link_to_active_model(&link).unwrap().click_count,
            ActiveValue::Set(i64::MAX)
        );
    }

    #[test]
    fn test_negative_stored_click_count_is_error() {
        let model = link::Model {
            id: "l1".into(),
            user_id: "u1".into(),
            title: "t".into(),
            url: "https://x".into(),
            link_type: "standard".into(),
            link_order: 0,
            is_active: true,
            metadata: "{}".into(),
            click_count: -3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(
            model_to_link(model).unwrap_err(),
            DriplnkError::Serialization(_)
        ));
    }

    #[test]
    fn test_unknown_link_type_is_error() {
        let model = link::Model {
            id: "l1".into(),
            user_id: "u1".into(),
            title: "t".into(),
            url: "https://x".into(),
            link_type: "video".into(),
            link_order: 0,
            is_active: true,
            metadata: "{}".into(),
            click_count: -3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(model_to_link(model).is_err());
    }

    #[test]
    fn test_event_round_trip_through_model() {
        let mut event = AnalyticsEvent::new(EventType::Click, "v1");
        event.id = "e1".into();
        event.link_id = Some("l1".into());
        event.meta.insert("device_type".into(), "mobile".into());

        let am = event_to_active_model(&event).unwrap();
        let model = analytics_event::Model {
            id: am.id.unwrap(),
            event_type: am.event_type.unwrap(),
            link_id: am.link_id.unwrap(),
            user_id: am.user_id.unwrap(),
            visitor_id: am.visitor_id.unwrap(),
            country: am.country.unwrap(),
            region: am.region.unwrap(),
            meta: am.meta.unwrap(),
            created_at: am.created_at.unwrap(),
        };
        assert_eq!(model_to_event(model).unwrap(), event);
    }
}
