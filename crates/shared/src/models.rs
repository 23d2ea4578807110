//! Shared data models for the jobdash application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Notifications ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    JobApplication,
    JobMatch,
    Interview,
    Profile,
    Security,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
}

/// A single notification as delivered by the REST list endpoint and by the
/// push channel (one JSON object per socket message).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub r#type: NotificationType,
    pub priority: NotificationPriority,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-user notification delivery preferences.
///
/// `push_enabled` is the master switch for user-facing system
/// notifications; the per-category flags gate individual types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub push_enabled: bool,
    pub email_enabled: bool,
    pub job_application: bool,
    pub job_match: bool,
    pub interview: bool,
    pub profile: bool,
    pub security: bool,
    pub other: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            push_enabled: true,
            email_enabled: true,
            job_application: true,
            job_match: true,
            interview: true,
            profile: true,
            security: true,
            other: true,
        }
    }
}

impl NotificationSettings {
    /// Whether a system notification may be raised for this category.
    pub fn allows_push(&self, kind: NotificationType) -> bool {
        if !self.push_enabled {
            return false;
        }
        match kind {
            NotificationType::JobApplication => self.job_application,
            NotificationType::JobMatch => self.job_match,
            NotificationType::Interview => self.interview,
            NotificationType::Profile => self.profile,
            NotificationType::Security => self.security,
            NotificationType::Other => self.other,
        }
    }
}

// --- Response envelopes ---

/// Standard single-resource envelope: the mutated/fetched resource lives
/// under `data`, with an optional server-supplied message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiEnvelope<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Collection envelope: an item array plus a total count.
///
/// Servers report the count as either `totalCount` or `total`; when both
/// are absent the collection is treated as empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope<T> {
    pub data: Vec<T>,
    #[serde(default, alias = "total")]
    pub total_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_wire_format() {
        let json = r#"{
            "id": "n1",
            "title": "Interview scheduled",
            "message": "Acme Corp, Thursday 10:00",
            "type": "interview",
            "priority": "high",
            "isRead": false,
            "createdAt": "2026-08-01T09:30:00Z"
        }"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.r#type, NotificationType::Interview);
        assert_eq!(n.priority, NotificationPriority::High);
        assert!(!n.is_read);
    }

    #[test]
    fn page_envelope_accepts_total_alias() {
        let with_total_count: PageEnvelope<u32> =
            serde_json::from_str(r#"{"data": [1, 2], "totalCount": 25}"#).unwrap();
        assert_eq!(with_total_count.total_count, 25);

        let with_total: PageEnvelope<u32> =
            serde_json::from_str(r#"{"data": [1, 2], "total": 25}"#).unwrap();
        assert_eq!(with_total.total_count, 25);

        let with_neither: PageEnvelope<u32> = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert_eq!(with_neither.total_count, 0);
    }

    #[test]
    fn settings_gate_push_per_category() {
        let mut settings = NotificationSettings::default();
        assert!(settings.allows_push(NotificationType::JobMatch));

        settings.job_match = false;
        assert!(!settings.allows_push(NotificationType::JobMatch));
        assert!(settings.allows_push(NotificationType::Security));

        settings.push_enabled = false;
        assert!(!settings.allows_push(NotificationType::Security));
    }
}
