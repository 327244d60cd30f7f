use chrono::NaiveDate;
use serde_json::{Value, json};

use crate::{
    config::MetadataTemplates,
    format::{fill_template, truncate_chars},
    types::{ScriptContent, UploadMetadata},
};

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;

impl UploadMetadata {
    /// Fill `{date}`, `{topic}` and `{title}` in the configured templates.
    pub fn from_templates(
        templates: &MetadataTemplates,
        content: &ScriptContent,
        date: NaiveDate,
    ) -> Self {
        let date = date.format("%Y-%m-%d").to_string();
        let values = [
            ("date", date.as_str()),
            ("topic", content.topic()),
            ("title", content.title()),
        ];

        let mut title = fill_template(&templates.title, &values).trim().to_string();
        if title.is_empty() {
            title = content.title().to_string();
        }

        Self {
            title: truncate_chars(&title, MAX_TITLE_CHARS),
            description: truncate_chars(
                &fill_template(&templates.description, &values),
                MAX_DESCRIPTION_CHARS,
            ),
            tags: crate::config::split_tags(&templates.tags.join(",")),
            category_id: templates.category_id.clone(),
            privacy_status: templates.privacy_status,
            made_for_kids: templates.made_for_kids,
        }
    }

    /// JSON body for the `videos.insert` call.
    pub fn request_body(&self) -> Value {
        json!({
            "snippet": {
                "title": self.title,
                "description": self.description,
                "tags": self.tags,
                "categoryId": self.category_id,
            },
            "status": {
                "privacyStatus": self.privacy_status.as_str(),
                "selfDeclaredMadeForKids": self.made_for_kids,
            }
        })
    }
}
