//! Microsoft Graph driveItem resources

use serde::Deserialize;

/// A driveItem as returned by `children`, `items/{id}` and `search`
///
/// See: https://learn.microsoft.com/graph/api/resources/driveitem
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub last_modified_date_time: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
    /// Present only on files; folders carry a `folder` facet instead
    #[serde(default)]
    pub file: Option<FileFacet>,
    #[serde(default)]
    pub parent_reference: Option<ItemReference>,
    /// Short-lived pre-authenticated URL
    #[serde(default, rename = "@microsoft.graph.downloadUrl")]
    pub download_url: Option<String>,
}

impl DriveItem {
    pub fn is_file(&self) -> bool {
        self.file.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFacet {
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReference {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// One page of a driveItem collection
#[derive(Debug, Deserialize)]
pub struct DriveItemPage {
    #[serde(default)]
    pub value: Vec<DriveItem>,
    /// Full URL of the next page
    #[serde(default, rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_has_no_file_facet() {
        let page: DriveItemPage = serde_json::from_str(
            r#"{
                "value": [
                    {"id": "1", "name": "Videos", "folder": {"childCount": 3}},
                    {"id": "2", "name": "a.mp4", "size": 10, "file": {"mimeType": "video/mp4"},
                     "@microsoft.graph.downloadUrl": "https://dl/2"}
                ],
                "@odata.nextLink": "https://graph.microsoft.com/v1.0/next"
            }"#,
        )
        .unwrap();

        assert!(!page.value[0].is_file());
        assert!(page.value[1].is_file());
        assert_eq!(page.value[1].download_url.as_deref(), Some("https://dl/2"));
        assert_eq!(
            page.next_link.as_deref(),
            Some("https://graph.microsoft.com/v1.0/next")
        );
    }
}
