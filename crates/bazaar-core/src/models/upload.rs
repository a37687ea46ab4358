use serde::{Deserialize, Serialize};

/// Where uploaded file URLs live inside a form's value graph.
///
/// Either a single scalar field (one URL or null) or an ordered list field with
/// an optional maximum count. The enum makes "both set" unrepresentable; the
/// serialized form (`scalar_field` / `list_field`) is checked on deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UploadTargetSpec", into = "UploadTargetSpec")]
pub enum UploadTarget {
    Scalar {
        field: String,
    },
    List {
        field: String,
        /// `None` means unbounded.
        max_files: Option<usize>,
    },
}

impl UploadTarget {
    pub fn scalar(field: impl Into<String>) -> Self {
        UploadTarget::Scalar {
            field: field.into(),
        }
    }

    pub fn list(field: impl Into<String>, max_files: Option<usize>) -> Self {
        UploadTarget::List {
            field: field.into(),
            max_files,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            UploadTarget::Scalar { field } | UploadTarget::List { field, .. } => field,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, UploadTarget::List { .. })
    }

    /// Maximum number of attachments the target can hold.
    pub fn capacity(&self) -> Option<usize> {
        match self {
            UploadTarget::Scalar { .. } => Some(1),
            UploadTarget::List { max_files, .. } => *max_files,
        }
    }
}

/// Wire shape of [`UploadTarget`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadTargetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_files: Option<usize>,
}

impl TryFrom<UploadTargetSpec> for UploadTarget {
    type Error = String;

    fn try_from(spec: UploadTargetSpec) -> Result<Self, Self::Error> {
        match (spec.scalar_field, spec.list_field) {
            (Some(field), None) => {
                if spec.max_files.is_some() {
                    return Err("max_files only applies to list_field targets".to_string());
                }
                Ok(UploadTarget::Scalar { field })
            }
            (None, Some(field)) => Ok(UploadTarget::List {
                field,
                max_files: spec.max_files,
            }),
            (Some(_), Some(_)) => {
                Err("Upload target must set scalar_field or list_field, not both".to_string())
            }
            (None, None) => Err("Upload target must set scalar_field or list_field".to_string()),
        }
    }
}

impl From<UploadTarget> for UploadTargetSpec {
    fn from(target: UploadTarget) -> Self {
        match target {
            UploadTarget::Scalar { field } => UploadTargetSpec {
                scalar_field: Some(field),
                ..Default::default()
            },
            UploadTarget::List { field, max_files } => UploadTargetSpec {
                list_field: Some(field),
                max_files,
                ..Default::default()
            },
        }
    }
}

/// Advisory accepted-file-type list in the `accept` attribute syntax,
/// e.g. `image/*,.pdf`. Only used to configure a file picker; selections are
/// never rejected on this basis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptFilter {
    patterns: Vec<String>,
}

impl AcceptFilter {
    pub fn parse(accept: &str) -> Self {
        Self {
            patterns: accept
                .split(',')
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether a file would match the picker filter. An empty filter accepts everything.
    pub fn accepts(&self, file_name: &str, content_type: Option<&str>) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let name = file_name.to_lowercase();
        let mime = content_type.map(|c| c.to_lowercase());
        self.patterns.iter().any(|pattern| {
            if pattern.starts_with('.') {
                name.ends_with(pattern.as_str())
            } else if let Some(prefix) = pattern.strip_suffix("/*") {
                mime.as_deref()
                    .and_then(|m| m.split_once('/'))
                    .is_some_and(|(kind, _)| kind == prefix)
            } else {
                mime.as_deref() == Some(pattern.as_str())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_rejects_both_fields() {
        let err = serde_json::from_str::<UploadTarget>(
            r#"{"scalar_field":"cover","list_field":"gallery"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not both"));

        assert!(serde_json::from_str::<UploadTarget>("{}").is_err());
        assert!(serde_json::from_str::<UploadTarget>(
            r#"{"scalar_field":"cover","max_files":2}"#
        )
        .is_err());
    }

    #[test]
    fn test_target_from_wire() {
        let target: UploadTarget =
            serde_json::from_str(r#"{"list_field":"gallery","max_files":3}"#).unwrap();
        assert_eq!(target, UploadTarget::list("gallery", Some(3)));
        assert_eq!(target.capacity(), Some(3));
        assert!(target.is_list());

        let target: UploadTarget = serde_json::from_str(r#"{"scalar_field":"logo"}"#).unwrap();
        assert_eq!(target.field(), "logo");
        assert_eq!(target.capacity(), Some(1));
        assert_eq!(
            serde_json::to_value(&target).unwrap(),
            serde_json::json!({"scalar_field": "logo"})
        );
    }

    #[test]
    fn test_accept_filter() {
        let filter = AcceptFilter::parse("image/*, .PDF");
        assert!(filter.accepts("photo.jpg", Some("image/jpeg")));
        assert!(filter.accepts("Invoice.pdf", None));
        assert!(!filter.accepts("notes.txt", Some("text/plain")));
        assert!(AcceptFilter::default().accepts("anything.bin", None));

        let exact = AcceptFilter::parse("application/json");
        assert!(exact.accepts("data", Some("application/json")));
        assert!(!exact.accepts("data", Some("application/xml")));
    }
}
