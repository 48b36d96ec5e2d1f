use serde::Deserialize;

/// Listing filters; see `ResourceQuery` for why `page` is a string.
#[derive(Debug, Default, Deserialize)]
pub struct JobQuery {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    pub location: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    pub salary: Option<String>,
}

/// Partial update: absent fields keep their stored values.
#[derive(Debug, Deserialize)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    pub salary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_field_uses_wire_name() {
        let req: CreateJobRequest =
            serde_json::from_str(r#"{"title": "Math teacher", "type": "Full-time"}"#).unwrap();
        assert_eq!(req.title.as_deref(), Some("Math teacher"));
        assert_eq!(req.job_type.as_deref(), Some("Full-time"));
        assert!(req.salary.is_none());
    }

    #[test]
    fn partial_update_leaves_absent_fields_none() {
        let req: UpdateJobRequest =
            serde_json::from_str(r#"{"title": "Senior teacher", "salary": "60k"}"#).unwrap();
        assert_eq!(req.title.as_deref(), Some("Senior teacher"));
        assert_eq!(req.salary.as_deref(), Some("60k"));
        assert!(req.description.is_none());
        assert!(req.location.is_none());
        assert!(req.job_type.is_none());
    }
}
