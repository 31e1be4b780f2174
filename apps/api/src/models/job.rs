use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub experience: Option<String>,
    pub education: Option<String>,
    pub description: String,
    pub requirements: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl JobRow {
    /// Flattens a posting into the labeled-section text fed to the scoring
    /// workflow. Lossy, one-way projection — the only guarantee is that the
    /// same row always produces the same text, since the result participates
    /// in cached prompts.
    pub fn scoring_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Title: {}\n", self.title));
        out.push_str(&format!("Company: {}\n", self.company));
        if let Some(location) = &self.location {
            out.push_str(&format!("Location: {location}\n"));
        }
        if let Some(salary) = &self.salary_range {
            out.push_str(&format!("Salary: {salary}\n"));
        }
        if let Some(experience) = &self.experience {
            out.push_str(&format!("Experience: {experience}\n"));
        }
        if let Some(education) = &self.education {
            out.push_str(&format!("Education: {education}\n"));
        }
        out.push_str(&format!("Description:\n{}\n", self.description));
        if let Some(requirements) = &self.requirements {
            out.push_str(&format!("Requirements:\n{requirements}\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_job() -> JobRow {
        JobRow {
            id: "job-1".to_string(),
            title: "Backend Engineer".to_string(),
            company: "Acme".to_string(),
            location: Some("Remote".to_string()),
            salary_range: None,
            experience: Some("3+ years".to_string()),
            education: None,
            description: "Build services.".to_string(),
            requirements: Some("Rust, Postgres".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_scoring_text_is_stable() {
        let job = make_job();
        assert_eq!(job.scoring_text(), job.scoring_text());
    }

    #[test]
    fn test_scoring_text_labels_present_sections_and_skips_missing() {
        let text = make_job().scoring_text();
        assert!(text.contains("Title: Backend Engineer"));
        assert!(text.contains("Location: Remote"));
        assert!(text.contains("Requirements:\nRust, Postgres"));
        assert!(!text.contains("Salary:"));
        assert!(!text.contains("Education:"));
    }
}
