use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::AppError;
use crate::models::DailySummary;
use crate::traits::Renderer;

/// Template file looked up inside the templates directory.
pub const DAILY_UPDATE_TEMPLATE: &str = "daily_update.txt";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^{}\s]+)\s*\}\}").expect("valid placeholder regex")
});

/// Fills `{{ field }}` placeholders once per summary.
///
/// Fields: `country`, `country_id`, `date`, `time`, `date_time`, and the six
/// counters (`confirmed`, `confirmed_cumulative`, ...). Rendered summaries are
/// separated by a blank line.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    template: String,
}

impl TemplateRenderer {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Load [`DAILY_UPDATE_TEMPLATE`] from a templates directory.
    pub fn from_dir(dir: &Path) -> Result<Self, AppError> {
        let path = dir.join(DAILY_UPDATE_TEMPLATE);
        let template = std::fs::read_to_string(&path)
            .map_err(|e| AppError::RenderError(format!("{}: {e}", path.display())))?;
        Ok(Self::new(template))
    }

    fn render_one(&self, summary: &DailySummary) -> Result<String, AppError> {
        let mut unknown = None;
        let text = PLACEHOLDER.replace_all(&self.template, |caps: &Captures<'_>| {
            let name = &caps[1];
            field(summary, name).unwrap_or_else(|| {
                unknown.get_or_insert_with(|| name.to_string());
                String::new()
            })
        });
        match unknown {
            Some(name) => Err(AppError::RenderError(format!(
                "unknown placeholder '{{{{ {name} }}}}'"
            ))),
            None => Ok(text.trim_end().to_string()),
        }
    }
}

fn field(s: &DailySummary, name: &str) -> Option<String> {
    let value = match name {
        "country" => s.country.to_string(),
        "country_id" => s.country_id.code().to_string(),
        "date" => s.date_time.format("%Y-%m-%d").to_string(),
        "time" => s.date_time.format("%H:%M").to_string(),
        "date_time" => s.date_time.format("%Y-%m-%d %H:%M UTC").to_string(),
        "confirmed" => s.confirmed.to_string(),
        "recovered" => s.recovered.to_string(),
        "deceased" => s.deceased.to_string(),
        "confirmed_cumulative" => s.confirmed_cumulative.to_string(),
        "recovered_cumulative" => s.recovered_cumulative.to_string(),
        "deceased_cumulative" => s.deceased_cumulative.to_string(),
        _ => return None,
    };
    Some(value)
}

impl Renderer for TemplateRenderer {
    fn render(&self, summaries: &[DailySummary]) -> Result<String, AppError> {
        let parts = summaries
            .iter()
            .map(|s| self.render_one(s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts.join("\n\n"))
    }
}
