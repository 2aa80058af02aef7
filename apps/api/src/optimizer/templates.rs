//! Prompt templates and the placeholder renderer that fills them.

use std::collections::HashMap;

use thiserror::Error;

use crate::optimizer::sections::{SectionKey, SectionMap};

pub const DEFAULT_SECTION_JOB_TITLE: &str = "software engineering";
pub const DEFAULT_RESUME_JOB_TITLE: &str = "Software Engineering";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template references missing key '{0}'")]
    MissingKey(String),

    #[error("malformed placeholder at byte {offset}")]
    Malformed { offset: usize },
}

const CONTACT_TEMPLATE: &str = "Format the following contact information:
{content}

Output format:
Full Name: [name]
Phone: [phone]
Email: [email]
Location: [location]
LinkedIn: [linkedin] (if available)
Portfolio: [portfolio] (if available)";

const EXPERIENCE_TEMPLATE: &str = "Optimize the following work experience for a {job_title} position:
{content}

Output format:
- Company: [company]
- Position: [position]
- Dates: [start_date] - [end_date]
- Responsibilities:
  * [responsibility 1]
  * [responsibility 2]
  * [responsibility 3]";

const EDUCATION_TEMPLATE: &str = "Format the following education information:
{content}

Output format:
- Institution: [institution]
- Degree: [degree]
- Field of Study: [field]
- Dates: [start_date] - [end_date]
- GPA: [gpa] (if available)";

const SKILLS_TEMPLATE: &str = "Extract and format skills from:
{content}

Output format:
- Technical: [skill1], [skill2], [skill3]
- Soft: [skill1], [skill2]";

const PROJECTS_TEMPLATE: &str = "Format the following projects:
{content}

Output format:
- Project: [project name]
  * Description: [1-2 sentence description]
  * Technologies: [tech1], [tech2]
  * Impact: [quantifiable impact]";

const AWARDS_TEMPLATE: &str = "Format the following awards and honors for a {job_title} resume:
{content}

Output format:
- Award: [award name]
  * Issuer: [issuing organization]
  * Date: [date]
  * Details: [one sentence on why it was awarded] (if available)";

pub const RESUME_TEMPLATE: &str = "Create a polished, professional resume for a {job_title} position using the following information:

Contact Information:
{contact}

Professional Experience:
{experience}

Education:
{education}

Skills:
{skills}

Projects:
{projects}

Awards:
{awards}

Format the resume with clear section headings and consistent formatting. Use bullet points for achievements and responsibilities. Keep the language professional and concise.";

/// The prompt template for one section.
pub fn section_template(key: SectionKey) -> &'static str {
    match key {
        SectionKey::Contact => CONTACT_TEMPLATE,
        SectionKey::Experience => EXPERIENCE_TEMPLATE,
        SectionKey::Education => EDUCATION_TEMPLATE,
        SectionKey::Skills => SKILLS_TEMPLATE,
        SectionKey::Projects => PROJECTS_TEMPLATE,
        SectionKey::Awards => AWARDS_TEMPLATE,
    }
}

/// Replaces `{name}` placeholders in one left-to-right pass.
///
/// Substituted values are copied verbatim and never re-scanned. `{{` and `}}` produce
/// literal braces. Unused entries in `vars` are ignored.
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
            offset += pos + 2;
            continue;
        }
        if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
            offset += pos + 2;
            continue;
        }
        if tail.starts_with('}') {
            return Err(TemplateError::Malformed {
                offset: offset + pos,
            });
        }

        let close = tail.find('}').ok_or(TemplateError::Malformed {
            offset: offset + pos,
        })?;
        let name = &tail[1..close];
        if !is_identifier(name) {
            return Err(TemplateError::Malformed {
                offset: offset + pos,
            });
        }

        let value = vars
            .get(name)
            .ok_or_else(|| TemplateError::MissingKey(name.to_string()))?;
        out.push_str(value);

        rest = &tail[close + 1..];
        offset += pos + close + 1;
    }

    out.push_str(rest);
    Ok(out)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Builds the rewrite prompt for a single section.
pub fn section_prompt(
    key: SectionKey,
    content: &str,
    job_title: Option<&str>,
) -> Result<String, TemplateError> {
    let job_title = job_title.unwrap_or(DEFAULT_SECTION_JOB_TITLE);
    let vars = HashMap::from([("content", content), ("job_title", job_title)]);
    render(section_template(key), &vars)
}

/// Builds the whole-resume prompt. Absent sections render as empty text.
pub fn resume_prompt(sections: &SectionMap, job_title: Option<&str>) -> Result<String, TemplateError> {
    let mut vars: HashMap<&str, &str> = SectionKey::ALL
        .iter()
        .map(|key| (key.as_str(), sections.get(*key).unwrap_or("")))
        .collect();
    vars.insert("job_title", job_title.unwrap_or(DEFAULT_RESUME_JOB_TITLE));
    render(RESUME_TEMPLATE, &vars)
}
