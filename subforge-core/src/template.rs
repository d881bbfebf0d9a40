//! `${name}` placeholder rendering for subtitle file names and prompts.
//!
//! Only a fixed set of placeholder names is recognized. Anything else is an
//! error rather than being evaluated or passed through.

use crate::config::SrtSaveOption;

/// Placeholder names a template may reference.
pub const PLACEHOLDERS: &[&str] = &[
    "fileName",
    "sourceLanguage",
    "targetLanguage",
    "content",
    "model",
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown placeholder '${{{0}}}'")]
    UnknownPlaceholder(String),

    #[error("No value for placeholder '${{{0}}}'")]
    MissingValue(String),

    #[error("Unterminated placeholder at byte {0}")]
    Unterminated(usize),
}

/// Renders `template`, replacing each `${name}` with its value from `values`.
///
/// # Example
///
/// ```
/// use subforge_core::template::render_template;
///
/// let name = render_template(
///     "${fileName}.${targetLanguage}",
///     &[("fileName", "talk"), ("targetLanguage", "zh")],
/// )
/// .unwrap();
/// assert_eq!(name, "talk.zh");
/// ```
pub fn render_template(template: &str, values: &[(&str, &str)]) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or(TemplateError::Unterminated(offset + start))?;
        let name = after[..end].trim();

        if !PLACEHOLDERS.contains(&name) {
            return Err(TemplateError::UnknownPlaceholder(name.to_string()));
        }
        let value = values
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
            .ok_or_else(|| TemplateError::MissingValue(name.to_string()))?;
        out.push_str(value);

        let consumed = start + 2 + end + 1;
        offset += consumed;
        rest = &rest[consumed..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Subtitle file name (without extension) for a save option.
///
/// `values` feeds the custom template; `language` is the subtitle's own
/// language.
pub fn srt_file_name(
    option: SrtSaveOption,
    file_name: &str,
    language: &str,
    custom_template: &str,
    values: &[(&str, &str)],
) -> Result<String, TemplateError> {
    match option {
        SrtSaveOption::NoSave => Ok(format!("{file_name}_temp")),
        SrtSaveOption::FileName => Ok(file_name.to_string()),
        SrtSaveOption::FileNameWithLang => Ok(format!("{file_name}.{language}")),
        SrtSaveOption::Custom => render_template(custom_template, values),
    }
}
