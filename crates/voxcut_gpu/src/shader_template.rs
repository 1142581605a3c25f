//! Generation of WGSL compute shaders from templates.
//!
//! A template is ordinary WGSL source with `{{label}}` placeholders. Kernel
//! registration resolves a template once with a fixed set of label/string
//! replacements (the caller's snippet body, the element types, and so on)
//! and the result is compiled into a [`wgpu::ComputePipeline`] and cached —
//! see `voxcut::kernel`.

use anyhow::{Result, anyhow, bail};
use regex::Regex;
use std::{borrow::Cow, sync::LazyLock};

/// A shader template that can be resolved to generate WGSL source.
#[derive(Clone, Debug)]
pub struct ShaderTemplate<'a> {
    source_code: &'a str,
    labels: Vec<&'a str>,
}

static LABEL_CAPTURE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").unwrap());

impl<'a> ShaderTemplate<'a> {
    /// Creates a new template from the given template source code.
    pub fn new(source_code: &'a str) -> Result<Self> {
        let mut labels = Vec::new();
        for captures in LABEL_CAPTURE_REGEX.captures_iter(source_code) {
            let label = captures.get(1).unwrap().as_str();
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        Ok(Self {
            source_code,
            labels,
        })
    }

    /// Whether the template contains the given label.
    pub fn contains_label(&self, label: &str) -> bool {
        self.labels.contains(&label)
    }

    /// Resolves the template, substituting each `(label, replacement)` pair
    /// for its `{{label}}` placeholder.
    ///
    /// # Errors
    /// Returns an error if a label in the template has no corresponding
    /// replacement, or if a replacement names a label the template does not
    /// contain.
    pub fn resolve(&self, replacements: &[(&str, Cow<'_, str>)]) -> Result<String> {
        for label in &self.labels {
            if !replacements.iter().any(|(l, _)| l == label) {
                bail!("No replacement given for label `{label}` in shader template");
            }
        }
        for (label, _) in replacements {
            if !self.labels.contains(label) {
                bail!("Replacement label `{label}` not present in shader template");
            }
        }

        let mut resolved = String::with_capacity(self.source_code.len());
        let mut cursor = 0;
        for captures in LABEL_CAPTURE_REGEX.captures_iter(self.source_code) {
            let whole = captures.get(0).unwrap();
            let label = captures.get(1).unwrap().as_str();
            resolved.push_str(&self.source_code[cursor..whole.start()]);
            let (_, replacement) = replacements
                .iter()
                .find(|(l, _)| *l == label)
                .ok_or_else(|| anyhow!("No replacement given for label `{label}`"))?;
            resolved.push_str(replacement);
            cursor = whole.end();
        }
        resolved.push_str(&self.source_code[cursor..]);

        Ok(resolved)
    }
}

/// Convenience macro for building the `replacements` slice passed to
/// [`ShaderTemplate::resolve`] from `"label" => value` pairs.
#[macro_export]
macro_rules! shader_template_replacements {
    ($($label:expr => $value:expr),* $(,)?) => {
        &[$(($label, ::std::borrow::Cow::from($value.to_string()))),*]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_find_no_labels_for_template_without_placeholders() {
        let template = ShaderTemplate::new("fn main() {}").unwrap();
        assert!(template.labels.is_empty());
    }

    #[test]
    fn should_find_label_in_template() {
        let template = ShaderTemplate::new("const N: u32 = {{count}}u;").unwrap();
        assert!(template.contains_label("count"));
    }

    #[test]
    fn should_resolve_single_label() {
        let template = ShaderTemplate::new("const N: u32 = {{count}}u;").unwrap();
        let resolved = template
            .resolve(&[("count", Cow::from("4"))])
            .unwrap();
        assert_eq!(resolved, "const N: u32 = 4u;");
    }

    #[test]
    fn should_resolve_repeated_label() {
        let template = ShaderTemplate::new("{{x}} + {{x}}").unwrap();
        let resolved = template.resolve(&[("x", Cow::from("1"))]).unwrap();
        assert_eq!(resolved, "1 + 1");
    }

    #[test]
    fn should_fail_on_missing_replacement() {
        let template = ShaderTemplate::new("{{x}}").unwrap();
        assert!(template.resolve(&[]).is_err());
    }

    #[test]
    fn should_fail_on_unknown_replacement_label() {
        let template = ShaderTemplate::new("no labels here").unwrap();
        assert!(template.resolve(&[("x", Cow::from("1"))]).is_err());
    }

    #[test]
    fn should_resolve_multiple_distinct_labels() {
        let template = ShaderTemplate::new("{{a}}-{{b}}").unwrap();
        let resolved = template
            .resolve(&[("a", Cow::from("1")), ("b", Cow::from("2"))])
            .unwrap();
        assert_eq!(resolved, "1-2");
    }

    #[test]
    fn resolved_template_should_be_valid_wgsl() {
        let template = ShaderTemplate::new(
            "@group(0) @binding(0) var<storage, read> data: array<{{elem_type}}>;",
        )
        .unwrap();
        let resolved = template
            .resolve(&[("elem_type", Cow::from("f32"))])
            .unwrap();
        naga::front::wgsl::parse_str(&resolved).expect("resolved template should parse as WGSL");
    }
}
