use super::template::{from_stored_config_type_templates, from_stored_skills_template, InstallPaths};
use crate::orm::{agents, skills};
use askama::Template;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SkillRenderError {
    #[error("frontmatter: {0}")]
    Frontmatter(#[from] serde_yaml::Error),
    #[error("template: {0}")]
    Template(#[from] askama::Error),
}

/// A skill rendered for one agent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkillIntegration {
    pub skill_md: String,
    pub global_path: Option<String>,
    pub project_path: Option<String>,
}

#[derive(Template)]
#[template(path = "skill.md")]
struct SkillMdTemplate<'a> {
    frontmatter: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Frontmatter<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    license: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compatibility: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
    #[serde(rename = "allowed-tools", skip_serializing_if = "Option::is_none")]
    allowed_tools: Option<String>,
}

/// SKILL.md for `skill`: YAML frontmatter followed by the markdown body.
pub fn render_skill_md(skill: &skills::Model) -> Result<String, SkillRenderError> {
    let tools: Vec<&str> = skill
        .allowed_tools
        .as_array()
        .map(|list| list.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let metadata = skill
        .metadata
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) => s.to_owned(),
                        other => other.to_string(),
                    };
                    (k.to_owned(), v)
                })
                .collect()
        })
        .unwrap_or_default();

    let frontmatter = serde_yaml::to_string(&Frontmatter {
        name: &skill.slug,
        description: &skill.description,
        license: skill.license.as_deref().filter(|s| !s.is_empty()),
        compatibility: skill.compatibility.as_deref().filter(|s| !s.is_empty()),
        metadata,
        allowed_tools: if tools.is_empty() {
            None
        } else {
            Some(tools.join(" "))
        },
    })?;

    let mut rendered = SkillMdTemplate {
        frontmatter: &frontmatter,
        content: skill.content.trim_end(),
    }
    .render()?;
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }
    Ok(rendered)
}

/// Where the skill named `slug` is installed for `agent`.
pub fn skill_install_paths(agent: &agents::Model, slug: &str) -> Option<InstallPaths> {
    if !agent.supports_skills {
        return None;
    }
    let paths = from_stored_skills_template(agent.skills_config_template.as_ref())?;
    Some(InstallPaths {
        global_path: paths.global_path.map(|base| join_path(&base, slug)),
        project_path: paths.project_path.map(|base| join_path(&base, slug)),
    })
}

/// Renders `skill` for `agent`, or `None` when the agent does not take skills.
pub fn render_skill(agent: &agents::Model, skill: &skills::Model) -> Option<SkillIntegration> {
    let paths = skill_install_paths(agent, &skill.slug)?;

    let skill_md = match render_skill_md(skill) {
        Ok(md) => md,
        Err(e) => {
            log::warn!("unable to render SKILL.md for {}: {}", skill.slug, e);
            return None;
        }
    };

    Some(SkillIntegration {
        skill_md,
        global_path: paths.global_path,
        project_path: paths.project_path,
    })
}

/// Where a config of the given type is installed for `agent`.
pub fn render_config_paths(agent: &agents::Model, config_type_slug: &str) -> Option<InstallPaths> {
    let mut templates = from_stored_config_type_templates(agent.config_type_templates.as_ref())?;
    templates
        .remove(config_type_slug)
        .filter(|paths| !paths.is_empty())
}

fn join_path(base: &str, slug: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, slug)
    } else {
        format!("{}/{}", base, slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn agent() -> agents::Model {
        agents::Model {
            id: 1,
            name: "Claude Code".to_owned(),
            slug: "claude-code".to_owned(),
            description: None,
            website: None,
            supports_mcp: false,
            supports_skills: true,
            mcp_transport_types: json!([]),
            mcp_config_template: None,
            skills_config_template: Some(json!({
                "global_path": "~/.claude/skills/",
                "project_path": ".claude/skills"
            })),
            config_type_templates: Some(json!({
                "rules": { "global_path": "~/.claude/CLAUDE.md", "project_path": "CLAUDE.md" },
                "hooks": {}
            })),
            sort_order: 0,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    fn skill() -> skills::Model {
        let now = chrono::Utc::now().naive_utc();
        skills::Model {
            id: 1,
            user_id: None,
            name: "PDF Tools".to_owned(),
            slug: "pdf-tools".to_owned(),
            description: "Extract text from PDF files".to_owned(),
            content: "# PDF Tools\n\nUse `pdftotext`.\n\n".to_owned(),
            license: Some("MIT".to_owned()),
            compatibility: None,
            allowed_tools: json!(["Read", "Bash"]),
            metadata: json!({ "version": "1.0", "stars": 3 }),
            vote_score: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_skill_md() {
        let md = render_skill_md(&skill()).unwrap();
        assert!(md.starts_with("---\nname: pdf-tools\n"));
        assert!(md.contains("description: Extract text from PDF files\n"));
        assert!(md.contains("license: MIT\n"));
        assert!(!md.contains("compatibility"));
        assert!(md.contains("allowed-tools: Read Bash\n"));
        assert!(md.contains("---\n\n# PDF Tools\n\nUse `pdftotext`.\n"));
        assert!(md.ends_with("`pdftotext`.\n"));

        // the frontmatter block parses back as YAML
        let yaml = md.trim_start_matches("---\n").split("---\n").next().unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed["metadata"]["version"].as_str(), Some("1.0"));
        assert_eq!(parsed["metadata"]["stars"].as_str(), Some("3"));
    }

    #[test]
    fn test_skill_paths() {
        let rendered = render_skill(&agent(), &skill()).unwrap();
        assert_eq!(rendered.global_path.as_deref(), Some("~/.claude/skills/pdf-tools"));
        assert_eq!(rendered.project_path.as_deref(), Some(".claude/skills/pdf-tools"));
    }

    #[test]
    fn test_skill_needs_support_and_template() {
        let no_support = agents::Model {
            supports_skills: false,
            ..agent()
        };
        assert!(render_skill(&no_support, &skill()).is_none());

        let no_template = agents::Model {
            skills_config_template: None,
            ..agent()
        };
        assert!(render_skill(&no_template, &skill()).is_none());
    }

    #[test]
    fn test_config_paths() {
        let paths = render_config_paths(&agent(), "rules").unwrap();
        assert_eq!(paths.project_path.as_deref(), Some("CLAUDE.md"));
        assert!(render_config_paths(&agent(), "hooks").is_none());
        assert!(render_config_paths(&agent(), "commands").is_none());
    }
}
