use std::{collections::HashSet, path::Path, sync::Arc};

use crate::{
    error::{Error, Result, ValidationError},
    template::{CompiledTemplate, TemplateDefinition},
};

/// Templates in match priority order: the first template that fully matches
/// a line wins.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: Vec<Arc<CompiledTemplate>>,
}

impl TemplateSet {
    /// Compiles every definition. Any invalid definition rejects the whole
    /// set.
    pub fn compile(definitions: &[TemplateDefinition]) -> Result<TemplateSet, ValidationError> {
        let mut seen_ids = HashSet::new();
        let mut templates = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let template = CompiledTemplate::compile(definition)?;
            if !seen_ids.insert(template.id().to_string()) {
                return Err(ValidationError::DuplicateId(template.id().to_string()));
            }
            templates.push(Arc::new(template));
        }
        log::debug!("Compiled {} templates", templates.len());
        Ok(TemplateSet { templates })
    }

    pub fn from_yaml_str(s: &str) -> Result<TemplateSet> {
        let definitions: Vec<TemplateDefinition> =
            serde_yaml::from_str(s).map_err(|source| Error::Settings {
                path: "<string>".into(),
                source,
            })?;
        Ok(TemplateSet::compile(&definitions)?)
    }

    pub fn from_yaml_file(path: &Path) -> Result<TemplateSet> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let definitions: Vec<TemplateDefinition> =
            serde_yaml::from_reader(reader).map_err(|source| Error::Settings {
                path: path.display().to_string(),
                source,
            })?;
        Ok(TemplateSet::compile(&definitions)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CompiledTemplate>> {
        self.templates.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<CompiledTemplate>> {
        self.templates.iter().find(|template| template.id() == id)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
