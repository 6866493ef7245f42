use super::registry::{Capability, ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_else(|| ModelRegistry::new(None)),
        }
    }

    /// Resolves the model for `capability`, falling back to the first
    /// registered model that supports it.
    pub fn select(
        &self,
        requested: Option<&str>,
        capability: Capability,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let (fallback_reason, requested_text) = if let Some(requested_value) = requested {
            if let Some(model) = self.registry.ensure(requested_value, capability) {
                return Ok(ModelSelection {
                    model,
                    requested: Some(requested_value.to_string()),
                    fallback_reason: None,
                });
            }
            (
                Some(format!(
                    "Requested model '{requested_value}' unavailable for capability '{}'.",
                    capability.as_str()
                )),
                Some(requested_value.to_string()),
            )
        } else {
            (None, None)
        };

        let candidates = self.registry.by_capability(capability);
        let Some(model) = candidates.first().cloned() else {
            return Err(format!(
                "No models available for capability '{}'.",
                capability.as_str()
            ));
        };
        Ok(ModelSelection {
            model,
            requested: requested_text,
            fallback_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::ModelSelector;
    use crate::models::{Capability, ModelRegistry, ModelSpec};

    fn spec(name: &str, capabilities: &[Capability]) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            capabilities: capabilities.to_vec(),
        }
    }

    #[test]
    fn default_registry_covers_every_capability() {
        let selector = ModelSelector::new(None);
        assert_eq!(
            selector.select(None, Capability::Vision).unwrap().model.name,
            "gemini-2.0-flash"
        );
        assert_eq!(
            selector.select(None, Capability::Chat).unwrap().model.name,
            "gemini-2.0-flash"
        );
        assert_eq!(
            selector.select(None, Capability::Speech).unwrap().model.name,
            "gemini-2.5-flash-preview-tts"
        );
        assert_eq!(
            selector
                .select(None, Capability::Transcription)
                .unwrap()
                .model
                .name,
            "gemini-2.0-flash"
        );
    }

    #[test]
    fn requested_model_accepts_api_path_form() {
        let selection = ModelSelector::new(None)
            .select(Some("models/gemini-2.5-flash"), Capability::Chat)
            .unwrap();
        assert_eq!(selection.model.name, "gemini-2.5-flash");
        assert!(selection.fallback_reason.is_none());
    }

    #[test]
    fn falls_back_when_requested_model_lacks_capability() {
        let selection = ModelSelector::new(None)
            .select(Some("gemini-2.5-flash-preview-tts"), Capability::Chat)
            .unwrap();
        assert_eq!(selection.model.name, "gemini-2.0-flash");
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'gemini-2.5-flash-preview-tts' unavailable for capability 'chat'.")
        );
    }

    #[test]
    fn errors_when_no_model_has_capability() {
        let mut models = IndexMap::new();
        models.insert("text-only".to_string(), spec("text-only", &[Capability::Chat]));
        let err = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(None, Capability::Speech)
            .err()
            .unwrap_or_default();
        assert_eq!(err, "No models available for capability 'speech'.");
    }
}
