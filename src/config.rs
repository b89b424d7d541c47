use std::collections::HashSet;

use crate::{
    context::{ReductionContext, ReductionOptions},
    core::LayoutElement,
    error::{VfxError, VfxResult},
};

/// Policy and event layout for one compilation, loadable from JSON.
///
/// ```json
/// { "options": "CONSTANT_FOLDING | PATCH_READ_TO_EVENT_ATTRIBUTE",
///   "event_attributes": [ { "name": "position", "offset": 4 } ] }
/// ```
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReductionConfig {
    #[serde(default = "ReductionOptions::empty")]
    pub options: ReductionOptions,
    #[serde(default)]
    pub event_attributes: Option<Vec<LayoutElement>>,
}

impl ReductionConfig {
    pub fn for_target(target: CompileTarget) -> Self {
        Self {
            options: target.options(),
            event_attributes: None,
        }
    }

    pub fn validate(&self) -> VfxResult<()> {
        self.options.validate()?;
        if let Some(layout) = &self.event_attributes {
            let mut names = HashSet::new();
            for element in layout {
                if element.name.trim().is_empty() {
                    return Err(VfxError::validation(
                        "event attribute name must be non-empty",
                    ));
                }
                if !names.insert(element.name.as_str()) {
                    return Err(VfxError::validation(format!(
                        "duplicate event attribute '{}'",
                        element.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn into_context(self) -> VfxResult<ReductionContext> {
        self.validate()?;
        ReductionContext::new(self.options, self.event_attributes)
    }
}

/// Option presets for the usual compilation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum CompileTarget {
    /// Host-side update: everything host-evaluable folds.
    Cpu,
    /// Device kernels: foldable constants fold, resources are patched for sampling.
    Gpu,
    /// Spawn-time kernels: host evaluation plus reads redirected to the spawn event.
    Spawner,
}

impl CompileTarget {
    pub fn options(self) -> ReductionOptions {
        match self {
            Self::Cpu => ReductionOptions::CONSTANT_FOLDING | ReductionOptions::CPU_EVALUATION,
            Self::Gpu => {
                ReductionOptions::CONSTANT_FOLDING | ReductionOptions::GPU_DATA_TRANSFORMATION
            }
            Self::Spawner => {
                ReductionOptions::CONSTANT_FOLDING
                    | ReductionOptions::CPU_EVALUATION
                    | ReductionOptions::PATCH_READ_TO_EVENT_ATTRIBUTE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_options_as_flag_text() {
        let cfg: ReductionConfig = serde_json::from_str(
            r#"{ "options": "CONSTANT_FOLDING | PATCH_READ_TO_EVENT_ATTRIBUTE",
                 "event_attributes": [ { "name": "position", "offset": 4 } ] }"#,
        )
        .unwrap();
        assert_eq!(
            cfg.options,
            ReductionOptions::CONSTANT_FOLDING | ReductionOptions::PATCH_READ_TO_EVENT_ATTRIBUTE
        );
        let ctx = cfg.into_context().unwrap();
        assert_eq!(ctx.event_attributes().unwrap()[0].offset, 4);
    }

    #[test]
    fn missing_fields_default_to_no_policy() {
        let cfg: ReductionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, ReductionConfig::default());
        assert!(cfg.options.is_empty());
    }

    #[test]
    fn exclusive_options_are_rejected() {
        let cfg: ReductionConfig = serde_json::from_str(
            r#"{ "options": "CPU_EVALUATION | GPU_DATA_TRANSFORMATION" }"#,
        )
        .unwrap();
        assert!(matches!(cfg.validate(), Err(VfxError::InvalidOptions(_))));
    }

    #[test]
    fn duplicate_event_attributes_are_rejected() {
        let cfg: ReductionConfig = serde_json::from_str(
            r#"{ "event_attributes": [ { "name": "age", "offset": 0 }, { "name": "age", "offset": 1 } ] }"#,
        )
        .unwrap();
        assert!(matches!(cfg.validate(), Err(VfxError::Validation(_))));
    }

    #[test]
    fn every_preset_is_a_valid_policy() {
        for target in [CompileTarget::Cpu, CompileTarget::Gpu, CompileTarget::Spawner] {
            assert!(ReductionConfig::for_target(target).into_context().is_ok());
        }
    }
}
