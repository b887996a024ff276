use serde::Deserialize;

use calltally_core::config::MeasureConfig;
use calltally_core::error::{CallTallyError, Result};
use calltally_core::uri::UriTemplater;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallTallyConfig {
    pub version: u32,

    #[serde(default)]
    pub measure: MeasureConfig,

    #[serde(default)]
    pub templater: UriTemplater,

    #[serde(default)]
    pub filter: FilterSection,

    #[serde(default)]
    pub interceptor: InterceptorSection,
}

impl Default for CallTallyConfig {
    fn default() -> Self {
        Self {
            version: 1,
            measure: MeasureConfig::default(),
            templater: UriTemplater::default(),
            filter: FilterSection::default(),
            interceptor: InterceptorSection::default(),
        }
    }
}

impl CallTallyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(CallTallyError::UnsupportedVersion);
        }
        self.measure.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSection {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterceptorSection {
    #[serde(default = "default_interceptor_enabled")]
    pub enabled: bool,
}

impl Default for InterceptorSection {
    fn default() -> Self {
        Self { enabled: default_interceptor_enabled() }
    }
}

fn default_interceptor_enabled() -> bool {
    true
}
