//! Target SII environment

use serde::{Deserialize, Serialize};

use crate::constants::{CERTIFICATION_BASE_URL, PRODUCTION_BASE_URL};

/// Logical SII environment a request is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// `palena.sii.cl`
    #[default]
    Production,
    /// `maullin.sii.cl`
    Certification,
}

crate::impl_domain_status_conversions!(Environment {
    Production => "production",
    Certification => "certification",
});

impl Environment {
    /// Public base URL of the authority for this environment.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_BASE_URL,
            Self::Certification => CERTIFICATION_BASE_URL,
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}
