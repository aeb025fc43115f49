//! Endpoint resolution
//!
//! Production endpoints always follow the published rule. Certification
//! endpoints come from the override table first (bundled entries merged with
//! configured ones) and fall back to the published rule on the
//! certification host.

use std::collections::BTreeMap;

use siilink_domain::constants::{
    SERVICE_DOCUMENT_SIGNATURE_STATUS, SERVICE_DOCUMENT_STATUS, SERVICE_SEED,
    SERVICE_STATUS_EMAIL, SERVICE_SUBMISSION_STATUS, SERVICE_TOKEN, UPLOAD_PATH,
};
use siilink_domain::{EndpointConfig, Environment, Result, SiiError};
use url::Url;

/// Services published under `/DTEWS/services/{service}` instead of
/// `/DTEWS/{service}.jws`.
const SERVICES_PATH_STYLE: [&str; 2] = [SERVICE_DOCUMENT_SIGNATURE_STATUS, SERVICE_STATUS_EMAIL];

/// Certification endpoints shipped with the crate, as paths on the
/// certification host.
const BUNDLED_CERTIFICATION_OVERRIDES: [(&str, &str); 6] = [
    (SERVICE_SEED, "/DTEWS/CrSeed.jws"),
    (SERVICE_TOKEN, "/DTEWS/GetTokenFromSeed.jws"),
    (SERVICE_SUBMISSION_STATUS, "/DTEWS/QueryEstUp.jws"),
    (SERVICE_DOCUMENT_STATUS, "/DTEWS/QueryEstDte.jws"),
    (SERVICE_DOCUMENT_SIGNATURE_STATUS, "/DTEWS/services/QueryEstDteAv"),
    (SERVICE_STATUS_EMAIL, "/DTEWS/services/wsDTECorreo"),
];

/// Where a resolved endpoint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointOrigin {
    LocalOverride,
    Published,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub service: String,
    pub url: String,
    pub origin: EndpointOrigin,
}

#[derive(Debug, Clone)]
enum Override {
    Path(String),
    Absolute(String),
}

/// Maps (environment, service) to an endpoint.
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    production_base: String,
    certification_base: String,
    overrides: BTreeMap<String, Override>,
}

impl EndpointResolver {
    pub fn new(config: &EndpointConfig) -> Self {
        let mut overrides: BTreeMap<String, Override> = BUNDLED_CERTIFICATION_OVERRIDES
            .iter()
            .map(|(service, path)| (service.to_string(), Override::Path(path.to_string())))
            .collect();
        overrides.extend(
            config
                .certification_overrides
                .iter()
                .map(|(service, url)| (service.clone(), Override::Absolute(url.clone()))),
        );

        Self {
            production_base: trim_base(&config.production_base),
            certification_base: trim_base(&config.certification_base),
            overrides,
        }
    }

    /// Resolve the SOAP endpoint of `service`.
    ///
    /// # Errors
    /// `SiiError::Config` when the service name is empty or not a valid path
    /// segment, or when the resulting URL does not parse.
    pub fn resolve(&self, environment: Environment, service: &str) -> Result<ResolvedEndpoint> {
        validate_service_name(service)?;

        let (url, origin) = match environment {
            Environment::Production => {
                (published_url(&self.production_base, service), EndpointOrigin::Published)
            }
            Environment::Certification => match self.overrides.get(service) {
                Some(Override::Path(path)) => {
                    (format!("{}{}", self.certification_base, path), EndpointOrigin::LocalOverride)
                }
                Some(Override::Absolute(url)) => (url.clone(), EndpointOrigin::LocalOverride),
                None => {
                    (published_url(&self.certification_base, service), EndpointOrigin::Published)
                }
            },
        };

        Ok(ResolvedEndpoint { service: service.to_string(), url: checked_url(url)?, origin })
    }

    /// Multipart upload endpoint for `environment`.
    pub fn upload_url(&self, environment: Environment) -> Result<String> {
        checked_url(format!("{}{}", self.base(environment), UPLOAD_PATH))
    }

    fn base(&self, environment: Environment) -> &str {
        match environment {
            Environment::Production => &self.production_base,
            Environment::Certification => &self.certification_base,
        }
    }
}

impl Default for EndpointResolver {
    fn default() -> Self {
        Self::new(&EndpointConfig::default())
    }
}

/// Reject names that cannot be used as a service path segment.
pub fn validate_service_name(service: &str) -> Result<()> {
    if service.is_empty() {
        return Err(SiiError::Config("service name is empty".into()));
    }
    if !service.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.') {
        return Err(SiiError::Config(format!("invalid service name '{service}'")));
    }
    Ok(())
}

fn published_url(base: &str, service: &str) -> String {
    if SERVICES_PATH_STYLE.contains(&service) {
        format!("{base}/DTEWS/services/{service}")
    } else {
        format!("{base}/DTEWS/{service}.jws")
    }
}

fn trim_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

fn checked_url(raw: String) -> Result<String> {
    Url::parse(&raw).map_err(|e| SiiError::Config(format!("invalid endpoint URL '{raw}': {e}")))?;
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_uses_published_rule() {
        let resolver = EndpointResolver::default();
        let endpoint = resolver.resolve(Environment::Production, "CrSeed").unwrap();
        assert_eq!(endpoint.url, "https://palena.sii.cl/DTEWS/CrSeed.jws");
        assert_eq!(endpoint.origin, EndpointOrigin::Published);
    }

    #[test]
    fn services_path_style_in_production() {
        let resolver = EndpointResolver::default();
        let av = resolver.resolve(Environment::Production, "QueryEstDteAv").unwrap();
        let mail = resolver.resolve(Environment::Production, "wsDTECorreo").unwrap();
        assert_eq!(av.url, "https://palena.sii.cl/DTEWS/services/QueryEstDteAv");
        assert_eq!(mail.url, "https://palena.sii.cl/DTEWS/services/wsDTECorreo");
    }

    #[test]
    fn certification_prefers_bundled_override() {
        let resolver = EndpointResolver::default();
        let endpoint = resolver.resolve(Environment::Certification, "GetTokenFromSeed").unwrap();
        assert_eq!(endpoint.url, "https://maullin.sii.cl/DTEWS/GetTokenFromSeed.jws");
        assert_eq!(endpoint.origin, EndpointOrigin::LocalOverride);
    }

    #[test]
    fn certification_falls_back_to_published_rule() {
        let resolver = EndpointResolver::default();
        let endpoint = resolver.resolve(Environment::Certification, "QueryEstDteRecibidos").unwrap();
        assert_eq!(endpoint.url, "https://maullin.sii.cl/DTEWS/QueryEstDteRecibidos.jws");
        assert_eq!(endpoint.origin, EndpointOrigin::Published);
    }

    #[test]
    fn configured_override_wins_over_bundled() {
        let mut config = EndpointConfig::default();
        config
            .certification_overrides
            .insert("CrSeed".into(), "http://localhost:9000/seed".into());
        let resolver = EndpointResolver::new(&config);

        let endpoint = resolver.resolve(Environment::Certification, "CrSeed").unwrap();
        assert_eq!(endpoint.url, "http://localhost:9000/seed");
        assert_eq!(endpoint.origin, EndpointOrigin::LocalOverride);

        let production = resolver.resolve(Environment::Production, "CrSeed").unwrap();
        assert_eq!(production.origin, EndpointOrigin::Published);
    }

    #[test]
    fn bundled_overrides_follow_configured_base() {
        let config = EndpointConfig {
            certification_base: "http://127.0.0.1:8080/".into(),
            ..EndpointConfig::default()
        };
        let resolver = EndpointResolver::new(&config);
        let endpoint = resolver.resolve(Environment::Certification, "CrSeed").unwrap();
        assert_eq!(endpoint.url, "http://127.0.0.1:8080/DTEWS/CrSeed.jws");
    }

    #[test]
    fn invalid_service_names_are_config_errors() {
        let resolver = EndpointResolver::default();
        for name in ["", "Cr Seed", "../etc", "svc?x=1"] {
            let err = resolver.resolve(Environment::Production, name).unwrap_err();
            assert_eq!(err.label(), "config", "{name:?}");
        }
    }

    #[test]
    fn upload_url_per_environment() {
        let resolver = EndpointResolver::default();
        assert_eq!(
            resolver.upload_url(Environment::Certification).unwrap(),
            "https://maullin.sii.cl/cgi_dte/UPL/DTEUpload"
        );
        assert_eq!(
            resolver.upload_url(Environment::Production).unwrap(),
            "https://palena.sii.cl/cgi_dte/UPL/DTEUpload"
        );
    }
}
