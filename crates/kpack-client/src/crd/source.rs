use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The source section shared by `Image` and `Build` resources.
///
/// On the wire this is three optional siblings, of which kpack expects exactly one to be set.
/// Use [`SourceConfig::source`] and [`SourceConfig::set_source`] to treat it as the tagged union
/// it actually is.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<Git>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<Blob>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<Registry>,

    /// Directory inside the source to build from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct Git {
    pub url: String,
    pub revision: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct Blob {
    pub url: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct Registry {
    pub image: String,
}

/// Exactly one kind of source code location.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Source {
    Git(Git),
    Blob(Blob),
    Registry(Registry),
}

impl Source {
    /// The name `kp` shows for this kind of source.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Git(_) => "GitUrl",
            Self::Blob(_) => "Blob",
            Self::Registry(_) => "LocalPath",
        }
    }

    pub fn location(&self) -> &str {
        match self {
            Self::Git(git) => &git.url,
            Self::Blob(blob) => &blob.url,
            Self::Registry(registry) => &registry.image,
        }
    }
}

impl SourceConfig {
    /// Returns the configured source. If a malformed resource sets more than one, git wins over
    /// blob, which wins over registry.
    pub fn source(&self) -> Option<Source> {
        if let Some(git) = &self.git {
            return Some(Source::Git(git.clone()));
        }

        if let Some(blob) = &self.blob {
            return Some(Source::Blob(blob.clone()));
        }

        self.registry.clone().map(Source::Registry)
    }

    /// Replaces the source, clearing every other kind. The sub path is left untouched.
    pub fn set_source(&mut self, source: Source) {
        let (git, blob, registry) = match source {
            Source::Git(git) => (Some(git), None, None),
            Source::Blob(blob) => (None, Some(blob), None),
            Source::Registry(registry) => (None, None, Some(registry)),
        };

        self.git = git;
        self.blob = blob;
        self.registry = registry;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_source_clears_other_kinds() {
        let mut config = SourceConfig {
            blob: Some(Blob {
                url: "https://example.com/app.tgz".to_owned(),
            }),
            sub_path: Some("api".to_owned()),
            ..SourceConfig::default()
        };

        config.set_source(Source::Git(Git {
            url: "https://example.com/app.git".to_owned(),
            revision: "main".to_owned(),
        }));

        assert!(config.blob.is_none());
        assert_eq!(config.sub_path.as_deref(), Some("api"));
        assert_eq!(
            config.source().map(|source| source.type_name()),
            Some("GitUrl")
        );
    }

    #[test]
    fn empty_config_has_no_source() {
        assert_eq!(SourceConfig::default().source(), None);
    }
}
