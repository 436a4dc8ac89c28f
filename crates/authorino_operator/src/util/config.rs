pub const DEFAULT_AUTHORINO_IMAGE: &str = "quay.io/kuadrant/authorino:latest";

/// Operator-wide settings, independent of any single `Authorino`
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    /// Image used for instances that do not pin `spec.image`
    pub default_authorino_image: String,
    /// Restrict the controller to one namespace; all namespaces when `None`
    pub watch_namespace: Option<String>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            default_authorino_image: DEFAULT_AUTHORINO_IMAGE.to_string(),
            watch_namespace: None,
        }
    }
}

impl OperatorConfig {
    pub fn with_default_authorino_image(mut self, image: impl Into<String>) -> Self {
        let image = image.into();
        if !image.is_empty() {
            self.default_authorino_image = image;
        }
        self
    }

    pub fn with_watch_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.watch_namespace = if namespace.is_empty() { None } else { Some(namespace) };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values_keep_defaults() {
        let config = OperatorConfig::default()
            .with_default_authorino_image("")
            .with_watch_namespace("");
        assert_eq!(config.default_authorino_image, DEFAULT_AUTHORINO_IMAGE);
        assert_eq!(config.watch_namespace, None);
    }

    #[test]
    fn overrides_are_applied() {
        let config = OperatorConfig::default()
            .with_default_authorino_image("quay.io/kuadrant/authorino:v0.17.0")
            .with_watch_namespace("auth");
        assert_eq!(config.default_authorino_image, "quay.io/kuadrant/authorino:v0.17.0");
        assert_eq!(config.watch_namespace.as_deref(), Some("auth"));
    }
}
