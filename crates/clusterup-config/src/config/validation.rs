use clusterup_utils::error::ConfigError;

use super::Config;

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

/// GitHub `owner/name`, both halves non-empty and free of whitespace.
fn is_repo_slug(repo: &str) -> bool {
    match repo.split_once('/') {
        Some((owner, name)) => {
            !owner.is_empty()
                && !name.is_empty()
                && !name.contains('/')
                && !repo.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

impl Config {
    /// Validate configuration values
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !is_repo_slug(self.infra_repo()) {
            return Err(invalid(
                "infra_repo",
                format!("'{}' is not of the form owner/name", self.infra_repo()),
            ));
        }

        if self.infra_branch().trim().is_empty() {
            return Err(invalid("infra_branch", "must not be empty"));
        }

        if self.terraform_version().trim().is_empty() {
            return Err(invalid("terraform_version", "must not be empty"));
        }

        let template = self.terraform_url_template();
        if !template.contains("{version}") || !template.contains("{platform}") {
            return Err(invalid(
                "terraform_url_template",
                format!("'{template}' must contain {{version}} and {{platform}}"),
            ));
        }

        let template = self.infra_url_template();
        if !template.contains("{repo}") || !template.contains("{branch}") {
            return Err(invalid(
                "infra_url_template",
                format!("'{template}' must contain {{repo}} and {{branch}}"),
            ));
        }

        if self.handoff.retry_interval_secs == Some(0) {
            return Err(invalid("retry_interval_secs", "must be greater than 0"));
        }

        if self.tools.tool_timeout_secs == Some(0) {
            return Err(invalid("tool_timeout_secs", "must be greater than 0"));
        }

        for (key, program) in [
            ("aws", self.aws_program()),
            ("ssh_keygen", self.ssh_keygen_program()),
            ("scp", self.scp_program()),
        ] {
            if program.trim().is_empty() {
                return Err(invalid(key, "program name must not be empty"));
            }
        }

        if self.remote_user().trim().is_empty() {
            return Err(invalid("remote_user", "must not be empty"));
        }

        Ok(())
    }
}
