use std::collections::BTreeMap;

use super::{Config, ConfigSource};

fn source_label(source: Option<&ConfigSource>) -> &'static str {
    source.unwrap_or(&ConfigSource::Default).as_str()
}

impl Config {
    /// Effective configuration as `key -> (value, source)`, sorted by key.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let retry_interval = self.retry_interval().as_secs().to_string();
        let max_attempts = self
            .max_upload_attempts()
            .map_or_else(|| "unbounded".to_string(), |n| n.to_string());
        let timeout = self
            .tool_timeout()
            .map_or_else(|| "none".to_string(), |t| t.as_secs().to_string());
        let render_mode = self.render_mode().to_string();
        let verbose = self.verbose().to_string();

        let entries: [(&str, &str); 15] = [
            ("infra_repo", self.infra_repo()),
            ("infra_branch", self.infra_branch()),
            ("terraform_version", self.terraform_version()),
            ("terraform_url_template", self.terraform_url_template()),
            ("infra_url_template", self.infra_url_template()),
            ("aws", self.aws_program()),
            ("ssh_keygen", self.ssh_keygen_program()),
            ("scp", self.scp_program()),
            ("tool_timeout_secs", &timeout),
            ("remote_user", self.remote_user()),
            ("retry_interval_secs", &retry_interval),
            ("max_attempts", &max_attempts),
            ("render_mode", &render_mode),
            ("destroy_command", self.destroy_command()),
            ("verbose", &verbose),
        ];

        entries
            .into_iter()
            .map(|(key, value)| {
                let source = source_label(self.source_attribution.get(key));
                (key.to_string(), (value.to_string(), source.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_config_reports_sources() {
        let config = Config::builder().infra_branch("develop").build().unwrap();
        let effective = config.effective_config();

        assert_eq!(
            effective.get("infra_branch"),
            Some(&("develop".to_string(), "programmatic".to_string()))
        );
        assert_eq!(
            effective.get("max_attempts"),
            Some(&("unbounded".to_string(), "default".to_string()))
        );
        assert_eq!(effective.get("render_mode").map(|(v, _)| v.as_str()), Some("structured"));
    }
}
