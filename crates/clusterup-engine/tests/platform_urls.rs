//! Every supported host maps to exactly one Terraform release URL.

use clusterup_engine::config::Config;
use clusterup_engine::error::ProvisionError;
use clusterup_engine::platform::HostPlatform;
use proptest::prelude::*;

const SUPPORTED_HOSTS: &[(&str, &str, &str)] = &[
    ("linux", "x86_64", "linux_amd64"),
    ("linux", "aarch64", "linux_arm64"),
    ("macos", "x86_64", "darwin_amd64"),
    ("macos", "aarch64", "darwin_arm64"),
    ("freebsd", "x86_64", "freebsd_amd64"),
];

proptest! {
    #[test]
    fn prop_supported_hosts_yield_well_formed_urls(
        major in 0u32..3,
        minor in 0u32..20,
        patch in 0u32..30,
        host in 0usize..SUPPORTED_HOSTS.len(),
    ) {
        let version = format!("{major}.{minor}.{patch}");
        let config = Config::builder().terraform_version(&version).build().unwrap();
        let (os, arch, suffix) = SUPPORTED_HOSTS[host];

        let platform = HostPlatform::resolve(os, arch).unwrap();
        prop_assert_eq!(platform.release_suffix(), suffix);

        let url = config.terraform_url(&platform.release_suffix());
        prop_assert_eq!(
            url,
            format!(
                "https://releases.hashicorp.com/terraform/{version}/terraform_{version}_{suffix}.zip"
            )
        );
    }

    #[test]
    fn prop_unlisted_os_fails_closed(os in "[a-z]{3,10}") {
        prop_assume!(!["linux", "macos", "darwin", "freebsd"].contains(&os.as_str()));
        let err = HostPlatform::resolve(&os, "x86_64").unwrap_err();
        let is_unsupported = matches!(err, ProvisionError::UnsupportedPlatform { .. });
        prop_assert!(is_unsupported);
    }
}

#[test]
fn test_windows_and_freebsd_arm_are_rejected() {
    for (os, arch) in [("windows", "x86_64"), ("freebsd", "aarch64"), ("linux", "riscv64")] {
        let err = HostPlatform::resolve(os, arch).unwrap_err();
        assert!(err.is_environment_unsupported(), "{os}/{arch}");
    }
}
