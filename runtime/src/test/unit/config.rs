use test_case::test_case;

use crate::config::{Backend, ManagerConfig, StrategyKind};

#[test]
fn test_defaults() {
    let config = ManagerConfig::builder().build();
    assert_eq!(config.backend, Backend::Host);
    assert_eq!(config.strategy, StrategyKind::Explicit);
    assert_eq!(config.device_index, None);
    assert!(!config.interactive);
    assert_eq!(config.max_prompt_attempts, 5);
    assert_eq!(config.host_devices, 1);
    assert_eq!(config.compiler, "clang");
    assert_eq!(config, ManagerConfig::default());
}

#[test]
fn test_builder_overrides() {
    let config = ManagerConfig::builder()
        .strategy(StrategyKind::Implicit)
        .device_index(2)
        .host_devices(3)
        .compiler("gcc")
        .build();

    assert_eq!(config.strategy, StrategyKind::Implicit);
    assert_eq!(config.device_index, Some(2));
    assert_eq!(config.host_devices, 3);
    assert_eq!(config.compiler, "gcc");
}

#[test_case("host", Backend::Host)]
#[test_case("CUDA", Backend::Cuda)]
fn test_backend_parse(name: &str, expected: Backend) {
    assert_eq!(name.parse::<Backend>().unwrap(), expected);
}

#[test_case("implicit", StrategyKind::Implicit)]
#[test_case("Explicit", StrategyKind::Explicit)]
fn test_strategy_parse(name: &str, expected: StrategyKind) {
    assert_eq!(name.parse::<StrategyKind>().unwrap(), expected);
}

#[test]
fn test_strategy_from_config() {
    let explicit = ManagerConfig::builder().build().context_strategy();
    assert!(explicit.selects_device());

    let implicit = ManagerConfig::builder().strategy(StrategyKind::Implicit).build().context_strategy();
    assert!(!implicit.selects_device());
}

#[cfg(not(feature = "cuda"))]
#[test]
fn test_cuda_requires_feature() {
    let err = ManagerConfig::builder().backend(Backend::Cuda).build().driver().unwrap_err();
    assert!(matches!(err, ipanema_device::Error::InvalidDevice { .. }));
}
